//! EXPUNGE: deleting a message range.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::Argument;
use crate::commands::store::{StoreAction, StoreOptions};
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::validate_sequence;
use crate::Result;

/// Options for range expunge.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpungeOptions {
    /// Address messages by UID. With UIDPLUS this also scopes the expunge
    /// itself to the range via `UID EXPUNGE`.
    pub uid: bool,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Deletes the messages in `range`: marks them `\Deleted`, then
    /// expunges.
    ///
    /// With UIDPLUS and `uid` set, `UID EXPUNGE` removes exactly the given
    /// UIDs. Otherwise a plain EXPUNGE is issued, which removes **every**
    /// `\Deleted` message in the mailbox, including ones marked by other
    /// sessions.
    pub async fn expunge_range(&mut self, range: &str, options: ExpungeOptions) -> Result<()> {
        self.require_selected()?;
        validate_sequence(range)?;

        self.store(
            range,
            StoreAction::Add,
            &["\\Deleted"],
            StoreOptions {
                uid: options.uid,
                silent: true,
                unchanged_since: None,
            },
        )
        .await?;

        if options.uid && self.capabilities().has("UIDPLUS") {
            self.exec(
                "UID EXPUNGE",
                vec![Argument::Sequence(range.to_string())],
                ExecOptions::default(),
            )
            .await?;
        } else {
            self.exec("EXPUNGE", Vec::new(), ExecOptions::default())
                .await?;
        }
        // A HIGHESTMODSEQ code on the OK has already advanced the mailbox.
        Ok(())
    }
}
