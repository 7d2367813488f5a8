//! STATUS: mailbox counters without selecting.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, Value, decode_path, mailbox_argument};
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::{FolderStatus, normalize_path};
use crate::{Error, Result};

/// Which STATUS items to request.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusQuery {
    /// MESSAGES: total message count.
    pub messages: bool,
    /// RECENT: recent message count.
    pub recent: bool,
    /// UIDNEXT.
    pub uid_next: bool,
    /// UIDVALIDITY.
    pub uid_validity: bool,
    /// UNSEEN: unseen message count.
    pub unseen: bool,
    /// HIGHESTMODSEQ; silently dropped unless CONDSTORE is advertised.
    pub highest_modseq: bool,
}

impl StatusQuery {
    /// Requests every item.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            messages: true,
            recent: true,
            uid_next: true,
            uid_validity: true,
            unseen: true,
            highest_modseq: true,
        }
    }

    /// Renders the requested items, filtering HIGHESTMODSEQ when the server
    /// lacks CONDSTORE.
    pub(crate) fn items(self, condstore: bool) -> Vec<Argument> {
        let mut items = Vec::new();
        if self.messages {
            items.push(Argument::Atom("MESSAGES".into()));
        }
        if self.recent {
            items.push(Argument::Atom("RECENT".into()));
        }
        if self.uid_next {
            items.push(Argument::Atom("UIDNEXT".into()));
        }
        if self.uid_validity {
            items.push(Argument::Atom("UIDVALIDITY".into()));
        }
        if self.unseen {
            items.push(Argument::Atom("UNSEEN".into()));
        }
        if self.highest_modseq && condstore {
            items.push(Argument::Atom("HIGHESTMODSEQ".into()));
        }
        items
    }

    pub(crate) fn is_empty(self, condstore: bool) -> bool {
        self.items(condstore).is_empty()
    }
}

/// Parses the flat key/value list of a STATUS response.
pub(crate) fn parse_status_items(items: &[Value]) -> FolderStatus {
    let mut status = FolderStatus::default();
    let mut iter = items.iter();
    while let Some(key) = iter.next() {
        let Some(key) = key.as_str() else { continue };
        let Some(value) = iter.next().and_then(Value::as_number) else {
            continue;
        };
        match key.to_uppercase().as_str() {
            "MESSAGES" => status.messages = u32::try_from(value).ok(),
            "RECENT" => status.recent = u32::try_from(value).ok(),
            "UIDNEXT" => status.uid_next = u32::try_from(value).ok(),
            "UIDVALIDITY" => status.uid_validity = Some(value),
            "UNSEEN" => status.unseen = u32::try_from(value).ok(),
            "HIGHESTMODSEQ" => status.highest_modseq = Some(value),
            _ => {}
        }
    }
    status
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Queries mailbox counters.
    ///
    /// A server NO is double-checked with a LIST probe: if the mailbox is
    /// not listed either, the error becomes [`Error::NotFound`].
    pub async fn status(&mut self, path: &str, query: StatusQuery) -> Result<FolderStatus> {
        self.require_authenticated()?;
        let condstore = self.capabilities().has("CONDSTORE");
        if query.is_empty(condstore) {
            return Err(Error::Programming("empty STATUS query".to_string()));
        }

        let args = vec![
            mailbox_argument(path, self.utf8_accepted()),
            Argument::List(query.items(condstore)),
        ];
        let result = match self
            .exec("STATUS", args, ExecOptions::collecting(&["STATUS"]))
            .await
        {
            Ok(result) => result,
            Err(err @ Error::Command { .. }) => {
                // Distinguish "no such mailbox" from other failures with a
                // bare LIST probe.
                let probe_args = vec![
                    Argument::String(String::new()),
                    mailbox_argument(path, self.utf8_accepted()),
                ];
                let probe = self
                    .exec("LIST", probe_args, ExecOptions::collecting(&["LIST"]))
                    .await?;
                if probe.collected_named("LIST").next().is_none() {
                    return Err(Error::NotFound(path.to_string()));
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let normalized = normalize_path(path, None);
        for resp in result.collected_named("STATUS") {
            let Some(listed_path) = resp.attributes.first().and_then(Value::as_str) else {
                continue;
            };
            let listed_path = normalize_path(&decode_path(listed_path), None);
            if listed_path != normalized {
                continue;
            }
            let Some(items) = resp.attributes.get(1).and_then(Value::as_list) else {
                continue;
            };
            return Ok(parse_status_items(items));
        }
        Err(Error::Protocol(format!(
            "STATUS completed without data for {path}"
        )))
    }
}
