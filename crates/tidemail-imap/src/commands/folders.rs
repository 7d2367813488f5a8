//! Mailbox management: CREATE, DELETE, RENAME, SUBSCRIBE, UNSUBSCRIBE.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::mailbox_argument;
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::{ResponseCode, normalize_path};
use crate::{Error, Result};

/// Result of CREATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResult {
    /// Path as given.
    pub path: String,
    /// False when the mailbox already existed.
    pub created: bool,
    /// OBJECTID of the new mailbox, when advertised.
    pub mailbox_id: Option<String>,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a mailbox. An ALREADYEXISTS refusal is not an error.
    pub async fn create(&mut self, path: &str) -> Result<CreateResult> {
        self.require_authenticated()?;
        let args = vec![mailbox_argument(path, self.utf8_accepted())];
        match self.exec("CREATE", args, ExecOptions::default()).await {
            Ok(result) => {
                let mailbox_id = match result.tagged.code {
                    Some(ResponseCode::MailboxId(id)) => Some(id),
                    _ => None,
                };
                Ok(CreateResult {
                    path: path.to_string(),
                    created: true,
                    mailbox_id,
                })
            }
            Err(Error::Command {
                code: Some(ResponseCode::AlreadyExists),
                ..
            }) => Ok(CreateResult {
                path: path.to_string(),
                created: false,
                mailbox_id: None,
            }),
            Err(err) => Err(err),
        }
    }

    /// Deletes a mailbox and drops it from the folder cache.
    pub async fn delete(&mut self, path: &str) -> Result<()> {
        self.require_authenticated()?;
        let args = vec![mailbox_argument(path, self.utf8_accepted())];
        self.exec("DELETE", args, ExecOptions::default()).await?;
        let normalized = normalize_path(path, None);
        self.folders.remove(&normalized);
        Ok(())
    }

    /// Renames a mailbox. The stale cache entry for the old path is
    /// dropped; the next LIST repopulates the new one.
    pub async fn rename(&mut self, path: &str, new_path: &str) -> Result<()> {
        self.require_authenticated()?;
        let utf8 = self.utf8_accepted();
        let args = vec![
            mailbox_argument(path, utf8),
            mailbox_argument(new_path, utf8),
        ];
        self.exec("RENAME", args, ExecOptions::default()).await?;
        let normalized = normalize_path(path, None);
        self.folders.remove(&normalized);
        Ok(())
    }

    /// Subscribes to a mailbox.
    pub async fn subscribe(&mut self, path: &str) -> Result<()> {
        self.require_authenticated()?;
        let args = vec![mailbox_argument(path, self.utf8_accepted())];
        self.exec("SUBSCRIBE", args, ExecOptions::default()).await?;
        self.set_subscribed(path, true);
        Ok(())
    }

    /// Unsubscribes from a mailbox.
    pub async fn unsubscribe(&mut self, path: &str) -> Result<()> {
        self.require_authenticated()?;
        let args = vec![mailbox_argument(path, self.utf8_accepted())];
        self.exec("UNSUBSCRIBE", args, ExecOptions::default())
            .await?;
        self.set_subscribed(path, false);
        Ok(())
    }

    fn set_subscribed(&mut self, path: &str, subscribed: bool) {
        let normalized = normalize_path(path, None);
        if let Some(entry) = self.folders.get_mut(&normalized) {
            entry.subscribed = subscribed;
        }
    }
}
