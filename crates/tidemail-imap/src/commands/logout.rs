//! NOOP, CLOSE and LOGOUT.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::{ConnectionState, ExecOptions, ImapConnection};
use crate::{Error, Result};

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Pokes the server; any pending untagged responses are routed.
    pub async fn noop(&mut self) -> Result<()> {
        self.exec("NOOP", Vec::new(), ExecOptions::default()).await?;
        Ok(())
    }

    /// Closes the selected mailbox (CLOSE) and returns to the
    /// authenticated state. A no-op when nothing is selected.
    pub async fn close_mailbox(&mut self) -> Result<()> {
        if self.state() != ConnectionState::Selected {
            return Ok(());
        }
        self.exec("CLOSE", Vec::new(), ExecOptions::default())
            .await?;
        self.deselect();
        self.last_select = None;
        Ok(())
    }

    /// Logs out and closes the connection.
    ///
    /// The server answers with BYE followed by the tagged OK; a connection
    /// that died before or during the exchange still counts as logged out.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.is_usable() {
            self.close().await?;
            return Ok(());
        }
        let result = self
            .exec("LOGOUT", Vec::new(), ExecOptions::default())
            .await;
        self.close().await?;
        match result {
            Ok(_) | Err(Error::NoConnection(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
