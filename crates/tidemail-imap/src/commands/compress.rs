//! COMPRESS=DEFLATE negotiation (RFC 4978).

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::Argument;
use crate::connection::{ExecOptions, ImapConnection};
use crate::{Error, Result};

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Negotiates deflate compression. One-shot: returns `true` when the
    /// stream is now compressed, `false` when the server lacks the
    /// capability, refused, or compression is already on — the stream is
    /// left untouched in every refusal case.
    pub async fn compress(&mut self) -> Result<bool> {
        if self.is_compressed() || !self.capabilities().has("COMPRESS=DEFLATE") {
            return Ok(false);
        }
        match self
            .exec(
                "COMPRESS",
                vec![Argument::Atom("DEFLATE".into())],
                ExecOptions::default(),
            )
            .await
        {
            Ok(_) => {
                self.enable_compression();
                tracing::debug!(conn = self.id(), "deflate compression active");
                Ok(true)
            }
            Err(Error::Command { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
