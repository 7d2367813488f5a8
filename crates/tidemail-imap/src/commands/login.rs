//! Authentication: LOGIN, AUTHENTICATE PLAIN and XOAUTH2.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, ResponseLine};
use crate::connection::{ConnectionState, Credentials, ExecOptions, ImapConnection};
use crate::types::Status;
use crate::{Error, Result};

/// SASL PLAIN initial response (RFC 2595): `\0user\0password`, base64.
fn sasl_plain(user: &str, pass: &str) -> String {
    BASE64.encode(format!("\0{user}\0{pass}"))
}

/// XOAUTH2 initial response: `user=<u>^Aauth=Bearer <t>^A^A`, base64.
fn sasl_xoauth2(user: &str, token: &str) -> String {
    BASE64.encode(format!("user={user}\x01auth=Bearer {token}\x01\x01"))
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Authenticates with the configured credentials and transitions to the
    /// authenticated state.
    pub async fn login(&mut self) -> Result<()> {
        if self.state() != ConnectionState::NotAuthenticated {
            return Err(Error::Programming(format!(
                "login requires a fresh connection (state: {:?})",
                self.state()
            )));
        }
        let credentials = self
            .config
            .auth
            .clone()
            .ok_or_else(|| Error::Programming("no credentials configured".to_string()))?;

        // Most servers push fresh capabilities after authentication.
        self.expect_capability_update = true;

        match credentials {
            Credentials::Password { user, pass } => {
                if self.capabilities().has_auth("PLAIN") {
                    let initial = sasl_plain(&user, &pass);
                    self.authenticate("PLAIN", &initial).await?;
                } else {
                    self.exec(
                        "LOGIN",
                        vec![Argument::String(user), Argument::String(pass)],
                        ExecOptions::default(),
                    )
                    .await?;
                }
            }
            Credentials::AccessToken { user, token } => {
                let initial = sasl_xoauth2(&user, &token);
                self.authenticate("XOAUTH2", &initial).await?;
            }
        }

        self.set_state(ConnectionState::Authenticated);
        if self.expect_capability_update {
            // The server kept quiet; ask explicitly.
            self.capability().await?;
        }
        tracing::debug!(conn = self.id(), "authenticated");
        Ok(())
    }

    /// Runs an AUTHENTICATE exchange with one initial response.
    ///
    /// With SASL-IR the initial response rides on the command line;
    /// otherwise it answers the first continuation. Any further
    /// continuation (XOAUTH2 sends its error as a base64 challenge) is
    /// answered with an empty line so the tagged NO can arrive.
    async fn authenticate(&mut self, mechanism: &str, initial: &str) -> Result<()> {
        self.precheck().await?;
        self.drain_buffered()?;

        let tag = self.next_tag();
        let sasl_ir = self.capabilities().has("SASL-IR");
        let mut sent_initial = sasl_ir;
        let line = if sasl_ir {
            format!("{tag} AUTHENTICATE {mechanism} {initial}\r\n")
        } else {
            format!("{tag} AUTHENTICATE {mechanism}\r\n")
        };
        self.framed.write(line.as_bytes()).await?;

        loop {
            match self.read_response_line().await? {
                ResponseLine::Continuation { .. } => {
                    if sent_initial {
                        self.framed.write(b"\r\n").await?;
                    } else {
                        self.framed
                            .write(format!("{initial}\r\n").as_bytes())
                            .await?;
                        sent_initial = true;
                    }
                }
                ResponseLine::Untagged(resp) => self.route_untagged(&resp),
                ResponseLine::Tagged(tagged) if tagged.tag == tag => {
                    if tagged.status == Status::Ok {
                        if let Some(crate::types::ResponseCode::Capability(tokens)) = &tagged.code {
                            self.capabilities.replace(tokens.iter().map(String::as_str));
                            self.expect_capability_update = false;
                        }
                        return Ok(());
                    }
                    return Err(Error::from_tagged(tagged.status, tagged.text, tagged.code));
                }
                ResponseLine::Tagged(_) => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_initial_response() {
        // RFC 4616 test vector shape.
        assert_eq!(sasl_plain("tim", "tanstaaftanstaaf"), "AHRpbQB0YW5zdGFhZnRhbnN0YWFm");
    }

    #[test]
    fn xoauth2_initial_response_round_trips() {
        let encoded = sasl_xoauth2("user@example.com", "ya29.token");
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(
            decoded,
            b"user=user@example.com\x01auth=Bearer ya29.token\x01\x01"
        );
    }
}
