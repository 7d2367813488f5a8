//! IDLE (RFC 2177) with NOOP-polling fallback.
//!
//! `idle_begin` puts the connection into IDLE; the server then streams
//! untagged responses which `idle_wait` pumps through the router. Any later
//! command breaks the IDLE automatically: [`super::ImapConnection::precheck`]
//! writes DONE and consumes the tagged completion before the next tag goes
//! out.
//!
//! Without the IDLE capability the same caller-facing contract ("await new
//! activity until the next command") is provided by issuing NOOP on an
//! interval.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::codec::ResponseLine;
use crate::types::Status;
use crate::{Error, Result};

use super::{ExecOptions, IdleState, ImapConnection};

/// Result of one `idle_wait` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// The server reported mailbox activity (events were emitted).
    Activity,
    /// The wait elapsed without activity.
    Timeout,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Enters IDLE. Returns `true` when the server supports IDLE and is now
    /// streaming, `false` when the NOOP fallback will be used.
    pub async fn idle_begin(&mut self) -> Result<bool> {
        self.require_selected()?;
        if !self.capabilities().has("IDLE") {
            return Ok(false);
        }

        self.precheck().await?;
        self.drain_buffered()?;

        let tag = self.next_tag();
        self.framed.write(format!("{tag} IDLE\r\n").as_bytes()).await?;
        loop {
            match self.read_response_line().await? {
                // Continuation: the server is now streaming untagged
                // responses.
                ResponseLine::Continuation { .. } => {
                    self.idle = Some(IdleState {
                        tag,
                        done_sent: false,
                    });
                    return Ok(true);
                }
                ResponseLine::Untagged(resp) => self.route_untagged(&resp),
                ResponseLine::Tagged(tagged) if tagged.tag == tag => {
                    return Err(Error::from_tagged(tagged.status, tagged.text, tagged.code));
                }
                ResponseLine::Tagged(_) => {}
            }
        }
    }

    /// Waits for mailbox activity for at most `duration`.
    ///
    /// In IDLE mode this pumps the reader and routes whatever arrives. In
    /// fallback mode it issues NOOP at the configured interval. Either way
    /// events reach the event stream before this returns.
    pub async fn idle_wait(&mut self, duration: Duration) -> Result<IdleOutcome> {
        if self.idle.is_some() {
            return self.idle_wait_push(duration).await;
        }
        self.idle_wait_noop(duration).await
    }

    /// Exits IDLE by writing DONE and awaiting the tagged completion.
    /// A no-op in fallback mode or when IDLE already ended.
    pub async fn idle_done(&mut self) -> Result<()> {
        self.precheck().await
    }

    async fn idle_wait_push(&mut self, duration: Duration) -> Result<IdleOutcome> {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(IdleOutcome::Timeout);
            }
            let line = match tokio::time::timeout(remaining, self.read_response_line()).await {
                Err(_) => return Ok(IdleOutcome::Timeout),
                Ok(line) => line?,
            };
            match line {
                ResponseLine::Untagged(resp) => {
                    self.route_untagged(&resp);
                    return Ok(IdleOutcome::Activity);
                }
                ResponseLine::Tagged(tagged) => {
                    let ended = self
                        .idle
                        .as_ref()
                        .is_some_and(|idle| idle.tag == tagged.tag);
                    if ended {
                        // The server terminated the IDLE on its own.
                        self.idle = None;
                        if tagged.status != Status::Ok {
                            return Err(Error::from_tagged(
                                tagged.status,
                                tagged.text,
                                tagged.code,
                            ));
                        }
                        return Ok(IdleOutcome::Timeout);
                    }
                }
                ResponseLine::Continuation { .. } => {}
            }
        }
    }

    async fn idle_wait_noop(&mut self, duration: Duration) -> Result<IdleOutcome> {
        let deadline = Instant::now() + duration;
        let interval = self.config.noop_interval;
        loop {
            let before = self.activity_marker();
            self.exec("NOOP", Vec::new(), ExecOptions::default()).await?;
            if self.activity_marker() != before {
                return Ok(IdleOutcome::Activity);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(IdleOutcome::Timeout);
            }
            tokio::time::sleep(remaining.min(interval)).await;
            if Instant::now() >= deadline {
                return Ok(IdleOutcome::Timeout);
            }
        }
    }
}

/// Borrowing handle around an IDLE session for single-owner use.
///
/// Dropping the handle without calling [`IdleHandle::done`] is fine: the
/// next command's precheck performs the DONE handshake.
pub struct IdleHandle<'a, S> {
    conn: &'a mut ImapConnection<S>,
}

impl<'a, S> IdleHandle<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts an IDLE session (or the NOOP fallback).
    pub async fn begin(conn: &'a mut ImapConnection<S>) -> Result<Self> {
        conn.idle_begin().await?;
        Ok(Self { conn })
    }

    /// Waits for activity.
    pub async fn wait(&mut self, duration: Duration) -> Result<IdleOutcome> {
        self.conn.idle_wait(duration).await
    }

    /// Ends the session.
    pub async fn done(self) -> Result<()> {
        self.conn.idle_done().await
    }
}
