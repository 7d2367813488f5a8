//! Connection engine: socket lifecycle, command exchange and session state.
//!
//! [`ImapConnection`] owns the byte stream and every piece of per-connection
//! state (capabilities, folder cache, selected mailbox, namespaces). All
//! access happens from a single logical driver: the in-flight command (or
//! the IDLE handle) pumps the reader, and unsolicited responses that arrive
//! between commands are drained from the framing buffer before the next tag
//! is written.

#![allow(clippy::missing_errors_doc)]

mod compress;
mod config;
mod events;
mod framed;
mod idle;
mod request;
mod router;
mod stream;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

pub use config::{Credentials, ImapConfig, ImapConfigBuilder, Security, SpecialUseHints};
pub use events::{EventSink, MailEvent};
pub use framed::FramedStream;
pub use idle::{IdleHandle, IdleOutcome};
pub use request::{ExecOptions, ExecResult, TagGenerator};
pub use stream::{ImapStream, connect_plain, connect_tls};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::codec::{
    Argument, CommandChunk, EncodeOptions, ResponseLine, TaggedResponse, UntaggedResponse,
    encode_command, parse_line,
};
use crate::types::{
    Capabilities, FolderEntry, Namespaces, ResponseCode, SelectedMailbox, Status,
};
use crate::{Error, Result};

static CONNECTION_IDS: AtomicU64 = AtomicU64::new(1);

/// Connection protocol state (RFC 3501 section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Greeting received, not yet authenticated.
    NotAuthenticated,
    /// Authenticated, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    Selected,
    /// Logged out or disconnected.
    Logout,
}

/// State of an in-progress IDLE command.
#[derive(Debug)]
pub(crate) struct IdleState {
    /// Tag of the IDLE command.
    pub(crate) tag: String,
    /// True once DONE was written.
    pub(crate) done_sent: bool,
}

/// A stateful IMAP connection.
///
/// Commands are issued through the procedures in [`crate::commands`]; the
/// generic exchange machinery lives here.
pub struct ImapConnection<S> {
    pub(crate) framed: FramedStream<S>,
    pub(crate) config: ImapConfig,
    state: ConnectionState,
    tags: TagGenerator,
    /// Advertised capabilities, canonical uppercase.
    pub(crate) capabilities: Capabilities,
    /// Extensions switched on via ENABLE.
    pub(crate) enabled: HashSet<String>,
    /// Namespaces from NAMESPACE or the LIST fallback.
    pub(crate) namespaces: Namespaces,
    /// Folder cache, keyed by normalized path.
    pub(crate) folders: HashMap<String, FolderEntry>,
    /// Currently selected mailbox.
    pub(crate) mailbox: Option<SelectedMailbox>,
    /// Path and read-only flag of the last SELECT, kept for resync.
    pub(crate) last_select: Option<(String, bool)>,
    /// In-progress IDLE, broken by [`Self::precheck`].
    pub(crate) idle: Option<IdleState>,
    /// Path context for VANISHED/FETCH routed during SELECT, before the new
    /// mailbox is installed.
    pub(crate) pending_select_path: Option<String>,
    /// True when the server is expected to push a capability update.
    pub(crate) expect_capability_update: bool,
    /// Server identification from the ID exchange, lowercased keys.
    pub(crate) server_info: HashMap<String, String>,
    closing: bool,
    closed: bool,
    pub(crate) events: EventSink,
    /// Bumped whenever a message event is emitted; lets the NOOP fallback
    /// detect activity.
    pub(crate) activity: u64,
    id: u64,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream. The server greeting is not yet consumed;
    /// call [`Self::read_greeting`].
    #[must_use]
    pub fn new(stream: S, config: ImapConfig) -> (Self, UnboundedReceiver<MailEvent>) {
        let (events, receiver) = EventSink::channel();
        let max_literal = config.max_literal_size;
        let connection = Self {
            framed: FramedStream::with_max_literal(stream, max_literal),
            config,
            state: ConnectionState::NotAuthenticated,
            tags: TagGenerator::new(),
            capabilities: Capabilities::new(),
            enabled: HashSet::new(),
            namespaces: Namespaces::default(),
            folders: HashMap::new(),
            mailbox: None,
            last_select: None,
            idle: None,
            pending_select_path: None,
            expect_capability_update: false,
            server_info: HashMap::new(),
            closing: false,
            closed: false,
            events,
            activity: 0,
            id: CONNECTION_IDS.fetch_add(1, Ordering::Relaxed),
        };
        (connection, receiver)
    }

    /// Returns the connection id used in trace logs.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the current protocol state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the advertised capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns the extensions switched on via ENABLE.
    #[must_use]
    pub const fn enabled(&self) -> &HashSet<String> {
        &self.enabled
    }

    /// Returns the currently selected mailbox, if any.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&SelectedMailbox> {
        self.mailbox.as_ref()
    }

    /// Returns the known namespaces.
    #[must_use]
    pub const fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Returns the cached folder entries from LIST.
    #[must_use]
    pub const fn folder_cache(&self) -> &HashMap<String, FolderEntry> {
        &self.folders
    }

    /// Returns the server identification from the ID exchange.
    #[must_use]
    pub const fn server_info(&self) -> &HashMap<String, String> {
        &self.server_info
    }

    /// Path and read-only flag of the last successful SELECT, for callers
    /// that re-select after reconnecting.
    #[must_use]
    pub fn last_selected(&self) -> Option<(&str, bool)> {
        self.last_select
            .as_ref()
            .map(|(path, read_only)| (path.as_str(), *read_only))
    }

    /// Returns true while the connection is usable.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        !self.closed && !self.closing
    }

    /// True when `UTF8=ACCEPT` has been enabled.
    #[must_use]
    pub fn utf8_accepted(&self) -> bool {
        self.enabled.contains("UTF8=ACCEPT")
    }

    /// True when literal8 may be used for a payload.
    #[must_use]
    pub fn binary_allowed(&self) -> bool {
        self.capabilities.has("BINARY") && !self.config.disable_binary
    }

    /// Consumes the server greeting and sets the initial state.
    pub async fn read_greeting(&mut self) -> Result<()> {
        let deadline = self.config.connect_timeout;
        let line = tokio::time::timeout(deadline, self.read_response_line())
            .await
            .map_err(|_| Error::Timeout(deadline))??;

        let ResponseLine::Untagged(greeting) = line else {
            return Err(Error::Protocol("expected untagged greeting".to_string()));
        };
        match greeting.name.as_str() {
            "OK" => self.state = ConnectionState::NotAuthenticated,
            "PREAUTH" => self.state = ConnectionState::Authenticated,
            "BYE" => {
                return Err(Error::NoConnection(format!(
                    "server rejected connection: {}",
                    greeting.text
                )));
            }
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other}")));
            }
        }
        if let Some(ResponseCode::Capability(tokens)) = &greeting.code {
            self.capabilities.replace(tokens.iter().map(String::as_str));
        }
        tracing::debug!(conn = self.id, state = ?self.state, "greeting received");
        Ok(())
    }

    /// Executes one command: precheck, drain, send (with literal
    /// continuations), then read and route until the tagged completion.
    pub async fn exec(
        &mut self,
        command: &str,
        args: Vec<Argument>,
        options: ExecOptions<'_>,
    ) -> Result<ExecResult> {
        if !self.is_usable() {
            return Err(Error::NoConnection("connection is closed".to_string()));
        }
        self.precheck().await?;
        if let Err(err) = self.drain_buffered() {
            if matches!(err, Error::Protocol(_)) {
                self.abort();
            }
            return Err(err);
        }

        let tag = self.tags.next();
        tracing::debug!(
            conn = self.id,
            tag,
            command,
            comment = options.comment,
            "executing command"
        );
        let encode_options = EncodeOptions {
            literal_plus: self.capabilities.has("LITERAL+"),
        };
        let chunks = encode_command(&tag, command, &args, encode_options)?;

        let result = match options.timeout.or(self.config.command_timeout) {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.exchange(&tag, &chunks, options.collect))
                    .await
                {
                    Ok(result) => result,
                    // The connection stays open; the stale tagged reply is
                    // discarded by a later drain.
                    Err(_) => return Err(Error::Timeout(deadline)),
                }
            }
            None => self.exchange(&tag, &chunks, options.collect).await,
        };

        if let Err(Error::Protocol(_)) = &result {
            self.abort();
        }
        result
    }

    async fn exchange(
        &mut self,
        tag: &str,
        chunks: &[CommandChunk],
        collect: &[&str],
    ) -> Result<ExecResult> {
        let mut collected = Vec::new();

        for chunk in chunks {
            self.framed.write(&chunk.text).await?;
            let Some(literal) = &chunk.literal else {
                continue;
            };
            if !literal.non_sync {
                loop {
                    match self.read_response_line().await? {
                        ResponseLine::Continuation { .. } => break,
                        ResponseLine::Untagged(resp) => {
                            self.handle_untagged(resp, collect, &mut collected);
                        }
                        ResponseLine::Tagged(tagged) if tagged.tag == tag => {
                            // The command was rejected before the literal
                            // could be transmitted.
                            return self.finish(tagged, collected);
                        }
                        ResponseLine::Tagged(tagged) => {
                            tracing::debug!(conn = self.id, stale = %tagged.tag, "dropping stale tagged response");
                        }
                    }
                }
            }
            self.framed.write(&literal.data).await?;
        }

        loop {
            match self.read_response_line().await? {
                ResponseLine::Untagged(resp) => {
                    self.handle_untagged(resp, collect, &mut collected);
                }
                ResponseLine::Tagged(tagged) if tagged.tag == tag => {
                    return self.finish(tagged, collected);
                }
                ResponseLine::Tagged(tagged) => {
                    tracing::debug!(conn = self.id, stale = %tagged.tag, "dropping stale tagged response");
                }
                ResponseLine::Continuation { text } => {
                    tracing::debug!(conn = self.id, text, "unexpected continuation");
                }
            }
        }
    }

    fn finish(
        &mut self,
        tagged: TaggedResponse,
        collected: Vec<UntaggedResponse>,
    ) -> Result<ExecResult> {
        match tagged.status {
            Status::Ok => {
                self.apply_tagged_code(&tagged);
                Ok(ExecResult { tagged, collected })
            }
            Status::Bad => {
                tracing::warn!(conn = self.id, text = %tagged.text, "server rejected command as BAD");
                Err(Error::from_tagged(tagged.status, tagged.text, tagged.code))
            }
            _ => Err(Error::from_tagged(tagged.status, tagged.text, tagged.code)),
        }
    }

    /// Applies response codes carried on a tagged OK.
    fn apply_tagged_code(&mut self, tagged: &TaggedResponse) {
        match &tagged.code {
            Some(ResponseCode::Capability(tokens)) => {
                self.capabilities.replace(tokens.iter().map(String::as_str));
                self.expect_capability_update = false;
            }
            Some(ResponseCode::HighestModSeq(modseq)) => {
                if let Some(mailbox) = &mut self.mailbox {
                    mailbox.advance_modseq(*modseq);
                }
            }
            _ => {}
        }
    }

    fn handle_untagged(
        &mut self,
        resp: UntaggedResponse,
        collect: &[&str],
        collected: &mut Vec<UntaggedResponse>,
    ) {
        self.route_untagged(&resp);
        if collect.contains(&resp.name.as_str()) {
            collected.push(resp);
        }
    }

    /// Reads and parses one logical line.
    pub(crate) async fn read_response_line(&mut self) -> Result<ResponseLine> {
        let raw = self.framed.read_logical_line().await?;
        self.observe_raw(&raw);
        parse_line(&raw)
    }

    /// Routes every complete line already sitting in the framing buffer.
    /// Responses in the gap between two commands are routed globally only.
    pub(crate) fn drain_buffered(&mut self) -> Result<()> {
        while let Some(raw) = self.framed.try_next_line()? {
            self.observe_raw(&raw);
            match parse_line(&raw)? {
                ResponseLine::Untagged(resp) => self.route_untagged(&resp),
                ResponseLine::Tagged(tagged) => {
                    tracing::debug!(conn = self.id, stale = %tagged.tag, "dropping stale tagged response");
                }
                ResponseLine::Continuation { text } => {
                    tracing::debug!(conn = self.id, text, "dropping stray continuation");
                }
            }
        }
        Ok(())
    }

    /// Breaks a pending IDLE before the next command is dispatched.
    ///
    /// Writes DONE (unless already written) and keeps dispatching untagged
    /// responses until the IDLE command's tagged completion.
    pub(crate) async fn precheck(&mut self) -> Result<()> {
        let Some(idle) = self.idle.take() else {
            return Ok(());
        };
        if !idle.done_sent {
            self.framed.write(b"DONE\r\n").await?;
        }
        loop {
            match self.read_response_line().await? {
                ResponseLine::Untagged(resp) => self.route_untagged(&resp),
                ResponseLine::Tagged(tagged) if tagged.tag == idle.tag => {
                    if tagged.status == Status::Ok {
                        return Ok(());
                    }
                    return Err(Error::from_tagged(tagged.status, tagged.text, tagged.code));
                }
                _ => {}
            }
        }
    }

    fn observe_raw(&self, raw: &[u8]) {
        if self.config.log_raw {
            let text = String::from_utf8_lossy(raw).trim_end().to_string();
            self.events.emit(MailEvent::Response(text));
        }
        tracing::trace!(conn = self.id, bytes = raw.len(), "line received");
    }

    /// Leaves the selected state, emitting `MailboxClose`.
    pub(crate) fn deselect(&mut self) {
        if let Some(previous) = self.mailbox.take() {
            self.events.emit(MailEvent::MailboxClose(previous));
        }
        if self.state == ConnectionState::Selected {
            self.state = ConnectionState::Authenticated;
        }
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub(crate) fn require_authenticated(&self) -> Result<()> {
        match self.state {
            ConnectionState::Authenticated | ConnectionState::Selected => Ok(()),
            other => Err(Error::Programming(format!(
                "operation requires an authenticated connection (state: {other:?})"
            ))),
        }
    }

    pub(crate) fn require_selected(&self) -> Result<&SelectedMailbox> {
        if self.state != ConnectionState::Selected {
            return Err(Error::Programming(format!(
                "operation requires a selected mailbox (state: {:?})",
                self.state
            )));
        }
        self.mailbox
            .as_ref()
            .ok_or_else(|| Error::Programming("selected state without mailbox".to_string()))
    }

    /// Marks the connection broken after a fatal protocol error.
    pub(crate) fn abort(&mut self) {
        self.closing = true;
    }

    /// Returns the next command tag.
    pub(crate) fn next_tag(&mut self) -> String {
        self.tags.next()
    }

    /// Opaque marker that changes when message events are emitted.
    pub(crate) const fn activity_marker(&self) -> u64 {
        self.activity
    }

    /// Marks the connection as closing after an untagged BYE.
    pub(crate) fn mark_closing(&mut self) {
        self.closing = true;
    }

    /// Closes the connection. Idempotent; any later command fails with
    /// `NoConnection`.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.closing = true;
        self.idle = None;
        self.state = ConnectionState::Logout;
        if let Some(mailbox) = self.mailbox.take() {
            self.events.emit(MailEvent::MailboxClose(mailbox));
        }
        self.events.emit(MailEvent::Close);
        let _ = self.framed.shutdown().await;
        tracing::debug!(conn = self.id, "connection closed");
        Ok(())
    }

    /// Switches the framing layer to deflate after a successful
    /// `COMPRESS DEFLATE` exchange.
    pub(crate) fn enable_compression(&mut self) {
        self.framed.enable_deflate();
    }

    /// True once COMPRESS is active.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.framed.is_compressed()
    }
}
