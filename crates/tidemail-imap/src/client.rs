//! Shared client handle.
//!
//! [`ImapClient`] wraps one [`ImapConnection`] behind a fair async mutex so
//! several tasks can issue commands; arrival order is completion order. The
//! mailbox lock (a FIFO semaphore) is the supported way to keep one mailbox
//! selected across a multi-operation sequence, and an in-progress IDLE is
//! interrupted automatically when any task issues the next command.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

use crate::commands::{
    AppendOptions, AppendResult, CopyOptions, CopyResult, CreateResult, ExpungeOptions, FetchItem,
    FetchOptions, FetchedMessage, ListOptions, SearchOptions, SelectOptions, SelectResult,
    StatusQuery, StoreAction, StoreOptions,
};
use crate::codec::Argument;
use crate::connection::{
    ConnectionState, IdleOutcome, ImapConfig, ImapConnection, ImapStream, MailEvent, Security,
    connect_plain, connect_tls,
};
use crate::types::{
    Capabilities, FolderEntry, FolderStatus, Namespaces, SelectedMailbox,
};
use crate::{Error, Result};

/// A cloneable handle to one IMAP connection.
pub struct ImapClient<S = ImapStream> {
    inner: Arc<Mutex<ImapConnection<S>>>,
    mailbox_lock: Arc<Semaphore>,
    idle_interrupt: Arc<Notify>,
    events: Arc<std::sync::Mutex<Option<UnboundedReceiver<MailEvent>>>>,
}

impl<S> Clone for ImapClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            mailbox_lock: Arc::clone(&self.mailbox_lock),
            idle_interrupt: Arc::clone(&self.idle_interrupt),
            events: Arc::clone(&self.events),
        }
    }
}

impl ImapClient<ImapStream> {
    /// Connects to the configured server, consumes the greeting and makes
    /// sure the capability set is known. Authentication is a separate step
    /// ([`Self::login`]).
    pub async fn connect(config: ImapConfig) -> Result<Self> {
        let (stream, greeting_consumed) = match config.security {
            Security::Implicit => (connect_tls(&config.host, config.port).await?, false),
            Security::None => (connect_plain(&config.host, config.port).await?, false),
            Security::StartTls => (
                starttls_bootstrap(&config.host, config.port, config.connect_timeout).await?,
                true,
            ),
        };

        let (mut connection, receiver) = ImapConnection::new(stream, config);
        if !greeting_consumed {
            connection.read_greeting().await?;
        }
        if connection.capabilities().is_empty() {
            connection.capability().await?;
        }
        Ok(Self::from_connection(connection, receiver))
    }
}

impl<S> ImapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already established connection (tests use this with mock
    /// streams).
    #[must_use]
    pub fn from_connection(
        connection: ImapConnection<S>,
        events: UnboundedReceiver<MailEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(connection)),
            mailbox_lock: Arc::new(Semaphore::new(1)),
            idle_interrupt: Arc::new(Notify::new()),
            events: Arc::new(std::sync::Mutex::new(Some(events))),
        }
    }

    /// Takes the event stream. Yields `None` after the first call.
    #[must_use]
    pub fn events(&self) -> Option<UnboundedReceiver<MailEvent>> {
        self.events.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Locks the connection for one command, poking a pending IDLE first so
    /// its holder yields.
    async fn conn(&self) -> OwnedMutexGuard<ImapConnection<S>> {
        self.idle_interrupt.notify_one();
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Authenticates and performs the post-login setup: ENABLE
    /// (QRESYNC/CONDSTORE, UTF8=ACCEPT), the ID exchange and namespace
    /// discovery.
    pub async fn login(&self) -> Result<()> {
        let mut conn = self.conn().await;
        conn.login().await?;

        let mut wanted: Vec<&str> = Vec::new();
        if conn.capabilities().has("QRESYNC") {
            wanted.push("QRESYNC");
            wanted.push("CONDSTORE");
        } else if conn.capabilities().has("CONDSTORE") {
            wanted.push("CONDSTORE");
        }
        if conn.capabilities().has("UTF8=ACCEPT") {
            wanted.push("UTF8=ACCEPT");
        }
        conn.enable(&wanted).await?;
        conn.exchange_id().await?;
        conn.namespace().await?;
        Ok(())
    }

    /// Serializes "keep mailbox `path` selected" sections across tasks.
    ///
    /// Waits FIFO until no other lock is held, selects the mailbox and
    /// returns a guard. Dropping the guard releases the lock. Commands that
    /// need no selection (STATUS, LIST) are not blocked by a held lock.
    pub async fn mailbox_lock(
        &self,
        path: &str,
        options: SelectOptions,
    ) -> Result<MailboxLockGuard> {
        let permit = Arc::clone(&self.mailbox_lock)
            .acquire_owned()
            .await
            .map_err(|_| Error::Programming("mailbox lock closed".to_string()))?;
        let result = self.select(path, options).await?;
        Ok(MailboxLockGuard {
            path: result.mailbox.path,
            _permit: permit,
        })
    }

    /// Starts IDLE (or the NOOP fallback). The returned session holds the
    /// connection; any other task issuing a command interrupts the wait,
    /// and the DONE handshake runs before that command's tag is written.
    pub async fn idle(&self) -> Result<IdleSession<S>> {
        let mut guard = self.conn().await;
        guard.idle_begin().await?;
        Ok(IdleSession {
            guard,
            interrupt: Arc::clone(&self.idle_interrupt),
        })
    }

    // === Delegated commands ===

    /// Lists folders. See [`ImapConnection::list`].
    pub async fn list(
        &self,
        reference: &str,
        pattern: &str,
        options: ListOptions,
    ) -> Result<Vec<FolderEntry>> {
        self.conn().await.list(reference, pattern, options).await
    }

    /// Selects a mailbox. See [`ImapConnection::select`].
    pub async fn select(&self, path: &str, options: SelectOptions) -> Result<SelectResult> {
        self.conn().await.select(path, options).await
    }

    /// Opens a mailbox read-only.
    pub async fn examine(&self, path: &str) -> Result<SelectResult> {
        self.conn().await.examine(path).await
    }

    /// Queries mailbox counters. See [`ImapConnection::status`].
    pub async fn status(&self, path: &str, query: StatusQuery) -> Result<FolderStatus> {
        self.conn().await.status(path, query).await
    }

    /// Fetches message data.
    pub async fn fetch(
        &self,
        range: &str,
        items: &[FetchItem],
        options: FetchOptions,
    ) -> Result<Vec<FetchedMessage>> {
        self.conn().await.fetch(range, items, options).await
    }

    /// Changes message flags.
    pub async fn store(
        &self,
        range: &str,
        action: StoreAction,
        flags: &[&str],
        options: StoreOptions,
    ) -> Result<Vec<FetchedMessage>> {
        self.conn().await.store(range, action, flags, options).await
    }

    /// Searches the selected mailbox.
    pub async fn search(
        &self,
        criteria: Vec<Argument>,
        options: SearchOptions,
    ) -> Result<Vec<u32>> {
        self.conn().await.search(criteria, options).await
    }

    /// Server-side sort (RFC 5256).
    pub async fn sort(
        &self,
        sort_keys: &[&str],
        criteria: Vec<Argument>,
        options: SearchOptions,
    ) -> Result<Vec<u32>> {
        self.conn().await.sort(sort_keys, criteria, options).await
    }

    /// Appends a message. See [`ImapConnection::append`].
    pub async fn append(
        &self,
        destination: &str,
        content: &[u8],
        options: AppendOptions,
    ) -> Result<AppendResult> {
        self.conn().await.append(destination, content, options).await
    }

    /// Copies messages to another mailbox.
    pub async fn copy_messages(
        &self,
        range: &str,
        destination: &str,
        options: CopyOptions,
    ) -> Result<CopyResult> {
        self.conn()
            .await
            .copy_messages(range, destination, options)
            .await
    }

    /// Moves messages to another mailbox.
    pub async fn move_messages(
        &self,
        range: &str,
        destination: &str,
        options: CopyOptions,
    ) -> Result<CopyResult> {
        self.conn()
            .await
            .move_messages(range, destination, options)
            .await
    }

    /// Deletes a message range.
    pub async fn expunge(&self, range: &str, options: ExpungeOptions) -> Result<()> {
        self.conn().await.expunge_range(range, options).await
    }

    /// Creates a mailbox.
    pub async fn create(&self, path: &str) -> Result<CreateResult> {
        self.conn().await.create(path).await
    }

    /// Deletes a mailbox.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.conn().await.delete(path).await
    }

    /// Renames a mailbox.
    pub async fn rename(&self, path: &str, new_path: &str) -> Result<()> {
        self.conn().await.rename(path, new_path).await
    }

    /// Subscribes to a mailbox.
    pub async fn subscribe(&self, path: &str) -> Result<()> {
        self.conn().await.subscribe(path).await
    }

    /// Unsubscribes from a mailbox.
    pub async fn unsubscribe(&self, path: &str) -> Result<()> {
        self.conn().await.unsubscribe(path).await
    }

    /// Discovers namespaces.
    pub async fn namespace(&self) -> Result<Namespaces> {
        self.conn().await.namespace().await
    }

    /// Returns the capability set (cached when possible).
    pub async fn capability(&self) -> Result<Capabilities> {
        self.conn().await.capability().await
    }

    /// Enables extensions.
    pub async fn enable(&self, extensions: &[&str]) -> Result<HashSet<String>> {
        self.conn().await.enable(extensions).await
    }

    /// Runs the ID exchange.
    pub async fn id(&self) -> Result<Option<HashMap<String, String>>> {
        self.conn().await.exchange_id().await
    }

    /// Negotiates deflate compression.
    pub async fn compress(&self) -> Result<bool> {
        self.conn().await.compress().await
    }

    /// Sends NOOP.
    pub async fn noop(&self) -> Result<()> {
        self.conn().await.noop().await
    }

    /// Closes the selected mailbox.
    pub async fn close_mailbox(&self) -> Result<()> {
        self.conn().await.close_mailbox().await
    }

    /// Logs out and closes the connection.
    pub async fn logout(&self) -> Result<()> {
        self.conn().await.logout().await
    }

    /// Hard-closes the connection without LOGOUT.
    pub async fn close(&self) -> Result<()> {
        self.conn().await.close().await
    }

    // === Snapshots ===

    /// Current protocol state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state()
    }

    /// Snapshot of the selected mailbox.
    pub async fn mailbox(&self) -> Option<SelectedMailbox> {
        self.inner.lock().await.mailbox().cloned()
    }

    /// Server identification from the ID exchange.
    pub async fn server_info(&self) -> HashMap<String, String> {
        self.inner.lock().await.server_info().clone()
    }
}

/// Holds the mailbox lock; dropping releases it.
#[derive(Debug)]
pub struct MailboxLockGuard {
    path: String,
    _permit: OwnedSemaphorePermit,
}

impl MailboxLockGuard {
    /// Path that was selected when the lock was acquired.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Outcome of one [`IdleSession::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleWait {
    /// The server reported activity; events were emitted.
    Activity,
    /// The wait elapsed quietly.
    Timeout,
    /// Another task wants the connection; drop or `done()` the session.
    Interrupted,
}

/// An in-progress IDLE owned by one task.
///
/// Dropping the session without [`IdleSession::done`] is safe: the next
/// command's precheck performs the DONE handshake.
pub struct IdleSession<S> {
    guard: OwnedMutexGuard<ImapConnection<S>>,
    interrupt: Arc<Notify>,
}

impl<S> IdleSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Waits for server activity, an interruption from another task, or the
    /// timeout, whichever comes first.
    pub async fn wait(&mut self, duration: Duration) -> Result<IdleWait> {
        tokio::select! {
            () = self.interrupt.notified() => Ok(IdleWait::Interrupted),
            outcome = self.guard.idle_wait(duration) => Ok(match outcome? {
                IdleOutcome::Activity => IdleWait::Activity,
                IdleOutcome::Timeout => IdleWait::Timeout,
            }),
        }
    }

    /// Ends the IDLE with the DONE handshake and releases the connection.
    pub async fn done(mut self) -> Result<()> {
        self.guard.idle_done().await
    }
}

/// Plaintext connect + STARTTLS upgrade, done before the engine takes over.
///
/// The pre-TLS exchange is two fixed lines; a throwaway tag keeps it apart
/// from the engine's `A<n>` tags.
async fn starttls_bootstrap(host: &str, port: u16, timeout: Duration) -> Result<ImapStream> {
    let exchange = async {
        let mut stream = connect_plain(host, port).await?;

        let greeting = read_crlf_line(&mut stream).await?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(Error::Protocol(format!(
                "unexpected pre-TLS greeting: {greeting}"
            )));
        }

        stream.write_all(b"T0 STARTTLS\r\n").await?;
        loop {
            let line = read_crlf_line(&mut stream).await?;
            if line.starts_with("T0 OK") {
                break;
            }
            if line.starts_with("T0 ") {
                return Err(Error::Protocol(format!("STARTTLS refused: {line}")));
            }
        }
        stream.upgrade_to_tls(host).await
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

async fn read_crlf_line<S: AsyncRead + Unpin>(stream: &mut S) -> Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(Error::NoConnection("connection closed".to_string()));
        }
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            return Ok(String::from_utf8_lossy(&line).trim_end().to_string());
        }
        if line.len() > 4096 {
            return Err(Error::Protocol("pre-TLS line too long".to_string()));
        }
    }
}
