//! Connection event stream.
//!
//! The untagged router emits events in wire-arrival order onto an unbounded
//! channel. Consumers take the receiver once and observe mailbox changes
//! without polling.

use tokio::sync::mpsc;

use crate::types::{Flags, SelectedMailbox};

/// An event emitted by the connection.
#[derive(Debug, Clone)]
pub enum MailEvent {
    /// A mailbox entered the selected state.
    MailboxOpen(SelectedMailbox),
    /// The selected mailbox was left (CLOSE, reselect or failed SELECT).
    MailboxClose(SelectedMailbox),
    /// The message count changed.
    Exists {
        /// Mailbox path.
        path: String,
        /// New message count.
        count: u32,
        /// Previous message count.
        prev_count: u32,
    },
    /// A message was expunged.
    Expunge {
        /// Mailbox path.
        path: String,
        /// Sequence number, when reported via EXPUNGE.
        seq: Option<u32>,
        /// UID, when reported via VANISHED.
        uid: Option<u32>,
    },
    /// Message flags changed.
    Flags {
        /// Mailbox path.
        path: String,
        /// Sequence number.
        seq: u32,
        /// UID, when included in the FETCH.
        uid: Option<u32>,
        /// The complete new flag set.
        flags: Flags,
        /// Modification sequence, when CONDSTORE is in play.
        modseq: Option<u64>,
    },
    /// The connection closed.
    Close,
    /// A non-fatal error was observed.
    Error(String),
    /// Raw wire traffic (only when `log_raw` is configured).
    Response(String),
}

/// Sending side of the event stream.
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<MailEvent>,
}

impl EventSink {
    /// Creates a sink and its receiving half.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MailEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emits an event. A dropped receiver is not an error; events are then
    /// simply discarded.
    pub fn emit(&self, event: MailEvent) {
        let _ = self.tx.send(event);
    }
}
