//! # tidemail-imap
//!
//! An async IMAP4rev1 client engine (RFC 3501) with first-class support for
//! the extensions modern servers actually ship: UIDPLUS, CONDSTORE/QRESYNC,
//! LIST-STATUS, SPECIAL-USE, NAMESPACE, IDLE, COMPRESS=DEFLATE, BINARY,
//! LITERAL+, ENABLE, UTF8=ACCEPT, APPENDLIMIT, MOVE, OBJECTID and ID.
//!
//! ## Architecture
//!
//! - [`codec`]: sans-I/O wire grammar — argument-tree encoding, response
//!   parsing, modified UTF-7 and date-time handling
//! - [`connection`]: the stateful engine — framing with literal splicing,
//!   the single-writer command exchange, the untagged-response router, the
//!   event stream, IDLE and COMPRESS
//! - [`commands`]: one procedure per IMAP command, from LIST's special-use
//!   resolution to APPEND's UIDPLUS bookkeeping
//! - [`ImapClient`]: a cloneable handle multiplexing tasks onto one
//!   connection, with a FIFO mailbox lock
//!
//! ## Quick start
//!
//! ```ignore
//! use tidemail_imap::{ImapClient, ImapConfig, ListOptions, SelectOptions};
//!
//! #[tokio::main]
//! async fn main() -> tidemail_imap::Result<()> {
//!     let config = ImapConfig::builder("imap.example.com")
//!         .credentials("user@example.com", "password")
//!         .build();
//!     let client = ImapClient::connect(config).await?;
//!     let mut events = client.events().expect("first take");
//!     client.login().await?;
//!
//!     for folder in client.list("", "*", ListOptions::default()).await? {
//!         println!("{} {:?}", folder.path, folder.special_use);
//!     }
//!
//!     let lock = client.mailbox_lock("INBOX", SelectOptions::default()).await?;
//!     // ... fetch, store, expunge while INBOX stays selected ...
//!     drop(lock);
//!
//!     let mut idle = client.idle().await?;
//!     idle.wait(std::time::Duration::from_secs(300)).await?;
//!     idle.done().await?;
//!
//!     while let Ok(event) = events.try_recv() {
//!         println!("{event:?}");
//!     }
//!     client.logout().await
//! }
//! ```
//!
//! ## Concurrency model
//!
//! One connection is driven by one logical task at a time: commands
//! complete in FIFO order, untagged responses received during a command are
//! routed to the global state *and* the command's collectors in arrival
//! order, and responses arriving between commands are drained before the
//! next tag is written. Multiple tasks share a connection through
//! [`ImapClient`]; "keep this mailbox selected across several operations"
//! is expressed with [`ImapClient::mailbox_lock`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

mod client;
pub mod codec;
pub mod commands;
pub mod connection;
mod error;
pub mod types;

pub use client::{IdleSession, IdleWait, ImapClient, MailboxLockGuard};
pub use commands::{
    AppendOptions, AppendResult, CopyOptions, CopyResult, CreateResult, ExpungeOptions, FetchItem,
    FetchOptions, FetchedMessage, ListOptions, SearchOptions, SelectOptions, SelectResult,
    StatusQuery, StoreAction, StoreOptions,
};
pub use connection::{
    ConnectionState, Credentials, ImapConfig, ImapConfigBuilder, ImapConnection, ImapStream,
    MailEvent, Security, SpecialUseHints,
};
pub use error::{Error, Result};
pub use types::{
    Capabilities, Capability, Flag, Flags, FolderEntry, FolderStatus, Namespace, Namespaces,
    ResponseCode, SelectedMailbox, SpecialUse, SpecialUseSource, Status,
};
