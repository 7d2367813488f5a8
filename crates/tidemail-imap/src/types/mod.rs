//! Core IMAP types: flags, capabilities, mailboxes, sequence sets.

mod capability;
mod flags;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capabilities, Capability, Status};
pub use flags::{Flag, Flags, format_flags};
pub use mailbox::{
    FolderEntry, FolderStatus, Namespace, Namespaces, SelectedMailbox, SpecialUse,
    SpecialUseSource, normalize_path,
};
pub use response_code::ResponseCode;
pub use sequence::{expand_sequence, pack_sequence, validate_sequence};
