//! Bracket response codes.

use super::Flags;

/// Response code carried in the `[...]` bracket of an OK/NO/BAD reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: message that must be surfaced to the user.
    Alert,
    /// CAPABILITY list embedded in the response.
    Capability(Vec<String>),
    /// PERMANENTFLAGS: flags that can be changed permanently.
    PermanentFlags(Flags),
    /// READ-ONLY: mailbox selected read-only.
    ReadOnly,
    /// READ-WRITE: mailbox selected read-write.
    ReadWrite,
    /// TRYCREATE: target mailbox doesn't exist but could be created.
    TryCreate,
    /// UIDNEXT: next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY value.
    UidValidity(u64),
    /// UNSEEN: first unseen message sequence number.
    Unseen(u32),
    /// APPENDUID: UIDVALIDITY and UIDs assigned by APPEND (RFC 4315).
    AppendUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u64,
        /// Assigned UIDs (one per appended message).
        uids: Vec<u32>,
    },
    /// COPYUID: UIDVALIDITY plus source and destination UID sets (RFC 4315).
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u64,
        /// Source UIDs, expanded, in wire order.
        source: Vec<u32>,
        /// Destination UIDs, expanded, in wire order.
        destination: Vec<u32>,
    },
    /// HIGHESTMODSEQ value (RFC 7162).
    HighestModSeq(u64),
    /// NOMODSEQ: mailbox does not support mod-sequences.
    NoModSeq,
    /// MAILBOXID from OBJECTID (RFC 8474).
    MailboxId(String),
    /// APPENDLIMIT for the mailbox (RFC 7889).
    AppendLimit(u64),
    /// ALREADYEXISTS: mailbox exists (benign for CREATE).
    AlreadyExists,
    /// NONEXISTENT: mailbox does not exist.
    NonExistent,
    /// NOPERM: access denied.
    NoPerm,
    /// INUSE: mailbox is in use by another session.
    InUse,
    /// LIMIT: an administrative limit was hit.
    Limit,
    /// OVERQUOTA: quota exceeded.
    OverQuota,
    /// Anything else, kept as the raw uppercased token.
    Unknown(String),
}
