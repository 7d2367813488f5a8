//! Mailbox state, folder cache entries and namespaces.

use super::{Flag, Flags};

/// Special-use role of a mailbox (RFC 6154, XLIST).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialUse {
    /// The INBOX itself (XLIST `\Inbox`).
    Inbox,
    /// Virtual mailbox of flagged messages.
    Flagged,
    /// Sent messages.
    Sent,
    /// Draft messages.
    Drafts,
    /// Virtual mailbox of all messages.
    All,
    /// Archived messages.
    Archive,
    /// Junk/spam messages.
    Junk,
    /// Deleted messages.
    Trash,
}

impl SpecialUse {
    /// Parses a special-use attribute token.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "\\INBOX" => Some(Self::Inbox),
            "\\FLAGGED" => Some(Self::Flagged),
            "\\SENT" => Some(Self::Sent),
            "\\DRAFTS" => Some(Self::Drafts),
            "\\ALL" => Some(Self::All),
            "\\ARCHIVE" => Some(Self::Archive),
            "\\JUNK" | "\\SPAM" => Some(Self::Junk),
            "\\TRASH" => Some(Self::Trash),
            _ => None,
        }
    }

    /// Returns the canonical attribute form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "\\Inbox",
            Self::Flagged => "\\Flagged",
            Self::Sent => "\\Sent",
            Self::Drafts => "\\Drafts",
            Self::All => "\\All",
            Self::Archive => "\\Archive",
            Self::Junk => "\\Junk",
            Self::Trash => "\\Trash",
        }
    }

    /// Ordering rank used when sorting listed folders.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Inbox => 0,
            Self::Flagged => 1,
            Self::Sent => 2,
            Self::Drafts => 3,
            Self::All => 4,
            Self::Archive => 5,
            Self::Junk => 6,
            Self::Trash => 7,
        }
    }
}

/// Where a special-use assignment came from. Lower rank wins conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpecialUseSource {
    /// Caller-supplied hint.
    User,
    /// Server attribute (SPECIAL-USE or XLIST).
    Extension,
    /// Localized-name heuristic.
    Name,
}

/// STATUS values attached to a folder entry (STATUS or LIST-STATUS).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderStatus {
    /// Number of messages.
    pub messages: Option<u32>,
    /// Number of recent messages.
    pub recent: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u64>,
    /// Number of unseen messages.
    pub unseen: Option<u32>,
    /// Highest mod-sequence (CONDSTORE).
    pub highest_modseq: Option<u64>,
}

/// A folder known from LIST/LSUB, cached for the connection's lifetime.
#[derive(Debug, Clone, Default)]
pub struct FolderEntry {
    /// Normalized path.
    pub path: String,
    /// Path exactly as the server listed it (wire form, before decoding).
    pub path_as_listed: String,
    /// Parent path segments (everything but the leaf).
    pub parent: Vec<String>,
    /// Leaf name.
    pub name: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// True when the entry came from LIST (not only LSUB).
    pub listed: bool,
    /// True when the entry is subscribed.
    pub subscribed: bool,
    /// Raw mailbox attributes (`\HasChildren`, `\Noselect`, ...).
    pub attributes: Vec<String>,
    /// Resolved special-use role.
    pub special_use: Option<SpecialUse>,
    /// Where the special-use role came from.
    pub special_use_source: Option<SpecialUseSource>,
    /// STATUS block, when requested via LIST-STATUS or STATUS.
    pub status: Option<FolderStatus>,
}

impl FolderEntry {
    /// Checks a mailbox attribute case-insensitively.
    #[must_use]
    pub fn has_attribute(&self, attr: &str) -> bool {
        self.attributes.iter().any(|a| a.eq_ignore_ascii_case(attr))
    }
}

/// The currently selected mailbox.
#[derive(Debug, Clone, Default)]
pub struct SelectedMailbox {
    /// Normalized path.
    pub path: String,
    /// Hierarchy delimiter, from the folder cache.
    pub delimiter: Option<char>,
    /// Special-use role, from the folder cache.
    pub special_use: Option<SpecialUse>,
    /// True when opened via EXAMINE or `READ-ONLY` was announced.
    pub read_only: bool,
    /// Flags defined in the mailbox.
    pub flags: Flags,
    /// Flags that can be changed permanently; may contain `\*`.
    pub permanent_flags: Flags,
    /// Most recently reported message count.
    pub exists: u32,
    /// Predicted next UID. Monotonic while `uid_validity` is stable.
    pub uid_next: u32,
    /// UIDVALIDITY. A change invalidates every cached UID.
    pub uid_validity: u64,
    /// Highest observed mod-sequence. Monotonic while `uid_validity` is stable.
    pub highest_modseq: Option<u64>,
    /// True when the server announced NOMODSEQ for this mailbox.
    pub no_modseq: bool,
    /// OBJECTID mailbox identifier, when advertised.
    pub mailbox_id: Option<String>,
}

impl SelectedMailbox {
    /// Records an untagged EXISTS. Returns the previous count when it changed.
    pub fn observe_exists(&mut self, count: u32) -> Option<u32> {
        if count == self.exists {
            return None;
        }
        let prev = self.exists;
        self.exists = count;
        Some(prev)
    }

    /// Records an observed message UID, bumping `uid_next` when necessary.
    pub fn observe_uid(&mut self, uid: u32) {
        if uid >= self.uid_next {
            self.uid_next = uid + 1;
        }
    }

    /// Advances `highest_modseq`, which never moves backwards.
    pub fn advance_modseq(&mut self, modseq: u64) {
        if self.highest_modseq.is_none_or(|current| modseq > current) {
            self.highest_modseq = Some(modseq);
        }
    }

    /// Returns true when the given flag may be stored permanently.
    ///
    /// Follows PERMANENTFLAGS semantics: an empty announcement means
    /// everything is allowed, `\*` allows arbitrary keywords.
    #[must_use]
    pub fn can_use_flag(&self, flag: &Flag) -> bool {
        self.permanent_flags.is_empty()
            || self.permanent_flags.contains(&Flag::Wildcard)
            || self.permanent_flags.contains(flag)
    }

    /// Expands a sequence set against this mailbox: `*` becomes the message
    /// count for sequence-number sets and the highest assigned UID for UID
    /// sets.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Programming`] for an empty or malformed set.
    pub fn expand_range(&self, set: &str, uid: bool) -> crate::Result<Vec<u32>> {
        let star = if uid {
            self.uid_next.saturating_sub(1)
        } else {
            self.exists
        };
        super::expand_sequence(set, star)
    }
}

/// A single namespace prefix (RFC 2342).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Mailbox name prefix.
    pub prefix: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
}

/// The namespace groups reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    /// Personal namespaces. The first entry always exists.
    pub personal: Vec<Namespace>,
    /// Namespaces for other users.
    pub other: Vec<Namespace>,
    /// Shared namespaces.
    pub shared: Vec<Namespace>,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            personal: vec![Namespace {
                prefix: String::new(),
                delimiter: Some('.'),
            }],
            other: Vec::new(),
            shared: Vec::new(),
        }
    }
}

impl Namespaces {
    /// Returns the primary personal namespace.
    #[must_use]
    pub fn primary(&self) -> &Namespace {
        // Construction guarantees at least one personal entry.
        &self.personal[0]
    }
}

/// Normalizes a mailbox path.
///
/// The INBOX root is case-insensitive per RFC 3501; `inbox/Sub` and
/// `INBOX/Sub` are the same mailbox. Everything below the root keeps its
/// case.
#[must_use]
pub fn normalize_path(path: &str, delimiter: Option<char>) -> String {
    if path.eq_ignore_ascii_case("INBOX") {
        return "INBOX".to_string();
    }
    if let Some(delim) = delimiter {
        let root_len = "INBOX".len();
        if let Some(root) = path.get(..root_len)
            && root.eq_ignore_ascii_case("INBOX")
            && path[root_len..].starts_with(delim)
        {
            return format!("INBOX{}", &path[root_len..]);
        }
    }
    path.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod selected_mailbox_tests {
        use super::*;

        #[test]
        fn observe_exists_reports_previous_on_change() {
            let mut mailbox = SelectedMailbox {
                exists: 3,
                ..Default::default()
            };
            assert_eq!(mailbox.observe_exists(3), None);
            assert_eq!(mailbox.observe_exists(5), Some(3));
            assert_eq!(mailbox.exists, 5);
        }

        #[test]
        fn observe_uid_bumps_uid_next() {
            let mut mailbox = SelectedMailbox {
                uid_next: 10,
                ..Default::default()
            };
            mailbox.observe_uid(5);
            assert_eq!(mailbox.uid_next, 10);
            mailbox.observe_uid(10);
            assert_eq!(mailbox.uid_next, 11);
            mailbox.observe_uid(42);
            assert_eq!(mailbox.uid_next, 43);
        }

        #[test]
        fn modseq_never_regresses() {
            let mut mailbox = SelectedMailbox::default();
            mailbox.advance_modseq(100);
            mailbox.advance_modseq(50);
            assert_eq!(mailbox.highest_modseq, Some(100));
            mailbox.advance_modseq(122);
            assert_eq!(mailbox.highest_modseq, Some(122));
        }

        #[test]
        fn expand_range_substitutes_star() {
            let mailbox = SelectedMailbox {
                exists: 5,
                uid_next: 101,
                ..Default::default()
            };
            assert_eq!(mailbox.expand_range("3:*", false).unwrap(), vec![3, 4, 5]);
            assert_eq!(mailbox.expand_range("99:*", true).unwrap(), vec![99, 100]);
            assert!(mailbox.expand_range("", false).is_err());
        }

        #[test]
        fn can_use_flag_follows_permanent_flags() {
            let mut mailbox = SelectedMailbox::default();
            // No announcement: everything allowed.
            assert!(mailbox.can_use_flag(&Flag::Seen));

            mailbox.permanent_flags = Flags::from_vec(vec![Flag::Seen, Flag::Deleted]);
            assert!(mailbox.can_use_flag(&Flag::Seen));
            assert!(!mailbox.can_use_flag(&Flag::Keyword("$Custom".into())));

            mailbox.permanent_flags.insert(Flag::Wildcard);
            assert!(mailbox.can_use_flag(&Flag::Keyword("$Custom".into())));
        }
    }

    mod path_tests {
        use super::*;

        #[test]
        fn inbox_root_is_case_insensitive() {
            assert_eq!(normalize_path("inbox", None), "INBOX");
            assert_eq!(normalize_path("Inbox", Some('/')), "INBOX");
            assert_eq!(normalize_path("inbox/Sent", Some('/')), "INBOX/Sent");
        }

        #[test]
        fn non_inbox_paths_keep_case() {
            assert_eq!(normalize_path("Archive", Some('/')), "Archive");
            assert_eq!(normalize_path("Inboxes", Some('/')), "Inboxes");
        }
    }

    mod namespace_tests {
        use super::*;

        #[test]
        fn default_has_primary_personal() {
            let ns = Namespaces::default();
            assert_eq!(ns.primary().prefix, "");
            assert_eq!(ns.primary().delimiter, Some('.'));
        }
    }

    mod special_use_tests {
        use super::*;

        #[test]
        fn parse_known_roles() {
            assert_eq!(SpecialUse::parse("\\Sent"), Some(SpecialUse::Sent));
            assert_eq!(SpecialUse::parse("\\SPAM"), Some(SpecialUse::Junk));
            assert_eq!(SpecialUse::parse("\\HasChildren"), None);
        }

        #[test]
        fn source_priority_is_user_first() {
            assert!(SpecialUseSource::User < SpecialUseSource::Extension);
            assert!(SpecialUseSource::Extension < SpecialUseSource::Name);
        }
    }
}
