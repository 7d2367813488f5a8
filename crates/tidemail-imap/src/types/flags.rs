//! Message flags.

use crate::{Error, Result};

/// A message flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent. Server-managed; never settable by clients.
    Recent,
    /// The `\*` marker in PERMANENTFLAGS: custom keywords are allowed.
    Wildcard,
    /// Custom keyword flag.
    Keyword(String),
}

impl Flag {
    /// Parses a flag token, canonicalizing the system flags.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            "\\*" => Self::Wildcard,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the canonical wire form (title-cased system flags).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Wildcard => "\\*",
            Self::Keyword(s) => s,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered, duplicate-free collection of flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag set from a vector, dropping duplicates.
    #[must_use]
    pub fn from_vec(flags: Vec<Flag>) -> Self {
        let mut set = Self::new();
        for flag in flags {
            set.insert(flag);
        }
        set
    }

    /// Parses a list of raw flag tokens.
    #[must_use]
    pub fn parse<'a, I: IntoIterator<Item = &'a str>>(tokens: I) -> Self {
        Self::from_vec(tokens.into_iter().map(Flag::parse).collect())
    }

    /// Adds a flag if not already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: &Flag) {
        self.flags.retain(|f| f != flag);
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Returns an iterator over the flags.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

/// Normalizes caller-supplied flags for STORE/APPEND.
///
/// System flags are canonicalized to their title-cased form. `\Recent` is
/// server-managed and rejected outright; `\*` is only meaningful inside
/// PERMANENTFLAGS and rejected as a message flag.
pub fn format_flags<'a, I: IntoIterator<Item = &'a str>>(tokens: I) -> Result<Flags> {
    let mut flags = Flags::new();
    for token in tokens {
        match Flag::parse(token) {
            Flag::Recent => {
                return Err(Error::Programming(
                    "\\Recent is managed by the server and cannot be set".to_string(),
                ));
            }
            Flag::Wildcard => {
                return Err(Error::Programming(
                    "\\* is not a message flag".to_string(),
                ));
            }
            flag => flags.insert(flag),
        }
    }
    Ok(flags)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_canonicalizes_case() {
        assert_eq!(Flag::parse("\\seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\SEEN").as_str(), "\\Seen");
        assert_eq!(Flag::parse("\\DELETED").as_str(), "\\Deleted");
    }

    #[test]
    fn keywords_keep_their_spelling() {
        assert_eq!(Flag::parse("$Forwarded").as_str(), "$Forwarded");
    }

    #[test]
    fn wildcard_round_trips() {
        assert_eq!(Flag::parse("\\*"), Flag::Wildcard);
        assert_eq!(Flag::Wildcard.as_str(), "\\*");
    }

    #[test]
    fn insert_is_duplicate_free() {
        let mut flags = Flags::new();
        flags.insert(Flag::Seen);
        flags.insert(Flag::Seen);
        assert_eq!(flags.len(), 1);
    }

    #[test]
    fn format_flags_rejects_recent() {
        assert!(format_flags(["\\Recent"]).is_err());
        assert!(format_flags(["\\Seen", "\\recent"]).is_err());
    }

    #[test]
    fn format_flags_normalizes() {
        let flags = format_flags(["\\seen", "$Label1", "\\seen"]).unwrap();
        let rendered: Vec<_> = flags.iter().map(Flag::as_str).collect();
        assert_eq!(rendered, ["\\Seen", "$Label1"]);
    }
}
