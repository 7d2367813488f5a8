//! Server capabilities and tagged-response status.

use std::collections::HashMap;

/// Completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// A single advertised server capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// IDLE command support (RFC 2177)
    Idle,
    /// NAMESPACE command support (RFC 2342)
    Namespace,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// MOVE extension (RFC 6851)
    Move,
    /// CONDSTORE (RFC 7162)
    CondStore,
    /// QRESYNC (RFC 7162)
    QResync,
    /// LIST-STATUS (RFC 5819)
    ListStatus,
    /// SPECIAL-USE mailboxes (RFC 6154)
    SpecialUse,
    /// XLIST (pre-RFC 6154 Gmail extension)
    XList,
    /// COMPRESS=DEFLATE (RFC 4978)
    CompressDeflate,
    /// BINARY literals (RFC 3516)
    Binary,
    /// LITERAL+ non-synchronizing literals (RFC 7888)
    LiteralPlus,
    /// ENABLE command (RFC 5161)
    Enable,
    /// UTF8=ACCEPT (RFC 6855)
    Utf8Accept,
    /// APPENDLIMIT, optionally with a global numeric limit (RFC 7889)
    AppendLimit(Option<u64>),
    /// OBJECTID / MAILBOXID (RFC 8474)
    ObjectId,
    /// ID extension (RFC 2971)
    Id,
    /// SASL initial response (RFC 4959)
    SaslIr,
    /// STARTTLS support
    StartTls,
    /// LOGIN disabled
    LoginDisabled,
    /// AUTH mechanism
    Auth(String),
    /// Unknown capability, kept verbatim
    Unknown(String),
}

impl Capability {
    /// Parses a capability token.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IDLE" => Self::Idle,
            "NAMESPACE" => Self::Namespace,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "CONDSTORE" => Self::CondStore,
            "QRESYNC" => Self::QResync,
            "LIST-STATUS" => Self::ListStatus,
            "SPECIAL-USE" => Self::SpecialUse,
            "XLIST" => Self::XList,
            "COMPRESS=DEFLATE" => Self::CompressDeflate,
            "BINARY" => Self::Binary,
            "LITERAL+" => Self::LiteralPlus,
            "ENABLE" => Self::Enable,
            "UTF8=ACCEPT" => Self::Utf8Accept,
            "APPENDLIMIT" => Self::AppendLimit(None),
            "OBJECTID" => Self::ObjectId,
            "ID" => Self::Id,
            "SASL-IR" => Self::SaslIr,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            _ if upper.starts_with("APPENDLIMIT=") => {
                Self::AppendLimit(upper["APPENDLIMIT=".len()..].parse().ok())
            }
            _ if upper.starts_with("AUTH=") => Self::Auth(upper[5..].to_string()),
            _ => Self::Unknown(upper),
        }
    }

    /// Returns the canonical uppercase key this capability is stored under.
    ///
    /// Parameterized capabilities collapse onto their base token, so
    /// `APPENDLIMIT=35651584` is queried as `APPENDLIMIT`.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Imap4Rev1 => "IMAP4REV1".into(),
            Self::Idle => "IDLE".into(),
            Self::Namespace => "NAMESPACE".into(),
            Self::UidPlus => "UIDPLUS".into(),
            Self::Move => "MOVE".into(),
            Self::CondStore => "CONDSTORE".into(),
            Self::QResync => "QRESYNC".into(),
            Self::ListStatus => "LIST-STATUS".into(),
            Self::SpecialUse => "SPECIAL-USE".into(),
            Self::XList => "XLIST".into(),
            Self::CompressDeflate => "COMPRESS=DEFLATE".into(),
            Self::Binary => "BINARY".into(),
            Self::LiteralPlus => "LITERAL+".into(),
            Self::Enable => "ENABLE".into(),
            Self::Utf8Accept => "UTF8=ACCEPT".into(),
            Self::AppendLimit(_) => "APPENDLIMIT".into(),
            Self::ObjectId => "OBJECTID".into(),
            Self::Id => "ID".into(),
            Self::SaslIr => "SASL-IR".into(),
            Self::StartTls => "STARTTLS".into(),
            Self::LoginDisabled => "LOGINDISABLED".into(),
            Self::Auth(mech) => format!("AUTH={mech}"),
            Self::Unknown(s) => s.clone(),
        }
    }
}

/// The advertised capability set, keyed by canonical uppercase token.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    caps: HashMap<String, Capability>,
}

impl Capabilities {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole set from a list of raw tokens.
    pub fn replace<'a, I: IntoIterator<Item = &'a str>>(&mut self, tokens: I) {
        self.caps.clear();
        for token in tokens {
            let cap = Capability::parse(token);
            self.caps.insert(cap.key(), cap);
        }
    }

    /// Returns true if no capabilities have been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// Checks a capability by canonical token, case-insensitively.
    #[must_use]
    pub fn has(&self, token: &str) -> bool {
        self.caps.contains_key(&token.to_uppercase())
    }

    /// Returns the advertised APPENDLIMIT, if a numeric limit was given.
    #[must_use]
    pub fn append_limit(&self) -> Option<u64> {
        match self.caps.get("APPENDLIMIT") {
            Some(Capability::AppendLimit(limit)) => *limit,
            _ => None,
        }
    }

    /// Returns true if the given AUTH mechanism is advertised.
    #[must_use]
    pub fn has_auth(&self, mechanism: &str) -> bool {
        self.caps
            .contains_key(&format!("AUTH={}", mechanism.to_uppercase()))
    }

    /// Iterates over the stored capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.caps.values()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_tokens() {
        assert_eq!(Capability::parse("IDLE"), Capability::Idle);
        assert_eq!(Capability::parse("idle"), Capability::Idle);
        assert_eq!(Capability::parse("Qresync"), Capability::QResync);
        assert_eq!(Capability::parse("LITERAL+"), Capability::LiteralPlus);
        assert_eq!(
            Capability::parse("COMPRESS=DEFLATE"),
            Capability::CompressDeflate
        );
    }

    #[test]
    fn parse_appendlimit_value() {
        assert_eq!(
            Capability::parse("APPENDLIMIT=35651584"),
            Capability::AppendLimit(Some(35_651_584))
        );
        assert_eq!(Capability::parse("APPENDLIMIT"), Capability::AppendLimit(None));
    }

    #[test]
    fn parse_auth_mechanism() {
        assert_eq!(
            Capability::parse("AUTH=xoauth2"),
            Capability::Auth("XOAUTH2".to_string())
        );
    }

    #[test]
    fn set_queries_are_case_insensitive() {
        let mut caps = Capabilities::new();
        caps.replace(["IMAP4rev1", "IDLE", "APPENDLIMIT=1024", "AUTH=PLAIN"]);

        assert!(caps.has("idle"));
        assert!(caps.has("IMAP4REV1"));
        assert!(!caps.has("MOVE"));
        assert_eq!(caps.append_limit(), Some(1024));
        assert!(caps.has_auth("plain"));
        assert!(!caps.has_auth("XOAUTH2"));
    }

    #[test]
    fn replace_clears_previous_set() {
        let mut caps = Capabilities::new();
        caps.replace(["IDLE"]);
        caps.replace(["MOVE"]);
        assert!(!caps.has("IDLE"));
        assert!(caps.has("MOVE"));
    }
}
