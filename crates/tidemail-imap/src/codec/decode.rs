//! Response parsing: wire bytes to a typed response tree.
//!
//! The parser consumes one logical line at a time (CRLF-terminated, with
//! literals already spliced in by the framing layer) and produces either a
//! tagged completion, an untagged response or a continuation request.
//!
//! Attribute values form a generic tree of typed leaves; command procedures
//! and the untagged router interpret the trees they care about. Numbers that
//! do not fit `u64` fall back to atoms.

use crate::types::{Flags, ResponseCode, Status, expand_sequence};
use crate::{Error, Result};

/// A typed leaf or nested list of a parsed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Bare token (includes flags, sequence sets and `BODY[...]` items).
    Atom(String),
    /// Quoted string.
    QuotedString(String),
    /// Literal bytes.
    Literal(Vec<u8>),
    /// Unsigned number.
    Number(u64),
    /// NIL.
    Nil,
    /// Parenthesized list.
    List(Vec<Value>),
}

impl Value {
    /// Returns the textual content of an atom, quoted string or UTF-8
    /// literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Atom(s) | Self::QuotedString(s) => Some(s),
            Self::Literal(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Returns the numeric content, accepting digit-only atoms/strings.
    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Atom(s) | Self::QuotedString(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns the children of a list value.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// A tagged command completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    /// The command's tag.
    pub tag: String,
    /// Completion status.
    pub status: Status,
    /// Bracket response code, if present.
    pub code: Option<ResponseCode>,
    /// Human-readable trailing text.
    pub text: String,
}

/// A server-initiated untagged response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntaggedResponse {
    /// Response name, uppercased (`EXISTS`, `FETCH`, `LIST`, `OK`, ...).
    pub name: String,
    /// Leading message number for `<n> EXISTS/RECENT/EXPUNGE/FETCH`.
    pub number: Option<u32>,
    /// Attribute tree following the name.
    pub attributes: Vec<Value>,
    /// Bracket response code (status responses only).
    pub code: Option<ResponseCode>,
    /// Trailing text (status responses only).
    pub text: String,
}

/// One parsed logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    /// Tagged completion.
    Tagged(TaggedResponse),
    /// Untagged response.
    Untagged(UntaggedResponse),
    /// `+` continuation request.
    Continuation {
        /// Text after the `+`.
        text: String,
    },
}

/// Parses one logical line (CRLF included or not, literals spliced).
///
/// # Errors
///
/// Returns [`Error::Protocol`] on malformed framing; the connection treats
/// that as fatal.
pub fn parse_line(line: &[u8]) -> Result<ResponseLine> {
    let mut parser = Parser::new(line);
    parser.parse()
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        let input = match input {
            [head @ .., b'\r', b'\n'] => head,
            [head @ .., b'\n'] => head,
            _ => input,
        };
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> Result<ResponseLine> {
        match self.peek() {
            Some(b'+') => {
                self.pos += 1;
                self.skip_space();
                Ok(ResponseLine::Continuation {
                    text: self.rest_as_text(),
                })
            }
            Some(b'*') => {
                self.pos += 1;
                self.expect_space()?;
                self.parse_untagged()
            }
            Some(_) => self.parse_tagged(),
            None => Err(self.error("empty response line")),
        }
    }

    fn parse_tagged(&mut self) -> Result<ResponseLine> {
        let tag = self.read_token()?;
        self.expect_space()?;
        let status_token = self.read_token()?;
        let status = parse_status(&status_token)
            .ok_or_else(|| self.error(&format!("unknown status: {status_token}")))?;
        self.skip_space();
        let (code, text) = self.parse_resp_text()?;
        Ok(ResponseLine::Tagged(TaggedResponse {
            tag,
            status,
            code,
            text,
        }))
    }

    fn parse_untagged(&mut self) -> Result<ResponseLine> {
        // `<n> EXISTS` style: a leading number followed by the name.
        let mut number = None;
        let checkpoint = self.pos;
        let first = self.read_token()?;
        let name = if first.bytes().all(|b| b.is_ascii_digit()) && !first.is_empty() {
            match first.parse::<u32>() {
                Ok(n) => {
                    number = Some(n);
                    self.expect_space()?;
                    self.read_token()?.to_uppercase()
                }
                Err(_) => {
                    self.pos = checkpoint;
                    self.read_token()?.to_uppercase()
                }
            }
        } else {
            first.to_uppercase()
        };

        match name.as_str() {
            "OK" | "NO" | "BAD" | "BYE" | "PREAUTH" => {
                self.skip_space();
                let (code, text) = self.parse_resp_text()?;
                Ok(ResponseLine::Untagged(UntaggedResponse {
                    name,
                    number,
                    attributes: Vec::new(),
                    code,
                    text,
                }))
            }
            _ => {
                let mut attributes = Vec::new();
                while self.peek().is_some() {
                    self.skip_space();
                    if self.peek().is_none() {
                        break;
                    }
                    attributes.push(self.parse_value()?);
                }
                Ok(ResponseLine::Untagged(UntaggedResponse {
                    name,
                    number,
                    attributes,
                    code: None,
                    text: String::new(),
                }))
            }
        }
    }

    /// Parses `["[" resp-text-code "]" SP] text`.
    fn parse_resp_text(&mut self) -> Result<(Option<ResponseCode>, String)> {
        let code = if self.peek() == Some(b'[') {
            self.pos += 1;
            let mut section = Vec::new();
            loop {
                self.skip_space();
                match self.peek() {
                    Some(b']') => {
                        self.pos += 1;
                        break;
                    }
                    Some(_) => section.push(self.parse_value()?),
                    None => return Err(self.error("unterminated response code")),
                }
            }
            self.skip_space();
            Some(response_code_from_section(&section))
        } else {
            None
        };
        Ok((code, self.rest_as_text()))
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_space();
                    match self.peek() {
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(Value::List(items));
                        }
                        Some(_) => items.push(self.parse_value()?),
                        None => return Err(self.error("unterminated list")),
                    }
                }
            }
            Some(b'"') => self.parse_quoted(),
            Some(b'{') => self.parse_literal(),
            Some(_) => {
                let token = self.read_token()?;
                if token.eq_ignore_ascii_case("NIL") {
                    Ok(Value::Nil)
                } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
                    // Numbers too large for u64 stay textual; consumers
                    // up-convert as needed.
                    Ok(token
                        .parse::<u64>()
                        .map_or_else(|_| Value::Atom(token.clone()), Value::Number))
                } else {
                    Ok(Value::Atom(token))
                }
            }
            None => Err(self.error("expected value")),
        }
    }

    fn parse_quoted(&mut self) -> Result<Value> {
        self.pos += 1; // opening quote
        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.error(&format!("invalid escape: \\{}", c as char))),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quoted string")),
            }
        }
        let s = String::from_utf8(out).map_err(|_| self.error("invalid UTF-8 in quoted string"))?;
        Ok(Value::QuotedString(s))
    }

    fn parse_literal(&mut self) -> Result<Value> {
        self.pos += 1; // '{'
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let size: usize = std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid literal size"))?;
        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("expected } after literal size"));
        }
        // On the wire the announcement ends the physical line; the framing
        // layer splices the literal bytes right behind that CRLF.
        if self.input[self.pos..].starts_with(b"\r\n") {
            self.pos += 2;
        }
        if self.pos + size > self.input.len() {
            return Err(self.error("truncated literal"));
        }
        let data = self.input[self.pos..self.pos + size].to_vec();
        self.pos += size;
        Ok(Value::Literal(data))
    }

    /// Reads a bare token. `BODY[...]` style items keep their bracketed
    /// section (and `<origin>` suffix) as part of the token.
    fn read_token(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_token_char) {
            self.pos += 1;
        }
        if self.peek() == Some(b'[') {
            while let Some(b) = self.advance() {
                if b == b']' {
                    break;
                }
            }
            if self.peek() == Some(b'<') {
                while let Some(b) = self.advance() {
                    if b == b'>' {
                        break;
                    }
                }
            }
        }
        if self.pos == start {
            return Err(self.error("expected token"));
        }
        String::from_utf8(self.input[start..self.pos].to_vec())
            .map_err(|_| self.error("invalid UTF-8 in token"))
    }

    fn rest_as_text(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.input[self.pos..]).into_owned();
        self.pos = self.input.len();
        text
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_space(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn expect_space(&mut self) -> Result<()> {
        if self.advance() == Some(b' ') {
            Ok(())
        } else {
            Err(self.error("expected space"))
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::Protocol(format!("parse error at byte {}: {message}", self.pos))
    }
}

fn parse_status(token: &str) -> Option<Status> {
    match token.to_uppercase().as_str() {
        "OK" => Some(Status::Ok),
        "NO" => Some(Status::No),
        "BAD" => Some(Status::Bad),
        "PREAUTH" => Some(Status::PreAuth),
        "BYE" => Some(Status::Bye),
        _ => None,
    }
}

/// Token characters: the RFC atom set, widened to keep flags (`\Seen`),
/// sequence sets (`1:*,5`) and `*` itself as single tokens.
const fn is_token_char(b: u8) -> bool {
    !matches!(
        b,
        b' ' | b'(' | b')' | b'{' | b'"' | b'[' | b']' | b'<' | b'\r' | b'\n'
    ) && b > 0x1f
        && b < 0x7f
}

/// Maps a parsed bracket section to a typed [`ResponseCode`].
#[must_use]
pub fn response_code_from_section(section: &[Value]) -> ResponseCode {
    let Some(name) = section.first().and_then(Value::as_str) else {
        return ResponseCode::Unknown(String::new());
    };
    let name = name.to_uppercase();
    let arg = section.get(1);

    match name.as_str() {
        "ALERT" => ResponseCode::Alert,
        "CAPABILITY" => ResponseCode::Capability(
            section[1..]
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        "PERMANENTFLAGS" => ResponseCode::PermanentFlags(
            arg.and_then(Value::as_list)
                .map(|items| Flags::parse(items.iter().filter_map(Value::as_str)))
                .unwrap_or_default(),
        ),
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNEXT" => arg
            .and_then(Value::as_number)
            .and_then(|n| u32::try_from(n).ok())
            .map_or_else(unknown(&name), ResponseCode::UidNext),
        "UIDVALIDITY" => arg
            .and_then(Value::as_number)
            .map_or_else(unknown(&name), ResponseCode::UidValidity),
        "UNSEEN" => arg
            .and_then(Value::as_number)
            .and_then(|n| u32::try_from(n).ok())
            .map_or_else(unknown(&name), ResponseCode::Unseen),
        "HIGHESTMODSEQ" => arg
            .and_then(Value::as_number)
            .map_or_else(unknown(&name), ResponseCode::HighestModSeq),
        "NOMODSEQ" => ResponseCode::NoModSeq,
        "APPENDUID" => {
            let uid_validity = arg.and_then(Value::as_number);
            let uids = section
                .get(2)
                .and_then(uid_set)
                .and_then(|set| expand_sequence(&set, 0).ok());
            match (uid_validity, uids) {
                (Some(uid_validity), Some(uids)) => ResponseCode::AppendUid { uid_validity, uids },
                _ => ResponseCode::Unknown(name),
            }
        }
        "COPYUID" => {
            let uid_validity = arg.and_then(Value::as_number);
            let source = section
                .get(2)
                .and_then(uid_set)
                .and_then(|set| expand_sequence(&set, 0).ok());
            let destination = section
                .get(3)
                .and_then(uid_set)
                .and_then(|set| expand_sequence(&set, 0).ok());
            match (uid_validity, source, destination) {
                (Some(uid_validity), Some(source), Some(destination)) => ResponseCode::CopyUid {
                    uid_validity,
                    source,
                    destination,
                },
                _ => ResponseCode::Unknown(name),
            }
        }
        "MAILBOXID" => {
            // RFC 8474 wraps the objectid in parentheses.
            let id = arg.and_then(|v| {
                v.as_list()
                    .and_then(|items| items.first().and_then(Value::as_str))
                    .or_else(|| v.as_str())
            });
            id.map_or_else(unknown(&name), |id| ResponseCode::MailboxId(id.to_string()))
        }
        "APPENDLIMIT" => arg
            .and_then(Value::as_number)
            .map_or_else(unknown(&name), ResponseCode::AppendLimit),
        "ALREADYEXISTS" => ResponseCode::AlreadyExists,
        "NONEXISTENT" => ResponseCode::NonExistent,
        "NOPERM" => ResponseCode::NoPerm,
        "INUSE" => ResponseCode::InUse,
        "LIMIT" => ResponseCode::Limit,
        "OVERQUOTA" => ResponseCode::OverQuota,
        _ => ResponseCode::Unknown(name),
    }
}

/// UID sets in response codes lex as numbers when single-valued.
fn uid_set(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        other => other.as_str().map(str::to_string),
    }
}

fn unknown(name: &str) -> impl FnOnce() -> ResponseCode {
    let name = name.to_string();
    move || ResponseCode::Unknown(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn untagged(line: &[u8]) -> UntaggedResponse {
        match parse_line(line).unwrap() {
            ResponseLine::Untagged(u) => u,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    fn tagged(line: &[u8]) -> TaggedResponse {
        match parse_line(line).unwrap() {
            ResponseLine::Tagged(t) => t,
            other => panic!("expected tagged, got {other:?}"),
        }
    }

    #[test]
    fn parses_continuation() {
        let line = parse_line(b"+ Ready for literal data\r\n").unwrap();
        assert_eq!(
            line,
            ResponseLine::Continuation {
                text: "Ready for literal data".to_string()
            }
        );
    }

    #[test]
    fn parses_tagged_ok_with_code() {
        let t = tagged(b"A003 OK [APPENDUID 14 42] APPEND completed\r\n");
        assert_eq!(t.tag, "A003");
        assert_eq!(t.status, Status::Ok);
        assert_eq!(
            t.code,
            Some(ResponseCode::AppendUid {
                uid_validity: 14,
                uids: vec![42]
            })
        );
        assert_eq!(t.text, "APPEND completed");
    }

    #[test]
    fn parses_tagged_no() {
        let t = tagged(b"A4 NO Mailbox does not exist\r\n");
        assert_eq!(t.status, Status::No);
        assert!(t.code.is_none());
        assert_eq!(t.text, "Mailbox does not exist");
    }

    #[test]
    fn parses_numeric_untagged() {
        let u = untagged(b"* 23 EXISTS\r\n");
        assert_eq!(u.name, "EXISTS");
        assert_eq!(u.number, Some(23));

        let u = untagged(b"* 5 EXPUNGE\r\n");
        assert_eq!(u.name, "EXPUNGE");
        assert_eq!(u.number, Some(5));
    }

    #[test]
    fn parses_fetch_with_nested_list() {
        let u = untagged(b"* 12 FETCH (FLAGS (\\Seen \\Answered) UID 4827 MODSEQ (12121))\r\n");
        assert_eq!(u.name, "FETCH");
        assert_eq!(u.number, Some(12));
        let list = u.attributes[0].as_list().unwrap();
        assert_eq!(list[0], Value::Atom("FLAGS".to_string()));
        assert_eq!(
            list[1],
            Value::List(vec![
                Value::Atom("\\Seen".to_string()),
                Value::Atom("\\Answered".to_string())
            ])
        );
        assert_eq!(list[2], Value::Atom("UID".to_string()));
        assert_eq!(list[3], Value::Number(4827));
    }

    #[test]
    fn parses_fetch_body_section_with_literal() {
        let u = untagged(b"* 1 FETCH (BODY[TEXT] {5}\r\nhello)\r\n");
        let list = u.attributes[0].as_list().unwrap();
        assert_eq!(list[0], Value::Atom("BODY[TEXT]".to_string()));
        assert_eq!(list[1], Value::Literal(b"hello".to_vec()));
    }

    #[test]
    fn parses_list_response() {
        let u = untagged(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"INBOX/Sent\"\r\n");
        assert_eq!(u.name, "LIST");
        assert_eq!(
            u.attributes[0],
            Value::List(vec![
                Value::Atom("\\HasNoChildren".to_string()),
                Value::Atom("\\Sent".to_string())
            ])
        );
        assert_eq!(u.attributes[1], Value::QuotedString("/".to_string()));
        assert_eq!(u.attributes[2], Value::QuotedString("INBOX/Sent".to_string()));
    }

    #[test]
    fn parses_list_with_nil_delimiter() {
        let u = untagged(b"* LIST (\\Noselect) NIL foo\r\n");
        assert_eq!(u.attributes[1], Value::Nil);
        assert_eq!(u.attributes[2], Value::Atom("foo".to_string()));
    }

    #[test]
    fn parses_untagged_ok_with_code() {
        let u = untagged(b"* OK [HIGHESTMODSEQ 715194045007] Highest\r\n");
        assert_eq!(u.name, "OK");
        assert_eq!(u.code, Some(ResponseCode::HighestModSeq(715_194_045_007)));
        assert_eq!(u.text, "Highest");
    }

    #[test]
    fn parses_capability_line() {
        let u = untagged(b"* CAPABILITY IMAP4rev1 LITERAL+ IDLE\r\n");
        let tokens: Vec<_> = u.attributes.iter().filter_map(Value::as_str).collect();
        assert_eq!(tokens, ["IMAP4rev1", "LITERAL+", "IDLE"]);
    }

    #[test]
    fn parses_vanished() {
        let u = untagged(b"* VANISHED (EARLIER) 3,5,7:9\r\n");
        assert_eq!(u.name, "VANISHED");
        assert_eq!(
            u.attributes[0],
            Value::List(vec![Value::Atom("EARLIER".to_string())])
        );
        assert_eq!(u.attributes[1], Value::Atom("3,5,7:9".to_string()));
    }

    #[test]
    fn parses_status_response() {
        let u = untagged(b"* STATUS blurdybloop (MESSAGES 231 UIDNEXT 44292)\r\n");
        assert_eq!(u.attributes[0], Value::Atom("blurdybloop".to_string()));
        let items = u.attributes[1].as_list().unwrap();
        assert_eq!(items[1], Value::Number(231));
    }

    #[test]
    fn parses_search_results() {
        let u = untagged(b"* SEARCH 2 84 882\r\n");
        let hits: Vec<_> = u.attributes.iter().filter_map(Value::as_number).collect();
        assert_eq!(hits, [2, 84, 882]);
    }

    #[test]
    fn oversized_number_stays_textual() {
        let u = untagged(b"* SEARCH 99999999999999999999999999\r\n");
        assert_eq!(
            u.attributes[0],
            Value::Atom("99999999999999999999999999".to_string())
        );
    }

    #[test]
    fn copyuid_expands_in_order() {
        let t = tagged(b"A1 OK [COPYUID 38505 304,319:320 3956:3958] Done\r\n");
        assert_eq!(
            t.code,
            Some(ResponseCode::CopyUid {
                uid_validity: 38505,
                source: vec![304, 319, 320],
                destination: vec![3956, 3957, 3958],
            })
        );
    }

    #[test]
    fn permanent_flags_with_wildcard() {
        let u = untagged(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n");
        let Some(ResponseCode::PermanentFlags(flags)) = u.code else {
            panic!("expected PERMANENTFLAGS");
        };
        assert!(flags.contains(&crate::types::Flag::Wildcard));
        assert_eq!(flags.len(), 3);
    }

    #[test]
    fn mailboxid_code() {
        let t = tagged(b"A2 OK [MAILBOXID (F2212ea87-6097-4256)] Done\r\n");
        assert_eq!(
            t.code,
            Some(ResponseCode::MailboxId("F2212ea87-6097-4256".to_string()))
        );
    }

    #[test]
    fn unknown_code_is_kept() {
        let t = tagged(b"A5 NO [WEIRDCODE] nope\r\n");
        assert_eq!(t.code, Some(ResponseCode::Unknown("WEIRDCODE".to_string())));
    }

    #[test]
    fn malformed_line_is_protocol_error() {
        assert!(parse_line(b"\r\n").is_err());
        assert!(parse_line(b"* LIST (\\Unterminated\r\n").is_err());
        assert!(parse_line(b"A1 WHATEVER text\r\n").is_err());
    }
}
