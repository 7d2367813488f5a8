//! FETCH: message data retrieval and untagged FETCH interpretation.

use chrono::{DateTime, FixedOffset};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, UntaggedResponse, Value, parse_datetime};
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::Flags;
use crate::{Error, Result};

/// A data item to request with FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// Message flags.
    Flags,
    /// Message UID.
    Uid,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure without fetching content.
    BodyStructure,
    /// Modification sequence (CONDSTORE).
    ModSeq,
    /// OBJECTID email identifier.
    EmailId,
    /// A body section, fetched with PEEK so flags stay untouched.
    BodyPeek {
        /// Section specifier; empty means the whole message.
        section: String,
        /// Partial range `<start.len>`.
        partial: Option<(u32, u32)>,
    },
    /// A body section, marking the message `\Seen`.
    Body {
        /// Section specifier; empty means the whole message.
        section: String,
        /// Partial range `<start.len>`.
        partial: Option<(u32, u32)>,
    },
    /// A BINARY section (RFC 3516), fetched with PEEK.
    BinaryPeek {
        /// Section specifier.
        section: String,
        /// Partial range `<start.len>`.
        partial: Option<(u32, u32)>,
    },
}

impl FetchItem {
    fn render(&self) -> Argument {
        match self {
            Self::Flags => Argument::Atom("FLAGS".into()),
            Self::Uid => Argument::Atom("UID".into()),
            Self::InternalDate => Argument::Atom("INTERNALDATE".into()),
            Self::Rfc822Size => Argument::Atom("RFC822.SIZE".into()),
            Self::Envelope => Argument::Atom("ENVELOPE".into()),
            Self::BodyStructure => Argument::Atom("BODYSTRUCTURE".into()),
            Self::ModSeq => Argument::Atom("MODSEQ".into()),
            Self::EmailId => Argument::Atom("EMAILID".into()),
            Self::BodyPeek { section, partial } => {
                Argument::Atom(render_section("BODY.PEEK", section, *partial))
            }
            Self::Body { section, partial } => {
                Argument::Atom(render_section("BODY", section, *partial))
            }
            Self::BinaryPeek { section, partial } => {
                Argument::Atom(render_section("BINARY.PEEK", section, *partial))
            }
        }
    }
}

fn render_section(base: &str, section: &str, partial: Option<(u32, u32)>) -> String {
    let mut out = format!("{base}[{section}]");
    if let Some((start, len)) = partial {
        out.push_str(&format!("<{start}.{len}>"));
    }
    out
}

/// Options for FETCH.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Address messages by UID instead of sequence number.
    pub uid: bool,
    /// CONDSTORE `CHANGEDSINCE` modifier.
    pub changed_since: Option<u64>,
}

/// One message's parsed FETCH data.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    /// Message sequence number.
    pub seq: u32,
    /// UID, when included.
    pub uid: Option<u32>,
    /// Flags, when included.
    pub flags: Option<Flags>,
    /// Modification sequence, when included.
    pub modseq: Option<u64>,
    /// Internal date, when included.
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// RFC822 size, when included.
    pub size: Option<u32>,
    /// Raw envelope tree, when included. MIME interpretation is the
    /// caller's concern.
    pub envelope: Option<Value>,
    /// Raw body structure tree, when included.
    pub body_structure: Option<Value>,
    /// OBJECTID email id, when included.
    pub email_id: Option<String>,
    /// Body/BINARY sections by their request key, e.g. `BODY[TEXT]`.
    pub sections: Vec<(String, Vec<u8>)>,
}

impl FetchedMessage {
    /// Interprets an untagged FETCH response. Returns `None` when the
    /// response is not FETCH-shaped.
    #[must_use]
    pub fn from_untagged(resp: &UntaggedResponse) -> Option<Self> {
        let seq = resp.number?;
        let items = resp.attributes.first().and_then(Value::as_list)?;
        let mut message = Self {
            seq,
            ..Self::default()
        };

        let mut iter = items.iter();
        while let Some(key) = iter.next() {
            let Some(key) = key.as_str() else { continue };
            let key = key.to_uppercase();
            let Some(value) = iter.next() else { break };

            match key.as_str() {
                "FLAGS" => {
                    message.flags = value
                        .as_list()
                        .map(|items| Flags::parse(items.iter().filter_map(Value::as_str)));
                }
                "UID" => {
                    message.uid = value.as_number().and_then(|n| u32::try_from(n).ok());
                }
                "MODSEQ" => {
                    // MODSEQ arrives as a one-element list.
                    message.modseq = value
                        .as_list()
                        .and_then(|items| items.first().and_then(Value::as_number))
                        .or_else(|| value.as_number());
                }
                "INTERNALDATE" => {
                    message.internal_date = value.as_str().and_then(parse_datetime);
                }
                "RFC822.SIZE" => {
                    message.size = value.as_number().and_then(|n| u32::try_from(n).ok());
                }
                "ENVELOPE" => message.envelope = Some(value.clone()),
                "BODYSTRUCTURE" => message.body_structure = Some(value.clone()),
                "EMAILID" => {
                    message.email_id = value
                        .as_list()
                        .and_then(|items| items.first().and_then(Value::as_str))
                        .map(str::to_string);
                }
                "BODY" if value.as_list().is_some() => {
                    // BODY without a section is a structure, not content.
                    message.body_structure = Some(value.clone());
                }
                _ if key.starts_with("BODY[") || key.starts_with("BINARY[") => {
                    let data = match value {
                        Value::Literal(data) => data.clone(),
                        Value::QuotedString(s) => s.clone().into_bytes(),
                        Value::Nil => Vec::new(),
                        _ => continue,
                    };
                    message.sections.push((key, data));
                }
                _ => {}
            }
        }
        Some(message)
    }

    /// True when the response carried only flag data: the server is
    /// notifying a flag change, not answering a body fetch.
    #[must_use]
    pub fn is_flag_update(&self) -> bool {
        self.flags.is_some()
            && self.sections.is_empty()
            && self.envelope.is_none()
            && self.body_structure.is_none()
            && self.size.is_none()
            && self.internal_date.is_none()
    }

    /// Returns a fetched section's bytes by request key.
    #[must_use]
    pub fn section(&self, key: &str) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, data)| data.as_slice())
    }
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Fetches message data for a sequence-set or UID range.
    pub async fn fetch(
        &mut self,
        range: &str,
        items: &[FetchItem],
        options: FetchOptions,
    ) -> Result<Vec<FetchedMessage>> {
        self.require_selected()?;
        if items.is_empty() {
            return Err(Error::Programming("empty FETCH item list".to_string()));
        }

        let mut args = vec![
            Argument::Sequence(range.to_string()),
            Argument::List(items.iter().map(FetchItem::render).collect()),
        ];
        if let Some(changed_since) = options.changed_since
            && self.capabilities().has("CONDSTORE")
        {
            let mut modifiers = vec![
                Argument::Atom("CHANGEDSINCE".into()),
                Argument::Number(changed_since),
            ];
            if options.uid && self.enabled().contains("QRESYNC") {
                modifiers.push(Argument::Atom("VANISHED".into()));
            }
            args.push(Argument::List(modifiers));
        }

        let command = if options.uid { "UID FETCH" } else { "FETCH" };
        let result = self
            .exec(command, args, ExecOptions::collecting(&["FETCH"]))
            .await?;

        Ok(result
            .collected_named("FETCH")
            .filter_map(FetchedMessage::from_untagged)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::{ResponseLine, parse_line};

    fn fetch_from(line: &[u8]) -> FetchedMessage {
        let ResponseLine::Untagged(resp) = parse_line(line).unwrap() else {
            panic!("expected untagged");
        };
        FetchedMessage::from_untagged(&resp).unwrap()
    }

    #[test]
    fn parses_flag_notification() {
        let msg = fetch_from(b"* 7 FETCH (FLAGS (\\Seen) UID 42 MODSEQ (1001))\r\n");
        assert_eq!(msg.seq, 7);
        assert_eq!(msg.uid, Some(42));
        assert_eq!(msg.modseq, Some(1001));
        assert!(msg.is_flag_update());
    }

    #[test]
    fn body_content_is_not_a_flag_update() {
        let msg = fetch_from(b"* 3 FETCH (FLAGS (\\Seen) BODY[TEXT] {2}\r\nhi)\r\n");
        assert!(!msg.is_flag_update());
        assert_eq!(msg.section("body[text]"), Some(b"hi".as_slice()));
    }

    #[test]
    fn parses_size_and_date() {
        let msg =
            fetch_from(b"* 1 FETCH (RFC822.SIZE 4196 INTERNALDATE \"17-Jul-1996 02:44:25 -0700\")\r\n");
        assert_eq!(msg.size, Some(4196));
        assert!(msg.internal_date.is_some());
        assert!(!msg.is_flag_update());
    }

    #[test]
    fn body_without_section_is_structure() {
        let msg = fetch_from(b"* 2 FETCH (BODY (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 2 1))\r\n");
        assert!(msg.body_structure.is_some());
        assert!(msg.sections.is_empty());
    }

    #[test]
    fn render_section_includes_partial() {
        assert_eq!(
            render_section("BODY.PEEK", "HEADER", Some((0, 2048))),
            "BODY.PEEK[HEADER]<0.2048>"
        );
        assert_eq!(render_section("BODY", "", None), "BODY[]");
    }
}
