//! Command encoding: argument trees to the IMAP wire grammar.
//!
//! A command is encoded into an ordered list of [`CommandChunk`]s. Each chunk
//! is a run of line text; a chunk that announces a literal carries the
//! literal bytes, which the connection engine writes after the server's `+`
//! continuation (or inline for non-synchronizing `{n+}` literals).

use crate::types::validate_sequence;
use crate::{Error, Result};

use super::utf7::encode_path;

/// A typed node of the command argument tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Bare token. Must not contain framing-relevant bytes.
    Atom(String),
    /// Quoted string; `"` and `\` are escaped. Values containing CR/LF
    /// cannot be quoted and are promoted to a literal.
    String(String),
    /// Length-prefixed raw bytes: `{n}CRLF<bytes>`.
    Literal(Vec<u8>),
    /// BINARY literal: `~{n}CRLF<bytes>` (RFC 3516). The caller is
    /// responsible for only using this when BINARY was advertised.
    Literal8(Vec<u8>),
    /// Unsigned number.
    Number(u64),
    /// NIL.
    Nil,
    /// A validated sequence set, emitted as a bare token.
    Sequence(String),
    /// Parenthesized, space-separated list of children.
    List(Vec<Argument>),
}

/// Literal payload attached to a chunk boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralPart {
    /// Raw bytes to transmit after the continuation.
    pub data: Vec<u8>,
    /// True when announced as `~{n}` (literal8).
    pub binary: bool,
    /// True when announced as `{n+}` (LITERAL+): no continuation needed.
    pub non_sync: bool,
}

/// One send unit of an encoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandChunk {
    /// Line text, ending either with a literal announcement + CRLF or, for
    /// the final chunk, the command-terminating CRLF.
    pub text: Vec<u8>,
    /// Literal to send after this chunk, if any.
    pub literal: Option<LiteralPart>,
}

/// Encoder settings derived from the connection's capability state.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Use `{n+}` non-synchronizing literals (LITERAL+ advertised).
    pub literal_plus: bool,
}

/// Encodes a tagged command into its send units.
///
/// # Errors
///
/// Returns [`Error::Programming`] for arguments that cannot be represented
/// (malformed atoms, empty sequence sets).
pub fn encode_command(
    tag: &str,
    command: &str,
    args: &[Argument],
    options: EncodeOptions,
) -> Result<Vec<CommandChunk>> {
    let mut chunks = Vec::new();
    let mut text = Vec::with_capacity(64);
    text.extend_from_slice(tag.as_bytes());
    text.push(b' ');
    text.extend_from_slice(command.as_bytes());

    for arg in args {
        text.push(b' ');
        write_argument(&mut chunks, &mut text, arg, options)?;
    }

    text.extend_from_slice(b"\r\n");
    chunks.push(CommandChunk {
        text,
        literal: None,
    });
    Ok(chunks)
}

fn write_argument(
    chunks: &mut Vec<CommandChunk>,
    text: &mut Vec<u8>,
    arg: &Argument,
    options: EncodeOptions,
) -> Result<()> {
    match arg {
        Argument::Atom(s) => {
            if s.is_empty() || s.bytes().any(breaks_framing) {
                return Err(Error::Programming(format!("invalid atom: {s:?}")));
            }
            text.extend_from_slice(s.as_bytes());
        }
        Argument::String(s) => {
            if s.bytes().any(|b| b == b'\r' || b == b'\n') {
                // Cannot appear in a quoted string; fall back to a literal.
                write_literal(chunks, text, s.as_bytes(), false, options);
            } else {
                write_quoted(text, s);
            }
        }
        Argument::Literal(data) => write_literal(chunks, text, data, false, options),
        Argument::Literal8(data) => write_literal(chunks, text, data, true, options),
        Argument::Number(n) => text.extend_from_slice(n.to_string().as_bytes()),
        Argument::Nil => text.extend_from_slice(b"NIL"),
        Argument::Sequence(set) => {
            validate_sequence(set)?;
            text.extend_from_slice(set.as_bytes());
        }
        Argument::List(items) => {
            text.push(b'(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    text.push(b' ');
                }
                write_argument(chunks, text, item, options)?;
            }
            text.push(b')');
        }
    }
    Ok(())
}

fn write_quoted(text: &mut Vec<u8>, s: &str) {
    text.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            text.push(b'\\');
        }
        text.push(b);
    }
    text.push(b'"');
}

fn write_literal(
    chunks: &mut Vec<CommandChunk>,
    text: &mut Vec<u8>,
    data: &[u8],
    binary: bool,
    options: EncodeOptions,
) {
    if binary {
        text.push(b'~');
    }
    text.push(b'{');
    text.extend_from_slice(data.len().to_string().as_bytes());
    if options.literal_plus {
        text.push(b'+');
    }
    text.extend_from_slice(b"}\r\n");

    chunks.push(CommandChunk {
        text: std::mem::take(text),
        literal: Some(LiteralPart {
            data: data.to_vec(),
            binary,
            non_sync: options.literal_plus,
        }),
    });
}

fn breaks_framing(b: u8) -> bool {
    b <= 0x20 || b >= 0x7f || matches!(b, b'"' | b'(' | b')' | b'{' | b'%')
}

/// Returns true if the byte forces a mailbox name into quoted form.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b'&')
        || b < 0x20
        || b >= 0x7f
}

/// Builds the wire argument for a mailbox path.
///
/// Applies modified UTF-7 unless `UTF8=ACCEPT` was enabled, then picks atom
/// or quoted string. An encoded result containing `&` always goes quoted.
#[must_use]
pub fn mailbox_argument(path: &str, utf8_accepted: bool) -> Argument {
    let encoded = encode_path(path, utf8_accepted);
    if encoded.is_empty() || encoded.bytes().any(needs_quoting) {
        Argument::String(encoded)
    } else {
        Argument::Atom(encoded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn single_line(chunks: &[CommandChunk]) -> Vec<u8> {
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].literal.is_none());
        chunks[0].text.clone()
    }

    #[test]
    fn encodes_plain_command() {
        let chunks = encode_command("A1", "NOOP", &[], EncodeOptions::default()).unwrap();
        assert_eq!(single_line(&chunks), b"A1 NOOP\r\n");
    }

    #[test]
    fn encodes_atoms_strings_and_lists() {
        let chunks = encode_command(
            "A2",
            "STATUS",
            &[
                Argument::Atom("INBOX".into()),
                Argument::List(vec![
                    Argument::Atom("MESSAGES".into()),
                    Argument::Atom("UIDNEXT".into()),
                ]),
            ],
            EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(single_line(&chunks), b"A2 STATUS INBOX (MESSAGES UIDNEXT)\r\n");
    }

    #[test]
    fn quoted_strings_escape_specials() {
        let chunks = encode_command(
            "A3",
            "LOGIN",
            &[
                Argument::String("user".into()),
                Argument::String("pa\"ss\\word".into()),
            ],
            EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(
            single_line(&chunks),
            b"A3 LOGIN \"user\" \"pa\\\"ss\\\\word\"\r\n"
        );
    }

    #[test]
    fn literal_splits_into_chunks() {
        let chunks = encode_command(
            "A4",
            "APPEND",
            &[
                Argument::Atom("INBOX".into()),
                Argument::Literal(b"hello".to_vec()),
            ],
            EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, b"A4 APPEND INBOX {5}\r\n");
        let literal = chunks[0].literal.as_ref().unwrap();
        assert_eq!(literal.data, b"hello");
        assert!(!literal.non_sync);
        assert!(!literal.binary);
        assert_eq!(chunks[1].text, b"\r\n");
    }

    #[test]
    fn literal_plus_marks_non_sync() {
        let options = EncodeOptions { literal_plus: true };
        let chunks = encode_command(
            "A5",
            "APPEND",
            &[
                Argument::Atom("INBOX".into()),
                Argument::Literal(b"hi".to_vec()),
            ],
            options,
        )
        .unwrap();
        assert_eq!(chunks[0].text, b"A5 APPEND INBOX {2+}\r\n");
        assert!(chunks[0].literal.as_ref().unwrap().non_sync);
    }

    #[test]
    fn literal8_gets_tilde_prefix() {
        let chunks = encode_command(
            "A6",
            "APPEND",
            &[Argument::Literal8(b"\x00\x01".to_vec())],
            EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(chunks[0].text, b"A6 APPEND ~{2}\r\n");
        assert!(chunks[0].literal.as_ref().unwrap().binary);
    }

    #[test]
    fn string_with_newline_becomes_literal() {
        let chunks = encode_command(
            "A7",
            "LOGIN",
            &[Argument::String("two\r\nlines".into())],
            EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(chunks[0].text, b"A7 LOGIN {10}\r\n");
    }

    #[test]
    fn invalid_atom_is_a_programming_error() {
        let err = encode_command(
            "A8",
            "SELECT",
            &[Argument::Atom("bad atom".into())],
            EncodeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Programming(_)));
    }

    #[test]
    fn empty_sequence_set_is_rejected() {
        let err = encode_command(
            "A9",
            "FETCH",
            &[Argument::Sequence(String::new())],
            EncodeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Programming(_)));
    }

    #[test]
    fn mailbox_argument_picks_atom_or_string() {
        assert_eq!(
            mailbox_argument("INBOX", false),
            Argument::Atom("INBOX".into())
        );
        assert_eq!(
            mailbox_argument("My Folder", false),
            Argument::String("My Folder".into())
        );
        // Encoded result contains '&': prefer quoted string.
        assert_eq!(
            mailbox_argument("Entwürfe", false),
            Argument::String("Entw&APw-rfe".into())
        );
        assert_eq!(
            mailbox_argument("Entwürfe", true),
            Argument::String("Entwürfe".into())
        );
    }
}
