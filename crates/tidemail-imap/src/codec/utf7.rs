//! Modified UTF-7 mailbox-name encoding (RFC 3501 section 5.1.3).
//!
//! Mailbox names travel in a BASE64 variant using `,` instead of `/`, with
//! `&` shifting into the encoded form and `-` shifting back. `&` itself is
//! the two-octet sequence `&-`.

use base64::Engine;

fn mutf7_engine() -> base64::engine::GeneralPurpose {
    base64::engine::GeneralPurpose::new(
        &base64::alphabet::IMAP_MUTF7,
        base64::engine::general_purpose::NO_PAD,
    )
}

/// Encodes a Unicode mailbox name into modified UTF-7.
#[must_use]
pub fn encode_utf7(input: &str) -> String {
    let engine = mutf7_engine();
    let mut output = String::with_capacity(input.len());
    let mut pending: Vec<u16> = Vec::new();

    let flush = |output: &mut String, pending: &mut Vec<u16>| {
        if pending.is_empty() {
            return;
        }
        let bytes: Vec<u8> = pending.iter().flat_map(|unit| unit.to_be_bytes()).collect();
        output.push('&');
        output.push_str(&engine.encode(bytes));
        output.push('-');
        pending.clear();
    };

    for ch in input.chars() {
        match ch {
            '&' => {
                flush(&mut output, &mut pending);
                output.push_str("&-");
            }
            '\x20'..='\x7e' => {
                flush(&mut output, &mut pending);
                output.push(ch);
            }
            _ => {
                let mut units = [0u16; 2];
                pending.extend_from_slice(ch.encode_utf16(&mut units));
            }
        }
    }
    flush(&mut output, &mut pending);
    output
}

/// Decodes a modified UTF-7 mailbox name.
///
/// Returns `None` for malformed input (unterminated shift, bad BASE64,
/// invalid UTF-16 or characters outside the printable US-ASCII range).
#[must_use]
pub fn decode_utf7(input: &str) -> Option<String> {
    let engine = mutf7_engine();
    let bytes = input.as_bytes();
    let mut buffer = Vec::new();
    let mut output = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'&' => {
                let start = i;
                loop {
                    i += 1;
                    if i == bytes.len() {
                        return None;
                    }
                    if bytes[i] == b'-' {
                        break;
                    }
                }
                if start + 1 == i {
                    output.push('&');
                } else {
                    buffer.clear();
                    engine.decode_vec(&bytes[start + 1..i], &mut buffer).ok()?;

                    let mut decoder = encoding_rs::UTF_16BE.new_decoder_without_bom_handling();
                    output.reserve(
                        decoder.max_utf8_buffer_length_without_replacement(buffer.len())?,
                    );
                    let (result, _) = decoder.decode_to_string_without_replacement(
                        &buffer,
                        &mut output,
                        true,
                    );
                    if !matches!(result, encoding_rs::DecoderResult::InputEmpty) {
                        return None;
                    }
                }
            }
            c @ 0x20..=0x7e => output.push(c as char),
            _ => return None,
        }
        i += 1;
    }
    Some(output)
}

/// Encodes a mailbox path for the wire.
///
/// With `UTF8=ACCEPT` enabled the path goes out as-is. Otherwise the path is
/// converted to modified UTF-7 whenever it contains `&`, non-ASCII, or
/// control bytes other than TAB/LF/CR.
#[must_use]
pub fn encode_path(path: &str, utf8_accepted: bool) -> String {
    if utf8_accepted || !needs_utf7(path) {
        return path.to_string();
    }
    encode_utf7(path)
}

/// Decodes a mailbox path received from the wire.
///
/// Decoding failures retain the raw string: a server that violates the
/// encoding still gets a usable (if odd-looking) path.
#[must_use]
pub fn decode_path(path: &str) -> String {
    if !path.contains('&') {
        return path.to_string();
    }
    decode_utf7(path).unwrap_or_else(|| path.to_string())
}

fn needs_utf7(path: &str) -> bool {
    path.chars().any(|ch| {
        ch == '&'
            || ch > '\x7e'
            || (ch < '\x20' && !matches!(ch, '\t' | '\n' | '\r'))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(encode_utf7("INBOX"), "INBOX");
        assert_eq!(decode_utf7("INBOX").unwrap(), "INBOX");
    }

    #[test]
    fn ampersand_is_escaped() {
        assert_eq!(encode_utf7("Tom & Jerry"), "Tom &- Jerry");
        assert_eq!(decode_utf7("&-").unwrap(), "&");
    }

    #[test]
    fn rfc_example_round_trips() {
        // The RFC 3501 example mailbox for "~peter/mail/台北/日本語".
        assert_eq!(
            decode_utf7("~peter/mail/&U,BTFw-/&ZeVnLIqe-").unwrap(),
            "~peter/mail/台北/日本語"
        );
        assert_eq!(
            encode_utf7("~peter/mail/台北/日本語"),
            "~peter/mail/&U,BTFw-/&ZeVnLIqe-"
        );
    }

    #[test]
    fn german_umlauts() {
        assert_eq!(encode_utf7("Entwürfe"), "Entw&APw-rfe");
        assert_eq!(decode_utf7("Entw&APw-rfe").unwrap(), "Entwürfe");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(decode_utf7("&U,BTFw").is_none()); // unterminated shift
        assert!(decode_utf7("caf\u{00e9}").is_none()); // raw non-ASCII
    }

    #[test]
    fn path_encoding_respects_utf8_accept() {
        assert_eq!(encode_path("Entwürfe", true), "Entwürfe");
        assert_eq!(encode_path("Entwürfe", false), "Entw&APw-rfe");
        assert_eq!(encode_path("INBOX", false), "INBOX");
    }

    #[test]
    fn path_decoding_keeps_raw_on_failure() {
        assert_eq!(decode_path("Entw&APw-rfe"), "Entwürfe");
        assert_eq!(decode_path("broken &"), "broken &");
        assert_eq!(decode_path("plain"), "plain");
    }

    proptest! {
        #[test]
        fn encode_decode_round_trip(input in "\\PC{0,32}") {
            let encoded = encode_utf7(&input);
            prop_assert_eq!(decode_utf7(&encoded).unwrap(), input);
        }
    }
}
