//! Wire codec: command encoding, response parsing and the IMAP string
//! encodings (modified UTF-7, date-time).

mod datetime;
mod decode;
mod encode;
mod utf7;

pub use datetime::{format_datetime, parse_datetime};
pub use decode::{
    ResponseLine, TaggedResponse, UntaggedResponse, Value, parse_line, response_code_from_section,
};
pub use encode::{
    Argument, CommandChunk, EncodeOptions, LiteralPart, encode_command, mailbox_argument,
};
pub use utf7::{decode_path, decode_utf7, encode_path, encode_utf7};
