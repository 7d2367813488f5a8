//! APPEND: uploading messages, with UIDPLUS and BINARY support.

use chrono::{DateTime, FixedOffset};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, format_datetime, mailbox_argument};
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::{ResponseCode, format_flags, normalize_path};
use crate::{Error, Result};

/// Options for APPEND.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Flags to set on the appended message.
    pub flags: Vec<String>,
    /// INTERNALDATE to record; server receive time when absent.
    pub internal_date: Option<DateTime<FixedOffset>>,
}

/// Result of an APPEND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    /// Destination path as given.
    pub destination: String,
    /// Sequence number in the destination, when it could be observed
    /// (destination was the selected mailbox).
    pub seq: Option<u32>,
    /// UID of the appended message (APPENDUID, or SEARCH recovery).
    pub uid: Option<u32>,
    /// UIDVALIDITY of the destination (APPENDUID).
    pub uid_validity: Option<u64>,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Appends a message to `destination`.
    ///
    /// The payload goes out as literal8 when the server supports BINARY and
    /// the content contains NUL bytes; without BINARY such content is still
    /// sent as a plain literal and the server gets to judge it.
    pub async fn append(
        &mut self,
        destination: &str,
        content: &[u8],
        options: AppendOptions,
    ) -> Result<AppendResult> {
        self.require_authenticated()?;

        if let Some(limit) = self.capabilities().append_limit()
            && content.len() as u64 > limit
        {
            return Err(Error::AppendLimitExceeded {
                size: content.len() as u64,
                limit,
            });
        }

        let delimiter = self.mailbox.as_ref().and_then(|m| m.delimiter);
        let normalized = normalize_path(destination, delimiter);
        let into_current = self
            .mailbox
            .as_ref()
            .is_some_and(|mailbox| mailbox.path == normalized);

        let mut flags = format_flags(options.flags.iter().map(String::as_str))?;
        if into_current
            && let Some(mailbox) = &self.mailbox
        {
            // Drop flags the mailbox cannot store permanently.
            flags = flags
                .iter()
                .filter(|&flag| mailbox.can_use_flag(flag))
                .cloned()
                .collect();
        }

        let mut args = vec![mailbox_argument(destination, self.utf8_accepted())];
        if !flags.is_empty() {
            args.push(Argument::List(
                flags
                    .iter()
                    .map(|flag| Argument::Atom(flag.as_str().to_string()))
                    .collect(),
            ));
        }
        if let Some(date) = &options.internal_date {
            args.push(Argument::String(format_datetime(date)));
        }
        let use_literal8 = self.binary_allowed() && content.contains(&0);
        args.push(if use_literal8 {
            Argument::Literal8(content.to_vec())
        } else {
            Argument::Literal(content.to_vec())
        });

        let collect: &[&str] = if into_current { &["EXISTS"] } else { &[] };
        let result = self
            .exec("APPEND", args, ExecOptions::collecting(collect))
            .await?;

        let mut append = AppendResult {
            destination: destination.to_string(),
            seq: None,
            uid: None,
            uid_validity: None,
        };
        if let Some(ResponseCode::AppendUid { uid_validity, uids }) = &result.tagged.code {
            append.uid_validity = Some(*uid_validity);
            append.uid = uids.first().copied();
        }
        if into_current {
            append.seq = result
                .collected_named("EXISTS")
                .filter_map(|resp| resp.number)
                .last();

            // Some servers hold the EXISTS back until poked.
            if append.seq.is_none() {
                let noop = self
                    .exec("NOOP", Vec::new(), ExecOptions::collecting(&["EXISTS"]))
                    .await?;
                append.seq = noop
                    .collected_named("EXISTS")
                    .filter_map(|resp| resp.number)
                    .last();
            }

            // Without UIDPLUS the UID is recoverable through SEARCH.
            if append.uid.is_none()
                && let Some(seq) = append.seq
            {
                append.uid = self.uid_for_seq(seq).await?;
            }
        }
        Ok(append)
    }

    /// Resolves a sequence number to its UID via `UID SEARCH`.
    pub(crate) async fn uid_for_seq(&mut self, seq: u32) -> Result<Option<u32>> {
        let result = self
            .exec(
                "UID SEARCH",
                vec![Argument::Sequence(seq.to_string())],
                ExecOptions::collecting(&["SEARCH"]),
            )
            .await?;
        Ok(result
            .collected_named("SEARCH")
            .flat_map(|resp| resp.attributes.iter())
            .filter_map(crate::codec::Value::as_number)
            .filter_map(|n| u32::try_from(n).ok())
            .next())
    }
}
