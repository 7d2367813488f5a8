//! COPY and MOVE, with UIDPLUS result mapping.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, mailbox_argument};
use crate::connection::{ExecOptions, ExecResult, ImapConnection};
use crate::types::{ResponseCode, validate_sequence};
use crate::{Error, Result};

/// Options shared by COPY and MOVE.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions {
    /// Address messages by UID.
    pub uid: bool,
}

/// Result of a COPY or MOVE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyResult {
    /// Destination path as given.
    pub destination: String,
    /// UIDVALIDITY of the destination, when COPYUID was sent.
    pub uid_validity: Option<u64>,
    /// Source-to-destination UID pairs, in order: the i-th source UID
    /// landed as the i-th destination UID.
    pub uid_map: Vec<(u32, u32)>,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Copies messages to another mailbox.
    pub async fn copy_messages(
        &mut self,
        range: &str,
        destination: &str,
        options: CopyOptions,
    ) -> Result<CopyResult> {
        self.require_selected()?;
        validate_sequence(range)?;

        let command = if options.uid { "UID COPY" } else { "COPY" };
        let args = vec![
            Argument::Sequence(range.to_string()),
            mailbox_argument(destination, self.utf8_accepted()),
        ];
        let result = self
            .exec(command, args, ExecOptions::collecting(&["OK"]))
            .await?;
        Ok(copy_result(destination, &result)?)
    }

    /// Moves messages to another mailbox.
    ///
    /// Uses MOVE (RFC 6851) when advertised; otherwise degrades to
    /// COPY + `STORE +FLAGS.SILENT (\Deleted)` + EXPUNGE on the source
    /// range.
    pub async fn move_messages(
        &mut self,
        range: &str,
        destination: &str,
        options: CopyOptions,
    ) -> Result<CopyResult> {
        self.require_selected()?;
        validate_sequence(range)?;

        if self.capabilities().has("MOVE") {
            let command = if options.uid { "UID MOVE" } else { "MOVE" };
            let args = vec![
                Argument::Sequence(range.to_string()),
                mailbox_argument(destination, self.utf8_accepted()),
            ];
            let result = self
                .exec(command, args, ExecOptions::collecting(&["OK"]))
                .await?;
            return Ok(copy_result(destination, &result)?);
        }

        let copied = self.copy_messages(range, destination, options).await?;
        self.expunge_range(
            range,
            crate::commands::expunge::ExpungeOptions { uid: options.uid },
        )
        .await?;
        Ok(copied)
    }
}

/// Extracts COPYUID from the tagged code or (MOVE) an untagged OK.
fn copy_result(destination: &str, result: &ExecResult) -> Result<CopyResult> {
    let mut out = CopyResult {
        destination: destination.to_string(),
        ..CopyResult::default()
    };

    let code = match &result.tagged.code {
        Some(code @ ResponseCode::CopyUid { .. }) => Some(code),
        _ => result
            .collected_named("OK")
            .find_map(|resp| match &resp.code {
                Some(code @ ResponseCode::CopyUid { .. }) => Some(code),
                _ => None,
            }),
    };
    if let Some(ResponseCode::CopyUid {
        uid_validity,
        source,
        destination: dest_uids,
    }) = code
    {
        if source.len() != dest_uids.len() {
            return Err(Error::Protocol(format!(
                "COPYUID set length mismatch: {} source vs {} destination",
                source.len(),
                dest_uids.len()
            )));
        }
        out.uid_validity = Some(*uid_validity);
        out.uid_map = source.iter().copied().zip(dest_uids.iter().copied()).collect();
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::TaggedResponse;
    use crate::types::Status;

    fn exec_result(code: Option<ResponseCode>) -> ExecResult {
        ExecResult {
            tagged: TaggedResponse {
                tag: "A1".into(),
                status: Status::Ok,
                code,
                text: "Done".into(),
            },
            collected: Vec::new(),
        }
    }

    #[test]
    fn copyuid_builds_ordered_map() {
        let result = exec_result(Some(ResponseCode::CopyUid {
            uid_validity: 38505,
            source: vec![304, 319, 320],
            destination: vec![3956, 3957, 3958],
        }));
        let copied = copy_result("Archive", &result).unwrap();
        assert_eq!(copied.uid_validity, Some(38505));
        assert_eq!(copied.uid_map, vec![(304, 3956), (319, 3957), (320, 3958)]);
    }

    #[test]
    fn missing_copyuid_yields_empty_map() {
        let copied = copy_result("Archive", &exec_result(None)).unwrap();
        assert_eq!(copied.uid_validity, None);
        assert!(copied.uid_map.is_empty());
    }

    #[test]
    fn mismatched_sets_are_rejected() {
        let result = exec_result(Some(ResponseCode::CopyUid {
            uid_validity: 1,
            source: vec![1, 2],
            destination: vec![10],
        }));
        assert!(copy_result("Archive", &result).is_err());
    }
}
