//! STORE: flag changes, with CONDSTORE conditional stores.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::Argument;
use crate::commands::fetch::FetchedMessage;
use crate::connection::{ExecOptions, ImapConnection};
use crate::types::{format_flags, validate_sequence};
use crate::Result;

/// What to do with the given flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace the flag set.
    Set,
    /// Add flags (`+FLAGS`).
    Add,
    /// Remove flags (`-FLAGS`).
    Remove,
}

impl StoreAction {
    const fn item(self, silent: bool) -> &'static str {
        match (self, silent) {
            (Self::Set, false) => "FLAGS",
            (Self::Set, true) => "FLAGS.SILENT",
            (Self::Add, false) => "+FLAGS",
            (Self::Add, true) => "+FLAGS.SILENT",
            (Self::Remove, false) => "-FLAGS",
            (Self::Remove, true) => "-FLAGS.SILENT",
        }
    }
}

/// Options for STORE.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Address messages by UID.
    pub uid: bool,
    /// Suppress the untagged FETCH echo.
    pub silent: bool,
    /// CONDSTORE `UNCHANGEDSINCE` modifier.
    pub unchanged_since: Option<u64>,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Changes flags on a message range. Returns the untagged FETCH echoes
    /// (empty for silent stores).
    pub async fn store(
        &mut self,
        range: &str,
        action: StoreAction,
        flags: &[&str],
        options: StoreOptions,
    ) -> Result<Vec<FetchedMessage>> {
        self.require_selected()?;
        validate_sequence(range)?;
        let flags = format_flags(flags.iter().copied())?;

        let mut args = vec![Argument::Sequence(range.to_string())];
        if let Some(modseq) = options.unchanged_since
            && self.capabilities().has("CONDSTORE")
        {
            args.push(Argument::List(vec![
                Argument::Atom("UNCHANGEDSINCE".into()),
                Argument::Number(modseq),
            ]));
        }
        args.push(Argument::Atom(action.item(options.silent).to_string()));
        args.push(Argument::List(
            flags
                .iter()
                .map(|flag| Argument::Atom(flag.as_str().to_string()))
                .collect(),
        ));

        let command = if options.uid { "UID STORE" } else { "STORE" };
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
mod tests {
    use super::*;

    #[test]
    fn item_strings() {
        assert_eq!(StoreAction::Set.item(false), "FLAGS");
        assert_eq!(StoreAction::Add.item(true), "+FLAGS.SILENT");
        assert_eq!(StoreAction::Remove.item(false), "-FLAGS");
    }
}
