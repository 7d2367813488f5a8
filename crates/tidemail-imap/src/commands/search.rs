//! SEARCH and SORT.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, Value};
use crate::connection::{ExecOptions, ExecResult, ImapConnection};
use crate::{Error, Result};

/// Options shared by SEARCH and SORT.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Return UIDs instead of sequence numbers.
    pub uid: bool,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs SEARCH with the given criteria arguments.
    ///
    /// Criteria are expressed as an argument tree, e.g.
    /// `[Atom("UNSEEN")]` or `[Atom("SINCE"), Atom("1-Feb-2024")]`.
    pub async fn search(
        &mut self,
        criteria: Vec<Argument>,
        options: SearchOptions,
    ) -> Result<Vec<u32>> {
        self.require_selected()?;
        if criteria.is_empty() {
            return Err(Error::Programming("empty SEARCH criteria".to_string()));
        }
        let command = if options.uid { "UID SEARCH" } else { "SEARCH" };
        let result = self
            .exec(command, criteria, ExecOptions::collecting(&["SEARCH"]))
            .await?;
        Ok(collect_numbers(&result, "SEARCH"))
    }

    /// Runs SORT (RFC 5256) with the given sort keys and criteria.
    pub async fn sort(
        &mut self,
        sort_keys: &[&str],
        criteria: Vec<Argument>,
        options: SearchOptions,
    ) -> Result<Vec<u32>> {
        self.require_selected()?;
        if sort_keys.is_empty() {
            return Err(Error::Programming("empty SORT key list".to_string()));
        }
        let mut args = vec![
            Argument::List(
                sort_keys
                    .iter()
                    .map(|key| Argument::Atom((*key).to_string()))
                    .collect(),
            ),
            Argument::Atom("UTF-8".into()),
        ];
        if criteria.is_empty() {
            args.push(Argument::Atom("ALL".into()));
        } else {
            args.extend(criteria);
        }
        let command = if options.uid { "UID SORT" } else { "SORT" };
        let result = self
            .exec(command, args, ExecOptions::collecting(&["SORT"]))
            .await?;
        Ok(collect_numbers(&result, "SORT"))
    }
}

fn collect_numbers(result: &ExecResult, name: &str) -> Vec<u32> {
    result
        .collected_named(name)
        .flat_map(|resp| resp.attributes.iter())
        .filter_map(Value::as_number)
        .filter_map(|n| u32::try_from(n).ok())
        .collect()
}
