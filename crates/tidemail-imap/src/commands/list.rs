//! LIST: folder discovery with LSUB fusion and special-use resolution.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, UntaggedResponse, Value, decode_path, mailbox_argument};
use crate::commands::special_use::{SpecialUseCandidates, special_use_for_name};
use crate::commands::status::{StatusQuery, parse_status_items};
use crate::connection::{ExecOptions, ImapConnection, SpecialUseHints};
use crate::types::{FolderEntry, FolderStatus, SpecialUse, SpecialUseSource, normalize_path};
use crate::Result;

/// Options for the LIST procedure.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Stop after the first LIST round: no LSUB, no STATUS fan-out, no
    /// INBOX follow-up.
    pub list_only: bool,
    /// Attach STATUS data to each entry (via LIST-STATUS or a fan-out).
    pub status_query: Option<StatusQuery>,
    /// Extra special-use hints, merged over the configured ones.
    pub special_use_hints: Option<SpecialUseHints>,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Lists folders matching `reference` + `pattern`.
    ///
    /// Runs LIST (or XLIST on legacy servers), merges LSUB subscription
    /// data, resolves special-use roles from hints, server attributes and
    /// localized names, and returns the entries sorted with special-use
    /// folders first. The folder cache is refreshed as a side effect.
    pub async fn list(
        &mut self,
        reference: &str,
        pattern: &str,
        options: ListOptions,
    ) -> Result<Vec<FolderEntry>> {
        self.require_authenticated()?;

        // XLIST is only worth using when the server never learned RFC 6154.
        let use_xlist =
            self.capabilities().has("XLIST") && !self.capabilities().has("SPECIAL-USE");
        let command = if use_xlist { "XLIST" } else { "LIST" };

        let condstore = self.capabilities().has("CONDSTORE");
        let list_status = self.capabilities().has("LIST-STATUS");
        let status_query = options.status_query.filter(|q| !q.is_empty(condstore));

        let utf8 = self.utf8_accepted();
        let mut args = vec![
            mailbox_argument(reference, utf8),
            mailbox_argument(pattern, utf8),
        ];
        if !use_xlist
            && list_status
            && !options.list_only
            && let Some(query) = status_query
        {
            let mut returns = vec![
                Argument::Atom("STATUS".into()),
                Argument::List(query.items(condstore)),
            ];
            if self.capabilities().has("SPECIAL-USE") {
                returns.push(Argument::Atom("SPECIAL-USE".into()));
            }
            args.push(Argument::Atom("RETURN".into()));
            args.push(Argument::List(returns));
        }

        let mut entries: Vec<FolderEntry> = Vec::new();
        let mut candidates = SpecialUseCandidates::new();
        let mut status_map: HashMap<String, FolderStatus> = HashMap::new();

        let hints = options
            .special_use_hints
            .unwrap_or_else(|| self.config.special_use_hints.clone());
        candidates.register_hints(&hints);

        let result = self
            .exec(
                command,
                args,
                ExecOptions::collecting(&[command, "STATUS"]),
            )
            .await?;
        for resp in result.collected_named(command) {
            ingest_list_entry(resp, use_xlist, &mut entries, &mut candidates);
        }
        for resp in result.collected_named("STATUS") {
            ingest_inline_status(resp, &mut status_map);
        }

        if options.list_only {
            candidates.resolve(&mut entries);
            self.finish_listing(&mut entries, &status_map);
            return Ok(entries);
        }

        // A scoped reference can hide the INBOX; fetch it explicitly.
        if !reference.is_empty() && !candidates.has_inbox() {
            let inbox_args = vec![Argument::String(String::new()), Argument::String("INBOX".into())];
            let result = self
                .exec("LIST", inbox_args, ExecOptions::collecting(&["LIST"]))
                .await?;
            for resp in result.collected_named("LIST") {
                ingest_list_entry(resp, false, &mut entries, &mut candidates);
            }
        }

        // LSUB only decorates entries the LIST produced; subscribed-but-
        // unlisted folders are ignored.
        let lsub_args = vec![
            mailbox_argument(reference, utf8),
            mailbox_argument(pattern, utf8),
        ];
        let result = self
            .exec("LSUB", lsub_args, ExecOptions::collecting(&["LSUB"]))
            .await?;
        for resp in result.collected_named("LSUB") {
            merge_lsub_entry(resp, &mut entries, &mut candidates);
        }

        candidates.resolve(&mut entries);

        // STATUS fan-out only when no inline STATUS arrived at all: inline
        // success is taken to mean every expected STATUS was delivered.
        if let Some(query) = status_query
            && status_map.is_empty()
        {
            let paths: Vec<String> = entries
                .iter()
                .filter(|entry| !entry.has_attribute("\\Noselect"))
                .map(|entry| entry.path.clone())
                .collect();
            for path in paths {
                match self.status(&path, query).await {
                    Ok(status) => {
                        status_map.insert(path, status);
                    }
                    Err(err) => {
                        tracing::debug!(conn = self.id(), path, %err, "STATUS fan-out entry failed");
                    }
                }
            }
        }

        self.finish_listing(&mut entries, &status_map);
        Ok(entries)
    }

    /// Applies STATUS blocks, subscribes the INBOX, sorts and refreshes the
    /// folder cache.
    fn finish_listing(
        &mut self,
        entries: &mut Vec<FolderEntry>,
        status_map: &HashMap<String, FolderStatus>,
    ) {
        for entry in entries.iter_mut() {
            if let Some(status) = status_map.get(&entry.path) {
                entry.status = Some(status.clone());
            }
            if entry.path == "INBOX" {
                entry.subscribed = true;
            }
        }

        entries.sort_by(|a, b| match (a.special_use, b.special_use) {
            (Some(a), Some(b)) => a.rank().cmp(&b.rank()),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => {
                let a_segments = a.parent.iter().chain(std::iter::once(&a.name));
                let b_segments = b.parent.iter().chain(std::iter::once(&b.name));
                a_segments.cmp(b_segments)
            }
        });

        for entry in entries.iter() {
            self.folders.insert(entry.path.clone(), entry.clone());
        }
    }
}

/// Interprets one untagged LIST/XLIST entry.
fn ingest_list_entry(
    resp: &UntaggedResponse,
    xlist: bool,
    entries: &mut Vec<FolderEntry>,
    candidates: &mut SpecialUseCandidates,
) {
    let Some(mut entry) = folder_from_response(resp) else {
        return;
    };
    entry.listed = true;

    if entry.path == "INBOX" {
        candidates.register(SpecialUse::Inbox, SpecialUseSource::Name, &entry.path);
    }
    for attr in &entry.attributes {
        if let Some(role) = SpecialUse::parse(attr) {
            // XLIST marks the INBOX with \Inbox; RFC 6154 has no such flag.
            if role == SpecialUse::Inbox && !xlist {
                continue;
            }
            candidates.register(role, SpecialUseSource::Extension, &entry.path);
        }
    }
    if let Some(role) = special_use_for_name(&entry.name) {
        candidates.register(role, SpecialUseSource::Name, &entry.path);
    }

    if let Some(existing) = entries.iter_mut().find(|e| e.path == entry.path) {
        merge_attributes(existing, &entry.attributes);
        existing.listed = true;
    } else {
        entries.push(entry);
    }
}

/// Merges one untagged LSUB entry: subscription and extra flags only, never
/// a new entry.
fn merge_lsub_entry(
    resp: &UntaggedResponse,
    entries: &mut Vec<FolderEntry>,
    candidates: &mut SpecialUseCandidates,
) {
    let Some(parsed) = folder_from_response(resp) else {
        return;
    };
    let Some(existing) = entries.iter_mut().find(|e| e.path == parsed.path) else {
        return;
    };
    existing.subscribed = true;
    merge_attributes(existing, &parsed.attributes);
    for attr in &parsed.attributes {
        if let Some(role) = SpecialUse::parse(attr)
            && role != SpecialUse::Inbox
        {
            candidates.register(role, SpecialUseSource::Extension, &parsed.path);
        }
    }
}

fn merge_attributes(entry: &mut FolderEntry, attributes: &[String]) {
    for attr in attributes {
        if !entry.has_attribute(attr) {
            entry.attributes.push(attr.clone());
        }
    }
}

/// Builds a folder entry from the `(flags) delimiter name` shape shared by
/// LIST, XLIST and LSUB.
fn folder_from_response(resp: &UntaggedResponse) -> Option<FolderEntry> {
    let attributes: Vec<String> = resp
        .attributes
        .first()?
        .as_list()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    let delimiter = match resp.attributes.get(1)? {
        Value::Nil => None,
        value => value.as_str().and_then(|s| s.chars().next()),
    };
    let raw_path = resp.attributes.get(2)?.as_str()?.to_string();

    let mut path = normalize_path(&decode_path(&raw_path), delimiter);
    if let Some(delim) = delimiter
        && let Some(stripped) = path.strip_prefix(delim)
    {
        path = stripped.to_string();
    }

    let (parent, name) = match delimiter {
        Some(delim) => {
            let mut segments: Vec<String> = path.split(delim).map(str::to_string).collect();
            let name = segments.pop().unwrap_or_default();
            (segments, name)
        }
        None => (Vec::new(), path.clone()),
    };

    Some(FolderEntry {
        path,
        path_as_listed: raw_path,
        parent,
        name,
        delimiter,
        listed: false,
        subscribed: false,
        attributes,
        special_use: None,
        special_use_source: None,
        status: None,
    })
}

fn ingest_inline_status(resp: &UntaggedResponse, status_map: &mut HashMap<String, FolderStatus>) {
    let Some(path) = resp.attributes.first().and_then(Value::as_str) else {
        return;
    };
    let Some(items) = resp.attributes.get(1).and_then(Value::as_list) else {
        return;
    };
    let path = normalize_path(&decode_path(path), None);
    status_map.insert(path, parse_status_items(items));
}
