//! Special-use role resolution for listed folders.
//!
//! Candidates are gathered from three sources with strict priority:
//! caller-supplied hints beat server attributes, which beat the
//! localized-name heuristic. Within one source, the lexicographically
//! smallest path wins. Each role is assigned at most once.

use std::collections::HashMap;

use crate::connection::SpecialUseHints;
use crate::types::{FolderEntry, SpecialUse, SpecialUseSource};

/// Collects `(source, path)` candidates per role during a LIST run.
#[derive(Debug, Default)]
pub(crate) struct SpecialUseCandidates {
    by_role: HashMap<SpecialUse, Vec<(SpecialUseSource, String)>>,
}

impl SpecialUseCandidates {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a candidate path for a role.
    pub(crate) fn register(&mut self, role: SpecialUse, source: SpecialUseSource, path: &str) {
        self.by_role
            .entry(role)
            .or_default()
            .push((source, path.to_string()));
    }

    /// Registers the caller-supplied hints.
    pub(crate) fn register_hints(&mut self, hints: &SpecialUseHints) {
        let pairs = [
            (SpecialUse::Sent, &hints.sent),
            (SpecialUse::Junk, &hints.junk),
            (SpecialUse::Trash, &hints.trash),
            (SpecialUse::Drafts, &hints.drafts),
            (SpecialUse::Archive, &hints.archive),
        ];
        for (role, path) in pairs {
            if let Some(path) = path {
                self.register(role, SpecialUseSource::User, path);
            }
        }
    }

    /// True when an `\Inbox` candidate was seen.
    pub(crate) fn has_inbox(&self) -> bool {
        self.by_role.contains_key(&SpecialUse::Inbox)
    }

    /// Assigns roles onto the entries.
    ///
    /// Per role, candidates are ordered by (source priority, path) and the
    /// first one naming an entry that doesn't have a role yet wins. No two
    /// entries end up sharing a role.
    pub(crate) fn resolve(mut self, entries: &mut [FolderEntry]) {
        let mut index: HashMap<String, usize> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path.clone(), i))
            .collect();

        let mut roles: Vec<SpecialUse> = self.by_role.keys().copied().collect();
        roles.sort_by_key(|role| role.rank());

        for role in roles {
            let Some(mut candidates) = self.by_role.remove(&role) else {
                continue;
            };
            candidates.sort();
            for (source, path) in candidates {
                let Some(&i) = index.get(&path) else { continue };
                if entries[i].special_use.is_some() {
                    continue;
                }
                entries[i].special_use = Some(role);
                entries[i].special_use_source = Some(source);
                index.remove(&path);
                break;
            }
        }
    }
}

/// Localized folder names that imply a role when the server stays silent.
///
/// Keyed by the lowercased leaf name; entries cover the common localizations
/// seen in the wild, with a handful of language-agnostic substrings as a
/// last resort.
pub(crate) fn special_use_for_name(name: &str) -> Option<SpecialUse> {
    let lower = name.to_lowercase();
    let exact = match lower.as_str() {
        "sent" | "sent mail" | "sent items" | "sent messages" | "gesendet"
        | "gesendete elemente" | "envoy\u{e9}s" | "envoy\u{e9}" | "enviados" | "verzonden"
        | "posta inviata" | "skickat" => Some(SpecialUse::Sent),
        "trash" | "deleted" | "deleted items" | "deleted messages" | "papierkorb"
        | "gel\u{f6}schte elemente" | "corbeille" | "papelera" | "prullenbak" | "cestino"
        | "papperskorgen" | "bin" => Some(SpecialUse::Trash),
        "junk" | "spam" | "junk mail" | "junk e-mail" | "bulk mail"
        | "courrier ind\u{e9}sirable" | "correo no deseado" | "ongewenste e-mail"
        | "posta indesiderata" => Some(SpecialUse::Junk),
        "drafts" | "draft" | "entw\u{fc}rfe" | "brouillons" | "borradores" | "concepten"
        | "bozze" | "utkast" => Some(SpecialUse::Drafts),
        "archive" | "archives" | "archiv" | "archivo" | "archief" | "archivio" | "arkiv" => {
            Some(SpecialUse::Archive)
        }
        _ => None,
    };
    if exact.is_some() {
        return exact;
    }
    // Substring fallback for decorated names like "[Gmail]/Sent Mail".
    if lower.contains("sent") {
        Some(SpecialUse::Sent)
    } else if lower.contains("trash") {
        Some(SpecialUse::Trash)
    } else if lower.contains("spam") || lower.contains("junk") {
        Some(SpecialUse::Junk)
    } else if lower.contains("draft") {
        Some(SpecialUse::Drafts)
    } else if lower.contains("archive") {
        Some(SpecialUse::Archive)
    } else {
        None
    }
}
