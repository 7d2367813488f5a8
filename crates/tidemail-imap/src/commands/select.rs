//! SELECT/EXAMINE: opening a mailbox, with QRESYNC resynchronization.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{Argument, Value, mailbox_argument};
use crate::commands::list::ListOptions;
use crate::connection::{ConnectionState, ExecOptions, ImapConnection, MailEvent};
use crate::Result;
use crate::types::{Flags, ResponseCode, SelectedMailbox, normalize_path};

/// Options for SELECT/EXAMINE.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    /// Open read-only (EXAMINE).
    pub read_only: bool,
    /// QRESYNC: last known HIGHESTMODSEQ.
    pub changed_since: Option<u64>,
    /// QRESYNC: last known UIDVALIDITY.
    pub uid_validity: Option<u64>,
}

/// Result of a successful SELECT/EXAMINE.
#[derive(Debug, Clone)]
pub struct SelectResult {
    /// Snapshot of the freshly installed mailbox state.
    pub mailbox: SelectedMailbox,
    /// True when QRESYNC was requested *and* the server state confirms the
    /// resync is trustworthy (same UIDVALIDITY, mod-sequences available).
    pub qresync: bool,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens a mailbox.
    ///
    /// QRESYNC parameters are attached only when the extension was enabled
    /// and both `changed_since` and `uid_validity` are given; VANISHED and
    /// FETCH responses replayed during the open are emitted as events
    /// against the new path before `MailboxOpen`.
    pub async fn select(&mut self, path: &str, options: SelectOptions) -> Result<SelectResult> {
        self.require_authenticated()?;

        // The folder cache supplies delimiter and special-use for the new
        // mailbox record.
        let mut normalized = normalize_path(path, None);
        if !self.folders.contains_key(&normalized) {
            let listing = self
                .list(
                    "",
                    path,
                    ListOptions {
                        list_only: true,
                        ..ListOptions::default()
                    },
                )
                .await;
            if let Err(err) = listing {
                tracing::debug!(conn = self.id(), path, %err, "pre-select LIST failed");
            }
        }
        let cached = self.folders.get(&normalized).cloned().or_else(|| {
            // Retry the lookup with the delimiter-aware normalization.
            let delimiter = self.folders.values().find_map(|f| f.delimiter);
            normalized = normalize_path(path, delimiter);
            self.folders.get(&normalized).cloned()
        });

        let qresync_requested = self.enabled().contains("QRESYNC")
            && options.changed_since.is_some()
            && options.uid_validity.is_some();

        let mut args = vec![mailbox_argument(path, self.utf8_accepted())];
        if qresync_requested
            && let (Some(uid_validity), Some(changed_since)) =
                (options.uid_validity, options.changed_since)
        {
            args.push(Argument::List(vec![
                Argument::Atom("QRESYNC".into()),
                Argument::List(vec![
                    Argument::Number(uid_validity),
                    Argument::Number(changed_since),
                ]),
            ]));
        }

        let command = if options.read_only { "EXAMINE" } else { "SELECT" };
        let was_selected = self.state() == ConnectionState::Selected;

        // The old mailbox is gone the moment the server accepts (or even
        // rejects) the SELECT; take it out so replayed VANISHED/FETCH route
        // against the new path.
        let previous = self.mailbox.take();
        self.pending_select_path = Some(normalized.clone());
        let result = self
            .exec(
                command,
                args,
                ExecOptions::collecting(&["FLAGS", "EXISTS", "OK"]),
            )
            .await;
        self.pending_select_path = None;

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                // A failed SELECT leaves the connection deselected.
                if let Some(previous) = previous {
                    self.events.emit(MailEvent::MailboxClose(previous));
                }
                if was_selected {
                    self.set_state(ConnectionState::Authenticated);
                }
                return Err(err);
            }
        };

        let mut mailbox = SelectedMailbox {
            path: normalized.clone(),
            read_only: options.read_only,
            ..SelectedMailbox::default()
        };
        if let Some(cached) = cached {
            mailbox.delimiter = cached.delimiter;
            mailbox.special_use = cached.special_use;
        }

        for resp in &result.collected {
            match resp.name.as_str() {
                "FLAGS" => {
                    if let Some(items) = resp.attributes.first().and_then(Value::as_list) {
                        mailbox.flags = Flags::parse(items.iter().filter_map(Value::as_str));
                    }
                }
                "EXISTS" => {
                    if let Some(count) = resp.number {
                        mailbox.exists = count;
                    }
                }
                "OK" => apply_select_code(&mut mailbox, resp.code.as_ref()),
                _ => {}
            }
        }
        apply_select_code(&mut mailbox, result.tagged.code.as_ref());

        let qresync = qresync_requested
            && Some(mailbox.uid_validity) == options.uid_validity
            && mailbox.highest_modseq.is_some()
            && !mailbox.no_modseq;

        // Re-selecting the same path is a resync: neither close nor open is
        // emitted.
        let same_path = previous.as_ref().is_some_and(|p| p.path == mailbox.path);
        if let Some(previous) = previous
            && !same_path
        {
            self.events.emit(MailEvent::MailboxClose(previous));
        }
        if !same_path {
            self.events.emit(MailEvent::MailboxOpen(mailbox.clone()));
        }
        self.mailbox = Some(mailbox.clone());
        self.set_state(ConnectionState::Selected);
        self.last_select = Some((path.to_string(), options.read_only));

        Ok(SelectResult { mailbox, qresync })
    }

    /// Opens a mailbox read-only. Shorthand for EXAMINE.
    pub async fn examine(&mut self, path: &str) -> Result<SelectResult> {
        self.select(
            path,
            SelectOptions {
                read_only: true,
                ..SelectOptions::default()
            },
        )
        .await
    }
}

fn apply_select_code(mailbox: &mut SelectedMailbox, code: Option<&ResponseCode>) {
    match code {
        Some(ResponseCode::PermanentFlags(flags)) => {
            mailbox.permanent_flags = flags.clone();
        }
        Some(ResponseCode::UidNext(uid_next)) => mailbox.uid_next = *uid_next,
        Some(ResponseCode::UidValidity(uid_validity)) => mailbox.uid_validity = *uid_validity,
        Some(ResponseCode::HighestModSeq(modseq)) => mailbox.advance_modseq(*modseq),
        Some(ResponseCode::NoModSeq) => mailbox.no_modseq = true,
        Some(ResponseCode::MailboxId(id)) => mailbox.mailbox_id = Some(id.clone()),
        Some(ResponseCode::ReadOnly) => mailbox.read_only = true,
        Some(ResponseCode::ReadWrite) => mailbox.read_only = false,
        _ => {}
    }
}
