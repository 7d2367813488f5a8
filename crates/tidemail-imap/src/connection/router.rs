//! Untagged-response router.
//!
//! Every untagged response passes through [`ImapConnection::route_untagged`]
//! exactly once, in arrival order: global connection state is updated and
//! events are emitted before the response is (possibly) handed to the
//! current command's collector.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{UntaggedResponse, Value};
use crate::commands::fetch::FetchedMessage;
use crate::commands::status::parse_status_items;
use crate::types::{Flags, ResponseCode, expand_sequence, normalize_path};

use super::{ImapConnection, MailEvent};

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Applies the global effect of one untagged response.
    pub(crate) fn route_untagged(&mut self, resp: &UntaggedResponse) {
        match resp.name.as_str() {
            "CAPABILITY" => {
                self.capabilities
                    .replace(resp.attributes.iter().filter_map(Value::as_str));
                self.expect_capability_update = false;
            }
            "OK" => self.route_ok(resp),
            "NO" => {
                tracing::warn!(conn = self.id(), text = %resp.text, "untagged NO from server");
            }
            "BAD" => {
                tracing::warn!(conn = self.id(), text = %resp.text, "untagged BAD from server");
            }
            "BYE" => {
                tracing::info!(conn = self.id(), text = %resp.text, "server closing connection");
                self.mark_closing();
            }
            "EXISTS" => self.route_exists(resp),
            "EXPUNGE" => self.route_expunge(resp),
            "VANISHED" => self.route_vanished(resp),
            "FETCH" => self.route_fetch(resp),
            "FLAGS" => {
                let flags = resp
                    .attributes
                    .first()
                    .and_then(Value::as_list)
                    .map(|items| Flags::parse(items.iter().filter_map(Value::as_str)));
                if let (Some(mailbox), Some(flags)) = (&mut self.mailbox, flags) {
                    mailbox.flags = flags;
                }
            }
            "STATUS" => self.route_status(resp),
            // Collector-only responses: the per-command dispatch table takes
            // them, nothing changes globally.
            "LIST" | "LSUB" | "XLIST" | "ID" | "NAMESPACE" | "SEARCH" | "SORT" | "ESEARCH"
            | "ENABLED" | "RECENT" => {}
            other => {
                tracing::trace!(conn = self.id(), name = other, "unhandled untagged response");
            }
        }
    }

    fn route_ok(&mut self, resp: &UntaggedResponse) {
        match &resp.code {
            Some(ResponseCode::Capability(tokens)) => {
                self.capabilities.replace(tokens.iter().map(String::as_str));
                self.expect_capability_update = false;
            }
            Some(ResponseCode::Alert) => {
                tracing::warn!(conn = self.id(), alert = %resp.text, "server alert");
                self.events.emit(MailEvent::Error(format!("ALERT: {}", resp.text)));
            }
            Some(ResponseCode::HighestModSeq(modseq)) => {
                if let Some(mailbox) = &mut self.mailbox {
                    mailbox.advance_modseq(*modseq);
                }
            }
            _ => {}
        }
    }

    fn route_exists(&mut self, resp: &UntaggedResponse) {
        let Some(count) = resp.number else { return };
        let Some(mailbox) = &mut self.mailbox else {
            return;
        };
        if let Some(prev_count) = mailbox.observe_exists(count) {
            let path = mailbox.path.clone();
            self.activity += 1;
            self.events.emit(MailEvent::Exists {
                path,
                count,
                prev_count,
            });
        }
    }

    fn route_expunge(&mut self, resp: &UntaggedResponse) {
        let Some(seq) = resp.number else { return };
        let Some(mailbox) = &mut self.mailbox else {
            return;
        };
        mailbox.exists = mailbox.exists.saturating_sub(1);
        let path = mailbox.path.clone();
        self.activity += 1;
        self.events.emit(MailEvent::Expunge {
            path,
            seq: Some(seq),
            uid: None,
        });
    }

    /// QRESYNC expunge notification: `VANISHED [(EARLIER)] <uid-set>`.
    fn route_vanished(&mut self, resp: &UntaggedResponse) {
        let set = resp
            .attributes
            .iter()
            .find_map(|value| match value {
                Value::List(_) => None,
                other => other.as_str(),
            });
        let Some(set) = set else { return };
        let Ok(uids) = expand_sequence(set, 0) else {
            tracing::warn!(conn = self.id(), set, "unparsable VANISHED set");
            return;
        };
        let Some(path) = self.event_path() else { return };
        for uid in uids {
            self.activity += 1;
            self.events.emit(MailEvent::Expunge {
                path: path.clone(),
                seq: None,
                uid: Some(uid),
            });
        }
    }

    fn route_fetch(&mut self, resp: &UntaggedResponse) {
        let Some(message) = FetchedMessage::from_untagged(resp) else {
            return;
        };
        if let Some(mailbox) = &mut self.mailbox {
            if let Some(uid) = message.uid {
                mailbox.observe_uid(uid);
            }
            if let Some(modseq) = message.modseq {
                mailbox.advance_modseq(modseq);
            }
        }
        // A FETCH carrying only flag data is a flag-change notification.
        if message.is_flag_update()
            && let Some(path) = self.event_path()
            && let Some(flags) = message.flags
        {
            self.activity += 1;
            self.events.emit(MailEvent::Flags {
                path,
                seq: message.seq,
                uid: message.uid,
                flags,
                modseq: message.modseq,
            });
        }
    }

    /// STATUS is collector-only, except that values for the currently
    /// selected mailbox are mirrored onto it.
    fn route_status(&mut self, resp: &UntaggedResponse) {
        let Some(path) = resp.attributes.first().and_then(Value::as_str) else {
            return;
        };
        let Some(items) = resp.attributes.get(1).and_then(Value::as_list) else {
            return;
        };
        let status = parse_status_items(items);

        let Some(mailbox) = &mut self.mailbox else {
            return;
        };
        let decoded = normalize_path(&crate::codec::decode_path(path), mailbox.delimiter);
        if decoded != mailbox.path {
            return;
        }
        if let Some(uid_next) = status.uid_next {
            mailbox.uid_next = mailbox.uid_next.max(uid_next);
        }
        if let Some(modseq) = status.highest_modseq {
            mailbox.advance_modseq(modseq);
        }
        if let Some(messages) = status.messages
            && let Some(prev_count) = mailbox.observe_exists(messages)
        {
            let path = mailbox.path.clone();
            self.activity += 1;
            self.events.emit(MailEvent::Exists {
                path,
                count: messages,
                prev_count,
            });
        }
    }

    /// Path for message events: the selected mailbox, or the mailbox being
    /// selected right now (pre-open QRESYNC replay).
    fn event_path(&self) -> Option<String> {
        self.mailbox
            .as_ref()
            .map(|mailbox| mailbox.path.clone())
            .or_else(|| self.pending_select_path.clone())
    }
}
