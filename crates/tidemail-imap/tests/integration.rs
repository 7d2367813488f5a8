//! Integration tests against a scripted IMAP server.
//!
//! `tokio_test::io::Builder` enforces the exact wire sequence: every write
//! expectation must match the bytes the client sends, and reads are only
//! delivered once the preceding writes happened. This pins both the
//! request encoding and the response processing.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio_test::io::{Builder, Mock};

use tidemail_imap::connection::ImapConnection;
use tidemail_imap::{
    AppendOptions, CopyOptions, ExpungeOptions, ImapClient, ImapConfig, ListOptions, MailEvent,
    SelectOptions, SpecialUseHints, StatusQuery,
};

fn config() -> ImapConfig {
    ImapConfig::builder("imap.test").credentials("user", "pass").build()
}

/// Greeting + LOGIN exchange shared by most scripts. Capabilities ride on
/// the greeting and the login OK so no CAPABILITY round trip is needed.
fn handshake(builder: &mut Builder, caps: &str) {
    builder
        .read(format!("* OK [CAPABILITY {caps}] ready\r\n").as_bytes())
        .write(b"A1 LOGIN \"user\" \"pass\"\r\n")
        .read(format!("A1 OK [CAPABILITY {caps}] done\r\n").as_bytes());
}

/// Pre-select LIST plus SELECT of INBOX (tags A<n> and A<n+1>).
fn select_inbox(builder: &mut Builder, n: u32, select_codes: &str) {
    builder
        .write(format!("A{n} LIST \"\" INBOX\r\n").as_bytes())
        .read(
            format!("* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\nA{n} OK done\r\n").as_bytes(),
        )
        .write(format!("A{} SELECT INBOX\r\n", n + 1).as_bytes())
        .read(format!("{select_codes}A{} OK [READ-WRITE] done\r\n", n + 1).as_bytes());
}

async fn connected(
    mock: Mock,
) -> (
    ImapConnection<Mock>,
    tokio::sync::mpsc::UnboundedReceiver<MailEvent>,
) {
    let (mut conn, events) = ImapConnection::new(mock, config());
    conn.read_greeting().await.unwrap();
    conn.login().await.unwrap();
    (conn, events)
}

#[tokio::test]
async fn list_resolves_special_use_with_hint_priority() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 SPECIAL-USE");
    builder
        .write(b"A2 LIST \"\" \"*\"\r\n")
        .read(
            b"* LIST (\\HasChildren) \"/\" \"INBOX\"\r\n\
              * LIST (\\Sent) \"/\" \"Sent\"\r\n\
              * LIST (\\HasNoChildren) \"/\" \"INBOX/Sent\"\r\n\
              A2 OK done\r\n",
        )
        .write(b"A3 LSUB \"\" \"*\"\r\n")
        .read(b"* LSUB () \"/\" \"Sent\"\r\nA3 OK done\r\n");

    let (mut conn, _events) = connected(builder.build()).await;

    let folders = conn
        .list(
            "",
            "*",
            ListOptions {
                special_use_hints: Some(SpecialUseHints {
                    sent: Some("INBOX/Sent".to_string()),
                    ..SpecialUseHints::default()
                }),
                ..ListOptions::default()
            },
        )
        .await
        .unwrap();

    // Special-use entries first in canonical order, then the rest.
    let summary: Vec<(&str, Option<&str>)> = folders
        .iter()
        .map(|f| (f.path.as_str(), f.special_use.map(|s| s.as_str())))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("INBOX", Some("\\Inbox")),
            ("INBOX/Sent", Some("\\Sent")),
            ("Sent", None),
        ]
    );

    // The user hint outranked the server's \Sent attribute on "Sent".
    assert_eq!(
        folders[1].special_use_source,
        Some(tidemail_imap::SpecialUseSource::User)
    );
    // LSUB decorated the listed entry; INBOX is always subscribed.
    assert!(folders[2].subscribed);
    assert!(folders[0].subscribed);
    // No two entries share a path or a role.
    assert_eq!(
        folders.iter().filter(|f| f.special_use.is_some()).count(),
        2
    );
}

#[tokio::test]
async fn append_returns_appenduid() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 UIDPLUS LITERAL+");
    builder
        .write(b"A2 APPEND INBOX {11+}\r\n")
        .write(b"hello world")
        .write(b"\r\n")
        .read(b"A2 OK [APPENDUID 14 42] APPEND completed\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    let result = conn
        .append("INBOX", b"hello world", AppendOptions::default())
        .await
        .unwrap();

    assert_eq!(result.uid, Some(42));
    assert_eq!(result.uid_validity, Some(14));
    assert_eq!(result.seq, None);
}

#[tokio::test]
async fn append_to_current_recovers_seq_and_uid() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1");
    select_inbox(&mut builder, 2, "* 4 EXISTS\r\n");
    builder
        .write(b"A4 APPEND INBOX {5}\r\n")
        .read(b"+ go ahead\r\n")
        .write(b"hello")
        .write(b"\r\n")
        .read(b"A4 OK done\r\n")
        // Server held the EXISTS back; NOOP flushes it.
        .write(b"A5 NOOP\r\n")
        .read(b"* 5 EXISTS\r\nA5 OK done\r\n")
        // No UIDPLUS: the UID comes from UID SEARCH on the sequence.
        .write(b"A6 UID SEARCH 5\r\n")
        .read(b"* SEARCH 105\r\nA6 OK done\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    conn.select("INBOX", SelectOptions::default()).await.unwrap();

    let result = conn
        .append("INBOX", b"hello", AppendOptions::default())
        .await
        .unwrap();
    assert_eq!(result.seq, Some(5));
    assert_eq!(result.uid, Some(105));
}

#[tokio::test]
async fn expunge_advances_highest_modseq() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 CONDSTORE");
    select_inbox(
        &mut builder,
        2,
        "* 4 EXISTS\r\n* OK [HIGHESTMODSEQ 100] ok\r\n",
    );
    builder
        .write(b"A4 STORE 1:2 +FLAGS.SILENT (\\Deleted)\r\n")
        .read(b"A4 OK done\r\n")
        .write(b"A5 EXPUNGE\r\n")
        .read(b"* 2 EXPUNGE\r\n* 1 EXPUNGE\r\nA5 OK [HIGHESTMODSEQ 122] Expunge completed\r\n");

    let (mut conn, mut events) = connected(builder.build()).await;
    conn.select("INBOX", SelectOptions::default()).await.unwrap();
    assert_eq!(conn.mailbox().unwrap().highest_modseq, Some(100));

    conn.expunge_range("1:2", ExpungeOptions::default())
        .await
        .unwrap();

    let mailbox = conn.mailbox().unwrap();
    assert_eq!(mailbox.highest_modseq, Some(122));
    assert_eq!(mailbox.exists, 2);

    // MailboxOpen, then one expunge event per untagged EXPUNGE.
    assert!(matches!(events.try_recv().unwrap(), MailEvent::MailboxOpen(_)));
    let mut seqs = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let MailEvent::Expunge { seq: Some(seq), .. } = event {
            seqs.push(seq);
        }
    }
    assert_eq!(seqs, vec![2, 1]);
}

#[tokio::test]
async fn qresync_select_replays_changes() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 ENABLE CONDSTORE QRESYNC");
    builder
        .write(b"A2 ENABLE QRESYNC CONDSTORE\r\n")
        .read(b"* ENABLED QRESYNC CONDSTORE\r\nA2 OK enabled\r\n")
        .write(b"A3 LIST \"\" INBOX\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\nA3 OK done\r\n")
        .write(b"A4 SELECT INBOX (QRESYNC (7 100))\r\n")
        .read(
            b"* 10 EXISTS\r\n\
              * FLAGS (\\Seen \\Deleted)\r\n\
              * OK [UIDVALIDITY 7] ok\r\n\
              * OK [UIDNEXT 100] ok\r\n\
              * OK [HIGHESTMODSEQ 150] ok\r\n\
              * VANISHED (EARLIER) 3,5,7:9\r\n\
              * 2 FETCH (UID 24 FLAGS (\\Seen))\r\n\
              * 4 FETCH (UID 28 FLAGS (\\Flagged) MODSEQ (149))\r\n\
              A4 OK [READ-WRITE] done\r\n",
        );

    let (mut conn, mut events) = connected(builder.build()).await;
    conn.enable(&["QRESYNC", "CONDSTORE"]).await.unwrap();

    let result = conn
        .select(
            "INBOX",
            SelectOptions {
                changed_since: Some(100),
                uid_validity: Some(7),
                ..SelectOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(result.qresync);
    assert_eq!(result.mailbox.uid_validity, 7);
    assert_eq!(result.mailbox.highest_modseq, Some(150));
    assert_eq!(result.mailbox.exists, 10);

    let mut expunged = Vec::new();
    let mut flag_seqs = Vec::new();
    let mut opened = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            MailEvent::Expunge { uid: Some(uid), .. } => expunged.push(uid),
            MailEvent::Flags { seq, .. } => flag_seqs.push(seq),
            MailEvent::MailboxOpen(_) => opened += 1,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(expunged, vec![3, 5, 7, 8, 9]);
    assert_eq!(flag_seqs, vec![2, 4]);
    assert_eq!(opened, 1);
}

#[tokio::test]
async fn idle_breaks_before_next_command() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 IDLE");
    select_inbox(&mut builder, 2, "* 1 EXISTS\r\n");
    builder
        .write(b"A4 IDLE\r\n")
        .read(b"+ idling\r\n")
        // The next command first terminates the IDLE...
        .write(b"DONE\r\n")
        .read(b"A4 OK IDLE terminated\r\n")
        // ...and only then goes out itself.
        .write(b"A5 NOOP\r\n")
        .read(b"A5 OK done\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    conn.select("INBOX", SelectOptions::default()).await.unwrap();

    assert!(conn.idle_begin().await.unwrap());
    conn.noop().await.unwrap();
}

#[tokio::test]
async fn idle_wait_routes_pushed_updates() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 IDLE");
    select_inbox(&mut builder, 2, "* 1 EXISTS\r\n");
    builder
        .write(b"A4 IDLE\r\n")
        .read(b"+ idling\r\n")
        .read(b"* 2 EXISTS\r\n")
        .write(b"DONE\r\n")
        .read(b"A4 OK done\r\n");

    let (mut conn, mut events) = connected(builder.build()).await;
    conn.select("INBOX", SelectOptions::default()).await.unwrap();
    let _ = events.try_recv(); // MailboxOpen

    conn.idle_begin().await.unwrap();
    let outcome = conn.idle_wait(Duration::from_secs(5)).await.unwrap();
    assert_eq!(outcome, tidemail_imap::connection::IdleOutcome::Activity);
    conn.idle_done().await.unwrap();

    assert_eq!(conn.mailbox().unwrap().exists, 2);
    assert!(matches!(
        events.try_recv().unwrap(),
        MailEvent::Exists {
            count: 2,
            prev_count: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn status_on_missing_mailbox_is_not_found() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1");
    builder
        .write(b"A2 STATUS Bogus (MESSAGES)\r\n")
        .read(b"A2 NO Unknown mailbox\r\n")
        .write(b"A3 LIST \"\" Bogus\r\n")
        .read(b"A3 OK done\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    let err = conn
        .status(
            "Bogus",
            StatusQuery {
                messages: true,
                ..StatusQuery::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, tidemail_imap::Error::NotFound(_)));
    assert_eq!(err.to_string(), "Mailbox doesn't exist: Bogus");
}

#[tokio::test]
async fn status_mirrors_onto_selected_mailbox() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1");
    select_inbox(&mut builder, 2, "* 4 EXISTS\r\n* OK [UIDNEXT 10] ok\r\n");
    builder
        .write(b"A4 STATUS INBOX (MESSAGES UIDNEXT)\r\n")
        .read(b"* STATUS INBOX (MESSAGES 7 UIDNEXT 12)\r\nA4 OK done\r\n");

    let (mut conn, mut events) = connected(builder.build()).await;
    conn.select("INBOX", SelectOptions::default()).await.unwrap();
    let _ = events.try_recv(); // MailboxOpen

    let status = conn
        .status(
            "INBOX",
            StatusQuery {
                messages: true,
                uid_next: true,
                ..StatusQuery::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(status.messages, Some(7));
    let mailbox = conn.mailbox().unwrap();
    assert_eq!(mailbox.exists, 7);
    assert_eq!(mailbox.uid_next, 12);
    assert!(matches!(
        events.try_recv().unwrap(),
        MailEvent::Exists {
            count: 7,
            prev_count: 4,
            ..
        }
    ));
}

#[tokio::test]
async fn copy_builds_ordered_uid_map() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 UIDPLUS");
    select_inbox(&mut builder, 2, "* 3 EXISTS\r\n");
    builder
        .write(b"A4 UID COPY 1:3 Archive\r\n")
        .read(b"A4 OK [COPYUID 38505 1:3 101:103] done\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    conn.select("INBOX", SelectOptions::default()).await.unwrap();

    let result = conn
        .copy_messages("1:3", "Archive", CopyOptions { uid: true })
        .await
        .unwrap();

    assert_eq!(result.uid_validity, Some(38505));
    assert_eq!(result.uid_map, vec![(1, 101), (2, 102), (3, 103)]);
    let destinations: std::collections::HashSet<u32> =
        result.uid_map.iter().map(|&(_, d)| d).collect();
    assert_eq!(destinations.len(), result.uid_map.len());
}

#[tokio::test]
async fn capability_is_cached_until_update_expected() {
    let builder = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n")
        .build();

    let (mut conn, _events) = ImapConnection::new(builder, config());
    conn.read_greeting().await.unwrap();

    // No wire traffic: the mock has no further expectations, so a stray
    // CAPABILITY command would fail the test.
    let first = conn.capability().await.unwrap();
    let second = conn.capability().await.unwrap();
    assert!(first.has("IDLE"));
    assert!(second.has("IDLE"));
}

#[tokio::test]
async fn select_failure_deselects() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1");
    select_inbox(&mut builder, 2, "* 4 EXISTS\r\n");
    builder
        .write(b"A4 LIST \"\" Broken\r\n")
        .read(b"* LIST () \"/\" \"Broken\"\r\nA4 OK done\r\n")
        .write(b"A5 SELECT Broken\r\n")
        .read(b"A5 NO cannot open\r\n");

    let (mut conn, mut events) = connected(builder.build()).await;
    conn.select("INBOX", SelectOptions::default()).await.unwrap();
    let _ = events.try_recv(); // MailboxOpen(INBOX)

    let err = conn.select("Broken", SelectOptions::default()).await;
    assert!(err.is_err());
    assert_eq!(
        conn.state(),
        tidemail_imap::ConnectionState::Authenticated
    );
    assert!(conn.mailbox().is_none());
    assert!(matches!(
        events.try_recv().unwrap(),
        MailEvent::MailboxClose(mailbox) if mailbox.path == "INBOX"
    ));
}

#[tokio::test]
async fn compress_negotiation_switches_the_stream() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 COMPRESS=DEFLATE");
    builder
        .write(b"A2 COMPRESS DEFLATE\r\n")
        .read(b"A2 OK DEFLATE active\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    assert!(!conn.is_compressed());
    assert!(conn.compress().await.unwrap());
    assert!(conn.is_compressed());
}

#[tokio::test]
async fn compress_refusal_leaves_stream_unchanged() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1 COMPRESS=DEFLATE");
    builder
        .write(b"A2 COMPRESS DEFLATE\r\n")
        .read(b"A2 NO not today\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    assert!(!conn.compress().await.unwrap());
    assert!(!conn.is_compressed());
}

#[tokio::test]
async fn create_tolerates_already_exists() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1");
    builder
        .write(b"A2 CREATE Archive\r\n")
        .read(b"A2 NO [ALREADYEXISTS] duplicate\r\n");

    let (mut conn, _events) = connected(builder.build()).await;
    let result = conn.create("Archive").await.unwrap();
    assert!(!result.created);
    assert_eq!(result.path, "Archive");
}

#[tokio::test]
async fn mailbox_lock_serializes_acquires() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1");
    select_inbox(&mut builder, 2, "* 1 EXISTS\r\n");
    // Second acquire re-selects the same path; the folder cache is warm so
    // no LIST runs.
    builder
        .write(b"A4 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA4 OK [READ-WRITE] done\r\n");

    let (mut conn, events) = ImapConnection::new(builder.build(), config());
    conn.read_greeting().await.unwrap();
    conn.login().await.unwrap();
    let client = ImapClient::from_connection(conn, events);

    let lock = client
        .mailbox_lock("INBOX", SelectOptions::default())
        .await
        .unwrap();
    assert_eq!(lock.path(), "INBOX");

    let contender = client.clone();
    let acquired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let observed = std::sync::Arc::clone(&acquired);
    let task = tokio::spawn(async move {
        let lock = contender
            .mailbox_lock("INBOX", SelectOptions::default())
            .await
            .unwrap();
        observed.store(true, std::sync::atomic::Ordering::SeqCst);
        drop(lock);
    });

    // The contender must not get the lock while we hold it.
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert!(!acquired.load(std::sync::atomic::Ordering::SeqCst));

    drop(lock);
    task.await.unwrap();
    assert!(acquired.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn logout_after_server_bye_still_succeeds() {
    let mut builder = Builder::new();
    handshake(&mut builder, "IMAP4rev1");
    builder
        .write(b"A2 LOGOUT\r\n")
        .read(b"* BYE see you\r\nA2 OK bye\r\n");

    let (mut conn, mut events) = connected(builder.build()).await;
    conn.logout().await.unwrap();
    assert_eq!(conn.state(), tidemail_imap::ConnectionState::Logout);
    assert!(matches!(events.try_recv().unwrap(), MailEvent::Close));

    // Idempotent: a second logout is a no-op on the wire.
    conn.logout().await.unwrap();
}
