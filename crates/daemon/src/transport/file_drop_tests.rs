// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::{Action, Event, EventKind, ResultMsg, Verb};
use tempfile::tempdir;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn receives_a_dropped_request_and_writes_the_reply() {
    let dir = tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let outbox = dir.path().join("outbox");
    let events = dir.path().join("events.log");
    tokio::fs::create_dir_all(&inbox).await.unwrap();
    tokio::fs::create_dir_all(&outbox).await.unwrap();

    let transport = FileDropTransport::spawn(inbox.clone(), outbox.clone(), events.clone());

    // Atomic drop: write to a staging file, then rename into place.
    let staging = dir.path().join("req-1.tmp");
    tokio::fs::write(&staging, b"status\n").await.unwrap();
    tokio::fs::rename(&staging, inbox.join("req-1.txt")).await.unwrap();

    let inbound = timeout(Duration::from_secs(2), transport.receive()).await.unwrap().unwrap();
    assert!(matches!(inbound.action.verb, Verb::Status { .. }));
    assert_eq!(inbound.reply_token, "req-1");

    let result = ResultMsg::ok(Action::new("op", Verb::Subscribe).correlation_id, "done", vec![], 0);
    transport.reply(&inbound.reply_token, &result).await;

    let reply_path = outbox.join("req-1.result");
    for _ in 0..20 {
        if reply_path.exists() {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    let body = tokio::fs::read_to_string(&reply_path).await.unwrap();
    assert!(body.starts_with("OK"));
}

#[tokio::test]
async fn publish_appends_an_event_line() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("events.log");
    let inbox = dir.path().join("inbox");
    let outbox = dir.path().join("outbox");
    tokio::fs::create_dir_all(&inbox).await.unwrap();
    tokio::fs::create_dir_all(&outbox).await.unwrap();

    let transport = FileDropTransport::spawn(inbox, outbox, events.clone());
    transport.publish(&Event::new(EventKind::Internal, "boot", 0)).await;

    let body = tokio::fs::read_to_string(&events).await.unwrap();
    assert!(body.contains("EVENT"));
}
