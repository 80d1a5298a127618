// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::{Action, EventKind, Verb};

#[tokio::test]
async fn submit_then_reply_resolves_the_waiting_receiver() {
    let (transport, producer) = PubSubTransport::new();
    let action = Action::new("op", Verb::Subscribe);
    let reply_token = action.correlation_id.to_string();
    let rx = producer.submit(Inbound { action, reply_token: reply_token.clone() }).await.unwrap();

    let inbound = transport.receive().await.unwrap();
    assert_eq!(inbound.reply_token, reply_token);

    let result = ResultMsg::ok(
        fleet_core::CorrelationId::from_string(reply_token.clone()),
        "done",
        vec![],
        0,
    );
    transport.reply(&reply_token, &result).await;

    let received = rx.await.unwrap();
    assert_eq!(received.message, "done");
}

#[tokio::test]
async fn publish_reaches_subscribers_and_is_replayable() {
    let (transport, _producer) = PubSubTransport::new();
    let mut subscriber = transport.subscribe();

    let event = Event::new(EventKind::TaskAssigned, "tsk-abc", 1_000);
    transport.publish(&event).await;

    let received = subscriber.recv().await.unwrap();
    assert_eq!(received.subject, "tsk-abc");

    let replayed = transport.replay();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].subject, "tsk-abc");
}
