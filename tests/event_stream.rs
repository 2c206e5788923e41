//! Event log round-trip laws and observer catch-up equivalence.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use callflow::adapters::memory::InMemorySessionStore;
use callflow::adapters::websocket::ObserverHub;
use callflow::domain::flow::FlowConfig;
use callflow::domain::foundation::SessionId;
use callflow::domain::session::{EventEnvelope, SessionEvent, SessionState};
use callflow::ports::SessionStore;

use common::assert_gapless;

async fn bare_session() -> (Arc<InMemorySessionStore>, SessionId) {
    let store = Arc::new(InMemorySessionStore::new());
    let session_id = SessionId::new();
    let flow: FlowConfig = serde_json::from_value(serde_json::json!({
        "meta": {"name": "stream-probe"},
        "start": "A",
        "states": {"A": {}}
    }))
    .unwrap();
    store
        .create_session(&SessionState::new(session_id, "A"), &flow)
        .await
        .unwrap();
    (store, session_id)
}

fn numbered_say(n: u64) -> SessionEvent {
    SessionEvent::Say {
        text: format!("event {}", n),
    }
}

/// Emitting N events then range-reading from 0 returns exactly those N
/// events in order.
#[tokio::test]
async fn emitting_then_reading_round_trips_in_order() {
    let (store, session_id) = bare_session().await;

    for n in 1..=20 {
        store.emit(&session_id, numbered_say(n)).await.unwrap();
    }

    let events = store.read_events(&session_id, 0).await.unwrap();
    assert_eq!(events.len(), 20);
    assert_gapless(&events);
    for (index, envelope) in events.iter().enumerate() {
        assert_eq!(envelope.event, numbered_say(index as u64 + 1));
    }
}

/// S5: an observer that disconnects, reconnects, and catches up from its
/// last acknowledged seq sees the same total sequence as an observer
/// that never disconnected, after de-duplicating by seq.
#[tokio::test]
async fn reconnecting_observer_matches_continuous_observer_after_dedup() {
    let (store, session_id) = bare_session().await;
    let hub = Arc::new(ObserverHub::new(store.clone() as Arc<dyn SessionStore>));

    let mut continuous = hub.attach(&session_id).await.unwrap();
    let mut flaky = hub.attach(&session_id).await.unwrap();

    // Phase one: both observers see seq 1..=5.
    for n in 1..=5 {
        store.emit(&session_id, numbered_say(n)).await.unwrap();
    }
    let mut continuous_seen: Vec<EventEnvelope> = Vec::new();
    let mut flaky_seen: Vec<EventEnvelope> = Vec::new();
    for _ in 0..5 {
        continuous_seen.push(continuous.recv().await.unwrap());
        flaky_seen.push(flaky.recv().await.unwrap());
    }

    // The flaky observer disconnects after seq 5.
    drop(flaky);
    hub.detach(&session_id).await;

    // Events 6..=8 happen while it is away.
    for n in 6..=8 {
        store.emit(&session_id, numbered_say(n)).await.unwrap();
    }
    for _ in 6..=8 {
        continuous_seen.push(continuous.recv().await.unwrap());
    }

    // Reconnect at seq 8, then catch up from the last acknowledged seq.
    let mut reconnected = hub.attach(&session_id).await.unwrap();
    let caught_up = store.read_events(&session_id, 5).await.unwrap();
    flaky_seen.extend(caught_up);

    // One more live event lands for both.
    store.emit(&session_id, numbered_say(9)).await.unwrap();
    continuous_seen.push(continuous.recv().await.unwrap());
    flaky_seen.push(reconnected.recv().await.unwrap());

    // De-dup by seq and compare the totals.
    let dedup = |seen: Vec<EventEnvelope>| -> BTreeMap<u64, SessionEvent> {
        seen.into_iter()
            .map(|envelope| (envelope.seq, envelope.event))
            .collect()
    };
    let continuous_total = dedup(continuous_seen);
    let flaky_total = dedup(flaky_seen);

    assert_eq!(continuous_total.len(), 9);
    assert_eq!(continuous_total, flaky_total);
}

/// A late observer that range-reads before subscribing observes the same
/// totals as one attached from the start.
#[tokio::test]
async fn late_observer_catches_up_through_the_log() {
    let (store, session_id) = bare_session().await;
    let hub = Arc::new(ObserverHub::new(store.clone() as Arc<dyn SessionStore>));

    for n in 1..=4 {
        store.emit(&session_id, numbered_say(n)).await.unwrap();
    }

    let mut live = hub.attach(&session_id).await.unwrap();
    let replayed = store.read_events(&session_id, 0).await.unwrap();
    assert_eq!(replayed.len(), 4);

    store.emit(&session_id, numbered_say(5)).await.unwrap();
    let live_event = live.recv().await.unwrap();

    let mut seen: BTreeMap<u64, SessionEvent> = replayed
        .into_iter()
        .map(|envelope| (envelope.seq, envelope.event))
        .collect();
    seen.insert(live_event.seq, live_event.event);

    let seqs: Vec<u64> = seen.keys().copied().collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
}
