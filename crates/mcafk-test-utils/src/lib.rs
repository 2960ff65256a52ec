//! Test doubles and helpers for the mcafk workspace.
//!
//! Provides a scripted stub predictor for exercising the combined predictor's
//! composition rules, plus small event-collection helpers.

mod stub;

use std::time::Duration;

use tokio::sync::broadcast;

use mcafk_core::protocol::PredictorEvent;

pub use stub::StubPredictor;

/// Drain every event currently buffered on a receiver.
pub fn drain_events(rx: &mut broadcast::Receiver<PredictorEvent>) -> Vec<PredictorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Collect `count` events, failing the test on timeout.
pub async fn collect_events(
    rx: &mut broadcast::Receiver<PredictorEvent>,
    count: usize,
    timeout: Duration,
) -> Vec<PredictorEvent> {
    let mut events = Vec::with_capacity(count);
    let deadline = tokio::time::Instant::now() + timeout;

    while events.len() < count {
        let event = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out with {}/{count} events", events.len()))
            .expect("event stream closed");
        events.push(event);
    }

    events
}
