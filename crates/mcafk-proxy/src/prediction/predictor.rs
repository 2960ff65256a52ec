//! The predictor contract and the shared driver.
//!
//! `PacketPredictor` is the capability surface every predictor exposes:
//! `begin`/`end` lifecycle, the `in_queue` suppression flag and an event
//! stream. `DrivenPredictor` carries the machinery common to all concrete
//! predictors - subscription, cadence timer, suppression gate - around a
//! per-concern `Model` state machine, so a concrete predictor is just a model
//! plus a name and a cadence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use mcafk_core::constants::EVENT_CHANNEL_CAPACITY;
use mcafk_core::link::{Controller, LinkState, PacketLink};
use mcafk_core::protocol::{PacketFrame, PredictorEvent, SyntheticAction};
use mcafk_core::{Error, Result};

/// The capability surface of a packet queue predictor.
///
/// Lifecycle is a two-state machine: `idle -> active` on `begin()`,
/// `active -> idle` on `end()`. Both calls are idempotent no-ops when
/// re-entered. While `in_queue()` is true the predictor emits no synthetic
/// events; observations keep flowing so state never goes stale.
pub trait PacketPredictor: Send + Sync {
    /// Stable predictor name, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Start observing the bound link. No-op while already active.
    ///
    /// Fails when the remote session has not spawned; a predictor never
    /// samples a half-established connection.
    fn begin(&self) -> Result<()>;

    /// Stop observing and discard transient state. No-op while idle.
    ///
    /// Safe to call repeatedly and from within event handlers; armed timers
    /// die with the driver.
    fn end(&self) -> Result<()>;

    /// True between `begin()` and `end()`.
    fn is_active(&self) -> bool;

    /// True while a human operator is driving the session.
    fn in_queue(&self) -> bool;

    /// Route a human attach/detach transition into the suppression gate.
    fn set_in_queue(&self, in_queue: bool);

    /// Subscribe to this predictor's event stream.
    fn events(&self) -> broadcast::Receiver<PredictorEvent>;
}

/// Per-concern state machine driven by [`DrivenPredictor`].
///
/// `observe` must never fail: malformed payloads are ignored for prediction
/// purposes and the packet path stays infallible.
pub trait Model: Send + 'static {
    /// Ingest one frame, returning the observations it produced.
    fn observe(&mut self, frame: &PacketFrame) -> Vec<PredictorEvent>;

    /// One scheduling interval elapsed; derive a refresh action from the most
    /// recently observed true state, or nothing.
    fn tick(&mut self) -> Option<SyntheticAction>;

    /// Discard transient state.
    fn reset(&mut self);
}

struct DriverInner<M: Model> {
    name: &'static str,
    cadence: Duration,
    link: Arc<dyn PacketLink>,
    events_tx: broadcast::Sender<PredictorEvent>,
    active: AtomicBool,
    /// Human attachment as observed on the link's control watch.
    attached: AtomicBool,
    /// Human attachment as routed in by the session controller.
    ///
    /// Either flag suppresses synthetics; keeping them separate means a
    /// controller transition and a late watch notification can never undo
    /// each other.
    forced: AtomicBool,
    model: Mutex<M>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<M: Model> DriverInner<M> {
    /// A poisoned lock only means an observer panicked mid-update; the model
    /// itself is still the last consistent state.
    fn model(&self) -> MutexGuard<'_, M> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PredictorEvent) {
        if self.active.load(Ordering::SeqCst) {
            let _ = self.events_tx.send(event);
        }
    }

    fn in_queue(&self) -> bool {
        self.attached.load(Ordering::SeqCst) || self.forced.load(Ordering::SeqCst)
    }
}

/// A predictor assembled from a model, a name and a cadence.
pub struct DrivenPredictor<M: Model> {
    inner: Arc<DriverInner<M>>,
}

impl<M: Model> DrivenPredictor<M> {
    pub(crate) fn from_model(
        name: &'static str,
        cadence: Duration,
        link: Arc<dyn PacketLink>,
        model: M,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DriverInner {
                name,
                cadence,
                link,
                events_tx,
                active: AtomicBool::new(false),
                attached: AtomicBool::new(false),
                forced: AtomicBool::new(false),
                model: Mutex::new(model),
                task: Mutex::new(None),
            }),
        }
    }
}

impl<M: Model> PacketPredictor for DrivenPredictor<M> {
    fn name(&self) -> &'static str {
        self.inner.name
    }

    fn begin(&self) -> Result<()> {
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if *self.inner.link.state().borrow() != LinkState::Spawned {
            self.inner.active.store(false, Ordering::SeqCst);
            return Err(Error::NotSpawned {
                predictor: self.inner.name,
            });
        }

        // Fresh sampling: whatever a previous activation left behind is gone.
        self.inner.model().reset();
        let attached = *self.inner.link.control().borrow() == Controller::Human;
        self.inner.attached.store(attached, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(drive(inner));
        *self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        debug!(predictor = self.inner.name, "predictor active");
        Ok(())
    }

    fn end(&self) -> Result<()> {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(task) = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.inner.model().reset();

        debug!(predictor = self.inner.name, "predictor idle");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    fn in_queue(&self) -> bool {
        self.inner.in_queue()
    }

    fn set_in_queue(&self, in_queue: bool) {
        self.inner.forced.store(in_queue, Ordering::SeqCst);
    }

    fn events(&self) -> broadcast::Receiver<PredictorEvent> {
        self.inner.events_tx.subscribe()
    }
}

/// The driver loop: one task per active predictor.
///
/// All model mutation happens here (or under the model lock from `begin`/
/// `end`), so a state transition is atomic with respect to other handlers.
async fn drive<M: Model>(inner: Arc<DriverInner<M>>) {
    let mut frames = inner.link.packets();
    let mut control = inner.link.control();
    let mut state = inner.link.state();

    // Sync with whatever happened between begin() and this task starting;
    // a watch subscription only reports changes made after it exists.
    let attached = *control.borrow_and_update() == Controller::Human;
    inner.attached.store(attached, Ordering::SeqCst);
    if *state.borrow_and_update() == LinkState::Disconnected {
        return;
    }

    let mut ticker = tokio::time::interval(inner.cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick of an interval fires immediately; consume it so the
    // first synthetic waits a full cadence after begin().
    ticker.tick().await;

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    let events = inner.model().observe(&frame);
                    for event in events {
                        inner.emit(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(predictor = inner.name, missed, "frame stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                let attached = *control.borrow_and_update() == Controller::Human;
                inner.attached.store(attached, Ordering::SeqCst);
                debug!(predictor = inner.name, attached, "control transition");
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                if *state.borrow_and_update() == LinkState::Disconnected {
                    debug!(predictor = inner.name, "link disconnected, driver stopping");
                    break;
                }
            }
            _ = ticker.tick() => {
                if inner.in_queue() {
                    inner.link.metrics().record_suppressed();
                    trace!(predictor = inner.name, "synthetic suppressed");
                    continue;
                }
                let action = inner.model().tick();
                if let Some(action) = action {
                    inner.link.metrics().record_synthetic();
                    inner.emit(PredictorEvent::synthetic(action));
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mcafk_core::link::ChannelLink;
    use mcafk_core::protocol::{Observation, Packet};

    /// Minimal model: one observation per keep-alive, one fixed action per tick.
    struct EchoModel {
        ticks: u32,
    }

    impl Model for EchoModel {
        fn observe(&mut self, frame: &PacketFrame) -> Vec<PredictorEvent> {
            match frame.packet {
                Packet::KeepAlive { .. } => vec![PredictorEvent::observed(Observation::Breath {
                    oxygen: 300,
                })],
                _ => Vec::new(),
            }
        }

        fn tick(&mut self) -> Option<SyntheticAction> {
            self.ticks += 1;
            Some(SyntheticAction::Surface { oxygen: 10 })
        }

        fn reset(&mut self) {
            self.ticks = 0;
        }
    }

    fn echo_predictor(link: &ChannelLink) -> DrivenPredictor<EchoModel> {
        DrivenPredictor::from_model(
            "echo",
            Duration::from_millis(50),
            Arc::new(link.clone()),
            EchoModel { ticks: 0 },
        )
    }

    fn spawned_link() -> ChannelLink {
        let link = ChannelLink::new();
        link.set_state(LinkState::Spawned);
        link
    }

    #[tokio::test]
    async fn begin_fails_before_spawn() {
        let link = ChannelLink::new();
        let predictor = echo_predictor(&link);

        let err = predictor.begin().unwrap_err();
        assert!(matches!(err, Error::NotSpawned { predictor: "echo" }));
        assert!(!predictor.is_active());
    }

    #[tokio::test]
    async fn begin_is_idempotent() {
        let link = spawned_link();
        let predictor = echo_predictor(&link);

        predictor.begin().unwrap();
        predictor.begin().unwrap();
        assert!(predictor.is_active());

        let mut events = predictor.events();
        link.inject(PacketFrame::clientbound(Packet::KeepAlive { id: 1 }));
        tokio::time::sleep(Duration::from_millis(30)).await;

        // One frame, one observation: no duplicate subscriptions.
        let first = events.try_recv().unwrap();
        assert!(!first.is_synthetic());
        assert!(events.try_recv().is_err());

        predictor.end().unwrap();
    }

    #[tokio::test]
    async fn ticks_emit_synthetics_until_end() {
        let link = spawned_link();
        let predictor = echo_predictor(&link);
        let mut events = predictor.events();

        predictor.begin().unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        predictor.end().unwrap();

        let mut synthetic = 0;
        while let Ok(event) = events.try_recv() {
            assert!(event.is_synthetic());
            synthetic += 1;
        }
        assert!(synthetic >= 1);

        // Nothing emitted after end, whatever the link does.
        let mut after = predictor.events();
        link.inject(PacketFrame::clientbound(Packet::KeepAlive { id: 2 }));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(after.try_recv().is_err());
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let link = spawned_link();
        let predictor = echo_predictor(&link);

        predictor.begin().unwrap();
        predictor.end().unwrap();
        predictor.end().unwrap();
        assert!(!predictor.is_active());
    }

    #[tokio::test]
    async fn in_queue_gates_synthetics_not_observations() {
        let link = spawned_link();
        let predictor = echo_predictor(&link);
        let mut events = predictor.events();

        predictor.begin().unwrap();
        predictor.set_in_queue(true);
        assert!(predictor.in_queue());

        link.inject(PacketFrame::clientbound(Packet::KeepAlive { id: 3 }));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut saw_observation = false;
        while let Ok(event) = events.try_recv() {
            assert!(!event.is_synthetic(), "synthetic emitted while in queue");
            saw_observation = true;
        }
        assert!(saw_observation);

        predictor.end().unwrap();
    }

    #[tokio::test]
    async fn control_watch_drives_in_queue() {
        let link = spawned_link();
        let predictor = echo_predictor(&link);

        predictor.begin().unwrap();
        assert!(!predictor.in_queue());

        link.set_control(Controller::Human);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(predictor.in_queue());

        link.set_control(Controller::Bot);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!predictor.in_queue());

        predictor.end().unwrap();
    }

    #[tokio::test]
    async fn begin_initializes_in_queue_from_link() {
        let link = spawned_link();
        link.set_control(Controller::Human);

        let predictor = echo_predictor(&link);
        predictor.begin().unwrap();
        assert!(predictor.in_queue());

        predictor.end().unwrap();
    }
}
