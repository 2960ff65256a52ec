//! The combined predictor.
//!
//! Presents a fixed, ordered set of predictors as one subscribable unit:
//! all-or-nothing start, best-effort teardown with aggregated failures, an
//! `in_queue` that is the OR of every member's flag, and an event relay that
//! preserves each member's emission order. Behavior modules only ever talk to
//! this composite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcafk_core::config::ProxyBehaviorConfig;
use mcafk_core::constants::EVENT_CHANNEL_CAPACITY;
use mcafk_core::link::PacketLink;
use mcafk_core::protocol::PredictorEvent;
use mcafk_core::{Error, Result};

use super::{CombatPredictor, PacketPredictor, PositionPredictor, VitalsPredictor};

/// Aggregate of predictors behaving as one.
///
/// The member set is fixed at construction; there is no dynamic add/remove,
/// which keeps start/stop ordering deterministic (construction order, with
/// teardown rollback in reverse).
pub struct CombinedPredictor {
    members: Vec<Arc<dyn PacketPredictor>>,
    events_tx: broadcast::Sender<PredictorEvent>,
    relays: Mutex<Vec<JoinHandle<()>>>,
    active: Arc<AtomicBool>,
}

impl CombinedPredictor {
    /// Compose the given predictors. Order is significant: members start in
    /// this order and it is the tie-break when two would act on the same tick.
    pub fn new(members: Vec<Arc<dyn PacketPredictor>>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            members,
            events_tx,
            relays: Mutex::new(Vec::new()),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The production composition: position, vitals and combat prediction
    /// wired from the validated option bag.
    pub fn standard(link: Arc<dyn PacketLink>, behavior: &ProxyBehaviorConfig) -> Self {
        Self::new(vec![
            Arc::new(PositionPredictor::new(Arc::clone(&link))),
            Arc::new(VitalsPredictor::new(Arc::clone(&link), &behavior.auto_eat)),
            Arc::new(CombatPredictor::new(link)),
        ])
    }

    /// Member predictors, in composition order.
    pub fn members(&self) -> &[Arc<dyn PacketPredictor>] {
        &self.members
    }

    fn spawn_relays(&self) {
        let mut relays = self.relays.lock().unwrap_or_else(PoisonError::into_inner);
        for member in &self.members {
            let mut rx = member.events();
            let tx = self.events_tx.clone();
            let active = Arc::clone(&self.active);
            let name = member.name();
            relays.push(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            if !active.load(Ordering::SeqCst) {
                                break;
                            }
                            let _ = tx.send(event);
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(member = name, missed, "event relay lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }
    }
}

impl PacketPredictor for CombinedPredictor {
    fn name(&self) -> &'static str {
        "combined"
    }

    /// Start every member in construction order.
    ///
    /// All-or-nothing: if any member fails, the already-started members are
    /// stopped again (in reverse order) and the failure surfaces. The combined
    /// predictor is not active after a failed start.
    fn begin(&self) -> Result<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for (idx, member) in self.members.iter().enumerate() {
            if let Err(err) = member.begin() {
                warn!(member = member.name(), %err, "member failed to start, rolling back");
                for started in self.members[..idx].iter().rev() {
                    if let Err(rollback) = started.end() {
                        warn!(member = started.name(), %rollback, "rollback failed");
                    }
                }
                self.active.store(false, Ordering::SeqCst);
                return Err(err);
            }
        }

        self.spawn_relays();
        debug!(members = self.members.len(), "combined predictor active");
        Ok(())
    }

    /// Stop every member, best effort.
    ///
    /// A failing member never prevents the teardown of the rest; failures are
    /// collected and surfaced once, after every member has been attempted.
    fn end(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        for relay in self
            .relays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            relay.abort();
        }

        let mut failures = Vec::new();
        for member in &self.members {
            if let Err(err) = member.end() {
                failures.push(format!("{}: {}", member.name(), err));
            }
        }

        if failures.is_empty() {
            debug!("combined predictor idle");
            Ok(())
        } else {
            Err(Error::Teardown { failures })
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Conservative aggregation: any member under human control suppresses
    /// the whole bot.
    fn in_queue(&self) -> bool {
        self.members.iter().any(|m| m.in_queue())
    }

    fn set_in_queue(&self, in_queue: bool) {
        for member in &self.members {
            member.set_in_queue(in_queue);
        }
    }

    fn events(&self) -> broadcast::Receiver<PredictorEvent> {
        self.events_tx.subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mcafk_core::link::{ChannelLink, LinkState};
    use mcafk_core::protocol::{Observation, PacketFrame, Packet, Position};
    use std::time::Duration;

    fn spawned_link() -> ChannelLink {
        let link = ChannelLink::new();
        link.set_state(LinkState::Spawned);
        link
    }

    fn standard(link: &ChannelLink) -> CombinedPredictor {
        CombinedPredictor::standard(Arc::new(link.clone()), &ProxyBehaviorConfig::default())
    }

    #[tokio::test]
    async fn begin_fails_whole_unit_when_link_not_ready() {
        let link = ChannelLink::new(); // still Connecting
        let combined = standard(&link);

        let err = combined.begin().unwrap_err();
        assert!(matches!(err, Error::NotSpawned { .. }));
        assert!(!combined.is_active());
        for member in combined.members() {
            assert!(!member.is_active());
        }
    }

    #[tokio::test]
    async fn begin_and_end_cover_all_members() {
        let link = spawned_link();
        let combined = standard(&link);

        combined.begin().unwrap();
        assert!(combined.is_active());
        for member in combined.members() {
            assert!(member.is_active());
        }

        combined.end().unwrap();
        assert!(!combined.is_active());
        for member in combined.members() {
            assert!(!member.is_active());
        }
    }

    #[tokio::test]
    async fn begin_twice_is_one_activation() {
        let link = spawned_link();
        let combined = standard(&link);

        combined.begin().unwrap();
        combined.begin().unwrap();

        let mut events = combined.events();
        link.inject(PacketFrame::clientbound(Packet::Health {
            health: 18.0,
            food: 17,
            saturation: 2.0,
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // One frame, one relayed observation.
        let event = events.try_recv().unwrap();
        assert!(matches!(
            event.payload,
            mcafk_core::protocol::EventPayload::Observed(Observation::Health { .. })
        ));
        assert!(events.try_recv().is_err());

        combined.end().unwrap();
    }

    #[tokio::test]
    async fn relay_forwards_member_events() {
        let link = spawned_link();
        let combined = standard(&link);
        combined.begin().unwrap();

        let mut events = combined.events();
        link.inject(PacketFrame::serverbound(Packet::Position {
            pos: Position::new(1.0, 64.0, 1.0),
            on_ground: true,
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let event = events.try_recv().unwrap();
        assert!(matches!(
            event.payload,
            mcafk_core::protocol::EventPayload::Observed(Observation::Moved { .. })
        ));

        combined.end().unwrap();
    }

    #[tokio::test]
    async fn set_in_queue_reaches_every_member() {
        let link = spawned_link();
        let combined = standard(&link);
        combined.begin().unwrap();

        combined.set_in_queue(true);
        assert!(combined.in_queue());
        for member in combined.members() {
            assert!(member.in_queue());
        }

        combined.set_in_queue(false);
        assert!(!combined.in_queue());

        combined.end().unwrap();
    }

    #[tokio::test]
    async fn end_without_begin_is_a_no_op() {
        let link = spawned_link();
        let combined = standard(&link);
        combined.end().unwrap();
        combined.end().unwrap();
    }
}
