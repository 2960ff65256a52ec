//! Anti-idle movement module.
//!
//! Realizes the position predictor's refresh intents and adds the wander and
//! glance behaviors that make the session look alive: bounded random walks
//! around the spot where the bot was first observed, and randomized glances.
//! Every action re-checks the suppression gate right before writing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use mcafk_core::config::AntiAfkConfig;
use mcafk_core::link::PacketLink;
use mcafk_core::protocol::{
    EventPayload, Look, Observation, Packet, Position, SyntheticAction,
};
use mcafk_core::Result;

use crate::prediction::PacketPredictor;

use super::BehaviorModule;

struct AntiAfkInner {
    link: Arc<dyn PacketLink>,
    predictor: Arc<dyn PacketPredictor>,
    walk_enabled: bool,
    walk_radius: f64,
    walk_interval: Duration,
    look_enabled: bool,
    look_interval: Duration,
    enabled: bool,
    active: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Bounded-wander and glance behavior.
pub struct AntiAfkModule {
    inner: Arc<AntiAfkInner>,
}

impl AntiAfkModule {
    /// Create the module from its option bag.
    pub fn new(
        link: Arc<dyn PacketLink>,
        predictor: Arc<dyn PacketPredictor>,
        config: &AntiAfkConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AntiAfkInner {
                link,
                predictor,
                walk_enabled: config.walk_around.enabled,
                walk_radius: config.walk_around.radius,
                walk_interval: Duration::from_millis(config.walk_around.interval_ms),
                look_enabled: config.look_around.enabled,
                look_interval: Duration::from_millis(config.look_around.interval_ms),
                enabled: config.enabled,
                active: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }
}

impl BehaviorModule for AntiAfkModule {
    fn name(&self) -> &'static str {
        "anti_afk"
    }

    fn enabled(&self) -> bool {
        self.inner.enabled
    }

    fn begin(&self) -> Result<()> {
        if !self.inner.enabled || self.inner.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run(inner));
        *self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        debug!("anti_afk module active");
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
        debug!("anti_afk module idle");
        Ok(())
    }
}

async fn run(inner: Arc<AntiAfkInner>) {
    let mut events = inner.predictor.events();

    // Where the bot was when we started watching; wander stays within the
    // configured radius of this anchor so the bot never walks away.
    let mut anchor: Option<Position> = None;
    let mut last_pos: Option<Position> = None;
    let mut last_look: Option<Look> = None;

    let mut walk_timer = tokio::time::interval(inner.walk_interval);
    walk_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    walk_timer.tick().await;
    let mut look_timer = tokio::time::interval(inner.look_interval);
    look_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    look_timer.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    match event.payload {
                        EventPayload::Observed(Observation::Moved { pos, .. }) => {
                            anchor.get_or_insert(pos);
                            last_pos = Some(pos);
                        }
                        EventPayload::Observed(Observation::Faced { look }) => {
                            last_look = Some(look);
                        }
                        // Realize the predictor's own refresh intents.
                        EventPayload::Synthetic(
                            action @ (SyntheticAction::HoldPosition { .. }
                            | SyntheticAction::Glance { .. }
                            | SyntheticAction::Surface { .. }),
                        ) => {
                            if !send_action(&inner, &action) {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "anti_afk event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = walk_timer.tick() => {
                if !inner.walk_enabled || inner.predictor.in_queue() {
                    continue;
                }
                let (Some(anchor), Some(pos)) = (anchor, last_pos) else {
                    continue;
                };
                let target = wander_target(&anchor, inner.walk_radius);
                debug!(?pos, ?target, "wander step");
                if inner
                    .link
                    .send(Packet::Position { pos: target, on_ground: true })
                    .is_err()
                {
                    break;
                }
            }
            _ = look_timer.tick() => {
                if !inner.look_enabled || inner.predictor.in_queue() {
                    continue;
                }
                if last_look.is_none() {
                    continue;
                }
                let look = random_glance();
                if inner
                    .link
                    .send(Packet::Look { look, on_ground: true })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}

/// Write an action's packets; false when the link is gone.
fn send_action(inner: &AntiAfkInner, action: &SyntheticAction) -> bool {
    if inner.predictor.in_queue() {
        return true;
    }
    for packet in action.packets() {
        if inner.link.send(packet).is_err() {
            return false;
        }
    }
    true
}

fn wander_target(anchor: &Position, radius: f64) -> Position {
    let mut rng = rand::rng();
    Position {
        x: anchor.x + rng.random_range(-radius..=radius),
        y: anchor.y,
        z: anchor.z + rng.random_range(-radius..=radius),
    }
}

fn random_glance() -> Look {
    let mut rng = rand::rng();
    Look {
        yaw: rng.random_range(-180.0..180.0),
        pitch: rng.random_range(-30.0..30.0),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wander_stays_within_radius() {
        let anchor = Position::new(100.0, 64.0, -100.0);
        for _ in 0..64 {
            let target = wander_target(&anchor, 8.0);
            assert!((target.x - anchor.x).abs() <= 8.0);
            assert!((target.z - anchor.z).abs() <= 8.0);
            assert_eq!(target.y, anchor.y);
        }
    }

    #[test]
    fn glance_angles_are_bounded() {
        for _ in 0..64 {
            let look = random_glance();
            assert!((-180.0..180.0).contains(&look.yaw));
            assert!((-30.0..30.0).contains(&look.pitch));
        }
    }
}
