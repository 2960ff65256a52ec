//! Kill-aura passive module.
//!
//! Realizes the combat predictor's strike intents: swing, then attack the
//! tracked target. Target selection lives entirely in the predictor; this
//! module only acts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcafk_core::config::KillAuraConfig;
use mcafk_core::link::PacketLink;
use mcafk_core::protocol::{EventPayload, SyntheticAction};
use mcafk_core::Result;

use crate::prediction::PacketPredictor;

use super::BehaviorModule;

struct KillAuraInner {
    link: Arc<dyn PacketLink>,
    predictor: Arc<dyn PacketPredictor>,
    enabled: bool,
    active: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Swings at whatever the combat predictor is tracking.
pub struct KillAuraModule {
    inner: Arc<KillAuraInner>,
}

impl KillAuraModule {
    /// Create the module from its option bag.
    pub fn new(
        link: Arc<dyn PacketLink>,
        predictor: Arc<dyn PacketPredictor>,
        config: &KillAuraConfig,
    ) -> Self {
        Self {
            inner: Arc::new(KillAuraInner {
                link,
                predictor,
                enabled: config.enabled,
                active: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }
}

impl BehaviorModule for KillAuraModule {
    fn name(&self) -> &'static str {
        "kill_aura"
    }

    fn enabled(&self) -> bool {
        self.inner.enabled
    }

    fn begin(&self) -> Result<()> {
        if !self.inner.enabled || self.inner.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut events = inner.predictor.events();
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let EventPayload::Synthetic(
                            action @ SyntheticAction::Strike { .. },
                        ) = event.payload
                        else {
                            continue;
                        };
                        if inner.predictor.in_queue() {
                            continue;
                        }
                        debug!("striking target");
                        let mut closed = false;
                        for packet in action.packets() {
                            if inner.link.send(packet).is_err() {
                                closed = true;
                                break;
                            }
                        }
                        if closed {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "kill_aura event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        debug!("kill_aura module active");
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
        debug!("kill_aura module idle");
        Ok(())
    }
}
