//! Auto-eat module.
//!
//! Realizes the vitals predictor's eat intents. Which slot holds food is
//! inventory knowledge the core does not carry; the banned-food and
//! return-to-last-item options are validated in config and enforced by the
//! protocol adapter that owns the inventory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcafk_core::config::AutoEatConfig;
use mcafk_core::link::PacketLink;
use mcafk_core::protocol::{EventPayload, SyntheticAction};
use mcafk_core::Result;

use crate::prediction::PacketPredictor;

use super::BehaviorModule;

struct AutoEatInner {
    link: Arc<dyn PacketLink>,
    predictor: Arc<dyn PacketPredictor>,
    enabled: bool,
    active: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Eats when the vitals predictor says so.
pub struct AutoEatModule {
    inner: Arc<AutoEatInner>,
}

impl AutoEatModule {
    /// Create the module from its option bag.
    pub fn new(
        link: Arc<dyn PacketLink>,
        predictor: Arc<dyn PacketPredictor>,
        config: &AutoEatConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AutoEatInner {
                link,
                predictor,
                enabled: config.enabled,
                active: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }
}

impl BehaviorModule for AutoEatModule {
    fn name(&self) -> &'static str {
        "auto_eat"
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
                        let EventPayload::Synthetic(action @ SyntheticAction::Eat { .. }) =
                            event.payload
                        else {
                            continue;
                        };
                        if inner.predictor.in_queue() {
                            continue;
                        }
                        debug!("eating");
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
                        warn!(missed, "auto_eat event stream lagged");
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

        debug!("auto_eat module active");
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
        debug!("auto_eat module idle");
        Ok(())
    }
}
