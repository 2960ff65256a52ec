//! Scripted predictor for composition tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::broadcast;

use mcafk_core::constants::EVENT_CHANNEL_CAPACITY;
use mcafk_core::protocol::PredictorEvent;
use mcafk_core::{Error, Result};
use mcafk_proxy::prediction::PacketPredictor;

/// A predictor whose lifecycle outcomes and events are scripted by the test.
pub struct StubPredictor {
    name: &'static str,
    active: AtomicBool,
    in_queue: AtomicBool,
    fail_begin: AtomicBool,
    fail_end: AtomicBool,
    begin_calls: AtomicU32,
    end_calls: AtomicU32,
    events_tx: broadcast::Sender<PredictorEvent>,
}

impl StubPredictor {
    /// Create a stub that starts and stops cleanly.
    pub fn new(name: &'static str) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            name,
            active: AtomicBool::new(false),
            in_queue: AtomicBool::new(false),
            fail_begin: AtomicBool::new(false),
            fail_end: AtomicBool::new(false),
            begin_calls: AtomicU32::new(0),
            end_calls: AtomicU32::new(0),
            events_tx,
        }
    }

    /// Make the next `begin()` calls fail.
    pub fn fail_begin(self) -> Self {
        self.fail_begin.store(true, Ordering::SeqCst);
        self
    }

    /// Make the next `end()` calls fail.
    pub fn fail_end(self) -> Self {
        self.fail_end.store(true, Ordering::SeqCst);
        self
    }

    /// How many times `begin()` ran.
    pub fn begin_calls(&self) -> u32 {
        self.begin_calls.load(Ordering::SeqCst)
    }

    /// How many times `end()` ran.
    pub fn end_calls(&self) -> u32 {
        self.end_calls.load(Ordering::SeqCst)
    }

    /// Emit an event as this member, subject to the active gate.
    pub fn emit(&self, event: PredictorEvent) {
        if self.active.load(Ordering::SeqCst) {
            let _ = self.events_tx.send(event);
        }
    }
}

impl PacketPredictor for StubPredictor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn begin(&self) -> Result<()> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(Error::PredictorStart {
                name: self.name,
                message: "scripted begin failure".to_string(),
            });
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn end(&self) -> Result<()> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(Error::PredictorStart {
                name: self.name,
                message: "scripted end failure".to_string(),
            });
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn in_queue(&self) -> bool {
        self.in_queue.load(Ordering::SeqCst)
    }

    fn set_in_queue(&self, in_queue: bool) {
        self.in_queue.store(in_queue, Ordering::SeqCst);
    }

    fn events(&self) -> broadcast::Receiver<PredictorEvent> {
        self.events_tx.subscribe()
    }
}
