//! The proxy session controller.
//!
//! `ProxyServer` owns the lifecycle around the prediction core: it waits for
//! the remote session to spawn before arming anything, routes human
//! attach/detach transitions into the suppression gate, tears the predictors
//! down before the link goes away, and restarts the session after disconnects
//! when configured to. The link itself is owned by the adapter; this
//! controller never tears down the connection, only what runs on top of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mcafk_core::config::ProxyBehaviorConfig;
use mcafk_core::constants::{RESTART_RETRY_DELAY, SPAWN_WAIT_TIMEOUT};
use mcafk_core::link::{Controller, LinkState, PacketLink};
use mcafk_core::{Error, Result};

use crate::modules::{standard_modules, BehaviorModule};
use crate::prediction::{CombinedPredictor, PacketPredictor};

/// Session controller for one proxied bot.
pub struct ProxyServer {
    link: Arc<dyn PacketLink>,
    behavior: ProxyBehaviorConfig,
    spawn_timeout: Duration,
    predictor: Mutex<Option<Arc<CombinedPredictor>>>,
    modules: Mutex<Vec<Arc<dyn BehaviorModule>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl ProxyServer {
    /// Create a controller over the given link and behavior options.
    pub fn new(link: Arc<dyn PacketLink>, behavior: ProxyBehaviorConfig) -> Self {
        Self {
            link,
            behavior,
            spawn_timeout: SPAWN_WAIT_TIMEOUT,
            predictor: Mutex::new(None),
            modules: Mutex::new(Vec::new()),
            watcher: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Override the spawn wait (tests).
    pub fn with_spawn_timeout(mut self, timeout: Duration) -> Self {
        self.spawn_timeout = timeout;
        self
    }

    /// True between a successful `start()` and the matching `stop()`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The active combined predictor, if the session is running.
    pub fn predictor(&self) -> Option<Arc<CombinedPredictor>> {
        self.predictor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start the session: wait for spawn, arm the predictors, start modules.
    ///
    /// A predictor start failure propagates and leaves the server not
    /// running; the caller should report it rather than assume a half-armed
    /// bot. Idempotent while already running.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(err) = self.wait_for_spawn().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        let combined = Arc::new(CombinedPredictor::standard(
            Arc::clone(&self.link),
            &self.behavior,
        ));
        if let Err(err) = combined.begin() {
            self.running.store(false, Ordering::SeqCst);
            return Err(err);
        }

        // The gate must match reality before anything acts.
        let attached = *self.link.control().borrow() == Controller::Human;
        combined.set_in_queue(attached);

        let modules = standard_modules(
            Arc::clone(&self.link),
            Arc::clone(&combined) as Arc<dyn PacketPredictor>,
            &self.behavior,
        );
        for module in &modules {
            if !module.enabled() {
                debug!(module = module.name(), "module disabled");
                continue;
            }
            if let Err(err) = module.begin() {
                warn!(module = module.name(), %err, "module failed to start");
            }
        }

        let watcher = self.spawn_control_watcher(Arc::clone(&combined));

        *self
            .predictor
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(combined);
        *self.modules.lock().unwrap_or_else(PoisonError::into_inner) = modules;
        *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);

        info!("proxy session running");
        Ok(())
    }

    /// Stop the session: modules first, then the predictors, always before
    /// any connection teardown.
    ///
    /// Individual teardown failures never stop the rest; they are aggregated
    /// and returned once everything has been attempted. Idempotent while
    /// already stopped.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(watcher) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.abort();
        }

        for module in self
            .modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            if let Err(err) = module.end() {
                warn!(module = module.name(), %err, "module teardown failed");
            }
        }

        let result = match self
            .predictor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(combined) => combined.end(),
            None => Ok(()),
        };

        info!(metrics = %self.link.metrics().snapshot(), "proxy session stopped");
        result
    }

    /// Supervise the session: start, watch for disconnects, restart with a
    /// constant delay while the configuration asks for it.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.start().await {
                Ok(()) => {
                    self.wait_for_disconnect().await;
                    warn!("remote session disconnected");
                    if let Err(err) = self.stop() {
                        warn!(%err, "teardown reported failures");
                    }
                }
                Err(err) if err.is_transient() && self.behavior.restart_on_disconnect => {
                    warn!(%err, "session start failed");
                }
                Err(err) => return Err(err),
            }

            if !self.behavior.restart_on_disconnect {
                return Ok(());
            }

            self.link.metrics().record_reconnect();
            info!(delay = ?RESTART_RETRY_DELAY, "restarting session");
            tokio::time::sleep(RESTART_RETRY_DELAY).await;
        }
    }

    async fn wait_for_spawn(&self) -> Result<()> {
        let mut state = self.link.state();
        let wait = async {
            loop {
                if *state.borrow_and_update() == LinkState::Spawned {
                    return;
                }
                if state.changed().await.is_err() {
                    return; // link dropped; begin() will surface NotSpawned
                }
            }
        };

        tokio::time::timeout(self.spawn_timeout, wait)
            .await
            .map_err(|_| Error::Timeout)
    }

    async fn wait_for_disconnect(&self) {
        let mut state = self.link.state();
        loop {
            if *state.borrow_and_update() == LinkState::Disconnected {
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Route attach/detach transitions into every predictor within a tick.
    fn spawn_control_watcher(&self, combined: Arc<CombinedPredictor>) -> JoinHandle<()> {
        let mut control = self.link.control();
        tokio::spawn(async move {
            // Transitions only; the initial value was applied synchronously
            // during start().
            loop {
                if control.changed().await.is_err() {
                    break;
                }
                let attached = *control.borrow_and_update() == Controller::Human;
                combined.set_in_queue(attached);
                if attached {
                    info!("human operator attached, automation suppressed");
                } else {
                    info!("human operator detached, automation resumes");
                }
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mcafk_core::link::ChannelLink;
    use std::time::Duration;

    fn server_over(link: &ChannelLink) -> ProxyServer {
        ProxyServer::new(
            Arc::new(link.clone()),
            ProxyBehaviorConfig::default(),
        )
        .with_spawn_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn start_waits_for_spawn_and_times_out() {
        let link = ChannelLink::new();
        let server = server_over(&link);

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(!server.is_running());
        assert!(server.predictor().is_none());
    }

    #[tokio::test]
    async fn start_arms_predictors_after_spawn() {
        let link = ChannelLink::new();
        link.set_state(LinkState::Spawned);
        let server = server_over(&link);

        server.start().await.unwrap();
        assert!(server.is_running());

        let combined = server.predictor().unwrap();
        assert!(combined.is_active());
        for member in combined.members() {
            assert!(member.is_active());
        }

        server.stop().unwrap();
        assert!(!server.is_running());
        assert!(!combined.is_active());
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let link = ChannelLink::new();
        link.set_state(LinkState::Spawned);
        let server = server_over(&link);

        server.start().await.unwrap();
        let first = server.predictor().unwrap();
        server.start().await.unwrap();
        let second = server.predictor().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        server.stop().unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let link = ChannelLink::new();
        link.set_state(LinkState::Spawned);
        let server = server_over(&link);

        server.start().await.unwrap();
        server.stop().unwrap();
        server.stop().unwrap();
    }

    #[tokio::test]
    async fn attach_transition_reaches_the_gate() {
        let link = ChannelLink::new();
        link.set_state(LinkState::Spawned);
        let server = server_over(&link);
        server.start().await.unwrap();
        let combined = server.predictor().unwrap();

        assert!(!combined.in_queue());

        link.set_control(Controller::Human);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(combined.in_queue());

        link.set_control(Controller::Bot);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!combined.in_queue());

        server.stop().unwrap();
    }

    #[tokio::test]
    async fn start_honors_preexisting_attachment() {
        let link = ChannelLink::new();
        link.set_state(LinkState::Spawned);
        link.set_control(Controller::Human);
        let server = server_over(&link);

        server.start().await.unwrap();
        assert!(server.predictor().unwrap().in_queue());

        server.stop().unwrap();
    }
}
