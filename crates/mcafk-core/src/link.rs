//! The connection seam between the proxy core and the protocol adapter.
//!
//! `PacketLink` is the narrow surface the predictors and behavior modules see:
//! a broadcast stream of decoded frames (both directions), a packet send path,
//! and watches for the session lifecycle and for who is driving the session.
//! `ChannelLink` is the canonical in-process implementation; the adapter
//! socket feeds it in production and tests feed it directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::constants::PACKET_CHANNEL_CAPACITY;
use crate::error::{Error, Result};
use crate::metrics::SessionMetrics;
use crate::protocol::{Packet, PacketFrame};

/// Who is currently driving the remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Controller {
    /// The proxy's own automation.
    #[default]
    Bot,
    /// A human operator is attached; autonomous action must be suppressed.
    Human,
}

/// Remote-session lifecycle as seen through the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Connecting or logging in; not yet safe to predict.
    #[default]
    Connecting,
    /// The bot has spawned into the world.
    Spawned,
    /// The remote session is gone.
    Disconnected,
}

/// The connection surface consumed by predictors and behavior modules.
pub trait PacketLink: Send + Sync {
    /// Subscribe to the decoded frame stream (both directions).
    fn packets(&self) -> broadcast::Receiver<PacketFrame>;

    /// Write a packet to the server.
    ///
    /// The written packet is also republished on the frame stream as a
    /// serverbound frame, so predictors observe the bot's own output the same
    /// way they observe a human's.
    fn send(&self, packet: Packet) -> Result<()>;

    /// Watch who is driving the session.
    fn control(&self) -> watch::Receiver<Controller>;

    /// Watch the remote-session lifecycle.
    fn state(&self) -> watch::Receiver<LinkState>;

    /// Shared session counters.
    fn metrics(&self) -> &SessionMetrics;
}

/// Channel-backed [`PacketLink`] implementation.
///
/// Cloning shares the underlying channels.
#[derive(Clone)]
pub struct ChannelLink {
    inner: Arc<ChannelLinkInner>,
}

struct ChannelLinkInner {
    /// Observed frame stream, both directions.
    frames_tx: broadcast::Sender<PacketFrame>,
    /// Outbound packets for the adapter to encode and forward.
    outbound_tx: broadcast::Sender<Packet>,
    /// Who is driving.
    control_tx: watch::Sender<Controller>,
    /// Session lifecycle.
    state_tx: watch::Sender<LinkState>,
    /// False once the link is shut down; sends fail afterwards.
    open: AtomicBool,
    /// Shared counters.
    metrics: SessionMetrics,
}

impl Default for ChannelLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLink {
    /// Create a fresh link in the `Connecting` state with no human attached.
    pub fn new() -> Self {
        let (frames_tx, _) = broadcast::channel(PACKET_CHANNEL_CAPACITY);
        let (outbound_tx, _) = broadcast::channel(PACKET_CHANNEL_CAPACITY);
        let (control_tx, _) = watch::channel(Controller::Bot);
        let (state_tx, _) = watch::channel(LinkState::Connecting);

        Self {
            inner: Arc::new(ChannelLinkInner {
                frames_tx,
                outbound_tx,
                control_tx,
                state_tx,
                open: AtomicBool::new(true),
                metrics: SessionMetrics::new(),
            }),
        }
    }

    /// Publish a frame onto the observed stream.
    ///
    /// This is the adapter's ingestion path for traffic it decoded, in either
    /// direction. Frames published while nobody subscribes are dropped.
    pub fn inject(&self, frame: PacketFrame) {
        self.inner.metrics.record_observed();
        let _ = self.inner.frames_tx.send(frame);
    }

    /// Subscribe to packets the proxy wants written to the server.
    pub fn outbound(&self) -> broadcast::Receiver<Packet> {
        self.inner.outbound_tx.subscribe()
    }

    /// Update who is driving the session.
    pub fn set_control(&self, controller: Controller) {
        self.inner.control_tx.send_replace(controller);
    }

    /// Update the remote-session lifecycle state.
    pub fn set_state(&self, state: LinkState) {
        let previous = self.inner.state_tx.send_replace(state);
        if previous != state {
            debug!(?previous, ?state, "link state transition");
        }
    }

    /// Current lifecycle state.
    pub fn current_state(&self) -> LinkState {
        *self.inner.state_tx.borrow()
    }

    /// True while a human operator is attached.
    pub fn human_attached(&self) -> bool {
        *self.inner.control_tx.borrow() == Controller::Human
    }

    /// Close the link: further sends fail and the state reads `Disconnected`.
    ///
    /// Safe to call repeatedly.
    pub fn shutdown(&self) {
        if !self.inner.open.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("link shut down");
        self.inner.state_tx.send_replace(LinkState::Disconnected);
    }
}

impl PacketLink for ChannelLink {
    fn packets(&self) -> broadcast::Receiver<PacketFrame> {
        self.inner.frames_tx.subscribe()
    }

    fn send(&self, packet: Packet) -> Result<()> {
        if !self.inner.open.load(Ordering::SeqCst) {
            return Err(Error::LinkClosed);
        }

        self.inner.metrics.record_sent();
        let _ = self.inner.outbound_tx.send(packet.clone());
        // Republish so observers see the proxy's own traffic.
        self.inner.metrics.record_observed();
        let _ = self.inner.frames_tx.send(PacketFrame::serverbound(packet));
        Ok(())
    }

    fn control(&self) -> watch::Receiver<Controller> {
        self.inner.control_tx.subscribe()
    }

    fn state(&self) -> watch::Receiver<LinkState> {
        self.inner.state_tx.subscribe()
    }

    fn metrics(&self) -> &SessionMetrics {
        &self.inner.metrics
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Direction, Position};

    #[tokio::test]
    async fn inject_reaches_subscribers() {
        let link = ChannelLink::new();
        let mut rx = link.packets();

        link.inject(PacketFrame::clientbound(Packet::KeepAlive { id: 1 }));

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.direction, Direction::Clientbound);
        assert_eq!(frame.packet, Packet::KeepAlive { id: 1 });
    }

    #[tokio::test]
    async fn send_republishes_as_serverbound_frame() {
        let link = ChannelLink::new();
        let mut frames = link.packets();
        let mut outbound = link.outbound();

        link.send(Packet::SwingArm).unwrap();

        assert_eq!(outbound.recv().await.unwrap(), Packet::SwingArm);
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.direction, Direction::Serverbound);
        assert_eq!(frame.packet, Packet::SwingArm);
    }

    #[tokio::test]
    async fn send_fails_after_shutdown() {
        let link = ChannelLink::new();
        link.shutdown();

        let err = link.send(Packet::SwingArm).unwrap_err();
        assert!(matches!(err, Error::LinkClosed));
        assert_eq!(link.current_state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let link = ChannelLink::new();
        link.shutdown();
        link.shutdown();
        assert_eq!(link.current_state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn control_watch_observes_attachment() {
        let link = ChannelLink::new();
        let mut control = link.control();

        assert_eq!(*control.borrow(), Controller::Bot);
        assert!(!link.human_attached());

        link.set_control(Controller::Human);
        control.changed().await.unwrap();
        assert_eq!(*control.borrow(), Controller::Human);
        assert!(link.human_attached());
    }

    #[tokio::test]
    async fn state_watch_observes_spawn() {
        let link = ChannelLink::new();
        let mut state = link.state();

        link.set_state(LinkState::Spawned);
        state.changed().await.unwrap();
        assert_eq!(*state.borrow(), LinkState::Spawned);
    }

    #[tokio::test]
    async fn metrics_count_traffic() {
        let link = ChannelLink::new();
        let _rx = link.packets();

        link.inject(PacketFrame::clientbound(Packet::Breath { oxygen: 200 }));
        link.send(Packet::Position {
            pos: Position::default(),
            on_ground: true,
        })
        .unwrap();

        let snapshot = link.metrics().snapshot();
        // The sent packet is also republished as an observed frame.
        assert_eq!(snapshot.packets_observed, 2);
        assert_eq!(snapshot.packets_sent, 1);
    }
}
