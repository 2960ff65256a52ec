//! The protocol adapter socket.
//!
//! The proxy core never speaks the Minecraft byte protocol; an external
//! adapter does, and bridges decoded traffic over this socket as
//! newline-delimited JSON. Inbound lines carry observed frames, human
//! attach/detach transitions and session lifecycle; outbound lines carry the
//! packets the proxy wants written to the server. One adapter connection is
//! served at a time; losing it marks the session disconnected.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use mcafk_core::link::{ChannelLink, Controller, LinkState};
use mcafk_core::protocol::{Direction, Packet, PacketFrame};
use mcafk_core::{Error, Result};

/// One line on the adapter wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterMessage {
    /// A decoded packet travelling in either direction.
    Frame {
        direction: Direction,
        #[serde(flatten)]
        packet: Packet,
    },
    /// A human operator attached to or detached from the session.
    Control { human_attached: bool },
    /// The remote session changed lifecycle state.
    Lifecycle { state: LinkState },
}

/// TCP listener feeding a [`ChannelLink`].
pub struct AdapterServer {
    listener: TcpListener,
    link: ChannelLink,
}

impl AdapterServer {
    /// Bind the adapter socket.
    pub async fn bind(addr: SocketAddr, link: ChannelLink) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, link })
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve adapter connections, one at a time.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!(%peer, "protocol adapter connected");

            if let Err(err) = serve(&self.link, stream).await {
                warn!(%err, "adapter connection ended");
            } else {
                info!("protocol adapter disconnected");
            }

            // No adapter means no server: nothing is observing or writing.
            self.link.set_control(Controller::Bot);
            self.link.set_state(LinkState::Disconnected);
        }
    }
}

/// Route one decoded adapter message into the link.
pub(crate) fn apply(link: &ChannelLink, message: AdapterMessage) {
    match message {
        AdapterMessage::Frame { direction, packet } => {
            link.inject(PacketFrame { direction, packet });
        }
        AdapterMessage::Control { human_attached } => {
            link.set_control(if human_attached {
                Controller::Human
            } else {
                Controller::Bot
            });
        }
        AdapterMessage::Lifecycle { state } => {
            link.set_state(state);
        }
    }
}

async fn serve(link: &ChannelLink, stream: TcpStream) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut outbound = link.outbound();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                None => return Ok(()),
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    // A malformed line is the adapter's bug, not a reason to
                    // drop the session.
                    match serde_json::from_str::<AdapterMessage>(line) {
                        Ok(message) => apply(link, message),
                        Err(err) => debug!(%err, "ignoring malformed adapter line"),
                    }
                }
            },
            packet = outbound.recv() => match packet {
                Ok(packet) => {
                    let message = AdapterMessage::Frame {
                        direction: Direction::Serverbound,
                        packet,
                    };
                    let mut json = serde_json::to_string(&message)
                        .map_err(|e| Error::protocol(e.to_string()))?;
                    json.push('\n');
                    writer.write_all(json.as_bytes()).await?;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "outbound packet stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
