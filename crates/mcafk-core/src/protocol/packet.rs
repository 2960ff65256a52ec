//! Decoded packet types and frames.
//!
//! The set covers exactly what the predictors are authorized to observe and
//! what the behavior modules are authorized to send: movement, look, vitals,
//! entity tracking and the handful of item/combat actions. Everything else the
//! proxy relays opaquely and never sees here.

use serde::{Deserialize, Serialize};

use super::types::{EntityId, EntityKind, Hand, Look, Position};

/// Which way a packet travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Server to bot/client.
    Clientbound,
    /// Bot/client to server.
    Serverbound,
}

/// A decoded game packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "packet", rename_all = "snake_case")]
pub enum Packet {
    /// Liveness echo.
    KeepAlive { id: i64 },
    /// Chat line, relayed only.
    Chat { message: String },
    /// Health, food and saturation update.
    Health {
        health: f32,
        food: i32,
        saturation: f32,
    },
    /// Remaining air ticks.
    Breath { oxygen: i32 },
    /// Position-only movement.
    Position { pos: Position, on_ground: bool },
    /// Combined position and look movement.
    PositionLook {
        pos: Position,
        look: Look,
        on_ground: bool,
    },
    /// Look-only movement.
    Look { look: Look, on_ground: bool },
    /// A new entity entered tracking range.
    SpawnEntity {
        id: EntityId,
        kind: EntityKind,
        pos: Position,
    },
    /// A tracked entity moved.
    EntityTeleport { id: EntityId, pos: Position },
    /// Tracked entities left range or died.
    EntityDestroy { ids: Vec<EntityId> },
    /// Arm swing animation.
    SwingArm,
    /// Attack or interact with an entity.
    UseEntity { target: EntityId },
    /// Use the held item (eating, blocking).
    UseItem { hand: Hand },
    /// Hotbar slot selection.
    HeldItemSlot { slot: u8 },
    /// Respawn into a dimension; invalidates tracked state.
    Respawn { dimension: i32 },
}

impl Packet {
    /// Stable lowercase name of this packet.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::KeepAlive { .. } => "keep_alive",
            Packet::Chat { .. } => "chat",
            Packet::Health { .. } => "update_health",
            Packet::Breath { .. } => "update_breath",
            Packet::Position { .. } => "position",
            Packet::PositionLook { .. } => "position_look",
            Packet::Look { .. } => "look",
            Packet::SpawnEntity { .. } => "spawn_entity",
            Packet::EntityTeleport { .. } => "entity_teleport",
            Packet::EntityDestroy { .. } => "entity_destroy",
            Packet::SwingArm => "arm_animation",
            Packet::UseEntity { .. } => "use_entity",
            Packet::UseItem { .. } => "use_item",
            Packet::HeldItemSlot { .. } => "held_item_slot",
            Packet::Respawn { .. } => "respawn",
        }
    }
}

/// A packet plus the direction it travelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketFrame {
    pub direction: Direction,
    pub packet: Packet,
}

impl PacketFrame {
    /// A frame travelling from the server to the bot.
    pub fn clientbound(packet: Packet) -> Self {
        Self {
            direction: Direction::Clientbound,
            packet,
        }
    }

    /// A frame travelling from the bot (or attached human) to the server.
    pub fn serverbound(packet: Packet) -> Self {
        Self {
            direction: Direction::Serverbound,
            packet,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
