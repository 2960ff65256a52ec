//! Typed predictor event channel.
//!
//! Events replace the source-style wildcard emitter with a tagged union:
//! every event carries its category so subscribers filter without knowing
//! which predictor produced it, and every synthetic action can be replayed
//! as packets without re-reading the raw stream.

use serde::{Deserialize, Serialize};

use super::packet::Packet;
use super::types::{EntityId, EntityKind, Hand, Look, Position};

/// Category tag for predictor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Position,
    Look,
    Vitals,
    Combat,
}

/// An inbound observation of server-visible state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "observation", rename_all = "snake_case")]
pub enum Observation {
    /// Health, food and saturation changed.
    Health {
        health: f32,
        food: i32,
        saturation: f32,
    },
    /// Remaining air changed.
    Breath { oxygen: i32 },
    /// The bot (or the attached human) moved.
    Moved { pos: Position, on_ground: bool },
    /// The bot (or the attached human) turned.
    Faced { look: Look },
    /// A hostile came into acquisition range and became the target.
    TargetAcquired { id: EntityId, kind: EntityKind },
    /// The current target left range, despawned or died.
    TargetLost { id: EntityId },
}

impl Observation {
    /// Category this observation belongs to.
    pub fn category(&self) -> EventCategory {
        match self {
            Observation::Health { .. } | Observation::Breath { .. } => EventCategory::Vitals,
            Observation::Moved { .. } => EventCategory::Position,
            Observation::Faced { .. } => EventCategory::Look,
            Observation::TargetAcquired { .. } | Observation::TargetLost { .. } => {
                EventCategory::Combat
            }
        }
    }
}

/// A synthetic action derived from the most recently observed true state.
///
/// These are intents, not packets: a behavior module decides whether to act
/// and writes the packets through the link. `packets()` yields the exact
/// serverbound packets reproducing the action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyntheticAction {
    /// Re-assert the last observed position and look.
    HoldPosition {
        pos: Position,
        look: Look,
        on_ground: bool,
    },
    /// Re-assert the last observed look.
    Glance { look: Look },
    /// Swim upward: observed air is running out.
    Surface { oxygen: i32 },
    /// Consume the held food item: observed vitals dropped below thresholds.
    Eat { health: f32, food: i32, hand: Hand },
    /// Swing at the tracked target.
    Strike { target: EntityId },
}

impl SyntheticAction {
    /// Category this action belongs to.
    pub fn category(&self) -> EventCategory {
        match self {
            SyntheticAction::HoldPosition { .. } => EventCategory::Position,
            SyntheticAction::Glance { .. } => EventCategory::Look,
            SyntheticAction::Surface { .. } | SyntheticAction::Eat { .. } => EventCategory::Vitals,
            SyntheticAction::Strike { .. } => EventCategory::Combat,
        }
    }

    /// The serverbound packets that reproduce this action.
    pub fn packets(&self) -> Vec<Packet> {
        match self {
            SyntheticAction::HoldPosition {
                pos,
                look,
                on_ground,
            } => vec![Packet::PositionLook {
                pos: *pos,
                look: *look,
                on_ground: *on_ground,
            }],
            SyntheticAction::Glance { look } => vec![Packet::Look {
                look: *look,
                on_ground: true,
            }],
            // Surfacing is a pitch-up plus upward drift; the vertical step is
            // resolved by the server's swim physics, we only signal intent.
            SyntheticAction::Surface { .. } => vec![Packet::Look {
                look: Look {
                    yaw: 0.0,
                    pitch: -90.0,
                },
                on_ground: false,
            }],
            SyntheticAction::Eat { hand, .. } => vec![Packet::UseItem { hand: *hand }],
            SyntheticAction::Strike { target } => vec![
                Packet::SwingArm,
                Packet::UseEntity { target: *target },
            ],
        }
    }
}

/// Payload of a predictor event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// Something true was observed on the stream.
    Observed(Observation),
    /// The predictor wants a refresh action performed.
    Synthetic(SyntheticAction),
}

/// A tagged predictor event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorEvent {
    pub category: EventCategory,
    pub payload: EventPayload,
}

impl PredictorEvent {
    /// Wrap an observation, tagging it with its category.
    pub fn observed(observation: Observation) -> Self {
        Self {
            category: observation.category(),
            payload: EventPayload::Observed(observation),
        }
    }

    /// Wrap a synthetic action, tagging it with its category.
    pub fn synthetic(action: SyntheticAction) -> Self {
        Self {
            category: action.category(),
            payload: EventPayload::Synthetic(action),
        }
    }

    /// True for synthetic (bot-intent) events.
    pub fn is_synthetic(&self) -> bool {
        matches!(self.payload, EventPayload::Synthetic(_))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_categories() {
        let health = Observation::Health {
            health: 20.0,
            food: 20,
            saturation: 5.0,
        };
        assert_eq!(health.category(), EventCategory::Vitals);

        let moved = Observation::Moved {
            pos: Position::default(),
            on_ground: true,
        };
        assert_eq!(moved.category(), EventCategory::Position);

        let faced = Observation::Faced {
            look: Look::default(),
        };
        assert_eq!(faced.category(), EventCategory::Look);

        let acquired = Observation::TargetAcquired {
            id: EntityId(3),
            kind: EntityKind::Hostile,
        };
        assert_eq!(acquired.category(), EventCategory::Combat);
    }

    #[test]
    fn synthetic_categories_match_observations() {
        let hold = SyntheticAction::HoldPosition {
            pos: Position::default(),
            look: Look::default(),
            on_ground: true,
        };
        assert_eq!(hold.category(), EventCategory::Position);

        let eat = SyntheticAction::Eat {
            health: 10.0,
            food: 12,
            hand: Hand::Off,
        };
        assert_eq!(eat.category(), EventCategory::Vitals);
    }

    #[test]
    fn hold_position_reproduces_movement_packet() {
        let pos = Position::new(10.0, 64.0, 10.0);
        let look = Look::new(90.0, 0.0);
        let action = SyntheticAction::HoldPosition {
            pos,
            look,
            on_ground: true,
        };

        let packets = action.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(
            packets[0],
            Packet::PositionLook {
                pos,
                look,
                on_ground: true
            }
        );
    }

    #[test]
    fn strike_swings_then_attacks() {
        let action = SyntheticAction::Strike {
            target: EntityId(9),
        };

        let packets = action.packets();
        assert_eq!(packets[0], Packet::SwingArm);
        assert_eq!(
            packets[1],
            Packet::UseEntity {
                target: EntityId(9)
            }
        );
    }

    #[test]
    fn event_wrappers_tag_category() {
        let ev = PredictorEvent::observed(Observation::Breath { oxygen: 100 });
        assert_eq!(ev.category, EventCategory::Vitals);
        assert!(!ev.is_synthetic());

        let ev = PredictorEvent::synthetic(SyntheticAction::Surface { oxygen: 90 });
        assert_eq!(ev.category, EventCategory::Vitals);
        assert!(ev.is_synthetic());
    }

    #[test]
    fn event_serde_roundtrip() {
        let ev = PredictorEvent::synthetic(SyntheticAction::Strike {
            target: EntityId(5),
        });

        let json = serde_json::to_string(&ev).unwrap();
        let restored: PredictorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ev);
    }
}
