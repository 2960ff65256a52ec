//! Combat prediction.
//!
//! Tracks the entities the server reports around the bot, keeps the nearest
//! hostile as the current target, and asks for a strike whenever the target is
//! within melee reach on the swing cadence. A human's own attack packets are
//! ground truth: attacking an entity retargets the model to it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use mcafk_core::constants::{COMBAT_CADENCE, MELEE_REACH, TARGET_ACQUIRE_RANGE};
use mcafk_core::link::PacketLink;
use mcafk_core::protocol::{
    Direction, EntityId, EntityKind, Observation, Packet, PacketFrame, Position, PredictorEvent,
    SyntheticAction,
};

use super::predictor::{DrivenPredictor, Model};

struct TrackedEntity {
    kind: EntityKind,
    pos: Position,
}

/// Combat state machine.
pub struct CombatModel {
    entities: HashMap<EntityId, TrackedEntity>,
    target: Option<EntityId>,
    own_pos: Option<Position>,
    acquire_range_sq: f64,
    reach_sq: f64,
}

impl CombatModel {
    fn new() -> Self {
        Self {
            entities: HashMap::new(),
            target: None,
            own_pos: None,
            acquire_range_sq: TARGET_ACQUIRE_RANGE * TARGET_ACQUIRE_RANGE,
            reach_sq: MELEE_REACH * MELEE_REACH,
        }
    }

    /// Pick the nearest hostile in acquisition range, emitting transitions.
    fn retarget(&mut self) -> Vec<PredictorEvent> {
        let own_pos = match self.own_pos {
            Some(pos) => pos,
            None => return Vec::new(),
        };

        let next = self
            .entities
            .iter()
            .filter(|(_, e)| e.kind == EntityKind::Hostile)
            .map(|(id, e)| (*id, own_pos.distance_sq(&e.pos)))
            .filter(|(_, dist)| *dist <= self.acquire_range_sq)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(id, _)| id);

        if next == self.target {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(lost) = self.target.take() {
            events.push(PredictorEvent::observed(Observation::TargetLost {
                id: lost,
            }));
        }
        if let Some(id) = next {
            let kind = self.entities[&id].kind;
            debug!(%id, "combat target acquired");
            self.target = Some(id);
            events.push(PredictorEvent::observed(Observation::TargetAcquired {
                id,
                kind,
            }));
        }
        events
    }
}

impl Model for CombatModel {
    fn observe(&mut self, frame: &PacketFrame) -> Vec<PredictorEvent> {
        match (&frame.direction, &frame.packet) {
            (Direction::Clientbound, Packet::SpawnEntity { id, kind, pos }) => {
                if !pos.is_finite() {
                    debug!(%id, "ignoring entity spawn with non-finite position");
                    return Vec::new();
                }
                self.entities.insert(
                    *id,
                    TrackedEntity {
                        kind: *kind,
                        pos: *pos,
                    },
                );
                self.retarget()
            }
            (Direction::Clientbound, Packet::EntityTeleport { id, pos }) => {
                if !pos.is_finite() {
                    return Vec::new();
                }
                // Unknown entities are not an error; we just never saw their spawn.
                if let Some(entity) = self.entities.get_mut(id) {
                    entity.pos = *pos;
                    return self.retarget();
                }
                Vec::new()
            }
            (Direction::Clientbound, Packet::EntityDestroy { ids }) => {
                for id in ids {
                    self.entities.remove(id);
                }
                self.retarget()
            }
            (Direction::Clientbound, Packet::Respawn { .. }) => {
                let had_target = self.target.take();
                self.entities.clear();
                self.own_pos = None;
                match had_target {
                    Some(id) => vec![PredictorEvent::observed(Observation::TargetLost { id })],
                    None => Vec::new(),
                }
            }
            // Our own movement fixes the reference point for range checks.
            (Direction::Serverbound, Packet::Position { pos, .. })
            | (Direction::Serverbound, Packet::PositionLook { pos, .. }) => {
                if pos.is_finite() {
                    self.own_pos = Some(*pos);
                    return self.retarget();
                }
                Vec::new()
            }
            // An attack written toward the server (human or module) is ground
            // truth for what we should be fighting.
            (Direction::Serverbound, Packet::UseEntity { target }) => {
                if self.target == Some(*target) || !self.entities.contains_key(target) {
                    return Vec::new();
                }
                let mut events = Vec::new();
                if let Some(lost) = self.target.take() {
                    events.push(PredictorEvent::observed(Observation::TargetLost {
                        id: lost,
                    }));
                }
                let kind = self.entities[target].kind;
                self.target = Some(*target);
                events.push(PredictorEvent::observed(Observation::TargetAcquired {
                    id: *target,
                    kind,
                }));
                events
            }
            _ => Vec::new(),
        }
    }

    fn tick(&mut self) -> Option<SyntheticAction> {
        let target = self.target?;
        let own_pos = self.own_pos?;
        let entity = self.entities.get(&target)?;

        if own_pos.distance_sq(&entity.pos) <= self.reach_sq {
            Some(SyntheticAction::Strike { target })
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.entities.clear();
        self.target = None;
        self.own_pos = None;
    }
}

/// Predictor for the combat concern.
pub type CombatPredictor = DrivenPredictor<CombatModel>;

impl CombatPredictor {
    /// Create a combat predictor bound to the given link.
    pub fn new(link: Arc<dyn PacketLink>) -> Self {
        DrivenPredictor::from_model("combat", COMBAT_CADENCE, link, CombatModel::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn own_position(x: f64, z: f64) -> PacketFrame {
        PacketFrame::serverbound(Packet::Position {
            pos: Position::new(x, 64.0, z),
            on_ground: true,
        })
    }

    fn spawn(id: i32, kind: EntityKind, x: f64, z: f64) -> PacketFrame {
        PacketFrame::clientbound(Packet::SpawnEntity {
            id: EntityId(id),
            kind,
            pos: Position::new(x, 64.0, z),
        })
    }

    #[test]
    fn hostile_in_range_becomes_target() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        let events = model.observe(&spawn(1, EntityKind::Hostile, 5.0, 0.0));

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].payload,
            mcafk_core::protocol::EventPayload::Observed(Observation::TargetAcquired {
                id: EntityId(1),
                ..
            })
        ));
    }

    #[test]
    fn passive_entities_are_not_targets() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        assert!(model.observe(&spawn(1, EntityKind::Animal, 2.0, 0.0)).is_empty());
        assert!(model.observe(&spawn(2, EntityKind::Player, 2.0, 0.0)).is_empty());
        assert!(model.tick().is_none());
    }

    #[test]
    fn out_of_range_hostiles_are_ignored() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        let events = model.observe(&spawn(1, EntityKind::Hostile, 100.0, 0.0));
        assert!(events.is_empty());
        assert!(model.tick().is_none());
    }

    #[test]
    fn nearest_hostile_wins() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        model.observe(&spawn(1, EntityKind::Hostile, 10.0, 0.0));
        let events = model.observe(&spawn(2, EntityKind::Hostile, 3.0, 0.0));

        // Target switches from 1 to 2: lost then acquired.
        assert_eq!(events.len(), 2);
        assert_eq!(model.target, Some(EntityId(2)));
    }

    #[test]
    fn strike_only_within_reach() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        model.observe(&spawn(1, EntityKind::Hostile, 10.0, 0.0));
        assert!(model.tick().is_none());

        model.observe(&PacketFrame::clientbound(Packet::EntityTeleport {
            id: EntityId(1),
            pos: Position::new(2.0, 64.0, 0.0),
        }));

        assert!(matches!(
            model.tick(),
            Some(SyntheticAction::Strike {
                target: EntityId(1)
            })
        ));
    }

    #[test]
    fn destroyed_target_is_lost() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        model.observe(&spawn(1, EntityKind::Hostile, 5.0, 0.0));

        let events = model.observe(&PacketFrame::clientbound(Packet::EntityDestroy {
            ids: vec![EntityId(1)],
        }));

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].payload,
            mcafk_core::protocol::EventPayload::Observed(Observation::TargetLost {
                id: EntityId(1)
            })
        ));
        assert!(model.tick().is_none());
    }

    #[test]
    fn human_attack_retargets() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        model.observe(&spawn(1, EntityKind::Hostile, 3.0, 0.0));
        model.observe(&spawn(2, EntityKind::Hostile, 8.0, 0.0));
        assert_eq!(model.target, Some(EntityId(1)));

        model.observe(&PacketFrame::serverbound(Packet::UseEntity {
            target: EntityId(2),
        }));
        assert_eq!(model.target, Some(EntityId(2)));
    }

    #[test]
    fn attack_on_unknown_entity_is_ignored() {
        let mut model = CombatModel::new();

        let events = model.observe(&PacketFrame::serverbound(Packet::UseEntity {
            target: EntityId(99),
        }));
        assert!(events.is_empty());
        assert_eq!(model.target, None);
    }

    #[test]
    fn respawn_clears_everything() {
        let mut model = CombatModel::new();

        model.observe(&own_position(0.0, 0.0));
        model.observe(&spawn(1, EntityKind::Hostile, 2.0, 0.0));

        let events = model.observe(&PacketFrame::clientbound(Packet::Respawn { dimension: 0 }));
        assert_eq!(events.len(), 1);
        assert!(model.tick().is_none());
    }

    #[test]
    fn no_strike_without_own_position() {
        let mut model = CombatModel::new();
        model.observe(&spawn(1, EntityKind::Hostile, 1.0, 0.0));
        assert!(model.tick().is_none());
    }
}
