//! Position and look prediction.
//!
//! Tracks the last movement the server has seen - whether it came from the
//! bot's own refreshes or from an attached human - and periodically re-asserts
//! it so the session never reads as idle. Server teleports are authoritative:
//! a correction that contradicts the last prediction degrades confidence, and
//! repeated contradictions disable synthetic movement until the world state
//! resets.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use mcafk_core::constants::{
    CORRECTION_EPSILON_SQ, MISPREDICTION_DISABLE_THRESHOLD, POSITION_CADENCE,
    STALE_OBSERVATION_HORIZON,
};
use mcafk_core::link::PacketLink;
use mcafk_core::protocol::{
    Direction, Look, Observation, Packet, PacketFrame, Position, PredictorEvent, SyntheticAction,
};

use super::predictor::{DrivenPredictor, Model};

/// Confidence in the movement model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confidence {
    /// Predictions match what the server accepts; re-assert position fully.
    Confident,
    /// A recent correction contradicted us; only refresh the look until a
    /// clean confirmation.
    Tentative,
    /// Too many contradictions; stay quiet until the world state resets.
    Disabled,
}

/// Movement state machine.
pub struct PositionModel {
    pos: Option<Position>,
    look: Option<Look>,
    on_ground: bool,
    /// Position asserted by the last synthetic, if any.
    predicted: Option<Position>,
    confidence: Confidence,
    corrections: u8,
    last_observed: Option<Instant>,
}

impl PositionModel {
    pub(crate) fn new() -> Self {
        Self {
            pos: None,
            look: None,
            on_ground: true,
            predicted: None,
            confidence: Confidence::Confident,
            corrections: 0,
            last_observed: None,
        }
    }

    fn record_movement(&mut self, pos: Position, on_ground: bool) -> PredictorEvent {
        self.pos = Some(pos);
        self.on_ground = on_ground;
        self.last_observed = Some(Instant::now());
        PredictorEvent::observed(Observation::Moved { pos, on_ground })
    }

    fn record_look(&mut self, look: Look) -> PredictorEvent {
        self.look = Some(look);
        self.last_observed = Some(Instant::now());
        PredictorEvent::observed(Observation::Faced { look })
    }

    /// A server teleport that contradicts the last prediction.
    fn misprediction(&mut self) {
        self.corrections = self.corrections.saturating_add(1);
        self.confidence = match self.confidence {
            Confidence::Confident => Confidence::Tentative,
            Confidence::Tentative => {
                if self.corrections >= MISPREDICTION_DISABLE_THRESHOLD {
                    Confidence::Disabled
                } else {
                    Confidence::Tentative
                }
            }
            Confidence::Disabled => Confidence::Disabled,
        };
        self.predicted = None;
    }

    /// A server teleport that agrees with the last prediction.
    fn confirmation(&mut self) {
        if self.confidence == Confidence::Tentative {
            self.corrections = 0;
            self.confidence = Confidence::Confident;
        }
    }

    fn stale(&self) -> bool {
        match self.last_observed {
            Some(at) => at.elapsed() > STALE_OBSERVATION_HORIZON,
            None => true,
        }
    }
}

impl Model for PositionModel {
    fn observe(&mut self, frame: &PacketFrame) -> Vec<PredictorEvent> {
        let mut events = Vec::new();

        match (&frame.direction, &frame.packet) {
            // Movement written toward the server is ground truth regardless of
            // whether the bot or an attached human produced it.
            (Direction::Serverbound, Packet::Position { pos, on_ground }) => {
                if pos.is_finite() {
                    events.push(self.record_movement(*pos, *on_ground));
                } else {
                    debug!("ignoring non-finite serverbound position");
                }
            }
            (
                Direction::Serverbound,
                Packet::PositionLook {
                    pos,
                    look,
                    on_ground,
                },
            ) => {
                if pos.is_finite() && look.is_finite() {
                    events.push(self.record_movement(*pos, *on_ground));
                    events.push(self.record_look(*look));
                } else {
                    debug!("ignoring non-finite serverbound position_look");
                }
            }
            (Direction::Serverbound, Packet::Look { look, .. }) => {
                if look.is_finite() {
                    events.push(self.record_look(*look));
                } else {
                    debug!("ignoring non-finite serverbound look");
                }
            }
            // A clientbound teleport is the server overriding our model.
            (
                Direction::Clientbound,
                Packet::PositionLook {
                    pos,
                    look,
                    on_ground,
                },
            ) => {
                if !pos.is_finite() || !look.is_finite() {
                    debug!("ignoring non-finite server teleport");
                    return events;
                }
                match self.predicted {
                    Some(predicted) if predicted.distance_sq(pos) > CORRECTION_EPSILON_SQ => {
                        debug!(
                            corrections = self.corrections + 1,
                            "server correction contradicts prediction"
                        );
                        self.misprediction();
                    }
                    Some(_) => self.confirmation(),
                    None => {}
                }
                events.push(self.record_movement(*pos, *on_ground));
                events.push(self.record_look(*look));
            }
            // A respawn invalidates everything we thought we knew.
            (Direction::Clientbound, Packet::Respawn { .. }) => {
                self.reset();
            }
            _ => {}
        }

        events
    }

    fn tick(&mut self) -> Option<SyntheticAction> {
        if self.stale() {
            return None;
        }
        let pos = self.pos?;
        let look = self.look?;

        match self.confidence {
            Confidence::Confident => {
                self.predicted = Some(pos);
                Some(SyntheticAction::HoldPosition {
                    pos,
                    look,
                    on_ground: self.on_ground,
                })
            }
            Confidence::Tentative => Some(SyntheticAction::Glance { look }),
            Confidence::Disabled => None,
        }
    }

    fn reset(&mut self) {
        *self = PositionModel::new();
    }
}

/// Predictor for the position and look concerns.
pub type PositionPredictor = DrivenPredictor<PositionModel>;

impl PositionPredictor {
    /// Create a position predictor bound to the given link.
    pub fn new(link: Arc<dyn PacketLink>) -> Self {
        DrivenPredictor::from_model("position", POSITION_CADENCE, link, PositionModel::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(x: f64, y: f64, z: f64) -> PacketFrame {
        PacketFrame::serverbound(Packet::PositionLook {
            pos: Position::new(x, y, z),
            look: Look::new(0.0, 0.0),
            on_ground: true,
        })
    }

    fn teleport(x: f64, y: f64, z: f64) -> PacketFrame {
        PacketFrame::clientbound(Packet::PositionLook {
            pos: Position::new(x, y, z),
            look: Look::new(0.0, 0.0),
            on_ground: true,
        })
    }

    #[test]
    fn no_synthetic_before_first_observation() {
        let mut model = PositionModel::new();
        assert!(model.tick().is_none());
    }

    #[test]
    fn observation_then_hold_position() {
        let mut model = PositionModel::new();

        let events = model.observe(&moved(10.0, 64.0, -5.0));
        assert_eq!(events.len(), 2); // Moved + Faced

        match model.tick() {
            Some(SyntheticAction::HoldPosition { pos, .. }) => {
                assert_eq!(pos, Position::new(10.0, 64.0, -5.0));
            }
            other => panic!("expected HoldPosition, got {other:?}"),
        }
    }

    #[test]
    fn synthetic_tracks_latest_observation() {
        let mut model = PositionModel::new();

        model.observe(&moved(0.0, 64.0, 0.0));
        model.tick();
        model.observe(&moved(100.0, 70.0, 100.0));

        match model.tick() {
            Some(SyntheticAction::HoldPosition { pos, .. }) => {
                assert_eq!(pos, Position::new(100.0, 70.0, 100.0));
            }
            other => panic!("expected HoldPosition, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_movement_is_ignored() {
        let mut model = PositionModel::new();

        let events = model.observe(&moved(f64::NAN, 64.0, 0.0));
        assert!(events.is_empty());
        assert!(model.tick().is_none());
    }

    #[test]
    fn contradicting_correction_degrades_to_glance() {
        let mut model = PositionModel::new();

        model.observe(&moved(0.0, 64.0, 0.0));
        assert!(matches!(
            model.tick(),
            Some(SyntheticAction::HoldPosition { .. })
        ));

        // Server disagrees by more than the epsilon.
        model.observe(&teleport(20.0, 64.0, 20.0));

        assert!(matches!(model.tick(), Some(SyntheticAction::Glance { .. })));
    }

    #[test]
    fn matching_correction_restores_confidence() {
        let mut model = PositionModel::new();

        model.observe(&moved(0.0, 64.0, 0.0));
        model.tick();
        model.observe(&teleport(20.0, 64.0, 20.0)); // contradiction -> Tentative
        model.tick(); // Glance; no new position prediction

        // Predict again from the corrected position, then get a matching ack.
        model.confirmation();
        assert!(matches!(
            model.tick(),
            Some(SyntheticAction::HoldPosition { .. })
        ));
    }

    #[test]
    fn repeated_corrections_disable_prediction() {
        let mut model = PositionModel::new();
        model.observe(&moved(0.0, 64.0, 0.0));

        for step in 0..3 {
            model.tick();
            // Ensure a prediction is outstanding before each contradiction.
            if model.predicted.is_none() {
                model.predicted = Some(Position::new(0.0, 64.0, 0.0));
            }
            model.observe(&teleport(30.0 + step as f64, 64.0, 0.0));
        }

        assert_eq!(model.confidence, Confidence::Disabled);
        assert!(model.tick().is_none());
    }

    #[test]
    fn respawn_resets_the_model() {
        let mut model = PositionModel::new();

        model.observe(&moved(0.0, 64.0, 0.0));
        model.observe(&teleport(50.0, 64.0, 0.0));
        model.observe(&PacketFrame::clientbound(Packet::Respawn { dimension: 0 }));

        assert_eq!(model.confidence, Confidence::Confident);
        assert!(model.tick().is_none()); // nothing observed since the reset
    }

    #[test]
    fn look_only_movement_updates_look() {
        let mut model = PositionModel::new();

        model.observe(&moved(0.0, 64.0, 0.0));
        model.observe(&PacketFrame::serverbound(Packet::Look {
            look: Look::new(90.0, 10.0),
            on_ground: true,
        }));

        match model.tick() {
            Some(SyntheticAction::HoldPosition { look, .. }) => {
                assert_eq!(look, Look::new(90.0, 10.0));
            }
            other => panic!("expected HoldPosition, got {other:?}"),
        }
    }
}
