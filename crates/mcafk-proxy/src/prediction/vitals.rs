//! Vitals prediction: health, food and breath.
//!
//! The server never reminds an idle bot to breathe or eat; it just lets it
//! drown or starve. This predictor watches the clientbound vitals updates and
//! asks for a surface or an eat action when the observed values cross their
//! thresholds. It never acts on values it has not seen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use mcafk_core::config::AutoEatConfig;
use mcafk_core::constants::{FULL_FOOD, FULL_HEALTH, FULL_OXYGEN, LOW_OXYGEN_THRESHOLD, VITALS_CADENCE};
use mcafk_core::link::PacketLink;
use mcafk_core::protocol::{
    Direction, Hand, Observation, Packet, PacketFrame, PredictorEvent, SyntheticAction,
};

use super::predictor::{DrivenPredictor, Model};

/// Thresholds and pacing for the vitals model.
#[derive(Debug, Clone)]
struct VitalsOptions {
    eat_enabled: bool,
    eat_until_full: bool,
    min_health: f32,
    min_hunger: i32,
    eat_cooldown: Duration,
    hand: Hand,
    low_oxygen: i32,
}

impl VitalsOptions {
    fn from_config(config: &AutoEatConfig) -> Self {
        Self {
            eat_enabled: config.enabled,
            eat_until_full: config.eat_until_full,
            min_health: config.min_health,
            min_hunger: config.min_hunger,
            eat_cooldown: Duration::from_millis(config.eating_timeout_ms),
            hand: if config.use_off_hand {
                Hand::Off
            } else {
                Hand::Main
            },
            low_oxygen: LOW_OXYGEN_THRESHOLD,
        }
    }
}

/// Vitals state machine.
pub struct VitalsModel {
    options: VitalsOptions,
    health: Option<f32>,
    food: Option<i32>,
    saturation: f32,
    oxygen: Option<i32>,
    /// True between the first eat of a meal and the bar refilling.
    eating: bool,
    last_eat: Option<Instant>,
}

impl VitalsModel {
    fn new(options: VitalsOptions) -> Self {
        Self {
            options,
            health: None,
            food: None,
            saturation: 0.0,
            oxygen: None,
            eating: false,
            last_eat: None,
        }
    }

    fn eat_cooldown_over(&self) -> bool {
        match self.last_eat {
            Some(at) => at.elapsed() >= self.options.eat_cooldown,
            None => true,
        }
    }
}

impl Model for VitalsModel {
    fn observe(&mut self, frame: &PacketFrame) -> Vec<PredictorEvent> {
        if frame.direction != Direction::Clientbound {
            return Vec::new();
        }

        match &frame.packet {
            Packet::Health {
                health,
                food,
                saturation,
            } => {
                let valid = health.is_finite()
                    && (0.0..=FULL_HEALTH).contains(health)
                    && (0..=FULL_FOOD).contains(food);
                if !valid {
                    debug!(health, food, "ignoring out-of-range health update");
                    return Vec::new();
                }

                self.health = Some(*health);
                self.food = Some(*food);
                self.saturation = if saturation.is_finite() { *saturation } else { 0.0 };
                if *food >= FULL_FOOD {
                    self.eating = false;
                }

                vec![PredictorEvent::observed(Observation::Health {
                    health: *health,
                    food: *food,
                    saturation: self.saturation,
                })]
            }
            Packet::Breath { oxygen } => {
                if !(0..=FULL_OXYGEN).contains(oxygen) {
                    debug!(oxygen, "ignoring out-of-range breath update");
                    return Vec::new();
                }

                self.oxygen = Some(*oxygen);
                vec![PredictorEvent::observed(Observation::Breath { oxygen: *oxygen })]
            }
            // A fresh life gets fresh vitals; wait for the server to say so.
            Packet::Respawn { .. } => {
                self.reset();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn tick(&mut self) -> Option<SyntheticAction> {
        // Drowning outpaces starving; surfacing wins the tick.
        if let Some(oxygen) = self.oxygen {
            if oxygen < self.options.low_oxygen {
                return Some(SyntheticAction::Surface { oxygen });
            }
        }

        if !self.options.eat_enabled {
            return None;
        }

        let health = self.health?;
        let food = self.food?;

        let hungry = food <= self.options.min_hunger;
        let hurt = health <= self.options.min_health;
        let finishing_meal = self.eating && self.options.eat_until_full && food < FULL_FOOD;

        if (hungry || hurt || finishing_meal) && self.eat_cooldown_over() {
            self.eating = true;
            self.last_eat = Some(Instant::now());
            return Some(SyntheticAction::Eat {
                health,
                food,
                hand: self.options.hand,
            });
        }

        None
    }

    fn reset(&mut self) {
        self.health = None;
        self.food = None;
        self.saturation = 0.0;
        self.oxygen = None;
        self.eating = false;
        self.last_eat = None;
    }
}

/// Predictor for the health, food and breath concerns.
pub type VitalsPredictor = DrivenPredictor<VitalsModel>;

impl VitalsPredictor {
    /// Create a vitals predictor bound to the given link.
    pub fn new(link: Arc<dyn PacketLink>, config: &AutoEatConfig) -> Self {
        DrivenPredictor::from_model(
            "vitals",
            VITALS_CADENCE,
            link,
            VitalsModel::new(VitalsOptions::from_config(config)),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
