//! Protocol and configuration constants for mcafk.

use std::time::Duration;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Game protocol tick. Server-visible state decays in units of this.
pub const PROTOCOL_TICK: Duration = Duration::from_millis(50);

/// Game version the packet model is shaped after.
pub const GAME_VERSION: &str = "1.12.2";

/// Oxygen value of a fully surfaced player, in air ticks.
pub const FULL_OXYGEN: i32 = 300;

/// Health of an untouched player, in half-hearts.
pub const FULL_HEALTH: f32 = 20.0;

/// Food level of a full hunger bar.
pub const FULL_FOOD: i32 = 20;

// =============================================================================
// Prediction Constants
// =============================================================================

/// Cadence of synthetic position refreshes.
pub const POSITION_CADENCE: Duration = Duration::from_millis(500);

/// Cadence of vitals evaluation.
pub const VITALS_CADENCE: Duration = Duration::from_millis(250);

/// Cadence of combat swings (1.12 attack cooldown is ~12 ticks).
pub const COMBAT_CADENCE: Duration = Duration::from_millis(600);

/// Oxygen level below which the breath predictor asks to surface.
pub const LOW_OXYGEN_THRESHOLD: i32 = 120;

/// Observations older than this are too stale to derive synthetics from.
pub const STALE_OBSERVATION_HORIZON: Duration = Duration::from_secs(30);

/// Consecutive server corrections before position prediction disables itself.
pub const MISPREDICTION_DISABLE_THRESHOLD: u8 = 3;

/// Squared distance at which a server correction counts as a misprediction.
pub const CORRECTION_EPSILON_SQ: f64 = 0.25;

/// Range within which a hostile becomes a combat target (blocks).
pub const TARGET_ACQUIRE_RANGE: f64 = 16.0;

/// Melee reach (blocks).
pub const MELEE_REACH: f64 = 3.0;

// =============================================================================
// Timing Constants
// =============================================================================

/// How long `ProxyServer::start` waits for the remote session to spawn.
pub const SPAWN_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Constant delay between restart attempts after a disconnect.
pub const RESTART_RETRY_DELAY: Duration = Duration::from_secs(5);

// =============================================================================
// Channel Capacities
// =============================================================================

/// Capacity of the broadcast channel carrying packet frames.
pub const PACKET_CHANNEL_CAPACITY: usize = 1024;

/// Capacity of each predictor's event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Default Values
// =============================================================================

/// Default Minecraft server port.
pub const DEFAULT_GAME_PORT: u16 = 25565;

/// Default remote server host.
pub const DEFAULT_REMOTE_HOST: &str = "2b2t.org";

/// Default local server host shown to attaching players.
pub const DEFAULT_LOCAL_HOST: &str = "connect.2b2t.org";

/// Default adapter socket address.
pub const DEFAULT_ADAPTER_ADDR: &str = "127.0.0.1:25585";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadences_are_multiples_of_the_tick() {
        assert_eq!(POSITION_CADENCE.as_millis() % PROTOCOL_TICK.as_millis(), 0);
        assert_eq!(VITALS_CADENCE.as_millis() % PROTOCOL_TICK.as_millis(), 0);
        assert_eq!(COMBAT_CADENCE.as_millis() % PROTOCOL_TICK.as_millis(), 0);
    }

    #[test]
    fn thresholds_are_within_range() {
        assert!(LOW_OXYGEN_THRESHOLD > 0);
        assert!(LOW_OXYGEN_THRESHOLD < FULL_OXYGEN);
        assert!(MELEE_REACH < TARGET_ACQUIRE_RANGE);
    }

    #[test]
    fn retry_is_slower_than_cadence() {
        assert!(RESTART_RETRY_DELAY > POSITION_CADENCE);
    }
}
