//! The packet queue prediction subsystem.
//!
//! Each predictor models one concern of server-visible bot state (position,
//! vitals, combat) by observing the decoded frame stream, and emits synthetic
//! refresh actions on its cadence while no human operator is attached. The
//! combined predictor composes them into the single unit behavior modules
//! subscribe to.

mod combat;
mod combined;
mod position;
mod predictor;
mod vitals;

pub use combat::CombatPredictor;
pub use combined::CombinedPredictor;
pub use position::PositionPredictor;
pub use predictor::{DrivenPredictor, PacketPredictor};
pub use vitals::VitalsPredictor;
