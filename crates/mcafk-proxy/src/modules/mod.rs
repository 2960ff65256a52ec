//! Behavior modules.
//!
//! Modules are the actuators of the proxy: they subscribe to the combined
//! predictor's event stream, re-check the suppression gate, and write packets
//! through the link. Each implements the same fixed capability surface and is
//! registered at construction; there is no runtime loading.

mod anti_afk;
mod auto_eat;
mod kill_aura;

use std::sync::Arc;

use mcafk_core::config::ProxyBehaviorConfig;
use mcafk_core::link::PacketLink;
use mcafk_core::Result;

use crate::prediction::PacketPredictor;

pub use anti_afk::AntiAfkModule;
pub use auto_eat::AutoEatModule;
pub use kill_aura::KillAuraModule;

/// The fixed capability surface of a behavior module.
pub trait BehaviorModule: Send + Sync {
    /// Stable module name, used in logs.
    fn name(&self) -> &'static str;

    /// Whether the configuration enables this module.
    fn enabled(&self) -> bool;

    /// Start acting on predictor events. No-op while already active or when
    /// the module is disabled.
    fn begin(&self) -> Result<()>;

    /// Stop acting. No-op while idle; safe to call repeatedly.
    fn end(&self) -> Result<()>;
}

/// The production module set, wired from the validated option bag.
pub fn standard_modules(
    link: Arc<dyn PacketLink>,
    predictor: Arc<dyn PacketPredictor>,
    behavior: &ProxyBehaviorConfig,
) -> Vec<Arc<dyn BehaviorModule>> {
    vec![
        Arc::new(AntiAfkModule::new(
            Arc::clone(&link),
            Arc::clone(&predictor),
            &behavior.anti_afk,
        )),
        Arc::new(AutoEatModule::new(
            Arc::clone(&link),
            Arc::clone(&predictor),
            &behavior.auto_eat,
        )),
        Arc::new(KillAuraModule::new(
            link,
            predictor,
            &behavior.anti_afk.kill_aura,
        )),
    ]
}
