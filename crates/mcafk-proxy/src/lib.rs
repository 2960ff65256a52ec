//! mcafk-proxy: the anti-idle proxy.
//!
//! This crate provides:
//! - The prediction subsystem: per-concern packet queue predictors and the
//!   combined predictor behavior modules subscribe to
//! - Behavior modules: anti-idle movement, auto-eat, kill-aura
//! - The `ProxyServer` session controller
//! - The adapter socket bridging to an external protocol translator

pub mod adapter;
pub mod cli;
pub mod modules;
pub mod prediction;
pub mod server;

pub use cli::Cli;
pub use prediction::{CombinedPredictor, PacketPredictor};
pub use server::ProxyServer;
