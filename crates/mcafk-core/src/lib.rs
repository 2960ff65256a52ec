//! mcafk-core: Shared library for the mcafk anti-idle proxy.
//!
//! This crate provides:
//! - Protocol model: decoded packet and predictor event types
//! - The connection seam (`PacketLink`) and its in-process implementation
//! - Configuration loading and validation
//! - Error taxonomy
//! - Logging and session metrics

pub mod config;
pub mod constants;
pub mod error;
pub mod link;
pub mod logging;
pub mod metrics;
pub mod protocol;

pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
pub use metrics::SessionMetrics;
