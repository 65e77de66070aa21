//! # Configuration Module
//!
//! Service endpoint layout and per-session encode parameters.

pub mod config;
pub mod quality;

pub use config::{ClientConfig, DEFAULT_CONFIDENCE_DEBOUNCE, DEFAULT_SERVER};
pub use quality::QualityConfig;
