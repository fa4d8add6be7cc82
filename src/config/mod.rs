//! # Configuration
//!
//! Controller configuration loaded once at startup.

mod controller;

pub use controller::ControllerConfig;
