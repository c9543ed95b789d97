//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for glacsync:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the binary sets up before any
//! sync work starts. It establishes the logging conventions and the
//! configuration file format used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{GlacsyncConfig, GlacsyncConfigBuilder};
pub use error::{Error, Result};
