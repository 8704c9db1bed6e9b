//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! its configuration types and the broadcast channel used to publish sync,
//! library and queue events to the host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
