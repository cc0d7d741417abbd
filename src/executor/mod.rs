//! Command execution module
//!
//! Provides async command execution with:
//! - Timeout support
//! - Output capture and truncation
//! - Scrubbing of inherited environment variables
//! - Working directory control

pub mod command;

pub use command::*;
