//! Test infrastructure for the data access layer.
//!
//! Provides entity fixtures and a recording engine wrapper that counts calls
//! and can be scripted to misbehave.

#![allow(dead_code)]

pub mod fixtures;
pub mod harness;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
