//! Storage engine implementations.

#[cfg(feature = "memory")]
pub mod memory;
