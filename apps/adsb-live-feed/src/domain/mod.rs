//! Domain Layer - Aircraft and connection types.
//!
//! This layer contains the core domain types for live aircraft tracking
//! with no I/O. All types here are plain Rust with serialization support.

/// Aircraft entity delivered by the feed.
pub mod aircraft;

/// Connection state machine and close details.
pub mod connection;

/// Consumer-side snapshot of tracked aircraft.
pub mod snapshot;
