//! Application Layer - Port definitions.
//!
//! This layer contains the port interfaces that define how the live feed
//! hands data to its consumers.

/// Port interfaces for feed consumers.
pub mod ports;
