//! Relayer integration module for the shielded pool
//!
//! This module provides the client and types for the relayer's HTTP API. The
//! relayer holds the append-only commitment log, accepts proved transactions
//! for submission and reports the status of submission jobs.

/// HTTP client and the trait the engine consumes
mod client;
/// Type definitions for relayer data structures
mod types;

pub use client::{RelayerApi, RelayerClient};
pub use types::*;
