//! Frequency Control - per-operation request quotas
//!
//! This crate guards designated operations against excessive call volume.
//! Each call is bound to a rate-limit key derived from the operation and the
//! caller's identity, and admitted or rejected by a fixed-window counter.
//! Call-site rule specs are merged with process-wide defaults at admission
//! time; counters live in a pluggable backend.

pub mod config;
pub mod error;
pub mod gate;
pub mod ratelimit;
