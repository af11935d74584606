//! Foundation module - shared building blocks
//!
//! - Math aliases and the member [`Transform`](math::Transform)
//! - Slot map handles for host-side member storage
//! - Logger setup for binaries and tests

pub mod math;
pub mod collections;
pub mod logging;
