//! Domain Layer - Core fan-out types and business logic.
//!
//! This layer contains the core domain types for tick distribution
//! with no external dependencies. All types here are pure Rust with
//! serialization support where the wire needs it.

/// Tick value type, sentry identity, and instrument parsing.
pub mod tick;

/// Subscriber records, control messages, and the ordered subscriber set.
pub mod subscription;
