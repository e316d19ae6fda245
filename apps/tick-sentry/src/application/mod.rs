//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (feed, callback, catalog).
pub mod ports;

/// Application services for registration and service info.
pub mod services;
