//! Application Services
//!
//! Use-case orchestration on top of the domain and ports.

/// Join/leave validation and dispatch into the sentry directory.
pub mod registration;

pub use registration::{
    JoinCommand, LeaveCommand, RegistrationError, RegistrationService, ServiceInfo,
};
