//! Configuration Module
//!
//! Configuration loading for the tick distribution service.

mod settings;

pub use settings::{
    CatalogSettings, ConfigError, FeedSettings, SentrySettings, ServerSettings, ServiceConfig,
};
