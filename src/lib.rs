//! Proxy Finder - free proxy acquisition and validation
//!
//! Aggregates public proxy listings, filters them by caller criteria and
//! returns a proxy that answered a live probe, or a list of unprobed matches.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::{Config, LogConfig};
pub use error::{ErrorClass, ProxyError, Result};
pub use proxy::*;
