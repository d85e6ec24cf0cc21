use thiserror::Error;

use crate::proxy::criteria::Criteria;

/// Unified error type for proxy acquisition
#[derive(Error, Debug)]
pub enum ProxyError {
    // Inventory errors
    #[error("All {attempted} proxy sources failed: {}", errors.join("; "))]
    AggregationFailed {
        attempted: usize,
        errors: Vec<String>,
    },

    /// `attempted` counts probes started, including any cancelled once a
    /// race was decided
    #[error("No working proxy found after probing {attempted} candidates ({criteria})")]
    NoWorkingProxyFound { attempted: usize, criteria: Criteria },

    #[error("No proxies found matching the criteria ({criteria})")]
    NoProxiesFound { criteria: Criteria },

    #[error("Source {source_name} returned no parseable proxy listing")]
    MalformedListing { source_name: String },

    // Input errors
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geolocation error: {0}")]
    Geo(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for proxy acquisition
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Coarse classification a caller maps onto its own surface
/// (HTTP status, exit code, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The service works but has no matching inventory right now
    Unavailable,
    /// The caller supplied bad criteria or configuration
    InvalidInput,
    /// Something is broken
    Internal,
}

impl ProxyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProxyError::AggregationFailed { .. }
            | ProxyError::NoWorkingProxyFound { .. }
            | ProxyError::NoProxiesFound { .. }
            | ProxyError::MalformedListing { .. } => ErrorClass::Unavailable,

            ProxyError::InvalidCriteria(_) | ProxyError::InvalidConfig(_) => {
                ErrorClass::InvalidInput
            }

            ProxyError::Http(_) | ProxyError::Geo(_) | ProxyError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Check if this error means "no inventory right now"
    pub fn is_unavailable(&self) -> bool {
        self.class() == ErrorClass::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_class_mapping() {
        let criteria = Criteria::default();
        assert_eq!(
            ProxyError::AggregationFailed {
                attempted: 2,
                errors: vec!["a: refused".to_string(), "b: timeout".to_string()],
            }
            .class(),
            ErrorClass::Unavailable
        );
        assert_eq!(
            ProxyError::NoWorkingProxyFound {
                attempted: 3,
                criteria: criteria.clone(),
            }
            .class(),
            ErrorClass::Unavailable
        );
        assert_eq!(
            ProxyError::NoProxiesFound { criteria }.class(),
            ErrorClass::Unavailable
        );
        assert_eq!(
            ProxyError::InvalidCriteria("limit".to_string()).class(),
            ErrorClass::InvalidInput
        );
        assert_eq!(
            ProxyError::Internal("boom".to_string()).class(),
            ErrorClass::Internal
        );
    }

    #[test]
    fn test_unavailable_is_distinct_from_internal() {
        assert!(!ProxyError::Internal("parser crashed".to_string()).is_unavailable());
        assert!(ProxyError::NoProxiesFound {
            criteria: Criteria::default()
        }
        .is_unavailable());
    }

    #[test]
    fn test_error_messages_carry_diagnostics() {
        let err = ProxyError::NoWorkingProxyFound {
            attempted: 7,
            criteria: Criteria::default().with_countries(["US"]),
        };
        let msg = err.to_string();
        assert!(msg.contains("7 candidates"));
        assert!(msg.contains("US"));

        let err = ProxyError::AggregationFailed {
            attempted: 2,
            errors: vec!["a: refused".to_string(), "b: timeout".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "All 2 proxy sources failed: a: refused; b: timeout"
        );
    }
}
