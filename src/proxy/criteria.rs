//! Selection criteria supplied by a caller for one acquisition

use crate::error::{ProxyError, Result};
use crate::proxy::models::{Anonymity, Scheme};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Default probe timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 1.0;

/// Default number of entries returned in list mode
pub const DEFAULT_LIMIT: usize = 10;

/// Largest accepted list-mode limit
pub const MAX_LIMIT: usize = 100;

/// Order in which filtered candidates are probed or listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionOrder {
    /// Keep the order the sources listed candidates in
    #[default]
    Sequential,
    /// Uniformly shuffle the filtered candidates
    Randomized,
}

impl fmt::Display for SelectionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionOrder::Sequential => write!(f, "sequential"),
            SelectionOrder::Randomized => write!(f, "randomized"),
        }
    }
}

/// Criteria a proxy has to satisfy.
///
/// Every field has a default, so `Criteria::default()` matches any listed
/// proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Accepted ISO country codes (upper case). Empty accepts any country.
    pub countries: BTreeSet<String>,
    /// Minimum anonymity level
    pub anonymity_at_least: Anonymity,
    /// Only proxies that tunnel HTTPS; also switches probes and returned
    /// addresses to the `https` scheme
    pub https_only: bool,
    /// Required Google compatibility. `None` accepts anything; `Some(v)`
    /// requires the source to have reported exactly `v`.
    pub google: Option<bool>,
    /// Per-probe deadline
    pub timeout: Duration,
    pub order: SelectionOrder,
    /// Maximum number of entries in list mode
    pub limit: usize,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            countries: BTreeSet::new(),
            anonymity_at_least: Anonymity::Transparent,
            https_only: false,
            google: None,
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            order: SelectionOrder::Sequential,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.countries = countries
            .into_iter()
            .map(|c| c.as_ref().trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        self
    }

    pub fn with_anonymity(mut self, anonymity: Anonymity) -> Self {
        self.anonymity_at_least = anonymity;
        self
    }

    /// Set the anonymity floor from the boundary's `anonymous` / `elite`
    /// flags; `elite` implies `anonymous`
    pub fn with_anonymity_flags(self, anonymous: bool, elite: bool) -> Self {
        let floor = if elite {
            Anonymity::Elite
        } else if anonymous {
            Anonymity::Anonymous
        } else {
            Anonymity::Transparent
        };
        self.with_anonymity(floor)
    }

    pub fn with_https_only(mut self, https_only: bool) -> Self {
        self.https_only = https_only;
        self
    }

    pub fn with_google(mut self, google: Option<bool>) -> Self {
        self.google = google;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the probe timeout from float seconds as accepted at the boundary
    pub fn with_timeout_secs(self, secs: f64) -> Result<Self> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ProxyError::InvalidCriteria(format!(
                "timeout must be a positive number of seconds, got {}",
                secs
            )));
        }
        let timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
            ProxyError::InvalidCriteria(format!("timeout of {} seconds is out of range: {}", secs, e))
        })?;
        Ok(self.with_timeout(timeout))
    }

    pub fn with_order(mut self, order: SelectionOrder) -> Self {
        self.order = order;
        self
    }

    /// `true` selects [`SelectionOrder::Randomized`]
    pub fn with_random(self, random: bool) -> Self {
        self.with_order(if random {
            SelectionOrder::Randomized
        } else {
            SelectionOrder::Sequential
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Scheme used for probes and for rendering returned addresses
    pub fn scheme(&self) -> Scheme {
        Scheme::from_https(self.https_only)
    }

    /// Check the constraints the boundary promises
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ProxyError::InvalidCriteria(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(ProxyError::InvalidCriteria(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, self.limit
            )));
        }
        if let Some(code) = self
            .countries
            .iter()
            .find(|c| c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_alphabetic()))
        {
            return Err(ProxyError::InvalidCriteria(format!(
                "country must be a two-letter ISO code, got {:?}",
                code
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let countries = if self.countries.is_empty() {
            "any".to_string()
        } else {
            self.countries.iter().cloned().collect::<Vec<_>>().join(",")
        };
        let google = match self.google {
            Some(true) => "yes",
            Some(false) => "no",
            None => "any",
        };
        write!(
            f,
            "country={} anonymity>={} https={} google={} order={} timeout={:?}",
            countries, self.anonymity_at_least, self.https_only, google, self.order, self.timeout
        )
    }
}
