//! Proxy data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Scheme a proxy is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn from_https(https: bool) -> Self {
        if https {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Anonymity level reported by a proxy listing.
///
/// Ordered from least to most private: a transparent proxy forwards the
/// client IP, an anonymous one hides it but announces itself as a proxy,
/// an elite one hides both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Anonymity {
    #[default]
    Transparent,
    Anonymous,
    Elite,
}

impl Anonymity {
    /// Parse the anonymity column of a listing ("elite proxy", "anonymous", ...)
    pub fn from_listing(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.contains("elite") || s.contains("high anonymity") {
            Some(Anonymity::Elite)
        } else if s.contains("anonymous") {
            Some(Anonymity::Anonymous)
        } else if s.contains("transparent") {
            Some(Anonymity::Transparent)
        } else {
            None
        }
    }
}

impl fmt::Display for Anonymity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anonymity::Transparent => write!(f, "transparent"),
            Anonymity::Anonymous => write!(f, "anonymous"),
            Anonymity::Elite => write!(f, "elite"),
        }
    }
}

/// A discovered, not yet validated proxy endpoint.
///
/// Fields are fixed at construction; use [`ProxyCandidate::builder`] from
/// the listing parsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCandidate {
    host: String,
    port: u16,
    country_code: Option<String>,
    anonymity: Anonymity,
    supports_https: bool,
    google: Option<bool>,
    source_timestamp: DateTime<Utc>,
    source: String,
}

impl ProxyCandidate {
    /// Start building a candidate for `host:port`
    pub fn builder(host: impl Into<String>, port: u16) -> ProxyCandidateBuilder {
        ProxyCandidateBuilder {
            candidate: ProxyCandidate {
                host: host.into(),
                port,
                country_code: None,
                anonymity: Anonymity::Transparent,
                supports_https: false,
                google: None,
                source_timestamp: Utc::now(),
                source: String::new(),
            },
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub fn anonymity(&self) -> Anonymity {
        self.anonymity
    }

    pub fn supports_https(&self) -> bool {
        self.supports_https
    }

    pub fn google(&self) -> Option<bool> {
        self.google
    }

    pub fn source_timestamp(&self) -> DateTime<Utc> {
        self.source_timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the address in HOST:PORT format, the natural key of a candidate
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the host as an IP address, if it is an IP literal
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Get the address with a scheme prefix, e.g. `http://1.2.3.4:8080`
    pub fn url(&self, scheme: Scheme) -> String {
        format!("{}://{}", scheme, self.address())
    }

    /// URL used to route traffic through this candidate.
    ///
    /// Listed proxies speak plain HTTP to the client; HTTPS targets are
    /// reached by CONNECT tunnelling.
    pub fn forward_url(&self) -> String {
        self.url(Scheme::Http)
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

/// Builder for [`ProxyCandidate`]
#[derive(Debug, Clone)]
pub struct ProxyCandidateBuilder {
    candidate: ProxyCandidate,
}

impl ProxyCandidateBuilder {
    pub fn country_code(mut self, code: Option<&str>) -> Self {
        self.candidate.country_code = code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());
        self
    }

    pub fn anonymity(mut self, anonymity: Anonymity) -> Self {
        self.candidate.anonymity = anonymity;
        self
    }

    pub fn supports_https(mut self, supports_https: bool) -> Self {
        self.candidate.supports_https = supports_https;
        self
    }

    pub fn google(mut self, google: Option<bool>) -> Self {
        self.candidate.google = google;
        self
    }

    pub fn source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.candidate.source_timestamp = timestamp;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.candidate.source = source.into();
        self
    }

    /// Whether a country code has been set yet
    pub fn has_country(&self) -> bool {
        self.candidate.country_code.is_some()
    }

    pub fn host(&self) -> &str {
        &self.candidate.host
    }

    pub fn build(self) -> ProxyCandidate {
        self.candidate
    }
}

/// Why a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    Timeout,
    Refused,
    ProtocolError,
    BadResponse,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Refused => write!(f, "refused"),
            FailureReason::ProtocolError => write!(f, "protocolError"),
            FailureReason::BadResponse => write!(f, "badResponse"),
        }
    }
}

/// Result of probing one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub candidate: ProxyCandidate,
    pub success: bool,
    pub elapsed: Duration,
    pub failure_reason: Option<FailureReason>,
}

impl ValidationOutcome {
    pub fn live(candidate: ProxyCandidate, elapsed: Duration) -> Self {
        Self {
            candidate,
            success: true,
            elapsed,
            failure_reason: None,
        }
    }

    pub fn dead(candidate: ProxyCandidate, elapsed: Duration, reason: FailureReason) -> Self {
        Self {
            candidate,
            success: false,
            elapsed,
            failure_reason: Some(reason),
        }
    }

    pub fn is_live(&self) -> bool {
        self.success
    }
}

/// Playwright `proxy` option shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaywrightProxy {
    pub server: String,
}

/// A validated proxy rendered for common HTTP clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub proxy_url: String,
    /// `proxies=` mapping for python-requests style clients
    pub requests: BTreeMap<String, String>,
    pub playwright: PlaywrightProxy,
}

impl ProxyConfig {
    pub fn new(proxy_url: String, scheme: Scheme) -> Self {
        let mut requests = BTreeMap::new();
        requests.insert(scheme.to_string(), proxy_url.clone());

        Self {
            playwright: PlaywrightProxy {
                server: proxy_url.clone(),
            },
            requests,
            proxy_url,
        }
    }
}
