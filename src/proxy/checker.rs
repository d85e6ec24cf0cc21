//! Proxy checker module for probing candidates
//!
//! A probe sends one request through the candidate, acting as a forward
//! proxy, to a well-known target and classifies the outcome within a hard
//! deadline.

use crate::error::Result;
use crate::proxy::models::{FailureReason, ProxyCandidate, Scheme, ValidationOutcome};
use async_trait::async_trait;
use reqwest::{redirect, Client, Proxy as ReqwestProxy};
use std::error::Error as StdError;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default target for plain HTTP probes
pub const DEFAULT_HTTP_TARGET: &str = "http://www.google.com";

/// Default target for HTTPS probes, reached through a CONNECT tunnel
pub const DEFAULT_HTTPS_TARGET: &str = "https://www.google.com";

/// Something that can tell whether a candidate currently works
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe `candidate` for `scheme` traffic, giving up after `timeout`
    async fn validate(
        &self,
        candidate: &ProxyCandidate,
        timeout: Duration,
        scheme: Scheme,
    ) -> ValidationOutcome;
}

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// URL probed for HTTP proxies
    pub http_target: String,
    /// URL probed for HTTPS proxies
    pub https_target: String,
    /// User agent sent with probes
    pub user_agent: Option<String>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            http_target: DEFAULT_HTTP_TARGET.to_string(),
            https_target: DEFAULT_HTTPS_TARGET.to_string(),
            user_agent: None,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_target(mut self, url: String) -> Self {
        self.http_target = url;
        self
    }

    pub fn with_https_target(mut self, url: String) -> Self {
        self.https_target = url;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }
}

/// Proxy checker for validating candidates
#[derive(Debug, Clone, Default)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// URL probed for the given scheme
    pub fn target(&self, scheme: Scheme) -> &str {
        match scheme {
            Scheme::Http => &self.config.http_target,
            Scheme::Https => &self.config.https_target,
        }
    }

    /// Create a reqwest client that routes everything through the candidate
    /// and nothing else
    fn create_client(&self, candidate: &ProxyCandidate, timeout: Duration) -> Result<Client> {
        let proxy = ReqwestProxy::all(candidate.forward_url())?;

        let mut builder = Client::builder()
            .no_proxy()
            .proxy(proxy)
            .redirect(redirect::Policy::none())
            .connect_timeout(timeout)
            .timeout(timeout)
            .pool_max_idle_per_host(0);

        if let Some(user_agent) = &self.config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl Probe for ProxyChecker {
    async fn validate(
        &self,
        candidate: &ProxyCandidate,
        timeout: Duration,
        scheme: Scheme,
    ) -> ValidationOutcome {
        let start = Instant::now();

        let client = match self.create_client(candidate, timeout) {
            Ok(client) => client,
            Err(e) => {
                debug!("Cannot build client for {}: {}", candidate, e);
                return ValidationOutcome::dead(
                    candidate.clone(),
                    start.elapsed(),
                    FailureReason::ProtocolError,
                );
            }
        };

        let target = self.target(scheme);
        let reason = match tokio::time::timeout(timeout, client.get(target).send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if !(status.is_success() || status.is_redirection()) {
                    debug!("Proxy {} answered {}", candidate, status);
                    Some(FailureReason::BadResponse)
                } else if !peer_matches(candidate.ip(), response.remote_addr()) {
                    debug!(
                        "Proxy {} response came from {:?}",
                        candidate,
                        response.remote_addr()
                    );
                    Some(FailureReason::BadResponse)
                } else {
                    None
                }
            }
            Ok(Err(e)) => {
                debug!("Proxy {} failed: {}", candidate, e);
                Some(classify(&e))
            }
            Err(_) => Some(FailureReason::Timeout),
        };

        let elapsed = start.elapsed();
        match reason {
            None => {
                debug!("Proxy {} is live ({}ms)", candidate, elapsed.as_millis());
                ValidationOutcome::live(candidate.clone(), elapsed)
            }
            Some(reason) => ValidationOutcome::dead(candidate.clone(), elapsed, reason),
        }
    }
}

/// Map a transport error onto a failure tag.
///
/// reqwest reports a refused socket, a rejected CONNECT and a failed TLS
/// handshake all as connect errors, so the cause chain decides.
fn classify(err: &reqwest::Error) -> FailureReason {
    if err.is_timeout() {
        return FailureReason::Timeout;
    }

    let mut cause: Option<&(dyn StdError + 'static)> = Some(err as &(dyn StdError + 'static));
    while let Some(current) = cause {
        if let Some(reason) = classify_cause(current) {
            return reason;
        }
        cause = current.source();
    }

    // TLS and HTTP parse failures
    FailureReason::ProtocolError
}

fn classify_cause(err: &(dyn StdError + 'static)) -> Option<FailureReason> {
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        return match io_err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable => Some(FailureReason::Refused),
            io::ErrorKind::TimedOut => Some(FailureReason::Timeout),
            _ => None,
        };
    }

    let message = err.to_string();
    if TUNNEL_REJECTIONS.iter().any(|m| message.contains(m)) {
        Some(FailureReason::BadResponse)
    } else if message.starts_with("tcp connect error") || message.starts_with("dns error") {
        Some(FailureReason::Refused)
    } else {
        None
    }
}

/// Messages reqwest uses when a proxy does not open a CONNECT tunnel
const TUNNEL_REJECTIONS: &[&str] = &[
    "unsuccessful tunnel",
    "proxy authentication required",
    "proxy headers too long for tunnel",
    "unexpected eof while tunneling",
];

/// The response must have come over the socket to the candidate itself.
/// Only checked when both sides are known.
fn peer_matches(expected: Option<IpAddr>, peer: Option<SocketAddr>) -> bool {
    match (expected, peer) {
        (Some(expected), Some(peer)) => canonical(peer.ip()) == canonical(expected),
        _ => true,
    }
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}
