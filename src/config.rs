use crate::error::{ProxyError, Result};
use crate::proxy::checker::{CheckerConfig, DEFAULT_HTTPS_TARGET, DEFAULT_HTTP_TARGET};
use crate::proxy::crawler::{CrawlerConfig, ProxySource, SourceFormat, DEFAULT_USER_AGENT};
use crate::proxy::models::Anonymity;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default number of probes raced at once in `get`
pub const DEFAULT_PROBE_CONCURRENCY: usize = 1;

/// Default number of probes run at once by the bulk check
pub const DEFAULT_CHECK_CONCURRENCY: usize = 10;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Proxy listings to aggregate, in priority order
    pub sources: Vec<ProxySource>,
    /// Timeout for each source fetch
    pub fetch_timeout: Duration,
    /// Number of sources fetched at once
    pub fetch_concurrency: usize,
    /// Number of probes raced at once when looking for one working proxy;
    /// 1 probes strictly one after another
    pub probe_concurrency: usize,
    /// Number of probes run at once by the bulk check
    pub check_concurrency: usize,
    /// URL probed for HTTP proxies
    pub http_target: String,
    /// URL probed for HTTPS proxies
    pub https_target: String,
    /// User agent for source fetches and probes
    pub user_agent: String,
    /// Optional MMDB database for filling in missing countries
    pub mmdb_path: Option<String>,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: ProxySource::defaults(),
            fetch_timeout: Duration::from_secs(crate::proxy::crawler::DEFAULT_TIMEOUT_SECS),
            fetch_concurrency: crate::proxy::crawler::DEFAULT_CONCURRENCY,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            check_concurrency: DEFAULT_CHECK_CONCURRENCY,
            http_target: DEFAULT_HTTP_TARGET.to_string(),
            https_target: DEFAULT_HTTPS_TARGET.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mmdb_path: None,
            log: LogConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut sources = defaults.sources;
        if let Some(extra) = get("PROXY_FINDER_EXTRA_SOURCES") {
            sources.extend(parse_extra_sources(&extra)?);
        }

        let config = Config {
            sources,
            fetch_timeout: match get("PROXY_FINDER_FETCH_TIMEOUT") {
                Some(v) => Duration::from_secs(parse_number("PROXY_FINDER_FETCH_TIMEOUT", &v)?),
                None => defaults.fetch_timeout,
            },
            fetch_concurrency: get("PROXY_FINDER_FETCH_CONCURRENCY")
                .map(|v| parse_number("PROXY_FINDER_FETCH_CONCURRENCY", &v))
                .transpose()?
                .unwrap_or(defaults.fetch_concurrency),
            probe_concurrency: get("PROXY_FINDER_PROBE_CONCURRENCY")
                .map(|v| parse_number("PROXY_FINDER_PROBE_CONCURRENCY", &v))
                .transpose()?
                .unwrap_or(defaults.probe_concurrency),
            check_concurrency: get("PROXY_FINDER_CHECK_CONCURRENCY")
                .map(|v| parse_number("PROXY_FINDER_CHECK_CONCURRENCY", &v))
                .transpose()?
                .unwrap_or(defaults.check_concurrency),
            http_target: get("PROXY_FINDER_HTTP_TARGET").unwrap_or(defaults.http_target),
            https_target: get("PROXY_FINDER_HTTPS_TARGET").unwrap_or(defaults.https_target),
            user_agent: get("PROXY_FINDER_USER_AGENT").unwrap_or(defaults.user_agent),
            mmdb_path: get("PROXY_FINDER_MMDB_PATH"),
            log: LogConfig {
                level: get("LOG_LEVEL").unwrap_or(defaults.log.level),
                format: get("LOG_FORMAT").unwrap_or(defaults.log.format),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(ProxyError::InvalidConfig(
                "at least one proxy source is required".into(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ProxyError::InvalidConfig(
                "PROXY_FINDER_FETCH_TIMEOUT must be greater than zero".into(),
            ));
        }
        if self.fetch_concurrency == 0 || self.probe_concurrency == 0 || self.check_concurrency == 0 {
            return Err(ProxyError::InvalidConfig(
                "concurrency settings must be at least 1".into(),
            ));
        }
        if !self.http_target.starts_with("http://") {
            return Err(ProxyError::InvalidConfig(
                "PROXY_FINDER_HTTP_TARGET must be an http:// URL".into(),
            ));
        }
        if !self.https_target.starts_with("https://") {
            return Err(ProxyError::InvalidConfig(
                "PROXY_FINDER_HTTPS_TARGET must be an https:// URL".into(),
            ));
        }
        if !matches!(self.log.format.as_str(), "json" | "pretty") {
            return Err(ProxyError::InvalidConfig(
                "LOG_FORMAT must be json or pretty".into(),
            ));
        }
        Ok(())
    }

    pub fn crawler_config(&self) -> CrawlerConfig {
        CrawlerConfig::new()
            .with_timeout(self.fetch_timeout)
            .with_user_agent(self.user_agent.clone())
            .with_concurrency(self.fetch_concurrency)
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig::new()
            .with_http_target(self.http_target.clone())
            .with_https_target(self.https_target.clone())
            .with_user_agent(self.user_agent.clone())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ProxyError::InvalidConfig(format!("{} must be a valid number", key)))
}

/// Parse `name=url` pairs separated by commas into plain-text sources.
///
/// Such lists carry no metadata, so their entries are treated as
/// transparent HTTP proxies unless the URL itself says otherwise.
fn parse_extra_sources(value: &str) -> Result<Vec<ProxySource>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                ProxyError::InvalidConfig(format!(
                    "PROXY_FINDER_EXTRA_SOURCES entry {:?} must be name=url",
                    entry
                ))
            })?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ProxyError::InvalidConfig(format!(
                    "PROXY_FINDER_EXTRA_SOURCES entry {:?} must be name=http(s)://...",
                    entry
                )));
            }
            Ok(ProxySource::new(
                name,
                url,
                SourceFormat::PlainText {
                    anonymity: Anonymity::Transparent,
                    https: false,
                },
            ))
        })
        .collect()
}
