//! Proxy crawler module for aggregating candidates from proxy-list sites
//!
//! This module provides functionality for:
//! - Fetching several proxy listings concurrently
//! - Parsing HTML tables and plain-text lists into candidates
//! - Tolerating individual source failures and de-duplicating the pool

use crate::error::{ProxyError, Result};
use crate::proxy::criteria::Criteria;
use crate::proxy::geo::GeoLocator;
use crate::proxy::models::{Anonymity, ProxyCandidate};
use crate::proxy::parser::ProxyParser;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default timeout for HTTP requests in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of sources fetched at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default user agent for HTTP requests
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Layout of a proxy listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFormat {
    /// free-proxy-list.net style table with per-row metadata
    HtmlTable,
    /// One address per line; the source vouches for the metadata of all of
    /// its entries
    PlainText { anonymity: Anonymity, https: bool },
}

/// Proxy source representing a website that provides proxy lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySource {
    /// Name of the proxy source
    pub name: String,
    /// URL to fetch proxies from
    pub url: String,
    pub format: SourceFormat,
    /// Countries this source is limited to; empty for worldwide lists
    pub countries: Vec<String>,
}

impl ProxySource {
    pub fn new(name: &str, url: &str, format: SourceFormat) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            format,
            countries: Vec::new(),
        }
    }

    /// Restrict the source to the given countries
    pub fn scoped_to(mut self, countries: &[&str]) -> Self {
        self.countries = countries.iter().map(|c| c.to_uppercase()).collect();
        self
    }

    /// Whether this source can list proxies matching `criteria`
    pub fn covers(&self, criteria: &Criteria) -> bool {
        self.countries.is_empty()
            || criteria.countries.is_empty()
            || self.countries.iter().any(|c| criteria.countries.contains(c))
    }

    /// Get the built-in list of free proxy sources
    pub fn defaults() -> Vec<ProxySource> {
        vec![
            ProxySource::new(
                "free-proxy-list.net",
                "https://free-proxy-list.net/",
                SourceFormat::HtmlTable,
            ),
            ProxySource::new(
                "sslproxies",
                "https://www.sslproxies.org/",
                SourceFormat::HtmlTable,
            ),
            ProxySource::new(
                "anonymous-proxy",
                "https://free-proxy-list.net/anonymous-proxy.html",
                SourceFormat::HtmlTable,
            ),
            ProxySource::new("us-proxy.org", "https://www.us-proxy.org/", SourceFormat::HtmlTable)
                .scoped_to(&["US"]),
            ProxySource::new(
                "uk-proxy",
                "https://free-proxy-list.net/uk-proxy.html",
                SourceFormat::HtmlTable,
            )
            .scoped_to(&["GB"]),
        ]
    }
}

/// Result of crawling a single source
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// The source that was crawled
    pub source: String,
    /// Proxies extracted from the source
    pub proxies: Vec<ProxyCandidate>,
    /// Error message if crawling failed
    pub error: Option<String>,
}

impl CrawlResult {
    /// Create a successful crawl result
    pub fn success(source: String, proxies: Vec<ProxyCandidate>) -> Self {
        Self {
            source,
            proxies,
            error: None,
        }
    }

    /// Create a failed crawl result
    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            proxies: Vec::new(),
            error: Some(error),
        }
    }

    /// Check if the crawl was successful
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Combine per-source results into one candidate pool.
///
/// Fails only when no source succeeded. Duplicates are dropped by address,
/// keeping the first occurrence in source order.
pub fn merge_results(results: Vec<CrawlResult>) -> Result<Vec<ProxyCandidate>> {
    let attempted = results.len();
    let mut errors = Vec::new();
    let mut healthy = 0;
    let mut seen = HashSet::new();
    let mut pool = Vec::new();

    for result in results {
        if let Some(error) = result.error {
            errors.push(format!("{}: {}", result.source, error));
            continue;
        }
        healthy += 1;
        for candidate in result.proxies {
            if seen.insert(candidate.address()) {
                pool.push(candidate);
            }
        }
    }

    if healthy == 0 {
        return Err(ProxyError::AggregationFailed { attempted, errors });
    }

    Ok(pool)
}

/// Something that can produce a fresh candidate pool
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Fetch a de-duplicated pool from every source relevant to `criteria`
    async fn fetch_candidates(&self, criteria: &Criteria) -> Result<Vec<ProxyCandidate>>;
}

/// Configuration for proxy crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for each source fetch
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Number of sources fetched at once
    pub concurrency: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Proxy crawler for fetching candidates from proxy-list sites
#[derive(Debug, Clone)]
pub struct ProxyCrawler {
    config: CrawlerConfig,
    client: Client,
    sources: Vec<ProxySource>,
    geo_locator: Option<GeoLocator>,
}

impl ProxyCrawler {
    /// Create a new proxy crawler over the built-in sources
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default(), ProxySource::defaults())
    }

    /// Create a new proxy crawler with custom configuration and sources
    pub fn with_config(config: CrawlerConfig, sources: Vec<ProxySource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            config,
            client,
            sources,
            geo_locator: None,
        })
    }

    /// Fill missing country codes from an MMDB database
    pub fn with_geo_locator(mut self, geo_locator: GeoLocator) -> Self {
        self.geo_locator = Some(geo_locator);
        self
    }

    pub fn sources(&self) -> &[ProxySource] {
        &self.sources
    }

    /// Fetch and parse candidates from a single source
    #[instrument(skip(self, source), fields(source = %source.name))]
    pub async fn crawl_source(&self, source: &ProxySource) -> Result<Vec<ProxyCandidate>> {
        let response = self.client.get(&source.url).send().await?.error_for_status()?;
        let content = response.text().await?;
        let fetched_at = Utc::now();

        let builders = match &source.format {
            SourceFormat::HtmlTable => {
                let rows = ProxyParser::parse_table(&content, &source.name, fetched_at);
                if rows.is_empty() {
                    return Err(ProxyError::MalformedListing {
                        source_name: source.name.clone(),
                    });
                }
                rows
            }
            SourceFormat::PlainText { anonymity, https } => ProxyParser::parse_plain_text(
                &content,
                &source.name,
                *anonymity,
                *https,
                fetched_at,
            ),
        };

        let candidates: Vec<ProxyCandidate> = builders
            .into_iter()
            .map(|builder| match &self.geo_locator {
                Some(geo) if !builder.has_country() => {
                    let code = geo.country_code(builder.host());
                    builder.country_code(code.as_deref()).build()
                }
                _ => builder.build(),
            })
            .collect();

        debug!("Parsed {} candidates", candidates.len());
        Ok(candidates)
    }

    /// Fetch several sources concurrently, returning a result per source in
    /// the order given
    pub async fn crawl_sources_with_results(&self, sources: Vec<ProxySource>) -> Vec<CrawlResult> {
        stream::iter(sources)
            .map(|source: ProxySource| async move {
                match self.crawl_source(&source).await {
                    Ok(proxies) => CrawlResult::success(source.name.clone(), proxies),
                    Err(e) => {
                        warn!("Skipping source {}: {}", source.name, e);
                        CrawlResult::failure(source.name.clone(), e.to_string())
                    }
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Fetch a pool from every configured source
    pub async fn fetch_all(&self) -> Result<Vec<ProxyCandidate>> {
        self.aggregate(self.sources.clone()).await
    }

    async fn aggregate(&self, sources: Vec<ProxySource>) -> Result<Vec<ProxyCandidate>> {
        let attempted = sources.len();
        let results = self.crawl_sources_with_results(sources).await;
        let pool = merge_results(results)?;
        info!(
            "Aggregated {} unique candidates from {} sources",
            pool.len(),
            attempted
        );
        Ok(pool)
    }
}

#[async_trait]
impl CandidateSource for ProxyCrawler {
    async fn fetch_candidates(&self, criteria: &Criteria) -> Result<Vec<ProxyCandidate>> {
        let sources: Vec<ProxySource> = self
            .sources
            .iter()
            .filter(|s| s.covers(criteria))
            .cloned()
            .collect();
        self.aggregate(sources).await
    }
}
