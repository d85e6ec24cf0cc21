//! Proxy module for finding working public proxies
//!
//! This module provides functionality for:
//! - Crawling free proxy-list sites into one de-duplicated candidate pool
//! - Filtering candidates by country, anonymity, HTTPS and Google support
//! - Probing candidates through a real request with a hard deadline
//! - Selecting the first working proxy, or listing matches unprobed

pub mod checker;
pub mod crawler;
pub mod criteria;
pub mod filter;
pub mod finder;
pub mod geo;
pub mod models;
pub mod parser;

pub use checker::{CheckerConfig, Probe, ProxyChecker};
pub use crawler::{CandidateSource, CrawlResult, CrawlerConfig, ProxyCrawler, ProxySource, SourceFormat};
pub use criteria::{Criteria, SelectionOrder};
pub use filter::{filter, matches};
pub use finder::ProxyFinder;
pub use geo::GeoLocator;
pub use models::{
    Anonymity, FailureReason, PlaywrightProxy, ProxyCandidate, ProxyConfig, Scheme, ValidationOutcome,
};
pub use parser::ProxyParser;
