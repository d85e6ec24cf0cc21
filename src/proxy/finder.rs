//! Proxy acquisition: aggregate, filter, then probe or list
//!
//! [`ProxyFinder`] owns no per-request state. Every call fetches a fresh
//! pool, filters it against the caller's criteria and drops it on return.

use crate::config::{Config, DEFAULT_CHECK_CONCURRENCY, DEFAULT_PROBE_CONCURRENCY};
use crate::error::{ProxyError, Result};
use crate::proxy::checker::{Probe, ProxyChecker};
use crate::proxy::crawler::{CandidateSource, ProxyCrawler};
use crate::proxy::criteria::{Criteria, SelectionOrder};
use crate::proxy::filter::filter_with_rng;
use crate::proxy::geo::GeoLocator;
use crate::proxy::models::{ProxyCandidate, ProxyConfig, ValidationOutcome};
use futures::stream::{self, BoxStream, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, instrument};

/// Finds working proxies matching caller criteria
pub struct ProxyFinder<S = ProxyCrawler, P = ProxyChecker> {
    source: S,
    probe: P,
    probe_concurrency: usize,
    check_concurrency: usize,
    seed: Option<u64>,
}

impl ProxyFinder {
    /// Build a finder over the configured sources with the reqwest checker
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let mut crawler = ProxyCrawler::with_config(config.crawler_config(), config.sources.clone())?;
        if let Some(path) = &config.mmdb_path {
            crawler = crawler.with_geo_locator(GeoLocator::from_path(path)?);
        }
        let checker = ProxyChecker::with_config(config.checker_config());

        Ok(ProxyFinder::with_parts(crawler, checker)
            .with_probe_concurrency(config.probe_concurrency)
            .with_check_concurrency(config.check_concurrency))
    }
}

impl<S: CandidateSource, P: Probe> ProxyFinder<S, P> {
    pub fn with_parts(source: S, probe: P) -> Self {
        Self {
            source,
            probe,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            check_concurrency: DEFAULT_CHECK_CONCURRENCY,
            seed: None,
        }
    }

    /// Number of probes raced at once by [`ProxyFinder::get`]
    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self
    }

    /// Number of probes run at once by [`ProxyFinder::check_all`]
    pub fn with_check_concurrency(mut self, concurrency: usize) -> Self {
        self.check_concurrency = concurrency.max(1);
        self
    }

    /// Make randomized ordering reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Fetch a fresh pool and filter it, in probing order
    pub async fn candidates(&self, criteria: &Criteria) -> Result<Vec<ProxyCandidate>> {
        criteria.validate()?;

        let pool = self.source.fetch_candidates(criteria).await?;
        let selected = match self.seed {
            Some(seed) => filter_with_rng(&pool, criteria, &mut StdRng::seed_from_u64(seed)),
            None => filter_with_rng(&pool, criteria, &mut rand::thread_rng()),
        };

        info!(
            "{} of {} candidates match ({})",
            selected.len(),
            pool.len(),
            criteria
        );
        Ok(selected)
    }

    /// Get one proxy that passed a live probe, as `scheme://host:port`.
    ///
    /// Candidates are probed in filtered order and probing stops at the
    /// first success.
    #[instrument(skip(self, criteria))]
    pub async fn get(&self, criteria: &Criteria) -> Result<String> {
        let candidates = self.candidates(criteria).await?;
        let (winner, attempted) = self.first_live(candidates, criteria).await;

        match winner {
            Some(outcome) => {
                let url = outcome.candidate.url(criteria.scheme());
                info!(
                    "Found working proxy {} after {} probes ({}ms)",
                    url,
                    attempted,
                    outcome.elapsed.as_millis()
                );
                Ok(url)
            }
            None => Err(ProxyError::NoWorkingProxyFound {
                attempted,
                criteria: criteria.clone(),
            }),
        }
    }

    /// Get one working proxy rendered for common HTTP clients
    pub async fn get_config(&self, criteria: &Criteria) -> Result<ProxyConfig> {
        let url = self.get(criteria).await?;
        Ok(ProxyConfig::new(url, criteria.scheme()))
    }

    /// Get up to `criteria.limit` matching addresses without probing them
    #[instrument(skip(self, criteria), fields(limit = criteria.limit))]
    pub async fn get_list(&self, criteria: &Criteria) -> Result<Vec<String>> {
        let candidates = self.candidates(criteria).await?;
        if candidates.is_empty() {
            return Err(ProxyError::NoProxiesFound {
                criteria: criteria.clone(),
            });
        }

        Ok(candidates
            .iter()
            .take(criteria.limit)
            .map(ProxyCandidate::address)
            .collect())
    }

    /// Probe every matching candidate and return all outcomes, live first
    /// and fastest first
    pub async fn check_all(&self, criteria: &Criteria) -> Result<Vec<ValidationOutcome>> {
        let candidates = self.candidates(criteria).await?;
        let (timeout, scheme) = (criteria.timeout, criteria.scheme());

        let mut outcomes: Vec<ValidationOutcome> = stream::iter(candidates)
            .map(move |candidate| async move { self.probe.validate(&candidate, timeout, scheme).await })
            .buffer_unordered(self.check_concurrency)
            .collect()
            .await;

        outcomes.sort_by_key(|o| (!o.success, o.elapsed));
        Ok(outcomes)
    }

    /// Probe candidates until one is live.
    ///
    /// At most `probe_concurrency` probes are in flight. Under sequential
    /// order outcomes are consumed in candidate order, so the earliest live
    /// candidate wins even when a later one answers first. Returning drops
    /// the stream, which cancels the probes still in flight.
    ///
    /// The returned count is the number of probes started, including any
    /// cancelled after the winner was found.
    async fn first_live(
        &self,
        candidates: Vec<ProxyCandidate>,
        criteria: &Criteria,
    ) -> (Option<ValidationOutcome>, usize) {
        let (timeout, scheme) = (criteria.timeout, criteria.scheme());
        let width = self.probe_concurrency;
        let started = AtomicUsize::new(0);

        let probes = stream::iter(candidates).map(|candidate| {
            started.fetch_add(1, Ordering::Relaxed);
            async move { self.probe.validate(&candidate, timeout, scheme).await }
        });

        let mut outcomes: BoxStream<'_, ValidationOutcome> = match criteria.order {
            SelectionOrder::Sequential => probes.buffered(width).boxed(),
            SelectionOrder::Randomized => probes.buffer_unordered(width).boxed(),
        };

        while let Some(outcome) = outcomes.next().await {
            if outcome.is_live() {
                return (Some(outcome), started.load(Ordering::Relaxed));
            }
            debug!(
                "Candidate {} is dead: {}",
                outcome.candidate,
                outcome
                    .failure_reason
                    .map_or_else(|| "unknown".to_string(), |r| r.to_string())
            );
        }

        (None, started.load(Ordering::Relaxed))
    }
}
