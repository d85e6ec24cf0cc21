//! Criteria filtering over a candidate pool

use crate::proxy::criteria::{Criteria, SelectionOrder};
use crate::proxy::models::ProxyCandidate;
use rand::seq::SliceRandom;
use rand::Rng;

/// Check a single candidate against every criterion
pub fn matches(candidate: &ProxyCandidate, criteria: &Criteria) -> bool {
    let country_ok = criteria.countries.is_empty()
        || candidate
            .country_code()
            .is_some_and(|code| criteria.countries.contains(code));

    let anonymity_ok = candidate.anonymity() >= criteria.anonymity_at_least;

    let https_ok = !criteria.https_only || candidate.supports_https();

    // Unknown compatibility never satisfies an explicit requirement
    let google_ok = match criteria.google {
        None => true,
        Some(required) => candidate.google() == Some(required),
    };

    country_ok && anonymity_ok && https_ok && google_ok
}

/// Filter a pool, ordering the result per `criteria.order`
pub fn filter(pool: &[ProxyCandidate], criteria: &Criteria) -> Vec<ProxyCandidate> {
    filter_with_rng(pool, criteria, &mut rand::thread_rng())
}

/// Same as [`filter`] with a caller-supplied random source, so randomized
/// order can be reproduced from a seed
pub fn filter_with_rng<R: Rng + ?Sized>(
    pool: &[ProxyCandidate],
    criteria: &Criteria,
    rng: &mut R,
) -> Vec<ProxyCandidate> {
    let mut selected: Vec<ProxyCandidate> = pool
        .iter()
        .filter(|candidate| matches(candidate, criteria))
        .cloned()
        .collect();

    if criteria.order == SelectionOrder::Randomized {
        selected.shuffle(rng);
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::Anonymity;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn proxy(
        host: &str,
        country: Option<&str>,
        anonymity: Anonymity,
        https: bool,
        google: Option<bool>,
    ) -> ProxyCandidate {
        ProxyCandidate::builder(host, 8080)
            .country_code(country)
            .anonymity(anonymity)
            .supports_https(https)
            .google(google)
            .build()
    }

    fn pool() -> Vec<ProxyCandidate> {
        vec![
            proxy("10.0.0.1", Some("US"), Anonymity::Elite, true, Some(true)),
            proxy("10.0.0.2", Some("US"), Anonymity::Anonymous, false, Some(false)),
            proxy("10.0.0.3", Some("GB"), Anonymity::Elite, true, None),
            proxy("10.0.0.4", None, Anonymity::Transparent, false, None),
            proxy("10.0.0.5", Some("DE"), Anonymity::Anonymous, true, Some(false)),
        ]
    }

    fn hosts(candidates: &[ProxyCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.host()).collect()
    }

    #[test]
    fn test_default_criteria_keeps_everything_in_order() {
        let result = filter(&pool(), &Criteria::new());
        assert_eq!(
            hosts(&result),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"]
        );
    }

    #[test]
    fn test_country_and_elite_scenario() {
        let pool = vec![
            proxy("A", Some("US"), Anonymity::Elite, true, None),
            proxy("B", Some("US"), Anonymity::Anonymous, false, None),
            proxy("C", Some("GB"), Anonymity::Elite, true, None),
        ];
        let criteria = Criteria::new()
            .with_countries(["US"])
            .with_anonymity(Anonymity::Elite);
        assert_eq!(hosts(&filter(&pool, &criteria)), vec!["A"]);
    }

    #[test]
    fn test_unknown_country_excluded_when_countries_given() {
        let criteria = Criteria::new().with_countries(["US", "GB"]);
        assert_eq!(
            hosts(&filter(&pool(), &criteria)),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]
        );
    }

    #[test]
    fn test_anonymity_floor_is_inclusive() {
        let criteria = Criteria::new().with_anonymity(Anonymity::Anonymous);
        assert_eq!(
            hosts(&filter(&pool(), &criteria)),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.5"]
        );
    }

    #[test]
    fn test_https_only() {
        let criteria = Criteria::new().with_https_only(true);
        assert_eq!(
            hosts(&filter(&pool(), &criteria)),
            vec!["10.0.0.1", "10.0.0.3", "10.0.0.5"]
        );
    }

    #[test]
    fn test_google_requires_exact_known_value() {
        let yes = Criteria::new().with_google(Some(true));
        assert_eq!(hosts(&filter(&pool(), &yes)), vec!["10.0.0.1"]);

        let no = Criteria::new().with_google(Some(false));
        assert_eq!(hosts(&filter(&pool(), &no)), vec!["10.0.0.2", "10.0.0.5"]);
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let criteria = Criteria::new().with_countries(["JP"]);
        assert!(filter(&pool(), &criteria).is_empty());
    }

    #[test]
    fn test_filter_is_pure_with_fixed_seed() {
        let pool = pool();
        let criteria = Criteria::new().with_random(true);
        let first = filter_with_rng(&pool, &criteria, &mut StdRng::seed_from_u64(7));
        let second = filter_with_rng(&pool, &criteria, &mut StdRng::seed_from_u64(7));
        assert_eq!(first, second);

        let sequential = Criteria::new();
        assert_eq!(filter(&pool, &sequential), filter(&pool, &sequential));
    }

    #[test]
    fn test_randomized_is_permutation_of_matches() {
        let criteria = Criteria::new().with_random(true);
        let mut shuffled = hosts(&filter(&pool(), &criteria))
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"]
        );
    }

    #[test]
    fn test_tightening_never_grows_result() {
        let bases = [
            Criteria::new(),
            Criteria::new().with_https_only(true),
            Criteria::new().with_anonymity(Anonymity::Anonymous),
        ];
        for base in &bases {
            let base_len = filter(&pool(), base).len();
            let tightened = [
                base.clone().with_countries(["US"]),
                base.clone().with_anonymity(Anonymity::Elite),
                base.clone().with_https_only(true),
                base.clone().with_google(Some(true)),
            ];
            for criteria in &tightened {
                assert!(filter(&pool(), criteria).len() <= base_len);
            }
        }
    }
}
