//! Count-based staleness detection.
//!
//! A scope's cached collection is trusted only when the relational row count
//! equals the number of cached keys in that scope. A collection whose rows were
//! swapped without changing the count is not detected.

use shopfront_core::ShopResult;
use tracing::debug;

use super::key::CacheKey;
use super::traits::{CacheFamily, KeyValueStore};
use crate::relational::RowSource;

/// Verdict for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Counts differ; the scope must be rebuilt. `keys` are the keys found,
    /// which the rebuild deletes first.
    Stale { rows: u64, keys: Vec<CacheKey> },
    /// Counts agree at zero.
    Empty,
    /// Counts agree and are non-zero; `keys` can be served as-is.
    Fresh { keys: Vec<CacheKey> },
}

impl Staleness {
    /// Pure decision from the two observations.
    pub fn decide(rows: u64, keys: Vec<CacheKey>) -> Self {
        if rows != keys.len() as u64 {
            Staleness::Stale { rows, keys }
        } else if keys.is_empty() {
            Staleness::Empty
        } else {
            Staleness::Fresh { keys }
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Stale { .. })
    }
}

/// Fetch the row count and enumerate the scope's keys concurrently, then
/// decide. Both observations must succeed before a verdict is made.
pub async fn detect<F, S, K>(source: &S, store: &K, scope: &F::Scope) -> ShopResult<Staleness>
where
    F: CacheFamily,
    S: RowSource<F> + ?Sized,
    K: KeyValueStore + ?Sized,
{
    let pattern = F::pattern(scope);
    let (rows, keys) = tokio::try_join!(source.count(scope), store.keys(&pattern))?;
    debug!(
        family = %F::FAMILY,
        pattern = %pattern,
        rows,
        keys = keys.len(),
        "Staleness check"
    );
    Ok(Staleness::decide(rows, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopfront_core::EntityFamily;

    fn keys(n: usize) -> Vec<CacheKey> {
        (0..n)
            .map(|i| CacheKey::simple(EntityFamily::Category, i))
            .collect()
    }

    #[test]
    fn test_empty_when_both_zero() {
        assert_eq!(Staleness::decide(0, vec![]), Staleness::Empty);
    }

    #[test]
    fn test_stale_when_cache_cold() {
        let verdict = Staleness::decide(2, vec![]);
        assert_eq!(verdict, Staleness::Stale { rows: 2, keys: vec![] });
    }

    #[test]
    fn test_stale_when_cache_has_extra_keys() {
        assert!(Staleness::decide(0, keys(1)).is_stale());
    }

    #[test]
    fn test_fresh_when_counts_match() {
        assert_eq!(
            Staleness::decide(5, keys(5)),
            Staleness::Fresh { keys: keys(5) }
        );
    }
}
