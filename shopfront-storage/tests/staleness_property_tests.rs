//! Property-Based Tests for Scope Staleness and Rebuilds
//!
//! **Property: Staleness triggers exactly on count mismatch**
//!
//! Given N relational rows and K cached keys for a scope, `scan` rebuilds if
//! and only if N != K, and when N == K > 0 it only reads.
//!
//! **Property: Rebuild idempotence**
//!
//! Two consecutive scans of an unchanged scope return identical output, and
//! the second performs no relational scan.

use proptest::prelude::*;
use shopfront_core::{Category, CategoryId, EntityFamily};
use shopfront_storage::{
    CacheFamily, CategoryCache, CategoryFamily, InMemoryStore, MemoryCatalog, Passthrough,
    RowWriter, SourceOp,
};
use shopfront_test_utils::{fixtures, generators};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn category_cache(
    catalog: &Arc<MemoryCatalog>,
    store: &Arc<InMemoryStore>,
) -> CategoryCache<MemoryCatalog, InMemoryStore> {
    CategoryCache::new(
        catalog.clone(),
        store.clone(),
        Arc::new(Passthrough),
        Duration::from_secs(3600),
    )
}

async fn seed_rows(catalog: &MemoryCatalog, rows: usize) -> Result<(), TestCaseError> {
    for i in 0..rows {
        RowWriter::<CategoryFamily>::create(catalog, fixtures::new_category(&format!("cat-{}", i)))
            .await
            .map_err(|e| TestCaseError::fail(format!("Failed to seed row: {}", e)))?;
    }
    Ok(())
}

/// Write `keys` valid entries that do not correspond to any row.
fn seed_keys(store: &InMemoryStore, keys: &[Category]) -> Result<(), TestCaseError> {
    for category in keys {
        let mut category = category.clone();
        category.id = CategoryId::generate();
        let bytes = serde_json::to_vec(&category)
            .map_err(|e| TestCaseError::fail(format!("Failed to encode: {}", e)))?;
        store.insert_raw(&CategoryFamily::key(&category.id), bytes);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rebuild_iff_counts_differ(
        rows in 0usize..6,
        cached in prop::collection::vec(generators::arb_category(), 0..6),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let catalog = Arc::new(MemoryCatalog::new());
            let store = Arc::new(InMemoryStore::new());
            seed_rows(&catalog, rows).await?;
            seed_keys(&store, &cached)?;
            catalog.reset_calls();
            let cache = category_cache(&catalog, &store);

            let result = cache.scan_all().await
                .map_err(|e| TestCaseError::fail(format!("scan failed: {}", e)))?;

            let rebuilt = catalog.calls(EntityFamily::Category, SourceOp::Scan) == 1;
            prop_assert_eq!(rebuilt, rows != cached.len());
            if rows == cached.len() {
                prop_assert_eq!(store.calls().mutations(), 0);
                prop_assert_eq!(result.len(), cached.len());
            } else {
                prop_assert_eq!(result.len(), rows);
                prop_assert_eq!(store.len(), rows);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_second_scan_is_identical_and_reads_only(rows in 0usize..8) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let catalog = Arc::new(MemoryCatalog::new());
            let store = Arc::new(InMemoryStore::new());
            seed_rows(&catalog, rows).await?;
            let cache = category_cache(&catalog, &store);

            let first = cache.scan_all().await
                .map_err(|e| TestCaseError::fail(format!("scan failed: {}", e)))?;
            catalog.reset_calls();
            let mutations = store.calls().mutations();

            let second = cache.scan_all().await
                .map_err(|e| TestCaseError::fail(format!("scan failed: {}", e)))?;

            prop_assert_eq!(
                serde_json::to_vec(&first).map_err(|e| TestCaseError::fail(e.to_string()))?,
                serde_json::to_vec(&second).map_err(|e| TestCaseError::fail(e.to_string()))?
            );
            prop_assert_eq!(catalog.calls(EntityFamily::Category, SourceOp::Scan), 0);
            prop_assert_eq!(catalog.calls(EntityFamily::Category, SourceOp::Count), 1);
            prop_assert_eq!(store.calls().mutations(), mutations);
            Ok(())
        })?;
    }
}
