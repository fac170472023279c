//! Process-wide vocabulary cache of distinct vendor and product names.
//!
//! The whole snapshot is replaced behind an `Arc` swap, so a reader
//! either sees the old lists or the new ones, never a mix. Refresh is
//! TTL-gated and unguarded: concurrent requests may race to refresh and
//! the loser's work is redundant, not wrong. A refresh failure keeps the
//! previous snapshot authoritative.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};

use crate::invoices::InvoiceStore;

/// How long a snapshot stays fresh.
pub const VOCAB_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Default)]
pub struct VocabSnapshot {
    pub vendors: Vec<String>,
    pub products: Vec<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub vendor_count: usize,
    pub product_count: usize,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct VocabularyCache {
    snapshot: RwLock<Arc<VocabSnapshot>>,
    ttl_secs: i64,
}

impl VocabularyCache {
    pub fn new() -> Self {
        Self::with_ttl(VOCAB_TTL_SECS)
    }

    pub fn with_ttl(ttl_secs: i64) -> Self {
        VocabularyCache {
            snapshot: RwLock::new(Arc::new(VocabSnapshot::default())),
            ttl_secs,
        }
    }

    /// The current snapshot, possibly stale or empty.
    pub fn snapshot(&self) -> Arc<VocabSnapshot> {
        self.snapshot.read().unwrap().clone()
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.snapshot().refreshed_at {
            None => true,
            Some(at) => now - at > Duration::seconds(self.ttl_secs),
        }
    }

    /// Refresh from the store when the TTL has lapsed. Returns the
    /// snapshot to use either way; a failed refresh is logged and the
    /// previous snapshot stands.
    pub fn refresh_if_stale(&self, store: &dyn InvoiceStore) -> Arc<VocabSnapshot> {
        let now = Utc::now();
        if !self.is_stale(now) {
            return self.snapshot();
        }

        let fetched = store
            .distinct_vendors()
            .and_then(|vendors| store.distinct_products().map(|products| (vendors, products)));

        match fetched {
            Ok((vendors, products)) => {
                log::debug!(
                    "vocabulary refreshed: {} vendors, {} products",
                    vendors.len(),
                    products.len()
                );
                let fresh = Arc::new(VocabSnapshot {
                    vendors,
                    products,
                    refreshed_at: Some(now),
                });
                *self.snapshot.write().unwrap() = fresh.clone();
                fresh
            }
            Err(err) => {
                log::warn!("vocabulary refresh failed, keeping previous snapshot: {err}");
                self.snapshot()
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let snapshot = self.snapshot();
        CacheStats {
            vendor_count: snapshot.vendors.len(),
            product_count: snapshot.products.len(),
            refreshed_at: snapshot.refreshed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoices::{BackendMemory, Invoice};
    use chrono::NaiveDate;

    fn seeded_store() -> BackendMemory {
        let store = BackendMemory::new();
        store.insert(Invoice {
            id: 1,
            invoice_no: "INV-0001".to_string(),
            vendor: "Gaurav Enterprises".to_string(),
            products: vec!["laptops".to_string(), "monitors".to_string()],
            amount: 5000.0,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            branch_id: None,
            embedding: None,
        });
        store
    }

    #[test]
    fn test_starts_empty_and_stale() {
        let cache = VocabularyCache::new();
        assert!(cache.is_stale(Utc::now()));
        assert!(cache.snapshot().vendors.is_empty());
    }

    #[test]
    fn test_refresh_populates_snapshot() {
        let cache = VocabularyCache::new();
        let store = seeded_store();

        let snapshot = cache.refresh_if_stale(&store);
        assert_eq!(snapshot.vendors, vec!["Gaurav Enterprises"]);
        assert_eq!(snapshot.products, vec!["laptops", "monitors"]);
        assert!(snapshot.refreshed_at.is_some());
        assert!(!cache.is_stale(Utc::now()));
    }

    #[test]
    fn test_fresh_snapshot_skips_store() {
        struct FailingStore;
        impl crate::invoices::InvoiceStore for FailingStore {
            fn similarity_scan(
                &self,
                _: &crate::invoices::ScanFilters,
                _: &[f32],
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                unreachable!()
            }
            fn filtered_scan(
                &self,
                _: &crate::invoices::ScanFilters,
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                unreachable!()
            }
            fn distinct_vendors(&self) -> anyhow::Result<Vec<String>> {
                anyhow::bail!("store down")
            }
            fn distinct_products(&self) -> anyhow::Result<Vec<String>> {
                anyhow::bail!("store down")
            }
            fn phonetic_candidates(
                &self,
                _: &str,
            ) -> anyhow::Result<Option<Vec<crate::invoices::PhoneticCandidate>>> {
                Ok(None)
            }
        }

        let cache = VocabularyCache::new();
        let store = seeded_store();
        cache.refresh_if_stale(&store);

        // Within the TTL a broken store is never consulted.
        let snapshot = cache.refresh_if_stale(&FailingStore);
        assert_eq!(snapshot.vendors, vec!["Gaurav Enterprises"]);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let cache = VocabularyCache::with_ttl(0);
        let store = seeded_store();
        cache.refresh_if_stale(&store);

        struct BrokenStore;
        impl crate::invoices::InvoiceStore for BrokenStore {
            fn similarity_scan(
                &self,
                _: &crate::invoices::ScanFilters,
                _: &[f32],
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                anyhow::bail!("store down")
            }
            fn filtered_scan(
                &self,
                _: &crate::invoices::ScanFilters,
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                anyhow::bail!("store down")
            }
            fn distinct_vendors(&self) -> anyhow::Result<Vec<String>> {
                anyhow::bail!("store down")
            }
            fn distinct_products(&self) -> anyhow::Result<Vec<String>> {
                anyhow::bail!("store down")
            }
            fn phonetic_candidates(
                &self,
                _: &str,
            ) -> anyhow::Result<Option<Vec<crate::invoices::PhoneticCandidate>>> {
                Ok(None)
            }
        }

        // TTL of zero forces a refresh attempt, which fails.
        let snapshot = cache.refresh_if_stale(&BrokenStore);
        assert_eq!(snapshot.vendors, vec!["Gaurav Enterprises"]);

        let stats = cache.stats();
        assert_eq!(stats.vendor_count, 1);
        assert_eq!(stats.product_count, 2);
    }
}
