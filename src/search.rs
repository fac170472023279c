//! Hybrid search orchestrator.
//!
//! One entry point, `SearchEngine::search`, runs the full pipeline:
//! typo correction, preprocessing, filter merging, then either a
//! similarity scan over the embedded residual text or a filter-only
//! scan when nothing textual remains. Ranking happens client-side; the
//! store only projects similarities.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::embed::{EmbeddingError, EmbeddingGateway};
use crate::fuzzy::FuzzyCorrector;
use crate::invoices::{InvoiceStore, ScanFilters, SearchFilters, SearchResult, DEFAULT_LIMIT};
use crate::preprocess::{self, PreprocessedQuery};
use crate::vocab::{CacheStats, VocabularyCache, VOCAB_TTL_SECS};

pub struct SearchEngine {
    store: Arc<dyn InvoiceStore>,
    gateway: Option<Arc<dyn EmbeddingGateway>>,
    corrector: FuzzyCorrector,
    vocab: Arc<VocabularyCache>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn InvoiceStore>, gateway: Option<Arc<dyn EmbeddingGateway>>) -> Self {
        Self::with_vocab_ttl(store, gateway, VOCAB_TTL_SECS)
    }

    pub fn with_vocab_ttl(
        store: Arc<dyn InvoiceStore>,
        gateway: Option<Arc<dyn EmbeddingGateway>>,
        ttl_secs: i64,
    ) -> Self {
        let vocab = Arc::new(VocabularyCache::with_ttl(ttl_secs));
        let corrector = FuzzyCorrector::new(store.clone(), vocab.clone());
        SearchEngine {
            store,
            gateway,
            corrector,
            vocab,
        }
    }

    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> anyhow::Result<Vec<SearchResult>> {
        self.search_at(query, filters, Local::now().date_naive())
    }

    /// Same as `search` with an explicit "today" for relative dates.
    pub fn search_at(
        &self,
        query: &str,
        filters: &SearchFilters,
        today: NaiveDate,
    ) -> anyhow::Result<Vec<SearchResult>> {
        if query.trim().is_empty() && caller_filters_empty(filters) {
            return Ok(vec![]);
        }

        let corrected = self.corrector.correct(query);
        if corrected != query {
            log::debug!("query corrected: {query:?} -> {corrected:?}");
        }

        let pre = preprocess::preprocess_at(&corrected, today);
        let scan = merge_filters(&pre, filters);
        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT);

        let residual = pre.normalized_query.trim();
        if residual.is_empty() && scan.is_empty() {
            return Ok(vec![]);
        }

        if residual.is_empty() {
            log::debug!("filter-only search: {scan:?}");
            let mut rows = self.store.filtered_scan(&scan)?;
            rows.truncate(limit);
            return Ok(rows.into_iter().map(|row| row.into_result(1.0)).collect());
        }

        let gateway = self.gateway.as_ref().ok_or(EmbeddingError::NotConfigured)?;
        let embedding = gateway.generate(residual)?;

        let mut rows = self.store.similarity_scan(&scan, &embedding)?;
        rows.sort_by(|a, b| {
            let sa = a.similarity.unwrap_or(0.0);
            let sb = b.similarity.unwrap_or(0.0);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        rows.truncate(limit);

        Ok(rows.into_iter().map(|row| row.into_result(0.0)).collect())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.vocab.refresh_if_stale(self.store.as_ref());
        self.vocab.stats()
    }
}

fn caller_filters_empty(filters: &SearchFilters) -> bool {
    filters.branch_id.is_none()
        && filters.date_from.is_none()
        && filters.date_to.is_none()
        && filters.amount_min.is_none()
        && filters.amount_max.is_none()
}

/// Text-derived filters win; caller filters fill only the dimensions the
/// text left empty. Branch scoping is caller-only. Inverted ranges are
/// swapped, never emitted.
fn merge_filters(pre: &PreprocessedQuery, caller: &SearchFilters) -> ScanFilters {
    let mut date_from = pre.date_from.or(caller.date_from);
    let mut date_to = pre.date_to.or(caller.date_to);
    if let (Some(from), Some(to)) = (date_from, date_to) {
        if from > to {
            std::mem::swap(&mut date_from, &mut date_to);
        }
    }

    let mut amount_min = pre.amount_min.or(caller.amount_min);
    let mut amount_max = pre.amount_max.or(caller.amount_max);
    if let (Some(min), Some(max)) = (amount_min, amount_max) {
        if min > max {
            std::mem::swap(&mut amount_min, &mut amount_max);
        }
    }

    ScanFilters {
        branch_id: caller.branch_id,
        date_from,
        date_to,
        amount_min,
        amount_max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoices::{BackendMemory, Invoice};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct StubGateway {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl StubGateway {
        fn new(vector: Vec<f32>) -> Self {
            StubGateway {
                vector,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingGateway for StubGateway {
        fn generate(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    fn invoice(id: u64, vendor: &str, amount: f64, date: NaiveDate, emb: Option<Vec<f32>>) -> Invoice {
        Invoice {
            id,
            invoice_no: format!("INV-{id:04}"),
            vendor: vendor.to_string(),
            products: vec!["laptops".to_string()],
            amount,
            date,
            branch_id: Some(1),
            embedding: emb,
        }
    }

    #[test]
    fn test_empty_query_without_filters_contacts_nothing() {
        struct UnreachableStore;
        impl crate::invoices::InvoiceStore for UnreachableStore {
            fn similarity_scan(
                &self,
                _: &ScanFilters,
                _: &[f32],
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                unreachable!()
            }
            fn filtered_scan(
                &self,
                _: &ScanFilters,
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                unreachable!()
            }
            fn distinct_vendors(&self) -> anyhow::Result<Vec<String>> {
                unreachable!()
            }
            fn distinct_products(&self) -> anyhow::Result<Vec<String>> {
                unreachable!()
            }
            fn phonetic_candidates(
                &self,
                _: &str,
            ) -> anyhow::Result<Option<Vec<crate::invoices::PhoneticCandidate>>> {
                unreachable!()
            }
        }

        let gateway = Arc::new(StubGateway::new(vec![1.0, 0.0]));
        let engine = SearchEngine::new(Arc::new(UnreachableStore), Some(gateway.clone()));

        let results = engine.search("", &SearchFilters::default()).unwrap();
        assert!(results.is_empty());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_filter_only_path_scores_one_date_descending() {
        let store = Arc::new(BackendMemory::new());
        store.insert(invoice(1, "A", 100.0, d(2024, 1, 1), None));
        store.insert(invoice(2, "B", 100.0, d(2024, 3, 1), None));
        store.insert(invoice(3, "C", 100.0, d(2024, 2, 1), None));
        let engine = SearchEngine::new(store, None);

        let filters = SearchFilters {
            amount_max: Some(200.0),
            ..Default::default()
        };
        let results = engine.search("", &filters).unwrap();

        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(results.iter().all(|r| r.similarity == 1.0));
    }

    #[test]
    fn test_semantic_path_ranks_by_similarity_and_truncates() {
        let store = Arc::new(BackendMemory::new());
        store.insert(invoice(1, "Far", 1.0, d(2024, 1, 1), Some(vec![0.0, 1.0])));
        store.insert(invoice(2, "Near", 1.0, d(2024, 1, 2), Some(vec![1.0, 0.0])));
        store.insert(invoice(3, "Mid", 1.0, d(2024, 1, 3), Some(vec![0.9, 0.44])));
        let gateway = Arc::new(StubGateway::new(vec![1.0, 0.0]));
        let engine = SearchEngine::new(store, Some(gateway));

        let filters = SearchFilters {
            limit: Some(2),
            ..Default::default()
        };
        let results = engine.search("laptop chargers", &filters).unwrap();

        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[test]
    fn test_residual_text_without_gateway_fails() {
        let store = Arc::new(BackendMemory::new());
        store.insert(invoice(1, "A", 1.0, d(2024, 1, 1), Some(vec![1.0])));
        let engine = SearchEngine::new(store, None);

        let err = engine
            .search("laptop chargers", &SearchFilters::default())
            .unwrap_err();
        assert!(err.to_string().contains("no embedding provider"));
    }

    #[test]
    fn test_text_derived_filters_beat_caller_filters() {
        let pre = preprocess::preprocess_at("invoices from January 2024", d(2024, 6, 15));
        // The text pins January 2024; caller dates must be ignored.
        let caller = SearchFilters {
            date_from: Some(d(2023, 1, 1)),
            date_to: Some(d(2023, 12, 31)),
            branch_id: Some(9),
            ..Default::default()
        };
        let scan = merge_filters(&pre, &caller);
        assert_eq!(scan.date_from, Some(d(2024, 1, 1)));
        assert_eq!(scan.date_to, Some(d(2024, 1, 31)));
        assert_eq!(scan.branch_id, Some(9));
    }

    #[test]
    fn test_inverted_caller_range_is_swapped() {
        let pre = preprocess::preprocess_at("laptops", d(2024, 6, 15));
        let caller = SearchFilters {
            amount_min: Some(900.0),
            amount_max: Some(100.0),
            date_from: Some(d(2024, 5, 1)),
            date_to: Some(d(2024, 1, 1)),
            ..Default::default()
        };
        let scan = merge_filters(&pre, &caller);
        assert_eq!(scan.amount_min, Some(100.0));
        assert_eq!(scan.amount_max, Some(900.0));
        assert_eq!(scan.date_from, Some(d(2024, 1, 1)));
        assert_eq!(scan.date_to, Some(d(2024, 5, 1)));
    }

    #[test]
    fn test_default_limit_applies() {
        let store = Arc::new(BackendMemory::new());
        for id in 1..=30 {
            store.insert(invoice(id, "A", 1.0, d(2024, 1, 1), Some(vec![1.0])));
        }
        let gateway = Arc::new(StubGateway::new(vec![1.0]));
        let engine = SearchEngine::new(store, Some(gateway));

        let results = engine.search("laptops", &SearchFilters::default()).unwrap();
        assert_eq!(results.len(), DEFAULT_LIMIT);
    }
}
