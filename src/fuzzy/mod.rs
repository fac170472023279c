//! Typo correction against the live vendor/product vocabulary and a
//! static domain dictionary.
//!
//! Correction never fails a request: a store error during phonetic
//! lookup degrades that token to "no correction", and a vocabulary
//! refresh failure leaves the previous snapshot in place. Re-running
//! `correct` on already-correct text is a no-op up to vocabulary drift.

pub mod dictionary;
pub mod phonetic;

use std::collections::HashSet;
use std::sync::Arc;

use crate::invoices::{InvoiceStore, PhoneticCandidate};
use crate::vocab::{VocabSnapshot, VocabularyCache};

/// Minimum token length worth correcting.
const MIN_TOKEN_LEN: usize = 3;
/// Normalized-similarity floor shared by phrase and vocabulary matching.
const SIMILARITY_THRESHOLD: f64 = 0.6;
/// Per-token edit budget for multi-word phrase windows.
const PHRASE_DISTANCE_PER_TOKEN: usize = 2;
/// Confidence needed to inject a full multi-word vendor name from a
/// phonetic match on its first token.
const FULL_NAME_CONFIDENCE: f32 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub original: String,
    pub corrected: String,
    pub was_changed: bool,
    pub confidence: f32,
}

impl FuzzyMatch {
    fn unchanged(token: &str) -> Self {
        FuzzyMatch {
            original: token.to_string(),
            corrected: token.to_string(),
            was_changed: false,
            confidence: 1.0,
        }
    }

    fn changed(original: &str, corrected: String, confidence: f32) -> Self {
        let was_changed = original != corrected;
        FuzzyMatch {
            original: original.to_string(),
            corrected,
            was_changed,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Case-insensitive normalized edit similarity in [0, 1].
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Re-apply the capitalization pattern of `original` to `corrected`.
/// Mixed patterns fall back to lowercase.
pub fn preserve_case(original: &str, corrected: &str) -> String {
    let alphabetic: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    if !alphabetic.is_empty() && alphabetic.iter().all(|c| c.is_uppercase()) {
        return corrected.to_uppercase();
    }
    if alphabetic.iter().all(|c| c.is_lowercase()) {
        return corrected.to_lowercase();
    }

    let first_upper = alphabetic.first().map(|c| c.is_uppercase()).unwrap_or(false);
    let rest_lower = alphabetic.iter().skip(1).all(|c| c.is_lowercase());
    if first_upper && rest_lower {
        let mut chars = corrected.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
            None => String::new(),
        };
    }

    corrected.to_lowercase()
}

pub struct FuzzyCorrector {
    store: Arc<dyn InvoiceStore>,
    vocab: Arc<VocabularyCache>,
}

impl FuzzyCorrector {
    pub fn new(store: Arc<dyn InvoiceStore>, vocab: Arc<VocabularyCache>) -> Self {
        FuzzyCorrector { store, vocab }
    }

    /// Correct a whole query. Multi-word vendor/product phrases first,
    /// then the remaining tokens one by one.
    pub fn correct(&self, query: &str) -> String {
        let snapshot = self.vocab.refresh_if_stale(self.store.as_ref());

        let mut matched_entities: Vec<String> = vec![];
        let mut working = query.to_string();
        for names in [&snapshot.vendors, &snapshot.products] {
            working = phrase_pass(&working, names, &mut matched_entities);
        }

        // Tokens of matched entities are settled; skip them below.
        let covered: HashSet<String> = matched_entities
            .iter()
            .flat_map(|name| name.split_whitespace())
            .map(str::to_lowercase)
            .collect();

        working
            .split_whitespace()
            .map(|token| {
                let core = token.trim_matches(|c: char| !c.is_alphanumeric());
                if covered.contains(&core.to_lowercase()) {
                    token.to_string()
                } else {
                    let result =
                        self.correct_token_inner(token, &snapshot, &working, &matched_entities);
                    result.corrected
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Single-token primitive. Refreshes the vocabulary if stale.
    pub fn correct_token(&self, token: &str) -> FuzzyMatch {
        let snapshot = self.vocab.refresh_if_stale(self.store.as_ref());
        self.correct_token_inner(token, &snapshot, token, &[])
    }

    fn correct_token_inner(
        &self,
        token: &str,
        snapshot: &VocabSnapshot,
        query: &str,
        matched_entities: &[String],
    ) -> FuzzyMatch {
        let core = token.trim_matches(|c: char| !c.is_alphanumeric());

        if core.chars().count() < MIN_TOKEN_LEN
            || core.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
            || token.chars().any(|c| matches!(c, '₹' | '$' | '€' | '£'))
        {
            return FuzzyMatch::unchanged(token);
        }

        if dictionary::contains(core) {
            return FuzzyMatch::unchanged(token);
        }

        let first_upper = core
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false);

        let corrected_core = if first_upper {
            // A proper noun never becomes a dictionary word; phonetic
            // vendor matching gets the first shot.
            self.phonetic_vendor_match(core, query, matched_entities)
                .or_else(|| vocab_match(core, &snapshot.vendors))
                .or_else(|| vocab_match(core, &snapshot.products))
        } else {
            dictionary_fuzzy_match(core)
                .or_else(|| vocab_match(core, &snapshot.vendors))
                .or_else(|| vocab_match(core, &snapshot.products))
        };

        match corrected_core {
            Some(m) if m.was_changed => {
                let corrected = reattach_punctuation(token, core, &m.corrected);
                FuzzyMatch::changed(token, corrected, m.confidence)
            }
            _ => FuzzyMatch::unchanged(token),
        }
    }

    /// Phonetic cascade against first tokens of distinct vendor names.
    /// Any store failure degrades to "no correction" for this token.
    fn phonetic_vendor_match(
        &self,
        core: &str,
        query: &str,
        matched_entities: &[String],
    ) -> Option<FuzzyMatch> {
        let mut candidates = match self.store.phonetic_candidates(core) {
            Ok(Some(candidates)) => candidates,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("phonetic lookup failed for {core:?}: {err}");
                return None;
            }
        };
        if candidates.is_empty() {
            return None;
        }

        candidates.sort_by(|a, b| {
            b.soundex_match
                .cmp(&a.soundex_match)
                .then(b.metaphone_match.cmp(&a.metaphone_match))
                .then(a.edit_distance.cmp(&b.edit_distance))
        });
        let top = &candidates[0];

        let confidence = composite_score(core, top);
        let accepted = top.soundex_match
            || top.metaphone_match
            || (top.edit_distance <= 2 && confidence > 0.5);
        if !accepted {
            return None;
        }

        let multi_token = top.vendor.contains(' ');
        let corrected = if multi_token {
            let already_present = matched_entities
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&top.vendor))
                || query.to_lowercase().contains(&top.vendor.to_lowercase());
            if confidence >= FULL_NAME_CONFIDENCE || already_present {
                top.vendor.clone()
            } else {
                // Injecting unmatched trailing tokens is worse than a
                // partial correction; keep the first token only.
                top.vendor
                    .split_whitespace()
                    .next()
                    .unwrap_or(&top.vendor)
                    .to_string()
            }
        } else {
            top.vendor.clone()
        };

        Some(FuzzyMatch::changed(core, corrected, confidence))
    }
}

/// Composite phonetic score per the correction policy: edit distance
/// tempered by which phonetic codes agree, boosted when both do.
fn composite_score(core: &str, candidate: &PhoneticCandidate) -> f32 {
    let max_len = core
        .chars()
        .count()
        .max(candidate.first_token.chars().count())
        .max(1);
    let nd = candidate.edit_distance as f32 / max_len as f32;

    let base = if candidate.soundex_match {
        1.0 - nd
    } else if candidate.metaphone_match {
        0.8 - 0.5 * nd
    } else {
        0.5 - nd
    };

    let boosted = if candidate.soundex_match && candidate.metaphone_match {
        base.max(0.7)
    } else if candidate.soundex_match || candidate.metaphone_match {
        base.max(0.6)
    } else {
        base
    };

    boosted.clamp(0.0, 1.0)
}

/// Slide a window of each multi-word name's token count across the
/// query; a window is replaced by the canonical spelling only when every
/// token pair clears the similarity floor and the summed edit distance
/// stays inside the per-token budget.
fn phrase_pass(query: &str, names: &[String], matched_entities: &mut Vec<String>) -> String {
    let mut tokens: Vec<String> = query.split_whitespace().map(String::from).collect();

    for name in names {
        let name_tokens: Vec<&str> = name.split_whitespace().collect();
        let width = name_tokens.len();
        if width < 2 || tokens.len() < width {
            continue;
        }

        let mut i = 0;
        while i + width <= tokens.len() {
            if window_matches(&tokens[i..i + width], &name_tokens) {
                tokens.splice(i..i + width, name_tokens.iter().map(|t| t.to_string()));
                if !matched_entities.iter().any(|n| n == name) {
                    matched_entities.push(name.clone());
                }
                i += width;
            } else {
                i += 1;
            }
        }
    }

    tokens.join(" ")
}

fn window_matches(window: &[String], name_tokens: &[&str]) -> bool {
    let mut total_distance = 0usize;
    for (token, name_token) in window.iter().zip(name_tokens) {
        let core = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if core.is_empty() {
            return false;
        }
        let name_token = name_token.to_lowercase();
        if normalized_similarity(&core, &name_token) < SIMILARITY_THRESHOLD {
            return false;
        }
        total_distance += strsim::levenshtein(&core, &name_token);
    }
    total_distance <= PHRASE_DISTANCE_PER_TOKEN * name_tokens.len()
}

/// Closest static-dictionary word, accepted on a tight edit-distance
/// bound or the normalized-similarity floor, with the input's
/// capitalization pattern preserved.
fn dictionary_fuzzy_match(core: &str) -> Option<FuzzyMatch> {
    let (word, distance) = dictionary::closest(core)?;
    let max_len = core.chars().count().max(word.chars().count()).max(1);
    let length_diff = core.chars().count().abs_diff(word.chars().count());
    let similarity = 1.0 - distance as f64 / max_len as f64;

    let accepted =
        (distance <= 2 && length_diff <= 1) || similarity >= SIMILARITY_THRESHOLD;
    if !accepted || distance == 0 {
        return None;
    }

    Some(FuzzyMatch::changed(
        core,
        preserve_case(core, word),
        similarity as f32,
    ))
}

/// Approximate search over a cached vocabulary list.
fn vocab_match(core: &str, names: &[String]) -> Option<FuzzyMatch> {
    let best = names
        .iter()
        .map(|name| (name, normalized_similarity(core, name)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    let (name, similarity) = best;
    if similarity <= SIMILARITY_THRESHOLD {
        return None;
    }
    Some(FuzzyMatch::changed(core, name.clone(), similarity as f32))
}

/// Keep whatever punctuation surrounded the corrected core.
fn reattach_punctuation(token: &str, core: &str, corrected: &str) -> String {
    match token.find(core) {
        Some(start) => {
            let end = start + core.len();
            format!("{}{}{}", &token[..start], corrected, &token[end..])
        }
        None => corrected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoices::{BackendMemory, Invoice};
    use chrono::NaiveDate;

    fn store_with_vendors(vendors: &[&str]) -> Arc<BackendMemory> {
        let store = BackendMemory::new();
        for (idx, vendor) in vendors.iter().enumerate() {
            store.insert(Invoice {
                id: idx as u64 + 1,
                invoice_no: format!("INV-{idx}"),
                vendor: vendor.to_string(),
                products: vec!["laptops".to_string()],
                amount: 1000.0,
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                branch_id: None,
                embedding: None,
            });
        }
        Arc::new(store)
    }

    fn corrector(vendors: &[&str]) -> FuzzyCorrector {
        FuzzyCorrector::new(
            store_with_vendors(vendors),
            Arc::new(VocabularyCache::new()),
        )
    }

    #[test]
    fn test_preserve_case_patterns() {
        assert_eq!(preserve_case("GOWRAV", "gaurav"), "GAURAV");
        assert_eq!(preserve_case("Gowrav", "gaurav"), "Gaurav");
        assert_eq!(preserve_case("gowrav", "gaurav"), "gaurav");
        assert_eq!(preserve_case("gOwRaV", "gaurav"), "gaurav");
    }

    #[test]
    fn test_dictionary_typo_corrected() {
        let corrector = corrector(&[]);
        assert_eq!(corrector.correct("invioce for laptops"), "invoice for laptops");
    }

    #[test]
    fn test_correct_is_idempotent() {
        let corrector = corrector(&["Gaurav Enterprises"]);
        let once = corrector.correct("invoices from Gowrav Enterprises");
        let twice = corrector.correct(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_phrase_window_accepts_typo_in_one_token() {
        let mut matched = vec![];
        let names = vec!["Gaurav Enterprises".to_string()];
        let out = phrase_pass("invoices from Gowrav Enterprises", &names, &mut matched);
        assert_eq!(out, "invoices from Gaurav Enterprises");
        assert_eq!(matched, vec!["Gaurav Enterprises"]);
    }

    #[test]
    fn test_phrase_window_rejects_one_weak_token() {
        // "Xyz" vs "Gaurav" is far below the similarity floor; the whole
        // phrase must be rejected even though "Enterprises" is perfect.
        let mut matched = vec![];
        let names = vec!["Gaurav Enterprises".to_string()];
        let out = phrase_pass("invoices from Xyz Enterprises", &names, &mut matched);
        assert_eq!(out, "invoices from Xyz Enterprises");
        assert!(matched.is_empty());
    }

    #[test]
    fn test_phrase_window_rejects_total_distance_over_budget() {
        // Each token individually clears 0.6 but the summed distance
        // exceeds 2 tokens x 2 edits.
        let mut matched = vec![];
        let names = vec!["Ramesh Hardware".to_string()];
        let out = phrase_pass("bills from Ramesg Hardwere Store", &names, &mut matched);
        // ramesg=1 edit, hardwere=2 edits, total 3 <= 4: accepted.
        assert_eq!(out, "bills from Ramesh Hardware Store");
        assert_eq!(matched, vec!["Ramesh Hardware"]);
    }

    #[test]
    fn test_short_numeric_and_currency_tokens_skipped() {
        let corrector = corrector(&[]);
        assert_eq!(corrector.correct("rs 5000 ₹200 ok"), "rs 5000 ₹200 ok");
    }

    #[test]
    fn test_phonetic_corrects_capitalized_vendor_token() {
        let corrector = corrector(&["Gaurav Enterprises", "Mehta Traders"]);
        let out = corrector.correct("invoices from Gowrav");
        // Multi-word vendor at sub-0.95 confidence injects the first
        // token only.
        assert_eq!(out, "invoices from Gaurav");
    }

    #[test]
    fn test_phonetic_injects_full_single_token_vendor() {
        let corrector = corrector(&["Gaurav"]);
        let out = corrector.correct("invoices from Gowrav");
        assert_eq!(out, "invoices from Gaurav");
    }

    #[test]
    fn test_capitalized_token_never_becomes_dictionary_word() {
        // "Invioce" is close to "invoice" but capitalized tokens skip the
        // dictionary entirely; with no vendors it stays as typed.
        let corrector = corrector(&[]);
        assert_eq!(corrector.correct("Invioce"), "Invioce");
    }

    #[test]
    fn test_no_correction_when_phonetic_capability_absent() {
        struct NoPhonetic(BackendMemory);
        impl crate::invoices::InvoiceStore for NoPhonetic {
            fn similarity_scan(
                &self,
                f: &crate::invoices::ScanFilters,
                q: &[f32],
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                self.0.similarity_scan(f, q)
            }
            fn filtered_scan(
                &self,
                f: &crate::invoices::ScanFilters,
            ) -> anyhow::Result<Vec<crate::invoices::InvoiceRow>> {
                self.0.filtered_scan(f)
            }
            fn distinct_vendors(&self) -> anyhow::Result<Vec<String>> {
                self.0.distinct_vendors()
            }
            fn distinct_products(&self) -> anyhow::Result<Vec<String>> {
                self.0.distinct_products()
            }
            fn phonetic_candidates(
                &self,
                _: &str,
            ) -> anyhow::Result<Option<Vec<crate::invoices::PhoneticCandidate>>> {
                Ok(None)
            }
        }

        let inner = BackendMemory::new();
        inner.insert(Invoice {
            id: 1,
            invoice_no: "INV-1".to_string(),
            vendor: "Gaurav Enterprises".to_string(),
            products: vec![],
            amount: 1.0,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            branch_id: None,
            embedding: None,
        });
        let corrector = FuzzyCorrector::new(
            Arc::new(NoPhonetic(inner)),
            Arc::new(VocabularyCache::new()),
        );

        // Vocabulary fuzzy match against the full name is too weak for a
        // single token, so the token survives untouched.
        assert_eq!(corrector.correct("invoices from Gowrav"), "invoices from Gowrav");
    }

    #[test]
    fn test_correct_token_reports_confidence() {
        let corrector = corrector(&["Gaurav Enterprises"]);
        let m = corrector.correct_token("Gowrav");
        assert!(m.was_changed);
        assert_eq!(m.corrected, "Gaurav");
        assert!(m.confidence > 0.5 && m.confidence <= 1.0);
    }
}
