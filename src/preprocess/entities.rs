//! Vendor/product candidate extraction.
//!
//! Runs on the original-case query before anything is lowercased, since
//! capitalization is the primary signal for proper nouns. Candidates keep
//! their original casing so it can be restored into the normalized query
//! after the lowercase passes.

use crate::preprocess::stopwords::{
    is_month_name, strip_punctuation, CURRENCY_WORDS, DOMAIN_WORDS, STOP_WORDS, TIME_WORDS,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCandidates {
    pub vendors: Vec<String>,
    pub products: Vec<String>,
}

const VENDOR_TRIGGERS: &[&str] = &["for", "from", "by", "vendor", "supplier"];
const PRODUCT_TRIGGERS: &[&str] = &[
    "with",
    "product",
    "item",
    "bought",
    "purchased",
    "containing",
    "for",
];
const CONTEXT_WORDS: &[&str] = &["invoice", "invoices", "bill", "bills", "order", "orders"];

/// A candidate is rejected if it is stop/domain/currency/time vocabulary,
/// a month name, or carries a digit.
fn is_valid_candidate(name: &str) -> bool {
    let core = strip_punctuation(name);
    if core.is_empty() || core.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    // every token of a multi-word candidate must pass
    name.split_whitespace().all(|token| {
        let token = strip_punctuation(token).to_lowercase();
        !token.is_empty()
            && !STOP_WORDS.contains(token.as_str())
            && !DOMAIN_WORDS.contains(token.as_str())
            && !CURRENCY_WORDS.contains(token.as_str())
            && !TIME_WORDS.contains(token.as_str())
            && !is_month_name(&token)
    })
}

fn is_capitalized(token: &str) -> bool {
    strip_punctuation(token)
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

struct Accepted {
    vendors: Vec<String>,
    products: Vec<String>,
}

impl Accepted {
    fn contains(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        let duplicate = self
            .vendors
            .iter()
            .chain(self.products.iter())
            .any(|n| n.to_lowercase() == lower);
        if duplicate {
            return true;
        }
        // A single token inside an accepted multi-word name is a duplicate
        // in spirit ("thermal" after accepting "thermal paper rolls").
        !lower.contains(' ')
            && self
                .vendors
                .iter()
                .chain(self.products.iter())
                .any(|n| n.to_lowercase().split_whitespace().any(|t| t == lower))
    }

    fn push_vendor(&mut self, name: String) {
        if is_valid_candidate(&name) && !self.contains(&name) {
            self.vendors.push(name);
        }
    }

    fn push_product(&mut self, name: String) {
        if is_valid_candidate(&name) && !self.contains(&name) {
            self.products.push(name);
        }
    }
}

pub fn extract(query: &str) -> EntityCandidates {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let mut accepted = Accepted {
        vendors: vec![],
        products: vec![],
    };

    // Quoted spans are product names verbatim.
    for span in quoted_spans(query) {
        accepted.push_product(span);
    }

    // Maximal runs of capitalized tokens, with the token index preceding
    // each run, in query order.
    let runs = capitalized_runs(&tokens);

    // Runs following a vendor trigger claim vendor slots first.
    for (start, span) in &runs {
        let trigger = start
            .checked_sub(1)
            .map(|i| strip_punctuation(tokens[i]).to_lowercase());
        if let Some(trigger) = trigger {
            if VENDOR_TRIGGERS.contains(&trigger.as_str()) {
                accepted.push_vendor(span.clone());
            }
        }
    }

    // Free-standing capitalized spans are vendor candidates too, except
    // runs behind a product trigger, which are products.
    for (start, span) in &runs {
        if accepted.contains(span) {
            continue;
        }
        let trigger = start
            .checked_sub(1)
            .map(|i| strip_punctuation(tokens[i]).to_lowercase());
        match trigger {
            Some(t) if PRODUCT_TRIGGERS.contains(&t.as_str()) => {
                accepted.push_product(span.clone())
            }
            _ => accepted.push_vendor(span.clone()),
        }
    }

    // Lowercase nouns behind product triggers.
    for (idx, token) in tokens.iter().enumerate() {
        let word = strip_punctuation(token).to_lowercase();
        if !PRODUCT_TRIGGERS.contains(&word.as_str()) {
            continue;
        }
        if let Some(next) = tokens.get(idx + 1) {
            if !is_capitalized(next) {
                accepted.push_product(strip_punctuation(next).to_string());
            }
        }
    }

    // Domain-context heuristic: a noun immediately next to
    // invoice/bill/order is usually the thing that was bought.
    for (idx, token) in tokens.iter().enumerate() {
        let word = strip_punctuation(token).to_lowercase();
        if !CONTEXT_WORDS.contains(&word.as_str()) {
            continue;
        }
        if idx > 0 && !is_capitalized(tokens[idx - 1]) {
            accepted.push_product(strip_punctuation(tokens[idx - 1]).to_string());
        }
        if let Some(next) = tokens.get(idx + 1) {
            if !is_capitalized(next) {
                accepted.push_product(strip_punctuation(next).to_string());
            }
        }
    }

    EntityCandidates {
        vendors: accepted.vendors,
        products: accepted.products,
    }
}

/// Maximal consecutive runs of capitalized tokens, keyed by start index.
/// Tokens are punctuation-trimmed and rejoined on single spaces.
fn capitalized_runs(tokens: &[&str]) -> Vec<(usize, String)> {
    let mut runs = vec![];
    let mut i = 0;
    while i < tokens.len() {
        if is_capitalized(tokens[i]) {
            let start = i;
            let mut span = vec![];
            while i < tokens.len() && is_capitalized(tokens[i]) {
                span.push(strip_punctuation(tokens[i]));
                i += 1;
            }
            runs.push((start, span.join(" ")));
        } else {
            i += 1;
        }
    }
    runs
}

fn quoted_spans(query: &str) -> Vec<String> {
    let mut spans = vec![];
    for quote in ['"', '\''] {
        let mut parts = query.split(quote);
        // text before the first quote
        parts.next();
        while let (Some(inner), rest) = (parts.next(), parts.next()) {
            if rest.is_none() {
                // no closing quote; not a quoted span
                break;
            }
            let inner = inner.trim();
            if !inner.is_empty() {
                spans.push(inner.to_string());
            }
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_after_trigger() {
        let found = extract("invoices from Gowrav last month");
        assert_eq!(found.vendors, vec!["Gowrav"]);
        assert!(found.products.is_empty());
    }

    #[test]
    fn test_multi_word_vendor() {
        let found = extract("bills by Gaurav Enterprises around 5000");
        assert_eq!(found.vendors, vec!["Gaurav Enterprises"]);
    }

    #[test]
    fn test_product_after_trigger() {
        let found = extract("invoices with laptops from Mehta Traders");
        assert_eq!(found.vendors, vec!["Mehta Traders"]);
        assert_eq!(found.products, vec!["laptops"]);
    }

    #[test]
    fn test_quoted_product() {
        let found = extract("invoices containing \"thermal paper rolls\"");
        assert_eq!(found.products, vec!["thermal paper rolls"]);
    }

    #[test]
    fn test_capitalized_product_after_with() {
        let found = extract("orders with Dell Monitors");
        assert_eq!(found.products, vec!["Dell Monitors"]);
        assert!(found.vendors.is_empty());
    }

    #[test]
    fn test_noun_before_context_word() {
        let found = extract("laptop invoices from last week");
        assert_eq!(found.products, vec!["laptop"]);
    }

    #[test]
    fn test_stop_and_time_words_rejected() {
        let found = extract("Find invoices from last March");
        // "Find" is a stop word, "last"/"March" are time vocabulary.
        assert!(found.vendors.is_empty());
        assert!(found.products.is_empty());
    }

    #[test]
    fn test_digits_rejected() {
        let found = extract("invoices from B2B");
        assert!(found.vendors.is_empty());
    }

    #[test]
    fn test_case_insensitive_dedup() {
        let found = extract("from Gowrav for GOWRAV");
        assert_eq!(found.vendors, vec!["Gowrav"]);
    }

    #[test]
    fn test_punctuation_trimmed() {
        let found = extract("invoices from Gowrav, last month");
        assert_eq!(found.vendors, vec!["Gowrav"]);
    }
}
