//! Static domain dictionary for typo correction.
//!
//! Covers the action verbs, domain nouns and keywords a user plausibly
//! types in an invoice query. Vendor and product names never live here;
//! they come from the vocabulary cache.

use once_cell::sync::Lazy;
use std::collections::HashSet;

pub static DICTIONARY: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        // action verbs
        "find", "show", "get", "give", "list", "search", "fetch", "display",
        "bought", "purchased", "paid", "ordered",
        // domain nouns
        "invoice", "invoices", "bill", "bills", "payment", "payments",
        "purchase", "purchases", "order", "orders", "receipt", "receipts",
        "vendor", "vendors", "supplier", "suppliers", "product", "products",
        "item", "items", "amount", "total", "branch", "quantity",
        // query keywords
        "last", "next", "week", "month", "year", "today", "yesterday",
        "between", "around", "about", "approximately", "above", "below",
        "from", "with", "for", "rupees", "dollars", "pending", "overdue",
    ]
});

static MEMBERS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| DICTIONARY.iter().copied().collect());

pub fn contains(word: &str) -> bool {
    MEMBERS.contains(word.to_lowercase().as_str())
}

/// Closest dictionary word by edit distance, with the distance.
pub fn closest(word: &str) -> Option<(&'static str, usize)> {
    let lower = word.to_lowercase();
    DICTIONARY
        .iter()
        .map(|entry| (*entry, strsim::levenshtein(&lower, entry)))
        .min_by_key(|(_, distance)| *distance)
}
