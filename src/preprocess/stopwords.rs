//! Word lists shared across the preprocessing pipeline.
//!
//! The stop-word set covers generic query verbs ("find", "show"), articles,
//! pronouns and the domain nouns that carry no semantic signal for
//! embeddings ("invoice", "bill"). The other lists are used to reject
//! entity candidates that are really domain/currency/time vocabulary.

use once_cell::sync::Lazy;
use std::collections::HashSet;

pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // articles, conjunctions, prepositions
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "being",
        "in", "on", "at", "to", "for", "of", "with", "by", "from", "as",
        "and", "or", "but", "not", "no", "so", "if", "then", "all", "any",
        "about", "around", "approximately", "near", "nearly", "roughly",
        // pronouns
        "i", "me", "my", "we", "our", "you", "your", "it", "its", "that",
        "this", "these", "those", "him", "her", "them", "their",
        // generic query verbs
        "find", "show", "get", "give", "list", "search", "fetch", "display",
        "want", "need", "see", "look", "bought", "purchased", "containing",
        // domain nouns with no embedding signal
        "invoice", "invoices", "bill", "bills", "record", "records",
        "vendor", "supplier", "product", "item", "items",
    ]
    .into_iter()
    .collect()
});

/// Words that identify the purchase-invoice domain itself. Never accepted
/// as vendor or product names.
pub static DOMAIN_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "invoice", "invoices", "bill", "bills", "payment", "payments",
        "purchase", "purchases", "order", "orders", "receipt", "receipts",
        "vendor", "vendors", "supplier", "suppliers", "product", "products",
        "item", "items", "amount", "total", "branch", "quantity",
    ]
    .into_iter()
    .collect()
});

pub static CURRENCY_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "rupee", "rupees", "rs", "inr", "dollar", "dollars", "usd", "euro",
        "euros", "eur", "pound", "pounds", "gbp", "paise", "cents",
    ]
    .into_iter()
    .collect()
});

pub static TIME_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "today", "yesterday", "tomorrow", "last", "next", "this", "week",
        "weeks", "month", "months", "year", "years", "day", "days", "date",
        "between", "before", "after", "since", "until", "ago", "recent",
        "recently",
    ]
    .into_iter()
    .collect()
});

pub const MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july",
    "august", "september", "october", "november", "december",
];

/// Month number (1-12) for a full name or three-letter abbreviation.
pub fn month_number(token: &str) -> Option<u32> {
    let token = token.to_lowercase();
    MONTH_NAMES
        .iter()
        .position(|name| *name == token || (token.len() == 3 && name.starts_with(&token)))
        .map(|idx| idx as u32 + 1)
}

pub fn is_month_name(token: &str) -> bool {
    month_number(token).is_some()
}

/// Strip leading/trailing punctuation for word-list membership checks.
pub fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(strip_punctuation(token).to_lowercase().as_str())
}

/// Drop stop-word tokens and rejoin on single spaces. Idempotent.
pub fn remove_stop_words(text: &str) -> String {
    text.split_whitespace()
        .filter(|token| {
            let core = strip_punctuation(token);
            !core.is_empty() && !STOP_WORDS.contains(core.to_lowercase().as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
