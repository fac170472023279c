//! Amount-range extraction from lowercased, date-stripped query text.
//!
//! Runs after date removal so four-digit years claimed by a date phrase
//! never reach the bare-number pattern. A bare large number that survives
//! date extraction still trips the pattern; that is a known false-positive
//! source inherited from the reference behavior.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

/// Symmetric tolerance applied when exactly one amount is mentioned.
const SINGLE_AMOUNT_TOLERANCE: f64 = 0.10;

const NUMBER: &str = r"[\d][\d,]*(?:\.\d+)?";
const CURRENCY_SYMBOLS: &str = r"[₹$€£]";
const CURRENCY_WORDS: &str = r"(?:rupees?|rs\.?|inr|dollars?|usd|euros?|eur|pounds?|gbp)";

static RANGE_BETWEEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\bbetween\s+(?:{CURRENCY_SYMBOLS}\s*)?({NUMBER})\s+and\s+(?:{CURRENCY_SYMBOLS}\s*)?({NUMBER})"
    ))
    .unwrap()
});
static RANGE_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:{CURRENCY_SYMBOLS}\s*)?({NUMBER})\s+to\s+(?:{CURRENCY_SYMBOLS}\s*)?({NUMBER})"
    ))
    .unwrap()
});
static SYMBOL_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"{CURRENCY_SYMBOLS}\s*({NUMBER})")).unwrap());
static WORD_SUFFIXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({NUMBER})\s*{CURRENCY_WORDS}\b")).unwrap()
});
static WORD_PREFIXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b{CURRENCY_WORDS}\s*({NUMBER})\b")).unwrap()
});
/// Bare numbers: four or more integer digits, or any decimal point.
static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4,}(?:\.\d+)?|\d+\.\d+)\b").unwrap());

static APPROX_QUALIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(around|about|approximately|approx\.?|roughly|nearly)\b").unwrap()
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(and|to|from|for|between)\s*$").unwrap());

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

pub fn extract(text: &str) -> Option<AmountRange> {
    let mut amounts: Vec<f64> = vec![];
    let mut range_matched = false;

    for re in [&*RANGE_BETWEEN, &*RANGE_TO] {
        for caps in re.captures_iter(text) {
            let lo = caps.get(1).and_then(|m| parse_number(m.as_str()));
            let hi = caps.get(2).and_then(|m| parse_number(m.as_str()));
            if let (Some(lo), Some(hi)) = (lo, hi) {
                range_matched = true;
                amounts.push(lo);
                amounts.push(hi);
            }
        }
    }

    for re in [&*SYMBOL_PREFIXED, &*WORD_SUFFIXED, &*WORD_PREFIXED, &*BARE_NUMBER] {
        for caps in re.captures_iter(text) {
            amounts.extend(caps.get(1).and_then(|m| parse_number(m.as_str())));
        }
    }

    amounts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    amounts.dedup();

    match amounts.as_slice() {
        [] => None,
        [single] if !range_matched => Some(AmountRange {
            min: (single * (1.0 - SINGLE_AMOUNT_TOLERANCE)).max(0.0),
            max: single * (1.0 + SINGLE_AMOUNT_TOLERANCE),
        }),
        [first, .., last] => Some(AmountRange {
            min: *first,
            max: *last,
        }),
        [only] => Some(AmountRange {
            min: *only,
            max: *only,
        }),
    }
}

/// Strip the matched amount substrings and any approximation qualifiers.
pub fn strip_amount_text(text: &str) -> String {
    let mut out = text.to_string();
    for re in [
        &*RANGE_BETWEEN,
        &*RANGE_TO,
        &*SYMBOL_PREFIXED,
        &*WORD_SUFFIXED,
        &*WORD_PREFIXED,
        &*BARE_NUMBER,
    ] {
        out = re.replace_all(&out, " ").into_owned();
    }
    out = APPROX_QUALIFIER.replace_all(&out, " ").into_owned();
    let out = WHITESPACE.replace_all(&out, " ").into_owned();
    let out = TRAILING_CONNECTOR.replace_all(out.trim(), "").into_owned();
    out.trim().to_string()
}
