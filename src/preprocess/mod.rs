//! Query preprocessing: free text in, structured filters plus a residual
//! embedding string out.
//!
//! Pipeline order is load-bearing. Entity extraction reads the
//! original-case text first (capitalization is the proper-noun signal),
//! then everything else runs on a lowercased working copy: date
//! extraction and removal, amount extraction and removal, stop-word
//! removal, and finally entity case restoration so the residual text
//! matches the casing the stored embeddings were generated with.
//!
//! `preprocess` never fails; a sub-extraction that does not recognize
//! anything leaves its field unset and the text untouched.

pub mod amounts;
pub mod dates;
pub mod entities;
pub mod stopwords;

use chrono::{Local, NaiveDate};
use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessedQuery {
    /// Residual text for embedding. Empty means "no semantic content".
    pub normalized_query: String,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub vendor_names: Vec<String>,
    pub product_names: Vec<String>,
}

pub fn preprocess(query: &str) -> PreprocessedQuery {
    preprocess_at(query, Local::now().date_naive())
}

/// Same as [`preprocess`] with an explicit "today" for relative dates.
pub fn preprocess_at(query: &str, today: NaiveDate) -> PreprocessedQuery {
    let found = entities::extract(query);

    let mut working = query.to_lowercase();

    let date = dates::extract(&working, today);
    working = dates::strip_date_text(&working);

    let amount = amounts::extract(&working);
    working = amounts::strip_amount_text(&working);

    working = stopwords::remove_stop_words(&working);

    let names: Vec<&String> = found.vendors.iter().chain(found.products.iter()).collect();
    let normalized = restore_entity_case(&working, &names);

    PreprocessedQuery {
        normalized_query: normalized.trim().to_string(),
        date_from: date.map(|d| d.from),
        date_to: date.map(|d| d.to),
        amount_min: amount.map(|a| a.min),
        amount_max: amount.map(|a| a.max),
        vendor_names: found.vendors,
        product_names: found.products,
    }
}

/// Replace each entity's case-insensitive occurrence with its original
/// casing. Matching against the vocabulary is case-insensitive but the
/// embedding step downstream is not.
fn restore_entity_case(text: &str, names: &[&String]) -> String {
    let mut out = text.to_string();
    for name in names {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(name));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };
        out = re.replace_all(&out, name.as_str()).into_owned();
    }
    out
}
