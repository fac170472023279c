//! Cross-module tests exercising the whole search pipeline against
//! in-memory and disk-backed stores.

mod fuzzy;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::embed::{EmbeddingError, EmbeddingGateway};
use crate::invoices::{BackendMemory, Invoice};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Deterministic gateway: one dimension per known keyword, a catch-all
/// dimension for text mentioning none of them. Embeddings produced for
/// stored invoices and for queries agree by construction.
pub struct KeywordGateway;

impl EmbeddingGateway for KeywordGateway {
    fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.to_lowercase();
        let mut v = vec![0.0f32; 5];
        if text.contains("gaurav") {
            v[0] = 1.0;
        }
        if text.contains("laptop") {
            v[1] = 1.0;
        }
        if text.contains("mehta") {
            v[2] = 1.0;
        }
        if text.contains("cable") {
            v[3] = 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[4] = 1.0;
        }
        Ok(v)
    }
}

/// Four invoices across two branches, embedded with [`KeywordGateway`].
pub fn seeded_store() -> Arc<BackendMemory> {
    let gateway = KeywordGateway;
    let store = BackendMemory::new();

    let seeds = [
        (1, "Gaurav Enterprises", vec!["laptops"], 5200.0, d(2024, 2, 10), 1),
        (2, "Mehta Traders", vec!["cables"], 800.0, d(2024, 2, 20), 2),
        (3, "Gaurav Enterprises", vec!["cables"], 1500.0, d(2024, 1, 5), 1),
        (4, "Sharma Supplies", vec!["paper rolls"], 300.0, d(2024, 3, 1), 1),
    ];

    for (id, vendor, products, amount, date, branch) in seeds {
        let mut invoice = Invoice {
            id,
            invoice_no: format!("INV-{id:04}"),
            vendor: vendor.to_string(),
            products: products.into_iter().map(str::to_string).collect(),
            amount,
            date,
            branch_id: Some(branch),
            embedding: None,
        };
        invoice.embedding = Some(gateway.generate(&invoice.embedding_text()).unwrap());
        store.insert(invoice);
    }

    Arc::new(store)
}
