use std::sync::Arc;

use super::d;
use crate::fuzzy::FuzzyCorrector;
use crate::invoices::{BackendCsv, Invoice};
use crate::vocab::VocabularyCache;

fn csv_corrector(vendors: &[&str]) -> (FuzzyCorrector, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("invoices.csv");
    let store = BackendCsv::load(path.to_str().unwrap()).expect("failed to create invoice csv");

    for vendor in vendors {
        store
            .insert(Invoice {
                id: 0,
                invoice_no: "INV-1".to_string(),
                vendor: vendor.to_string(),
                products: vec!["laptops".to_string()],
                amount: 1000.0,
                date: d(2024, 1, 1),
                branch_id: None,
                embedding: None,
            })
            .unwrap();
    }

    let corrector = FuzzyCorrector::new(Arc::new(store), Arc::new(VocabularyCache::new()));
    (corrector, tmp)
}

#[test]
fn test_phrase_corrected_against_disk_backed_vocabulary() {
    let (corrector, _tmp) = csv_corrector(&["Gaurav Enterprises"]);

    let out = corrector.correct("invoices from Gowrav Enterprizes");
    assert_eq!(out, "invoices from Gaurav Enterprises");
}

#[test]
fn test_dictionary_and_phonetic_corrections_combine() {
    let (corrector, _tmp) = csv_corrector(&["Gaurav"]);

    let out = corrector.correct("invioce from Gowrav");
    assert_eq!(out, "invoice from Gaurav");
}

#[test]
fn test_correct_text_round_trips_unchanged() {
    let (corrector, _tmp) = csv_corrector(&["Gaurav Enterprises", "Mehta Traders"]);

    let query = "invoices from Mehta Traders for laptops";
    assert_eq!(corrector.correct(query), query);
}
