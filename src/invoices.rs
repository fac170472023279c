use crate::fuzzy::phonetic::{metaphone, soundex};
use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    io::ErrorKind,
    sync::{Arc, RwLock},
    time::Instant,
};

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invoice {
    pub id: u64,

    pub invoice_no: String,
    pub vendor: String,
    pub products: Vec<String>,
    pub amount: f64,
    pub date: NaiveDate,

    pub branch_id: Option<u64>,
    /// Embedding of the vendor/product text, if one has been generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Invoice {
    /// The text the embedding is generated from. Casing matters: entity
    /// case restoration in the preprocessor targets this convention.
    pub fn embedding_text(&self) -> String {
        if self.products.is_empty() {
            self.vendor.clone()
        } else {
            format!("{} {}", self.vendor, self.products.join(" "))
        }
    }
}

/// Caller-supplied filters. Text-derived filters take precedence over
/// these everywhere except `branch_id`, which is caller-only.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchFilters {
    pub branch_id: Option<u64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: u64,
    pub invoice_no: String,
    pub vendor: String,
    pub products: Vec<String>,
    pub amount: f64,
    pub date: Option<NaiveDate>,
    /// 1.0 means perfect similarity, or that no semantic ranking was
    /// applied (filter-only path).
    pub similarity: f32,
}

/// Row shape coming back from store scans. Text and amount fields are
/// nullable at the store boundary and coalesced during mapping.
#[derive(Debug, Clone, Default)]
pub struct InvoiceRow {
    pub id: u64,
    pub invoice_no: Option<String>,
    pub vendor: Option<String>,
    pub products: Option<Vec<String>>,
    pub amount: Option<f64>,
    pub date: Option<NaiveDate>,
    /// Similarity projection; present only on the similarity-scan path.
    pub similarity: Option<f32>,
}

impl InvoiceRow {
    pub fn into_result(self, default_similarity: f32) -> SearchResult {
        SearchResult {
            id: self.id,
            invoice_no: self.invoice_no.unwrap_or_default(),
            vendor: self.vendor.unwrap_or_default(),
            products: self.products.unwrap_or_default(),
            amount: self.amount.unwrap_or(0.0),
            date: self.date,
            similarity: self.similarity.unwrap_or(default_similarity),
        }
    }
}

/// Merged predicates handed to the store. Ranges are already clamped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanFilters {
    pub branch_id: Option<u64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
}

impl ScanFilters {
    pub fn is_empty(&self) -> bool {
        self.branch_id.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.amount_min.is_none()
            && self.amount_max.is_none()
    }

    fn matches(&self, invoice: &Invoice) -> bool {
        if let Some(branch_id) = self.branch_id {
            if invoice.branch_id != Some(branch_id) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if invoice.date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if invoice.date > to {
                return false;
            }
        }
        if let Some(min) = self.amount_min {
            if invoice.amount < min {
                return false;
            }
        }
        if let Some(max) = self.amount_max {
            if invoice.amount > max {
                return false;
            }
        }
        true
    }
}

/// Phonetic comparison of a query token against the first token of a
/// distinct vendor name, computed by the store's phonetic capability.
#[derive(Debug, Clone)]
pub struct PhoneticCandidate {
    pub vendor: String,
    pub first_token: String,
    pub soundex_match: bool,
    pub metaphone_match: bool,
    pub edit_distance: usize,
}

pub trait InvoiceStore: Send + Sync {
    /// All rows matching the filters that carry an embedding, each with a
    /// cosine-similarity projection against `query_embedding`. Unsorted;
    /// the caller ranks and truncates.
    fn similarity_scan(
        &self,
        filters: &ScanFilters,
        query_embedding: &[f32],
    ) -> anyhow::Result<Vec<InvoiceRow>>;

    /// Rows matching the filters only, ordered by invoice date descending.
    fn filtered_scan(&self, filters: &ScanFilters) -> anyhow::Result<Vec<InvoiceRow>>;

    fn distinct_vendors(&self) -> anyhow::Result<Vec<String>>;
    fn distinct_products(&self) -> anyhow::Result<Vec<String>>;

    /// Phonetic comparisons for `token`, or `None` when the store has no
    /// phonetic capability (the corrector then degrades gracefully).
    fn phonetic_candidates(&self, token: &str) -> anyhow::Result<Option<Vec<PhoneticCandidate>>>;
}

fn distinct_preserving_order(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| !v.trim().is_empty() && seen.insert(v.to_lowercase()))
        .collect()
}

fn phonetic_compare(token: &str, vendors: &[String]) -> Vec<PhoneticCandidate> {
    let token = token.to_lowercase();
    let token_soundex = soundex(&token);
    let token_metaphone = metaphone(&token);

    vendors
        .iter()
        .filter_map(|vendor| {
            let first_token = vendor.split_whitespace().next()?.to_lowercase();
            Some(PhoneticCandidate {
                vendor: vendor.clone(),
                soundex_match: !token_soundex.is_empty()
                    && token_soundex == soundex(&first_token),
                metaphone_match: !token_metaphone.is_empty()
                    && token_metaphone == metaphone(&first_token),
                edit_distance: strsim::levenshtein(&token, &first_token),
                first_token,
            })
        })
        .collect()
}

fn scan_similarity(
    invoices: &[Invoice],
    filters: &ScanFilters,
    query_embedding: &[f32],
) -> Vec<InvoiceRow> {
    invoices
        .iter()
        .filter(|invoice| filters.matches(invoice))
        .filter_map(|invoice| {
            let embedding = invoice.embedding.as_ref()?;
            let similarity = crate::embed::cosine_similarity(query_embedding, embedding);
            Some(row_from(invoice, Some(similarity)))
        })
        .collect()
}

fn scan_filtered(invoices: &[Invoice], filters: &ScanFilters) -> Vec<InvoiceRow> {
    let mut matched: Vec<&Invoice> = invoices
        .iter()
        .filter(|invoice| filters.matches(invoice))
        .collect();
    matched.sort_by(|a, b| b.date.cmp(&a.date));
    matched.into_iter().map(|inv| row_from(inv, None)).collect()
}

fn row_from(invoice: &Invoice, similarity: Option<f32>) -> InvoiceRow {
    InvoiceRow {
        id: invoice.id,
        invoice_no: Some(invoice.invoice_no.clone()),
        vendor: Some(invoice.vendor.clone()),
        products: Some(invoice.products.clone()),
        amount: Some(invoice.amount),
        date: Some(invoice.date),
        similarity,
    }
}

/// In-memory store, used by tests and as the scan engine behind the CSV
/// backend.
#[derive(Debug, Clone, Default)]
pub struct BackendMemory {
    list: Arc<RwLock<Vec<Invoice>>>,
}

impl BackendMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, invoice: Invoice) {
        self.list.write().unwrap().push(invoice);
    }

    pub fn len(&self) -> usize {
        self.list.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.read().unwrap().is_empty()
    }

    fn snapshot(&self) -> Vec<Invoice> {
        self.list.read().unwrap().clone()
    }
}

impl InvoiceStore for BackendMemory {
    fn similarity_scan(
        &self,
        filters: &ScanFilters,
        query_embedding: &[f32],
    ) -> anyhow::Result<Vec<InvoiceRow>> {
        Ok(scan_similarity(&self.snapshot(), filters, query_embedding))
    }

    fn filtered_scan(&self, filters: &ScanFilters) -> anyhow::Result<Vec<InvoiceRow>> {
        Ok(scan_filtered(&self.snapshot(), filters))
    }

    fn distinct_vendors(&self) -> anyhow::Result<Vec<String>> {
        Ok(distinct_preserving_order(
            self.snapshot().into_iter().map(|inv| inv.vendor),
        ))
    }

    fn distinct_products(&self) -> anyhow::Result<Vec<String>> {
        Ok(distinct_preserving_order(
            self.snapshot().into_iter().flat_map(|inv| inv.products),
        ))
    }

    fn phonetic_candidates(&self, token: &str) -> anyhow::Result<Option<Vec<PhoneticCandidate>>> {
        let vendors = self.distinct_vendors()?;
        Ok(Some(phonetic_compare(token, &vendors)))
    }
}

const CSV_HEADERS: [&str; 8] = [
    "id",
    "invoice_no",
    "vendor",
    "products",
    "amount",
    "date",
    "branch_id",
    "embedding",
];

/// CSV-file backed store. The whole file is held in memory; saves write a
/// temp file and rename over the original.
#[derive(Debug, Clone, Default)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<Invoice>>>,
    path: String,
}

impl BackendCsv {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new invoice database at {path}");
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut invoices = vec![];
        for record in csv_reader.records() {
            let record = record?;
            let get = |idx: usize, name: &str| {
                record
                    .get(idx)
                    .map(str::to_string)
                    .ok_or(anyhow!("couldnt get record {name}"))
            };

            let id = get(0, "id")?.parse::<u64>()?;
            let invoice_no = get(1, "invoice_no")?;
            let vendor = get(2, "vendor")?;
            let products = get(3, "products")?
                .split(';')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            let amount = get(4, "amount")?.parse::<f64>().unwrap_or(0.0);
            let date = NaiveDate::parse_from_str(&get(5, "date")?, "%Y-%m-%d")?;
            let branch_id = get(6, "branch_id")?.parse::<u64>().ok();
            let embedding = parse_embedding(&get(7, "embedding")?);

            invoices.push(Invoice {
                id,
                invoice_no,
                vendor,
                products,
                amount,
                date,
                branch_id,
                embedding,
            });
        }

        log::debug!(
            "took {}ms to read csv",
            now.elapsed().as_micros() as f64 / 1000.0
        );

        Ok(BackendCsv {
            list: Arc::new(RwLock::new(invoices)),
            path: path.to_string(),
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let invoices = self.list.write().unwrap();

        let temp_path = format!("{}-tmp", &self.path);
        let mut csv_wrt = csv::Writer::from_path(&temp_path)?;
        csv_wrt.write_record(CSV_HEADERS)?;
        for invoice in invoices.iter() {
            csv_wrt.write_record([
                &invoice.id.to_string(),
                &invoice.invoice_no,
                &invoice.vendor,
                &invoice.products.join(";"),
                &invoice.amount.to_string(),
                &invoice.date.format("%Y-%m-%d").to_string(),
                &invoice
                    .branch_id
                    .map(|b| b.to_string())
                    .unwrap_or_default(),
                &invoice
                    .embedding
                    .as_ref()
                    .map(format_embedding)
                    .unwrap_or_default(),
            ])?;
        }
        csv_wrt.flush()?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    pub fn insert(&self, invoice: Invoice) -> anyhow::Result<()> {
        let mut invoice = invoice;
        if invoice.id == 0 {
            invoice.id = self
                .list
                .read()
                .unwrap()
                .last()
                .map(|last| last.id + 1)
                .unwrap_or(1);
        }
        self.list.write().unwrap().push(invoice);
        self.save()
    }

    pub fn len(&self) -> usize {
        self.list.read().unwrap().len()
    }

    fn snapshot(&self) -> Vec<Invoice> {
        self.list.read().unwrap().clone()
    }
}

fn parse_embedding(raw: &str) -> Option<Vec<f32>> {
    if raw.trim().is_empty() {
        return None;
    }
    let values: Vec<f32> = raw
        .split(' ')
        .filter_map(|v| v.parse::<f32>().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn format_embedding(embedding: &Vec<f32>) -> String {
    embedding
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl InvoiceStore for BackendCsv {
    fn similarity_scan(
        &self,
        filters: &ScanFilters,
        query_embedding: &[f32],
    ) -> anyhow::Result<Vec<InvoiceRow>> {
        Ok(scan_similarity(&self.snapshot(), filters, query_embedding))
    }

    fn filtered_scan(&self, filters: &ScanFilters) -> anyhow::Result<Vec<InvoiceRow>> {
        Ok(scan_filtered(&self.snapshot(), filters))
    }

    fn distinct_vendors(&self) -> anyhow::Result<Vec<String>> {
        Ok(distinct_preserving_order(
            self.snapshot().into_iter().map(|inv| inv.vendor),
        ))
    }

    fn distinct_products(&self) -> anyhow::Result<Vec<String>> {
        Ok(distinct_preserving_order(
            self.snapshot().into_iter().flat_map(|inv| inv.products),
        ))
    }

    fn phonetic_candidates(&self, token: &str) -> anyhow::Result<Option<Vec<PhoneticCandidate>>> {
        let vendors = self.distinct_vendors()?;
        Ok(Some(phonetic_compare(token, &vendors)))
    }
}
