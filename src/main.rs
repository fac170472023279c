use std::sync::Arc;

use anyhow::{anyhow, bail};
use chrono::NaiveDate;
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod embed;
mod fuzzy;
mod invoices;
mod preprocess;
mod search;
#[cfg(test)]
mod tests;
mod vocab;

use config::Config;
use embed::EmbeddingGateway;
use invoices::{BackendCsv, Invoice, SearchFilters};
use search::SearchEngine;

fn base_path() -> String {
    std::env::var("INVOQ_BASE_PATH").unwrap_or(format!(
        "{}/.local/share/invoq",
        my_home()
            .expect("couldnt find home dir")
            .expect("couldnt find home dir")
            .to_string_lossy()
    ))
}

fn build_gateway(config: &Config) -> anyhow::Result<Option<Arc<dyn EmbeddingGateway>>> {
    match config.embedding.provider.as_str() {
        "none" => Ok(None),
        "http" => {
            let gateway = embed::HttpGateway::new(
                &config.embedding.endpoint,
                &config.embedding.model,
                config.embedding.api_key.clone(),
                Some(config.embedding.timeout_secs),
            )?;
            Ok(Some(Arc::new(gateway)))
        }
        #[cfg(feature = "local-embed")]
        "local" => {
            let gateway = embed::LocalGateway::new(&config.embedding.model, config.cache_dir())?;
            Ok(Some(Arc::new(gateway)))
        }
        #[cfg(not(feature = "local-embed"))]
        "local" => bail!("built without the local-embed feature; set embedding.provider to 'http' or 'none'"),
        other => bail!("unknown embedding provider '{other}'"),
    }
}

/// Embed the invoice's vendor/product text. A failed embedding is logged
/// and the invoice is stored without one; it then only surfaces through
/// filter-only searches.
fn embed_invoice(invoice: &mut Invoice, gateway: &Option<Arc<dyn EmbeddingGateway>>) {
    let Some(gateway) = gateway else { return };
    match gateway.generate(&invoice.embedding_text()) {
        Ok(embedding) => invoice.embedding = Some(embedding),
        Err(err) => {
            log::warn!("couldnt embed invoice {}: {err}", invoice.invoice_no);
        }
    }
}

fn import_file(path: &str) -> anyhow::Result<Vec<Invoice>> {
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

        invoices.push(Invoice {
            id: 0,
            invoice_no: get(0, "invoice_no")?,
            vendor: get(1, "vendor")?,
            products: get(2, "products")?
                .split(';')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            amount: get(3, "amount")?.parse::<f64>()?,
            date: NaiveDate::parse_from_str(&get(4, "date")?, "%Y-%m-%d")?,
            branch_id: get(5, "branch_id")?.parse::<u64>().ok(),
            embedding: None,
        });
    }
    Ok(invoices)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = cli::Args::parse();

    let base_path = base_path();
    let config = Config::load_with(&base_path);
    let database_path = config.database_path();
    let store = Arc::new(BackendCsv::load(
        database_path
            .to_str()
            .ok_or(anyhow!("invalid database path"))?,
    )?);

    match args.command {
        cli::Command::Search {
            query,
            branch,
            date_from,
            date_to,
            amount_min,
            amount_max,
            limit,
            count,
        } => {
            let gateway = build_gateway(&config)?;
            let engine = SearchEngine::with_vocab_ttl(store, gateway, config.vocab_ttl_secs);

            let filters = SearchFilters {
                branch_id: branch,
                date_from,
                date_to,
                amount_min,
                amount_max,
                limit,
            };
            let results = engine.search(&query, &filters)?;

            if count {
                println!("{} invoices found", results.len());
                return Ok(());
            }

            println!("{}", serde_json::to_string_pretty(&results).unwrap());
            Ok(())
        }

        cli::Command::Add {
            invoice_no,
            vendor,
            products,
            amount,
            date,
            branch,
        } => {
            let gateway = build_gateway(&config)?;

            let mut invoice = Invoice {
                id: 0,
                invoice_no,
                vendor,
                products: products
                    .unwrap_or_default()
                    .split(';')
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
                amount,
                date,
                branch_id: branch,
                embedding: None,
            };
            embed_invoice(&mut invoice, &gateway);

            store.insert(invoice.clone())?;
            println!("{}", serde_json::to_string_pretty(&invoice).unwrap());
            Ok(())
        }

        cli::Command::Import { file } => {
            let gateway = build_gateway(&config)?;

            let invoices = import_file(&file)?;
            let total = invoices.len();
            for mut invoice in invoices {
                embed_invoice(&mut invoice, &gateway);
                store.insert(invoice)?;
            }

            println!("{total} invoices imported");
            Ok(())
        }

        cli::Command::CacheStats {} => {
            let engine = SearchEngine::with_vocab_ttl(store, None, config.vocab_ttl_secs);
            println!(
                "{}",
                serde_json::to_string_pretty(&engine.cache_stats()).unwrap()
            );
            Ok(())
        }
    }
}
