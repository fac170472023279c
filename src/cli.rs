use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search invoices with a natural language query
    Search {
        /// e.g. "invoices from Gaurav last month around 5000 rupees"
        query: String,

        /// Restrict to one branch
        #[clap(short, long)]
        branch: Option<u64>,

        /// Earliest invoice date (YYYY-MM-DD), used only when the query
        /// text names no dates
        #[clap(long)]
        date_from: Option<NaiveDate>,

        /// Latest invoice date (YYYY-MM-DD)
        #[clap(long)]
        date_to: Option<NaiveDate>,

        /// Minimum amount, used only when the query text names none
        #[clap(long)]
        amount_min: Option<f64>,

        /// Maximum amount
        #[clap(long)]
        amount_max: Option<f64>,

        /// Maximum number of results
        #[clap(short, long)]
        limit: Option<usize>,

        /// Print the count
        #[clap(short = 'c', long, default_value = "false")]
        count: bool,
    },

    /// Add a single invoice
    Add {
        #[clap(long)]
        invoice_no: String,

        #[clap(short, long)]
        vendor: String,

        /// Semicolon-separated product list
        #[clap(short, long)]
        products: Option<String>,

        #[clap(short, long)]
        amount: f64,

        /// Invoice date (YYYY-MM-DD)
        #[clap(short, long)]
        date: NaiveDate,

        #[clap(short, long)]
        branch: Option<u64>,
    },

    /// Bulk-import invoices from a CSV file with headers
    /// invoice_no,vendor,products,amount,date,branch_id
    Import {
        file: String,
    },

    /// Show vocabulary cache statistics
    CacheStats {},
}
