//! Command-line parsing for the revenue prediction service.
//!
//! Argument parsing and command dispatch stay separate from the prediction
//! code; `app` turns these structs into pipeline calls.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rp", version, about = "Company revenue prediction service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API (default when no subcommand is given).
    Serve(ServeArgs),
    /// Predict revenue for a single company.
    Predict(PredictArgs),
    /// Predict revenue for every row of a CSV or Excel file.
    Batch(BatchArgs),
    /// Verify that the model artifact exists and loads.
    Check(CheckArgs),
}

/// Flags here override `RP_*` environment settings.
#[derive(Debug, Args, Clone, Default)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Path to the model artifact JSON.
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Maximum upload size for bulk prediction, in MiB.
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Maximum data rows per bulk upload.
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Start in degraded mode if the model cannot be loaded.
    #[arg(long)]
    pub allow_missing_model: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    #[arg(long)]
    pub employee_count: f64,

    #[arg(long)]
    pub company_age: f64,

    /// Private Company, Public Company, Partnership or LLP.
    #[arg(long, default_value = "Private Company")]
    pub company_type: String,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    #[arg(long, default_value = "")]
    pub state: String,

    /// Current revenue, used for the revenue-per-employee feature.
    #[arg(long)]
    pub revenue: Option<f64>,

    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Print the result as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Input file (.csv, .xlsx or .xls).
    #[arg(short, long)]
    pub input: PathBuf,

    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Write predictions (input columns + predicted_revenue) to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Write statistics and rejected rows to JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Rows to show in the terminal table.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Process rows on one thread.
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    #[arg(long)]
    pub model: Option<PathBuf>,
}
