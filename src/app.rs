//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - initialises logging and configuration
//! - loads the model artifact
//! - runs the server, a single prediction, a batch, or a setup check

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{BatchArgs, CheckArgs, Command, PredictArgs, ServeArgs};
use crate::config::ServeConfig;
use crate::domain::RawInput;
use crate::error::AppError;
use crate::io::{BatchReport, write_batch_report_json, write_predictions_csv};
use crate::model::{ModelStatus, PredictionEngine};
use crate::report;

pub mod pipeline;

/// Entry point for the `rp` binary.
pub fn run() -> Result<(), AppError> {
    // `rp` and `rp --port 9000` behave like `rp serve ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    init_tracing();
    let config = crate::config::load()?;

    match cli.command {
        Command::Serve(args) => handle_serve(args, config),
        Command::Predict(args) => handle_predict(args, config),
        Command::Batch(args) => handle_batch(args, config),
        Command::Check(args) => handle_check(args, config),
    }
}

/// Install the global subscriber; `RUST_LOG` wins, default `info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_serve(args: ServeArgs, mut config: ServeConfig) -> Result<(), AppError> {
    apply_serve_args(&mut config, &args)?;

    let engine = if config.require_model {
        PredictionEngine::load(&config.model_path)?
    } else {
        PredictionEngine::load_or_degraded(&config.model_path)
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::internal(format!("Failed to start async runtime: {e}")))?;

    info!(
        addr = %config.bind_addr(),
        model_loaded = engine.is_loaded(),
        max_upload_bytes = config.limits.max_bytes,
        max_rows = config.limits.max_rows,
        "starting server"
    );
    runtime.block_on(crate::server::serve(&config, Arc::new(engine)))
}

fn apply_serve_args(config: &mut ServeConfig, args: &ServeArgs) -> Result<(), AppError> {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(model) = &args.model {
        config.model_path = model.clone();
    }
    if let Some(mb) = args.max_upload_mb {
        config.set_max_upload_mb(mb)?;
    }
    if let Some(rows) = args.max_rows {
        if rows == 0 {
            return Err(AppError::config("--max-rows must be greater than 0."));
        }
        config.limits.max_rows = rows;
    }
    if args.allow_missing_model {
        config.require_model = false;
    }
    Ok(())
}

fn handle_predict(args: PredictArgs, config: ServeConfig) -> Result<(), AppError> {
    let engine = PredictionEngine::load(&model_path(args.model.as_ref(), &config))?;
    let raw = RawInput {
        employee_count: args.employee_count,
        company_age: args.company_age,
        company_type: args.company_type,
        category: args.category,
        city: args.city,
        state: args.state,
        revenue: args.revenue,
    };
    let result = pipeline::predict_one(&engine, &raw)?;

    if args.json {
        let text = serde_json::to_string_pretty(&result)
            .map_err(|e| AppError::internal(format!("Failed to encode result: {e}")))?;
        println!("{text}");
    } else {
        print!("{}", report::format_prediction(&result));
    }
    Ok(())
}

fn handle_batch(args: BatchArgs, config: ServeConfig) -> Result<(), AppError> {
    let engine = PredictionEngine::load(&model_path(args.model.as_ref(), &config))?;
    let options = pipeline::BatchOptions {
        parallel: !args.sequential,
    };
    let output = pipeline::predict_batch_file(&engine, &args.input, &config.limits, options)?;

    let source = args.input.display().to_string();
    println!(
        "{}",
        report::format_batch_summary(&source, output.rows_read, output.rejected.len(), &output.statistics)
    );
    println!("{}", report::format_predictions_table(&output.predictions, args.top));
    if !output.rejected.is_empty() {
        println!("{}", report::format_rejected(&output.rejected, args.top));
    }

    if let Some(path) = &args.export {
        write_predictions_csv(path, &output.headers, &output.predictions)?;
        println!("Predictions written to {}", path.display());
    }
    if let Some(path) = &args.report {
        let report = BatchReport {
            tool: "rp",
            generated_at: chrono::Utc::now(),
            source,
            rows_read: output.rows_read,
            rows_predicted: output.predictions.len(),
            statistics: &output.statistics,
            rejected: &output.rejected,
        };
        write_batch_report_json(path, &report)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn handle_check(args: CheckArgs, config: ServeConfig) -> Result<(), AppError> {
    let path = model_path(args.model.as_ref(), &config);
    if !path.exists() {
        return Err(AppError::model_unavailable(format!(
            "Model artifact not found at '{}'. Export a trained model there or set RP_MODEL_PATH.",
            path.display()
        )));
    }

    let engine = PredictionEngine::load(&path)?;
    match engine.status() {
        ModelStatus::Loaded {
            source, description, ..
        } => {
            println!("Model OK: {source}");
            println!("  {description}");
        }
        ModelStatus::Missing { reason, .. } => {
            return Err(AppError::model_unavailable(reason.clone()));
        }
    }
    Ok(())
}

fn model_path(flag: Option<&PathBuf>, config: &ServeConfig) -> PathBuf {
    flag.cloned().unwrap_or_else(|| config.model_path.clone())
}

/// Rewrite argv so `rp` defaults to `rp serve`.
///
/// Rules:
/// - `rp`                      -> `rp serve`
/// - `rp --port 9000 ...`      -> `rp serve --port 9000 ...`
/// - `rp --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("serve".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "serve" | "predict" | "batch" | "check");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "serve".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_command_defaults_to_serve() {
        assert_eq!(rewrite_args(args(&["rp"])), args(&["rp", "serve"]));
        assert_eq!(
            rewrite_args(args(&["rp", "--port", "9000"])),
            args(&["rp", "serve", "--port", "9000"])
        );
    }

    #[test]
    fn subcommands_and_help_pass_through() {
        assert_eq!(rewrite_args(args(&["rp", "batch", "-i", "x.csv"])), args(&["rp", "batch", "-i", "x.csv"]));
        assert_eq!(rewrite_args(args(&["rp", "--help"])), args(&["rp", "--help"]));
    }

    #[test]
    fn serve_flags_override_config() {
        let mut config = ServeConfig::default();
        let flags = ServeArgs {
            port: Some(9100),
            max_upload_mb: Some(2),
            allow_missing_model: true,
            ..ServeArgs::default()
        };
        apply_serve_args(&mut config, &flags).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.limits.max_bytes, 2 * 1024 * 1024);
        assert!(!config.require_model);
    }

    #[test]
    fn zero_row_limit_is_rejected() {
        let mut config = ServeConfig::default();
        let flags = ServeArgs {
            max_rows: Some(0),
            ..ServeArgs::default()
        };
        assert!(apply_serve_args(&mut config, &flags).is_err());
    }
}
