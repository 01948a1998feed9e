//! Formatted terminal output for `rp predict` and `rp batch`.
//!
//! Kept apart from the pipeline so:
//! - prediction code never builds strings
//! - output changes are localized

use crate::batch::{BatchPrediction, RowError};
use crate::domain::{BatchSummary, PredictionResult};
use crate::features::classify;

/// `$1,234.56`; negative values as `-$1,234.56`.
pub fn format_money(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    let cents = format!("{:.2}", v.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if v < 0.0 && cents != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

/// One-company result for `rp predict`.
pub fn format_prediction(result: &PredictionResult) -> String {
    let input = &result.input;
    let mut out = String::new();
    out.push_str("=== rp - Revenue Prediction ===\n");
    out.push_str(&format!(
        "Company: {} | employees={} | age={}y\n",
        input.company_type, input.employee_count, input.company_age
    ));
    out.push_str(&format!(
        "Location: {} ({}) | state={}\n",
        input.city.as_deref().unwrap_or("-"),
        classify(input.city.as_deref()).as_str(),
        if input.state.is_empty() { "-" } else { input.state.as_str() },
    ));
    if let Some(category) = &input.category {
        out.push_str(&format!("Category: {category}\n"));
    }
    out.push_str(&format!("\nPredicted revenue: {}\n", format_money(result.predicted_revenue)));
    out
}

/// Batch header plus summary statistics.
pub fn format_batch_summary(
    source: &str,
    rows_read: usize,
    rejected: usize,
    summary: &BatchSummary,
) -> String {
    let mut out = String::new();
    out.push_str("=== rp - Revenue Prediction (batch) ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Rows: read={rows_read} | predicted={} | rejected={rejected}\n",
        summary.count
    ));

    out.push_str("\nPredicted revenue:\n");
    let money = |v: Option<f64>| v.map(format_money).unwrap_or_else(|| "-".to_string());
    out.push_str(&format!("  mean   : {}\n", money(summary.mean)));
    out.push_str(&format!("  median : {}\n", money(summary.median)));
    out.push_str(&format!("  min    : {}\n", money(summary.min)));
    out.push_str(&format!("  max    : {}\n", money(summary.max)));
    out.push_str(&format!("  std    : {}\n", money(summary.std)));
    out
}

/// Table of the first `top_n` predictions in file order.
pub fn format_predictions_table(predictions: &[BatchPrediction], top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>6} {:>10} {:>6} {:<16} {:<16} {:<8} {:>18}",
            "line", "employees", "age", "type", "city", "tier", "predicted"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:->6} {:->10} {:->6} {:-<16} {:-<16} {:-<8} {:->18}",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for p in predictions.iter().take(top_n) {
        let input = &p.result.input;
        out.push_str(
            format!(
                "{:>6} {:>10} {:>6} {:<16} {:<16} {:<8} {:>18}",
                p.line,
                input.employee_count,
                input.company_age,
                truncate(&input.company_type, 16),
                truncate(input.city.as_deref().unwrap_or(""), 16),
                classify(input.city.as_deref()).as_str(),
                format_money(p.result.predicted_revenue),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if predictions.len() > top_n {
        out.push_str(&format!("... {} more\n", predictions.len() - top_n));
    }
    out
}

/// Rejected rows, one per line.
pub fn format_rejected(rejected: &[RowError], limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Rejected rows ({}):\n", rejected.len()));
    for err in rejected.iter().take(limit) {
        match &err.field {
            Some(field) => out.push_str(&format!("  line {}: `{field}` {}\n", err.line, err.message)),
            None => out.push_str(&format!("  line {}: {}\n", err.line, err.message)),
        }
    }
    if rejected.len() > limit {
        out.push_str(&format!("  ... {} more\n", rejected.len() - limit));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
