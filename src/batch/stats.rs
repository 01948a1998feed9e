use crate::domain::BatchSummary;

/// Summary statistics over predicted revenues.
///
/// `std` is the population standard deviation. Non-finite values never reach
/// here; rows with such outputs are rejected upstream.
pub fn summarize(values: &[f64]) -> BatchSummary {
    if values.is_empty() {
        return BatchSummary {
            count: 0,
            mean: None,
            median: None,
            min: None,
            max: None,
            std: None,
        };
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut sorted = values.to_vec();
    BatchSummary {
        count: values.len(),
        mean: Some(mean),
        median: median_mut(&mut sorted),
        min: Some(min),
        max: Some(max),
        std: Some(variance.sqrt()),
    }
}

fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
