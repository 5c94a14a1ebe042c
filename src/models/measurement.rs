use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single Argo float reading. Immutable; NaN/null per field is permitted
/// and must never be synthesized to fill a gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub platform_id: String,
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub salinity: Option<f64>,
}

/// Per-parameter descriptive statistics over a measurement set, ignoring
/// NaN/null. Absent (not a struct of zeros) when the set is empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub count: usize,
}

impl Statistics {
    /// Computes stats over the finite, non-null values in `values`. Returns
    /// `None` when no such value exists.
    pub fn compute(values: impl IntoIterator<Item = Option<f64>>) -> Option<Self> {
        let mut clean: Vec<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
        if clean.is_empty() {
            return None;
        }
        clean.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let count = clean.len();
        let sum: f64 = clean.iter().sum();
        let mean = sum / count as f64;
        let variance = clean.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let std = variance.sqrt();
        let min = clean[0];
        let max = clean[count - 1];
        let median = if count % 2 == 0 {
            (clean[count / 2 - 1] + clean[count / 2]) / 2.0
        } else {
            clean[count / 2]
        };

        Some(Self { mean, std, min, max, median, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_nan_and_null() {
        let values = vec![Some(1.0), None, Some(f64::NAN), Some(3.0), Some(2.0)];
        let stats = Statistics::compute(values).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 2.0).abs() < 1e-9);
        assert!((stats.median - 2.0).abs() < 1e-9);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn empty_set_is_none() {
        assert!(Statistics::compute(vec![None, None]).is_none());
    }
}
