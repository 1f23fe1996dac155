//! Ratio-guarded quality filters.
//!
//! A filter is only committed when the share of rows it keeps is strictly
//! above the retention threshold, measured against the row count at the
//! moment the filter runs.

use std::fmt;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    error::StageError,
    frame::Frame,
    report::StageOutcome,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityFilter {
    /// `column > 0`
    Positive { column: String },
    /// `column >= 0`
    NonNegative { column: String },
    /// `column` is not missing
    Present { column: String },
    /// `column < quantile(percentile)` over the non-missing values
    BelowPercentile { column: String, percentile: f64 },
}

impl QualityFilter {
    pub fn defaults() -> Vec<QualityFilter> {
        vec![
            QualityFilter::Positive {
                column: "totalpremium".to_string(),
            },
            QualityFilter::NonNegative {
                column: "totalclaims".to_string(),
            },
            QualityFilter::Present {
                column: "loss_ratio".to_string(),
            },
            QualityFilter::BelowPercentile {
                column: "loss_ratio".to_string(),
                percentile: 0.99,
            },
        ]
    }

    pub fn column(&self) -> &str {
        match self {
            QualityFilter::Positive { column }
            | QualityFilter::NonNegative { column }
            | QualityFilter::Present { column }
            | QualityFilter::BelowPercentile { column, .. } => column,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let QualityFilter::BelowPercentile { percentile, .. } = self {
            ensure!(
                (0.0..=1.0).contains(percentile),
                "percentile for '{}' must be between 0 and 1 (got {percentile})",
                self.column()
            );
        }
        Ok(())
    }

    /// Evaluates the predicate for every row. Missing cells never pass.
    pub fn mask(&self, frame: &Frame) -> Result<Vec<bool>, StageError> {
        let column = self.column();
        let values = frame
            .numeric_column(column)
            .ok_or_else(|| StageError::MissingColumn(column.to_string()))?;
        let mask = match self {
            QualityFilter::Positive { .. } => {
                values.iter().map(|v| v.is_some_and(|n| n > 0.0)).collect()
            }
            QualityFilter::NonNegative { .. } => {
                values.iter().map(|v| v.is_some_and(|n| n >= 0.0)).collect()
            }
            QualityFilter::Present { .. } => {
                let cells = frame
                    .column(column)
                    .ok_or_else(|| StageError::MissingColumn(column.to_string()))?;
                cells.iter().map(|cell| cell.is_some()).collect()
            }
            QualityFilter::BelowPercentile { percentile, .. } => {
                let present = values.iter().flatten().copied().collect::<Vec<_>>();
                let threshold = quantile(&present, *percentile).ok_or_else(|| {
                    StageError::Computation(format!(
                        "cannot compute {} percentile of '{column}': no numeric values",
                        percentile_label(*percentile)
                    ))
                })?;
                values
                    .iter()
                    .map(|v| v.is_some_and(|n| n < threshold))
                    .collect()
            }
        };
        Ok(mask)
    }
}

impl fmt::Display for QualityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityFilter::Positive { column } => write!(f, "{column} > 0"),
            QualityFilter::NonNegative { column } => write!(f, "{column} >= 0"),
            QualityFilter::Present { column } => write!(f, "{column} present"),
            QualityFilter::BelowPercentile { column, percentile } => {
                write!(f, "{column} < {}", percentile_label(*percentile))
            }
        }
    }
}

fn percentile_label(percentile: f64) -> String {
    format!("p{}", crate::data::format_number(percentile * 100.0))
}

/// Linear-interpolation quantile, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    if lower == upper {
        return Some(sorted[lower]);
    }
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Applies one filter under the retention guard.
pub fn apply_guarded(
    frame: &mut Frame,
    filter: &QualityFilter,
    retention_threshold: f64,
) -> Result<StageOutcome, StageError> {
    if !frame.has_column(filter.column()) {
        return Ok(StageOutcome::skipped(format!(
            "column '{}' not present",
            filter.column()
        )));
    }
    if frame.is_empty() {
        return Ok(StageOutcome::skipped("table is empty"));
    }
    let current = frame.row_count();
    let mask = filter.mask(frame)?;
    let kept = mask.iter().filter(|keep| **keep).count();
    let ratio = kept as f64 / current as f64;
    if ratio > retention_threshold {
        let dropped = frame.retain_rows(&mask);
        Ok(StageOutcome::applied(format!(
            "kept {kept} of {current} row(s), dropped {dropped}"
        )))
    } else {
        Ok(StageOutcome::skipped(format!(
            "would keep {kept} of {current} row(s) ({:.1}%), not above the {:.1}% retention threshold",
            ratio * 100.0,
            retention_threshold * 100.0
        )))
    }
}
