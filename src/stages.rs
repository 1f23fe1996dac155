use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;

use crate::{
    config::FillValue,
    data::{Cell, Value, format_number, normalize_column_name, parse_number, parse_transaction_time},
    error::StageError,
    frame::Frame,
    report::StageOutcome,
};

pub const TOTAL_CLAIMS: &str = "totalclaims";
pub const TOTAL_PREMIUM: &str = "totalpremium";
pub const LOSS_RATIO: &str = "loss_ratio";
pub const CLAIM_OCCURRED: &str = "claim_occurred";
pub const MARGIN: &str = "margin";

pub fn normalize_column_names(frame: &mut Frame) -> Result<StageOutcome, StageError> {
    let mut renamed = 0usize;
    frame.rename_headers(|header| {
        let normalized = normalize_column_name(header);
        if normalized != header {
            renamed += 1;
        }
        normalized
    });
    let duplicates = frame.headers().iter().duplicates().cloned().collect::<Vec<_>>();
    let mut detail = format!("renamed {renamed} of {} column(s)", frame.column_count());
    if !duplicates.is_empty() {
        detail.push_str(&format!(
            "; duplicate names after normalization: {}",
            duplicates.join(", ")
        ));
    }
    Ok(StageOutcome::applied(detail))
}

/// Drops rows with more than `threshold` missing cells among `critical`.
pub fn drop_high_missing_rows(
    frame: &mut Frame,
    critical: &[String],
    threshold: usize,
) -> Result<StageOutcome, StageError> {
    let (present, absent): (Vec<_>, Vec<_>) = critical
        .iter()
        .partition(|name| frame.has_column(name));
    if present.is_empty() {
        return Ok(StageOutcome::skipped(
            "none of the critical columns are present",
        ));
    }
    let indices = present
        .iter()
        .filter_map(|name| frame.column_index(name))
        .collect::<Vec<_>>();
    let mask = frame
        .rows()
        .iter()
        .map(|row| indices.iter().filter(|idx| row[**idx].is_none()).count() <= threshold)
        .collect::<Vec<_>>();
    let dropped = frame.retain_rows(&mask);
    let mut detail = format!(
        "dropped {dropped} row(s) with more than {threshold} missing critical value(s)"
    );
    if !absent.is_empty() {
        detail.push_str(&format!("; ignored absent column(s): {}", absent.iter().join(", ")));
    }
    Ok(StageOutcome::applied(detail))
}

pub fn fill_defaults(
    frame: &mut Frame,
    defaults: &BTreeMap<String, FillValue>,
) -> Result<StageOutcome, StageError> {
    if defaults.is_empty() {
        return Ok(StageOutcome::skipped("no default values configured"));
    }
    let mut filled = Vec::new();
    let mut absent = Vec::new();
    for (column, fill) in defaults {
        let value = fill.to_value();
        let mut count = 0usize;
        let found = frame.update_column(column, |cell| {
            if cell.is_none() {
                *cell = Some(value.clone());
                count += 1;
            }
        });
        if found {
            filled.push(format!("{column}={count}"));
        } else {
            absent.push(column.as_str());
        }
    }
    if filled.is_empty() {
        return Ok(StageOutcome::skipped(format!(
            "no configured column present ({})",
            absent.join(", ")
        )));
    }
    let mut detail = format!("filled {}", filled.join(", "));
    if !absent.is_empty() {
        detail.push_str(&format!("; absent: {}", absent.join(", ")));
    }
    Ok(StageOutcome::applied(detail))
}

/// Trims and lower-cases categorical columns. Missing cells stay missing.
pub fn normalize_categoricals(
    frame: &mut Frame,
    columns: &[String],
) -> Result<StageOutcome, StageError> {
    let mut touched = Vec::new();
    for column in columns {
        let found = frame.update_column(column, |cell| {
            if let Some(value) = cell.take() {
                *cell = Some(Value::Text(value.as_display().trim().to_lowercase()));
            }
        });
        if found {
            touched.push(column.as_str());
        }
    }
    if touched.is_empty() {
        return Ok(StageOutcome::skipped("no categorical column present"));
    }
    Ok(StageOutcome::applied(format!(
        "normalized {}",
        touched.join(", ")
    )))
}

pub fn drop_columns(frame: &mut Frame, columns: &[String]) -> Result<StageOutcome, StageError> {
    let removed = frame.drop_columns(columns);
    let absent = columns
        .iter()
        .filter(|name| !removed.contains(*name))
        .collect::<Vec<_>>();
    if !absent.is_empty() {
        debug!("Columns not present for removal: {}", absent.iter().join(", "));
    }
    if removed.is_empty() {
        return Ok(StageOutcome::skipped("none of the listed columns are present"));
    }
    Ok(StageOutcome::applied(format!(
        "dropped {} ({} absent)",
        removed.join(", "),
        absent.len()
    )))
}

/// Parses the transaction-time column; unparseable cells become missing.
pub fn parse_dates(frame: &mut Frame, column: Option<&str>) -> Result<StageOutcome, StageError> {
    let Some(column) = column else {
        return Ok(StageOutcome::skipped("no date column configured"));
    };
    let mut failed = 0usize;
    let mut parsed = 0usize;
    let found = frame.update_column(column, |cell| {
        let Some(value) = cell.take() else {
            return;
        };
        let converted = match value {
            Value::DateTime(dt) => Some(dt),
            other => parse_transaction_time(&other.as_display()),
        };
        match converted {
            Some(dt) => {
                parsed += 1;
                *cell = Some(Value::DateTime(dt));
            }
            None => failed += 1,
        }
    });
    if !found {
        return Ok(StageOutcome::skipped(format!("column '{column}' not present")));
    }
    Ok(StageOutcome::applied(format!(
        "parsed {parsed} value(s) in '{column}', {failed} unparseable set to missing"
    )))
}

/// Coerces designated columns to numbers; unparseable cells become missing.
pub fn coerce_numeric(frame: &mut Frame, columns: &[String]) -> Result<StageOutcome, StageError> {
    let mut summary = Vec::new();
    for column in columns {
        let mut failed = 0usize;
        let found = frame.update_column(column, |cell| {
            let Some(value) = cell.take() else {
                return;
            };
            let number = match &value {
                Value::Number(n) => Some(*n),
                Value::Text(s) => parse_number(s),
                Value::Boolean(_) | Value::DateTime(_) => None,
            };
            match number {
                Some(n) => *cell = Some(Value::Number(n)),
                None => failed += 1,
            }
        });
        if found {
            summary.push(format!("{column} ({failed} unparseable)"));
        }
    }
    if summary.is_empty() {
        return Ok(StageOutcome::skipped("no numeric column present"));
    }
    Ok(StageOutcome::applied(format!("coerced {}", summary.join(", "))))
}

/// `loss_ratio = totalclaims / totalpremium`, missing when either side is
/// missing or the premium is zero.
pub fn add_loss_ratio(frame: &mut Frame) -> Result<StageOutcome, StageError> {
    let claims = numeric(frame, TOTAL_CLAIMS)?;
    let premium = numeric(frame, TOTAL_PREMIUM)?;
    let ratios = claims
        .iter()
        .zip(&premium)
        .map(|(claims, premium)| loss_ratio(*claims, *premium).map(Value::Number))
        .collect::<Vec<Cell>>();
    let defined = ratios.iter().filter(|c| c.is_some()).count();
    let total = ratios.len();
    frame.set_column(LOSS_RATIO, ratios);
    Ok(StageOutcome::applied(format!(
        "defined for {defined} of {total} row(s)"
    )))
}

pub fn loss_ratio(claims: Option<f64>, premium: Option<f64>) -> Option<f64> {
    match (claims, premium) {
        (Some(claims), Some(premium)) if premium != 0.0 => Some(claims / premium),
        _ => None,
    }
}

/// Adds `claim_occurred` (`totalclaims > 0`) and `margin`
/// (`totalpremium - totalclaims`).
pub fn add_claim_metrics(frame: &mut Frame) -> Result<StageOutcome, StageError> {
    let claims = numeric(frame, TOTAL_CLAIMS)?;
    let premium = numeric(frame, TOTAL_PREMIUM)?;
    let occurred = claims
        .iter()
        .map(|c| c.map(|c| Value::Boolean(c > 0.0)))
        .collect::<Vec<Cell>>();
    let margins = claims
        .iter()
        .zip(&premium)
        .map(|(claims, premium)| match (claims, premium) {
            (Some(c), Some(p)) => Some(Value::Number(p - c)),
            _ => None,
        })
        .collect::<Vec<Cell>>();
    let claimants = occurred
        .iter()
        .filter(|c| matches!(c, Some(Value::Boolean(true))))
        .count();
    let total_margin: f64 = margins.iter().flatten().filter_map(Value::as_number).sum();
    frame.set_column(CLAIM_OCCURRED, occurred);
    frame.set_column(MARGIN, margins);
    Ok(StageOutcome::applied(format!(
        "{claimants} row(s) with claims, total margin {}",
        format_number(total_margin)
    )))
}

fn numeric(frame: &Frame, column: &str) -> Result<Vec<Option<f64>>, StageError> {
    frame
        .numeric_column(column)
        .ok_or_else(|| StageError::MissingColumn(column.to_string()))
}
