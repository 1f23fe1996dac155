use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::Serialize;

use crate::{
    cli::SegmentsArgs,
    data::format_number,
    frame::Frame,
    io_utils::{self, LoadOptions},
    sniff,
    stages::{LOSS_RATIO, TOTAL_CLAIMS, TOTAL_PREMIUM, loss_ratio},
    table,
};

const MISSING_SEGMENT: &str = "<missing>";

pub fn execute(args: &SegmentsArgs) -> Result<()> {
    let delimiter = match args.delimiter {
        Some(delimiter) => delimiter,
        None => sniff::detect_delimiter(
            &args.input,
            sniff::DEFAULT_SAMPLE_BYTES,
            io_utils::OUTPUT_DELIMITER,
        )
        .delimiter(),
    };
    let options = LoadOptions {
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        ..LoadOptions::new(delimiter)
    };
    let frame = io_utils::load_frame(&args.input, &options)
        .with_context(|| format!("Loading {:?}", args.input))?;
    let summaries = summarize_segments(&frame, &args.by, args.top)?;
    let rows = summaries
        .iter()
        .map(SegmentSummary::render_row)
        .collect::<Vec<_>>();
    table::print_table(&SegmentSummary::headers(), &rows);
    info!(
        "Summarized {} segment(s) of '{}' over {} row(s)",
        rows.len(),
        args.by,
        frame.row_count()
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segment: String,
    pub policies: usize,
    pub claimants: usize,
    /// Share of policies with `totalclaims > 0`.
    pub claim_frequency: f64,
    /// Mean claim amount among policies that claimed.
    pub claim_severity: Option<f64>,
    pub mean_margin: Option<f64>,
    /// Mean of the strictly positive loss ratios.
    pub mean_loss_ratio: Option<f64>,
}

impl SegmentSummary {
    pub fn render_row(&self) -> Vec<String> {
        vec![
            self.segment.clone(),
            self.policies.to_string(),
            self.claimants.to_string(),
            format!("{:.4}", self.claim_frequency),
            format_metric(self.claim_severity),
            format_metric(self.mean_margin),
            format_metric(self.mean_loss_ratio),
        ]
    }

    pub fn headers() -> Vec<String> {
        [
            "segment",
            "policies",
            "claimants",
            "claim_frequency",
            "claim_severity",
            "mean_margin",
            "mean_loss_ratio",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect()
    }
}

fn format_metric(value: Option<f64>) -> String {
    value
        .map(|v| {
            if v.fract() == 0.0 {
                format_number(v)
            } else {
                format!("{v:.4}")
            }
        })
        .unwrap_or_default()
}

#[derive(Default)]
struct SegmentAccumulator {
    policies: usize,
    claimants: usize,
    claim_total: f64,
    margin_sum: f64,
    margin_count: usize,
    ratio_sum: f64,
    ratio_count: usize,
}

impl SegmentAccumulator {
    fn ingest(&mut self, claims: Option<f64>, premium: Option<f64>, ratio: Option<f64>) {
        self.policies += 1;
        if let Some(claims) = claims
            && claims > 0.0
        {
            self.claimants += 1;
            self.claim_total += claims;
        }
        if let (Some(claims), Some(premium)) = (claims, premium) {
            self.margin_sum += premium - claims;
            self.margin_count += 1;
        }
        if let Some(ratio) = ratio
            && ratio > 0.0
        {
            self.ratio_sum += ratio;
            self.ratio_count += 1;
        }
    }

    fn finish(self, segment: String) -> SegmentSummary {
        SegmentSummary {
            segment,
            policies: self.policies,
            claimants: self.claimants,
            claim_frequency: self.claimants as f64 / self.policies as f64,
            claim_severity: mean(self.claim_total, self.claimants),
            mean_margin: mean(self.margin_sum, self.margin_count),
            mean_loss_ratio: mean(self.ratio_sum, self.ratio_count),
        }
    }
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

/// Summarizes `frame` grouped by `by`, largest segments first.
/// `top = 0` keeps every segment.
pub fn summarize_segments(frame: &Frame, by: &str, top: usize) -> Result<Vec<SegmentSummary>> {
    let segment_column = frame
        .column(by)
        .ok_or_else(|| anyhow!("Column '{by}' not found"))?;
    let claims = frame
        .numeric_column(TOTAL_CLAIMS)
        .ok_or_else(|| anyhow!("Column '{TOTAL_CLAIMS}' not found"))?;
    let premium = frame
        .numeric_column(TOTAL_PREMIUM)
        .ok_or_else(|| anyhow!("Column '{TOTAL_PREMIUM}' not found"))?;
    let ratios = match frame.numeric_column(LOSS_RATIO) {
        Some(ratios) => ratios,
        None => claims
            .iter()
            .zip(&premium)
            .map(|(c, p)| loss_ratio(*c, *p))
            .collect(),
    };

    let mut groups: HashMap<String, SegmentAccumulator> = HashMap::new();
    for (idx, cell) in segment_column.into_iter().enumerate() {
        let key = cell
            .as_ref()
            .map(|v| v.as_display())
            .unwrap_or_else(|| MISSING_SEGMENT.to_string());
        groups
            .entry(key)
            .or_default()
            .ingest(claims[idx], premium[idx], ratios[idx]);
    }

    let mut summaries = groups
        .into_iter()
        .map(|(segment, acc)| acc.finish(segment))
        .collect::<Vec<_>>();
    summaries.sort_by(|a, b| {
        b.policies
            .cmp(&a.policies)
            .then_with(|| a.segment.cmp(&b.segment))
    });
    if top > 0 && summaries.len() > top {
        summaries.truncate(top);
    }
    Ok(summaries)
}
