use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::sniff::DelimiterChoice;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Applied,
    Skipped { reason: String },
    Failed { reason: String },
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Applied => write!(f, "applied"),
            StageStatus::Skipped { reason } => write!(f, "skipped ({reason})"),
            StageStatus::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

/// What a stage function hands back to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub status: StageStatus,
    pub detail: Option<String>,
}

impl StageOutcome {
    pub fn applied(detail: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Applied,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped {
                reason: reason.into(),
            },
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: String,
    #[serde(flatten)]
    pub status: StageStatus,
    pub rows_before: Option<usize>,
    pub rows_after: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StageReport {
    pub fn rows_dropped(&self) -> usize {
        match (self.rows_before, self.rows_after) {
            (Some(before), Some(after)) => before.saturating_sub(after),
            _ => 0,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.status == StageStatus::Applied
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<DelimiterChoice>,
    pub stages: Vec<StageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_loaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_final: Option<usize>,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageReport> {
        self.stages
            .iter()
            .filter(|s| matches!(s.status, StageStatus::Failed { .. }))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating report directory {parent:?}"))?;
        }
        let serialized = serde_json::to_string_pretty(self).context("Serializing report")?;
        fs::write(path, serialized).with_context(|| format!("Writing report to {path:?}"))
    }

    pub fn summary_rows(&self) -> Vec<Vec<String>> {
        self.stages
            .iter()
            .map(|s| {
                vec![
                    s.stage.clone(),
                    s.status.to_string(),
                    s.rows_before.map(|n| n.to_string()).unwrap_or_default(),
                    s.rows_after.map(|n| n.to_string()).unwrap_or_default(),
                    s.detail.clone().unwrap_or_default(),
                ]
            })
            .collect()
    }
}
