//! The cleaning pipeline: detect, load, clean, save.
//!
//! [`CleaningPipeline`] owns at most one [`Frame`] and a [`PipelineReport`].
//! Every stage is run through the same recorder, which logs the outcome,
//! stores row counts and turns a [`StageError`] into a failed entry instead
//! of propagating it. A failed stage leaves the frame untouched and the run
//! moves on to the next stage.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use log::{info, warn};

use crate::{
    config::CleaningConfig,
    error::StageError,
    frame::Frame,
    io_utils::{self, LoadOptions},
    printable_delimiter, quality,
    report::{PipelineReport, StageOutcome, StageReport, StageStatus},
    sniff::{self, DelimiterChoice},
    stages,
};

pub const STAGE_LOAD: &str = "load";
pub const STAGE_CLEAN: &str = "clean";
pub const STAGE_SAVE: &str = "save";
pub const QUALITY_PREFIX: &str = "quality_filter";

pub struct CleaningPipeline {
    config: CleaningConfig,
    encoding: &'static Encoding,
    frame: Option<Frame>,
    report: PipelineReport,
}

impl CleaningPipeline {
    pub fn new(config: CleaningConfig) -> Self {
        Self {
            config,
            encoding: UTF_8,
            frame: None,
            report: PipelineReport::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    /// Uses `provided` when given, otherwise sniffs the file prefix and falls
    /// back to the configured default.
    pub fn detect_delimiter(&mut self, path: &Path, provided: Option<u8>) -> u8 {
        let choice = match provided {
            Some(delimiter) => DelimiterChoice::Provided {
                delimiter: delimiter as char,
            },
            None => sniff::detect_delimiter(
                path,
                self.config.sniff_sample_bytes,
                self.config.default_delimiter,
            ),
        };
        let delimiter = choice.delimiter();
        self.report.delimiter = Some(choice);
        delimiter
    }

    /// Loads `path` into the pipeline, replacing any previous table and
    /// report. Returns false when nothing could be loaded; the failure is in
    /// the report and the table stays unset.
    pub fn load(&mut self, path: &Path, provided_delimiter: Option<u8>) -> bool {
        self.report = PipelineReport::default();
        self.frame = None;
        let delimiter = self.detect_delimiter(path, provided_delimiter);
        let options = LoadOptions {
            delimiter,
            chunk_size: self.config.chunk_size,
            encoding: self.encoding,
        };
        info!(
            "Loading '{}' with delimiter '{}'",
            path.display(),
            printable_delimiter(delimiter)
        );
        match io_utils::load_frame(path, &options) {
            Ok(frame) => {
                let rows = frame.row_count();
                let detail = format!("{rows} row(s) x {} column(s)", frame.column_count());
                self.report.rows_loaded = Some(rows);
                self.frame = Some(frame);
                record(
                    &mut self.report,
                    STAGE_LOAD,
                    None,
                    Some(rows),
                    Ok(StageOutcome::applied(detail)),
                );
                true
            }
            Err(err) => {
                record(
                    &mut self.report,
                    STAGE_LOAD,
                    None,
                    None,
                    Err(StageError::Io(err)),
                );
                false
            }
        }
    }

    /// Adopts an in-memory table instead of loading one from disk.
    pub fn set_frame(&mut self, frame: Frame) {
        self.report = PipelineReport {
            rows_loaded: Some(frame.row_count()),
            ..PipelineReport::default()
        };
        self.frame = Some(frame);
    }

    /// Runs every cleaning stage in order. Halts immediately (with a failed
    /// `clean` entry) when no table is loaded.
    pub fn clean(&mut self) {
        let Self {
            config,
            frame,
            report,
            ..
        } = self;
        let Some(frame) = frame.as_mut() else {
            record(report, STAGE_CLEAN, None, None, Err(StageError::NoTable));
            return;
        };
        info!("Starting cleaning of {} row(s)", frame.row_count());

        run_stage(report, frame, "normalize_column_names", stages::normalize_column_names);
        run_stage(report, frame, "drop_high_missing_rows", |f| {
            stages::drop_high_missing_rows(f, &config.critical_columns, config.missing_threshold)
        });
        run_stage(report, frame, "fill_defaults", |f| {
            stages::fill_defaults(f, &config.default_fill)
        });
        run_stage(report, frame, "normalize_categoricals", |f| {
            stages::normalize_categoricals(f, &config.categorical_columns)
        });
        run_stage(report, frame, "drop_columns", |f| {
            stages::drop_columns(f, &config.columns_to_drop)
        });
        run_stage(report, frame, "parse_dates", |f| {
            stages::parse_dates(f, config.date_column.as_deref())
        });
        run_stage(report, frame, "coerce_numeric", |f| {
            stages::coerce_numeric(f, &config.numeric_columns)
        });
        run_stage(report, frame, "add_loss_ratio", stages::add_loss_ratio);
        if config.claim_metrics {
            run_stage(report, frame, "add_claim_metrics", stages::add_claim_metrics);
        }
        for filter in &config.quality_filters {
            let name = format!("{QUALITY_PREFIX}: {filter}");
            run_stage(report, frame, &name, |f| {
                quality::apply_guarded(f, filter, config.retention_threshold)
            });
        }

        report.rows_final = Some(frame.row_count());
        info!("Cleaning complete: {} row(s) remain", frame.row_count());
    }

    /// Writes the current table; failures are recorded, not raised.
    pub fn save(&mut self, path: &Path) -> bool {
        let rows = self.frame.as_ref().map(Frame::row_count);
        let result = match &self.frame {
            Some(frame) => io_utils::write_frame(frame, path)
                .map(|()| StageOutcome::applied(format!("wrote {}", path.display())))
                .map_err(StageError::Io),
            None => Err(StageError::NoTable),
        };
        let saved = result.is_ok();
        record(&mut self.report, STAGE_SAVE, rows, rows, result);
        saved
    }

    /// Load, clean and save in one call.
    pub fn run(&mut self, input: &Path, output: &Path, delimiter: Option<u8>) -> bool {
        if !self.load(input, delimiter) {
            self.clean();
            return false;
        }
        self.clean();
        self.save(output)
    }
}

fn run_stage<F>(report: &mut PipelineReport, frame: &mut Frame, name: &str, stage: F)
where
    F: FnOnce(&mut Frame) -> Result<StageOutcome, StageError>,
{
    let before = frame.row_count();
    let result = stage(frame);
    let after = frame.row_count();
    debug_assert!(after <= before, "stage '{name}' added rows");
    record(report, name, Some(before), Some(after), result);
}

fn record(
    report: &mut PipelineReport,
    name: &str,
    rows_before: Option<usize>,
    rows_after: Option<usize>,
    result: Result<StageOutcome, StageError>,
) {
    let (status, detail) = match result {
        Ok(outcome) => (outcome.status, outcome.detail),
        Err(err) => (StageStatus::Failed { reason: err.reason() }, None),
    };
    match &status {
        StageStatus::Applied => info!("{name}: {}", detail.as_deref().unwrap_or("applied")),
        StageStatus::Skipped { reason } => warn!("{name}: skipped ({reason})"),
        StageStatus::Failed { reason } => warn!("{name}: failed ({reason})"),
    }
    report.stages.push(StageReport {
        stage: name.to_string(),
        status,
        rows_before,
        rows_after,
        detail,
    });
}
