pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod frame;
pub mod io_utils;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod segments;
pub mod sniff;
pub mod stages;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::CleaningConfig,
    pipeline::CleaningPipeline,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("claims_prep", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => handle_clean(&args),
        Commands::Sniff(args) => handle_sniff(&args),
        Commands::InitConfig(args) => handle_init_config(&args),
        Commands::Segments(args) => segments::execute(&args),
    }
}

fn handle_clean(args: &cli::CleanArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => CleaningConfig::load(path)
            .with_context(|| format!("Loading configuration from {path:?}"))?,
        None => CleaningConfig::default(),
    };
    if let Some(threshold) = args.missing_threshold {
        config.missing_threshold = threshold;
    }
    if let Some(threshold) = args.retention_threshold {
        config.retention_threshold = threshold;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = (chunk_size > 0).then_some(chunk_size);
    }
    config.validate()?;
    debug!("Cleaning configuration: {config:?}");

    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut pipeline = CleaningPipeline::new(config).with_encoding(encoding);
    let saved = pipeline.run(&args.input, &args.output, args.delimiter);

    let report = pipeline.report();
    let headers = ["stage", "status", "rows_before", "rows_after", "detail"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    table::print_table(&headers, &report.summary_rows());

    if let Some(limit) = args.preview
        && let Some(frame) = pipeline.frame()
    {
        println!();
        print!("{}", table::render_frame(frame, limit));
    }

    if let Some(path) = &args.report {
        report
            .save_json(path)
            .with_context(|| format!("Writing pipeline report to {path:?}"))?;
        info!("Pipeline report written to {:?}", path);
    }

    if !saved {
        return Err(anyhow!(
            "Cleaning {:?} did not produce {:?}; see the stage report above",
            args.input,
            args.output
        ));
    }
    info!(
        "Cleaned {} row(s) written to {:?}",
        report.rows_final.unwrap_or_default(),
        args.output
    );
    Ok(())
}

fn handle_sniff(args: &cli::SniffArgs) -> Result<()> {
    let choice = sniff::detect_delimiter(&args.input, args.sample_bytes, args.default_delimiter);
    let delimiter = printable_delimiter(choice.delimiter());
    match &choice {
        sniff::DelimiterChoice::Fallback { reason, .. } => {
            println!("{delimiter}\t(default: {reason})");
        }
        _ => println!("{delimiter}\t(detected)"),
    }
    Ok(())
}

fn handle_init_config(args: &cli::InitConfigArgs) -> Result<()> {
    CleaningConfig::default()
        .save(&args.output)
        .with_context(|| format!("Writing configuration to {:?}", args.output))?;
    info!("Default configuration written to {:?}", args.output);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
