use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean and validate insurance policy/claims extracts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the cleaning pipeline and write the cleaned CSV
    Clean(CleanArgs),
    /// Detect the delimiter of a raw extract
    Sniff(SniffArgs),
    /// Write the default cleaning configuration as YAML
    InitConfig(InitConfigArgs),
    /// Summarize claim frequency, severity and margin per segment
    Segments(SegmentsArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Raw delimited input file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination for the cleaned comma-delimited file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// YAML configuration (defaults apply when omitted)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Input delimiter; detected from the file when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Rows per read chunk (0 reads everything at once)
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Write the pipeline report as JSON to this path
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
    /// Override the maximum number of missing critical values per row
    #[arg(long = "missing-threshold")]
    pub missing_threshold: Option<usize>,
    /// Override the share of rows a quality filter must keep (0-1)
    #[arg(long = "retention-threshold")]
    pub retention_threshold: Option<f64>,
    /// Print the first N cleaned rows
    #[arg(long = "preview")]
    pub preview: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SniffArgs {
    /// Input file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of bytes to sample from the start of the file
    #[arg(long = "sample-bytes", default_value_t = crate::sniff::DEFAULT_SAMPLE_BYTES)]
    pub sample_bytes: usize,
    /// Delimiter reported when detection is inconclusive
    #[arg(long = "default-delimiter", value_parser = parse_delimiter, default_value = "pipe")]
    pub default_delimiter: u8,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Destination YAML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct SegmentsArgs {
    /// Cleaned CSV file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Column to group by (e.g. province, postalcode, gender)
    #[arg(long = "by")]
    pub by: String,
    /// Maximum segments to display (0 = all)
    #[arg(long, default_value_t = 0)]
    pub top: usize,
    /// Input delimiter; detected from the file when omitted
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            if first == '"' {
                return Err("The quote character cannot be a delimiter".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("||").is_err());
        assert!(parse_delimiter("\"").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
