//! Reading and writing delimited files.
//!
//! All file I/O for the pipeline flows through this module:
//!
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Loading**: [`load_frame`] reads the whole file, optionally in
//!   fixed-size chunks that are concatenated in order.
//! - **Persistence**: [`write_frame`] writes comma-delimited UTF-8 with a
//!   header row and no index column, creating parent directories.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    data::{Cell, parse_raw_cell},
    frame::Frame,
};

pub const OUTPUT_DELIMITER: u8 = b',';

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub chunk_size: Option<usize>,
    pub encoding: &'static Encoding,
}

impl LoadOptions {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            chunk_size: None,
            encoding: UTF_8,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads the whole file into a [`Frame`].
///
/// With a chunk size the rows are gathered into chunks of at most that many
/// records and concatenated afterwards; the result is identical to an
/// unchunked read.
pub fn load_frame(path: &Path, options: &LoadOptions) -> Result<Frame> {
    let mut reader = open_csv_reader_from_path(path, options.delimiter)?;
    let header_record = reader
        .byte_headers()
        .with_context(|| format!("Reading header row of {path:?}"))?
        .clone();
    let headers = decode_record(&header_record, options.encoding)
        .with_context(|| format!("Decoding header row of {path:?}"))?;
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        bail!("Input file {path:?} has no header row");
    }
    let width = headers.len();
    let chunk_size = options.chunk_size.filter(|size| *size > 0).unwrap_or(usize::MAX);

    let mut chunks: Vec<Vec<Vec<Cell>>> = Vec::new();
    let mut current: Vec<Vec<Cell>> = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let line = row_idx + 2;
        let record = record.with_context(|| format!("Reading row {line} of {path:?}"))?;
        if record.len() > width {
            bail!(
                "Row {line} of {path:?} has {} fields but the header has {width}",
                record.len()
            );
        }
        let decoded = decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {line} of {path:?}"))?;
        let mut row = decoded.iter().map(|raw| parse_raw_cell(raw)).collect::<Vec<_>>();
        row.resize(width, None);
        current.push(row);
        if current.len() == chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    debug!("Read {} chunk(s) from {:?}", chunks.len(), path);
    Ok(Frame::concat(headers, chunks))
}

/// Writes `frame` as comma-delimited UTF-8, creating parent directories.
pub fn write_frame(frame: &Frame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating output directory {parent:?}"))?;
    }
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(OUTPUT_DELIMITER)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(BufWriter::new(file));
    writer
        .write_record(frame.headers())
        .with_context(|| format!("Writing header to {path:?}"))?;
    for (row_idx, row) in frame.rows().iter().enumerate() {
        let fields = row
            .iter()
            .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default());
        writer
            .write_record(fields)
            .with_context(|| format!("Writing row {} to {path:?}", row_idx + 2))?;
    }
    let mut inner = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing {path:?}: {}", err.error()))?;
    inner.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}
