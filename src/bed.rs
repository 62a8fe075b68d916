//! BED-like CNV call parsing
//!
//! Each row holds at least `chromosome`, `start` and `end`, tab-separated. Any further
//! fields are kept verbatim in the call's detail. Files may be plain text or
//! BGZF-compressed (`.gz`/`.bgz`).

use crate::interval::{CnvInterval, SourceMask};
use log::debug;
use noodles::bgzf;
use std::fs::File;
use std::io::{BufRead, BufReader, Error as IoError, Read, Seek};
use std::num::{NonZeroUsize, ParseIntError};

#[derive(Debug)]
pub enum ParseErr {
    NotEnoughFields(usize),
    IoError(IoError),
    InvalidCoordinate(ParseIntError),
    InvalidFormat(String),
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::NotEnoughFields(n) => {
                write!(f, "Not enough fields in BED record (expected at least 3, found {})", n)
            }
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
            ParseErr::InvalidCoordinate(e) => write!(f, "Invalid coordinate: {}", e),
            ParseErr::InvalidFormat(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseErr {}

/// A parse failure with the position and content of the offending row
#[derive(Debug)]
pub struct RowError {
    pub line_number: usize,
    pub line: String,
    pub error: ParseErr,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line_number, self.error, self.line)
    }
}

impl std::error::Error for RowError {}

/// True if the reader is positioned on a BGZF block: a gzip member whose extra
/// field carries the `BC` subfield. Plain gzip and short files give `false`.
/// The reader is rewound either way.
fn starts_with_bgzf_block<R: Read + Seek>(reader: &mut R) -> std::io::Result<bool> {
    let mut header = [0u8; 18];
    let found = match reader.read_exact(&mut header) {
        Ok(()) => {
            header[..4] == [0x1f, 0x8b, 0x08, 0x04]
                && header[10..16] == [0x06, 0x00, b'B', b'C', 0x02, 0x00]
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    reader.rewind()?;
    Ok(found)
}

/// Build a raw call from the fields of one row
pub fn interval_from_fields(fields: &[&str], mask: SourceMask) -> Result<CnvInterval, ParseErr> {
    if fields.len() < 3 {
        return Err(ParseErr::NotEnoughFields(fields.len()));
    }

    let chromosome = fields[0];
    if chromosome.is_empty() {
        return Err(ParseErr::InvalidFormat("Empty chromosome name".to_string()));
    }
    let start = fields[1]
        .trim()
        .parse::<i32>()
        .map_err(ParseErr::InvalidCoordinate)?;
    let end = fields[2]
        .trim()
        .parse::<i32>()
        .map_err(ParseErr::InvalidCoordinate)?;
    if start < 0 || end < 0 {
        return Err(ParseErr::InvalidFormat(format!(
            "Coordinates must be non-negative, got {}-{}",
            start, end
        )));
    }

    Ok(CnvInterval::raw(chromosome, start, end, mask, fields))
}

/// Rows that carry no call: blank lines and `#` comments
fn is_skippable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

pub fn parse_bed<R: BufRead>(reader: R, mask: SourceMask) -> Result<Vec<CnvInterval>, RowError> {
    let mut intervals = Vec::new();
    for (index, line_result) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line_result.map_err(|e| RowError {
            line_number,
            line: String::new(),
            error: ParseErr::IoError(e),
        })?;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if is_skippable(line) {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let interval = interval_from_fields(&fields, mask).map_err(|error| RowError {
            line_number,
            line: line.to_string(),
            error,
        })?;
        intervals.push(interval);
    }
    Ok(intervals)
}

/// Parse a BED file with automatic format detection (compressed or uncompressed)
pub fn parse_bed_file(
    bed_file: &str,
    mask: SourceMask,
    threads: NonZeroUsize,
) -> std::io::Result<Vec<CnvInterval>> {
    let mut file = File::open(bed_file).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Failed to open '{}': {}", bed_file, e))
    })?;

    let parsed = if [".gz", ".bgz"].iter().any(|e| bed_file.ends_with(e)) {
        if !starts_with_bgzf_block(&mut file)? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.bed.gz",
                    bed_file, bed_file
                ),
            ));
        }
        debug!("Reading {} with {} BGZF workers", bed_file, threads);
        let reader = bgzf::io::MultithreadedReader::with_worker_count(threads, file);
        parse_bed(BufReader::new(reader), mask)
    } else {
        parse_bed(BufReader::new(file), mask)
    };

    parsed.map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse BED records from {}: {}", bed_file, e),
        )
    })
}
