//! Schedule files: comma-separated rows of timestamped intensity targets.
//!
//! The first line is a header and is always skipped. Each data row carries a
//! local timestamp in its first column and intensity targets from the fifth
//! column onward; the columns in between hold operator notes. Target fields
//! may wrap the number in free text ("intensity 30.25%"), so the first
//! number-looking run in each field is taken as the value.

use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

/// Index of the first column holding an intensity target.
const FIRST_TARGET_COLUMN: usize = 4;

/// Timestamp layouts accepted in the first column, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%y %H:%M",
];

static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-+]?\d*\.\d+|\d+").unwrap());

/// One schedule row: when to act and what to set each channel to.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub due: DateTime<Local>,
    pub targets: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read schedule file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
enum RowError {
    #[error("expected at least 5 columns, got {0}")]
    TooFewColumns(usize),
    #[error("unrecognized timestamp '{0}'")]
    BadTimestamp(String),
    #[error("no usable target fields")]
    NoTargets,
}

/// Load and parse a schedule file. Rows that cannot be parsed are logged
/// and dropped; an unreadable file is an error.
pub fn load_schedule(path: &Path) -> Result<Vec<ScheduleEntry>, ScheduleError> {
    info!("Running schedule file {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Ok(parse_schedule(&content))
}

/// Parse schedule rows out of `content`, keeping file order.
pub fn parse_schedule(content: &str) -> Vec<ScheduleEntry> {
    let mut entries = Vec::new();
    for (index, line) in content.lines().enumerate() {
        // First line is the header.
        if index == 0 || line.trim().is_empty() {
            continue;
        }
        match parse_row(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping schedule line {}: {}", index + 1, e),
        }
    }
    entries
}

fn parse_row(line: &str) -> Result<ScheduleEntry, RowError> {
    let columns: Vec<&str> = line.split(',').collect();
    if columns.len() <= FIRST_TARGET_COLUMN {
        return Err(RowError::TooFewColumns(columns.len()));
    }

    let due = parse_timestamp(columns[0])?;
    let mut targets = Vec::new();
    for field in &columns[FIRST_TARGET_COLUMN..] {
        match extract_number(field) {
            Some(value) => targets.push(value),
            None => warn!("Skipping target field without a number: '{}'", field),
        }
    }
    if targets.is_empty() {
        return Err(RowError::NoTargets);
    }
    Ok(ScheduleEntry { due, targets })
}

fn parse_timestamp(text: &str) -> Result<DateTime<Local>, RowError> {
    let text = text.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            // Prefer the earlier instant for times made ambiguous by DST.
            if let Some(due) = Local.from_local_datetime(&naive).earliest() {
                return Ok(due);
            }
        }
    }
    Err(RowError::BadTimestamp(text.to_string()))
}

/// First number-looking run in `field`, if any.
fn extract_number(field: &str) -> Option<f64> {
    NUMBER_REGEX.find(field)?.as_str().parse().ok()
}
