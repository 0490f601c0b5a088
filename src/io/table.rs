//! Shared CSV plumbing: header resolution and cell parsing.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::error::AppError;

/// A row-level problem encountered while reading a CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the file (header is line 1).
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Normalized header name -> column index.
///
/// `aliases` maps alternative header spellings (already normalized) onto a
/// canonical name. The first column wins when two headers resolve to the
/// same name.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn new(headers: &StringRecord, aliases: &[(&str, &str)]) -> Self {
        let mut columns = HashMap::new();
        for (idx, raw) in headers.iter().enumerate() {
            let name = normalize_header_name(raw);
            let canonical = aliases
                .iter()
                .find(|(alias, _)| *alias == name)
                .map_or(name, |(_, target)| (*target).to_string());
            columns.entry(canonical).or_insert(idx);
        }
        Self { columns }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn require(&self, names: &[&str]) -> Result<(), AppError> {
        let missing: Vec<&str> = names.iter().copied().filter(|n| !self.contains(n)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        let mut available: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        available.sort_unstable();
        Err(AppError::new(
            2,
            format!(
                "Missing required column(s): {}. Available: {}",
                missing.join(", "),
                available.join(", ")
            ),
        ))
    }

    pub fn required<'a>(&self, record: &'a StringRecord, name: &str) -> Result<&'a str, String> {
        let idx = self
            .columns
            .get(name)
            .ok_or_else(|| format!("Missing required column: `{name}`"))?;
        record
            .get(*idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing required value: `{name}`"))
    }

    pub fn optional<'a>(&self, record: &'a StringRecord, name: &str) -> Option<&'a str> {
        let idx = self.columns.get(name)?;
        record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}').trim();
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect()
}

/// Open a CSV file with the reader settings shared by all loaders.
pub fn open_csv(path: &Path, what: &str) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open {what} CSV '{}': {e}", path.display())))?;
    Ok(reader_builder().from_reader(file))
}

pub fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true).trim(csv::Trim::All);
    builder
}

/// Parse a plain number, tolerating thousands separators, a currency sign
/// and accounting-style parentheses for negatives (`(1,200)` = -1200).
pub fn parse_number(s: &str) -> Result<f64, String> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' ' | '_'))
        .collect();
    let (negative, body) = match cleaned.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };
    let v: f64 = body.parse().map_err(|_| format!("Invalid number '{s}'"))?;
    if !v.is_finite() {
        return Err(format!("Non-finite number '{s}'"));
    }
    Ok(if negative { -v } else { v })
}

/// Parse a rate into a decimal fraction.
///
/// `"4.56%"` and `4.56` both become `0.0456`; values at or below 1 without a
/// percent sign are taken as already decimal.
pub fn parse_rate(s: &str) -> Result<f64, String> {
    let trimmed = s.trim();
    if let Some(pct) = trimmed.strip_suffix('%') {
        return Ok(parse_number(pct)? / 100.0);
    }
    let v = parse_number(trimmed)?;
    Ok(if v.abs() > 1.0 { v / 100.0 } else { v })
}

pub fn parse_opt<F>(s: Option<&str>, parse: F) -> Result<Option<f64>, String>
where
    F: Fn(&str) -> Result<f64, String>,
{
    s.map(parse).transpose()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, MM/DD/YYYY, YYYY/MM/DD."
    ))
}
