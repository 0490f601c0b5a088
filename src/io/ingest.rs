//! Portfolio CSV ingest and normalization.
//!
//! Turns a holdings export into [`BondRecord`]s:
//!
//! - **Header aliases**: canonical snake_case names, common English variants,
//!   and the bilingual desk export headers all resolve to one schema
//! - **Row-level validation**: a row with a missing ticker/sector or an
//!   unparseable number is skipped and reported; other rows are kept
//! - **Unit normalization**: yields and FTP rates become decimal fractions,
//!   nominal strips separators, accounting labels map onto [`Accounting`]
//!
//! No fitting or scoring happens here.

use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{Accounting, BondRecord};
use crate::error::AppError;
use crate::io::table::{HeaderMap, RowError, open_csv, parse_number, parse_opt, parse_rate, reader_builder};

const REQUIRED: [&str; 4] = ["ticker", "sector", "duration", "yield"];

const ALIASES: [(&str, &str); 16] = [
    ("分类1", "sector"),
    ("sector_l1", "sector"),
    ("分类2", "sub_sector"),
    ("sector_l2", "sub_sector"),
    ("subsector", "sub_sector"),
    ("债券名称", "name"),
    ("accsection", "accounting"),
    ("nominal（usd）", "nominal"),
    ("nominal_usd", "nominal"),
    ("nominal(usd)", "nominal"),
    ("effectiveyield", "yield"),
    ("effective_yield", "yield"),
    ("ftp_rate", "ftp"),
    ("oas_bp", "oas"),
    ("issuer_id", "issuer"),
    ("modified_duration", "duration"),
];

/// Ingest output: bonds plus what happened to the rows that were dropped.
#[derive(Debug, Clone)]
pub struct IngestedPortfolio {
    pub bonds: Vec<BondRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Kept rows without an FTP rate (treated as zero funding cost).
    pub ftp_missing: usize,
    pub unknown_accounting: usize,
}

impl IngestedPortfolio {
    pub fn rows_used(&self) -> usize {
        self.bonds.len()
    }
}

pub fn load_portfolio(path: &Path) -> Result<IngestedPortfolio, AppError> {
    let mut reader = open_csv(path, "portfolio")?;
    let out = ingest(&mut reader)?;
    info!(
        path = %path.display(),
        rows_read = out.rows_read,
        rows_used = out.rows_used(),
        row_errors = out.row_errors.len(),
        "portfolio loaded"
    );
    Ok(out)
}

/// Ingest from any reader (used by tests and piped input).
pub fn read_portfolio<R: Read>(input: R) -> Result<IngestedPortfolio, AppError> {
    let mut reader = reader_builder().from_reader(input);
    ingest(&mut reader)
}

fn ingest<R: Read>(reader: &mut csv::Reader<R>) -> Result<IngestedPortfolio, AppError> {
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = HeaderMap::new(&headers, &ALIASES);
    header_map.require(&REQUIRED)?;

    let mut bonds = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(bond) => bonds.push(bond),
            Err(message) => row_errors.push(RowError {
                line,
                id: header_map.optional(&record, "ticker").map(str::to_string),
                message,
            }),
        }
    }

    if bonds.is_empty() {
        return Err(AppError::new(3, "No valid rows remain after normalization."));
    }
    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), "rows skipped during ingest");
    }

    let ftp_missing = bonds.iter().filter(|b| b.ftp.is_none()).count();
    let unknown_accounting = bonds.iter().filter(|b| b.accounting == Accounting::Unknown).count();

    Ok(IngestedPortfolio {
        bonds,
        row_errors,
        rows_read,
        ftp_missing,
        unknown_accounting,
    })
}

fn parse_row(record: &StringRecord, h: &HeaderMap) -> Result<BondRecord, String> {
    let ticker = h.required(record, "ticker")?.to_string();
    let sector = normalize_sector(h.required(record, "sector")?);

    let field = |name: &str| h.optional(record, name);
    let with_name = |name: &'static str| move |e: String| format!("{name}: {e}");

    let duration = parse_opt(field("duration"), parse_number).map_err(with_name("duration"))?;
    if duration.is_some_and(|d| d < 0.0) {
        return Err("duration: must be >= 0".to_string());
    }

    Ok(BondRecord {
        ticker,
        sector,
        sub_sector: field("sub_sector").map(str::to_string),
        name: field("name").map(str::to_string),
        duration,
        yield_: parse_opt(field("yield"), parse_rate).map_err(with_name("yield"))?,
        oas: parse_opt(field("oas"), parse_number).map_err(with_name("oas"))?,
        ftp: parse_opt(field("ftp"), parse_rate).map_err(with_name("ftp"))?,
        nominal: parse_opt(field("nominal"), parse_number).map_err(with_name("nominal"))?,
        accounting: field("accounting").map(Accounting::parse).unwrap_or_default(),
        issuer: field("issuer").map(str::to_string),
    })
}

/// Canonical sector label (`CORPORATES` -> `Corps`, `treasuries` -> `Rates`).
/// Unknown sectors are title-cased.
pub fn normalize_sector(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let canonical = match upper.as_str() {
        "CORPS" | "CORPORATES" | "CORPORATE" => "Corps",
        "FINS" | "FINANCIALS" | "FINANCIAL" => "Fins",
        "MBS" => "MBS",
        "RATES" | "GOVERNMENT" | "TREASURIES" => "Rates",
        "EM" | "EMERGING" => "EM",
        "MUNIS" | "MUNICIPAL" => "Munis",
        "ABS" => "ABS",
        "CMBS" => "CMBS",
        "CLO" => "CLO",
        "SOVS" | "SOVEREIGN" => "Sovs",
        _ => return title_case(raw.trim()),
    };
    canonical.to_string()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
