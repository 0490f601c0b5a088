//! Fundamentals CSV loaders: issuer→equity links and quarterly statements.
//!
//! Both files are optional inputs to the issuer view. Rows that cannot be
//! parsed are skipped and returned as [`RowError`]s.

use std::io::Read;
use std::path::Path;

use chrono::Datelike;
use csv::StringRecord;
use tracing::{info, warn};

use crate::error::AppError;
use crate::io::table::{HeaderMap, RowError, open_csv, parse_date, parse_number, parse_opt, reader_builder};
use crate::issuer::{IssuerLink, QuarterlyStatement};

const LINK_ALIASES: [(&str, &str); 3] = [
    ("bond_ticker", "issuer"),
    ("issuer_key", "issuer"),
    ("ticker", "equity_ticker"),
];

const STATEMENT_ALIASES: [(&str, &str); 4] = [
    ("ticker", "equity_ticker"),
    ("net_int_exp", "net_interest_expense"),
    ("interest_expense", "net_interest_expense"),
    ("period_end", "date"),
];

pub fn load_links(path: &Path) -> Result<(Vec<IssuerLink>, Vec<RowError>), AppError> {
    let mut reader = open_csv(path, "issuer link")?;
    read_links_from(&mut reader)
}

pub fn read_links<R: Read>(input: R) -> Result<(Vec<IssuerLink>, Vec<RowError>), AppError> {
    read_links_from(&mut reader_builder().from_reader(input))
}

pub fn load_statements(path: &Path) -> Result<(Vec<QuarterlyStatement>, Vec<RowError>), AppError> {
    let mut reader = open_csv(path, "quarterly financials")?;
    read_statements_from(&mut reader)
}

pub fn read_statements<R: Read>(input: R) -> Result<(Vec<QuarterlyStatement>, Vec<RowError>), AppError> {
    read_statements_from(&mut reader_builder().from_reader(input))
}

fn read_links_from<R: Read>(reader: &mut csv::Reader<R>) -> Result<(Vec<IssuerLink>, Vec<RowError>), AppError> {
    read_rows(reader, &LINK_ALIASES, &["issuer", "equity_ticker"], "issuer", |rec, h| {
        Ok(IssuerLink {
            issuer: h.required(rec, "issuer")?.to_string(),
            equity_ticker: h.optional(rec, "equity_ticker").unwrap_or("").to_string(),
            issuer_name: h.optional(rec, "issuer_name").map(str::to_string),
        })
    })
}

fn read_statements_from<R: Read>(
    reader: &mut csv::Reader<R>,
) -> Result<(Vec<QuarterlyStatement>, Vec<RowError>), AppError> {
    read_rows(reader, &STATEMENT_ALIASES, &["equity_ticker", "date"], "equity_ticker", parse_statement)
}

fn parse_statement(rec: &StringRecord, h: &HeaderMap) -> Result<QuarterlyStatement, String> {
    let date = parse_date(h.required(rec, "date")?)?;
    let year = match h.optional(rec, "year") {
        Some(y) => y.parse::<i32>().map_err(|_| format!("Invalid year '{y}'"))?,
        None => date.year(),
    };
    let quarter = match h.optional(rec, "quarter") {
        Some(q) => {
            let q = q.trim_start_matches(['Q', 'q']);
            q.parse::<u8>()
                .ok()
                .filter(|q| (1..=4).contains(q))
                .ok_or_else(|| format!("Invalid quarter '{q}'"))?
        }
        None => (date.month0() / 3 + 1) as u8,
    };
    let number = |name: &str| parse_opt(h.optional(rec, name), parse_number).map_err(|e| format!("{name}: {e}"));

    Ok(QuarterlyStatement {
        equity_ticker: h.required(rec, "equity_ticker")?.to_string(),
        date,
        year,
        quarter,
        revenue: number("revenue")?,
        ebitda: number("ebitda")?,
        total_liabilities: number("total_liabilities")?,
        cash: number("cash")?,
        net_interest_expense: number("net_interest_expense")?,
    })
}

fn read_rows<R, T, F>(
    reader: &mut csv::Reader<R>,
    aliases: &[(&str, &str)],
    required: &[&str],
    id_column: &str,
    parse: F,
) -> Result<(Vec<T>, Vec<RowError>), AppError>
where
    R: Read,
    F: Fn(&StringRecord, &HeaderMap) -> Result<T, String>,
{
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = HeaderMap::new(&headers, aliases);
    header_map.require(required)?;

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = result
            .map_err(|e| (None, format!("CSV parse error: {e}")))
            .and_then(|rec| {
                parse(&rec, &header_map)
                    .map_err(|msg| (header_map.optional(&rec, id_column).map(str::to_string), msg))
            });
        match parsed {
            Ok(row) => rows.push(row),
            Err((id, message)) => errors.push(RowError { line, id, message }),
        }
    }

    if !errors.is_empty() {
        warn!(skipped = errors.len(), "fundamentals rows skipped");
    }
    info!(rows = rows.len(), "fundamentals rows loaded");
    Ok((rows, errors))
}
