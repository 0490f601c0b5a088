//! Issuer fundamentals: quarterly statements and the ratios derived from them.
//!
//! [`FundamentalsIndex`] is built once from explicit inputs and is read-only
//! afterwards; loading new statements means building a new index.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Bond issuer to listed-equity mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerLink {
    /// Issuer key as used by the portfolio (`"AAPL"` for `"AAPL 4.50 34"`).
    pub issuer: String,
    pub equity_ticker: String,
    pub issuer_name: Option<String>,
}

/// One reported quarter, as loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyStatement {
    pub equity_ticker: String,
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: u8,
    pub revenue: Option<f64>,
    pub ebitda: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub cash: Option<f64>,
    pub net_interest_expense: Option<f64>,
}

/// A quarter with its derived credit ratios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterMetrics {
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: u8,
    pub revenue: Option<f64>,
    pub ebitda: Option<f64>,
    /// Total liabilities minus cash.
    pub net_debt: Option<f64>,
    /// Net debt / EBITDA; only for positive EBITDA.
    pub net_leverage: Option<f64>,
    /// EBITDA / |net interest expense|; only for non-zero interest.
    pub interest_coverage: Option<f64>,
    /// Revenue growth over the previous quarter; only when that revenue is positive.
    pub revenue_qoq_growth: Option<f64>,
    /// EBITDA / revenue; only for positive revenue.
    pub ebitda_margin: Option<f64>,
}

impl QuarterMetrics {
    pub fn label(&self) -> String {
        format!("{}Q{}", self.year, self.quarter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuerFundamentals {
    pub issuer: String,
    pub equity_ticker: String,
    pub issuer_name: Option<String>,
    /// Oldest first.
    pub quarters: Vec<QuarterMetrics>,
}

impl IssuerFundamentals {
    pub fn latest(&self) -> Option<&QuarterMetrics> {
        self.quarters.last()
    }
}

/// Read-only lookup of issuer fundamentals by issuer key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundamentalsIndex {
    by_issuer: HashMap<String, IssuerFundamentals>,
}

impl FundamentalsIndex {
    /// Join links to statements and derive per-quarter ratios.
    ///
    /// Links with an empty or `N/A` equity ticker, and issuers without any
    /// statement, are left out. Issuer keys are matched case-insensitively.
    pub fn build(links: &[IssuerLink], statements: &[QuarterlyStatement]) -> Self {
        let mut by_equity: BTreeMap<&str, Vec<&QuarterlyStatement>> = BTreeMap::new();
        for s in statements {
            by_equity.entry(s.equity_ticker.trim()).or_default().push(s);
        }
        for rows in by_equity.values_mut() {
            rows.sort_by_key(|s| s.date);
        }

        let mut by_issuer = HashMap::new();
        for link in links {
            let equity = link.equity_ticker.trim();
            if equity.is_empty() || equity.eq_ignore_ascii_case("N/A") {
                continue;
            }
            let Some(rows) = by_equity.get(equity) else {
                debug!(issuer = %link.issuer, equity, "no statements for linked equity");
                continue;
            };
            let fundamentals = IssuerFundamentals {
                issuer: link.issuer.trim().to_string(),
                equity_ticker: equity.to_string(),
                issuer_name: link.issuer_name.clone(),
                quarters: derive_quarters(rows),
            };
            by_issuer.insert(issuer_key(&link.issuer), fundamentals);
        }

        info!(
            links = links.len(),
            statements = statements.len(),
            issuers = by_issuer.len(),
            "fundamentals index built"
        );
        Self { by_issuer }
    }

    pub fn get(&self, issuer: &str) -> Option<&IssuerFundamentals> {
        self.by_issuer.get(&issuer_key(issuer))
    }

    pub fn contains(&self, issuer: &str) -> bool {
        self.by_issuer.contains_key(&issuer_key(issuer))
    }

    pub fn len(&self) -> usize {
        self.by_issuer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_issuer.is_empty()
    }
}

fn issuer_key(issuer: &str) -> String {
    issuer.trim().to_uppercase()
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

fn derive_quarters(rows: &[&QuarterlyStatement]) -> Vec<QuarterMetrics> {
    let mut out = Vec::with_capacity(rows.len());
    let mut prev_revenue: Option<f64> = None;

    for s in rows {
        let revenue = finite(s.revenue);
        let ebitda = finite(s.ebitda);
        let net_debt = match (finite(s.total_liabilities), finite(s.cash)) {
            (Some(l), Some(c)) => Some(l - c),
            _ => None,
        };
        let net_leverage = match (net_debt, ebitda) {
            (Some(nd), Some(e)) if e > 0.0 => Some(nd / e),
            _ => None,
        };
        let interest_coverage = match (ebitda, finite(s.net_interest_expense)) {
            (Some(e), Some(i)) if i != 0.0 => Some(e / i.abs()),
            _ => None,
        };
        let revenue_qoq_growth = match (revenue, prev_revenue) {
            (Some(r), Some(p)) if p > 0.0 => Some((r - p) / p),
            _ => None,
        };
        let ebitda_margin = match (ebitda, revenue) {
            (Some(e), Some(r)) if r > 0.0 => Some(e / r),
            _ => None,
        };
        prev_revenue = revenue;

        out.push(QuarterMetrics {
            date: s.date,
            year: s.year,
            quarter: s.quarter,
            revenue,
            ebitda,
            net_debt,
            net_leverage,
            interest_coverage,
            revenue_qoq_growth,
            ebitda_margin,
        });
    }
    out
}
