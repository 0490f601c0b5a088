//! Sector-peer comparison of issuer fundamentals.

use serde::Serialize;

use crate::issuer::fundamentals::{FundamentalsIndex, QuarterMetrics};
use crate::math::mean;

/// Relative distance from the peer mean treated as "in line".
pub const IN_LINE_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FundamentalMetric {
    NetLeverage,
    InterestCoverage,
    RevenueGrowth,
    EbitdaMargin,
}

impl FundamentalMetric {
    pub const ALL: [FundamentalMetric; 4] = [
        FundamentalMetric::NetLeverage,
        FundamentalMetric::InterestCoverage,
        FundamentalMetric::RevenueGrowth,
        FundamentalMetric::EbitdaMargin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FundamentalMetric::NetLeverage => "Net leverage",
            FundamentalMetric::InterestCoverage => "Interest coverage",
            FundamentalMetric::RevenueGrowth => "Revenue QoQ",
            FundamentalMetric::EbitdaMargin => "EBITDA margin",
        }
    }

    /// Leverage is better when lower; the rest when higher.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, FundamentalMetric::NetLeverage)
    }

    pub fn value(self, q: &QuarterMetrics) -> Option<f64> {
        match self {
            FundamentalMetric::NetLeverage => q.net_leverage,
            FundamentalMetric::InterestCoverage => q.interest_coverage,
            FundamentalMetric::RevenueGrowth => q.revenue_qoq_growth,
            FundamentalMetric::EbitdaMargin => q.ebitda_margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Strength,
    Weakness,
    InLine,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Strength => "Strength",
            Verdict::Weakness => "Weakness",
            Verdict::InLine => "In line",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: FundamentalMetric,
    pub issuer_value: Option<f64>,
    pub peer_mean: Option<f64>,
    /// Peers contributing a value for this metric.
    pub peer_count: usize,
    /// `None` when either side is missing.
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerComparison {
    pub issuer: String,
    /// Issuer's latest quarter, e.g. `2024Q3`.
    pub period: Option<String>,
    /// Peers with fundamentals (issuer excluded).
    pub peers: Vec<String>,
    pub metrics: Vec<MetricComparison>,
}

impl PeerComparison {
    /// False when the comparison degraded to the issuer's own numbers.
    pub fn has_peer_data(&self) -> bool {
        self.metrics.iter().any(|m| m.peer_mean.is_some())
    }

    pub fn strengths(&self) -> impl Iterator<Item = &MetricComparison> {
        self.metrics.iter().filter(|m| m.verdict == Some(Verdict::Strength))
    }

    pub fn weaknesses(&self) -> impl Iterator<Item = &MetricComparison> {
        self.metrics.iter().filter(|m| m.verdict == Some(Verdict::Weakness))
    }
}

/// Compare `issuer`'s latest quarter against the latest quarters of `peers`.
///
/// `peers` are issuer keys from the same sector; the issuer itself and peers
/// without fundamentals are ignored. Returns `None` only when the issuer has
/// no fundamentals at all. Without usable peers every metric carries the
/// issuer value and no verdict.
pub fn peer_comparison(issuer: &str, peers: &[&str], index: &FundamentalsIndex) -> Option<PeerComparison> {
    let own = index.get(issuer)?;
    let latest = own.latest();

    let mut peer_quarters: Vec<(&str, &QuarterMetrics)> = peers
        .iter()
        .filter(|p| !p.trim().eq_ignore_ascii_case(issuer.trim()))
        .filter_map(|p| Some((*p, index.get(p)?.latest()?)))
        .collect();
    peer_quarters.sort_by(|a, b| a.0.cmp(b.0));
    peer_quarters.dedup_by(|a, b| a.0.eq_ignore_ascii_case(b.0));

    let metrics = FundamentalMetric::ALL
        .iter()
        .map(|&metric| {
            let issuer_value = latest.and_then(|q| metric.value(q)).filter(|v| v.is_finite());
            let values: Vec<f64> = peer_quarters
                .iter()
                .filter_map(|(_, q)| metric.value(q))
                .filter(|v| v.is_finite())
                .collect();
            let peer_mean = mean(&values);
            MetricComparison {
                metric,
                issuer_value,
                peer_mean,
                peer_count: values.len(),
                verdict: match (issuer_value, peer_mean) {
                    (Some(v), Some(m)) => Some(verdict(metric, v, m)),
                    _ => None,
                },
            }
        })
        .collect();

    Some(PeerComparison {
        issuer: own.issuer.clone(),
        period: latest.map(QuarterMetrics::label),
        peers: peer_quarters.iter().map(|(p, _)| p.to_string()).collect(),
        metrics,
    })
}

fn verdict(metric: FundamentalMetric, value: f64, peer_mean: f64) -> Verdict {
    let diff = value - peer_mean;
    if diff.abs() <= IN_LINE_BAND * peer_mean.abs() {
        return Verdict::InLine;
    }
    if (diff > 0.0) == metric.higher_is_better() {
        Verdict::Strength
    } else {
        Verdict::Weakness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::fundamentals::tests::{link, statement};

    fn index() -> FundamentalsIndex {
        let statements = vec![
            // AAPL: leverage 400/50 = 8, margin 0.5
            statement("AAPL", 2024, 1, 100.0, 50.0),
            // MSFT: leverage 400/100 = 4, margin 0.5
            statement("MSFT", 2024, 1, 200.0, 100.0),
            // GOOG: leverage 400/25 = 16, margin 0.5
            statement("GOOG", 2024, 1, 50.0, 25.0),
        ];
        let links = vec![link("AAPL", "AAPL"), link("MSFT", "MSFT"), link("GOOG", "GOOG")];
        FundamentalsIndex::build(&links, &statements)
    }

    fn find(c: &PeerComparison, metric: FundamentalMetric) -> &MetricComparison {
        c.metrics.iter().find(|m| m.metric == metric).unwrap()
    }

    #[test]
    fn leverage_below_peers_is_a_strength() {
        let c = peer_comparison("AAPL", &["AAPL", "MSFT", "GOOG"], &index()).unwrap();
        assert_eq!(c.peers, vec!["GOOG", "MSFT"]);

        let lev = find(&c, FundamentalMetric::NetLeverage);
        assert_eq!(lev.peer_mean, Some(10.0));
        assert_eq!(lev.peer_count, 2);
        assert_eq!(lev.verdict, Some(Verdict::Strength));

        let margin = find(&c, FundamentalMetric::EbitdaMargin);
        assert_eq!(margin.verdict, Some(Verdict::InLine));
        let strengths: Vec<FundamentalMetric> = c.strengths().map(|m| m.metric).collect();
        assert_eq!(strengths, vec![FundamentalMetric::NetLeverage]);
    }

    #[test]
    fn coverage_below_peers_is_a_weakness() {
        // Coverage: AAPL 2.5, MSFT 5.0, GOOG 1.25 -> GOOG vs mean 3.75.
        let c = peer_comparison("GOOG", &["AAPL", "MSFT"], &index()).unwrap();
        let cov = find(&c, FundamentalMetric::InterestCoverage);
        assert_eq!(cov.verdict, Some(Verdict::Weakness));
        assert_eq!(c.weaknesses().count(), 2);
    }

    #[test]
    fn no_peers_degrades_to_own_fundamentals() {
        let c = peer_comparison("MSFT", &["MSFT", "UNKNOWN"], &index()).unwrap();
        assert!(!c.has_peer_data());
        assert!(c.peers.is_empty());
        let lev = find(&c, FundamentalMetric::NetLeverage);
        assert_eq!(lev.issuer_value, Some(4.0));
        assert_eq!(lev.verdict, None);
    }

    #[test]
    fn issuer_without_fundamentals_is_none() {
        assert!(peer_comparison("FNMA", &["AAPL"], &index()).is_none());
    }
}
