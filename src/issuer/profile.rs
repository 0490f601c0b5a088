//! Qualitative credit profiling.
//!
//! The issuer analyzer does not know how a qualitative profile is produced. A
//! [`CreditProfiler`] can be registered to supply one; without a profiler the
//! issuer view simply has no profile.

use serde::Serialize;
use thiserror::Error;

use crate::issuer::IssuerView;
use crate::issuer::peers::Verdict;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditProfile {
    pub issuer: String,
    pub summary: String,
    pub key_strengths: Vec<String>,
    pub key_risks: Vec<String>,
    /// 0 (no confidence) to 1.
    pub confidence: f64,
    /// Name of the profiler that produced this profile.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("credit profiler '{profiler}' failed: {message}")]
pub struct ProfilerError {
    pub profiler: String,
    pub message: String,
}

/// Produces a qualitative profile from the quantitative issuer view.
pub trait CreditProfiler: Send + Sync {
    fn name(&self) -> &str;

    fn profile(&self, view: &IssuerView) -> Result<CreditProfile, ProfilerError>;
}

/// Deterministic profiler that narrates the relative-value signal and the
/// peer comparison. Needs no external service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProfiler;

impl CreditProfiler for SignalProfiler {
    fn name(&self) -> &str {
        "signal"
    }

    fn profile(&self, view: &IssuerView) -> Result<CreditProfile, ProfilerError> {
        let stance = match view.average_z {
            Some(z) if z < -1.0 => "trades rich to its sector curve",
            Some(z) if z > 1.0 => "trades cheap to its sector curve",
            Some(_) => "trades close to its sector curve",
            None => "has no relative-value signal",
        };
        let sector = view.sector.as_deref().unwrap_or("unknown sector");
        let mut summary = format!("{} ({sector}) {stance}", view.issuer);
        if let Some(z) = view.average_z {
            summary.push_str(&format!(" (average Z {z:+.2})"));
        }
        summary.push('.');

        let mut key_strengths = Vec::new();
        let mut key_risks = Vec::new();
        let mut confidence: f64 = if view.average_z.is_some() { 0.4 } else { 0.1 };

        if let Some(cmp) = view.fundamentals.as_ref() {
            for m in &cmp.metrics {
                let (Some(v), Some(p)) = (m.issuer_value, m.peer_mean) else {
                    continue;
                };
                let line = format!("{} {v:.2} vs peers {p:.2}", m.metric.label());
                match m.verdict {
                    Some(Verdict::Strength) => key_strengths.push(line),
                    Some(Verdict::Weakness) => key_risks.push(line),
                    _ => {}
                }
            }
            confidence += if cmp.has_peer_data() { 0.4 } else { 0.2 };
        }

        let negative_carry = view.bonds.iter().filter(|b| b.net_carry.is_some_and(|c| c < 0.0)).count();
        if negative_carry > 0 {
            key_risks.push(format!("{negative_carry} bond(s) with negative net carry"));
        }

        Ok(CreditProfile {
            issuer: view.issuer.clone(),
            summary,
            key_strengths,
            key_risks,
            confidence: confidence.min(1.0),
            source: self.name().to_string(),
        })
    }
}
