//! Row-wise carry and liquidity metrics.
//!
//! Pure functions of one bond and the configuration. Nothing here fails: a
//! metric that cannot be computed is `None`.

use serde::Serialize;

use crate::domain::{BondRecord, EngineConfig, LiquidityTier};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarryMetrics {
    pub net_carry: Option<f64>,
    pub carry_efficiency: Option<f64>,
    pub liquidity: Option<LiquidityTier>,
    pub is_tradeable: bool,
}

pub fn derive_metrics(bond: &BondRecord, config: &EngineConfig) -> CarryMetrics {
    let net_carry = net_carry(bond);
    CarryMetrics {
        net_carry,
        carry_efficiency: net_carry.and_then(|c| carry_efficiency(c, bond.duration)),
        liquidity: liquidity_tier(bond.nominal, config.liquidity_threshold),
        is_tradeable: bond.accounting.is_tradeable(),
    }
}

/// Yield minus funding rate. A missing FTP counts as zero funding cost.
pub fn net_carry(bond: &BondRecord) -> Option<f64> {
    let y = bond.yield_.filter(|y| y.is_finite())?;
    let ftp = bond.ftp.filter(|f| f.is_finite()).unwrap_or(0.0);
    Some(y - ftp)
}

/// Net carry per year of duration.
pub fn carry_efficiency(net_carry: f64, duration: Option<f64>) -> Option<f64> {
    match duration {
        Some(d) if d.is_finite() && d != 0.0 => Some(net_carry / d),
        _ => None,
    }
}

pub fn liquidity_tier(nominal: Option<f64>, threshold: f64) -> Option<LiquidityTier> {
    let n = nominal.filter(|n| n.is_finite())?;
    Some(if n > threshold {
        LiquidityTier::High
    } else {
        LiquidityTier::Low
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Accounting;

    fn bond(yield_: Option<f64>, ftp: Option<f64>, duration: Option<f64>) -> BondRecord {
        BondRecord {
            ticker: "T 1".to_string(),
            sector: "Rates".to_string(),
            yield_,
            ftp,
            duration,
            ..BondRecord::default()
        }
    }

    #[test]
    fn net_carry_round_trips_to_yield() {
        let b = bond(Some(0.0487), Some(0.0425), Some(4.0));
        let m = derive_metrics(&b, &EngineConfig::default());
        let carry = m.net_carry.unwrap();
        assert!((carry + b.ftp.unwrap() - b.yield_.unwrap()).abs() < 1e-12);
        assert!((m.carry_efficiency.unwrap() - carry / 4.0).abs() < 1e-15);
    }

    #[test]
    fn missing_ftp_is_zero_and_missing_yield_is_none() {
        assert_eq!(net_carry(&bond(Some(0.05), None, None)), Some(0.05));
        assert_eq!(net_carry(&bond(None, Some(0.04), None)), None);
    }

    #[test]
    fn carry_efficiency_undefined_without_usable_duration() {
        assert_eq!(carry_efficiency(0.01, Some(0.0)), None);
        assert_eq!(carry_efficiency(0.01, None), None);
        assert_eq!(carry_efficiency(0.01, Some(f64::NAN)), None);
        assert_eq!(carry_efficiency(0.01, Some(2.0)), Some(0.005));
    }

    #[test]
    fn liquidity_threshold_is_strict() {
        let t = 10_000_000.0;
        assert_eq!(liquidity_tier(Some(10_000_000.0), t), Some(LiquidityTier::Low));
        assert_eq!(liquidity_tier(Some(10_000_001.0), t), Some(LiquidityTier::High));
        assert_eq!(liquidity_tier(None, t), None);
        assert_eq!(LiquidityTier::High.score(), 5);
    }

    #[test]
    fn htm_is_not_tradeable() {
        let mut b = bond(Some(0.05), None, Some(3.0));
        b.accounting = Accounting::Htm;
        assert!(!derive_metrics(&b, &EngineConfig::default()).is_tradeable);
        b.accounting = Accounting::Afs;
        assert!(derive_metrics(&b, &EngineConfig::default()).is_tradeable);
    }
}
