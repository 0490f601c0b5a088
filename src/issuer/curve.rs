//! Issuer-local curve: monotone cubic interpolation through the issuer's own
//! bonds.
//!
//! Issuers rarely have more than a handful of bonds, too few for a stable
//! regression, so the curve passes exactly through the observed points. The
//! Fritsch–Carlson tangent limiter keeps each segment monotone between its
//! endpoints (no overshoot between neighbouring bonds).

use serde::Serialize;

use crate::error::EngineError;

/// Piecewise cubic Hermite interpolant with Fritsch–Carlson tangents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonotoneCurve {
    durations: Vec<f64>,
    yields: Vec<f64>,
    tangents: Vec<f64>,
}

impl MonotoneCurve {
    /// Build from `(duration, yield)` points in any order.
    ///
    /// Points whose durations coincide (within 1e-9) are merged into one knot
    /// at their mean yield. Fails with `InsufficientData` when fewer than
    /// `min_points` distinct durations remain.
    pub fn fit(partition: &str, points: &[(f64, f64)], min_points: usize) -> Result<Self, EngineError> {
        let mut pts: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(d, y)| d.is_finite() && y.is_finite())
            .collect();
        pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut durations: Vec<f64> = Vec::with_capacity(pts.len());
        let mut yields: Vec<f64> = Vec::with_capacity(pts.len());
        let mut counts: Vec<usize> = Vec::with_capacity(pts.len());
        for (d, y) in pts {
            match durations.last() {
                Some(&last) if (d - last).abs() <= 1e-9 => {
                    let i = yields.len() - 1;
                    yields[i] += y;
                    counts[i] += 1;
                }
                _ => {
                    durations.push(d);
                    yields.push(y);
                    counts.push(1);
                }
            }
        }
        for (y, &c) in yields.iter_mut().zip(&counts) {
            *y /= c as f64;
        }

        let required = min_points.max(2);
        if durations.len() < required {
            return Err(EngineError::insufficient(partition, required, durations.len()));
        }

        let tangents = fritsch_carlson_tangents(&durations, &yields);
        Ok(Self {
            durations,
            yields,
            tangents,
        })
    }

    /// Knots after duplicate merging, ascending by duration.
    pub fn knots(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.durations.iter().copied().zip(self.yields.iter().copied())
    }

    pub fn duration_range(&self) -> (f64, f64) {
        let lo = self.durations.first().copied().unwrap_or(f64::NAN);
        let hi = self.durations.last().copied().unwrap_or(f64::NAN);
        (lo, hi)
    }

    /// Interpolated yield; `None` outside the knot range.
    pub fn evaluate(&self, duration: f64) -> Option<f64> {
        let (lo, hi) = self.duration_range();
        if !(duration >= lo && duration <= hi) {
            return None;
        }
        // Segment index k with durations[k] <= duration <= durations[k+1].
        let k = self
            .durations
            .partition_point(|&d| d <= duration)
            .saturating_sub(1)
            .min(self.durations.len() - 2);

        let (x0, x1) = (self.durations[k], self.durations[k + 1]);
        let (y0, y1) = (self.yields[k], self.yields[k + 1]);
        let (m0, m1) = (self.tangents[k], self.tangents[k + 1]);
        let h = x1 - x0;
        let t = (duration - x0) / h;
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        Some(h00 * y0 + h10 * h * m0 + h01 * y1 + h11 * h * m1)
    }

    /// `n` evenly spaced points across the knot range.
    pub fn grid(&self, n: usize) -> Vec<(f64, f64)> {
        let n = n.max(2);
        let (lo, hi) = self.duration_range();
        (0..n)
            .filter_map(|i| {
                let d = if i == n - 1 {
                    hi
                } else {
                    lo + (hi - lo) * i as f64 / (n as f64 - 1.0)
                };
                self.evaluate(d).map(|y| (d, y))
            })
            .collect()
    }
}

fn fritsch_carlson_tangents(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let secants: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / (x[k + 1] - x[k])).collect();

    let mut m = vec![0.0; n];
    m[0] = secants[0];
    m[n - 1] = secants[n - 2];
    for k in 1..n - 1 {
        let (a, b) = (secants[k - 1], secants[k]);
        m[k] = if a * b <= 0.0 { 0.0 } else { 0.5 * (a + b) };
    }

    for k in 0..n - 1 {
        let delta = secants[k];
        if delta == 0.0 {
            m[k] = 0.0;
            m[k + 1] = 0.0;
            continue;
        }
        let alpha = m[k] / delta;
        let beta = m[k + 1] / delta;
        let norm = alpha.hypot(beta);
        if norm > 3.0 {
            let tau = 3.0 / norm;
            m[k] = tau * alpha * delta;
            m[k + 1] = tau * beta * delta;
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_knots() {
        let pts = [(1.0, 0.040), (3.0, 0.046), (5.0, 0.047), (9.0, 0.052)];
        let c = MonotoneCurve::fit("AAPL", &pts, 3).unwrap();
        for (d, y) in pts {
            assert!((c.evaluate(d).unwrap() - y).abs() < 1e-14, "knot at {d}");
        }
    }

    #[test]
    fn monotone_data_gives_monotone_curve() {
        // Sharp step: plain cubic splines overshoot here.
        let pts = [(1.0, 0.03), (2.0, 0.031), (3.0, 0.06), (4.0, 0.061), (5.0, 0.062)];
        let c = MonotoneCurve::fit("BA", &pts, 3).unwrap();
        let g = c.grid(200);
        for w in g.windows(2) {
            assert!(w[1].1 >= w[0].1 - 1e-15, "decrease at {}", w[1].0);
        }
        assert!(g.iter().all(|&(_, y)| (0.03..=0.062).contains(&y)));
    }

    #[test]
    fn flat_segment_stays_flat() {
        let pts = [(1.0, 0.05), (2.0, 0.05), (4.0, 0.06)];
        let c = MonotoneCurve::fit("KO", &pts, 3).unwrap();
        for i in 0..=10 {
            let d = 1.0 + i as f64 * 0.1;
            assert!((c.evaluate(d).unwrap() - 0.05).abs() < 1e-15);
        }
    }

    #[test]
    fn duplicate_durations_are_averaged() {
        let pts = [(2.0, 0.04), (2.0, 0.05), (5.0, 0.05), (8.0, 0.06)];
        let c = MonotoneCurve::fit("GS", &pts, 3).unwrap();
        let knots: Vec<(f64, f64)> = c.knots().collect();
        assert_eq!(knots.len(), 3);
        assert!((knots[0].1 - 0.045).abs() < 1e-15);
    }

    #[test]
    fn too_few_distinct_durations() {
        let pts = [(2.0, 0.04), (2.0, 0.05), (5.0, 0.05)];
        let err = MonotoneCurve::fit("GS", &pts, 3).unwrap_err();
        assert_eq!(err, EngineError::insufficient("GS", 3, 2));
    }

    #[test]
    fn outside_range_is_none() {
        let c = MonotoneCurve::fit("X", &[(1.0, 0.01), (2.0, 0.02), (3.0, 0.03)], 3).unwrap();
        assert_eq!(c.evaluate(0.5), None);
        assert_eq!(c.evaluate(3.5), None);
        assert!((c.evaluate(2.5).unwrap() - 0.025).abs() < 1e-15);
    }
}
