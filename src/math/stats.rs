//! Small descriptive statistics helpers.
//!
//! All functions skip nothing: callers filter non-finite values first.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() as f64 - 1.0)).sqrt())
}

/// Weighted mean over `(value, weight)` pairs with positive weight.
///
/// Returns `None` when the total positive weight is zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut sw = 0.0;
    let mut swx = 0.0;
    for (x, w) in pairs {
        if !(w.is_finite() && w > 0.0 && x.is_finite()) {
            continue;
        }
        sw += w;
        swx += w * x;
    }
    if sw > 0.0 { Some(swx / sw) } else { None }
}

/// Sum of squared residuals.
pub fn sse(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// Coefficient of determination. Zero when `y` has no variance.
pub fn r_squared(y: &[f64], residuals: &[f64]) -> f64 {
    let Some(m) = mean(y) else {
        return 0.0;
    };
    let ss_tot: f64 = y.iter().map(|v| (v - m) * (v - m)).sum();
    if ss_tot <= 0.0 {
        return 0.0;
    }
    1.0 - sse(residuals) / ss_tot
}
