//! EMA / TEMA over a closes series
//!
//! Both functions are pure. Missing history is reported as `None`, never as
//! a zero or default value.

/// EMA of `values` aligned with the input.
///
/// The first `period - 1` slots are `None`; slot `period - 1` is seeded with
/// the simple average of the first `period` values, after which
/// `ema[i] = v[i] * k + ema[i-1] * (1 - k)` with `k = 2 / (period + 1)`.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);

    let mut prev = seed;
    for (i, v) in values.iter().enumerate().skip(period) {
        prev = v * k + prev * (1.0 - k);
        out[i] = Some(prev);
    }

    out
}

/// Most recent EMA value, if defined
pub fn last_ema(values: &[f64], period: usize) -> Option<f64> {
    ema(values, period).last().copied().flatten()
}

/// Triple EMA of `closes`: `3*EMA1 - 3*EMA2 + EMA3`.
///
/// EMA2 runs over the defined EMA1 values and EMA3 over the defined EMA2
/// values. Requires at least `3 * period` closes.
pub fn tema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period * 3 {
        return None;
    }

    let ema1: Vec<f64> = ema(closes, period).into_iter().flatten().collect();
    let ema2: Vec<f64> = ema(&ema1, period).into_iter().flatten().collect();
    let ema3: Vec<f64> = ema(&ema2, period).into_iter().flatten().collect();

    let e1 = *ema1.last()?;
    let e2 = *ema2.last()?;
    let e3 = *ema3.last()?;

    Some(3.0 * e1 - 3.0 * e2 + e3)
}
