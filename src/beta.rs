//! Truncated continuous beta over rolling windows.
//!
//! For one window of `L * n` matched asset/index returns the estimator
//! accumulates three independently truncated sums:
//!
//! ```text
//! dividend += (r + rI)²   if |r + rI| <= k * kI
//! dividend -= (r - rI)²   if |r - rI| <= k / kI
//! divisor  += rI²         if |rI|     <= kI
//! beta = dividend / (4 * divisor)
//! ```
//!
//! Without truncation `(r + rI)² - (r - rI)² = 4 r rI`, so the ratio is a
//! regression beta of the asset on the index.
//!
//! Thresholds exist per slot for the window's *first* day only; the same `n`
//! values are applied cyclically to every day of the window (`k[i % n]`).
//! They are not recomputed per day.

use crate::config::{EstimatorConfig, FailurePolicy};
use crate::errors::{validate_equal_length, BetaResult, ContinuousBetaError, EstimationStage};
use crate::returns::ReturnSeries;
use crate::scheduler::WindowScheduler;
use crate::threshold::ThresholdTable;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Observation index in the index series at which the asset's first date occurs.
///
/// Must fall on a day boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlignmentOffset(pub usize);

impl AlignmentOffset {
    /// Offset expressed in whole days.
    pub fn to_days(self, slots_per_day: usize) -> BetaResult<usize> {
        if slots_per_day == 0 || self.0 % slots_per_day != 0 {
            return Err(ContinuousBetaError::MisalignedOffset {
                offset: self.0,
                slots_per_day,
            });
        }
        Ok(self.0 / slots_per_day)
    }
}

/// Truncated beta of one window.
///
/// `rs`/`rs_index` are the window's `L * n` returns, `ks`/`ks_index` the `n`
/// thresholds of its first day. `window_start` only labels errors.
///
/// # Example
/// ```rust
/// use continuous_beta::beta::truncated_beta;
///
/// let rs = [0.01, -0.01];
/// let beta = truncated_beta(&rs, &rs, &[2.0, 2.0], &[2.0, 2.0], 0).unwrap();
/// assert!((beta - 1.0).abs() < 1e-12);
/// ```
pub fn truncated_beta(
    rs: &[f64],
    rs_index: &[f64],
    ks: &[f64],
    ks_index: &[f64],
    window_start: usize,
) -> BetaResult<f64> {
    validate_equal_length(rs.len(), rs_index.len(), "asset/index window returns")?;
    validate_equal_length(ks.len(), ks_index.len(), "asset/index thresholds")?;
    let n = ks.len();
    if n == 0 || rs.len() % n != 0 {
        return Err(ContinuousBetaError::LengthMismatch {
            context: format!("window returns on a {}-slot threshold grid", n),
            expected: if n == 0 { 0 } else { rs.len() - rs.len() % n },
            actual: rs.len(),
        });
    }
    if let Some(slot) = ks_index.iter().position(|&k| !k.is_finite() || k <= 0.0) {
        return Err(ContinuousBetaError::degenerate(
            EstimationStage::Beta,
            window_start,
            format!("index threshold at slot {} is {}", slot, ks_index[slot]),
        ));
    }

    let mut dividend = 0.0;
    let mut divisor = 0.0;
    for (i, (&r, &r_index)) in rs.iter().zip(rs_index).enumerate() {
        let k = ks[i % n];
        let k_index = ks_index[i % n];

        let sum = r + r_index;
        if sum.abs() <= k * k_index {
            dividend += sum * sum;
        }
        let diff = r - r_index;
        if diff.abs() <= k / k_index {
            dividend -= diff * diff;
        }
        if r_index.abs() <= k_index {
            divisor += r_index * r_index;
        }
    }

    if !divisor.is_finite() || divisor <= 0.0 {
        return Err(ContinuousBetaError::degenerate(
            EstimationStage::Beta,
            window_start,
            format!("truncated index variation is {}", divisor),
        ));
    }
    let beta = dividend / (4.0 * divisor);
    if !beta.is_finite() {
        return Err(ContinuousBetaError::degenerate(
            EstimationStage::Beta,
            window_start,
            format!("beta is {} (dividend {}, divisor {})", beta, dividend, divisor),
        ));
    }
    Ok(beta)
}

/// Betas for every valid asset window, one entry per window start.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaSeries {
    window_days: usize,
    slots_per_day: usize,
    offset_days: usize,
    values: Vec<BetaResult<f64>>,
}

impl BetaSeries {
    /// Number of window starts.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no window was estimated.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Outcome for window `s`.
    pub fn get(&self, s: usize) -> Option<&BetaResult<f64>> {
        self.values.get(s)
    }

    /// All outcomes in window order.
    pub fn values(&self) -> &[BetaResult<f64>] {
        &self.values
    }

    /// `(window start, beta)` for every successful window.
    pub fn successful(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(s, v)| v.as_ref().ok().map(|&b| (s, b)))
    }

    /// `(window start, error)` for every failed window.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ContinuousBetaError)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(s, v)| v.as_ref().err().map(|e| (s, e)))
    }

    /// Betas with failed windows as `NaN`, for tabular output.
    pub fn to_vec_lossy(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| v.as_ref().copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Asset day the beta of window `s` is attributed to: the first day after the window.
    pub fn label_day(&self, s: usize) -> usize {
        s + self.window_days
    }

    /// Rolling window length `L`.
    pub fn window_days(&self) -> usize {
        self.window_days
    }

    /// Slots per day `n`.
    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    /// Day offset of the asset's first day within the index series.
    pub fn offset_days(&self) -> usize {
        self.offset_days
    }
}

fn window_returns(returns: &ReturnSeries, start: usize, window_days: usize) -> BetaResult<&[f64]> {
    returns
        .window(start, window_days)
        .ok_or_else(|| ContinuousBetaError::InsufficientData {
            required: (start + window_days) * returns.slots_per_day(),
            actual: returns.len(),
        })
}

/// Renumber a degenerate index window as the asset window it was paired with.
fn index_error_for_window(
    error: ContinuousBetaError,
    window: usize,
    index_window: usize,
) -> ContinuousBetaError {
    match error {
        ContinuousBetaError::DegenerateTruncation { stage, reason, .. } => {
            ContinuousBetaError::degenerate(
                stage,
                window,
                format!("index window {}: {}", index_window, reason),
            )
        }
        other => other,
    }
}

/// Beta for every asset window, pairing asset window `s` with index window `s + offset`.
///
/// The index must cover every asset window after the shift.
pub fn estimate_betas(
    asset_returns: &ReturnSeries,
    asset_thresholds: &ThresholdTable,
    index_returns: &ReturnSeries,
    index_thresholds: &ThresholdTable,
    offset: AlignmentOffset,
    config: &EstimatorConfig,
    scheduler: &WindowScheduler,
) -> BetaResult<BetaSeries> {
    let n = config.slots_per_day;
    let window_days = config.window_days;
    for series in [asset_returns, index_returns] {
        if series.slots_per_day() != n {
            return Err(ContinuousBetaError::LayoutMismatch {
                asset: format!("{}x{}", window_days, asset_returns.slots_per_day()),
                index: format!("{}x{}", window_days, index_returns.slots_per_day()),
            });
        }
    }

    let offset_days = offset.to_days(n)?;
    let windows = asset_thresholds.num_windows();
    for (context, table, returns) in [
        ("asset thresholds per window", asset_thresholds, asset_returns),
        ("index thresholds per window", index_thresholds, index_returns),
    ] {
        if table.num_windows() > config.valid_windows(returns.len()) {
            return Err(ContinuousBetaError::LengthMismatch {
                context: context.to_string(),
                expected: config.valid_windows(returns.len()),
                actual: table.num_windows(),
            });
        }
    }
    if offset_days + windows > index_thresholds.num_windows() {
        return Err(ContinuousBetaError::InsufficientData {
            required: (offset_days + windows + window_days) * n,
            actual: index_returns.len(),
        });
    }

    let task = |s: usize| {
        let s_index = s + offset_days;
        let ks = asset_thresholds.window(s)?;
        let ks_index = index_thresholds
            .window(s_index)
            .map_err(|e| index_error_for_window(e, s, s_index))?;
        let rs = window_returns(asset_returns, s, window_days)?;
        let rs_index = window_returns(index_returns, s_index, window_days)?;
        truncated_beta(rs, rs_index, ks, ks_index, s)
    };

    let values = match config.failure_policy {
        FailurePolicy::FailFast => scheduler
            .try_run_stage("beta", windows, task)?
            .into_iter()
            .map(Ok)
            .collect(),
        FailurePolicy::PerWindow => scheduler.run_stage("beta", windows, task),
    };

    let series = BetaSeries {
        window_days,
        slots_per_day: n,
        offset_days,
        values,
    };
    let failed = series.failures().count();
    if failed > 0 {
        log::warn!("beta: {} of {} windows failed", failed, windows);
    }
    Ok(series)
}
