//! Time-of-day (TOD) seasonal profile over rolling windows.
//!
//! For a window of `L` days starting at day `s`, every return whose magnitude
//! stays within its own day's limit `limitK * sqrt(min(BV, RV))` is kept. The
//! profile value of slot `t` is the share of the kept squared returns that fall
//! on slot `t`, scaled by `n`:
//!
//! ```text
//! TOD(s, t) = n * Σ_{kept, slot = t} r² / Σ_{kept} r²
//! ```
//!
//! Because every kept observation feeds exactly one slot's numerator and the
//! common denominator, each row sums to `n`.

use crate::config::{EstimatorConfig, FailurePolicy};
use crate::errors::{BetaResult, ContinuousBetaError, EstimationStage};
use crate::returns::ReturnSeries;
use crate::scheduler::WindowScheduler;
use crate::variation::DailyStats;

/// TOD factors indexed by (window start, slot).
///
/// A window whose truncated divisor vanished holds its error instead of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct TodProfile {
    slots_per_day: usize,
    rows: Vec<BetaResult<Vec<f64>>>,
}

impl TodProfile {
    /// Number of window starts covered.
    pub fn num_windows(&self) -> usize {
        self.rows.len()
    }

    /// Slots per row.
    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    /// Row of window `s`, or `None` past the end.
    pub fn row(&self, s: usize) -> Option<&BetaResult<Vec<f64>>> {
        self.rows.get(s)
    }

    /// Factor for window `s`, slot `t`; `None` if out of range or degenerate.
    pub fn get(&self, s: usize, t: usize) -> Option<f64> {
        match self.rows.get(s)? {
            Ok(row) => row.get(t).copied(),
            Err(_) => None,
        }
    }

    /// All rows in window order.
    pub fn rows(&self) -> &[BetaResult<Vec<f64>>] {
        &self.rows
    }

    /// Window starts whose profile could not be computed.
    pub fn degenerate_windows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(s, row)| row.as_ref().err().map(|_| s))
            .collect()
    }
}

/// TOD factor of a single slot `slot` for the window `window`.
///
/// `window` holds the window's `L * n` returns, `window_stats` at least its `L`
/// daily stats (day `k` of the window at position `k`). `window_start` only
/// labels the error.
pub fn tod_at_slot(
    window: &[f64],
    slot: usize,
    window_stats: &[DailyStats],
    slots_per_day: usize,
    limit_k: f64,
    window_start: usize,
) -> BetaResult<f64> {
    let mut dividend = 0.0;
    let mut divisor = 0.0;
    let mut limit = 0.0;

    for (i, &r) in window.iter().enumerate() {
        if i % slots_per_day == 0 {
            limit = window_stats[i / slots_per_day].truncation_limit(limit_k);
        }
        if r.abs() <= limit {
            let r2 = r * r;
            if i % slots_per_day == slot {
                dividend += r2;
            }
            divisor += r2;
        }
    }

    normalize(dividend, divisor, slots_per_day, window_start)
}

/// All `n` TOD factors of one window in a single pass.
///
/// Produces the same values as calling [`tod_at_slot`] for every slot.
pub fn tod_row(
    window: &[f64],
    window_stats: &[DailyStats],
    slots_per_day: usize,
    limit_k: f64,
    window_start: usize,
) -> BetaResult<Vec<f64>> {
    let mut dividends = vec![0.0; slots_per_day];
    let mut divisor = 0.0;

    for (returns, stats) in window.chunks(slots_per_day).zip(window_stats) {
        let limit = stats.truncation_limit(limit_k);
        for (slot, &r) in returns.iter().enumerate() {
            if r.abs() <= limit {
                let r2 = r * r;
                dividends[slot] += r2;
                divisor += r2;
            }
        }
    }

    dividends
        .into_iter()
        .map(|dividend| normalize(dividend, divisor, slots_per_day, window_start))
        .collect()
}

#[inline]
fn normalize(
    dividend: f64,
    divisor: f64,
    slots_per_day: usize,
    window_start: usize,
) -> BetaResult<f64> {
    if !divisor.is_finite() || divisor <= 0.0 {
        return Err(ContinuousBetaError::degenerate(
            EstimationStage::TimeOfDay,
            window_start,
            format!("truncated squared-return divisor is {}", divisor),
        ));
    }
    Ok(slots_per_day as f64 * dividend / divisor)
}

/// TOD profile for every valid window start of `returns`.
///
/// Under [`FailurePolicy::FailFast`] the first degenerate window aborts the
/// stage; otherwise degenerate windows are recorded in the profile.
pub fn estimate_tod_profile(
    returns: &ReturnSeries,
    daily_stats: &[DailyStats],
    config: &EstimatorConfig,
    scheduler: &WindowScheduler,
) -> BetaResult<TodProfile> {
    let n = config.slots_per_day;
    let window_days = config.window_days;
    if returns.slots_per_day() != n {
        return Err(ContinuousBetaError::LayoutMismatch {
            asset: format!("{}x{}", window_days, returns.slots_per_day()),
            index: config.layout(),
        });
    }
    if daily_stats.len() != returns.num_days() {
        return Err(ContinuousBetaError::LengthMismatch {
            context: "daily stats per day".to_string(),
            expected: returns.num_days(),
            actual: daily_stats.len(),
        });
    }

    let limit_k = config.limit_k();
    let windows = config.valid_windows(returns.len());
    let task = |s: usize| {
        let window = returns.window(s, window_days).ok_or_else(|| {
            ContinuousBetaError::InsufficientData {
                required: (s + window_days) * n,
                actual: returns.len(),
            }
        })?;
        tod_row(window, &daily_stats[s..s + window_days], n, limit_k, s)
    };

    let rows = match config.failure_policy {
        FailurePolicy::FailFast => scheduler
            .try_run_stage("time-of-day", windows, task)?
            .into_iter()
            .map(Ok)
            .collect(),
        FailurePolicy::PerWindow => scheduler.run_stage("time-of-day", windows, task),
    };

    let profile = TodProfile {
        slots_per_day: n,
        rows,
    };
    let degenerate = profile.degenerate_windows();
    if !degenerate.is_empty() {
        log::warn!(
            "time-of-day profile: {} of {} windows degenerate (first at {})",
            degenerate.len(),
            windows,
            degenerate[0]
        );
    }
    Ok(profile)
}
