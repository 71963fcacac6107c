//! Per-slot truncation thresholds.
//!
//! `k(s, t) = limitK * sqrt(min(BV(s), RV(s)) * TOD(s, t))`, where `BV(s)` and
//! `RV(s)` belong to the first day of window `s` rather than the whole window.

use crate::config::{EstimatorConfig, FailurePolicy};
use crate::errors::{BetaResult, ContinuousBetaError, EstimationStage};
use crate::scheduler::WindowScheduler;
use crate::time_of_day::TodProfile;
use crate::variation::DailyStats;

/// Truncation thresholds indexed by (window start, slot). Non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    slots_per_day: usize,
    rows: Vec<BetaResult<Vec<f64>>>,
}

impl ThresholdTable {
    /// Number of window starts covered.
    pub fn num_windows(&self) -> usize {
        self.rows.len()
    }

    /// Slots per row.
    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    /// The `n` thresholds of window `s`, or the error that made the window degenerate.
    pub fn window(&self, s: usize) -> BetaResult<&[f64]> {
        match self.rows.get(s) {
            Some(Ok(row)) => Ok(row),
            Some(Err(e)) => Err(e.clone()),
            None => Err(ContinuousBetaError::InsufficientData {
                required: s + 1,
                actual: self.rows.len(),
            }),
        }
    }

    /// Threshold for window `s`, slot `t`; `None` if out of range or degenerate.
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

    /// Window starts without usable thresholds.
    pub fn degenerate_windows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(s, row)| row.as_ref().err().map(|_| s))
            .collect()
    }
}

/// Thresholds of one window from its first day's stats and its TOD row.
pub fn threshold_row(
    first_day: &DailyStats,
    tod_row: &[f64],
    limit_k: f64,
    window_start: usize,
) -> BetaResult<Vec<f64>> {
    let scale = first_day.min_variation();
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ContinuousBetaError::degenerate(
            EstimationStage::Threshold,
            window_start,
            format!("min(BV, RV) of the window's first day is {}", scale),
        ));
    }

    tod_row
        .iter()
        .map(|&tod| {
            let k = limit_k * (scale * tod).sqrt();
            if k.is_finite() && k >= 0.0 {
                Ok(k)
            } else {
                Err(ContinuousBetaError::degenerate(
                    EstimationStage::Threshold,
                    window_start,
                    format!("threshold is {} for TOD factor {}", k, tod),
                ))
            }
        })
        .collect()
}

/// Thresholds for every window of `tod`.
///
/// Windows whose TOD row is degenerate carry that error forward.
pub fn compute_thresholds(
    daily_stats: &[DailyStats],
    tod: &TodProfile,
    config: &EstimatorConfig,
    scheduler: &WindowScheduler,
) -> BetaResult<ThresholdTable> {
    if tod.num_windows() > daily_stats.len() {
        return Err(ContinuousBetaError::LengthMismatch {
            context: "daily stats covering TOD windows".to_string(),
            expected: tod.num_windows(),
            actual: daily_stats.len(),
        });
    }

    let limit_k = config.limit_k();
    let task = |s: usize| match tod.row(s) {
        Some(Ok(row)) => threshold_row(&daily_stats[s], row, limit_k, s),
        Some(Err(e)) => Err(e.clone()),
        None => Err(ContinuousBetaError::NumericalError {
            reason: format!("TOD row {} missing", s),
        }),
    };

    let rows = match config.failure_policy {
        FailurePolicy::FailFast => scheduler
            .try_run_stage("threshold", tod.num_windows(), task)?
            .into_iter()
            .map(Ok)
            .collect(),
        FailurePolicy::PerWindow => scheduler.run_stage("threshold", tod.num_windows(), task),
    };

    Ok(ThresholdTable {
        slots_per_day: tod.slots_per_day(),
        rows,
    })
}
