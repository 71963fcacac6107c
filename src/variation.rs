//! Per-day realized and bipower variation.
//!
//! Realized variation (RV) sums squared returns and therefore includes the
//! contribution of jumps. Bipower variation (BV) multiplies adjacent absolute
//! returns, so an isolated jump is damped by its normal-sized neighbour. The
//! smaller of the two is the jump-robust daily scale used for truncation.

use crate::returns::ReturnSeries;
use crate::scheduler::WindowScheduler;
use std::f64::consts::FRAC_PI_2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bipower and realized variation of one day.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DailyStats {
    /// Bipower variation `(π/2) Σ |r_i||r_{i-1}|`
    pub bv: f64,
    /// Realized variation `Σ r_i²`
    pub rv: f64,
}

impl DailyStats {
    /// Stats of a single day's returns.
    pub fn from_day(day: &[f64]) -> Self {
        Self {
            bv: bipower_variation(day),
            rv: realized_variation(day),
        }
    }

    /// `min(BV, RV)`, the jump-robust variance scale.
    #[inline]
    pub fn min_variation(&self) -> f64 {
        self.bv.min(self.rv)
    }

    /// `limit_k * sqrt(min(BV, RV))`: the day's truncation limit for single returns.
    #[inline]
    pub fn truncation_limit(&self, limit_k: f64) -> f64 {
        limit_k * self.min_variation().sqrt()
    }
}

/// `(π/2) Σ_{i≥1} |r_i| |r_{i-1}|` over one day.
///
/// The first return is paired with an implicit zero predecessor and so
/// contributes nothing.
pub fn bipower_variation(day: &[f64]) -> f64 {
    let sum: f64 = day
        .windows(2)
        .map(|pair| pair[0].abs() * pair[1].abs())
        .sum();
    FRAC_PI_2 * sum
}

/// `Σ r_i²` over one day.
pub fn realized_variation(day: &[f64]) -> f64 {
    day.iter().map(|r| r * r).sum()
}

/// BV and RV for every day of `returns`, computed one task per day.
pub fn daily_variation(returns: &ReturnSeries, scheduler: &WindowScheduler) -> Vec<DailyStats> {
    scheduler.run_stage("daily variation", returns.num_days(), |d| {
        returns.day(d).map(DailyStats::from_day).unwrap_or_default()
    })
}
