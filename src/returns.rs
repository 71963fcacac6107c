//! Intraday log-return extraction.
//!
//! Turns paired open/close prices into a [`ReturnSeries`]: one log return per
//! intraday bar, laid out day-major on a fixed grid of `n` slots per day so
//! that day `d`, slot `t` lives at flat index `d * n + t`.

use crate::errors::{validate_all_finite, validate_equal_length, BetaResult, ContinuousBetaError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One intraday bar's open and close price.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntradayBar {
    /// Opening price of the interval
    pub open: f64,
    /// Closing price of the interval
    pub close: f64,
}

impl IntradayBar {
    /// Bar from open and close prices.
    pub fn new(open: f64, close: f64) -> Self {
        Self { open, close }
    }

    /// `ln(close) - ln(open)`; `None` if either price is not a positive finite number.
    pub fn log_return(&self) -> Option<f64> {
        if is_valid_price(self.open) && is_valid_price(self.close) {
            Some(self.close.ln() - self.open.ln())
        } else {
            None
        }
    }
}

#[inline]
fn is_valid_price(price: f64) -> bool {
    price > 0.0 && price.is_finite()
}

/// Day-major sequence of intraday log returns. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    values: Vec<f64>,
    slots_per_day: usize,
}

impl ReturnSeries {
    /// Wrap precomputed returns.
    ///
    /// The length must be a whole number of days and every value finite.
    pub fn from_returns(values: Vec<f64>, slots_per_day: usize) -> BetaResult<Self> {
        if slots_per_day == 0 {
            return Err(ContinuousBetaError::InvalidParameter {
                parameter: "slots_per_day".to_string(),
                value: 0.0,
                constraint: "must be at least 1".to_string(),
            });
        }
        if values.len() % slots_per_day != 0 {
            return Err(ContinuousBetaError::LengthMismatch {
                context: format!("return series on a {}-slot grid", slots_per_day),
                expected: values.len() - values.len() % slots_per_day,
                actual: values.len(),
            });
        }
        validate_all_finite(&values, "returns")?;
        Ok(Self {
            values,
            slots_per_day,
        })
    }

    /// All returns, day-major.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the series holds no observations.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Intraday slots per day (`n`).
    pub fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    /// Number of whole days.
    pub fn num_days(&self) -> usize {
        self.values.len() / self.slots_per_day
    }

    /// Returns of day `day`, or `None` past the end.
    pub fn day(&self, day: usize) -> Option<&[f64]> {
        let start = day.checked_mul(self.slots_per_day)?;
        self.values.get(start..start + self.slots_per_day)
    }

    /// Returns of `window_days` days starting at day `start`, or `None` past the end.
    pub fn window(&self, start: usize, window_days: usize) -> Option<&[f64]> {
        let from = start.checked_mul(self.slots_per_day)?;
        let to = (start + window_days).checked_mul(self.slots_per_day)?;
        self.values.get(from..to)
    }
}

/// Compute `ln(close[i]) - ln(open[i])` for every bar.
///
/// Fails if the sequences differ in length, if any price is not strictly
/// positive and finite, or if the count is not a whole number of days.
///
/// # Example
/// ```rust
/// use continuous_beta::returns::extract_log_returns;
///
/// let open = [10.0, 10.1, 10.0, 9.9];
/// let close = [10.1, 10.0, 9.9, 10.0];
/// let returns = extract_log_returns(&open, &close, 2).unwrap();
/// assert_eq!(returns.num_days(), 2);
/// assert!((returns.as_slice()[0] - (10.1f64 / 10.0).ln()).abs() < 1e-12);
/// ```
pub fn extract_log_returns(
    open: &[f64],
    close: &[f64],
    slots_per_day: usize,
) -> BetaResult<ReturnSeries> {
    validate_equal_length(open.len(), close.len(), "open/close prices")?;

    let values = open
        .iter()
        .zip(close)
        .enumerate()
        .map(|(i, (&o, &c))| {
            if !is_valid_price(o) {
                return Err(ContinuousBetaError::NonPositivePrice { index: i, value: o });
            }
            if !is_valid_price(c) {
                return Err(ContinuousBetaError::NonPositivePrice { index: i, value: c });
            }
            Ok(c.ln() - o.ln())
        })
        .collect::<BetaResult<Vec<f64>>>()?;

    ReturnSeries::from_returns(values, slots_per_day)
}

/// [`extract_log_returns`] over a slice of bars.
pub fn extract_bar_returns(bars: &[IntradayBar], slots_per_day: usize) -> BetaResult<ReturnSeries> {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            bar.log_return().ok_or(ContinuousBetaError::NonPositivePrice {
                index: i,
                value: if is_valid_price(bar.open) { bar.close } else { bar.open },
            })
        })
        .collect::<BetaResult<Vec<f64>>>()?;

    ReturnSeries::from_returns(values, slots_per_day)
}
