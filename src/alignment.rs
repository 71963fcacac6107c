//! Calendar alignment between an asset and the index, and labelling of
//! beta output by day.
//!
//! Both series are sampled on the same intraday grid but usually start on
//! different dates. The offset is the first observation in the index whose
//! date equals the asset's first date. A missing date is an error: silently
//! using offset zero would pair the asset with the wrong index windows.

use crate::beta::{AlignmentOffset, BetaSeries};
use crate::errors::{validate_equal_length, BetaResult, ContinuousBetaError};
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Offset of `asset_first_date` within `index_dates` (one entry per index observation).
///
/// # Example
/// ```rust
/// use continuous_beta::alignment::find_alignment_offset;
/// use continuous_beta::AlignmentOffset;
///
/// let index_dates = ["2020-01-02", "2020-01-02", "2020-01-03", "2020-01-03"];
/// assert_eq!(find_alignment_offset(&index_dates, &"2020-01-03").unwrap(), AlignmentOffset(2));
/// assert!(find_alignment_offset(&index_dates, &"2020-01-06").is_err());
/// ```
pub fn find_alignment_offset<D>(
    index_dates: &[D],
    asset_first_date: &D,
) -> BetaResult<AlignmentOffset>
where
    D: PartialEq + Debug,
{
    index_dates
        .iter()
        .position(|d| d == asset_first_date)
        .map(AlignmentOffset)
        .ok_or_else(|| ContinuousBetaError::AlignmentNotFound {
            date: format!("{:?}", asset_first_date),
        })
}

/// A beta attributed to the day after its window.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelledBeta<D> {
    /// Label (usually the date) of the attributed day
    pub day: D,
    /// Close of the last bar of that day
    pub close: f64,
    /// Beta estimate; `NaN` if the window was degenerate
    pub beta: f64,
}

/// Pair each beta with the label and closing price of the day it is attributed to.
///
/// `bar_labels` and `closes` hold one entry per asset observation. Beta `s`
/// takes the label of the first bar of day `s + L` and the close of its last bar.
pub fn label_betas<D: Clone>(
    betas: &BetaSeries,
    bar_labels: &[D],
    closes: &[f64],
) -> BetaResult<Vec<LabelledBeta<D>>> {
    validate_equal_length(bar_labels.len(), closes.len(), "bar labels/closes")?;
    let n = betas.slots_per_day();
    let required = (betas.window_days() + betas.len()) * n;
    if bar_labels.len() < required {
        return Err(ContinuousBetaError::InsufficientData {
            required,
            actual: bar_labels.len(),
        });
    }

    Ok(betas
        .to_vec_lossy()
        .into_iter()
        .enumerate()
        .map(|(s, beta)| {
            let day = betas.label_day(s);
            LabelledBeta {
                day: bar_labels[day * n].clone(),
                close: closes[(day + 1) * n - 1],
                beta,
            }
        })
        .collect())
}
