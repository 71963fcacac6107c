//! # Estimator Pipeline
//!
//! Runs the stages in order for one series:
//!
//! 1. log returns from open/close prices
//! 2. daily BV/RV, one task per day
//! 3. time-of-day profile, one task per window start
//! 4. truncation thresholds, one task per window start
//!
//! Each stage returns its complete table before the next one starts. The
//! resulting [`PreparedSeries`] is immutable and can be shared, which lets the
//! index series be prepared once and reused against many assets.
//!
//! ## Usage Example
//!
//! ```rust
//! use continuous_beta::{AlignmentOffset, ContinuousBetaEstimator, EstimatorConfig};
//! use continuous_beta::generators::{generate_intraday_pair, IntradayPairConfig};
//!
//! # fn main() -> Result<(), continuous_beta::ContinuousBetaError> {
//! let config = EstimatorConfig::new(10, 8).with_limit_k(1e3);
//! let pair = generate_intraday_pair(&IntradayPairConfig {
//!     days: 15,
//!     slots_per_day: 8,
//!     seed: 7,
//!     ..IntradayPairConfig::default()
//! })?;
//!
//! let estimator = ContinuousBetaEstimator::new(config)?;
//! let index = estimator.prepare_prices(&pair.index.open, &pair.index.close)?;
//! let asset = estimator.prepare_prices(&pair.asset.open, &pair.asset.close)?;
//! let betas = estimator.estimate(&asset, &index, AlignmentOffset(0))?;
//! assert_eq!(betas.len(), 5);
//! # Ok(())
//! # }
//! ```

use crate::beta::{estimate_betas, AlignmentOffset, BetaSeries};
use crate::config::{EstimatorConfig, SchedulerConfig};
use crate::errors::{validate_data_length, BetaResult, ContinuousBetaError};
use crate::returns::{extract_log_returns, ReturnSeries};
use crate::scheduler::WindowScheduler;
use crate::threshold::{compute_thresholds, ThresholdTable};
use crate::time_of_day::{estimate_tod_profile, TodProfile};
use crate::variation::{daily_variation, DailyStats};
use std::time::Instant;

/// A series with every per-series stage computed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    config: EstimatorConfig,
    returns: ReturnSeries,
    daily_stats: Vec<DailyStats>,
    tod: TodProfile,
    thresholds: ThresholdTable,
}

impl PreparedSeries {
    /// Configuration the series was prepared with.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Intraday log returns.
    pub fn returns(&self) -> &ReturnSeries {
        &self.returns
    }

    /// BV/RV per day.
    pub fn daily_stats(&self) -> &[DailyStats] {
        &self.daily_stats
    }

    /// Time-of-day profile per window start.
    pub fn tod(&self) -> &TodProfile {
        &self.tod
    }

    /// Truncation thresholds per window start.
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Number of valid window starts.
    pub fn num_windows(&self) -> usize {
        self.thresholds.num_windows()
    }
}

/// Run the per-series stages on `returns`.
///
/// Fails with [`ContinuousBetaError::InsufficientData`] when fewer than
/// `L * n + n` observations are available.
pub fn prepare_series(
    returns: ReturnSeries,
    config: &EstimatorConfig,
    scheduler: &WindowScheduler,
) -> BetaResult<PreparedSeries> {
    config.validate()?;
    if returns.slots_per_day() != config.slots_per_day {
        return Err(ContinuousBetaError::LayoutMismatch {
            asset: format!("{}x{}", config.window_days, returns.slots_per_day()),
            index: config.layout(),
        });
    }
    validate_data_length(returns.as_slice(), config.min_observations()).map_err(|e| {
        log::warn!(
            "{} observations cover fewer than {} days plus one",
            returns.len(),
            config.window_days
        );
        e
    })?;

    let started = Instant::now();
    let daily_stats = daily_variation(&returns, scheduler);
    let tod = estimate_tod_profile(&returns, &daily_stats, config, scheduler)?;
    let thresholds = compute_thresholds(&daily_stats, &tod, config, scheduler)?;
    log::debug!(
        "prepared {} days into {} windows in {:.3}s",
        returns.num_days(),
        thresholds.num_windows(),
        started.elapsed().as_secs_f64()
    );

    Ok(PreparedSeries {
        config: config.clone(),
        returns,
        daily_stats,
        tod,
        thresholds,
    })
}

/// Betas of `asset` against `index`, with the asset starting `offset` observations into the index.
///
/// Both series must share `L`, `n` and `limitK`.
pub fn estimate_continuous_betas(
    asset: &PreparedSeries,
    index: &PreparedSeries,
    offset: AlignmentOffset,
    scheduler: &WindowScheduler,
) -> BetaResult<BetaSeries> {
    let (a, i) = (&asset.config, &index.config);
    if a.window_days != i.window_days
        || a.slots_per_day != i.slots_per_day
        || a.limit_k().to_bits() != i.limit_k().to_bits()
    {
        return Err(ContinuousBetaError::LayoutMismatch {
            asset: format!("{} (limitK {})", a.layout(), a.limit_k()),
            index: format!("{} (limitK {})", i.layout(), i.limit_k()),
        });
    }

    estimate_betas(
        &asset.returns,
        &asset.thresholds,
        &index.returns,
        &index.thresholds,
        offset,
        a,
        scheduler,
    )
}

/// Configuration plus worker pool, the usual entry point.
#[derive(Debug)]
pub struct ContinuousBetaEstimator {
    config: EstimatorConfig,
    scheduler: WindowScheduler,
}

impl ContinuousBetaEstimator {
    /// Estimator on rayon's global pool.
    pub fn new(config: EstimatorConfig) -> BetaResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler: WindowScheduler::global(),
        })
    }

    /// Estimator with its own worker pool.
    pub fn with_scheduler_config(
        config: EstimatorConfig,
        scheduler_config: &SchedulerConfig,
    ) -> BetaResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            scheduler: WindowScheduler::new(scheduler_config)?,
        })
    }

    /// Estimator configuration.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Worker pool in use.
    pub fn scheduler(&self) -> &WindowScheduler {
        &self.scheduler
    }

    /// Prepare a series from open/close prices.
    pub fn prepare_prices(&self, open: &[f64], close: &[f64]) -> BetaResult<PreparedSeries> {
        let returns = extract_log_returns(open, close, self.config.slots_per_day)?;
        self.prepare_returns(returns)
    }

    /// Prepare a series from precomputed returns.
    pub fn prepare_returns(&self, returns: ReturnSeries) -> BetaResult<PreparedSeries> {
        prepare_series(returns, &self.config, &self.scheduler)
    }

    /// Betas of a prepared asset against a prepared index.
    pub fn estimate(
        &self,
        asset: &PreparedSeries,
        index: &PreparedSeries,
        offset: AlignmentOffset,
    ) -> BetaResult<BetaSeries> {
        estimate_continuous_betas(asset, index, offset, &self.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn returns(values: Vec<f64>, n: usize) -> ReturnSeries {
        ReturnSeries::from_returns(values, n).unwrap()
    }

    #[test]
    fn test_two_day_scenario_beta_is_one() {
        let config = EstimatorConfig::new(1, 2).with_limit_k(100.0);
        let scheduler = WindowScheduler::sequential();
        let r = vec![0.01, -0.01, 0.02, -0.015];
        let asset = prepare_series(returns(r.clone(), 2), &config, &scheduler).unwrap();
        let index = prepare_series(returns(r, 2), &config, &scheduler).unwrap();

        // TOD of window 0 covers day 0 only: both slots carry half the variation
        assert_approx_eq!(asset.tod().get(0, 0).unwrap(), 1.0, 1e-12);
        assert_approx_eq!(asset.tod().get(0, 1).unwrap(), 1.0, 1e-12);

        let betas =
            estimate_continuous_betas(&asset, &index, AlignmentOffset(0), &scheduler).unwrap();
        assert_eq!(betas.len(), 1);
        assert_approx_eq!(*betas.get(0).unwrap().as_ref().unwrap(), 1.0, 1e-12);
        assert_eq!(betas.label_day(0), 1);
    }

    #[test]
    fn test_history_boundary() {
        let config = EstimatorConfig::new(3, 2).with_limit_k(100.0);
        let scheduler = WindowScheduler::sequential();
        let day = [0.01, -0.012];

        let exactly_window: Vec<f64> = day.iter().cycle().take(6).copied().collect();
        match prepare_series(returns(exactly_window, 2), &config, &scheduler) {
            Err(ContinuousBetaError::InsufficientData { required, actual }) => {
                assert_eq!(required, 8);
                assert_eq!(actual, 6);
            }
            other => panic!("Expected InsufficientData, got {:?}", other),
        }

        let one_more_day: Vec<f64> = day.iter().cycle().take(8).copied().collect();
        let prepared = prepare_series(returns(one_more_day, 2), &config, &scheduler).unwrap();
        assert_eq!(prepared.num_windows(), 1);
    }

    #[test]
    fn test_inconsistent_configs_rejected() {
        let scheduler = WindowScheduler::sequential();
        let values: Vec<f64> = (0..24).map(|i| 0.001 * ((i % 5) as f64 - 2.0) + 0.0005).collect();
        let a = prepare_series(
            returns(values.clone(), 2),
            &EstimatorConfig::new(3, 2).with_limit_k(10.0),
            &scheduler,
        )
        .unwrap();
        let b = prepare_series(
            returns(values, 2),
            &EstimatorConfig::new(3, 2).with_limit_k(20.0),
            &scheduler,
        )
        .unwrap();
        assert!(matches!(
            estimate_continuous_betas(&a, &b, AlignmentOffset(0), &scheduler),
            Err(ContinuousBetaError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn test_offset_shifts_index_windows() {
        let config = EstimatorConfig::new(2, 2).with_limit_k(1e3);
        let scheduler = WindowScheduler::sequential();
        let index_values = vec![
            0.02, -0.01, 0.01, 0.03, -0.02, 0.01, 0.015, -0.005, 0.01, 0.02, -0.01, 0.005,
        ];
        // The asset starts on index day 2 and doubles the index from there
        let asset_values: Vec<f64> = index_values[4..].iter().map(|r| 2.0 * r).collect();

        let index = prepare_series(returns(index_values, 2), &config, &scheduler).unwrap();
        let asset = prepare_series(returns(asset_values, 2), &config, &scheduler).unwrap();
        let betas =
            estimate_continuous_betas(&asset, &index, AlignmentOffset(4), &scheduler).unwrap();

        assert_eq!(betas.len(), 2);
        assert_eq!(betas.offset_days(), 2);
        for (_, beta) in betas.successful() {
            assert_approx_eq!(beta, 2.0, 1e-9);
        }
        assert_eq!(betas.successful().count(), 2);

        // A shift the index cannot cover
        assert!(matches!(
            estimate_continuous_betas(&asset, &index, AlignmentOffset(6), &scheduler),
            Err(ContinuousBetaError::InsufficientData { .. })
        ));
        assert!(matches!(
            estimate_continuous_betas(&asset, &index, AlignmentOffset(3), &scheduler),
            Err(ContinuousBetaError::MisalignedOffset { .. })
        ));
    }

    #[test]
    fn test_estimator_facade() {
        let estimator = ContinuousBetaEstimator::with_scheduler_config(
            EstimatorConfig::new(1, 2).with_limit_k(100.0),
            &SchedulerConfig::with_threads(2),
        )
        .unwrap();
        let open = [10.0, 10.1, 10.0, 10.2];
        let close = [10.1, 10.0, 10.2, 10.05];
        let index = estimator.prepare_prices(&open, &close).unwrap();
        let asset = estimator.prepare_prices(&open, &close).unwrap();
        let betas = estimator.estimate(&asset, &index, AlignmentOffset::default()).unwrap();
        assert_approx_eq!(betas.to_vec_lossy()[0], 1.0, 1e-12);

        assert!(ContinuousBetaEstimator::new(EstimatorConfig::new(0, 2)).is_err());
    }
}
