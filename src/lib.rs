//! # Continuous Beta
//!
//! Jump-robust, time-of-day-adjusted continuous beta of an asset against a
//! market index from high-frequency intraday bars.
//!
//! Returns whose magnitude exceeds a threshold are truncated before they enter
//! the covariance and variance sums, so that beta reflects co-movement of the
//! continuous (diffusive) price components only. Thresholds scale with the
//! series' own jump-robust daily variance and with a per-slot intraday
//! volatility profile.
//!
//! ## Key Features
//!
//! - **Jump-robust daily variation**: bipower and realized variation per day
//! - **Time-of-day profile**: truncated per-slot share of window variance
//! - **Truncated beta**: polarization form with three independent truncation tests
//! - **Deterministic parallelism**: per-window stages on rayon with identical
//!   results for any thread count
//! - **Per-window failures**: a degenerate window is reported on its own
//!   instead of aborting the whole series
//!
//! ## Quick Start
//!
//! ```rust
//! use continuous_beta::{AlignmentOffset, ContinuousBetaEstimator, EstimatorConfig};
//! use continuous_beta::generators::{generate_intraday_pair, IntradayPairConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 20 days of 8 bars, 10-day windows
//!     let pair = generate_intraday_pair(&IntradayPairConfig {
//!         days: 20,
//!         slots_per_day: 8,
//!         ..IntradayPairConfig::default()
//!     })?;
//!
//!     let estimator = ContinuousBetaEstimator::new(EstimatorConfig::new(10, 8))?;
//!     let index = estimator.prepare_prices(&pair.index.open, &pair.index.close)?;
//!     let asset = estimator.prepare_prices(&pair.asset.open, &pair.asset.close)?;
//!
//!     let betas = estimator.estimate(&asset, &index, AlignmentOffset(0))?;
//!     for (s, beta) in betas.successful() {
//!         println!("day {}: beta = {:.3}", betas.label_day(s), beta);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Each series passes through [`returns`], [`variation`], [`time_of_day`] and
//! [`threshold`]; [`pipeline`] runs these as barrier-separated stages on a
//! [`WindowScheduler`]. [`beta`] then pairs a prepared asset with a prepared
//! index. [`ContinuousBetaAnalyzer`] reuses one prepared index for many assets.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod returns;
pub mod scheduler;

// Estimation stages
pub mod beta;
pub mod threshold;
pub mod time_of_day;
pub mod variation;

// Orchestration
pub mod alignment;
pub mod analyzer;
pub mod pipeline;

// Synthetic data
pub mod generators;

pub use alignment::{find_alignment_offset, label_betas, LabelledBeta};
pub use analyzer::ContinuousBetaAnalyzer;
pub use beta::{truncated_beta, AlignmentOffset, BetaSeries};
pub use config::{EstimatorConfig, FailurePolicy, LimitK, SchedulerConfig};
pub use errors::{BetaResult, ContinuousBetaError, EstimationStage};
pub use pipeline::{
    estimate_continuous_betas, prepare_series, ContinuousBetaEstimator, PreparedSeries,
};
pub use returns::{extract_bar_returns, extract_log_returns, IntradayBar, ReturnSeries};
pub use scheduler::WindowScheduler;
pub use threshold::ThresholdTable;
pub use time_of_day::TodProfile;
pub use variation::DailyStats;
