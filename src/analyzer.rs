//! # Multi-Asset Beta Analyzer
//!
//! [`ContinuousBetaAnalyzer`] holds one prepared index and any number of
//! assets, each with its own alignment offset into the index. The index's
//! returns, daily stats, TOD profile and thresholds are computed once when it
//! is set and shared read-only by every asset estimate.
//!
//! Assets are processed one after another; the window stages inside each
//! estimate run on the estimator's worker pool.
//!
//! ## Usage Example
//!
//! ```rust
//! use continuous_beta::{AlignmentOffset, ContinuousBetaAnalyzer, EstimatorConfig};
//! use continuous_beta::generators::{generate_intraday_pair, IntradayPairConfig};
//!
//! # fn main() -> Result<(), continuous_beta::ContinuousBetaError> {
//! let pair = generate_intraday_pair(&IntradayPairConfig {
//!     days: 12,
//!     slots_per_day: 4,
//!     ..IntradayPairConfig::default()
//! })?;
//!
//! let config = EstimatorConfig::new(5, 4).with_limit_k(1e3);
//! let mut analyzer = ContinuousBetaAnalyzer::new(config)?;
//! analyzer.set_index_prices(&pair.index.open, &pair.index.close)?;
//! let (open, close) = (&pair.asset.open, &pair.asset.close);
//! analyzer.add_asset("ASSET".to_string(), open, close, AlignmentOffset(0))?;
//!
//! let results = analyzer.analyze_all_assets()?;
//! assert_eq!(results["ASSET"].as_ref().map(|b| b.len()), Ok(7));
//! # Ok(())
//! # }
//! ```

use crate::beta::{AlignmentOffset, BetaSeries};
use crate::config::EstimatorConfig;
use crate::errors::{BetaResult, ContinuousBetaError};
use crate::pipeline::{ContinuousBetaEstimator, PreparedSeries};
use crate::returns::{extract_log_returns, ReturnSeries};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Maximum observations per series (10 million bars)
const MAX_SERIES_OBSERVATIONS: usize = 10_000_000;
/// Maximum observations across all assets
const MAX_TOTAL_OBSERVATIONS: usize = 100_000_000;

#[derive(Debug, Clone)]
struct AssetSeries {
    returns: ReturnSeries,
    offset: AlignmentOffset,
}

fn lock_error(what: &str) -> ContinuousBetaError {
    ContinuousBetaError::NumericalError {
        reason: format!("Failed to acquire lock for {}", what),
    }
}

/// Continuous betas for many assets against one shared index.
#[derive(Debug)]
pub struct ContinuousBetaAnalyzer {
    estimator: ContinuousBetaEstimator,
    /// Index prepared once (shared read-only)
    index: Option<Arc<PreparedSeries>>,
    /// Asset returns and offsets (deterministic ordering)
    assets: Arc<RwLock<BTreeMap<String, AssetSeries>>>,
    /// Last successful estimate per asset
    results: Arc<RwLock<BTreeMap<String, BetaSeries>>>,
}

impl ContinuousBetaAnalyzer {
    /// Analyzer on rayon's global pool.
    pub fn new(config: EstimatorConfig) -> BetaResult<Self> {
        Ok(Self::with_estimator(ContinuousBetaEstimator::new(config)?))
    }

    /// Analyzer around an existing estimator (and its worker pool).
    pub fn with_estimator(estimator: ContinuousBetaEstimator) -> Self {
        Self {
            estimator,
            index: None,
            assets: Arc::new(RwLock::new(BTreeMap::new())),
            results: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// The estimator doing the work.
    pub fn estimator(&self) -> &ContinuousBetaEstimator {
        &self.estimator
    }

    /// Prepare and install the index from open/close prices.
    ///
    /// Replaces any previous index and clears cached results.
    pub fn set_index_prices(&mut self, open: &[f64], close: &[f64]) -> BetaResult<()> {
        let returns = extract_log_returns(open, close, self.estimator.config().slots_per_day)?;
        self.set_index_returns(returns)
    }

    /// Prepare and install the index from precomputed returns.
    pub fn set_index_returns(&mut self, returns: ReturnSeries) -> BetaResult<()> {
        check_series_size(returns.len())?;
        let prepared = self.estimator.prepare_returns(returns)?;
        log::debug!("index prepared with {} windows", prepared.num_windows());
        self.index = Some(Arc::new(prepared));
        self.results.write().map_err(|_| lock_error("results"))?.clear();
        Ok(())
    }

    /// The prepared index, if set.
    pub fn index(&self) -> Option<&PreparedSeries> {
        self.index.as_deref()
    }

    /// Add or replace an asset from open/close prices.
    ///
    /// Returns `true` if the asset is new.
    pub fn add_asset(
        &mut self,
        name: String,
        open: &[f64],
        close: &[f64],
        offset: AlignmentOffset,
    ) -> BetaResult<bool> {
        let returns = extract_log_returns(open, close, self.estimator.config().slots_per_day)?;
        self.add_asset_returns(name, returns, offset)
    }

    /// Add or replace an asset from precomputed returns.
    pub fn add_asset_returns(
        &mut self,
        name: String,
        returns: ReturnSeries,
        offset: AlignmentOffset,
    ) -> BetaResult<bool> {
        check_series_size(returns.len())?;
        let config = self.estimator.config();
        if returns.slots_per_day() != config.slots_per_day {
            return Err(ContinuousBetaError::LayoutMismatch {
                asset: format!("{}x{}", config.window_days, returns.slots_per_day()),
                index: config.layout(),
            });
        }
        offset.to_days(config.slots_per_day)?;

        let mut assets = self.assets.write().map_err(|_| lock_error("assets"))?;
        let old_size = assets.get(&name).map(|a| a.returns.len()).unwrap_or(0);
        let total = assets
            .values()
            .map(|a| a.returns.len())
            .sum::<usize>()
            .saturating_sub(old_size)
            .saturating_add(returns.len());
        if total > MAX_TOTAL_OBSERVATIONS {
            return Err(ContinuousBetaError::InvalidParameter {
                parameter: "total_observations".to_string(),
                value: total as f64,
                constraint: format!(
                    "Maximum {} total observations allowed",
                    MAX_TOTAL_OBSERVATIONS
                ),
            });
        }

        let is_new = assets
            .insert(name.clone(), AssetSeries { returns, offset })
            .is_none();
        drop(assets);

        if !is_new {
            self.results.write().map_err(|_| lock_error("results"))?.remove(&name);
        }
        Ok(is_new)
    }

    /// Remove an asset and its cached result. Returns `true` if it existed.
    pub fn remove_asset(&mut self, name: &str) -> BetaResult<bool> {
        let removed = self
            .assets
            .write()
            .map_err(|_| lock_error("assets"))?
            .remove(name)
            .is_some();
        if removed {
            self.results.write().map_err(|_| lock_error("results"))?.remove(name);
        }
        Ok(removed)
    }

    /// Names of all registered assets, sorted.
    pub fn get_assets(&self) -> BetaResult<Vec<String>> {
        Ok(self
            .assets
            .read()
            .map_err(|_| lock_error("assets"))?
            .keys()
            .cloned()
            .collect())
    }

    /// Estimate one asset against the index and cache the result.
    pub fn analyze_asset(&self, name: &str) -> BetaResult<BetaSeries> {
        let index = self.require_index()?;
        let asset = self
            .assets
            .read()
            .map_err(|_| lock_error("assets"))?
            .get(name)
            .cloned()
            .ok_or_else(|| ContinuousBetaError::SeriesNotFound {
                name: name.to_string(),
            })?;

        let prepared = self.estimator.prepare_returns(asset.returns)?;
        let betas = self.estimator.estimate(&prepared, index, asset.offset)?;

        self.results
            .write()
            .map_err(|_| lock_error("results"))?
            .insert(name.to_string(), betas.clone());
        Ok(betas)
    }

    /// Estimate every asset.
    ///
    /// A failing asset gets its own error entry; the others still run. The
    /// outer error is reserved for a missing index or a poisoned lock.
    pub fn analyze_all_assets(&self) -> BetaResult<BTreeMap<String, BetaResult<BetaSeries>>> {
        self.require_index()?;
        let names = self.get_assets()?;
        log::info!("beta batch started: {} assets", names.len());

        let mut out = BTreeMap::new();
        let mut failed = Vec::new();
        for name in names {
            let result = self.analyze_asset(&name);
            if let Err(e) = &result {
                log::warn!("asset {} failed: {}", name, e);
                failed.push(name.clone());
            }
            out.insert(name, result);
        }

        log::info!(
            "beta batch finished: {} succeeded, {} failed",
            out.len() - failed.len(),
            failed.len()
        );
        Ok(out)
    }

    /// Cached estimate of an asset from the last analysis.
    pub fn get_analysis_results(&self, name: &str) -> BetaResult<BetaSeries> {
        self.results
            .read()
            .map_err(|_| lock_error("results"))?
            .get(name)
            .cloned()
            .ok_or_else(|| ContinuousBetaError::SeriesNotFound {
                name: name.to_string(),
            })
    }

    fn require_index(&self) -> BetaResult<&PreparedSeries> {
        self.index
            .as_deref()
            .ok_or_else(|| ContinuousBetaError::SeriesNotFound {
                name: "index".to_string(),
            })
    }
}

fn check_series_size(len: usize) -> BetaResult<()> {
    if len > MAX_SERIES_OBSERVATIONS {
        return Err(ContinuousBetaError::InvalidParameter {
            parameter: "series_length".to_string(),
            value: len as f64,
            constraint: format!("Maximum {} observations allowed", MAX_SERIES_OBSERVATIONS),
        });
    }
    Ok(())
}
