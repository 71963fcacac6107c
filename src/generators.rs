//! Synthetic intraday price generators for testing and validation.
//!
//! Produces an index and an asset on a common `days x n` grid with
//!
//! - a U-shaped intraday volatility profile shared by both series,
//! - a continuous asset component `beta * index + idiosyncratic noise`,
//! - independent Poisson-style jumps in each series,
//!
//! so that estimators can be checked against a known continuous beta.
//! Generation is fully determined by the seed.

use crate::errors::{validate_parameter, BetaResult, ContinuousBetaError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the synthetic index/asset pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntradayPairConfig {
    /// Number of trading days
    pub days: usize,
    /// Bars per day
    pub slots_per_day: usize,
    /// Seed for the ChaCha generator
    pub seed: u64,
    /// Continuous beta of the asset on the index
    pub beta: f64,
    /// Daily volatility of the index's continuous component
    pub index_daily_vol: f64,
    /// Daily volatility of the asset's idiosyncratic component
    pub idiosyncratic_daily_vol: f64,
    /// Probability of a jump on any bar, per series
    pub jump_probability: f64,
    /// Standard deviation of jump sizes
    pub jump_scale: f64,
    /// Open/close volatility ratio to midday (1.0 = flat profile)
    pub seasonality: f64,
    /// Price of the first bar's open
    pub start_price: f64,
}

impl Default for IntradayPairConfig {
    fn default() -> Self {
        Self {
            days: 300,
            slots_per_day: 48,
            seed: 42,
            beta: 1.2,
            index_daily_vol: 0.012,
            idiosyncratic_daily_vol: 0.01,
            jump_probability: 0.005,
            jump_scale: 0.02,
            seasonality: 3.0,
            start_price: 100.0,
        }
    }
}

impl IntradayPairConfig {
    fn validate(&self) -> BetaResult<()> {
        if self.days == 0 || self.slots_per_day == 0 {
            return Err(ContinuousBetaError::InvalidParameter {
                parameter: "days x slots_per_day".to_string(),
                value: (self.days * self.slots_per_day) as f64,
                constraint: "both must be at least 1".to_string(),
            });
        }
        validate_parameter(self.beta, -1e3, 1e3, "beta")?;
        validate_parameter(self.index_daily_vol, 0.0, 1.0, "index_daily_vol")?;
        validate_parameter(self.idiosyncratic_daily_vol, 0.0, 1.0, "idiosyncratic_daily_vol")?;
        validate_parameter(self.jump_probability, 0.0, 1.0, "jump_probability")?;
        validate_parameter(self.jump_scale, 0.0, 1.0, "jump_scale")?;
        validate_parameter(self.seasonality, 1.0, 100.0, "seasonality")?;
        validate_parameter(self.start_price, f64::MIN_POSITIVE, f64::MAX, "start_price")?;
        Ok(())
    }
}

/// Open and close prices of consecutive bars.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyntheticPrices {
    /// Bar open prices
    pub open: Vec<f64>,
    /// Bar close prices
    pub close: Vec<f64>,
}

impl SyntheticPrices {
    fn from_returns(returns: &[f64], start_price: f64) -> Self {
        let mut open = Vec::with_capacity(returns.len());
        let mut close = Vec::with_capacity(returns.len());
        let mut price = start_price;
        for &r in returns {
            open.push(price);
            price *= r.exp();
            close.push(price);
        }
        Self { open, close }
    }
}

/// Generated index and asset with their true log returns.
#[derive(Debug, Clone, PartialEq)]
pub struct IntradayPair {
    /// Benchmark prices
    pub index: SyntheticPrices,
    /// Asset prices
    pub asset: SyntheticPrices,
    /// Index log returns including jumps
    pub index_returns: Vec<f64>,
    /// Asset log returns including jumps
    pub asset_returns: Vec<f64>,
    /// Bars that carry an index jump
    pub index_jumps: Vec<usize>,
    /// Bars that carry an asset jump
    pub asset_jumps: Vec<usize>,
}

/// Intraday variance weights with mean one: `seasonality` at the open and close, 1 at midday.
pub fn u_shaped_profile(slots_per_day: usize, seasonality: f64) -> Vec<f64> {
    if slots_per_day == 0 {
        return Vec::new();
    }
    let mid = (slots_per_day as f64 - 1.0) / 2.0;
    let raw: Vec<f64> = (0..slots_per_day)
        .map(|t| {
            let x = if mid > 0.0 { (t as f64 - mid) / mid } else { 0.0 };
            1.0 + (seasonality - 1.0) * x * x
        })
        .collect();
    let mean = raw.iter().sum::<f64>() / slots_per_day as f64;
    raw.into_iter().map(|w| w / mean).collect()
}

/// Generate a seeded index/asset pair.
pub fn generate_intraday_pair(config: &IntradayPairConfig) -> BetaResult<IntradayPair> {
    config.validate()?;

    let n = config.slots_per_day;
    let total = config.days * n;
    let profile = u_shaped_profile(n, config.seasonality);
    let per_bar = 1.0 / (n as f64).sqrt();
    let jump_dist = Normal::new(0.0, config.jump_scale.max(f64::MIN_POSITIVE)).map_err(|e| {
        ContinuousBetaError::InvalidParameter {
            parameter: "jump_scale".to_string(),
            value: config.jump_scale,
            constraint: e.to_string(),
        }
    })?;

    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
    let mut index_returns = Vec::with_capacity(total);
    let mut asset_returns = Vec::with_capacity(total);
    let mut index_jumps = Vec::new();
    let mut asset_jumps = Vec::new();

    for i in 0..total {
        let scale = per_bar * profile[i % n].sqrt();
        let z_index: f64 = StandardNormal.sample(&mut rng);
        let z_idio: f64 = StandardNormal.sample(&mut rng);

        let index_continuous = config.index_daily_vol * scale * z_index;
        let mut index_r = index_continuous;
        let mut asset_r =
            config.beta * index_continuous + config.idiosyncratic_daily_vol * scale * z_idio;

        if rng.gen_bool(config.jump_probability) {
            index_r += jump_dist.sample(&mut rng);
            index_jumps.push(i);
        }
        if rng.gen_bool(config.jump_probability) {
            asset_r += jump_dist.sample(&mut rng);
            asset_jumps.push(i);
        }

        index_returns.push(index_r);
        asset_returns.push(asset_r);
    }

    Ok(IntradayPair {
        index: SyntheticPrices::from_returns(&index_returns, config.start_price),
        asset: SyntheticPrices::from_returns(&asset_returns, config.start_price),
        index_returns,
        asset_returns,
        index_jumps,
        asset_jumps,
    })
}
