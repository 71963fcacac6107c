//! # Estimator Configuration
//!
//! Configuration structures threaded explicitly through every component:
//! rolling window length `L`, intraday slot count `n`, the truncation constant
//! `limitK`, the failure policy for degenerate windows, and worker pool sizing.

use crate::errors::{validate_parameter, BetaResult, ContinuousBetaError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default rolling window: one trading year.
pub const DEFAULT_WINDOW_DAYS: usize = 244;
/// Default intraday slots per day.
pub const DEFAULT_SLOTS_PER_DAY: usize = 48;
/// Default scale `c` in `limitK = c * n^p`.
pub const DEFAULT_LIMIT_K_SCALE: f64 = 2.5;
/// Default exponent `p` in `limitK = c * n^p`.
pub const DEFAULT_LIMIT_K_EXPONENT: f64 = -0.49;

/// Environment variable overriding the worker thread count.
pub const THREADS_ENV_VAR: &str = "CONTINUOUS_BETA_THREADS";
/// Environment variable overriding the worker stack size in bytes.
pub const STACK_SIZE_ENV_VAR: &str = "CONTINUOUS_BETA_STACK_SIZE";

/// How the truncation constant `limitK` is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LimitK {
    /// Derived from the slot count as `scale * n^exponent`
    Derived {
        /// Scale `c`
        scale: f64,
        /// Exponent `p`
        exponent: f64,
    },
    /// Fixed value, independent of `n`
    Explicit(f64),
}

impl Default for LimitK {
    fn default() -> Self {
        LimitK::Derived {
            scale: DEFAULT_LIMIT_K_SCALE,
            exponent: DEFAULT_LIMIT_K_EXPONENT,
        }
    }
}

/// What to do when a rolling window's truncation degenerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FailurePolicy {
    /// Record the failure against the affected window; other windows still succeed
    #[default]
    PerWindow,
    /// Abort the whole series at the first degenerate window
    FailFast,
}

/// Parameters of the continuous beta estimator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EstimatorConfig {
    /// Rolling window length in days (`L`)
    pub window_days: usize,
    /// Intraday slots per day (`n`)
    pub slots_per_day: usize,
    /// Truncation constant source
    pub limit_k: LimitK,
    /// Degenerate window handling
    pub failure_policy: FailurePolicy,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            slots_per_day: DEFAULT_SLOTS_PER_DAY,
            limit_k: LimitK::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl EstimatorConfig {
    /// Configuration with the given window length and slot count, default `limitK`.
    pub fn new(window_days: usize, slots_per_day: usize) -> Self {
        Self {
            window_days,
            slots_per_day,
            ..Self::default()
        }
    }

    /// Derive `limitK` as `scale * n^exponent`.
    pub fn with_limit_k_params(mut self, scale: f64, exponent: f64) -> Self {
        self.limit_k = LimitK::Derived { scale, exponent };
        self
    }

    /// Use a fixed `limitK`.
    pub fn with_limit_k(mut self, limit_k: f64) -> Self {
        self.limit_k = LimitK::Explicit(limit_k);
        self
    }

    /// Set the degenerate window policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> BetaResult<()> {
        if self.window_days == 0 {
            return Err(ContinuousBetaError::InvalidParameter {
                parameter: "window_days".to_string(),
                value: 0.0,
                constraint: "must be at least 1".to_string(),
            });
        }
        if self.slots_per_day == 0 {
            return Err(ContinuousBetaError::InvalidParameter {
                parameter: "slots_per_day".to_string(),
                value: 0.0,
                constraint: "must be at least 1".to_string(),
            });
        }
        match self.limit_k {
            LimitK::Derived { scale, exponent } => {
                validate_parameter(scale, f64::MIN_POSITIVE, f64::MAX, "limit_k_scale")?;
                validate_parameter(exponent, f64::MIN, f64::MAX, "limit_k_exponent")?;
            }
            LimitK::Explicit(value) => {
                validate_parameter(value, f64::MIN_POSITIVE, f64::MAX, "limit_k")?;
            }
        }
        let limit_k = self.limit_k();
        if !limit_k.is_finite() || limit_k <= 0.0 {
            return Err(ContinuousBetaError::InvalidParameter {
                parameter: "limit_k".to_string(),
                value: limit_k,
                constraint: "must be finite and positive".to_string(),
            });
        }
        Ok(())
    }

    /// The truncation constant `limitK`.
    pub fn limit_k(&self) -> f64 {
        match self.limit_k {
            LimitK::Derived { scale, exponent } => {
                scale * (self.slots_per_day as f64).powf(exponent)
            }
            LimitK::Explicit(value) => value,
        }
    }

    /// Observations in one rolling window (`L * n`).
    pub fn window_len(&self) -> usize {
        self.window_days * self.slots_per_day
    }

    /// Fewest observations that yield one valid window (`L * n + n`).
    pub fn min_observations(&self) -> usize {
        self.window_len() + self.slots_per_day
    }

    /// Number of valid window starts for a series of `len` observations.
    pub fn valid_windows(&self, len: usize) -> usize {
        if self.slots_per_day == 0 {
            return 0;
        }
        (len / self.slots_per_day).saturating_sub(self.window_days)
    }

    /// Short `L x n` description used in error messages.
    pub fn layout(&self) -> String {
        format!("{}x{}", self.window_days, self.slots_per_day)
    }
}

/// Worker pool sizing for the window scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulerConfig {
    /// Worker threads; `None` uses the number of logical CPUs
    pub num_threads: Option<usize>,
    /// Worker stack size in bytes; `None` keeps the rayon default
    pub stack_size: Option<usize>,
}

impl SchedulerConfig {
    /// Fixed number of worker threads.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            stack_size: None,
        }
    }

    /// Read `CONTINUOUS_BETA_THREADS` and `CONTINUOUS_BETA_STACK_SIZE`.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with variables read through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |name: &str| {
            lookup(name)
                .and_then(|s| s.trim().parse::<usize>().ok())
                .filter(|&v| v > 0)
        };
        Self {
            num_threads: parse(THREADS_ENV_VAR),
            stack_size: parse(STACK_SIZE_ENV_VAR),
        }
    }

    /// Thread count that will actually be used.
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_limit_k_matches_formula() {
        let config = EstimatorConfig::default();
        assert_eq!(config.window_days, 244);
        assert_eq!(config.slots_per_day, 48);
        assert_approx_eq!(config.limit_k(), 2.5 * 48f64.powf(-0.49), 1e-15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_limit_k_overrides_derivation() {
        let config = EstimatorConfig::new(1, 2).with_limit_k(100.0);
        assert_eq!(config.limit_k(), 100.0);

        let config = EstimatorConfig::new(5, 8).with_limit_k_params(3.0, -0.5);
        assert_approx_eq!(config.limit_k(), 3.0 / 8f64.sqrt(), 1e-15);
    }

    #[test]
    fn test_window_arithmetic() {
        let config = EstimatorConfig::new(3, 4);
        assert_eq!(config.window_len(), 12);
        assert_eq!(config.min_observations(), 16);
        assert_eq!(config.valid_windows(12), 0);
        assert_eq!(config.valid_windows(16), 1);
        assert_eq!(config.valid_windows(40), 7);
        assert_eq!(config.valid_windows(0), 0);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(EstimatorConfig::new(0, 48).validate().is_err());
        assert!(EstimatorConfig::new(10, 0).validate().is_err());
        assert!(EstimatorConfig::new(10, 48).with_limit_k(0.0).validate().is_err());
        assert!(EstimatorConfig::new(10, 48).with_limit_k(f64::NAN).validate().is_err());
        assert!(EstimatorConfig::new(10, 48)
            .with_limit_k_params(-2.5, -0.49)
            .validate()
            .is_err());
    }

    #[test]
    fn test_scheduler_threads() {
        assert_eq!(SchedulerConfig::with_threads(3).effective_threads(), 3);
        assert_eq!(SchedulerConfig::with_threads(0).effective_threads(), 1);
        assert!(SchedulerConfig::default().effective_threads() >= 1);
    }

    #[test]
    fn test_scheduler_config_from_vars() {
        let vars = |threads: &'static str, stack: &'static str| {
            move |name: &str| match name {
                THREADS_ENV_VAR => Some(threads.to_string()),
                STACK_SIZE_ENV_VAR => Some(stack.to_string()),
                _ => None,
            }
        };

        let config = SchedulerConfig::from_vars(vars(" 3 ", "4194304"));
        assert_eq!(config.num_threads, Some(3));
        assert_eq!(config.stack_size, Some(4_194_304));
        assert_eq!(config.effective_threads(), 3);

        // Zero and unparsable values fall back to the defaults
        let config = SchedulerConfig::from_vars(vars("0", "lots"));
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.effective_threads(), num_cpus::get().max(1));

        assert_eq!(SchedulerConfig::from_vars(|_| None), SchedulerConfig::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_serde_round_trip() {
        let config = EstimatorConfig::new(20, 8)
            .with_limit_k(4.0)
            .with_failure_policy(FailurePolicy::FailFast);
        let json = serde_json::to_string(&config).unwrap();
        let restored: EstimatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
