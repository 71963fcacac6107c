//! Bulk-synchronous window scheduler.
//!
//! Every estimator stage is a pure function of an output index (a day or a
//! window start) over read-only inputs. [`WindowScheduler`] fans those
//! indices out over a bounded rayon pool and returns the complete, index-ordered
//! output table. A call returns only after every task of the stage finished,
//! which is the barrier the next stage relies on.

use crate::config::SchedulerConfig;
use crate::errors::BetaResult;
#[cfg(feature = "parallel")]
use crate::errors::ContinuousBetaError;
use std::fmt;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

enum ExecutionMode {
    Sequential,
    #[cfg(feature = "parallel")]
    GlobalPool,
    #[cfg(feature = "parallel")]
    Dedicated(rayon::ThreadPool),
}

/// Fan-out/fan-in driver for the estimator stages.
pub struct WindowScheduler {
    mode: ExecutionMode,
}

impl fmt::Debug for WindowScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.mode {
            ExecutionMode::Sequential => "sequential",
            #[cfg(feature = "parallel")]
            ExecutionMode::GlobalPool => "global-pool",
            #[cfg(feature = "parallel")]
            ExecutionMode::Dedicated(_) => "dedicated-pool",
        };
        f.debug_struct("WindowScheduler")
            .field("mode", &mode)
            .field("threads", &self.num_threads())
            .finish()
    }
}

impl Default for WindowScheduler {
    fn default() -> Self {
        Self::global()
    }
}

impl WindowScheduler {
    /// Scheduler with its own pool sized from `config`.
    ///
    /// Without the `parallel` feature this is always sequential.
    pub fn new(config: &SchedulerConfig) -> BetaResult<Self> {
        #[cfg(feature = "parallel")]
        {
            let threads = config.effective_threads();
            if threads == 1 {
                return Ok(Self::sequential());
            }
            let mut builder = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("continuous-beta-{}", i));
            if let Some(size) = config.stack_size {
                builder = builder.stack_size(size);
            }
            let pool = builder
                .build()
                .map_err(|e| ContinuousBetaError::ThreadPoolError {
                    reason: e.to_string(),
                })?;
            Ok(Self {
                mode: ExecutionMode::Dedicated(pool),
            })
        }

        #[cfg(not(feature = "parallel"))]
        {
            let _ = config;
            Ok(Self::sequential())
        }
    }

    /// Scheduler sized from `CONTINUOUS_BETA_THREADS`, falling back to the global pool.
    pub fn from_env() -> Self {
        let config = SchedulerConfig::from_env();
        if config.num_threads.is_none() && config.stack_size.is_none() {
            return Self::global();
        }
        Self::new(&config).unwrap_or_else(|e| {
            log::warn!("Falling back to global worker pool: {}", e);
            Self::global()
        })
    }

    /// Scheduler sharing rayon's global pool.
    pub fn global() -> Self {
        #[cfg(feature = "parallel")]
        {
            Self {
                mode: ExecutionMode::GlobalPool,
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            Self::sequential()
        }
    }

    /// Scheduler that runs every task on the calling thread.
    pub fn sequential() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
        }
    }

    /// Worker threads available to a stage.
    pub fn num_threads(&self) -> usize {
        match &self.mode {
            ExecutionMode::Sequential => 1,
            #[cfg(feature = "parallel")]
            ExecutionMode::GlobalPool => rayon::current_num_threads(),
            #[cfg(feature = "parallel")]
            ExecutionMode::Dedicated(pool) => pool.current_num_threads(),
        }
    }

    /// Compute `f(i)` for every `i` in `0..len` and return the outputs in index order.
    pub fn run_stage<T, F>(&self, stage: &str, len: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        let started = Instant::now();
        let out: Vec<T> = match &self.mode {
            ExecutionMode::Sequential => (0..len).map(&f).collect(),
            #[cfg(feature = "parallel")]
            ExecutionMode::GlobalPool => (0..len).into_par_iter().map(&f).collect(),
            #[cfg(feature = "parallel")]
            ExecutionMode::Dedicated(pool) => {
                pool.install(|| (0..len).into_par_iter().map(&f).collect())
            }
        };
        log::debug!(
            "{} stage: {} tasks in {:.3}s",
            stage,
            len,
            started.elapsed().as_secs_f64()
        );
        out
    }

    /// Like [`run_stage`](Self::run_stage) but stops at the first failing task.
    ///
    /// Remaining tasks of the stage are abandoned and the error is returned
    /// instead of a partial table.
    pub fn try_run_stage<T, F>(&self, stage: &str, len: usize, f: F) -> BetaResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> BetaResult<T> + Sync + Send,
    {
        let started = Instant::now();
        let out: BetaResult<Vec<T>> = match &self.mode {
            ExecutionMode::Sequential => (0..len).map(&f).collect(),
            #[cfg(feature = "parallel")]
            ExecutionMode::GlobalPool => (0..len).into_par_iter().map(&f).collect(),
            #[cfg(feature = "parallel")]
            ExecutionMode::Dedicated(pool) => {
                pool.install(|| (0..len).into_par_iter().map(&f).collect())
            }
        };
        log::debug!(
            "{} stage ({}): {} tasks in {:.3}s",
            stage,
            if out.is_ok() { "ok" } else { "aborted" },
            len,
            started.elapsed().as_secs_f64()
        );
        out
    }
}
