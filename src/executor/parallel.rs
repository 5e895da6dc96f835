// Copyright 2025 Molscript Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parallel Process Blocks
//!
//! A `parallel` function collects its `process { ... }` blocks as it runs
//! and hands them to the [`ParallelCoordinator`] when the function body
//! finishes. Each block runs on its own fork of the execution context:
//!
//! 1. Fork the context once per block (deep copy, commands deferred)
//! 2. Run every block on the rayon pool, or sequentially below the threshold
//! 3. Wait for all blocks to finish
//! 4. Merge each worker back into the parent in launch order
//!
//! Workers never share a writer, so no locking happens while they run.
//! Merge order is fixed, which makes the observable result independent of
//! which worker finished first.

use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::api::ScriptHost;
use crate::core::{Error, Result};

use super::context::ExecutionContext;

// Default settings - single source of truth for ParallelConfig
pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_MIN_BLOCKS_FOR_PARALLEL: usize = 2;

/// Configuration for parallel execution of process blocks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Whether process blocks may run concurrently
    pub enabled: bool,
    /// Size of the worker pool
    pub max_workers: usize,
    /// Minimum number of blocks to use the pool at all
    pub min_blocks_for_parallel: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_workers: DEFAULT_MAX_WORKERS,
            min_blocks_for_parallel: DEFAULT_MIN_BLOCKS_FOR_PARALLEL,
        }
    }
}

impl ParallelConfig {
    /// Create a new parallel config with custom settings
    pub fn new(enabled: bool, max_workers: usize, min_blocks_for_parallel: usize) -> Self {
        Self {
            enabled,
            max_workers,
            min_blocks_for_parallel,
        }
    }

    /// Create a config that runs every block on the calling thread
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Check if `blocks` process blocks should go to the pool
    #[inline]
    pub fn should_parallelize(&self, blocks: usize) -> bool {
        self.enabled && self.max_workers > 1 && blocks >= self.min_blocks_for_parallel
    }
}

/// Statistics about the last fan-out, for monitoring/debugging
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParallelStats {
    /// Number of blocks launched
    pub blocks: usize,
    /// Number of workers merged back before stopping
    pub merged: usize,
    /// Whether the pool was used
    pub parallel_used: bool,
}

/// Runs process blocks and merges their results
pub struct ParallelCoordinator {
    config: ParallelConfig,
    pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
    stats: Mutex<ParallelStats>,
}

impl std::fmt::Debug for ParallelCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelCoordinator")
            .field("config", &self.config)
            .field("stats", &*self.stats.lock())
            .finish()
    }
}

impl Default for ParallelCoordinator {
    fn default() -> Self {
        Self::new(ParallelConfig::default())
    }
}

impl ParallelCoordinator {
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config,
            pool: Mutex::new(None),
            stats: Mutex::new(ParallelStats::default()),
        }
    }

    #[inline]
    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Statistics of the most recent [`run`](Self::run)
    pub fn stats(&self) -> ParallelStats {
        self.stats.lock().clone()
    }

    /// Pool shared by every fan-out of this coordinator, built on first use
    fn pool(&self) -> Result<Arc<rayon::ThreadPool>> {
        let mut guard = self.pool.lock();
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers.max(1))
            .thread_name(|i| format!("molscript-process-{}", i))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;
        let pool = Arc::new(pool);
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Run every job and wait for all of them. Results come back in launch
    /// order whatever order the workers finished in.
    pub fn execute<J, F>(&self, jobs: Vec<J>, work: F) -> Result<Vec<Result<ExecutionContext>>>
    where
        J: Send,
        F: Fn(usize, J) -> Result<ExecutionContext> + Send + Sync,
    {
        let blocks = jobs.len();
        let parallel = self.config.should_parallelize(blocks);
        tracing::debug!(blocks, parallel, "process fan-out");

        let results = if parallel {
            let pool = self.pool()?;
            pool.install(|| {
                jobs.into_par_iter()
                    .enumerate()
                    .map(|(index, job)| work(index, job))
                    .collect()
            })
        } else {
            jobs.into_iter()
                .enumerate()
                .map(|(index, job)| work(index, job))
                .collect()
        };

        *self.stats.lock() = ParallelStats {
            blocks,
            merged: 0,
            parallel_used: parallel,
        };
        Ok(results)
    }

    /// Merge worker contexts into `parent` in launch order. Stops at the
    /// first failed worker; workers merged before it stay merged.
    pub fn merge(
        &self,
        parent: &mut ExecutionContext,
        results: Vec<Result<ExecutionContext>>,
        host: &dyn ScriptHost,
    ) -> Result<()> {
        for (index, result) in results.into_iter().enumerate() {
            let worker = match result {
                Ok(worker) => worker,
                Err(err) => {
                    tracing::debug!(index, error = %err, "process block failed");
                    return Err(match err {
                        Error::Parallel { .. } => err,
                        other => Error::Parallel {
                            index,
                            message: other.to_string(),
                        },
                    });
                }
            };
            parent.merge(worker, host)?;
            self.stats.lock().merged = index + 1;
            tracing::debug!(index, "process block merged");
        }
        Ok(())
    }

    /// [`execute`](Self::execute) then [`merge`](Self::merge)
    pub fn run<J, F>(
        &self,
        parent: &mut ExecutionContext,
        jobs: Vec<J>,
        host: &dyn ScriptHost,
        work: F,
    ) -> Result<()>
    where
        J: Send,
        F: Fn(usize, J) -> Result<ExecutionContext> + Send + Sync,
    {
        let results = self.execute(jobs, work)?;
        self.merge(parent, results, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NullHost;
    use crate::core::Value;

    fn append_marker(mut ctx: ExecutionContext, marker: i32) -> Result<ExecutionContext> {
        ctx.write_line(format!("marker {}", marker));
        ctx.assign(&format!("m{}", marker), Value::Integer(marker));
        Ok(ctx)
    }

    #[test]
    fn test_config_thresholds() {
        let config = ParallelConfig::default();
        assert!(config.should_parallelize(2));
        assert!(!config.should_parallelize(1));
        assert!(!ParallelConfig::disabled().should_parallelize(100));
        assert!(!ParallelConfig::new(true, 1, 2).should_parallelize(8));
    }

    #[test]
    fn test_merge_in_launch_order() {
        for config in [ParallelConfig::default(), ParallelConfig::disabled()] {
            let coordinator = ParallelCoordinator::new(config);
            let mut parent = ExecutionContext::new();
            let jobs: Vec<(ExecutionContext, i32)> =
                (1..=3).map(|i| (parent.fork(), i)).collect();
            coordinator
                .run(&mut parent, jobs, &NullHost, |_, (ctx, marker)| {
                    append_marker(ctx, marker)
                })
                .unwrap();
            assert_eq!(
                parent.effects().output,
                vec!["marker 1", "marker 2", "marker 3"]
            );
            assert_eq!(parent.get("m2"), Some(&Value::Integer(2)));
            assert_eq!(coordinator.stats().merged, 3);
        }
    }

    #[test]
    fn test_first_error_keeps_earlier_merges() {
        let coordinator = ParallelCoordinator::new(ParallelConfig::default());
        let mut parent = ExecutionContext::new();
        let jobs: Vec<(ExecutionContext, i32)> = (0..4).map(|i| (parent.fork(), i)).collect();
        let err = coordinator
            .run(&mut parent, jobs, &NullHost, |_, (ctx, marker)| {
                if marker == 2 {
                    Err(Error::invalid_argument("boom"))
                } else {
                    append_marker(ctx, marker)
                }
            })
            .unwrap_err();
        assert_eq!(
            err,
            Error::Parallel {
                index: 2,
                message: "invalid argument: boom".to_string()
            }
        );
        assert_eq!(parent.effects().output, vec!["marker 0", "marker 1"]);
        assert!(parent.get("m3").is_none());
    }
}
