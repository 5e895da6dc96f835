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

//! Engine configuration

use crate::executor::ParallelConfig;

/// Default recursion limit for user functions
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Configuration options for an [`Engine`](super::Engine)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How `process` blocks of parallel functions are run
    /// Default: enabled, 4 workers, at least 2 blocks
    pub parallel: ParallelConfig,

    /// Maximum nesting of user function calls
    /// Default: 512
    pub max_call_depth: usize,

    /// Emit a trace event with the evaluator stacks at every token
    /// Default: false
    pub log_rpn: bool,

    /// Size of the selectable universe. When unset the host decides.
    /// Default: None
    pub universe_size: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: ParallelConfig::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            log_rpn: false,
            universe_size: None,
        }
    }
}

impl EngineConfig {
    /// Creates a new EngineConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the parallel configuration
    pub fn with_parallel(mut self, config: ParallelConfig) -> Self {
        self.parallel = config;
        self
    }

    /// Builder method to set the recursion limit
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Builder method to enable/disable RPN stack dumps
    pub fn with_rpn_logging(mut self, enabled: bool) -> Self {
        self.log_rpn = enabled;
        self
    }

    /// Builder method to fix the universe size instead of asking the host
    pub fn with_universe_size(mut self, size: u32) -> Self {
        self.universe_size = Some(size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_call_depth, 512);
        assert!(!config.log_rpn);
        assert!(config.universe_size.is_none());
        assert!(config.parallel.enabled);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new()
            .with_parallel(ParallelConfig::disabled())
            .with_max_call_depth(64)
            .with_rpn_logging(true)
            .with_universe_size(100);

        assert!(!config.parallel.enabled);
        assert_eq!(config.max_call_depth, 64);
        assert!(config.log_rpn);
        assert_eq!(config.universe_size, Some(100));
    }
}
