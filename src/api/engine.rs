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

//! Engine struct and operations
//!
//! The embedding entry point: compile scripts, run them against a host and
//! keep global variables, named sets and user functions between runs.
//!
//! # Examples
//!
//! ```
//! use molscript::{Engine, EngineConfig, Value};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//!
//! let out = engine.execute("for (var i = 1; i <= 3; i++) { print i * i }").unwrap();
//! assert_eq!(out.output, vec!["1", "4", "9"]);
//!
//! engine.set_global("n", Value::Integer(6));
//! assert_eq!(engine.evaluate("n * 7").unwrap(), Value::Integer(42));
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::common::{version, version_info};
use crate::core::{BitSet, Error, Result, Value};
use crate::executor::{
    ExecutionContext, Flow, HostCall, Interpreter, ParallelCoordinator, ParallelStats, Runtime,
};
use crate::functions::FunctionRegistry;
use crate::parser::{self, Program, ScriptFunction};

use super::config::EngineConfig;
use super::host::{NullHost, ScriptHost};

/// What one run produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    /// Lines written by `print`, `log`, `echo` and `message`
    pub output: Vec<String>,
    /// Host commands in issue order
    pub commands: Vec<HostCall>,
    /// Value of a top-level `return`
    pub value: Option<Value>,
    /// The script stopped with `exit` or `quit`
    pub exited: bool,
}

/// A script engine bound to one host
pub struct Engine {
    config: EngineConfig,
    host: Arc<dyn ScriptHost>,
    registry: FunctionRegistry,
    coordinator: ParallelCoordinator,
    /// User functions from every program run so far
    functions: FxHashMap<String, Arc<ScriptFunction>>,
    /// Globals and named sets carried between runs
    ctx: ExecutionContext,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("globals", &self.ctx.globals().len())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Engine with a [`NullHost`]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_host(Arc::new(NullHost), config)
    }

    pub fn with_host(host: Arc<dyn ScriptHost>, config: EngineConfig) -> Self {
        tracing::debug!(version = version_info(), "engine created");
        Self {
            coordinator: ParallelCoordinator::new(config.parallel.clone()),
            config,
            host,
            registry: FunctionRegistry::new(),
            functions: FxHashMap::default(),
            ctx: base_context(),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.host
    }

    /// Compile a script without running it
    pub fn compile(&self, script: &str) -> Result<Program> {
        parser::compile(script).map_err(|err| {
            tracing::debug!(line = err.line, error = %err, "compile failed");
            Error::from(err)
        })
    }

    /// Run a compiled program. Functions it defines stay available to
    /// later runs, as do its globals and named sets.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.len()))]
    pub fn run(&mut self, program: &Program) -> Result<RunOutput> {
        for (name, function) in &program.functions {
            self.functions.insert(name.clone(), function.clone());
        }
        let runtime = Runtime {
            functions: &self.functions,
            host: self.host.as_ref(),
            registry: &self.registry,
            config: &self.config,
            coordinator: &self.coordinator,
        };
        let mut interpreter = Interpreter::new(runtime, std::mem::take(&mut self.ctx));
        let result = interpreter.run(&program.statements);
        let mut ctx = interpreter.into_context();
        let effects = ctx.take_effects();
        self.ctx = ctx;

        let flow = result?;
        let (value, exited) = match flow {
            Flow::Normal => (None, false),
            Flow::Return(value) => (Some(value), false),
            Flow::Exit => (None, true),
        };
        Ok(RunOutput {
            output: effects.output,
            commands: effects.commands,
            value,
            exited,
        })
    }

    /// Compile and run a script
    pub fn execute(&mut self, script: &str) -> Result<RunOutput> {
        let program = self.compile(script)?;
        self.run(&program)
    }

    /// Evaluate one math expression against the current globals
    pub fn evaluate(&mut self, expression: &str) -> Result<Value> {
        let program = self.compile(&format!("return {}", expression))?;
        Ok(self.run(&program)?.value.unwrap_or_default())
    }

    // =========================================================================
    // State
    // =========================================================================

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.ctx.assign_global(name, value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.ctx.global(name)
    }

    /// Set bound by `define`
    pub fn defined_set(&self, name: &str) -> Option<&BitSet> {
        self.ctx.defined(name)
    }

    pub fn function(&self, name: &str) -> Option<&Arc<ScriptFunction>> {
        self.functions.get(name.to_ascii_lowercase().as_str())
    }

    /// Forget globals, named sets and user functions
    pub fn reset(&mut self) {
        self.ctx = base_context();
        self.functions.clear();
    }

    #[inline]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Registry for adding or removing builtins
    #[inline]
    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    /// Statistics of the most recent process fan-out
    pub fn parallel_stats(&self) -> ParallelStats {
        self.coordinator.stats()
    }
}

/// Fresh context holding the `_version` global
fn base_context() -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    ctx.assign_global("_version", Value::string(version()));
    ctx
}
