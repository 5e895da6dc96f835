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

//! Script Executor
//!
//! This module runs compiled programs.
//!
//! # Architecture
//!
//! ```text
//! Interpreter (statement list, program counter, jump targets)
//!   ↓
//! RpnProcessor (math in source order, short-circuit, lazy ternary)
//!   ↓                         ↘
//! ops (operator semantics)    evaluate_selection (postfix set algebra)
//!                               ↓
//!                             ScriptHost (named sets, residues, within)
//! ```
//!
//! # Components
//!
//! - [`Interpreter`] - Statement executor, try/catch and user functions
//! - [`RpnProcessor`] - Expression evaluator
//! - [`ExecutionContext`] - Variables, scopes, frames and side effects
//! - [`ParallelCoordinator`] - Runs `process` blocks and merges them back

pub mod context;
pub mod interpreter;
pub mod ops;
pub mod parallel;
pub mod rpn;
pub mod selection;

pub use context::{ExecutionContext, Frame, HostCall, SideEffects};
pub use interpreter::{Flow, Interpreter, Runtime};
pub use parallel::{ParallelConfig, ParallelCoordinator, ParallelStats};
pub use rpn::{evaluate, EvalEnv, RpnProcessor};
pub use selection::evaluate_selection;
