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

//! # Molscript - embeddable command-script engine
//!
//! Molscript compiles and runs the command scripts of molecular
//! visualization programs: flow control, user functions, math over
//! numbers, strings, points, matrices, arrays and maps, and atom selection
//! expressions evaluated as set algebra against a host application.
//!
//! ## Key Features
//!
//! - **One-pass compiler** - Statement-aware lexer, math kept in source
//!   order, selection expressions compiled to postfix, jump targets patched
//!   in by a flow resolver
//! - **RPN evaluator** - Runtime shunting-yard with short-circuit `and`/`or`
//!   and a lazy ternary
//! - **Structured errors** - Compile errors with a marked statement;
//!   runtime errors a script can `catch`
//! - **Parallel functions** - `process` blocks run on a Rayon pool and merge
//!   back in launch order
//!
//! ## Quick Start
//!
//! ```rust
//! use molscript::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! let out = engine
//!     .execute("function sq(x) { return x * x }\nprint sq(12)")
//!     .unwrap();
//! assert_eq!(out.output, vec!["144"]);
//! ```
//!
//! ## Modules
//!
//! - [`api`] - Public engine interface ([`Engine`], [`ScriptHost`])
//! - [`core`] - Core types ([`Value`], [`BitSet`], [`Error`])
//! - [`parser`] - Script compiler ([`compile`], [`Program`])
//! - [`executor`] - Interpreter, RPN evaluator and parallel coordinator
//! - [`functions`] - Builtin functions
//! - [`common`] - Version information

pub mod api;
pub mod common;
pub mod core;
pub mod executor;
pub mod functions;
pub mod parser;

// Re-export main types for convenience
pub use core::{BitSet, Error, Matrix3, Matrix4, Point3, Point4, Result, Value};

// Re-export compiler types
pub use parser::{compile, CompileError, CompileErrorKind, Program, ScriptFunction, Statement};

// Re-export function types
pub use functions::{BuiltinFunction, FunctionInfo, FunctionRegistry};

// Re-export executor types
pub use executor::{
    ExecutionContext, HostCall, ParallelConfig, ParallelCoordinator, ParallelStats, SideEffects,
};

// Re-export API types
pub use api::{Engine, EngineConfig, NullHost, RunOutput, ScriptHost};
