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

//! Top-level Engine API
//!
//! This module provides the embedding interface for molscript.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use molscript::{BitSet, Engine, EngineConfig, ScriptHost};
//!
//! struct Atoms;
//!
//! impl ScriptHost for Atoms {
//!     fn universe_size(&self) -> u32 {
//!         10
//!     }
//!
//!     fn named_set(&self, name: &str) -> Option<BitSet> {
//!         (name == "carbon").then(|| BitSet::from_range(0, 5))
//!     }
//! }
//!
//! let mut engine = Engine::with_host(Arc::new(Atoms), EngineConfig::default());
//! let out = engine.execute("select not carbon").unwrap();
//! assert_eq!(out.commands[0].name, "select");
//! assert_eq!(out.commands[0].args[0].to_string(), "({6:9})");
//! ```
//!
//! # Host Commands
//!
//! Commands without engine semantics (`select`, `color`, `zoom`, `load`,
//! ...) reach [`ScriptHost::command`] with their arguments evaluated, and
//! are also listed in [`RunOutput::commands`].

pub mod config;
pub mod engine;
pub mod host;

pub use config::{EngineConfig, DEFAULT_MAX_CALL_DEPTH};
pub use engine::{Engine, RunOutput};
pub use host::{NullHost, ScriptHost};
