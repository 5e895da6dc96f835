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

//! Script compiler
//!
//! This module turns script text into a [`Program`]:
//!
//! - [`lexer`] - Statement-aware tokenizer
//! - [`expressions`] - Math normalization, brace classification and
//!   selection expressions compiled to postfix
//! - [`statements`] - Per-command statement shapes
//! - [`flow`] - Jump targets, break/continue and function extraction
//! - [`compiler`] - The driver tying them together
//!
//! # Example
//!
//! ```
//! use molscript::parser::{compile, Tok};
//!
//! let program = compile("for (var i = 0; i < 3; i++) { print i }").unwrap();
//! assert_eq!(program.statements[0].tok(), Tok::For);
//! ```

pub mod compiler;
pub mod error;
pub mod expressions;
pub mod flow;
pub mod lexer;
pub mod precedence;
pub mod program;
pub mod statements;
pub mod token;

pub use compiler::compile;
pub use error::{CompileError, CompileErrorKind};
pub use precedence::Precedence;
pub use program::{FunctionKind, Program, ScriptFunction, Statement};
pub use token::{
    Comparison, ComparatorSpec, FlowKind, ImplicitString, ResidueSpec, Tok, Token, TokenValue,
};
