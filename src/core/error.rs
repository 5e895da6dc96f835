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

//! Error types for molscript
//!
//! Runtime failures raised while executing a compiled program. Compile
//! failures have their own type, [`crate::parser::CompileError`], and are
//! wrapped here only when they surface through the engine API.

use thiserror::Error;

use crate::parser::CompileError;

/// Result type alias for molscript operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main runtime error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Evaluation errors
    // =========================================================================
    /// Operator applied to operands it has no meaning for
    #[error("type mismatch: {left} {op} {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    /// Invalid argument for an operator or function
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed compiled input left the operand stack empty
    #[error("stack underflow evaluating {0}")]
    StackUnderflow(String),

    /// Expression ended while operands or operators were still pending
    #[error("end of expression expected")]
    EndOfExpression,

    /// Token that cannot appear where the evaluator found it
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    // =========================================================================
    // Variable and function errors
    // =========================================================================
    /// Variable referenced before any assignment
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// Function called that is neither user-defined nor registered
    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    /// Function called with the wrong number of arguments
    #[error("bad argument count for {name}: expected {expected}, got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },

    /// Recursion limit reached
    #[error("maximum call depth {0} exceeded")]
    CallDepthExceeded(usize),

    /// Failure reported by a builtin handler
    #[error("{name}: {message}")]
    Builtin { name: String, message: String },

    // =========================================================================
    // Host errors
    // =========================================================================
    /// Failure reported by the host application
    #[error("host error: {0}")]
    Host(String),

    // =========================================================================
    // Parallel errors
    // =========================================================================
    /// A parallel worker failed
    #[error("process {index} failed: {message}")]
    Parallel { index: usize, message: String },

    /// The worker pool could not be built
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    // =========================================================================
    // Compilation errors
    // =========================================================================
    #[error("{0}")]
    Compile(#[from] CompileError),
}

impl Error {
    /// Create a type mismatch error
    pub fn type_mismatch(op: impl Into<String>, left: &str, right: &str) -> Self {
        Error::TypeMismatch {
            op: op.into(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a builtin failure
    pub fn builtin(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Builtin {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether a script `catch` may intercept this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::StackUnderflow(_) | Error::Compile(_) | Error::ThreadPool(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::type_mismatch("+", "integer", "point");
        assert_eq!(err.to_string(), "type mismatch: integer + point");

        let err = Error::ArityMismatch {
            name: "f".to_string(),
            expected: "0".to_string(),
            got: 1,
        };
        assert_eq!(
            err.to_string(),
            "bad argument count for f: expected 0, got 1"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::UndefinedVariable("x".into()).is_recoverable());
        assert!(Error::Host("boom".into()).is_recoverable());
        assert!(!Error::StackUnderflow("+".into()).is_recoverable());
    }
}
