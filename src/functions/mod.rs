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

//! Builtin Function System
//!
//! Scripts call two kinds of function: user functions compiled from the
//! script itself, and builtins looked up here by name. This module provides:
//!
//! - [`BuiltinFunction`] - Trait implemented by each builtin
//! - [`FunctionInfo`] - Name, description and arity of a builtin
//! - [`FunctionRegistry`] - Name to `(min, max, handler)` dispatch table

pub mod builtins;
pub mod registry;

pub use registry::{BuiltinHandler, FunctionRegistry};

use crate::api::ScriptHost;
use crate::core::{Error, Result, Value};

/// Arity value meaning "any number of arguments"
pub const VARIADIC: usize = usize::MAX;

/// Function information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    /// Lowercased function name
    pub name: String,
    /// Description
    pub description: String,
    /// Minimum number of arguments
    pub min_args: usize,
    /// Maximum number of arguments, or [`VARIADIC`]
    pub max_args: usize,
}

impl FunctionInfo {
    /// Create a new function info
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        min_args: usize,
        max_args: usize,
    ) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            description: description.into(),
            min_args,
            max_args,
        }
    }

    /// Get the function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn is_variadic(&self) -> bool {
        self.max_args == VARIADIC
    }

    /// Validate argument count
    pub fn check_arity(&self, count: usize) -> Result<()> {
        if count >= self.min_args && count <= self.max_args {
            return Ok(());
        }
        let expected = if self.min_args == self.max_args {
            self.min_args.to_string()
        } else if self.is_variadic() {
            format!("at least {}", self.min_args)
        } else {
            format!("{} to {}", self.min_args, self.max_args)
        };
        Err(Error::ArityMismatch {
            name: self.name.clone(),
            expected,
            got: count,
        })
    }
}

/// Trait for builtin functions
///
/// Implementations receive arguments that are already evaluated and already
/// checked against [`FunctionInfo::min_args`] and [`FunctionInfo::max_args`].
pub trait BuiltinFunction: Send + Sync {
    /// Get the function name
    fn name(&self) -> &str;

    /// Get function information
    fn info(&self) -> FunctionInfo;

    /// Evaluate the function. `host` is the embedding application, for
    /// builtins that need domain data.
    fn evaluate(&self, args: &[Value], host: &dyn ScriptHost) -> Result<Value>;
}

/// Read a numeric argument
pub(crate) fn number_arg(name: &str, args: &[Value], i: usize) -> Result<f64> {
    match args.get(i) {
        Some(v @ (Value::Integer(_) | Value::Float(_) | Value::Boolean(_))) => Ok(v.as_float()),
        Some(v @ Value::String(_)) => {
            let f = v.as_float();
            if f.is_nan() {
                Err(Error::builtin(name, format!("not a number: {}", v.escape())))
            } else {
                Ok(f)
            }
        }
        Some(v) => Err(Error::builtin(
            name,
            format!("argument {} must be a number, not {}", i + 1, v.type_name()),
        )),
        None => Err(Error::builtin(name, format!("missing argument {}", i + 1))),
    }
}

/// Read a point argument
pub(crate) fn point_arg(name: &str, args: &[Value], i: usize) -> Result<crate::core::Point3> {
    args.get(i).and_then(Value::as_point).ok_or_else(|| {
        Error::builtin(
            name,
            format!(
                "argument {} must be a point, not {}",
                i + 1,
                args.get(i).map_or("nothing", Value::type_name)
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_arity() {
        let info = FunctionInfo::new("Point", "Creates a point", 1, 4);
        assert_eq!(info.name(), "point");
        assert!(info.check_arity(3).is_ok());
        assert_eq!(
            info.check_arity(5),
            Err(Error::ArityMismatch {
                name: "point".to_string(),
                expected: "1 to 4".to_string(),
                got: 5,
            })
        );

        let info = FunctionInfo::new("array", "", 0, VARIADIC);
        assert!(info.is_variadic());
        assert!(info.check_arity(100).is_ok());

        let info = FunctionInfo::new("cross", "", 2, 2);
        let err = info.check_arity(1).unwrap_err();
        assert_eq!(err.to_string(), "bad argument count for cross: expected 2, got 1");
    }

    #[test]
    fn test_number_arg() {
        let args = vec![Value::Integer(2), Value::string("2.5"), Value::string("x")];
        assert_eq!(number_arg("f", &args, 0).unwrap(), 2.0);
        assert_eq!(number_arg("f", &args, 1).unwrap(), 2.5);
        assert!(number_arg("f", &args, 2).is_err());
        assert!(number_arg("f", &args, 3).is_err());
    }
}
