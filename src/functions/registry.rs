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

//! Function Registry
//!
//! Maps builtin names to `(min-arity, max-arity, handler)`. Lookups are
//! case-insensitive; names are stored lowercased.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::builtins::{
    AbsFunction, AcosFunction, ArrayFunction, ConnectedFunction, CosFunction, CrossFunction,
    DistanceFunction, DotFunction, FormatFunction, JoinFunction, PlaneFunction, PointFunction,
    QuaternionFunction, RandomFunction, ReplaceFunction, SearchFunction, SinFunction,
    SplitFunction, SprintfFunction, SqrtFunction, TrimFunction, WithinFunction,
};
use super::{BuiltinFunction, FunctionInfo};
use crate::api::ScriptHost;
use crate::core::{Result, Value};

/// Type alias for a builtin handler
pub type BuiltinHandler = Arc<dyn Fn(&[Value], &dyn ScriptHost) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    info: FunctionInfo,
    handler: BuiltinHandler,
}

/// Function registry for builtins
pub struct FunctionRegistry {
    functions: RwLock<FxHashMap<String, Entry>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FunctionRegistry {
    fn clone(&self) -> Self {
        Self {
            functions: RwLock::new(self.functions.read().clone()),
        }
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.list())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create a new function registry with all builtin functions registered
    pub fn new() -> Self {
        let registry = Self::empty();

        // Math
        registry.register::<AbsFunction>();
        registry.register::<AcosFunction>();
        registry.register::<CosFunction>();
        registry.register::<SinFunction>();
        registry.register::<SqrtFunction>();
        registry.register::<RandomFunction>();

        // Geometry
        registry.register::<PointFunction>();
        registry.register::<PlaneFunction>();
        registry.register::<QuaternionFunction>();
        registry.register::<CrossFunction>();
        registry.register::<DotFunction>();
        registry.register::<DistanceFunction>();

        // Strings and arrays
        registry.register::<ArrayFunction>();
        registry.register::<JoinFunction>();
        registry.register::<SplitFunction>();
        registry.register::<TrimFunction>();
        registry.register::<ReplaceFunction>();
        registry.register::<FormatFunction>();
        registry.register::<SprintfFunction>();

        // Selection functions answered by the host
        registry.register::<WithinFunction>();
        registry.register::<ConnectedFunction>();
        registry.register::<SearchFunction>();

        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register a builtin type
    pub fn register<F: BuiltinFunction + Default + 'static>(&self) {
        let instance = Arc::new(F::default());
        let info = instance.info();
        let handler: BuiltinHandler = Arc::new(move |args, host| instance.evaluate(args, host));
        self.insert(info, handler);
    }

    /// Register a handler closure under `name`, replacing any builtin of
    /// the same name
    pub fn register_fn<H>(&self, name: &str, min_args: usize, max_args: usize, handler: H)
    where
        H: Fn(&[Value], &dyn ScriptHost) -> Result<Value> + Send + Sync + 'static,
    {
        let info = FunctionInfo::new(name, "", min_args, max_args);
        self.insert(info, Arc::new(handler));
    }

    fn insert(&self, info: FunctionInfo, handler: BuiltinHandler) {
        self.functions
            .write()
            .insert(info.name.clone(), Entry { info, handler });
    }

    /// Remove a function; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        self.functions
            .write()
            .remove(name.to_ascii_lowercase().as_str())
            .is_some()
    }

    /// Get the info and handler of a function by name
    pub fn get(&self, name: &str) -> Option<(FunctionInfo, BuiltinHandler)> {
        let funcs = self.functions.read();
        if let Some(e) = funcs.get(name) {
            return Some((e.info.clone(), e.handler.clone()));
        }
        funcs
            .get(name.to_ascii_lowercase().as_str())
            .map(|e| (e.info.clone(), e.handler.clone()))
    }

    /// Check arity and run a function. Returns `None` when no function of
    /// that name is registered.
    pub fn call(&self, name: &str, args: &[Value], host: &dyn ScriptHost) -> Option<Result<Value>> {
        let (info, handler) = self.get(name)?;
        Some(info.check_arity(args.len()).and_then(|_| handler(args, host)))
    }

    /// Check if a function exists
    pub fn exists(&self, name: &str) -> bool {
        let funcs = self.functions.read();
        funcs.contains_key(name) || funcs.contains_key(name.to_ascii_lowercase().as_str())
    }

    /// Get function info by name
    pub fn get_info(&self, name: &str) -> Option<FunctionInfo> {
        self.get(name).map(|(info, _)| info)
    }

    /// List all function names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NullHost;
    use crate::core::Error;

    #[test]
    fn test_registry_new() {
        let registry = FunctionRegistry::new();
        assert!(registry.exists("abs"));
        assert!(registry.exists("point"));
        assert!(registry.exists("within"));
        assert!(registry.exists("sprintf"));
    }

    #[test]
    fn test_registry_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.exists("sqrt"));
        assert!(registry.exists("SQRT"));
        assert!(registry.exists("Sqrt"));
    }

    #[test]
    fn test_call_checks_arity() {
        let registry = FunctionRegistry::new();
        let host = NullHost;
        let result = registry.call("sqrt", &[Value::Integer(16)], &host);
        assert_eq!(result, Some(Ok(Value::Float(4.0))));

        let result = registry.call("sqrt", &[], &host);
        assert!(matches!(result, Some(Err(Error::ArityMismatch { got: 0, .. }))));

        assert!(registry.call("nonexistent", &[], &host).is_none());
    }

    #[test]
    fn test_register_fn() {
        let registry = FunctionRegistry::empty();
        registry.register_fn("Twice", 1, 1, |args, _| Ok(Value::Integer(args[0].as_int() * 2)));
        let info = registry.get_info("twice").unwrap();
        assert_eq!((info.min_args, info.max_args), (1, 1));
        let host = NullHost;
        assert_eq!(
            registry.call("TWICE", &[Value::Integer(21)], &host),
            Some(Ok(Value::Integer(42)))
        );
        assert!(registry.unregister("twice"));
        assert!(!registry.exists("twice"));
    }

    #[test]
    fn test_list_functions() {
        let registry = FunctionRegistry::new();
        let names = registry.list();
        assert!(names.contains(&"cross".to_string()));
        assert!(names.contains(&"format".to_string()));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }
}
