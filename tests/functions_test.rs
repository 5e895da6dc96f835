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

//! User Function Tests
//!
//! Definition, calls, recursion, arity checks and the call depth limit.

use molscript::api::DEFAULT_MAX_CALL_DEPTH;
use molscript::{CompileErrorKind, Engine, EngineConfig, Error, Value};

// =============================================================================
// Calls
// =============================================================================

#[test]
fn test_call_and_return() {
    let mut engine = Engine::default();
    let out = engine
        .execute("function add(a, b) {\n return a + b\n}\nprint add(2, 3)")
        .unwrap();
    assert_eq!(out.output, vec!["5"]);
}

#[test]
fn test_recursion() {
    let script = "function fact(n) {\n if (n <= 1) {\n  return 1\n }\n return n * fact(n - 1)\n}\nprint fact(5)";
    assert_eq!(Engine::default().execute(script).unwrap().output, vec!["120"]);
}

#[test]
fn test_missing_arguments_are_empty() {
    let script = "function g(a, b) {\n return b\n}\nprint g(1) == \"\"";
    assert_eq!(Engine::default().execute(script).unwrap().output, vec!["true"]);
}

#[test]
fn test_locals_do_not_leak() {
    let script = "x = 1\nfunction f() {\n var x = 99\n return x\n}\nprint f()\nprint x";
    assert_eq!(
        Engine::default().execute(script).unwrap().output,
        vec!["99", "1"]
    );
}

#[test]
fn test_undeclared_assignment_is_global() {
    let mut engine = Engine::default();
    engine
        .execute("function setg() {\n g = 5\n}\nx = setg()")
        .unwrap();
    assert_eq!(engine.global("g"), Some(&Value::Integer(5)));
}

#[test]
fn test_functions_survive_between_runs() {
    let mut engine = Engine::default();
    engine.execute("function sq(v) {\n return v * v\n}").unwrap();
    assert_eq!(engine.evaluate("sq(9)").unwrap(), Value::Integer(81));
}

// =============================================================================
// Arity and depth
// =============================================================================

#[test]
fn test_excess_arguments_at_compile_time() {
    let err = Engine::default()
        .execute("function f(a) {\n return a\n}\nprint f(1, 2)")
        .unwrap_err();
    match err {
        Error::Compile(e) => assert_eq!(e.kind, CompileErrorKind::BadArgumentCount),
        other => panic!("expected compile error, got {:?}", other),
    }
}

#[test]
fn test_excess_arguments_at_run_time() {
    let mut engine = Engine::default();
    engine.execute("function f(a) {\n return a\n}").unwrap();
    let err = engine.execute("print f(1, 2)").unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { got: 2, .. }));
}

#[test]
fn test_call_depth_limit() {
    let mut engine = Engine::new(EngineConfig::default().with_max_call_depth(24));
    let err = engine
        .execute("function down(n) {\n return down(n + 1)\n}\nprint down(0)")
        .unwrap_err();
    assert_eq!(err, Error::CallDepthExceeded(24));

    // the engine is still usable afterwards
    assert_eq!(engine.evaluate("1 + 1").unwrap(), Value::Integer(2));
}

#[test]
fn test_deep_recursion_with_default_limit() {
    let mut engine = Engine::default();
    let out = engine
        .execute("function down(n) {\n if (n >= 500) {\n  return n\n }\n return down(n + 1)\n}\nprint down(0)")
        .unwrap();
    assert_eq!(out.output, vec!["500"]);

    let err = engine
        .execute("function forever(n) {\n return forever(n + 1)\n}\nprint forever(0)")
        .unwrap_err();
    assert_eq!(err, Error::CallDepthExceeded(DEFAULT_MAX_CALL_DEPTH));
}

#[test]
fn test_undefined_function() {
    let err = Engine::default().evaluate("nosuch(1)").unwrap_err();
    assert!(matches!(err, Error::UndefinedFunction(_)));
}
