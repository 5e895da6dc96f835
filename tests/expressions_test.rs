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

//! Expression Evaluation Tests
//!
//! Math expressions through the public engine: precedence, numeric
//! promotion, strings, arrays, maps and short-circuit evaluation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use molscript::{Engine, EngineConfig, Error, Point3, Value};

fn eval(expr: &str) -> Value {
    Engine::default()
        .evaluate(expr)
        .unwrap_or_else(|e| panic!("{} failed: {}", expr, e))
}

// =============================================================================
// Arithmetic
// =============================================================================

#[test]
fn test_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Value::Integer(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::Integer(9));
    assert_eq!(eval("-2 + 5"), Value::Integer(3));
    assert_eq!(eval("1 or 0 and 0"), Value::Boolean(true));
    assert_eq!(eval("not 1 == 2"), Value::Boolean(true));
}

#[test]
fn test_numeric_promotion() {
    assert_eq!(eval("3 / 2"), Value::Integer(1));
    assert_eq!(eval("3.0 / 2"), Value::Float(1.5));
    assert_eq!(eval("7 % 3"), Value::Integer(1));
    assert_eq!(eval("\"3\" + 2 == 5"), Value::Boolean(true));
    assert_eq!(eval("1 == 1.0"), Value::Boolean(true));
}

#[test]
fn test_type_mismatch() {
    let err = Engine::default().evaluate("1 + {1 2 3}").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn test_undefined_variable() {
    let err = Engine::default().evaluate("nosuchvar + 1").unwrap_err();
    assert!(matches!(err, Error::UndefinedVariable(_)));
}

// =============================================================================
// Strings, arrays and maps
// =============================================================================

#[test]
fn test_string_values() {
    assert_eq!(eval("\"hello\"[2]"), Value::string("e"));
    assert_eq!(eval("\"ab\" % 4"), Value::string("  ab"));
    assert_eq!(eval("\"ABC\" == \"abc\""), Value::Boolean(true));
}

#[test]
fn test_arrays() {
    assert_eq!(eval("[1, 2, 3].size"), Value::Integer(3));
    assert_eq!(eval("[3, 1, 2].sort").as_string(), "1\n2\n3");
    assert_eq!(eval("[10, 20, 30][2]"), Value::Integer(20));
    assert_eq!(eval("[]"), Value::array(Vec::new()));
}

#[test]
fn test_maps() {
    assert_eq!(eval("{\"k\": 5}[\"k\"]"), Value::Integer(5));
    assert_eq!(eval("{\"b\": 2, \"a\": 1}.keys").as_string(), "a\nb");
}

#[test]
fn test_points() {
    assert_eq!(eval("{1 2 3}"), Value::Point3(Point3::new(1.0, 2.0, 3.0)));
    assert_eq!(eval("{1 2 3}.y"), Value::Float(2.0));
}

#[test]
fn test_globals_in_expressions() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.set_global("radius", Value::Float(2.5));
    assert_eq!(engine.evaluate("radius * 2").unwrap(), Value::Float(5.0));
    engine.execute("radius = 4").unwrap();
    assert_eq!(engine.evaluate("radius").unwrap(), Value::Integer(4));
}

// =============================================================================
// Short-circuit evaluation
// =============================================================================

fn counting_engine() -> (Engine, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = Engine::default();
    let counter = calls.clone();
    engine.registry_mut().register_fn("bump", 0, 0, move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Boolean(true))
    });
    (engine, calls)
}

#[test]
fn test_short_circuit_skips_calls() {
    let (mut engine, calls) = counting_engine();
    assert_eq!(engine.evaluate("false and bump()").unwrap(), Value::Boolean(false));
    assert_eq!(engine.evaluate("true or bump()").unwrap(), Value::Boolean(true));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert_eq!(engine.evaluate("true and bump()").unwrap(), Value::Boolean(true));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_ternary_is_lazy() {
    let (mut engine, calls) = counting_engine();
    assert_eq!(engine.evaluate("true ? 1 : bump()").unwrap(), Value::Integer(1));
    assert_eq!(
        engine.evaluate("(false ? bump() : 2) + 1").unwrap(),
        Value::Integer(3)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
