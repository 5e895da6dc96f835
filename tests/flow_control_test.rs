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

//! Flow Control Tests
//!
//! if/elseif/else chains, loops, switch fall-through, blocks, break,
//! continue, return and exit, run end to end through the engine.

use molscript::{Engine, Value};

fn output(script: &str) -> Vec<String> {
    Engine::default()
        .execute(script)
        .unwrap_or_else(|e| panic!("script failed: {}", e))
        .output
}

// =============================================================================
// Conditionals
// =============================================================================

#[test]
fn test_if_elseif_else() {
    let script = "if (x == 1) {\n print \"one\"\n} elseif (x == 2) {\n print \"two\"\n} else {\n print \"other\"\n}";
    for (x, expected) in [(1, "one"), (2, "two"), (7, "other")] {
        let mut engine = Engine::default();
        engine.set_global("x", Value::Integer(x));
        assert_eq!(engine.execute(script).unwrap().output, vec![expected]);
    }
}

#[test]
fn test_end_keyword_form() {
    let script = "x = 3\nif (x > 2)\n print \"big\"\nelse\n print \"small\"\nend if\nprint \"done\"";
    assert_eq!(output(script), vec!["big", "done"]);
}

#[test]
fn test_switch() {
    let script = "n = 2\nswitch (n) {\ncase 1: print \"one\"\ncase 2: print \"two\"\ncase 3: print \"three\"; break\ndefault: print \"many\"\n}";
    assert_eq!(output(script), vec!["two", "three"]);

    let script = "n = 9\nswitch (n) {\ncase 1: print \"one\"; break\ndefault: print \"many\"\n}";
    assert_eq!(output(script), vec!["many"]);
}

// =============================================================================
// Loops
// =============================================================================

#[test]
fn test_for_loops() {
    assert_eq!(
        output("for (var i = 0; i < 3; i++) {\n print i\n}"),
        vec!["0", "1", "2"]
    );
    assert_eq!(
        output("for (x in [\"a\", \"b\"]) {\n print x\n}"),
        vec!["a", "b"]
    );
}

#[test]
fn test_while_loop() {
    assert_eq!(
        output("i = 0\nwhile (i < 2)\n i++\nend while\nprint i"),
        vec!["2"]
    );
}

#[test]
fn test_break_and_continue() {
    let script = "for (var i = 0; i < 10; i++) {\n if (i == 1) {\n  continue\n }\n if (i == 3) {\n  break\n }\n print i\n}";
    assert_eq!(output(script), vec!["0", "2"]);
}

#[test]
fn test_nested_loops() {
    let script = "for (var i = 1; i <= 2; i++) {\n for (var j = 1; j <= 2; j++) {\n  print i * 10 + j\n }\n}";
    assert_eq!(output(script), vec!["11", "12", "21", "22"]);
}

// =============================================================================
// Scopes and termination
// =============================================================================

#[test]
fn test_block_scope() {
    let script = "x = 1\n{\n var x = 2\n print x\n}\nprint x";
    assert_eq!(output(script), vec!["2", "1"]);
}

#[test]
fn test_exit_stops_the_run() {
    let out = Engine::default().execute("print 1\nexit\nprint 2").unwrap();
    assert!(out.exited);
    assert_eq!(out.output, vec!["1"]);
}

#[test]
fn test_top_level_return() {
    let out = Engine::default().execute("print 1\nreturn 3 + 4\nprint 2").unwrap();
    assert_eq!(out.value, Some(Value::Integer(7)));
    assert_eq!(out.output, vec!["1"]);
}
