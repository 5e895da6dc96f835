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

//! Selection expression evaluator
//!
//! Selection expressions are compiled to postfix, so evaluation is a single
//! pass over one operand stack. Domain lookups (named sets, residue specs,
//! property comparisons, `within`) are answered by the host.

use smallvec::SmallVec;

use crate::core::{BitSet, Error, Result, Value};
use crate::parser::{ComparatorSpec, Tok, Token, TokenValue};

use super::rpn::{evaluate, EvalEnv};

/// Evaluate postfix selection tokens to a set. An empty expression selects
/// nothing.
pub fn evaluate_selection<E: EvalEnv + ?Sized>(env: &mut E, postfix: &[Token]) -> Result<BitSet> {
    let mut stack: SmallVec<[Value; 8]> = SmallVec::new();
    let universe = env.universe();

    for token in postfix {
        let value = match token.tok {
            Tok::Identifier => Value::Bitset(named(env, token.text())?),
            Tok::String | Tok::Integer | Tok::Decimal | Tok::Literal => token
                .literal_value()
                .ok_or_else(|| Error::UnexpectedToken(token.to_string()))?,
            Tok::All => Value::Bitset(BitSet::universe(universe)),
            Tok::None => Value::Bitset(BitSet::new()),
            Tok::AtVar | Tok::AtExpr => reference(env, token)?,
            Tok::ResidueSpec => match &token.value {
                TokenValue::Residue(spec) => Value::Bitset(env.host().resolve_residue(spec)?),
                _ => return Err(Error::UnexpectedToken(token.to_string())),
            },
            Tok::Comparator => match &token.value {
                TokenValue::Comparator(spec) => Value::Bitset(compare(env, spec)?),
                _ => return Err(Error::UnexpectedToken(token.to_string())),
            },
            Tok::Within | Tok::Connected | Tok::Search => {
                let argc = token.int_value.max(0) as usize;
                if argc > stack.len() {
                    return Err(Error::StackUnderflow(token.tok.text().to_string()));
                }
                let args: Vec<Value> = stack.drain(stack.len() - argc..).collect();
                env.host().selection_function(token.tok.text(), &args)?
            }
            Tok::Cell => {
                let args = match &token.value {
                    TokenValue::Value(v) => vec![v.clone()],
                    _ => Vec::new(),
                };
                env.host().selection_function("cell", &args)?
            }
            Tok::ItemSelector => {
                let set = pop_set(env, &mut stack, token)?;
                let last = match &token.value {
                    TokenValue::Value(v) => Some(v.as_int()),
                    _ => None,
                };
                Value::Bitset(set).select_item(token.int_value, last)
            }
            Tok::Not => {
                let set = pop_set(env, &mut stack, token)?;
                Value::Bitset(set.invert(universe))
            }
            Tok::And | Tok::Or | Tok::Xor | Tok::Toggle => {
                let b = pop_set(env, &mut stack, token)?;
                let a = pop_set(env, &mut stack, token)?;
                Value::Bitset(match token.tok {
                    Tok::And => a.and(&b),
                    Tok::Or => a.or(&b),
                    Tok::Xor => a.xor(&b),
                    _ => a.toggle(&b),
                })
            }
            _ => return Err(Error::UnexpectedToken(token.to_string())),
        };
        stack.push(value);
    }

    match stack.len() {
        0 => Ok(BitSet::new()),
        1 => {
            let value = stack.pop().unwrap_or_default();
            to_set(env, &value)
        }
        _ => Err(Error::EndOfExpression),
    }
}

fn pop_set<E: EvalEnv + ?Sized>(
    env: &E,
    stack: &mut SmallVec<[Value; 8]>,
    token: &Token,
) -> Result<BitSet> {
    let value = stack
        .pop()
        .ok_or_else(|| Error::StackUnderflow(token.tok.text().to_string()))?;
    to_set(env, &value)
}

/// Defined set, host set, or a variable holding a set
fn named<E: EvalEnv + ?Sized>(env: &E, name: &str) -> Result<BitSet> {
    if let Some(set) = env.defined_set(name) {
        return Ok(set);
    }
    if let Some(set) = env.host().named_set(name) {
        return Ok(set);
    }
    match env.variable(name) {
        Some(value) => to_set(env, &value),
        None => Err(Error::UndefinedVariable(name.to_string())),
    }
}

fn reference<E: EvalEnv + ?Sized>(env: &mut E, token: &Token) -> Result<Value> {
    match (&token.tok, &token.value) {
        (Tok::AtVar, _) => env
            .variable(token.text())
            .ok_or_else(|| Error::UndefinedVariable(token.text().to_string())),
        (Tok::AtExpr, TokenValue::Tokens(inner)) => evaluate(env, inner),
        _ => Err(Error::UnexpectedToken(token.to_string())),
    }
}

fn compare<E: EvalEnv + ?Sized>(env: &mut E, spec: &ComparatorSpec) -> Result<BitSet> {
    let operand = match spec.operand.tok {
        Tok::AtVar | Tok::AtExpr => reference(env, &spec.operand)?,
        Tok::Identifier => Value::string(spec.operand.text()),
        _ => spec
            .operand
            .literal_value()
            .ok_or_else(|| Error::UnexpectedToken(spec.operand.to_string()))?,
    };
    env.host()
        .compare_property(&spec.property, spec.op, &operand)
}

/// Coerce an operand of a set operator
fn to_set<E: EvalEnv + ?Sized>(env: &E, value: &Value) -> Result<BitSet> {
    match value {
        Value::Bitset(set) => Ok(set.clone()),
        Value::Integer(i) if *i >= 0 => Ok(std::iter::once(*i as u32).collect()),
        Value::String(s) => match BitSet::parse(s) {
            Some(set) => Ok(set),
            None => env
                .defined_set(s)
                .or_else(|| env.host().named_set(s))
                .ok_or_else(|| Error::invalid_argument(format!("{} is not a selection", s))),
        },
        Value::Array(list) => {
            let mut set = BitSet::new();
            for item in list.read().iter() {
                set = set.or(&to_set(env, item)?);
            }
            Ok(set)
        }
        other => Err(Error::invalid_argument(format!(
            "{} is not a selection",
            other.type_name()
        ))),
    }
}
