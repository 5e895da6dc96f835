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

//! RPN Evaluator
//!
//! Evaluates one compiled math expression. Math arrives in source order, so
//! this is a runtime shunting-yard: an operand stack, a stack of pending
//! operators and structural markers, and a ternary-state stack.
//!
//! Two things cannot be decided at compile time and are handled here:
//!
//! - **Short-circuit**: when the left side of `and`/`or` already decides
//!   the result, the operator becomes `AndFalse`/`OrTrue` and the right
//!   side is walked in dry-run mode. Dry-run keeps the stack shape but
//!   never looks up a variable or calls a function.
//! - **Ternary**: `?` pops its condition at once. The branch not taken is
//!   skipped token by token, tracking only bracket depth, until the `:` or
//!   the token that closes the enclosing group.

use smallvec::SmallVec;

use crate::api::ScriptHost;
use crate::core::value::{string_to_integer, SELECT_ALL};
use crate::core::{BitSet, Error, Point3, Point4, Result, Value, Variable};
use crate::parser::program::matching_expression_end;
use crate::parser::{Precedence, Tok, Token, TokenValue};

use super::ops;
use super::selection::evaluate_selection;

/// What the evaluator needs from the running script
pub trait EvalEnv {
    fn host(&self) -> &dyn ScriptHost;

    /// Size of the selectable universe
    fn universe(&self) -> u32;

    /// Current value of a variable, innermost scope first
    fn variable(&self, name: &str) -> Option<Value>;

    /// Set bound by `define`
    fn defined_set(&self, name: &str) -> Option<BitSet>;

    /// Call a user function or a builtin
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;

    /// Dump the stacks at every token
    fn log_rpn(&self) -> bool {
        false
    }
}

/// Evaluate compiled math tokens to a single value
pub fn evaluate<E: EvalEnv + ?Sized>(env: &mut E, tokens: &[Token]) -> Result<Value> {
    let mut rpn = RpnProcessor::new(env);
    rpn.feed(tokens)?;
    rpn.result()
}

/// State of one pending `?:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    /// Evaluating the true branch
    True,
    /// Skipping the true branch
    False,
    /// True branch done, skipping the false branch
    Done,
}

/// Entry on the operator stack
#[derive(Debug, Clone)]
enum Pending {
    Op(Tok),
    Paren { base: usize },
    Call { name: String, base: usize },
    Subscript,
    Array { base: usize },
    Coordinate { base: usize, size: usize },
    Hash { base: usize },
    /// Ternary marker, paired with the top of the branch stack
    Colon,
}

/// Dual-stack evaluator for one expression
pub struct RpnProcessor<'e, E: EvalEnv + ?Sized> {
    env: &'e mut E,
    x: SmallVec<[Variable; 8]>,
    ops: SmallVec<[Pending; 8]>,
    branches: SmallVec<[Branch; 4]>,
    was_x: bool,
    skipping: bool,
    skip_depth: usize,
    /// Operator-stack index of the `AndFalse`/`OrTrue` that started dry-run
    dry_from: Option<usize>,
    pending_call: Option<String>,
}

impl<'e, E: EvalEnv + ?Sized> RpnProcessor<'e, E> {
    pub fn new(env: &'e mut E) -> Self {
        Self {
            env,
            x: SmallVec::new(),
            ops: SmallVec::new(),
            branches: SmallVec::new(),
            was_x: false,
            skipping: false,
            skip_depth: 0,
            dry_from: None,
            pending_call: None,
        }
    }

    #[inline]
    fn dry(&self) -> bool {
        self.dry_from.is_some()
    }

    /// Add every token of an expression
    pub fn feed(&mut self, tokens: &[Token]) -> Result<()> {
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if token.tok == Tok::ExpressionBegin {
                let end = matching_expression_end(tokens, i);
                if !self.skipping {
                    let body = tokens.get(i + 1..end).unwrap_or(&[]);
                    let set = if self.dry() {
                        BitSet::new()
                    } else {
                        evaluate_selection(&mut *self.env, body)?
                    };
                    self.push_operand(Value::Bitset(set))?;
                }
                i = end + 1;
                continue;
            }
            self.add_token(token)?;
            i += 1;
        }
        Ok(())
    }

    /// Add one token
    pub fn add_token(&mut self, token: &Token) -> Result<()> {
        if self.env.log_rpn() {
            self.dump(token);
        }
        if self.skipping {
            return self.skip_token(token);
        }
        match token.tok {
            Tok::Integer | Tok::Decimal if self.was_x && is_negative_literal(token) => {
                // `3 -2` lexes as two numbers
                self.add_operator(Tok::Minus)?;
                let value = match token.literal_value() {
                    Some(Value::Integer(i)) => Value::Integer(-i),
                    Some(Value::Float(f)) => Value::Float(-f),
                    _ => return Err(Error::UnexpectedToken(token.to_string())),
                };
                self.push_operand(value)
            }
            Tok::Integer | Tok::Decimal | Tok::String | Tok::Literal => {
                let value = token
                    .literal_value()
                    .ok_or_else(|| Error::UnexpectedToken(token.to_string()))?;
                self.push_operand(value)
            }
            Tok::Identifier => {
                let value = if self.dry() {
                    Value::Boolean(false)
                } else {
                    self.lookup(token.text())?
                };
                self.push_operand(value)
            }
            Tok::AtVar => {
                let value = if self.dry() {
                    Value::Boolean(false)
                } else {
                    self.env
                        .variable(token.text())
                        .ok_or_else(|| Error::UndefinedVariable(token.text().to_string()))?
                };
                self.push_operand(value)
            }
            Tok::AtExpr => {
                let value = match (&token.value, self.dry()) {
                    (_, true) => Value::Boolean(false),
                    (TokenValue::Tokens(inner), false) => evaluate(&mut *self.env, inner)?,
                    _ => return Err(Error::UnexpectedToken(token.to_string())),
                };
                self.push_operand(value)
            }
            Tok::All => {
                let universe = self.env.universe();
                self.push_operand(Value::Bitset(BitSet::universe(universe)))
            }
            Tok::None => self.push_operand(Value::Bitset(BitSet::new())),
            Tok::Call => {
                if self.was_x {
                    return Err(Error::UnexpectedToken(token.to_string()));
                }
                self.pending_call = Some(token.text().to_string());
                Ok(())
            }
            Tok::LeftParen => self.open_paren(),
            Tok::RightParen => self.close_paren(),
            Tok::LeftSquare => {
                let marker = if self.was_x {
                    Pending::Subscript
                } else {
                    Pending::Array { base: self.x.len() }
                };
                self.ops.push(marker);
                self.was_x = false;
                Ok(())
            }
            Tok::RightSquare => self.close_square(),
            Tok::CoordinateBegin => {
                self.expect_operator_position(token)?;
                self.ops.push(Pending::Coordinate {
                    base: self.x.len(),
                    size: token.int_value.max(0) as usize,
                });
                Ok(())
            }
            Tok::CoordinateEnd => self.close_coordinate(),
            Tok::HashBegin => {
                self.expect_operator_position(token)?;
                self.ops.push(Pending::Hash { base: self.x.len() });
                Ok(())
            }
            Tok::HashEnd => self.close_hash(),
            Tok::Comma | Tok::MapColon => self.separator(token),
            Tok::Question => self.question(),
            Tok::Colon => self.colon(),
            Tok::PropSelector => {
                if !self.was_x {
                    return Err(Error::UnexpectedToken(token.to_string()));
                }
                let target = self.pop_value(".")?;
                let value = if self.dry() {
                    Value::Boolean(false)
                } else {
                    property(target, token.text())?
                };
                self.x.push(Variable::new(value));
                Ok(())
            }
            Tok::PlusPlus | Tok::MinusMinus if self.was_x => {
                // postfix: the value changes, the variable does not
                let value = self.pop_value(token.tok.text())?;
                let value = if self.dry() {
                    value
                } else {
                    step(token.tok, &value)?
                };
                self.x.push(Variable::new(value));
                Ok(())
            }
            Tok::PlusPlus | Tok::MinusMinus | Tok::Not => self.add_prefix(token.tok),
            Tok::Minus if !self.was_x => self.add_prefix(Tok::UnaryMinus),
            Tok::Plus if !self.was_x => Ok(()),
            Tok::Plus
            | Tok::Minus
            | Tok::Times
            | Tok::Divide
            | Tok::LeftDivide
            | Tok::Percent
            | Tok::Power
            | Tok::Eq
            | Tok::Ne
            | Tok::Lt
            | Tok::Le
            | Tok::Gt
            | Tok::Ge
            | Tok::And
            | Tok::Or
            | Tok::Xor
            | Tok::Toggle => self.add_operator(token.tok),
            _ => Err(Error::UnexpectedToken(token.to_string())),
        }
    }

    /// Final value of the expression
    pub fn result(mut self) -> Result<Value> {
        if self.skipping {
            if self.skip_depth > 0 || self.branches.last() != Some(&Branch::Done) {
                return Err(Error::EndOfExpression);
            }
            self.end_ternary();
        }
        if !self.was_x {
            return Err(Error::EndOfExpression);
        }
        self.close_to_marker()?;
        if !self.ops.is_empty() || self.x.len() != 1 {
            return Err(Error::EndOfExpression);
        }
        self.x
            .pop()
            .map(Variable::resolve)
            .ok_or(Error::EndOfExpression)
    }

    // =========================================================================
    // Operands
    // =========================================================================

    fn push_operand(&mut self, value: Value) -> Result<()> {
        if self.was_x {
            return Err(Error::UnexpectedToken(value.escape()));
        }
        self.x.push(Variable::new(value));
        self.was_x = true;
        Ok(())
    }

    fn pop_value(&mut self, op: &str) -> Result<Value> {
        self.x
            .pop()
            .map(Variable::resolve)
            .ok_or_else(|| Error::StackUnderflow(op.to_string()))
    }

    /// Variable, then defined set, then host set
    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.env.variable(name) {
            return Ok(value);
        }
        if let Some(set) = self.env.defined_set(name) {
            return Ok(Value::Bitset(set));
        }
        self.env
            .host()
            .named_set(name)
            .map(Value::Bitset)
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))
    }

    fn expect_operator_position(&mut self, token: &Token) -> Result<()> {
        if self.was_x {
            return Err(Error::UnexpectedToken(token.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Operators
    // =========================================================================

    fn add_prefix(&mut self, op: Tok) -> Result<()> {
        if self.was_x {
            return Err(Error::UnexpectedToken(op.text().to_string()));
        }
        self.ops.push(Pending::Op(op));
        Ok(())
    }

    fn add_operator(&mut self, op: Tok) -> Result<()> {
        if !self.was_x {
            return Err(Error::UnexpectedToken(op.text().to_string()));
        }
        self.reduce(Precedence::for_tok(op))?;
        let op = match op {
            Tok::And | Tok::Or => self.short_circuit(op),
            other => other,
        };
        self.ops.push(Pending::Op(op));
        self.was_x = false;
        Ok(())
    }

    /// Decide `and`/`or` from the left operand when it is a plain value
    fn short_circuit(&mut self, op: Tok) -> Tok {
        if self.dry() {
            return op;
        }
        let Some(left) = self.x.pop() else {
            return op;
        };
        let left = left.resolve();
        if matches!(left, Value::Bitset(_) | Value::Array(_)) {
            self.x.push(Variable::new(left));
            return op;
        }
        let tf = left.as_bool();
        self.x.push(Variable::new(Value::Boolean(tf)));
        if tf == (op == Tok::Or) {
            self.dry_from = Some(self.ops.len());
            if tf {
                Tok::OrTrue
            } else {
                Tok::AndFalse
            }
        } else {
            op
        }
    }

    /// Apply pending operators of at least `min` precedence
    fn reduce(&mut self, min: Precedence) -> Result<()> {
        while let Some(Pending::Op(top)) = self.ops.last() {
            if Precedence::for_tok(*top) < min {
                break;
            }
            self.operate()?;
        }
        Ok(())
    }

    fn operate(&mut self) -> Result<()> {
        let index = self.ops.len().saturating_sub(1);
        let Some(Pending::Op(op)) = self.ops.pop() else {
            return Err(Error::StackUnderflow("operator".to_string()));
        };
        let dry = self.dry();
        let value = match op {
            Tok::AndFalse | Tok::OrTrue => {
                self.pop_value(op.text())?;
                self.pop_value(op.text())?
            }
            Tok::UnaryMinus | Tok::Not => {
                let x = self.pop_value(op.text())?;
                if dry {
                    x
                } else {
                    ops::unary(op, &x, self.env.universe())?
                }
            }
            Tok::PlusPlus | Tok::MinusMinus => {
                let x = self.pop_value(op.text())?;
                if dry {
                    x
                } else {
                    step(op, &x)?
                }
            }
            _ => {
                let x2 = self.pop_value(op.text())?;
                let x1 = self.pop_value(op.text())?;
                if dry {
                    x1
                } else {
                    ops::binary(op, &x1, &x2)?
                }
            }
        };
        if self.dry_from == Some(index) {
            self.dry_from = None;
        }
        self.x.push(Variable::new(value));
        Ok(())
    }

    /// Apply every pending operator down to the nearest group marker,
    /// closing any ternaries on the way
    fn close_to_marker(&mut self) -> Result<()> {
        loop {
            match self.ops.last() {
                Some(Pending::Op(_)) => self.operate()?,
                Some(Pending::Colon) => {
                    self.ops.pop();
                    self.branches.pop();
                }
                _ => return Ok(()),
            }
        }
    }

    // =========================================================================
    // Groups
    // =========================================================================

    fn open_paren(&mut self) -> Result<()> {
        let base = self.x.len();
        match self.pending_call.take() {
            Some(name) => self.ops.push(Pending::Call { name, base }),
            None => {
                if self.was_x {
                    return Err(Error::UnexpectedToken("(".to_string()));
                }
                self.ops.push(Pending::Paren { base });
            }
        }
        self.was_x = false;
        Ok(())
    }

    fn close_paren(&mut self) -> Result<()> {
        if !self.was_x {
            match self.ops.last() {
                Some(Pending::Call { base, .. }) if *base == self.x.len() => {}
                _ => return Err(Error::UnexpectedToken(")".to_string())),
            }
        }
        self.close_to_marker()?;
        match self.ops.pop() {
            Some(Pending::Paren { base }) => {
                if self.x.len() != base + 1 {
                    return Err(Error::UnexpectedToken(",".to_string()));
                }
                let value = self.pop_value(")")?;
                self.x.push(Variable::new(value));
            }
            Some(Pending::Call { name, base }) => {
                let args: Vec<Value> = self.x.drain(base..).map(Variable::resolve).collect();
                let value = if self.dry() {
                    Value::Boolean(false)
                } else {
                    self.env.call_function(&name, args)?
                };
                self.x.push(Variable::new(value));
            }
            _ => return Err(Error::UnexpectedToken(")".to_string())),
        }
        self.was_x = true;
        self.update_skipping();
        Ok(())
    }

    fn close_square(&mut self) -> Result<()> {
        if !self.was_x {
            match self.ops.last() {
                Some(Pending::Array { base }) if *base == self.x.len() => {}
                _ => return Err(Error::UnexpectedToken("]".to_string())),
            }
        }
        self.close_to_marker()?;
        match self.ops.pop() {
            Some(Pending::Subscript) => {
                let index = self.pop_value("]")?;
                let target = self
                    .x
                    .pop()
                    .ok_or_else(|| Error::StackUnderflow("[".to_string()))?;
                let selected = if self.dry() {
                    Variable::new(Value::Boolean(false))
                } else {
                    subscript(target, index)
                };
                self.x.push(selected);
            }
            Some(Pending::Array { base }) => {
                let items: Vec<Value> = self.x.drain(base..).map(Variable::resolve).collect();
                self.x.push(Variable::new(Value::array(items)));
            }
            _ => return Err(Error::UnexpectedToken("]".to_string())),
        }
        self.was_x = true;
        Ok(())
    }

    fn close_coordinate(&mut self) -> Result<()> {
        if !self.was_x {
            return Err(Error::UnexpectedToken("}".to_string()));
        }
        self.close_to_marker()?;
        let Some(Pending::Coordinate { base, size }) = self.ops.pop() else {
            return Err(Error::UnexpectedToken("}".to_string()));
        };
        let terms: Vec<f64> = self
            .x
            .drain(base..)
            .map(|v| v.resolve().as_float())
            .collect();
        if terms.len() != size && !self.dry() {
            return Err(Error::invalid_argument(format!(
                "coordinate expects {} terms, got {}",
                size,
                terms.len()
            )));
        }
        let value = match terms.as_slice() {
            [x, y, z] => Value::Point3(Point3::new(*x, *y, *z)),
            [x, y, z, w] => Value::Point4(Point4::new(*x, *y, *z, *w)),
            _ if self.dry() => Value::Boolean(false),
            _ => {
                return Err(Error::invalid_argument(format!(
                    "coordinate with {} terms",
                    terms.len()
                )))
            }
        };
        self.x.push(Variable::new(value));
        self.was_x = true;
        Ok(())
    }

    fn close_hash(&mut self) -> Result<()> {
        if !self.was_x {
            return Err(Error::UnexpectedToken("}".to_string()));
        }
        self.close_to_marker()?;
        let Some(Pending::Hash { base }) = self.ops.pop() else {
            return Err(Error::UnexpectedToken("}".to_string()));
        };
        let items: Vec<Value> = self.x.drain(base..).map(Variable::resolve).collect();
        if items.len() % 2 != 0 {
            return Err(Error::invalid_argument("map entry without a value"));
        }
        let entries = items
            .chunks(2)
            .map(|pair| (pair[0].as_string(), pair[1].clone()))
            .collect();
        self.x.push(Variable::new(Value::map(entries)));
        self.was_x = true;
        Ok(())
    }

    fn separator(&mut self, token: &Token) -> Result<()> {
        if !self.was_x {
            return Err(Error::UnexpectedToken(token.to_string()));
        }
        self.close_to_marker()?;
        match self.ops.last() {
            Some(Pending::Call { .. } | Pending::Array { .. } | Pending::Coordinate { .. }) => {}
            Some(Pending::Hash { .. }) => {}
            _ => return Err(Error::UnexpectedToken(token.to_string())),
        }
        let value = self.pop_value(",")?;
        self.x.push(Variable::new(value));
        self.was_x = false;
        Ok(())
    }

    // =========================================================================
    // Ternary
    // =========================================================================

    fn question(&mut self) -> Result<()> {
        if !self.was_x {
            return Err(Error::UnexpectedToken("?".to_string()));
        }
        self.reduce(Precedence::None)?;
        let condition = self.pop_value("?")?.as_bool();
        if matches!(self.ops.last(), Some(Pending::Colon)) {
            // `a ? b : c ? d : e` shares one marker
            self.branches.pop();
        } else {
            self.ops.push(Pending::Colon);
        }
        self.branches.push(if condition {
            Branch::True
        } else {
            Branch::False
        });
        self.skipping = !condition;
        self.skip_depth = 0;
        self.was_x = false;
        Ok(())
    }

    fn colon(&mut self) -> Result<()> {
        if !self.was_x {
            return Err(Error::UnexpectedToken(":".to_string()));
        }
        self.reduce(Precedence::None)?;
        match (self.ops.last(), self.branches.last_mut()) {
            (Some(Pending::Colon), Some(state)) if *state == Branch::True => {
                *state = Branch::Done;
            }
            _ => return Err(Error::UnexpectedToken(":".to_string())),
        }
        self.skipping = true;
        self.skip_depth = 0;
        Ok(())
    }

    fn skip_token(&mut self, token: &Token) -> Result<()> {
        match token.tok {
            Tok::LeftParen | Tok::LeftSquare | Tok::CoordinateBegin | Tok::HashBegin => {
                self.skip_depth += 1;
                Ok(())
            }
            Tok::RightParen | Tok::RightSquare | Tok::CoordinateEnd | Tok::HashEnd
                if self.skip_depth > 0 =>
            {
                self.skip_depth -= 1;
                Ok(())
            }
            Tok::Colon if self.skip_depth == 0 => {
                if let Some(state) = self.branches.last_mut() {
                    if *state == Branch::False {
                        *state = Branch::True;
                        self.skipping = false;
                        self.was_x = false;
                    }
                }
                Ok(())
            }
            Tok::RightParen
            | Tok::RightSquare
            | Tok::CoordinateEnd
            | Tok::HashEnd
            | Tok::Comma
            | Tok::MapColon
                if self.skip_depth == 0 =>
            {
                if self.branches.last() != Some(&Branch::Done) {
                    return Err(Error::UnexpectedToken(token.to_string()));
                }
                self.end_ternary();
                self.add_token(token)
            }
            _ => Ok(()),
        }
    }

    /// Drop the marker of a finished ternary; its value is on the stack
    fn end_ternary(&mut self) {
        if matches!(self.ops.last(), Some(Pending::Colon)) {
            self.ops.pop();
        }
        self.branches.pop();
        self.skip_depth = 0;
        self.was_x = true;
        self.update_skipping();
    }

    #[inline]
    fn update_skipping(&mut self) {
        self.skipping = matches!(self.branches.last(), Some(Branch::False | Branch::Done))
            && matches!(self.ops.last(), Some(Pending::Colon));
    }

    fn dump(&self, token: &Token) {
        let x: Vec<String> = self.x.iter().map(|v| v.value.escape()).collect();
        tracing::trace!(
            token = %token,
            x = %x.join(" | "),
            ops = ?self.ops,
            branches = ?self.branches,
            skipping = self.skipping,
            dry = self.dry(),
            "rpn"
        );
    }
}

fn is_negative_literal(token: &Token) -> bool {
    match token.tok {
        Tok::Integer => token.int_value < 0,
        Tok::Decimal => matches!(token.literal_value(), Some(Value::Float(f)) if f < 0.0),
        _ => false,
    }
}

/// `x + 1` or `x - 1`
fn step(op: Tok, x: &Value) -> Result<Value> {
    let op = if op == Tok::PlusPlus {
        Tok::Plus
    } else {
        Tok::Minus
    };
    ops::binary(op, x, &Value::Integer(1))
}

/// `target[index]`: map lookup for maps and string keys, item or range
/// selection otherwise
fn subscript(target: Variable, index: Value) -> Variable {
    let is_key = matches!(&index, Value::String(s) if string_to_integer(s).is_none());
    let target = if target.index != SELECT_ALL && is_key {
        Variable::new(target.resolve())
    } else {
        target
    };
    if target.index == SELECT_ALL {
        if let Value::Map(map) = &target.value {
            let key = index.as_string();
            let found = map.read().get(&key).cloned();
            return Variable::new(found.unwrap_or_default());
        }
    }
    target.select(index.as_int())
}

// =========================================================================
// Property selectors
// =========================================================================

/// Apply `.name` to a value
pub fn property(value: Value, name: &str) -> Result<Value> {
    if let Value::Map(map) = &value {
        let map = map.read();
        if let Some(found) = map.get(name) {
            return Ok(found.clone());
        }
        if let Some((_, found)) = map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            return Ok(found.clone());
        }
    }
    let result = match name {
        "size" => Value::Integer(value.size()),
        "length" => match &value {
            Value::String(s) => Value::Integer(s.chars().count() as i32),
            Value::Array(_) | Value::Map(_) | Value::Bitset(_) => Value::Integer(value.size()),
            other => Value::Integer(other.as_string().chars().count() as i32),
        },
        "count" => match &value {
            Value::Array(_) | Value::Map(_) | Value::Bitset(_) | Value::String(_) => {
                Value::Integer(value.size())
            }
            _ => Value::Integer(1),
        },
        "type" => Value::string(value.type_name()),
        "keys" => match &value {
            Value::Map(map) => Value::array(map.read().keys().map(Value::string).collect()),
            _ => Value::array(Vec::new()),
        },
        "lines" => Value::array(
            value
                .as_string()
                .split('\n')
                .map(Value::string)
                .collect(),
        ),
        "x" | "y" | "z" | "w" => component(&value, name)?,
        "min" | "max" | "sum" | "average" => aggregate(&value, name),
        "reverse" => match &value {
            Value::Array(list) => Value::array(list.read().iter().rev().cloned().collect()),
            Value::String(s) => Value::string(s.chars().rev().collect::<String>()),
            other => other.clone(),
        },
        "sort" => match &value {
            Value::Array(list) => {
                let mut items = list.read().clone();
                items.sort_by(Value::sort_cmp);
                Value::array(items)
            }
            other => other.clone(),
        },
        _ if matches!(value, Value::Map(_)) => Value::empty_string(),
        _ => {
            return Err(Error::invalid_argument(format!(
                "unknown property .{} of {}",
                name,
                value.type_name()
            )))
        }
    };
    Ok(result)
}

fn component(value: &Value, name: &str) -> Result<Value> {
    let pick = |x: f64, y: f64, z: f64, w: Option<f64>| match name {
        "x" => Some(x),
        "y" => Some(y),
        "z" => Some(z),
        _ => w,
    };
    let found = match value {
        Value::Point3(p) => pick(p.x, p.y, p.z, None),
        Value::Point4(p) => pick(p.x, p.y, p.z, Some(p.w)),
        _ => None,
    };
    found.map(Value::Float).ok_or_else(|| {
        Error::invalid_argument(format!(".{} of {}", name, value.type_name()))
    })
}

fn aggregate(value: &Value, name: &str) -> Value {
    let items = value.to_list();
    if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Point3(_))) {
        if let "sum" | "average" = name {
            let mut total = Point3::new(0.0, 0.0, 0.0);
            for item in &items {
                if let Value::Point3(p) = item {
                    total = total.add(p);
                }
            }
            if name == "average" {
                total = total.scale(1.0 / items.len() as f64);
            }
            return Value::Point3(total);
        }
    }
    let numbers: Vec<f64> = items.iter().map(Value::as_float).collect();
    if numbers.is_empty() {
        return Value::Float(f64::NAN);
    }
    let result = match name {
        "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "sum" => numbers.iter().sum(),
        _ => numbers.iter().sum::<f64>() / numbers.len() as f64,
    };
    Value::Float(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NullHost;
    use crate::functions::FunctionRegistry;
    use crate::parser::compile;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct TestEnv {
        vars: FxHashMap<String, Value>,
        calls: usize,
        registry: FunctionRegistry,
    }

    impl EvalEnv for TestEnv {
        fn host(&self) -> &dyn ScriptHost {
            &NullHost
        }

        fn universe(&self) -> u32 {
            10
        }

        fn variable(&self, name: &str) -> Option<Value> {
            self.vars.get(&name.to_lowercase()).cloned()
        }

        fn defined_set(&self, _name: &str) -> Option<BitSet> {
            None
        }

        fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
            if name == "effect" {
                self.calls += 1;
                return Ok(Value::Boolean(true));
            }
            self.registry
                .call(name, &args, &NullHost)
                .unwrap_or_else(|| Err(Error::UndefinedFunction(name.to_string())))
        }
    }

    fn eval_with(env: &mut TestEnv, expr: &str) -> Result<Value> {
        let program = compile(&format!("print {}", expr)).unwrap();
        evaluate(env, program.statements[0].args())
    }

    fn eval(expr: &str) -> Result<Value> {
        eval_with(&mut TestEnv::default(), expr)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Integer(7));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Integer(9));
        assert_eq!(eval("1 or 0 and 0").unwrap(), Value::Boolean(true));
        assert_eq!(eval("-2 + 5").unwrap(), Value::Integer(3));
        assert_eq!(eval("3 -2").unwrap(), Value::Integer(1));
        assert_eq!(eval("not 1 == 2").unwrap(), Value::Boolean(true));
        assert_eq!(eval("3 / 2").unwrap(), Value::Integer(1));
        assert_eq!(eval("3.0 / 2").unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_short_circuit_skips_calls() {
        let mut env = TestEnv::default();
        assert_eq!(
            eval_with(&mut env, "false and effect()").unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            eval_with(&mut env, "true or effect()").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval_with(&mut env, "(false and effect(1, 2)) or 1 == 1").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(env.calls, 0);
        assert_eq!(
            eval_with(&mut env, "true and effect()").unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(env.calls, 1);
    }

    #[test]
    fn test_short_circuit_skips_undefined_names() {
        assert_eq!(eval("false and nosuchvar").unwrap(), Value::Boolean(false));
        assert!(matches!(
            eval("true and nosuchvar"),
            Err(Error::UndefinedVariable(_))
        ));
    }

    #[test]
    fn test_ternary_is_lazy() {
        let mut env = TestEnv::default();
        assert_eq!(
            eval_with(&mut env, "true ? 1 : effect()").unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            eval_with(&mut env, "(false ? effect() : 2) + 1").unwrap(),
            Value::Integer(3)
        );
        assert_eq!(env.calls, 0);
        assert_eq!(
            eval_with(&mut env, "false ? 1 : true ? 2 : 3").unwrap(),
            Value::Integer(2)
        );
        assert_eq!(
            eval_with(&mut env, "abs(true ? -4 : effect(), 5)").ok(),
            None,
            "abs takes one argument"
        );
        assert_eq!(
            eval_with(&mut env, "[1 == 1 ? \"a\" : \"b\", 2]").unwrap(),
            Value::array(vec![Value::string("a"), Value::Integer(2)])
        );
        assert_eq!(env.calls, 0);
    }

    #[test]
    fn test_arrays_and_subscripts() {
        let mut env = TestEnv::default();
        env.vars.insert(
            "a".into(),
            Value::array(vec![10.into(), 20.into(), 30.into()]),
        );
        assert_eq!(eval_with(&mut env, "a[2]").unwrap(), Value::Integer(20));
        assert_eq!(eval_with(&mut env, "a[-1]").unwrap(), Value::Integer(20));
        assert_eq!(
            eval_with(&mut env, "a[2][3]").unwrap(),
            Value::array(vec![20.into(), 30.into()])
        );
        assert_eq!(eval_with(&mut env, "a[7]").unwrap(), Value::empty_string());
        assert_eq!(eval_with(&mut env, "a.size").unwrap(), Value::Integer(3));
        assert_eq!(eval_with(&mut env, "\"hello\"[2]").unwrap(), Value::string("e"));
        assert_eq!(eval_with(&mut env, "[]").unwrap(), Value::array(Vec::new()));
    }

    #[test]
    fn test_maps_and_properties() {
        let m = eval("{\"b\": 2, \"a\": 1}").unwrap();
        assert_eq!(property(m.clone(), "keys").unwrap().as_string(), "a\nb");
        assert_eq!(property(m.clone(), "a").unwrap(), Value::Integer(1));
        assert_eq!(property(m, "missing").unwrap(), Value::empty_string());
        assert_eq!(eval("{\"k\": 5}[\"k\"]").unwrap(), Value::Integer(5));
        assert_eq!(eval("[3, 1, 2].sort").unwrap().as_string(), "1\n2\n3");
        assert_eq!(eval("[1, 2, 3].average").unwrap(), Value::Float(2.0));
        assert_eq!(eval("{1 2 3}.y").unwrap(), Value::Float(2.0));
        assert!(eval("5.keys").is_err());
    }

    #[test]
    fn test_coordinates_with_variables() {
        let mut env = TestEnv::default();
        env.vars.insert("z".into(), Value::Float(3.5));
        assert_eq!(
            eval_with(&mut env, "{1 2 z}").unwrap(),
            Value::Point3(Point3::new(1.0, 2.0, 3.5))
        );
    }

    #[test]
    fn test_postfix_increment_does_not_write_back() {
        let mut env = TestEnv::default();
        env.vars.insert("i".into(), Value::Integer(4));
        assert_eq!(eval_with(&mut env, "i++").unwrap(), Value::Integer(5));
        assert_eq!(env.vars["i"], Value::Integer(4));
    }

    #[test]
    fn test_malformed_expressions() {
        let mut env = TestEnv::default();
        assert_eq!(evaluate(&mut env, &[]), Err(Error::EndOfExpression));
        let tokens = vec![Token::integer(1), Token::new(Tok::Plus)];
        assert_eq!(evaluate(&mut env, &tokens), Err(Error::EndOfExpression));
        let tokens = vec![Token::integer(1), Token::integer(2)];
        assert!(matches!(
            evaluate(&mut env, &tokens),
            Err(Error::UnexpectedToken(_))
        ));
        assert!(matches!(eval("nosuch(1)"), Err(Error::UndefinedFunction(_))));
    }
}
