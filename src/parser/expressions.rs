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

//! Expression compilation
//!
//! Math expressions stay in source order: the evaluator runs them through
//! its operator stack so that `and`/`or` can short-circuit and `?:` can skip
//! the untaken branch. This pass only normalizes tokens (function calls,
//! property selectors, `@` references) and classifies brace blocks.
//!
//! Selection expressions are compiled all the way to postfix by a
//! precedence-climbing parser: `or/xor/toggle` < `and` < `not` < primitive.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::error::{CompileError, CompileErrorKind};
use super::lexer::Span;
use super::program::ScriptFunction;
use super::token::{Comparison, ComparatorSpec, ResidueSpec, Tok, Token, TokenValue};
use crate::core::{BitSet, Point3, Point4, Value};

/// A lexed token with its source span
pub type RawToken = (Token, Span);

type CResult<T> = Result<T, CompileError>;

pub(crate) fn error_at(kind: CompileErrorKind, value: impl Into<String>, span: &Span) -> CompileError {
    CompileError::with_value(kind, value).at(span.start)
}

/// Offset just past the last token, for errors at end of input
pub(crate) fn end_offset(raw: &[RawToken]) -> usize {
    raw.last().map_or(0, |(_, s)| s.end)
}

/// Whether a token can serve as a name (identifiers and keywords)
pub(crate) fn has_name(token: &Token) -> bool {
    token.tok == Tok::Identifier
        || (!token.text().is_empty() && token.tok != Tok::String && !token.tok.is_math_op())
}

fn is_adjacent(raw: &[RawToken], i: usize) -> bool {
    i > 0 && i < raw.len() && raw[i - 1].1.end == raw[i].1.start
}

/// Compiled tokens that end an operand in a math expression
fn ends_math_operand(token: &Token) -> bool {
    matches!(
        token.tok,
        Tok::Identifier
            | Tok::String
            | Tok::Integer
            | Tok::Decimal
            | Tok::Literal
            | Tok::AtVar
            | Tok::AtExpr
            | Tok::RightParen
            | Tok::RightSquare
            | Tok::CoordinateEnd
            | Tok::HashEnd
            | Tok::ExpressionEnd
            | Tok::PropSelector
    )
}

/// Index of the bracket closing the one opened at `open`
pub(crate) fn matching_close(raw: &[RawToken], open: usize, left: Tok, right: Tok) -> CResult<usize> {
    let mut depth = 0;
    for (i, (t, _)) in raw.iter().enumerate().skip(open) {
        if t.tok == left {
            depth += 1;
        } else if t.tok == right {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
    }
    Err(CompileError::with_value(CompileErrorKind::TokenExpected, right.text()).at(end_offset(raw)))
}

fn depth_delta(tok: Tok) -> i32 {
    match tok {
        Tok::LeftParen | Tok::LeftSquare | Tok::LeftBrace => 1,
        Tok::RightParen | Tok::RightSquare | Tok::RightBrace => -1,
        _ => 0,
    }
}

/// Split on a separator at bracket depth 0
pub fn split_top_level(raw: &[RawToken], sep: Tok) -> Vec<&[RawToken]> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, (t, _)) in raw.iter().enumerate() {
        if depth == 0 && t.tok == sep {
            parts.push(&raw[start..i]);
            start = i + 1;
        }
        depth += depth_delta(t.tok);
    }
    parts.push(&raw[start..]);
    parts
}

fn has_top_level(raw: &[RawToken], tok: Tok) -> bool {
    split_top_level(raw, tok).len() > 1
}

/// Number of arguments between the parentheses opened at `open`
fn count_arguments(raw: &[RawToken], open: usize) -> CResult<usize> {
    let close = matching_close(raw, open, Tok::LeftParen, Tok::RightParen)?;
    if close == open + 1 {
        return Ok(0);
    }
    Ok(split_top_level(&raw[open + 1..close], Tok::Comma).len())
}

/// Check that parentheses and square brackets pair up
pub fn check_balance(raw: &[RawToken]) -> CResult<()> {
    let mut stack: Vec<Tok> = Vec::new();
    for (t, span) in raw {
        match t.tok {
            Tok::LeftParen | Tok::LeftSquare => stack.push(t.tok),
            Tok::RightParen | Tok::RightSquare => {
                let open = if t.tok == Tok::RightParen {
                    Tok::LeftParen
                } else {
                    Tok::LeftSquare
                };
                if stack.pop() != Some(open) {
                    return Err(error_at(CompileErrorKind::TokenUnexpected, t.tok.text(), span));
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => {
            let close = if open == Tok::LeftParen { ")" } else { "]" };
            Err(CompileError::with_value(CompileErrorKind::TokenExpected, close).at(end_offset(raw)))
        }
        None => Ok(()),
    }
}

/// Compiles the expression portions of one statement
pub struct ExpressionCompiler<'c> {
    src: &'c str,
    functions: &'c FxHashMap<String, Arc<ScriptFunction>>,
}

impl<'c> ExpressionCompiler<'c> {
    pub fn new(src: &'c str, functions: &'c FxHashMap<String, Arc<ScriptFunction>>) -> Self {
        Self { src, functions }
    }

    // =========================================================================
    // Math expressions
    // =========================================================================

    /// Normalize a math expression
    pub fn compile_math(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        check_balance(raw)?;
        let mut out = Vec::with_capacity(raw.len());
        self.math_into(raw, &mut out)?;
        Ok(out)
    }

    fn math_into(&self, raw: &[RawToken], out: &mut Vec<Token>) -> CResult<()> {
        let mut i = 0;
        while i < raw.len() {
            let (token, span) = &raw[i];
            let prev_operand = out.last().is_some_and(ends_math_operand);
            match token.tok {
                Tok::Period => match raw.get(i + 1) {
                    Some((name, _)) if prev_operand && has_name(name) => {
                        out.push(Token::with_text(
                            Tok::PropSelector,
                            name.text().to_ascii_lowercase(),
                        ));
                        i += 2;
                        continue;
                    }
                    _ => return Err(error_at(CompileErrorKind::InvalidExpressionToken, ".", span)),
                },
                Tok::At => {
                    let (reference, next) = self.at_reference(raw, i)?;
                    out.push(reference);
                    i = next;
                    continue;
                }
                Tok::LeftBrace => {
                    let close = matching_close(raw, i, Tok::LeftBrace, Tok::RightBrace)?;
                    self.brace_into(&raw[i + 1..close], span, out)?;
                    i = close + 1;
                    continue;
                }
                Tok::RightBrace => {
                    return Err(error_at(CompileErrorKind::TokenUnexpected, "}", span));
                }
                Tok::Assign => out.push(Token::new(Tok::Eq)),
                Tok::Seqcode => out.push(Token::integer(token.int_value)),
                Tok::All | Tok::None => {
                    out.push(Token::new(Tok::ExpressionBegin));
                    out.push(token.clone());
                    out.push(Token::new(Tok::ExpressionEnd));
                }
                Tok::Identifier => {
                    if raw.get(i + 1).is_some_and(|(t, _)| t.tok == Tok::LeftParen) {
                        out.push(self.call_token(raw, i)?);
                    } else {
                        out.push(token.clone());
                    }
                }
                Tok::LeftParen
                | Tok::RightParen
                | Tok::LeftSquare
                | Tok::RightSquare
                | Tok::Integer
                | Tok::Decimal
                | Tok::String
                | Tok::Literal => out.push(token.clone()),
                t if t.is_math_op() => out.push(token.clone()),
                _ if has_name(token) && !token.tok.is_flow_command() => {
                    // keywords double as variable and function names
                    if raw.get(i + 1).is_some_and(|(t, _)| t.tok == Tok::LeftParen) {
                        out.push(self.call_token(raw, i)?);
                    } else {
                        out.push(Token::identifier(token.text()));
                    }
                }
                _ => {
                    return Err(error_at(
                        CompileErrorKind::InvalidExpressionToken,
                        token.to_string(),
                        span,
                    ))
                }
            }
            i += 1;
        }
        Ok(())
    }

    /// Function call token for the name at `i`; user functions with a known
    /// parameter list are checked for excess arguments here
    fn call_token(&self, raw: &[RawToken], i: usize) -> CResult<Token> {
        let (token, span) = &raw[i];
        let name = token.text().to_ascii_lowercase();
        if let Some(function) = self.functions.get(name.as_str()) {
            let argc = count_arguments(raw, i + 1)?;
            if argc > function.arity() {
                return Err(error_at(CompileErrorKind::BadArgumentCount, name, span).and_more(
                    format!("{} expected, {} given", function.arity(), argc),
                ));
            }
        }
        Ok(Token::with_text(Tok::Call, name))
    }

    /// `@name` or `@{ expr }` starting at `i`; returns the token and the
    /// index after it
    pub(crate) fn at_reference(&self, raw: &[RawToken], i: usize) -> CResult<(Token, usize)> {
        let span = &raw[i].1;
        match raw.get(i + 1) {
            Some((t, _)) if t.tok == Tok::LeftBrace => {
                let close = matching_close(raw, i + 1, Tok::LeftBrace, Tok::RightBrace)?;
                let inner = self.compile_math(&raw[i + 2..close])?;
                let token = Token::with_value(Tok::AtExpr, TokenValue::Tokens(Arc::from(inner)));
                Ok((token, close + 1))
            }
            Some((t, _)) if has_name(t) && is_adjacent(raw, i + 1) => {
                Ok((Token::with_text(Tok::AtVar, t.text()), i + 2))
            }
            _ => Err(error_at(CompileErrorKind::NumberOrVariableNameExpected, "@", span)),
        }
    }

    // =========================================================================
    // Brace classification
    // =========================================================================

    /// Classify `{ ... }` in a math expression as a map, coordinate or
    /// selection and emit it
    fn brace_into(&self, inner: &[RawToken], open: &Span, out: &mut Vec<Token>) -> CResult<()> {
        if inner.is_empty() {
            out.push(Token::literal(Value::Bitset(BitSet::new())));
            return Ok(());
        }
        if inner[0].0.tok == Tok::String && inner.get(1).is_some_and(|(t, _)| t.tok == Tok::Colon)
        {
            return self.map_into(inner, out);
        }
        if has_top_level(inner, Tok::Comma) {
            let terms = split_top_level(inner, Tok::Comma);
            return self.coordinate_into(&terms, open, out);
        }
        if looks_like_selection(inner) {
            return self.selection_block_into(inner, out);
        }
        let terms = split_operand_terms(inner);
        match terms.len() {
            1 => self.selection_block_into(inner, out),
            2 if is_residue_range(&terms) => self.selection_block_into(inner, out),
            3 | 4 => {
                if terms.iter().any(|t| t.len() > 1 || t[0].0.tok == Tok::Identifier) {
                    tracing::warn!(
                        terms = terms.len(),
                        at = open.start,
                        "brace block read as a coordinate with computed components"
                    );
                }
                self.coordinate_into(&terms, open, out)
            }
            _ => Err(error_at(CompileErrorKind::CoordinateExpected, "", open)),
        }
    }

    fn selection_block_into(&self, inner: &[RawToken], out: &mut Vec<Token>) -> CResult<()> {
        out.push(Token::new(Tok::ExpressionBegin));
        out.extend(self.compile_selection(inner)?);
        out.push(Token::new(Tok::ExpressionEnd));
        Ok(())
    }

    fn coordinate_into(
        &self,
        terms: &[&[RawToken]],
        open: &Span,
        out: &mut Vec<Token>,
    ) -> CResult<()> {
        if !(3..=4).contains(&terms.len()) || terms.iter().any(|t| t.is_empty()) {
            return Err(error_at(CompileErrorKind::CoordinateExpected, "", open));
        }
        let constants: Option<Vec<f64>> = terms
            .iter()
            .map(|t| match t {
                [(token, _)] if matches!(token.tok, Tok::Integer | Tok::Decimal) => {
                    token.literal_value().map(|v| v.as_float())
                }
                _ => None,
            })
            .collect();
        if let Some(c) = constants {
            let value = match c.as_slice() {
                [x, y, z] => Value::Point3(Point3::new(*x, *y, *z)),
                [x, y, z, w] => Value::Point4(Point4::new(*x, *y, *z, *w)),
                _ => return Err(error_at(CompileErrorKind::CoordinateExpected, "", open)),
            };
            out.push(Token::literal(value));
            return Ok(());
        }
        out.push(Token::with_int(Tok::CoordinateBegin, terms.len() as i32));
        for (n, term) in terms.iter().enumerate() {
            if n > 0 {
                out.push(Token::new(Tok::Comma));
            }
            check_balance(term)?;
            self.math_into(term, out)?;
        }
        out.push(Token::new(Tok::CoordinateEnd));
        Ok(())
    }

    fn map_into(&self, inner: &[RawToken], out: &mut Vec<Token>) -> CResult<()> {
        let entries = split_top_level(inner, Tok::Comma);
        out.push(Token::with_int(Tok::HashBegin, entries.len() as i32));
        for (n, entry) in entries.iter().enumerate() {
            let colon = entry
                .iter()
                .position(|(t, _)| t.tok == Tok::Colon)
                .filter(|c| *c > 0 && *c + 1 < entry.len());
            let Some(colon) = colon else {
                let at = entry.first().map_or(end_offset(inner), |(_, s)| s.start);
                return Err(CompileError::with_value(CompileErrorKind::TokenExpected, ":").at(at));
            };
            if n > 0 {
                out.push(Token::new(Tok::Comma));
            }
            check_balance(&entry[..colon])?;
            self.math_into(&entry[..colon], out)?;
            out.push(Token::new(Tok::MapColon));
            check_balance(&entry[colon + 1..])?;
            self.math_into(&entry[colon + 1..], out)?;
        }
        out.push(Token::new(Tok::HashEnd));
        Ok(())
    }

    // =========================================================================
    // Selection expressions
    // =========================================================================

    /// Compile a selection expression to postfix
    pub fn compile_selection(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let mut parser = SelectionParser {
            ec: self,
            raw,
            pos: 0,
            out: Vec::with_capacity(raw.len()),
        };
        if raw.is_empty() {
            return Ok(parser.out);
        }
        parser.parse_or()?;
        if let Some((t, span)) = raw.get(parser.pos) {
            return Err(error_at(
                CompileErrorKind::EndOfExpressionExpected,
                t.to_string(),
                span,
            ));
        }
        Ok(parser.out)
    }
}

/// Brace contents that can only be a selection
fn looks_like_selection(inner: &[RawToken]) -> bool {
    let mut depth = 0;
    for (i, (t, _)) in inner.iter().enumerate() {
        if depth == 0 {
            let after_operand = i > 0 && inner[i - 1].0.ends_operand();
            match t.tok {
                Tok::And
                | Tok::Or
                | Tok::Not
                | Tok::Xor
                | Tok::Toggle
                | Tok::Within
                | Tok::Connected
                | Tok::Search
                | Tok::Cell
                | Tok::All
                | Tok::None
                | Tok::Seqcode
                | Tok::Colon
                | Tok::Assign => return true,
                t if t.is_comparator() => return true,
                Tok::LeftSquare | Tok::Times if !after_operand => return true,
                _ => {}
            }
        }
        depth += depth_delta(t.tok);
    }
    false
}

/// Split brace contents where one operand directly follows another
fn split_operand_terms(inner: &[RawToken]) -> Vec<&[RawToken]> {
    let mut terms = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, (t, _)) in inner.iter().enumerate() {
        if depth == 0 && i > start && t.starts_operand() {
            let prev = &inner[i - 1].0;
            let call = t.tok == Tok::LeftParen && has_name(prev);
            if prev.ends_operand() && !call {
                terms.push(&inner[start..i]);
                start = i;
            }
        }
        depth += depth_delta(t.tok);
    }
    terms.push(&inner[start..]);
    terms
}

/// `{23-30}`: a residue number range, lexed as two integers
fn is_residue_range(terms: &[&[RawToken]]) -> bool {
    match terms {
        [[(a, _)], [(b, _)]] => a.tok == Tok::Integer && b.tok == Tok::Integer && b.int_value < 0,
        _ => false,
    }
}

struct SelectionParser<'p, 'c> {
    ec: &'p ExpressionCompiler<'c>,
    raw: &'p [RawToken],
    pos: usize,
    out: Vec<Token>,
}

impl SelectionParser<'_, '_> {
    #[inline]
    fn peek(&self) -> Option<&Token> {
        self.raw.get(self.pos).map(|(t, _)| t)
    }

    #[inline]
    fn peek_tok(&self) -> Option<Tok> {
        self.peek().map(|t| t.tok)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.raw.get(self.pos + ahead).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        match self.raw.get(self.pos) {
            Some((_, s)) => *s,
            None => {
                let end = end_offset(self.raw);
                Span {
                    start: end,
                    end,
                    line: 0,
                }
            }
        }
    }

    fn adjacent(&self) -> bool {
        is_adjacent(self.raw, self.pos)
    }

    fn expect(&mut self, tok: Tok) -> CResult<()> {
        if self.peek_tok() == Some(tok) {
            self.pos += 1;
            Ok(())
        } else {
            Err(error_at(CompileErrorKind::TokenExpected, tok.text(), &self.span()))
        }
    }

    fn unexpected_end(&self) -> CompileError {
        CompileError::new(CompileErrorKind::EndOfCommandUnexpected).at(end_offset(self.raw))
    }

    fn parse_or(&mut self) -> CResult<()> {
        self.parse_and()?;
        while let Some(tok) = self.peek_tok() {
            let op = match tok {
                Tok::Or | Tok::Comma => Tok::Or,
                Tok::Xor | Tok::Toggle => tok,
                _ => break,
            };
            self.pos += 1;
            self.parse_and()?;
            self.out.push(Token::new(op));
        }
        Ok(())
    }

    fn parse_and(&mut self) -> CResult<()> {
        self.parse_not()?;
        while self.peek_tok() == Some(Tok::And) {
            self.pos += 1;
            self.parse_not()?;
            self.out.push(Token::new(Tok::And));
        }
        Ok(())
    }

    fn parse_not(&mut self) -> CResult<()> {
        if self.peek_tok() == Some(Tok::Not) {
            self.pos += 1;
            self.parse_not()?;
            self.out.push(Token::new(Tok::Not));
            return Ok(());
        }
        self.parse_primitive()?;
        while self.peek_tok() == Some(Tok::LeftSquare) && self.adjacent() {
            self.parse_item_selector()?;
        }
        Ok(())
    }

    /// `[i]` or `[i][j]` after a primitive
    fn parse_item_selector(&mut self) -> CResult<()> {
        let first = self.bracketed_integer()?;
        let mut token = Token::with_int(Tok::ItemSelector, first);
        if self.peek_tok() == Some(Tok::LeftSquare) && self.adjacent() {
            let second = self.bracketed_integer()?;
            token.value = TokenValue::Value(Value::Integer(second));
        }
        self.out.push(token);
        Ok(())
    }

    fn bracketed_integer(&mut self) -> CResult<i32> {
        self.expect(Tok::LeftSquare)?;
        let n = match self.peek() {
            Some(t) if t.tok == Tok::Integer => t.int_value,
            Some(_) => {
                return Err(error_at(CompileErrorKind::NumberExpected, "", &self.span()));
            }
            None => return Err(self.unexpected_end()),
        };
        self.pos += 1;
        self.expect(Tok::RightSquare)?;
        Ok(n)
    }

    fn parse_primitive(&mut self) -> CResult<()> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected_end());
        };
        let span = self.span();
        match token.tok {
            Tok::LeftParen => {
                self.pos += 1;
                self.parse_or()?;
                self.expect(Tok::RightParen)
            }
            Tok::LeftBrace => self.parse_brace(),
            Tok::All | Tok::None => {
                self.pos += 1;
                self.out.push(token);
                Ok(())
            }
            Tok::Times => {
                self.pos += 1;
                self.out.push(Token::new(Tok::All));
                Ok(())
            }
            Tok::Literal | Tok::String | Tok::Decimal => {
                self.pos += 1;
                self.out.push(token);
                Ok(())
            }
            Tok::Within | Tok::Connected | Tok::Search => self.parse_function(token.tok),
            Tok::Cell => self.parse_cell(),
            Tok::At => {
                let (reference, next) = self.ec.at_reference(self.raw, self.pos)?;
                self.out.push(reference);
                self.pos = next;
                Ok(())
            }
            Tok::Integer | Tok::Seqcode | Tok::Colon | Tok::Period | Tok::LeftSquare => {
                self.parse_residue()
            }
            _ if has_name(&token) => {
                let next = self.peek_at(1).map(|t| t.tok);
                if next.is_some_and(|t| t.is_comparator() || t == Tok::Assign) {
                    return self.parse_comparator();
                }
                if next.is_some_and(|t| t == Tok::Colon) && is_adjacent(self.raw, self.pos + 1) {
                    return self.parse_residue();
                }
                self.pos += 1;
                let name = if token.tok == Tok::Identifier {
                    token
                } else {
                    Token::identifier(token.text())
                };
                self.out.push(name);
                Ok(())
            }
            _ => Err(error_at(
                CompileErrorKind::UnrecognizedExpressionToken,
                token.to_string(),
                &span,
            )),
        }
    }

    /// A nested brace: a constant coordinate or a grouped selection
    fn parse_brace(&mut self) -> CResult<()> {
        let close = matching_close(self.raw, self.pos, Tok::LeftBrace, Tok::RightBrace)?;
        let inner = &self.raw[self.pos + 1..close];
        let terms = if has_top_level(inner, Tok::Comma) {
            split_top_level(inner, Tok::Comma)
        } else {
            split_operand_terms(inner)
        };
        if (3..=4).contains(&terms.len()) && !looks_like_selection(inner) {
            let span = self.span();
            let mut tokens = Vec::new();
            self.ec.coordinate_into(&terms, &span, &mut tokens)?;
            if let [literal] = tokens.as_slice() {
                self.out.push(literal.clone());
                self.pos = close + 1;
                return Ok(());
            }
            return Err(error_at(CompileErrorKind::CoordinateExpected, "", &span));
        }
        let nested = self.ec.compile_selection(inner)?;
        if nested.is_empty() {
            self.out.push(Token::new(Tok::None));
        } else {
            self.out.extend(nested);
        }
        self.pos = close + 1;
        Ok(())
    }

    /// `within(...)`, `connected(...)`, `search(...)`; a bare keyword first
    /// argument becomes a string
    fn parse_function(&mut self, tok: Tok) -> CResult<()> {
        self.pos += 1;
        self.expect(Tok::LeftParen)?;
        let mut argc = 0;
        if self.peek_tok() == Some(Tok::RightParen) {
            self.pos += 1;
            self.out.push(Token::with_int(tok, 0));
            return Ok(());
        }
        loop {
            let keyword_arg = argc == 0
                && self.peek().is_some_and(|t| has_name(t) && t.tok != Tok::All && t.tok != Tok::None)
                && self.peek_at(1).is_some_and(|t| t.tok == Tok::Comma);
            let number_arg = self
                .peek()
                .is_some_and(|t| matches!(t.tok, Tok::Integer | Tok::Decimal))
                && self
                    .peek_at(1)
                    .is_some_and(|t| matches!(t.tok, Tok::Comma | Tok::RightParen));
            if keyword_arg {
                let name = self.peek().map(|t| t.text().to_string()).unwrap_or_default();
                self.out.push(Token::string(name));
                self.pos += 1;
            } else if number_arg {
                if let Some(t) = self.peek().cloned() {
                    self.out.push(t);
                }
                self.pos += 1;
            } else {
                self.parse_or_argument()?;
            }
            argc += 1;
            match self.peek_tok() {
                Some(Tok::Comma) => self.pos += 1,
                Some(Tok::RightParen) => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    return Err(error_at(CompileErrorKind::TokenExpected, ")", &self.span()));
                }
                None => return Err(self.unexpected_end()),
            }
        }
        self.out.push(Token::with_int(tok, argc));
        Ok(())
    }

    /// One function argument; commas separate arguments rather than or-ing
    fn parse_or_argument(&mut self) -> CResult<()> {
        self.parse_and()?;
        while let Some(tok @ (Tok::Or | Tok::Xor | Tok::Toggle)) = self.peek_tok() {
            self.pos += 1;
            self.parse_and()?;
            self.out.push(Token::new(tok));
        }
        Ok(())
    }

    /// `cell=555` or `cell={1 1 1}`
    fn parse_cell(&mut self) -> CResult<()> {
        self.pos += 1;
        match self.peek_tok() {
            Some(Tok::Assign | Tok::Eq) => self.pos += 1,
            _ => return Err(error_at(CompileErrorKind::TokenExpected, "=", &self.span())),
        }
        let span = self.span();
        let point = match self.peek().cloned() {
            Some(t) if t.tok == Tok::Integer && (100..1000).contains(&t.int_value) => {
                self.pos += 1;
                let n = t.int_value;
                Point3::new(
                    (n / 100 - 4) as f64,
                    (n / 10 % 10 - 4) as f64,
                    (n % 10 - 4) as f64,
                )
            }
            Some(t) if t.tok == Tok::LeftBrace => {
                let mark = self.out.len();
                self.parse_brace()?;
                match self.out.pop().and_then(|t| t.literal_value()) {
                    Some(Value::Point3(p)) if self.out.len() == mark => p,
                    _ => return Err(error_at(CompileErrorKind::CoordinateExpected, "", &span)),
                }
            }
            _ => return Err(error_at(CompileErrorKind::NumberExpected, "", &span)),
        };
        self.out.push(Token::with_value(
            Tok::Cell,
            TokenValue::Value(Value::Point3(point)),
        ));
        Ok(())
    }

    /// `property <op> value`
    fn parse_comparator(&mut self) -> CResult<()> {
        let property = self.peek().map(|t| t.text().to_ascii_lowercase()).unwrap_or_default();
        self.pos += 1;
        let op_token = self.peek_tok().and_then(Comparison::from_tok);
        let Some(op) = op_token else {
            return Err(error_at(CompileErrorKind::TokenExpected, "=", &self.span()));
        };
        self.pos += 1;
        let span = self.span();
        let operand = match self.peek().cloned() {
            Some(t) if matches!(t.tok, Tok::Integer | Tok::Decimal | Tok::String | Tok::Literal) => {
                self.pos += 1;
                t
            }
            Some(t) if t.tok == Tok::Seqcode => {
                self.pos += 1;
                Token::integer(t.int_value)
            }
            Some(t) if t.tok == Tok::At => {
                let (reference, next) = self.ec.at_reference(self.raw, self.pos)?;
                self.pos = next;
                reference
            }
            Some(t) if has_name(&t) => {
                self.pos += 1;
                Token::string(t.text())
            }
            Some(_) => {
                return Err(error_at(CompileErrorKind::NumberOrVariableNameExpected, "", &span));
            }
            None => return Err(self.unexpected_end()),
        };
        let spec = ComparatorSpec {
            property,
            op,
            operand,
        };
        self.out.push(Token::with_value(
            Tok::Comparator,
            TokenValue::Comparator(Arc::new(spec)),
        ));
        Ok(())
    }

    /// Residue, chain, atom and model specification: `[ALA]23^A-30:B.CA/2`
    fn parse_residue(&mut self) -> CResult<()> {
        let mut spec = ResidueSpec::default();
        let start = self.pos;

        match self.peek_tok() {
            Some(Tok::LeftSquare) => {
                let close = matching_close(self.raw, self.pos, Tok::LeftSquare, Tok::RightSquare)?;
                let from = self.raw[self.pos].1.end;
                let to = self.raw[close].1.start;
                let name = self.ec.src.get(from..to).unwrap_or("").trim();
                if name.is_empty() || name.contains(char::is_whitespace) {
                    return Err(error_at(
                        CompileErrorKind::ResidueSpecificationExpected,
                        "",
                        &self.span(),
                    ));
                }
                spec.name = Some(name.to_ascii_uppercase());
                self.pos = close + 1;
            }
            Some(Tok::Identifier) => {
                spec.name = self.peek().map(|t| t.text().to_ascii_uppercase());
                self.pos += 1;
            }
            _ => {}
        }

        if self.pos == start || self.adjacent() {
            match self.peek().cloned() {
                Some(t) if t.tok == Tok::Integer => {
                    spec.seq_start = Some(t.int_value);
                    self.pos += 1;
                }
                Some(t) if t.tok == Tok::Seqcode => {
                    spec.seq_start = Some(t.int_value);
                    spec.ins_code = t.text().chars().next();
                    self.pos += 1;
                }
                _ => {}
            }
            if spec.seq_start.is_some() && self.adjacent() {
                match self.peek().cloned() {
                    Some(t) if t.tok == Tok::Integer && t.int_value < 0 => {
                        spec.seq_end = Some(-t.int_value);
                        self.pos += 1;
                    }
                    Some(t) if t.tok == Tok::Minus => {
                        self.pos += 1;
                        match self.peek().cloned() {
                            Some(n) if n.tok == Tok::Integer => {
                                spec.seq_end = Some(n.int_value);
                                self.pos += 1;
                            }
                            _ => {
                                return Err(error_at(
                                    CompileErrorKind::NumberExpected,
                                    "",
                                    &self.span(),
                                ))
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if self.peek_tok() == Some(Tok::Colon) && (self.pos == start || self.adjacent()) {
            self.pos += 1;
            let span = self.span();
            spec.chain = match self.peek().cloned() {
                Some(t) if t.tok == Tok::Times => None,
                Some(t) if t.tok == Tok::Integer && (0..10).contains(&t.int_value) => {
                    char::from_digit(t.int_value as u32, 10)
                }
                Some(t) if t.tok == Tok::Identifier && t.text().chars().count() == 1 => {
                    t.text().chars().next()
                }
                _ => {
                    return Err(error_at(CompileErrorKind::InvalidChainSpecification, "", &span));
                }
            };
            self.pos += 1;
        }

        if self.peek_tok() == Some(Tok::Period) && (self.pos == start || self.adjacent()) {
            self.pos += 1;
            let span = self.span();
            let mut name = String::new();
            while let Some(t) = self.peek() {
                let part = match t.tok {
                    Tok::Identifier | Tok::Integer => t.to_string(),
                    Tok::Times => "*".to_string(),
                    Tok::Question => "?".to_string(),
                    _ => break,
                };
                if !name.is_empty() && !self.adjacent() {
                    break;
                }
                name.push_str(&part);
                self.pos += 1;
            }
            if name.is_empty() {
                return Err(error_at(CompileErrorKind::InvalidAtomSpecification, "", &span));
            }
            spec.atom = Some(name.to_ascii_uppercase());
        }

        if self.peek_tok() == Some(Tok::Divide) && self.adjacent() {
            self.pos += 1;
            let span = self.span();
            match self.peek().cloned() {
                Some(t) if t.tok == Tok::Integer => {
                    spec.model = Some(t.int_value);
                    self.pos += 1;
                }
                _ => return Err(error_at(CompileErrorKind::InvalidModelSpecification, "", &span)),
            }
        }

        if self.pos == start || spec == ResidueSpec::default() {
            return Err(error_at(
                CompileErrorKind::ResidueSpecificationExpected,
                "",
                &self.span(),
            ));
        }
        self.out.push(Token::with_value(
            Tok::ResidueSpec,
            TokenValue::Residue(Arc::new(spec)),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::{LexContext, Lexeme, Lexer};

    fn raw(text: &str) -> Vec<RawToken> {
        let mut lexer = Lexer::new(text);
        let mut out = Vec::new();
        let ctx = LexContext::default();
        while let Lexeme::Token(t, s) = lexer.next(&ctx).unwrap() {
            out.push((t, s));
        }
        out
    }

    fn math(text: &str) -> CResult<Vec<Token>> {
        let functions = FxHashMap::default();
        ExpressionCompiler::new(text, &functions).compile_math(&raw(text))
    }

    fn selection(text: &str) -> CResult<Vec<Token>> {
        let functions = FxHashMap::default();
        ExpressionCompiler::new(text, &functions).compile_selection(&raw(text))
    }

    fn toks(tokens: &[Token]) -> Vec<Tok> {
        tokens.iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_math_normalization() {
        let t = math("f(x) + a.size").unwrap();
        assert_eq!(
            toks(&t),
            vec![
                Tok::Call,
                Tok::LeftParen,
                Tok::Identifier,
                Tok::RightParen,
                Tok::Plus,
                Tok::Identifier,
                Tok::PropSelector
            ]
        );
        assert_eq!(t[0].text(), "f");
        assert_eq!(t[6].text(), "size");

        let t = math("x = 3").unwrap();
        assert_eq!(t[1].tok, Tok::Eq);
    }

    #[test]
    fn test_brace_classification() {
        let t = math("{1 2 3}").unwrap();
        assert_eq!(t.len(), 1);
        assert!(matches!(t[0].literal_value(), Some(Value::Point3(_))));

        let t = math("{1, 2, 3, 4}").unwrap();
        assert!(matches!(t[0].literal_value(), Some(Value::Point4(_))));

        let t = math("{x 0 0}").unwrap();
        assert_eq!(t[0].tok, Tok::CoordinateBegin);
        assert_eq!(t.last().map(|t| t.tok), Some(Tok::CoordinateEnd));

        let t = math("{carbon and not water}").unwrap();
        assert_eq!(
            toks(&t),
            vec![
                Tok::ExpressionBegin,
                Tok::Identifier,
                Tok::Identifier,
                Tok::Not,
                Tok::And,
                Tok::ExpressionEnd
            ]
        );

        let t = math(r#"{"a": 1, "b": x + 1}"#).unwrap();
        assert_eq!(t[0].tok, Tok::HashBegin);
        assert_eq!(t[0].int_value, 2);
        assert_eq!(t.iter().filter(|t| t.tok == Tok::MapColon).count(), 2);

        let err = math("{1 2}").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::CoordinateExpected);
    }

    #[test]
    fn test_at_references() {
        let t = math("@x + @{y * 2}").unwrap();
        assert_eq!(t[0].tok, Tok::AtVar);
        assert_eq!(t[0].text(), "x");
        assert_eq!(t[2].tok, Tok::AtExpr);
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(math("(1 + 2").unwrap_err().kind, CompileErrorKind::TokenExpected);
        assert_eq!(math("1 + 2)").unwrap_err().kind, CompileErrorKind::TokenUnexpected);
    }

    #[test]
    fn test_selection_precedence() {
        let t = selection("a or b and not c").unwrap();
        assert_eq!(
            toks(&t),
            vec![
                Tok::Identifier,
                Tok::Identifier,
                Tok::Identifier,
                Tok::Not,
                Tok::And,
                Tok::Or
            ]
        );
    }

    #[test]
    fn test_residue_specs() {
        let t = selection("[ALA]23^A:B.CA/2").unwrap();
        let TokenValue::Residue(spec) = &t[0].value else {
            panic!("expected residue spec");
        };
        assert_eq!(spec.name.as_deref(), Some("ALA"));
        assert_eq!(spec.seq_start, Some(23));
        assert_eq!(spec.ins_code, Some('A'));
        assert_eq!(spec.chain, Some('B'));
        assert_eq!(spec.atom.as_deref(), Some("CA"));
        assert_eq!(spec.model, Some(2));

        let t = selection("10-20").unwrap();
        let TokenValue::Residue(spec) = &t[0].value else {
            panic!("expected residue spec");
        };
        assert_eq!((spec.seq_start, spec.seq_end), (Some(10), Some(20)));

        assert_eq!(
            selection(":AB").unwrap_err().kind,
            CompileErrorKind::InvalidChainSpecification
        );
        assert_eq!(
            selection("[]").unwrap_err().kind,
            CompileErrorKind::ResidueSpecificationExpected
        );
    }

    #[test]
    fn test_comparators_and_functions() {
        let t = selection("atomno < 10 and within(5.0, carbon)").unwrap();
        assert_eq!(
            toks(&t),
            vec![Tok::Comparator, Tok::Decimal, Tok::Identifier, Tok::Within, Tok::And]
        );
        assert_eq!(t[3].int_value, 2);

        let t = selection("within(group, carbon)").unwrap();
        assert_eq!(t[0].tok, Tok::String);

        let t = selection("cell=555").unwrap();
        assert_eq!(
            t[0].value,
            TokenValue::Value(Value::Point3(Point3::new(1.0, 1.0, 1.0)))
        );
    }

    #[test]
    fn test_item_selector() {
        let t = selection("carbon[2][3]").unwrap();
        assert_eq!(t[1].tok, Tok::ItemSelector);
        assert_eq!(t[1].int_value, 2);
        assert_eq!(t[1].value, TokenValue::Value(Value::Integer(3)));
    }

    #[test]
    fn test_trailing_tokens() {
        assert_eq!(
            selection("carbon water").unwrap_err().kind,
            CompileErrorKind::EndOfExpressionExpected
        );
    }
}
