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

//! Statement shapes
//!
//! Turns the lexed tokens of one statement into its compiled form: the
//! command token followed by arguments whose layout depends on the command.
//! Implied assignments (`x = 1`, `x[2] += 3`, `x++`) become explicit `set`
//! statements here.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::error::{CompileError, CompileErrorKind};
use super::expressions::{
    end_offset, error_at, has_name, matching_close, split_top_level, ExpressionCompiler, RawToken,
};
use super::program::ScriptFunction;
use super::token::{FlowKind, Tok, Token, TokenValue};
use crate::core::Value;

type CResult<T> = Result<T, CompileError>;

/// Compiles single statements
pub struct StatementCompiler<'c> {
    ec: ExpressionCompiler<'c>,
    functions: &'c FxHashMap<String, Arc<ScriptFunction>>,
}

impl<'c> StatementCompiler<'c> {
    pub fn new(src: &'c str, functions: &'c FxHashMap<String, Arc<ScriptFunction>>) -> Self {
        Self {
            ec: ExpressionCompiler::new(src, functions),
            functions,
        }
    }

    /// Compile the lexed tokens of one statement
    pub fn compile(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let Some((first, span)) = raw.first() else {
            return Ok(Vec::new());
        };
        let rest = &raw[1..];
        match first.tok {
            Tok::Identifier => self.identifier_statement(raw),
            Tok::PlusPlus | Tok::MinusMinus => self.prefix_increment(raw),
            Tok::String => {
                let mut out = vec![Token::with_text(Tok::HostCommand, "script")];
                out.extend(self.host_args(raw)?);
                Ok(out)
            }
            Tok::If | Tok::ElseIf | Tok::While | Tok::Switch | Tok::Case => {
                if rest.is_empty() {
                    return Err(CompileError::with_value(
                        CompileErrorKind::TokenExpected,
                        if first.tok == Tok::Case { "value" } else { "(" },
                    )
                    .at(span.end));
                }
                self.with_math(first, rest)
            }
            Tok::Print | Tok::Log | Tok::Return => self.with_math(first, rest),
            Tok::Else
            | Tok::Default
            | Tok::Try
            | Tok::Process
            | Tok::Exit
            | Tok::Quit
            | Tok::Break
            | Tok::Continue => {
                no_arguments(first, rest)?;
                Ok(vec![first.clone()])
            }
            Tok::EndIf => {
                no_arguments(first, rest)?;
                Ok(vec![Token::with_value(Tok::End, TokenValue::Flow(FlowKind::If))])
            }
            Tok::End => self.end_statement(raw),
            Tok::For => self.for_statement(raw),
            Tok::Var => self.var_statement(raw),
            Tok::Set => self.set_statement(raw),
            Tok::Catch => self.catch_statement(raw),
            Tok::FunctionDef | Tok::Parallel => self.function_header(raw),
            Tok::Define => self.define_statement(raw),
            Tok::HostCommand => {
                let mut out = vec![first.clone()];
                out.extend(self.host_args(rest)?);
                Ok(out)
            }
            t if t.is_atom_expression_command() => {
                let mut out = vec![first.clone()];
                if !rest.is_empty() {
                    out.push(Token::new(Tok::ExpressionBegin));
                    out.extend(self.ec.compile_selection(rest)?);
                    out.push(Token::new(Tok::ExpressionEnd));
                }
                Ok(out)
            }
            t if t.implicit_string().is_some() => self.implicit_string_statement(raw),
            _ => Err(error_at(
                CompileErrorKind::CommandExpected,
                first.to_string(),
                span,
            )),
        }
    }

    fn with_math(&self, command: &Token, rest: &[RawToken]) -> CResult<Vec<Token>> {
        let mut out = vec![command.clone()];
        out.extend(self.ec.compile_math(rest)?);
        Ok(out)
    }

    // =========================================================================
    // Assignments
    // =========================================================================

    /// A statement starting with a name that is not a command
    fn identifier_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, span) = &raw[0];
        match raw.get(1).map(|(t, _)| t.tok) {
            Some(Tok::LeftParen) => {
                let mut out = vec![Token::new(Tok::Evaluate)];
                out.extend(self.ec.compile_math(raw)?);
                Ok(out)
            }
            Some(
                Tok::Assign
                | Tok::LeftSquare
                | Tok::Period
                | Tok::PlusPlus
                | Tok::MinusMinus
                | Tok::PlusEq
                | Tok::MinusEq
                | Tok::TimesEq
                | Tok::DivideEq
                | Tok::LeftDivideEq
                | Tok::AndEq
                | Tok::OrEq,
            ) => self.assignment(raw),
            None if self.functions.contains_key(first.text().to_ascii_lowercase().as_str()) => {
                Ok(vec![
                    Token::new(Tok::Evaluate),
                    Token::with_text(Tok::Call, first.text().to_ascii_lowercase()),
                    Token::new(Tok::LeftParen),
                    Token::new(Tok::RightParen),
                ])
            }
            _ => Err(error_at(
                CompileErrorKind::CommandExpected,
                first.text(),
                span,
            )),
        }
    }

    /// `name[selectors] op value` as `set name [selectors] = value`
    fn assignment(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, _) = &raw[0];
        let mut out = vec![Token::new(Tok::Set), Token::identifier(first.text())];
        let mut i = 1;
        loop {
            match raw.get(i).map(|(t, _)| t.tok) {
                Some(Tok::LeftSquare) => {
                    let close = matching_close(raw, i, Tok::LeftSquare, Tok::RightSquare)?;
                    if close == i + 1 {
                        return Err(error_at(
                            CompileErrorKind::NumberOrVariableNameExpected,
                            "]",
                            &raw[close].1,
                        ));
                    }
                    out.push(Token::new(Tok::LeftSquare));
                    out.extend(self.ec.compile_math(&raw[i + 1..close])?);
                    out.push(Token::new(Tok::RightSquare));
                    i = close + 1;
                }
                Some(Tok::Period) => match raw.get(i + 1) {
                    Some((key, _)) if has_name(key) => {
                        out.push(Token::with_text(Tok::PropSelector, key.text()));
                        i += 2;
                    }
                    _ => {
                        return Err(error_at(
                            CompileErrorKind::TokenExpected,
                            "identifier",
                            &raw[i].1,
                        ))
                    }
                },
                _ => break,
            }
        }
        let target = &raw[..i];
        let Some((op, op_span)) = raw.get(i) else {
            return Err(CompileError::with_value(CompileErrorKind::TokenExpected, "=")
                .at(end_offset(raw)));
        };
        let rhs = &raw[i + 1..];
        out.push(Token::new(Tok::Assign));
        match op.tok {
            Tok::Assign => {
                if rhs.is_empty() {
                    return Err(CompileError::new(CompileErrorKind::EndOfCommandUnexpected)
                        .at(op_span.end));
                }
                out.extend(self.ec.compile_math(rhs)?);
            }
            Tok::PlusPlus | Tok::MinusMinus => {
                if let Some((t, s)) = rhs.first() {
                    return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
                }
                out.extend(self.ec.compile_math(target)?);
                out.push(Token::new(if op.tok == Tok::PlusPlus {
                    Tok::Plus
                } else {
                    Tok::Minus
                }));
                out.push(Token::integer(1));
            }
            t => match t.compound_assignment() {
                Some(binary) => {
                    if rhs.is_empty() {
                        return Err(CompileError::new(CompileErrorKind::EndOfCommandUnexpected)
                            .at(op_span.end));
                    }
                    out.extend(self.ec.compile_math(target)?);
                    out.push(Token::new(binary));
                    out.push(Token::new(Tok::LeftParen));
                    out.extend(self.ec.compile_math(rhs)?);
                    out.push(Token::new(Tok::RightParen));
                }
                None => {
                    return Err(error_at(CompileErrorKind::TokenExpected, "=", op_span));
                }
            },
        }
        Ok(out)
    }

    /// `++x` / `--x`
    fn prefix_increment(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (op, span) = &raw[0];
        match raw.get(1) {
            Some((name, _)) if name.tok == Tok::Identifier && raw.len() == 2 => {
                let mut reordered = vec![raw[1].clone()];
                reordered.push((op.clone(), *span));
                self.assignment(&reordered)
            }
            Some((t, s)) => Err(error_at(
                CompileErrorKind::NumberOrVariableNameExpected,
                t.to_string(),
                s,
            )),
            None => Err(CompileError::new(CompileErrorKind::EndOfCommandUnexpected).at(span.end)),
        }
    }

    /// `set name = value` is an assignment; any other `set` goes to the host
    fn set_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, span) = &raw[0];
        let rest = &raw[1..];
        let Some((name, _)) = rest.first() else {
            return Err(error_at(CompileErrorKind::BadArgumentCount, "set", span));
        };
        let assigning = rest.get(1).is_some_and(|(t, _)| {
            matches!(
                t.tok,
                Tok::Assign | Tok::LeftSquare | Tok::Period | Tok::PlusPlus | Tok::MinusMinus
            ) || t.tok.compound_assignment().is_some()
        });
        if has_name(name) && assigning {
            let mut renamed = rest.to_vec();
            renamed[0].0 = Token::identifier(name.text());
            return self.assignment(&renamed);
        }
        let mut out = vec![Token::with_text(Tok::HostCommand, first.text())];
        out.extend(self.host_args(rest)?);
        Ok(out)
    }

    /// `var x`, `var x = value`, `var a, b`
    fn var_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, span) = &raw[0];
        let mut out = vec![first.clone()];
        let rest = &raw[1..];
        if rest.is_empty() {
            return Err(error_at(CompileErrorKind::BadArgumentCount, "var", span));
        }
        if let Some(assign) = rest.iter().position(|(t, _)| t.tok == Tok::Assign) {
            let [(name, name_span)] = &rest[..assign] else {
                return Err(error_at(
                    CompileErrorKind::TokenExpected,
                    "identifier",
                    &rest[0].1,
                ));
            };
            if !has_name(name) {
                return Err(error_at(CompileErrorKind::TokenExpected, "identifier", name_span));
            }
            let value = &rest[assign + 1..];
            if value.is_empty() {
                return Err(CompileError::new(CompileErrorKind::EndOfCommandUnexpected)
                    .at(end_offset(raw)));
            }
            out.push(Token::identifier(name.text()));
            out.push(Token::new(Tok::Assign));
            out.extend(self.ec.compile_math(value)?);
            return Ok(out);
        }
        for (n, (t, s)) in rest.iter().enumerate() {
            let expect_name = n % 2 == 0;
            match (expect_name, t.tok) {
                (true, _) if has_name(t) => out.push(Token::identifier(t.text())),
                (false, Tok::Comma) => {}
                _ => return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s)),
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Flow headers
    // =========================================================================

    /// `end`, `end if`, `end while`, ...
    fn end_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, _) = &raw[0];
        match raw.get(1) {
            None => Ok(vec![first.clone()]),
            Some((kind, span)) => {
                if let Some((t, s)) = raw.get(2) {
                    return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
                }
                let name = if kind.tok == Tok::Push { "{" } else { kind.text() };
                match FlowKind::from_name(name) {
                    Some(k) => Ok(vec![Token::with_value(Tok::End, TokenValue::Flow(k))]),
                    None => Err(error_at(
                        CompileErrorKind::UnrecognizedParameter,
                        "end",
                        span,
                    )
                    .and_more(kind.to_string())),
                }
            }
        }
    }

    /// `for (init; test; step)` or `for (var x in list)`
    fn for_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, span) = &raw[0];
        if raw.get(1).map(|(t, _)| t.tok) != Some(Tok::LeftParen) {
            return Err(error_at(CompileErrorKind::TokenExpected, "(", span));
        }
        let close = matching_close(raw, 1, Tok::LeftParen, Tok::RightParen)?;
        if let Some((t, s)) = raw.get(close + 1) {
            return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
        }
        let inner = &raw[2..close];
        let mut out = vec![first.clone()];
        let clauses = split_top_level(inner, Tok::Semicolon);
        match clauses.as_slice() {
            [init, test, step] => {
                if !init.is_empty() {
                    out.extend(self.loop_clause(init)?);
                }
                out.push(Token::new(Tok::Semicolon));
                if test.is_empty() {
                    out.push(Token::literal(Value::Boolean(true)));
                } else {
                    out.extend(self.ec.compile_math(test)?);
                }
                out.push(Token::new(Tok::Semicolon));
                if !step.is_empty() {
                    out.extend(self.loop_clause(step)?);
                }
                Ok(out)
            }
            [single] => {
                let (declare, rest) = match single.first() {
                    Some((t, _)) if t.tok == Tok::Var => (true, &single[1..]),
                    _ => (false, &single[..]),
                };
                match rest {
                    [(name, _), (in_tok, _), list @ ..]
                        if has_name(name) && in_tok.tok == Tok::In && !list.is_empty() =>
                    {
                        if declare {
                            out.push(Token::new(Tok::Var));
                        }
                        out.push(Token::identifier(name.text()));
                        out.push(Token::new(Tok::In));
                        out.extend(self.ec.compile_math(list)?);
                        Ok(out)
                    }
                    _ => Err(CompileError::with_value(CompileErrorKind::TokenExpected, ";")
                        .at(end_offset(inner).max(span.end))),
                }
            }
            _ => Err(CompileError::with_value(CompileErrorKind::TokenUnexpected, ";")
                .at(end_offset(inner))),
        }
    }

    /// Init or step clause of a three-part `for`
    fn loop_clause(&self, clause: &[RawToken]) -> CResult<Vec<Token>> {
        match clause[0].0.tok {
            Tok::Var => self.var_statement(clause),
            Tok::PlusPlus | Tok::MinusMinus => self.prefix_increment(clause),
            Tok::Identifier => self.assignment(clause),
            Tok::Set => self.set_statement(clause),
            _ => Err(error_at(
                CompileErrorKind::NumberOrVariableNameExpected,
                clause[0].0.to_string(),
                &clause[0].1,
            )),
        }
    }

    /// `catch`, `catch (e)` or `catch e`
    fn catch_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, _) = &raw[0];
        let mut out = vec![first.clone()];
        let rest = &raw[1..];
        let name = match rest {
            [] => None,
            [(name, _)] if has_name(name) => Some(name),
            [(open, _), (name, _), (close, _)]
                if open.tok == Tok::LeftParen && close.tok == Tok::RightParen && has_name(name) =>
            {
                Some(name)
            }
            [(open, _), (close, _)] if open.tok == Tok::LeftParen && close.tok == Tok::RightParen => {
                None
            }
            [(t, s), ..] => {
                return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
            }
        };
        if let Some(name) = name {
            out.push(Token::identifier(name.text().to_ascii_lowercase()));
        }
        Ok(out)
    }

    /// `function name(a, b)` or `parallel name(a, b)`
    fn function_header(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, span) = &raw[0];
        let Some((name, _)) = raw.get(1).filter(|(t, _)| has_name(t)) else {
            return Err(error_at(CompileErrorKind::TokenExpected, "identifier", span));
        };
        let mut out = vec![
            first.clone(),
            Token::identifier(name.text().to_ascii_lowercase()),
        ];
        let rest = &raw[2..];
        if rest.is_empty() {
            return Ok(out);
        }
        if rest[0].0.tok != Tok::LeftParen {
            return Err(error_at(CompileErrorKind::TokenExpected, "(", &rest[0].1));
        }
        let close = matching_close(raw, 2, Tok::LeftParen, Tok::RightParen)?;
        if let Some((t, s)) = raw.get(close + 1) {
            return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
        }
        let params = &raw[3..close];
        let mut seen = FxHashSet::default();
        for (n, (t, s)) in params.iter().enumerate() {
            if n % 2 == 1 {
                if t.tok != Tok::Comma {
                    return Err(error_at(CompileErrorKind::TokenExpected, ",", s));
                }
                continue;
            }
            let lower = t.text().to_ascii_lowercase();
            if !has_name(t) || !seen.insert(lower.clone()) {
                return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
            }
            out.push(Token::identifier(lower));
        }
        if params.len() % 2 == 0 && !params.is_empty() {
            let (t, s) = &params[params.len() - 1];
            return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
        }
        Ok(out)
    }

    // =========================================================================
    // Other commands
    // =========================================================================

    /// `define name <selection>`
    fn define_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, span) = &raw[0];
        let Some((name, _)) = raw.get(1).filter(|(t, _)| has_name(t)) else {
            return Err(error_at(CompileErrorKind::TokenExpected, "identifier", span));
        };
        let body = &raw[2..];
        if body.is_empty() {
            return Err(CompileError::new(CompileErrorKind::EndOfCommandUnexpected)
                .at(end_offset(raw)));
        }
        let mut out = vec![
            first.clone(),
            Token::identifier(name.text().to_ascii_lowercase()),
            Token::new(Tok::ExpressionBegin),
        ];
        out.extend(self.ec.compile_selection(body)?);
        out.push(Token::new(Tok::ExpressionEnd));
        Ok(out)
    }

    /// `echo text`, `goto @{label}`
    fn implicit_string_statement(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let (first, _) = &raw[0];
        let mut out = vec![first.clone()];
        let rest = &raw[1..];
        match rest {
            [] => {}
            [(t, _)] if t.tok == Tok::String => out.push(t.clone()),
            [(t, _), ..] if t.tok == Tok::At => {
                let (reference, next) = self.ec.at_reference(rest, 0)?;
                if let Some((t, s)) = rest.get(next) {
                    return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
                }
                out.push(reference);
            }
            [_, (t, s), ..] | [(t, s)] => {
                return Err(error_at(CompileErrorKind::TokenUnexpected, t.to_string(), s));
            }
        }
        Ok(out)
    }

    /// Arguments of a host command: literals and names pass through,
    /// brace blocks, parenthesized math and `@` references are compiled
    fn host_args(&self, raw: &[RawToken]) -> CResult<Vec<Token>> {
        let mut out = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            let (token, _) = &raw[i];
            match token.tok {
                Tok::LeftBrace => {
                    let close = matching_close(raw, i, Tok::LeftBrace, Tok::RightBrace)?;
                    out.extend(self.ec.compile_math(&raw[i..=close])?);
                    i = close + 1;
                }
                Tok::LeftParen => {
                    let close = matching_close(raw, i, Tok::LeftParen, Tok::RightParen)?;
                    out.extend(self.ec.compile_math(&raw[i..=close])?);
                    i = close + 1;
                }
                Tok::At => {
                    let (reference, next) = self.ec.at_reference(raw, i)?;
                    out.push(reference);
                    i = next;
                }
                Tok::Seqcode => {
                    out.push(Token::integer(token.int_value));
                    i += 1;
                }
                _ => {
                    out.push(token.clone());
                    i += 1;
                }
            }
        }
        Ok(out)
    }
}

fn no_arguments(command: &Token, rest: &[RawToken]) -> CResult<()> {
    match rest.first() {
        Some((_, span)) => Err(error_at(
            CompileErrorKind::BadArgumentCount,
            command.to_string(),
            span,
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::{LexContext, Lexeme, Lexer};

    fn compile_one(text: &str) -> CResult<Vec<Token>> {
        let mut lexer = Lexer::new(text);
        let mut raw: Vec<RawToken> = Vec::new();
        loop {
            let ctx = LexContext {
                command: raw.first().map(|(t, _)| t),
                n_tokens: raw.len(),
                last: raw.last().map(|(t, _)| t.tok),
            };
            match lexer.next(&ctx)? {
                Lexeme::Token(t, s) => raw.push((t, s)),
                _ => break,
            }
        }
        let functions = FxHashMap::default();
        StatementCompiler::new(text, &functions).compile(&raw)
    }

    fn toks(tokens: &[Token]) -> Vec<Tok> {
        tokens.iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_implied_set() {
        let t = compile_one("x = 1 + 2").unwrap();
        assert_eq!(
            toks(&t),
            vec![Tok::Set, Tok::Identifier, Tok::Assign, Tok::Integer, Tok::Plus, Tok::Integer]
        );
    }

    #[test]
    fn test_compound_and_increment() {
        let t = compile_one("x += 2").unwrap();
        assert_eq!(
            toks(&t),
            vec![
                Tok::Set,
                Tok::Identifier,
                Tok::Assign,
                Tok::Identifier,
                Tok::Plus,
                Tok::LeftParen,
                Tok::Integer,
                Tok::RightParen
            ]
        );

        let t = compile_one("a[2]++").unwrap();
        assert_eq!(t[2].tok, Tok::LeftSquare);
        assert_eq!(t.last().map(|t| t.int_value), Some(1));

        let t = compile_one("--n").unwrap();
        assert_eq!(t[t.len() - 2].tok, Tok::Minus);
    }

    #[test]
    fn test_set_forms() {
        let t = compile_one("set m.key = 3").unwrap();
        assert_eq!(t[2].tok, Tok::PropSelector);

        let t = compile_one("set echo top").unwrap();
        assert_eq!(t[0].tok, Tok::HostCommand);
        assert_eq!(t[0].text(), "set");
    }

    #[test]
    fn test_command_expected() {
        let err = compile_one("carbon").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::CommandExpected);
        let err = compile_one("3 + 4").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::CommandExpected);
    }

    #[test]
    fn test_for_forms() {
        let t = compile_one("for (var i = 0; i < 3; i++)").unwrap();
        assert_eq!(t.iter().filter(|t| t.tok == Tok::Semicolon).count(), 2);
        assert_eq!(t[1].tok, Tok::Var);

        let t = compile_one("for (x in [1, 2])").unwrap();
        assert_eq!(toks(&t[..3]), vec![Tok::For, Tok::Identifier, Tok::In]);

        let err = compile_one("for (x; y)").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::TokenUnexpected);
    }

    #[test]
    fn test_function_header() {
        let t = compile_one("function Area(w, h)").unwrap();
        assert_eq!(t[1].text(), "area");
        assert_eq!(t.len(), 4);

        let err = compile_one("function f(a, a)").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::TokenUnexpected);
    }

    #[test]
    fn test_selection_commands() {
        let t = compile_one("select carbon and not water").unwrap();
        assert_eq!(t[1].tok, Tok::ExpressionBegin);
        assert_eq!(t.last().map(|t| t.tok), Some(Tok::ExpressionEnd));

        let t = compile_one("define polar {oxygen or nitrogen}").unwrap();
        assert_eq!(t[1].text(), "polar");
    }

    #[test]
    fn test_host_and_implicit_string() {
        let t = compile_one("echo  hello there").unwrap();
        assert_eq!(t[1].text(), "hello there");

        let t = compile_one("zoom (2 * 50)").unwrap();
        assert_eq!(t[0].text(), "zoom");
        assert_eq!(t[1].tok, Tok::LeftParen);

        let t = compile_one("end while").unwrap();
        assert_eq!(t[0].flow_kind(), Some(FlowKind::While));

        assert_eq!(
            compile_one("break 2").unwrap_err().kind,
            CompileErrorKind::BadArgumentCount
        );
    }
}
