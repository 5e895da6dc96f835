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

//! Flow-control resolution
//!
//! Keeps a stack of open control constructs while statements are added in
//! order, and patches jump targets into the command tokens:
//!
//! - `if`/`elseif` point at the next branch, or the `end`
//! - `else` points at the `end`
//! - `switch`, `case` and `default` chain the same way
//! - `for`, `while`, `process`, `catch` and `{` point at their `end`, and
//!   the `end` points back at them
//! - `break` and `continue` point at the `end` of their loop
//!
//! Function, parallel and try bodies are cut out of the statement list
//! when they close, with their targets renumbered from zero.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::error::{CompileError, CompileErrorKind};
use super::program::{FunctionKind, ScriptFunction, Statement};
use super::token::{FlowKind, Tok, Token, TokenValue};

type CResult<T> = Result<T, CompileError>;

/// One open control construct
#[derive(Debug)]
struct FlowContext {
    kind: FlowKind,
    /// Index of the opening statement
    head: usize,
    /// Last branch of an if/switch chain, waiting for its target
    branch: usize,
    has_else: bool,
    /// Body delimited by `{ }` rather than `end`
    braced: bool,
    /// `break` and `continue` statements waiting for the end index
    exits: Vec<usize>,
}

impl FlowContext {
    fn new(kind: FlowKind, head: usize) -> Self {
        Self {
            kind,
            head,
            branch: head,
            has_else: false,
            braced: false,
            exits: Vec::new(),
        }
    }

    fn is_breakable(&self) -> bool {
        matches!(
            self.kind,
            FlowKind::For | FlowKind::While | FlowKind::Switch | FlowKind::Process
        )
    }

    fn is_loop(&self) -> bool {
        matches!(self.kind, FlowKind::For | FlowKind::While)
    }

    /// Bodies that are cut out and run separately
    fn is_boundary(&self) -> bool {
        matches!(
            self.kind,
            FlowKind::Function | FlowKind::Parallel | FlowKind::Try
        )
    }
}

/// Commands whose token carries a jump target
pub fn carries_target(tok: Tok) -> bool {
    matches!(
        tok,
        Tok::If
            | Tok::ElseIf
            | Tok::Else
            | Tok::For
            | Tok::While
            | Tok::Break
            | Tok::Continue
            | Tok::End
            | Tok::Switch
            | Tok::Case
            | Tok::Default
            | Tok::Catch
            | Tok::Process
            | Tok::Push
    )
}

fn bad_context(what: impl Into<String>) -> CompileError {
    CompileError::with_value(CompileErrorKind::BadContext, what)
}

/// Cross-statement flow resolver
#[derive(Debug, Default)]
pub struct FlowResolver {
    statements: Vec<Statement>,
    stack: Vec<FlowContext>,
}

impl FlowResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open constructs
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Statements resolved so far
    #[inline]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    fn patch(&mut self, index: usize, target: usize) {
        if let Some(token) = self
            .statements
            .get_mut(index)
            .and_then(|s| s.tokens.first_mut())
        {
            token.int_value = target as i32;
        }
    }

    /// Add a compiled statement, opening, chaining or closing constructs
    pub fn add(
        &mut self,
        stmt: Statement,
        functions: &mut FxHashMap<String, Arc<ScriptFunction>>,
    ) -> CResult<()> {
        let index = self.statements.len();
        let tok = stmt.tok();
        match tok {
            Tok::If => self.stack.push(FlowContext::new(FlowKind::If, index)),
            Tok::ElseIf | Tok::Else => {
                let word = if tok == Tok::Else { "else" } else { "elseif" };
                let top = match self.stack.last_mut() {
                    Some(top) if top.kind == FlowKind::If && !top.has_else => top,
                    _ => return Err(bad_context(word)),
                };
                let previous = top.branch;
                top.branch = index;
                top.has_else = tok == Tok::Else;
                self.patch(previous, index);
            }
            Tok::For => self.stack.push(FlowContext::new(FlowKind::For, index)),
            Tok::While => self.stack.push(FlowContext::new(FlowKind::While, index)),
            Tok::Switch => self.stack.push(FlowContext::new(FlowKind::Switch, index)),
            Tok::Case | Tok::Default => {
                let word = if tok == Tok::Case { "case" } else { "default" };
                let top = match self.stack.last_mut() {
                    Some(top) if top.kind == FlowKind::Switch => top,
                    _ => return Err(bad_context(word)),
                };
                if tok == Tok::Default {
                    if top.has_else {
                        return Err(bad_context(word));
                    }
                    top.has_else = true;
                }
                let previous = top.branch;
                top.branch = index;
                self.patch(previous, index);
            }
            Tok::Process => self.stack.push(FlowContext::new(FlowKind::Process, index)),
            Tok::Push => {
                let mut context = FlowContext::new(FlowKind::Block, index);
                context.braced = true;
                self.stack.push(context);
            }
            Tok::Try => self.stack.push(FlowContext::new(FlowKind::Try, index)),
            Tok::Catch => {
                if self.statements.last().map(Statement::tok) != Some(Tok::Try) {
                    return Err(bad_context("catch"));
                }
                self.stack.push(FlowContext::new(FlowKind::Catch, index));
            }
            Tok::FunctionDef | Tok::Parallel => {
                if !self.stack.is_empty() {
                    return Err(bad_context(if tok == Tok::Parallel {
                        "parallel"
                    } else {
                        "function"
                    }));
                }
                let kind = if tok == Tok::Parallel {
                    FlowKind::Parallel
                } else {
                    FlowKind::Function
                };
                self.stack.push(FlowContext::new(kind, index));
            }
            Tok::Break | Tok::Continue => {
                let word = if tok == Tok::Break { "break" } else { "continue" };
                let mut found = None;
                for (depth, context) in self.stack.iter().enumerate().rev() {
                    if context.is_boundary() {
                        break;
                    }
                    let fits = if tok == Tok::Break {
                        context.is_breakable()
                    } else {
                        context.is_loop()
                    };
                    if fits {
                        found = Some(depth);
                        break;
                    }
                }
                match found {
                    Some(depth) => self.stack[depth].exits.push(index),
                    None => return Err(bad_context(word)),
                }
            }
            Tok::End => return self.close(stmt, functions),
            _ => {}
        }
        self.statements.push(stmt);
        Ok(())
    }

    /// A `{` following a flow header. Returns false when there is no header
    /// waiting for a body, in which case the brace opens a plain block.
    pub fn open_body(&mut self) -> bool {
        match self.stack.last_mut() {
            Some(top) if !top.braced => {
                top.braced = true;
                true
            }
            _ => false,
        }
    }

    /// A `}` at statement level. `continues` is set when the next word is
    /// `else` or `elseif`, which keeps an if-chain open.
    pub fn close_brace(
        &mut self,
        end: Statement,
        continues: bool,
        functions: &mut FxHashMap<String, Arc<ScriptFunction>>,
    ) -> CResult<()> {
        match self.stack.last_mut() {
            Some(top) if top.braced => {
                if continues && top.kind == FlowKind::If {
                    top.braced = false;
                    return Ok(());
                }
                let kind = top.kind;
                let mut end = end;
                if let Some(token) = end.tokens.first_mut() {
                    *token = Token::with_value(Tok::End, TokenValue::Flow(kind));
                }
                self.close(end, functions)
            }
            _ => Err(CompileError::with_value(CompileErrorKind::TokenUnexpected, "}")),
        }
    }

    /// Pop the innermost construct for an `end`
    fn close(
        &mut self,
        mut end: Statement,
        functions: &mut FxHashMap<String, Arc<ScriptFunction>>,
    ) -> CResult<()> {
        let requested = end.tokens.first().and_then(Token::flow_kind);
        let Some(context) = self.stack.pop() else {
            let what = match requested {
                Some(kind) => format!("end {}", kind.name()),
                None => "end".to_string(),
            };
            return Err(bad_context(what));
        };
        if let Some(kind) = requested {
            if kind != context.kind {
                return Err(bad_context(format!("end {}", kind.name())));
            }
        }
        let end_index = self.statements.len();
        match context.kind {
            FlowKind::If | FlowKind::Switch => self.patch(context.branch, end_index),
            FlowKind::Function | FlowKind::Parallel | FlowKind::Try => {}
            _ => self.patch(context.head, end_index),
        }
        for exit in &context.exits {
            self.patch(*exit, end_index);
        }
        match context.kind {
            FlowKind::Function | FlowKind::Parallel => self.extract_function(&context, functions),
            FlowKind::Try => self.extract_try(&context),
            _ => {
                if let Some(token) = end.tokens.first_mut() {
                    *token = Token::with_value(Tok::End, TokenValue::Flow(context.kind));
                    token.int_value = context.head as i32;
                }
                self.statements.push(end);
                Ok(())
            }
        }
    }

    /// Cut out the body after `head`, renumbering its targets
    fn cut_body(&mut self, head: usize) -> Vec<Statement> {
        let offset = (head + 1) as i32;
        let mut body: Vec<Statement> = self.statements.drain(head + 1..).collect();
        for stmt in &mut body {
            if let Some(token) = stmt.tokens.first_mut() {
                if carries_target(token.tok) {
                    token.int_value -= offset;
                }
            }
        }
        body
    }

    fn extract_function(
        &mut self,
        context: &FlowContext,
        functions: &mut FxHashMap<String, Arc<ScriptFunction>>,
    ) -> CResult<()> {
        let body = self.cut_body(context.head);
        let Some(header) = self.statements.pop() else {
            return Err(bad_context("function"));
        };
        let kind = if context.kind == FlowKind::Parallel {
            FunctionKind::Parallel
        } else {
            FunctionKind::Function
        };
        let args = header.args();
        let name = args.first().map(|t| t.text().to_string()).unwrap_or_default();
        let mut function = ScriptFunction::new(name, kind);
        function.params = args.iter().skip(1).map(|t| t.text().to_string()).collect();
        function.locals = declared_locals(&body);
        function.line = header.line;
        function.statements = body;
        tracing::debug!(
            name = %function.name,
            params = function.params.len(),
            statements = function.statements.len(),
            "function extracted"
        );
        functions.insert(function.name.clone(), Arc::new(function));
        Ok(())
    }

    fn extract_try(&mut self, context: &FlowContext) -> CResult<()> {
        let body = self.cut_body(context.head);
        let Some(try_stmt) = self.statements.get_mut(context.head) else {
            return Err(bad_context("try"));
        };
        let mut function = ScriptFunction::new("try", FunctionKind::Try);
        function.locals = declared_locals(&body);
        function.line = try_stmt.line;
        function.statements = body;
        if let Some(token) = try_stmt.tokens.first_mut() {
            token.value = TokenValue::Function(Arc::new(function));
        }
        Ok(())
    }

    /// Check that every construct was closed and hand back the statements.
    /// On failure, also returns the statement that opened the unclosed
    /// construct.
    pub fn finish(self) -> Result<Vec<Statement>, (CompileError, Option<Statement>)> {
        if let Some(open) = self.stack.last() {
            let err = CompileError::with_value(CompileErrorKind::MissingEnd, open.kind.name());
            let head = self.statements.get(open.head).cloned();
            return Err((err, head));
        }
        Ok(self.statements)
    }
}

/// Names declared with `var` in a body
fn declared_locals(body: &[Statement]) -> Vec<String> {
    let mut locals: Vec<String> = Vec::new();
    for stmt in body {
        if stmt.tok() != Tok::Var {
            continue;
        }
        for token in stmt.args() {
            if token.tok == Tok::Assign {
                break;
            }
            if token.tok == Tok::Identifier && !locals.iter().any(|l| l == token.text()) {
                locals.push(token.text().to_string());
            }
        }
    }
    locals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(tokens: Vec<Token>) -> Statement {
        Statement::new(tokens, 1, (0, 0))
    }

    fn cmd(tok: Tok) -> Statement {
        stmt(vec![Token::new(tok)])
    }

    fn end(kind: FlowKind) -> Statement {
        stmt(vec![Token::with_value(Tok::End, TokenValue::Flow(kind))])
    }

    fn targets(statements: &[Statement]) -> Vec<(Tok, i32)> {
        statements
            .iter()
            .map(|s| (s.tok(), s.tokens[0].int_value))
            .collect()
    }

    #[test]
    fn test_if_chain() {
        let mut flow = FlowResolver::new();
        let mut functions = FxHashMap::default();
        flow.add(cmd(Tok::If), &mut functions).unwrap();
        flow.add(cmd(Tok::Print), &mut functions).unwrap();
        flow.add(cmd(Tok::ElseIf), &mut functions).unwrap();
        flow.add(cmd(Tok::Else), &mut functions).unwrap();
        flow.add(cmd(Tok::Print), &mut functions).unwrap();
        flow.add(end(FlowKind::If), &mut functions).unwrap();
        let statements = flow.finish().unwrap();
        assert_eq!(
            targets(&statements),
            vec![
                (Tok::If, 2),
                (Tok::Print, 0),
                (Tok::ElseIf, 3),
                (Tok::Else, 5),
                (Tok::Print, 0),
                (Tok::End, 0)
            ]
        );
    }

    #[test]
    fn test_loop_break_continue() {
        let mut flow = FlowResolver::new();
        let mut functions = FxHashMap::default();
        flow.add(cmd(Tok::While), &mut functions).unwrap();
        flow.add(cmd(Tok::If), &mut functions).unwrap();
        flow.add(cmd(Tok::Break), &mut functions).unwrap();
        flow.add(end(FlowKind::If), &mut functions).unwrap();
        flow.add(cmd(Tok::Continue), &mut functions).unwrap();
        flow.add(end(FlowKind::While), &mut functions).unwrap();
        let statements = flow.finish().unwrap();
        assert_eq!(statements[0].target(), 5);
        assert_eq!(statements[2].target(), 5);
        assert_eq!(statements[4].target(), 5);
        assert_eq!(statements[5].target(), 0);
    }

    #[test]
    fn test_continue_skips_switch() {
        let mut flow = FlowResolver::new();
        let mut functions = FxHashMap::default();
        flow.add(cmd(Tok::For), &mut functions).unwrap();
        flow.add(cmd(Tok::Switch), &mut functions).unwrap();
        flow.add(cmd(Tok::Case), &mut functions).unwrap();
        flow.add(cmd(Tok::Continue), &mut functions).unwrap();
        flow.add(cmd(Tok::Break), &mut functions).unwrap();
        flow.add(end(FlowKind::Switch), &mut functions).unwrap();
        flow.add(end(FlowKind::For), &mut functions).unwrap();
        let statements = flow.finish().unwrap();
        assert_eq!(statements[1].target(), 2);
        assert_eq!(statements[2].target(), 5);
        assert_eq!(statements[3].target(), 6);
        assert_eq!(statements[4].target(), 5);
    }

    #[test]
    fn test_context_errors() {
        let mut functions = FxHashMap::default();

        let mut flow = FlowResolver::new();
        flow.add(cmd(Tok::If), &mut functions).unwrap();
        let err = flow.add(end(FlowKind::While), &mut functions).unwrap_err();
        assert_eq!(err.message(), "invalid context for end while");

        let mut flow = FlowResolver::new();
        assert!(flow.add(cmd(Tok::Break), &mut functions).is_err());

        let mut flow = FlowResolver::new();
        flow.add(cmd(Tok::If), &mut functions).unwrap();
        flow.add(cmd(Tok::ElseIf), &mut functions).unwrap();
        let (err, head) = flow.finish().unwrap_err();
        assert_eq!(err.message(), "missing END for if");
        assert_eq!(head.map(|s| s.tok()), Some(Tok::If));
    }

    #[test]
    fn test_function_extraction() {
        let mut flow = FlowResolver::new();
        let mut functions = FxHashMap::default();
        flow.add(cmd(Tok::Print), &mut functions).unwrap();
        flow.add(
            stmt(vec![
                Token::new(Tok::FunctionDef),
                Token::identifier("f"),
                Token::identifier("a"),
            ]),
            &mut functions,
        )
        .unwrap();
        flow.add(cmd(Tok::While), &mut functions).unwrap();
        flow.add(
            stmt(vec![
                Token::new(Tok::Var),
                Token::identifier("t"),
            ]),
            &mut functions,
        )
        .unwrap();
        flow.add(end(FlowKind::While), &mut functions).unwrap();
        flow.add(end(FlowKind::Function), &mut functions).unwrap();
        let statements = flow.finish().unwrap();
        assert_eq!(statements.len(), 1);

        let f = &functions["f"];
        assert_eq!(f.params, vec!["a".to_string()]);
        assert_eq!(f.locals, vec!["t".to_string()]);
        assert_eq!(targets(&f.statements), vec![(Tok::While, 2), (Tok::Var, 0), (Tok::End, 0)]);
    }

    #[test]
    fn test_try_extraction() {
        let mut flow = FlowResolver::new();
        let mut functions = FxHashMap::default();
        flow.add(cmd(Tok::Try), &mut functions).unwrap();
        flow.add(cmd(Tok::Print), &mut functions).unwrap();
        flow.add(end(FlowKind::Try), &mut functions).unwrap();
        flow.add(
            stmt(vec![Token::new(Tok::Catch), Token::identifier("e")]),
            &mut functions,
        )
        .unwrap();
        flow.add(end(FlowKind::Catch), &mut functions).unwrap();
        let statements = flow.finish().unwrap();
        assert_eq!(targets(&statements), vec![(Tok::Try, 0), (Tok::Catch, 2), (Tok::End, 1)]);
        let TokenValue::Function(body) = &statements[0].tokens[0].value else {
            panic!("try body missing");
        };
        assert_eq!(body.statements.len(), 1);
    }

    #[test]
    fn test_break_cannot_leave_try() {
        let mut flow = FlowResolver::new();
        let mut functions = FxHashMap::default();
        flow.add(cmd(Tok::While), &mut functions).unwrap();
        flow.add(cmd(Tok::Try), &mut functions).unwrap();
        let err = flow.add(cmd(Tok::Break), &mut functions).unwrap_err();
        assert_eq!(err.message(), "invalid context for break");
    }
}
