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

//! Statement Interpreter
//!
//! Walks a compiled statement list with a program counter. Jump targets
//! were patched in by the flow resolver, so control flow here is a matter
//! of following `Statement::target()`:
//!
//! - `if`/`elseif`/`else` and `switch`/`case` chains are entered only when
//!   a failed test jumped to them; reaching one by falling off the end of
//!   the previous branch skips to the `end`
//! - loop `end`s jump back to their header, which then runs the step
//!   clause (or takes the next item) instead of the init
//! - `break` and `continue` jump to the loop `end` and unwind any scopes
//!   opened inside it
//!
//! `try` bodies and user functions run in a nested call of
//! [`Interpreter::run_block`]. Inside a `parallel` function each `process`
//! block is forked off as a job and the jobs run together when the body
//! finishes, through the [`ParallelCoordinator`].

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::api::{EngineConfig, ScriptHost};
use crate::core::value::string_to_integer;
use crate::core::{BitSet, Error, Result, Value};
use crate::functions::FunctionRegistry;
use crate::parser::program::matching_expression_end;
use crate::parser::{FlowKind, FunctionKind, ScriptFunction, Statement, Tok, Token, TokenValue};

use super::context::{ExecutionContext, Frame, HostCall};
use super::parallel::ParallelCoordinator;
use super::rpn::{self, EvalEnv};
use super::selection::evaluate_selection;

/// Remaining native stack below which a user call moves to a new segment
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each stack segment allocated for deep recursion
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// How a block of statements finished
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Ran off the end of the block
    Normal,
    /// `return`, with its value
    Return(Value),
    /// `exit` or `quit`
    Exit,
}

/// Everything a run shares with its parallel workers
#[derive(Clone, Copy)]
pub struct Runtime<'a> {
    pub functions: &'a FxHashMap<String, Arc<ScriptFunction>>,
    pub host: &'a dyn ScriptHost,
    pub registry: &'a FunctionRegistry,
    pub config: &'a EngineConfig,
    pub coordinator: &'a ParallelCoordinator,
}

impl Runtime<'_> {
    /// Size of the selectable universe
    pub fn universe(&self) -> u32 {
        self.config
            .universe_size
            .unwrap_or_else(|| self.host.universe_size())
    }
}

/// A `process` block waiting to run
struct ProcessJob {
    owner: Arc<ScriptFunction>,
    start: usize,
    end: usize,
    ctx: ExecutionContext,
}

/// Constructs open in the current block
enum Active {
    Loop {
        head: usize,
        scope: usize,
    },
    ForIn {
        head: usize,
        scope: usize,
        items: Vec<Value>,
        next: usize,
    },
    Switch {
        head: usize,
        value: Value,
    },
    Block {
        head: usize,
        scope: usize,
    },
}

impl Active {
    fn head(&self) -> usize {
        match self {
            Active::Loop { head, .. }
            | Active::ForIn { head, .. }
            | Active::Switch { head, .. }
            | Active::Block { head, .. } => *head,
        }
    }

    fn scope(&self) -> Option<usize> {
        match self {
            Active::Loop { scope, .. } | Active::ForIn { scope, .. } | Active::Block { scope, .. } => {
                Some(*scope)
            }
            Active::Switch { .. } => None,
        }
    }
}

/// How a `try` body ended
enum TryOutcome {
    Finished,
    Flow(Flow),
    Caught(Error),
}

/// One step of an assignment path: `[i]`, `["key"]` or `.key`
#[derive(Debug, Clone, PartialEq)]
enum PathKey {
    Index(i32),
    Key(String),
}

/// Statement executor over one [`ExecutionContext`]
pub struct Interpreter<'a> {
    runtime: Runtime<'a>,
    universe: u32,
    pub(crate) ctx: ExecutionContext,
    /// Collects `process` blocks while a parallel function body runs
    jobs: Option<Vec<ProcessJob>>,
    exit_requested: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(runtime: Runtime<'a>, ctx: ExecutionContext) -> Self {
        Self {
            universe: runtime.universe(),
            runtime,
            ctx,
            jobs: None,
            exit_requested: false,
        }
    }

    #[inline]
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Hand the context back once the run is over
    pub fn into_context(self) -> ExecutionContext {
        self.ctx
    }

    /// Run a top-level statement list
    pub fn run(&mut self, statements: &[Statement]) -> Result<Flow> {
        self.exit_requested = false;
        let depth = self.ctx.scope_depth();
        let flow = self.run_block(None, statements, 0, statements.len());
        self.ctx.truncate_scopes(depth);
        flow
    }

    /// Evaluate compiled math tokens in the current context
    pub fn evaluate(&mut self, tokens: &[Token]) -> Result<Value> {
        rpn::evaluate(self, tokens)
    }

    // =========================================================================
    // Block execution
    // =========================================================================

    /// Execute `stmts[start..end]`. `owner` is the function or try body the
    /// statements belong to, if any.
    fn run_block(
        &mut self,
        owner: Option<&Arc<ScriptFunction>>,
        stmts: &[Statement],
        start: usize,
        end: usize,
    ) -> Result<Flow> {
        let mut active: Vec<Active> = Vec::new();
        let base_scope = self.ctx.scope_depth();
        let mut i = start;
        // Set when a failed branch test jumped to the next branch
        let mut jumped = false;
        // Set when a loop end jumped back to its header
        let mut looped = false;

        while i < end {
            if self.exit_requested {
                return Ok(Flow::Exit);
            }
            let stmt = &stmts[i];
            let entry = std::mem::take(&mut jumped);
            let from_end = std::mem::take(&mut looped);
            tracing::trace!(line = stmt.line, index = i, statement = %stmt, "execute");

            match stmt.tok() {
                Tok::If => {
                    if self.condition(stmt)? {
                        i += 1;
                    } else {
                        i = stmt.target();
                        jumped = true;
                    }
                }
                Tok::ElseIf => {
                    if !entry {
                        i = chain_end(stmts, i);
                    } else if self.condition(stmt)? {
                        i += 1;
                    } else {
                        i = stmt.target();
                        jumped = true;
                    }
                }
                Tok::Else => i = if entry { i + 1 } else { stmt.target() },
                Tok::Switch => {
                    let value = self.evaluate(stmt.args())?;
                    active.push(Active::Switch { head: i, value });
                    i = stmt.target();
                    jumped = true;
                }
                Tok::Case => {
                    if !entry {
                        // fall-through from the previous case
                        i += 1;
                    } else {
                        let value = match active.last() {
                            Some(Active::Switch { value, .. }) => value.clone(),
                            _ => return Err(Error::UnexpectedToken("case".to_string())),
                        };
                        let candidate = self.evaluate(stmt.args())?;
                        if Value::are_equal(&value, &candidate) {
                            i += 1;
                        } else {
                            i = stmt.target();
                            jumped = true;
                        }
                    }
                }
                Tok::Default => i += 1,
                Tok::End => {
                    let head = stmt.target();
                    match stmt.command().and_then(Token::flow_kind) {
                        Some(FlowKind::For | FlowKind::While) => {
                            i = head;
                            looped = true;
                        }
                        Some(FlowKind::Switch | FlowKind::Block | FlowKind::Catch) => {
                            self.unwind(&mut active, |h| h >= head);
                            i += 1;
                        }
                        _ => i += 1,
                    }
                }
                Tok::While => {
                    if !from_end {
                        let scope = self.ctx.scope_depth();
                        active.push(Active::Loop { head: i, scope });
                        self.ctx.push_scope();
                    }
                    if self.condition(stmt)? {
                        i += 1;
                    } else {
                        self.unwind(&mut active, |h| h >= i);
                        i = stmt.target() + 1;
                    }
                }
                Tok::For => {
                    let go = if stmt.args().iter().any(|t| t.tok == Tok::Semicolon) {
                        self.for_clauses(stmt, i, from_end, &mut active)?
                    } else {
                        self.for_in(stmt, i, from_end, &mut active)?
                    };
                    if go {
                        i += 1;
                    } else {
                        self.unwind(&mut active, |h| h >= i);
                        i = stmt.target() + 1;
                    }
                }
                Tok::Break => {
                    let (end_index, head) = loop_bounds(stmts, stmt)?;
                    self.unwind(&mut active, |h| h >= head);
                    i = end_index + 1;
                }
                Tok::Continue => {
                    let (end_index, head) = loop_bounds(stmts, stmt)?;
                    self.unwind(&mut active, |h| h > head);
                    i = end_index;
                }
                Tok::Push => {
                    let scope = self.ctx.scope_depth();
                    active.push(Active::Block { head: i, scope });
                    self.ctx.push_scope();
                    i += 1;
                }
                Tok::Process => match (owner, self.jobs.as_mut()) {
                    (Some(owner), Some(jobs)) => {
                        jobs.push(ProcessJob {
                            owner: owner.clone(),
                            start: i + 1,
                            end: stmt.target(),
                            ctx: self.ctx.fork(),
                        });
                        i = stmt.target() + 1;
                    }
                    _ => i += 1,
                },
                Tok::Try => {
                    let scope = self.ctx.scope_depth();
                    let catch = stmts.get(i + 1).filter(|s| s.tok() == Tok::Catch);
                    match self.run_try(stmt)? {
                        TryOutcome::Finished => {
                            i = match catch {
                                Some(catch) => catch.target() + 1,
                                None => i + 1,
                            };
                        }
                        TryOutcome::Flow(flow) => {
                            self.ctx.truncate_scopes(base_scope);
                            return Ok(flow);
                        }
                        TryOutcome::Caught(err) => match catch {
                            Some(catch) => {
                                active.push(Active::Block { head: i + 1, scope });
                                self.ctx.push_scope();
                                if let Some(name) = catch.args().first() {
                                    self.ctx.declare(name.text(), Value::string(err.to_string()));
                                }
                                i += 2;
                            }
                            None => i += 1,
                        },
                    }
                }
                Tok::Catch => i = stmt.target() + 1,
                Tok::Return => {
                    let value = if stmt.args().is_empty() {
                        Value::empty_string()
                    } else {
                        self.evaluate(stmt.args())?
                    };
                    self.ctx.truncate_scopes(base_scope);
                    return Ok(Flow::Return(value));
                }
                Tok::Exit | Tok::Quit => {
                    self.exit_requested = true;
                    self.ctx.truncate_scopes(base_scope);
                    return Ok(Flow::Exit);
                }
                _ => {
                    self.execute_simple(&stmt.tokens)?;
                    i += 1;
                }
            }
        }
        self.ctx.truncate_scopes(base_scope);
        Ok(Flow::Normal)
    }

    /// Pop open constructs whose header matches `pred`, closing their scopes
    fn unwind(&mut self, active: &mut Vec<Active>, pred: impl Fn(usize) -> bool) {
        while let Some(top) = active.last() {
            if !pred(top.head()) {
                break;
            }
            if let Some(scope) = top.scope() {
                self.ctx.truncate_scopes(scope);
            }
            active.pop();
        }
    }

    fn condition(&mut self, stmt: &Statement) -> Result<bool> {
        Ok(self.evaluate(stmt.args())?.as_bool())
    }

    // =========================================================================
    // Loops
    // =========================================================================

    /// `for (init; test; step)`. Returns whether the body runs.
    fn for_clauses(
        &mut self,
        stmt: &Statement,
        head: usize,
        from_end: bool,
        active: &mut Vec<Active>,
    ) -> Result<bool> {
        let args = stmt.args();
        let mut clauses = args.split(|t| t.tok == Tok::Semicolon);
        let init = clauses.next().unwrap_or(&[]);
        let test = clauses.next().unwrap_or(&[]);
        let step = clauses.next().unwrap_or(&[]);
        if from_end {
            if !step.is_empty() {
                self.execute_simple(step)?;
            }
        } else {
            let scope = self.ctx.scope_depth();
            active.push(Active::Loop { head, scope });
            self.ctx.push_scope();
            if !init.is_empty() {
                self.execute_simple(init)?;
            }
        }
        if test.is_empty() {
            return Ok(true);
        }
        Ok(self.evaluate(test)?.as_bool())
    }

    /// `for (var x in list)`. Returns whether the body runs.
    fn for_in(
        &mut self,
        stmt: &Statement,
        head: usize,
        from_end: bool,
        active: &mut Vec<Active>,
    ) -> Result<bool> {
        let (declare, name, list) = match stmt.args() {
            [var, name, in_tok, list @ ..] if var.tok == Tok::Var && in_tok.tok == Tok::In => {
                (true, name.text(), list)
            }
            [name, in_tok, list @ ..] if in_tok.tok == Tok::In => (false, name.text(), list),
            _ => return Err(Error::UnexpectedToken(stmt.to_string())),
        };
        if !from_end {
            let items = loop_items(self.evaluate(list)?);
            let scope = self.ctx.scope_depth();
            active.push(Active::ForIn {
                head,
                scope,
                items,
                next: 0,
            });
            self.ctx.push_scope();
        }
        let item = match active.last_mut() {
            Some(Active::ForIn {
                head: h,
                items,
                next,
                ..
            }) if *h == head => {
                let item = items.get(*next).cloned();
                *next += 1;
                item
            }
            _ => None,
        };
        match item {
            Some(value) => {
                if declare {
                    self.ctx.declare(name, value);
                } else {
                    self.ctx.assign(name, value);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Try / catch
    // =========================================================================

    /// Run the body stored on a `try` statement in its own scope
    fn run_try(&mut self, stmt: &Statement) -> Result<TryOutcome> {
        let Some(TokenValue::Function(body)) = stmt.command().map(|t| &t.value) else {
            return Err(Error::UnexpectedToken("try".to_string()));
        };
        let body = body.clone();
        let depth = self.ctx.scope_depth();
        self.ctx.push_scope();
        let outcome = self.run_block(Some(&body), &body.statements, 0, body.statements.len());
        self.ctx.truncate_scopes(depth);
        match outcome {
            Ok(Flow::Normal) => Ok(TryOutcome::Finished),
            Ok(flow) => Ok(TryOutcome::Flow(flow)),
            Err(err) if err.is_recoverable() => {
                tracing::debug!(line = stmt.line, error = %err, "error caught");
                Ok(TryOutcome::Caught(err))
            }
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Simple statements
    // =========================================================================

    /// Statements that never move the program counter
    fn execute_simple(&mut self, tokens: &[Token]) -> Result<()> {
        let Some(command) = tokens.first() else {
            return Ok(());
        };
        let args = &tokens[1..];
        match command.tok {
            Tok::Var => self.declare_vars(args),
            Tok::Set => self.assign_statement(args),
            Tok::Print => {
                let line = self.line_text(args)?;
                self.ctx.write_line(line);
                Ok(())
            }
            Tok::Log => {
                let line = self.line_text(args)?;
                tracing::debug!(target: "molscript::script", "{}", line);
                self.ctx.write_line(line);
                Ok(())
            }
            Tok::Evaluate => self.evaluate(args).map(|_| ()),
            Tok::Define => {
                let Some(name) = args.first() else {
                    return Err(Error::UnexpectedToken("define".to_string()));
                };
                let end = matching_expression_end(args, 1);
                let set = evaluate_selection(self, args.get(2..end).unwrap_or(&[]))?;
                self.ctx.define(name.text(), set);
                Ok(())
            }
            Tok::HostCommand => {
                let values = self.host_args(args)?;
                let call = HostCall::new(command.text().to_ascii_lowercase(), values);
                self.ctx.host_command(self.runtime.host, call)
            }
            t if t.is_atom_expression_command() => {
                let mut values = Vec::new();
                if args.first().map(|a| a.tok) == Some(Tok::ExpressionBegin) {
                    let end = matching_expression_end(args, 0);
                    let set = evaluate_selection(self, args.get(1..end).unwrap_or(&[]))?;
                    values.push(Value::Bitset(set));
                }
                self.ctx
                    .host_command(self.runtime.host, HostCall::new(t.text(), values))
            }
            t if t.implicit_string().is_some() => {
                let text = match args.first() {
                    None => None,
                    Some(arg) if arg.tok == Tok::String => Some(arg.text().to_string()),
                    Some(_) => Some(self.evaluate(&args[..1])?.as_string()),
                };
                if matches!(t, Tok::Echo | Tok::Message) {
                    self.ctx.write_line(text.clone().unwrap_or_default());
                }
                let values = text.map(Value::string).into_iter().collect();
                self.ctx
                    .host_command(self.runtime.host, HostCall::new(t.text(), values))
            }
            t => Err(Error::UnexpectedToken(t.text().to_string())),
        }
    }

    fn line_text(&mut self, args: &[Token]) -> Result<String> {
        if args.is_empty() {
            return Ok(String::new());
        }
        Ok(self.evaluate(args)?.as_string())
    }

    /// `var x = value` or `var a, b`
    fn declare_vars(&mut self, args: &[Token]) -> Result<()> {
        match args {
            [name, assign, value @ ..] if assign.tok == Tok::Assign => {
                let value = self.evaluate(value)?;
                self.ctx.declare(name.text(), value);
            }
            names => {
                for name in names {
                    self.ctx.declare_default(name.text());
                }
            }
        }
        Ok(())
    }

    /// `name[path]... = value`
    fn assign_statement(&mut self, args: &[Token]) -> Result<()> {
        let Some(name) = args.first() else {
            return Err(Error::UnexpectedToken("set".to_string()));
        };
        let Some(assign) = args.iter().position(|t| t.tok == Tok::Assign) else {
            return Err(Error::UnexpectedToken(name.text().to_string()));
        };
        let path = self.assignment_path(&args[1..assign])?;
        let value = self.evaluate(&args[assign + 1..])?;
        if path.is_empty() {
            self.ctx.assign(name.text(), value);
            return Ok(());
        }
        let root = match self.ctx.get(name.text()) {
            Some(current) => current.clone(),
            None => empty_container(&path[0]),
        };
        let updated = set_path(root, &path, value)?;
        self.ctx.assign(name.text(), updated);
        Ok(())
    }

    fn assignment_path(&mut self, tokens: &[Token]) -> Result<Vec<PathKey>> {
        let mut path = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.tok {
                Tok::PropSelector => {
                    path.push(PathKey::Key(token.text().to_string()));
                    i += 1;
                }
                Tok::LeftSquare => {
                    let close = matching_close(tokens, i, Tok::LeftSquare, Tok::RightSquare)
                        .ok_or(Error::EndOfExpression)?;
                    let key = self.evaluate(&tokens[i + 1..close])?;
                    path.push(path_key(&key));
                    i = close + 1;
                }
                _ => return Err(Error::UnexpectedToken(token.to_string())),
            }
        }
        Ok(path)
    }

    /// Evaluate host command arguments. Compiled groups become one value
    /// each; bare words pass through as strings.
    fn host_args(&mut self, args: &[Token]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        let mut i = 0;
        while i < args.len() {
            let token = &args[i];
            let close = match token.tok {
                Tok::LeftParen => matching_close(args, i, Tok::LeftParen, Tok::RightParen),
                Tok::ExpressionBegin => Some(matching_expression_end(args, i)),
                Tok::CoordinateBegin => matching_close(args, i, Tok::CoordinateBegin, Tok::CoordinateEnd),
                Tok::HashBegin => matching_close(args, i, Tok::HashBegin, Tok::HashEnd),
                Tok::AtVar | Tok::AtExpr => Some(i),
                _ => None,
            };
            match close {
                Some(close) => {
                    let group = args.get(i..=close).ok_or(Error::EndOfExpression)?;
                    values.push(self.evaluate(group)?);
                    i = close + 1;
                }
                None => {
                    values.push(match token.literal_value() {
                        Some(value) => value,
                        None => Value::string(token.to_string()),
                    });
                    i += 1;
                }
            }
        }
        Ok(values)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Call a user function with a fresh frame
    fn call_user(&mut self, function: Arc<ScriptFunction>, args: Vec<Value>) -> Result<Value> {
        if args.len() > function.arity() {
            return Err(Error::ArityMismatch {
                name: function.name.clone(),
                expected: function.arity().to_string(),
                got: args.len(),
            });
        }
        let max_depth = self.runtime.config.max_call_depth;
        if self.ctx.call_depth() >= max_depth {
            return Err(Error::CallDepthExceeded(max_depth));
        }

        let mut bindings = FxHashMap::default();
        let mut args = args.into_iter();
        for param in &function.params {
            bindings.insert(param.clone(), args.next().unwrap_or_else(Value::empty_string));
        }
        self.ctx.push_frame(Frame::with_bindings(bindings));
        let collect = (function.kind == FunctionKind::Parallel).then(Vec::new);
        let saved_jobs = std::mem::replace(&mut self.jobs, collect);
        tracing::trace!(name = %function.name, depth = self.ctx.call_depth(), "call");

        // Each script call nests several native frames; grow onto the heap
        // before the thread stack runs out
        let flow = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.run_block(
                Some(&function),
                &function.statements,
                0,
                function.statements.len(),
            )
        });
        let jobs = std::mem::replace(&mut self.jobs, saved_jobs);
        let flow = match (flow, jobs) {
            (Ok(flow), Some(jobs)) if !jobs.is_empty() => self.run_jobs(jobs).map(|_| flow),
            (flow, _) => flow,
        };
        self.ctx.pop_frame();

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::empty_string()),
            Flow::Exit => {
                self.exit_requested = true;
                Ok(Value::empty_string())
            }
        }
    }

    /// Run the `process` blocks of a parallel function and merge them in
    /// the order they were reached
    fn run_jobs(&mut self, jobs: Vec<ProcessJob>) -> Result<()> {
        let runtime = self.runtime;
        let results = runtime.coordinator.execute(jobs, |index, job| {
            let _span = tracing::debug_span!("process", index).entered();
            let mut worker = Interpreter::new(runtime, job.ctx);
            worker.run_block(Some(&job.owner), &job.owner.statements, job.start, job.end)?;
            Ok(worker.ctx)
        })?;
        runtime
            .coordinator
            .merge(&mut self.ctx, results, runtime.host)
    }
}

impl EvalEnv for Interpreter<'_> {
    #[inline]
    fn host(&self) -> &dyn ScriptHost {
        self.runtime.host
    }

    #[inline]
    fn universe(&self) -> u32 {
        self.universe
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.ctx.get(name).cloned()
    }

    fn defined_set(&self, name: &str) -> Option<BitSet> {
        self.ctx.defined(name).cloned()
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        if let Some(function) = self.runtime.functions.get(name) {
            return self.call_user(function.clone(), args);
        }
        match self.runtime.registry.call(name, &args, self.runtime.host) {
            Some(result) => result,
            None => Err(Error::UndefinedFunction(name.to_string())),
        }
    }

    fn log_rpn(&self) -> bool {
        self.runtime.config.log_rpn
    }
}

// =========================================================================
// Jump helpers
// =========================================================================

/// The `end` of the if-chain containing the branch at `index`
fn chain_end(stmts: &[Statement], index: usize) -> usize {
    let mut at = index;
    while let Some(stmt) = stmts.get(at) {
        if stmt.tok() == Tok::End {
            return at;
        }
        let next = stmt.target();
        if next <= at {
            break;
        }
        at = next;
    }
    stmts.len()
}

/// `(end index, header index)` of the construct a break/continue leaves
fn loop_bounds(stmts: &[Statement], stmt: &Statement) -> Result<(usize, usize)> {
    let end = stmt.target();
    match stmts.get(end) {
        Some(end_stmt) if end_stmt.tok() == Tok::End => Ok((end, end_stmt.target())),
        _ => Err(Error::UnexpectedToken(stmt.to_string())),
    }
}

/// Items a `for (x in value)` loop visits
fn loop_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(list) => list.read().clone(),
        Value::Bitset(set) => set
            .iter()
            .map(|i| Value::Bitset(std::iter::once(i).collect()))
            .collect(),
        Value::Map(map) => map.read().keys().map(Value::string).collect(),
        other => vec![other],
    }
}

/// Index of the token closing the group opened at `open_at`
fn matching_close(tokens: &[Token], open_at: usize, open: Tok, close: Tok) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open_at) {
        if t.tok == open {
            depth += 1;
        } else if t.tok == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

// =========================================================================
// Assignment paths
// =========================================================================

fn path_key(key: &Value) -> PathKey {
    match key {
        Value::Integer(i) => PathKey::Index(*i),
        Value::Float(f) => PathKey::Index(*f as i32),
        Value::String(s) => match string_to_integer(s) {
            Some(i) => PathKey::Index(i),
            None => PathKey::Key(s.to_string()),
        },
        other => PathKey::Index(other.as_int()),
    }
}

fn empty_container(key: &PathKey) -> Value {
    match key {
        PathKey::Index(_) => Value::array(Vec::new()),
        PathKey::Key(_) => Value::map(Default::default()),
    }
}

/// Store `value` at `path` inside `target`, returning the updated target.
/// Arrays and maps are updated in place; strings and matrices are rebuilt.
fn set_path(mut target: Value, path: &[PathKey], value: Value) -> Result<Value> {
    let Some((key, rest)) = path.split_first() else {
        return Ok(value);
    };
    if matches!(target, Value::Matrix3(_) | Value::Matrix4(_)) {
        if let (PathKey::Index(row), [PathKey::Index(col)]) = (key, rest) {
            if !target.set_selected(row * 10 + col, &value) {
                return Err(Error::invalid_argument(format!(
                    "no matrix element [{}][{}]",
                    row, col
                )));
            }
            return Ok(target);
        }
    }
    let item = if rest.is_empty() {
        value
    } else {
        let child = get_item(&target, key).unwrap_or_else(|| empty_container(&rest[0]));
        set_path(child, rest, value)?
    };
    set_item(&mut target, key, item)?;
    Ok(target)
}

fn get_item(target: &Value, key: &PathKey) -> Option<Value> {
    match (target, key) {
        (Value::Map(map), PathKey::Key(k)) => map.read().get(k).cloned(),
        (Value::Map(map), PathKey::Index(i)) => map.read().get(&i.to_string()).cloned(),
        (Value::Array(list), PathKey::Index(i)) => {
            let list = list.read();
            let len = list.len() as i32;
            let pos = if *i <= 0 { len + i } else { *i } - 1;
            usize::try_from(pos).ok().and_then(|p| list.get(p).cloned())
        }
        _ => None,
    }
}

/// `""` and `{}` turn into a map on first keyed assignment
fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Bitset(set) => set.is_empty(),
        _ => false,
    }
}

fn set_item(target: &mut Value, key: &PathKey, item: Value) -> Result<()> {
    if let Value::Map(map) = target {
        let k = match key {
            PathKey::Key(k) => k.clone(),
            PathKey::Index(i) => i.to_string(),
        };
        map.write().insert(k, item);
        return Ok(());
    }
    let stored = match key {
        PathKey::Key(k) if is_blank(target) => {
            *target = Value::map(std::iter::once((k.clone(), item)).collect());
            true
        }
        PathKey::Key(_) => false,
        PathKey::Index(i) => target.set_selected(*i, &item),
    };
    if stored {
        return Ok(());
    }
    let step = match key {
        PathKey::Index(i) => format!("[{}]", i),
        PathKey::Key(k) => format!(".{}", k),
    };
    Err(Error::invalid_argument(format!(
        "cannot assign {} of {}",
        step,
        target.type_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NullHost;
    use crate::parser::compile;

    fn run_with(script: &str, config: EngineConfig) -> Result<(Flow, ExecutionContext)> {
        let program = compile(script)?;
        let registry = FunctionRegistry::new();
        let coordinator = ParallelCoordinator::new(config.parallel.clone());
        let runtime = Runtime {
            functions: &program.functions,
            host: &NullHost,
            registry: &registry,
            config: &config,
            coordinator: &coordinator,
        };
        let mut interpreter = Interpreter::new(runtime, ExecutionContext::new());
        let flow = interpreter.run(&program.statements)?;
        Ok((flow, interpreter.into_context()))
    }

    fn output(script: &str) -> Vec<String> {
        let (_, ctx) = run_with(script, EngineConfig::default()).unwrap();
        ctx.effects().output.clone()
    }

    #[test]
    fn test_if_chain() {
        let script = "x = 2\nif (x == 1) {\n print \"one\"\n} elseif (x == 2) {\n print \"two\"\n} else {\n print \"other\"\n}";
        assert_eq!(output(script), vec!["two"]);
        let script = "x = 5\nif (x == 1) {\n print \"one\"\n} elseif (x == 2) {\n print \"two\"\n} else {\n print \"other\"\n}\nprint \"after\"";
        assert_eq!(output(script), vec!["other", "after"]);
        let script = "if (true) {\n print 1\n} else {\n print 2\n}\nprint 3";
        assert_eq!(output(script), vec!["1", "3"]);
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            output("for (var i = 0; i < 3; i++) {\n print i\n}"),
            vec!["0", "1", "2"]
        );
        assert_eq!(output("i = 0\nwhile (i < 2)\n i++\nend while\nprint i"), vec!["2"]);
        assert_eq!(
            output("for (x in [\"a\", \"b\"]) {\n print x\n}"),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_break_and_continue() {
        let script = "for (var i = 0; i < 10; i++) {\n if (i == 1) {\n  continue\n }\n if (i == 3) {\n  break\n }\n print i\n}";
        assert_eq!(output(script), vec!["0", "2"]);
    }

    #[test]
    fn test_switch_fall_through() {
        let script = "n = 2\nswitch (n) {\ncase 1: print \"one\"\ncase 2: print \"two\"\ncase 3: print \"three\"; break\ndefault: print \"many\"\n}";
        assert_eq!(output(script), vec!["two", "three"]);
        let script = "n = 9\nswitch (n) {\ncase 1: print \"one\"; break\ndefault: print \"many\"\n}";
        assert_eq!(output(script), vec!["many"]);
    }

    #[test]
    fn test_block_scope() {
        let script = "x = 1\n{\n var x = 2\n print x\n}\nprint x";
        assert_eq!(output(script), vec!["2", "1"]);
    }

    #[test]
    fn test_functions_and_recursion() {
        let script = "function fact(n) {\n if (n <= 1) {\n  return 1\n }\n return n * fact(n - 1)\n}\nprint fact(5)";
        assert_eq!(output(script), vec!["120"]);

        // called before the definition, so only the run can check it
        let err = run_with("print f(1)\nfunction f() {\n return 1\n}", EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));

        let config = EngineConfig::default().with_max_call_depth(16);
        let err = run_with("function f(n) {\n return f(n + 1)\n}\nprint f(0)", config).unwrap_err();
        assert_eq!(err, Error::CallDepthExceeded(16));
    }

    #[test]
    fn test_try_catch() {
        let script = "try {\n x = 1 + {1 2 3}\n print \"unreached\"\n} catch (e) {\n print \"caught\"\n}\nprint \"done\"";
        assert_eq!(output(script), vec!["caught", "done"]);
        let script = "try {\n print \"ok\"\n} catch (e) {\n print \"caught\"\n}";
        assert_eq!(output(script), vec!["ok"]);
    }

    #[test]
    fn test_indexed_assignment() {
        let (_, ctx) = run_with(
            "a = [1, 2, 3]\na[2] = 9\nm = {}\nm[\"k\"] = 4\nm.z = 5\ns = \"abc\"\ns[1] = \"X\"",
            EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(ctx.get("a").unwrap().as_string(), "1\n9\n3");
        assert_eq!(ctx.get("s").unwrap().as_string(), "Xbc");
        let Some(Value::Map(m)) = ctx.get("m") else {
            panic!("m should be a map");
        };
        assert_eq!(m.read().get("k"), Some(&Value::Integer(4)));
        assert_eq!(m.read().get("z"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_exit_and_return() {
        let (flow, ctx) = run_with("print 1\nexit\nprint 2", EngineConfig::default()).unwrap();
        assert_eq!(flow, Flow::Exit);
        assert_eq!(ctx.effects().output, vec!["1"]);

        let (flow, _) = run_with("return 3 + 4", EngineConfig::default()).unwrap();
        assert_eq!(flow, Flow::Return(Value::Integer(7)));
    }

    #[test]
    fn test_host_commands_recorded() {
        let (_, ctx) = run_with("zoom 50\necho hello\nselect all", EngineConfig::default()).unwrap();
        let names: Vec<&str> = ctx.effects().commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zoom", "echo", "select"]);
        assert_eq!(ctx.effects().commands[0].args, vec![Value::Integer(50)]);
        assert_eq!(ctx.effects().output, vec!["hello"]);
    }
}
