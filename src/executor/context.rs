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

//! Execution Context
//!
//! Variable storage and the side-effect surface of a script run. Globals
//! live in one map; every function call pushes a [`Frame`] whose scopes are
//! searched innermost first. A parallel worker runs on a [`fork`] of the
//! context and its writes are replayed onto the parent by [`merge`].
//!
//! [`fork`]: ExecutionContext::fork
//! [`merge`]: ExecutionContext::merge

use rustc_hash::FxHashMap;

use crate::api::ScriptHost;
use crate::core::{BitSet, Result, Value};

/// A command forwarded to the host
#[derive(Debug, Clone, PartialEq)]
pub struct HostCall {
    /// Lowercased command name
    pub name: String,
    pub args: Vec<Value>,
}

impl HostCall {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Everything a script did that the caller can observe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideEffects {
    /// Lines written by `print`, `log`, `echo` and `message`
    pub output: Vec<String>,
    /// Host commands in issue order
    pub commands: Vec<HostCall>,
}

impl SideEffects {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.output.is_empty() && self.commands.is_empty()
    }
}

/// Local scopes of one function activation
#[derive(Debug, Clone, Default)]
pub struct Frame {
    scopes: Vec<FxHashMap<String, Value>>,
}

impl Frame {
    /// A frame with one scope holding the given bindings
    pub fn with_bindings(bindings: FxHashMap<String, Value>) -> Self {
        Self {
            scopes: vec![bindings],
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.scopes.iter().rposition(|s| s.contains_key(name))
    }
}

/// Where a tracked write landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteTarget {
    Global,
    Local,
}

/// Writes a forked context made to state its parent can see
#[derive(Debug, Clone, Default)]
struct WriteTracker {
    /// Scopes of the forked frame that belong to the parent
    base_scopes: usize,
    written: Vec<(String, WriteTarget)>,
    defined: Vec<String>,
}

impl WriteTracker {
    fn record(&mut self, name: &str, target: WriteTarget) {
        if !self.written.iter().any(|(n, t)| n == name && *t == target) {
            self.written.push((name.to_string(), target));
        }
    }
}

/// Variables, named sets and side effects of one script run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    globals: FxHashMap<String, Value>,
    /// Sets bound with `define`
    defined: FxHashMap<String, BitSet>,
    /// Function activations; the bottom frame is the top level
    frames: Vec<Frame>,
    pub(crate) effects: SideEffects,
    /// Queue host commands instead of dispatching them
    defer_commands: bool,
    tracking: Option<WriteTracker>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            globals: FxHashMap::default(),
            defined: FxHashMap::default(),
            frames: vec![Frame::default()],
            effects: SideEffects::default(),
            defer_commands: false,
            tracking: None,
        }
    }

    /// Context seeded with global variables
    pub fn with_globals(globals: FxHashMap<String, Value>) -> Self {
        let mut ctx = Self::new();
        for (name, value) in globals {
            ctx.globals.insert(name.to_lowercase(), value);
        }
        ctx
    }

    // =========================================================================
    // Variables
    // =========================================================================

    fn top(&self) -> &Frame {
        // frames is never empty: new() seeds one and pop_frame keeps it
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let n = self.frames.len();
        &mut self.frames[n - 1]
    }

    /// Look a variable up, innermost scope first, then globals
    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = name.to_lowercase();
        let frame = self.top();
        frame
            .scopes
            .iter()
            .rev()
            .find_map(|s| s.get(&name))
            .or_else(|| self.globals.get(&name))
    }

    /// Whether a variable is bound anywhere visible
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(&name.to_lowercase())
    }

    /// All global variables
    pub fn globals(&self) -> &FxHashMap<String, Value> {
        &self.globals
    }

    /// `var name = value`: bind in the innermost scope, or globally when
    /// no scope is open
    pub fn declare(&mut self, name: &str, value: Value) {
        let name = name.to_lowercase();
        if self.top().scopes.is_empty() {
            self.assign_global(&name, value);
        } else if let Some(scope) = self.top_mut().scopes.last_mut() {
            scope.insert(name, value);
        }
    }

    /// `var name`: bind `""` unless the innermost scope already has it
    pub fn declare_default(&mut self, name: &str) {
        let lower = name.to_lowercase();
        let exists = match self.top().scopes.last() {
            Some(scope) => scope.contains_key(&lower),
            None => self.globals.contains_key(&lower),
        };
        if !exists {
            self.declare(&lower, Value::empty_string());
        }
    }

    /// `name = value`: update the innermost binding, or create a global
    pub fn assign(&mut self, name: &str, value: Value) {
        let name = name.to_lowercase();
        let frames = self.frames.len();
        let frame = self.top_mut();
        match frame.find(&name) {
            Some(index) => {
                frame.scopes[index].insert(name.clone(), value);
                if let Some(tracker) = self.tracking.as_mut() {
                    if frames == 1 && index < tracker.base_scopes {
                        tracker.record(&name, WriteTarget::Local);
                    }
                }
            }
            None => self.assign_global(&name, value),
        }
    }

    pub fn assign_global(&mut self, name: &str, value: Value) {
        let name = name.to_lowercase();
        if let Some(tracker) = self.tracking.as_mut() {
            tracker.record(&name, WriteTarget::Global);
        }
        self.globals.insert(name, value);
    }

    /// Update a local binding only if one is visible
    fn assign_existing_local(&mut self, name: &str, value: Value) {
        let frame = self.top_mut();
        let Some(index) = frame.find(name) else {
            return;
        };
        frame.scopes[index].insert(name.to_string(), value);
        if let Some(tracker) = self.tracking.as_mut() {
            if self.frames.len() == 1 && index < tracker.base_scopes {
                tracker.record(name, WriteTarget::Local);
            }
        }
    }

    // =========================================================================
    // Named sets
    // =========================================================================

    pub fn define(&mut self, name: &str, set: BitSet) {
        let name = name.to_lowercase();
        if let Some(tracker) = self.tracking.as_mut() {
            if !tracker.defined.contains(&name) {
                tracker.defined.push(name.clone());
            }
        }
        self.defined.insert(name, set);
    }

    pub fn defined(&self, name: &str) -> Option<&BitSet> {
        self.defined.get(&name.to_lowercase())
    }

    // =========================================================================
    // Scopes and frames
    // =========================================================================

    #[inline]
    pub fn push_scope(&mut self) {
        self.top_mut().scopes.push(FxHashMap::default());
    }

    #[inline]
    pub fn pop_scope(&mut self) {
        self.top_mut().scopes.pop();
    }

    /// Scope depth of the current frame
    #[inline]
    pub fn scope_depth(&self) -> usize {
        self.top().depth()
    }

    /// Drop scopes opened past `depth`, after an unwinding jump
    pub fn truncate_scopes(&mut self, depth: usize) {
        self.top_mut().scopes.truncate(depth);
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of active function calls
    #[inline]
    pub fn call_depth(&self) -> usize {
        self.frames.len() - 1
    }

    // =========================================================================
    // Side effects
    // =========================================================================

    pub fn write_line(&mut self, line: impl Into<String>) {
        self.effects.output.push(line.into());
    }

    /// Log a host command and dispatch it unless this context defers
    pub fn host_command(&mut self, host: &dyn ScriptHost, call: HostCall) -> Result<()> {
        if !self.defer_commands {
            host.command(&call.name, &call.args)?;
        }
        self.effects.commands.push(call);
        Ok(())
    }

    #[inline]
    pub fn effects(&self) -> &SideEffects {
        &self.effects
    }

    /// Take the side effects collected so far
    pub fn take_effects(&mut self) -> SideEffects {
        std::mem::take(&mut self.effects)
    }

    #[inline]
    pub fn defers_commands(&self) -> bool {
        self.defer_commands
    }

    // =========================================================================
    // Fork and merge
    // =========================================================================

    /// Isolated copy for a parallel worker: globals, named sets and the
    /// current frame are deep-copied, a fresh scope is opened for the
    /// worker's own locals and host commands are deferred
    pub fn fork(&self) -> ExecutionContext {
        let copy_map = |m: &FxHashMap<String, Value>| {
            m.iter()
                .map(|(k, v)| (k.clone(), v.deep_clone()))
                .collect::<FxHashMap<_, _>>()
        };
        let mut frame = Frame {
            scopes: self.top().scopes.iter().map(copy_map).collect(),
        };
        let base_scopes = frame.depth();
        frame.scopes.push(FxHashMap::default());
        ExecutionContext {
            globals: copy_map(&self.globals),
            defined: self.defined.clone(),
            frames: vec![frame],
            effects: SideEffects::default(),
            defer_commands: true,
            tracking: Some(WriteTracker {
                base_scopes,
                ..Default::default()
            }),
        }
    }

    /// Replay a finished worker onto this context: output is appended, host
    /// commands are dispatched (or queued if this context defers), and
    /// every variable and named set the worker wrote is copied back
    pub fn merge(&mut self, worker: ExecutionContext, host: &dyn ScriptHost) -> Result<()> {
        let ExecutionContext {
            globals,
            mut defined,
            frames,
            effects,
            tracking,
            ..
        } = worker;
        self.effects.output.extend(effects.output);
        for call in effects.commands {
            self.host_command(host, call)?;
        }
        let Some(tracker) = tracking else {
            return Ok(());
        };
        for (name, target) in tracker.written {
            match target {
                WriteTarget::Global => {
                    if let Some(value) = globals.get(&name) {
                        self.assign_global(&name, value.clone());
                    }
                }
                WriteTarget::Local => {
                    let base = tracker.base_scopes;
                    let value = frames.first().and_then(|f| {
                        f.scopes[..base.min(f.depth())]
                            .iter()
                            .rev()
                            .find_map(|s| s.get(&name))
                    });
                    if let Some(value) = value {
                        self.assign_existing_local(&name, value.clone());
                    }
                }
            }
        }
        for name in tracker.defined {
            if let Some(set) = defined.remove(&name) {
                self.define(&name, set);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NullHost;

    #[test]
    fn test_global_and_scoped_lookup() {
        let mut ctx = ExecutionContext::new();
        ctx.declare("X", Value::Integer(1));
        assert_eq!(ctx.global("x"), Some(&Value::Integer(1)));

        ctx.push_scope();
        ctx.declare("x", Value::Integer(2));
        assert_eq!(ctx.get("x"), Some(&Value::Integer(2)));
        ctx.assign("x", Value::Integer(3));
        assert_eq!(ctx.global("x"), Some(&Value::Integer(1)));
        ctx.pop_scope();
        assert_eq!(ctx.get("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_assign_creates_global() {
        let mut ctx = ExecutionContext::new();
        ctx.push_scope();
        ctx.assign("y", Value::Integer(5));
        ctx.pop_scope();
        assert_eq!(ctx.get("y"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_frames_hide_caller_locals() {
        let mut ctx = ExecutionContext::new();
        ctx.push_scope();
        ctx.declare("a", Value::Integer(1));
        let mut params = FxHashMap::default();
        params.insert("b".to_string(), Value::Integer(2));
        ctx.push_frame(Frame::with_bindings(params));
        assert!(ctx.get("a").is_none());
        assert_eq!(ctx.get("b"), Some(&Value::Integer(2)));
        assert_eq!(ctx.call_depth(), 1);
        ctx.pop_frame();
        assert_eq!(ctx.get("a"), Some(&Value::Integer(1)));
        assert_eq!(ctx.call_depth(), 0);
    }

    #[test]
    fn test_fork_isolates_and_merge_replays() {
        let mut parent = ExecutionContext::new();
        parent.assign_global("shared", Value::array(vec![]));
        parent.push_scope();
        parent.declare("local", Value::Integer(0));

        let mut worker = parent.fork();
        worker.declare("mine", Value::Integer(9));
        worker.assign("local", Value::Integer(7));
        worker.assign_global("g", Value::string("w"));
        worker.define("site", [1u32, 2].into_iter().collect());
        worker.write_line("hello");
        worker
            .host_command(&NullHost, HostCall::new("color", vec![]))
            .unwrap();

        assert_eq!(parent.get("local"), Some(&Value::Integer(0)));
        assert!(parent.get("g").is_none());
        assert!(worker.effects().commands.len() == 1);

        parent.merge(worker, &NullHost).unwrap();
        assert_eq!(parent.get("local"), Some(&Value::Integer(7)));
        assert_eq!(parent.global("g"), Some(&Value::string("w")));
        assert!(parent.get("mine").is_none());
        assert_eq!(parent.defined("site").map(|s| s.cardinality()), Some(2));
        assert_eq!(parent.effects().output, vec!["hello".to_string()]);
        assert_eq!(parent.effects().commands[0].name, "color");
    }

    #[test]
    fn test_fork_deep_copies_arrays() {
        let mut parent = ExecutionContext::new();
        parent.assign_global("list", Value::array(vec![Value::Integer(1)]));
        let worker = parent.fork();
        if let Some(Value::Array(list)) = worker.get("list") {
            list.write().push(Value::Integer(2));
        }
        assert_eq!(parent.get("list").map(|v| v.size()), Some(1));
    }
}
