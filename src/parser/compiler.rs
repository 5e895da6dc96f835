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

//! Script compiler driver
//!
//! Pulls tokens from the [`Lexer`], cuts them into statements, hands each
//! statement to the [`StatementCompiler`] and the result to the
//! [`FlowResolver`]. Brace-delimited bodies are recognized here: a `{` that
//! follows a flow header opens its body, and the matching `}` closes it as
//! an `end` would.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::error::CompileError;
use super::expressions::RawToken;
use super::flow::FlowResolver;
use super::lexer::{LexContext, Lexeme, Lexer, Span};
use super::program::{Program, ScriptFunction, Statement};
use super::statements::StatementCompiler;
use super::token::{FlowKind, Tok, Token, TokenValue};

type CResult<T> = Result<T, CompileError>;

/// Compile a script into a [`Program`]
///
/// Compilation stops at the first error, which carries the line and the
/// statement text with the error point marked.
///
/// # Example
///
/// ```
/// let program = molscript::compile("x = 2\nprint x * 3").unwrap();
/// assert_eq!(program.len(), 2);
/// ```
pub fn compile(script: &str) -> Result<Program, CompileError> {
    CompilerState::new(script).run()
}

/// Headers whose body may follow in braces
fn opens_body(tok: Tok) -> bool {
    matches!(
        tok,
        Tok::If
            | Tok::ElseIf
            | Tok::Else
            | Tok::While
            | Tok::For
            | Tok::Switch
            | Tok::Try
            | Tok::Catch
            | Tok::FunctionDef
            | Tok::Parallel
            | Tok::Process
    )
}

struct CompilerState<'a> {
    script: &'a str,
    lexer: Lexer<'a>,
    /// Tokens of the statement being read
    pending: Vec<RawToken>,
    /// Open braces within `pending`
    brace_depth: i32,
    flow: FlowResolver,
    functions: FxHashMap<String, Arc<ScriptFunction>>,
    /// The last statement was a header that can take a `{` body
    expecting_body: bool,
}

impl<'a> CompilerState<'a> {
    fn new(script: &'a str) -> Self {
        Self {
            script,
            lexer: Lexer::new(script),
            pending: Vec::new(),
            brace_depth: 0,
            flow: FlowResolver::new(),
            functions: FxHashMap::default(),
            expecting_body: false,
        }
    }

    fn run(mut self) -> CResult<Program> {
        loop {
            let ctx = LexContext {
                command: self.pending.first().map(|(t, _)| t),
                n_tokens: self.pending.len(),
                last: self.pending.last().map(|(t, _)| t.tok),
            };
            let lexeme = match self.lexer.next(&ctx) {
                Ok(lexeme) => lexeme,
                Err(err) => {
                    let start = self.pending.first().map(|(_, s)| s.start);
                    let at = err.offset.unwrap_or(self.lexer.position());
                    let start = start.unwrap_or(at);
                    let end = line_end(self.script, at);
                    let line = self.pending.first().map_or(self.lexer.line(), |(_, s)| s.line);
                    let index = self.flow.statements().len();
                    return Err(err.locate(self.script, line, index, start, end, at));
                }
            };
            match lexeme {
                Lexeme::EndOfScript => {
                    self.end_statement()?;
                    break;
                }
                Lexeme::EndOfStatement => self.end_statement()?,
                Lexeme::Token(token, span) => self.accept(token, span)?,
            }
        }
        self.finish()
    }

    fn accept(&mut self, token: Token, span: Span) -> CResult<()> {
        if self.pending.is_empty() {
            match token.tok {
                Tok::LeftBrace => return self.open_brace(span),
                Tok::RightBrace => return self.close_brace(span),
                _ => self.expecting_body = false,
            }
            self.pending.push((token, span));
            return Ok(());
        }

        if let [(head, _)] = self.pending.as_slice() {
            if matches!(head.tok, Tok::Else | Tok::Try | Tok::Process)
                && !matches!(token.tok, Tok::LeftBrace | Tok::RightBrace)
            {
                if head.tok == Tok::Else && token.tok == Tok::If {
                    let start = self.pending[0].1;
                    let merged = Span {
                        start: start.start,
                        end: span.end,
                        line: start.line,
                    };
                    self.pending[0] = (Token::with_text(Tok::ElseIf, "elseif"), merged);
                    return Ok(());
                }
                self.end_statement()?;
                return self.accept(token, span);
            }
        }

        match token.tok {
            Tok::LeftBrace if self.brace_depth == 0 && self.header_ready() => {
                self.end_statement()?;
                self.open_brace(span)
            }
            Tok::LeftBrace => {
                self.brace_depth += 1;
                self.pending.push((token, span));
                Ok(())
            }
            Tok::RightBrace if self.brace_depth > 0 => {
                self.brace_depth -= 1;
                self.pending.push((token, span));
                Ok(())
            }
            Tok::RightBrace => {
                self.end_statement()?;
                self.close_brace(span)
            }
            Tok::Colon
                if self.brace_depth == 0
                    && self.lexer.paren_depth() <= 0
                    && matches!(self.pending[0].0.tok, Tok::Case | Tok::Default) =>
            {
                self.end_statement()
            }
            _ => {
                self.pending.push((token, span));
                Ok(())
            }
        }
    }

    /// Whether the pending statement is a complete header, so that a `{`
    /// now opens its body
    fn header_ready(&self) -> bool {
        let Some((head, _)) = self.pending.first() else {
            return false;
        };
        if !opens_body(head.tok) || self.lexer.paren_depth() > 0 {
            return false;
        }
        match (head.tok, self.pending.len()) {
            (Tok::Else | Tok::Try | Tok::Process | Tok::Catch, 1) => true,
            (Tok::FunctionDef | Tok::Parallel, 2) => true,
            _ => self
                .pending
                .last()
                .is_some_and(|(t, _)| t.tok == Tok::RightParen),
        }
    }

    fn locate(&self, err: CompileError, line: usize, range: (usize, usize)) -> CompileError {
        let at = err.offset.unwrap_or(range.1);
        let index = self.flow.statements().len();
        err.locate(self.script, line, index, range.0, range.1, at)
    }

    /// Compile the pending tokens as one statement
    fn end_statement(&mut self) -> CResult<()> {
        let dropped = self.lexer.take_dropped();
        self.lexer.begin_statement();
        self.brace_depth = 0;
        let raw = std::mem::take(&mut self.pending);
        let (Some((_, first)), Some((_, last))) = (raw.first(), raw.last()) else {
            return Ok(());
        };
        if dropped {
            return Ok(());
        }
        let line = first.line;
        let range = (first.start, last.end);
        let compiled = StatementCompiler::new(self.script, &self.functions).compile(&raw);
        let tokens = compiled.map_err(|err| self.locate(err, line, range))?;
        if tokens.is_empty() {
            return Ok(());
        }
        let stmt = Statement::new(tokens, line, range);
        tracing::debug!(line, statement = %stmt, "statement compiled");
        self.expecting_body = opens_body(stmt.tok());
        self.flow
            .add(stmt, &mut self.functions)
            .map_err(|err| self.locate(err, line, range))
    }

    fn open_brace(&mut self, span: Span) -> CResult<()> {
        let body = std::mem::take(&mut self.expecting_body);
        if body && self.flow.open_body() {
            return Ok(());
        }
        let stmt = Statement::new(vec![Token::new(Tok::Push)], span.line, (span.start, span.end));
        self.flow
            .add(stmt, &mut self.functions)
            .map_err(|err| self.locate(err, span.line, (span.start, span.end)))
    }

    fn close_brace(&mut self, span: Span) -> CResult<()> {
        self.expecting_body = false;
        let next = self.lexer.peek_word();
        let continues = next.eq_ignore_ascii_case("else") || next.eq_ignore_ascii_case("elseif");
        let end = Statement::new(
            vec![Token::with_value(Tok::End, TokenValue::Flow(FlowKind::Block))],
            span.line,
            (span.start, span.end),
        );
        self.flow
            .close_brace(end, continues, &mut self.functions)
            .map_err(|err| self.locate(err.at(span.start), span.line, (span.start, span.end)))
    }

    fn finish(self) -> CResult<Program> {
        let statements = match self.flow.finish() {
            Ok(statements) => statements,
            Err((err, head)) => {
                let (line, range, index) = match head {
                    Some(stmt) => (stmt.line, stmt.range, 0),
                    None => (self.lexer.line(), (self.script.len(), self.script.len()), 0),
                };
                let at = range.1;
                return Err(err.locate(self.script, line, index, range.0, range.1, at));
            }
        };
        Ok(Program {
            script: Arc::from(self.script),
            statements,
            functions: self.functions,
        })
    }
}

fn line_end(script: &str, from: usize) -> usize {
    script
        .get(from..)
        .and_then(|rest| rest.find('\n'))
        .map_or(script.len(), |i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::error::CompileErrorKind;

    fn toks(program: &Program) -> Vec<Tok> {
        program.statements.iter().map(Statement::tok).collect()
    }

    fn error(script: &str) -> CompileError {
        compile(script).unwrap_err()
    }

    #[test]
    fn test_statements_and_lines() {
        let program = compile("x = 1\nprint x; print x + 1\n\n// done\n").unwrap();
        assert_eq!(toks(&program), vec![Tok::Set, Tok::Print, Tok::Print]);
        assert_eq!(program.line_numbers(), vec![1, 2, 2]);
        assert_eq!(program.statements[0].to_infix(), "set x = 1");
    }

    #[test]
    fn test_brace_bodies() {
        let program = compile("if (x > 1) { print 1 } else { print 2 }").unwrap();
        assert_eq!(
            toks(&program),
            vec![Tok::If, Tok::Print, Tok::Else, Tok::Print, Tok::End]
        );
        assert_eq!(program.statements[0].target(), 2);
        assert_eq!(program.statements[2].target(), 4);

        let program = compile("if (a) {\n  print 1\n}\nelse if (b) {\n  print 2\n}").unwrap();
        assert_eq!(
            toks(&program),
            vec![Tok::If, Tok::Print, Tok::ElseIf, Tok::Print, Tok::End]
        );
    }

    #[test]
    fn test_end_style_bodies() {
        let program = compile("while (i < 3)\n i++\nend while").unwrap();
        assert_eq!(toks(&program), vec![Tok::While, Tok::Set, Tok::End]);
        assert_eq!(program.statements[0].target(), 2);
        assert_eq!(program.statements[2].target(), 0);
    }

    #[test]
    fn test_switch_case_colons() {
        let program =
            compile("switch (n) {\ncase 1: print \"one\"; break\ndefault: print \"many\"\n}").unwrap();
        assert_eq!(
            toks(&program),
            vec![
                Tok::Switch,
                Tok::Case,
                Tok::Print,
                Tok::Break,
                Tok::Default,
                Tok::Print,
                Tok::End
            ]
        );
        assert_eq!(program.statements[1].target(), 4);
        assert_eq!(program.statements[3].target(), 6);
    }

    #[test]
    fn test_plain_block() {
        let program = compile("{ print 1 }").unwrap();
        assert_eq!(toks(&program), vec![Tok::Push, Tok::Print, Tok::End]);
    }

    #[test]
    fn test_function_extracted() {
        let program = compile("function add(a, b) {\n return a + b\n}\nprint add(1, 2)").unwrap();
        assert_eq!(toks(&program), vec![Tok::Print]);
        let add = program.function("add").unwrap();
        assert_eq!(add.params, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(add.statements.len(), 1);
    }

    #[test]
    fn test_try_catch() {
        let program = compile("try { x = 1 / 0 } catch (e) { print e }").unwrap();
        assert_eq!(toks(&program), vec![Tok::Try, Tok::Catch, Tok::Print, Tok::End]);
    }

    #[test]
    fn test_missing_end() {
        let err = error("if (x) {\n print 1\n} elseif (y) {\n print 2\n");
        assert_eq!(err.kind, CompileErrorKind::MissingEnd);
        assert_eq!(err.message(), "missing END for if");
    }

    #[test]
    fn test_bad_context() {
        let err = error("if (x)\n print 1\nend while");
        assert_eq!(err.message(), "invalid context for end while");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_located_error() {
        let err = error("print 1\nprint (2 +");
        assert_eq!(err.line, 2);
        assert_eq!(err.command_index, 1);
        assert!(err.format_error().contains("line 2 command 2"));
    }

    #[test]
    fn test_dropped_statement() {
        let program = compile("print 1 #jc\nprint 2").unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_stray_close_brace() {
        let err = error("print 1\n}");
        assert_eq!(err.kind, CompileErrorKind::TokenUnexpected);
    }
}
