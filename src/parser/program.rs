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

//! Compiled program representation
//!
//! A [`Program`] is an ordered list of token statements plus the table of
//! user functions extracted from the script. Flow tokens carry jump targets
//! in their `int_value`, as indices into the statement list they live in.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::token::{FlowKind, Tok, Token, TokenValue};

/// One compiled statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Command token followed by its arguments
    pub tokens: Vec<Token>,
    /// Line number of the first token
    pub line: usize,
    /// Byte range in the script
    pub range: (usize, usize),
}

impl Statement {
    pub fn new(tokens: Vec<Token>, line: usize, range: (usize, usize)) -> Self {
        Self {
            tokens,
            line,
            range,
        }
    }

    /// Command token kind
    #[inline]
    pub fn tok(&self) -> Tok {
        self.tokens.first().map_or(Tok::Evaluate, |t| t.tok)
    }

    #[inline]
    pub fn command(&self) -> Option<&Token> {
        self.tokens.first()
    }

    /// Arguments after the command token
    #[inline]
    pub fn args(&self) -> &[Token] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    /// Jump target stored on the command token
    #[inline]
    pub fn target(&self) -> usize {
        self.tokens.first().map_or(0, |t| t.int_value.max(0) as usize)
    }

    /// Render as source text that compiles back to the same statement
    pub fn to_infix(&self) -> String {
        match self.tok() {
            Tok::For => render_for(self.args()),
            Tok::Catch => match self.args().first() {
                Some(name) => format!("catch ({})", name),
                None => "catch".to_string(),
            },
            Tok::End if self.tokens[0].flow_kind() == Some(FlowKind::Block) => "}".to_string(),
            Tok::Evaluate => render_tokens(self.args()),
            _ => render_tokens(&self.tokens),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_infix())
    }
}

/// Render tokens, turning compiled selection blocks back into infix
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut parts = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.tok == Tok::ExpressionBegin {
            let end = matching_expression_end(tokens, i);
            parts.push(format!("{{{}}}", selection_infix(&tokens[i + 1..end])));
            i = end + 1;
            continue;
        }
        parts.push(token.to_string());
        i += 1;
    }
    parts.join(" ")
}

/// Index of the `ExpressionEnd` closing the block opened at `begin`
pub fn matching_expression_end(tokens: &[Token], begin: usize) -> usize {
    let mut depth = 0;
    for (i, t) in tokens.iter().enumerate().skip(begin) {
        match t.tok {
            Tok::ExpressionBegin => depth += 1,
            Tok::ExpressionEnd => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Rebuild infix text from postfix selection tokens
pub fn selection_infix(postfix: &[Token]) -> String {
    let mut stack: Vec<String> = Vec::new();
    for token in postfix {
        match token.tok {
            Tok::And | Tok::Or | Tok::Xor | Tok::Toggle => {
                let b = stack.pop().unwrap_or_default();
                let a = stack.pop().unwrap_or_default();
                stack.push(format!("({} {} {})", a, token.tok.text(), b));
            }
            Tok::Not => {
                let a = stack.pop().unwrap_or_default();
                stack.push(format!("(not {})", a));
            }
            Tok::ItemSelector => {
                let a = stack.pop().unwrap_or_default();
                stack.push(format!("{}{}", a, token));
            }
            Tok::Within | Tok::Connected | Tok::Search => {
                let n = (token.int_value.max(0) as usize).min(stack.len());
                let args = stack.split_off(stack.len() - n);
                stack.push(format!("{}({})", token.tok.text(), args.join(", ")));
            }
            Tok::Cell => match &token.value {
                TokenValue::Value(v) => stack.push(format!("cell = {}", v.escape())),
                _ => stack.push("cell".to_string()),
            },
            _ => stack.push(token.to_string()),
        }
    }
    stack.join(" ")
}

fn render_for(args: &[Token]) -> String {
    let clauses: Vec<String> = args
        .split(|t| t.tok == Tok::Semicolon)
        .map(|clause| {
            let clause = match clause.first() {
                Some(t) if t.tok == Tok::Set => &clause[1..],
                _ => clause,
            };
            render_tokens(clause)
        })
        .collect();
    format!("for ({})", clauses.join("; "))
}

/// What kind of body a [`ScriptFunction`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    /// Function whose `process` blocks run concurrently
    Parallel,
    /// Body of a `try` block
    Try,
}

/// A user function, or the extracted body of a `try`
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptFunction {
    /// Lowercased name
    pub name: String,
    pub kind: FunctionKind,
    pub params: Vec<String>,
    /// Names declared with `var` at the top level of the body
    pub locals: Vec<String>,
    pub statements: Vec<Statement>,
    /// Line of the definition
    pub line: usize,
}

impl ScriptFunction {
    pub fn new(name: impl Into<String>, kind: FunctionKind) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            kind,
            params: Vec::new(),
            locals: Vec::new(),
            statements: Vec::new(),
            line: 0,
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Source-like listing of the body
    pub fn listing(&self) -> String {
        let header = match self.kind {
            FunctionKind::Function => format!("function {}({})", self.name, self.params.join(", ")),
            FunctionKind::Parallel => format!("parallel {}({})", self.name, self.params.join(", ")),
            FunctionKind::Try => "try".to_string(),
        };
        let mut out = header;
        out.push_str(" {\n");
        for stmt in &self.statements {
            out.push_str("  ");
            out.push_str(&stmt.to_infix());
            out.push('\n');
        }
        out.push('}');
        out
    }
}

/// A compiled script
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Source text
    pub script: Arc<str>,
    pub statements: Vec<Statement>,
    /// User functions by lowercased name
    pub functions: FxHashMap<String, Arc<ScriptFunction>>,
}

impl Program {
    #[inline]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Line number of each statement
    pub fn line_numbers(&self) -> Vec<usize> {
        self.statements.iter().map(|s| s.line).collect()
    }

    /// Byte range of each statement
    pub fn char_ranges(&self) -> Vec<(usize, usize)> {
        self.statements.iter().map(|s| s.range).collect()
    }

    pub fn function(&self, name: &str) -> Option<&Arc<ScriptFunction>> {
        self.functions.get(name.to_ascii_lowercase().as_str())
    }

    /// One rendered statement per line
    pub fn to_infix(&self) -> String {
        self.statements
            .iter()
            .map(Statement::to_infix)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::parser::token::ResidueSpec;

    #[test]
    fn test_selection_infix() {
        let residue = Token::with_value(
            Tok::ResidueSpec,
            TokenValue::Residue(Arc::new(ResidueSpec {
                name: Some("ALA".into()),
                ..Default::default()
            })),
        );
        let postfix = vec![
            Token::identifier("carbon"),
            residue,
            Token::new(Tok::Not),
            Token::new(Tok::And),
        ];
        assert_eq!(selection_infix(&postfix), "(carbon and (not [ALA]))");

        let within = vec![
            Token::decimal(5.0),
            Token::identifier("water"),
            Token::with_int(Tok::Within, 2),
        ];
        assert_eq!(selection_infix(&within), "within(5.0, water)");
    }

    #[test]
    fn test_statement_rendering() {
        let stmt = Statement::new(
            vec![
                Token::new(Tok::Select),
                Token::new(Tok::ExpressionBegin),
                Token::new(Tok::All),
                Token::new(Tok::ExpressionEnd),
            ],
            1,
            (0, 10),
        );
        assert_eq!(stmt.to_infix(), "select {all}");

        let stmt = Statement::new(
            vec![
                Token::new(Tok::For),
                Token::new(Tok::Var),
                Token::identifier("i"),
                Token::new(Tok::Assign),
                Token::integer(0),
                Token::new(Tok::Semicolon),
                Token::identifier("i"),
                Token::new(Tok::Lt),
                Token::integer(3),
                Token::new(Tok::Semicolon),
                Token::new(Tok::Set),
                Token::identifier("i"),
                Token::new(Tok::Assign),
                Token::identifier("i"),
                Token::new(Tok::Plus),
                Token::integer(1),
            ],
            1,
            (0, 20),
        );
        assert_eq!(stmt.to_infix(), "for (var i = 0; i < 3; i = i + 1)");

        let stmt = Statement::new(
            vec![Token::new(Tok::Print), Token::literal(Value::Boolean(true))],
            1,
            (0, 10),
        );
        assert_eq!(stmt.to_infix(), "print true");
    }

    #[test]
    fn test_selection_rendering_recompiles() {
        for script in [
            "select carbon or oxygen and not water",
            "select (carbon or oxygen) and water",
            "select not (carbon xor water) or none",
        ] {
            let program = crate::parser::compile(script).unwrap();
            let rendered = program.statements[0].to_infix();
            let again = crate::parser::compile(&rendered).unwrap();
            assert_eq!(
                again.statements[0].tokens, program.statements[0].tokens,
                "{} rendered as {}",
                script, rendered
            );
        }
    }
}
