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

//! Script lexer
//!
//! The lexer is pulled one token at a time by the compiler, because how the
//! next characters read depends on the statement so far: implicit-string
//! commands take the rest of the line verbatim, and a newline only ends a
//! statement when no bracket is open and the last token does not continue it.

use super::error::{CompileError, CompileErrorKind};
use super::token::{takes_implied_filename, ImplicitString, Tok, Token, TokenValue};
use crate::core::{BitSet, Matrix3, Matrix4, Value};

/// Byte range and starting line of a lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

/// One step of lexer output
#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    Token(Token, Span),
    EndOfStatement,
    EndOfScript,
}

/// What the compiler knows about the statement being lexed
#[derive(Debug, Clone, Copy, Default)]
pub struct LexContext<'c> {
    /// First token of the statement
    pub command: Option<&'c Token>,
    /// Tokens read so far in the statement
    pub n_tokens: usize,
    /// Kind of the previous token
    pub last: Option<Tok>,
}

impl LexContext<'_> {
    fn command_tok(&self) -> Option<Tok> {
        self.command.map(|t| t.tok)
    }

    /// A trailing operator carries a set/print/log statement onto the next line
    fn continues_statement(&self) -> bool {
        let math_command = matches!(
            self.command_tok(),
            Some(Tok::Set | Tok::Print | Tok::Log | Tok::Identifier | Tok::Var | Tok::Return)
        );
        math_command && self.n_tokens > 1 && self.last.is_some_and(|t| t.continues_line())
    }
}

/// Script lexer
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    paren_depth: i32,
    bracket_depth: i32,
    drop_statement: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            paren_depth: 0,
            bracket_depth: 0,
            drop_statement: false,
        }
    }

    /// Reset per-statement state
    pub fn begin_statement(&mut self) {
        self.paren_depth = 0;
        self.bracket_depth = 0;
    }

    /// Whether a `#jc` marker asked for the current statement to be dropped
    pub fn take_dropped(&mut self) -> bool {
        std::mem::take(&mut self.drop_statement)
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    #[inline]
    pub fn paren_depth(&self) -> i32 {
        self.paren_depth
    }

    /// The next word in the source, looking past blanks and line breaks,
    /// without consuming anything
    pub fn peek_word(&self) -> &'a str {
        let mut p = self.pos;
        while matches!(self.bytes.get(p), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            p += 1;
        }
        let start = p;
        while self.bytes.get(p).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
            p += 1;
        }
        &self.src[start..p]
    }

    #[inline]
    fn peek(&self, ahead: usize) -> u8 {
        self.bytes.get(self.pos + ahead).copied().unwrap_or(0)
    }

    fn skip_to_line_end(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn count_lines(&mut self, from: usize, to: usize) {
        self.line += self.bytes[from..to].iter().filter(|b| **b == b'\n').count();
    }

    /// Skip blanks, comments and continued lines. Returns a statement
    /// boundary when one was crossed.
    fn skip_trivia(&mut self, ctx: &LexContext<'_>) -> Option<Lexeme> {
        loop {
            let Some(&c) = self.bytes.get(self.pos) else {
                return Some(Lexeme::EndOfScript);
            };
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                    if self.paren_depth <= 0
                        && self.bracket_depth <= 0
                        && !ctx.continues_statement()
                    {
                        return Some(Lexeme::EndOfStatement);
                    }
                }
                b'\\' => {
                    let mut p = self.pos + 1;
                    while matches!(self.bytes.get(p), Some(b' ' | b'\t' | b'\r')) {
                        p += 1;
                    }
                    if self.bytes.get(p) == Some(&b'\n') {
                        self.pos = p + 1;
                        self.line += 1;
                    } else {
                        return None;
                    }
                }
                b';' if self.paren_depth <= 0 && self.bracket_depth <= 0 => {
                    self.pos += 1;
                    return Some(Lexeme::EndOfStatement);
                }
                b'/' if self.peek(1) == b'/' => self.skip_to_line_end(),
                b'/' if self.peek(1) == b'*' => {
                    let start = self.pos;
                    let doc = self.peek(2) == b'*' && self.peek(3) != b'/';
                    let (open, close) = if doc { (3, "**/") } else { (2, "*/") };
                    self.pos = match self.src[start + open..].find(close) {
                        Some(i) => start + open + i + close.len(),
                        None => self.bytes.len(),
                    };
                    self.count_lines(start, self.pos);
                }
                b'#' => {
                    let rest = &self.src[self.pos..];
                    if rest.starts_with("#jx ") {
                        self.pos += 4;
                    } else {
                        if rest.starts_with("#jc") {
                            self.drop_statement = true;
                        }
                        self.skip_to_line_end();
                    }
                }
                _ => return None,
            }
        }
    }

    /// Read the next token or statement boundary
    pub fn next(&mut self, ctx: &LexContext<'_>) -> Result<Lexeme, CompileError> {
        if let Some(boundary) = self.skip_trivia(ctx) {
            return Ok(boundary);
        }
        let start = self.pos;
        let line = self.line;

        if ctx.n_tokens == 1 {
            if let Some(token) = self.implied_argument(ctx) {
                let span = Span {
                    start,
                    end: self.pos,
                    line,
                };
                return Ok(Lexeme::Token(token, span));
            }
        }

        let token = self.lex_token()?;
        let span = Span {
            start,
            end: self.pos,
            line,
        };
        Ok(Lexeme::Token(token, span))
    }

    /// Unquoted text argument of echo-like commands and file-loading commands
    fn implied_argument(&mut self, ctx: &LexContext<'_>) -> Option<Token> {
        let command = ctx.command?;
        let c = self.peek(0);
        if c == b'"' || c == b'\'' {
            return None;
        }
        if let Some(mode) = command.tok.implicit_string() {
            if mode == ImplicitString::AllowLeadingVariable && self.src[self.pos..].starts_with("@{") {
                return None;
            }
            return self.read_implied(true).map(Token::string);
        }
        if command.tok == Tok::HostCommand
            && takes_implied_filename(command.text())
            && !matches!(c, b'@' | b'(' | b'{' | b'[')
        {
            return self.read_implied(false).map(Token::string);
        }
        None
    }

    fn read_implied(&mut self, allow_space: bool) -> Option<String> {
        let start = self.pos;
        let mut p = start;
        while let Some(&c) = self.bytes.get(p) {
            if c == b'\n' || c == b'\r' || c == b';' || (!allow_space && (c == b' ' || c == b'\t')) {
                break;
            }
            p += 1;
        }
        let text = self.src[start..p].trim_end();
        if text.is_empty() {
            return None;
        }
        self.pos = start + text.len();
        Some(text.to_string())
    }

    fn lex_token(&mut self) -> Result<Token, CompileError> {
        let c = self.peek(0);
        let next = self.peek(1);
        match c {
            b'"' | b'\'' => return self.lex_string(c),
            b'(' if next == b'{' => {
                if let Some(token) = self.lex_bitset() {
                    return Ok(token);
                }
            }
            b'[' if next == b'[' => {
                if let Some(token) = self.lex_matrix() {
                    return Ok(token);
                }
            }
            b'0'..=b'9' => return Ok(self.lex_number()),
            b'-' if next.is_ascii_digit()
                || (next == b'.' && self.peek(2).is_ascii_digit()) =>
            {
                return Ok(self.lex_number());
            }
            b'.' if next.is_ascii_digit() && !self.follows_operand() => {
                return Ok(self.lex_number());
            }
            c if c.is_ascii_alphabetic() || c == b'_' => return Ok(self.lex_word()),
            _ => {}
        }
        self.lex_operator()
    }

    /// Whether the previous byte ends an identifier or a bracket
    fn follows_operand(&self) -> bool {
        self.pos > 0
            && matches!(self.bytes[self.pos - 1], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b']' | b')')
    }

    fn lex_word(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        match Tok::from_keyword(word) {
            Some(Tok::Literal) => Token::literal(Value::Boolean(word.eq_ignore_ascii_case("true"))),
            Some(tok) => Token::with_text(tok, word.to_ascii_lowercase()),
            None => Token::identifier(word),
        }
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;
        let mut p = start;
        let negative = self.bytes[p] == b'-';
        if negative {
            p += 1;
        }
        let digits_start = p;
        while self.bytes.get(p).is_some_and(u8::is_ascii_digit) {
            p += 1;
        }
        let has_digits = p > digits_start;

        if has_digits && self.bytes.get(p) == Some(&b'^') {
            if let Some(&code) = self.bytes.get(p + 1) {
                if code.is_ascii_alphanumeric() || code == b'*' || code == b'?' {
                    let n: i32 = self.src[digits_start..p].parse().unwrap_or(i32::MAX);
                    self.pos = p + 2;
                    let mut token = Token::with_text(Tok::Seqcode, (code as char).to_string());
                    token.int_value = if negative { -n } else { n };
                    return token;
                }
            }
        }

        let mut is_decimal = false;
        if self.bytes.get(p) == Some(&b'.') {
            let after = self.bytes.get(p + 1).copied().unwrap_or(0);
            if !(after.is_ascii_alphabetic() || after == b'.' || after == b'_') {
                is_decimal = true;
                p += 1;
                while self.bytes.get(p).is_some_and(u8::is_ascii_digit) {
                    p += 1;
                }
            }
        }
        if matches!(self.bytes.get(p), Some(b'e' | b'E'))
            && matches!(self.bytes.get(p + 1), Some(b'+' | b'-'))
            && self.bytes.get(p + 2).is_some_and(u8::is_ascii_digit)
        {
            is_decimal = true;
            p += 2;
            while self.bytes.get(p).is_some_and(u8::is_ascii_digit) {
                p += 1;
            }
        }
        self.pos = p;
        let text = &self.src[start..p];
        if !is_decimal {
            if text == "-0" {
                return Token::decimal(-0.0);
            }
            if let Ok(n) = text.parse::<i32>() {
                return Token::integer(n);
            }
        }
        Token::decimal(text.parse::<f64>().unwrap_or(f64::NAN))
    }

    fn lex_string(&mut self, quote: u8) -> Result<Token, CompileError> {
        let start = self.pos;
        let mut out = String::new();
        let mut chars = self.src[start + 1..].char_indices();
        while let Some((i, c)) = chars.next() {
            if c as u32 == quote as u32 {
                let end = start + 1 + i + 1;
                self.count_lines(start, end);
                self.pos = end;
                return Ok(Token::string(out));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 'b')) => out.push('\u{8}'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\'')) => out.push('\''),
                Some((_, '\\')) => out.push('\\'),
                Some((j, e @ ('x' | 'u'))) => {
                    let width = if e == 'x' { 2 } else { 4 };
                    let from = start + 1 + j + 1;
                    let code = self
                        .src
                        .get(from..from + width)
                        .and_then(|h| u32::from_str_radix(h, 16).ok())
                        .and_then(char::from_u32);
                    match code {
                        Some(ch) => {
                            out.push(ch);
                            for _ in 0..width {
                                chars.next();
                            }
                        }
                        None => {
                            out.push('\\');
                            out.push(e);
                        }
                    }
                }
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            }
        }
        let text: String = self.src[start..].lines().next().unwrap_or("").to_string();
        Err(CompileError::with_value(CompileErrorKind::UnrecognizedToken, text).at(start))
    }

    /// `({0 2:4})`; anything else falls back to `(`
    fn lex_bitset(&mut self) -> Option<Token> {
        let rest = &self.src[self.pos..];
        let close = rest.find("})")?;
        let candidate = &rest[..close + 2];
        let set = BitSet::parse(candidate)?;
        self.pos += candidate.len();
        Some(Token::literal(Value::Bitset(set)))
    }

    /// `[[1 0 0] [0 1 0] [0 0 1]]` as a 3x3 or 4x4 matrix; anything else
    /// falls back to `[`
    fn lex_matrix(&mut self) -> Option<Token> {
        let rest = &self.src[self.pos..];
        let close = rest.find("]]")?;
        let candidate = &rest[..close + 2];
        let numeric = candidate.bytes().all(|b| {
            b.is_ascii_digit()
                || b.is_ascii_whitespace()
                || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E' | b',' | b'[' | b']')
        });
        if !numeric {
            return None;
        }
        let rows = candidate.bytes().filter(|b| *b == b'[').count() - 1;
        let values: Option<Vec<f64>> = candidate
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']'))
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<f64>().ok())
            .collect();
        let values = values?;
        let value = match rows {
            3 => Value::Matrix3(Box::new(Matrix3::from_rows(&values)?)),
            4 => Value::Matrix4(Box::new(Matrix4::from_rows(&values)?)),
            _ => return None,
        };
        if candidate.contains('\n') {
            self.count_lines(self.pos, self.pos + candidate.len());
        }
        self.pos += candidate.len();
        Some(Token::literal(value))
    }

    fn lex_operator(&mut self) -> Result<Token, CompileError> {
        let c = self.peek(0);
        let next = self.peek(1);
        let (tok, len) = match (c, next) {
            (b'+', b'+') => (Tok::PlusPlus, 2),
            (b'+', b'=') => (Tok::PlusEq, 2),
            (b'+', _) => (Tok::Plus, 1),
            (b'-', b'-') => (Tok::MinusMinus, 2),
            (b'-', b'=') => (Tok::MinusEq, 2),
            (b'-', _) => (Tok::Minus, 1),
            (b'*', b'*') => (Tok::Power, 2),
            (b'*', b'=') => (Tok::TimesEq, 2),
            (b'*', _) => (Tok::Times, 1),
            (b'/', b'=') => (Tok::DivideEq, 2),
            (b'/', _) => (Tok::Divide, 1),
            (b'\\', b'=') => (Tok::LeftDivideEq, 2),
            (b'\\', _) => (Tok::LeftDivide, 1),
            (b'%', _) => (Tok::Percent, 1),
            (b'=', b'=') => (Tok::Eq, 2),
            (b'=', _) => (Tok::Assign, 1),
            (b'!', b'=') => (Tok::Ne, 2),
            (b'!', _) => (Tok::Not, 1),
            (b'<', b'=') => (Tok::Le, 2),
            (b'<', b'>') => (Tok::Ne, 2),
            (b'<', _) => (Tok::Lt, 1),
            (b'>', b'=') => (Tok::Ge, 2),
            (b'>', _) => (Tok::Gt, 1),
            (b'&', b'&') => (Tok::And, 2),
            (b'&', b'=') => (Tok::AndEq, 2),
            (b'&', _) => (Tok::And, 1),
            (b'|', b'|') => (Tok::Or, 2),
            (b'|', b'=') => (Tok::OrEq, 2),
            (b'|', _) => (Tok::Or, 1),
            (b'(', _) => {
                self.paren_depth += 1;
                (Tok::LeftParen, 1)
            }
            (b')', _) => {
                self.paren_depth -= 1;
                (Tok::RightParen, 1)
            }
            (b'[', _) => {
                self.bracket_depth += 1;
                (Tok::LeftSquare, 1)
            }
            (b']', _) => {
                self.bracket_depth -= 1;
                (Tok::RightSquare, 1)
            }
            (b'{', _) => (Tok::LeftBrace, 1),
            (b'}', _) => (Tok::RightBrace, 1),
            (b',', _) => (Tok::Comma, 1),
            (b':', _) => (Tok::Colon, 1),
            (b';', _) => (Tok::Semicolon, 1),
            (b'?', _) => (Tok::Question, 1),
            (b'.', _) => (Tok::Period, 1),
            (b'@', _) => (Tok::At, 1),
            _ => {
                let ch = self.src[self.pos..].chars().next().unwrap_or('?');
                return Err(
                    CompileError::with_value(CompileErrorKind::UnrecognizedToken, ch.to_string())
                        .at(self.pos),
                );
            }
        };
        self.pos += len;
        Ok(Token::new(tok))
    }
}

/// Whether a token is the keyword or identifier `word`
pub fn is_word(token: &Token, word: &str) -> bool {
    matches!(token.value, TokenValue::Text(ref s) if s.eq_ignore_ascii_case(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lex a whole script into statements of tokens
    fn lex(script: &str) -> Vec<Vec<Token>> {
        let mut lexer = Lexer::new(script);
        let mut statements = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        loop {
            let ctx = LexContext {
                command: current.first(),
                n_tokens: current.len(),
                last: current.last().map(|t| t.tok),
            };
            match lexer.next(&ctx).unwrap() {
                Lexeme::Token(t, _) => current.push(t),
                Lexeme::EndOfStatement => {
                    if !current.is_empty() && !lexer.take_dropped() {
                        statements.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    lexer.begin_statement();
                }
                Lexeme::EndOfScript => {
                    if !current.is_empty() && !lexer.take_dropped() {
                        statements.push(current);
                    }
                    return statements;
                }
            }
        }
    }

    fn toks(statement: &[Token]) -> Vec<Tok> {
        statement.iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_statement_boundaries() {
        let s = lex("x = 1; y = 2\nprint x");
        assert_eq!(s.len(), 3);
        assert_eq!(toks(&s[0]), vec![Tok::Identifier, Tok::Assign, Tok::Integer]);
        assert_eq!(toks(&s[2]), vec![Tok::Print, Tok::Identifier]);
    }

    #[test]
    fn test_semicolon_inside_parens() {
        let s = lex("for (i = 0; i < 3; i++) {");
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].iter().filter(|t| t.tok == Tok::Semicolon).count(), 2);
    }

    #[test]
    fn test_comments() {
        let s = lex("// line\nprint 1 # trailing\n/* block\n */ print 2\n/** doc */ still **/ print 3");
        assert_eq!(s.len(), 3);
        assert_eq!(s[2][1].int_value, 3);

        let s = lex("print 1 #jc\nprint 2\n#jx print 3");
        assert_eq!(s.len(), 2);
        assert_eq!(s[0][1].int_value, 2);
        assert_eq!(s[1][1].int_value, 3);
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(lex("print 1 +\n 2").len(), 1);
        assert_eq!(lex("print (1\n + 2)").len(), 1);
        assert_eq!(lex("print 1 \\\n + 2").len(), 1);
        assert_eq!(lex("print 1\n+ 2").len(), 2);
    }

    #[test]
    fn test_numbers() {
        let s = lex("print 3 2.5 -4 1.5E-2 23^A 1e5 -0 .5");
        let t = &s[0];
        assert_eq!(t[1].int_value, 3);
        assert_eq!(t[2].literal_value(), Some(Value::Float(2.5)));
        assert_eq!(t[3].int_value, -4);
        assert_eq!(t[4].literal_value(), Some(Value::Float(0.015)));
        assert_eq!(t[5].tok, Tok::Seqcode);
        assert_eq!(t[5].int_value, 23);
        assert_eq!(t[5].text(), "A");
        // no sign after E: a number followed by an identifier
        assert_eq!(t[6].int_value, 1);
        assert_eq!(t[7].tok, Tok::Identifier);
        assert_eq!(t[8].tok, Tok::Decimal);
        assert_eq!(t[9].literal_value(), Some(Value::Float(0.5)));
    }

    #[test]
    fn test_decimal_point_before_letter() {
        let s = lex("print 3.x");
        assert_eq!(toks(&s[0]), vec![Tok::Print, Tok::Integer, Tok::Period, Tok::Identifier]);
    }

    #[test]
    fn test_strings() {
        let s = lex(r#"print "a\tb\"c" 'd\x41é'"#);
        assert_eq!(s[0][1].text(), "a\tb\"c");
        assert_eq!(s[0][2].text(), "dAé");

        let mut lexer = Lexer::new("print \"open");
        let ctx = LexContext::default();
        lexer.next(&ctx).unwrap();
        assert!(lexer.next(&ctx).is_err());
    }

    #[test]
    fn test_literals() {
        let s = lex("print ({1 3:5}) [[1 0 0] [0 1 0] [0 0 1]] [[1,2],[3,4]]");
        let t = &s[0];
        assert!(matches!(t[1].literal_value(), Some(Value::Bitset(ref b)) if b.cardinality() == 4));
        assert!(matches!(t[2].literal_value(), Some(Value::Matrix3(_))));
        assert_eq!(t[3].tok, Tok::LeftSquare);
    }

    #[test]
    fn test_operators() {
        let s = lex("x += a ** 2 != b <> c && d || !e \\ f");
        assert_eq!(
            toks(&s[0]),
            vec![
                Tok::Identifier,
                Tok::PlusEq,
                Tok::Identifier,
                Tok::Power,
                Tok::Integer,
                Tok::Ne,
                Tok::Identifier,
                Tok::Ne,
                Tok::Identifier,
                Tok::And,
                Tok::Identifier,
                Tok::Or,
                Tok::Not,
                Tok::Identifier,
                Tok::LeftDivide,
                Tok::Identifier,
            ]
        );
    }

    #[test]
    fn test_implicit_strings() {
        let s = lex("echo hello world ; load files/1crn.pdb\ngoto @{x}");
        assert_eq!(s[0][1].text(), "hello world");
        assert_eq!(s[1][0].tok, Tok::HostCommand);
        assert_eq!(s[1][1].text(), "files/1crn.pdb");
        assert_eq!(s[2][1].tok, Tok::At);
    }

    #[test]
    fn test_keywords() {
        let s = lex("IF true AND False");
        assert_eq!(s[0][0].tok, Tok::If);
        assert_eq!(s[0][1].literal_value(), Some(Value::Boolean(true)));
        assert_eq!(s[0][2].tok, Tok::And);
        assert_eq!(s[0][3].literal_value(), Some(Value::Boolean(false)));
        assert!(is_word(&s[0][0], "if"));
    }
}
