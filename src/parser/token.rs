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

//! Token types for the script compiler
//!
//! A [`Token`] is both a grammar terminal (keyword or operator, with static
//! attributes looked up from its [`Tok`]) and, for literals, a carrier of a
//! concrete [`Value`]. Compiled statements are plain token vectors.

use std::fmt;
use std::sync::{Arc, LazyLock};

use rustc_hash::{FxHashMap, FxHashSet};

use super::precedence::Precedence;
use super::program::ScriptFunction;
use crate::core::Value;

/// Position represents a position in the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset, starting at 0
    pub offset: usize,
    /// Line number, starting at 1
    pub line: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize) -> Self {
        Self { offset, line }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, offset {}", self.line, self.offset)
    }
}

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tok {
    // =========================================================================
    // Operands
    // =========================================================================
    Identifier,
    String,
    Integer,
    Decimal,
    /// Any other constant: boolean, point, plane, matrix, selection set
    Literal,
    /// Residue number with insertion code, `23^A`
    Seqcode,
    /// `@name`
    AtVar,
    /// `@{ expr }`
    AtExpr,

    // =========================================================================
    // Punctuation
    // =========================================================================
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Semicolon,
    Period,
    At,

    // =========================================================================
    // Math operators
    // =========================================================================
    Plus,
    Minus,
    Times,
    Divide,
    LeftDivide,
    Percent,
    Power,
    PlusPlus,
    MinusMinus,
    UnaryMinus,
    Question,
    Not,
    And,
    Or,
    Xor,
    Toggle,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    PlusEq,
    MinusEq,
    TimesEq,
    DivideEq,
    LeftDivideEq,
    AndEq,
    OrEq,
    /// `and` whose left operand already decided the result
    AndFalse,
    /// `or` whose left operand already decided the result
    OrTrue,

    // =========================================================================
    // Compiled expression structure
    // =========================================================================
    /// Function call; the name is in the token value
    Call,
    /// `.name` property selector
    PropSelector,
    /// `[` opening an array literal
    ArrayOpen,
    ExpressionBegin,
    ExpressionEnd,
    CoordinateBegin,
    CoordinateEnd,
    HashBegin,
    HashEnd,
    /// Key/value separator inside a map literal
    MapColon,

    // =========================================================================
    // Selection primitives
    // =========================================================================
    All,
    None,
    Within,
    Connected,
    Search,
    Cell,
    ResidueSpec,
    Comparator,
    /// `[i]` or `[i][j]` applied to a selection
    ItemSelector,

    // =========================================================================
    // Flow commands
    // =========================================================================
    If,
    ElseIf,
    Else,
    EndIf,
    For,
    While,
    Break,
    Continue,
    End,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    FunctionDef,
    Parallel,
    Process,
    /// Bare `{` block
    Push,
    Var,
    Return,
    Exit,
    Quit,
    In,

    // =========================================================================
    // Other commands
    // =========================================================================
    Print,
    Log,
    Set,
    Select,
    Display,
    Hide,
    Restrict,
    Subset,
    Center,
    Delete,
    Define,
    Echo,
    Message,
    Hover,
    Pause,
    Help,
    Cd,
    Goto,
    /// A statement that is a bare expression, such as a function call
    Evaluate,
    /// Any command forwarded to the host; the name is in the token value
    HostCommand,
}

/// How a command reads an unquoted argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitString {
    /// The rest of the line is taken verbatim
    Literal,
    /// As `Literal`, but a leading `@{...}` is evaluated instead
    AllowLeadingVariable,
}

/// Which construct a flow token or `end` belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    If,
    For,
    While,
    Switch,
    Function,
    Parallel,
    Try,
    Catch,
    Process,
    Block,
}

impl FlowKind {
    pub fn name(&self) -> &'static str {
        match self {
            FlowKind::If => "if",
            FlowKind::For => "for",
            FlowKind::While => "while",
            FlowKind::Switch => "switch",
            FlowKind::Function => "function",
            FlowKind::Parallel => "parallel",
            FlowKind::Try => "try",
            FlowKind::Catch => "catch",
            FlowKind::Process => "process",
            FlowKind::Block => "{",
        }
    }

    /// Kind named after `end`, as in `end while`
    pub fn from_name(name: &str) -> Option<FlowKind> {
        Some(match name.to_ascii_lowercase().as_str() {
            "if" => FlowKind::If,
            "for" => FlowKind::For,
            "while" => FlowKind::While,
            "switch" => FlowKind::Switch,
            "function" => FlowKind::Function,
            "parallel" => FlowKind::Parallel,
            "try" => FlowKind::Try,
            "catch" => FlowKind::Catch,
            "process" => FlowKind::Process,
            _ => return None,
        })
    }
}

impl Tok {
    /// Keyword lookup, case-insensitive
    pub fn from_keyword(word: &str) -> Option<Tok> {
        if let Some(t) = KEYWORDS.get(word) {
            return Some(*t);
        }
        let lower = word.to_ascii_lowercase();
        if let Some(t) = KEYWORDS.get(lower.as_str()) {
            return Some(*t);
        }
        HOST_COMMANDS
            .contains(lower.as_str())
            .then_some(Tok::HostCommand)
    }

    #[inline]
    pub fn precedence(&self) -> Precedence {
        Precedence::for_tok(*self)
    }

    /// Statement-starting keywords
    pub fn is_command(&self) -> bool {
        self.is_flow_command()
            || matches!(
                self,
                Tok::Print
                    | Tok::Log
                    | Tok::Set
                    | Tok::Evaluate
                    | Tok::HostCommand
            )
            || self.is_atom_expression_command()
            || self.implicit_string().is_some()
    }

    pub fn is_flow_command(&self) -> bool {
        matches!(
            self,
            Tok::If
                | Tok::ElseIf
                | Tok::Else
                | Tok::EndIf
                | Tok::For
                | Tok::While
                | Tok::Break
                | Tok::Continue
                | Tok::End
                | Tok::Switch
                | Tok::Case
                | Tok::Default
                | Tok::Try
                | Tok::Catch
                | Tok::FunctionDef
                | Tok::Parallel
                | Tok::Process
                | Tok::Push
                | Tok::Var
                | Tok::Return
                | Tok::Exit
                | Tok::Quit
        )
    }

    /// Commands whose argument is a selection expression
    pub fn is_atom_expression_command(&self) -> bool {
        matches!(
            self,
            Tok::Select
                | Tok::Display
                | Tok::Hide
                | Tok::Restrict
                | Tok::Subset
                | Tok::Center
                | Tok::Delete
                | Tok::Define
        )
    }

    /// Commands whose arguments are one math expression
    pub fn is_math_expression_command(&self) -> bool {
        matches!(
            self,
            Tok::Print
                | Tok::Log
                | Tok::Return
                | Tok::If
                | Tok::ElseIf
                | Tok::While
                | Tok::Switch
                | Tok::Case
                | Tok::Evaluate
        )
    }

    /// Odd-numbered commands never pre-parse `@{}`; even ones allow one
    pub fn implicit_string(&self) -> Option<ImplicitString> {
        match self {
            Tok::Echo | Tok::Message | Tok::Hover | Tok::Pause => Some(ImplicitString::Literal),
            Tok::Help | Tok::Cd | Tok::Goto => Some(ImplicitString::AllowLeadingVariable),
            _ => None,
        }
    }

    /// Commands that take no arguments at all
    pub fn takes_no_arguments(&self) -> bool {
        matches!(self, Tok::Exit | Tok::Quit | Tok::EndIf | Tok::Try)
    }

    pub fn is_comparator(&self) -> bool {
        matches!(self, Tok::Eq | Tok::Ne | Tok::Lt | Tok::Le | Tok::Gt | Tok::Ge)
    }

    /// Operators that can appear in a math expression
    pub fn is_math_op(&self) -> bool {
        matches!(
            self,
            Tok::Plus
                | Tok::Minus
                | Tok::Times
                | Tok::Divide
                | Tok::LeftDivide
                | Tok::Percent
                | Tok::Power
                | Tok::PlusPlus
                | Tok::MinusMinus
                | Tok::Question
                | Tok::Colon
                | Tok::Not
                | Tok::And
                | Tok::Or
                | Tok::Xor
                | Tok::Toggle
                | Tok::Comma
        ) || self.is_comparator()
    }

    /// Tokens after which a newline does not end a set/print/log statement
    pub fn continues_line(&self) -> bool {
        self.is_math_op() && !matches!(self, Tok::PlusPlus | Tok::MinusMinus)
    }

    /// Compound assignment operator and the binary operator it expands to
    pub fn compound_assignment(&self) -> Option<Tok> {
        Some(match self {
            Tok::PlusEq => Tok::Plus,
            Tok::MinusEq => Tok::Minus,
            Tok::TimesEq => Tok::Times,
            Tok::DivideEq => Tok::Divide,
            Tok::LeftDivideEq => Tok::LeftDivide,
            Tok::AndEq => Tok::And,
            Tok::OrEq => Tok::Or,
            _ => return None,
        })
    }

    /// Source spelling of operators and keywords
    pub fn text(&self) -> &'static str {
        match self {
            Tok::LeftParen => "(",
            Tok::RightParen => ")",
            Tok::LeftSquare | Tok::ArrayOpen => "[",
            Tok::RightSquare => "]",
            Tok::LeftBrace | Tok::ExpressionBegin | Tok::CoordinateBegin | Tok::HashBegin => "{",
            Tok::RightBrace | Tok::ExpressionEnd | Tok::CoordinateEnd | Tok::HashEnd => "}",
            Tok::Comma => ",",
            Tok::Colon | Tok::MapColon => ":",
            Tok::Semicolon => ";",
            Tok::Period => ".",
            Tok::At => "@",
            Tok::Plus | Tok::PlusEq => "+",
            Tok::Minus | Tok::UnaryMinus | Tok::MinusEq => "-",
            Tok::Times | Tok::TimesEq => "*",
            Tok::Divide | Tok::DivideEq => "/",
            Tok::LeftDivide | Tok::LeftDivideEq => "\\",
            Tok::Percent => "%",
            Tok::Power => "**",
            Tok::PlusPlus => "++",
            Tok::MinusMinus => "--",
            Tok::Question => "?",
            Tok::Not => "not",
            Tok::And | Tok::AndFalse | Tok::AndEq => "and",
            Tok::Or | Tok::OrTrue | Tok::OrEq => "or",
            Tok::Xor => "xor",
            Tok::Toggle => "toggle",
            Tok::Eq => "==",
            Tok::Ne => "!=",
            Tok::Lt => "<",
            Tok::Le => "<=",
            Tok::Gt => ">",
            Tok::Ge => ">=",
            Tok::Assign => "=",
            Tok::All => "all",
            Tok::None => "none",
            Tok::Within => "within",
            Tok::Connected => "connected",
            Tok::Search => "search",
            Tok::Cell => "cell",
            Tok::If => "if",
            Tok::ElseIf => "elseif",
            Tok::Else => "else",
            Tok::EndIf => "endif",
            Tok::For => "for",
            Tok::While => "while",
            Tok::Break => "break",
            Tok::Continue => "continue",
            Tok::End => "end",
            Tok::Switch => "switch",
            Tok::Case => "case",
            Tok::Default => "default",
            Tok::Try => "try",
            Tok::Catch => "catch",
            Tok::FunctionDef => "function",
            Tok::Parallel => "parallel",
            Tok::Process => "process",
            Tok::Push => "{",
            Tok::Var => "var",
            Tok::Return => "return",
            Tok::Exit => "exit",
            Tok::Quit => "quit",
            Tok::In => "in",
            Tok::Print => "print",
            Tok::Log => "log",
            Tok::Set => "set",
            Tok::Select => "select",
            Tok::Display => "display",
            Tok::Hide => "hide",
            Tok::Restrict => "restrict",
            Tok::Subset => "subset",
            Tok::Center => "center",
            Tok::Delete => "delete",
            Tok::Define => "define",
            Tok::Echo => "echo",
            Tok::Message => "message",
            Tok::Hover => "hover",
            Tok::Pause => "pause",
            Tok::Help => "help",
            Tok::Cd => "cd",
            Tok::Goto => "goto",
            _ => "",
        }
    }
}

/// Keyword spellings. Several spellings may share one token.
static KEYWORDS: LazyLock<FxHashMap<&'static str, Tok>> = LazyLock::new(|| {
    let entries: &[(&str, Tok)] = &[
        ("and", Tok::And),
        ("or", Tok::Or),
        ("xor", Tok::Xor),
        ("not", Tok::Not),
        ("toggle", Tok::Toggle),
        ("true", Tok::Literal),
        ("false", Tok::Literal),
        ("all", Tok::All),
        ("none", Tok::None),
        ("within", Tok::Within),
        ("connected", Tok::Connected),
        ("search", Tok::Search),
        ("cell", Tok::Cell),
        ("if", Tok::If),
        ("elseif", Tok::ElseIf),
        ("else", Tok::Else),
        ("endif", Tok::EndIf),
        ("for", Tok::For),
        ("while", Tok::While),
        ("break", Tok::Break),
        ("continue", Tok::Continue),
        ("end", Tok::End),
        ("switch", Tok::Switch),
        ("case", Tok::Case),
        ("default", Tok::Default),
        ("try", Tok::Try),
        ("catch", Tok::Catch),
        ("function", Tok::FunctionDef),
        ("parallel", Tok::Parallel),
        ("process", Tok::Process),
        ("var", Tok::Var),
        ("return", Tok::Return),
        ("exit", Tok::Exit),
        ("quit", Tok::Quit),
        ("in", Tok::In),
        ("print", Tok::Print),
        ("log", Tok::Log),
        ("set", Tok::Set),
        ("select", Tok::Select),
        ("display", Tok::Display),
        ("hide", Tok::Hide),
        ("restrict", Tok::Restrict),
        ("subset", Tok::Subset),
        ("center", Tok::Center),
        ("delete", Tok::Delete),
        ("define", Tok::Define),
        ("echo", Tok::Echo),
        ("message", Tok::Message),
        ("hover", Tok::Hover),
        ("pause", Tok::Pause),
        ("help", Tok::Help),
        ("cd", Tok::Cd),
        ("goto", Tok::Goto),
    ];
    entries.iter().copied().collect()
});

/// Commands with no engine semantics; they are dispatched to the host
pub static HOST_COMMAND_NAMES: &[&str] = &[
    "animation", "axes", "background", "backbone", "boundbox", "calculate", "cartoon",
    "color", "connect", "delay", "dots", "font", "frame", "hbonds", "isosurface", "label",
    "load", "measure", "model", "moveto", "refresh", "reset", "restore", "ribbon", "rotate",
    "save", "script", "show", "spacefill", "spin", "ssbonds", "stereo", "trace", "translate",
    "unitcell", "vibration", "wireframe", "write", "zap", "zoom",
];

static HOST_COMMANDS: LazyLock<FxHashSet<&'static str>> =
    LazyLock::new(|| HOST_COMMAND_NAMES.iter().copied().collect());

/// Host commands whose first argument may be an unquoted file name
static IMPLIED_FILENAME_COMMANDS: LazyLock<FxHashSet<&'static str>> =
    LazyLock::new(|| ["load", "write", "script", "isosurface"].into_iter().collect());

/// Whether the command takes an unquoted file name argument
pub fn takes_implied_filename(command: &str) -> bool {
    IMPLIED_FILENAME_COMMANDS.contains(command.to_ascii_lowercase().as_str())
}

/// Comparison operators in property comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn from_tok(tok: Tok) -> Option<Comparison> {
        Some(match tok {
            Tok::Eq | Tok::Assign => Comparison::Eq,
            Tok::Ne => Comparison::Ne,
            Tok::Lt => Comparison::Lt,
            Tok::Le => Comparison::Le,
            Tok::Gt => Comparison::Gt,
            Tok::Ge => Comparison::Ge,
            _ => return None,
        })
    }

    /// Apply to two numbers
    pub fn test(&self, a: f64, b: f64) -> bool {
        match self {
            Comparison::Eq => a == b,
            Comparison::Ne => a != b,
            Comparison::Lt => a < b,
            Comparison::Le => a <= b,
            Comparison::Gt => a > b,
            Comparison::Ge => a >= b,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// Residue/chain/atom/model specification, e.g. `[ALA]23^A:B.CA/2`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResidueSpec {
    /// Residue name, may contain `?` and `*` wildcards
    pub name: Option<String>,
    pub seq_start: Option<i32>,
    pub seq_end: Option<i32>,
    pub ins_code: Option<char>,
    pub chain: Option<char>,
    pub atom: Option<String>,
    pub model: Option<i32>,
}

impl fmt::Display for ResidueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "[{}]", name)?;
        }
        if let Some(start) = self.seq_start {
            write!(f, "{}", start)?;
            if let Some(code) = self.ins_code {
                write!(f, "^{}", code)?;
            }
            if let Some(end) = self.seq_end {
                write!(f, "-{}", end)?;
            }
        }
        if let Some(chain) = self.chain {
            write!(f, ":{}", chain)?;
        }
        if let Some(atom) = &self.atom {
            write!(f, ".{}", atom)?;
        }
        if let Some(model) = self.model {
            write!(f, "/{}", model)?;
        }
        Ok(())
    }
}

/// `property <op> operand` inside a selection expression
#[derive(Debug, Clone, PartialEq)]
pub struct ComparatorSpec {
    pub property: String,
    pub op: Comparison,
    /// Literal, `@name` or `@{...}`
    pub operand: Token,
}

/// Payload carried by a token
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TokenValue {
    #[default]
    None,
    /// Identifier, string, command or function name
    Text(Arc<str>),
    /// Literal constant
    Value(Value),
    /// Compiled math tokens of an `@{...}` block
    Tokens(Arc<[Token]>),
    Residue(Arc<ResidueSpec>),
    Comparator(Arc<ComparatorSpec>),
    /// Extracted body of a `try`
    Function(Arc<ScriptFunction>),
    /// Construct closed by an `end`
    Flow(FlowKind),
}

/// A lexical or compiled token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    /// Integer literal, jump target or argument count depending on `tok`
    pub int_value: i32,
    pub value: TokenValue,
}

impl Token {
    #[inline]
    pub fn new(tok: Tok) -> Self {
        Self {
            tok,
            int_value: 0,
            value: TokenValue::None,
        }
    }

    pub fn with_text(tok: Tok, text: impl AsRef<str>) -> Self {
        Self {
            tok,
            int_value: 0,
            value: TokenValue::Text(Arc::from(text.as_ref())),
        }
    }

    pub fn with_int(tok: Tok, int_value: i32) -> Self {
        Self {
            tok,
            int_value,
            value: TokenValue::None,
        }
    }

    pub fn with_value(tok: Tok, value: TokenValue) -> Self {
        Self {
            tok,
            int_value: 0,
            value,
        }
    }

    pub fn integer(i: i32) -> Self {
        Self::with_int(Tok::Integer, i)
    }

    pub fn decimal(f: f64) -> Self {
        Self::with_value(Tok::Decimal, TokenValue::Value(Value::Float(f)))
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Self::with_text(Tok::String, s)
    }

    pub fn literal(v: Value) -> Self {
        Self::with_value(Tok::Literal, TokenValue::Value(v))
    }

    pub fn identifier(name: impl AsRef<str>) -> Self {
        Self::with_text(Tok::Identifier, name)
    }

    /// Text payload, or "" when the token carries none
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Text(s) => s,
            _ => "",
        }
    }

    /// Constant value of a literal token
    pub fn literal_value(&self) -> Option<Value> {
        match (self.tok, &self.value) {
            (Tok::Integer, _) => Some(Value::Integer(self.int_value)),
            (Tok::String, TokenValue::Text(s)) => Some(Value::String(s.clone())),
            (Tok::Decimal | Tok::Literal, TokenValue::Value(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// Tokens that begin an operand in a math expression
    pub fn starts_operand(&self) -> bool {
        matches!(
            self.tok,
            Tok::Identifier
                | Tok::String
                | Tok::Integer
                | Tok::Decimal
                | Tok::Literal
                | Tok::Seqcode
                | Tok::AtVar
                | Tok::AtExpr
                | Tok::At
                | Tok::LeftParen
                | Tok::LeftBrace
                | Tok::All
                | Tok::None
                | Tok::Within
                | Tok::Connected
                | Tok::Search
        )
    }

    /// Tokens that end an operand in a math expression
    pub fn ends_operand(&self) -> bool {
        matches!(
            self.tok,
            Tok::Identifier
                | Tok::String
                | Tok::Integer
                | Tok::Decimal
                | Tok::Literal
                | Tok::Seqcode
                | Tok::AtVar
                | Tok::AtExpr
                | Tok::RightParen
                | Tok::RightSquare
                | Tok::RightBrace
                | Tok::All
                | Tok::None
        )
    }

    #[inline]
    pub fn flow_kind(&self) -> Option<FlowKind> {
        match self.value {
            TokenValue::Flow(k) => Some(k),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.tok, &self.value) {
            (Tok::Integer, _) => write!(f, "{}", self.int_value),
            (Tok::String, TokenValue::Text(s)) => write!(f, "{}", crate::core::value::escape_str(s)),
            (Tok::Decimal | Tok::Literal, TokenValue::Value(v)) => write!(f, "{}", v.escape()),
            (Tok::Seqcode, TokenValue::Text(code)) => write!(f, "{}^{}", self.int_value, code),
            (Tok::AtVar, TokenValue::Text(s)) => write!(f, "@{}", s),
            (Tok::AtExpr, TokenValue::Tokens(tokens)) => {
                write!(f, "@{{")?;
                for (i, t) in tokens.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, "}}")
            }
            (Tok::PropSelector, TokenValue::Text(s)) => write!(f, ".{}", s),
            (Tok::ResidueSpec, TokenValue::Residue(spec)) => write!(f, "{}", spec),
            (Tok::Comparator, TokenValue::Comparator(c)) => {
                write!(f, "{} {} {}", c.property, c.op.text(), c.operand)
            }
            (Tok::ItemSelector, TokenValue::Value(v)) => {
                write!(f, "[{}][{}]", self.int_value, v)
            }
            (Tok::ItemSelector, _) => write!(f, "[{}]", self.int_value),
            (Tok::End, TokenValue::Flow(kind)) if *kind != FlowKind::Block => {
                write!(f, "end {}", kind.name())
            }
            (_, TokenValue::Text(s)) => write!(f, "{}", s),
            _ => write!(f, "{}", self.tok.text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(Tok::from_keyword("PRINT"), Some(Tok::Print));
        assert_eq!(Tok::from_keyword("elseif"), Some(Tok::ElseIf));
        assert_eq!(Tok::from_keyword("zoom"), Some(Tok::HostCommand));
        assert_eq!(Tok::from_keyword("carbon"), None);
    }

    #[test]
    fn test_command_attributes() {
        assert!(Tok::While.is_flow_command());
        assert!(Tok::Select.is_atom_expression_command());
        assert!(Tok::Print.is_math_expression_command());
        assert_eq!(Tok::Echo.implicit_string(), Some(ImplicitString::Literal));
        assert_eq!(
            Tok::Goto.implicit_string(),
            Some(ImplicitString::AllowLeadingVariable)
        );
        assert!(Tok::Exit.takes_no_arguments());
        assert!(takes_implied_filename("LOAD"));
        assert!(!takes_implied_filename("zoom"));
    }

    #[test]
    fn test_operator_attributes() {
        assert!(Tok::Le.is_comparator());
        assert!(Tok::Plus.continues_line());
        assert!(!Tok::PlusPlus.continues_line());
        assert_eq!(Tok::PlusEq.compound_assignment(), Some(Tok::Plus));
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::integer(-3).to_string(), "-3");
        assert_eq!(Token::string("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Token::new(Tok::Power).to_string(), "**");
        let spec = ResidueSpec {
            name: Some("ALA".into()),
            seq_start: Some(23),
            chain: Some('A'),
            atom: Some("CA".into()),
            ..Default::default()
        };
        assert_eq!(spec.to_string(), "[ALA]23:A.CA");
    }
}
