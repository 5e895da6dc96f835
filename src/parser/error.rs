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

//! Compile error types
//!
//! Compilation stops at the first error. The error carries the translated
//! summary inputs (kind plus up to two substitution values) and the source
//! location of the statement being compiled.

use std::fmt;

/// The kinds of compile error the script compiler reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    BadArgumentCount,
    BadContext,
    CommandExpected,
    CoordinateExpected,
    EndOfCommandUnexpected,
    EndOfExpressionExpected,
    IdentifierOrResidueSpecificationExpected,
    InvalidAtomSpecification,
    InvalidChainSpecification,
    InvalidExpressionToken,
    InvalidModelSpecification,
    MissingEnd,
    NumberExpected,
    NumberOrVariableNameExpected,
    ResidueSpecificationExpected,
    TokenExpected,
    TokenUnexpected,
    UnrecognizedExpressionToken,
    UnrecognizedParameter,
    UnrecognizedToken,
}

impl CompileErrorKind {
    /// Summary text; `{0}` and `{1}` are substitution points
    pub fn summary(&self) -> &'static str {
        match self {
            CompileErrorKind::BadArgumentCount => "bad argument count",
            CompileErrorKind::BadContext => "invalid context for {0}",
            CompileErrorKind::CommandExpected => "command expected",
            CompileErrorKind::CoordinateExpected => "{ number number number } expected",
            CompileErrorKind::EndOfCommandUnexpected => "unexpected end of script command",
            CompileErrorKind::EndOfExpressionExpected => "end of expression expected",
            CompileErrorKind::IdentifierOrResidueSpecificationExpected => {
                "identifier or residue specification expected"
            }
            CompileErrorKind::InvalidAtomSpecification => "invalid atom specification",
            CompileErrorKind::InvalidChainSpecification => "invalid chain specification",
            CompileErrorKind::InvalidExpressionToken => "invalid expression token: {0}",
            CompileErrorKind::InvalidModelSpecification => "invalid model specification",
            CompileErrorKind::MissingEnd => "missing END for {0}",
            CompileErrorKind::NumberExpected => "number expected",
            CompileErrorKind::NumberOrVariableNameExpected => "number or variable name expected",
            CompileErrorKind::ResidueSpecificationExpected => {
                "residue specification (ALA, AL?, A*) expected"
            }
            CompileErrorKind::TokenExpected => "{0} expected",
            CompileErrorKind::TokenUnexpected => "{0} unexpected",
            CompileErrorKind::UnrecognizedExpressionToken => "unrecognized expression token: {0}",
            CompileErrorKind::UnrecognizedParameter => "unrecognized {0} parameter",
            CompileErrorKind::UnrecognizedToken => "unrecognized token: {0}",
        }
    }
}

/// A compile error with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    /// First substitution value, usually the offending token
    pub value: Option<String>,
    /// Second substitution value
    pub more: Option<String>,
    /// Line number, starting at 1
    pub line: usize,
    /// Index of the statement being compiled
    pub command_index: usize,
    /// Byte range of the statement in the script
    pub char_range: (usize, usize),
    /// Statement text with the error point marked `>>>>`
    pub line_info: String,
    /// Byte offset of the offending token, when known
    pub offset: Option<usize>,
}

impl CompileError {
    /// Create an error with no location yet
    pub fn new(kind: CompileErrorKind) -> Self {
        Self {
            kind,
            value: None,
            more: None,
            line: 0,
            command_index: 0,
            char_range: (0, 0),
            line_info: String::new(),
            offset: None,
        }
    }

    /// Create an error with a substitution value
    pub fn with_value(kind: CompileErrorKind, value: impl Into<String>) -> Self {
        let mut err = Self::new(kind);
        err.value = Some(value.into());
        err
    }

    /// Add a second substitution value
    pub fn and_more(mut self, more: impl Into<String>) -> Self {
        self.more = Some(more.into());
        self
    }

    /// Record the offset of the offending token
    pub fn at(mut self, offset: usize) -> Self {
        self.offset.get_or_insert(offset);
        self
    }

    /// Attach the statement location. `script` is the whole source,
    /// `start..end` the statement and `at` the error offset within it.
    pub fn locate(
        mut self,
        script: &str,
        line: usize,
        command_index: usize,
        start: usize,
        end: usize,
        at: usize,
    ) -> Self {
        let end = end.clamp(start, script.len());
        let at = at.clamp(start, end);
        let text = script.get(start..end).unwrap_or("");
        self.line_info = if at < end {
            let split = at - start;
            match (text.get(..split), text.get(split..)) {
                (Some(head), Some(tail)) => format!("{} >>>> {} <<<<", head, tail),
                _ => format!("{} <<<<", text),
            }
        } else {
            format!("{} <<<<", text)
        };
        self.line = line;
        self.command_index = command_index;
        self.char_range = (start, end);
        self
    }

    /// Summary with substitutions applied
    pub fn message(&self) -> String {
        let mut msg = self.kind.summary().to_string();
        if !msg.contains("{0}") {
            if let Some(v) = &self.value {
                msg.push_str(": ");
                msg.push_str(v);
            }
            return msg;
        }
        msg = msg.replace("{0}", self.value.as_deref().unwrap_or(""));
        if msg.contains("{1}") {
            msg = msg.replace("{1}", self.more.as_deref().unwrap_or(""));
        } else if let Some(more) = &self.more {
            msg.push_str(": ");
            msg.push_str(more);
        }
        msg
    }

    /// Full diagnostic with the marked statement
    pub fn format_error(&self) -> String {
        format!(
            "script compiler ERROR: {}\n----\n         line {} command {}: {}",
            self.message(),
            self.line,
            self.command_index + 1,
            self.line_info
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())?;
        if self.line > 0 {
            write!(f, " (line {})", self.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_substitution() {
        let err = CompileError::with_value(CompileErrorKind::MissingEnd, "if");
        assert_eq!(err.message(), "missing END for if");

        let err = CompileError::with_value(CompileErrorKind::BadContext, "end while");
        assert_eq!(err.message(), "invalid context for end while");

        let err = CompileError::with_value(CompileErrorKind::NumberExpected, "x");
        assert_eq!(err.message(), "number expected: x");

        let err = CompileError::with_value(CompileErrorKind::TokenExpected, ")").and_more("got ]");
        assert_eq!(err.message(), ") expected: got ]");
    }

    #[test]
    fn test_format_error() {
        let script = "print 1\nprint (2 +\n";
        let err = CompileError::with_value(CompileErrorKind::TokenExpected, ")")
            .locate(script, 2, 1, 8, 18, 16);
        assert_eq!(err.line_info, "print (2 >>>>  + <<<<");
        assert_eq!(
            err.format_error(),
            "script compiler ERROR: ) expected\n----\n         line 2 command 2: print (2 >>>>  + <<<<"
        );
        assert_eq!(err.char_range, (8, 18));
    }
}
