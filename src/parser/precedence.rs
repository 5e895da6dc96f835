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

//! Operator precedence levels for the RPN evaluator

use super::token::Tok;

/// Precedence levels (higher number = higher precedence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
#[derive(Default)]
pub enum Precedence {
    /// Operands and function markers; never reduced by another operator
    #[default]
    None = 0,
    /// Parentheses
    Paren = 1,
    /// Ternary `?` and `:`
    Ternary = 2,
    /// Argument separator
    Comma = 3,
    /// Subscript and array brackets
    Square = 4,
    /// Logical operators (OR, XOR, TOGGLE)
    Or = 5,
    /// Logical operators (AND)
    And = 6,
    /// NOT operator
    Not = 7,
    /// Comparison operators (==, !=, <, <=, >, >=)
    Comparison = 8,
    /// Addition and subtraction
    Sum = 9,
    /// Multiplication, division, modulus, left division
    Product = 10,
    /// Unary minus, increment, decrement and power
    Prefix = 11,
    /// Property selectors (`.size`)
    Selector = 12,
}

impl Precedence {
    /// Get precedence for an operator string
    pub fn for_operator(op: &str) -> Precedence {
        match op.to_ascii_lowercase().as_str() {
            "(" | ")" => Precedence::Paren,
            "?" | ":" => Precedence::Ternary,
            "," => Precedence::Comma,
            "[" | "]" => Precedence::Square,
            "or" | "||" | "|" | "xor" | "toggle" => Precedence::Or,
            "and" | "&&" | "&" => Precedence::And,
            "not" | "!" => Precedence::Not,
            "==" | "=" | "!=" | "<>" | "<" | "<=" | ">" | ">=" => Precedence::Comparison,
            "+" | "-" => Precedence::Sum,
            "*" | "/" | "\\" | "%" => Precedence::Product,
            "**" | "++" | "--" => Precedence::Prefix,
            "." => Precedence::Selector,
            _ => Precedence::None,
        }
    }

    /// Precedence of a token kind
    pub fn for_tok(tok: Tok) -> Precedence {
        match tok {
            Tok::LeftParen | Tok::RightParen => Precedence::Paren,
            Tok::Question | Tok::Colon => Precedence::Ternary,
            Tok::Comma | Tok::MapColon => Precedence::Comma,
            Tok::LeftSquare | Tok::RightSquare => Precedence::Square,
            Tok::Or | Tok::Xor | Tok::Toggle | Tok::OrTrue => Precedence::Or,
            Tok::And | Tok::AndFalse => Precedence::And,
            Tok::Not => Precedence::Not,
            Tok::Eq | Tok::Ne | Tok::Lt | Tok::Le | Tok::Gt | Tok::Ge => Precedence::Comparison,
            Tok::Plus | Tok::Minus => Precedence::Sum,
            Tok::Times | Tok::Divide | Tok::LeftDivide | Tok::Percent => Precedence::Product,
            Tok::UnaryMinus | Tok::PlusPlus | Tok::MinusMinus | Tok::Power => Precedence::Prefix,
            Tok::PropSelector => Precedence::Selector,
            _ => Precedence::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Product > Precedence::Sum);
        assert!(Precedence::Sum > Precedence::Comparison);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::Not > Precedence::And);
        assert!(Precedence::Comma > Precedence::Ternary);
        assert!(Precedence::Selector > Precedence::Prefix);
    }

    #[test]
    fn test_operator_precedence() {
        assert_eq!(Precedence::for_operator("+"), Precedence::Sum);
        assert_eq!(Precedence::for_operator("*"), Precedence::Product);
        assert_eq!(Precedence::for_operator("AND"), Precedence::And);
        assert_eq!(Precedence::for_operator("OR"), Precedence::Or);
        assert_eq!(Precedence::for_operator("=="), Precedence::Comparison);
        assert_eq!(Precedence::for_operator("."), Precedence::Selector);
        assert_eq!(Precedence::for_operator("@"), Precedence::None);
    }

    #[test]
    fn test_tok_precedence() {
        assert_eq!(Tok::Xor.precedence(), Precedence::Or);
        assert_eq!(Tok::AndFalse.precedence(), Precedence::And);
        assert_eq!(Tok::Call.precedence(), Precedence::None);
        assert_eq!(Tok::ArrayOpen.precedence(), Precedence::None);
    }
}
