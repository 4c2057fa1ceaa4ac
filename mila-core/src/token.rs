//! 字句解析の結果であるトークンの種類を定義します。

extern crate alloc;
use crate::syntax;
use alloc::format;
use alloc::string::{String, ToString};
use core::fmt;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Keywords
    Program,
    Const,
    Var,
    Function,
    Procedure,
    Forward,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    For,
    To,
    Downto,
    Break,
    Exit,

    // Identifier and Literals
    Identifier(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),

    // Symbols
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Dot,       // .
    LParen,    // (
    RParen,    // )

    /// 演算子。優先順位と真偽値フラグは演算子表から引く。
    Operator(Operator),

    /// 入力の終端。何度呼ばれても返し続ける。
    Eof,
}

/// 二項演算子の種類。判別値は `syntax::OPERATORS` の添字と一致する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    Assign,       // :=
    Equal,        // =
    NotEqual,     // <>
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    And,          // and
    Or,           // or
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Div,          // div
    Mod,          // mod
}

impl Operator {
    pub fn precedence(self) -> u8 {
        syntax::operator_info(self).precedence
    }

    /// 演算結果が真偽値になるかどうか
    pub fn is_boolean(self) -> bool {
        syntax::operator_info(self).is_boolean
    }

    pub fn lexeme(self) -> &'static str {
        syntax::operator_info(self).lexeme
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lexeme())
    }
}

impl Token {
    /// 演算子トークンであれば、その優先順位を返す
    pub fn precedence(&self) -> Option<u8> {
        match self {
            Token::Operator(op) => Some(op.precedence()),
            _ => None,
        }
    }

    /// エラーメッセージ用に、ソースコード上での見た目に近い文字列を返す
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => name.clone(),
            Token::IntLiteral(value) => value.to_string(),
            Token::FloatLiteral(value) => format!("{}", value),
            Token::StringLiteral(s) => format!("\"{}\"", s),
            Token::Operator(op) => op.lexeme().to_string(),
            Token::Eof => "end of file".to_string(),
            other => syntax::simple_token_text(other).unwrap_or("<?>").to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
