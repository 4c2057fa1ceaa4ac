//! キーワード・記号・演算子の静的な分類表。
//! 字句解析器と構文解析器の両方から参照される。

use crate::token::{Operator, Token};

/// 演算子表の1行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub operator: Operator,
    pub lexeme: &'static str,
    pub precedence: u8,
    pub is_boolean: bool,
}

const fn op(operator: Operator, lexeme: &'static str, precedence: u8, is_boolean: bool) -> OperatorInfo {
    OperatorInfo {
        operator,
        lexeme,
        precedence,
        is_boolean,
    }
}

/// 代入の優先順位。これより低い優先順位の演算子は存在しない。
pub const ASSIGN_PRECEDENCE: u8 = 5;

/// `Operator` の宣言順に並べた演算子表
pub static OPERATORS: [OperatorInfo; 15] = [
    op(Operator::Assign, ":=", ASSIGN_PRECEDENCE, false),
    op(Operator::Equal, "=", 10, true),
    op(Operator::NotEqual, "<>", 10, true),
    op(Operator::Less, "<", 10, true),
    op(Operator::LessEqual, "<=", 10, true),
    op(Operator::Greater, ">", 10, true),
    op(Operator::GreaterEqual, ">=", 10, true),
    op(Operator::And, "and", 10, true),
    op(Operator::Or, "or", 10, true),
    op(Operator::Plus, "+", 20, false),
    op(Operator::Minus, "-", 20, false),
    op(Operator::Star, "*", 40, false),
    op(Operator::Slash, "/", 40, false),
    op(Operator::Div, "div", 40, false),
    op(Operator::Mod, "mod", 40, false),
];

/// 演算子の情報を返す。表は判別値順なので添字で引ける。
pub fn operator_info(operator: Operator) -> &'static OperatorInfo {
    &OPERATORS[operator as usize]
}

/// 記号または単語から演算子を探す
pub fn lookup_operator(lexeme: &str) -> Option<Operator> {
    OPERATORS
        .iter()
        .find(|info| info.lexeme == lexeme)
        .map(|info| info.operator)
}

/// 記号で始まる演算子の先頭文字か
pub fn is_operator_start(c: char) -> bool {
    matches!(c, '<' | '=' | '>' | '+' | '-' | '*' | '/' | ':')
}

/// `lexeme` が記号演算子(またはコロン)の接頭辞として成立するか
pub fn is_symbolic_prefix(lexeme: &str) -> bool {
    lexeme == ":" || OPERATORS.iter().any(|info| info.lexeme == lexeme)
}

pub fn is_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// 単語がキーワードに一致する場合、対応するTokenを返す
pub fn check_keyword(word: &str) -> Option<Token> {
    match word {
        "program" => Some(Token::Program),
        "const" => Some(Token::Const),
        "var" => Some(Token::Var),
        "function" => Some(Token::Function),
        "procedure" => Some(Token::Procedure),
        "forward" => Some(Token::Forward),
        "begin" => Some(Token::Begin),
        "end" => Some(Token::End),
        "if" => Some(Token::If),
        "then" => Some(Token::Then),
        "else" => Some(Token::Else),
        "while" => Some(Token::While),
        "do" => Some(Token::Do),
        "for" => Some(Token::For),
        "to" => Some(Token::To),
        "downto" => Some(Token::Downto),
        "break" => Some(Token::Break),
        "exit" => Some(Token::Exit),
        _ => None,
    }
}

/// 1文字の区切り記号
pub fn check_character(c: char) -> Option<Token> {
    match c {
        ',' => Some(Token::Comma),
        ':' => Some(Token::Colon),
        ';' => Some(Token::Semicolon),
        '.' => Some(Token::Dot),
        '(' => Some(Token::LParen),
        ')' => Some(Token::RParen),
        _ => None,
    }
}

/// 値を持たないトークンの表記
pub fn simple_token_text(token: &Token) -> Option<&'static str> {
    let text = match token {
        Token::Program => "program",
        Token::Const => "const",
        Token::Var => "var",
        Token::Function => "function",
        Token::Procedure => "procedure",
        Token::Forward => "forward",
        Token::Begin => "begin",
        Token::End => "end",
        Token::If => "if",
        Token::Then => "then",
        Token::Else => "else",
        Token::While => "while",
        Token::Do => "do",
        Token::For => "for",
        Token::To => "to",
        Token::Downto => "downto",
        Token::Break => "break",
        Token::Exit => "exit",
        Token::Comma => ",",
        Token::Colon => ":",
        Token::Semicolon => ";",
        Token::Dot => ".",
        Token::LParen => "(",
        Token::RParen => ")",
        _ => return None,
    };
    Some(text)
}
