//! ソースコード文字列をトークンのシーケンスに変換する字句解析器(Lexer)。
//! トークンは `next_token` が呼ばれるたびに1つずつ生成される。

extern crate alloc;
use crate::error::{LexError, LexErrorKind};
use crate::span::Span;
use crate::syntax;
use crate::token::Token;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::iter::Peekable;
use core::str::Chars;

/// 字句解析器
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// 新しいLexerを生成する
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// ソースコード全体をトークンに変換する。末尾の `Eof` も含む。
    pub fn tokenize_all(&mut self) -> Result<Vec<(Token, Span)>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let (token, span) = self.next_token()?;
            let is_eof = token == Token::Eof;
            tokens.push((token, span));
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    /// 次の1トークンを解析して返す。入力の終端では `Token::Eof` を返し続ける。
    pub fn next_token(&mut self) -> Result<(Token, Span), LexError> {
        self.skip_trivia()?;

        let span = self.span();
        let Some(&c) = self.peek() else {
            return Ok((Token::Eof, span));
        };

        let token = match c {
            '0'..='9' => self.consume_number(span)?,
            '$' => {
                self.next_char();
                self.consume_radix_number(16, span)?
            }
            '&' => {
                self.next_char();
                self.consume_radix_number(8, span)?
            }
            '"' => {
                self.next_char();
                self.consume_string(span)?
            }
            c if is_ident_start(c) => self.consume_word(),
            c if syntax::is_operator_start(c) => self.consume_operator(span)?,
            c => match syntax::check_character(c) {
                Some(token) => {
                    self.next_char();
                    token
                }
                None => return Err(LexError::invalid_symbol(c, span)),
            },
        };
        Ok((token, span))
    }

    // --- ヘルパー関数 ---

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }
    fn next_char(&mut self) -> Option<char> {
        let char = self.input.next()?;
        if char == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(char)
    }
    fn peek(&mut self) -> Option<&char> {
        self.input.peek()
    }

    /// 空白と `{ ... }` コメントを読み飛ばす
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(&c) if syntax::is_delimiter(c) => {
                    self.next_char();
                }
                Some('{') => {
                    let start = self.span();
                    self.next_char();
                    loop {
                        match self.next_char() {
                            Some('}') => break,
                            Some(_) => {}
                            None => {
                                return Err(LexError::new(
                                    LexErrorKind::UnterminatedComment,
                                    "Unterminated comment",
                                    start,
                                ));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn consume_number(&mut self, span: Span) -> Result<Token, LexError> {
        let mut s = String::new();
        let mut seen_dot = false;
        while let Some(&c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
            } else if c == '.' {
                if seen_dot {
                    return Err(LexError::new(
                        LexErrorKind::MalformedNumber,
                        format!("Malformed number: '{}.'", s),
                        span,
                    ));
                }
                seen_dot = true;
                s.push(c);
            } else {
                break;
            }
            self.next_char();
        }

        let malformed = || {
            LexError::new(
                LexErrorKind::MalformedNumber,
                format!("Malformed number: '{}'", s),
                span,
            )
        };
        // `.`が含まれているかどうかでIntかFloatかを判断する
        if seen_dot {
            s.parse().map(Token::FloatLiteral).map_err(|_| malformed())
        } else {
            s.parse().map(Token::IntLiteral).map_err(|_| malformed())
        }
    }

    /// `$1F` (16進) や `&17` (8進) の整数リテラル。接頭辞は消費済み。
    fn consume_radix_number(&mut self, radix: u32, span: Span) -> Result<Token, LexError> {
        let mut digits = String::new();
        while let Some(&c) = self.peek() {
            if !c.is_ascii_alphanumeric() {
                break;
            }
            digits.push(c);
            self.next_char();
        }
        i64::from_str_radix(&digits, radix)
            .map(Token::IntLiteral)
            .map_err(|_| {
                let prefix = if radix == 16 { '$' } else { '&' };
                LexError::new(
                    LexErrorKind::MalformedNumber,
                    format!("Malformed number: '{}{}'", prefix, digits),
                    span,
                )
            })
    }

    /// 開始の `"` は消費済み
    fn consume_string(&mut self, span: Span) -> Result<Token, LexError> {
        let mut s = String::new();
        loop {
            let Some(current_char) = self.next_char() else {
                return Err(LexError::new(
                    LexErrorKind::UnterminatedString,
                    "Unterminated string literal",
                    span,
                ));
            };
            match current_char {
                '"' => return Ok(Token::StringLiteral(s)),
                // エスケープシーケンスの処理
                '\\' => {
                    let escape_span = self.span();
                    match self.next_char() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('\\') => s.push('\\'),
                        Some('"') => s.push('"'),
                        Some(other) => {
                            return Err(LexError::new(
                                LexErrorKind::UnknownEscape(other),
                                format!("Unknown escape sequence '\\{}'", other),
                                escape_span,
                            ));
                        }
                        None => {
                            return Err(LexError::new(
                                LexErrorKind::UnterminatedString,
                                "Unterminated string literal",
                                span,
                            ));
                        }
                    }
                }
                c => s.push(c),
            }
        }
    }

    /// キーワード、単語の演算子(`mod` など)、識別子のいずれか
    fn consume_word(&mut self) -> Token {
        let mut s = String::new();
        while let Some(&c) = self.peek() {
            if is_ident_continue(c) {
                s.push(c);
                self.next_char();
            } else {
                break;
            }
        }
        if let Some(keyword) = syntax::check_keyword(&s) {
            return keyword;
        }
        match syntax::lookup_operator(&s) {
            Some(op) => Token::Operator(op),
            None => Token::Identifier(s),
        }
    }

    /// 有効な演算子として成立する限り文字を読み進める(最長一致)
    fn consume_operator(&mut self, span: Span) -> Result<Token, LexError> {
        let mut lexeme = String::new();
        while let Some(&c) = self.peek() {
            let mut candidate = lexeme.clone();
            candidate.push(c);
            if !syntax::is_operator_start(c) || !syntax::is_symbolic_prefix(&candidate) {
                break;
            }
            lexeme = candidate;
            self.next_char();
        }

        if lexeme == ":" {
            return Ok(Token::Colon);
        }
        syntax::lookup_operator(&lexeme)
            .map(Token::Operator)
            .ok_or_else(|| {
                let first = lexeme.chars().next().unwrap_or(' ');
                LexError::invalid_symbol(first, span)
            })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Operator;
    use alloc::string::ToString;
    use alloc::vec;

    fn kinds(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn compound_operators_use_longest_match() {
        assert_eq!(
            kinds("x:=y<=z<>w>=1"),
            vec![
                Token::Identifier("x".to_string()),
                Token::Operator(Operator::Assign),
                Token::Identifier("y".to_string()),
                Token::Operator(Operator::LessEqual),
                Token::Identifier("z".to_string()),
                Token::Operator(Operator::NotEqual),
                Token::Identifier("w".to_string()),
                Token::Operator(Operator::GreaterEqual),
                Token::IntLiteral(1),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn operator_followed_by_unary_minus_is_split() {
        assert_eq!(
            kinds("a*-1"),
            vec![
                Token::Identifier("a".to_string()),
                Token::Operator(Operator::Star),
                Token::Operator(Operator::Minus),
                Token::IntLiteral(1),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn word_operators_and_keywords_are_classified() {
        assert_eq!(
            kinds("if a mod b then"),
            vec![
                Token::If,
                Token::Identifier("a".to_string()),
                Token::Operator(Operator::Mod),
                Token::Identifier("b".to_string()),
                Token::Then,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn numbers_in_every_radix() {
        assert_eq!(
            kinds("42 2.5 $1F &17"),
            vec![
                Token::IntLiteral(42),
                Token::FloatLiteral(2.5),
                Token::IntLiteral(31),
                Token::IntLiteral(15),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn second_decimal_point_is_rejected() {
        let err = Lexer::new("1.2.3").tokenize_all().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::MalformedNumber);
        assert_eq!(err.span, Span::new(1, 1));
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            kinds(r#""a\"b\\c\n""#),
            vec![Token::StringLiteral("a\"b\\c\n".to_string()), Token::Eof]
        );
        let err = Lexer::new("\"open").tokenize_all().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = Lexer::new("begin\n  x := 1 { note }\nend.").tokenize_all().unwrap();
        let spans: Vec<Span> = tokens.iter().map(|(_, span)| *span).collect();
        assert_eq!(
            spans,
            vec![
                Span::new(1, 1),
                Span::new(2, 3),
                Span::new(2, 5),
                Span::new(2, 8),
                Span::new(3, 1),
                Span::new(3, 4),
                Span::new(3, 5),
            ]
        );
    }

    #[test]
    fn invalid_symbol_reports_character_and_position() {
        let err = Lexer::new("x := 1 # 2").tokenize_all().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidSymbol('#'));
        assert_eq!(err.span, Span::new(1, 8));
        assert_eq!(err.message, "Invalid symbol: '#'");
    }

    #[test]
    fn identifiers_are_ascii_only() {
        let err = Lexer::new("var caf\u{e9}: integer;").tokenize_all().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidSymbol('\u{e9}'));
        assert_eq!(err.span, Span::new(1, 8));

        let err = Lexer::new("\u{e9}t\u{e9}").tokenize_all().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::InvalidSymbol('\u{e9}'));
        assert_eq!(err.span, Span::new(1, 1));
    }

    #[test]
    fn end_of_input_is_sticky() {
        let mut lexer = Lexer::new("  ");
        assert_eq!(lexer.next_token().unwrap().0, Token::Eof);
        assert_eq!(lexer.next_token().unwrap().0, Token::Eof);
    }
}
