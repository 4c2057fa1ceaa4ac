//! コンパイル処理中に発生するエラーを定義します。
//! どのエラーも致命的で、最初に発生したものがパイプライン全体を中断する。

extern crate alloc;
use crate::span::Span;
use alloc::format;
use alloc::string::String;
use thiserror::Error;

/// 字句解析エラーの分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    /// 認識できない文字
    InvalidSymbol(char),
    UnterminatedString,
    UnterminatedComment,
    UnknownEscape(char),
    /// 小数点が2つ以上ある、桁がない、範囲外などの数値リテラル
    MalformedNumber,
}

/// 字句解析エラー
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {span}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub message: String,
    pub span: Span,
}

impl LexError {
    pub fn new(kind: LexErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn invalid_symbol(symbol: char, span: Span) -> Self {
        let shown = match symbol {
            '\n' => String::from("\\n"),
            '\t' => String::from("\\t"),
            c => String::from(c),
        };
        Self::new(
            LexErrorKind::InvalidSymbol(symbol),
            format!("Invalid symbol: '{}'", shown),
            span,
        )
    }
}

/// 構文解析エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken,
    /// 特定の記号やキーワードが必要な位置に別のものがあった
    ExpectedDifferent,
    NonBooleanCondition,
    InvalidAssignmentTarget,
    /// 値が必要な位置に文(ブロックや制御構文)が現れた
    InvalidOperand,
    UnknownType,
    NestingTooDeep,
}

/// 構文解析エラー
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {span}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn unexpected(found: &str, span: Span) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken,
            format!("Unexpected token: '{}'", found),
            span,
        )
    }

    pub fn expected(expected: &str, found: &str, span: Span) -> Self {
        Self::new(
            ParseErrorKind::ExpectedDifferent,
            format!("Expected '{}' but found '{}'", expected, found),
            span,
        )
    }
}

/// コード生成エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    UnknownIdentifier,
    ConstantAssignment,
    UndefinedFunction,
    ArgumentCountMismatch,
    BreakOutsideLoop,
    NotImplemented,
    TypeMismatch,
    Redefinition,
    InvalidConstant,
    /// IR検証の失敗。ソース上の位置を持たない。
    InvalidModule,
}

/// コンパイルエラー（名前解決、型の統一、制御フローの構築など）
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}{}", .span.map(|s| format!(" at {}", s)).unwrap_or_default())]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn positionless(kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }
}

/// ライブラリ全体で発生しうるエラーの集約
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LangError {
    #[error("Lex Error: {0}")]
    Lex(#[from] LexError),
    #[error("Parse Error: {0}")]
    Parse(#[from] ParseError),
    #[error("Compile Error: {0}")]
    Compile(#[from] CompileError),
}

impl LangError {
    pub fn span(&self) -> Option<Span> {
        match self {
            LangError::Lex(e) => Some(e.span),
            LangError::Parse(e) => Some(e.span),
            LangError::Compile(e) => e.span,
        }
    }

    /// 位置情報を含まない本文
    pub fn message(&self) -> &str {
        match self {
            LangError::Lex(e) => &e.message,
            LangError::Parse(e) => &e.message,
            LangError::Compile(e) => &e.message,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            message: String::from(self.message()),
            span: self.span(),
        }
    }
}

/// 利用者に表示するための診断情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    /// 該当行と `~~~^~~~` の目印を付けて整形する。
    ///
    /// ```text
    /// LINE 3; COLUMN 5:
    ///     x := ;
    /// ~~~~^~~~~~
    /// ERROR:	Unexpected token: ';'
    /// ```
    pub fn render(&self, source: &str) -> String {
        let mut out = String::new();
        if let Some(span) = self.span {
            out.push_str(&format!("LINE {}; COLUMN {}:\n", span.line, span.column));
            let line = source
                .lines()
                .nth(span.line.saturating_sub(1))
                .unwrap_or_default();
            out.push_str(line);
            out.push('\n');
            out.push_str(&caret_line(line, span.column));
            out.push('\n');
        }
        out.push_str(&format!("ERROR:\t{}", self.message));
        out
    }
}

fn caret_line(line: &str, column: usize) -> String {
    let width = line.chars().count();
    let mut marker = String::new();
    for _ in 1..column {
        marker.push('~');
    }
    marker.push('^');
    for _ in column..width {
        marker.push('~');
    }
    marker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_marks_the_offending_column() {
        let source = "begin\n  x := ;\nend.";
        let error: LangError =
            ParseError::unexpected(";", Span::new(2, 8)).into();
        let rendered = error.to_diagnostic().render(source);
        let lines: alloc::vec::Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "LINE 2; COLUMN 8:");
        assert_eq!(lines[1], "  x := ;");
        assert_eq!(lines[2], "~~~~~~~^");
        assert_eq!(lines[3], "ERROR:\tUnexpected token: ';'");
    }

    #[test]
    fn positionless_errors_render_only_the_message() {
        let error: LangError =
            CompileError::positionless(CompileErrorKind::InvalidModule, "broken block").into();
        assert_eq!(error.span(), None);
        assert_eq!(error.to_diagnostic().render("begin end."), "ERROR:\tbroken block");
        assert_eq!(alloc::format!("{}", error), "Compile Error: broken block");
    }
}
