#![no_std]
//! Milaコンパイラのライブラリクレート。
//! 字句解析、構文解析、IRへのコード生成のパイプラインを管理します。

extern crate alloc;

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod span;
pub mod syntax;
pub mod token;

use crate::ast::{Expression, Program};
use crate::compiler::{CodeGenerator, CompileOptions};
use crate::error::LangError;
use crate::span::Span;
use crate::token::Token;
use alloc::string::String;
use alloc::vec::Vec;
use log::debug;

pub use crate::error::Diagnostic;

/// ソースコードを字句解析するヘルパー。末尾の `Eof` を含む。
pub fn lex_source(source: &str) -> Result<Vec<(Token, Span)>, LangError> {
    let tokens = lexer::Lexer::new(source).tokenize_all()?;
    debug!("lexed {} tokens", tokens.len());
    Ok(tokens)
}

/// ソースコードを構文解析してASTへ変換するヘルパー。
pub fn parse_source(source: &str) -> Result<Program, LangError> {
    let program = parser::Parser::new(source).parse()?;
    debug!(
        "parsed program {:?}: {} constants, {} variables, {} functions",
        program.name,
        program.constants.len(),
        program.variables.len(),
        program.functions.len()
    );
    Ok(program)
}

/// 単独の式を解析する。
pub fn parse_expression(source: &str) -> Result<Expression, LangError> {
    parser::Parser::new(source).parse_standalone_expression()
}

/// 解析済みのプログラムからIRモジュールを生成する。
pub fn compile_program(program: &Program, options: CompileOptions) -> Result<ir::Module, LangError> {
    let module = CodeGenerator::new(options).generate(program)?;
    debug!(
        "generated module '{}' with {} functions",
        module.name,
        module.functions.len()
    );
    Ok(module)
}

/// ソースコードからIRモジュールまでのパイプライン全体。
pub fn compile_source(source: &str, options: CompileOptions) -> Result<ir::Module, LangError> {
    let program = parse_source(source)?;
    compile_program(&program, options)
}

/// エラーを `LINE l; COLUMN c:` と目印付きの形式に整形する。
pub fn render_diagnostic(error: &LangError, source: &str) -> String {
    error.to_diagnostic().render(source)
}
