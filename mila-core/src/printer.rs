//! ASTをMilaのソースコードとして書き出す。
//! 出力を再び解析すると(位置情報を除いて)同じ構文木になる。

extern crate alloc;
use crate::ast::*;
use alloc::string::String;
use core::fmt::{self, Write};

const INDENT: &str = "    ";

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            writeln!(f, "program {};", name)?;
            writeln!(f)?;
        }
        write_declarations(f, &self.constants, &self.variables, 0)?;
        for function in &self.functions {
            write!(f, "{}", function)?;
        }
        write_statement(f, &self.body, 0)?;
        writeln!(f, ".")
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.is_procedure() { "procedure" } else { "function" };
        write!(f, "{} {}", keyword, self.name)?;
        if !self.params.is_empty() {
            f.write_char('(')?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", param.name, param.data_type)?;
            }
            f.write_char(')')?;
        }
        if !self.is_procedure() {
            write!(f, ": {}", self.return_type)?;
        }
        writeln!(f, ";")?;

        match &self.body {
            None => writeln!(f, "forward;"),
            Some(body) => {
                write_declarations(f, &self.constants, &self.variables, 0)?;
                write_statement(f, body, 0)?;
                writeln!(f, ";")
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_statement(f, self, 0)
    }
}

fn write_declarations(
    f: &mut fmt::Formatter<'_>,
    constants: &[ConstDecl],
    variables: &[VarDecl],
    level: usize,
) -> fmt::Result {
    if !constants.is_empty() {
        indent(f, level)?;
        writeln!(f, "const")?;
        for constant in constants {
            indent(f, level + 1)?;
            write!(f, "{} = ", constant.name)?;
            write_statement(f, &constant.value, level + 1)?;
            writeln!(f, ";")?;
        }
    }
    if !variables.is_empty() {
        indent(f, level)?;
        writeln!(f, "var")?;
        for variable in variables {
            indent(f, level + 1)?;
            writeln!(f, "{}: {};", variable.name, variable.data_type)?;
        }
    }
    Ok(())
}

/// 文を書き出す。先頭のインデントは呼び出し側が済ませている前提。
fn write_statement(f: &mut fmt::Formatter<'_>, expression: &Expression, level: usize) -> fmt::Result {
    if let Some(operand) = expression.as_negation() {
        f.write_char('-')?;
        return write_statement(f, operand, level);
    }

    match &expression.kind {
        ExprKind::IntLiteral(value) => write!(f, "{}", value),
        ExprKind::FloatLiteral(value) => f.write_str(&format_double(*value)),
        ExprKind::StringLiteral(value) => f.write_str(&quote(value)),
        ExprKind::Identifier(name) => f.write_str(name),
        ExprKind::Call { name, args } => {
            write!(f, "{}(", name)?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_statement(f, arg, level)?;
            }
            f.write_char(')')
        }
        ExprKind::Parenthesized(inner) => {
            f.write_char('(')?;
            write_statement(f, inner, level)?;
            f.write_char(')')
        }
        ExprKind::BinaryOp { op, left, right, .. } => {
            write_statement(f, left, level)?;
            write!(f, " {} ", op)?;
            write_statement(f, right, level)
        }
        ExprKind::Assign { target, value } => {
            write!(f, "{} := ", target)?;
            write_statement(f, value, level)
        }
        ExprKind::Block { statements } => {
            writeln!(f, "begin")?;
            for (i, statement) in statements.iter().enumerate() {
                indent(f, level + 1)?;
                write_statement(f, statement, level + 1)?;
                if i + 1 < statements.len() {
                    f.write_char(';')?;
                }
                writeln!(f)?;
            }
            indent(f, level)?;
            f.write_str("end")
        }
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            f.write_str("if ")?;
            write_statement(f, condition, level)?;
            f.write_str(" then ")?;
            write_statement(f, then_branch, level)?;
            if let Some(else_branch) = else_branch {
                f.write_str(" else ")?;
                write_statement(f, else_branch, level)?;
            }
            Ok(())
        }
        ExprKind::While { condition, body } => {
            f.write_str("while ")?;
            write_statement(f, condition, level)?;
            f.write_str(" do ")?;
            write_statement(f, body, level)
        }
        ExprKind::For {
            counter,
            start,
            finish,
            downto,
            body,
            ..
        } => {
            write!(f, "for {} := ", counter)?;
            write_statement(f, start, level)?;
            f.write_str(if *downto { " downto " } else { " to " })?;
            write_statement(f, finish, level)?;
            f.write_str(" do ")?;
            write_statement(f, body, level)
        }
        ExprKind::Break => f.write_str("break"),
        ExprKind::Exit => f.write_str("exit"),
    }
}

fn indent(f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
    for _ in 0..level {
        f.write_str(INDENT)?;
    }
    Ok(())
}

/// 常に小数点を含める。`f64` のDisplayは指数表記を使わないので字句解析器で読み戻せる。
pub fn format_double(value: f64) -> String {
    let mut text = alloc::format!("{}", value);
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
