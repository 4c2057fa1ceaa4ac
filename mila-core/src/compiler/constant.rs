//! `const` 宣言の値をコンパイル時に計算する。

extern crate alloc;
use super::scope::{Symbol, SymbolTable};
use crate::ast::{ExprKind, Expression};
use crate::error::{CompileError, CompileErrorKind, LangError};
use crate::ir::Constant;
use crate::token::Operator;
use alloc::format;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Double(f64),
}

impl ConstValue {
    fn as_double(self) -> f64 {
        match self {
            ConstValue::Int(v) => v as f64,
            ConstValue::Double(v) => v,
        }
    }
}

impl From<ConstValue> for Constant {
    fn from(value: ConstValue) -> Self {
        match value {
            ConstValue::Int(v) => Constant::Int(v),
            ConstValue::Double(v) => Constant::Double(v),
        }
    }
}

/// 定数式を評価する。参照できるのは既に宣言された定数だけ。
pub fn fold_constant(expr: &Expression, symbols: &SymbolTable) -> Result<ConstValue, LangError> {
    match &expr.kind {
        ExprKind::IntLiteral(v) => Ok(ConstValue::Int(*v)),
        ExprKind::FloatLiteral(v) => Ok(ConstValue::Double(*v)),
        ExprKind::Parenthesized(inner) => fold_constant(inner, symbols),
        ExprKind::Identifier(name) => match symbols.resolve(name) {
            Some(Symbol::Constant(value)) => Ok(value),
            Some(Symbol::Variable { .. }) => Err(invalid(
                format!("'{}' is a variable and cannot be used in a constant", name),
                expr,
            )),
            None => Err(CompileError::new(
                CompileErrorKind::UnknownIdentifier,
                format!("Unknown identifier: '{}'", name),
                expr.span,
            )
            .into()),
        },
        ExprKind::BinaryOp {
            op, left, right, ..
        } => {
            let left = fold_constant(left, symbols)?;
            let right = fold_constant(right, symbols)?;
            fold_binary(*op, left, right, expr)
        }
        _ => Err(invalid(
            format!("Constant '{}' must be a numeric expression", expr),
            expr,
        )),
    }
}

fn fold_binary(op: Operator, left: ConstValue, right: ConstValue, expr: &Expression) -> Result<ConstValue, LangError> {
    if let (ConstValue::Int(a), ConstValue::Int(b)) = (left, right) {
        let result = match op {
            Operator::Plus => a.checked_add(b),
            Operator::Minus => a.checked_sub(b),
            Operator::Star => a.checked_mul(b),
            Operator::Slash | Operator::Div | Operator::Mod if b == 0 => {
                return Err(invalid("Division by zero in a constant expression".into(), expr));
            }
            Operator::Slash | Operator::Div => a.checked_div(b),
            Operator::Mod => a.checked_rem(b),
            _ => return Err(not_a_number(op, expr)),
        };
        return result
            .map(ConstValue::Int)
            .ok_or_else(|| invalid("Constant expression overflows".into(), expr));
    }

    let (a, b) = (left.as_double(), right.as_double());
    let result = match op {
        Operator::Plus => a + b,
        Operator::Minus => a - b,
        Operator::Star => a * b,
        Operator::Slash => a / b,
        Operator::Mod => a % b,
        Operator::Div => {
            return Err(CompileError::new(
                CompileErrorKind::NotImplemented,
                "Operator 'div' is not implemented for double",
                expr.span,
            )
            .into());
        }
        _ => return Err(not_a_number(op, expr)),
    };
    Ok(ConstValue::Double(result))
}

fn not_a_number(op: Operator, expr: &Expression) -> LangError {
    invalid(
        format!("Operator '{}' does not produce a numeric constant", op),
        expr,
    )
}

fn invalid(message: alloc::string::String, expr: &Expression) -> LangError {
    CompileError::new(CompileErrorKind::InvalidConstant, message, expr.span).into()
}
