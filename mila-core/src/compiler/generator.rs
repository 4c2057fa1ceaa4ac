//! 関数ごとにASTをIRへ変換する処理。
//! 制御フローは基本ブロックのグラフとして組み立て、`break`/`exit` の飛び先は
//! `ControlTargets` として再帰の中を値で渡していく。

extern crate alloc;
use super::constant::fold_constant;
use super::scope::Symbol;
use super::{CodeGenerator, describe_type, ir_type, zero_of};
use crate::ast::*;
use crate::builtins::{ENTRY_FUNCTION, Intrinsic};
use crate::error::{CompileError, CompileErrorKind, LangError};
use crate::ir::{
    Argument, BinaryOp, BlockId, Constant, Function, FunctionBuilder, Operand, Place, Predicate, Type,
};
use crate::span::Span;
use crate::token::Operator;
use alloc::format;
use alloc::vec::Vec;

/// `break` と `exit` の飛び先。ループや関数に入るたびに差し替えた値を渡す。
/// `exit` はどの関数(`main` を含む)でも使える。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTargets {
    pub break_target: Option<BlockId>,
    pub return_target: BlockId,
}

/// ユーザー定義の関数・手続きを生成する
pub fn lower_function(generator: &mut CodeGenerator, decl: &FunctionDecl) -> Result<Function, LangError> {
    let Some(body) = &decl.body else {
        return Err(CompileError::new(
            CompileErrorKind::UndefinedFunction,
            format!("Function '{}' has no body", decl.name),
            decl.span,
        )
        .into());
    };

    generator.symbols.clear_locals();
    let return_type = ir_type(decl.return_type);
    let mut builder = FunctionBuilder::new(&decl.name, return_type);

    for constant in &decl.constants {
        let value = fold_constant(&constant.value, &generator.symbols)?;
        declare_local(generator, &constant.name, Symbol::Constant(value), constant.span)?;
    }

    // 引数は入口で自分のスロットに保存する
    for param in &decl.params {
        let ty = ir_type(param.data_type);
        let value = builder.add_param(&param.name, ty);
        let slot = builder.add_slot(&param.name, ty);
        builder.store(Operand::Value(value), Place::Slot(slot));
        let place = Place::Slot(slot);
        declare_local(generator, &param.name, Symbol::Variable { place, ty }, param.span)?;
    }

    for variable in &decl.variables {
        let ty = ir_type(variable.data_type);
        let place = Place::Slot(builder.add_slot(&variable.name, ty));
        declare_local(generator, &variable.name, Symbol::Variable { place, ty }, variable.span)?;
    }

    // 関数名と同じ名前の、ゼロで初期化された戻り値スロット
    let result = if return_type == Type::Void {
        None
    } else {
        let place = Place::Slot(builder.add_slot(&decl.name, return_type));
        builder.store(Operand::Const(zero_of(return_type)), place);
        declare_local(generator, &decl.name, Symbol::Variable { place, ty: return_type }, decl.span)?;
        Some(place)
    };

    let return_block = builder.create_block("return");
    let targets = ControlTargets {
        break_target: None,
        return_target: return_block,
    };
    lower_statement(generator, &mut builder, body, targets)?;
    builder.br(return_block);

    builder.switch_to(return_block);
    match result {
        Some(place) => {
            let value = builder.load(place, return_type);
            builder.ret(Some(value));
        }
        None => builder.ret(None),
    }
    Ok(builder.finish())
}

/// プログラム本体から引数なしのエントリ関数 `main` を合成する。常に 0 を返す。
pub fn lower_entry(generator: &mut CodeGenerator, body: &Expression) -> Result<Function, LangError> {
    generator.symbols.clear_locals();
    let mut builder = FunctionBuilder::new(ENTRY_FUNCTION, Type::I64);
    let exit_block = builder.create_block("exit");
    let targets = ControlTargets {
        break_target: None,
        return_target: exit_block,
    };
    lower_statement(generator, &mut builder, body, targets)?;
    builder.br(exit_block);

    builder.switch_to(exit_block);
    builder.ret(Some(Operand::Const(Constant::Int(0))));
    Ok(builder.finish())
}

fn declare_local(generator: &mut CodeGenerator, name: &str, symbol: Symbol, span: Span) -> Result<(), LangError> {
    if generator.symbols.declare_local(name, symbol) {
        return Ok(());
    }
    Err(CompileError::new(
        CompileErrorKind::Redefinition,
        format!("'{}' is already defined", name),
        span,
    )
    .into())
}

// --- 文 ---

pub fn lower_statement(
    generator: &mut CodeGenerator,
    builder: &mut FunctionBuilder,
    statement: &Expression,
    targets: ControlTargets,
) -> Result<(), LangError> {
    match &statement.kind {
        ExprKind::Block { statements } => {
            for statement in statements {
                lower_statement(generator, builder, statement, targets)?;
            }
            Ok(())
        }
        ExprKind::Assign { target, value } => lower_assignment(generator, builder, target, value, statement.span),
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let condition = lower_condition(generator, builder, condition)?;
            let then_block = builder.create_block("then");
            let else_block = else_branch.as_ref().map(|_| builder.create_block("else"));
            let merge_block = builder.create_block("merge");
            builder.cond_br(condition, then_block, else_block.unwrap_or(merge_block));

            builder.switch_to(then_block);
            lower_statement(generator, builder, then_branch, targets)?;
            builder.br(merge_block);

            if let (Some(else_block), Some(else_branch)) = (else_block, else_branch) {
                builder.switch_to(else_block);
                lower_statement(generator, builder, else_branch, targets)?;
                builder.br(merge_block);
            }
            builder.switch_to(merge_block);
            Ok(())
        }
        ExprKind::While { condition, body } => {
            let header = builder.create_block("while.header");
            let body_block = builder.create_block("while.body");
            let after = builder.create_block("while.after");
            builder.br(header);

            builder.switch_to(header);
            let condition = lower_condition(generator, builder, condition)?;
            builder.cond_br(condition, body_block, after);

            builder.switch_to(body_block);
            let inner = ControlTargets {
                break_target: Some(after),
                ..targets
            };
            lower_statement(generator, builder, body, inner)?;
            builder.br(header);

            builder.switch_to(after);
            Ok(())
        }
        ExprKind::For {
            counter,
            counter_span,
            start,
            finish,
            downto,
            body,
        } => {
            let place = resolve_assignable(generator, counter, *counter_span)?;
            let counter_type = place_type(generator, builder, place);
            if counter_type != Type::I64 {
                return Err(CompileError::new(
                    CompileErrorKind::TypeMismatch,
                    format!("Loop counter '{}' must be an integer variable", counter),
                    *counter_span,
                )
                .into());
            }

            let start_value = lower_value(generator, builder, start)?;
            let start_value = coerce(builder, start_value, Type::I64, start.span, "loop start")?;
            builder.store(start_value, place);
            // 終了値は一度だけ評価する
            let finish_value = lower_value(generator, builder, finish)?;
            let finish_value = coerce(builder, finish_value, Type::I64, finish.span, "loop bound")?;

            let body_block = builder.create_block("for.body");
            let check = builder.create_block("for.check");
            let step = builder.create_block("for.step");
            let after = builder.create_block("for.after");
            builder.br(body_block);

            builder.switch_to(body_block);
            let inner = ControlTargets {
                break_target: Some(after),
                ..targets
            };
            lower_statement(generator, builder, body, inner)?;
            builder.br(check);

            // カウンタが終了値と等しくなった時点で抜ける
            builder.switch_to(check);
            let current = builder.load(place, Type::I64);
            let done = builder.compare(Predicate::Eq, current, finish_value);
            builder.cond_br(done, after, step);

            builder.switch_to(step);
            let op = if *downto { BinaryOp::Sub } else { BinaryOp::Add };
            let next = builder.binary(op, current, Operand::Const(Constant::Int(1)), Type::I64);
            builder.store(next, place);
            builder.br(body_block);

            builder.switch_to(after);
            Ok(())
        }
        ExprKind::Break => {
            let target = targets.break_target.ok_or_else(|| {
                CompileError::new(
                    CompileErrorKind::BreakOutsideLoop,
                    "'break' outside of a loop",
                    statement.span,
                )
            })?;
            jump_away(builder, target);
            Ok(())
        }
        ExprKind::Exit => {
            jump_away(builder, targets.return_target);
            Ok(())
        }
        ExprKind::Call { name, args } => {
            lower_call(generator, builder, name, args, statement.span)?;
            Ok(())
        }
        _ => {
            lower_value(generator, builder, statement)?;
            Ok(())
        }
    }
}

/// 無条件に飛び、後続の文のために到達不能な新しいブロックへ移る
fn jump_away(builder: &mut FunctionBuilder, target: BlockId) {
    builder.br(target);
    let unreachable = builder.create_block("unreachable");
    builder.switch_to(unreachable);
}

fn lower_assignment(
    generator: &mut CodeGenerator,
    builder: &mut FunctionBuilder,
    target: &str,
    value: &Expression,
    span: Span,
) -> Result<(), LangError> {
    let place = resolve_assignable(generator, target, span)?;
    let ty = place_type(generator, builder, place);
    let operand = lower_value(generator, builder, value)?;
    let operand = coerce(builder, operand, ty, value.span, target)?;
    builder.store(operand, place);
    Ok(())
}

/// 代入できる変数を探す。定数や未定義の名前はエラー。
fn resolve_assignable(generator: &CodeGenerator, name: &str, span: Span) -> Result<Place, LangError> {
    match generator.symbols.resolve(name) {
        Some(Symbol::Variable { place, .. }) => Ok(place),
        Some(Symbol::Constant(_)) => Err(CompileError::new(
            CompileErrorKind::ConstantAssignment,
            format!("Cannot change constant '{}'", name),
            span,
        )
        .into()),
        None => Err(unknown_identifier(name, span)),
    }
}

fn place_type(generator: &CodeGenerator, builder: &FunctionBuilder, place: Place) -> Type {
    let ty = match place {
        Place::Slot(slot) => builder.slot_type(slot),
        Place::Global(global) => generator.module.global(global).map(|g| g.ty),
    };
    ty.unwrap_or(Type::Void)
}

fn lower_condition(
    generator: &mut CodeGenerator,
    builder: &mut FunctionBuilder,
    condition: &Expression,
) -> Result<Operand, LangError> {
    let value = lower_value(generator, builder, condition)?;
    let ty = builder.operand_type(&value).unwrap_or(Type::Void);
    if ty != Type::I1 {
        return Err(CompileError::new(
            CompileErrorKind::TypeMismatch,
            format!("Condition must be boolean, found {}", describe_type(ty)),
            condition.span,
        )
        .into());
    }
    Ok(value)
}

// --- 式 ---

pub fn lower_value(
    generator: &mut CodeGenerator,
    builder: &mut FunctionBuilder,
    expr: &Expression,
) -> Result<Operand, LangError> {
    match &expr.kind {
        ExprKind::IntLiteral(v) => Ok(Operand::Const(Constant::Int(*v))),
        ExprKind::FloatLiteral(v) => Ok(Operand::Const(Constant::Double(*v))),
        ExprKind::StringLiteral(_) => Err(CompileError::new(
            CompileErrorKind::TypeMismatch,
            "String literals can only be passed to 'write' or 'writeln'",
            expr.span,
        )
        .into()),
        ExprKind::Identifier(name) => match generator.symbols.resolve(name) {
            Some(Symbol::Constant(value)) => Ok(Operand::Const(value.into())),
            Some(Symbol::Variable { place, ty }) => Ok(builder.load(place, ty)),
            None => Err(unknown_identifier(name, expr.span)),
        },
        ExprKind::Parenthesized(inner) => lower_value(generator, builder, inner),
        ExprKind::Call { name, args } => match lower_call(generator, builder, name, args, expr.span)? {
            Some(value) => Ok(value),
            None => Err(CompileError::new(
                CompileErrorKind::TypeMismatch,
                format!("'{}' does not return a value", name),
                expr.span,
            )
            .into()),
        },
        ExprKind::BinaryOp {
            op, left, right, ..
        } => {
            let lhs = lower_value(generator, builder, left)?;
            let rhs = lower_value(generator, builder, right)?;
            lower_binary(builder, *op, lhs, rhs, expr.span)
        }
        _ => Err(CompileError::new(
            CompileErrorKind::NotImplemented,
            "A statement cannot be used as a value",
            expr.span,
        )
        .into()),
    }
}

/// 片方が double ならもう片方を昇格して浮動小数点の演算にする
fn lower_binary(
    builder: &mut FunctionBuilder,
    op: Operator,
    lhs: Operand,
    rhs: Operand,
    span: Span,
) -> Result<Operand, LangError> {
    let lhs_type = builder.operand_type(&lhs).unwrap_or(Type::Void);
    let rhs_type = builder.operand_type(&rhs).unwrap_or(Type::Void);
    let not_implemented = || -> LangError {
        CompileError::new(
            CompileErrorKind::NotImplemented,
            format!(
                "Operator '{}' is not implemented for {} and {}",
                op,
                describe_type(lhs_type),
                describe_type(rhs_type)
            ),
            span,
        )
        .into()
    };

    match (lhs_type, rhs_type) {
        (Type::I1, Type::I1) => match op {
            Operator::And => Ok(builder.binary(BinaryOp::And, lhs, rhs, Type::I1)),
            Operator::Or => Ok(builder.binary(BinaryOp::Or, lhs, rhs, Type::I1)),
            Operator::Equal => Ok(builder.compare(Predicate::Eq, lhs, rhs)),
            Operator::NotEqual => Ok(builder.compare(Predicate::Ne, lhs, rhs)),
            _ => Err(not_implemented()),
        },
        (Type::I64, Type::I64) => {
            if let Some(predicate) = int_predicate(op) {
                return Ok(builder.compare(predicate, lhs, rhs));
            }
            let op = match op {
                Operator::Plus => BinaryOp::Add,
                Operator::Minus => BinaryOp::Sub,
                Operator::Star => BinaryOp::Mul,
                Operator::Slash | Operator::Div => BinaryOp::SDiv,
                Operator::Mod => BinaryOp::SRem,
                _ => return Err(not_implemented()),
            };
            Ok(builder.binary(op, lhs, rhs, Type::I64))
        }
        (Type::I64 | Type::Double, Type::I64 | Type::Double) => {
            let lhs = if lhs_type == Type::I64 { builder.si_to_fp(lhs) } else { lhs };
            let rhs = if rhs_type == Type::I64 { builder.si_to_fp(rhs) } else { rhs };
            if let Some(predicate) = float_predicate(op) {
                return Ok(builder.compare(predicate, lhs, rhs));
            }
            let op = match op {
                Operator::Plus => BinaryOp::FAdd,
                Operator::Minus => BinaryOp::FSub,
                Operator::Star => BinaryOp::FMul,
                Operator::Slash => BinaryOp::FDiv,
                Operator::Mod => BinaryOp::FRem,
                _ => return Err(not_implemented()),
            };
            Ok(builder.binary(op, lhs, rhs, Type::Double))
        }
        _ => Err(not_implemented()),
    }
}

fn int_predicate(op: Operator) -> Option<Predicate> {
    Some(match op {
        Operator::Equal => Predicate::Eq,
        Operator::NotEqual => Predicate::Ne,
        Operator::Less => Predicate::Slt,
        Operator::LessEqual => Predicate::Sle,
        Operator::Greater => Predicate::Sgt,
        Operator::GreaterEqual => Predicate::Sge,
        _ => return None,
    })
}

fn float_predicate(op: Operator) -> Option<Predicate> {
    Some(match op {
        Operator::Equal => Predicate::Oeq,
        Operator::NotEqual => Predicate::One,
        Operator::Less => Predicate::Olt,
        Operator::LessEqual => Predicate::Ole,
        Operator::Greater => Predicate::Ogt,
        Operator::GreaterEqual => Predicate::Oge,
        _ => return None,
    })
}

/// 値を `expected` 型の場所に入れられる形にする。整数は double に昇格できる。
fn coerce(
    builder: &mut FunctionBuilder,
    value: Operand,
    expected: Type,
    span: Span,
    what: &str,
) -> Result<Operand, LangError> {
    let actual = builder.operand_type(&value).unwrap_or(Type::Void);
    match (actual, expected) {
        (a, e) if a == e => Ok(value),
        (Type::I64, Type::Double) => Ok(builder.si_to_fp(value)),
        _ => Err(CompileError::new(
            CompileErrorKind::TypeMismatch,
            format!(
                "Type mismatch for '{}': expected {}, found {}",
                what,
                describe_type(expected),
                describe_type(actual)
            ),
            span,
        )
        .into()),
    }
}

/// 関数呼び出し。`void` の関数なら `None` を返す。
fn lower_call(
    generator: &mut CodeGenerator,
    builder: &mut FunctionBuilder,
    name: &str,
    args: &[Expression],
    span: Span,
) -> Result<Option<Operand>, LangError> {
    match name {
        "writeln" | "write" => return lower_output(generator, builder, name, args, span),
        "readln" => return lower_input(generator, builder, args, span).map(Some),
        _ => {}
    }

    let Some(signature) = generator.signatures.get(name) else {
        return Err(CompileError::new(
            CompileErrorKind::UndefinedFunction,
            format!("Undefined function: '{}'", name),
            span,
        )
        .into());
    };
    let param_types: Vec<Type> = signature.param_types.iter().map(|t| ir_type(*t)).collect();
    let return_type = ir_type(signature.return_type);
    check_arity(name, param_types.len(), args.len(), span)?;

    let mut values = Vec::with_capacity(args.len());
    for (arg, ty) in args.iter().zip(param_types) {
        let value = lower_value(generator, builder, arg)?;
        values.push(Argument::Value(coerce(builder, value, ty, arg.span, name)?));
    }
    Ok(builder.call(name, values, return_type))
}

fn check_arity(name: &str, expected: usize, actual: usize, span: Span) -> Result<(), LangError> {
    if expected == actual {
        return Ok(());
    }
    Err(CompileError::new(
        CompileErrorKind::ArgumentCountMismatch,
        format!(
            "Wrong number of arguments for '{}': expected {}, got {}",
            name, expected, actual
        ),
        span,
    )
    .into())
}

/// `writeln(x)` / `write(x)`。引数の静的な型で実体を選ぶ。
fn lower_output(
    generator: &mut CodeGenerator,
    builder: &mut FunctionBuilder,
    name: &str,
    args: &[Expression],
    span: Span,
) -> Result<Option<Operand>, LangError> {
    check_arity(name, 1, args.len(), span)?;
    let arg = &args[0];
    let value = match &arg.kind {
        ExprKind::StringLiteral(text) => Operand::Const(Constant::Str(generator.module.intern_string(text))),
        _ => lower_value(generator, builder, arg)?,
    };
    let ty = builder.operand_type(&value).unwrap_or(Type::Void);
    let intrinsic = Intrinsic::for_output(name, ty).ok_or_else(|| {
        CompileError::new(
            CompileErrorKind::TypeMismatch,
            format!("'{}' cannot print a {} value", name, describe_type(ty)),
            arg.span,
        )
    })?;
    Ok(builder.call(intrinsic.name(), alloc::vec![Argument::Value(value)], Type::Void))
}

/// `readln(x)`。変数のアドレスを渡し、読み取りの成否を暗黙のグローバル変数に残す。
fn lower_input(
    generator: &mut CodeGenerator,
    builder: &mut FunctionBuilder,
    args: &[Expression],
    span: Span,
) -> Result<Operand, LangError> {
    check_arity("readln", 1, args.len(), span)?;
    let arg = &args[0];
    let ExprKind::Identifier(target) = &arg.kind else {
        return Err(CompileError::new(
            CompileErrorKind::TypeMismatch,
            "'readln' expects a variable",
            arg.span,
        )
        .into());
    };
    let place = resolve_assignable(generator, target, arg.span)?;
    let ty = place_type(generator, builder, place);
    let intrinsic = Intrinsic::for_input(ty).ok_or_else(|| {
        CompileError::new(
            CompileErrorKind::TypeMismatch,
            format!("'readln' cannot read a {} value", describe_type(ty)),
            arg.span,
        )
    })?;

    let status = builder
        .call(intrinsic.name(), alloc::vec![Argument::Address(place)], intrinsic.return_type())
        .unwrap_or(Operand::Const(Constant::Int(0)));
    builder.store(status, Place::Global(generator.input_status));
    Ok(status)
}

fn unknown_identifier(name: &str, span: Span) -> LangError {
    CompileError::new(
        CompileErrorKind::UnknownIdentifier,
        format!("Unknown identifier: '{}'", name),
        span,
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;
    use crate::ir::{Instruction, Terminator};
    use crate::parser::Parser;

    fn lower(source: &str) -> Result<crate::ir::Module, LangError> {
        let program = Parser::new(source).parse()?;
        CodeGenerator::new(CompileOptions::default()).generate(&program)
    }

    fn compile_error(source: &str) -> CompileError {
        match lower(source) {
            Err(LangError::Compile(e)) => e,
            other => panic!("expected a compile error, got {:?}", other),
        }
    }

    fn entry_instructions(module: &crate::ir::Module) -> Vec<Instruction> {
        module
            .function(ENTRY_FUNCTION)
            .map(|f| f.blocks.iter().flat_map(|b| b.instructions.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn mixed_arithmetic_promotes_the_integer_side() {
        let module = lower("var x: double; begin x := 1 + 2.5 end.").unwrap();
        let instructions = entry_instructions(&module);
        assert!(instructions.iter().any(|i| matches!(
            i,
            Instruction::Binary {
                op: BinaryOp::FAdd,
                lhs: Operand::Const(Constant::Double(l)),
                rhs: Operand::Const(Constant::Double(r)),
                ..
            } if *l == 1.0 && *r == 2.5
        )));
    }

    #[test]
    fn function_has_result_slot_and_return_block() {
        let module = lower("function sq(n: integer): integer; begin sq := n * n end; begin writeln(sq(3)) end.")
            .unwrap();
        let function = module.function("sq").unwrap();
        let names: Vec<&str> = function.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["n", "sq"]);
        let last = function.blocks.iter().find(|b| b.label == "return").unwrap();
        assert!(matches!(last.terminator, Some(Terminator::Ret(Some(_)))));
    }

    #[test]
    fn procedures_return_void() {
        let module = lower("procedure p; begin writeln(1) end; begin p() end.").unwrap();
        let function = module.function("p").unwrap();
        assert_eq!(function.return_type, Type::Void);
        assert!(function.slots.is_empty());
    }

    #[test]
    fn unknown_identifier_points_at_the_name() {
        let err = compile_error("begin\n  y := 1\nend.");
        assert_eq!(err.kind, CompileErrorKind::UnknownIdentifier);
        assert_eq!(err.span, Some(Span::new(2, 3)));
        assert_eq!(err.message, "Unknown identifier: 'y'");
    }

    #[test]
    fn constants_cannot_be_assigned() {
        let err = compile_error("const k = 1; begin k := 2 end.");
        assert_eq!(err.kind, CompileErrorKind::ConstantAssignment);
        assert!(err.message.contains("Cannot change constant"));
    }

    #[test]
    fn wrong_arity_reports_both_counts() {
        let err = compile_error("function f(a: integer): integer; begin f := a end; begin writeln(f(1, 2)) end.");
        assert_eq!(err.kind, CompileErrorKind::ArgumentCountMismatch);
        assert_eq!(err.message, "Wrong number of arguments for 'f': expected 1, got 2");
    }

    #[test]
    fn break_outside_a_loop() {
        let err = compile_error("begin break end.");
        assert_eq!(err.kind, CompileErrorKind::BreakOutsideLoop);
    }

    #[test]
    fn div_on_doubles_is_not_implemented() {
        let err = compile_error("var x: double; begin x := 2.0 div 1 end.");
        assert_eq!(err.kind, CompileErrorKind::NotImplemented);
    }

    #[test]
    fn double_cannot_be_stored_into_an_integer() {
        let err = compile_error("var n: integer; begin n := 1.5 end.");
        assert_eq!(err.kind, CompileErrorKind::TypeMismatch);
    }

    #[test]
    fn forward_declarations_must_be_completed() {
        let err = compile_error("function f: integer; forward; begin end.");
        assert_eq!(err.kind, CompileErrorKind::UndefinedFunction);
        let err = compile_error("function f: integer; forward; function f: double; begin f := 1.0 end; begin end.");
        assert_eq!(err.kind, CompileErrorKind::TypeMismatch);
    }

    #[test]
    fn redefinitions_are_rejected() {
        assert_eq!(
            compile_error("procedure p; begin end; procedure p; begin end; begin end.").kind,
            CompileErrorKind::Redefinition
        );
        assert_eq!(
            compile_error("procedure writeln; begin end; begin end.").kind,
            CompileErrorKind::Redefinition
        );
        assert_eq!(
            compile_error("var x: integer; x: double; begin end.").kind,
            CompileErrorKind::Redefinition
        );
    }

    #[test]
    fn statements_after_break_land_in_an_unreachable_block() {
        let module = lower("var i: integer; begin while 1 = 1 do begin break; i := 1 end end.").unwrap();
        let main = module.function(ENTRY_FUNCTION).unwrap();
        assert!(main.blocks.iter().any(|b| b.label == "unreachable"));
        assert!(main.blocks.iter().all(|b| b.terminator.is_some()));
    }

    #[test]
    fn readln_stores_its_status() {
        let module = lower("var n: integer; begin readln(n) end.").unwrap();
        let status = module.global_by_name(crate::builtins::INPUT_STATUS_GLOBAL).unwrap();
        let instructions = entry_instructions(&module);
        assert!(instructions.iter().any(|i| matches!(
            i,
            Instruction::Call { callee, args, .. }
                if callee == "readln_int" && matches!(args[0], Argument::Address(_))
        )));
        assert!(instructions.iter().any(|i| matches!(
            i,
            Instruction::Store { place: Place::Global(g), .. } if *g == status
        )));
    }
}
