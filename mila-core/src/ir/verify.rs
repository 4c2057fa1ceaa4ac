//! IRの構造検証。コード生成の不具合を早い段階で検出する。
//!
//! 検出した最初の問題を位置情報なしの `CompileError` として返す。

extern crate alloc;
use super::*;
use crate::error::{CompileError, CompileErrorKind};
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;

/// モジュールが構造的に正しいことを検証する
pub fn verify_module(module: &Module) -> Result<(), CompileError> {
    ModuleVerifier { module }.verify()
}

struct ModuleVerifier<'a> {
    module: &'a Module,
}

/// 関数の検証中に使う文脈
struct FunctionContext<'a> {
    function: &'a Function,
    block: &'a str,
}

fn invalid(message: String) -> CompileError {
    CompileError::positionless(CompileErrorKind::InvalidModule, message)
}

impl<'a> ModuleVerifier<'a> {
    fn verify(&self) -> Result<(), CompileError> {
        let mut names = BTreeSet::new();
        for name in self
            .module
            .externs
            .iter()
            .map(|e| &e.name)
            .chain(self.module.globals.iter().map(|g| &g.name))
            .chain(self.module.functions.iter().map(|f| &f.name))
        {
            if !names.insert(name.as_str()) {
                return Err(invalid(format!("symbol '{}' is defined more than once", name)));
            }
        }
        for global in &self.module.globals {
            if global.init.ty() != global.ty {
                return Err(invalid(format!(
                    "global '{}' of type {} initialised with {}",
                    global.name, global.ty, global.init
                )));
            }
        }
        for function in &self.module.functions {
            self.verify_function(function)?;
        }
        Ok(())
    }

    fn verify_function(&self, function: &'a Function) -> Result<(), CompileError> {
        if function.blocks.is_empty() {
            return Err(invalid(format!("function '{}' has no blocks", function.name)));
        }

        // 各値はちょうど1か所で定義される
        let mut defined = BTreeSet::new();
        for param in &function.params {
            self.check_value(function, param.value)?;
            if !defined.insert(param.value) {
                return Err(invalid(format!("{} defined twice in '{}'", param.value, function.name)));
            }
        }
        for block in &function.blocks {
            for instruction in &block.instructions {
                if let Some(dest) = destination(instruction) {
                    self.check_value(function, dest)?;
                    if !defined.insert(dest) {
                        return Err(invalid(format!("{} defined twice in '{}'", dest, function.name)));
                    }
                }
            }
        }

        for block in &function.blocks {
            let ctx = FunctionContext {
                function,
                block: &block.label,
            };
            for instruction in &block.instructions {
                self.verify_instruction(&ctx, instruction)?;
            }
            let terminator = block.terminator.as_ref().ok_or_else(|| {
                invalid(format!(
                    "block '{}' in '{}' has no terminator",
                    block.label, function.name
                ))
            })?;
            self.verify_terminator(&ctx, terminator)?;
        }
        Ok(())
    }

    fn verify_instruction(&self, ctx: &FunctionContext<'a>, instruction: &Instruction) -> Result<(), CompileError> {
        match instruction {
            Instruction::Load { dest, place } => {
                let place_type = self.place_type(ctx, *place)?;
                expect_type(ctx, "load", ctx.function.value_type(*dest), place_type)
            }
            Instruction::Store { value, place } => {
                let place_type = self.place_type(ctx, *place)?;
                let value_type = self.operand_type(ctx, value)?;
                expect_type(ctx, "store", Some(value_type), place_type)
            }
            Instruction::Binary { dest, op, lhs, rhs } => {
                let lhs = self.operand_type(ctx, lhs)?;
                let rhs = self.operand_type(ctx, rhs)?;
                expect_type(ctx, op.mnemonic(), Some(rhs), lhs)?;
                let valid = match op {
                    _ if op.is_float() => lhs == Type::Double,
                    BinaryOp::And | BinaryOp::Or => matches!(lhs, Type::I1 | Type::I64),
                    _ => lhs == Type::I64,
                };
                if !valid {
                    return Err(ctx.error(format!("{} applied to {}", op.mnemonic(), lhs)));
                }
                expect_type(ctx, op.mnemonic(), ctx.function.value_type(*dest), lhs)
            }
            Instruction::Compare {
                dest,
                predicate,
                lhs,
                rhs,
            } => {
                let lhs = self.operand_type(ctx, lhs)?;
                let rhs = self.operand_type(ctx, rhs)?;
                expect_type(ctx, predicate.mnemonic(), Some(rhs), lhs)?;
                let valid = if predicate.is_float() {
                    lhs == Type::Double
                } else {
                    lhs == Type::I64 || (lhs == Type::I1 && matches!(predicate, Predicate::Eq | Predicate::Ne))
                };
                if !valid {
                    return Err(ctx.error(format!("{} comparison of {}", predicate.mnemonic(), lhs)));
                }
                expect_type(ctx, "compare", ctx.function.value_type(*dest), Type::I1)
            }
            Instruction::SiToFp { dest, value } => {
                let source = self.operand_type(ctx, value)?;
                expect_type(ctx, "sitofp", Some(source), Type::I64)?;
                expect_type(ctx, "sitofp", ctx.function.value_type(*dest), Type::Double)
            }
            Instruction::Call { dest, callee, args } => self.verify_call(ctx, *dest, callee, args),
        }
    }

    fn verify_call(
        &self,
        ctx: &FunctionContext<'a>,
        dest: Option<ValueId>,
        callee: &str,
        args: &[Argument],
    ) -> Result<(), CompileError> {
        let (params, return_type): (alloc::vec::Vec<Type>, Type) = if let Some(function) = self.module.function(callee) {
            (function.params.iter().map(|p| p.ty).collect(), function.return_type)
        } else if let Some(decl) = self.module.extern_decl(callee) {
            (decl.params.clone(), decl.return_type)
        } else {
            return Err(ctx.error(format!("call to undeclared '{}'", callee)));
        };

        if params.len() != args.len() {
            return Err(ctx.error(format!(
                "'{}' called with {} arguments, expected {}",
                callee,
                args.len(),
                params.len()
            )));
        }
        for (arg, param) in args.iter().zip(&params) {
            let arg_type = match arg {
                Argument::Value(operand) => self.operand_type(ctx, operand)?,
                Argument::Address(place) => {
                    self.place_type(ctx, *place)?;
                    Type::Ptr
                }
            };
            expect_type(ctx, callee, Some(arg_type), *param)?;
        }

        match (dest, return_type) {
            (None, Type::Void) => Ok(()),
            (Some(dest), ty) if ty != Type::Void => expect_type(ctx, callee, ctx.function.value_type(dest), ty),
            _ => Err(ctx.error(format!("result of '{}' used inconsistently", callee))),
        }
    }

    fn verify_terminator(&self, ctx: &FunctionContext<'a>, terminator: &Terminator) -> Result<(), CompileError> {
        match terminator {
            Terminator::Br(target) => self.check_block(ctx, *target),
            Terminator::CondBr {
                condition,
                then_block,
                else_block,
            } => {
                let ty = self.operand_type(ctx, condition)?;
                expect_type(ctx, "br", Some(ty), Type::I1)?;
                self.check_block(ctx, *then_block)?;
                self.check_block(ctx, *else_block)
            }
            Terminator::Ret(None) => expect_type(ctx, "ret", Some(Type::Void), ctx.function.return_type),
            Terminator::Ret(Some(value)) => {
                let ty = self.operand_type(ctx, value)?;
                expect_type(ctx, "ret", Some(ty), ctx.function.return_type)
            }
        }
    }

    fn check_block(&self, ctx: &FunctionContext<'a>, block: BlockId) -> Result<(), CompileError> {
        ctx.function
            .block(block)
            .map(|_| ())
            .ok_or_else(|| ctx.error(format!("branch to unknown {}", block)))
    }

    fn check_value(&self, function: &Function, value: ValueId) -> Result<(), CompileError> {
        function
            .value_type(value)
            .map(|_| ())
            .ok_or_else(|| invalid(format!("{} has no type in '{}'", value, function.name)))
    }

    fn place_type(&self, ctx: &FunctionContext<'a>, place: Place) -> Result<Type, CompileError> {
        match place {
            Place::Slot(slot) => ctx
                .function
                .slot(slot)
                .map(|s| s.ty)
                .ok_or_else(|| ctx.error(format!("unknown {}", slot))),
            Place::Global(global) => self
                .module
                .global(global)
                .map(|g| g.ty)
                .ok_or_else(|| ctx.error(format!("unknown {}", global))),
        }
    }

    fn operand_type(&self, ctx: &FunctionContext<'a>, operand: &Operand) -> Result<Type, CompileError> {
        if let Operand::Const(Constant::Str(id)) = operand {
            if self.module.string(*id).is_none() {
                return Err(ctx.error(format!("unknown {}", id)));
            }
        }
        ctx.function
            .operand_type(operand)
            .ok_or_else(|| ctx.error(format!("unknown value {}", operand)))
    }
}

impl FunctionContext<'_> {
    fn error(&self, message: String) -> CompileError {
        invalid(format!("{} (in '{}', block '{}')", message, self.function.name, self.block))
    }
}

fn expect_type(ctx: &FunctionContext<'_>, what: &str, actual: Option<Type>, expected: Type) -> Result<(), CompileError> {
    match actual {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(ctx.error(format!("{}: expected {}, found {}", what, expected, actual))),
        None => Err(ctx.error(format!("{}: value has no type", what))),
    }
}

fn destination(instruction: &Instruction) -> Option<ValueId> {
    match instruction {
        Instruction::Load { dest, .. }
        | Instruction::Binary { dest, .. }
        | Instruction::Compare { dest, .. }
        | Instruction::SiToFp { dest, .. } => Some(*dest),
        Instruction::Call { dest, .. } => *dest,
        Instruction::Store { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn module_with(function: Function) -> Module {
        let mut module = Module::new("test");
        module.externs = crate::builtins::runtime_builtins();
        module.functions.push(function);
        module
    }

    #[test]
    fn well_formed_function_passes() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        let x = b.add_slot("x", Type::Double);
        let promoted = b.si_to_fp(Operand::Const(Constant::Int(1)));
        b.store(promoted, Place::Slot(x));
        let value = b.load(Place::Slot(x), Type::Double);
        b.call("writeln_double", vec![Argument::Value(value)], Type::Void);
        b.ret(Some(Operand::Const(Constant::Int(0))));
        assert_eq!(verify_module(&module_with(b.finish())), Ok(()));
    }

    #[test]
    fn missing_terminator_is_rejected() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        let dangling = b.create_block("dangling");
        b.br(dangling);
        let err = verify_module(&module_with(b.finish())).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::InvalidModule);
        assert_eq!(err.span, None);
        assert!(err.message.contains("dangling"));
    }

    #[test]
    fn store_of_the_wrong_type_is_rejected() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        let x = b.add_slot("x", Type::I64);
        b.store(Operand::Const(Constant::Double(1.5)), Place::Slot(x));
        b.ret(Some(Operand::Const(Constant::Int(0))));
        let err = verify_module(&module_with(b.finish())).unwrap_err();
        assert!(err.message.contains("store: expected i64, found double"));
    }

    #[test]
    fn calls_are_checked_against_declarations() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        b.call("writeln_int", Vec::new(), Type::Void);
        b.ret(Some(Operand::Const(Constant::Int(0))));
        let err = verify_module(&module_with(b.finish())).unwrap_err();
        assert!(err.message.contains("called with 0 arguments, expected 1"));

        let mut b = FunctionBuilder::new("main", Type::I64);
        b.call("missing", Vec::new(), Type::Void);
        b.ret(Some(Operand::Const(Constant::Int(0))));
        let err = verify_module(&module_with(b.finish())).unwrap_err();
        assert!(err.message.contains("undeclared 'missing'"));
    }

    #[test]
    fn globals_share_the_symbol_namespace() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        b.ret(Some(Operand::Const(Constant::Int(0))));
        let mut module = module_with(b.finish());
        module.globals.push(Global {
            name: "writeln_int".into(),
            ty: Type::I64,
            init: Constant::Int(0),
        });
        let err = verify_module(&module).unwrap_err();
        assert!(err.message.contains("symbol 'writeln_int' is defined more than once"));
    }

    #[test]
    fn void_return_from_a_valued_function_is_rejected() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        b.ret(None);
        assert!(verify_module(&module_with(b.finish())).is_err());
    }
}
