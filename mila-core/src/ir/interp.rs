//! IRを直接実行する参照インタプリタ。
//! 呼び出しはホストの再帰ではなく明示的なフレームのスタックで扱う。

extern crate alloc;
use super::*;
use crate::builtins::{ENTRY_FUNCTION, Intrinsic};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use log::trace;
use thiserror::Error;

/// 実行時の値
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(StringId),
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Self {
        match constant {
            Constant::Int(v) => Value::Int(v),
            Constant::Double(v) => Value::Double(v),
            Constant::Bool(v) => Value::Bool(v),
            Constant::Str(id) => Value::Str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("Execution exceeded the limit of {0} steps")]
    StepLimitExceeded(u64),
    #[error("Call depth exceeded the limit of {0}")]
    CallDepthExceeded(usize),
    #[error("Integer division by zero in '{0}'")]
    DivisionByZero(String),
    #[error("Use of an uninitialised value in '{0}'")]
    Uninitialised(String),
    #[error("Malformed module: {0}")]
    Malformed(String),
}

impl ExecError {
    fn malformed(message: impl Into<String>) -> Self {
        ExecError::Malformed(message.into())
    }
}

/// 実行の上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// 実行する命令数の上限。終了しないプログラムを止める。
    pub step_limit: u64,
    pub max_call_depth: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            step_limit: 10_000_000,
            max_call_depth: 1024,
        }
    }
}

struct Frame<'m> {
    function: &'m Function,
    values: Vec<Option<Value>>,
    slots: Vec<Option<Value>>,
    block: BlockId,
    index: usize,
    /// 戻り値を受け取る呼び出し元の値
    result_dest: Option<ValueId>,
}

impl<'m> Frame<'m> {
    fn new(function: &'m Function, args: &[Value], result_dest: Option<ValueId>) -> Result<Self, ExecError> {
        if args.len() != function.params.len() {
            return Err(ExecError::malformed(format!(
                "'{}' called with {} arguments, expected {}",
                function.name,
                args.len(),
                function.params.len()
            )));
        }
        let mut values = vec![None; function.value_types.len()];
        for (param, arg) in function.params.iter().zip(args) {
            let slot = values
                .get_mut(param.value.index())
                .ok_or_else(|| ExecError::malformed(format!("bad parameter value in '{}'", function.name)))?;
            *slot = Some(*arg);
        }
        Ok(Self {
            function,
            values,
            slots: vec![None; function.slots.len()],
            block: BlockId(0),
            index: 0,
            result_dest,
        })
    }

    fn operand(&self, operand: &Operand) -> Result<Value, ExecError> {
        match operand {
            Operand::Const(c) => Ok(Value::from(*c)),
            Operand::Value(id) => self
                .values
                .get(id.index())
                .copied()
                .flatten()
                .ok_or_else(|| ExecError::Uninitialised(self.function.name.clone())),
        }
    }

    fn define(&mut self, dest: ValueId, value: Value) -> Result<(), ExecError> {
        let slot = self
            .values
            .get_mut(dest.index())
            .ok_or_else(|| ExecError::malformed(format!("unknown value {} in '{}'", dest, self.function.name)))?;
        *slot = Some(value);
        Ok(())
    }
}

/// モジュールの実行器
pub struct Interpreter<'m> {
    module: &'m Module,
    options: ExecOptions,
    globals: Vec<Value>,
    steps: u64,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self::with_options(module, ExecOptions::default())
    }

    pub fn with_options(module: &'m Module, options: ExecOptions) -> Self {
        Self {
            module,
            options,
            globals: module.globals.iter().map(|g| Value::from(g.init)).collect(),
            steps: 0,
        }
    }

    /// エントリ関数 `main` を実行し、その戻り値を返す
    pub fn run(&mut self, runtime: &mut dyn Runtime) -> Result<i64, ExecError> {
        match self.call(ENTRY_FUNCTION, &[], runtime)? {
            Some(Value::Int(code)) => Ok(code),
            other => Err(ExecError::malformed(format!("entry function returned {:?}", other))),
        }
    }

    /// 任意の関数を呼び出す。グローバル変数の状態は呼び出し間で保たれる。
    pub fn call(&mut self, name: &str, args: &[Value], runtime: &mut dyn Runtime) -> Result<Option<Value>, ExecError> {
        let function = self.lookup(name)?;
        let mut stack = vec![Frame::new(function, args, None)?];

        loop {
            self.steps += 1;
            if self.steps > self.options.step_limit {
                return Err(ExecError::StepLimitExceeded(self.options.step_limit));
            }

            let frame = stack
                .last_mut()
                .ok_or_else(|| ExecError::malformed("empty call stack"))?;
            let function = frame.function;
            let block = function
                .block(frame.block)
                .ok_or_else(|| ExecError::malformed(format!("unknown block {} in '{}'", frame.block, function.name)))?;

            if let Some(instruction) = block.instructions.get(frame.index) {
                frame.index += 1;
                if let Some(callee) = self.execute(frame, instruction, runtime)? {
                    if stack.len() >= self.options.max_call_depth {
                        return Err(ExecError::CallDepthExceeded(self.options.max_call_depth));
                    }
                    stack.push(callee);
                }
                continue;
            }

            let terminator = block
                .terminator
                .as_ref()
                .ok_or_else(|| ExecError::malformed(format!("block '{}' has no terminator", block.label)))?;
            match terminator {
                Terminator::Br(target) => {
                    frame.block = *target;
                    frame.index = 0;
                }
                Terminator::CondBr {
                    condition,
                    then_block,
                    else_block,
                } => {
                    let taken = match frame.operand(condition)? {
                        Value::Bool(b) => b,
                        other => return Err(ExecError::malformed(format!("branch on {:?}", other))),
                    };
                    frame.block = if taken { *then_block } else { *else_block };
                    frame.index = 0;
                }
                Terminator::Ret(value) => {
                    let result = value.as_ref().map(|v| frame.operand(v)).transpose()?;
                    let result_dest = frame.result_dest;
                    stack.pop();
                    trace!("return from '{}' with {:?}", function.name, result);
                    let Some(caller) = stack.last_mut() else {
                        return Ok(result);
                    };
                    if let Some(dest) = result_dest {
                        let value = result
                            .ok_or_else(|| ExecError::malformed(format!("'{}' returned no value", function.name)))?;
                        caller.define(dest, value)?;
                    }
                }
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<&'m Function, ExecError> {
        self.module
            .function(name)
            .ok_or_else(|| ExecError::malformed(format!("function '{}' is not defined", name)))
    }

    /// 1命令を実行する。ユーザー定義関数の呼び出しなら新しいフレームを返す。
    fn execute(
        &mut self,
        frame: &mut Frame<'m>,
        instruction: &Instruction,
        runtime: &mut dyn Runtime,
    ) -> Result<Option<Frame<'m>>, ExecError> {
        match instruction {
            Instruction::Load { dest, place } => {
                let value = self.read_place(frame, *place)?;
                frame.define(*dest, value)?;
            }
            Instruction::Store { value, place } => {
                let value = frame.operand(value)?;
                self.write_place(frame, *place, value)?;
            }
            Instruction::Binary { dest, op, lhs, rhs } => {
                let lhs = frame.operand(lhs)?;
                let rhs = frame.operand(rhs)?;
                let value = binary(*op, lhs, rhs, &frame.function.name)?;
                frame.define(*dest, value)?;
            }
            Instruction::Compare {
                dest,
                predicate,
                lhs,
                rhs,
            } => {
                let lhs = frame.operand(lhs)?;
                let rhs = frame.operand(rhs)?;
                frame.define(*dest, Value::Bool(compare(*predicate, lhs, rhs)?))?;
            }
            Instruction::SiToFp { dest, value } => match frame.operand(value)? {
                Value::Int(v) => frame.define(*dest, Value::Double(v as f64))?,
                other => return Err(ExecError::malformed(format!("sitofp of {:?}", other))),
            },
            Instruction::Call { dest, callee, args } => {
                if let Some(intrinsic) = Intrinsic::from_name(callee) {
                    let status = self.call_intrinsic(frame, intrinsic, args, runtime)?;
                    if let (Some(dest), Some(status)) = (dest, status) {
                        frame.define(*dest, status)?;
                    }
                    return Ok(None);
                }

                let function = self.lookup(callee)?;
                let values = args
                    .iter()
                    .map(|arg| match arg {
                        Argument::Value(operand) => frame.operand(operand),
                        Argument::Address(_) => Err(ExecError::malformed(format!(
                            "address passed to user function '{}'",
                            callee
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                trace!("call '{}' with {:?}", callee, values);
                return Frame::new(function, &values, *dest).map(Some);
            }
        }
        Ok(None)
    }

    fn call_intrinsic(
        &mut self,
        frame: &mut Frame<'m>,
        intrinsic: Intrinsic,
        args: &[Argument],
        runtime: &mut dyn Runtime,
    ) -> Result<Option<Value>, ExecError> {
        let [arg] = args else {
            return Err(ExecError::malformed(format!(
                "'{}' takes exactly one argument",
                intrinsic.name()
            )));
        };

        let newline = matches!(
            intrinsic,
            Intrinsic::WritelnInt | Intrinsic::WritelnDouble | Intrinsic::WritelnStr
        );
        match (intrinsic, arg) {
            (Intrinsic::ReadlnInt | Intrinsic::ReadlnDouble, Argument::Address(place)) => {
                let read = if intrinsic == Intrinsic::ReadlnInt {
                    runtime.read_int().map(Value::Int)
                } else {
                    runtime.read_double().map(Value::Double)
                };
                let status = match read {
                    Some(value) => {
                        self.write_place(frame, *place, value)?;
                        1
                    }
                    None => 0,
                };
                Ok(Some(Value::Int(status)))
            }
            (_, Argument::Value(operand)) => {
                match (intrinsic.param_type(), frame.operand(operand)?) {
                    (Type::I64, Value::Int(v)) => runtime.write_int(v),
                    (Type::Double, Value::Double(v)) => runtime.write_double(v),
                    (Type::Ptr, Value::Str(id)) => {
                        let text = self
                            .module
                            .string(id)
                            .ok_or_else(|| ExecError::malformed(format!("unknown string {}", id)))?;
                        runtime.write_str(text);
                    }
                    (_, other) => {
                        return Err(ExecError::malformed(format!(
                            "'{}' cannot print {:?}",
                            intrinsic.name(),
                            other
                        )));
                    }
                }
                if newline {
                    runtime.newline();
                }
                Ok(None)
            }
            _ => Err(ExecError::malformed(format!(
                "bad argument to '{}'",
                intrinsic.name()
            ))),
        }
    }

    fn read_place(&self, frame: &Frame<'m>, place: Place) -> Result<Value, ExecError> {
        match place {
            Place::Slot(slot) => frame
                .slots
                .get(slot.index())
                .ok_or_else(|| ExecError::malformed(format!("unknown {} in '{}'", slot, frame.function.name)))?
                .ok_or_else(|| ExecError::Uninitialised(frame.function.name.clone())),
            Place::Global(global) => self
                .globals
                .get(global.index())
                .copied()
                .ok_or_else(|| ExecError::malformed(format!("unknown {}", global))),
        }
    }

    fn write_place(&mut self, frame: &mut Frame<'m>, place: Place, value: Value) -> Result<(), ExecError> {
        let target = match place {
            Place::Slot(slot) => frame
                .slots
                .get_mut(slot.index())
                .ok_or_else(|| ExecError::malformed(format!("unknown {} in '{}'", slot, frame.function.name)))?,
            Place::Global(global) => {
                let cell = self
                    .globals
                    .get_mut(global.index())
                    .ok_or_else(|| ExecError::malformed(format!("unknown {}", global)))?;
                *cell = value;
                return Ok(());
            }
        };
        *target = Some(value);
        Ok(())
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value, function: &str) -> Result<Value, ExecError> {
    let value = match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(b)),
        (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_sub(b)),
        (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_mul(b)),
        (BinaryOp::SDiv | BinaryOp::SRem, Value::Int(_), Value::Int(0)) => {
            return Err(ExecError::DivisionByZero(function.to_string()));
        }
        (BinaryOp::SDiv, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_div(b)),
        (BinaryOp::SRem, Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_rem(b)),
        (BinaryOp::FAdd, Value::Double(a), Value::Double(b)) => Value::Double(a + b),
        (BinaryOp::FSub, Value::Double(a), Value::Double(b)) => Value::Double(a - b),
        (BinaryOp::FMul, Value::Double(a), Value::Double(b)) => Value::Double(a * b),
        (BinaryOp::FDiv, Value::Double(a), Value::Double(b)) => Value::Double(a / b),
        (BinaryOp::FRem, Value::Double(a), Value::Double(b)) => Value::Double(a % b),
        (BinaryOp::And, Value::Bool(a), Value::Bool(b)) => Value::Bool(a & b),
        (BinaryOp::Or, Value::Bool(a), Value::Bool(b)) => Value::Bool(a | b),
        (BinaryOp::And, Value::Int(a), Value::Int(b)) => Value::Int(a & b),
        (BinaryOp::Or, Value::Int(a), Value::Int(b)) => Value::Int(a | b),
        (op, a, b) => {
            return Err(ExecError::malformed(format!(
                "{} applied to {:?} and {:?}",
                op.mnemonic(),
                a,
                b
            )));
        }
    };
    Ok(value)
}

fn compare(predicate: Predicate, lhs: Value, rhs: Value) -> Result<bool, ExecError> {
    use core::cmp::Ordering;

    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) if !predicate.is_float() => a.cmp(&b),
        (Value::Bool(a), Value::Bool(b)) if matches!(predicate, Predicate::Eq | Predicate::Ne) => a.cmp(&b),
        (Value::Double(a), Value::Double(b)) if predicate.is_float() => match a.partial_cmp(&b) {
            Some(ordering) => ordering,
            // 順序付き比較はNaNを含むと常に偽
            None => return Ok(false),
        },
        (a, b) => {
            return Err(ExecError::malformed(format!(
                "{} comparison of {:?} and {:?}",
                predicate.mnemonic(),
                a,
                b
            )));
        }
    };
    Ok(match predicate {
        Predicate::Eq | Predicate::Oeq => ordering == Ordering::Equal,
        Predicate::Ne | Predicate::One => ordering != Ordering::Equal,
        Predicate::Slt | Predicate::Olt => ordering == Ordering::Less,
        Predicate::Sle | Predicate::Ole => ordering != Ordering::Greater,
        Predicate::Sgt | Predicate::Ogt => ordering == Ordering::Greater,
        Predicate::Sge | Predicate::Oge => ordering != Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::runtime::BufferedRuntime;

    fn module_with(function: Function) -> Module {
        let mut module = Module::new("test");
        module.externs = crate::builtins::runtime_builtins();
        module.functions.push(function);
        module
    }

    /// `main` が `count` 回ループして、毎回カウンタを書き出す
    fn counting_main(count: i64) -> Function {
        let mut b = FunctionBuilder::new("main", Type::I64);
        let i = b.add_slot("i", Type::I64);
        let header = b.create_block("header");
        let body = b.create_block("body");
        let after = b.create_block("after");
        b.store(Operand::Const(Constant::Int(0)), Place::Slot(i));
        b.br(header);

        b.switch_to(header);
        let current = b.load(Place::Slot(i), Type::I64);
        let more = b.compare(Predicate::Slt, current, Operand::Const(Constant::Int(count)));
        b.cond_br(more, body, after);

        b.switch_to(body);
        let current = b.load(Place::Slot(i), Type::I64);
        b.call("writeln_int", vec![Argument::Value(current)], Type::Void);
        let next = b.binary(BinaryOp::Add, current, Operand::Const(Constant::Int(1)), Type::I64);
        b.store(next, Place::Slot(i));
        b.br(header);

        b.switch_to(after);
        b.ret(Some(Operand::Const(Constant::Int(0))));
        b.finish()
    }

    #[test]
    fn loops_and_intrinsics_run() {
        let module = module_with(counting_main(3));
        let mut runtime = BufferedRuntime::default();
        assert_eq!(Interpreter::new(&module).run(&mut runtime), Ok(0));
        assert_eq!(runtime.output(), "0\n1\n2\n");
    }

    #[test]
    fn step_limit_stops_long_runs() {
        let module = module_with(counting_main(1_000_000));
        let options = ExecOptions {
            step_limit: 1_000,
            ..ExecOptions::default()
        };
        let mut runtime = BufferedRuntime::default();
        assert_eq!(
            Interpreter::with_options(&module, options).run(&mut runtime),
            Err(ExecError::StepLimitExceeded(1_000))
        );
    }

    #[test]
    fn unbounded_recursion_hits_the_depth_limit() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        let result = b.call("main", Vec::new(), Type::I64);
        b.ret(result);
        let module = module_with(b.finish());
        let options = ExecOptions {
            max_call_depth: 64,
            ..ExecOptions::default()
        };
        let mut runtime = BufferedRuntime::default();
        assert_eq!(
            Interpreter::with_options(&module, options).run(&mut runtime),
            Err(ExecError::CallDepthExceeded(64))
        );
    }

    #[test]
    fn integer_division_by_zero_is_reported() {
        assert_eq!(
            binary(BinaryOp::SDiv, Value::Int(1), Value::Int(0), "f"),
            Err(ExecError::DivisionByZero("f".to_string()))
        );
        assert_eq!(
            binary(BinaryOp::SRem, Value::Int(-7), Value::Int(2), "f"),
            Ok(Value::Int(-1))
        );
        assert_eq!(
            binary(BinaryOp::FRem, Value::Double(7.5), Value::Double(2.0), "f"),
            Ok(Value::Double(1.5))
        );
    }

    #[test]
    fn ordered_comparisons_with_nan_are_false() {
        assert_eq!(compare(Predicate::One, Value::Double(f64::NAN), Value::Double(1.0)), Ok(false));
        assert_eq!(compare(Predicate::Sle, Value::Int(2), Value::Int(2)), Ok(true));
        assert_eq!(compare(Predicate::Ne, Value::Bool(true), Value::Bool(false)), Ok(true));
    }

    #[test]
    fn reading_fills_the_place_and_reports_status() {
        let mut b = FunctionBuilder::new("main", Type::I64);
        let x = b.add_slot("x", Type::I64);
        let status = b.call("readln_int", vec![Argument::Address(Place::Slot(x))], Type::I64);
        let value = b.load(Place::Slot(x), Type::I64);
        b.call("writeln_int", vec![Argument::Value(value)], Type::Void);
        if let Some(status) = status {
            b.call("writeln_int", vec![Argument::Value(status)], Type::Void);
        }
        b.ret(Some(Operand::Const(Constant::Int(0))));
        let module = module_with(b.finish());

        let mut runtime = BufferedRuntime::new("41");
        assert_eq!(Interpreter::new(&module).run(&mut runtime), Ok(0));
        assert_eq!(runtime.output(), "41\n1\n");
    }
}
