//! 挿入位置を持つ関数ビルダー。コード生成器はこれを通してのみIRを組み立てる。

extern crate alloc;
use super::*;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

pub struct FunctionBuilder {
    function: Function,
    current: BlockId,
}

impl FunctionBuilder {
    /// `entry` ブロックを持つ空の関数を作り、挿入位置をそこに置く
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        let mut builder = Self {
            function: Function {
                name: name.into(),
                params: Vec::new(),
                return_type,
                slots: Vec::new(),
                blocks: Vec::new(),
                value_types: Vec::new(),
            },
            current: BlockId(0),
        };
        let entry = builder.create_block("entry");
        builder.switch_to(entry);
        builder
    }

    pub fn add_param(&mut self, name: &str, ty: Type) -> ValueId {
        let value = self.new_value(ty);
        self.function.params.push(Param {
            name: name.to_string(),
            ty,
            value,
        });
        value
    }

    pub fn add_slot(&mut self, name: &str, ty: Type) -> SlotId {
        self.function.slots.push(Slot {
            name: name.to_string(),
            ty,
        });
        SlotId((self.function.slots.len() - 1) as u32)
    }

    pub fn slot_type(&self, slot: SlotId) -> Option<Type> {
        self.function.slot(slot).map(|s| s.ty)
    }

    /// 新しいブロックを作る。挿入位置は変えない。ラベルが重複する場合は番号を付ける。
    pub fn create_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.function.blocks.len() as u32);
        let taken = self.function.blocks.iter().any(|b| b.label == label);
        let label = if taken {
            format!("{}.{}", label, id.0)
        } else {
            label.to_string()
        };
        self.function.blocks.push(BasicBlock {
            label,
            instructions: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn operand_type(&self, operand: &Operand) -> Option<Type> {
        self.function.operand_type(operand)
    }

    // --- 命令 ---

    pub fn load(&mut self, place: Place, ty: Type) -> Operand {
        let dest = self.new_value(ty);
        self.push(Instruction::Load { dest, place });
        Operand::Value(dest)
    }

    pub fn store(&mut self, value: Operand, place: Place) {
        self.push(Instruction::Store { value, place });
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand, ty: Type) -> Operand {
        let dest = self.new_value(ty);
        self.push(Instruction::Binary { dest, op, lhs, rhs });
        Operand::Value(dest)
    }

    pub fn compare(&mut self, predicate: Predicate, lhs: Operand, rhs: Operand) -> Operand {
        let dest = self.new_value(Type::I1);
        self.push(Instruction::Compare {
            dest,
            predicate,
            lhs,
            rhs,
        });
        Operand::Value(dest)
    }

    pub fn si_to_fp(&mut self, value: Operand) -> Operand {
        // 定数はその場で変換する
        if let Operand::Const(Constant::Int(v)) = value {
            return Operand::Const(Constant::Double(v as f64));
        }
        let dest = self.new_value(Type::Double);
        self.push(Instruction::SiToFp { dest, value });
        Operand::Value(dest)
    }

    /// 戻り値が `void` の場合は `None` を返す
    pub fn call(&mut self, callee: &str, args: Vec<Argument>, return_type: Type) -> Option<Operand> {
        let dest = (return_type != Type::Void).then(|| self.new_value(return_type));
        self.push(Instruction::Call {
            dest,
            callee: callee.to_string(),
            args,
        });
        dest.map(Operand::Value)
    }

    // --- 終端命令 ---

    pub fn br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn cond_br(&mut self, condition: Operand, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            condition,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.terminate(Terminator::Ret(value));
    }

    pub fn finish(self) -> Function {
        self.function
    }

    fn new_value(&mut self, ty: Type) -> ValueId {
        self.function.value_types.push(ty);
        ValueId((self.function.value_types.len() - 1) as u32)
    }

    fn push(&mut self, instruction: Instruction) {
        if let Some(block) = self.function.blocks.get_mut(self.current.index()) {
            block.instructions.push(instruction);
        }
    }

    // 先に設定された終端命令を優先する
    fn terminate(&mut self, terminator: Terminator) {
        if let Some(block) = self.function.blocks.get_mut(self.current.index()) {
            if block.terminator.is_none() {
                block.terminator = Some(terminator);
            }
        }
    }
}
