//! 関数と基本ブロックからなる中間表現(IR)。
//! LLVM IR の部分集合に近い形をしており、テキストとして書き出せる。

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

pub mod builder;
pub mod display;
pub mod interp;
pub mod runtime;
pub mod verify;

pub use builder::FunctionBuilder;
pub use interp::{ExecError, ExecOptions, Interpreter};
pub use runtime::{BufferedRuntime, Runtime};
pub use verify::verify_module;

/// IR上の型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I64,
    Double,
    Ptr,
}

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(ValueId, "%v");
define_id!(BlockId, "bb");
define_id!(SlotId, "slot");
define_id!(GlobalId, "global");
define_id!(StringId, "str");

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Double(f64),
    Bool(bool),
    /// モジュールの文字列定数への参照(型は `ptr`)
    Str(StringId),
}

impl Constant {
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int(_) => Type::I64,
            Constant::Double(_) => Type::Double,
            Constant::Bool(_) => Type::I1,
            Constant::Str(_) => Type::Ptr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Const(Constant),
    Value(ValueId),
}

/// 読み書きできる場所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Place {
    Slot(SlotId),
    Global(GlobalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::SRem => "srem",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::FRem => "frem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// 比較の述語。整数は符号付き、浮動小数点は順序付き(ordered)。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl Predicate {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Predicate::Oeq | Predicate::One | Predicate::Olt | Predicate::Ole | Predicate::Ogt | Predicate::Oge
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Slt => "slt",
            Predicate::Sle => "sle",
            Predicate::Sgt => "sgt",
            Predicate::Sge => "sge",
            Predicate::Oeq => "oeq",
            Predicate::One => "one",
            Predicate::Olt => "olt",
            Predicate::Ole => "ole",
            Predicate::Ogt => "ogt",
            Predicate::Oge => "oge",
        }
    }
}

/// 関数呼び出しの引数。値そのものか、場所のアドレス。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Argument {
    Value(Operand),
    Address(Place),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Load {
        dest: ValueId,
        place: Place,
    },
    Store {
        value: Operand,
        place: Place,
    },
    Binary {
        dest: ValueId,
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        dest: ValueId,
        predicate: Predicate,
        lhs: Operand,
        rhs: Operand,
    },
    /// 符号付き整数から double への変換
    SiToFp {
        dest: ValueId,
        value: Operand,
    },
    Call {
        dest: Option<ValueId>,
        callee: String,
        args: Vec<Argument>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        condition: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret(Option<Operand>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
    /// 構築中のみ `None`。完成したブロックは必ず1つ持つ。
    pub terminator: Option<Terminator>,
}

/// 関数のスタック上の記憶域(alloca)
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub value: ValueId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub slots: Vec<Slot>,
    pub blocks: Vec<BasicBlock>,
    /// `ValueId` ごとの型。引数の値も含む。
    pub value_types: Vec<Type>,
}

impl Function {
    pub fn value_type(&self, value: ValueId) -> Option<Type> {
        self.value_types.get(value.index()).copied()
    }

    pub fn operand_type(&self, operand: &Operand) -> Option<Type> {
        match operand {
            Operand::Const(constant) => Some(constant.ty()),
            Operand::Value(value) => self.value_type(*value),
        }
    }

    pub fn slot(&self, slot: SlotId) -> Option<&Slot> {
        self.slots.get(slot.index())
    }

    pub fn block(&self, block: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(block.index())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub init: Constant,
}

/// 外部で定義される関数(ランタイムの組み込み関数)の宣言
#[derive(Debug, Clone, PartialEq)]
pub struct ExternDecl {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub name: String,
    pub globals: Vec<Global>,
    pub strings: Vec<String>,
    pub externs: Vec<ExternDecl>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn extern_decl(&self, name: &str) -> Option<&ExternDecl> {
        self.externs.iter().find(|e| e.name == name)
    }

    pub fn global(&self, global: GlobalId) -> Option<&Global> {
        self.globals.get(global.index())
    }

    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .position(|g| g.name == name)
            .map(|index| GlobalId(index as u32))
    }

    pub fn string(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.index()).map(String::as_str)
    }

    /// 同じ内容の文字列定数は共有する
    pub fn intern_string(&mut self, text: &str) -> StringId {
        if let Some(index) = self.strings.iter().position(|s| s == text) {
            return StringId(index as u32);
        }
        self.strings.push(String::from(text));
        StringId((self.strings.len() - 1) as u32)
    }
}
