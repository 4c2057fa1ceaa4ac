//! IRをLLVM風のテキスト(`.ll`)として書き出す。

extern crate alloc;
use super::*;
use core::fmt;

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I64 => "i64",
            Type::Double => "double",
            Type::Ptr => "ptr",
        })
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            // LLVMと同じく、doubleはビット列の16進表記
            Constant::Double(v) => write!(f, "0x{:016X}", v.to_bits()),
            Constant::Bool(v) => write!(f, "{}", v),
            Constant::Str(id) => write!(f, "@.str.{}", id.0),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(c) => write!(f, "{}", c),
            Operand::Value(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(f, "@{} = global {} {}", global.name, global.ty, global.init)?;
        }

        if !self.strings.is_empty() {
            writeln!(f)?;
        }
        for (index, text) in self.strings.iter().enumerate() {
            writeln!(
                f,
                "@.str.{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                index,
                text.len() + 1,
                escape_bytes(text)
            )?;
        }

        if !self.externs.is_empty() {
            writeln!(f)?;
        }
        for decl in &self.externs {
            write!(f, "declare {} @{}(", decl.return_type, decl.name)?;
            for (i, ty) in decl.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", ty)?;
            }
            writeln!(f, ")")?;
        }

        for function in &self.functions {
            writeln!(f)?;
            FunctionPrinter { module: self, function }.fmt(f)?;
        }
        Ok(())
    }
}

struct FunctionPrinter<'a> {
    module: &'a Module,
    function: &'a Function,
}

impl FunctionPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let function = self.function;
        write!(f, "define {} @{}(", function.return_type, function.name)?;
        for (i, param) in function.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", param.ty, param.value)?;
        }
        writeln!(f, ") {{")?;

        for (index, block) in function.blocks.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}:", block.label)?;
            // スロットはすべて入口ブロックの先頭で確保する
            if index == 0 {
                for (slot, data) in function.slots.iter().enumerate() {
                    writeln!(f, "  %{}.{} = alloca {}", data.name, slot, data.ty)?;
                }
            }
            for instruction in &block.instructions {
                f.write_str("  ")?;
                self.instruction(f, instruction)?;
                writeln!(f)?;
            }
            match &block.terminator {
                Some(terminator) => {
                    f.write_str("  ")?;
                    self.terminator(f, terminator)?;
                    writeln!(f)?;
                }
                None => writeln!(f, "  ; missing terminator")?,
            }
        }
        writeln!(f, "}}")
    }

    fn instruction(&self, f: &mut fmt::Formatter<'_>, instruction: &Instruction) -> fmt::Result {
        match instruction {
            Instruction::Load { dest, place } => {
                write!(f, "{} = load {}, ptr ", dest, self.value_type(*dest))?;
                self.place(f, *place)
            }
            Instruction::Store { value, place } => {
                write!(f, "store {} {}, ptr ", self.operand_type(value), value)?;
                self.place(f, *place)
            }
            Instruction::Binary { dest, op, lhs, rhs } => write!(
                f,
                "{} = {} {} {}, {}",
                dest,
                op.mnemonic(),
                self.value_type(*dest),
                lhs,
                rhs
            ),
            Instruction::Compare {
                dest,
                predicate,
                lhs,
                rhs,
            } => {
                let kind = if predicate.is_float() { "fcmp" } else { "icmp" };
                write!(
                    f,
                    "{} = {} {} {} {}, {}",
                    dest,
                    kind,
                    predicate.mnemonic(),
                    self.operand_type(lhs),
                    lhs,
                    rhs
                )
            }
            Instruction::SiToFp { dest, value } => {
                write!(f, "{} = sitofp {} {} to double", dest, self.operand_type(value), value)
            }
            Instruction::Call { dest, callee, args } => {
                let return_type = match dest {
                    Some(dest) => {
                        write!(f, "{} = ", dest)?;
                        self.value_type(*dest)
                    }
                    None => Type::Void,
                };
                write!(f, "call {} @{}(", return_type, callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match arg {
                        Argument::Value(operand) => write!(f, "{} {}", self.operand_type(operand), operand)?,
                        Argument::Address(place) => {
                            f.write_str("ptr ")?;
                            self.place(f, *place)?;
                        }
                    }
                }
                f.write_str(")")
            }
        }
    }

    fn terminator(&self, f: &mut fmt::Formatter<'_>, terminator: &Terminator) -> fmt::Result {
        match terminator {
            Terminator::Br(target) => write!(f, "br label %{}", self.label(*target)),
            Terminator::CondBr {
                condition,
                then_block,
                else_block,
            } => write!(
                f,
                "br i1 {}, label %{}, label %{}",
                condition,
                self.label(*then_block),
                self.label(*else_block)
            ),
            Terminator::Ret(Some(value)) => write!(f, "ret {} {}", self.operand_type(value), value),
            Terminator::Ret(None) => f.write_str("ret void"),
        }
    }

    fn place(&self, f: &mut fmt::Formatter<'_>, place: Place) -> fmt::Result {
        match place {
            Place::Slot(slot) => match self.function.slot(slot) {
                Some(data) => write!(f, "%{}.{}", data.name, slot.0),
                None => write!(f, "%<invalid {}>", slot),
            },
            Place::Global(global) => match self.module.global(global) {
                Some(data) => write!(f, "@{}", data.name),
                None => write!(f, "@<invalid {}>", global),
            },
        }
    }

    fn label(&self, block: BlockId) -> &str {
        self.function
            .block(block)
            .map(|b| b.label.as_str())
            .unwrap_or("<invalid>")
    }

    fn value_type(&self, value: ValueId) -> Type {
        self.function.value_type(value).unwrap_or(Type::Void)
    }

    fn operand_type(&self, operand: &Operand) -> Type {
        self.function.operand_type(operand).unwrap_or(Type::Void)
    }
}

/// LLVMの `c"..."` 形式。表示可能なASCII以外は `\XX` で書く。
fn escape_bytes(text: &str) -> alloc::string::String {
    let mut out = alloc::string::String::new();
    for byte in text.bytes() {
        if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
            out.push(byte as char);
        } else {
            out.push_str(&alloc::format!("\\{:02X}", byte));
        }
    }
    out
}
