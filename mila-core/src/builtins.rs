extern crate alloc;

use crate::ir::{ExternDecl, Type};
use alloc::string::ToString;
use alloc::vec::Vec;

/// 合成されるエントリ関数の名前
pub const ENTRY_FUNCTION: &str = "main";
/// `readln` の戻り値(読み取りの成否)を保存する暗黙のグローバル変数。
/// Milaの識別子にはなり得ない名前にしてある。
pub const INPUT_STATUS_GLOBAL: &str = "readln.status";

/// ソース上で呼べる組み込み関数。引数の型によって実体が決まる。
pub const SOURCE_INTRINSICS: [&str; 3] = ["writeln", "write", "readln"];

/// ランタイムが提供する関数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    WritelnInt,
    WritelnDouble,
    WritelnStr,
    WriteInt,
    WriteDouble,
    WriteStr,
    ReadlnInt,
    ReadlnDouble,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 8] = [
        Intrinsic::WritelnInt,
        Intrinsic::WritelnDouble,
        Intrinsic::WritelnStr,
        Intrinsic::WriteInt,
        Intrinsic::WriteDouble,
        Intrinsic::WriteStr,
        Intrinsic::ReadlnInt,
        Intrinsic::ReadlnDouble,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::WritelnInt => "writeln_int",
            Intrinsic::WritelnDouble => "writeln_double",
            Intrinsic::WritelnStr => "writeln_str",
            Intrinsic::WriteInt => "write_int",
            Intrinsic::WriteDouble => "write_double",
            Intrinsic::WriteStr => "write_str",
            Intrinsic::ReadlnInt => "readln_int",
            Intrinsic::ReadlnDouble => "readln_double",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    pub fn param_type(self) -> Type {
        match self {
            Intrinsic::WritelnInt | Intrinsic::WriteInt => Type::I64,
            Intrinsic::WritelnDouble | Intrinsic::WriteDouble => Type::Double,
            // 文字列、または読み込み先のアドレス
            _ => Type::Ptr,
        }
    }

    pub fn return_type(self) -> Type {
        match self {
            Intrinsic::ReadlnInt | Intrinsic::ReadlnDouble => Type::I64,
            _ => Type::Void,
        }
    }

    /// `writeln`/`write` の引数の型に応じた実体
    pub fn for_output(source_name: &str, argument: Type) -> Option<Self> {
        let newline = match source_name {
            "writeln" => true,
            "write" => false,
            _ => return None,
        };
        let intrinsic = match (newline, argument) {
            (true, Type::I64) => Intrinsic::WritelnInt,
            (true, Type::Double) => Intrinsic::WritelnDouble,
            (true, Type::Ptr) => Intrinsic::WritelnStr,
            (false, Type::I64) => Intrinsic::WriteInt,
            (false, Type::Double) => Intrinsic::WriteDouble,
            (false, Type::Ptr) => Intrinsic::WriteStr,
            _ => return None,
        };
        Some(intrinsic)
    }

    /// `readln` の読み込み先の型に応じた実体
    pub fn for_input(target: Type) -> Option<Self> {
        match target {
            Type::I64 => Some(Intrinsic::ReadlnInt),
            Type::Double => Some(Intrinsic::ReadlnDouble),
            _ => None,
        }
    }

    pub fn declaration(self) -> ExternDecl {
        ExternDecl {
            name: self.name().to_string(),
            params: alloc::vec![self.param_type()],
            return_type: self.return_type(),
        }
    }
}

/// モジュールに宣言するすべての組み込み関数
pub fn runtime_builtins() -> Vec<ExternDecl> {
    Intrinsic::ALL.into_iter().map(Intrinsic::declaration).collect()
}

/// 利用者が関数や変数の名前として使えない名前か
pub fn is_reserved_name(name: &str) -> bool {
    name == ENTRY_FUNCTION || SOURCE_INTRINSICS.contains(&name) || Intrinsic::from_name(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dispatches_on_argument_type() {
        assert_eq!(Intrinsic::for_output("writeln", Type::Double), Some(Intrinsic::WritelnDouble));
        assert_eq!(Intrinsic::for_output("write", Type::Ptr), Some(Intrinsic::WriteStr));
        assert_eq!(Intrinsic::for_output("writeln", Type::I1), None);
        assert_eq!(Intrinsic::for_output("readln", Type::I64), None);
    }

    #[test]
    fn every_intrinsic_is_found_by_name() {
        for intrinsic in Intrinsic::ALL {
            assert_eq!(Intrinsic::from_name(intrinsic.name()), Some(intrinsic));
        }
        assert_eq!(runtime_builtins().len(), Intrinsic::ALL.len());
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved_name("main"));
        assert!(is_reserved_name("readln"));
        assert!(is_reserved_name("writeln_int"));
        assert!(!is_reserved_name("fib"));
    }
}
