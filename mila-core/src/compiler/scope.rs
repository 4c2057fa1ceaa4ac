//! 名前解決のための記号表。
//! 関数内の定数・ローカル変数を先に、次にプログラム全体の定数・グローバル変数を探す。

extern crate alloc;
use super::constant::ConstValue;
use crate::ir::{Place, Type};
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Symbol {
    /// コンパイル時に値が決まる定数。代入できない。
    Constant(ConstValue),
    Variable { place: Place, ty: Type },
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: BTreeMap<String, Symbol>,
    locals: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.locals
            .get(name)
            .or_else(|| self.globals.get(name))
            .copied()
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    /// 同じ階層に同名の記号があれば `false` を返し、何もしない
    pub fn declare_global(&mut self, name: &str, symbol: Symbol) -> bool {
        insert_new(&mut self.globals, name, symbol)
    }

    pub fn declare_local(&mut self, name: &str, symbol: Symbol) -> bool {
        insert_new(&mut self.locals, name, symbol)
    }

    /// 関数の生成を始める前に、前の関数のローカルを捨てる
    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }
}

fn insert_new(table: &mut BTreeMap<String, Symbol>, name: &str, symbol: Symbol) -> bool {
    if table.contains_key(name) {
        return false;
    }
    table.insert(name.to_string(), symbol);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{GlobalId, SlotId};

    #[test]
    fn locals_shadow_globals_until_cleared() {
        let mut table = SymbolTable::new();
        let global = Symbol::Variable {
            place: Place::Global(GlobalId(0)),
            ty: Type::I64,
        };
        let local = Symbol::Variable {
            place: Place::Slot(SlotId(0)),
            ty: Type::Double,
        };
        assert!(table.declare_global("x", global));
        assert!(table.declare_local("x", local));
        assert_eq!(table.resolve("x"), Some(local));
        table.clear_locals();
        assert_eq!(table.resolve("x"), Some(global));
        assert_eq!(table.resolve("y"), None);
    }

    #[test]
    fn duplicates_in_one_level_are_refused() {
        let mut table = SymbolTable::new();
        assert!(table.declare_global("n", Symbol::Constant(ConstValue::Int(1))));
        assert!(!table.declare_global("n", Symbol::Constant(ConstValue::Int(2))));
        assert_eq!(table.resolve("n"), Some(Symbol::Constant(ConstValue::Int(1))));
    }
}
