//! ASTを受け取り、名前解決と型の統一を行いながらIRモジュールを生成するコード生成器。

extern crate alloc;
// サブモジュールを宣言
pub mod constant;
pub mod generator;
pub mod scope;

use crate::ast::*;
use crate::builtins::{self, INPUT_STATUS_GLOBAL};
use crate::error::{CompileError, CompileErrorKind, LangError};
use crate::ir::{self, Constant, Global, GlobalId, Module, Place, Type};
use crate::span::Span;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use constant::fold_constant;
use log::{debug, trace};
use scope::{Symbol, SymbolTable};

/// コード生成の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// 生成するモジュールの名前
    pub module_name: String,
    /// 生成後にIR検証を行うか
    pub verify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            module_name: "mila".to_string(),
            verify: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub param_types: Vec<DataType>,
    pub return_type: DataType,
    pub definition_span: Span,
    /// 本体が見つかったか(前方宣言だけなら `false`)
    pub defined: bool,
}

/// コード生成全体の状態。
/// 1. **宣言収集 (Pre-pass)**: `prepass_declarations` で全関数のシグネチャを集める。
/// 2. **生成**: `generator` モジュールが関数ごとにASTをIRに変換する。
pub struct CodeGenerator {
    pub module: Module,
    pub symbols: SymbolTable,
    pub signatures: BTreeMap<String, FunctionSignature>,
    /// `readln` の結果を保存するグローバル変数
    pub input_status: GlobalId,
    options: CompileOptions,
}

impl CodeGenerator {
    pub fn new(options: CompileOptions) -> Self {
        let mut module = Module::new(options.module_name.clone());
        module.externs = builtins::runtime_builtins();
        Self {
            module,
            symbols: SymbolTable::new(),
            signatures: BTreeMap::new(),
            input_status: GlobalId(0),
            options,
        }
    }

    /// プログラム全体をIRモジュールに変換する
    pub fn generate(mut self, program: &Program) -> Result<Module, LangError> {
        self.declare_globals(program)?;
        self.prepass_declarations(&program.functions)?;
        debug!(
            "collected {} globals and {} function signatures",
            self.module.globals.len(),
            self.signatures.len()
        );

        for decl in program.functions.iter().filter(|f| !f.is_forward()) {
            trace!("lowering function '{}'", decl.name);
            let function = generator::lower_function(&mut self, decl)?;
            self.module.functions.push(function);
        }
        trace!("lowering entry function");
        let entry = generator::lower_entry(&mut self, &program.body)?;
        self.module.functions.push(entry);

        if self.options.verify {
            ir::verify_module(&self.module)?;
            debug!("module '{}' verified", self.module.name);
        }
        Ok(self.module)
    }

    /// プログラムの定数とグローバル変数、暗黙の入力状態変数を登録する
    fn declare_globals(&mut self, program: &Program) -> Result<(), LangError> {
        for decl in &program.constants {
            let value = fold_constant(&decl.value, &self.symbols)?;
            if !self.symbols.declare_global(&decl.name, Symbol::Constant(value)) {
                return Err(redefinition(&decl.name, decl.span));
            }
        }

        for decl in &program.variables {
            if builtins::is_reserved_name(&decl.name) {
                return Err(reserved(&decl.name, decl.span));
            }
            let ty = ir_type(decl.data_type);
            let id = self.add_global(&decl.name, ty);
            let symbol = Symbol::Variable {
                place: Place::Global(id),
                ty,
            };
            if !self.symbols.declare_global(&decl.name, symbol) {
                return Err(redefinition(&decl.name, decl.span));
            }
        }

        self.input_status = self.add_global(INPUT_STATUS_GLOBAL, Type::I64);
        Ok(())
    }

    fn add_global(&mut self, name: &str, ty: Type) -> GlobalId {
        self.module.globals.push(Global {
            name: name.to_string(),
            ty,
            init: zero_of(ty),
        });
        GlobalId((self.module.globals.len() - 1) as u32)
    }

    /// 本体を生成する前に、前方宣言を含むすべての関数シグネチャを集める
    fn prepass_declarations(&mut self, functions: &[FunctionDecl]) -> Result<(), LangError> {
        for decl in functions {
            if builtins::is_reserved_name(&decl.name) {
                return Err(reserved(&decl.name, decl.span));
            }
            if self.symbols.is_global(&decl.name) {
                return Err(redefinition(&decl.name, decl.span));
            }

            let signature = FunctionSignature {
                name: decl.name.clone(),
                param_types: decl.params.iter().map(|p| p.data_type).collect(),
                return_type: decl.return_type,
                definition_span: decl.span,
                defined: !decl.is_forward(),
            };

            match self.signatures.get_mut(&decl.name) {
                None => {
                    self.signatures.insert(decl.name.clone(), signature);
                }
                // 前方宣言の後の本体
                Some(existing) if !existing.defined && signature.defined => {
                    if existing.param_types != signature.param_types || existing.return_type != signature.return_type {
                        return Err(CompileError::new(
                            CompileErrorKind::TypeMismatch,
                            format!(
                                "Definition of '{}' does not match its forward declaration",
                                decl.name
                            ),
                            decl.span,
                        )
                        .into());
                    }
                    *existing = signature;
                }
                Some(_) => return Err(redefinition(&decl.name, decl.span)),
            }
        }

        if let Some(missing) = self.signatures.values().find(|s| !s.defined) {
            return Err(CompileError::new(
                CompileErrorKind::UndefinedFunction,
                format!("Function '{}' is declared forward but never defined", missing.name),
                missing.definition_span,
            )
            .into());
        }
        Ok(())
    }
}

pub fn ir_type(data_type: DataType) -> Type {
    match data_type {
        DataType::Integer => Type::I64,
        DataType::Double => Type::Double,
        DataType::Void => Type::Void,
    }
}

/// エラーメッセージ用の型名
pub fn describe_type(ty: Type) -> &'static str {
    match ty {
        Type::I64 => "integer",
        Type::Double => "double",
        Type::I1 => "boolean",
        Type::Ptr => "string",
        Type::Void => "void",
    }
}

pub fn zero_of(ty: Type) -> Constant {
    match ty {
        Type::Double => Constant::Double(0.0),
        Type::I1 => Constant::Bool(false),
        _ => Constant::Int(0),
    }
}

fn redefinition(name: &str, span: Span) -> LangError {
    CompileError::new(
        CompileErrorKind::Redefinition,
        format!("'{}' is already defined", name),
        span,
    )
    .into()
}

fn reserved(name: &str, span: Span) -> LangError {
    CompileError::new(
        CompileErrorKind::Redefinition,
        format!("'{}' is a reserved name", name),
        span,
    )
    .into()
}
