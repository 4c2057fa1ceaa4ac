// mila-cli/src/main.rs

mod stdio;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{LevelFilter, debug, info};
use mila_core::compiler::CompileOptions;
use mila_core::error::LangError;
use mila_core::ir::{Interpreter, Module};
use mila_core::{compile_program, lex_source, parse_source, render_diagnostic};
use simple_logger::SimpleLogger;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use stdio::StdRuntime;

/// 入力ファイルを開けなかった
const EXIT_UNREADABLE: u8 = 1;
/// 字句・構文・コード生成のエラー
const EXIT_DIAGNOSTIC: u8 = 2;
/// 書き込みや実行時のエラー
const EXIT_FAILURE: u8 = 3;
/// コマンドライン引数の誤り
const EXIT_USAGE: u8 = 4;

/// コマンドライン引数を定義するための構造体
#[derive(Parser, Debug)]
#[command(version, about = "Compile Mila programs to textual IR", long_about = None)]
struct Cli {
    /// コンパイルするMilaのソースファイル
    input: PathBuf,
    /// IRの出力先
    #[arg(default_value = "output.ll")]
    output: PathBuf,
    /// コンパイル後にインタプリタで実行する
    #[arg(long)]
    run: bool,
    /// 途中の表現を標準出力に表示する
    #[arg(long, value_enum)]
    emit: Option<Emit>,
    /// ログを詳しくする(-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Ast,
    Ir,
}

/// `--help` と `--version` は成功として扱う
fn usage_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() { EXIT_USAGE } else { 0 }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(err) = SimpleLogger::new().with_level(level).init() {
        eprintln!("failed to initialise logging: {}", err);
    }
}

/// ソースからIRモジュールまで。`--emit` で指定された段階を表示する。
fn compile(source: &str, emit: Option<Emit>) -> Result<Module, LangError> {
    if emit == Some(Emit::Tokens) {
        for (token, span) in lex_source(source)? {
            println!("{}:{}\t{:?}", span.line, span.column, token);
        }
    }

    let program = parse_source(source)?;
    if emit == Some(Emit::Ast) {
        print!("{}", program);
    }

    let module = compile_program(&program, CompileOptions::default())?;
    if emit == Some(Emit::Ir) {
        print!("{}", module);
    }
    Ok(module)
}

/// IRを書き出し、必要なら実行する
fn write_and_run(module: &Module, output: &Path, run: bool) -> Result<()> {
    fs::write(output, module.to_string())
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    info!("wrote IR to '{}'", output.display());

    if run {
        debug!("running '{}'", module.name);
        let mut runtime = StdRuntime::new();
        let status = Interpreter::new(module)
            .run(&mut runtime)
            .context("runtime error")?;
        runtime.finish().context("failed to write program output")?;
        info!("program finished with status {}", status);
    }
    Ok(())
}

fn main() -> ExitCode {
    // コマンドライン引数をパース
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };
    init_logging(cli.verbose);

    // --- 1. 入力コードの読み込み ---
    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Cannot open file '{}': {}", cli.input.display(), err);
            return ExitCode::from(EXIT_UNREADABLE);
        }
    };

    // --- 2. コンパイル ---
    let module = match compile(&source, cli.emit) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("{}", render_diagnostic(&err, &source));
            return ExitCode::from(EXIT_DIAGNOSTIC);
        }
    };

    // --- 3. 書き出しと実行 ---
    match write_and_run(&module, &cli.output, cli.run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
