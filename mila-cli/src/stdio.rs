// mila-cli/src/stdio.rs

use mila_core::ir::Runtime;
use std::collections::VecDeque;
use std::io::{self, BufRead, BufWriter, Stdin, Stdout, Write};

/// 標準入出力につながったランタイム。
/// 入力は空白区切りの単語として必要になった時点で1行ずつ読む。
pub struct StdRuntime {
    input: Stdin,
    pending: VecDeque<String>,
    output: BufWriter<Stdout>,
    /// 最初に起きた書き込みエラー。実行後に報告する。
    error: Option<io::Error>,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self {
            input: io::stdin(),
            pending: VecDeque::new(),
            output: BufWriter::new(io::stdout()),
            error: None,
        }
    }

    /// 出力を書き出し、実行中に起きた入出力エラーがあれば返す
    pub fn finish(mut self) -> io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.output.flush()
    }

    fn emit(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.output.write_all(text.as_bytes()) {
            self.error = Some(err);
        }
    }

    fn next_word(&mut self) -> Option<String> {
        // プロンプトを先に表示する
        if let Err(err) = self.output.flush() {
            if self.error.is_none() {
                self.error = Some(err);
            }
        }
        while self.pending.is_empty() {
            let mut line = String::new();
            match self.input.lock().read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => self
                    .pending
                    .extend(line.split_whitespace().map(str::to_string)),
                Err(err) => {
                    log::warn!("failed to read standard input: {}", err);
                    return None;
                }
            }
        }
        self.pending.pop_front()
    }
}

impl Runtime for StdRuntime {
    fn write_int(&mut self, value: i64) {
        self.emit(&value.to_string());
    }

    fn write_double(&mut self, value: f64) {
        self.emit(&format!("{:.6}", value));
    }

    fn write_str(&mut self, text: &str) {
        self.emit(text);
    }

    fn newline(&mut self) {
        self.emit("\n");
    }

    fn read_int(&mut self) -> Option<i64> {
        self.next_word()?.parse().ok()
    }

    fn read_double(&mut self) -> Option<f64> {
        self.next_word()?.parse().ok()
    }
}
