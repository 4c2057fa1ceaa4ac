//! インタプリタから呼ばれる入出力の組み込み関数。

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::{String, ToString};

/// 組み込み関数の実装を差し替えるためのトレイト
pub trait Runtime {
    fn write_int(&mut self, value: i64);
    /// 小数点以下6桁で書き出す(C の `%f` と同じ)
    fn write_double(&mut self, value: f64);
    fn write_str(&mut self, text: &str);
    fn newline(&mut self);
    /// 入力が尽きた、または読めなかった場合は `None`
    fn read_int(&mut self) -> Option<i64>;
    fn read_double(&mut self) -> Option<f64>;
}

/// 入力を文字列から読み、出力を文字列に溜めるランタイム
#[derive(Debug, Default, Clone)]
pub struct BufferedRuntime {
    input: VecDeque<String>,
    output: String,
}

impl BufferedRuntime {
    /// 空白区切りの入力を与える
    pub fn new(input: &str) -> Self {
        Self {
            input: input.split_whitespace().map(ToString::to_string).collect(),
            output: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }
}

impl Runtime for BufferedRuntime {
    fn write_int(&mut self, value: i64) {
        self.output.push_str(&value.to_string());
    }

    fn write_double(&mut self, value: f64) {
        self.output.push_str(&format!("{:.6}", value));
    }

    fn write_str(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn newline(&mut self) {
        self.output.push('\n');
    }

    fn read_int(&mut self) -> Option<i64> {
        self.input.pop_front()?.parse().ok()
    }

    fn read_double(&mut self) -> Option<f64> {
        self.input.pop_front()?.parse().ok()
    }
}
