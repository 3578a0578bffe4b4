// 進捗通知とキャンセル

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// `(message, percent)` を受け取る進捗通知先。
pub trait ProgressSink {
    fn report(&mut self, message: &str, percent: u8);
}

impl<F> ProgressSink for F
where
    F: FnMut(&str, u8),
{
    fn report(&mut self, message: &str, percent: u8) {
        self(message, percent)
    }
}

/// 進捗をtracingのinfoログに流す。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, message: &str, percent: u8) {
        tracing::info!(percent, "{message}");
    }
}

/// 進捗を捨てる。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _message: &str, _percent: u8) {}
}

/// 協調的キャンセル用のトークン。クローンは同じフラグを共有する。
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 入力 `index`（0始まり）を処理する直前に通知する進捗率。
pub fn percent_for(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (((index + 1) as f64 / total as f64) * 100.0).round().min(100.0) as u8
}
