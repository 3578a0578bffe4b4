// マージ全体: 入力順に準備 → 取り込み → ページ追加 → 最終化

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use tracing::{debug, info, warn};

use crate::config::job::CompressionPolicy;
use crate::error::PdfMergeError;
use crate::pdf::writer::OutputDocument;
use crate::pipeline::compositor::append_page;
use crate::pipeline::progress::{CancellationToken, ProgressSink, percent_for};
use crate::source::InputDescriptor;
use crate::source::adapter::{PreparedInput, embed, prepare};

/// マージ1回分の設定
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub compression: CompressionPolicy,
    /// 画像準備のワーカー数。0ならrayonのデフォルト、1なら逐次。
    pub parallel_workers: usize,
}

/// マージの状態遷移: `Idle → Running → Finalizing → Done | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Idle,
    Running { index: usize, total: usize },
    Finalizing,
    Done,
    Failed,
}

/// ワーカー1つあたり、書き込み位置より先に準備してよい入力数
pub const IN_FLIGHT_PER_WORKER: usize = 2;

/// 準備ワーカーからの結果メッセージ `(入力index, 結果)`
type PreparedMessage = (usize, crate::error::Result<PreparedInput>);

/// 入力列を1つのPDFにまとめる。
pub struct Merger {
    options: MergeOptions,
    state: MergeState,
}

impl Merger {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            state: MergeState::Idle,
        }
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    /// 入力を順に処理し、出力PDFのバイト列を返す。
    ///
    /// どれか1件でも失敗したら全体を中断し、出力は返さない。
    /// エラーには失敗した入力の表示名が付く。
    pub fn merge(
        &mut self,
        inputs: &[InputDescriptor],
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> crate::error::Result<Vec<u8>> {
        let result = self.run(inputs, progress, cancel);
        match &result {
            Ok(bytes) => {
                self.transition(MergeState::Done);
                info!(inputs = inputs.len(), bytes = bytes.len(), "merge finished");
            }
            Err(e) => {
                self.transition(MergeState::Failed);
                warn!(error = %e, "merge failed");
            }
        }
        result
    }

    fn transition(&mut self, next: MergeState) {
        debug!(from = ?self.state, to = ?next, "merge state");
        self.state = next;
    }

    fn run(
        &mut self,
        inputs: &[InputDescriptor],
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> crate::error::Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(PdfMergeError::config("no inputs to merge"));
        }
        if cancel.is_cancelled() {
            return Err(PdfMergeError::Cancelled);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallel_workers)
            .build()
            .map_err(|e| PdfMergeError::config(format!("failed to build worker pool: {e}")))?;
        let window = pool.current_num_threads().max(1) * IN_FLIGHT_PER_WORKER;

        let policy = self.options.compression;
        info!(inputs = inputs.len(), %policy, window, "merge started");

        // 準備は並列、取り込みとページ追加はこのスレッドだけが入力順に行う
        let abort = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<PreparedMessage>();

        let output = pool.in_place_scope_fifo(|scope| {
            let abort = &abort;
            let mut dispatched = 0;
            // 入力 `upto` の手前までを準備キューに投入する
            let mut dispatch = |upto: usize| {
                while dispatched < upto.min(inputs.len()) {
                    let index = dispatched;
                    let input = &inputs[index];
                    let tx = tx.clone();
                    scope.spawn_fifo(move |_| {
                        if abort.load(Ordering::SeqCst) {
                            return;
                        }
                        let result = if cancel.is_cancelled() {
                            Err(PdfMergeError::Cancelled)
                        } else {
                            panic::catch_unwind(AssertUnwindSafe(|| prepare(input, policy)))
                                .unwrap_or_else(|_| {
                                    Err(PdfMergeError::embed("input preparation panicked"))
                                })
                        };
                        // 受信側が先に終了していれば結果は捨てる
                        let _ = tx.send((index, result));
                    });
                    dispatched += 1;
                }
            };

            let assembled = self.assemble(inputs, &rx, window, &mut dispatch, progress, cancel);
            abort.store(true, Ordering::SeqCst);
            assembled
        })?;

        if cancel.is_cancelled() {
            return Err(PdfMergeError::Cancelled);
        }

        self.transition(MergeState::Finalizing);
        progress.report("Finalizing document...", 100);
        output.finish()
    }

    /// 準備結果を入力順に受け取り、出力文書に追加する。
    ///
    /// 準備中・受信済みの入力は書き込み位置から `window` 件先までに限る。
    fn assemble(
        &mut self,
        inputs: &[InputDescriptor],
        rx: &mpsc::Receiver<PreparedMessage>,
        window: usize,
        dispatch: &mut dyn FnMut(usize),
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> crate::error::Result<OutputDocument> {
        let total = inputs.len();
        let mut output = OutputDocument::new();
        let mut pending: BTreeMap<usize, crate::error::Result<PreparedInput>> = BTreeMap::new();

        for (index, input) in inputs.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PdfMergeError::Cancelled);
            }
            dispatch(index + window);
            self.transition(MergeState::Running { index, total });
            progress.report(
                &format!("Processing {}...", input.display_name),
                percent_for(index, total),
            );

            let prepared = loop {
                if let Some(result) = pending.remove(&index) {
                    break result;
                }
                match rx.recv() {
                    Ok((i, result)) => {
                        pending.insert(i, result);
                    }
                    Err(_) => {
                        return Err(PdfMergeError::embed(
                            "preparation stopped before producing a result",
                        )
                        .for_input(&input.display_name));
                    }
                }
            };

            let before = output.page_count();
            prepared
                .and_then(|p| append_input(&mut output, p))
                .map_err(|e| e.for_input(&input.display_name))?;
            debug!(
                input = %input.display_name,
                id = %input.id,
                pages = output.page_count() - before,
                "input appended"
            );
        }

        Ok(output)
    }
}

/// 準備済み入力を取り込み、各ページを追加する。ページが無い入力はエラー。
fn append_input(output: &mut OutputDocument, prepared: PreparedInput) -> crate::error::Result<()> {
    let pages = embed(prepared, output)?;
    if pages.is_empty() {
        return Err(PdfMergeError::source_document("input produced no pages"));
    }
    for page in &pages {
        append_page(
            output,
            page.intrinsic_width,
            page.intrinsic_height,
            &page.content,
        )?;
    }
    Ok(())
}

/// 入力列を1つのPDFにまとめる（キャンセルなし）。
pub fn merge(
    inputs: &[InputDescriptor],
    options: &MergeOptions,
    progress: &mut dyn ProgressSink,
) -> crate::error::Result<Vec<u8>> {
    merge_with_cancel(inputs, options, progress, &CancellationToken::new())
}

/// 入力列を1つのPDFにまとめる。入力の境目ごとに `cancel` を確認する。
pub fn merge_with_cancel(
    inputs: &[InputDescriptor],
    options: &MergeOptions,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> crate::error::Result<Vec<u8>> {
    Merger::new(*options).merge(inputs, progress, cancel)
}
