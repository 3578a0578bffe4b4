// 外部変換器: Office文書 → PNG、HEIC → JPEG
//
// 変換自体は外部コマンドに任せ、ここでは呼び出しと結果の取得だけを行う。

use std::path::Path;
use std::process::Command;

use tracing::{info, instrument};

use crate::error::PdfMergeError;
use crate::source::{InputDescriptor, InputKind, OfficeFormat};

/// Office文書を1枚のラスタ画像に描画する外部レンダラ。
pub trait OfficeRenderer {
    fn render_to_raster(&self, document: &[u8], format: OfficeFormat)
    -> crate::error::Result<Vec<u8>>;
}

/// HEIC/HEIF画像をJPEGに変換する外部コーデック。
pub trait HeicTranscoder {
    fn transcode(&self, heic: &[u8]) -> crate::error::Result<Vec<u8>>;
}

/// 外部コマンドで変換を行う実装。
///
/// - Office: `<office_command> --headless --convert-to png --outdir <dir> <file>`
/// - HEIC: `<heic_command> <input> <output.jpg>`
///
/// コマンドはPATHから解決される。
#[derive(Debug, Clone)]
pub struct CommandConverter {
    office_command: String,
    heic_command: String,
}

impl Default for CommandConverter {
    fn default() -> Self {
        Self::new("soffice", "heif-convert")
    }
}

impl CommandConverter {
    pub fn new(office_command: impl Into<String>, heic_command: impl Into<String>) -> Self {
        Self {
            office_command: office_command.into(),
            heic_command: heic_command.into(),
        }
    }
}

impl OfficeRenderer for CommandConverter {
    #[instrument(skip(self, document), fields(len = document.len()))]
    fn render_to_raster(
        &self,
        document: &[u8],
        format: OfficeFormat,
    ) -> crate::error::Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let ext = match format {
            OfficeFormat::Docx => "docx",
            OfficeFormat::Xlsx => "xlsx",
        };
        let input_path = dir.path().join(format!("document.{ext}"));
        std::fs::write(&input_path, document)?;

        let mut cmd = Command::new(&self.office_command);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg("png")
            .arg("--outdir")
            .arg(dir.path())
            .arg(&input_path);
        run_tool(&self.office_command, &mut cmd)?;

        read_output(&dir.path().join("document.png"), &self.office_command)
    }
}

impl HeicTranscoder for CommandConverter {
    #[instrument(skip(self, heic), fields(len = heic.len()))]
    fn transcode(&self, heic: &[u8]) -> crate::error::Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input_path = dir.path().join("image.heic");
        let output_path = dir.path().join("image.jpg");
        std::fs::write(&input_path, heic)?;

        let mut cmd = Command::new(&self.heic_command);
        cmd.arg(&input_path).arg(&output_path);
        run_tool(&self.heic_command, &mut cmd)?;

        read_output(&output_path, &self.heic_command)
    }
}

/// 外部コマンドを実行し、失敗時は終了コードとstderrを含むエラーにする。
fn run_tool(tool: &str, cmd: &mut Command) -> crate::error::Result<()> {
    let output = cmd
        .output()
        .map_err(|e| PdfMergeError::conversion(format!("failed to execute {tool}: {e}")))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(PdfMergeError::conversion(format!(
            "{tool} failed (exit code {}): {}",
            output
                .status
                .code()
                .map_or_else(|| "unknown".to_string(), |c| c.to_string()),
            stderr.trim()
        )))
    }
}

fn read_output(path: &Path, tool: &str) -> crate::error::Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        PdfMergeError::conversion(format!(
            "{tool} produced no output at {}: {e}",
            path.display()
        ))
    })
}

/// 外部変換が必要な入力に変換結果を付けて返す。
///
/// 変換済み・変換不要の入力はそのまま。最初の失敗で中断し、入力名を付けて返す。
pub fn convert_inputs(
    inputs: Vec<InputDescriptor>,
    renderer: &dyn OfficeRenderer,
    transcoder: &dyn HeicTranscoder,
) -> crate::error::Result<Vec<InputDescriptor>> {
    inputs
        .into_iter()
        .map(|input| {
            if !input.needs_conversion() {
                return Ok(input);
            }
            let name = input.display_name.clone();
            convert_one(input, renderer, transcoder).map_err(|e| e.for_input(name))
        })
        .collect()
}

fn convert_one(
    input: InputDescriptor,
    renderer: &dyn OfficeRenderer,
    transcoder: &dyn HeicTranscoder,
) -> crate::error::Result<InputDescriptor> {
    let format = match input.kind {
        InputKind::OfficeLike(format) => Some(format),
        InputKind::ConvertedRaster => None,
        InputKind::Pdf | InputKind::Image => return Ok(input),
    };
    let converted = {
        let original = input.source.read()?;
        match format {
            Some(format) => renderer.render_to_raster(&original, format)?,
            None => transcoder.transcode(&original)?,
        }
    };
    info!(input = %input.display_name, bytes = converted.len(), "input converted");
    Ok(input.with_converted(converted))
}
