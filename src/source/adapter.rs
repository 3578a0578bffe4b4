// 入力種別ごとの埋め込み単位の準備と、出力文書への取り込み

use std::borrow::Cow;

use tracing::{debug, instrument, warn};

use crate::config::job::CompressionPolicy;
use crate::error::PdfMergeError;
use crate::pdf::image_xobject::{ImageXObject, build_image_xobject};
use crate::pdf::reader::SourcePdf;
use crate::pdf::writer::OutputDocument;
use crate::pipeline::compositor::PageContent;
use crate::raster::normalize::normalize;
use crate::raster::{RasterCodec, RasterOrigin};
use crate::source::{InputDescriptor, InputKind};

/// 出力文書に依存しない準備済みの入力。
///
/// ワーカースレッドで作り、単一の書き手（オーケストレータ）が取り込む。
#[derive(Debug)]
pub enum PreparedInput {
    /// PDFのバイト列。解析とページ取り込みは取り込み時に行う。
    Pdf(Vec<u8>),
    /// 正規化・XObject化済みの画像
    Raster(ImageXObject),
}

/// 出力文書に取り込まれ、ページとして配置できる単位。
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedPage {
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
    pub content: PageContent,
}

/// 入力1件を種別に応じて準備する。
#[instrument(skip_all, fields(input = %input.display_name, id = %input.id, kind = %input.kind))]
pub fn prepare(
    input: &InputDescriptor,
    policy: CompressionPolicy,
) -> crate::error::Result<PreparedInput> {
    match input.kind {
        InputKind::Pdf => {
            let bytes = input.source.read()?;
            Ok(PreparedInput::Pdf(bytes.into_owned()))
        }
        InputKind::Image => {
            let (bytes, origin) = match &input.converted {
                Some(converted) => (Cow::Borrowed(converted.as_slice()), RasterOrigin::PreConverted),
                None => (input.source.read()?, RasterOrigin::Original),
            };
            prepare_raster(&bytes, origin, policy).map(PreparedInput::Raster)
        }
        InputKind::OfficeLike(_) | InputKind::ConvertedRaster => {
            let converted = input.converted.as_deref().ok_or_else(|| {
                PdfMergeError::unsupported_kind(format!(
                    "{} input was not converted to a raster image before merging",
                    input.kind
                ))
            })?;
            prepare_raster(converted, RasterOrigin::PreConverted, policy)
                .map(PreparedInput::Raster)
        }
    }
}

/// 画像を正規化し、報告されたコーデックで画像XObjectを構築する。
pub fn prepare_raster(
    bytes: &[u8],
    origin: RasterOrigin,
    policy: CompressionPolicy,
) -> crate::error::Result<ImageXObject> {
    let normalized = normalize(bytes, origin, policy)?;
    let image = embed_with_fallback(&normalized.bytes, normalized.codec)?;
    debug!(
        codec = %normalized.codec,
        bytes = normalized.bytes.len(),
        width = image.width,
        height = image.height,
        "raster prepared"
    );
    Ok(image)
}

/// `codec` として埋め込みを試み、失敗したら反対側のコーデックで一度だけ再試行する。
pub fn embed_with_fallback(
    bytes: &[u8],
    codec: RasterCodec,
) -> crate::error::Result<ImageXObject> {
    let first = match build_image_xobject(bytes, codec) {
        Ok(image) => return Ok(image),
        Err(e) => e,
    };

    let retry = codec.opposite();
    warn!(%codec, %retry, error = %first, "embedding failed, retrying with opposite codec");
    build_image_xobject(bytes, retry).map_err(|second| {
        PdfMergeError::embed(format!(
            "could not embed image as {codec} ({first}) or {retry} ({second})"
        ))
    })
}

/// 準備済み入力を出力文書に取り込み、配置するページの一覧を返す。
///
/// PDFはページごとに1件、画像は常に1件。
pub fn embed(
    prepared: PreparedInput,
    output: &mut OutputDocument,
) -> crate::error::Result<Vec<EmbeddedPage>> {
    match prepared {
        PreparedInput::Pdf(bytes) => {
            let source = SourcePdf::from_bytes(&bytes)?;
            let forms = output.import_pdf_pages(source)?;
            Ok(forms
                .into_iter()
                .map(|form| EmbeddedPage {
                    intrinsic_width: form.bbox.width,
                    intrinsic_height: form.bbox.height,
                    content: PageContent::Form {
                        xobject_id: form.xobject_id,
                        bbox: form.bbox,
                    },
                })
                .collect())
        }
        PreparedInput::Raster(image) => {
            let (width, height) = (image.width as f64, image.height as f64);
            let xobject_id = output.add_image(image);
            Ok(vec![EmbeddedPage {
                intrinsic_width: width,
                intrinsic_height: height,
                content: PageContent::Image { xobject_id },
            }])
        }
    }
}
