// ページ合成: 固有寸法から出力ページ寸法を求め、コンテンツを全面に描画する

use lopdf::ObjectId;
use tracing::debug;

use crate::error::PdfMergeError;
use crate::pdf::reader::PageBox;
use crate::pdf::writer::OutputDocument;

/// 出力ページの固定幅（A4幅、ポイント）
pub const TARGET_WIDTH_PT: f64 = 595.28;

/// 出力ページの寸法と拡大率
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

/// ページに描画するコンテンツ
#[derive(Debug, Clone, Copy)]
pub enum PageContent {
    /// 入力PDFのページ（Form XObject）
    Form { xobject_id: ObjectId, bbox: PageBox },
    /// 画像XObject（単位正方形に描画される）
    Image { xobject_id: ObjectId },
}

/// 幅を固定し、縦横比を保ったページ寸法を求める。
pub fn page_geometry(
    intrinsic_width: f64,
    intrinsic_height: f64,
) -> crate::error::Result<PageGeometry> {
    if !(intrinsic_width.is_finite() && intrinsic_height.is_finite())
        || intrinsic_width <= 0.0
        || intrinsic_height <= 0.0
    {
        return Err(PdfMergeError::embed(format!(
            "invalid intrinsic size {intrinsic_width}x{intrinsic_height}"
        )));
    }

    let scale = TARGET_WIDTH_PT / intrinsic_width;
    Ok(PageGeometry {
        width: TARGET_WIDTH_PT,
        height: intrinsic_height * scale,
        scale,
    })
}

/// コンテンツを原点(0,0)からページ全面に描画するコンテンツストリームを生成する。
///
/// `q a 0 0 d e f cm /Name Do Q`
pub fn build_draw_content(name: &str, geometry: &PageGeometry, content: &PageContent) -> Vec<u8> {
    let (a, d, e, f) = match content {
        PageContent::Form { bbox, .. } => (
            geometry.scale,
            geometry.scale,
            -bbox.x0 * geometry.scale,
            -bbox.y0 * geometry.scale,
        ),
        PageContent::Image { .. } => (geometry.width, geometry.height, 0.0, 0.0),
    };
    format!(
        "q {} 0 0 {} {} {} cm /{name} Do Q",
        fmt_num(a),
        fmt_num(d),
        fmt_num(e),
        fmt_num(f)
    )
    .into_bytes()
}

/// 出力文書にページを1枚追加する。
pub fn append_page(
    output: &mut OutputDocument,
    intrinsic_width: f64,
    intrinsic_height: f64,
    content: &PageContent,
) -> crate::error::Result<PageGeometry> {
    let geometry = page_geometry(intrinsic_width, intrinsic_height)?;

    let name = format!("P{}", output.page_count());
    let xobject_id = match content {
        PageContent::Form { xobject_id, .. } | PageContent::Image { xobject_id } => *xobject_id,
    };
    let stream = build_draw_content(&name, &geometry, content);
    output.add_page(geometry.width, geometry.height, &name, xobject_id, stream);

    debug!(
        page = output.page_count(),
        intrinsic_width,
        intrinsic_height,
        height = geometry.height,
        "page appended"
    );
    Ok(geometry)
}

/// PDF数値として出力する（指数表記を避け、末尾の0を落とす）。
fn fmt_num(v: f64) -> String {
    let v = if v == 0.0 { 0.0 } else { v };
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
