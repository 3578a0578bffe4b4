use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::PdfMergeError;

/// ページのMediaBox（ポイント単位）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub width: f64,
    pub height: f64,
}

/// 入力PDF。開いた時点で全ページのMediaBoxを検証済み。
pub struct SourcePdf {
    doc: Document,
    boxes: Vec<PageBox>,
}

impl SourcePdf {
    /// PDFのバイト列を解析してSourcePdfを作成する。
    ///
    /// ページが1枚もないPDFはエラーとする。
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| {
            PdfMergeError::source_document(format!("failed to parse PDF: {e}"))
        })?;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(PdfMergeError::source_document("PDF has no pages"));
        }

        let boxes = pages
            .iter()
            .map(|(&page_num, &page_id)| {
                page_box(&doc, page_id).map_err(|e| match e {
                    PdfMergeError::SourceDocumentError(msg) => {
                        PdfMergeError::source_document(format!("page {page_num}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect::<crate::error::Result<Vec<_>>>()?;

        Ok(Self { doc, boxes })
    }

    /// ページ数を返す。
    pub fn page_count(&self) -> u32 {
        self.boxes.len() as u32
    }

    /// 指定ページ(1-indexed)のMediaBoxを返す。
    pub fn page_box(&self, page_num: u32) -> crate::error::Result<PageBox> {
        page_num
            .checked_sub(1)
            .and_then(|i| self.boxes.get(i as usize))
            .copied()
            .ok_or_else(|| PdfMergeError::source_document(format!("page {page_num} not found")))
    }

    /// ページ順のページオブジェクトID。
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    /// 全オブジェクトを `start` 以降の番号に振り直す。
    pub fn renumber_objects_from(&mut self, start: u32) {
        self.doc.renumber_objects_with(start);
    }

    /// ページのコンテンツストリームを展開し、出現順に連結する。
    ///
    /// ストリームの境界で演算子がつながらないよう、各ストリームの後に改行を入れる。
    /// 展開できないフィルターを持つストリームはエラー。
    pub fn page_content(&self, page_id: ObjectId) -> crate::error::Result<Vec<u8>> {
        let mut content = Vec::new();
        for stream_id in self.doc.get_page_contents(page_id) {
            let stream = self.doc.get_object(stream_id).and_then(Object::as_stream)?;
            if stream.dict.has(b"Filter") {
                let data = stream.decompressed_content().map_err(|e| {
                    PdfMergeError::source_document(format!(
                        "cannot decode content stream {} {}: {e}",
                        stream_id.0, stream_id.1
                    ))
                })?;
                content.extend_from_slice(&data);
            } else {
                content.extend_from_slice(&stream.content);
            }
            content.push(b'\n');
        }
        Ok(content)
    }

    /// ページのリソース辞書（継承分を含む）を返す。
    pub fn page_resources(&self, page_id: ObjectId) -> crate::error::Result<Dictionary> {
        page_resources(&self.doc, page_id)
    }

    /// 取り込み用に内部のDocumentを取り出す。
    pub fn into_document(self) -> Document {
        self.doc
    }
}

/// ページツリーをたどる深さの上限（循環参照対策）
const MAX_TREE_DEPTH: usize = 64;

/// ページ辞書から継承可能な属性を取得する（Parent経由の継承も考慮）。
fn find_inherited<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> crate::error::Result<Option<&'a Object>> {
    let mut dict = page_dict;
    for _ in 0..MAX_TREE_DEPTH {
        // まず現在の辞書から探す
        if let Ok(obj) = dict.get(key) {
            return Ok(Some(match obj {
                Object::Reference(id) => doc.get_object(*id)?,
                other => other,
            }));
        }

        // 見つからなければParentをたどる
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => dict = doc.get_dictionary(*parent_id)?,
            _ => return Ok(None),
        }
    }
    Err(PdfMergeError::source_document("page tree is too deep or cyclic"))
}

/// 指定ページのMediaBoxを読み取り、寸法を検証する。
fn page_box(doc: &Document, page_id: ObjectId) -> crate::error::Result<PageBox> {
    let page_dict = doc.get_dictionary(page_id)?;

    let media_box = find_inherited(doc, page_dict, b"MediaBox")?
        .ok_or_else(|| PdfMergeError::source_document("MediaBox not found"))?;
    let media_box_array = media_box.as_array()?;
    if media_box_array.len() < 4 {
        return Err(PdfMergeError::source_document("Invalid MediaBox"));
    }

    // MediaBoxの値は整数または実数の可能性がある
    let to_f64 = |obj: &Object| -> crate::error::Result<f64> {
        match obj {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(f) => Ok(*f as f64),
            _ => Err(PdfMergeError::source_document("Invalid MediaBox value")),
        }
    };

    let x0 = to_f64(&media_box_array[0])?;
    let y0 = to_f64(&media_box_array[1])?;
    let x1 = to_f64(&media_box_array[2])?;
    let y1 = to_f64(&media_box_array[3])?;

    let width = (x1 - x0).abs();
    let height = (y1 - y0).abs();

    if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
        return Err(PdfMergeError::source_document(
            "Invalid MediaBox: non-positive page dimensions",
        ));
    }

    // 一般的なPDFの上限 (14,400 pt ≈ 200 in)
    const PDF_MAX_DIMENSION_PT: f64 = 14_400.0;
    if width > PDF_MAX_DIMENSION_PT || height > PDF_MAX_DIMENSION_PT {
        return Err(PdfMergeError::source_document(
            "Invalid MediaBox: page dimensions exceed PDF limits",
        ));
    }

    Ok(PageBox {
        x0: x0.min(x1),
        y0: y0.min(y1),
        width,
        height,
    })
}

/// ページのリソース辞書を返す。
///
/// ページ自身に無ければ最も近い祖先のResourcesを継承する。どこにも無ければ空。
fn page_resources(doc: &Document, page_id: ObjectId) -> crate::error::Result<Dictionary> {
    let page_dict = doc.get_dictionary(page_id)?;
    match find_inherited(doc, page_dict, b"Resources")? {
        Some(obj) => Ok(obj.as_dict()?.clone()),
        None => Ok(Dictionary::new()),
    }
}
