// 出力PDF構築: 画像XObject / 取り込みページ(Form XObject)の追加、ページツリー組立

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::error::PdfMergeError;
use crate::pdf::image_xobject::ImageXObject;
use crate::pdf::reader::{PageBox, SourcePdf};

/// 入力PDFの1ページをForm XObjectとして取り込んだもの。
#[derive(Debug, Clone, Copy)]
pub struct FormPage {
    pub xobject_id: ObjectId,
    pub bbox: PageBox,
}

/// 追記専用の出力PDF。ページ順は追加順と一致する。
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// 追加済みページ数
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// 内部のlopdf Documentへの参照を返す。
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// 画像XObject（とSMask）を追加する。
    ///
    /// 戻り値は画像XObjectのオブジェクトID。
    pub fn add_image(&mut self, image: ImageXObject) -> ObjectId {
        let ImageXObject {
            image: mut stream,
            smask,
            ..
        } = image;
        if let Some(mask) = smask {
            let mask_id = self.doc.add_object(Object::Stream(mask));
            stream.dict.set("SMask", Object::Reference(mask_id));
        }
        self.doc.add_object(Object::Stream(stream))
    }

    /// 入力PDFの全ページをForm XObjectとして取り込む。
    ///
    /// ページ内容は展開済みのまま格納し、最適化時に圧縮する。
    /// 入力側のCatalog/Pages/Pageオブジェクトは取り込まない。
    pub fn import_pdf_pages(
        &mut self,
        mut source: SourcePdf,
    ) -> crate::error::Result<Vec<FormPage>> {
        // オブジェクト番号の衝突を避けるため、出力側の最大ID以降に振り直す
        source.renumber_objects_from(self.doc.max_id + 1);

        let page_ids = source.page_ids();
        if page_ids.len() != source.page_count() as usize {
            return Err(PdfMergeError::source_document(format!(
                "page count changed while importing ({} != {})",
                page_ids.len(),
                source.page_count()
            )));
        }

        let mut forms = Vec::with_capacity(page_ids.len());
        let mut form_streams = Vec::with_capacity(page_ids.len());
        for (page_num, &page_id) in (1..).zip(&page_ids) {
            let bbox = source.page_box(page_num)?;
            let content = source.page_content(page_id)?;
            let resources = source.page_resources(page_id)?;
            form_streams.push((build_form_stream(content, resources, &bbox), bbox));
        }

        let mut src = source.into_document();
        for (object_id, object) in std::mem::take(&mut src.objects) {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.doc.objects.insert(object_id, object);
                }
            }
        }
        self.doc.max_id = self.doc.max_id.max(src.max_id);

        for (stream, bbox) in form_streams {
            let xobject_id = self.doc.add_object(Object::Stream(stream));
            forms.push(FormPage { xobject_id, bbox });
        }

        Ok(forms)
    }

    /// ページを1枚追加する。
    ///
    /// `xobject_name` で `xobject_id` をリソースに登録し、`content` を
    /// そのページのコンテンツストリームとする。
    pub fn add_page(
        &mut self,
        width: f64,
        height: f64,
        xobject_name: &str,
        xobject_id: ObjectId,
        content: Vec<u8>,
    ) -> ObjectId {
        let mut xobject_dict = Dictionary::new();
        xobject_dict.set(xobject_name, Object::Reference(xobject_id));

        let content_id = self
            .doc
            .add_object(Object::Stream(Stream::new(dictionary! {}, content)));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Resources" => dictionary! {
                "XObject" => Object::Dictionary(xobject_dict),
            },
            "Contents" => content_id,
        });
        self.kids.push(page_id);
        page_id
    }

    /// ページツリーとCatalogを確定し、最適化してバイト列として出力する。
    pub fn finish(mut self) -> crate::error::Result<Vec<u8>> {
        if self.kids.is_empty() {
            return Err(PdfMergeError::encode("output document has no pages"));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
            "Count" => self.kids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        crate::pdf::optimizer::optimize(&mut self.doc);

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| PdfMergeError::encode(format!("failed to serialize PDF: {e}")))?;
        Ok(buf)
    }
}

/// ページ内容とリソースからForm XObjectストリームを作る。
fn build_form_stream(content: Vec<u8>, resources: Dictionary, bbox: &PageBox) -> Stream {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "FormType" => 1,
        "BBox" => vec![
            Object::Real(bbox.x0 as f32),
            Object::Real(bbox.y0 as f32),
            Object::Real((bbox.x0 + bbox.width) as f32),
            Object::Real((bbox.y0 + bbox.height) as f32),
        ],
        "Resources" => Object::Dictionary(resources),
    };
    Stream::new(dict, content)
}
