// 出力PDF構築テスト: 画像追加、ページ取り込み、最終化と最適化

use std::io::{Cursor, Write};

use flate2::Compression;
use flate2::write::ZlibEncoder;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lopdf::{Document, Object, Stream, dictionary};
use pdf_merge::error::PdfMergeError;
use pdf_merge::pdf::image_xobject::build_png_xobject;
use pdf_merge::pdf::optimizer::{compress_streams, delete_unused_objects};
use pdf_merge::pdf::reader::SourcePdf;
use pdf_merge::pdf::writer::OutputDocument;

fn two_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for (w, h) in [(300, 300), (200, 400)] {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            format!("0 0 m {w} {h} l S").into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {},
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save test PDF");
    buf
}

/// コンテンツが複数ストリームの配列に分かれた1ページのPDF
fn split_content_pdf(streams: Vec<Stream>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let contents: Vec<Object> = streams
        .into_iter()
        .map(|s| doc.add_object(s).into())
        .collect();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
        "Contents" => contents,
        "Resources" => dictionary! {},
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save test PDF");
    buf
}

fn flate_stream(content: &[u8]) -> Stream {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).expect("deflate");
    Stream::new(
        dictionary! { "Filter" => "FlateDecode" },
        encoder.finish().expect("deflate"),
    )
}

fn imported_form_content(pdf: &[u8]) -> pdf_merge::Result<Vec<u8>> {
    let mut output = OutputDocument::new();
    let forms = output.import_pdf_pages(SourcePdf::from_bytes(pdf)?)?;
    assert_eq!(forms.len(), 1);
    let stream = output
        .document()
        .get_object(forms[0].xobject_id)
        .and_then(Object::as_stream)
        .expect("form stream");
    Ok(stream.content.clone())
}

fn rgba_png() -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 128])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode PNG");
    buf.into_inner()
}

fn count_type(doc: &Document, type_name: &[u8]) -> usize {
    doc.objects
        .values()
        .filter(|obj| obj.type_name().ok() == Some(type_name))
        .count()
}

// ============================================================
// 1. 画像の追加
// ============================================================

#[test]
fn test_add_image_links_smask() {
    let mut output = OutputDocument::new();
    let image = build_png_xobject(&rgba_png()).expect("PNG XObject");
    let image_id = output.add_image(image);

    let stream = output
        .document()
        .get_object(image_id)
        .and_then(Object::as_stream)
        .expect("image stream");
    let mask_id = stream
        .dict
        .get(b"SMask")
        .and_then(Object::as_reference)
        .expect("SMask reference");
    let mask = output
        .document()
        .get_object(mask_id)
        .and_then(Object::as_stream)
        .expect("mask stream");
    assert_eq!(mask.dict.get(b"Width").and_then(Object::as_i64).unwrap(), 4);
}

// ============================================================
// 2. ページ取り込み
// ============================================================

#[test]
fn test_import_pdf_pages_as_forms() {
    let mut output = OutputDocument::new();
    let source = SourcePdf::from_bytes(&two_page_pdf()).expect("parse");
    let forms = output.import_pdf_pages(source).expect("import");

    assert_eq!(forms.len(), 2);
    assert_eq!((forms[1].bbox.width, forms[1].bbox.height), (200.0, 400.0));
    for form in &forms {
        let stream = output
            .document()
            .get_object(form.xobject_id)
            .and_then(Object::as_stream)
            .expect("form stream");
        assert_eq!(
            stream.dict.get(b"Subtype").and_then(Object::as_name).unwrap(),
            b"Form"
        );
        assert!(stream.dict.get(b"BBox").is_ok());
        assert!(stream.dict.get(b"Resources").is_ok());
        assert!(!stream.content.is_empty());
    }
    // 入力側のページツリーは取り込まない
    assert_eq!(count_type(output.document(), b"Page"), 0);
    assert_eq!(count_type(output.document(), b"Catalog"), 0);
}

#[test]
fn test_import_twice_does_not_collide() {
    let mut output = OutputDocument::new();
    let first = output
        .import_pdf_pages(SourcePdf::from_bytes(&two_page_pdf()).unwrap())
        .unwrap();
    let second = output
        .import_pdf_pages(SourcePdf::from_bytes(&two_page_pdf()).unwrap())
        .unwrap();
    for a in &first {
        for b in &second {
            assert_ne!(a.xobject_id, b.xobject_id);
        }
    }
}

#[test]
fn test_split_contents_keep_token_boundaries() {
    let pdf = split_content_pdf(vec![
        Stream::new(dictionary! {}, b"q 1 0 0 RG".to_vec()),
        Stream::new(dictionary! {}, b"0 0 m 10 10 l S Q".to_vec()),
    ]);
    let content = imported_form_content(&pdf).expect("import");
    assert_eq!(content, b"q 1 0 0 RG\n0 0 m 10 10 l S Q\n");
}

#[test]
fn test_split_contents_with_flate_stream() {
    let pdf = split_content_pdf(vec![
        flate_stream(b"q 1 0 0 RG"),
        Stream::new(dictionary! {}, b"0 0 m 10 10 l S Q".to_vec()),
    ]);
    let content = imported_form_content(&pdf).expect("import");
    assert_eq!(content, b"q 1 0 0 RG\n0 0 m 10 10 l S Q\n");
}

#[test]
fn test_undecodable_content_stream_is_rejected() {
    let pdf = split_content_pdf(vec![Stream::new(
        dictionary! { "Filter" => "RunLengthDecode" },
        vec![2, b'q', b' ', b'Q', 128],
    )]);
    let err = imported_form_content(&pdf).expect_err("import should fail");
    assert!(
        matches!(err, PdfMergeError::SourceDocumentError(ref msg) if msg.contains("content stream")),
        "got {err:?}"
    );
}

// ============================================================
// 3. 最終化
// ============================================================

#[test]
fn test_finish_produces_loadable_pdf() {
    let mut output = OutputDocument::new();
    let forms = output
        .import_pdf_pages(SourcePdf::from_bytes(&two_page_pdf()).unwrap())
        .unwrap();
    for form in &forms {
        output.add_page(595.28, 595.28, "P0", form.xobject_id, b"q /P0 Do Q".to_vec());
    }
    assert_eq!(output.page_count(), 2);

    let bytes = output.finish().expect("finish");
    let doc = Document::load_mem(&bytes).expect("reload");
    assert_eq!(doc.get_pages().len(), 2);
    assert_eq!(count_type(&doc, b"Page"), 2);

    // 描画ストリームとForm XObjectは圧縮される
    let unfiltered = doc
        .objects
        .values()
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|s| !s.dict.has(b"Filter"))
        .count();
    assert_eq!(unfiltered, 0);
}

// ============================================================
// 4. 最適化
// ============================================================

#[test]
fn test_compress_streams_skips_filtered() {
    let mut doc = Document::with_version("1.7");
    let plain_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 1 1 l S".to_vec()));
    let dct_id = doc.add_object(Stream::new(
        dictionary! { "Filter" => "DCTDecode" },
        vec![0xFF, 0xD8, 0xFF, 0xD9],
    ));
    let empty_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));

    assert_eq!(compress_streams(&mut doc), 1);

    let plain = doc.get_object(plain_id).and_then(Object::as_stream).unwrap();
    assert_eq!(plain.decompressed_content().unwrap(), b"0 0 m 1 1 l S");
    let dct = doc.get_object(dct_id).and_then(Object::as_stream).unwrap();
    assert_eq!(dct.content, vec![0xFF, 0xD8, 0xFF, 0xD9]);
    let empty = doc.get_object(empty_id).and_then(Object::as_stream).unwrap();
    assert!(!empty.dict.has(b"Filter"));
}

#[test]
fn test_delete_unused_objects() {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.add_object(dictionary! { "Orphan" => true });

    assert_eq!(delete_unused_objects(&mut doc), 1);
    assert_eq!(doc.objects.len(), 2);
}
