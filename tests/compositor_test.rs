// ページ合成（幾何計算・ページ追加）のテスト

use lopdf::{Document, Object};
use pdf_merge::pdf::reader::PageBox;
use pdf_merge::pdf::writer::OutputDocument;
use pdf_merge::pipeline::compositor::{
    PageContent, TARGET_WIDTH_PT, append_page, build_draw_content, page_geometry,
};

fn num(obj: &Object) -> f64 {
    match obj {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => *r as f64,
        other => panic!("expected number, got {other:?}"),
    }
}

// ============================================================
// 1. 幾何計算
// ============================================================

#[test]
fn test_geometry_fixed_width() {
    for (w, h) in [(300.0, 300.0), (600.0, 300.0), (612.0, 792.0), (1.0, 5000.0)] {
        let g = page_geometry(w, h).expect("valid size");
        assert_eq!(g.width, 595.28, "width must be exactly 595.28");
        assert_eq!(g.width, TARGET_WIDTH_PT);
        assert!(
            (g.height / g.width - h / w).abs() < 1e-9,
            "aspect ratio must be preserved for {w}x{h}"
        );
    }
}

#[test]
fn test_geometry_examples() {
    let square = page_geometry(300.0, 300.0).unwrap();
    assert!((square.height - 595.28).abs() < 1e-9);
    assert!((square.scale - 595.28 / 300.0).abs() < 1e-12);

    let wide = page_geometry(600.0, 300.0).unwrap();
    assert!((wide.height - 297.64).abs() < 1e-9);
}

#[test]
fn test_geometry_rejects_degenerate_sizes() {
    assert!(page_geometry(0.0, 100.0).is_err());
    assert!(page_geometry(100.0, -1.0).is_err());
    assert!(page_geometry(f64::NAN, 100.0).is_err());
    assert!(page_geometry(100.0, f64::INFINITY).is_err());
}

// ============================================================
// 2. 描画コマンド
// ============================================================

#[test]
fn test_draw_image_fills_page() {
    let g = page_geometry(600.0, 300.0).unwrap();
    let content = PageContent::Image {
        xobject_id: (5, 0),
    };
    let ops = String::from_utf8(build_draw_content("P0", &g, &content)).unwrap();
    assert_eq!(ops, "q 595.28 0 0 297.64 0 0 cm /P0 Do Q");
}

#[test]
fn test_draw_form_scales_and_offsets() {
    let g = page_geometry(300.0, 400.0).unwrap();
    let content = PageContent::Form {
        xobject_id: (7, 0),
        bbox: PageBox {
            x0: 50.0,
            y0: 100.0,
            width: 300.0,
            height: 400.0,
        },
    };
    let ops = String::from_utf8(build_draw_content("P3", &g, &content)).unwrap();
    let parts: Vec<&str> = ops.split_whitespace().collect();
    assert_eq!(parts[0], "q");
    let s: f64 = parts[1].parse().unwrap();
    let e: f64 = parts[5].parse().unwrap();
    let f: f64 = parts[6].parse().unwrap();
    assert!((s - 595.28 / 300.0).abs() < 1e-5);
    assert!((e + 50.0 * s).abs() < 1e-4, "x offset moves BBox origin to 0");
    assert!((f + 100.0 * s).abs() < 1e-4, "y offset moves BBox origin to 0");
    assert!(ops.ends_with("cm /P3 Do Q"));
}

// ============================================================
// 3. ページ追加
// ============================================================

#[test]
fn test_append_page_writes_media_box() {
    let mut output = OutputDocument::new();
    let image_id = output.add_image(
        pdf_merge::pdf::image_xobject::build_jpeg_xobject(&tiny_jpeg()).expect("jpeg"),
    );
    append_page(&mut output, 600.0, 300.0, &PageContent::Image { xobject_id: image_id })
        .expect("append");
    assert_eq!(output.page_count(), 1);

    let bytes = output.finish().expect("finish");
    let doc = Document::load_mem(&bytes).expect("reload");
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1);
    let page = doc.get_dictionary(pages[&1]).unwrap();
    let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
    assert!((num(&mb[2]) - 595.28).abs() < 1e-3);
    assert!((num(&mb[3]) - 297.64).abs() < 1e-3);
}

#[test]
fn test_finish_without_pages_is_encode_error() {
    let output = OutputDocument::new();
    let err = output.finish().expect_err("empty output should fail");
    assert!(matches!(err, pdf_merge::PdfMergeError::EncodeError(_)));
}

fn tiny_jpeg() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        2,
        1,
        image::Rgb([0, 0, 0]),
    ));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Jpeg)
        .expect("encode jpeg");
    buf.into_inner()
}
