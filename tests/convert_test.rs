// 外部変換器テスト: 入力種別判定と変換結果の付与

use std::cell::Cell;
use std::path::Path;

use pdf_merge::error::PdfMergeError;
use pdf_merge::source::convert::{CommandConverter, HeicTranscoder, OfficeRenderer, convert_inputs};
use pdf_merge::source::{InputDescriptor, InputKind, OfficeFormat};

/// 呼び出し回数を数え、形式名を返すだけのレンダラ
struct FakeRenderer {
    calls: Cell<usize>,
}

impl OfficeRenderer for FakeRenderer {
    fn render_to_raster(
        &self,
        _document: &[u8],
        format: OfficeFormat,
    ) -> pdf_merge::Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        Ok(format!("{format:?}").into_bytes())
    }
}

struct FakeTranscoder;

impl HeicTranscoder for FakeTranscoder {
    fn transcode(&self, heic: &[u8]) -> pdf_merge::Result<Vec<u8>> {
        let mut out = b"JPEG:".to_vec();
        out.extend_from_slice(heic);
        Ok(out)
    }
}

struct FailingTranscoder;

impl HeicTranscoder for FailingTranscoder {
    fn transcode(&self, _heic: &[u8]) -> pdf_merge::Result<Vec<u8>> {
        Err(PdfMergeError::conversion("codec missing"))
    }
}

// ============================================================
// 1. 入力種別の判定
// ============================================================

#[test]
fn test_kind_from_extension() {
    assert_eq!(InputKind::from_extension("pdf"), Some(InputKind::Pdf));
    assert_eq!(InputKind::from_extension("JPG"), Some(InputKind::Image));
    assert_eq!(InputKind::from_extension("webp"), Some(InputKind::Image));
    assert_eq!(
        InputKind::from_extension("HEIC"),
        Some(InputKind::ConvertedRaster)
    );
    assert_eq!(
        InputKind::from_extension("docx"),
        Some(InputKind::OfficeLike(OfficeFormat::Docx))
    );
    assert_eq!(
        InputKind::from_extension("xlsx"),
        Some(InputKind::OfficeLike(OfficeFormat::Xlsx))
    );
    assert_eq!(InputKind::from_extension("exe"), None);
}

#[test]
fn test_kind_from_path() {
    let kind = InputKind::from_path(Path::new("/tmp/scan.TIFF")).expect("known extension");
    assert_eq!(kind, InputKind::Image);

    let err = InputKind::from_path(Path::new("/tmp/no_extension")).unwrap_err();
    assert!(matches!(err, PdfMergeError::ConfigError(_)));
}

#[test]
fn test_descriptor_from_path_uses_file_name() {
    let input = InputDescriptor::from_path("/data/in/cover.pdf").expect("pdf path");
    assert_eq!(input.display_name, "cover.pdf");
    assert_eq!(input.kind, InputKind::Pdf);
    assert!(!input.needs_conversion());
}

#[test]
fn test_requires_conversion() {
    assert!(InputKind::ConvertedRaster.requires_conversion());
    assert!(InputKind::OfficeLike(OfficeFormat::Docx).requires_conversion());
    assert!(!InputKind::Pdf.requires_conversion());
    assert!(!InputKind::Image.requires_conversion());
}

// ============================================================
// 2. convert_inputs
// ============================================================

#[test]
fn test_convert_inputs_fills_converted_bytes() {
    let inputs = vec![
        InputDescriptor::from_bytes("a.pdf", InputKind::Pdf, b"%PDF".to_vec()),
        InputDescriptor::from_bytes(
            "b.xlsx",
            InputKind::OfficeLike(OfficeFormat::Xlsx),
            b"sheet".to_vec(),
        ),
        InputDescriptor::from_bytes("c.heic", InputKind::ConvertedRaster, b"heic".to_vec()),
    ];
    let renderer = FakeRenderer {
        calls: Cell::new(0),
    };
    let converted =
        convert_inputs(inputs, &renderer, &FakeTranscoder).expect("conversion should succeed");

    assert_eq!(converted.len(), 3);
    assert_eq!(converted[0].converted, None);
    assert_eq!(converted[1].converted.as_deref(), Some(&b"Xlsx"[..]));
    assert_eq!(converted[2].converted.as_deref(), Some(&b"JPEG:heic"[..]));
    assert!(converted.iter().all(|i| !i.needs_conversion()));
    assert_eq!(renderer.calls.get(), 1);
}

#[test]
fn test_convert_inputs_skips_already_converted() {
    let inputs = vec![
        InputDescriptor::from_bytes(
            "memo.docx",
            InputKind::OfficeLike(OfficeFormat::Docx),
            b"doc".to_vec(),
        )
        .with_converted(b"rendered".to_vec()),
    ];
    let renderer = FakeRenderer {
        calls: Cell::new(0),
    };
    let converted = convert_inputs(inputs, &renderer, &FakeTranscoder).unwrap();
    assert_eq!(renderer.calls.get(), 0);
    assert_eq!(converted[0].converted.as_deref(), Some(&b"rendered"[..]));
}

#[test]
fn test_convert_inputs_failure_names_input() {
    let inputs = vec![
        InputDescriptor::from_bytes("ok.png", InputKind::Image, vec![1, 2, 3]),
        InputDescriptor::from_bytes("photo.heic", InputKind::ConvertedRaster, vec![4, 5, 6]),
    ];
    let renderer = FakeRenderer {
        calls: Cell::new(0),
    };
    let err = convert_inputs(inputs, &renderer, &FailingTranscoder).unwrap_err();
    assert_eq!(err.input_name(), Some("photo.heic"));
    assert!(err.to_string().contains("codec missing"));
}

// ============================================================
// 3. CommandConverter
// ============================================================

#[test]
fn test_command_converter_missing_tool() {
    let converter = CommandConverter::new(
        "/nonexistent/bin/office-renderer",
        "/nonexistent/bin/heic-tool",
    );
    let err = converter.transcode(b"heic").unwrap_err();
    assert!(
        matches!(err, PdfMergeError::ConversionError(ref msg) if msg.contains("heic-tool")),
        "got {err:?}"
    );

    let err = converter
        .render_to_raster(b"doc", OfficeFormat::Docx)
        .unwrap_err();
    assert!(matches!(err, PdfMergeError::ConversionError(_)), "got {err:?}");
}

#[cfg(unix)]
#[test]
fn test_command_converter_tool_without_output() {
    // `true` は成功するが何も出力しない
    let converter = CommandConverter::new("true", "true");
    let err = converter.transcode(b"heic").unwrap_err();
    assert!(
        matches!(err, PdfMergeError::ConversionError(ref msg) if msg.contains("produced no output")),
        "got {err:?}"
    );
}

#[cfg(unix)]
#[test]
fn test_command_converter_tool_failure_reports_exit_code() {
    let converter = CommandConverter::new("false", "false");
    let err = converter
        .render_to_raster(b"doc", OfficeFormat::Xlsx)
        .unwrap_err();
    assert!(
        matches!(err, PdfMergeError::ConversionError(ref msg) if msg.contains("exit code 1")),
        "got {err:?}"
    );
}
