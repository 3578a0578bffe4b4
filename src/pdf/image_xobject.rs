// 画像XObject構築: PNG/JPEGバイト列 → 出力PDFに追加できる画像ストリーム

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{DynamicImage, ImageFormat};
use lopdf::{Object, Stream, dictionary};

use crate::error::PdfMergeError;
use crate::raster::RasterCodec;

/// 出力文書にまだ追加されていない画像XObject。
///
/// 文書に依存しないため、並列ワーカーで構築してから単一の書き手に渡せる。
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub image: Stream,
    /// アルファチャンネルを持つPNGのみ。
    pub smask: Option<Stream>,
    pub width: u32,
    pub height: u32,
}

/// JPEGのSOFセグメントから読み取った情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub bits_per_component: u8,
}

/// 指定コーデックとして画像XObjectを構築する。
pub fn build_image_xobject(
    bytes: &[u8],
    codec: RasterCodec,
) -> crate::error::Result<ImageXObject> {
    match codec {
        RasterCodec::Png => build_png_xobject(bytes),
        RasterCodec::Jpeg => build_jpeg_xobject(bytes),
    }
}

/// JPEGバイト列をDCTDecodeのまま画像XObjectにする（再エンコードしない）。
pub fn build_jpeg_xobject(bytes: &[u8]) -> crate::error::Result<ImageXObject> {
    let info = read_jpeg_info(bytes)?;

    let color_space = match info.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(PdfMergeError::embed(format!(
                "unsupported JPEG component count: {n}"
            )));
        }
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => info.width as i64,
        "Height" => info.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => info.bits_per_component as i64,
        "Filter" => "DCTDecode",
    };
    // Adobe系のCMYK JPEGは反転して格納されている
    if info.components == 4 {
        dict.set(
            "Decode",
            [1, 0, 1, 0, 1, 0, 1, 0]
                .iter()
                .map(|&v| Object::Integer(v))
                .collect::<Vec<_>>(),
        );
    }

    Ok(ImageXObject {
        image: Stream::new(dict, bytes.to_vec()),
        smask: None,
        width: info.width,
        height: info.height,
    })
}

/// PNGをデコードし、画素をFlateDecodeで格納した画像XObjectにする。
///
/// アルファチャンネルはSMaskとして分離する。16bitは8bitに落とす。
pub fn build_png_xobject(bytes: &[u8]) -> crate::error::Result<ImageXObject> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| PdfMergeError::embed(format!("invalid PNG data: {e}")))?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(PdfMergeError::embed("PNG has zero width or height"));
    }

    let color = img.color();
    let (pixels, color_space, alpha) = if color.has_alpha() {
        split_alpha(&img, color.has_color())
    } else if color.has_color() {
        (img.to_rgb8().into_raw(), "DeviceRGB", None)
    } else {
        (img.to_luma8().into_raw(), "DeviceGray", None)
    };

    let smask = match alpha {
        Some(alpha) => Some(flate_image_stream(&alpha, width, height, "DeviceGray")?),
        None => None,
    };

    Ok(ImageXObject {
        image: flate_image_stream(&pixels, width, height, color_space)?,
        smask,
        width,
        height,
    })
}

/// 色成分とアルファ成分を分離する。
fn split_alpha(img: &DynamicImage, has_color: bool) -> (Vec<u8>, &'static str, Option<Vec<u8>>) {
    if has_color {
        let rgba = img.to_rgba8();
        let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(rgba.len() / 4);
        for px in rgba.pixels() {
            rgb.extend_from_slice(&px.0[..3]);
            alpha.push(px.0[3]);
        }
        (rgb, "DeviceRGB", Some(alpha))
    } else {
        let la = img.to_luma_alpha8();
        let mut gray = Vec::with_capacity(la.len() / 2);
        let mut alpha = Vec::with_capacity(la.len() / 2);
        for px in la.pixels() {
            gray.push(px.0[0]);
            alpha.push(px.0[1]);
        }
        (gray, "DeviceGray", Some(alpha))
    }
}

/// 8bit画素列をzlib圧縮して画像ストリームにする。
fn flate_image_stream(
    pixels: &[u8],
    width: u32,
    height: u32,
    color_space: &str,
) -> crate::error::Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(pixels)
        .map_err(|e| PdfMergeError::embed(format!("FlateDecode compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| PdfMergeError::embed(format!("FlateDecode compression failed: {e}")))?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    Ok(Stream::new(dict, compressed))
}

/// JPEGのマーカー列を走査してSOFセグメントから寸法と成分数を読み取る。
///
/// SOS/EOIより前にSOFが見つからない場合は埋め込み不可とする。
pub fn read_jpeg_info(bytes: &[u8]) -> crate::error::Result<JpegInfo> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return Err(PdfMergeError::embed("missing JPEG SOI marker"));
    }

    let mut pos = 2;
    loop {
        // マーカー前のフィルバイト(0xFF)を読み飛ばす
        if bytes.get(pos) != Some(&0xFF) {
            return Err(PdfMergeError::embed(format!(
                "expected JPEG marker at offset {pos}"
            )));
        }
        while bytes.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = bytes.get(pos) else {
            return Err(PdfMergeError::embed("truncated JPEG marker"));
        };
        pos += 1;

        match marker {
            // 長さを持たない単独マーカー (TEM, RST0-7)
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => {
                return Err(PdfMergeError::embed(
                    "JPEG has no frame header before scan data",
                ));
            }
            _ => {}
        }

        let len = match bytes.get(pos..pos + 2) {
            Some(b) => u16::from_be_bytes([b[0], b[1]]) as usize,
            None => return Err(PdfMergeError::embed("truncated JPEG segment length")),
        };
        if len < 2 {
            return Err(PdfMergeError::embed("invalid JPEG segment length"));
        }

        // SOF0-SOF15 (DHT=C4, JPG=C8, DAC=CCを除く)
        if matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let Some(seg) = bytes.get(pos + 2..pos + 8) else {
                return Err(PdfMergeError::embed("truncated JPEG frame header"));
            };
            let bits_per_component = seg[0];
            let height = u16::from_be_bytes([seg[1], seg[2]]) as u32;
            let width = u16::from_be_bytes([seg[3], seg[4]]) as u32;
            let components = seg[5];
            if width == 0 || height == 0 {
                return Err(PdfMergeError::embed("JPEG has zero width or height"));
            }
            return Ok(JpegInfo {
                width,
                height,
                components,
                bits_per_component,
            });
        }

        pos += len;
    }
}
