// 画像正規化: 圧縮ポリシーに従ってデコード → 縮小 → 白背景合成 → 再エンコード

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tracing::{debug, instrument};

use crate::config::job::CompressionPolicy;
use crate::error::PdfMergeError;
use crate::raster::encode::{encode_rgb_to_jpeg, encode_rgb_to_png};
use crate::raster::sniff::{ImageCodec, classify};
use crate::raster::{NormalizedRaster, RasterCodec, RasterOrigin};

/// 画像バイト列をポリシーに従って正規化する。
///
/// ポリシーが `None` で、元ファイルのPNG/JPEGであればデコードせずにそのまま返す。
/// それ以外はデコードし、長辺を上限まで縮小、白背景に合成して再エンコードする。
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn normalize(
    bytes: &[u8],
    origin: RasterOrigin,
    policy: CompressionPolicy,
) -> crate::error::Result<NormalizedRaster> {
    let sniffed = classify(bytes);

    if policy == CompressionPolicy::None && origin == RasterOrigin::Original {
        let passthrough = match sniffed {
            ImageCodec::Png => Some(RasterCodec::Png),
            ImageCodec::Jpeg => Some(RasterCodec::Jpeg),
            ImageCodec::Unknown => None,
        };
        if let Some(codec) = passthrough {
            debug!(%codec, "original bytes kept");
            return Ok(NormalizedRaster {
                bytes: bytes.to_vec(),
                codec,
            });
        }
    }

    let decoded = image::load_from_memory(bytes).map_err(|e| {
        PdfMergeError::decode(format!("failed to decode {sniffed} image: {e}"))
    })?;

    let (src_w, src_h) = (decoded.width(), decoded.height());
    let (dst_w, dst_h) = fit_within(src_w, src_h, policy.max_edge());
    let resized = if (dst_w, dst_h) == (src_w, src_h) {
        decoded
    } else {
        decoded.resize_exact(dst_w, dst_h, FilterType::Lanczos3)
    };
    debug!(src_w, src_h, dst_w, dst_h, "image resized");

    let flattened = flatten_onto_white(&resized);

    match policy.jpeg_quality() {
        Some(quality) => Ok(NormalizedRaster {
            bytes: encode_rgb_to_jpeg(&flattened, quality)?,
            codec: RasterCodec::Jpeg,
        }),
        None => Ok(NormalizedRaster {
            bytes: encode_rgb_to_png(&flattened)?,
            codec: RasterCodec::Png,
        }),
    }
}

/// 長辺が `max_edge` を超えないよう、縦横比を保って縮小後の寸法を求める。
///
/// 上限内であれば寸法は変えない（拡大はしない）。各辺は最低1px。
pub fn fit_within(width: u32, height: u32, max_edge: Option<u32>) -> (u32, u32) {
    let Some(cap) = max_edge else {
        return (width, height);
    };
    let longer = width.max(height);
    if longer <= cap {
        return (width, height);
    }

    let scale = cap as f64 / longer as f64;
    let fit = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, cap);
    (fit(width), fit(height))
}

/// 不透明な白背景の上に画像を合成してRGBに落とす。
///
/// 透過部分をそのままRGBに変換すると黒になるため、アルファで白とブレンドする。
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}
