// コーデック判定: 先頭のマジックバイトからPNG/JPEGを識別する

use std::fmt;

const PNG_SIGNATURE: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// マジックバイトから判定した画像コーデック。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    Png,
    Jpeg,
    Unknown,
}

impl fmt::Display for ImageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageCodec::Png => "PNG",
            ImageCodec::Jpeg => "JPEG",
            ImageCodec::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// バイト列の先頭を見てコーデックを判定する。
///
/// 4バイト未満の入力は常に `Unknown`。
pub fn classify(bytes: &[u8]) -> ImageCodec {
    if bytes.len() < PNG_SIGNATURE.len() {
        return ImageCodec::Unknown;
    }
    if bytes[..4] == PNG_SIGNATURE {
        ImageCodec::Png
    } else if bytes[..2] == JPEG_SOI {
        ImageCodec::Jpeg
    } else {
        ImageCodec::Unknown
    }
}
