pub mod encode;
pub mod normalize;
pub mod sniff;

use std::fmt;

/// 正規化後のラスタが持つコーデック。埋め込み時に参照する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterCodec {
    Png,
    Jpeg,
}

impl RasterCodec {
    /// 埋め込み失敗時に一度だけ試す反対側のコーデック。
    pub fn opposite(self) -> Self {
        match self {
            RasterCodec::Png => RasterCodec::Jpeg,
            RasterCodec::Jpeg => RasterCodec::Png,
        }
    }
}

impl fmt::Display for RasterCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterCodec::Png => f.write_str("PNG"),
            RasterCodec::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// 圧縮ポリシー適用後の画像バイト列。
#[derive(Debug, Clone)]
pub struct NormalizedRaster {
    pub bytes: Vec<u8>,
    pub codec: RasterCodec,
}

/// 画像バイト列の出所。事前変換済みのものは高速パスの対象外。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOrigin {
    /// アップロードされた元ファイル
    Original,
    /// 外部変換器（Office描画、HEICデコード）の出力
    PreConverted,
}
