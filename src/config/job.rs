use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub output: String,
    #[serde(deserialize_with = "deserialize_inputs")]
    pub inputs: Vec<String>,
    pub compression: Option<CompressionPolicy>,
    pub parallel_workers: Option<usize>,
}

/// 画像入力に一律で適用するサイズ/画質のトレードオフ。
///
/// PDF入力のページはこの設定の影響を受けない（元のコンテンツをそのまま埋め込む）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionPolicy {
    /// 再エンコードなし。PNG/JPEGの原本はバイト列をそのまま使う。
    None,
    /// 長辺2500px、JPEG品質75。
    #[default]
    Normal,
    /// 長辺1500px、JPEG品質50。
    High,
}

impl CompressionPolicy {
    /// 長辺の上限ピクセル数（`None` は上限なし）。
    pub fn max_edge(self) -> Option<u32> {
        match self {
            CompressionPolicy::None => None,
            CompressionPolicy::Normal => Some(2500),
            CompressionPolicy::High => Some(1500),
        }
    }

    /// 再エンコード時のJPEG品質。`None` ならPNGで再エンコードする。
    pub fn jpeg_quality(self) -> Option<u8> {
        match self {
            CompressionPolicy::None => None,
            CompressionPolicy::Normal => Some(75),
            CompressionPolicy::High => Some(50),
        }
    }
}

impl fmt::Display for CompressionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionPolicy::None => "none",
            CompressionPolicy::Normal => "normal",
            CompressionPolicy::High => "high",
        };
        f.write_str(name)
    }
}

/// serdeのdeserialize_withで使用する入力リストのデシリアライザ（空リストは拒否）
fn deserialize_inputs<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let inputs = Vec::<String>::deserialize(deserializer)?;
    if inputs.is_empty() {
        return Err(serde::de::Error::custom("job must list at least one input"));
    }
    if let Some(blank) = inputs.iter().position(|s| s.trim().is_empty()) {
        return Err(serde::de::Error::custom(format!(
            "input #{} is an empty path",
            blank + 1
        )));
    }
    Ok(inputs)
}
