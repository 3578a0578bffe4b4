use std::path::Path;

use serde::Deserialize;

use super::job::CompressionPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compression: CompressionPolicy,
    /// 画像準備のワーカー数。0ならrayonのデフォルト。
    pub parallel_workers: usize,
    /// Office文書をPNGに変換する外部コマンド。
    pub office_command: String,
    /// HEIC/HEIFをJPEGに変換する外部コマンド。
    pub heic_command: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            compression: CompressionPolicy::Normal,
            parallel_workers: 0,
            office_command: "soffice".to_string(),
            heic_command: "heif-convert".to_string(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::PdfMergeError::config(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
