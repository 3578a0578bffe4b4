pub mod adapter;
pub mod convert;

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::PdfMergeError;

/// Office文書の種別（外部レンダラに渡す形式）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeFormat {
    Docx,
    Xlsx,
}

/// 入力の種別。処理の振り分けはこの列挙で網羅的に行う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
    /// 外部レンダラでラスタ化が必要なOffice文書
    OfficeLike(OfficeFormat),
    /// 外部コーデックでJPEGへの変換が必要な画像（HEIC/HEIF）
    ConvertedRaster,
}

impl InputKind {
    /// 拡張子から種別を判定する（大文字小文字は区別しない）。
    pub fn from_extension(ext: &str) -> Option<Self> {
        let kind = match ext.to_ascii_lowercase().as_str() {
            "pdf" => InputKind::Pdf,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tif" | "tiff" => InputKind::Image,
            "heic" | "heif" => InputKind::ConvertedRaster,
            "doc" | "docx" | "odt" | "rtf" => InputKind::OfficeLike(OfficeFormat::Docx),
            "xls" | "xlsx" | "ods" | "csv" => InputKind::OfficeLike(OfficeFormat::Xlsx),
            _ => return None,
        };
        Some(kind)
    }

    /// ファイルパスの拡張子から種別を判定する。
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                PdfMergeError::config(format!(
                    "cannot determine input kind from file name: {}",
                    path.display()
                ))
            })
    }

    /// マージ前に外部変換が必要な種別か。
    pub fn requires_conversion(self) -> bool {
        matches!(self, InputKind::OfficeLike(_) | InputKind::ConvertedRaster)
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputKind::Pdf => "pdf",
            InputKind::Image => "image",
            InputKind::OfficeLike(OfficeFormat::Docx) => "docx-like",
            InputKind::OfficeLike(OfficeFormat::Xlsx) => "xlsx-like",
            InputKind::ConvertedRaster => "heic",
        };
        f.write_str(name)
    }
}

/// 入力ファイルのバイト列の取得元。ファイルは読み込み時に初めて読む。
#[derive(Debug, Clone)]
pub enum ByteSource {
    Memory(Vec<u8>),
    File(PathBuf),
}

impl ByteSource {
    pub fn read(&self) -> crate::error::Result<Cow<'_, [u8]>> {
        match self {
            ByteSource::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
            ByteSource::File(path) => Ok(Cow::Owned(std::fs::read(path)?)),
        }
    }
}

/// マージ対象の入力1件。マージ中は変更されない。
#[derive(Debug, Clone)]
pub struct InputDescriptor {
    /// 呼び出し側の識別子。ログの `id` フィールドに出る。
    pub id: String,
    pub display_name: String,
    pub kind: InputKind,
    pub source: ByteSource,
    /// 外部変換器が生成したラスタ（Office描画結果、HEIC→JPEG）
    pub converted: Option<Vec<u8>>,
}

impl InputDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        kind: InputKind,
        source: ByteSource,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
            source,
            converted: None,
        }
    }

    /// メモリ上のバイト列から作成する。IDは表示名と同じ。
    pub fn from_bytes(display_name: impl Into<String>, kind: InputKind, bytes: Vec<u8>) -> Self {
        let name = display_name.into();
        Self::new(name.clone(), name, kind, ByteSource::Memory(bytes))
    }

    /// ファイルパスから作成する。種別は拡張子から判定し、内容は遅延読み込み。
    pub fn from_path(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let kind = InputKind::from_path(path)?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(
            path.display().to_string(),
            display_name,
            kind,
            ByteSource::File(path.to_path_buf()),
        ))
    }

    /// 事前変換済みラスタを付けたコピーを返す。
    pub fn with_converted(mut self, bytes: Vec<u8>) -> Self {
        self.converted = Some(bytes);
        self
    }

    /// 外部変換が必要で、まだ変換結果を持っていないか。
    pub fn needs_conversion(&self) -> bool {
        self.kind.requires_conversion() && self.converted.is_none()
    }
}
