pub mod job;
pub mod merged;
pub mod settings;

use std::path::Path;

use settings::Settings;

/// ジョブファイルの隣に置く設定ファイル名（先に見つかった方を使う）
const SETTINGS_FILE_NAMES: [&str; 2] = ["settings.yaml", "settings.yml"];

/// ジョブファイルと同じディレクトリの設定ファイルを読み込む。
///
/// 設定ファイルが無ければデフォルト設定を返す。
pub fn load_settings_for_job(job_file_path: &Path) -> crate::error::Result<Settings> {
    let dir = job_file_path.parent().ok_or_else(|| {
        crate::error::PdfMergeError::config(format!(
            "cannot determine directory of job file {}",
            job_file_path.display()
        ))
    })?;

    match SETTINGS_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
    {
        Some(path) => {
            tracing::debug!(settings = %path.display(), "settings file found");
            Settings::from_file(&path)
        }
        None => Ok(Settings::default()),
    }
}
