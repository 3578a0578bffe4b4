use super::job::{CompressionPolicy, Job};
use super::settings::Settings;
use crate::pipeline::orchestrator::MergeOptions;

#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub compression: CompressionPolicy,
    pub parallel_workers: usize,
    pub office_command: String,
    pub heic_command: String,
}

impl MergedConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    pub fn new(settings: &Settings, job: &Job) -> Self {
        MergedConfig {
            compression: job.compression.unwrap_or(settings.compression),
            parallel_workers: job.parallel_workers.unwrap_or(settings.parallel_workers),
            office_command: settings.office_command.clone(),
            heic_command: settings.heic_command.clone(),
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            compression: self.compression,
            parallel_workers: self.parallel_workers,
        }
    }
}
