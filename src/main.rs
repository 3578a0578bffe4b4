use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pdf_merge::config::job::{Job, JobFile};
use pdf_merge::config::merged::MergedConfig;
use pdf_merge::config::{self};
use pdf_merge::pipeline::orchestrator::merge;
use pdf_merge::pipeline::progress::LogProgress;
use pdf_merge::source::InputDescriptor;
use pdf_merge::source::convert::{CommandConverter, convert_inputs};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: pdf_merge <jobs.yaml>...");
        eprintln!("  Merge PDFs, images and office documents into one PDF per job.");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("pdf_merge {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let mut has_error = false;

    for job_file_arg in &args {
        let job_file_path = Path::new(job_file_arg);

        // Load settings from the same directory as the job file.
        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                has_error = true;
                continue;
            }
        };

        let yaml_content = match std::fs::read_to_string(job_file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read job file {job_file_arg}: {e}");
                has_error = true;
                continue;
            }
        };

        let job_file: JobFile = match serde_yml::from_str(&yaml_content) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to parse job file {job_file_arg}: {e}");
                has_error = true;
                continue;
            }
        };

        // Resolve job file directory for relative paths.
        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        // One failed job does not stop the others.
        for job in &job_file.jobs {
            let merged = MergedConfig::new(&settings, job);
            let output_path = resolve_path(&job_dir, &job.output);

            match run_job(&job_dir, job, &merged, &output_path) {
                Ok(input_count) => {
                    eprintln!("OK: {} ({input_count} inputs)", output_path.display());
                }
                Err(e) => {
                    eprintln!("ERROR: {}: {e}", output_path.display());
                    has_error = true;
                }
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Build descriptors for a job, run external converters, merge and write the output.
fn run_job(
    job_dir: &Path,
    job: &Job,
    merged: &MergedConfig,
    output_path: &Path,
) -> pdf_merge::Result<usize> {
    let inputs = job
        .inputs
        .iter()
        .map(|input| InputDescriptor::from_path(resolve_path(job_dir, input)))
        .collect::<pdf_merge::Result<Vec<_>>>()?;

    let converter = CommandConverter::new(&merged.office_command, &merged.heic_command);
    let inputs = convert_inputs(inputs, &converter, &converter)?;

    let pdf_bytes = merge(&inputs, &merged.merge_options(), &mut LogProgress)?;
    std::fs::write(output_path, pdf_bytes)?;

    Ok(inputs.len())
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
