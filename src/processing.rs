use crate::confirm::OverwritePolicy;
use crate::constants::COMPRESSED_PREFIX;
use crate::encoder::{self, FormatEncoder, JpegEncoder, PngEncoder, WebpEncoder};
use crate::error::{CompressionError, Result};
use crate::formats::{align_extension, detect_format, FormatSource, OutputFormat};
use crate::metadata;
use crate::preset::CompressionParams;
use crate::report;
use crate::utils::{calculate_compression_ratio, create_progress_spinner, print_compression_result};
use img_parts::Bytes;
use indicatif::ProgressBar;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Settings resolved once per invocation and shared by every job.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub params: CompressionParams,
    /// Forced output format; `None` keeps the input's own format
    pub format: Option<OutputFormat>,
    /// Replace existing outputs without asking
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Compressed,
    /// Output already existed and the overwrite was declined
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub original_size: u64,
    pub compressed_size: u64,
    pub elapsed: Duration,
    pub status: JobStatus,
    pub error_detail: Option<String>,
}

impl CompressionResult {
    pub fn success(&self) -> bool {
        self.status == JobStatus::Compressed
    }

    /// Percentage saved; negative when the output is larger.
    pub fn compression_ratio(&self) -> f64 {
        calculate_compression_ratio(self.original_size, self.compressed_size)
    }

    pub fn output_display(&self) -> String {
        self.output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

enum Outcome {
    Written {
        output: PathBuf,
        original_size: u64,
        compressed_size: u64,
    },
    Skipped(PathBuf),
}

/// `compressed_<name>` next to the input, carrying the output format's extension.
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sibling = input.with_file_name(format!("{}{}", COMPRESSED_PREFIX, name));
    align_extension(&sibling, format)
}

fn resolve_output_path(
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    source: FormatSource,
) -> PathBuf {
    match output {
        Some(path) if source == FormatSource::Probe => align_extension(path, format),
        Some(path) => path.to_path_buf(),
        None => default_output_path(input, format),
    }
}

/// Compress `input` without any visible progress.
pub fn run(
    input: &Path,
    output: Option<&Path>,
    options: &RunOptions,
    policy: &dyn OverwritePolicy,
) -> CompressionResult {
    run_with_progress(input, output, options, policy, &ProgressBar::hidden())
}

/// Compress `input`, reporting each stage on `progress`.
///
/// Never returns an error: failures become a [`JobStatus::Failed`] result
/// and leave no file at the output path.
pub fn run_with_progress(
    input: &Path,
    output: Option<&Path>,
    options: &RunOptions,
    policy: &dyn OverwritePolicy,
    progress: &ProgressBar,
) -> CompressionResult {
    let start = Instant::now();
    let outcome = execute(input, output, options, policy, progress);
    let elapsed = start.elapsed();

    let mut result = CompressionResult {
        input_path: input.to_path_buf(),
        output_path: None,
        original_size: 0,
        compressed_size: 0,
        elapsed,
        status: JobStatus::Failed,
        error_detail: None,
    };

    match outcome {
        Ok(Outcome::Written {
            output,
            original_size,
            compressed_size,
        }) => {
            debug!(
                "{} -> {}: {} -> {} bytes in {:?}",
                input.display(),
                output.display(),
                original_size,
                compressed_size,
                elapsed
            );
            result.output_path = Some(output);
            result.original_size = original_size;
            result.compressed_size = compressed_size;
            result.status = JobStatus::Compressed;
        }
        Ok(Outcome::Skipped(output)) => {
            debug!("{} skipped, {} kept", input.display(), output.display());
            result.output_path = Some(output);
            result.status = JobStatus::Skipped;
        }
        Err(e) => {
            result.error_detail = Some(e.to_string());
        }
    }

    result
}

fn execute(
    input: &Path,
    output: Option<&Path>,
    options: &RunOptions,
    policy: &dyn OverwritePolicy,
    progress: &ProgressBar,
) -> Result<Outcome> {
    if !input.is_file() {
        return Err(CompressionError::FileNotFound(input.to_path_buf()));
    }

    let (format, source) = detect_format(input, options.format)?.into_result()?;
    debug!("{}: {} output via {:?}", input.display(), format, source);
    let output = resolve_output_path(input, output, format, source);

    if output.exists()
        && !options.overwrite
        && !progress.suspend(|| policy.confirm_overwrite(&output))
    {
        return Ok(Outcome::Skipped(output));
    }

    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|_| CompressionError::DirectoryCreationFailed(parent.to_path_buf()))?;

    progress.set_message("Decoding image...");
    let data = Bytes::from(fs::read(input)?);
    let image = encoder::decode(&data)?;

    let encoder: &dyn FormatEncoder = match format {
        OutputFormat::Jpeg => &JpegEncoder,
        OutputFormat::Png => &PngEncoder,
        OutputFormat::WebP => &WebpEncoder,
    };

    progress.set_message(format!("Encoding {}...", encoder.format()));
    let encoded = encoder.encode(&image, &options.params)?;

    progress.set_message("Writing output...");
    let mut temp = tempfile::Builder::new()
        .prefix(".tiny-squeeze-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile_in(parent)?;
    temp.write_all(&encoded)?;
    temp.flush()?;

    if encoder.rewrites_exif() {
        if let Some(exif) = image.metadata.exif() {
            if let Err(e) = metadata::write_exif(temp.path(), exif) {
                warn!("EXIF not preserved for {}: {}", output.display(), e);
            }
        }
    }

    temp.persist(&output).map_err(|e| CompressionError::Io(e.error))?;

    Ok(Outcome::Written {
        original_size: fs::metadata(input)?.len(),
        compressed_size: fs::metadata(&output)?.len(),
        output,
    })
}

/// Single-file mode: spinner, job, report.
pub fn compress_image(
    input: &Path,
    output: Option<&Path>,
    options: &RunOptions,
    policy: &dyn OverwritePolicy,
) -> CompressionResult {
    report!("🗜️  Compressing image: {}", input.display());

    let spinner = create_progress_spinner("Loading image...");
    let result = run_with_progress(input, output, options, policy, &spinner);
    spinner.finish_and_clear();

    if let Some(detail) = &result.error_detail {
        error!("Failed to compress {}: {}", input.display(), detail);
    }
    print_compression_result(&result);
    result
}
