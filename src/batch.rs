use crate::confirm::{AutoAnswer, OverwritePolicy};
use crate::constants::DEFAULT_BATCH_DIR;
use crate::error::{CompressionError, Result};
use crate::formats::{align_extension, OutputFormat};
use crate::logger::is_quiet;
use crate::processing::{run_with_progress, CompressionResult, JobStatus, RunOptions};
use crate::report;
use crate::utils::{create_progress_bar, is_image_file, print_batch_summary, result_line};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use walkdir::{DirEntry, WalkDir};

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total_files: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Overall saving in percent, `None` when nothing was compressed.
    pub fn compression_ratio(&self) -> Option<f64> {
        if self.succeeded == 0 || self.total_original_bytes == 0 {
            return None;
        }
        let original = self.total_original_bytes as f64;
        Some((original - self.total_compressed_bytes as f64) / original * 100.0)
    }

    pub fn saved_bytes(&self) -> i64 {
        self.total_original_bytes as i64 - self.total_compressed_bytes as i64
    }

    pub fn files_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (self.total_files > 0 && secs > 0.0).then(|| self.total_files as f64 / secs)
    }
}

/// Thread-safe counters filled in as jobs finish.
#[derive(Debug, Default)]
struct BatchTally {
    succeeded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    original_bytes: AtomicU64,
    compressed_bytes: AtomicU64,
}

impl BatchTally {
    fn record(&self, result: &CompressionResult) {
        match result.status {
            JobStatus::Compressed => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                self.original_bytes
                    .fetch_add(result.original_size, Ordering::Relaxed);
                self.compressed_bytes
                    .fetch_add(result.compressed_size, Ordering::Relaxed);
            }
            JobStatus::Skipped => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            JobStatus::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn finish(self, total_files: usize, elapsed: Duration) -> BatchSummary {
        BatchSummary {
            total_files,
            succeeded: self.succeeded.into_inner(),
            skipped: self.skipped.into_inner(),
            failed: self.failed.into_inner(),
            total_original_bytes: self.original_bytes.into_inner(),
            total_compressed_bytes: self.compressed_bytes.into_inner(),
            elapsed,
        }
    }
}

/// Where a batch writes when no output directory is given.
pub fn default_output_dir(input_dir: &Path) -> PathBuf {
    input_dir.join(DEFAULT_BATCH_DIR)
}

/// Number of workers for a `--jobs` value; zero means one per CPU.
pub fn worker_count(jobs: usize) -> usize {
    if jobs == 0 {
        num_cpus::get()
    } else {
        jobs
    }
}

/// Compress every image under `input_dir` into `output_dir`.
///
/// Per-file failures are counted, never propagated. The only errors are an
/// invalid input directory, a failed directory walk, or an unusable output
/// directory.
pub fn run_batch(
    input_dir: &Path,
    output_dir: Option<&Path>,
    recursive: bool,
    jobs: usize,
    options: &RunOptions,
    policy: &dyn OverwritePolicy,
) -> Result<BatchSummary> {
    if !input_dir.is_dir() {
        return Err(CompressionError::InvalidInputDirectory(input_dir.to_path_buf()));
    }
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(input_dir));

    report!("🚀 Starting batch compression...");
    report!("📁 Input: {}", input_dir.display());
    report!("📁 Output: {}", output_dir.display());

    let start_time = Instant::now();
    let image_files = collect_image_files(input_dir, recursive, &output_dir)?;
    let total_files = image_files.len();

    if total_files == 0 {
        warn!("No image files found in {}", input_dir.display());
        let summary = BatchSummary {
            elapsed: start_time.elapsed(),
            ..BatchSummary::default()
        };
        print_batch_summary(&summary);
        return Ok(summary);
    }

    report!("📊 Found {} image files to process", total_files);

    fs::create_dir_all(&output_dir)
        .map_err(|_| CompressionError::DirectoryCreationFailed(output_dir.clone()))?;

    let workers = worker_count(jobs).min(total_files);
    let progress = create_progress_bar(total_files as u64);
    let tally = BatchTally::default();

    let process = |input_path: &PathBuf, policy: &dyn OverwritePolicy| {
        let target = output_path_for(input_dir, input_path, &output_dir, recursive, options.format);
        let result = run_with_progress(input_path, Some(&target), options, policy, &progress);
        tally.record(&result);
        report_result(&progress, &result);
        progress.inc(1);
    };

    if workers > 1 {
        report!("⚙️  Using {} parallel workers", workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| {
                CompressionError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
            })?;
        // Nobody can answer interleaved prompts
        let auto_skip: &dyn OverwritePolicy = &AutoAnswer(false);
        pool.install(|| {
            image_files
                .par_iter()
                .for_each(|input_path| process(input_path, auto_skip))
        });
    } else {
        for input_path in &image_files {
            process(input_path, policy);
        }
    }

    progress.finish_and_clear();

    let summary = tally.finish(total_files, start_time.elapsed());
    print_batch_summary(&summary);
    Ok(summary)
}

fn report_result(progress: &ProgressBar, result: &CompressionResult) {
    if let Some(detail) = &result.error_detail {
        progress.suspend(|| {
            error!("Failed to process {}: {}", result.input_path.display(), detail)
        });
        return;
    }
    if !is_quiet() {
        let line = result_line(result);
        progress.suspend(|| println!("{}", line));
    }
}

/// Candidate files in name order. `exclude` (usually the output directory)
/// is never descended into.
pub fn collect_image_files(
    input_dir: &Path,
    recursive: bool,
    exclude: &Path,
) -> Result<Vec<PathBuf>> {
    let excluded = exclude.canonicalize().ok();
    let walker = WalkDir::new(input_dir).sort_by_file_name();
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut image_files = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, excluded.as_deref()))
    {
        let entry = entry?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            image_files.push(entry.into_path());
        }
    }

    debug!("discovered {} candidates under {}", image_files.len(), input_dir.display());
    Ok(image_files)
}

fn is_excluded_dir(entry: &DirEntry, excluded: Option<&Path>) -> bool {
    match excluded {
        Some(excluded) if entry.depth() > 0 && entry.file_type().is_dir() => entry
            .path()
            .canonicalize()
            .map(|p| p == excluded)
            .unwrap_or(false),
        _ => false,
    }
}

/// Output location for one discovered file.
///
/// Recursive runs mirror the path relative to `input_dir`; flat runs keep
/// only the file name. An explicit format replaces the extension.
pub fn output_path_for(
    input_dir: &Path,
    input_path: &Path,
    output_dir: &Path,
    recursive: bool,
    format: Option<OutputFormat>,
) -> PathBuf {
    let file_name = Path::new(input_path.file_name().unwrap_or_default());
    let relative = if recursive {
        input_path.strip_prefix(input_dir).unwrap_or(file_name)
    } else {
        file_name
    };

    let target = output_dir.join(relative);
    match format {
        Some(format) => align_extension(&target, format),
        None => target,
    }
}
