//! Utility functions for common operations
//!
//! Size formatting, ratio arithmetic, progress widgets and the human-facing
//! result printers shared by single-file and batch mode.

use crate::batch::BatchSummary;
use crate::constants::{
    COMPRESSED_SIZE_PREFIX, COMPRESSION_RATIO_PREFIX, ERROR_PREFIX, ORIGINAL_SIZE_PREFIX,
    PROGRESS_BAR_TEMPLATE, PROGRESS_SPINNER_TEMPLATE, SKIP_PREFIX, SPINNER_TICK_MS,
    SUCCESS_PREFIX, SUPPORTED_IMAGE_EXTENSIONS,
};
use crate::logger::is_quiet;
use crate::processing::{CompressionResult, JobStatus};
use crate::report;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Check if a file path carries one of the discoverable image extensions
///
/// # Arguments
/// * `path` - The file path to check
///
/// # Returns
/// * `true` if the extension matches case-insensitively, `false` otherwise
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Create a steadily ticking spinner, or a hidden one in quiet mode
///
/// # Arguments
/// * `message` - Initial message to display
pub fn create_progress_spinner(message: &str) -> ProgressBar {
    if is_quiet() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(PROGRESS_SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

pub fn create_progress_bar(len: u64) -> ProgressBar {
    if is_quiet() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Format file size in human-readable format
///
/// # Arguments
/// * `bytes` - Size in bytes
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 B")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Calculate compression ratio as a percentage
///
/// Positive means the file shrank, negative means it grew.
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    ((original_size as f64 - compressed_size as f64) / original_size as f64) * 100.0
}

/// One line per job, as shown under the batch progress bar
pub fn result_line(result: &CompressionResult) -> String {
    let name = result
        .input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| result.input_path.display().to_string());

    match result.status {
        JobStatus::Compressed => format!(
            "{} {} → {} ({} → {}, {:.1}%, {:.2}s)",
            SUCCESS_PREFIX,
            name,
            result.output_display(),
            format_file_size(result.original_size),
            format_file_size(result.compressed_size),
            result.compression_ratio(),
            result.elapsed.as_secs_f64()
        ),
        JobStatus::Skipped => format!(
            "{} {} skipped, {} already exists",
            SKIP_PREFIX,
            name,
            result.output_display()
        ),
        JobStatus::Failed => format!(
            "{} {}: {}",
            ERROR_PREFIX,
            name,
            result.error_detail.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Detailed report for a single-file run. Failures are reported by the caller.
pub fn print_compression_result(result: &CompressionResult) {
    match result.status {
        JobStatus::Compressed => {
            let ratio = result.compression_ratio();
            report!(
                "{} {} ({})",
                ORIGINAL_SIZE_PREFIX,
                result.original_size,
                format_file_size(result.original_size)
            );
            report!(
                "{} {} ({})",
                COMPRESSED_SIZE_PREFIX,
                result.compressed_size,
                format_file_size(result.compressed_size)
            );
            report!("{} {:.1}%", COMPRESSION_RATIO_PREFIX, ratio);

            if ratio > 0.0 {
                report!("{} Successfully reduced file size by {:.1}%", SUCCESS_PREFIX, ratio);
            } else {
                report!("⚠️  File size increased by {:.1}%", ratio.abs());
            }
            report!(
                "📁 Saved to {} in {:.2}s",
                result.output_display(),
                result.elapsed.as_secs_f64()
            );
        }
        JobStatus::Skipped => report!("{}", result_line(result)),
        JobStatus::Failed => {}
    }
}

/// The final batch tally. Printed even in quiet mode.
pub fn print_batch_summary(summary: &BatchSummary) {
    println!("\n📊 Batch Compression Summary:");
    println!("  📁 Total files: {}", summary.total_files);
    println!("  {} Succeeded: {}", SUCCESS_PREFIX, summary.succeeded);
    println!("  {} Skipped: {}", SKIP_PREFIX, summary.skipped);
    println!("  {} Failed: {}", ERROR_PREFIX, summary.failed);
    println!(
        "  📊 Total original size: {}",
        format_file_size(summary.total_original_bytes)
    );
    println!(
        "  📊 Total compressed size: {}",
        format_file_size(summary.total_compressed_bytes)
    );

    match summary.compression_ratio() {
        Some(ratio) => {
            let saved = summary.saved_bytes();
            if saved >= 0 {
                println!("  💾 Saved: {}", format_file_size(saved as u64));
            } else {
                println!("  💾 Grew by: {}", format_file_size(saved.unsigned_abs()));
            }
            println!("  🎯 Overall compression ratio: {:.1}%", ratio);
        }
        None => println!("  🎯 Overall compression ratio: n/a"),
    }

    println!("  ⏱️  Total time: {:.2}s", summary.elapsed.as_secs_f64());
    if let Some(rate) = summary.files_per_second() {
        println!("  ⚡ Average speed: {:.2} files/second", rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn result(status: JobStatus) -> CompressionResult {
        CompressionResult {
            input_path: PathBuf::from("in/photo.jpg"),
            output_path: Some(PathBuf::from("out/photo.jpg")),
            original_size: 2048,
            compressed_size: 1024,
            elapsed: Duration::from_millis(250),
            status,
            error_detail: None,
        }
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("test.jpg")));
        assert!(is_image_file(Path::new("test.JPEG")));
        assert!(is_image_file(Path::new("test.png")));
        assert!(is_image_file(Path::new("test.webp")));
        assert!(is_image_file(Path::new("test.bmp")));
        assert!(is_image_file(Path::new("test.Tiff")));

        assert!(!is_image_file(Path::new("test.gif")));
        assert!(!is_image_file(Path::new("test.tif")));
        assert!(!is_image_file(Path::new("test.txt")));
        assert!(!is_image_file(Path::new("test")));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_file_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_calculate_compression_ratio() {
        assert_eq!(calculate_compression_ratio(1000, 800), 20.0);
        assert_eq!(calculate_compression_ratio(1000, 1200), -20.0);
        assert_eq!(calculate_compression_ratio(1000, 1000), 0.0);
        assert_eq!(calculate_compression_ratio(0, 500), 0.0);
    }

    #[test]
    fn test_result_line() {
        let line = result_line(&result(JobStatus::Compressed));
        assert!(line.contains("photo.jpg"));
        assert!(line.contains("2.0 KB → 1.0 KB"));
        assert!(line.contains("50.0%"));

        let line = result_line(&result(JobStatus::Skipped));
        assert!(line.contains("skipped"));

        let mut failed = result(JobStatus::Failed);
        failed.error_detail = Some("boom".to_string());
        assert!(result_line(&failed).ends_with("photo.jpg: boom"));
    }
}
