//! Image format utilities and type-safe format handling
//!
//! Output formats form a closed set. Detection follows a fixed precedence:
//! an explicit format flag, then the input file extension, then a probe of
//! the file header. Anything else ends in [`DetectedFormat::Unknown`].

use crate::error::{CompressionError, Result};
use image::ImageFormat;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Number of leading bytes read when probing a file header
const PROBE_LEN: usize = 32;

/// Supported output image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// JPEG format with lossy compression
    Jpeg,
    /// PNG format with lossless compression
    Png,
    /// WebP format, lossy only
    WebP,
}

impl OutputFormat {
    /// Returns the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::WebP => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    /// Maps a bare extension (no dot, any case) to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::WebP => "WebP",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormat {
    type Err = CompressionError;

    /// Accepts `jpg`, `jpeg`, `png`, `webp`, with or without a leading dot.
    fn from_str(s: &str) -> Result<Self> {
        OutputFormat::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| CompressionError::UnsupportedFormat(s.to_string()))
    }
}

/// Which of the three detection paths produced the format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSource {
    Flag,
    Extension,
    Probe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedFormat {
    Known(OutputFormat, FormatSource),
    /// Nothing usable was found; carries a description for the error message.
    Unknown(String),
}

impl DetectedFormat {
    pub fn into_result(self) -> Result<(OutputFormat, FormatSource)> {
        match self {
            DetectedFormat::Known(format, source) => Ok((format, source)),
            DetectedFormat::Unknown(what) => Err(CompressionError::UnsupportedFormat(what)),
        }
    }
}

/// Determine the output format for `input`.
///
/// The explicit flag wins, then the input extension. Only when neither
/// applies is the file opened and its header probed.
pub fn detect_format(
    input: &Path,
    format_override: Option<OutputFormat>,
) -> Result<DetectedFormat> {
    if let Some(format) = format_override {
        return Ok(DetectedFormat::Known(format, FormatSource::Flag));
    }

    if let Some(format) = input
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputFormat::from_extension)
    {
        return Ok(DetectedFormat::Known(format, FormatSource::Extension));
    }

    let mut header = Vec::with_capacity(PROBE_LEN);
    File::open(input)?
        .take(PROBE_LEN as u64)
        .read_to_end(&mut header)?;

    Ok(probe_header(&header))
}

/// Classify raw leading bytes of an image file.
pub fn probe_header(header: &[u8]) -> DetectedFormat {
    match image::guess_format(header) {
        Ok(format) => match OutputFormat::from_image_format(format) {
            Some(output) => DetectedFormat::Known(output, FormatSource::Probe),
            None => DetectedFormat::Unknown(format!("{:?}", format)),
        },
        Err(_) => DetectedFormat::Unknown("unrecognized image header".to_string()),
    }
}

/// Replace the extension of `path` unless it already names `format`.
///
/// `photo.jpeg` stays `photo.jpeg` for JPEG output, `scan.tiff` becomes
/// `scan.png` for PNG output.
pub fn align_extension(path: &Path, format: OutputFormat) -> PathBuf {
    let matches = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputFormat::from_extension)
        == Some(format);

    if matches {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("jpeg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_str("jpg").unwrap(), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::from_str("PNG").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::from_str(".webp").unwrap(), OutputFormat::WebP);

        assert!(matches!(
            OutputFormat::from_str("gif"),
            Err(CompressionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::WebP.extension(), "webp");
    }

    #[test]
    fn test_flag_beats_extension() {
        let detected = detect_format(Path::new("photo.jpg"), Some(OutputFormat::WebP)).unwrap();
        assert_eq!(
            detected,
            DetectedFormat::Known(OutputFormat::WebP, FormatSource::Flag)
        );
    }

    #[test]
    fn test_extension_without_touching_file() {
        // The file does not exist: extension detection must not open it.
        let detected = detect_format(Path::new("missing/photo.PNG"), None).unwrap();
        assert_eq!(
            detected,
            DetectedFormat::Known(OutputFormat::Png, FormatSource::Extension)
        );
    }

    #[test]
    fn test_probe_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mystery.tiff");
        fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();

        let detected = detect_format(&path, None).unwrap();
        assert_eq!(
            detected,
            DetectedFormat::Known(OutputFormat::Png, FormatSource::Probe)
        );
    }

    #[test]
    fn test_probe_unknown_is_terminal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.bmp");
        fs::write(&path, b"definitely not an image").unwrap();

        let detected = detect_format(&path, None).unwrap();
        assert!(matches!(detected, DetectedFormat::Unknown(_)));
        assert!(matches!(
            detected.into_result(),
            Err(CompressionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_probe_bmp_is_unsupported_output() {
        assert!(matches!(probe_header(b"BM\0\0\0\0\0\0"), DetectedFormat::Unknown(_)));
    }

    #[test]
    fn test_align_extension() {
        assert_eq!(
            align_extension(Path::new("a/photo.jpeg"), OutputFormat::Jpeg),
            PathBuf::from("a/photo.jpeg")
        );
        assert_eq!(
            align_extension(Path::new("a/scan.tiff"), OutputFormat::Png),
            PathBuf::from("a/scan.png")
        );
        assert_eq!(
            align_extension(Path::new("a/photo.png"), OutputFormat::WebP),
            PathBuf::from("a/photo.webp")
        );
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(format!("{}", OutputFormat::Jpeg), "JPEG");
        assert_eq!(format!("{}", OutputFormat::Png), "PNG");
        assert_eq!(format!("{}", OutputFormat::WebP), "WebP");
    }
}
