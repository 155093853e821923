pub mod batch;
pub mod cli;
pub mod confirm;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod formats;
pub mod logger;
pub mod metadata;
pub mod preset;
pub mod processing;
pub mod utils;

pub use batch::{collect_image_files, output_path_for, run_batch, BatchSummary};
pub use confirm::{AutoAnswer, OverwritePolicy, PromptOnStdin};
pub use encoder::{decode, DecodedImage, FormatEncoder, PixelMode};
pub use error::{CompressionError, Result};
pub use formats::{detect_format, DetectedFormat, FormatSource, OutputFormat};
pub use metadata::{Metadata, MetadataValue};
pub use preset::{resolve, CompressionParams, CompressionPreset};
pub use processing::{compress_image, run, CompressionResult, JobStatus, RunOptions};
pub use utils::{calculate_compression_ratio, format_file_size, is_image_file};
