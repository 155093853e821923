pub const DEFAULT_QUALITY: u8 = 85;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

pub const FAST_QUALITY_STEP: u8 = 10;
pub const FAST_QUALITY_FLOOR: u8 = 70;
pub const QUALITY_PRESET_STEP: u8 = 5;
pub const QUALITY_PRESET_CEILING: u8 = 95;

/// Deflate level used when `optimize` is off. Zero means stored blocks.
pub const PNG_BASE_DEFLATE_LEVEL: u8 = 0;
pub const PNG_OPTIMIZE_DEFLATE_LEVEL: u8 = 12;
pub const PNG_OPTIMIZE_PRESET: u8 = 2;

pub const WEBP_METHOD: i32 = 6;

pub const JPEG_BACKGROUND: [u8; 3] = [255, 255, 255];

pub const COMPRESSED_PREFIX: &str = "compressed_";
pub const DEFAULT_BATCH_DIR: &str = "compressed";

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

pub const PROGRESS_SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
pub const SPINNER_TICK_MS: u64 = 100;

// Common output message prefixes
pub const ORIGINAL_SIZE_PREFIX: &str = "📊 Original size:";
pub const COMPRESSED_SIZE_PREFIX: &str = "📈 Compressed size:";
pub const COMPRESSION_RATIO_PREFIX: &str = "🎯 Compression ratio:";
pub const SUCCESS_PREFIX: &str = "✅";
pub const SKIP_PREFIX: &str = "⏭️ ";
pub const ERROR_PREFIX: &str = "❌";
