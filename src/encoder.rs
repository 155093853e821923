//! Format-specific encode strategies.
//!
//! Every strategy takes a [`DecodedImage`] and the run's
//! [`CompressionParams`] and returns the encoded file bytes with stage-one
//! metadata already embedded. Strategies that want the EXIF post-write pass
//! say so through [`FormatEncoder::rewrites_exif`].

use crate::constants::{
    JPEG_BACKGROUND, PNG_BASE_DEFLATE_LEVEL, PNG_OPTIMIZE_DEFLATE_LEVEL, PNG_OPTIMIZE_PRESET,
    WEBP_METHOD,
};
use crate::error::{CompressionError, Result};
use crate::formats::OutputFormat;
use crate::metadata::{self, Metadata};
use crate::preset::CompressionParams;
use image::codecs::png::{CompressionType, FilterType, PngEncoder as PngWriter};
use image::{ColorType, DynamicImage, GenericImageView, ImageReader, Rgba, RgbImage, RgbaImage};
use img_parts::Bytes;
use oxipng::{Deflaters, Options};
use std::io::Cursor;
use std::panic;
use tracing::{debug, warn};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const PNG_IHDR_COLOR_TYPE: usize = 25;
const PNG_COLOR_INDEXED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMode {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    /// Indexed colour in the source file; decoded pixels are already expanded
    Palette,
}

impl PixelMode {
    pub fn from_color(color: ColorType) -> Result<Self> {
        match color {
            ColorType::L8 | ColorType::L16 => Ok(PixelMode::Gray),
            ColorType::La8 | ColorType::La16 => Ok(PixelMode::GrayAlpha),
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => Ok(PixelMode::Rgb),
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => Ok(PixelMode::Rgba),
            other => Err(CompressionError::UnsupportedPixelMode(format!("{:?}", other))),
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, PixelMode::GrayAlpha | PixelMode::Rgba)
    }

    /// Alpha or palette sources need special handling in every strategy.
    pub fn needs_rgba(&self) -> bool {
        self.has_alpha() || *self == PixelMode::Palette
    }
}

/// A decoded source image and the metadata read from its container.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: DynamicImage,
    pub mode: PixelMode,
    pub metadata: Metadata,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Decodes `data`, guessing the codec from its header, and extracts metadata.
pub fn decode(data: &Bytes) -> Result<DecodedImage> {
    let pixels = ImageReader::new(Cursor::new(&data[..]))
        .with_guessed_format()?
        .decode()?;

    let mode = if is_indexed_png(data) {
        PixelMode::Palette
    } else {
        PixelMode::from_color(pixels.color())?
    };

    let metadata = metadata::extract(data);
    debug!(
        "decoded {}x{} image, mode {:?}, {} metadata entries",
        pixels.width(),
        pixels.height(),
        mode,
        metadata.len()
    );

    Ok(DecodedImage {
        pixels,
        mode,
        metadata,
    })
}

fn is_indexed_png(data: &[u8]) -> bool {
    data.starts_with(PNG_SIGNATURE)
        && data.get(PNG_IHDR_COLOR_TYPE) == Some(&PNG_COLOR_INDEXED)
}

pub trait FormatEncoder {
    fn format(&self) -> OutputFormat;

    fn encode(&self, image: &DecodedImage, params: &CompressionParams) -> Result<Vec<u8>>;

    /// Whether the job should force the source EXIF block onto the written file.
    fn rewrites_exif(&self) -> bool {
        false
    }
}

/// Stage-one embedding. A failure here costs metadata, never the image.
fn with_metadata(format: OutputFormat, encoded: Vec<u8>, image: &DecodedImage) -> Vec<u8> {
    match metadata::embed(format, &encoded, &image.metadata, image.dimensions()) {
        Ok(annotated) => annotated,
        Err(e) => {
            warn!("{} metadata not embedded: {}", format, e);
            encoded
        }
    }
}

/// Composites the image onto an opaque white canvas.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let [r, g, b] = JPEG_BACKGROUND;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
    image::imageops::overlay(&mut canvas, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

pub struct JpegEncoder;

impl JpegEncoder {
    fn rgb_pixels(image: &DecodedImage) -> RgbImage {
        if image.mode.needs_rgba() {
            flatten_onto_white(&image.pixels)
        } else {
            image.pixels.to_rgb8()
        }
    }
}

impl FormatEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(&self, image: &DecodedImage, params: &CompressionParams) -> Result<Vec<u8>> {
        let rgb = Self::rgb_pixels(image);
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let CompressionParams {
            quality,
            optimize,
            progressive,
        } = *params;
        let scanlines = rgb.as_raw();

        // mozjpeg reports fatal errors by unwinding
        let encoded = panic::catch_unwind(|| -> std::io::Result<Vec<u8>> {
            let mut compress = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
            compress.set_size(width, height);
            compress.set_quality(quality as f32);
            compress.set_optimize_coding(optimize);
            // clearing optimized scans also clears the scan script, so it
            // has to be settled before progression is chosen
            compress.set_optimize_scans(optimize && progressive);
            if progressive {
                compress.set_progressive_mode();
            }

            let mut started = compress.start_compress(Vec::new())?;
            started.write_scanlines(scanlines)?;
            started.finish()
        })
        .map_err(|_| CompressionError::encode("JPEG", "mozjpeg aborted the compression"))?
        .map_err(|e| CompressionError::encode("JPEG", e))?;

        Ok(with_metadata(OutputFormat::Jpeg, encoded, image))
    }

    fn rewrites_exif(&self) -> bool {
        true
    }
}

pub struct PngEncoder;

impl PngEncoder {
    /// Palette sources become RGBA. Float buffers are narrowed to 8 bits
    /// since PNG has no float sample type.
    fn png_pixels(image: &DecodedImage) -> DynamicImage {
        match (image.mode, image.pixels.color()) {
            (PixelMode::Palette, _) | (_, ColorType::Rgba32F) => {
                DynamicImage::ImageRgba8(image.pixels.to_rgba8())
            }
            (_, ColorType::Rgb32F) => DynamicImage::ImageRgb8(image.pixels.to_rgb8()),
            _ => image.pixels.clone(),
        }
    }

    /// Deflate level for the final IDAT stream.
    pub fn deflate_level(optimize: bool) -> u8 {
        if optimize {
            PNG_OPTIMIZE_DEFLATE_LEVEL
        } else {
            PNG_BASE_DEFLATE_LEVEL
        }
    }

    fn recompress(png: &[u8], optimize: bool) -> Result<Vec<u8>> {
        let mut options = Options::from_preset(if optimize { PNG_OPTIMIZE_PRESET } else { 0 });
        options.force = true;
        options.bit_depth_reduction = false;
        options.color_type_reduction = false;
        options.palette_reduction = false;
        options.grayscale_reduction = false;
        options.deflate = Deflaters::Libdeflater {
            compression: Self::deflate_level(optimize),
        };

        oxipng::optimize_from_memory(png, &options).map_err(|e| CompressionError::encode("PNG", e))
    }
}

impl FormatEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(&self, image: &DecodedImage, params: &CompressionParams) -> Result<Vec<u8>> {
        let pixels = Self::png_pixels(image);

        let mut raw = Vec::new();
        let writer =
            PngWriter::new_with_quality(&mut raw, CompressionType::Fast, FilterType::NoFilter);
        pixels
            .write_with_encoder(writer)
            .map_err(|e| CompressionError::encode("PNG", e))?;

        let encoded = Self::recompress(&raw, params.optimize)?;
        Ok(with_metadata(OutputFormat::Png, encoded, image))
    }
}

pub struct WebpEncoder;

impl FormatEncoder for WebpEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(&self, image: &DecodedImage, params: &CompressionParams) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();

        let mut config = webp::WebPConfig::new()
            .map_err(|_| CompressionError::encode("WebP", "could not initialise encoder config"))?;
        config.lossless = 0;
        config.quality = params.quality as f32;
        config.method = WEBP_METHOD;

        let encoded = if image.mode.needs_rgba() {
            let rgba = image.pixels.to_rgba8();
            webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_advanced(&config)
        } else {
            let rgb = image.pixels.to_rgb8();
            webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_advanced(&config)
        }
        .map_err(|e| CompressionError::encode("WebP", format!("{:?}", e)))?;

        Ok(with_metadata(OutputFormat::WebP, encoded.to_vec(), image))
    }

    fn rewrites_exif(&self) -> bool {
        true
    }
}
