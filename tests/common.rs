#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Minimal big-endian TIFF header with an empty IFD.
pub const SAMPLE_EXIF: &[u8] = b"MM\x00\x2a\x00\x00\x00\x08\x00\x00\x00\x00\x00\x00";

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    })
}

pub fn write_rgb_image(path: &Path, format: ImageFormat, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    DynamicImage::ImageRgb8(gradient(width, height))
        .save_with_format(path, format)
        .unwrap();
}

pub fn write_rgba_png(path: &Path, width: u32, height: u32) {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([30, 60, 90, 255]));
    img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
    DynamicImage::ImageRgba8(img)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Palette PNG with a transparent entry, written with the `png` crate so the
/// file really is indexed.
pub fn write_indexed_png(path: &Path, width: u32, height: u32) {
    let file = BufWriter::new(File::create(path).unwrap());
    let mut encoder = png::Encoder::new(file, width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]);
    encoder.set_trns(vec![255, 255, 255, 0]);

    let mut writer = encoder.write_header().unwrap();
    let data: Vec<u8> = (0..width * height).map(|i| (i % 4) as u8).collect();
    writer.write_image_data(&data).unwrap();
}

/// RGB PNG carrying a tEXt chunk.
pub fn write_png_with_text(path: &Path, keyword: &str, text: &str) {
    let file = BufWriter::new(File::create(path).unwrap());
    let mut encoder = png::Encoder::new(file, 8, 8);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder
        .add_text_chunk(keyword.to_string(), text.to_string())
        .unwrap();

    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(gradient(8, 8).as_raw()).unwrap();
}

/// JPEG carrying an EXIF block and an ICC profile.
pub fn write_jpeg_with_metadata(path: &Path, icc: &[u8]) {
    use img_parts::jpeg::Jpeg;
    use img_parts::{Bytes, ImageEXIF, ImageICC};

    let mut encoded = Vec::new();
    DynamicImage::ImageRgb8(gradient(16, 16))
        .write_to(&mut std::io::Cursor::new(&mut encoded), ImageFormat::Jpeg)
        .unwrap();

    let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded)).unwrap();
    jpeg.set_exif(Some(Bytes::copy_from_slice(SAMPLE_EXIF)));
    jpeg.set_icc_profile(Some(Bytes::copy_from_slice(icc)));

    let mut out = Vec::new();
    jpeg.encoder().write_to(&mut out).unwrap();
    fs::write(path, out).unwrap();
}

/// `a.png`, `b.jpg` and `notes.txt` directly in `dir`.
pub fn create_flat_batch(dir: &Path) -> Vec<PathBuf> {
    let files = vec![dir.join("a.png"), dir.join("b.jpg"), dir.join("notes.txt")];
    write_rgb_image(&files[0], ImageFormat::Png, 20, 10);
    write_rgb_image(&files[1], ImageFormat::Jpeg, 20, 10);
    fs::write(&files[2], "not an image").unwrap();
    files
}

/// `x.png` at the top and `sub/y.png` one level down.
pub fn create_nested_batch(dir: &Path) {
    write_rgb_image(&dir.join("x.png"), ImageFormat::Png, 10, 10);
    write_rgb_image(&dir.join("sub/y.png"), ImageFormat::Png, 12, 6);
}
