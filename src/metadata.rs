//! Metadata carried from a source image to its re-encoded output.
//!
//! Metadata is read from the source container once, at decode time, into an
//! ordered [`Metadata`] map. Each output format then decides per entry what
//! happens to it through [`disposition`]:
//!
//! | format | accepted                                   | degradation            |
//! |--------|--------------------------------------------|------------------------|
//! | JPEG   | `exif`, `icc_profile`, `xmp`, `iptc`, `comment` | everything else dropped |
//! | PNG    | any entry with a legal PNG keyword          | binary decoded to text |
//! | WebP   | `exif`, `icc_profile`, `xmp`               | `iptc` and the rest dropped |
//!
//! Writing happens in two stages. [`embed`] runs on the encoded bytes in
//! memory and carries everything except EXIF. [`write_exif`] runs on the
//! written file afterwards and forces the EXIF block to match the source.
//! Failures in either stage are reported as
//! [`CompressionError::MetadataWriteFailure`] and never fail a job.

use crate::error::{CompressionError, Result};
use crate::formats::OutputFormat;
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::png::{Png, PngChunk};
use img_parts::riff::{RiffChunk, RiffContent};
use img_parts::webp::WebP;
use img_parts::{Bytes, DynImage, ImageEXIF, ImageICC};
use std::fs::{self, File};
use std::path::Path;
use tracing::debug;

pub const EXIF_KEY: &str = "exif";
pub const ICC_KEY: &str = "icc_profile";
pub const XMP_KEY: &str = "xmp";
pub const IPTC_KEY: &str = "iptc";
pub const COMMENT_KEY: &str = "comment";

const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const PHOTOSHOP_SIGNATURE: &[u8] = b"Photoshop 3.0\0";

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

const JPEG_APP0: u8 = 0xE0;
const JPEG_APP1: u8 = 0xE1;
const JPEG_APP2: u8 = 0xE2;
const JPEG_APP13: u8 = 0xED;
const JPEG_COM: u8 = 0xFE;

const PNG_TEXT: [u8; 4] = *b"tEXt";
const PNG_ITXT: [u8; 4] = *b"iTXt";
const PNG_IDAT: [u8; 4] = *b"IDAT";
const PNG_MAX_KEYWORD: usize = 79;

const WEBP_VP8X: [u8; 4] = *b"VP8X";
const WEBP_ICCP: [u8; 4] = *b"ICCP";
const WEBP_EXIF: [u8; 4] = *b"EXIF";
const WEBP_XMP: [u8; 4] = *b"XMP ";
const VP8X_ICC_FLAG: u8 = 0x20;
const VP8X_EXIF_FLAG: u8 = 0x08;
const VP8X_XMP_FLAG: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Binary(Bytes),
}

impl MetadataValue {
    fn as_bytes(&self) -> Bytes {
        match self {
            MetadataValue::Text(text) => Bytes::from(text.clone().into_bytes()),
            MetadataValue::Binary(data) => data.clone(),
        }
    }
}

/// Ordered key/value metadata of one source image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`. A replaced entry keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn exif(&self) -> Option<Bytes> {
        match self.get(EXIF_KEY) {
            Some(MetadataValue::Binary(data)) if !data.is_empty() => Some(data.clone()),
            _ => None,
        }
    }
}

/// What an output format does with one metadata entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Written verbatim into the format's native slot
    PassThrough,
    /// Written as a text chunk with this content
    Text(String),
    Drop,
}

pub fn disposition(format: OutputFormat, key: &str, value: &MetadataValue) -> Disposition {
    match format {
        OutputFormat::Jpeg => match (key, value) {
            (EXIF_KEY | ICC_KEY | IPTC_KEY, MetadataValue::Binary(_)) => Disposition::PassThrough,
            (XMP_KEY | COMMENT_KEY, _) => Disposition::PassThrough,
            _ => Disposition::Drop,
        },
        OutputFormat::Png => {
            if !is_png_keyword(key) {
                return Disposition::Drop;
            }
            match value {
                MetadataValue::Text(text) => Disposition::Text(text.replace('\0', "")),
                MetadataValue::Binary(data) => {
                    Disposition::Text(decode_utf8_ignoring_invalid(data).replace('\0', ""))
                }
            }
        }
        OutputFormat::WebP => match (key, value) {
            (EXIF_KEY | ICC_KEY, MetadataValue::Binary(_)) => Disposition::PassThrough,
            (XMP_KEY, _) => Disposition::PassThrough,
            _ => Disposition::Drop,
        },
    }
}

/// UTF-8 decode that skips invalid sequences instead of replacing them.
pub fn decode_utf8_ignoring_invalid(data: &[u8]) -> String {
    data.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn is_png_keyword(key: &str) -> bool {
    let len = key.chars().count();
    (1..=PNG_MAX_KEYWORD).contains(&len)
        && !key.starts_with(' ')
        && !key.ends_with(' ')
        && key
            .chars()
            .all(|c| matches!(c as u32, 0x20..=0x7E | 0xA1..=0xFF))
}

/// Reads every metadata entry the source container carries.
///
/// Unparseable containers (BMP, TIFF, or a damaged file) yield empty
/// metadata; that is never an error.
pub fn extract(data: &Bytes) -> Metadata {
    let image = match DynImage::from_bytes(data.clone()) {
        Ok(Some(image)) => image,
        Ok(None) => return Metadata::new(),
        Err(e) => {
            debug!("metadata container not readable: {}", e);
            return Metadata::new();
        }
    };

    let mut metadata = Metadata::new();
    if let Some(exif) = image.exif() {
        metadata.insert(EXIF_KEY, MetadataValue::Binary(exif));
    }
    if let Some(icc) = image.icc_profile() {
        metadata.insert(ICC_KEY, MetadataValue::Binary(icc));
    }

    #[allow(unreachable_patterns)]
    match &image {
        DynImage::Jpeg(jpeg) => extract_jpeg(jpeg, &mut metadata),
        DynImage::Png(png) => extract_png(png, &mut metadata),
        DynImage::WebP(webp) => extract_webp(webp, &mut metadata),
        _ => {}
    }

    debug!("extracted {} metadata entries", metadata.len());
    metadata
}

fn extract_jpeg(jpeg: &Jpeg, metadata: &mut Metadata) {
    for segment in jpeg.segments() {
        let contents = segment.contents();
        match segment.marker() {
            JPEG_APP1 if contents.starts_with(XMP_NAMESPACE) => {
                metadata.insert(
                    XMP_KEY,
                    MetadataValue::Binary(contents.slice(XMP_NAMESPACE.len()..)),
                );
            }
            JPEG_APP13 if contents.starts_with(PHOTOSHOP_SIGNATURE) => {
                metadata.insert(IPTC_KEY, MetadataValue::Binary(contents.clone()));
            }
            JPEG_COM => {
                metadata.insert(
                    COMMENT_KEY,
                    MetadataValue::Text(String::from_utf8_lossy(contents).into_owned()),
                );
            }
            _ => {}
        }
    }
}

fn extract_png(png: &Png, metadata: &mut Metadata) {
    for chunk in png.chunks() {
        let contents = chunk.contents();
        let parsed = match chunk.kind() {
            PNG_TEXT => parse_text_chunk(contents),
            PNG_ITXT => parse_itxt_chunk(contents),
            _ => continue,
        };
        match parsed {
            Some((key, text)) => metadata.insert(key, MetadataValue::Text(text)),
            None => debug!("skipping unreadable PNG text chunk"),
        }
    }
}

fn latin1(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

fn parse_text_chunk(contents: &[u8]) -> Option<(String, String)> {
    let split = contents.iter().position(|&b| b == 0)?;
    Some((latin1(&contents[..split]), latin1(&contents[split + 1..])))
}

/// Uncompressed iTXt only; compressed text is skipped.
fn parse_itxt_chunk(contents: &[u8]) -> Option<(String, String)> {
    let key_end = contents.iter().position(|&b| b == 0)?;
    let key = latin1(&contents[..key_end]);
    let rest = contents.get(key_end + 1..)?;
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        return None;
    }
    // compression method, then language tag and translated keyword
    let rest = rest.get(1..)?;
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = &rest[translated_end + 1..];
    Some((key, String::from_utf8_lossy(text).into_owned()))
}

fn extract_webp(webp: &WebP, metadata: &mut Metadata) {
    if let Some(exif) = webp_exif(webp) {
        metadata.insert(EXIF_KEY, MetadataValue::Binary(exif));
    }
    if let Some(xmp) = webp_chunk_data(webp, WEBP_XMP) {
        metadata.insert(XMP_KEY, MetadataValue::Binary(xmp));
    }
}

/// The EXIF chunk holds a bare TIFF block, though some writers keep the
/// JPEG-style `Exif\0\0` prefix.
fn webp_exif(webp: &WebP) -> Option<Bytes> {
    let exif = webp_chunk_data(webp, WEBP_EXIF)?;
    if exif.starts_with(EXIF_HEADER) {
        Some(exif.slice(EXIF_HEADER.len()..))
    } else {
        Some(exif)
    }
}

fn webp_chunk_data(webp: &WebP, id: [u8; 4]) -> Option<Bytes> {
    webp.chunks()
        .iter()
        .find(|chunk| chunk.id() == id)
        .and_then(|chunk| match chunk.content() {
            RiffContent::Data(data) => Some(data.clone()),
            _ => None,
        })
}

/// Stage one: embed everything except EXIF into freshly encoded bytes.
///
/// `dimensions` is the canvas size, needed when a simple WebP file has to be
/// promoted to the extended layout.
pub fn embed(
    format: OutputFormat,
    encoded: &[u8],
    metadata: &Metadata,
    dimensions: (u32, u32),
) -> Result<Vec<u8>> {
    if metadata.is_empty() {
        return Ok(encoded.to_vec());
    }

    let data = Bytes::copy_from_slice(encoded);
    let failure = |reason: String| CompressionError::MetadataWriteFailure {
        path: Path::new("<memory>").to_path_buf(),
        reason,
    };

    let mut out = Vec::with_capacity(data.len());
    match format {
        OutputFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(data).map_err(|e| failure(e.to_string()))?;
            embed_jpeg(&mut jpeg, metadata);
            jpeg.encoder().write_to(&mut out)?;
        }
        OutputFormat::Png => {
            let mut png = Png::from_bytes(data).map_err(|e| failure(e.to_string()))?;
            embed_png(&mut png, metadata);
            png.encoder().write_to(&mut out)?;
        }
        OutputFormat::WebP => {
            let mut webp = WebP::from_bytes(data).map_err(|e| failure(e.to_string()))?;
            embed_webp(&mut webp, metadata, dimensions);
            webp.encoder().write_to(&mut out)?;
        }
    }
    Ok(out)
}

fn embed_jpeg(jpeg: &mut Jpeg, metadata: &Metadata) {
    let mut segments = Vec::new();
    for (key, value) in metadata.iter() {
        if disposition(OutputFormat::Jpeg, key, value) != Disposition::PassThrough {
            debug!("JPEG drops metadata entry {:?}", key);
            continue;
        }
        match key {
            ICC_KEY => jpeg.set_icc_profile(Some(value.as_bytes())),
            XMP_KEY => {
                let mut contents = XMP_NAMESPACE.to_vec();
                contents.extend_from_slice(&value.as_bytes());
                segments.push(JpegSegment::new_with_contents(JPEG_APP1, contents.into()));
            }
            IPTC_KEY => {
                segments.push(JpegSegment::new_with_contents(JPEG_APP13, value.as_bytes()));
            }
            COMMENT_KEY => {
                segments.push(JpegSegment::new_with_contents(JPEG_COM, value.as_bytes()));
            }
            // EXIF is written by the post-write pass
            _ => {}
        }
    }

    hoist_exif_and_icc(jpeg);

    let all = jpeg.segments_mut();
    let mut at = all
        .iter()
        .position(|segment| !(0xE0..=0xEF).contains(&segment.marker()))
        .unwrap_or(all.len());
    for segment in segments {
        all.insert(at, segment);
        at += 1;
    }
}

fn is_exif_or_icc(segment: &JpegSegment) -> bool {
    match segment.marker() {
        JPEG_APP1 => segment.contents().starts_with(EXIF_HEADER),
        JPEG_APP2 => segment.contents().starts_with(ICC_HEADER),
        _ => false,
    }
}

/// Moves the EXIF and ICC segments up to sit directly after the JFIF header,
/// EXIF first. ICC chunks keep their relative order.
fn hoist_exif_and_icc(jpeg: &mut Jpeg) {
    let segments = jpeg.segments_mut();
    let (mut hoisted, rest): (Vec<_>, Vec<_>) =
        std::mem::take(segments).into_iter().partition(is_exif_or_icc);
    hoisted.sort_by_key(|segment| segment.marker());

    let at = rest
        .iter()
        .position(|segment| segment.marker() != JPEG_APP0)
        .unwrap_or(rest.len());
    let mut rest = rest.into_iter();
    segments.extend(rest.by_ref().take(at));
    segments.extend(hoisted);
    segments.extend(rest);
}

fn embed_png(png: &mut Png, metadata: &Metadata) {
    let chunks: Vec<PngChunk> = metadata
        .iter()
        .filter_map(|(key, value)| match disposition(OutputFormat::Png, key, value) {
            Disposition::Text(text) => Some(png_text_chunk(key, &text)),
            _ => {
                debug!("PNG drops metadata entry {:?}", key);
                None
            }
        })
        .collect();

    let all = png.chunks_mut();
    let mut at = all
        .iter()
        .position(|chunk| chunk.kind() == PNG_IDAT)
        .unwrap_or(all.len().saturating_sub(1));
    for chunk in chunks {
        all.insert(at, chunk);
        at += 1;
    }
}

/// tEXt when the text fits Latin-1, uncompressed iTXt otherwise.
fn png_text_chunk(key: &str, text: &str) -> PngChunk {
    let mut contents: Vec<u8> = key.chars().map(|c| c as u8).collect();
    contents.push(0);

    if text.chars().all(|c| (c as u32) <= 0xFF) {
        contents.extend(text.chars().map(|c| c as u8));
        PngChunk::new(PNG_TEXT, contents.into())
    } else {
        // compression flag, compression method, empty language tag and translated keyword
        contents.extend_from_slice(&[0, 0, 0, 0]);
        contents.extend_from_slice(text.as_bytes());
        PngChunk::new(PNG_ITXT, contents.into())
    }
}

fn embed_webp(webp: &mut WebP, metadata: &Metadata, dimensions: (u32, u32)) {
    let icc = metadata.get(ICC_KEY).filter(|value| {
        disposition(OutputFormat::WebP, ICC_KEY, value) == Disposition::PassThrough
    });
    let xmp = metadata.get(XMP_KEY);

    for (key, value) in metadata.iter() {
        if disposition(OutputFormat::WebP, key, value) == Disposition::Drop {
            debug!("WebP drops metadata entry {:?}", key);
        }
    }

    if icc.is_none() && xmp.is_none() && metadata.exif().is_none() {
        return;
    }
    ensure_vp8x(webp, dimensions);

    if let Some(icc) = icc {
        webp.chunks_mut().retain(|chunk| chunk.id() != WEBP_ICCP);
        webp.chunks_mut().insert(
            1,
            RiffChunk::new(WEBP_ICCP, RiffContent::Data(icc.as_bytes())),
        );
        set_vp8x_flag(webp, VP8X_ICC_FLAG);
    }
    if let Some(xmp) = xmp {
        webp.chunks_mut().retain(|chunk| chunk.id() != WEBP_XMP);
        webp.chunks_mut()
            .push(RiffChunk::new(WEBP_XMP, RiffContent::Data(xmp.as_bytes())));
        set_vp8x_flag(webp, VP8X_XMP_FLAG);
    }
}

/// Promotes a simple (VP8/VP8L only) WebP file to the extended layout.
fn ensure_vp8x(webp: &mut WebP, (width, height): (u32, u32)) {
    if webp.chunks().iter().any(|chunk| chunk.id() == WEBP_VP8X) {
        return;
    }
    let mut header = vec![0u8; 4];
    header.extend_from_slice(&(width.saturating_sub(1)).to_le_bytes()[..3]);
    header.extend_from_slice(&(height.saturating_sub(1)).to_le_bytes()[..3]);
    webp.chunks_mut()
        .insert(0, RiffChunk::new(WEBP_VP8X, RiffContent::Data(header.into())));
}

fn set_vp8x_flag(webp: &mut WebP, flag: u8) {
    let chunks = webp.chunks_mut();
    if let Some(index) = chunks.iter().position(|chunk| chunk.id() == WEBP_VP8X) {
        if let RiffContent::Data(data) = chunks[index].content() {
            let mut header = data.to_vec();
            if let Some(flags) = header.first_mut() {
                *flags |= flag;
            }
            chunks[index] = RiffChunk::new(WEBP_VP8X, RiffContent::Data(header.into()));
        }
    }
}

/// Reads the EXIF block of the image at `path`, if any.
pub fn read_exif(path: &Path) -> Result<Option<Bytes>> {
    let data = Bytes::from(fs::read(path)?);
    let image = DynImage::from_bytes(data).map_err(|e| CompressionError::MetadataWriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let exif = match image {
        Some(DynImage::WebP(webp)) => webp_exif(&webp),
        Some(image) => image.exif(),
        None => None,
    };
    Ok(exif)
}

/// Stage two: rewrite the EXIF block of the file at `path` in place.
pub fn write_exif(path: &Path, exif: Bytes) -> Result<()> {
    let failure = |reason: String| CompressionError::MetadataWriteFailure {
        path: path.to_path_buf(),
        reason,
    };

    let data = Bytes::from(fs::read(path)?);
    let image = DynImage::from_bytes(data)
        .map_err(|e| failure(e.to_string()))?
        .ok_or_else(|| failure("not a JPEG, PNG or WebP container".to_string()))?;

    let mut out = Vec::new();
    #[allow(unreachable_patterns)]
    match image {
        DynImage::Jpeg(mut jpeg) => {
            jpeg.set_exif(Some(exif));
            hoist_exif_and_icc(&mut jpeg);
            jpeg.encoder().write_to(&mut out)?;
        }
        DynImage::Png(mut png) => {
            png.set_exif(Some(exif));
            png.encoder().write_to(&mut out)?;
        }
        DynImage::WebP(mut webp) => {
            if !webp.chunks().iter().any(|chunk| chunk.id() == WEBP_VP8X) {
                return Err(failure("simple WebP layout cannot carry EXIF".to_string()));
            }
            webp.chunks_mut().retain(|chunk| chunk.id() != WEBP_EXIF);
            let at = webp
                .chunks()
                .iter()
                .position(|chunk| chunk.id() == WEBP_XMP)
                .unwrap_or(webp.chunks().len());
            webp.chunks_mut()
                .insert(at, RiffChunk::new(WEBP_EXIF, RiffContent::Data(exif)));
            set_vp8x_flag(&mut webp, VP8X_EXIF_FLAG);
            webp.encoder().write_to(&mut out)?;
        }
        _ => return Err(failure("unsupported container".to_string())),
    }

    let mut file = File::create(path)?;
    std::io::Write::write_all(&mut file, &out)?;
    Ok(())
}
