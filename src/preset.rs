//! Named compression presets and the parameters they resolve to.

use crate::constants::{
    DEFAULT_QUALITY, FAST_QUALITY_FLOOR, FAST_QUALITY_STEP, MAX_QUALITY, MIN_QUALITY,
    QUALITY_PRESET_CEILING, QUALITY_PRESET_STEP,
};
use crate::error::{CompressionError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionPreset {
    /// Lower quality, no optimisation passes
    Fast,
    #[default]
    Balanced,
    /// Higher quality with every optimisation pass enabled
    Quality,
}

impl CompressionPreset {
    pub fn all() -> [CompressionPreset; 3] {
        [
            CompressionPreset::Fast,
            CompressionPreset::Balanced,
            CompressionPreset::Quality,
        ]
    }
}

impl fmt::Display for CompressionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionPreset::Fast => "fast",
            CompressionPreset::Balanced => "balanced",
            CompressionPreset::Quality => "quality",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CompressionPreset {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(CompressionPreset::Fast),
            "balanced" => Ok(CompressionPreset::Balanced),
            "quality" => Ok(CompressionPreset::Quality),
            _ => Err(CompressionError::InvalidPreset(s.to_string())),
        }
    }
}

/// Concrete encoder settings shared read-only by every job of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionParams {
    pub quality: u8,
    pub optimize: bool,
    pub progressive: bool,
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            optimize: true,
            progressive: true,
        }
    }
}

/// Resolves a preset plus caller overrides into [`CompressionParams`].
///
/// Explicit `optimize`/`progressive` overrides win over whatever the preset
/// would pick. The preset's quality floor (fast) and ceiling (quality) are
/// applied to the base quality afterwards, and the result is always kept in
/// `1..=100`.
///
/// # Example
/// ```
/// use tiny_squeeze::preset::{resolve, CompressionPreset};
///
/// let params = resolve(CompressionPreset::Fast, 85, None, None).unwrap();
/// assert_eq!(params.quality, 75);
/// assert!(!params.optimize && !params.progressive);
/// ```
pub fn resolve(
    preset: CompressionPreset,
    quality: u8,
    optimize: Option<bool>,
    progressive: Option<bool>,
) -> Result<CompressionParams> {
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        return Err(CompressionError::InvalidQuality(quality));
    }

    let (quality, default_optimize, default_progressive) = match preset {
        CompressionPreset::Fast => (
            quality.saturating_sub(FAST_QUALITY_STEP).max(FAST_QUALITY_FLOOR),
            false,
            false,
        ),
        CompressionPreset::Balanced => (quality, true, true),
        CompressionPreset::Quality => (
            quality
                .saturating_add(QUALITY_PRESET_STEP)
                .min(QUALITY_PRESET_CEILING),
            true,
            true,
        ),
    };

    Ok(CompressionParams {
        quality: quality.clamp(MIN_QUALITY, MAX_QUALITY),
        optimize: optimize.unwrap_or(default_optimize),
        progressive: progressive.unwrap_or(default_progressive),
    })
}

/// Same as [`resolve`] but takes the preset by name, as typed on the command line.
pub fn resolve_named(
    preset: &str,
    quality: u8,
    optimize: Option<bool>,
    progressive: Option<bool>,
) -> Result<CompressionParams> {
    resolve(preset.parse()?, quality, optimize, progressive)
}
