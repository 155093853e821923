use crate::constants::DEFAULT_QUALITY;
use crate::error::Result;
use crate::formats::OutputFormat;
use crate::preset::{resolve, CompressionPreset};
use crate::processing::RunOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tiny-squeeze",
    about = "Re-encode JPEG, PNG and WebP images smaller while keeping their metadata",
    long_about = "tiny-squeeze compresses a single image or every image in a directory. \
                  EXIF, ICC profiles, XMP and text chunks are carried over where the output \
                  format can hold them. A directory input switches to batch mode.",
    version,
    after_help = "EXAMPLES:\n  \
    tiny-squeeze photo.jpg -q 80\n  \
    tiny-squeeze logo.png -o logo.webp -f webp --preset quality\n  \
    tiny-squeeze ./images -d ./out -r --preset fast -j 4"
)]
pub struct Args {
    #[arg(help = "Input image file, or a directory for batch mode")]
    pub input: PathBuf,

    #[arg(
        short = 'o',
        long,
        help = "Output file (single-file mode)",
        long_help = "Output file path. Defaults to compressed_<name> next to the input. \
                     Ignored with a warning in batch mode."
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'd',
        long,
        help = "Output directory (batch mode)",
        long_help = "Directory receiving batch results. Defaults to <input>/compressed. \
                     Ignored with a warning in single-file mode."
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(short = 'r', long, help = "Descend into subdirectories and mirror them")]
    pub recursive: bool,

    #[arg(
        short = 'f',
        long,
        help = "Output format (jpg, jpeg, png, webp)",
        long_help = "Force the output format. Without it the input extension decides, \
                     and failing that the file header."
    )]
    pub format: Option<OutputFormat>,

    #[arg(
        short = 'q',
        long,
        default_value_t = DEFAULT_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100),
        help = "Base quality, 1-100"
    )]
    pub quality: u8,

    #[arg(
        long,
        default_value_t = CompressionPreset::Balanced,
        help = "Compression preset (fast, balanced, quality)",
        long_help = "fast: quality -10 (floor 70), no optimisation passes. \
                     balanced: quality as given. \
                     quality: quality +5 (cap 95), every optimisation pass. \
                     --no-optimize and --no-progressive still apply on top."
    )]
    pub preset: CompressionPreset,

    #[arg(long, help = "Disable Huffman/scan optimisation and the PNG deflate pass")]
    pub no_optimize: bool,

    #[arg(long, help = "Write baseline instead of progressive JPEG")]
    pub no_progressive: bool,

    #[arg(long, help = "Replace existing outputs without asking")]
    pub overwrite: bool,

    #[arg(
        short = 'j',
        long,
        default_value_t = 1,
        help = "Parallel batch workers (0 = one per CPU)",
        long_help = "Number of files compressed at once in batch mode. With more than one \
                     worker existing outputs are skipped unless --overwrite is given."
    )]
    pub jobs: usize,

    #[arg(short = 'v', long, help = "Log every stage of every job")]
    pub verbose: bool,

    #[arg(long, conflicts_with = "verbose", help = "Only print errors and the batch tally")]
    pub quiet: bool,
}

impl Args {
    /// Resolves the preset and overrides into the options every job shares.
    pub fn run_options(&self) -> Result<RunOptions> {
        let params = resolve(
            self.preset,
            self.quality,
            self.no_optimize.then_some(false),
            self.no_progressive.then_some(false),
        )?;

        Ok(RunOptions {
            params,
            format: self.format,
            overwrite: self.overwrite,
        })
    }
}
