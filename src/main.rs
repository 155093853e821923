use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tiny_squeeze::batch::run_batch;
use tiny_squeeze::cli::Args;
use tiny_squeeze::confirm::PromptOnStdin;
use tiny_squeeze::constants::ERROR_PREFIX;
use tiny_squeeze::logger;
use tiny_squeeze::processing::{compress_image, JobStatus};
use tracing::{debug, error, warn};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logger::init(args.verbose, args.quiet) {
        eprintln!("{} {:#}", ERROR_PREFIX, e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let options = args.run_options()?;
    debug!("resolved {:?}", options);
    let policy = PromptOnStdin::new();

    if args.input.is_dir() {
        if args.output.is_some() {
            warn!("--output is ignored in batch mode, use --output-dir");
        }

        run_batch(
            &args.input,
            args.output_dir.as_deref(),
            args.recursive,
            args.jobs,
            &options,
            &policy,
        )
        .with_context(|| format!("batch compression of {} failed", args.input.display()))?;

        // Per-file failures are already in the tally
        return Ok(ExitCode::SUCCESS);
    }

    if args.output_dir.is_some() {
        warn!("--output-dir is ignored in single-file mode, use --output");
    }
    if args.recursive {
        warn!("--recursive is ignored in single-file mode");
    }

    let result = compress_image(&args.input, args.output.as_deref(), &options, &policy);
    Ok(match result.status {
        JobStatus::Failed => ExitCode::FAILURE,
        JobStatus::Compressed | JobStatus::Skipped => ExitCode::SUCCESS,
    })
}
