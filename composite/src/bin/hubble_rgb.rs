//! Command-line viewer: query the archive for an object, compose an RGB
//! image from its first three FITS bands, and write a PNG.
//!
//! `--demo` renders a synthetic scene instead, for use without network
//! access.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::error;

use composite::{
    compose, run_with, synthetic_bands, Band, CompositeImage, MastArchive, PipelineConfig,
    PipelineOutcome, RetryPolicy,
};
use mast::{DownloadCache, MastClient};

#[derive(Parser, Debug)]
#[command(
    name = "hubble-rgb",
    about = "Compose an RGB image from Hubble FITS observations",
    long_about = None
)]
struct Args {
    /// Object to search for (e.g. M51, NGC 1300)
    #[arg(default_value = "M51")]
    object: String,

    /// Search radius in degrees
    #[arg(long, default_value_t = 0.1)]
    radius: f64,

    /// Softening scale of the asinh stretch (higher brightens faint features)
    #[arg(long, default_value_t = 0.5)]
    stretch: f64,

    /// Nonlinearity factor (higher compresses bright regions harder)
    #[arg(long, default_value_t = 10.0)]
    q: f64,

    /// Download attempts per band
    #[arg(long, default_value_t = 2)]
    max_attempts: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 1.0)]
    backoff: f64,

    /// Cache directory for downloaded FITS files
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Output PNG path
    #[arg(long, short, default_value = "composite.png")]
    output: PathBuf,

    /// Render a synthetic demo scene instead of querying the archive
    #[arg(long)]
    demo: bool,

    /// Demo scene edge length in pixels
    #[arg(long, default_value_t = 512)]
    demo_size: usize,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let composite = if args.demo {
        demo_composite(&args)
    } else {
        archive_composite(&args)
    };

    let Some(image) = composite else {
        return ExitCode::FAILURE;
    };

    if let Err(err) = image.to_image().save(&args.output) {
        error!("failed to write {}: {err}", args.output.display());
        return ExitCode::FAILURE;
    }
    println!(
        "wrote {}x{} composite to {}",
        image.width(),
        image.height(),
        args.output.display()
    );
    ExitCode::SUCCESS
}

fn demo_composite(args: &Args) -> Option<CompositeImage> {
    let (r, g, b) = synthetic_bands(args.demo_size, 42);
    compose(Some(&r), Some(&g), Some(&b), args.stretch, args.q)
        .map(|pixels| CompositeImage { pixels })
}

fn archive_composite(args: &Args) -> Option<CompositeImage> {
    let cache_dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(DownloadCache::default_dir);
    let cache = match DownloadCache::new(cache_dir) {
        Ok(cache) => cache,
        Err(err) => {
            error!("cannot open download cache: {err}");
            return None;
        }
    };
    let archive = MastArchive::new(MastClient::new(), cache);

    let config = PipelineConfig {
        object_name: args.object.clone(),
        radius_deg: args.radius,
        stretch: args.stretch,
        q: args.q,
        retry: RetryPolicy {
            max_attempts: args.max_attempts,
            backoff: Duration::from_secs_f64(args.backoff),
        },
    };

    let bar = ProgressBar::new(Band::ALL.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:20}] {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );
    bar.set_message("loading bands");
    let report = run_with(&archive, &config, |band, ok| {
        bar.inc(1);
        if !ok {
            bar.println(format!("{band} band failed"));
        }
    });
    bar.finish_and_clear();

    match report.outcome {
        PipelineOutcome::Composite(image) => Some(image),
        PipelineOutcome::NoObservations => {
            eprintln!(
                "no observations found for '{}' -- try a larger radius or a different name",
                args.object
            );
            None
        }
        PipelineOutcome::NoProducts => {
            eprintln!("observations found, but no FITS science images to download");
            None
        }
        PipelineOutcome::InsufficientBands { loaded, required } => {
            eprintln!("only {loaded} of {required} bands loaded; cannot compose");
            None
        }
        PipelineOutcome::CompositionFailed => {
            eprintln!("band data could not be combined into an image");
            None
        }
    }
}
