//! parkwatch - run one occupancy session from the command line

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use parkwatch::config::ParkwatchConfig;
use parkwatch::ingest::MediaPayload;
use parkwatch::pipeline::StopSignal;
use parkwatch::render::{LogRenderer, Renderer, SnapshotRenderer, StopAfter};
use parkwatch::session::{SessionController, SessionRequest};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file, or a synthetic stream such as stub://lot?frames=300.
    #[arg(long)]
    video: String,
    /// Mask image; each non-zero blob is one parking spot.
    #[arg(long)]
    mask: PathBuf,
    /// Sampling stride in frames (overrides config).
    #[arg(long)]
    step: Option<u64>,
    /// Relative diff threshold in [0, 1) (overrides config).
    #[arg(long)]
    threshold: Option<f64>,
    /// Write annotated JPEG snapshots into this directory.
    #[arg(long, env = "PARKWATCH_SNAPSHOT_DIR")]
    snapshots: Option<PathBuf>,
    /// Stop the session after rendering this many batches.
    #[arg(long)]
    max_batches: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ParkwatchConfig::load()?;
    if let Some(step) = args.step {
        if step == 0 {
            return Err(anyhow!("step must be >= 1"));
        }
        config.scheduler.step = step;
    }
    if let Some(threshold) = args.threshold {
        if !(0.0..1.0).contains(&threshold) {
            return Err(anyhow!("threshold must be in [0, 1)"));
        }
        config.scheduler.threshold = threshold;
    }
    if args.max_batches == Some(0) {
        return Err(anyhow!("max-batches must be >= 1"));
    }

    let snapshots = args.snapshots.or_else(|| config.snapshot_dir.clone());
    let max_batches = args.max_batches;
    let renderer = move || -> Result<Box<dyn Renderer>> {
        let inner: Box<dyn Renderer> = match &snapshots {
            Some(dir) => Box::new(SnapshotRenderer::new(dir)?),
            None => Box::new(LogRenderer::new()),
        };
        Ok(match max_batches {
            Some(limit) => Box::new(StopAfter::new(inner, limit)),
            None => inner,
        })
    };
    let mut collaborators = config.collaborators()?;
    collaborators.renderer = Arc::new(renderer);
    let controller = SessionController::new(config.session_config(), collaborators);

    let stop = StopSignal::new();
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("Ctrl-C received, stopping session...");
        stop_handler.trigger();
    })
    .expect("error setting Ctrl-C handler");

    let request = SessionRequest::new(
        MediaPayload::Path(PathBuf::from(&args.video)),
        MediaPayload::Path(args.mask),
    );
    let result = controller.run_with_stop(request, stop)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
