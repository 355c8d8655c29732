/// trf_figure: fit an envelope TRF on one subject's first eleven trials,
/// predict the twelfth and draw the deconvolution figures.
///
/// Output (under `<root>/figures/`):
///   Deconvolution.svg     data, predictor, TRF and predictive power
///   TRF-topography.svg    TRF maps at 40, 150 and 380 ms
///   TRF-accuracy.svg      training and held-out r per sensor
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use alice_eeg::{figure, trf, DataLayout, TrfConfig};

#[derive(Parser, Debug)]
#[command(name = "trf_figure", about = "Envelope TRF deconvolution figure")]
struct Args {
    /// Dataset root (default: ~/Data/Alice).
    #[arg(long)]
    root: Option<PathBuf>,

    /// Subject to analyse.
    #[arg(long, default_value = "S13")]
    subject: String,

    /// Sensor shown in the time-course panels.
    #[arg(long, default_value = "19")]
    sensor: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let layout = DataLayout::new(args.root.unwrap_or_else(DataLayout::default_root));
    let cfg = TrfConfig { subject: args.subject, sensor: args.sensor, ..TrfConfig::default() };

    let analysis = trf::run(&layout, &cfg)?;
    analysis.log_summary();
    for path in figure::render_all(&analysis, &cfg, &layout)? {
        info!(path = %path.display(), "figure");
    }
    Ok(())
}
