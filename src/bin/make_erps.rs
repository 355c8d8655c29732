/// make_erps: word-locked ERP for every subject under `<root>/eeg/`.
///
/// Subjects whose output file already exists are skipped, so an interrupted
/// run can simply be restarted.
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use alice_eeg::{DataLayout, ErpConfig, ErpPipeline, SubjectOutcome};

#[derive(Parser, Debug)]
#[command(name = "make_erps", about = "Word-locked ERPs for the Alice EEG dataset")]
struct Args {
    /// Dataset root (default: ~/Data/Alice).
    #[arg(long)]
    root: Option<PathBuf>,
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

    let outcomes = ErpPipeline::new(layout, ErpConfig::default())?.run()?;
    let written = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, SubjectOutcome::Written(_)))
        .count();
    info!(written, skipped = outcomes.len() - written, "done");
    Ok(())
}
