use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use erfilter::{
    DetectionResult, DetectorConfig, RegionDetector, from_gray_image, inverted, load_classifier,
};

/// Channel names in the order they are passed to the detector.
const CHANNELS: [&str; 2] = ["luma", "inverted_luma"];

#[derive(Debug, Parser)]
#[command(name = "er_detect", version)]
#[command(about = "Find extremal regions that are likely text characters and print them as JSON")]
struct Args {
    /// Input image (any format the `image` crate decodes; converted to luma).
    image: PathBuf,

    /// Stage one classifier model (.yaml, .yml or .json).
    stage_one: PathBuf,

    /// Stage two classifier model (.yaml, .yml or .json).
    stage_two: PathBuf,

    /// Detector configuration; defaults are used when omitted.
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    common::setup_logging(tracing::Level::INFO)?;

    let config = match &args.config {
        Some(path) => DetectorConfig::from_file(path)?,
        None => DetectorConfig::default(),
    };
    let stage_one = Arc::new(load_classifier(&args.stage_one)?);
    let stage_two = Arc::new(load_classifier(&args.stage_two)?);
    let detector = RegionDetector::new(config, stage_one, stage_two)?;

    let image = image::open(&args.image)
        .with_context(|| format!("Failed to open image '{}'", args.image.display()))?;
    let luma = from_gray_image(&image.to_luma8());
    // Dark text shows up in the luma channel, light text in its inverse.
    let channels = [luma.clone(), inverted(&luma)];

    let results = detector.detect_channels(&channels)?;
    for (name, result) in CHANNELS.iter().zip(&results) {
        tracing::info!(
            channel = name,
            regions = result.regions.len(),
            diagnostics = ?result.diagnostics,
            "Channel done"
        );
    }

    let joined = DetectionResult::concat(results);
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &joined)?;
    writeln!(stdout)?;

    Ok(())
}
