use anyhow::{Context, Result, bail};
use checksheet_vision::batch::{self, BatchSegmenter};
use checksheet_vision::{EngineConfig, RoutingMeta, SegmentationRequest, SheetPipeline, SourcePage};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Segment inspection sheets, find their checkboxes, and build review composites.
#[derive(Parser, Debug)]
#[command(name = "sheet-inspector")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON engine configuration; built-in defaults apply when omitted
    #[arg(long, global = true, env = "SHEET_INSPECTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split one serial's rendered pages into numbered segments
    Split {
        #[arg(long)]
        department: String,
        #[arg(long, default_value = "")]
        process: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        serial: String,
        /// Directory receiving `{serial}_{index}.png`
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Page images, in document order
        #[arg(required = true)]
        pages: Vec<PathBuf>,
    },
    /// Split every document listed in a JSON manifest, concurrently
    SplitBatch {
        manifest: PathBuf,
        /// Documents in flight at once; defaults to the number of cores
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Detect checkbox candidates on one segment and print the merged boxes as JSON
    Detect {
        #[arg(long)]
        department: Option<String>,
        #[arg(long, default_value = "")]
        process: String,
        #[arg(long, default_value = "")]
        model: String,
        image: PathBuf,
        /// Write the red-outline review overlay here (PNG)
        #[arg(long)]
        overlay: Option<PathBuf>,
    },
    /// Assemble saved segments into one composite with the department's layout
    Compose {
        #[arg(long)]
        department: String,
        /// Output file; `.png` or `.jpg`
        #[arg(long)]
        out: PathBuf,
        #[arg(required = true)]
        segments: Vec<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // --- 1. Engine Setup ---
    let pipeline = SheetPipeline::new(load_config(cli.config.as_deref())?);

    // --- 2. Command Dispatch ---
    match cli.command {
        Command::Split {
            department,
            process,
            model,
            serial,
            out,
            start,
            pages,
        } => {
            let request = SegmentationRequest {
                pages: pages.into_iter().map(SourcePage::Path).collect(),
                routing: RoutingMeta::new(department, process, model),
                serial,
                output_dir: out,
                start_index: start,
            };
            let report = pipeline.segment(&request)?;
            for path in &report.written {
                println!("{}", path.display());
            }
        }
        Command::SplitBatch { manifest, jobs } => {
            let entries = batch::load_manifest(&manifest)?;
            let serials: Vec<String> = entries.iter().map(|e| e.serial.clone()).collect();
            let requests = entries.into_iter().map(|e| e.into_request()).collect();
            let segmenter = match jobs {
                Some(jobs) => BatchSegmenter::with_concurrency(pipeline, jobs),
                None => BatchSegmenter::new(pipeline),
            };

            let mut failed = 0;
            for (serial, result) in serials.iter().zip(segmenter.segment_all(requests).await) {
                match result {
                    Ok(report) => info!("{serial}: {} segments", report.written.len()),
                    Err(err) => {
                        warn!("{serial}: {err}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} documents failed", serials.len());
            }
        }
        Command::Detect {
            department,
            process,
            model,
            image,
            overlay,
        } => {
            let routing = department.map(|d| RoutingMeta::new(d, process, model));
            let report = pipeline.detect_file(&image, routing.as_ref())?;
            if let Some(overlay) = overlay {
                std::fs::write(&overlay, &report.overlay_png)
                    .with_context(|| format!("writing overlay {}", overlay.display()))?;
            }
            println!("{}", serde_json::to_string_pretty(&report.merged)?);
        }
        Command::Compose {
            department,
            out,
            segments,
        } => {
            let report = pipeline.compose(&department, &segments, &out)?;
            for skipped in &report.skipped {
                warn!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!(
                "{} ({}x{}, {} segments)",
                report.output.display(),
                report.width,
                report.height,
                report.used
            );
        }
    }

    Ok(())
}
