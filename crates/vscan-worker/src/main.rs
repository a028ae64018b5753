//! `vscan` command-line scanner.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vscan_media::{CancellationToken, FfmpegVideo};
use vscan_models::ScanMode;
use vscan_worker::{Scanner, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "vscan", about = "On-device sensitive content scanner")]
struct Cli {
    /// ONNX detector model
    #[arg(long, env = "VSCAN_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect sensitive regions in an image
    Image {
        path: PathBuf,
        #[arg(long)]
        confidence: Option<f32>,
        #[arg(long)]
        iou: Option<f32>,
    },

    /// Scan a video file
    Video {
        path: PathBuf,
        /// quick_check, sampled, full_short_circuit, thorough or binary_search
        #[arg(long)]
        mode: Option<ScanMode>,
        /// Seconds between samples
        #[arg(long)]
        interval: Option<f64>,
        #[arg(long)]
        confidence: Option<f32>,
    },

    /// Print model metadata
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = WorkerConfig::from_env();
    if let Some(model) = cli.model {
        config.model_path = model;
    }
    info!(model = %config.model_path.display(), "Starting vscan");

    let load_config = config.clone();
    let scanner = tokio::task::spawn_blocking(move || Scanner::from_config(&load_config))
        .await
        .context("model loading task panicked")?
        .context("failed to load detector")?;
    let scanner = Arc::new(scanner);

    match cli.command {
        Command::Image { path, confidence, iou } => {
            let result = tokio::task::spawn_blocking(move || scanner.scan_image(&path, confidence, iou))
                .await
                .context("image task panicked")??;
            print_json(&result, cli.pretty)?;
        }
        Command::Video {
            path,
            mode,
            interval,
            confidence,
        } => {
            let mut scan = config.scan.clone();
            if let Some(mode) = mode {
                scan.mode = mode;
            }
            if let Some(interval) = interval {
                scan.sample_interval_secs = interval;
            }
            if let Some(confidence) = confidence {
                scan.confidence_threshold = confidence;
            }

            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received interrupt, stopping scan after current frame");
                    signal_token.cancel();
                }
            });

            let result = tokio::task::spawn_blocking(move || {
                let video = FfmpegVideo::open(&path)?;
                scanner.scan_video(&video, scan, cancel)
            })
            .await
            .context("video task panicked")??;
            print_json(&result, cli.pretty)?;
        }
        Command::Info => {
            print_json(&scanner.model_info()?, cli.pretty)?;
        }
    }

    Ok(())
}

/// Colored output for dev, JSON for production. Logs go to stderr so stdout
/// carries only results.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in ["ort=warn", "onnxruntime=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
