mod pipeline;
mod postprocess;
mod segmentation;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline::SegmentationPipeline;
use postprocess::SelectionConfig;
use segmentation::ModelOptions;
use server::AppState;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the Mask R-CNN segmentation model (ONNX file)
    #[arg(short, long)]
    model: String,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 5100)]
    port: u16,

    /// Minimum detection score (exclusive)
    #[arg(long, default_value_t = 0.5)]
    confidence_threshold: f32,

    /// IoU at which a later detection is suppressed by an earlier one
    #[arg(long, default_value_t = 0.5)]
    iou_threshold: f32,

    /// Resize images to this width before inference (requires --input-height)
    #[arg(long, requires = "input_height")]
    input_width: Option<u32>,

    /// Resize images to this height before inference (requires --input-width)
    #[arg(long, requires = "input_width")]
    input_height: Option<u32>,

    /// Model expects a [1, 3, H, W] input instead of [3, H, W]
    #[arg(long)]
    batched_input: bool,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = 4)]
    intra_threads: usize,

    /// Try the CUDA execution provider before falling back to CPU
    #[arg(long)]
    cuda: bool,

    /// Maximum upload size in megabytes
    #[arg(long, default_value_t = 32)]
    max_upload_mb: usize,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("medseg starting");

    let options = ModelOptions {
        input_size: args.input_width.zip(args.input_height),
        batched: args.batched_input,
        intra_threads: args.intra_threads,
        cuda: args.cuda,
    };
    let config = SelectionConfig {
        confidence_threshold: args.confidence_threshold,
        iou_threshold: args.iou_threshold,
    };

    // Load the model before accepting any request
    tracing::info!("Loading segmentation model from {}", args.model);
    let model = segmentation::create_default_model(&args.model, &options)
        .context("Failed to load segmentation model")?;
    let pipeline = SegmentationPipeline::new(model, config);

    tracing::info!(
        "Model {} ready: confidence > {}, IoU < {}",
        pipeline.model_name(),
        pipeline.config().confidence_threshold,
        pipeline.config().iou_threshold
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let router = server::create_router(state, args.max_upload_mb * 1024 * 1024);

    server::serve(SocketAddr::new(args.host, args.port), router).await
}
