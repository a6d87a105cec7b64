//! Framecast Receiver CLI
//!
//! Command-line interface for testing and demonstrating the receive
//! pipeline. Runs the full dispatcher/reassembly/export path against a
//! mock frame source carrying a real zstd-compressed transfer.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use framecast::capture::{FrameSource, MockFrameSource, PixelFormat};
use framecast::codec::{mock_signal_frame, mock_transfer, MockFountain, MockSymbolDecoder, ZstdCodec};
use framecast::dispatch::{DecodeMode, Dispatcher, WorkerPool};
use framecast::export::{DirStore, StreamingExporter};
use framecast::reassembly::ReassemblySink;
use framecast::session::Session;
use framecast::FileConfig;

#[derive(Debug, Parser)]
#[command(name = "framecast", version, about = "Visual file-transfer receiver")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of decode workers (overrides config).
    #[arg(long)]
    workers: Option<usize>,

    /// Decode mode: "auto", "b", or "4c" (overrides config).
    #[arg(long)]
    mode: Option<String>,

    /// Output directory for recovered files (overrides config).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Keep capturing until interrupted instead of stopping when the
    /// demo feed is exhausted.
    #[arg(long)]
    continuous: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Framecast receiver v{}", framecast::VERSION);
    info!("This is a demonstration using a mock frame source");

    let args = Args::parse();
    let mut config = match args_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(workers) = args.workers {
        config.dispatch.workers = workers;
    }
    if let Some(mode) = &args.mode {
        config.dispatch.mode = mode.clone();
    }
    if let Some(output) = &args.output {
        config.export.output_dir = output.display().to_string();
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let mode_state = match config.dispatch.mode_state() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Invalid mode: {e}");
            std::process::exit(1);
        }
    };

    // Stand up the pipeline
    let pool = match WorkerPool::spawn(config.dispatch.workers, |_| MockSymbolDecoder::default()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to start decode workers: {e}");
            std::process::exit(1);
        }
    };
    let dispatcher = Dispatcher::new(pool, config.dispatch.inflight_limit(), mode_state);
    let sink = ReassemblySink::new(MockFountain::default());
    let store = match DirStore::new(&config.export.output_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open output directory: {e}");
            std::process::exit(1);
        }
    };
    let exporter = StreamingExporter::new(ZstdCodec::new(config.export.chunk_size), store);
    let mut session = Session::new(
        dispatcher,
        sink,
        exporter,
        Duration::from_millis(config.capture.watchdog_interval_ms),
    );

    // Build the demo feed: a zstd-compressed payload split into mock
    // fountain fragments, rendered as synthetic 4C barcode frames with
    // blank frames interleaved the way a real capture would see them.
    let payload: Vec<u8> = b"Framecast demo payload. ".repeat(512);
    let compressed = match zstd::stream::encode_all(Cursor::new(payload.as_slice()), 3) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build demo payload: {e}");
            std::process::exit(1);
        }
    };

    let mut source = MockFrameSource::new(PixelFormat::Nv12);
    let mut capture = config.capture.clone();
    capture.width = 256;
    capture.height = 256;
    if let Err(e) = source.open(&capture) {
        eprintln!("Failed to open frame source: {e}");
        std::process::exit(1);
    }
    for fragment in mock_transfer(&compressed, 1, 8) {
        // two copies back to back so mode autodetection always lands
        source.push_frame(mock_signal_frame(DecodeMode::FourC, &fragment));
        source.push_frame(mock_signal_frame(DecodeMode::FourC, &fragment));
        source.push_frame(Vec::new());
    }

    // Ctrl-C stops continuous capture
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        }) {
            warn!("Failed to install signal handler: {e}");
        }
    }

    info!("Processing frames...");
    let frame_interval = Duration::from_millis(1000 / u64::from(capture.fps.max(1)));
    while running.load(Ordering::SeqCst) {
        if source.remaining() == 0 && !args.continuous {
            break;
        }
        if let Err(e) = session.step(&mut source) {
            warn!("Session error: {e}");
            break;
        }
        // pace the loop like a real frame callback would
        std::thread::sleep(frame_interval);
    }
    session.finish(Duration::from_secs(5));

    let stats = session.stats();
    info!(
        "Processed {} frames: {} fragments, {} dropped, {} decode errors",
        stats.frames_captured, stats.fragments_forwarded, stats.frames_dropped, stats.decode_errors
    );

    if stats.files_exported > 0 {
        info!(
            "Recovered {} file(s) into {}",
            stats.files_exported, config.export.output_dir
        );
    } else {
        warn!(
            "No file recovered: exports={}, reassembly_errors={}, export_errors={}",
            stats.files_exported, stats.reassembly_errors, stats.export_errors
        );
    }

    println!(
        "frames={} fragments={} files={} dropped={}",
        stats.frames_captured, stats.fragments_forwarded, stats.files_exported, stats.frames_dropped
    );
}

fn args_config(args: &Args) -> Result<FileConfig, framecast::capture::ConfigError> {
    match &args.config {
        Some(path) => FileConfig::from_file(path),
        None => Ok(FileConfig::default()),
    }
}
