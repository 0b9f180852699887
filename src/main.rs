use anyhow::{anyhow, Context as AnyhowContext, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::ProgressStyle;
use tracing::info;
use tracing::info_span;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use region_motion::config::*;
use region_motion::frame::FrameSource;
use region_motion::optical_flow::OpticalFlow;
use region_motion::tracker::{run, Tracker};
use region_motion::video::VideoSource;
use region_motion::visualization::RerunSurface;

#[derive(Parser)]
pub struct Args {
    /// video file or capture device index
    #[clap(short, default_value = "0")]
    pub input: String,
    #[clap(long, default_value = "./logs/region_motion.rrd")]
    pub recording: PathBuf,
    /// write one JSON line per tick
    #[clap(long)]
    pub report: Option<PathBuf>,
    #[clap(flatten)]
    pub config: Config,
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();
    let _ = CONFIG.set(args.config);
    let config = CONFIG.get().ok_or(anyhow!("config not initialized"))?;

    // setup logging
    let level: LevelFilter = config
        .log_level
        .parse()
        .map_err(|_| anyhow!("invalid log level {}", config.log_level))?;
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(indicatif_layer.get_stdout_writer())
                .with_filter(level),
        )
        .with(indicatif_layer)
        .init();

    let mut source = VideoSource::open(&args.input, config.region())?;
    let mut surface = RerunSurface::save(&args.recording)
        .with_context(|| format!("cannot create recording {}", args.recording.display()))?;
    let mut report = match &args.report {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => None,
    };

    let rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let mut tracker = Tracker::new(
        OpticalFlow::new(config.optical_flow_params()),
        config.tracker_params(),
        rng,
    )?;

    // pressing enter stops the loop at the next tick
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
            cancel.store(true, Ordering::Relaxed);
        });
    }

    let header_span = info_span!("header");
    header_span.pb_set_style(&ProgressStyle::default_bar());
    if let Some(length) = source.frame_count() {
        header_span.pb_set_length(length);
    }
    let header_span_enter = header_span.enter();

    let summary = run(
        &mut tracker,
        &mut source,
        &mut surface,
        &cancel,
        report.as_mut().map(|w| w as &mut dyn Write),
    )?;

    std::mem::drop(header_span_enter);
    std::mem::drop(header_span);

    info!(
        ticks = summary.ticks,
        moving_ticks = summary.moving_ticks,
        "done, accumulated motion ({:.1}, {:.1})",
        summary.total.dx,
        summary.total.dy
    );

    Ok(())
}
