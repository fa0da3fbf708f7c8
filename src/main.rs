use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use opencv::{core::Mat, highgui, prelude::*, videoio};
use tracing_subscriber::EnvFilter;

use trafficmap::{source::DumpReader, Config, TrafficMap};

#[derive(Parser, Debug)]
#[command(name = "trafficmap", about = "Draw detector tracks onto a traffic map")]
struct Args {
    /// Detector dump, one `<frame>: <json>` line per frame
    #[arg(long, value_name = "PATH")]
    detections: PathBuf,
    /// JSON configuration; built-in calibration when absent
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Map background image, overrides the configuration
    #[arg(long, value_name = "PATH")]
    background: Option<PathBuf>,
    /// Write the rendered map to this video file
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Source video frame rate, overrides the configuration
    #[arg(long)]
    fps: Option<f64>,
    /// Draw on a plain canvas instead of fetching basemap tiles
    #[arg(long)]
    offline: bool,
    /// Do not open a display window
    #[arg(long)]
    headless: bool,
    /// Log throughput every N frames
    #[arg(long, default_value_t = 100)]
    log_every: u64,
}

struct VideoWriter {
    writer: Option<videoio::VideoWriter>,
    size: Option<(i32, i32)>,
    out_file: String,
    fps: f64,
}

impl VideoWriter {
    fn new<S: ToString>(out_file: S, fps: f64) -> Self {
        Self {
            writer: None,
            size: None,
            out_file: out_file.to_string(),
            fps,
        }
    }

    fn release(&mut self) -> Result<()> {
        if let Some(mut w) = self.writer.take() {
            w.release()?;
        }
        Ok(())
    }

    fn reinit(&mut self, size: (i32, i32)) -> Result<()> {
        tracing::info!(width = size.0, height = size.1, "opening video writer");
        self.release()?;

        self.size = Some(size);
        self.writer = Some(
            videoio::VideoWriter::new(
                &self.out_file,
                videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?,
                self.fps,
                opencv::core::Size::new(size.0, size.1),
                true,
            )
            .with_context(|| format!("failed to open {}", self.out_file))?,
        );
        Ok(())
    }

    fn feed(&mut self, m: &Mat) -> Result<()> {
        let size = (m.cols(), m.rows());

        if self.writer.is_none() || self.size != Some(size) {
            self.reinit(size)?;
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.write(m)?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    run(Args::parse())
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(background) = args.background {
        config.background = Some(background);
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if args.offline {
        config.basemap = None;
    }

    let mut map = TrafficMap::new(&config).context("failed to set up traffic map")?;
    let reader = DumpReader::open(&args.detections)
        .with_context(|| format!("failed to open {}", args.detections.display()))?;

    let mut writer = args
        .output
        .as_ref()
        .map(|path| VideoWriter::new(path.display(), config.fps));

    let window = "Traffic Map";
    if !args.headless {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
    }

    let mut skipped = 0;
    let mut begin = Instant::now();
    let mut last_logged = 0;

    for frame in reader {
        let frame = frame.context("failed to read detections")?;
        let (stats, refresh) = map.process(&frame)?;
        skipped += stats.skipped;

        if let Some(writer) = writer.as_mut() {
            writer.feed(&refresh.raster)?;
        }

        if !args.headless {
            highgui::imshow(window, &refresh.raster)?;

            let key = highgui::wait_key(1)?;
            if key == 27 || key == 'q' as i32 {
                tracing::info!(frame = frame.number, "stopped by user");
                break;
            }
        }

        if args.log_every > 0 && frame.number - last_logged >= args.log_every {
            let elapsed = begin.elapsed().as_secs_f64();
            let rate = (frame.number - last_logged) as f64 / elapsed.max(f64::EPSILON);

            tracing::info!(
                frame = frame.number,
                active = map.store().len(),
                vehicles = refresh.counts.total(),
                skipped,
                "{:.1} frames/s",
                rate
            );

            last_logged = frame.number;
            begin = Instant::now();
        }
    }

    if let Some(writer) = writer.as_mut() {
        writer.release()?;
    }

    Ok(())
}
