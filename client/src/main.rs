// ================ vigil ================== //
// Multi-camera person detection with a warning zone.
//
//   settings (JSON + flags) ─► driver ─► PipelineOrchestrator
//                                          ├─ capture-N   threads
//                                          ├─ inference-N threads
//                                          └─ display tick (this thread)
//
// Build features:
//   opencv – real cameras + HighGUI window
//   tract  – YOLO ONNX inference
// ========================================= //

mod config;
mod display;
#[cfg(feature = "opencv")]
mod opencv_ui;
mod render;

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use vigil_camera::{Backend, CameraId, CaptureDriver, SyntheticDriver};
use vigil_common::{Event, LogTelemetry, SharedTelemetry};
use vigil_detect::{Detector, NullDetector};
use vigil_pipeline::{Display, PipelineOrchestrator, Renderer, ShutdownReport};

use crate::{config::Settings, display::HeadlessDisplay, render::BoxRenderer};

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about)]
struct Cli {
    /// JSON settings file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// camera index, /dev/videoN or URI (repeat for several cameras)
    #[arg(long = "camera", value_name = "ID")]
    cameras: Vec<CameraId>,

    /// backend order, e.g. `v4l2,gstreamer,any`
    #[arg(long, value_delimiter = ',')]
    backend: Vec<Backend>,

    #[arg(long)]
    max_retries: Option<u32>,

    /// seconds between open attempts
    #[arg(long)]
    retry_delay: Option<f64>,

    /// run the detector on every Nth captured frame
    #[arg(long)]
    stride: Option<u32>,

    #[arg(long)]
    conf: Option<f32>,

    #[arg(long)]
    imgsz: Option<u32>,

    /// COCO class id to keep (0 = person)
    #[arg(long)]
    class: Option<i32>,

    /// YOLO ONNX export
    #[arg(long)]
    model: Option<PathBuf>,

    /// warning zone starts at this fraction of the frame width
    #[arg(long)]
    zone_ratio: Option<f32>,

    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// use a generated test pattern instead of real cameras
    #[arg(long)]
    synthetic: bool,

    /// no window; the last frame is written to the snapshot dir on exit
    #[arg(long)]
    headless: bool,

    /// quit after this many seconds (headless only)
    #[arg(long)]
    run_for: Option<f64>,
}

impl Cli {
    fn settings(self) -> Result<Settings> {
        let mut s = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if !self.cameras.is_empty() {
            s.cameras = self.cameras;
        }
        if !self.backend.is_empty() {
            s.backends = Some(self.backend);
        }
        s.max_retries = self.max_retries.unwrap_or(s.max_retries);
        s.retry_delay_secs = self.retry_delay.unwrap_or(s.retry_delay_secs);
        s.stride = self.stride.unwrap_or(s.stride);
        s.confidence = self.conf.unwrap_or(s.confidence);
        s.input_size = self.imgsz.unwrap_or(s.input_size);
        s.target_class = self.class.unwrap_or(s.target_class);
        s.model = self.model.or(s.model);
        s.zone_ratio = self.zone_ratio.unwrap_or(s.zone_ratio);
        s.snapshot_dir = self.snapshot_dir.unwrap_or(s.snapshot_dir);
        s.synthetic |= self.synthetic;
        s.headless |= self.headless;
        s.run_for_secs = self.run_for.or(s.run_for_secs);
        Ok(s.validate()?)
    }
}

fn build_detector(settings: &Settings, id: &CameraId) -> Result<Box<dyn Detector>> {
    match &settings.model {
        #[cfg(feature = "tract")]
        Some(path) => {
            let yolo =
                vigil_detect::TractYolo::new(path, settings.input_size, settings.decode_config())
                    .with_context(|| format!("loading {} for camera {id}", path.display()))?;
            Ok(Box::new(yolo))
        }
        #[cfg(not(feature = "tract"))]
        Some(path) => {
            warn!("{} ignored: built without the `tract` feature", path.display());
            Ok(Box::new(NullDetector))
        }
        None => {
            warn!("no model configured; camera {id} runs without detection");
            Ok(Box::new(NullDetector))
        }
    }
}

fn make_display(settings: &Settings) -> Result<Box<dyn Display>> {
    #[cfg(feature = "opencv")]
    {
        if !settings.headless {
            return Ok(Box::new(opencv_ui::WindowDisplay::new(&settings.window_name)?));
        }
    }
    #[cfg(not(feature = "opencv"))]
    {
        if !settings.headless {
            warn!("built without the `opencv` feature; running headless");
        }
    }
    Ok(Box::new(HeadlessDisplay::new(&settings.snapshot_dir, settings.run_for())))
}

fn make_renderer(settings: &Settings) -> Box<dyn Renderer> {
    #[cfg(feature = "opencv")]
    {
        if !settings.headless {
            return Box::new(opencv_ui::OpenCvRenderer);
        }
    }
    let _ = settings;
    Box::new(BoxRenderer)
}

fn run_with<C>(
    driver: &C,
    settings: &Settings,
    telemetry: SharedTelemetry,
    abort: &AtomicBool,
) -> Result<ShutdownReport>
where
    C: CaptureDriver + ?Sized,
{
    let config = settings.pipeline_config()?;
    let mut factory = |id: &CameraId| build_detector(settings, id);
    let mut orchestrator = PipelineOrchestrator::start(
        driver,
        &settings.cameras,
        &mut factory,
        config,
        telemetry,
        Some(abort),
    )
    .context("startup failed")?;
    info!("cameras: {}", orchestrator.labels().join(", "));

    let mut display = make_display(settings)?;
    let mut renderer = make_renderer(settings);
    orchestrator.run(&mut display, &mut renderer, Some(abort))
}

fn run(
    settings: &Settings,
    telemetry: SharedTelemetry,
    abort: &AtomicBool,
) -> Result<ShutdownReport> {
    #[cfg(feature = "opencv")]
    {
        if !settings.synthetic {
            return run_with(&vigil_camera::opencv::OpenCvDriver, settings, telemetry, abort);
        }
    }
    #[cfg(not(feature = "opencv"))]
    {
        if !settings.synthetic {
            warn!("built without the `opencv` feature; using the synthetic test pattern");
        }
    }
    let driver =
        SyntheticDriver::new(640, 480, 30.0).with_cameras(settings.cameras.iter().cloned());
    run_with(&driver, settings, telemetry, abort)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Cli::parse().settings()?;

    let abort = Arc::new(AtomicBool::new(false));
    {
        let abort = Arc::clone(&abort);
        ctrlc::set_handler(move || abort.store(true, Ordering::SeqCst))
            .context("cannot install the Ctrl-C handler")?;
    }

    let telemetry: SharedTelemetry = Arc::new(LogTelemetry);
    telemetry.emit(Event::SystemStart);
    let outcome = run(&settings, Arc::clone(&telemetry), &abort);
    telemetry.emit(Event::SystemStop);

    match outcome {
        Ok(report) => {
            if !report.timed_out.is_empty() {
                warn!("abandoned worker(s): {}", report.timed_out.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            error!("{e:#}");
            Err(e)
        }
    }
}
