//! Multi-camera composition: all-or-nothing startup, the display tick and
//! a bounded, idempotent shutdown.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{info, warn};
use thiserror::Error;
use vigil_camera::{CameraConnection, CameraId, CaptureDevice, CaptureDriver, OpenError};
use vigil_common::{any_intrusion, Detection, Event, Frame, LoopRole, Rect, SharedTelemetry};
use vigil_detect::Detector;

use crate::{
    capture_loop, inference_loop, CaptureOutcome, Display, FrameChannel, InferenceStats, Input,
    JoinOutcome, Overlay, PipelineConfig, RateCounter, Renderer, Worker,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no cameras configured")]
    NoCameras,
    #[error("detector for camera {camera} failed to load: {message}")]
    Detector { camera: CameraId, message: String },
    #[error(transparent)]
    Camera(#[from] OpenError),
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Builds one detector per camera, before any camera is opened.
pub type DetectorFactory<'a> = dyn FnMut(&CameraId) -> anyhow::Result<Box<dyn Detector>> + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShutdownReport {
    /// workers that returned before the deadline
    pub finished: usize,
    pub panicked: Vec<String>,
    /// workers abandoned at the deadline
    pub timed_out: Vec<String>,
    pub cameras_released: usize,
    pub elapsed: Duration,
}

struct Pipeline<D: CaptureDevice> {
    label: String,
    channel: Arc<FrameChannel>,
    stats: Arc<InferenceStats>,
    capture: Option<Worker<CaptureOutcome<D>>>,
    inference: Option<Worker<u64>>,
}

pub struct PipelineOrchestrator<D: CaptureDevice + 'static> {
    pipelines: Vec<Pipeline<D>>,
    selected: usize,
    rate: RateCounter,
    config: PipelineConfig,
    telemetry: SharedTelemetry,
    report: Option<ShutdownReport>,
}

impl<D: CaptureDevice + 'static> PipelineOrchestrator<D> {
    /// Load every detector, open every camera in order, then start two
    /// workers per camera.  If any camera fails to open, the ones already
    /// open are released and nothing is spawned.
    pub fn start<C>(
        driver: &C,
        cameras: &[CameraId],
        detectors: &mut DetectorFactory<'_>,
        config: PipelineConfig,
        telemetry: SharedTelemetry,
        abort: Option<&AtomicBool>,
    ) -> Result<Self, StartupError>
    where
        C: CaptureDriver<Device = D> + ?Sized,
    {
        if cameras.is_empty() {
            return Err(StartupError::NoCameras);
        }

        let mut models = Vec::with_capacity(cameras.len());
        for id in cameras {
            let model = detectors(id).map_err(|e| StartupError::Detector {
                camera: id.clone(),
                message: format!("{e:#}"),
            })?;
            telemetry.emit(Event::ModuleInit {
                module: "detector".into(),
                detail: format!("{} for camera {id}", model.name()),
            });
            models.push(model);
        }

        let mut connections: Vec<CameraConnection<D>> = Vec::with_capacity(cameras.len());
        for id in cameras {
            let opened = CameraConnection::open_cancellable(
                driver,
                id.clone(),
                &config.backends,
                &config.retry,
                &*telemetry,
                abort,
            );
            match opened {
                Ok(conn) => connections.push(conn),
                Err(e) => {
                    warn!("startup aborted: {e}; releasing {} open camera(s)", connections.len());
                    for mut conn in connections {
                        if conn.release() {
                            telemetry.emit(Event::CameraClosed {
                                camera: conn.id().to_string(),
                            });
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        let mut orchestrator = Self {
            pipelines: Vec::with_capacity(cameras.len()),
            selected: 0,
            rate: RateCounter::new(config.rate_window),
            config,
            telemetry,
            report: None,
        };
        for (index, (connection, model)) in connections.into_iter().zip(models).enumerate() {
            if let Err(e) = orchestrator.spawn_pipeline(index, connection, model) {
                orchestrator.shutdown();
                return Err(e);
            }
        }
        info!("{} pipeline(s) running", orchestrator.pipelines.len());
        Ok(orchestrator)
    }

    fn spawn_pipeline(
        &mut self,
        index: usize,
        connection: CameraConnection<D>,
        mut model: Box<dyn Detector>,
    ) -> Result<(), StartupError> {
        let label = connection.id().to_string();
        let channel = Arc::new(FrameChannel::new());
        let stats = Arc::new(InferenceStats::default());
        let idle = self.config.idle_sleep;
        let stride = self.config.stride;

        let capture = {
            let name = format!("capture-{index}");
            let (channel, telemetry, label) =
                (Arc::clone(&channel), Arc::clone(&self.telemetry), label.clone());
            Worker::spawn(name.clone(), move || {
                capture_loop(connection, &channel, idle, &label, &*telemetry)
            })
            .map_err(|source| StartupError::Spawn { name, source })?
        };

        // Registered before the second spawn so a failure there still
        // stops and joins the capture worker.
        self.pipelines.push(Pipeline {
            label: label.clone(),
            channel: Arc::clone(&channel),
            stats: Arc::clone(&stats),
            capture: Some(capture),
            inference: None,
        });

        let name = format!("inference-{index}");
        let telemetry = Arc::clone(&self.telemetry);
        let inference = Worker::spawn(name.clone(), move || {
            inference_loop(&mut *model, &channel, &stats, stride, idle, &label, &*telemetry)
        })
        .map_err(|source| StartupError::Spawn { name, source })?;
        if let Some(p) = self.pipelines.last_mut() {
            p.inference = Some(inference);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_label(&self) -> Option<&str> {
        self.pipelines.get(self.selected).map(|p| p.label.as_str())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn channel(&self, index: usize) -> Option<&Arc<FrameChannel>> {
        self.pipelines.get(index).map(|p| &p.channel)
    }

    pub fn stats(&self, index: usize) -> Option<&Arc<InferenceStats>> {
        self.pipelines.get(index).map(|p| &p.stats)
    }

    /// Displayed frames per second, updated once per rate window.
    pub fn display_rate(&self) -> f64 {
        self.rate.rate()
    }

    /// Advance the selection circularly.  Workers are not affected.
    pub fn switch_camera(&mut self) {
        if self.pipelines.len() < 2 {
            return;
        }
        let from = self.selected;
        self.selected = (self.selected + 1) % self.pipelines.len();
        self.telemetry.emit(Event::CameraSwitched {
            from: self.pipelines[from].label.clone(),
            to: self.pipelines[self.selected].label.clone(),
        });
    }

    /// One display step: show the selected camera's newest frame with its
    /// latest detections, then handle at most one input signal.
    pub fn tick<V, R>(&mut self, display: &mut V, renderer: &mut R) -> anyhow::Result<Tick>
    where
        V: Display + ?Sized,
        R: Renderer + ?Sized,
    {
        if let Some(p) = self.pipelines.get(self.selected) {
            if let Some(frame) = p.channel.snapshot_frame().frame {
                let rate = self.rate.update();
                let detections = p.channel.snapshot_detections();
                let shown = compose(
                    renderer,
                    &frame,
                    &detections,
                    rate,
                    false,
                    &p.label,
                    self.config.zone_ratio,
                );
                display.show(&p.label, &shown)?;
            }
        }

        match display.poll(self.config.poll_wait) {
            Input::None => Ok(Tick::Continue),
            Input::SwitchCamera => {
                self.switch_camera();
                Ok(Tick::Continue)
            }
            Input::Quit => {
                self.telemetry.emit(Event::QuitRequested {
                    reason: "quit key".into(),
                });
                self.show_farewell(display, renderer)?;
                Ok(Tick::Quit)
            }
        }
    }

    /// Render the freshest frame once more in "saving" mode and hold it.
    fn show_farewell<V, R>(&self, display: &mut V, renderer: &mut R) -> anyhow::Result<()>
    where
        V: Display + ?Sized,
        R: Renderer + ?Sized,
    {
        let Some(p) = self.pipelines.get(self.selected) else {
            return Ok(());
        };
        let Some(frame) = p.channel.snapshot_frame().frame else {
            return Ok(());
        };
        let detections = p.channel.snapshot_detections();
        let shown = compose(
            renderer,
            &frame,
            &detections,
            self.rate.rate(),
            true,
            &p.label,
            self.config.zone_ratio,
        );
        display.show(&p.label, &shown)?;
        // Input during the hold is ignored, quit is already decided.
        let _ = display.poll(self.config.farewell_hold);
        Ok(())
    }

    /// Tick until quit (or `abort`), then shut down and close the display.
    pub fn run<V, R>(
        &mut self,
        display: &mut V,
        renderer: &mut R,
        abort: Option<&AtomicBool>,
    ) -> anyhow::Result<ShutdownReport>
    where
        V: Display + ?Sized,
        R: Renderer + ?Sized,
    {
        let outcome = loop {
            if abort.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                self.telemetry.emit(Event::QuitRequested {
                    reason: "interrupt".into(),
                });
                break Ok(());
            }
            match self.tick(display, renderer) {
                Ok(Tick::Continue) => {}
                Ok(Tick::Quit) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let report = self.shutdown();
        let closed = display.close();
        outcome?;
        closed?;
        Ok(report)
    }

    /// Stop every pipeline, join every worker against one shared deadline,
    /// release the cameras of the loops that came back.  Safe to call more
    /// than once; later calls return the first report.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let started = Instant::now();
        for p in &self.pipelines {
            p.channel.request_stop();
        }
        let deadline = started + self.config.join_timeout;
        let mut report = ShutdownReport::default();
        let mut released = Vec::new();

        for p in &mut self.pipelines {
            if let Some(worker) = p.capture.take() {
                let name = worker.name().to_string();
                match worker.join_by(deadline) {
                    JoinOutcome::Finished(outcome) => {
                        report.finished += 1;
                        released.push((p.label.clone(), outcome.connection));
                    }
                    JoinOutcome::Panicked => report.panicked.push(name),
                    JoinOutcome::TimedOut => {
                        self.telemetry.emit(Event::ShutdownTimeout {
                            camera: p.label.clone(),
                            role: LoopRole::Capture,
                            waited: self.config.join_timeout,
                        });
                        report.timed_out.push(name);
                    }
                }
            }
            if let Some(worker) = p.inference.take() {
                let name = worker.name().to_string();
                match worker.join_by(deadline) {
                    JoinOutcome::Finished(_) => report.finished += 1,
                    JoinOutcome::Panicked => report.panicked.push(name),
                    JoinOutcome::TimedOut => {
                        self.telemetry.emit(Event::ShutdownTimeout {
                            camera: p.label.clone(),
                            role: LoopRole::Inference,
                            waited: self.config.join_timeout,
                        });
                        report.timed_out.push(name);
                    }
                }
            }
        }

        for (label, mut connection) in released {
            if connection.release() {
                report.cameras_released += 1;
                self.telemetry.emit(Event::CameraClosed { camera: label });
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "shutdown in {:?}: {} worker(s) joined, {} abandoned, {} panicked, {} camera(s) released",
            report.elapsed,
            report.finished,
            report.timed_out.len(),
            report.panicked.len(),
            report.cameras_released
        );
        self.report = Some(report.clone());
        report
    }
}

impl<D: CaptureDevice + 'static> Drop for PipelineOrchestrator<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn compose<R: Renderer + ?Sized>(
    renderer: &mut R,
    frame: &Frame,
    detections: &[Detection],
    rate: f64,
    saving: bool,
    label: &str,
    zone_ratio: f32,
) -> Frame {
    let zone = Rect::right_band(frame.width, frame.height, zone_ratio);
    let overlay = Overlay {
        detections,
        rate,
        detection_count: detections.len(),
        saving,
        camera_label: label,
        zone,
        intrusion: any_intrusion(detections, &zone),
    };
    renderer.render(frame, &overlay)
}
