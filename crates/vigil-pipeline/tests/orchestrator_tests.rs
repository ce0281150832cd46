mod common;

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use common::{SlowDetector, TestDriver};
use serial_test::serial;
use vigil_camera::{CameraFault, CameraId, OpenError, RetryPolicy};
use vigil_common::{Frame, MemoryTelemetry, SharedTelemetry};
use vigil_detect::{Detector, NullDetector};
use vigil_pipeline::{
    Display, Input, Overlay, PipelineConfig, PipelineOrchestrator, Renderer, StartupError, Tick,
};

fn config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_retries: 1,
            retry_delay: Duration::from_millis(1),
        },
        farewell_hold: Duration::from_millis(10),
        ..PipelineConfig::default()
    }
}

fn cams(ids: &[i32]) -> Vec<CameraId> {
    ids.iter().copied().map(CameraId::Index).collect()
}

fn null_detectors(_: &CameraId) -> anyhow::Result<Box<dyn Detector>> {
    Ok(Box::new(NullDetector))
}

/// Replays scripted input and remembers what it was asked to show.
#[derive(Default)]
struct ScriptedDisplay {
    inputs: VecDeque<Input>,
    shown: Vec<String>,
    closed: bool,
}

impl Display for ScriptedDisplay {
    fn show(&mut self, camera_label: &str, _frame: &Frame) -> anyhow::Result<()> {
        self.shown.push(camera_label.to_string());
        Ok(())
    }

    fn poll(&mut self, wait: Duration) -> Input {
        thread::sleep(wait);
        self.inputs.pop_front().unwrap_or(Input::None)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingRenderer {
    saving: Vec<bool>,
    zones: Vec<i32>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &Frame, overlay: &Overlay<'_>) -> Frame {
        self.saving.push(overlay.saving);
        self.zones.push(overlay.zone.x1);
        frame.clone()
    }
}

fn wait_for_frames<D: vigil_camera::CaptureDevice>(orch: &PipelineOrchestrator<D>) {
    let deadline = Instant::now() + Duration::from_secs(2);
    for i in 0..orch.len() {
        while orch.channel(i).unwrap().seq() < 0 {
            assert!(Instant::now() < deadline, "no frames from pipeline {i}");
            thread::sleep(Duration::from_millis(1));
        }
    }
}

#[test]
fn no_cameras_is_rejected() {
    let driver = TestDriver::new(&[0]);
    let telemetry: SharedTelemetry = Arc::new(MemoryTelemetry::new());
    let err =
        PipelineOrchestrator::start(&driver, &[], &mut null_detectors, config(), telemetry, None)
            .err()
            .unwrap();
    assert!(matches!(err, StartupError::NoCameras));
}

#[test]
fn startup_is_all_or_nothing() {
    // cameras 0 and 1 work, 5 does not
    let driver = TestDriver::new(&[0, 1]);
    let memory = Arc::new(MemoryTelemetry::new());
    let telemetry: SharedTelemetry = memory.clone();

    let err = PipelineOrchestrator::start(
        &driver,
        &cams(&[0, 1, 5]),
        &mut null_detectors,
        config(),
        telemetry,
        None,
    )
    .err()
    .unwrap();

    match err {
        StartupError::Camera(OpenError::Exhausted { camera, attempts, diagnosis }) => {
            assert_eq!(camera, CameraId::Index(5));
            assert_eq!(attempts, 2);
            assert_eq!(diagnosis.fault(), Some(CameraFault::DeviceNotFound));
        }
        other => panic!("unexpected {other:?}"),
    }
    // both earlier cameras opened, plus diagnosis probes, and all came back
    assert_eq!(driver.opened(), driver.released());
    assert_eq!(memory.count("CAMERA_CLOSE"), 2);
    assert_eq!(memory.count("LOOP_START"), 0, "nothing may be spawned");
}

#[test]
fn detector_failure_happens_before_any_camera_opens() {
    let driver = TestDriver::new(&[0, 1]);
    let telemetry: SharedTelemetry = Arc::new(MemoryTelemetry::new());
    let mut calls = 0;
    let mut factory = |id: &CameraId| -> anyhow::Result<Box<dyn Detector>> {
        calls += 1;
        match id {
            CameraId::Index(1) => anyhow::bail!("model file missing"),
            _ => Ok(Box::new(NullDetector)),
        }
    };

    let err = PipelineOrchestrator::start(
        &driver,
        &cams(&[0, 1]),
        &mut factory,
        config(),
        telemetry,
        None,
    )
    .err()
    .unwrap();
    assert!(matches!(err, StartupError::Detector { .. }));
    assert!(err.to_string().contains("model file missing"));
    assert_eq!(calls, 2);
    assert_eq!(driver.opened(), 0);
}

#[test]
fn cancelled_startup_releases_opened_cameras() {
    let driver = TestDriver::new(&[0]);
    let telemetry: SharedTelemetry = Arc::new(MemoryTelemetry::new());
    let abort = AtomicBool::new(false);
    let cfg = PipelineConfig {
        retry: RetryPolicy {
            max_retries: 100,
            retry_delay: Duration::from_secs(30),
        },
        ..config()
    };

    let started = Instant::now();
    let err = thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(100));
            abort.store(true, Ordering::SeqCst);
        });
        PipelineOrchestrator::start(
            &driver,
            &cams(&[0, 3]),
            &mut null_detectors,
            cfg,
            telemetry,
            Some(&abort),
        )
        .err()
        .unwrap()
    });
    assert!(matches!(err, StartupError::Camera(OpenError::Cancelled { .. })));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(driver.opened(), driver.released());
}

#[test]
#[serial]
fn switch_wraps_around_and_quit_shows_saving_frame() {
    let driver = TestDriver::new(&[0, 1]);
    let memory = Arc::new(MemoryTelemetry::new());
    let telemetry: SharedTelemetry = memory.clone();
    let mut orch = PipelineOrchestrator::start(
        &driver,
        &cams(&[0, 1]),
        &mut null_detectors,
        config(),
        telemetry,
        None,
    )
    .unwrap();
    wait_for_frames(&orch);

    let mut display = ScriptedDisplay {
        inputs: VecDeque::from([Input::SwitchCamera, Input::SwitchCamera, Input::None]),
        ..ScriptedDisplay::default()
    };
    let mut renderer = RecordingRenderer::default();

    assert_eq!(orch.tick(&mut display, &mut renderer).unwrap(), Tick::Continue);
    assert_eq!(orch.selected(), 1);
    assert_eq!(orch.tick(&mut display, &mut renderer).unwrap(), Tick::Continue);
    assert_eq!(orch.selected(), 0, "selection wraps");
    assert_eq!(orch.tick(&mut display, &mut renderer).unwrap(), Tick::Continue);
    assert_eq!(display.shown, vec!["#0", "#1", "#0"]);
    assert_eq!(memory.count("CAMERA_SWITCH"), 2);

    display.inputs.push_back(Input::Quit);
    assert_eq!(orch.tick(&mut display, &mut renderer).unwrap(), Tick::Quit);
    assert_eq!(renderer.saving.last(), Some(&true));
    assert_eq!(renderer.saving.iter().filter(|s| **s).count(), 1);
    assert_eq!(renderer.zones[0], 6, "right 20% of an 8 px frame");
    assert_eq!(memory.count("USER_INPUT"), 1);

    let report = orch.shutdown();
    assert!(report.timed_out.is_empty());
    assert_eq!(report.finished, 4);
    assert_eq!(report.cameras_released, 2);
    assert_eq!(driver.released(), 2);
}

#[test]
#[serial]
fn pipeline_stats_are_readable_while_running() {
    let driver = TestDriver::new(&[0, 1]);
    let telemetry: SharedTelemetry = Arc::new(MemoryTelemetry::new());
    let mut orch = PipelineOrchestrator::start(
        &driver,
        &cams(&[0, 1]),
        &mut null_detectors,
        config(),
        telemetry,
        None,
    )
    .unwrap();
    wait_for_frames(&orch);

    assert_eq!(orch.labels(), vec!["#0", "#1"]);
    assert_eq!(orch.selected_label(), Some("#0"));
    assert_eq!(orch.display_rate(), 0.0, "no rate window has closed yet");
    assert!(orch.stats(2).is_none());

    let deadline = Instant::now() + Duration::from_secs(2);
    for i in 0..orch.len() {
        let stats = orch.stats(i).unwrap();
        while stats.invocations() == 0 || stats.last_seq() < 0 {
            assert!(Instant::now() < deadline, "pipeline {i} never ran inference");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(stats.last_seq() >= 0);
        assert!(stats.last_seq() <= orch.channel(i).unwrap().seq());
        assert_eq!(stats.failures(), 0);
    }

    orch.switch_camera();
    assert_eq!(orch.selected_label(), Some("#1"));
    assert_eq!(orch.shutdown().cameras_released, 2);
}

#[test]
#[serial]
fn run_stops_on_abort_and_closes_display() {
    let driver = TestDriver::new(&[0]);
    let telemetry: SharedTelemetry = Arc::new(MemoryTelemetry::new());
    let mut orch = PipelineOrchestrator::start(
        &driver,
        &cams(&[0]),
        &mut null_detectors,
        config(),
        telemetry,
        None,
    )
    .unwrap();

    let abort = AtomicBool::new(false);
    let mut display = ScriptedDisplay::default();
    let report = thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(100));
            abort.store(true, Ordering::SeqCst);
        });
        orch.run(&mut display, &mut vigil_pipeline::PassthroughRenderer, Some(&abort))
    })
    .unwrap();

    assert!(display.closed);
    assert!(!display.shown.is_empty());
    assert_eq!(report.cameras_released, 1);
}

#[test]
#[serial]
fn shutdown_is_bounded_with_a_stuck_detector() {
    let driver = TestDriver::new(&[0, 1]);
    let memory = Arc::new(MemoryTelemetry::new());
    let telemetry: SharedTelemetry = memory.clone();
    let mut stuck = |_: &CameraId| -> anyhow::Result<Box<dyn Detector>> {
        Ok(Box::new(SlowDetector {
            delay: Duration::from_secs(4),
        }))
    };
    let mut orch =
        PipelineOrchestrator::start(&driver, &cams(&[0, 1]), &mut stuck, config(), telemetry, None)
            .unwrap();
    wait_for_frames(&orch);
    // both inference loops are now inside predict()
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let report = orch.shutdown();
    let took = started.elapsed();

    assert!(took < Duration::from_millis(1_500), "shutdown took {took:?}");
    assert_eq!(report.timed_out, vec!["inference-0", "inference-1"]);
    assert_eq!(report.finished, 2, "capture loops exit promptly");
    assert_eq!(report.cameras_released, 2);
    assert_eq!(memory.count("SHUTDOWN_TIMEOUT"), 2);

    // idempotent
    let again = orch.shutdown();
    assert_eq!(again, report);
    assert_eq!(driver.released(), 2);
    drop(orch);
    assert_eq!(driver.released(), 2);
}

#[test]
#[serial]
fn stuck_camera_is_abandoned_and_released_when_its_read_returns() {
    let driver = TestDriver::new(&[0]).with_read_delay(Duration::from_millis(1_500));
    let telemetry: SharedTelemetry = Arc::new(MemoryTelemetry::new());
    let mut orch = PipelineOrchestrator::start(
        &driver,
        &cams(&[0]),
        &mut null_detectors,
        config(),
        telemetry,
        None,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let report = orch.shutdown();
    assert!(started.elapsed() < Duration::from_millis(1_400));
    assert_eq!(report.timed_out, vec!["capture-0"]);
    assert_eq!(report.cameras_released, 0);

    // the abandoned loop finishes its read, sees the stop flag and the
    // connection it returns is released on drop
    let deadline = Instant::now() + Duration::from_secs(3);
    while driver.released() == 0 {
        assert!(Instant::now() < deadline, "camera never released");
        thread::sleep(Duration::from_millis(10));
    }
}
