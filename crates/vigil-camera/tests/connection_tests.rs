mod common;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use common::FakeDriver;
use serial_test::serial;
use vigil_camera::{
    Backend, BackendPreference, CameraConnection, CameraId, ConnectionState, OpenError,
    RetryPolicy, SyntheticDriver,
};
use vigil_common::MemoryTelemetry;

fn quick(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        retry_delay: Duration::from_millis(1),
    }
}

/// Preferred-backend opens fail until the `n`th one.
fn works_on_attempt(n: u32) -> FakeDriver {
    let preferred = Arc::new(AtomicU32::new(0));
    FakeDriver::new(move |_, backend| {
        backend == Some(Backend::V4l2) && preferred.fetch_add(1, Ordering::SeqCst) + 1 >= n
    })
}

#[test]
fn opens_first_try() {
    let driver = works_on_attempt(1);
    let telemetry = MemoryTelemetry::new();
    let conn = CameraConnection::open(
        &driver,
        CameraId::Index(0),
        &BackendPreference::new([Backend::V4l2]),
        &quick(3),
        &telemetry,
    )
    .unwrap();

    assert_eq!(conn.attempts(), 1);
    assert_eq!(conn.backend(), Backend::V4l2);
    assert!(conn.is_open());
    assert_eq!(telemetry.kinds(), vec!["CAMERA_OPENING", "CAMERA_OPEN"]);
}

#[test]
fn recovers_after_transient_failures() {
    let driver = works_on_attempt(3);
    let telemetry = MemoryTelemetry::new();
    let conn = CameraConnection::open(
        &driver,
        CameraId::Index(0),
        &BackendPreference::new([Backend::V4l2, Backend::Any]),
        &quick(5),
        &telemetry,
    )
    .unwrap();

    assert_eq!(conn.attempts(), 3);
    assert_eq!(
        telemetry.kinds(),
        vec![
            "CAMERA_OPENING",
            "RETRY_ATTEMPT",
            "RETRY_ATTEMPT",
            "CAMERA_OPEN"
        ]
    );
    drop(conn);
    assert_eq!(driver.outstanding(), 0);
}

#[test]
fn zero_retries_means_a_single_attempt() {
    let driver = FakeDriver::empty();
    let telemetry = MemoryTelemetry::new();
    let err = CameraConnection::open(
        &driver,
        CameraId::Index(0),
        &BackendPreference::new([Backend::V4l2]),
        &quick(0),
        &telemetry,
    )
    .unwrap_err();
    assert!(matches!(err, OpenError::Exhausted { attempts: 1, .. }));
    assert_eq!(telemetry.count("RETRY_ATTEMPT"), 0);
    assert_eq!(err.camera(), &CameraId::Index(0));
}

#[test]
#[serial]
fn abort_flag_cancels_a_long_wait() {
    let driver = FakeDriver::empty();
    let telemetry = MemoryTelemetry::new();
    let abort = Arc::new(AtomicBool::new(false));
    let policy = RetryPolicy {
        max_retries: 10,
        retry_delay: Duration::from_secs(10),
    };

    let flag = Arc::clone(&abort);
    let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        flag.store(true, Ordering::SeqCst);
    });

    let started = Instant::now();
    let err = CameraConnection::open_cancellable(
        &driver,
        CameraId::Index(0),
        &BackendPreference::new([Backend::V4l2]),
        &policy,
        &telemetry,
        Some(&abort),
    )
    .unwrap_err();
    setter.join().unwrap();

    assert!(matches!(err, OpenError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn release_is_idempotent_and_drop_does_not_double_release() {
    let driver = works_on_attempt(1);
    let telemetry = MemoryTelemetry::new();
    let mut conn = CameraConnection::open(
        &driver,
        CameraId::Index(0),
        &BackendPreference::new([Backend::V4l2]),
        &quick(0),
        &telemetry,
    )
    .unwrap();

    assert!(conn.read_frame().is_some());
    assert!(conn.release());
    assert!(!conn.release());
    assert_eq!(conn.state(), ConnectionState::Released);
    assert!(conn.read_frame().is_none());
    drop(conn);
    assert_eq!(driver.released(), 1);
}

#[test]
#[serial]
fn synthetic_camera_delivers_frames() {
    let driver = SyntheticDriver::new(64, 48, 200.0).with_camera(0);
    let telemetry = MemoryTelemetry::new();
    let mut conn = CameraConnection::open(
        &driver,
        CameraId::Index(0),
        &BackendPreference::default(),
        &quick(0),
        &telemetry,
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(1);
    let mut frames = 0;
    while frames < 3 && Instant::now() < deadline {
        if conn.read_frame().is_some() {
            frames += 1;
        } else {
            thread::sleep(Duration::from_millis(1));
        }
    }
    assert_eq!(frames, 3);
}
