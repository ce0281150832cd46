//! CameraConnection: one opened video source plus the bounded
//! open-with-retry state machine that produced it.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use vigil_common::{Event, Frame, Telemetry};

use crate::{
    diagnose, Backend, BackendPreference, CameraId, CaptureDevice, CaptureDriver, Diagnosis,
    OpenError,
};

/// Granularity of the cancellable retry wait.
const WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Re-opens after the first failed attempt.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Released,
}

/// States of the open sequence.  `Exhausted` is terminal.
#[derive(Debug)]
enum Step {
    Attempting { attempt: u32 },
    Diagnosing { attempt: u32 },
    Waiting { attempt: u32 },
    Exhausted { attempts: u32, diagnosis: Diagnosis },
}

pub struct CameraConnection<D: CaptureDevice> {
    id: CameraId,
    backend: Backend,
    attempts: u32,
    device: D,
    state: ConnectionState,
}

impl<D: CaptureDevice> std::fmt::Debug for CameraConnection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraConnection")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .field("attempts", &self.attempts)
            .field("state", &self.state)
            .finish()
    }
}

impl<D: CaptureDevice> CameraConnection<D> {
    /// Open `id` with the preferred backend, diagnosing and retrying on
    /// failure.  Blocks for up to `max_retries * retry_delay`.
    pub fn open<C>(
        driver: &C,
        id: CameraId,
        preference: &BackendPreference,
        policy: &RetryPolicy,
        telemetry: &dyn Telemetry,
    ) -> Result<Self, OpenError>
    where
        C: CaptureDriver<Device = D> + ?Sized,
    {
        Self::open_cancellable(driver, id, preference, policy, telemetry, None)
    }

    /// Like [`CameraConnection::open`], but gives up with
    /// [`OpenError::Cancelled`] as soon as `abort` is set.
    pub fn open_cancellable<C>(
        driver: &C,
        id: CameraId,
        preference: &BackendPreference,
        policy: &RetryPolicy,
        telemetry: &dyn Telemetry,
        abort: Option<&AtomicBool>,
    ) -> Result<Self, OpenError>
    where
        C: CaptureDriver<Device = D> + ?Sized,
    {
        let backend = preference.preferred();
        let max_attempts = policy.max_attempts();
        let cancelled = || abort.is_some_and(|flag| flag.load(Ordering::SeqCst));

        telemetry.emit(Event::CameraOpening {
            camera: id.to_string(),
            backend: backend.to_string(),
            max_retries: policy.max_retries,
        });

        let mut step = Step::Attempting { attempt: 1 };
        loop {
            step = match step {
                Step::Attempting { attempt } => {
                    if cancelled() {
                        return Err(OpenError::Cancelled { camera: id });
                    }
                    match driver.open(&id, Some(backend)) {
                        Some(device) => {
                            info!("camera {id} opened via {backend} (attempt {attempt})");
                            telemetry.emit(Event::CameraOpened {
                                camera: id.to_string(),
                                backend: backend.to_string(),
                                attempts: attempt,
                            });
                            return Ok(Self {
                                id,
                                backend,
                                attempts: attempt,
                                device,
                                state: ConnectionState::Open,
                            });
                        }
                        None => Step::Diagnosing { attempt },
                    }
                }

                Step::Diagnosing { attempt } => {
                    let diagnosis = diagnose(driver, &id, preference);
                    debug!("camera {id} attempt {attempt}/{max_attempts}: {diagnosis}");
                    if diagnosis == Diagnosis::BackendMismatch {
                        telemetry.emit(Event::BackendMismatch {
                            camera: id.to_string(),
                            preferred: backend.to_string(),
                        });
                    }
                    if attempt >= max_attempts {
                        Step::Exhausted {
                            attempts: attempt,
                            diagnosis,
                        }
                    } else {
                        warn!(
                            "camera {id}: {} - {}; retrying in {:.1}s",
                            diagnosis.name(),
                            diagnosis.hint(),
                            policy.retry_delay.as_secs_f64()
                        );
                        telemetry.emit(Event::RetryAttempt {
                            camera: id.to_string(),
                            attempt,
                            max_retries: policy.max_retries,
                            fault: diagnosis.name().to_string(),
                            message: diagnosis.hint().to_string(),
                        });
                        Step::Waiting { attempt }
                    }
                }

                Step::Waiting { attempt } => {
                    if !wait(policy.retry_delay, abort) {
                        return Err(OpenError::Cancelled { camera: id });
                    }
                    Step::Attempting {
                        attempt: attempt + 1,
                    }
                }

                Step::Exhausted {
                    attempts,
                    diagnosis,
                } => {
                    telemetry.emit(Event::CameraError {
                        camera: id.to_string(),
                        message: format!(
                            "{} after {attempts} attempt(s): {}",
                            diagnosis.name(),
                            diagnosis.hint()
                        ),
                    });
                    return Err(OpenError::Exhausted {
                        camera: id,
                        attempts,
                        diagnosis,
                    });
                }
            };
        }
    }

    pub fn id(&self) -> &CameraId {
        &self.id
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// How many open attempts it took, 1 meaning first try.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// `None` when no frame is ready, the read failed, or the connection
    /// has been released.
    pub fn read_frame(&mut self) -> Option<Frame> {
        match self.state {
            ConnectionState::Open => self.device.read(),
            ConnectionState::Released => None,
        }
    }

    /// Release the device.  Returns `true` only for the call that actually
    /// released it; later calls are no-ops.
    pub fn release(&mut self) -> bool {
        match self.state {
            ConnectionState::Open => {
                self.device.release();
                self.state = ConnectionState::Released;
                debug!("camera {} released", self.id);
                true
            }
            ConnectionState::Released => false,
        }
    }
}

impl<D: CaptureDevice> Drop for CameraConnection<D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Sleep for `delay` in slices, returning `false` if `abort` got set.
fn wait(delay: Duration, abort: Option<&AtomicBool>) -> bool {
    let Some(flag) = abort else {
        thread::sleep(delay);
        return true;
    };
    let deadline = Instant::now() + delay;
    loop {
        if flag.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(WAIT_SLICE.min(deadline - now));
    }
}
