use std::{thread, time::Duration};

use log::trace;
use vigil_camera::{CameraConnection, CaptureDevice};
use vigil_common::{Event, LoopRole, Telemetry};

use crate::FrameChannel;

/// What a finished capture loop hands back: the still-open connection
/// (release belongs to shutdown) and how many frames it published.
#[derive(Debug)]
pub struct CaptureOutcome<D: CaptureDevice> {
    pub connection: CameraConnection<D>,
    pub frames: u64,
}

/// Producer: read, publish, repeat until the channel is stopped.
///
/// A failed or not-ready read sleeps `idle` and tries again without
/// touching the sequence number.  Nothing is buffered, an unread frame is
/// simply overwritten by the next one.
pub fn capture_loop<D: CaptureDevice>(
    mut connection: CameraConnection<D>,
    channel: &FrameChannel,
    idle: Duration,
    label: &str,
    telemetry: &dyn Telemetry,
) -> CaptureOutcome<D> {
    telemetry.emit(Event::LoopStarted {
        camera: label.to_string(),
        role: LoopRole::Capture,
    });

    let mut frames = 0u64;
    while !channel.stopped() {
        match connection.read_frame() {
            Some(frame) => {
                let seq = channel.publish_frame(frame);
                frames += 1;
                if frames % 100 == 0 {
                    trace!("{label}: {frames} frames captured (seq {seq})");
                }
            }
            None => thread::sleep(idle),
        }
    }

    telemetry.emit(Event::LoopStopped {
        camera: label.to_string(),
        role: LoopRole::Capture,
        iterations: frames,
    });
    CaptureOutcome { connection, frames }
}
