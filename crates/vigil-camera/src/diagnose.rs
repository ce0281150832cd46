//! Failure diagnosis for a camera that would not open.
//!
//! Diagnosis opens short-lived probe handles.  Every probe lives inside a
//! [`Probe`] guard so the handle is released on every exit path, including
//! early returns and panics inside a driver.

use std::ops::RangeInclusive;

use log::debug;

use crate::{
    Backend, BackendPreference, CameraFault, CameraId, CaptureDevice, CaptureDriver, Diagnosis,
    Presence,
};

/// Device indices scanned when looking for any working camera.
pub const PROBE_INDICES: RangeInclusive<i32> = 0..=2;

struct Probe<D: CaptureDevice> {
    device: D,
}

impl<D: CaptureDevice> Drop for Probe<D> {
    fn drop(&mut self) {
        self.device.release();
    }
}

/// Open and immediately release.  Returns whether the open succeeded.
fn probe<C: CaptureDriver + ?Sized>(driver: &C, id: &CameraId, backend: Option<Backend>) -> bool {
    let opened = driver.open(id, backend).map(|device| Probe { device });
    let ok = opened.is_some();
    debug!(
        "probe {id} via {}: {}",
        backend.map_or("no hint", Backend::name),
        if ok { "ok" } else { "failed" }
    );
    ok
}

/// Classify why `id` did not open with the preferred backend.
///
/// 1. no backend hint works          -> [`Diagnosis::BackendMismatch`]
/// 2. a fallback backend works       -> `BackendError`
/// 3. driver presence hint, if any   -> `PermissionDenied` / `DeviceNotFound`
/// 4. scan [`PROBE_INDICES`]:
///    nothing anywhere, device node present   -> `DeviceBusy`;
///    nothing anywhere, or only other indices -> `DeviceNotFound`;
///    the requested index answers the scan    -> `DeviceBusy`;
///    a URI with some local camera present    -> `Unknown`.
pub fn diagnose<C: CaptureDriver + ?Sized>(
    driver: &C,
    id: &CameraId,
    preference: &BackendPreference,
) -> Diagnosis {
    if probe(driver, id, None) {
        return Diagnosis::BackendMismatch;
    }

    for &backend in preference.fallbacks() {
        if probe(driver, id, Some(backend)) {
            return Diagnosis::Fault(CameraFault::BackendError);
        }
    }

    let node_present = match driver.presence(id) {
        Presence::NoAccess => return Diagnosis::Fault(CameraFault::PermissionDenied),
        Presence::Absent => return Diagnosis::Fault(CameraFault::DeviceNotFound),
        Presence::Present => true,
        Presence::Unknown => false,
    };

    let mut found = Vec::new();
    for index in PROBE_INDICES {
        if probe(driver, &CameraId::Index(index), None) {
            found.push(index);
        }
    }

    // A node with no sibling camera answering is most likely held elsewhere.
    // Metadata nodes next to a working camera (UVC video0/video1) are not.
    let fault = match (id.index(), found.is_empty()) {
        (_, true) if node_present => CameraFault::DeviceBusy,
        (_, true) => CameraFault::DeviceNotFound,
        // Best effort: only reachable when the device frees up between the
        // no-hint probe above and the scan.
        (Some(requested), false) if found.contains(&requested) => CameraFault::DeviceBusy,
        (Some(_), false) => CameraFault::DeviceNotFound,
        (None, false) => CameraFault::Unknown,
    };
    Diagnosis::Fault(fault)
}
