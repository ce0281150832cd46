//! Real devices through OpenCV's videoio module.

use log::{debug, warn};
use opencv::{
    core::{self, Mat, Scalar},
    prelude::*,
    videoio::{self, VideoCapture},
};
use vigil_common::Frame;

use crate::{device_node_presence, Backend, CameraId, CaptureDevice, CaptureDriver, Presence};

fn api_preference(backend: Option<Backend>) -> i32 {
    match backend {
        None | Some(Backend::Any) => videoio::CAP_ANY,
        Some(Backend::DirectShow) => videoio::CAP_DSHOW,
        Some(Backend::MediaFoundation) => videoio::CAP_MSMF,
        Some(Backend::V4l2) => videoio::CAP_V4L2,
        Some(Backend::GStreamer) => videoio::CAP_GSTREAMER,
        Some(Backend::AvFoundation) => videoio::CAP_AVFOUNDATION,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvDriver;

impl CaptureDriver for OpenCvDriver {
    type Device = OpenCvCamera;

    fn open(&self, id: &CameraId, backend: Option<Backend>) -> Option<OpenCvCamera> {
        let api = api_preference(backend);
        let opened = match id {
            CameraId::Index(i) => VideoCapture::new(*i, api),
            CameraId::Uri(uri) => VideoCapture::from_file(uri, api),
        };
        let mut cap = match opened {
            Ok(cap) => cap,
            Err(e) => {
                debug!("VideoCapture({id}, api {api}) failed: {e}");
                return None;
            }
        };
        if !cap.is_opened().unwrap_or(false) {
            let _ = cap.release();
            return None;
        }
        // A single-frame buffer keeps reads fresh; not every backend honours it.
        if let Err(e) = cap.set(videoio::CAP_PROP_BUFFERSIZE, 1.0) {
            debug!("camera {id}: buffer size not settable: {e}");
        }
        Some(OpenCvCamera {
            cap,
            mat: Mat::default(),
            released: false,
        })
    }

    fn presence(&self, id: &CameraId) -> Presence {
        device_node_presence(id)
    }
}

pub struct OpenCvCamera {
    cap: VideoCapture,
    mat: Mat,
    released: bool,
}

impl CaptureDevice for OpenCvCamera {
    fn read(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        match self.cap.read(&mut self.mat) {
            Ok(true) => mat_to_frame(&self.mat),
            Ok(false) => None,
            Err(e) => {
                debug!("read failed: {e}");
                None
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.cap.release() {
            warn!("VideoCapture::release failed: {e}");
        }
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        self.release();
    }
}

/// Copy an 8-bit OpenCV image into a [`Frame`].  `None` for empty or
/// non-8-bit mats.
pub fn mat_to_frame(mat: &Mat) -> Option<Frame> {
    if mat.empty() || mat.depth() != core::CV_8U {
        return None;
    }
    let owned;
    let src = if mat.is_continuous() {
        mat
    } else {
        owned = mat.try_clone().ok()?;
        &owned
    };
    let data = src.data_bytes().ok()?.to_vec();
    Frame::new(
        src.cols() as u32,
        src.rows() as u32,
        src.channels() as u8,
        data,
    )
    .ok()
}

/// Copy a [`Frame`] into a freshly allocated OpenCV image.
pub fn frame_to_mat(frame: &Frame) -> opencv::Result<Mat> {
    let typ = match frame.channels {
        1 => core::CV_8UC1,
        4 => core::CV_8UC4,
        _ => core::CV_8UC3,
    };
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height as i32,
        frame.width as i32,
        typ,
        Scalar::all(0.0),
    )?;
    let dst = mat.data_bytes_mut()?;
    let n = dst.len().min(frame.data.len());
    dst[..n].copy_from_slice(&frame.data[..n]);
    Ok(mat)
}
