use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame must have at least one channel")]
    ZeroChannels,
    #[error("buffer holds {actual} bytes, {width}x{height}x{channels} needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },
}

/// A captured frame: tightly packed, row-major, interleaved channels
/// (BGR for the OpenCV and synthetic drivers).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap an existing buffer, checking that it matches the geometry.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, FrameError> {
        if channels == 0 {
            return Err(FrameError::ZeroChannels);
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                channels,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
            captured_at: Instant::now(),
        })
    }

    /// Frame with every byte set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Self {
        let len = width as usize * height as usize * channels.max(1) as usize;
        Self {
            data: vec![value; len],
            width,
            height,
            channels: channels.max(1),
            captured_at: Instant::now(),
        }
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Channel values of one pixel, `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y as usize * self.stride() + x as usize * self.channels as usize;
        self.data.get(start..start + self.channels as usize)
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels as usize;
        let start = y as usize * self.stride() + x as usize * channels;
        self.data.get_mut(start..start + channels)
    }
}
