//! Incoming camera frames and their conversion to grayscale.

use charuco_pose_core::FrameHeader;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Pixel layout of an [`ImageFrame`] buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Mono8,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
}

impl Encoding {
    pub fn channels(self) -> usize {
        match self {
            Self::Mono8 => 1,
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    /// Parse a transport encoding name such as `"bgr8"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mono8" | "8uc1" => Some(Self::Mono8),
            "rgb8" => Some(Self::Rgb8),
            "bgr8" | "8uc3" => Some(Self::Bgr8),
            "rgba8" => Some(Self::Rgba8),
            "bgra8" | "8uc4" => Some(Self::Bgra8),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("frame buffer has {got} bytes, {expected} expected for {encoding:?}")]
    BufferLength {
        encoding: Encoding,
        expected: usize,
        got: usize,
    },
}

/// One image event from the camera stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub header: FrameHeader,
    pub width: u32,
    pub height: u32,
    pub encoding: Encoding,
    /// Tightly packed rows.
    pub data: Vec<u8>,
}

impl ImageFrame {
    pub fn new(header: FrameHeader, width: u32, height: u32, encoding: Encoding, data: Vec<u8>) -> Self {
        Self {
            header,
            width,
            height,
            encoding,
            data,
        }
    }

    /// Wrap an 8-bit grayscale image.
    pub fn from_gray(header: FrameHeader, image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(header, width, height, Encoding::Mono8, image.into_raw())
    }

    fn check(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::Empty {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.width as usize * self.height as usize * self.encoding.channels();
        if self.data.len() != expected {
            return Err(FrameError::BufferLength {
                encoding: self.encoding,
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Convert to single-channel 8-bit grayscale.
    pub fn to_grayscale(&self) -> Result<GrayImage, FrameError> {
        self.check()?;
        let (w, h) = (self.width, self.height);
        let length_error = || FrameError::BufferLength {
            encoding: self.encoding,
            expected: w as usize * h as usize * self.encoding.channels(),
            got: self.data.len(),
        };

        let gray = match self.encoding {
            Encoding::Mono8 => GrayImage::from_raw(w, h, self.data.clone()).ok_or_else(length_error)?,
            Encoding::Rgb8 => {
                let rgb = RgbImage::from_raw(w, h, self.data.clone()).ok_or_else(length_error)?;
                DynamicImage::ImageRgb8(rgb).to_luma8()
            }
            Encoding::Bgr8 => {
                let rgb = RgbImage::from_raw(w, h, swap_red_blue(&self.data, 3))
                    .ok_or_else(length_error)?;
                DynamicImage::ImageRgb8(rgb).to_luma8()
            }
            Encoding::Rgba8 => {
                let rgba = RgbaImage::from_raw(w, h, self.data.clone()).ok_or_else(length_error)?;
                DynamicImage::ImageRgba8(rgba).to_luma8()
            }
            Encoding::Bgra8 => {
                let rgba = RgbaImage::from_raw(w, h, swap_red_blue(&self.data, 4))
                    .ok_or_else(length_error)?;
                DynamicImage::ImageRgba8(rgba).to_luma8()
            }
        };
        Ok(gray)
    }
}

fn swap_red_blue(data: &[u8], channels: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    for px in out.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_and_rgb_agree() {
        let rgb = vec![200, 10, 30, 0, 0, 255];
        let bgr = vec![30, 10, 200, 255, 0, 0];
        let a = ImageFrame::new(FrameHeader::default(), 2, 1, Encoding::Rgb8, rgb)
            .to_grayscale()
            .expect("rgb");
        let b = ImageFrame::new(FrameHeader::default(), 2, 1, Encoding::Bgr8, bgr)
            .to_grayscale()
            .expect("bgr");
        assert_eq!(a, b);
        // Pure blue is much darker than a red-dominated pixel.
        assert!(a.get_pixel(0, 0).0[0] > a.get_pixel(1, 0).0[0]);
    }

    #[test]
    fn mono_passes_through() {
        let frame = ImageFrame::new(FrameHeader::default(), 2, 2, Encoding::Mono8, vec![1, 2, 3, 4]);
        assert_eq!(frame.to_grayscale().expect("mono").into_raw(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn malformed_buffers_are_rejected() {
        let short = ImageFrame::new(FrameHeader::default(), 2, 2, Encoding::Rgba8, vec![0; 15]);
        assert_eq!(
            short.to_grayscale().unwrap_err(),
            FrameError::BufferLength {
                encoding: Encoding::Rgba8,
                expected: 16,
                got: 15
            }
        );
        let empty = ImageFrame::new(FrameHeader::default(), 0, 4, Encoding::Mono8, vec![]);
        assert!(matches!(empty.to_grayscale(), Err(FrameError::Empty { .. })));
    }

    #[test]
    fn encoding_names() {
        assert_eq!(Encoding::from_name("BGR8"), Some(Encoding::Bgr8));
        assert_eq!(Encoding::from_name("yuv422"), None);
        assert_eq!(Encoding::Bgra8.channels(), 4);
    }
}
