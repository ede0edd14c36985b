//! Captured frames and capture regions.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Rectangular screen region in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureGeometry {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CaptureGeometry {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width in pixels; negative when the bounds are inverted.
    pub fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    /// Height in pixels; negative when the bounds are inverted.
    pub fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    /// Both dimensions are strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    /// Positive `(width, height)`, or `InvalidGeometry`.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        if !self.is_valid() {
            return Err(self.invalid());
        }
        let width = u32::try_from(self.width()).map_err(|_| self.invalid())?;
        let height = u32::try_from(self.height()).map_err(|_| self.invalid())?;
        Ok((width, height))
    }

    fn invalid(&self) -> Error {
        Error::InvalidGeometry {
            left: self.left,
            top: self.top,
            right: self.right,
            bottom: self.bottom,
        }
    }
}

impl std::fmt::Display for CaptureGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.right, self.bottom)
    }
}

impl FromStr for CaptureGeometry {
    type Err = Error;

    /// Parse `left,top,right,bottom`.
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("Invalid region '{}': {}", s, e)))?;

        match parts.as_slice() {
            [left, top, right, bottom] => Ok(Self::new(*left, *top, *right, *bottom)),
            _ => Err(Error::Config(format!(
                "Invalid region '{}': expected left,top,right,bottom",
                s
            ))),
        }
    }
}

/// Captured pixels: RGB8, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Bytes per pixel.
    pub const CHANNELS: usize = 3;

    /// Wrap an RGB8 buffer. Fails when the length does not match the size.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(Error::CaptureUnavailable(format!(
                "frame buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert a top-down BGRA buffer (the GDI native layout) to RGB.
    pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> Result<Self> {
        let pixels = width as usize * height as usize;
        if bgra.len() < pixels * 4 {
            return Err(Error::CaptureUnavailable(format!(
                "BGRA buffer is {} bytes, expected {}",
                bgra.len(),
                pixels * 4
            )));
        }

        let mut data = Vec::with_capacity(pixels * Self::CHANNELS);
        for px in bgra[..pixels * 4].chunks_exact(4) {
            data.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        Self::from_rgb(width, height, data)
    }

    /// Single-color frame.
    pub fn filled(width: u32, height: u32, rgb: (u8, u8, u8)) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * Self::CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        Some((self.data[i], self.data[i + 1], self.data[i + 2]))
    }

    /// Overwrite a rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, rgb: (u8, u8, u8)) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for py in y.min(self.height)..y_end {
            for px in x.min(self.width)..x_end {
                let i = (py as usize * self.width as usize + px as usize) * Self::CHANNELS;
                self.data[i..i + 3].copy_from_slice(&[rgb.0, rgb.1, rgb.2]);
            }
        }
    }

    /// Copy into an `image` buffer.
    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| Error::Other("Frame buffer does not match its dimensions".into()))
    }

    /// Save the frame; the format follows the file extension.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.to_image()?.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_dimensions() {
        let region = CaptureGeometry::new(10, 20, 110, 70);
        assert_eq!(region.dimensions().unwrap(), (100, 50));
        assert!(region.is_valid());

        assert!(!CaptureGeometry::new(0, 0, 0, 100).is_valid());
        assert!(!CaptureGeometry::new(0, 0, 100, -5).is_valid());
        assert!(matches!(
            CaptureGeometry::new(0, 0, 0, 100).dimensions(),
            Err(Error::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_geometry_parse() {
        let region: CaptureGeometry = "10, 20,110,70".parse().unwrap();
        assert_eq!(region, CaptureGeometry::new(10, 20, 110, 70));
        assert_eq!(region.to_string(), "10,20,110,70");

        assert!("1,2,3".parse::<CaptureGeometry>().is_err());
        assert!("a,b,c,d".parse::<CaptureGeometry>().is_err());
    }

    #[test]
    fn test_bgra_conversion() {
        let bgra = [1, 2, 3, 255, 10, 20, 30, 255];
        let frame = Frame::from_bgra(2, 1, &bgra).unwrap();
        assert_eq!(frame.pixel(0, 0), Some((3, 2, 1)));
        assert_eq!(frame.pixel(1, 0), Some((30, 20, 10)));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn test_from_rgb_rejects_bad_length() {
        assert!(Frame::from_rgb(2, 2, vec![0; 11]).is_err());
        assert!(Frame::from_rgb(2, 2, vec![0; 12]).is_ok());
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut frame = Frame::filled(4, 4, (0, 0, 0));
        frame.fill_rect(2, 2, 10, 10, (9, 9, 9));
        assert_eq!(frame.pixel(3, 3), Some((9, 9, 9)));
        assert_eq!(frame.pixel(1, 1), Some((0, 0, 0)));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        Frame::filled(3, 2, (255, 0, 0)).save_to_file(&path).unwrap();
        assert!(path.exists());
    }
}
