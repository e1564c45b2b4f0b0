//! Frame type and pixel conversion — YUYV decoding, PNG snapshot encoding.

use image::{ImageError, RgbImage};

/// A captured RGB camera frame.
///
/// Immutable once produced: the pipeline reads it for detection and
/// compositing but never writes back into it.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Average luma (BT.601 weights, 0.0–255.0). Used by capture diagnostics.
    pub fn avg_luma(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .data
            .chunks_exact(3)
            .map(|px| 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
            .sum();
        sum / (self.data.len() / 3) as f32
    }

    /// Encode the frame as PNG bytes.
    ///
    /// This is the capture format handed to the advice backend; the
    /// pipeline itself never re-reads the encoded bytes.
    pub fn to_png(&self) -> Result<Vec<u8>, FrameError> {
        let img = RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            FrameError::InvalidLength {
                expected: (self.width * self.height * 3) as usize,
                actual: self.data.len(),
            },
        )?;
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)?;
        Ok(out)
    }
}

/// Convert packed YUYV (4:2:2) to interleaved RGB888.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]. U and V are shared
/// between the pixel pair. Uses the BT.601 full-range conversion.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for &y in &[quad[0], quad[2]] {
            let y = y as f32;
            let r = y + 1.402 * v;
            let g = y - 0.344_136 * u - 0.714_136 * v;
            let b = y + 1.772 * u;
            rgb.push(r.round().clamp(0.0, 255.0) as u8);
            rgb.push(g.round().clamp(0.0, 255.0) as u8);
            rgb.push(b.round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

/// Convert RGB24 as delivered by the driver (tightly packed) to an owned buffer.
pub fn rgb24_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 3) as usize;
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(buf[..expected].to_vec())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("png encoding failed: {0}")]
    Png(#[from] ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_neutral_chroma_is_gray() {
        // U = V = 128 means zero chroma: RGB should equal Y.
        let yuyv = vec![100, 128, 200, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn test_yuyv_red_push() {
        // High V pushes red up and green down.
        let yuyv = vec![128, 128, 128, 255];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > 200, "red should spike: {}", rgb[0]);
        assert!(rgb[1] < 80, "green should drop: {}", rgb[1]);
        assert_eq!(rgb[2], 128, "blue unaffected by V");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_yuyv_output_size() {
        let yuyv = vec![128u8; 640 * 2 * 2]; // 640x2
        let rgb = yuyv_to_rgb(&yuyv, 640, 2).unwrap();
        assert_eq!(rgb.len(), 640 * 2 * 3);
    }

    #[test]
    fn test_rgb24_passthrough() {
        let buf: Vec<u8> = (0..12).collect();
        let rgb = rgb24_to_rgb(&buf, 2, 2).unwrap();
        assert_eq!(rgb, buf);
    }

    #[test]
    fn test_rgb24_too_short() {
        assert!(rgb24_to_rgb(&[0u8; 5], 2, 2).is_err());
    }

    #[test]
    fn test_avg_luma_uniform() {
        let frame = Frame {
            data: vec![128u8; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        assert!((frame.avg_luma() - 128.0).abs() < 0.5);
    }

    #[test]
    fn test_to_png_roundtrip() {
        let frame = Frame {
            data: vec![10u8; 3 * 2 * 3],
            width: 3,
            height: 2,
            timestamp: std::time::Instant::now(),
            sequence: 7,
        };
        let png = frame.to_png().unwrap();
        // PNG magic bytes
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_to_png_bad_buffer() {
        let frame = Frame {
            data: vec![0u8; 5],
            width: 3,
            height: 2,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        };
        assert!(frame.to_png().is_err());
    }
}
