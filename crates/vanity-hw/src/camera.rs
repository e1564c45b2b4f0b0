//! V4L2 video source via the `v4l` crate.
//!
//! Owns the camera acquisition lifecycle for the makeup pipeline: start,
//! per-tick frame capture, facing switch, and deterministic release.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera device available: {0}")]
    DeviceUnavailable(String),
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
}

/// Which way the requested camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    fn opposite(self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }
}

/// Best-effort acquisition hints. The driver may grant different values;
/// the negotiated geometry is reported on the produced frames.
#[derive(Debug, Clone, Copy)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing: Facing,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
            facing: Facing::Front,
        }
    }
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel), the usual webcam default.
    Yuyv,
    /// Packed RGB888 (3 bytes/pixel).
    Rgb24,
}

/// An opened device with a live capture stream and its negotiated geometry.
///
/// The stream (and its mmap'd buffers) lives for the whole start/stop
/// cycle: streaming on per frame costs tens of milliseconds on UVC
/// hardware and re-triggers auto-exposure warm-up. The stream keeps the
/// device handle alive internally, so dropping this releases everything.
struct ActiveDevice {
    stream: MmapStream<'static>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

/// A live camera feed with an explicit start/stop lifecycle.
///
/// Holds at most one device handle at a time; `stop` is idempotent and
/// repeated start/stop cycles never leak a handle.
pub struct VideoSource {
    front_path: String,
    back_path: Option<String>,
    constraints: CameraConstraints,
    active: Option<ActiveDevice>,
}

impl VideoSource {
    pub fn new(front_path: &str, back_path: Option<&str>, constraints: CameraConstraints) -> Self {
        Self {
            front_path: front_path.to_string(),
            back_path: back_path.map(str::to_string),
            constraints,
            active: None,
        }
    }

    fn device_path(&self, facing: Facing) -> Result<&str, CameraError> {
        match facing {
            Facing::Front => Ok(&self.front_path),
            Facing::Back => self
                .back_path
                .as_deref()
                .ok_or_else(|| CameraError::DeviceUnavailable("no back-facing device configured".into())),
        }
    }

    /// Acquire the device for the current facing mode and negotiate a format.
    ///
    /// No-op when already started. On failure the source stays stopped and
    /// holds no device handle.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.active.is_some() {
            return Ok(());
        }

        let path = self.device_path(self.constraints.facing)?.to_string();
        self.active = Some(open_device(&path, &self.constraints)?);
        Ok(())
    }

    /// Release the device. Safe to call repeatedly or before `start`.
    pub fn stop(&mut self) {
        if self.active.take().is_some() {
            tracing::info!("camera released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Negotiated (width, height), if started.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.active.as_ref().map(|a| (a.width, a.height))
    }

    /// Dequeue the most recent decoded frame as RGB.
    ///
    /// Returns `None` before `start`, and on transient capture failures
    /// (logged, absorbed — a bad frame is a skipped tick, not a shutdown).
    pub fn current_frame(&mut self) -> Option<Frame> {
        let active = self.active.as_mut()?;
        match capture_rgb(active) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed, skipping");
                None
            }
        }
    }

    /// Stop and restart on the opposite facing device, keeping the
    /// resolution and frame-rate hints.
    ///
    /// On failure the original facing is restored, and a live feed is
    /// reacquired, so a retry of `start` targets the device that worked.
    pub fn switch_facing(&mut self) -> Result<(), CameraError> {
        let target = self.constraints.facing.opposite();
        // Resolve the target path up front: an unconfigured facing must
        // not cost us the live feed.
        self.device_path(target)?;

        let was_active = self.active.is_some();
        self.stop();
        self.constraints.facing = target;
        if was_active {
            if let Err(e) = self.start() {
                self.constraints.facing = target.opposite();
                if let Err(restore) = self.start() {
                    tracing::warn!(error = %restore, "failed to reacquire previous camera after switch failure");
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Open a V4L2 device and negotiate a format close to the constraints.
fn open_device(path: &str, constraints: &CameraConstraints) -> Result<ActiveDevice, CameraError> {
    if !Path::new(path).exists() {
        return Err(CameraError::DeviceUnavailable(path.to_string()));
    }

    let device = Device::with_path(path).map_err(|e| classify_open_error(path, &e))?;

    let caps = device
        .query_caps()
        .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;

    tracing::info!(
        device = path,
        driver = %caps.driver,
        card = %caps.card,
        "opened camera"
    );

    if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
        return Err(CameraError::FormatNegotiationFailed(
            "device does not support video capture".into(),
        ));
    }

    // Request the hinted geometry in YUYV; accept whatever the driver grants.
    let mut fmt = device
        .format()
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to get format: {e}")))?;
    fmt.fourcc = FourCC::new(b"YUYV");
    fmt.width = constraints.width;
    fmt.height = constraints.height;

    let negotiated = device
        .set_format(&fmt)
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("failed to set format: {e}")))?;

    let pixel_format = if negotiated.fourcc == FourCC::new(b"YUYV") {
        PixelFormat::Yuyv
    } else if negotiated.fourcc == FourCC::new(b"RGB3") {
        PixelFormat::Rgb24
    } else {
        return Err(CameraError::FormatNegotiationFailed(format!(
            "unsupported pixel format: {:?} (need YUYV or RGB3)",
            negotiated.fourcc
        )));
    };

    // Frame rate is a hint; drivers that reject it still stream.
    if let Err(e) = device.set_params(&Parameters::with_fps(constraints.frame_rate)) {
        tracing::warn!(fps = constraints.frame_rate, error = %e, "frame-rate hint rejected");
    }

    tracing::info!(
        width = negotiated.width,
        height = negotiated.height,
        fourcc = ?negotiated.fourcc,
        "negotiated format"
    );

    let stream = MmapStream::with_buffers(&device, BufType::VideoCapture, 4)
        .map_err(|e| CameraError::CaptureFailed(format!("failed to start capture stream: {e}")))?;

    Ok(ActiveDevice {
        stream,
        width: negotiated.width,
        height: negotiated.height,
        pixel_format,
    })
}

/// Map a device-open failure onto the acquisition error taxonomy.
fn classify_open_error(path: &str, e: &std::io::Error) -> CameraError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(path.to_string()),
        _ if e.to_string().contains("busy") || e.to_string().contains("EBUSY") => {
            CameraError::DeviceBusy
        }
        _ => CameraError::DeviceUnavailable(format!("{path}: {e}")),
    }
}

/// Dequeue one buffer from the live stream and convert it to RGB.
fn capture_rgb(active: &mut ActiveDevice) -> Result<Frame, CameraError> {
    let (buf, meta) = active
        .stream
        .next()
        .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

    let rgb = match active.pixel_format {
        PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, active.width, active.height),
        PixelFormat::Rgb24 => frame::rgb24_to_rgb(buf, active.width, active.height),
    }
    .map_err(|e| CameraError::CaptureFailed(format!("pixel conversion failed: {e}")))?;

    Ok(Frame {
        data: rgb,
        width: active.width,
        height: active.height,
        timestamp: std::time::Instant::now(),
        sequence: meta.sequence,
    })
}
