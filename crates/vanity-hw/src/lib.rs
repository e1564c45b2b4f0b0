//! vanity-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based video acquisition with facing-mode selection
//! and RGB frame conversion for the makeup pipeline.

pub mod camera;
pub mod frame;

pub use camera::{CameraConstraints, CameraError, Facing, VideoSource};
pub use frame::Frame;
