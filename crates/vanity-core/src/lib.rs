//! vanity-core — The makeup compositing engine.
//!
//! Turns a camera frame into named facial-landmark groups (468-point
//! face mesh via ONNX Runtime), builds closed makeup regions per zone,
//! and alpha-blends them over the frame.

pub mod compositor;
pub mod landmarks;
pub mod regions;
pub mod types;

pub use compositor::composite;
pub use landmarks::{DetectorError, FaceMeshLandmarker, Landmarker};
pub use regions::build_regions;
pub use types::{
    GroupId, LandmarkSet, MakeupOptions, OptionsError, OutputSurface, Point, Region, Rgb, Zone,
    ZoneStyle,
};
