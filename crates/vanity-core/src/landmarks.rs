//! Face-mesh landmark detector via ONNX Runtime.
//!
//! Runs a MediaPipe-style 468-point face-mesh model on a letterboxed
//! 192x192 crop of the full frame and carves the mesh into the named
//! contour groups the region builder consumes.

use crate::types::{GroupId, LandmarkSet, Point};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const MESH_INPUT_SIZE: usize = 192;
const MESH_POINTS: usize = 468;
/// Sigmoid-space threshold on the face-presence logit.
const FACE_PRESENCE_THRESHOLD: f32 = 0.5;

/// MediaPipe face-mesh annotation indices. Each table is one contour in the
/// mesh's native order, which runs left to right across the face for every
/// group below. That ordering is what lets the region builder close the lip
/// loop by reversing the lower contour.
pub const LIPS_UPPER_OUTER: [usize; 11] = [61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291];
pub const LIPS_LOWER_OUTER: [usize; 10] = [146, 91, 181, 84, 17, 314, 405, 321, 375, 291];
pub const LEFT_EYE_UPPER: [usize; 7] = [466, 388, 387, 386, 385, 384, 398];
pub const RIGHT_EYE_UPPER: [usize; 7] = [246, 161, 160, 159, 158, 157, 173];

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download face_mesh.onnx and place it in the model dir")]
    ModelNotFound(String),
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Seam between the render loop and inference. Production uses
/// [`FaceMeshLandmarker`]; tests substitute scripted doubles.
pub trait Landmarker: Send {
    /// Detect faces in an interleaved RGB frame.
    ///
    /// Zero results is a normal outcome (no face in view), never an error.
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<LandmarkSet>, DetectorError>;
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// ONNX face-mesh landmarker.
pub struct FaceMeshLandmarker {
    session: Session,
    num_outputs: usize,
}

impl FaceMeshLandmarker {
    /// Load the face-mesh ONNX model from the given path.
    ///
    /// Loading is fatal on failure; the pipeline refuses to start without
    /// a loaded model and the caller retries by calling `load` again.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
            "loaded face-mesh model"
        );

        if num_outputs < 2 {
            return Err(DetectorError::ModelLoad(format!(
                "face-mesh model requires 2 outputs (mesh + presence score), got {num_outputs}"
            )));
        }

        Ok(Self {
            session,
            num_outputs,
        })
    }

    /// Letterbox the RGB frame into a NHWC float tensor scaled to [0, 1].
    ///
    /// Bilinear resize per channel; padding is black, which the model was
    /// trained to ignore at the borders.
    fn preprocess(&self, rgb: &[u8], width: usize, height: usize) -> (Array4<f32>, LetterboxInfo) {
        let scale_w = MESH_INPUT_SIZE as f32 / width as f32;
        let scale_h = MESH_INPUT_SIZE as f32 / height as f32;
        let scale = scale_w.min(scale_h);

        let new_w = (width as f32 * scale).round() as usize;
        let new_h = (height as f32 * scale).round() as usize;
        let pad_x = (MESH_INPUT_SIZE - new_w) as f32 / 2.0;
        let pad_y = (MESH_INPUT_SIZE - new_h) as f32 / 2.0;

        let letterbox = LetterboxInfo { scale, pad_x, pad_y };

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;
        let inv_scale = 1.0 / scale;

        let mut tensor = Array4::<f32>::zeros((1, MESH_INPUT_SIZE, MESH_INPUT_SIZE, 3));

        for y in 0..new_h {
            let src_y = (y as f32 + 0.5) * inv_scale - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
            let y1 = (y0 + 1).min(height - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..new_w {
                let src_x = (x as f32 + 0.5) * inv_scale - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
                let x1 = (x0 + 1).min(width - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                for c in 0..3 {
                    let tl = rgb[(y0 * width + x0) * 3 + c] as f32;
                    let tr = rgb[(y0 * width + x1) * 3 + c] as f32;
                    let bl = rgb[(y1 * width + x0) * 3 + c] as f32;
                    let br = rgb[(y1 * width + x1) * 3 + c] as f32;

                    let val = tl * (1.0 - fx) * (1.0 - fy)
                        + tr * fx * (1.0 - fy)
                        + bl * (1.0 - fx) * fy
                        + br * fx * fy;

                    tensor[[0, y + pad_y_start, x + pad_x_start, c]] = val / 255.0;
                }
            }
        }

        (tensor, letterbox)
    }
}

impl Landmarker for FaceMeshLandmarker {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<LandmarkSet>, DetectorError> {
        let expected = (width * height * 3) as usize;
        if rgb.len() < expected {
            return Err(DetectorError::InferenceFailed(format!(
                "frame buffer too short: expected {expected}, got {}",
                rgb.len()
            )));
        }

        let (input, letterbox) = self.preprocess(rgb, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        // Face-mesh exports carry generic tensor names, so discover the two
        // outputs by element count: 468*3 floats = mesh, 1 float = presence.
        let mut mesh: Option<&[f32]> = None;
        let mut presence: Option<f32> = None;
        for idx in 0..self.num_outputs {
            let (_, values) = outputs[idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("output {idx}: {e}")))?;
            match values.len() {
                n if n == MESH_POINTS * 3 => mesh = Some(values),
                1 => presence = Some(values[0]),
                _ => {}
            }
        }

        let mesh = mesh.ok_or_else(|| {
            DetectorError::InferenceFailed("no mesh tensor among model outputs".into())
        })?;
        let presence = presence.ok_or_else(|| {
            DetectorError::InferenceFailed("no presence tensor among model outputs".into())
        })?;

        let score = sigmoid(presence);
        if score < FACE_PRESENCE_THRESHOLD {
            tracing::trace!(score, "no face in frame");
            return Ok(Vec::new());
        }

        // De-letterbox into frame space and clamp into bounds.
        let points: Vec<Point> = (0..MESH_POINTS)
            .map(|i| {
                let lx = (mesh[i * 3] - letterbox.pad_x) / letterbox.scale;
                let ly = (mesh[i * 3 + 1] - letterbox.pad_y) / letterbox.scale;
                clamp_to_frame(lx, ly, width, height)
            })
            .collect();

        Ok(vec![mesh_to_groups(&points)])
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Clamp a point into the frame's half-open coordinate bounds:
/// 0 <= x < width, 0 <= y < height.
fn clamp_to_frame(x: f32, y: f32, width: u32, height: u32) -> Point {
    Point::new(
        x.clamp(0.0, width as f32 - 1.0),
        y.clamp(0.0, height as f32 - 1.0),
    )
}

/// Carve the full 468-point mesh into the named contour groups.
fn mesh_to_groups(points: &[Point]) -> LandmarkSet {
    let pick = |indices: &[usize]| -> Vec<Point> { indices.iter().map(|&i| points[i]).collect() };

    let mut set = LandmarkSet::new();
    set.insert(GroupId::LipsUpperOuter, pick(&LIPS_UPPER_OUTER));
    set.insert(GroupId::LipsLowerOuter, pick(&LIPS_LOWER_OUTER));
    set.insert(GroupId::LeftEyeUpper, pick(&LEFT_EYE_UPPER));
    set.insert(GroupId::RightEyeUpper, pick(&RIGHT_EYE_UPPER));
    set
}
