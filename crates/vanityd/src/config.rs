use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Front-facing V4L2 device path (default: /dev/video0).
    pub camera_front: String,
    /// Optional back-facing device for facing switches.
    pub camera_back: Option<String>,
    /// Path to the face-mesh ONNX model.
    pub model_path: PathBuf,
    /// Requested capture width (best-effort hint).
    pub frame_width: u32,
    /// Requested capture height (best-effort hint).
    pub frame_height: u32,
    /// Requested capture frame rate (best-effort hint).
    pub frame_rate: u32,
    /// Display-sink refresh rate driving the render loop cadence.
    pub refresh_hz: u32,
}

impl Config {
    /// Load configuration from `VANITY_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_path = std::env::var("VANITY_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/usr/share/vanity/models/face_mesh.onnx"));

        Self {
            camera_front: std::env::var("VANITY_CAMERA_FRONT")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            camera_back: std::env::var("VANITY_CAMERA_BACK").ok(),
            model_path,
            frame_width: env_u32("VANITY_FRAME_WIDTH", 1280),
            frame_height: env_u32("VANITY_FRAME_HEIGHT", 720),
            frame_rate: env_u32("VANITY_FRAME_RATE", 30),
            refresh_hz: env_u32("VANITY_REFRESH_HZ", 60),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
