use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vanity_core::{FaceMeshLandmarker, MakeupOptions, Rgb, ZoneStyle};
use vanity_hw::{CameraConstraints, Facing, VideoSource};

mod config;
mod pipeline;
mod sink;

use config::Config;
use pipeline::Pipeline;
use sink::StatsSink;

#[derive(Parser)]
#[command(name = "vanityd", about = "Vanity virtual-makeup daemon")]
struct Cli {
    /// Lipstick color as #RRGGBB; omit to disable lipstick.
    #[arg(long)]
    lipstick: Option<String>,

    /// Lipstick opacity in [0, 1].
    #[arg(long, default_value_t = 0.7)]
    lipstick_opacity: f32,

    /// Eyeshadow color as #RRGGBB; omit to disable eyeshadow.
    #[arg(long)]
    eyeshadow: Option<String>,

    /// Eyeshadow opacity in [0, 1].
    #[arg(long, default_value_t = 0.4)]
    eyeshadow_opacity: f32,

    /// Full makeup configuration as JSON; overrides the flags above.
    #[arg(long)]
    options_json: Option<String>,

    /// Write the first composited frame to this path as PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// Build validated makeup options from the CLI surface.
fn parse_options(cli: &Cli) -> Result<MakeupOptions> {
    if let Some(json) = &cli.options_json {
        return serde_json::from_str(json).context("invalid --options-json");
    }

    let mut options = MakeupOptions::default();
    if let Some(hex) = &cli.lipstick {
        options.lipstick = Some(ZoneStyle::new(Rgb::from_hex(hex)?, cli.lipstick_opacity)?);
    }
    if let Some(hex) = &cli.eyeshadow {
        options.eyeshadow = Some(ZoneStyle::new(Rgb::from_hex(hex)?, cli.eyeshadow_opacity)?);
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let options = parse_options(&cli)?;

    tracing::info!("vanityd starting");

    // Fail fast: no pipeline without a loaded model and a configured source.
    let model_path = config.model_path.to_string_lossy().into_owned();
    let landmarker = FaceMeshLandmarker::load(&model_path)?;

    let constraints = CameraConstraints {
        width: config.frame_width,
        height: config.frame_height,
        frame_rate: config.frame_rate,
        facing: Facing::Front,
    };
    let source = VideoSource::new(&config.camera_front, config.camera_back.as_deref(), constraints);

    let (mut pipeline, handle) = Pipeline::new(source, landmarker, options);
    pipeline.start()?;

    let refresh_hz = config.refresh_hz;
    let snapshot = cli.snapshot.clone();
    let render_thread = std::thread::Builder::new()
        .name("vanity-render".into())
        .spawn(move || {
            let mut sink = StatsSink::new(refresh_hz, snapshot);
            pipeline.run(&mut sink);
        })
        .expect("failed to spawn render thread");

    tracing::info!("vanityd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("vanityd shutting down");

    handle.stop();
    let _ = render_thread.join();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_flags() {
        let cli = Cli::parse_from(["vanityd", "--lipstick", "#FF1493"]);
        let options = parse_options(&cli).unwrap();
        let lipstick = options.lipstick.unwrap();
        assert_eq!(lipstick.color(), Rgb::new(255, 20, 147));
        assert!((lipstick.opacity() - 0.7).abs() < 1e-6);
        assert!(options.eyeshadow.is_none());
    }

    #[test]
    fn test_parse_options_rejects_bad_opacity() {
        let cli = Cli::parse_from(["vanityd", "--lipstick", "#FF1493", "--lipstick-opacity", "1.5"]);
        assert!(parse_options(&cli).is_err());
    }

    #[test]
    fn test_parse_options_json_overrides() {
        let cli = Cli::parse_from([
            "vanityd",
            "--lipstick",
            "#000000",
            "--options-json",
            r#"{"lipstick":{"color":{"r":255,"g":20,"b":147},"opacity":0.7},"eyeshadow":null}"#,
        ]);
        let options = parse_options(&cli).unwrap();
        assert_eq!(options.lipstick.unwrap().color(), Rgb::new(255, 20, 147));
    }

    #[test]
    fn test_parse_options_json_validates_opacity() {
        let cli = Cli::parse_from([
            "vanityd",
            "--options-json",
            r#"{"lipstick":{"color":{"r":0,"g":0,"b":0},"opacity":2.0},"eyeshadow":null}"#,
        ]);
        assert!(parse_options(&cli).is_err());
    }

    #[test]
    fn test_parse_options_empty() {
        let cli = Cli::parse_from(["vanityd"]);
        let options = parse_options(&cli).unwrap();
        assert!(options.is_empty());
    }
}
