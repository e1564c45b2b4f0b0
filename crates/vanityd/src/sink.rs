//! Display-sink boundary.
//!
//! The pipeline never decides its own cadence: the sink owns the refresh
//! signal and receives every composited surface. Real presentation lives
//! outside this daemon; `StatsSink` is the headless stand-in.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use vanity_core::OutputSurface;

pub trait DisplaySink {
    /// Block until the display consumer is ready for the next frame.
    fn wait_refresh(&mut self);

    /// Present one composited surface. No return value; presentation
    /// failures are the consumer's problem.
    fn present(&mut self, surface: &OutputSurface<'_>);
}

/// Fixed-cadence headless sink: paces the render loop at a target refresh
/// rate, logs throughput once a second, and optionally writes the first
/// presented surface to disk as a PNG.
pub struct StatsSink {
    interval: Duration,
    next_deadline: Option<Instant>,
    window_start: Instant,
    window_frames: u32,
    snapshot_path: Option<PathBuf>,
}

impl StatsSink {
    pub fn new(refresh_hz: u32, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            interval: Duration::from_secs(1) / refresh_hz.max(1),
            next_deadline: None,
            window_start: Instant::now(),
            window_frames: 0,
            snapshot_path,
        }
    }
}

impl DisplaySink for StatsSink {
    fn wait_refresh(&mut self) {
        let now = Instant::now();
        if let Some(deadline) = self.next_deadline {
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
        }
        self.next_deadline = Some(self.next_deadline.map_or(now, |d| d.max(now)) + self.interval);
    }

    fn present(&mut self, surface: &OutputSurface<'_>) {
        self.window_frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.window_frames as f32 / elapsed.as_secs_f32();
            tracing::info!(fps = format!("{fps:.1}"), "presenting");
            self.window_start = Instant::now();
            self.window_frames = 0;
        }

        if let Some(path) = self.snapshot_path.take() {
            match image::RgbImage::from_raw(surface.width, surface.height, surface.data.to_vec()) {
                Some(img) => match img.save(&path) {
                    Ok(()) => tracing::info!(path = %path.display(), "snapshot written"),
                    Err(e) => tracing::warn!(error = %e, "snapshot write failed"),
                },
                None => tracing::warn!("snapshot skipped: surface buffer size mismatch"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn surface(data: &[u8]) -> OutputSurface<'_> {
        OutputSurface {
            data: Cow::Borrowed(data),
            width: 2,
            height: 1,
        }
    }

    #[test]
    fn test_first_refresh_does_not_block() {
        let mut sink = StatsSink::new(30, None);
        let start = Instant::now();
        sink.wait_refresh();
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn test_refresh_paces_subsequent_ticks() {
        let mut sink = StatsSink::new(100, None);
        sink.wait_refresh();
        let start = Instant::now();
        sink.wait_refresh();
        sink.wait_refresh();
        // Two further ticks at 100 Hz should take roughly 20 ms.
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_present_counts_frames() {
        let data = vec![0u8; 6];
        let mut sink = StatsSink::new(60, None);
        sink.present(&surface(&data));
        sink.present(&surface(&data));
        assert_eq!(sink.window_frames, 2);
    }
}
