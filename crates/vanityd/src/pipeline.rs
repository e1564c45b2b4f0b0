//! The render loop: acquire, detect, build regions, composite, present.
//!
//! Detection runs on a dedicated worker thread (it is the dominant
//! suspension point); the loop enforces at most one in-flight detection
//! and drops frames rather than queueing them, so the presented picture
//! is always as fresh as inference allows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use vanity_core::{build_regions, composite, LandmarkSet, Landmarker, MakeupOptions};
use vanity_hw::{CameraError, Frame};

use crate::sink::DisplaySink;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
}

/// Frame acquisition seam. Production uses [`vanity_hw::VideoSource`];
/// tests substitute scripted sources.
pub trait FrameSource {
    fn start(&mut self) -> Result<(), CameraError>;
    fn stop(&mut self);
    fn current_frame(&mut self) -> Option<Frame>;
}

impl FrameSource for vanity_hw::VideoSource {
    fn start(&mut self) -> Result<(), CameraError> {
        vanity_hw::VideoSource::start(self)
    }

    fn stop(&mut self) {
        vanity_hw::VideoSource::stop(self)
    }

    fn current_frame(&mut self) -> Option<Frame> {
        vanity_hw::VideoSource::current_frame(self)
    }
}

/// The only two pipeline states; there is no paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
}

/// What one tick did, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Pipeline is idle; nothing happened.
    Inactive,
    /// A detection result was composited and presented.
    Presented,
    /// The source had no frame; tick skipped.
    NoFrame,
    /// A frame was handed to the detector; nothing ready to present yet.
    Dispatched,
    /// Detection still in flight; no second detect was issued.
    DetectorBusy,
}

struct DetectJob {
    frame: Frame,
    epoch: u64,
}

struct DetectDone {
    frame: Frame,
    faces: Vec<LandmarkSet>,
    epoch: u64,
}

/// Clone-safe control surface for the configuration caller.
#[derive(Clone)]
pub struct PipelineHandle {
    options_tx: Arc<watch::Sender<MakeupOptions>>,
    stop_flag: Arc<AtomicBool>,
}

impl PipelineHandle {
    /// Replace the whole makeup configuration. Takes effect on the next
    /// tick; the current tick keeps the snapshot it already read.
    pub fn set_options(&self, options: MakeupOptions) {
        let _ = self.options_tx.send(options);
    }

    /// Ask the render loop to leave `run` after the current tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

/// The per-frame makeup pipeline.
pub struct Pipeline<S: FrameSource> {
    source: S,
    state: State,
    /// Bumped on every stop; detection results from an older epoch are
    /// discarded on arrival instead of being presented.
    epoch: u64,
    in_flight: bool,
    job_tx: mpsc::Sender<DetectJob>,
    done_rx: mpsc::Receiver<DetectDone>,
    options_rx: watch::Receiver<MakeupOptions>,
    stop_flag: Arc<AtomicBool>,
    last_presented_seq: Option<u32>,
}

impl<S: FrameSource> Pipeline<S> {
    /// Build the pipeline and spawn its detection worker.
    ///
    /// The landmarker must already be loaded; a pipeline never exists
    /// without a usable model. The worker thread lives as long as the
    /// pipeline and survives stop/start cycles.
    pub fn new(
        source: S,
        landmarker: impl Landmarker + 'static,
        options: MakeupOptions,
    ) -> (Self, PipelineHandle) {
        let (job_tx, job_rx) = mpsc::channel::<DetectJob>(1);
        let (done_tx, done_rx) = mpsc::channel::<DetectDone>(1);
        spawn_detect_worker(landmarker, job_rx, done_tx);

        let (options_tx, options_rx) = watch::channel(options);
        let stop_flag = Arc::new(AtomicBool::new(false));

        let handle = PipelineHandle {
            options_tx: Arc::new(options_tx),
            stop_flag: Arc::clone(&stop_flag),
        };

        let pipeline = Self {
            source,
            state: State::Idle,
            epoch: 0,
            in_flight: false,
            job_tx,
            done_rx,
            options_rx,
            stop_flag,
            last_presented_seq: None,
        };

        (pipeline, handle)
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Idle → Running: acquire the video source and begin ticking.
    /// No-op when already running. On acquisition failure the pipeline
    /// stays Idle and holds no device.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state == State::Running {
            return Ok(());
        }
        self.source.start()?;
        self.stop_flag.store(false, Ordering::SeqCst);
        self.state = State::Running;
        tracing::info!("pipeline running");
        Ok(())
    }

    /// Running → Idle: release the device immediately. Idempotent, safe at
    /// any point in the cycle. An in-flight detection is left to finish;
    /// the epoch bump makes its result dead on arrival.
    pub fn stop(&mut self) {
        self.source.stop();
        if self.state == State::Running {
            self.epoch += 1;
            self.state = State::Idle;
            tracing::info!("pipeline stopped");
        }
    }

    /// One render cycle. All per-tick failures are absorbed here: a bad
    /// frame or a failed inference skips the tick, never exits the loop.
    pub fn tick(&mut self, sink: &mut dyn DisplaySink) -> TickOutcome {
        if self.state != State::Running {
            return TickOutcome::Inactive;
        }

        // Present a finished detection before dispatching the next frame.
        let mut presented = false;
        if let Ok(done) = self.done_rx.try_recv() {
            self.in_flight = false;
            if done.epoch == self.epoch {
                self.present(done, sink);
                presented = true;
            } else {
                tracing::debug!(seq = done.frame.sequence, "discarding stale detection result");
            }
        }

        if self.in_flight {
            // At most one detection outstanding; this tick issues nothing.
            return if presented {
                TickOutcome::Presented
            } else {
                TickOutcome::DetectorBusy
            };
        }

        let Some(frame) = self.source.current_frame() else {
            return if presented {
                TickOutcome::Presented
            } else {
                TickOutcome::NoFrame
            };
        };

        match self.job_tx.try_send(DetectJob {
            frame,
            epoch: self.epoch,
        }) {
            Ok(()) => {
                self.in_flight = true;
                if presented {
                    TickOutcome::Presented
                } else {
                    TickOutcome::Dispatched
                }
            }
            Err(mpsc::error::TrySendError::Full(_)) => TickOutcome::DetectorBusy,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("detect worker is gone, stopping pipeline");
                self.stop();
                TickOutcome::Inactive
            }
        }
    }

    /// Build regions with the current options snapshot, composite, present.
    fn present(&mut self, done: DetectDone, sink: &mut dyn DisplaySink) {
        let options = self.options_rx.borrow().clone();
        let regions = build_regions(&done.faces, &options);
        let surface = composite(
            &done.frame.data,
            done.frame.width,
            done.frame.height,
            &regions,
        );
        sink.present(&surface);

        if let Some(last) = self.last_presented_seq {
            let dropped = done.frame.sequence.saturating_sub(last).saturating_sub(1);
            if dropped > 0 {
                tracing::trace!(dropped, "frames skipped under detection load");
            }
        }
        self.last_presented_seq = Some(done.frame.sequence);
    }

    /// Tick until the handle requests a stop, paced by the sink's refresh
    /// signal. Releases the device on the way out.
    pub fn run(&mut self, sink: &mut dyn DisplaySink) {
        while self.state == State::Running && !self.stop_flag.load(Ordering::SeqCst) {
            sink.wait_refresh();
            self.tick(sink);
        }
        self.stop();
    }
}

/// Detection worker: owns the landmarker, processes one job at a time.
/// Inference failures degrade to a no-face result so the tick that sees
/// them presents unmodified video instead of dying.
fn spawn_detect_worker(
    mut landmarker: impl Landmarker + 'static,
    mut job_rx: mpsc::Receiver<DetectJob>,
    done_tx: mpsc::Sender<DetectDone>,
) {
    std::thread::Builder::new()
        .name("vanity-detect".into())
        .spawn(move || {
            tracing::debug!("detect worker started");
            while let Some(job) = job_rx.blocking_recv() {
                let faces = match landmarker.detect(
                    &job.frame.data,
                    job.frame.width,
                    job.frame.height,
                ) {
                    Ok(faces) => faces,
                    Err(e) => {
                        tracing::warn!(error = %e, seq = job.frame.sequence, "detection failed, treating as no face");
                        Vec::new()
                    }
                };
                let done = DetectDone {
                    frame: job.frame,
                    faces,
                    epoch: job.epoch,
                };
                if done_tx.blocking_send(done).is_err() {
                    break;
                }
            }
            tracing::debug!("detect worker exiting");
        })
        .expect("failed to spawn detect worker");
}
