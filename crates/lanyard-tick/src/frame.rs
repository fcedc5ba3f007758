//! Fixed-rate frame pacing for hosts without a frame loop of their own.
//!
//! A game engine already calls [`Client::tick`](crate::Client::tick) once
//! per rendered frame. Headless tools, bots and the demos don't have a
//! render loop, so [`FrameDriver`] supplies one:
//!
//! ```ignore
//! let mut driver = FrameDriver::new(FrameConfig::with_rate(30));
//! loop {
//!     let frame = driver.wait_for_frame().await;
//!     let report = client.tick(&mut script, frame.now);
//!     driver.record_frame_end();
//! }
//! ```
//!
//! Timing goes through `tokio::time`, so tests can run it under a paused
//! clock.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a frame wakes up late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePolicy {
    /// Skip the missed frame(s) and schedule from now.
    #[default]
    Skip,
    /// Keep the original cadence; the next frame fires at its originally
    /// scheduled time even if that is already past.
    Drop,
}

/// Configuration for the frame driver.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Frames per second, `1..=240`. Default: 60.
    pub rate_hz: u32,
    /// Overrun handling policy.
    pub policy: FramePolicy,
    /// Fraction of the frame budget (0.0–1.0) above which a frame logs a
    /// warning. Default: 0.80.
    pub budget_warn_threshold: f64,
    /// Fraction of the budget treated as critical. Default: 1.0.
    pub budget_critical_threshold: f64,
    /// Track per-frame timing in [`FrameMetrics`].
    pub metrics_enabled: bool,
    /// Random jitter (0–max µs) added to the first frame, so many clients
    /// started together (a bot swarm) don't all send on the same instant.
    pub initial_jitter_us: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            rate_hz: 60,
            policy: FramePolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
            initial_jitter_us: 2_000,
        }
    }
}

impl FrameConfig {
    pub const MIN_RATE_HZ: u32 = 1;
    pub const MAX_RATE_HZ: u32 = 240;

    /// Default config at `rate_hz`.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`FrameDriver::new`].
    pub fn validated(mut self) -> Self {
        let clamped = self.rate_hz.clamp(Self::MIN_RATE_HZ, Self::MAX_RATE_HZ);
        if clamped != self.rate_hz {
            warn!(
                rate = self.rate_hz,
                clamped,
                "rate_hz out of range — clamping"
            );
            self.rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }

    /// Duration of one frame.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.rate_hz.max(1)))
    }
}

// ---------------------------------------------------------------------------
// FrameInfo / FrameMetrics
// ---------------------------------------------------------------------------

/// Returned by [`FrameDriver::wait_for_frame`].
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Fixed frame length (`1 / rate_hz`).
    pub dt: Duration,
    /// The frame's timestamp. Pass this to `Client::tick`.
    pub now: std::time::Instant,
    /// `true` if the frame woke more than 10% late.
    pub overrun: bool,
    /// Whole frames skipped because of the overrun (Skip policy only).
    pub frames_skipped: u64,
}

/// Runtime metrics for the frame driver.
#[derive(Debug, Clone, Default)]
pub struct FrameMetrics {
    pub total_frames: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of frame work time (α = 0.1).
    pub avg_frame_time: Duration,
    pub max_frame_time: Duration,
    /// Work time of the last recorded frame over its budget. >1.0 is an
    /// overrun.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// FrameDriver
// ---------------------------------------------------------------------------

/// Paces frames at a fixed rate.
pub struct FrameDriver {
    config: FrameConfig,
    frame_duration: Duration,
    frame_count: u64,
    next_frame: TokioInstant,
    /// Set by `wait_for_frame`, consumed by `record_frame_end`.
    frame_start: Option<TokioInstant>,
    paused: bool,
    metrics: FrameMetrics,
}

impl FrameDriver {
    /// Creates a driver whose first frame is one frame length (plus
    /// jitter) from now.
    pub fn new(config: FrameConfig) -> Self {
        let config = config.validated();
        let frame_duration = config.frame_duration();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.rate_hz,
            budget_ms = frame_duration.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "frame driver created"
        );

        Self {
            next_frame: TokioInstant::now() + frame_duration + jitter,
            config,
            frame_duration,
            frame_count: 0,
            frame_start: None,
            paused: false,
            metrics: FrameMetrics::default(),
        }
    }

    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(FrameConfig::with_rate(rate_hz))
    }

    /// Waits until the next frame is due.
    ///
    /// While paused this never resolves; use it inside `tokio::select!`
    /// next to whatever unpauses the driver.
    pub async fn wait_for_frame(&mut self) -> FrameInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }

        let scheduled = self.next_frame;
        time::sleep_until(scheduled).await;

        let now = TokioInstant::now();
        self.frame_count += 1;
        self.frame_start = Some(now);

        let late_by = now.saturating_duration_since(scheduled);
        let overrun = late_by > self.frame_duration / 10;
        let mut frames_skipped = 0u64;

        self.next_frame = match self.config.policy {
            FramePolicy::Skip => {
                if overrun {
                    frames_skipped =
                        (late_by.as_nanos() / self.frame_duration.as_nanos()) as u64;
                    if frames_skipped > 0 {
                        warn!(
                            frame = self.frame_count,
                            skipped = frames_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "frame overrun — skipping ahead"
                        );
                    }
                }
                now + self.frame_duration
            }
            FramePolicy::Drop => {
                if overrun {
                    warn!(
                        frame = self.frame_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "frame overrun — keeping original cadence"
                    );
                }
                scheduled + self.frame_duration
            }
        };

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += frames_skipped;
        self.metrics.total_frames += 1;

        trace!(frame = self.frame_count, overrun, "frame due");

        FrameInfo {
            frame: self.frame_count,
            dt: self.frame_duration,
            now: now.into_std(),
            overrun,
            frames_skipped,
        }
    }

    /// Marks the current frame's work as done, for budget monitoring.
    ///
    /// No-op without a preceding `wait_for_frame`.
    pub fn record_frame_end(&mut self) {
        let Some(start) = self.frame_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.frame_duration.as_secs_f64();
        self.metrics.budget_utilization = utilization;

        if utilization >= self.config.budget_critical_threshold {
            warn!(
                frame = self.frame_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "frame exceeded budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            debug!(
                frame = self.frame_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "frame approaching budget"
            );
        }

        if self.config.metrics_enabled {
            self.metrics.max_frame_time = self.metrics.max_frame_time.max(elapsed);
            let alpha = 0.1;
            let prev = self.metrics.avg_frame_time.as_secs_f64();
            self.metrics.avg_frame_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);
        }
    }

    /// Stops frames until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(frame = self.frame_count, "frame driver paused");
        }
    }

    /// Restarts frames one frame length from now, with no burst of
    /// catch-up frames for the time spent paused.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_frame = TokioInstant::now() + self.frame_duration;
            debug!(frame = self.frame_count, "frame driver resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    pub fn rate_hz(&self) -> u32 {
        self.config.rate_hz
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }
}
