//! Ramping tick scheduler for lightcycle.
//!
//! An arena starts slow and speeds up: the rate begins at
//! [`TickConfig::tick_rate_hz`] and, with a [`TickRamp`], gains 1 Hz every
//! `ramp.interval` of arena lifetime until it reaches `ramp.max_rate_hz`.
//! Budget monitoring and overrun handling work at whatever the current
//! rate is.
//!
//! # Integration
//!
//! The scheduler sits inside the matchmaker's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some((id, event)) = events.recv() => { /* handle packets */ }
//!         info = scheduler.wait_for_tick() => {
//!             arena.tick(&mut registry);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume from now.
    #[default]
    Skip,
    /// Keep the original cadence; the next tick fires at its originally
    /// scheduled time even if that is already in the past.
    Drop,
}

/// Linear speed-up over the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRamp {
    /// Time between +1 Hz steps.
    pub interval: Duration,
    /// Rate the ramp stops at.
    pub max_rate_hz: u32,
}

impl Default for TickRamp {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            max_rate_hz: TickConfig::MAX_TICK_RATE_HZ,
        }
    }
}

/// How one arena's ticks are paced.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Starting tick rate in Hz.
    pub tick_rate_hz: u32,
    /// Speed-up schedule. `None` keeps the rate fixed.
    pub ramp: Option<TickRamp>,
    /// What a late tick does to the schedule.
    pub policy: TickPolicy,
    /// Share of a tick's length the arena's work may use before a warning
    /// is logged.
    pub budget_warn_threshold: f64,
    /// Share at which the warning becomes critical.
    pub budget_critical_threshold: f64,
    /// Enable per-tick metrics collection.
    pub metrics_enabled: bool,
    /// Random jitter (0–max µs) added to the *first* tick.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 1,
            ramp: Some(TickRamp::default()),
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            metrics_enabled: true,
            initial_jitter_us: 0,
        }
    }
}

impl TickConfig {
    /// Ceiling for any rate, ramped or not.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// A fixed-rate config with otherwise default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ramp: None,
            ..Default::default()
        }
    }

    /// Brings every field into range. [`TickScheduler::new`] applies this
    /// itself:
    /// - rates clamped to `1..=`[`Self::MAX_TICK_RATE_HZ`]
    /// - the ramp's ceiling is never below the starting rate
    /// - a zero ramp interval disables the ramp
    /// - thresholds clamped to `0.0..=1.0`, warn ≤ critical
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        }
        if let Some(ramp) = &mut self.ramp {
            ramp.max_rate_hz = ramp
                .max_rate_hz
                .clamp(self.tick_rate_hz, Self::MAX_TICK_RATE_HZ);
            if ramp.interval.is_zero() {
                self.ramp = None;
            }
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }

    /// Tick rate after the scheduler has been running for `elapsed`.
    pub fn rate_at(&self, elapsed: Duration) -> u32 {
        match self.ramp {
            Some(ramp) if !ramp.interval.is_zero() => {
                let steps = elapsed.as_nanos() / ramp.interval.as_nanos();
                let steps = u32::try_from(steps).unwrap_or(u32::MAX);
                self.tick_rate_hz.saturating_add(steps).min(ramp.max_rate_hz)
            }
            _ => self.tick_rate_hz,
        }
    }

    /// Duration of one tick at `rate_hz`.
    pub fn tick_duration(rate_hz: u32) -> Duration {
        Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64)
    }
}

// ---------------------------------------------------------------------------
// TickInfo / TickMetrics
// ---------------------------------------------------------------------------

/// One fired tick, as seen by the caller of [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// 1 for the first tick of an arena.
    pub tick: u64,
    pub rate_hz: u32,
    pub dt: Duration,
    /// Fired more than a tenth of a tick late.
    pub overrun: bool,
    /// Whole ticks lost to lateness under [`TickPolicy::Skip`].
    pub ticks_skipped: u64,
}

/// Counters over a scheduler's lifetime. Work times only cover ticks
/// closed with [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Moving average of work time, weighting the newest tick by 0.1.
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Work time of the last tick over its budget; above 1.0 it ran long.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Tick scheduler for one arena.
pub struct TickScheduler {
    config: TickConfig,
    started_at: TokioInstant,
    rate_hz: u32,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: TokioInstant,
    /// Wall-clock instant when the last tick's work started.
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is one tick length from now,
    /// plus optional jitter.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let rate_hz = config.tick_rate_hz;
        let now = TokioInstant::now();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz,
            ramp = ?config.ramp,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            next_tick: now + TickConfig::tick_duration(rate_hz) + jitter,
            started_at: now,
            rate_hz,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
            config,
        }
    }

    /// A fixed-rate scheduler with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = self.next_tick;
        time::sleep_until(next).await;

        let now = TokioInstant::now();
        let tick_dur = TickConfig::tick_duration(self.rate_hz);
        let scheduled_rate = self.rate_hz;
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        // >10% late = overrun
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > tick_dur / 10;
        let mut ticks_skipped = 0u64;

        let new_rate = self.config.rate_at(now.saturating_duration_since(self.started_at));
        if new_rate != self.rate_hz {
            debug!(tick = self.tick_count, from = self.rate_hz, to = new_rate, "tick rate increased");
            self.rate_hz = new_rate;
        }
        let next_dur = TickConfig::tick_duration(self.rate_hz);

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / tick_dur.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + next_dur
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping original schedule"
                    );
                }
                next + next_dur
            }
        };

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, rate_hz = scheduled_rate, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            rate_hz: scheduled_rate,
            dt: tick_dur,
            overrun,
            ticks_skipped,
        }
    }

    /// Closes the tick opened by the last [`wait_for_tick`](Self::wait_for_tick):
    /// compares its work time against the budget and folds it into the
    /// metrics. Does nothing if no tick is open.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let work = start.elapsed();
        let budget = TickConfig::tick_duration(self.rate_hz);
        let used = work.as_secs_f64() / budget.as_secs_f64();
        self.metrics.budget_utilization = used;

        let level = if used >= self.config.budget_critical_threshold {
            Some("tick work exceeded its budget")
        } else if used >= self.config.budget_warn_threshold {
            Some("tick work close to its budget")
        } else {
            None
        };
        if let Some(message) = level {
            warn!(
                tick = self.tick_count,
                rate_hz = self.rate_hz,
                work_ms = work.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                "{message}"
            );
        }

        if self.config.metrics_enabled {
            const ALPHA: f64 = 0.1;
            let avg = self.metrics.avg_tick_time.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(avg + ALPHA * (work.as_secs_f64() - avg));
            self.metrics.max_tick_time = self.metrics.max_tick_time.max(work);
        }
    }

    /// Number of ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// Rate the next tick is scheduled at.
    pub fn tick_rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// When the next tick fires.
    pub fn next_tick_at(&self) -> TokioInstant {
        self.next_tick
    }
}
