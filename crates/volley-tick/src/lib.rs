//! Fixed-period tick scheduler for Volley.
//!
//! Two things in the server run on a clock:
//!
//! - a room's simulation loop, when the room is configured with a tick
//!   rate (the reference cadence is 20 Hz), and
//! - the liveness reaper, which sweeps every room every few seconds.
//!
//! Both sit in a `tokio::select!` loop next to a command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle command */ }
//!         _ = scheduler.wait_for_tick() => {
//!             step();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! A scheduler without a period is *idle*: [`TickScheduler::wait_for_tick`]
//! never resolves, so the other `select!` branches run alone.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `None` means idle (never ticks).
    pub period: Option<Duration>,
    /// Warn when a tick's work takes more than this fraction of the
    /// period (0.0–1.0).
    pub budget_warn_threshold: f64,
    /// Upper bound on a random delay added to the first tick so rooms
    /// created together don't all tick on the same instant.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: None,
            budget_warn_threshold: 0.8,
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl TickConfig {
    /// Fastest supported rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Ticks `hz` times per second; 0 gives an idle scheduler.
    pub fn with_rate(hz: u32) -> Self {
        let period = match hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(
                1.0 / hz.min(Self::MAX_TICK_RATE_HZ) as f64,
            )),
        };
        Self {
            period,
            ..Default::default()
        }
    }

    /// Ticks once every `period`; a zero period gives an idle scheduler.
    pub fn with_period(period: Duration) -> Self {
        Self {
            period: (!period.is_zero()).then_some(period),
            ..Default::default()
        }
    }

    /// Disables first-tick jitter.
    pub fn without_jitter(mut self) -> Self {
        self.initial_jitter = Duration::ZERO;
        self
    }

    fn validated(mut self) -> Self {
        let min_period = Duration::from_secs_f64(1.0 / Self::MAX_TICK_RATE_HZ as f64);
        if let Some(period) = self.period {
            if period.is_zero() {
                self.period = None;
            } else if period < min_period {
                warn!(?period, ?min_period, "tick period below minimum, clamping");
                self.period = Some(min_period);
            }
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info / metrics
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// Always the configured period; simulations step by this, not by
    /// wall-clock time.
    pub dt: Duration,
    /// The wake-up was more than 10% of a period late.
    pub overrun: bool,
    /// Whole periods that were skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// Running totals kept by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest time between `wait_for_tick` returning and
    /// `record_tick_end` being called.
    pub max_tick_time: Duration,
    /// Share of the period used by the most recent tick's work.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period tick source. One per room actor, one for the reaper.
pub struct TickScheduler {
    config: TickConfig,
    next_tick: Option<TokioInstant>,
    tick_count: u64,
    tick_started: Option<Instant>,
    paused: bool,
    metrics: TickMetrics,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let next_tick = config.period.map(|period| {
            let jitter_us = config.initial_jitter.as_micros() as u64;
            let jitter = if jitter_us > 0 {
                Duration::from_micros(rand::rng().random_range(0..jitter_us))
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + period + jitter
        });

        match config.period {
            Some(period) => debug!(?period, "tick scheduler created"),
            None => debug!("tick scheduler created idle"),
        }

        Self {
            config,
            next_tick,
            tick_count: 0,
            tick_started: None,
            paused: false,
            metrics: TickMetrics::default(),
        }
    }

    /// Shorthand for `TickScheduler::new(TickConfig::with_rate(hz))`.
    pub fn with_rate(hz: u32) -> Self {
        Self::new(TickConfig::with_rate(hz))
    }

    /// Sleeps until the next tick is due.
    ///
    /// Pends forever while idle or paused. Cancel-safe: dropping the future
    /// before it resolves leaves the schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (deadline, period) = match (self.next_tick, self.config.period) {
            (Some(deadline), Some(period)) if !self.paused => (deadline, period),
            _ => std::future::pending::<(TokioInstant, Duration)>().await,
        };

        time::sleep_until(deadline).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > period / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / period.as_nanos()) as u64
        } else {
            0
        };

        // Late ticks are skipped, never replayed in a burst.
        self.next_tick = Some(now + period);
        if overrun {
            warn!(
                tick = self.tick_count + 1,
                late_ms = late_by.as_secs_f64() * 1000.0,
                skipped = ticks_skipped,
                "tick fired late"
            );
            self.metrics.total_overruns += 1;
            self.metrics.total_skipped += ticks_skipped;
        }

        self.tick_count += 1;
        self.metrics.total_ticks += 1;
        self.tick_started = Some(Instant::now());
        trace!(tick = self.tick_count, overrun, "tick");

        TickInfo {
            tick: self.tick_count,
            dt: period,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the work done for the current tick.
    ///
    /// Without this call the budget warning never fires. Calling it twice,
    /// or before any tick, does nothing.
    pub fn record_tick_end(&mut self) {
        let (Some(started), Some(period)) = (self.tick_started.take(), self.config.period) else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / period.as_secs_f64();

        self.metrics.budget_utilization = utilization;
        self.metrics.max_tick_time = self.metrics.max_tick_time.max(elapsed);

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = period.as_secs_f64() * 1000.0,
                "tick work near or over budget"
            );
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Restarts ticking one full period from now, so time spent paused
    /// doesn't come back as a burst of late ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(period) = self.config.period {
                self.next_tick = Some(TokioInstant::now() + period);
            }
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// `true` when no period is configured.
    pub fn is_idle(&self) -> bool {
        self.config.period.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn period(&self) -> Option<Duration> {
        self.config.period
    }
}
