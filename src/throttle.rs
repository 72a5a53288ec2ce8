//! Launch throttling for compiler subprocesses.
//!
//! Two independent constraints gate every launch: at most `max_concurrent`
//! compilations in flight at once, and at least `min_spacing` between
//! successive launch instants. The spacing matters because the external
//! toolchain (an npm-wrapped `asc` invocation) shares caches across
//! processes and degrades under simultaneous cold starts.
//!
//! This is a rate limiter, not a queue-depth cap: every caller is admitted
//! eventually, only its start time is pushed back. There is no cancellation
//! and no per-launch timeout; once admitted, a compilation runs until the
//! external tool finishes.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{sleep_until, Instant};

/// Environment override for the in-flight launch budget.
pub const CONCURRENCY_VAR: &str = "ASCBUILD_CONCURRENCY";
/// Environment override for the minimum launch spacing, in milliseconds.
pub const MINTIME_VAR: &str = "ASCBUILD_MINTIME_MS";

const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(500);

/// The per-run launch budget. Read once at startup and immutable after;
/// there is no mid-run reconfiguration.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Maximum number of compilations in flight at any instant.
    pub max_concurrent: usize,
    /// Minimum interval between successive launch instants.
    pub min_spacing: Duration,
}

impl ThrottleConfig {
    /// A budget of `max_concurrent` slots spaced `min_spacing` apart.
    /// A zero slot count is clamped to one so the dispatcher can always
    /// make progress.
    pub fn new(max_concurrent: usize, min_spacing: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            min_spacing,
        }
    }

    /// Budget from the environment: [`CONCURRENCY_VAR`] falls back to the
    /// logical CPU count, [`MINTIME_VAR`] to 500 ms. Unparseable values
    /// fall back the same way.
    pub fn from_env() -> Self {
        let max_concurrent = parse_var(CONCURRENCY_VAR).unwrap_or_else(num_cpus::get);
        let min_spacing = parse_var(MINTIME_VAR)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MIN_SPACING);
        Self::new(max_concurrent, min_spacing)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::new(num_cpus::get(), DEFAULT_MIN_SPACING)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok()?.trim().parse().ok()
}

/// Admission control for compiler launches.
///
/// Constructed per run and handed to the dispatcher. Nothing here is
/// global: independent throttles carry independent budgets, so tests can
/// run several side by side.
#[derive(Debug)]
pub struct Throttle {
    slots: Semaphore,
    min_spacing: Duration,
    /// Earliest instant the next launch may start.
    next_launch: Mutex<Instant>,
}

impl Throttle {
    /// A throttle enforcing `config` for the lifetime of one run.
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            slots: Semaphore::new(config.max_concurrent),
            min_spacing: config.min_spacing,
            next_launch: Mutex::new(Instant::now()),
        }
    }

    /// Wait until a launch may start: a free slot and the spacing interval
    /// both satisfied. The returned permit must be held for the duration
    /// of the compilation; dropping it frees the slot.
    pub async fn admit(&self) -> SemaphorePermit<'_> {
        let permit = self
            .slots
            .acquire()
            .await
            .expect("throttle semaphore is never closed");
        let start_at = {
            let mut next = self.next_launch.lock().await;
            let now = Instant::now();
            let start_at = if *next > now { *next } else { now };
            *next = start_at + self.min_spacing;
            start_at
        };
        sleep_until(start_at).await;
        permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[test]
    fn zero_concurrency_clamps_to_one() {
        let config = ThrottleConfig::new(0, Duration::ZERO);
        assert_eq!(config.max_concurrent, 1);
    }

    #[test]
    fn env_overrides_and_fallbacks() {
        env::set_var(CONCURRENCY_VAR, "3");
        env::set_var(MINTIME_VAR, "25");
        let config = ThrottleConfig::from_env();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.min_spacing, Duration::from_millis(25));

        env::set_var(CONCURRENCY_VAR, "not a number");
        env::remove_var(MINTIME_VAR);
        let config = ThrottleConfig::from_env();
        assert_eq!(config.max_concurrent, num_cpus::get());
        assert_eq!(config.min_spacing, DEFAULT_MIN_SPACING);
        env::remove_var(CONCURRENCY_VAR);
    }

    #[tokio::test]
    async fn in_flight_count_never_exceeds_budget() {
        let throttle = Arc::new(Throttle::new(ThrottleConfig::new(2, Duration::ZERO)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let throttle = throttle.clone();
            let in_flight = in_flight.clone();
            let high_water = high_water.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = throttle.admit().await;
                let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(current, Ordering::SeqCst);
                sleep(Duration::from_millis(25)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(high_water.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn launches_are_spaced_apart() {
        let spacing = Duration::from_millis(20);
        let throttle = Arc::new(Throttle::new(ThrottleConfig::new(4, spacing)));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let throttle = throttle.clone();
            let starts = starts.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = throttle.admit().await;
                starts.lock().await.push(Instant::now());
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut starts = starts.lock().await.clone();
        starts.sort();
        // sleep_until never wakes early; the tolerance only absorbs the
        // scheduler jitter between waking and timestamping.
        let tolerance = Duration::from_millis(5);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] + tolerance >= spacing, "launches too close together");
        }
    }
}
