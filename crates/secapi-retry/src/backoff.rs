//! Pluggable backoff strategies behind a single [`IntervalFunction`]
//! abstraction, so the retry stage and the streaming reconnect state
//! machine can share the same exponential schedule.

use std::time::Duration;

pub trait IntervalFunction: Send + Sync {
    /// Computes the delay before the next attempt.
    ///
    /// `attempt` is 0-indexed: the first retry asks for `next_interval(0)`.
    fn next_interval(&self, attempt: usize) -> Duration;
}

#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `delay(n) = min(initial * factor^n, max)` — the default REST retry and
/// stream reconnect schedule.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration) -> Self {
        Self { initial_interval, multiplier: 2.0, max_interval: None }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let interval = self.initial_interval.mul_f64(factor);
        match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        }
    }
}

/// Same schedule as [`ExponentialBackoff`] with jitter applied, to avoid a
/// thundering herd of simultaneously-scheduled retries.
#[derive(Debug, Clone)]
pub struct ExponentialRandomBackoff {
    initial_interval: Duration,
    multiplier: f64,
    randomization_factor: f64,
    max_interval: Option<Duration>,
}

impl ExponentialRandomBackoff {
    pub fn new(initial_interval: Duration, randomization_factor: f64) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
            max_interval: None,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    fn randomize(&self, duration: Duration) -> Duration {
        use rand::Rng;
        let mut rng = rand::rng();
        let delta = duration.as_secs_f64() * self.randomization_factor;
        let min = duration.as_secs_f64() - delta;
        let max = duration.as_secs_f64() + delta;
        let randomized = rng.random_range(min..=max);
        Duration::from_secs_f64(randomized.max(0.0))
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let interval = self.initial_interval.mul_f64(factor);
        let capped = match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        };
        self.randomize(capped)
    }
}

pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
