use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the randomized pause before each stimulus. Each call is an
/// independent draw; tests substitute deterministic sources.
pub trait DelaySource {
    fn next_delay(&mut self) -> Duration;
}

/// Production source: uniform draw from `[min_ms, max_ms)`.
#[derive(Debug)]
pub struct UniformDelay {
    min_ms: u64,
    max_ms: u64,
    rng: StdRng,
}

impl UniformDelay {
    /// Callers validate the window via `SessionConfig::validate` first; an
    /// empty range here would panic inside `gen_range`.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            max_ms,
            rng: StdRng::from_entropy(),
        }
    }
}

impl DelaySource for UniformDelay {
    fn next_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.min_ms..self.max_ms))
    }
}

/// Same delay every trial.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelaySource for FixedDelay {
    fn next_delay(&mut self) -> Duration {
        self.0
    }
}

/// Plays back a fixed script of delays, then repeats the last one.
#[derive(Debug, Clone)]
pub struct ScriptedDelay {
    queue: VecDeque<Duration>,
    last: Duration,
}

impl ScriptedDelay {
    pub fn from_millis(delays: &[u64]) -> Self {
        let queue: VecDeque<Duration> =
            delays.iter().map(|ms| Duration::from_millis(*ms)).collect();
        let last = queue.back().copied().unwrap_or(Duration::ZERO);
        Self { queue, last }
    }
}

impl DelaySource for ScriptedDelay {
    fn next_delay(&mut self) -> Duration {
        match self.queue.pop_front() {
            Some(d) => {
                self.last = d;
                d
            }
            None => self.last,
        }
    }
}
