use std::fmt;
use std::hint;
use std::str::FromStr;
use std::thread;

/// What a loop does when its ring is full or empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleStrategy {
    /// Retry immediately with a PAUSE hint (benchmark default).
    #[default]
    Spin,
    /// Yield to the OS scheduler between retries.
    Yield,
    /// Spin with growing PAUSE runs, then yield.
    Backoff,
    /// Yield between retries and give up after `max_idle_polls` consecutive
    /// idle polls. Lets tests terminate when a peer never makes progress.
    Bounded {
        /// Consecutive idle polls tolerated before giving up.
        max_idle_polls: u64,
    },
}

impl IdleStrategy {
    /// Creates the per-loop retry state for this strategy.
    #[inline]
    pub fn idler(self) -> Idler {
        Idler {
            strategy: self,
            backoff: Backoff::new(),
            idle_polls: 0,
        }
    }
}

impl FromStr for IdleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spin" => Ok(Self::Spin),
            "yield" => Ok(Self::Yield),
            "backoff" => Ok(Self::Backoff),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for IdleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spin => f.write_str("spin"),
            Self::Yield => f.write_str("yield"),
            Self::Backoff => f.write_str("backoff"),
            Self::Bounded { max_idle_polls } => write!(f, "bounded({max_idle_polls})"),
        }
    }
}

/// A loop exhausted its idle budget under [`IdleStrategy::Bounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stalled {
    /// Consecutive idle polls observed.
    pub idle_polls: u64,
}

/// Per-loop retry state.
#[derive(Debug)]
pub struct Idler {
    strategy: IdleStrategy,
    backoff: Backoff,
    idle_polls: u64,
}

impl Idler {
    /// Called after a transfer moved nothing.
    #[inline]
    pub fn idle(&mut self) -> Result<(), Stalled> {
        self.idle_polls += 1;
        match self.strategy {
            IdleStrategy::Spin => hint::spin_loop(),
            IdleStrategy::Yield => thread::yield_now(),
            IdleStrategy::Backoff => {
                if self.backoff.is_completed() {
                    thread::yield_now();
                } else {
                    self.backoff.snooze();
                }
            }
            IdleStrategy::Bounded { max_idle_polls } => {
                if self.idle_polls > max_idle_polls {
                    return Err(Stalled {
                        idle_polls: self.idle_polls,
                    });
                }
                thread::yield_now();
            }
        }
        Ok(())
    }

    /// Called after a transfer made progress.
    #[inline]
    pub fn reset(&mut self) {
        if self.idle_polls != 0 {
            self.idle_polls = 0;
            self.backoff.reset();
        }
    }
}

/// Adaptive backoff (Crossbeam-style).
///
/// Progressively increases wait time: spin with PAUSE → yield to OS.
#[derive(Debug)]
struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding
    const YIELD_LIMIT: u32 = 10;

    #[inline]
    fn new() -> Self {
        Self { step: 0 }
    }

    #[inline]
    fn spin(&mut self) {
        let spins = 1 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    #[inline]
    fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            self.spin();
        } else {
            thread::yield_now();
            if self.step <= Self::YIELD_LIMIT {
                self.step += 1;
            }
        }
    }

    #[inline]
    fn is_completed(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }

    #[inline]
    fn reset(&mut self) {
        self.step = 0;
    }
}
