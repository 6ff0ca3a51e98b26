//! Throughput measurement and formatting.

use crate::traffic::Role;
use std::fmt;
use std::time::Duration;

/// Messages moved by one loop and the time it took.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Loop that produced the measurement.
    pub role: Role,
    /// Messages counted by that loop.
    pub messages: u64,
    /// Time from the first transfer attempt until the target was reached.
    pub elapsed: Duration,
}

impl Measurement {
    /// Creates a measurement.
    pub fn new(role: Role, messages: u64, elapsed: Duration) -> Self {
        Self {
            role,
            messages,
            elapsed,
        }
    }

    /// Messages per second.
    pub fn rate(&self) -> f64 {
        // Clamp so a sub-nanosecond timer reading cannot divide by zero.
        let secs = self.elapsed.as_secs_f64().max(1e-9);
        self.messages as f64 / secs
    }

    /// Formats this measurement under `label`.
    pub fn line(&self, label: &'static str) -> ThroughputLine {
        let (value, unit) = scale_rate(self.rate());
        ThroughputLine { label, value, unit }
    }
}

/// Scales a rate to `M` above one million, `k` above one thousand.
pub fn scale_rate(rate: f64) -> (f64, &'static str) {
    if rate > 1_000_000.0 {
        (rate / 1_000_000.0, "M")
    } else if rate > 1_000.0 {
        (rate / 1_000.0, "k")
    } else {
        (rate, "")
    }
}

/// One output line: `<label> <value> <unit>msgs/sec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputLine {
    /// `Sink` or `Forwarded`.
    pub label: &'static str,
    /// Scaled rate.
    pub value: f64,
    /// `""`, `"k"` or `"M"`.
    pub unit: &'static str,
}

impl fmt::Display for ThroughputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2} {}msgs/sec", self.label, self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_rate_thresholds() {
        assert_eq!(scale_rate(999.0), (999.0, ""));
        assert_eq!(scale_rate(1_000.0), (1_000.0, ""));
        assert_eq!(scale_rate(1_500.0), (1.5, "k"));
        assert_eq!(scale_rate(1_000_000.0), (1_000.0, "k"));
        assert_eq!(scale_rate(25_000_000.0), (25.0, "M"));
    }

    #[test]
    fn test_measurement_line() {
        let m = Measurement::new(Role::Sink, 1_000_000, Duration::from_millis(500));
        assert_eq!(m.rate(), 2_000_000.0);
        assert_eq!(m.line("Sink").to_string(), "Sink 2.00 Mmsgs/sec");

        let slow = Measurement::new(Role::Producer, 10, Duration::from_secs(1));
        assert_eq!(slow.line("Forwarded").to_string(), "Forwarded 10.00 msgs/sec");
    }
}
