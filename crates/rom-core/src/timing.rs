//! Wall-clock timing for basis computations.
//!
//! Persisted bases carry `compute_time_s`, which is NaN when no measurement
//! was taken.

use std::time::Instant;

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Stop the timer and return elapsed time in seconds.
    pub fn stop(self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_keeps_label_and_measures_forward() {
        let timer = Timer::start("pod");
        assert_eq!(timer.label(), "pod");
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(timer.stop() >= 0.002);
    }
}
