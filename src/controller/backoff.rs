//! # Fibonacci Backoff
//!
//! Progressive backoff for transport failures. Grows more slowly than
//! exponential backoff, so a flapping API server is retried steadily without
//! being hammered.
//!
//! With the default bounds the sequence is 60s, 60s, 120s, 180s, 300s, 480s,
//! 600s (cap).
//!
//! ```rust
//! use app_operator::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(60, 600);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 120);
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// `min_secs` is used for the first two values; the sequence is capped at `max_secs`
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        let max_secs = max_secs.max(min_secs);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Current backoff in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        result
    }

    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Back to the start of the sequence
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_is_capped() {
        let mut backoff = FibonacciBackoff::new(60, 600);
        let sequence: Vec<u64> = (0..8).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(sequence, vec![60, 60, 120, 180, 300, 480, 600, 600]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::new(60, 600);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_minimum_is_clamped() {
        let mut backoff = FibonacciBackoff::new(0, 10);
        assert_eq!(backoff.next_backoff_seconds(), 1);
    }

    #[test]
    fn test_max_below_min_uses_min() {
        let mut backoff = FibonacciBackoff::new(120, 60);
        assert_eq!(backoff.next_backoff_seconds(), 120);
        assert_eq!(backoff.next_backoff_seconds(), 120);
        assert_eq!(backoff.next_backoff_seconds(), 120);
    }

    #[test]
    fn test_reset_with_max_below_min_restarts_at_min() {
        let mut backoff = FibonacciBackoff::new(120, 60);
        backoff.next_backoff_seconds();

        backoff.reset();

        assert_eq!(backoff.next_backoff_seconds(), 120);
    }
}
