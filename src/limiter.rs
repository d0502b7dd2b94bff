//! Dispatch throttling.
//!
//! Every detection batch advances a counter; one batch in `cycle_length` is
//! allowed to reach the actuator. Angles for the other batches are still
//! computed and published, they are just not sent.

use serde::{Deserialize, Serialize};

/// Counts batches and permits one dispatch per cycle.
#[derive(Debug, Clone)]
pub struct FrameRateLimiter {
    cycle_length: u32,
    counter: u32,
}

impl FrameRateLimiter {
    /// A cycle length of 0 is treated as 1 (dispatch every batch).
    pub fn new(cycle_length: u32) -> Self {
        Self {
            cycle_length: cycle_length.max(1),
            counter: 0,
        }
    }

    /// Effective cycle length, at least 1.
    pub fn cycle_length(&self) -> u32 {
        self.cycle_length
    }

    /// Advance by one batch. Returns `true` on the batch that completes a cycle.
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.cycle_length {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Start a new cycle.
    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

/// Rule for picking the one target dispatched from a multi-detection batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelection {
    /// First detection in source order.
    #[default]
    First,
    /// Highest confidence; ties go to the earliest detection.
    HighestConfidence,
}

impl TargetSelection {
    /// Index of the selected item, given each item's confidence in source order.
    pub fn select<I>(self, confidences: I) -> Option<usize>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut iter = confidences.into_iter().enumerate();
        match self {
            TargetSelection::First => iter.next().map(|(i, _)| i),
            TargetSelection::HighestConfidence => {
                let (mut best, mut best_conf) = iter.next()?;
                for (i, conf) in iter {
                    if conf > best_conf {
                        best = i;
                        best_conf = conf;
                    }
                }
                Some(best)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_of_three() {
        let mut limiter = FrameRateLimiter::new(3);
        let permitted: Vec<usize> = (1..=12).filter(|_| limiter.tick()).collect();
        assert_eq!(permitted, vec![3, 6, 9, 12]);
    }

    #[test]
    fn test_cycle_of_one_always_permits() {
        let mut limiter = FrameRateLimiter::new(1);
        assert!((0..5).all(|_| limiter.tick()));
    }

    #[test]
    fn test_zero_cycle_is_one() {
        let limiter = FrameRateLimiter::new(0);
        assert_eq!(limiter.cycle_length(), 1);
    }

    #[test]
    fn test_reset_restarts_cycle() {
        let mut limiter = FrameRateLimiter::new(3);
        limiter.tick();
        limiter.tick();
        limiter.reset();
        assert!(!limiter.tick());
        assert!(!limiter.tick());
        assert!(limiter.tick());
    }

    #[test]
    fn test_selection() {
        let confs = [0.4, 0.9, 0.9, 0.1];
        assert_eq!(TargetSelection::First.select(confs), Some(0));
        assert_eq!(TargetSelection::HighestConfidence.select(confs), Some(1));
        assert_eq!(TargetSelection::First.select(Vec::<f32>::new()), None);
        assert_eq!(
            TargetSelection::HighestConfidence.select(Vec::<f32>::new()),
            None
        );
    }
}
