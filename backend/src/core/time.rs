//! Time management for the session
//!
//! The session runs a fixed number of periods. Each period's hiring phase
//! runs up to `hiring_steps` rounds. Both counters are 1-based; a clock
//! that has not started yet reports period 0.

use crate::core::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Tracks the current period and hiring round
///
/// # Example
/// ```
/// use labor_market_core::PeriodClock;
///
/// let mut clock = PeriodClock::new(2, 3).unwrap();
/// assert_eq!(clock.current_period(), 0);
///
/// clock.start_period();
/// assert_eq!(clock.current_period(), 1);
/// assert_eq!(clock.current_round(), 1);
///
/// clock.advance_round();
/// assert_eq!(clock.current_round(), 2);
/// assert!(!clock.is_final_period());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodClock {
    /// Current period (0 = not started)
    period: usize,
    /// Current hiring round within the period
    round: usize,
    num_periods: usize,
    hiring_steps: usize,
}

impl PeriodClock {
    /// Create a new clock; both bounds must be positive
    pub fn new(num_periods: usize, hiring_steps: usize) -> Result<Self, ConfigError> {
        if num_periods == 0 {
            return Err(ConfigError::NonPositive {
                field: "num_periods",
            });
        }
        if hiring_steps == 0 {
            return Err(ConfigError::NonPositive {
                field: "hiring_steps",
            });
        }
        Ok(Self {
            period: 0,
            round: 0,
            num_periods,
            hiring_steps,
        })
    }

    /// Move to the next period and reset the hiring round to 1
    pub fn start_period(&mut self) {
        self.period += 1;
        self.round = 1;
    }

    /// Move to the next hiring round
    pub fn advance_round(&mut self) {
        self.round += 1;
    }

    pub fn current_period(&self) -> usize {
        self.period
    }

    pub fn current_round(&self) -> usize {
        self.round
    }

    pub fn num_periods(&self) -> usize {
        self.num_periods
    }

    pub fn hiring_steps(&self) -> usize {
        self.hiring_steps
    }

    /// Whether the current period is the last one
    pub fn is_final_period(&self) -> bool {
        self.period >= self.num_periods
    }

    /// Whether the hiring round counter has passed `hiring_steps`
    ///
    /// # Example
    /// ```
    /// use labor_market_core::PeriodClock;
    ///
    /// let mut clock = PeriodClock::new(1, 1).unwrap();
    /// clock.start_period();
    /// assert!(!clock.hiring_exhausted());
    /// clock.advance_round();
    /// assert!(clock.hiring_exhausted());
    /// ```
    pub fn hiring_exhausted(&self) -> bool {
        self.round > self.hiring_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_bounds_rejected() {
        assert_eq!(
            PeriodClock::new(1, 0),
            Err(ConfigError::NonPositive {
                field: "hiring_steps"
            })
        );
        assert_eq!(
            PeriodClock::new(0, 3),
            Err(ConfigError::NonPositive {
                field: "num_periods"
            })
        );
    }

    #[test]
    fn test_start_period_resets_round() {
        let mut clock = PeriodClock::new(3, 3).unwrap();
        clock.start_period();
        clock.advance_round();
        clock.advance_round();
        assert_eq!(clock.current_round(), 3);

        clock.start_period();
        assert_eq!(clock.current_period(), 2);
        assert_eq!(clock.current_round(), 1);
    }

    #[test]
    fn test_final_period() {
        let mut clock = PeriodClock::new(2, 1).unwrap();
        clock.start_period();
        assert!(!clock.is_final_period());
        clock.start_period();
        assert!(clock.is_final_period());
    }
}
