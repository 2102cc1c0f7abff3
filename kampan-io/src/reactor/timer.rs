//! Periodic timer with explicit expiry consumption
//!
//! Mirrors a timer file descriptor: the owner checks [`PeriodicTimer::is_expired`],
//! then consumes the expiration count before doing the periodic work.
//! Consuming a timer that has not expired is a scheduling error.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: Duration,
    deadline: Instant,
}

impl PeriodicTimer {
    /// Arm a timer whose first expiry is one period from `now`
    pub fn new(period: Duration, now: Instant) -> Result<Self> {
        check_period(period)?;
        Ok(Self {
            period,
            deadline: now + period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Consume pending expirations; returns how many periods elapsed
    ///
    /// When more than one period was missed the timer re-arms from `now`
    /// instead of firing a burst of catch-up ticks.
    pub fn consume(&mut self, now: Instant) -> Result<u64> {
        if now < self.deadline {
            return Err(Error::Scheduling(format!(
                "timer consumed {:?} before expiry",
                self.deadline - now
            )));
        }

        let late = now - self.deadline;
        let missed = late.as_nanos() / self.period.as_nanos();
        if missed == 0 {
            self.deadline += self.period;
        } else {
            self.deadline = now + self.period;
        }
        Ok(u64::try_from(missed + 1).unwrap_or(u64::MAX))
    }

    /// Change the period and re-arm from `now`
    pub fn set_period(&mut self, period: Duration, now: Instant) -> Result<()> {
        check_period(period)?;
        self.period = period;
        self.deadline = now + period;
        Ok(())
    }
}

fn check_period(period: Duration) -> Result<()> {
    if period.is_zero() {
        return Err(Error::Scheduling("timer period must be non-zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_before_expiry_fails() {
        let now = Instant::now();
        let mut timer = PeriodicTimer::new(Duration::from_millis(100), now).unwrap();
        assert!(!timer.is_expired(now));
        assert!(matches!(timer.consume(now), Err(Error::Scheduling(_))));
    }

    #[test]
    fn test_consume_advances_deadline() {
        let start = Instant::now();
        let period = Duration::from_millis(100);
        let mut timer = PeriodicTimer::new(period, start).unwrap();

        let tick = start + period;
        assert_eq!(timer.consume(tick).unwrap(), 1);
        assert_eq!(timer.deadline(), start + period * 2);
    }

    #[test]
    fn test_missed_periods_rearm_from_now() {
        let start = Instant::now();
        let period = Duration::from_millis(10);
        let mut timer = PeriodicTimer::new(period, start).unwrap();

        let late = start + Duration::from_millis(35);
        assert_eq!(timer.consume(late).unwrap(), 3);
        assert_eq!(timer.deadline(), late + period);
    }

    #[test]
    fn test_set_period_exact_nanoseconds() {
        let now = Instant::now();
        let mut timer = PeriodicTimer::new(Duration::from_secs(1), now).unwrap();
        timer.set_period(Duration::from_nanos(500), now).unwrap();
        assert_eq!(timer.period(), Duration::from_nanos(500));
        assert_eq!(timer.deadline(), now + Duration::from_nanos(500));
    }

    #[test]
    fn test_zero_period_rejected() {
        let now = Instant::now();
        assert!(PeriodicTimer::new(Duration::ZERO, now).is_err());

        let mut timer = PeriodicTimer::new(Duration::from_secs(1), now).unwrap();
        assert!(timer.set_period(Duration::ZERO, now).is_err());
        assert_eq!(timer.period(), Duration::from_secs(1));
    }
}
