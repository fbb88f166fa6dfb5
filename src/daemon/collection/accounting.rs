use std::time::Duration;

use chrono::{DateTime, Utc};

/// Result of feeding one sample into [DurationAccountant].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// A record should be written with the given duration. `resumed` marks the first active
    /// tick after an idle stretch.
    Active { duration_seconds: f64, resumed: bool },
    /// The user just went idle. Nothing is written.
    IdleEntered,
    StillIdle,
}

/// Converts point-in-time samples into bounded durations. Each active tick is charged with the
/// time since the previous active tick, capped at twice the polling interval, so a missed tick
/// or system sleep never inflates one record. Time spent idle is never charged.
#[derive(Debug)]
pub struct DurationAccountant {
    max_duration_seconds: f64,
    last_sample_time: Option<DateTime<Utc>>,
    is_currently_idle: bool,
}

impl DurationAccountant {
    pub fn new(interval: Duration) -> Self {
        Self {
            max_duration_seconds: 2. * interval.as_secs_f64(),
            last_sample_time: None,
            is_currently_idle: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.is_currently_idle
    }

    pub fn observe(&mut self, now: DateTime<Utc>, is_idle: bool) -> TickOutcome {
        if is_idle {
            let entered = !self.is_currently_idle;
            self.is_currently_idle = true;
            return if entered {
                TickOutcome::IdleEntered
            } else {
                TickOutcome::StillIdle
            };
        }

        if self.is_currently_idle {
            // The gap since the last active tick was spent idle.
            self.is_currently_idle = false;
            self.last_sample_time = Some(now);
            return TickOutcome::Active {
                duration_seconds: 0.,
                resumed: true,
            };
        }

        let duration_seconds = match self.last_sample_time {
            Some(last) => {
                let elapsed = (now - last).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6;
                elapsed.clamp(0., self.max_duration_seconds)
            }
            None => 0.,
        };
        self.last_sample_time = Some(now);
        TickOutcome::Active {
            duration_seconds,
            resumed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use super::{DurationAccountant, TickOutcome};

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
    }

    fn active(duration_seconds: f64) -> TickOutcome {
        TickOutcome::Active {
            duration_seconds,
            resumed: false,
        }
    }

    #[test]
    fn first_tick_has_no_duration() {
        let mut accountant = DurationAccountant::new(Duration::from_secs(5));
        assert_eq!(accountant.observe(t(0), false), active(0.));
        assert_eq!(accountant.observe(t(5), false), active(5.));
    }

    #[test]
    fn duration_is_capped_at_two_intervals() {
        let mut accountant = DurationAccountant::new(Duration::from_secs(5));
        accountant.observe(t(0), false);
        assert_eq!(accountant.observe(t(3600), false), active(10.));
        assert_eq!(accountant.observe(t(3607), false), active(7.));
    }

    #[test]
    fn clock_going_backwards_is_not_negative() {
        let mut accountant = DurationAccountant::new(Duration::from_secs(5));
        accountant.observe(t(10), false);
        assert_eq!(accountant.observe(t(4), false), active(0.));
    }

    #[test]
    fn idle_gap_is_excluded() {
        let mut accountant = DurationAccountant::new(Duration::from_secs(5));
        assert_eq!(accountant.observe(t(0), false), active(0.));
        assert_eq!(accountant.observe(t(5), true), TickOutcome::IdleEntered);
        assert!(accountant.is_idle());
        assert_eq!(accountant.observe(t(10), true), TickOutcome::StillIdle);
        assert_eq!(
            accountant.observe(t(15), false),
            TickOutcome::Active {
                duration_seconds: 0.,
                resumed: true
            }
        );
        assert!(!accountant.is_idle());
        assert_eq!(accountant.observe(t(20), false), active(5.));
    }
}
