use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use tracing::warn;

use shared_config::AppConfig;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Working-hours policy every doctor is scheduled under: Monday to Friday,
/// `[start_hour, end_hour)` UTC, slots every `slot_minutes` counted from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulingPolicy {
    pub lookahead_days: u32,
    pub start_hour: u32,
    pub end_hour: u32,
    pub slot_minutes: u32,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SchedulingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        let slot_minutes = if config.slot_minutes == 0 || config.slot_minutes > MINUTES_PER_DAY {
            warn!("Slot length of {} minutes is unusable, falling back to 30", config.slot_minutes);
            30
        } else {
            config.slot_minutes
        };

        Self {
            lookahead_days: config.booking_lookahead_days,
            start_hour: config.workday_start_hour,
            end_hour: config.workday_end_hour.min(24),
            slot_minutes,
        }
    }

    pub fn slot_length(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_minutes))
    }

    fn is_working_day(weekday: Weekday) -> bool {
        !matches!(weekday, Weekday::Sat | Weekday::Sun)
    }

    fn in_working_hours(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.start_hour * 60 && minute_of_day < self.end_hour * 60
    }

    /// Every bookable timestamp from the start of `now`'s day over the lookahead
    /// window, strictly after `now`, ascending.
    pub fn generate(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let first_day = now.date_naive();
        let mut slots = Vec::new();

        for offset in 0..self.lookahead_days {
            let day = first_day + Duration::days(i64::from(offset));
            if !Self::is_working_day(day.weekday()) {
                continue;
            }

            let midnight = day.and_time(NaiveTime::MIN).and_utc();
            let mut minute = 0;
            while minute < MINUTES_PER_DAY {
                if self.in_working_hours(minute) {
                    let slot = midnight + Duration::minutes(i64::from(minute));
                    if slot > now {
                        slots.push(slot);
                    }
                }
                minute += self.slot_minutes;
            }
        }

        slots
    }

    /// Whether `time` falls on the grid, ignoring the lookahead window and the clock.
    pub fn is_grid_slot(&self, time: DateTime<Utc>) -> bool {
        let minute_of_day = time.hour() * 60 + time.minute();

        Self::is_working_day(time.weekday())
            && time.second() == 0
            && time.nanosecond() == 0
            && minute_of_day % self.slot_minutes == 0
            && self.in_working_hours(minute_of_day)
    }

    /// Whether `time` starts before the last day `generate(now)` covers has ended.
    pub fn is_within_window(&self, time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let window_end = now.date_naive().and_time(NaiveTime::MIN).and_utc()
            + Duration::days(i64::from(self.lookahead_days));
        time < window_end
    }

    /// A grid slot that has not started yet and that `generate(now)` would offer.
    pub fn is_bookable(&self, time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        time > now && self.is_within_window(time, now) && self.is_grid_slot(time)
    }
}
