//! Next-run computation for auto-post rules
//!
//! Pure functions of (frequency, clock times, timezone, now). Wall-clock
//! `HH:MM` values are interpreted in the rule's IANA timezone; instants
//! are exchanged with the rest of the crate as UTC `OffsetDateTime`.

use chrono::{DateTime, Days, Months, NaiveDate, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{AutoPostRule, ClockTime, Frequency};

/// Errors from schedule computation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Time out of range: {0}")]
    OutOfRange(String),
}

/// The schedule-relevant fields of a rule
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub frequency: Frequency,
    pub scheduled_times: Vec<ClockTime>,
    pub timezone: Tz,
}

impl Schedule {
    pub fn new(frequency: Frequency, scheduled_times: Vec<ClockTime>, timezone: Tz) -> Self {
        Self {
            frequency,
            scheduled_times,
            timezone,
        }
    }

    pub fn of(rule: &AutoPostRule) -> Self {
        Self::new(rule.frequency, rule.scheduled_times.clone(), rule.timezone)
    }

    /// Next trigger instant strictly after `now`
    pub fn next_run_after(&self, now: OffsetDateTime) -> Result<OffsetDateTime, ScheduleError> {
        let local = to_zoned(now, self.timezone)?;

        let next = match self.frequency {
            Frequency::Hourly => {
                let into_hour = TimeDelta::seconds(i64::from(local.minute() * 60 + local.second()))
                    + TimeDelta::nanoseconds(i64::from(local.nanosecond()));
                local - into_hour + TimeDelta::hours(1)
            }
            Frequency::Daily if !self.scheduled_times.is_empty() => self.next_daily(&local)?,
            Frequency::Weekly => match self.scheduled_times.first() {
                Some(&at) => {
                    let date = local
                        .date_naive()
                        .checked_add_days(Days::new(7))
                        .ok_or_else(|| out_of_range("weekly date"))?;
                    localize(date, at, self.timezone)?
                }
                None => one_day_later(&local),
            },
            Frequency::Monthly => match self.scheduled_times.first() {
                Some(&at) => {
                    // chrono clamps to the last day of shorter months
                    let date = local
                        .date_naive()
                        .checked_add_months(Months::new(1))
                        .ok_or_else(|| out_of_range("monthly date"))?;
                    localize(date, at, self.timezone)?
                }
                None => one_day_later(&local),
            },
            Frequency::Daily | Frequency::Custom | Frequency::Unrecognized => one_day_later(&local),
        };

        from_zoned(&next)
    }

    fn next_daily(&self, local: &DateTime<Tz>) -> Result<DateTime<Tz>, ScheduleError> {
        let today = local.date_naive();

        let mut later_today: Option<DateTime<Tz>> = None;
        for &at in &self.scheduled_times {
            let candidate = localize(today, at, self.timezone)?;
            if candidate > *local && later_today.is_none_or(|best| candidate < best) {
                later_today = Some(candidate);
            }
        }
        if let Some(next) = later_today {
            return Ok(next);
        }

        let tomorrow = today
            .succ_opt()
            .ok_or_else(|| out_of_range("daily date"))?;
        let earliest = self
            .scheduled_times
            .iter()
            .min()
            .copied()
            .ok_or_else(|| out_of_range("empty daily times"))?;
        localize(tomorrow, earliest, self.timezone)
    }
}

/// Resolve a wall-clock time on a local date to an instant in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times skipped by
/// a DST jump move forward by the size of the gap (one hour).
fn localize(date: NaiveDate, at: ClockTime, tz: Tz) -> Result<DateTime<Tz>, ScheduleError> {
    let naive = date
        .and_hms_opt(u32::from(at.hour()), u32::from(at.minute()), 0)
        .ok_or_else(|| out_of_range("clock time"))?;

    if let Some(resolved) = tz.from_local_datetime(&naive).earliest() {
        return Ok(resolved);
    }

    tz.from_local_datetime(&(naive + TimeDelta::hours(1)))
        .earliest()
        .ok_or_else(|| out_of_range(&format!("{} in {}", naive, tz)))
}

fn one_day_later(local: &DateTime<Tz>) -> DateTime<Tz> {
    *local + TimeDelta::days(1)
}

fn to_zoned(instant: OffsetDateTime, tz: Tz) -> Result<DateTime<Tz>, ScheduleError> {
    Utc.timestamp_opt(instant.unix_timestamp(), instant.nanosecond())
        .single()
        .map(|utc| utc.with_timezone(&tz))
        .ok_or_else(|| out_of_range("instant"))
}

fn from_zoned(zoned: &DateTime<Tz>) -> Result<OffsetDateTime, ScheduleError> {
    let seconds = OffsetDateTime::from_unix_timestamp(zoned.timestamp())
        .map_err(|e| out_of_range(&e.to_string()))?;
    Ok(seconds + time::Duration::nanoseconds(i64::from(zoned.timestamp_subsec_nanos())))
}

fn out_of_range(what: &str) -> ScheduleError {
    ScheduleError::OutOfRange(what.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn times(values: &[&str]) -> Vec<ClockTime> {
        values.iter().map(|v| v.parse().unwrap()).collect()
    }

    fn utc(frequency: Frequency, values: &[&str]) -> Schedule {
        Schedule::new(frequency, times(values), chrono_tz::UTC)
    }

    #[test]
    fn test_daily_picks_next_time_today_or_first_tomorrow() {
        let schedule = utc(Frequency::Daily, &["09:00", "18:00"]);

        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 08:00 UTC)).unwrap(),
            datetime!(2024-01-01 09:00 UTC)
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 12:00 UTC)).unwrap(),
            datetime!(2024-01-01 18:00 UTC)
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 20:00 UTC)).unwrap(),
            datetime!(2024-01-02 09:00 UTC)
        );
    }

    #[test]
    fn test_daily_checks_every_time_when_unsorted() {
        let schedule = utc(Frequency::Daily, &["18:00", "09:00", "12:30"]);

        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 08:00 UTC)).unwrap(),
            datetime!(2024-01-01 09:00 UTC)
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 20:00 UTC)).unwrap(),
            datetime!(2024-01-02 09:00 UTC)
        );
    }

    #[test]
    fn test_daily_time_equal_to_now_is_not_in_future() {
        let schedule = utc(Frequency::Daily, &["09:00", "18:00"]);
        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 09:00 UTC)).unwrap(),
            datetime!(2024-01-01 18:00 UTC)
        );
    }

    #[test]
    fn test_daily_localizes_to_rule_timezone() {
        let schedule = Schedule::new(Frequency::Daily, times(&["09:00"]), chrono_tz::Asia::Tokyo);

        // 08:30 JST on Jan 2
        let now = datetime!(2024-01-01 23:30 UTC);
        assert_eq!(
            schedule.next_run_after(now).unwrap(),
            datetime!(2024-01-02 00:00 UTC)
        );

        // 10:00 JST on Jan 2, so 09:00 JST on Jan 3
        let now = datetime!(2024-01-02 01:00 UTC);
        assert_eq!(
            schedule.next_run_after(now).unwrap(),
            datetime!(2024-01-03 00:00 UTC)
        );
    }

    #[test]
    fn test_hourly_rounds_to_next_top_of_hour() {
        let schedule = utc(Frequency::Hourly, &[]);

        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 11:00 UTC)).unwrap(),
            datetime!(2024-01-01 12:00 UTC)
        );
        assert_eq!(
            schedule
                .next_run_after(datetime!(2024-01-01 10:30:15.5 UTC))
                .unwrap(),
            datetime!(2024-01-01 11:00 UTC)
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2024-12-31 23:59 UTC)).unwrap(),
            datetime!(2025-01-01 00:00 UTC)
        );
    }

    #[test]
    fn test_hourly_uses_local_hour_boundary() {
        let schedule = Schedule::new(Frequency::Hourly, vec![], chrono_tz::Asia::Kolkata);

        // 15:30 IST, next local top of hour is 16:00 IST
        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-01 10:00 UTC)).unwrap(),
            datetime!(2024-01-01 10:30 UTC)
        );
    }

    #[test]
    fn test_weekly_uses_first_time_seven_days_out() {
        let schedule = utc(Frequency::Weekly, &["09:00", "18:00"]);
        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-03 10:00 UTC)).unwrap(),
            datetime!(2024-01-10 09:00 UTC)
        );
    }

    #[test]
    fn test_monthly_clamps_to_end_of_short_month() {
        let schedule = utc(Frequency::Monthly, &["09:00"]);

        assert_eq!(
            schedule.next_run_after(datetime!(2024-01-31 10:00 UTC)).unwrap(),
            datetime!(2024-02-29 09:00 UTC)
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2023-01-31 10:00 UTC)).unwrap(),
            datetime!(2023-02-28 09:00 UTC)
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2024-03-15 10:00 UTC)).unwrap(),
            datetime!(2024-04-15 09:00 UTC)
        );
    }

    #[test]
    fn test_custom_and_unrecognized_default_to_one_day() {
        let now = datetime!(2024-01-01 10:17 UTC);
        for frequency in [Frequency::Custom, Frequency::Unrecognized] {
            let schedule = utc(frequency, &["09:00"]);
            assert_eq!(
                schedule.next_run_after(now).unwrap(),
                datetime!(2024-01-02 10:17 UTC)
            );
        }
    }

    #[test]
    fn test_missing_times_default_to_one_day() {
        let now = datetime!(2024-01-01 10:00 UTC);
        for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly] {
            assert_eq!(
                utc(frequency, &[]).next_run_after(now).unwrap(),
                datetime!(2024-01-02 10:00 UTC)
            );
        }
    }

    #[test]
    fn test_recomputation_is_deterministic() {
        let schedule = Schedule::new(
            Frequency::Daily,
            times(&["07:15", "21:45"]),
            chrono_tz::Europe::Berlin,
        );
        let now = datetime!(2024-06-01 12:34:56 UTC);

        let first = schedule.next_run_after(now).unwrap();
        let second = schedule.next_run_after(now).unwrap();
        assert_eq!(first, second);
        assert!(first > now);
    }

    #[test]
    fn test_skipped_wall_time_moves_past_gap() {
        // 02:30 does not exist in New York on 2024-03-10
        let schedule = Schedule::new(
            Frequency::Daily,
            times(&["02:30"]),
            chrono_tz::America::New_York,
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2024-03-10 05:00 UTC)).unwrap(),
            datetime!(2024-03-10 07:30 UTC)
        );
    }

    #[test]
    fn test_repeated_wall_time_takes_earlier_instant() {
        // 01:30 happens twice in New York on 2024-11-03
        let schedule = Schedule::new(
            Frequency::Daily,
            times(&["01:30"]),
            chrono_tz::America::New_York,
        );
        assert_eq!(
            schedule.next_run_after(datetime!(2024-11-03 04:00 UTC)).unwrap(),
            datetime!(2024-11-03 05:30 UTC)
        );
    }
}
