//! Next-fire computation for each `ScheduleMode` (§4.8 "Scheduling").

use super::{ScheduleMode, TriggerError};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// A parsed `schedule_value`, resolved once at subscribe time and reused
/// by the backend to compute successive wakeups.
#[derive(Debug, Clone)]
pub enum ParsedSchedule {
    /// A restricted five-field cron expression: minute, hour, day-of-month,
    /// month, day-of-week, each either `*` or an exact number. This covers
    /// the fixed-instant firing patterns §4.8 names without pulling in a
    /// calendar-expression crate the rest of the corpus never reaches for.
    Cron {
        minute: Option<u32>,
        hour: Option<u32>,
        day_of_month: Option<u32>,
        month: Option<u32>,
        day_of_week: Option<u32>,
    },
    FixedDelay { delay: Duration },
    FixedRate { interval: Duration },
    OneTime { at: DateTime<Utc> },
}

impl ParsedSchedule {
    pub fn parse(mode: ScheduleMode, value: &str) -> Result<Self, TriggerError> {
        match mode {
            ScheduleMode::Cron => parse_cron(value).map_err(|reason| TriggerError::InvalidSchedule {
                mode,
                value: value.to_string(),
                reason,
            }),
            ScheduleMode::FixedDelay => parse_millis(value)
                .map(|ms| ParsedSchedule::FixedDelay { delay: Duration::milliseconds(ms) })
                .map_err(|reason| TriggerError::InvalidSchedule { mode, value: value.to_string(), reason }),
            ScheduleMode::FixedRate => parse_millis(value)
                .map(|ms| ParsedSchedule::FixedRate { interval: Duration::milliseconds(ms) })
                .map_err(|reason| TriggerError::InvalidSchedule { mode, value: value.to_string(), reason }),
            ScheduleMode::OneTime => DateTime::parse_from_rfc3339(value)
                .map(|at| ParsedSchedule::OneTime { at: at.with_timezone(&Utc) })
                .map_err(|e| TriggerError::InvalidSchedule {
                    mode,
                    value: value.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// The next time this schedule should fire strictly after `after`.
    /// `FIXED_DELAY` measures from the end of the previous run, so `after`
    /// must be the previous completion time for that mode; for the other
    /// modes `after` is simply "now".
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ParsedSchedule::OneTime { at } => (*at > after).then_some(*at),
            ParsedSchedule::FixedDelay { delay } => Some(after + *delay),
            ParsedSchedule::FixedRate { interval } => Some(after + *interval),
            ParsedSchedule::Cron { .. } => self.next_cron_after(after),
        }
    }

    fn next_cron_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ParsedSchedule::Cron {
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
        } = self
        else {
            return None;
        };
        let mut candidate = after + Duration::minutes(1);
        candidate = candidate.with_second(0)?.with_nanosecond(0)?;
        // Brute-force minute-stepping bounded to two years out; the
        // restricted field grammar above makes a closed-form next-fire
        // computation unnecessary for the patterns this scheduler supports.
        let limit = after + Duration::days(366 * 2);
        while candidate < limit {
            let minute_ok = minute.map_or(true, |m| candidate.minute() == m);
            let hour_ok = hour.map_or(true, |h| candidate.hour() == h);
            let dom_ok = day_of_month.map_or(true, |d| candidate.day() == d);
            let month_ok = month.map_or(true, |m| candidate.month() == m);
            let dow_ok = day_of_week.map_or(true, |d| candidate.weekday().num_days_from_sunday() == d);
            if minute_ok && hour_ok && dom_ok && month_ok && dow_ok {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

fn parse_millis(value: &str) -> Result<i64, String> {
    value.trim().parse::<i64>().map_err(|e| e.to_string())
}

fn parse_cron_field(field: &str) -> Result<Option<u32>, String> {
    if field == "*" {
        Ok(None)
    } else {
        field.parse::<u32>().map(Some).map_err(|e| format!("'{field}': {e}"))
    }
}

fn parse_cron(value: &str) -> Result<ParsedSchedule, String> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 whitespace-separated fields, got {}", fields.len()));
    }
    Ok(ParsedSchedule::Cron {
        minute: parse_cron_field(fields[0])?,
        hour: parse_cron_field(fields[1])?,
        day_of_month: parse_cron_field(fields[2])?,
        month: parse_cron_field(fields[3])?,
        day_of_week: parse_cron_field(fields[4])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_time_fires_only_after_its_instant() {
        let at = Utc::now() + Duration::milliseconds(200);
        let schedule = ParsedSchedule::OneTime { at };
        assert_eq!(schedule.next_after(Utc::now()), Some(at));
        assert_eq!(schedule.next_after(at), None);
    }

    #[test]
    fn fixed_rate_advances_by_interval_from_given_instant() {
        let schedule = ParsedSchedule::FixedRate {
            interval: Duration::seconds(30),
        };
        let now = Utc::now();
        assert_eq!(schedule.next_after(now), Some(now + Duration::seconds(30)));
    }

    #[test]
    fn cron_every_minute_fires_within_a_minute() {
        let schedule = ParsedSchedule::parse(ScheduleMode::Cron, "* * * * *").unwrap();
        let now = Utc::now();
        let next = schedule.next_after(now).unwrap();
        assert!(next > now);
        assert!(next - now <= Duration::minutes(1));
    }

    #[test]
    fn cron_rejects_wrong_field_count() {
        assert!(ParsedSchedule::parse(ScheduleMode::Cron, "* * *").is_err());
    }
}
