use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde_json::Value;

const MAX_LOOKAHEAD_DAYS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayGroup {
    Times(Vec<u32>),
    Hourly { from: u32, to: u32 },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub timezone: Tz,
    pub weekdays: DayGroup,
    pub weekends: DayGroup,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ScheduleError {
    pub msg: String,
}

impl DayGroup {
    fn hours(&self) -> Vec<u32> {
        match self {
            DayGroup::Times(hours) => hours.clone(),
            DayGroup::Hourly { from, to } => (*from..=*to).collect(),
            DayGroup::Empty => vec![],
        }
    }
}

impl Schedule {
    // Accepted shape:
    // {"timezone": "Europe/Kyiv",
    //  "weekdays": {"times": ["09:00", "13:00"]},
    //  "weekends": {"hourly": "10:00-18:00"}}
    pub fn parse(value: &Value) -> Result<Schedule, ScheduleError> {
        let timezone = match value.get("timezone").and_then(|timezone| timezone.as_str()) {
            Some(name) => name.parse::<Tz>().map_err(|_| ScheduleError {
                msg: format!("unknown timezone {}", name),
            })?,
            None => Tz::UTC,
        };

        let weekdays = parse_day_group(value.get("weekdays"))?;
        let weekends = parse_day_group(value.get("weekends"))?;

        if weekdays == DayGroup::Empty && weekends == DayGroup::Empty {
            return Err(ScheduleError {
                msg: "schedule has no fire times".to_string(),
            });
        }

        Ok(Schedule {
            timezone,
            weekdays,
            weekends,
        })
    }

    // The next n fire instants after `now`, strictly increasing, resolved in
    // the schedule's zone. Hours skipped by a DST jump are simply missing.
    pub fn next_times(&self, now: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        let mut result = vec![];
        let mut date = now.with_timezone(&self.timezone).date_naive();

        for _ in 0..MAX_LOOKAHEAD_DAYS {
            let group = match date.weekday() {
                Weekday::Sat | Weekday::Sun => &self.weekends,
                _ => &self.weekdays,
            };

            for hour in group.hours() {
                let local = self
                    .timezone
                    .with_ymd_and_hms(date.year(), date.month(), date.day(), hour, 0, 0);

                let fire = match local.earliest() {
                    Some(fire) => fire.with_timezone(&Utc),
                    None => continue,
                };

                if fire > now {
                    result.push(fire);

                    if result.len() == n {
                        return result;
                    }
                }
            }

            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        result
    }
}

fn parse_day_group(value: Option<&Value>) -> Result<DayGroup, ScheduleError> {
    let value = match value {
        Some(value) if !value.is_null() => value,
        _ => return Ok(DayGroup::Empty),
    };

    if let Some(times) = value.get("times").and_then(|times| times.as_array()) {
        let mut hours = times
            .iter()
            .map(|time| {
                time.as_str()
                    .ok_or(ScheduleError {
                        msg: "times entries must be strings".to_string(),
                    })
                    .and_then(parse_hour)
            })
            .collect::<Result<Vec<u32>, ScheduleError>>()?;

        hours.sort_unstable();
        hours.dedup();

        if hours.is_empty() {
            return Ok(DayGroup::Empty);
        }

        return Ok(DayGroup::Times(hours));
    }

    if let Some(range) = value.get("hourly").and_then(|range| range.as_str()) {
        let (from, to) = range.split_once('-').ok_or(ScheduleError {
            msg: format!("hourly range {} must look like 10:00-18:00", range),
        })?;

        let from = parse_hour(from)?;
        let to = parse_hour(to)?;

        if from > to {
            return Err(ScheduleError {
                msg: format!("hourly range {} is inverted", range),
            });
        }

        return Ok(DayGroup::Hourly { from, to });
    }

    Err(ScheduleError {
        msg: "day group needs either times or hourly".to_string(),
    })
}

// Only whole hours are valid fire times.
fn parse_hour(time: &str) -> Result<u32, ScheduleError> {
    let error = || ScheduleError {
        msg: format!("invalid time {}, expected HH:00", time),
    };

    let (hour, minute) = time.trim().split_once(':').ok_or_else(error)?;

    if minute != "00" {
        return Err(error());
    }

    let hour = hour.parse::<u32>().map_err(|_| error())?;

    if hour > 23 {
        return Err(error());
    }

    Ok(hour)
}

// Without a schedule the digest falls back to a fixed cadence anchored at
// the moment the window was saved.
pub fn next_from_anchor(
    anchor: DateTime<Utc>,
    window_minutes: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let window = Duration::minutes(window_minutes.max(1));

    let mut fire = anchor;

    if now > anchor {
        let elapsed = now - anchor;
        let periods = elapsed.num_seconds() / window.num_seconds() + 1;
        fire = anchor + window * periods as i32;
    }

    if fire <= now {
        fire = fire + window;
    }

    fire
}

#[cfg(test)]
mod tests {
    use super::{next_from_anchor, DayGroup, Schedule};
    use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
    use chrono_tz::Tz;
    use serde_json::json;

    fn kyiv_schedule() -> Schedule {
        Schedule::parse(&json!({
            "timezone": "Europe/Kyiv",
            "weekdays": {"times": ["09:00", "13:00", "18:00"]},
            "weekends": {"hourly": "10:00-18:00"}
        }))
        .unwrap()
    }

    fn kyiv(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    ) -> DateTime<Utc> {
        let tz: Tz = "Europe/Kyiv".parse().unwrap();

        tz.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn monday_morning_gets_all_three_weekday_times() {
        let schedule = kyiv_schedule();

        // 2024-01-01 is a Monday.
        let now = kyiv(2024, 1, 1, 8, 30);

        let times = schedule.next_times(now, 3);

        assert_eq!(
            times,
            vec![
                kyiv(2024, 1, 1, 9, 0),
                kyiv(2024, 1, 1, 13, 0),
                kyiv(2024, 1, 1, 18, 0),
            ]
        );
    }

    #[test]
    fn weekend_uses_the_hourly_range() {
        let schedule = kyiv_schedule();

        // 2024-01-06 is a Saturday.
        let now = kyiv(2024, 1, 6, 9, 59);

        let times = schedule.next_times(now, 9);

        assert_eq!(times.len(), 9);
        assert_eq!(times[0], kyiv(2024, 1, 6, 10, 0));
        assert_eq!(times[8], kyiv(2024, 1, 6, 18, 0));
    }

    #[test]
    fn times_are_strictly_increasing_across_days() {
        let schedule = kyiv_schedule();
        let now = kyiv(2024, 1, 5, 17, 30);

        let times = schedule.next_times(now, 10);

        assert_eq!(times.len(), 10);

        for window in times.windows(2) {
            assert!(window[0] < window[1]);
        }

        // Friday 18:00 rolls over into the Saturday hourly grid.
        assert_eq!(times[0], kyiv(2024, 1, 5, 18, 0));
        assert_eq!(times[1], kyiv(2024, 1, 6, 10, 0));
    }

    #[test]
    fn fire_times_match_a_day_group_rule() {
        let schedule = kyiv_schedule();
        let tz: Tz = "Europe/Kyiv".parse().unwrap();
        let now = kyiv(2024, 1, 1, 0, 0);

        for fire in schedule.next_times(now, 30) {
            let local = fire.with_timezone(&tz);

            assert_eq!(local.minute(), 0);

            let weekend = matches!(
                local.format("%a").to_string().as_str(),
                "Sat" | "Sun"
            );

            if weekend {
                assert!((10..=18).contains(&local.hour()));
            } else {
                assert!([9, 13, 18].contains(&local.hour()));
            }
        }
    }

    #[test]
    fn rejects_non_zero_minutes() {
        let result = Schedule::parse(&json!({
            "weekdays": {"times": ["09:30"]}
        }));

        assert!(result.is_err());
    }

    #[test]
    fn rejects_inverted_hourly_ranges() {
        let result = Schedule::parse(&json!({
            "weekends": {"hourly": "18:00-10:00"}
        }));

        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_schedules() {
        assert!(Schedule::parse(&json!({})).is_err());
    }

    #[test]
    fn defaults_to_utc() {
        let schedule = Schedule::parse(&json!({
            "weekdays": {"times": ["12:00"]},
            "weekends": {"times": ["12:00"]}
        }))
        .unwrap();

        assert_eq!(schedule.timezone, Tz::UTC);
    }

    #[test]
    fn empty_day_group_produces_no_fires_for_those_days() {
        let schedule = Schedule::parse(&json!({
            "weekdays": {"times": ["09:00"]}
        }))
        .unwrap();

        assert_eq!(schedule.weekends, DayGroup::Empty);

        // Saturday morning: the next fire is Monday.
        let now = kyiv(2024, 1, 6, 0, 0);
        let times = schedule.next_times(now, 1);

        let monday = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
        assert_eq!(times, vec![monday]);
    }

    #[test]
    fn anchor_cadence_is_deterministic() {
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let now = anchor + Duration::minutes(100);
        let fire = next_from_anchor(anchor, 60, now);

        assert_eq!(fire, anchor + Duration::minutes(120));

        let before = anchor - Duration::minutes(5);
        assert_eq!(next_from_anchor(anchor, 60, before), anchor);
    }
}
