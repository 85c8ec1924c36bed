use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Weekday};
use serde::Serialize;
use std::str::FromStr;

/// Slot length used when `SLOT_MINUTES` is not configured.
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// Opening hours used when `SHOP_HOURS` is not configured (Sunday closed).
pub const DEFAULT_SHOP_HOURS: &str = "mon=09:00-20:00,tue=09:00-20:00,wed=09:00-20:00,\
thu=09:00-20:00,fri=09:00-20:00,sat=09:00-16:00";

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Parse "HH:MM".
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Format as "HH:MM".
pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("slot length must be greater than zero minutes")]
    ZeroStep,
    #[error("invalid schedule entry `{0}`, expected day=HH:MM-HH:MM")]
    BadEntry(String),
    #[error("unknown weekday `{0}`")]
    BadWeekday(String),
    #[error("weekday {0} listed more than once")]
    Duplicate(Weekday),
}

/// Weekly opening hours keyed by weekday index (Monday = 0).
///
/// A weekday without hours is closed. Slots start at `open` and repeat every
/// `step_minutes` while strictly before `close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    hours: [Option<OpeningHours>; 7],
    step_minutes: u32,
}

/// One row of the weekly view served by `GET /api/schedule`.
#[derive(Debug, Serialize)]
pub struct DayHours {
    pub weekday: u32,
    pub name: String,
    pub open: Option<String>,
    pub close: Option<String>,
}

impl WeeklySchedule {
    /// A schedule with every day closed.
    pub fn closed(step_minutes: u32) -> Result<Self, ScheduleError> {
        if step_minutes == 0 {
            return Err(ScheduleError::ZeroStep);
        }
        Ok(Self {
            hours: [None; 7],
            step_minutes,
        })
    }

    /// Parse `mon=09:00-20:00,sat=09:00-16:00`. Days not listed stay closed.
    ///
    /// Hours with `open >= close` are accepted and simply produce no slots.
    pub fn parse(text: &str, step_minutes: u32) -> Result<Self, ScheduleError> {
        let mut schedule = Self::closed(step_minutes)?;
        let mut seen = [false; 7];

        for entry in text.split([',', ';']).map(str::trim).filter(|e| !e.is_empty()) {
            let (day, range) = entry
                .split_once('=')
                .ok_or_else(|| ScheduleError::BadEntry(entry.to_string()))?;
            let weekday = Weekday::from_str(day.trim())
                .map_err(|_| ScheduleError::BadWeekday(day.trim().to_string()))?;
            let (open, close) = range
                .split_once('-')
                .ok_or_else(|| ScheduleError::BadEntry(entry.to_string()))?;
            let (open, close) = match (parse_hhmm(open), parse_hhmm(close)) {
                (Some(o), Some(c)) => (o, c),
                _ => return Err(ScheduleError::BadEntry(entry.to_string())),
            };

            let idx = weekday.num_days_from_monday() as usize;
            if seen[idx] {
                return Err(ScheduleError::Duplicate(weekday));
            }
            seen[idx] = true;
            schedule.hours[idx] = Some(OpeningHours { open, close });
        }

        Ok(schedule)
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn hours_for(&self, weekday: Weekday) -> Option<OpeningHours> {
        self.hours[weekday.num_days_from_monday() as usize]
    }

    /// All slot start times for `date`, ascending. Empty when closed.
    pub fn slots_for(&self, date: NaiveDate) -> Vec<NaiveTime> {
        let Some(hours) = self.hours_for(date.weekday()) else {
            return Vec::new();
        };

        let step = TimeDelta::minutes(i64::from(self.step_minutes));
        let mut slots = Vec::new();
        let mut current = hours.open;
        while current < hours.close {
            slots.push(current);
            let (next, wrapped_secs) = current.overflowing_add_signed(step);
            if wrapped_secs != 0 {
                break;
            }
            current = next;
        }
        slots
    }

    pub fn week(&self) -> Vec<DayHours> {
        WEEK.iter()
            .map(|day| {
                let hours = self.hours_for(*day);
                DayHours {
                    weekday: day.num_days_from_monday(),
                    name: day.to_string(),
                    open: hours.map(|h| format_hhmm(h.open)),
                    close: hours.map(|h| format_hhmm(h.close)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn shop() -> WeeklySchedule {
        WeeklySchedule::parse(DEFAULT_SHOP_HOURS, DEFAULT_SLOT_MINUTES).unwrap()
    }

    fn labels(slots: &[NaiveTime]) -> Vec<String> {
        slots.iter().copied().map(format_hhmm).collect()
    }

    #[test]
    fn test_monday_has_22_half_hour_slots() {
        let slots = shop().slots_for(date("2025-01-06"));
        assert_eq!(slots.len(), 22);
        let labels = labels(&slots);
        assert_eq!(labels.first().unwrap(), "09:00");
        assert_eq!(labels[1], "09:30");
        assert_eq!(labels.last().unwrap(), "19:30");
    }

    #[test]
    fn test_saturday_closes_early() {
        let slots = shop().slots_for(date("2025-01-11"));
        assert_eq!(slots.len(), 14);
        assert_eq!(labels(&slots).last().unwrap(), "15:30");
    }

    #[test]
    fn test_sunday_closed() {
        assert!(shop().slots_for(date("2025-01-05")).is_empty());
        assert!(shop().hours_for(Weekday::Sun).is_none());
    }

    #[test]
    fn test_hourly_step() {
        let schedule = WeeklySchedule::parse(DEFAULT_SHOP_HOURS, 60).unwrap();
        let slots = labels(&schedule.slots_for(date("2025-01-06")));
        assert_eq!(slots.len(), 11);
        assert_eq!(slots[0], "09:00");
        assert_eq!(slots[10], "19:00");
    }

    #[test]
    fn test_open_after_close_yields_nothing() {
        let schedule = WeeklySchedule::parse("mon=20:00-09:00,tue=10:00-10:00", 30).unwrap();
        assert!(schedule.slots_for(date("2025-01-06")).is_empty());
        assert!(schedule.slots_for(date("2025-01-07")).is_empty());
    }

    #[test]
    fn test_step_not_dividing_range() {
        let schedule = WeeklySchedule::parse("mon=09:00-10:00", 45).unwrap();
        assert_eq!(labels(&schedule.slots_for(date("2025-01-06"))), vec!["09:00", "09:45"]);
    }

    #[test]
    fn test_enumeration_stops_at_midnight() {
        let schedule = WeeklySchedule::parse("mon=23:00-23:59", 30).unwrap();
        assert_eq!(labels(&schedule.slots_for(date("2025-01-06"))), vec!["23:00", "23:30"]);
    }

    #[test]
    fn test_slots_are_deterministic() {
        let schedule = shop();
        let d = date("2025-01-08");
        assert_eq!(schedule.slots_for(d), schedule.slots_for(d));
    }

    #[test]
    fn test_parse_accepts_long_and_mixed_case_names() {
        let schedule = WeeklySchedule::parse(" Monday = 08:00-12:00 ; SAT=10:00-14:00 ", 30).unwrap();
        let monday = schedule.hours_for(Weekday::Mon).unwrap();
        assert_eq!(format_hhmm(monday.open), "08:00");
        assert_eq!(format_hhmm(monday.close), "12:00");
        assert!(schedule.hours_for(Weekday::Sat).is_some());
        assert!(schedule.hours_for(Weekday::Tue).is_none());
    }

    #[test]
    fn test_parse_rejects_zero_step() {
        assert_eq!(WeeklySchedule::parse("mon=09:00-20:00", 0), Err(ScheduleError::ZeroStep));
    }

    #[test]
    fn test_parse_rejects_unknown_weekday() {
        assert_eq!(
            WeeklySchedule::parse("segunda=09:00-20:00", 30),
            Err(ScheduleError::BadWeekday("segunda".into()))
        );
    }

    #[test]
    fn test_parse_rejects_bad_range() {
        assert!(matches!(
            WeeklySchedule::parse("mon=9h-20h", 30),
            Err(ScheduleError::BadEntry(_))
        ));
        assert!(matches!(
            WeeklySchedule::parse("mon 09:00-20:00", 30),
            Err(ScheduleError::BadEntry(_))
        ));
    }

    #[test]
    fn test_parse_rejects_duplicate_day() {
        assert_eq!(
            WeeklySchedule::parse("mon=09:00-12:00,monday=13:00-18:00", 30),
            Err(ScheduleError::Duplicate(Weekday::Mon))
        );
    }

    #[test]
    fn test_empty_text_is_always_closed() {
        let schedule = WeeklySchedule::parse("", 30).unwrap();
        assert!(schedule.slots_for(date("2025-01-06")).is_empty());
    }

    #[test]
    fn test_week_view() {
        let week = shop().week();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].weekday, 0);
        assert_eq!(week[0].open.as_deref(), Some("09:00"));
        assert_eq!(week[5].close.as_deref(), Some("16:00"));
        assert!(week[6].open.is_none());
    }
}
