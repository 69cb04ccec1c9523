//! Calendar rules: time of day in a named timezone, optionally limited to
//! certain days of the week.

use crate::error::{CheckinError, Result};
use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days searched ahead before a rule is declared unsatisfiable.
const SEARCH_HORIZON_DAYS: u64 = 14;

/// Day of the week, written `mon`..`sun` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const WORKWEEK: [Weekday; 5] = [Self::Mon, Self::Tue, Self::Wed, Self::Thu, Self::Fri];

    fn label(self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
            Self::Sun => "Sun",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Self::Mon,
            chrono::Weekday::Tue => Self::Tue,
            chrono::Weekday::Wed => Self::Wed,
            chrono::Weekday::Thu => Self::Thu,
            chrono::Weekday::Fri => Self::Fri,
            chrono::Weekday::Sat => Self::Sat,
            chrono::Weekday::Sun => Self::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

/// When a job fires.
///
/// ```toml
/// hour = 8
/// minute = 0
/// timezone = "America/Los_Angeles"
/// weekdays = ["mon", "tue", "wed", "thu", "fri"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRule {
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Restrict firing to these days. `None` means every day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<Vec<Weekday>>,
}

impl CalendarRule {
    pub fn daily(hour: u32, minute: u32, timezone: impl Into<String>) -> Self {
        Self {
            hour,
            minute,
            timezone: timezone.into(),
            weekdays: None,
        }
    }

    pub fn on_weekdays(hour: u32, minute: u32, timezone: impl Into<String>, days: &[Weekday]) -> Self {
        Self {
            hour,
            minute,
            timezone: timezone.into(),
            weekdays: Some(days.to_vec()),
        }
    }

    /// Parsed timezone.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidRule`] for an unknown timezone name.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| CheckinError::InvalidRule(format!("unknown timezone `{}`: {e}", self.timezone)))
    }

    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidRule`] when the rule can never fire.
    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 {
            return Err(CheckinError::InvalidRule(format!("hour {} out of range 0-23", self.hour)));
        }
        if self.minute > 59 {
            return Err(CheckinError::InvalidRule(format!(
                "minute {} out of range 0-59",
                self.minute
            )));
        }
        if self.weekdays.as_ref().is_some_and(Vec::is_empty) {
            return Err(CheckinError::InvalidRule("weekday set is empty".to_owned()));
        }
        self.tz()?;
        Ok(())
    }

    fn allows(&self, date: NaiveDate) -> bool {
        match &self.weekdays {
            None => true,
            Some(days) => days.contains(&Weekday::from(date.weekday())),
        }
    }

    /// First instant strictly after `after` at which the rule fires.
    ///
    /// Local times repeated by a DST fall-back resolve to the earlier
    /// instant; local times skipped by a spring-forward shift one hour later.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidRule`] if the rule is invalid.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.validate()?;
        let tz = self.tz()?;
        let start = after.with_timezone(&tz).date_naive();

        for offset in 0..=SEARCH_HORIZON_DAYS {
            let Some(date) = start.checked_add_days(Days::new(offset)) else {
                break;
            };
            if !self.allows(date) {
                continue;
            }
            let Some(naive) = date.and_hms_opt(self.hour, self.minute, 0) else {
                continue;
            };
            if let Some(candidate) = resolve_local(&tz, naive).filter(|at| *at > after) {
                return Ok(candidate);
            }
        }

        Err(CheckinError::InvalidRule(format!(
            "`{self}` does not fire within {SEARCH_HORIZON_DAYS} days"
        )))
    }
}

fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => Some(at.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .map(|at| at.with_timezone(&Utc)),
    }
}

impl fmt::Display for CalendarRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.weekdays {
            None => f.write_str("daily")?,
            Some(days) if days.as_slice() == Weekday::WORKWEEK => f.write_str("Mon-Fri")?,
            Some(days) => {
                let names: Vec<&str> = days.iter().map(|d| d.label()).collect();
                f.write_str(&names.join(","))?;
            }
        }
        write!(f, " at {:02}:{:02} {}", self.hour, self.minute, self.timezone)
    }
}
