use crate::error::CrmError;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

/// Source of wall-clock time for expiry bookkeeping and date cut-offs.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_secs(&self) -> i64 {
        self.now().timestamp()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn at_secs(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    pub fn at_date(date: NaiveDate) -> Self {
        Self(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default()))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Date part of a CRM date or datetime value (`2026-01-15`,
/// `2026-01-15T10:30:00+05:30`).
pub fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// `date` plus `days`; a result past the calendar range is an invalid
/// argument rather than a panic.
pub fn days_after(date: NaiveDate, days: u32) -> Result<NaiveDate, CrmError> {
    date.checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| out_of_range(date, days))
}

pub fn days_before(date: NaiveDate, days: u32) -> Result<NaiveDate, CrmError> {
    date.checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| out_of_range(date, days))
}

fn out_of_range(date: NaiveDate, days: u32) -> CrmError {
    CrmError::InvalidArgument(format!(
        "{days} days from {date} is outside the supported date range"
    ))
}
