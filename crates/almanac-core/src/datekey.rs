//! Calendar-day keys and the month arithmetic every other module builds on.
//!
//! A [`DateKey`] is always a local calendar day. Text of the form
//! `YYYY-MM-DD` is only ever turned into a key through [`DateKey::parse`],
//! which reads the three components as integers and never goes through a
//! timestamp, so no timezone can shift the day.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn naive(self) -> NaiveDate {
        self.0
    }

    /// Parses a zero-padded `YYYY-MM-DD` key.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let trimmed = raw.trim();
        let mut parts = trimmed.split('-');
        let (Some(year), Some(month), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(anyhow!("expected YYYY-MM-DD, got: {raw}"));
        };

        if year.len() != 4 || month.len() != 2 || day.len() != 2 {
            return Err(anyhow!("expected zero-padded YYYY-MM-DD, got: {raw}"));
        }
        if ![year, month, day]
            .iter()
            .all(|part| part.chars().all(|c| c.is_ascii_digit()))
        {
            return Err(anyhow!("date key has non-digit components: {raw}"));
        }

        let year: i32 = year
            .parse()
            .with_context(|| format!("invalid year in {raw}"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("invalid month in {raw}"))?;
        let day: u32 = day
            .parse()
            .with_context(|| format!("invalid day in {raw}"))?;

        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| anyhow!("no such calendar day: {raw}"))
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    /// Zero-based month, 0 = January.
    pub fn month_index(self) -> u32 {
        self.0.month0()
    }

    pub fn day(self) -> u32 {
        self.0.day()
    }

    pub fn first_of_month(self) -> Self {
        Self(self.0.with_day(1).unwrap_or(self.0))
    }

    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The calendar day `instant` falls on in `zone`.
pub fn local_date_key<Z: TimeZone>(instant: DateTime<Utc>, zone: &Z) -> DateKey {
    DateKey(instant.with_timezone(zone).date_naive())
}

/// Today in the project timezone.
pub fn today_key() -> DateKey {
    crate::datetime::date_key_at(Utc::now())
}

pub fn format_date_key(year: i32, month_index: u32, day: u32) -> Option<DateKey> {
    let month = month_index.checked_add(1)?;
    NaiveDate::from_ymd_opt(year, month, day).map(DateKey)
}

/// First and last day of a month, or `None` for a month index past 11.
pub fn month_bounds(month_index: u32, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month_index.checked_add(1)?, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

pub fn days_in_month(month_index: u32, year: i32) -> u32 {
    month_bounds(month_index, year)
        .map(|(_, last)| last.day())
        .unwrap_or(0)
}

/// Weekday of the 1st, 0 = Monday through 6 = Sunday.
pub fn start_weekday_of_month(month_index: u32, year: i32) -> u32 {
    month_bounds(month_index, year)
        .map(|(first, _)| first.weekday().num_days_from_monday())
        .unwrap_or(0)
}

pub fn normalize_pair(a: DateKey, b: DateKey) -> (DateKey, DateKey) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Every day from `a` to `b` inclusive, ascending, whichever order the
/// bounds are given in.
pub fn enumerate_range(a: DateKey, b: DateKey) -> Vec<DateKey> {
    let (start, end) = normalize_pair(a, b);
    start
        .0
        .iter_days()
        .take_while(|day| *day <= end.0)
        .map(DateKey)
        .collect()
}
