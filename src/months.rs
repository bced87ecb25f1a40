// src/months.rs

use chrono::{Datelike, NaiveDate};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// First month the loader ever asks for.
pub const ANCHOR: MonthId = MonthId {
    year: 2024,
    month: 1,
};

/// A calendar month, rendered as `YYYY-MM`. Keys both the remote file and
/// the local/staged file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthId {
    year: i32,
    month: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid month {input:?}: expected YYYY-MM")]
pub struct MonthParseError {
    input: String,
}

impl MonthId {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// `yellow_tripdata_<YYYY-MM>.parquet`
    pub fn file_name(&self) -> String {
        format!("yellow_tripdata_{}.parquet", self)
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthId {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MonthParseError {
            input: s.to_string(),
        };
        let (y, m) = s.trim().split_once('-').ok_or_else(err)?;
        let digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits(y, 4) || !digits(m, 2) {
            return Err(err());
        }
        let year: i32 = y.parse().map_err(|_| err())?;
        let month: u32 = m.parse().map_err(|_| err())?;
        MonthId::new(year, month).ok_or_else(err)
    }
}

/// Every month from `anchor` up to and including the month containing
/// `today`, ascending with a one-month stride. `end` caps the range when it
/// falls earlier than today's month.
pub fn plan_months(anchor: MonthId, today: NaiveDate, end: Option<MonthId>) -> Vec<MonthId> {
    let current = MonthId::containing(today);
    let last = end.map_or(current, |e| e.min(current));

    let mut months = Vec::new();
    let mut cursor = anchor;
    while cursor <= last {
        months.push(cursor);
        cursor = cursor.succ();
    }
    months
}
