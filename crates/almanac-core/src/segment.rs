//! Where a date range lands on a month row.
//!
//! Every month is drawn on the same 37-column grid: up to six leading blank
//! cells (the 1st falling on a Sunday in a Monday-first week) plus up to 31
//! days. Keeping the width fixed lines the weekdays up vertically across the
//! whole year.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{Datelike, Weekday};
use uuid::Uuid;

use crate::datekey::{
    DateKey, days_in_month, format_date_key, month_bounds, normalize_pair,
    start_weekday_of_month,
};
use crate::model::ScheduleRange;

pub const GRID_COLUMNS: u32 = 37;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSegment {
    /// 1-based.
    pub start_column: u32,
    pub span: u32,
    /// The range starts in an earlier month.
    pub continues_before: bool,
    /// The range ends in a later month.
    pub continues_after: bool,
}

impl GridSegment {
    pub fn end_column(&self) -> u32 {
        self.start_column + self.span - 1
    }

    pub fn overlaps(&self, other: &GridSegment) -> bool {
        self.start_column <= other.end_column() && other.start_column <= self.end_column()
    }
}

/// The visible part of `[range_start, range_end]` in the given month, or
/// `None` when the two do not intersect.
pub fn segment_for_month(
    range_start: DateKey,
    range_end: DateKey,
    month_index: u32,
    year: i32,
) -> Option<GridSegment> {
    let (month_start, month_end) = month_bounds(month_index, year)?;
    let (start, end) = normalize_pair(range_start, range_end);
    let (start, end) = (start.naive(), end.naive());

    if end < month_start || start > month_end {
        return None;
    }

    let effective_start = start.max(month_start);
    let effective_end = end.min(month_end);

    let start_column = start_weekday_of_month(month_index, year) + effective_start.day();
    let span = effective_end.day() - effective_start.day() + 1;
    debug_assert!(start_column + span - 1 <= GRID_COLUMNS);

    Some(GridSegment {
        start_column,
        span,
        continues_before: start < month_start,
        continues_after: end > month_end,
    })
}

/// Column of `date` within its own month's row.
pub fn day_column(date: DateKey) -> u32 {
    start_weekday_of_month(date.month_index(), date.year()) + date.day()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthCell {
    Blank,
    Day {
        date: DateKey,
        column: u32,
        weekday: Weekday,
        holiday: Option<String>,
        is_today: bool,
    },
}

impl MonthCell {
    pub fn date(&self) -> Option<DateKey> {
        match self {
            Self::Blank => None,
            Self::Day { date, .. } => Some(*date),
        }
    }
}

/// All 37 cells of a month row, blanks included.
pub fn month_cells(
    month_index: u32,
    year: i32,
    holidays: &BTreeMap<DateKey, String>,
    today: DateKey,
) -> Vec<MonthCell> {
    let offset = start_weekday_of_month(month_index, year);
    let last_day = days_in_month(month_index, year);

    (1..=GRID_COLUMNS)
        .map(|column| {
            let day = column.checked_sub(offset).filter(|day| (1..=last_day).contains(day));
            match day.and_then(|day| format_date_key(year, month_index, day)) {
                Some(date) => MonthCell::Day {
                    date,
                    column,
                    weekday: date.naive().weekday(),
                    holiday: holidays.get(&date).cloned(),
                    is_today: date == today,
                },
                None => MonthCell::Blank,
            }
        })
        .collect()
}

/// A range's segment in one month plus the lane it is drawn in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedSegment<'a> {
    pub range: &'a ScheduleRange,
    pub segment: GridSegment,
    pub lane: usize,
}

impl PlacedSegment<'_> {
    pub fn range_id(&self) -> Uuid {
        self.range.id
    }
}

/// Lays out the ranges visible in a month so that no two segments sharing a
/// column end up in the same lane. Ranges are inclusive, so two ranges that
/// only touch on one edge day still get separate lanes.
pub fn stack_segments<'a, I>(ranges: I, month_index: u32, year: i32) -> Vec<PlacedSegment<'a>>
where
    I: IntoIterator<Item = &'a ScheduleRange>,
{
    let mut visible: Vec<(&'a ScheduleRange, GridSegment)> = ranges
        .into_iter()
        .filter_map(|range| {
            segment_for_month(range.start_date, range.end_date, month_index, year)
                .map(|segment| (range, segment))
        })
        .collect();

    visible.sort_by_key(|(range, segment)| {
        (
            segment.start_column,
            Reverse(segment.span),
            range.start_date,
            range.id,
        )
    });

    let mut lane_ends: Vec<u32> = Vec::new();
    visible
        .into_iter()
        .map(|(range, segment)| {
            let lane = match lane_ends
                .iter()
                .position(|end| *end < segment.start_column)
            {
                Some(lane) => {
                    lane_ends[lane] = segment.end_column();
                    lane
                }
                None => {
                    lane_ends.push(segment.end_column());
                    lane_ends.len() - 1
                }
            };
            PlacedSegment {
                range,
                segment,
                lane,
            }
        })
        .collect()
}
