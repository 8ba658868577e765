use std::collections::BTreeMap;

use anyhow::Context;
use chrono::Months;
use tracing::{debug, info};

use crate::datekey::{DateKey, days_in_month, format_date_key};
use crate::model::{DayMark, ScheduleRange, Snapshot};
use crate::segment::{MonthCell, PlacedSegment, month_cells, stack_segments};
use crate::store::{AnchorStore, HolidayLookup};

pub const WINDOW_MONTHS: u32 = 12;

/// How far into the window "today" lands after jumping to it.
pub const TODAY_LEAD_MONTHS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthView {
    pub year: i32,
    pub month_index: u32,
    pub display_name: String,
}

impl MonthView {
    pub fn from_anchor(anchor: DateKey) -> Self {
        let first = anchor.first_of_month();
        Self {
            year: first.year(),
            month_index: first.month_index(),
            display_name: first.naive().format("%B %Y").to_string(),
        }
    }

    pub fn first_day(&self) -> Option<DateKey> {
        format_date_key(self.year, self.month_index, 1)
    }

    pub fn last_day(&self) -> Option<DateKey> {
        format_date_key(
            self.year,
            self.month_index,
            days_in_month(self.month_index, self.year),
        )
    }

    /// Inclusive interval overlap with the month.
    pub fn overlaps(&self, start: DateKey, end: DateKey) -> bool {
        match (self.first_day(), self.last_day()) {
            (Some(month_start), Some(month_end)) => start <= month_end && end >= month_start,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewWindow {
    pub months: Vec<MonthView>,
}

pub fn normalize_anchor(date: DateKey) -> DateKey {
    date.first_of_month()
}

pub fn shift_months(anchor: DateKey, delta: i32) -> DateKey {
    let first = normalize_anchor(anchor).naive();
    let months = Months::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
        first.checked_add_months(months)
    } else {
        first.checked_sub_months(months)
    };
    DateKey::from_naive(shifted.unwrap_or(first))
}

pub fn shift_years(anchor: DateKey, delta: i32) -> DateKey {
    shift_months(anchor, delta.saturating_mul(12))
}

pub fn jump_to_today(today: DateKey) -> DateKey {
    shift_months(today, -(TODAY_LEAD_MONTHS as i32))
}

pub fn view_window(anchor: DateKey) -> ViewWindow {
    let months = (0..WINDOW_MONTHS as i32)
        .map(|offset| MonthView::from_anchor(shift_months(anchor, offset)))
        .collect();
    ViewWindow { months }
}

pub fn ranges_in_month<'a>(ranges: &'a [ScheduleRange], month: &MonthView) -> Vec<&'a ScheduleRange> {
    ranges
        .iter()
        .filter(|range| month.overlaps(range.start_date, range.end_date))
        .collect()
}

pub fn marks_in_month<'a>(marks: &'a [DayMark], month: &MonthView) -> Vec<&'a DayMark> {
    marks
        .iter()
        .filter(|mark| month.overlaps(mark.date, mark.date))
        .collect()
}

/// Everything a renderer needs for one month row.
#[derive(Debug, Clone)]
pub struct MonthRender<'a> {
    pub month: MonthView,
    pub cells: Vec<MonthCell>,
    pub segments: Vec<PlacedSegment<'a>>,
    pub marks: Vec<&'a DayMark>,
}

impl MonthRender<'_> {
    pub fn lane_count(&self) -> usize {
        self.segments
            .iter()
            .map(|placed| placed.lane + 1)
            .max()
            .unwrap_or(0)
    }
}

/// The rolling window plus the seam it is persisted through.
#[derive(Debug)]
pub struct CalendarViewModel<A> {
    anchor: DateKey,
    store: A,
}

impl<A: AnchorStore> CalendarViewModel<A> {
    /// Restores the stored anchor, or centers the window on `today` when
    /// nothing has been stored yet.
    #[tracing::instrument(skip(store))]
    pub fn load(store: A, today: DateKey) -> anyhow::Result<Self> {
        let anchor = match store.get_anchor().context("failed to read anchor")? {
            Some(stored) => normalize_anchor(stored),
            None => {
                debug!("no stored anchor; jumping to today");
                jump_to_today(today)
            }
        };
        Ok(Self { anchor, store })
    }

    pub fn anchor(&self) -> DateKey {
        self.anchor
    }

    pub fn window(&self) -> ViewWindow {
        view_window(self.anchor)
    }

    pub fn next_month(&mut self) -> anyhow::Result<DateKey> {
        self.set_anchor(shift_months(self.anchor, 1))
    }

    pub fn previous_month(&mut self) -> anyhow::Result<DateKey> {
        self.set_anchor(shift_months(self.anchor, -1))
    }

    pub fn next_year(&mut self) -> anyhow::Result<DateKey> {
        self.set_anchor(shift_years(self.anchor, 1))
    }

    pub fn previous_year(&mut self) -> anyhow::Result<DateKey> {
        self.set_anchor(shift_years(self.anchor, -1))
    }

    pub fn today(&mut self, today: DateKey) -> anyhow::Result<DateKey> {
        self.set_anchor(jump_to_today(today))
    }

    fn set_anchor(&mut self, anchor: DateKey) -> anyhow::Result<DateKey> {
        let anchor = normalize_anchor(anchor);
        self.store
            .set_anchor(anchor)
            .context("failed to persist anchor")?;
        info!(%anchor, "moved calendar window");
        self.anchor = anchor;
        Ok(anchor)
    }

    /// Per-month render data for the whole window, derived from `snapshot`
    /// without modifying it.
    #[tracing::instrument(skip(self, snapshot, holidays))]
    pub fn render<'a, H>(
        &self,
        snapshot: &'a Snapshot,
        holidays: &H,
        today: DateKey,
    ) -> anyhow::Result<Vec<MonthRender<'a>>>
    where
        H: HolidayLookup + ?Sized,
    {
        let window = self.window();
        let mut holidays_by_year: BTreeMap<i32, BTreeMap<DateKey, String>> = BTreeMap::new();

        let mut out = Vec::with_capacity(window.months.len());
        for month in window.months {
            if !holidays_by_year.contains_key(&month.year) {
                let found = holidays
                    .holidays(month.year)
                    .with_context(|| format!("failed to look up holidays for {}", month.year))?;
                holidays_by_year.insert(month.year, found);
            }
            let year_holidays = holidays_by_year
                .get(&month.year)
                .cloned()
                .unwrap_or_default();

            let cells = month_cells(month.month_index, month.year, &year_holidays, today);
            let segments = stack_segments(
                ranges_in_month(&snapshot.ranges, &month),
                month.month_index,
                month.year,
            );
            let marks = marks_in_month(&snapshot.marks, &month);
            out.push(MonthRender {
                month,
                cells,
                segments,
                marks,
            });
        }

        debug!(
            anchor = %self.anchor,
            months = out.len(),
            "rendered view window"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::model::RangeSize;
    use crate::store::MemoryStore;

    fn key(raw: &str) -> DateKey {
        DateKey::parse(raw).expect("valid key")
    }

    fn range(start: &str, end: &str) -> ScheduleRange {
        ScheduleRange {
            id: Uuid::new_v4(),
            start_date: key(start),
            end_date: key(end),
            task: Some("block".to_string()),
            size: RangeSize::Medium,
        }
    }

    #[test]
    fn shift_months_rolls_the_year() {
        assert_eq!(shift_months(key("2024-12-01"), 2), key("2025-02-01"));
        assert_eq!(shift_months(key("2024-11-01"), 13), key("2025-12-01"));
        assert_eq!(shift_months(key("2024-01-01"), -1), key("2023-12-01"));
    }

    #[test]
    fn shift_months_normalizes_to_the_first() {
        assert_eq!(shift_months(key("2024-01-31"), 1), key("2024-02-01"));
    }

    #[test]
    fn shift_years_keeps_the_month() {
        assert_eq!(shift_years(key("2024-02-01"), 1), key("2025-02-01"));
        assert_eq!(shift_years(key("2024-02-01"), -3), key("2021-02-01"));
    }

    #[test]
    fn today_lands_in_the_sixth_month() {
        let anchor = jump_to_today(key("2025-03-18"));
        assert_eq!(anchor, key("2024-10-01"));
        let window = view_window(anchor);
        assert_eq!(window.months[TODAY_LEAD_MONTHS as usize].month_index, 2);
        assert_eq!(window.months[TODAY_LEAD_MONTHS as usize].year, 2025);
    }

    #[test]
    fn window_has_twelve_consecutive_months() {
        let window = view_window(key("2024-06-15"));
        assert_eq!(window.months.len(), 12);
        assert_eq!(window.months[0].display_name, "June 2024");
        assert_eq!(window.months[11].display_name, "May 2025");
        for pair in window.months.windows(2) {
            let next = shift_months(pair[0].first_day().expect("first"), 1);
            assert_eq!(pair[1].first_day(), Some(next));
        }
    }

    #[test]
    fn filtering_keeps_partially_overlapping_ranges() {
        let ranges = vec![
            range("2024-01-25", "2024-02-05"),
            range("2024-02-29", "2024-03-01"),
            range("2024-01-01", "2024-01-31"),
            range("2023-12-01", "2024-04-01"),
        ];
        let february = MonthView::from_anchor(key("2024-02-01"));
        let found = ranges_in_month(&ranges, &february);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|r| r.end_date >= key("2024-02-01")));
    }

    #[test]
    fn navigation_persists_through_the_anchor_seam() {
        let mut store = MemoryStore::new();
        {
            let mut model =
                CalendarViewModel::load(&mut store, key("2024-06-10")).expect("load");
            assert_eq!(model.anchor(), key("2024-01-01"));
            model.next_month().expect("next");
            model.next_year().expect("next year");
        }
        assert_eq!(store.get_anchor().expect("get"), Some(key("2025-02-01")));

        let mut model = CalendarViewModel::load(&mut store, key("2030-01-01")).expect("reload");
        assert_eq!(model.anchor(), key("2025-02-01"));
        model.previous_year().expect("prev year");
        model.previous_month().expect("prev");
        assert_eq!(model.anchor(), key("2024-01-01"));
        model.today(key("2024-06-10")).expect("today");
        assert_eq!(model.anchor(), key("2024-01-01"));
    }

    #[test]
    fn render_covers_every_month_without_touching_the_snapshot() {
        let mut store = MemoryStore::new().with_holiday(key("2025-01-01"), "New Year's Day");
        let model = CalendarViewModel::load(&mut store, key("2025-03-18")).expect("load");

        let snapshot = Snapshot {
            ranges: vec![
                range("2024-12-30", "2025-01-03"),
                range("2025-01-02", "2025-01-02"),
            ],
            marks: vec![DayMark {
                id: Uuid::new_v4(),
                date: key("2025-01-15"),
                task: "renew passport".to_string(),
            }],
        };
        let before = snapshot.clone();

        let holidays = MemoryStore::new().with_holiday(key("2025-01-01"), "New Year's Day");
        let months = model
            .render(&snapshot, &holidays, key("2025-03-18"))
            .expect("render");
        assert_eq!(months.len(), 12);
        assert_eq!(snapshot, before);

        let december = &months[2];
        assert_eq!(december.month.display_name, "December 2024");
        assert_eq!(december.segments.len(), 1);
        assert!(december.segments[0].segment.continues_after);

        let january = &months[3];
        assert_eq!(january.segments.len(), 2);
        assert_eq!(january.lane_count(), 2);
        assert_eq!(january.marks.len(), 1);
        assert!(january.cells.iter().any(|cell| matches!(
            cell,
            MonthCell::Day { holiday: Some(name), .. } if name == "New Year's Day"
        )));

        let march = &months[5];
        assert!(march
            .cells
            .iter()
            .any(|cell| matches!(cell, MonthCell::Day { is_today: true, .. })));
    }
}
