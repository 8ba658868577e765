//! Collaborator seams the calendar core talks to, plus the in-memory and
//! TOML-backed implementations. The file-backed range/mark store lives in
//! [`crate::datastore`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::{debug, info};
use uuid::Uuid;

use crate::datekey::{DateKey, normalize_pair};
use crate::model::{DayMark, MarkUpsert, RangeUpsert, ScheduleRange, Snapshot};

pub trait RangeStore {
    fn list_ranges(&self) -> anyhow::Result<Vec<ScheduleRange>>;

    /// Creates when `upsert.id` is `None`, updates otherwise.
    fn upsert_range(&mut self, upsert: RangeUpsert) -> anyhow::Result<ScheduleRange>;

    fn delete_range(&mut self, id: Uuid) -> anyhow::Result<()>;
}

pub trait MarkStore {
    fn list_marks(&self) -> anyhow::Result<Vec<DayMark>>;

    /// Keyed by date as well as id: upserting onto a date that already has
    /// a mark updates that mark.
    fn upsert_mark(&mut self, upsert: MarkUpsert) -> anyhow::Result<DayMark>;

    fn delete_mark(&mut self, id: Uuid) -> anyhow::Result<()>;
}

pub trait HolidayLookup {
    fn holidays(&self, year: i32) -> anyhow::Result<BTreeMap<DateKey, String>>;
}

pub trait AnchorStore {
    fn get_anchor(&self) -> anyhow::Result<Option<DateKey>>;

    fn set_anchor(&mut self, anchor: DateKey) -> anyhow::Result<()>;
}

impl<T: AnchorStore + ?Sized> AnchorStore for &mut T {
    fn get_anchor(&self) -> anyhow::Result<Option<DateKey>> {
        (**self).get_anchor()
    }

    fn set_anchor(&mut self, anchor: DateKey) -> anyhow::Result<()> {
        (**self).set_anchor(anchor)
    }
}

impl Snapshot {
    #[tracing::instrument(skip(store))]
    pub fn load<S>(store: &S) -> anyhow::Result<Self>
    where
        S: RangeStore + MarkStore + ?Sized,
    {
        let snapshot = Self {
            ranges: store.list_ranges().context("failed to list ranges")?,
            marks: store.list_marks().context("failed to list marks")?,
        };
        debug!(
            ranges = snapshot.ranges.len(),
            marks = snapshot.marks.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }
}

pub(crate) fn upsert_range_in(
    ranges: &mut Vec<ScheduleRange>,
    upsert: RangeUpsert,
) -> anyhow::Result<ScheduleRange> {
    let stored = match upsert.id {
        Some(id) => {
            let existing = ranges
                .iter_mut()
                .find(|range| range.id == id)
                .ok_or_else(|| anyhow!("range not found: {id}"))?;
            *existing = upsert.into_range(id);
            existing.clone()
        }
        None => {
            let created = upsert.into_range(Uuid::new_v4());
            ranges.push(created.clone());
            created
        }
    };
    ranges.sort_by_key(|range| (range.start_date, range.end_date));
    Ok(stored)
}

pub(crate) fn upsert_mark_in(
    marks: &mut Vec<DayMark>,
    upsert: MarkUpsert,
) -> anyhow::Result<DayMark> {
    let target = match upsert.id {
        Some(id) => Some(
            marks
                .iter()
                .position(|mark| mark.id == id)
                .ok_or_else(|| anyhow!("mark not found: {id}"))?,
        ),
        None => marks.iter().position(|mark| mark.date == upsert.date),
    };

    let stored = match target {
        Some(idx) => {
            let id = marks[idx].id;
            marks[idx] = DayMark {
                id,
                date: upsert.date,
                task: upsert.task,
            };
            // Moving a mark onto a taken date replaces the mark that was there.
            marks.retain(|mark| mark.id == id || mark.date != upsert.date);
            marks
                .iter()
                .find(|mark| mark.id == id)
                .cloned()
                .ok_or_else(|| anyhow!("mark vanished during upsert: {id}"))?
        }
        None => {
            let created = DayMark {
                id: Uuid::new_v4(),
                date: upsert.date,
                task: upsert.task,
            };
            marks.push(created.clone());
            created
        }
    };
    marks.sort_by_key(|mark| mark.date);
    Ok(stored)
}

pub(crate) fn remove_by_id<T>(
    items: &mut Vec<T>,
    id: Uuid,
    id_of: impl Fn(&T) -> Uuid,
    kind: &str,
) -> anyhow::Result<()> {
    let idx = items
        .iter()
        .position(|item| id_of(item) == id)
        .ok_or_else(|| anyhow!("{kind} not found: {id}"))?;
    items.remove(idx);
    Ok(())
}

/// Everything in memory. Backs the tests and any embedder that persists
/// elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    ranges: Vec<ScheduleRange>,
    marks: Vec<DayMark>,
    anchor: Option<DateKey>,
    holidays: BTreeMap<DateKey, String>,
    fail_mutations: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holiday(mut self, date: DateKey, name: &str) -> Self {
        self.holidays.insert(date, name.to_string());
        self
    }

    /// Makes every later mutation fail, as a rejected network write would.
    pub fn fail_mutations(&mut self, fail: bool) {
        self.fail_mutations = fail;
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_mutations {
            return Err(anyhow!("store rejected the mutation"));
        }
        Ok(())
    }
}

impl RangeStore for MemoryStore {
    fn list_ranges(&self) -> anyhow::Result<Vec<ScheduleRange>> {
        Ok(self.ranges.clone())
    }

    fn upsert_range(&mut self, upsert: RangeUpsert) -> anyhow::Result<ScheduleRange> {
        self.check_writable()?;
        upsert_range_in(&mut self.ranges, upsert)
    }

    fn delete_range(&mut self, id: Uuid) -> anyhow::Result<()> {
        self.check_writable()?;
        remove_by_id(&mut self.ranges, id, |range| range.id, "range")
    }
}

impl MarkStore for MemoryStore {
    fn list_marks(&self) -> anyhow::Result<Vec<DayMark>> {
        Ok(self.marks.clone())
    }

    fn upsert_mark(&mut self, upsert: MarkUpsert) -> anyhow::Result<DayMark> {
        self.check_writable()?;
        upsert_mark_in(&mut self.marks, upsert)
    }

    fn delete_mark(&mut self, id: Uuid) -> anyhow::Result<()> {
        self.check_writable()?;
        remove_by_id(&mut self.marks, id, |mark| mark.id, "mark")
    }
}

impl AnchorStore for MemoryStore {
    fn get_anchor(&self) -> anyhow::Result<Option<DateKey>> {
        Ok(self.anchor)
    }

    fn set_anchor(&mut self, anchor: DateKey) -> anyhow::Result<()> {
        self.anchor = Some(anchor);
        Ok(())
    }
}

impl HolidayLookup for MemoryStore {
    fn holidays(&self, year: i32) -> anyhow::Result<BTreeMap<DateKey, String>> {
        Ok(filter_year(&self.holidays, year))
    }
}

fn filter_year(all: &BTreeMap<DateKey, String>, year: i32) -> BTreeMap<DateKey, String> {
    all.iter()
        .filter(|(date, _)| date.year() == year)
        .map(|(date, name)| (*date, name.clone()))
        .collect()
}

/// Holidays read from a TOML table of `"YYYY-MM-DD" = "Name"` entries.
#[derive(Debug, Clone, Default)]
pub struct HolidayTable {
    entries: BTreeMap<DateKey, String>,
}

impl HolidayTable {
    #[tracing::instrument(skip(path))]
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(file = %path.display(), "no holiday file; calendar has no holidays");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let table = Self::from_toml_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(
            file = %path.display(),
            count = table.entries.len(),
            "loaded holidays"
        );
        Ok(table)
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let parsed: BTreeMap<String, String> = toml::from_str(raw)?;
        let entries = parsed
            .into_iter()
            .map(|(date, name)| Ok((DateKey::parse(&date)?, name)))
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HolidayLookup for HolidayTable {
    fn holidays(&self, year: i32) -> anyhow::Result<BTreeMap<DateKey, String>> {
        Ok(filter_year(&self.entries, year))
    }
}

/// True when `[start, end]` overlaps any stored range other than `skip`.
pub fn collides_with_existing(
    ranges: &[ScheduleRange],
    start: DateKey,
    end: DateKey,
    skip: Option<Uuid>,
) -> bool {
    let (start, end) = normalize_pair(start, end);
    ranges
        .iter()
        .filter(|range| Some(range.id) != skip)
        .any(|range| range.overlaps(start, end))
}
