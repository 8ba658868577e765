use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::datekey::DateKey;
use crate::model::{DayMark, MarkUpsert, RangeUpsert, ScheduleRange};
use crate::store::{AnchorStore, MarkStore, RangeStore, remove_by_id, upsert_mark_in, upsert_range_in};

/// Desktop persistence: one JSON object per line in `ranges.data` and
/// `marks.data`, and the window anchor as a bare key in `anchor.data`.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
    pub ranges_path: PathBuf,
    pub marks_path: PathBuf,
    pub anchor_path: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let ranges_path = data_dir.join("ranges.data");
        let marks_path = data_dir.join("marks.data");
        let anchor_path = data_dir.join("anchor.data");

        for path in [&ranges_path, &marks_path, &anchor_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            ranges = %ranges_path.display(),
            marks = %marks_path.display(),
            anchor = %anchor_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            ranges_path,
            marks_path,
            anchor_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_ranges(&self) -> anyhow::Result<Vec<ScheduleRange>> {
        load_jsonl(&self.ranges_path).context("failed to load ranges.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_marks(&self) -> anyhow::Result<Vec<DayMark>> {
        load_jsonl(&self.marks_path).context("failed to load marks.data")
    }

    #[tracing::instrument(skip(self, ranges))]
    pub fn save_ranges(&self, ranges: &[ScheduleRange]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.ranges_path, ranges).context("failed to save ranges.data")
    }

    #[tracing::instrument(skip(self, marks))]
    pub fn save_marks(&self, marks: &[DayMark]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.marks_path, marks).context("failed to save marks.data")
    }

    /// Marks keyed by date, for lookups while rendering.
    pub fn marks_by_date(&self) -> anyhow::Result<BTreeMap<DateKey, DayMark>> {
        Ok(self
            .load_marks()?
            .into_iter()
            .map(|mark| (mark.date, mark))
            .collect())
    }
}

impl RangeStore for FileStore {
    fn list_ranges(&self) -> anyhow::Result<Vec<ScheduleRange>> {
        self.load_ranges()
    }

    #[tracing::instrument(skip(self, upsert), fields(id = ?upsert.id))]
    fn upsert_range(&mut self, upsert: RangeUpsert) -> anyhow::Result<ScheduleRange> {
        let mut ranges = self.load_ranges()?;
        let stored = upsert_range_in(&mut ranges, upsert)?;
        self.save_ranges(&ranges)?;
        debug!(id = %stored.id, "saved range");
        Ok(stored)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_range(&mut self, id: Uuid) -> anyhow::Result<()> {
        let mut ranges = self.load_ranges()?;
        remove_by_id(&mut ranges, id, |range| range.id, "range")?;
        self.save_ranges(&ranges)
    }
}

impl MarkStore for FileStore {
    fn list_marks(&self) -> anyhow::Result<Vec<DayMark>> {
        self.load_marks()
    }

    #[tracing::instrument(skip(self, upsert), fields(id = ?upsert.id, date = %upsert.date))]
    fn upsert_mark(&mut self, upsert: MarkUpsert) -> anyhow::Result<DayMark> {
        let mut marks = self.load_marks()?;
        let stored = upsert_mark_in(&mut marks, upsert)?;
        self.save_marks(&marks)?;
        debug!(id = %stored.id, "saved mark");
        Ok(stored)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_mark(&mut self, id: Uuid) -> anyhow::Result<()> {
        let mut marks = self.load_marks()?;
        remove_by_id(&mut marks, id, |mark| mark.id, "mark")?;
        self.save_marks(&marks)
    }
}

impl AnchorStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get_anchor(&self) -> anyhow::Result<Option<DateKey>> {
        let raw = fs::read_to_string(&self.anchor_path)
            .with_context(|| format!("failed reading {}", self.anchor_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            DateKey::parse(trimmed)
                .map(Some)
                .with_context(|| format!("corrupt anchor in {}", self.anchor_path.display()))
        }
    }

    #[tracing::instrument(skip(self))]
    fn set_anchor(&mut self, anchor: DateKey) -> anyhow::Result<()> {
        fs::write(&self.anchor_path, anchor.to_string())
            .with_context(|| format!("failed writing {}", self.anchor_path.display()))?;
        Ok(())
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(item);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, items))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = items.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for item in items {
        let serialized = serde_json::to_string(item)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
