use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datekey::{DateKey, normalize_pair};

/// Display thickness of a range bar. Has no bearing on date logic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RangeSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl RangeSize {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Some(Self::Small),
            "medium" | "m" => Some(Self::Medium),
            "large" | "l" => Some(Self::Large),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleRange {
    pub id: Uuid,

    pub start_date: DateKey,

    pub end_date: DateKey,

    #[serde(default)]
    pub task: Option<String>,

    #[serde(default)]
    pub size: RangeSize,
}

impl ScheduleRange {
    /// Inclusive interval overlap with `[start, end]`.
    pub fn overlaps(&self, start: DateKey, end: DateKey) -> bool {
        self.start_date <= end && self.end_date >= start
    }

    pub fn contains(&self, date: DateKey) -> bool {
        self.overlaps(date, date)
    }

    pub fn label(&self) -> &str {
        self.task.as_deref().unwrap_or_default()
    }
}

/// A single-day annotation. At most one exists per date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayMark {
    pub id: Uuid,
    pub date: DateKey,
    pub task: String,
}

/// Create (no id) or update (id) payload for the range store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUpsert {
    pub id: Option<Uuid>,
    pub start_date: DateKey,
    pub end_date: DateKey,
    pub task: Option<String>,
    pub size: RangeSize,
}

impl RangeUpsert {
    pub fn into_range(self, id: Uuid) -> ScheduleRange {
        let (start_date, end_date) = normalize_pair(self.start_date, self.end_date);
        ScheduleRange {
            id,
            start_date,
            end_date,
            task: self.task,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkUpsert {
    pub id: Option<Uuid>,
    pub date: DateKey,
    pub task: String,
}

/// Immutable view of everything stored, taken once per render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub ranges: Vec<ScheduleRange>,
    pub marks: Vec<DayMark>,
}

impl Snapshot {
    pub fn range(&self, id: Uuid) -> Option<&ScheduleRange> {
        self.ranges.iter().find(|range| range.id == id)
    }

    /// Ranges whose id starts with `prefix`, the way ids are typed on the
    /// command line.
    pub fn ranges_matching_prefix(&self, prefix: &str) -> Vec<&ScheduleRange> {
        let needle = prefix.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return vec![];
        }
        self.ranges
            .iter()
            .filter(|range| range.id.to_string().starts_with(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> DateKey {
        DateKey::parse(raw).expect("valid key")
    }

    fn range(start: &str, end: &str) -> ScheduleRange {
        ScheduleRange {
            id: Uuid::new_v4(),
            start_date: key(start),
            end_date: key(end),
            task: Some("trip".to_string()),
            size: RangeSize::default(),
        }
    }

    #[test]
    fn overlap_is_inclusive_at_both_edges() {
        let trip = range("2024-03-10", "2024-03-12");
        assert!(trip.overlaps(key("2024-03-12"), key("2024-03-20")));
        assert!(trip.overlaps(key("2024-03-01"), key("2024-03-10")));
        assert!(!trip.overlaps(key("2024-03-13"), key("2024-03-20")));
        assert!(trip.contains(key("2024-03-11")));
    }

    #[test]
    fn upsert_normalizes_reversed_bounds() {
        let upsert = RangeUpsert {
            id: None,
            start_date: key("2024-05-09"),
            end_date: key("2024-05-02"),
            task: None,
            size: RangeSize::Large,
        };
        let stored = upsert.into_range(Uuid::new_v4());
        assert_eq!(stored.start_date, key("2024-05-02"));
        assert_eq!(stored.end_date, key("2024-05-09"));
    }

    #[test]
    fn size_keys_round_trip_through_serde() {
        let json = serde_json::to_string(&RangeSize::Small).expect("serialize");
        assert_eq!(json, "\"small\"");
        assert_eq!(RangeSize::from_key("L"), Some(RangeSize::Large));
        assert_eq!(RangeSize::from_key("huge"), None);
    }

    #[test]
    fn prefix_lookup_needs_a_non_empty_prefix() {
        let trip = range("2024-03-10", "2024-03-12");
        let prefix = trip.id.to_string()[..8].to_string();
        let snapshot = Snapshot {
            ranges: vec![trip.clone()],
            marks: vec![],
        };
        assert_eq!(snapshot.ranges_matching_prefix(&prefix), vec![&trip]);
        assert!(snapshot.ranges_matching_prefix("  ").is_empty());
    }
}
