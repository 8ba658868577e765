use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use crate::interaction::Intent;
use crate::model::{DayMark, ScheduleRange, Snapshot};
use crate::store::{MarkStore, RangeStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Range(ScheduleRange),
    Mark(DayMark),
    RangeDeleted(Uuid),
    MarkDeleted(Uuid),
}

#[tracing::instrument(skip(store))]
pub fn apply_intent<S>(store: &mut S, intent: Intent) -> anyhow::Result<Applied>
where
    S: RangeStore + MarkStore + ?Sized,
{
    let applied = match intent {
        Intent::UpsertRange(upsert) => store
            .upsert_range(upsert)
            .map(Applied::Range)
            .context("failed to save range")?,
        Intent::DeleteRange(id) => {
            store
                .delete_range(id)
                .with_context(|| format!("failed to delete range {id}"))?;
            Applied::RangeDeleted(id)
        }
        Intent::UpsertMark(upsert) => store
            .upsert_mark(upsert)
            .map(Applied::Mark)
            .context("failed to save mark")?,
        Intent::DeleteMark(id) => {
            store
                .delete_mark(id)
                .with_context(|| format!("failed to delete mark {id}"))?;
            Applied::MarkDeleted(id)
        }
    };
    info!(?applied, "applied intent");
    Ok(applied)
}

/// Result of applying an intent, with the snapshot to render next.
#[derive(Debug)]
pub struct Commit {
    pub outcome: anyhow::Result<Applied>,
    pub snapshot: Snapshot,
}

/// Applies `intent` and reloads the authoritative snapshot whether or not
/// the store accepted it. Only a failed reload is an error here.
pub fn commit<S>(store: &mut S, intent: Intent) -> anyhow::Result<Commit>
where
    S: RangeStore + MarkStore + ?Sized,
{
    let outcome = apply_intent(store, intent);
    if let Err(err) = &outcome {
        warn!(error = %format!("{err:#}"), "store rejected intent; reloading snapshot");
    }
    let snapshot = Snapshot::load(store).context("failed to reload snapshot")?;
    Ok(Commit { outcome, snapshot })
}
