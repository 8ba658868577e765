//! Pointer gestures on the year grid and the edit dialogs they open.
//!
//! ```text
//! Idle -> Dragging -> ChoicePending -> RangeEditing | ActionEditing -> Idle
//!                  \-> RangeEditing -> Idle
//! ```
//!
//! The machine never touches a store. Leaving an edit dialog yields an
//! [`Intent`] for the caller to apply, and the machine is already back in
//! `Idle` by then whatever the store makes of it.

use tracing::debug;
use uuid::Uuid;

use crate::datekey::{DateKey, normalize_pair};
use crate::model::{DayMark, MarkUpsert, RangeSize, RangeUpsert, ScheduleRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSelection {
    pub anchor_date: DateKey,
    pub current_date: DateKey,
}

impl DragSelection {
    /// `(start, end)` with `start <= end`.
    pub fn normalized(&self) -> (DateKey, DateKey) {
        normalize_pair(self.anchor_date, self.current_date)
    }

    pub fn contains(&self, date: DateKey) -> bool {
        let (start, end) = self.normalized();
        start <= date && date <= end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeDraft {
    /// `None` until the range has been stored.
    pub id: Option<Uuid>,
    pub start_date: DateKey,
    pub end_date: DateKey,
    pub task: String,
    pub size: RangeSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDraft {
    pub id: Option<Uuid>,
    pub date: DateKey,
    pub task: String,
}

/// What a single clicked day should become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Schedule,
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging(DragSelection),
    ChoicePending {
        date: DateKey,
    },
    RangeEditing(RangeDraft),
    ActionEditing(ActionDraft),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Dragging,
    ChoicePending,
    RangeEditing,
    ActionEditing,
}

/// A mutation for the range or mark store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    UpsertRange(RangeUpsert),
    DeleteRange(Uuid),
    UpsertMark(MarkUpsert),
    DeleteMark(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct CalendarInteraction {
    state: InteractionState,
}

impl CalendarInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        match self.state {
            InteractionState::Idle => Mode::Idle,
            InteractionState::Dragging(_) => Mode::Dragging,
            InteractionState::ChoicePending { .. } => Mode::ChoicePending,
            InteractionState::RangeEditing(_) => Mode::RangeEditing,
            InteractionState::ActionEditing(_) => Mode::ActionEditing,
        }
    }

    /// The live selection while a gesture is in progress.
    pub fn drag_selection(&self) -> Option<DragSelection> {
        match self.state {
            InteractionState::Dragging(selection) => Some(selection),
            _ => None,
        }
    }

    pub fn range_draft(&self) -> Option<&RangeDraft> {
        match &self.state {
            InteractionState::RangeEditing(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn action_draft(&self) -> Option<&ActionDraft> {
        match &self.state {
            InteractionState::ActionEditing(draft) => Some(draft),
            _ => None,
        }
    }

    pub fn on_pointer_down(&mut self, date: DateKey) {
        if self.state != InteractionState::Idle {
            debug!(mode = ?self.mode(), %date, "pointer down ignored outside idle");
            return;
        }
        debug!(%date, "drag started");
        self.state = InteractionState::Dragging(DragSelection {
            anchor_date: date,
            current_date: date,
        });
    }

    pub fn on_pointer_enter(&mut self, date: DateKey) {
        if let InteractionState::Dragging(selection) = &mut self.state
            && selection.current_date != date
        {
            selection.current_date = date;
            debug!(anchor = %selection.anchor_date, current = %date, "drag extended");
        }
    }

    /// Window-level release; the pointer may be outside every cell.
    pub fn on_pointer_up(&mut self) {
        let InteractionState::Dragging(selection) = self.state else {
            return;
        };

        self.state = if selection.anchor_date == selection.current_date {
            debug!(date = %selection.anchor_date, "single day clicked; awaiting choice");
            InteractionState::ChoicePending {
                date: selection.anchor_date,
            }
        } else {
            let (start_date, end_date) = selection.normalized();
            debug!(%start_date, %end_date, "drag completed; editing new range");
            InteractionState::RangeEditing(RangeDraft {
                id: None,
                start_date,
                end_date,
                task: String::new(),
                size: RangeSize::default(),
            })
        };
    }

    /// Resolves a pending single-day click. `marks` is the current snapshot,
    /// used to pre-fill the action form when the day already has a mark.
    pub fn choose(&mut self, choice: Choice, marks: &[DayMark]) {
        let InteractionState::ChoicePending { date } = self.state else {
            debug!(mode = ?self.mode(), ?choice, "choice ignored without a pending click");
            return;
        };

        self.state = match choice {
            Choice::Schedule => InteractionState::RangeEditing(RangeDraft {
                id: None,
                start_date: date,
                end_date: date,
                task: String::new(),
                size: RangeSize::default(),
            }),
            Choice::Action => {
                let existing = marks.iter().find(|mark| mark.date == date);
                debug!(%date, existing = existing.is_some(), "editing action");
                InteractionState::ActionEditing(ActionDraft {
                    id: existing.map(|mark| mark.id),
                    date,
                    task: existing.map(|mark| mark.task.clone()).unwrap_or_default(),
                })
            }
        };
    }

    pub fn choose_schedule(&mut self) {
        self.choose(Choice::Schedule, &[]);
    }

    pub fn choose_action(&mut self, marks: &[DayMark]) {
        self.choose(Choice::Action, marks);
    }

    /// Opens an existing range for editing, skipping the gesture entirely.
    pub fn on_existing_range_click(&mut self, range: &ScheduleRange) {
        if self.state != InteractionState::Idle {
            debug!(mode = ?self.mode(), id = %range.id, "range click ignored outside idle");
            return;
        }
        debug!(id = %range.id, "editing existing range");
        self.state = InteractionState::RangeEditing(RangeDraft {
            id: Some(range.id),
            start_date: range.start_date,
            end_date: range.end_date,
            task: range.task.clone().unwrap_or_default(),
            size: range.size,
        });
    }

    pub fn on_existing_mark_click(&mut self, mark: &DayMark) {
        if self.state != InteractionState::Idle {
            debug!(mode = ?self.mode(), id = %mark.id, "mark click ignored outside idle");
            return;
        }
        debug!(id = %mark.id, "editing existing mark");
        self.state = InteractionState::ActionEditing(ActionDraft {
            id: Some(mark.id),
            date: mark.date,
            task: mark.task.clone(),
        });
    }

    pub fn set_size(&mut self, size: RangeSize) {
        if let InteractionState::RangeEditing(draft) = &mut self.state {
            draft.size = size;
        }
    }

    /// Closes the open dialog with `text`.
    ///
    /// Blank text on a stored entity deletes it; blank text on a draft is a
    /// cancel. Outside an edit dialog nothing happens.
    pub fn save(&mut self, text: &str) -> Option<Intent> {
        let task = text.trim();
        match std::mem::take(&mut self.state) {
            InteractionState::RangeEditing(draft) => {
                if task.is_empty() {
                    debug!(id = ?draft.id, "blank range text");
                    return draft.id.map(Intent::DeleteRange);
                }
                Some(Intent::UpsertRange(RangeUpsert {
                    id: draft.id,
                    start_date: draft.start_date,
                    end_date: draft.end_date,
                    task: Some(task.to_string()),
                    size: draft.size,
                }))
            }
            InteractionState::ActionEditing(draft) => {
                if task.is_empty() {
                    debug!(id = ?draft.id, "blank action text");
                    return draft.id.map(Intent::DeleteMark);
                }
                Some(Intent::UpsertMark(MarkUpsert {
                    id: draft.id,
                    date: draft.date,
                    task: task.to_string(),
                }))
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Explicit delete from an edit dialog. A draft has nothing to delete.
    pub fn remove(&mut self) -> Option<Intent> {
        match std::mem::take(&mut self.state) {
            InteractionState::RangeEditing(draft) => draft.id.map(Intent::DeleteRange),
            InteractionState::ActionEditing(draft) => draft.id.map(Intent::DeleteMark),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Abandons whatever is in progress.
    pub fn cancel(&mut self) {
        debug!(mode = ?self.mode(), "interaction cancelled");
        self.state = InteractionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> DateKey {
        DateKey::parse(raw).expect("valid key")
    }

    fn stored_range() -> ScheduleRange {
        ScheduleRange {
            id: Uuid::new_v4(),
            start_date: key("2024-03-04"),
            end_date: key("2024-03-08"),
            task: Some("conference".to_string()),
            size: RangeSize::Small,
        }
    }

    #[test]
    fn click_without_drag_asks_for_a_choice() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-10"));
        machine.on_pointer_up();
        assert_eq!(machine.mode(), Mode::ChoicePending);
        assert_eq!(machine.range_draft(), None);
    }

    #[test]
    fn dragging_back_to_the_start_is_still_a_click() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-10"));
        machine.on_pointer_enter(key("2024-03-11"));
        machine.on_pointer_enter(key("2024-03-10"));
        machine.on_pointer_up();
        assert_eq!(machine.mode(), Mode::ChoicePending);
    }

    #[test]
    fn backwards_drag_opens_a_normalized_range() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-20"));
        machine.on_pointer_enter(key("2024-03-12"));

        let selection = machine.drag_selection().expect("dragging");
        assert_eq!(selection.normalized(), (key("2024-03-12"), key("2024-03-20")));
        assert!(selection.contains(key("2024-03-15")));

        machine.on_pointer_up();
        let draft = machine.range_draft().expect("editing");
        assert_eq!(draft.id, None);
        assert_eq!(draft.start_date, key("2024-03-12"));
        assert_eq!(draft.end_date, key("2024-03-20"));
        assert_eq!(machine.drag_selection(), None);
    }

    #[test]
    fn no_intent_while_dragging() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-20"));
        machine.on_pointer_enter(key("2024-03-22"));
        assert_eq!(machine.save("text"), None);
        assert_eq!(machine.remove(), None);
        assert_eq!(machine.mode(), Mode::Dragging);
    }

    #[test]
    fn pointer_enter_outside_drag_is_ignored() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_enter(key("2024-03-22"));
        machine.on_pointer_up();
        assert_eq!(machine.mode(), Mode::Idle);
    }

    #[test]
    fn schedule_choice_makes_a_one_day_range() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-10"));
        machine.on_pointer_up();
        machine.choose_schedule();

        let intent = machine.save("  write report ");
        assert_eq!(
            intent,
            Some(Intent::UpsertRange(RangeUpsert {
                id: None,
                start_date: key("2024-03-10"),
                end_date: key("2024-03-10"),
                task: Some("write report".to_string()),
                size: RangeSize::Medium,
            }))
        );
        assert_eq!(machine.mode(), Mode::Idle);
    }

    #[test]
    fn action_choice_prefills_the_mark_on_that_date() {
        let existing = DayMark {
            id: Uuid::new_v4(),
            date: key("2024-03-10"),
            task: "gym".to_string(),
        };
        let other = DayMark {
            id: Uuid::new_v4(),
            date: key("2024-03-11"),
            task: "swim".to_string(),
        };

        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-10"));
        machine.on_pointer_up();
        machine.choose_action(&[other, existing.clone()]);

        let draft = machine.action_draft().expect("editing action");
        assert_eq!(draft.id, Some(existing.id));
        assert_eq!(draft.task, "gym");

        assert_eq!(
            machine.save("gym, legs"),
            Some(Intent::UpsertMark(MarkUpsert {
                id: Some(existing.id),
                date: key("2024-03-10"),
                task: "gym, legs".to_string(),
            }))
        );
    }

    #[test]
    fn existing_range_click_skips_the_gesture() {
        let range = stored_range();
        let mut machine = CalendarInteraction::new();
        machine.on_existing_range_click(&range);

        let draft = machine.range_draft().expect("editing");
        assert_eq!(draft.id, Some(range.id));
        assert_eq!(draft.task, "conference");
        assert_eq!(draft.size, RangeSize::Small);
    }

    #[test]
    fn blank_text_on_existing_range_deletes_it() {
        let range = stored_range();
        let mut machine = CalendarInteraction::new();
        machine.on_existing_range_click(&range);
        assert_eq!(machine.save("   "), Some(Intent::DeleteRange(range.id)));
        assert_eq!(machine.mode(), Mode::Idle);
    }

    #[test]
    fn blank_text_on_new_range_is_a_cancel() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-01"));
        machine.on_pointer_enter(key("2024-03-03"));
        machine.on_pointer_up();
        assert_eq!(machine.save(""), None);
        assert_eq!(machine.mode(), Mode::Idle);
    }

    #[test]
    fn blank_text_on_existing_mark_deletes_it() {
        let mark = DayMark {
            id: Uuid::new_v4(),
            date: key("2024-03-10"),
            task: "gym".to_string(),
        };
        let mut machine = CalendarInteraction::new();
        machine.on_existing_mark_click(&mark);
        assert_eq!(machine.save("\t"), Some(Intent::DeleteMark(mark.id)));
    }

    #[test]
    fn remove_and_cancel_clear_selection() {
        let range = stored_range();
        let mut machine = CalendarInteraction::new();
        machine.on_existing_range_click(&range);
        assert_eq!(machine.remove(), Some(Intent::DeleteRange(range.id)));
        assert_eq!(*machine.state(), InteractionState::Idle);

        machine.on_pointer_down(key("2024-03-01"));
        machine.on_pointer_up();
        machine.choose_schedule();
        assert_eq!(machine.remove(), None);
        assert_eq!(*machine.state(), InteractionState::Idle);

        machine.on_pointer_down(key("2024-03-01"));
        machine.on_pointer_up();
        machine.cancel();
        assert_eq!(*machine.state(), InteractionState::Idle);

        // The next gesture starts clean.
        machine.on_pointer_down(key("2024-04-01"));
        machine.on_pointer_enter(key("2024-04-02"));
        machine.on_pointer_up();
        let draft = machine.range_draft().expect("editing");
        assert_eq!(draft.id, None);
        assert_eq!(draft.start_date, key("2024-04-01"));
    }

    #[test]
    fn size_change_flows_into_the_intent() {
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-01"));
        machine.on_pointer_enter(key("2024-03-02"));
        machine.on_pointer_up();
        machine.set_size(RangeSize::Large);
        match machine.save("move house") {
            Some(Intent::UpsertRange(upsert)) => assert_eq!(upsert.size, RangeSize::Large),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn clicks_on_existing_entities_are_ignored_mid_gesture() {
        let range = stored_range();
        let mut machine = CalendarInteraction::new();
        machine.on_pointer_down(key("2024-03-01"));
        machine.on_existing_range_click(&range);
        assert_eq!(machine.mode(), Mode::Dragging);
    }
}
