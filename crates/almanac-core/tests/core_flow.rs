use almanac_core::datastore::FileStore;
use almanac_core::datekey::DateKey;
use almanac_core::intent::{Applied, commit};
use almanac_core::interaction::{CalendarInteraction, Choice, Intent, Mode};
use almanac_core::model::{RangeSize, Snapshot};
use almanac_core::store::{AnchorStore, HolidayTable, RangeStore};
use almanac_core::view_model::CalendarViewModel;
use tempfile::tempdir;

fn key(raw: &str) -> DateKey {
    DateKey::parse(raw).expect("valid key")
}

#[test]
fn drag_save_and_render_through_the_file_store() {
    let temp = tempdir().expect("tempdir");
    let mut store = FileStore::open(temp.path()).expect("open store");

    let mut machine = CalendarInteraction::new();
    machine.on_pointer_down(key("2025-01-05"));
    machine.on_pointer_enter(key("2024-12-30"));
    machine.on_pointer_up();
    assert_eq!(machine.mode(), Mode::RangeEditing);
    machine.set_size(RangeSize::Large);
    let intent = machine.save("  winter break  ").expect("upsert intent");
    assert_eq!(machine.mode(), Mode::Idle);

    let committed = commit(&mut store, intent).expect("commit");
    let range = match committed.outcome.expect("accepted") {
        Applied::Range(range) => range,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(range.start_date, key("2024-12-30"));
    assert_eq!(range.end_date, key("2025-01-05"));
    assert_eq!(range.task.as_deref(), Some("winter break"));
    assert_eq!(committed.snapshot.ranges, vec![range.clone()]);

    machine.on_pointer_down(key("2025-01-15"));
    machine.on_pointer_up();
    machine.choose(Choice::Action, &committed.snapshot.marks);
    let intent = machine.save("renew passport").expect("mark intent");
    let committed = commit(&mut store, intent).expect("commit mark");
    assert!(committed.outcome.is_ok());

    let reopened = FileStore::open(temp.path()).expect("reopen");
    let snapshot = Snapshot::load(&reopened).expect("snapshot");
    assert_eq!(snapshot.ranges.len(), 1);
    assert_eq!(snapshot.marks.len(), 1);
    assert_eq!(snapshot.marks[0].date, key("2025-01-15"));

    let holidays =
        HolidayTable::from_toml_str("\"2025-01-01\" = \"New Year's Day\"\n").expect("holidays");
    let mut anchors = reopened;
    let model = CalendarViewModel::load(&mut anchors, key("2025-03-18")).expect("view");
    let months = model
        .render(&snapshot, &holidays, key("2025-03-18"))
        .expect("render");

    let december = months
        .iter()
        .find(|month| month.month.display_name == "December 2024")
        .expect("december in window");
    assert_eq!(december.segments.len(), 1);
    assert!(december.segments[0].segment.continues_after);
    assert!(!december.segments[0].segment.continues_before);

    let january = months
        .iter()
        .find(|month| month.month.display_name == "January 2025")
        .expect("january in window");
    assert_eq!(january.segments[0].segment.start_column, 3);
    assert_eq!(january.segments[0].segment.span, 5);
    assert!(january.segments[0].segment.continues_before);
    assert_eq!(january.marks.len(), 1);
}

#[test]
fn blank_text_on_existing_range_deletes_it() {
    let temp = tempdir().expect("tempdir");
    let mut store = FileStore::open(temp.path()).expect("open store");

    let mut machine = CalendarInteraction::new();
    machine.on_pointer_down(key("2024-08-01"));
    machine.on_pointer_enter(key("2024-08-04"));
    machine.on_pointer_up();
    let intent = machine.save("vacation").expect("intent");
    commit(&mut store, intent).expect("commit").outcome.expect("saved");

    let stored = store.list_ranges().expect("list");
    machine.on_existing_range_click(&stored[0]);
    let intent = machine.save("   ").expect("delete intent");
    assert_eq!(intent, Intent::DeleteRange(stored[0].id));

    let committed = commit(&mut store, intent).expect("commit");
    assert_eq!(
        committed.outcome.expect("deleted"),
        Applied::RangeDeleted(stored[0].id)
    );
    assert!(committed.snapshot.ranges.is_empty());
}

#[test]
fn navigation_survives_reopening_the_store() {
    let temp = tempdir().expect("tempdir");
    {
        let mut store = FileStore::open(temp.path()).expect("open store");
        let mut model = CalendarViewModel::load(&mut store, key("2024-06-10")).expect("load");
        assert_eq!(model.anchor(), key("2024-01-01"));
        model.next_year().expect("next year");
    }

    let store = FileStore::open(temp.path()).expect("reopen");
    assert_eq!(store.get_anchor().expect("anchor"), Some(key("2025-01-01")));
}
