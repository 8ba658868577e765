use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::FileStore;
use crate::datekey::{DateKey, today_key};
use crate::datetime::{parse_date_input, parse_range_end};
use crate::intent::{Applied, commit};
use crate::interaction::{CalendarInteraction, Choice, Intent, Mode};
use crate::model::{RangeSize, ScheduleRange, Snapshot};
use crate::render::Renderer;
use crate::store::{HolidayTable, collides_with_existing};
use crate::view_model::CalendarViewModel;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "year",
        "next",
        "prev",
        "next-year",
        "prev-year",
        "today",
        "schedule",
        "mark",
        "edit",
        "unmark",
        "remove",
        "ranges",
        "marks",
        "show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut FileStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let today = today_key();
    let command = inv.command.as_str();

    debug!(
        command,
        args = ?inv.command_args,
        %today,
        "dispatching command"
    );

    match command {
        "year" => cmd_year(store, cfg, renderer, today),
        "next" | "prev" | "next-year" | "prev-year" | "today" => {
            cmd_navigate(store, command, today)?;
            cmd_year(store, cfg, renderer, today)
        }
        "schedule" => cmd_schedule(store, &inv.command_args, today),
        "mark" => cmd_mark(store, &inv.command_args, today),
        "edit" => cmd_edit(store, &inv.command_args),
        "unmark" => cmd_unmark(store, &inv.command_args, today),
        "remove" => cmd_remove(store, &inv.command_args),
        "ranges" => renderer.print_ranges(&Snapshot::load(&*store)?.ranges),
        "marks" => renderer.print_marks(&Snapshot::load(&*store)?.marks),
        "show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_year(
    store: &mut FileStore,
    cfg: &Config,
    renderer: &mut Renderer,
    today: DateKey,
) -> anyhow::Result<()> {
    let holidays = HolidayTable::load(&cfg.holidays_path(&store.data_dir))?;
    let snapshot = Snapshot::load(&*store)?;
    let model = CalendarViewModel::load(&mut *store, today)?;
    let months = model.render(&snapshot, &holidays, today)?;
    renderer.print_year(&months)
}

#[instrument(skip(store))]
fn cmd_navigate(store: &mut FileStore, command: &str, today: DateKey) -> anyhow::Result<()> {
    let mut model = CalendarViewModel::load(&mut *store, today)?;
    let anchor = match command {
        "next" => model.next_month()?,
        "prev" => model.previous_month()?,
        "next-year" => model.next_year()?,
        "prev-year" => model.previous_year()?,
        "today" => model.today(today)?,
        other => return Err(anyhow!("not a navigation command: {other}")),
    };
    info!(%anchor, "window moved");
    Ok(())
}

/// `schedule START [END] [size:S|M|L] TEXT...`
///
/// END is `YYYY-MM-DD` or `+N[dwm]` counted from START. Replays the gesture
/// a pointer would make: press on START, drag to END, release, then save the
/// text.
#[instrument(skip(store, args))]
fn cmd_schedule(store: &mut FileStore, args: &[String], today: DateKey) -> anyhow::Result<()> {
    let (args, size) = take_size_modifier(args)?;
    let (start_raw, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("usage: schedule START [END] TEXT"))?;
    let start = parse_date_input(start_raw, today.naive())?;

    // END is only a full key or an offset from START; any other word is
    // already part of the text.
    let (end, text_args) = match rest.split_first() {
        Some((candidate, text)) if !text.is_empty() => match parse_range_end(candidate, start)? {
            Some(end) => (Some(end), text),
            None => (None, rest),
        },
        _ => (None, rest),
    };
    let text = text_args.join(" ");

    let snapshot = Snapshot::load(&*store)?;
    let mut machine = CalendarInteraction::new();
    machine.on_pointer_down(start);
    if let Some(end) = end {
        machine.on_pointer_enter(end);
    }
    machine.on_pointer_up();
    if machine.mode() == Mode::ChoicePending {
        machine.choose(Choice::Schedule, &snapshot.marks);
    }
    machine.set_size(size);

    if let Some(draft) = machine.range_draft()
        && collides_with_existing(&snapshot.ranges, draft.start_date, draft.end_date, None)
    {
        warn!(
            start = %draft.start_date,
            end = %draft.end_date,
            "new range overlaps an existing range"
        );
    }

    finish(store, machine.save(&text))
}

/// `mark DATE TEXT...`: click a single day and pick "action".
#[instrument(skip(store, args))]
fn cmd_mark(store: &mut FileStore, args: &[String], today: DateKey) -> anyhow::Result<()> {
    let (date_raw, text) = args
        .split_first()
        .ok_or_else(|| anyhow!("usage: mark DATE TEXT"))?;
    let date = parse_date_input(date_raw, today.naive())?;

    let snapshot = Snapshot::load(&*store)?;
    let mut machine = CalendarInteraction::new();
    machine.on_pointer_down(date);
    machine.on_pointer_up();
    machine.choose(Choice::Action, &snapshot.marks);

    finish(store, machine.save(&text.join(" ")))
}

/// `edit ID [size:S|M|L] [TEXT...]`
///
/// Blank text deletes the range, unless only the size is being changed.
#[instrument(skip(store, args))]
fn cmd_edit(store: &mut FileStore, args: &[String]) -> anyhow::Result<()> {
    let size_given = has_size_modifier(args);
    let (args, size) = take_size_modifier(args)?;
    let (id_raw, text_args) = args
        .split_first()
        .ok_or_else(|| anyhow!("usage: edit ID [TEXT]"))?;

    let snapshot = Snapshot::load(&*store)?;
    let range = find_range(&snapshot, id_raw)?;

    let mut machine = CalendarInteraction::new();
    machine.on_existing_range_click(range);
    if size_given {
        machine.set_size(size);
    }

    let text = if text_args.is_empty() && size_given {
        range.task.clone().unwrap_or_default()
    } else {
        text_args.join(" ")
    };
    finish(store, machine.save(&text))
}

#[instrument(skip(store, args))]
fn cmd_remove(store: &mut FileStore, args: &[String]) -> anyhow::Result<()> {
    let id_raw = args
        .first()
        .ok_or_else(|| anyhow!("usage: remove ID"))?;

    let snapshot = Snapshot::load(&*store)?;
    let range = find_range(&snapshot, id_raw)?;

    let mut machine = CalendarInteraction::new();
    machine.on_existing_range_click(range);
    finish(store, machine.remove())
}

#[instrument(skip(store, args))]
fn cmd_unmark(store: &mut FileStore, args: &[String], today: DateKey) -> anyhow::Result<()> {
    let date_raw = args
        .first()
        .ok_or_else(|| anyhow!("usage: unmark DATE"))?;
    let date = parse_date_input(date_raw, today.naive())?;

    let mark = store
        .marks_by_date()?
        .remove(&date)
        .ok_or_else(|| anyhow!("no mark on {date}"))?;

    let mut machine = CalendarInteraction::new();
    machine.on_existing_mark_click(&mark);
    finish(store, machine.remove())
}

fn finish(store: &mut FileStore, intent: Option<Intent>) -> anyhow::Result<()> {
    let Some(intent) = intent else {
        println!("Nothing to save.");
        return Ok(());
    };

    let committed = commit(store, intent)?;
    let applied = committed.outcome?;
    debug!(
        ranges = committed.snapshot.ranges.len(),
        marks = committed.snapshot.marks.len(),
        "store updated"
    );

    match applied {
        Applied::Range(range) => println!(
            "Saved range {} {}..{} {}",
            short(&range.id),
            range.start_date,
            range.end_date,
            range.label()
        ),
        Applied::Mark(mark) => println!("Saved mark {} {} {}", short(&mark.id), mark.date, mark.task),
        Applied::RangeDeleted(id) => println!("Deleted range {}", short(&id)),
        Applied::MarkDeleted(id) => println!("Deleted mark {}", short(&id)),
    }
    Ok(())
}

fn find_range<'a>(snapshot: &'a Snapshot, raw: &str) -> anyhow::Result<&'a ScheduleRange> {
    if let Ok(id) = raw.parse::<Uuid>() {
        return snapshot
            .range(id)
            .ok_or_else(|| anyhow!("no range with id {id}"));
    }

    let matches = snapshot.ranges_matching_prefix(raw);
    match matches.as_slice() {
        [only] => Ok(*only),
        [] => Err(anyhow!("no range with id prefix {raw}")),
        _ => Err(anyhow!(
            "id prefix {raw} is ambiguous ({} ranges)",
            matches.len()
        )),
    }
}

fn has_size_modifier(args: &[String]) -> bool {
    args.iter().any(|arg| arg.starts_with("size:"))
}

/// Pulls a `size:VALUE` token out of the argument list.
fn take_size_modifier(args: &[String]) -> anyhow::Result<(Vec<String>, RangeSize)> {
    let mut size = RangeSize::default();
    let mut rest = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(raw) = arg.strip_prefix("size:") {
            size = RangeSize::from_key(raw)
                .with_context(|| format!("invalid size: {raw} (small, medium, large)"))?;
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((rest, size))
}

fn short(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (key, value) in cfg.entries() {
        println!("{key}={value}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
almanac [-v|-q] [--rc KEY=VALUE] [--almanacrc PATH] [--data DIR] <command> [args]

  year                         render the 12-month window (default)
  next | prev                  shift the window by one month
  next-year | prev-year        shift the window by one year
  today                        move the window so today is the 6th month
  schedule START [END] TEXT    schedule a range (size:small|medium|large)
  mark DATE TEXT               add or update the single-day mark on DATE
  edit ID [TEXT]               re-save a range; blank TEXT deletes it
  remove ID                    delete a range
  unmark DATE                  delete the mark on DATE
  ranges | marks               list stored ranges or marks
  show                         print the effective configuration

Dates accept YYYY-MM-DD, today, tomorrow, weekday and month names, +Nd/+Nw/+Nm."
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("sch", &known), Some("schedule"));
        assert_eq!(expand_command_abbrev("next", &known), Some("next"));
        assert_eq!(expand_command_abbrev("next-", &known), Some("next-year"));
        assert_eq!(expand_command_abbrev("m", &known), None);
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn size_modifier_is_extracted_anywhere() {
        let (rest, size) =
            take_size_modifier(&strings(&["2024-01-01", "size:large", "ski"])).expect("parse");
        assert_eq!(rest, strings(&["2024-01-01", "ski"]));
        assert_eq!(size, RangeSize::Large);
        assert!(take_size_modifier(&strings(&["size:enormous"])).is_err());
    }
}
