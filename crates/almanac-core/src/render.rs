use std::io::{self, IsTerminal, Write};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::datekey::enumerate_range;
use crate::model::{DayMark, RangeSize, ScheduleRange};
use crate::segment::{GRID_COLUMNS, GridSegment, MonthCell, day_column};
use crate::view_model::MonthRender;

const CELL_WIDTH: usize = 3;
const LABEL_WIDTH: usize = 16;
const WEEKDAY_LABELS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    #[tracing::instrument(skip(self, months))]
    pub fn print_year(&mut self, months: &[MonthRender<'_>]) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        let out = io::stdout().lock();
        write_year(out, months, color)
    }

    #[tracing::instrument(skip(self, ranges))]
    pub fn print_ranges(&mut self, ranges: &[ScheduleRange]) -> anyhow::Result<()> {
        let out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Days".to_string(),
            "Size".to_string(),
            "Task".to_string(),
        ];

        let rows = ranges
            .iter()
            .map(|range| {
                vec![
                    self.paint(&short_id(&range.id.to_string()), "33"),
                    range.start_date.to_string(),
                    range.end_date.to_string(),
                    enumerate_range(range.start_date, range.end_date)
                        .len()
                        .to_string(),
                    range.size.as_key().to_string(),
                    range.label().to_string(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, marks))]
    pub fn print_marks(&mut self, marks: &[DayMark]) -> anyhow::Result<()> {
        let out = io::stdout().lock();

        let headers = vec!["ID".to_string(), "Date".to_string(), "Task".to_string()];
        let rows = marks
            .iter()
            .map(|mark| {
                vec![
                    self.paint(&short_id(&mark.id.to_string()), "33"),
                    mark.date.to_string(),
                    mark.task.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        paint_if(self.color && io::stdout().is_terminal(), text, code)
    }
}

fn paint_if(enabled: bool, text: &str, code: &str) -> String {
    if !enabled {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Writes the window as one block per month: the day row, one row per lane
/// of range bars, then a row of mark pins with their notes.
pub fn write_year<W: Write>(
    mut writer: W,
    months: &[MonthRender<'_>],
    color: bool,
) -> anyhow::Result<()> {
    write!(writer, "{:width$}", "", width = LABEL_WIDTH)?;
    for column in 0..GRID_COLUMNS as usize {
        write!(writer, "{:>2} ", WEEKDAY_LABELS[column % 7])?;
    }
    writeln!(writer)?;

    for month in months {
        write!(writer, "{:width$}", month.month.display_name, width = LABEL_WIDTH)?;
        for cell in &month.cells {
            match cell {
                MonthCell::Blank => write!(writer, "{:width$}", "", width = CELL_WIDTH)?,
                MonthCell::Day {
                    date,
                    holiday,
                    is_today,
                    ..
                } => {
                    let label = format!("{:>2}", date.day());
                    let painted = if *is_today {
                        paint_if(color, &label, "7")
                    } else if holiday.is_some() {
                        paint_if(color, &label, "31")
                    } else {
                        label
                    };
                    write!(writer, "{painted} ")?;
                }
            }
        }
        writeln!(writer)?;

        for lane in 0..month.lane_count() {
            let mut bars: Vec<(&GridSegment, &ScheduleRange)> = month
                .segments
                .iter()
                .filter(|placed| placed.lane == lane)
                .map(|placed| (&placed.segment, placed.range))
                .collect();
            bars.sort_by_key(|(segment, _)| segment.start_column);

            let mut line = " ".repeat(LABEL_WIDTH);
            let mut cursor = 0usize;
            for (segment, range) in bars {
                let offset = (segment.start_column as usize - 1) * CELL_WIDTH;
                line.push_str(&" ".repeat(offset.saturating_sub(cursor)));
                let bar = bar_text(segment, range.label(), range.size);
                cursor = offset + UnicodeWidthStr::width(bar.as_str());
                line.push_str(&bar);
            }
            writeln!(writer, "{}", line.trim_end())?;
        }

        if !month.marks.is_empty() {
            let mut pins = " ".repeat(LABEL_WIDTH);
            let mut cursor = 0usize;
            let mut columns: Vec<usize> = month
                .marks
                .iter()
                .map(|mark| day_column(mark.date) as usize)
                .collect();
            columns.sort_unstable();
            columns.dedup();
            for column in columns {
                let offset = (column - 1) * CELL_WIDTH + 1;
                pins.push_str(&" ".repeat(offset.saturating_sub(cursor)));
                pins.push('*');
                cursor = offset + 1;
            }
            writeln!(writer, "{}", pins.trim_end())?;

            for mark in &month.marks {
                writeln!(
                    writer,
                    "{:width$}* {} {}",
                    "",
                    mark.date,
                    mark.task,
                    width = LABEL_WIDTH
                )?;
            }
        }
    }

    Ok(())
}

/// A bar exactly as wide as the segment's cells, minus the trailing gap.
fn bar_text(segment: &GridSegment, label: &str, size: RangeSize) -> String {
    let width = segment.span as usize * CELL_WIDTH - 1;
    let fill = match size {
        RangeSize::Small => '-',
        RangeSize::Medium => '=',
        RangeSize::Large => '#',
    };
    let open = if segment.continues_before { '<' } else { '[' };
    let close = if segment.continues_after { '>' } else { ']' };

    if width < 2 {
        return open.to_string();
    }

    let inner_width = width - 2;
    let text = fit_width(label, inner_width);
    let text_width = UnicodeWidthStr::width(text.as_str());

    let mut bar = String::with_capacity(width + 8);
    bar.push(open);
    bar.push_str(&text);
    for _ in text_width..inner_width {
        bar.push(fill);
    }
    bar.push(close);
    bar
}

fn fit_width(text: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
