use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  Local,
  Months,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::datekey::{
  DateKey,
  local_date_key
};

const TIMEZONE_CONFIG_FILE: &str =
  "almanac-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "ALMANAC_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "ALMANAC_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// The configured project timezone, or
/// `None` when the system local zone
/// should be used.
pub fn project_timezone()
-> Option<&'static Tz> {
  static PROJECT_TZ: OnceLock<
    Option<Tz>
  > = OnceLock::new();
  PROJECT_TZ
    .get_or_init(
      resolve_project_timezone
    )
    .as_ref()
}

/// The calendar day `instant` falls on
/// in the project timezone.
pub fn date_key_at(
  instant: DateTime<Utc>
) -> DateKey {
  match project_timezone() {
    | Some(tz) => {
      local_date_key(instant, tz)
    }
    | None => {
      local_date_key(instant, &Local)
    }
  }
}

#[must_use]
pub fn today() -> NaiveDate {
  date_key_at(Utc::now()).naive()
}

fn resolve_project_timezone()
-> Option<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return Some(tz);
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Some(tz);
  }

  tracing::debug!(
    "no project timezone configured; \
     using system local zone"
  );
  None
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Resolves a day typed on the command
/// line relative to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_input(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<DateKey> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => {
      return Ok(DateKey::from_naive(
        today
      ));
    }
    | "tomorrow" => {
      return today
        .succ_opt()
        .map(DateKey::from_naive)
        .ok_or_else(|| {
          anyhow!(
            "no day after {today}"
          )
        });
    }
    | "yesterday" => {
      return today
        .pred_opt()
        .map(DateKey::from_naive)
        .ok_or_else(|| {
          anyhow!(
            "no day before {today}"
          )
        });
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(DateKey::from_naive(
      next_weekday_date(
        today,
        target_weekday
      )
    ));
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    let mut year = today.year();
    if target_month <= today.month() {
      year = year.saturating_add(1);
    }
    return NaiveDate::from_ymd_opt(
      year,
      target_month,
      1
    )
    .map(DateKey::from_naive)
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year \
         candidate"
      )
    });
  }

  if let Some(shifted) =
    relative_offset(&lower, today)?
  {
    return Ok(shifted);
  }

  DateKey::parse(token).with_context(
    || {
      "supported formats: \
       today/tomorrow/yesterday, \
       weekday names (e.g. monday), \
       month names (e.g. march), \
       +Nd/+Nw/+Nm, YYYY-MM-DD"
    }
  )
}

/// The end of a range typed after
/// `start`: a full `YYYY-MM-DD` key, or
/// `+N[dwm]` counted from `start`.
/// Anything else is not an end date, so
/// task text such as "may" or "sat" is
/// left alone.
pub fn parse_range_end(
  input: &str,
  start: DateKey
) -> anyhow::Result<Option<DateKey>> {
  let token = input.trim();
  if let Ok(key) = DateKey::parse(token) {
    return Ok(Some(key));
  }
  if token.starts_with('-') {
    return Ok(None);
  }
  relative_offset(
    &token.to_ascii_lowercase(),
    start.naive()
  )
}

/// `+Nd`, `-Nw`, `+Nm` from `from`;
/// `None` when `token` is not an offset.
fn relative_offset(
  token: &str,
  from: NaiveDate
) -> anyhow::Result<Option<DateKey>> {
  let re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile failure: \
       {e}"
    )
  })?;

  let Some(caps) = re.captures(token)
  else {
    return Ok(None);
  };
  let forward = &caps["sign"] == "+";
  let num: u32 = caps["num"]
    .parse()
    .with_context(|| {
      format!(
        "offset too large: {token}"
      )
    })?;

  let shifted = match &caps["unit"] {
    | "d" => shift_days(from, num, forward),
    | "w" => shift_days(
      from,
      num.saturating_mul(7),
      forward
    ),
    | _ if forward => {
      from.checked_add_months(
        Months::new(num)
      )
    }
    | _ => from.checked_sub_months(
      Months::new(num)
    )
  };

  shifted
    .map(|date| {
      Some(DateKey::from_naive(date))
    })
    .ok_or_else(|| {
      anyhow!(
        "offset out of range: {token}"
      )
    })
}

fn shift_days(
  from: NaiveDate,
  days: u32,
  forward: bool
) -> Option<NaiveDate> {
  let days = Days::new(u64::from(days));
  if forward {
    from.checked_add_days(days)
  } else {
    from.checked_sub_days(days)
  }
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday();
  let target_idx =
    target.num_days_from_monday();
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_days(Days::new(
      u64::from(delta)
    ))
    .unwrap_or(from)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}
