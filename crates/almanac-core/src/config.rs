use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  warn
};

use crate::cli::KeyVal;

const DEFAULT_COMMAND: &str = "year";
const DATA_DIR_NAME: &str = ".almanac";
const RC_FILE_NAME: &str = ".almanacrc";
const HOLIDAYS_FILE_NAME: &str =
  "holidays.toml";

/// Settings read from the almanacrc
/// file and `rc.` overrides.
#[derive(Debug, Clone)]
pub struct Config {
  /// `data.location`; `None` means
  /// `~/.almanac`.
  pub data_location: Option<PathBuf>,
  /// `default.command`, run when no
  /// command is given.
  pub default_command: String,
  /// `color`.
  pub color:           bool,
  /// `holidays.file`; `None` means
  /// `holidays.toml` in the data dir.
  pub holidays_file:   Option<PathBuf>,
  pub loaded_files:    Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location:   None,
      default_command: DEFAULT_COMMAND
        .to_string(),
      color:           true,
      holidays_file:   None,
      loaded_files:    vec![]
    }
  }
}

/// One meaningful line of an rc file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RcLine {
  Setting(String, String),
  Include(PathBuf)
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let rc = match rc_override {
      | Some(path) => {
        Some(path.to_path_buf())
      }
      | None => default_rc_path()
    };
    Self::load_from(rc.as_deref())
  }

  /// Defaults overlaid with `rc`, when
  /// given.
  pub fn load_from(
    rc: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::default();
    match rc {
      | Some(path) => {
        info!(rc = %path.display(), "loading almanacrc");
        cfg.read_rc(path)?;
      }
      | None => {
        debug!(
          "no almanacrc; using defaults"
        )
      }
    }
    Ok(cfg)
  }

  /// Applies one `key = value` pair.
  /// Unknown keys are ignored with a
  /// warning.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let key =
      key.strip_prefix("rc.").unwrap_or(key);
    let value = value.trim();
    match key {
      | "data.location" => {
        self.data_location =
          Some(expand_tilde(value));
      }
      | "default.command" => {
        if value.is_empty() {
          return Err(anyhow!(
            "default.command cannot be \
             empty"
          ));
        }
        self.default_command =
          value.to_string();
      }
      | "color" => {
        self.color = parse_switch(value)
          .ok_or_else(|| {
            anyhow!(
              "invalid color setting: \
               {value}"
            )
          })?;
      }
      | "holidays.file" => {
        self.holidays_file =
          Some(expand_tilde(value));
      }
      | other => {
        warn!(key = other, "unknown config key; ignoring");
        return Ok(());
      }
    }
    debug!(key, value, "config set");
    Ok(())
  }

  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<Item = KeyVal>
  {
    for kv in overrides {
      self
        .set(&kv.key, &kv.value)
        .with_context(|| {
          format!(
            "invalid override {}={}",
            kv.key, kv.value
          )
        })?;
    }
    Ok(())
  }

  /// The effective settings, as
  /// `key=value` pairs in key order.
  pub fn entries(
    &self
  ) -> Vec<(&'static str, String)> {
    let path_or = |path: &Option<PathBuf>,
                   fallback: &str| {
      path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| {
          fallback.to_string()
        })
    };
    vec![
      (
        "color",
        (if self.color { "on" } else { "off" })
          .to_string()
      ),
      (
        "data.location",
        path_or(
          &self.data_location,
          "~/.almanac"
        )
      ),
      (
        "default.command",
        self.default_command.clone()
      ),
      (
        "holidays.file",
        path_or(
          &self.holidays_file,
          "<data>/holidays.toml"
        )
      ),
    ]
  }

  /// The data directory, created when
  /// missing. `override_dir` is the
  /// `--data` flag.
  #[tracing::instrument(skip(self))]
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    let dir = match (
      override_dir,
      &self.data_location
    ) {
      | (Some(path), _) => {
        path.to_path_buf()
      }
      | (None, Some(path)) => path.clone(),
      | (None, None) => dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .ok_or_else(|| {
          anyhow!(
            "cannot determine home \
             directory; set \
             data.location"
          )
        })?
    };

    if !dir.exists() {
      info!(dir = %dir.display(), "creating data directory");
      fs::create_dir_all(&dir)
        .with_context(|| {
          format!(
            "failed to create {}",
            dir.display()
          )
        })?;
    }
    Ok(dir)
  }

  pub fn holidays_path(
    &self,
    data_dir: &Path
  ) -> PathBuf {
    self.holidays_file.clone().unwrap_or_else(
      || data_dir.join(HOLIDAYS_FILE_NAME)
    )
  }

  fn read_rc(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.to_path_buf());

    let base_dir = path
      .parent()
      .unwrap_or_else(|| Path::new("."));
    for line in parse_rc(&text, base_dir)
      .with_context(|| {
        format!("in {}", path.display())
      })?
    {
      match line {
        | RcLine::Setting(key, value) => {
          self
            .set(&key, &value)
            .with_context(|| {
              format!("in {}", path.display())
            })?
        }
        | RcLine::Include(include)
          if include.exists() =>
        {
          self.read_rc(&include)?
        }
        | RcLine::Include(include) => {
          warn!(include = %include.display(), "included rc file missing; skipping")
        }
      }
    }
    Ok(())
  }
}

/// `ALMANACRC`, then `~/.almanacrc`
/// when it exists.
fn default_rc_path() -> Option<PathBuf> {
  if let Some(raw) =
    std::env::var_os("ALMANACRC")
  {
    return Some(PathBuf::from(raw));
  }
  dirs::home_dir()
    .map(|home| home.join(RC_FILE_NAME))
    .filter(|path| path.exists())
}

fn parse_rc(
  text: &str,
  base_dir: &Path
) -> anyhow::Result<Vec<RcLine>> {
  let mut lines = Vec::new();
  for (idx, raw) in text.lines().enumerate()
  {
    let line = raw
      .split_once('#')
      .map_or(raw, |(before, _)| before)
      .trim();
    if line.is_empty() {
      continue;
    }

    if let Some(target) =
      line.strip_prefix("include ")
    {
      let target = expand_tilde(target.trim());
      lines.push(RcLine::Include(
        if target.is_absolute() {
          target
        } else {
          base_dir.join(target)
        }
      ));
      continue;
    }

    let (key, value) =
      line.split_once('=').ok_or_else(
        || {
          anyhow!(
            "line {}: expected key = \
             value, got: {raw}",
            idx + 1
          )
        }
      )?;
    lines.push(RcLine::Setting(
      key.trim().to_string(),
      value.trim().to_string()
    ));
  }
  Ok(lines)
}

fn expand_tilde(raw: &str) -> PathBuf {
  match (
    raw.strip_prefix("~/"),
    dirs::home_dir()
  ) {
    | (Some(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => PathBuf::from(raw)
  }
}

fn parse_switch(raw: &str) -> Option<bool> {
  match raw.to_ascii_lowercase().as_str() {
    | "on" | "yes" | "true" | "1" => {
      Some(true)
    }
    | "off" | "no" | "false" | "0" => {
      Some(false)
    }
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::path::Path;

  use tempfile::tempdir;

  use super::*;

  fn kv(
    key: &str,
    value: &str
  ) -> KeyVal {
    KeyVal {
      key:   key.to_string(),
      value: value.to_string()
    }
  }

  #[test]
  fn defaults_without_rc_file() {
    let cfg = Config::load_from(None)
      .expect("defaults");
    assert_eq!(cfg.default_command, "year");
    assert!(cfg.color);
    assert!(cfg.holidays_file.is_none());
    assert!(cfg.loaded_files.is_empty());
  }

  #[test]
  fn rc_file_includes_and_overrides() {
    let temp =
      tempdir().expect("tempdir");
    fs::write(
      temp.path().join("extra.rc"),
      "color = off\n"
    )
    .expect("write include");
    let rc =
      temp.path().join("almanacrc");
    fs::write(
      &rc,
      "# planner\n\
       default.command = ranges # \
       listing\n\
       include extra.rc\n\
       include missing.rc\n\
       weekstart = sunday\n"
    )
    .expect("write rc");

    let mut cfg =
      Config::load_from(Some(&rc))
        .expect("load rc");
    assert_eq!(cfg.default_command, "ranges");
    assert!(!cfg.color);
    assert_eq!(cfg.loaded_files.len(), 2);

    cfg
      .apply_overrides(vec![kv(
        "rc.color", "on"
      )])
      .expect("override");
    assert!(cfg.color);
  }

  #[test]
  fn bad_lines_and_values_are_errors() {
    let temp =
      tempdir().expect("tempdir");
    let rc =
      temp.path().join("almanacrc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    assert!(
      Config::load_from(Some(&rc))
        .is_err()
    );

    let mut cfg = Config::default();
    assert!(
      cfg
        .apply_overrides(vec![kv(
          "color", "purple"
        )])
        .is_err()
    );
  }

  #[test]
  fn data_and_holiday_paths() {
    let temp =
      tempdir().expect("tempdir");
    let data = temp.path().join("data");
    let mut cfg = Config::default();
    cfg
      .set(
        "data.location",
        &data.display().to_string()
      )
      .expect("set");

    let dir =
      cfg.data_dir(None).expect("data dir");
    assert_eq!(dir, data);
    assert!(dir.exists());
    assert_eq!(
      cfg.holidays_path(&dir),
      data.join("holidays.toml")
    );

    let flag = temp.path().join("flag");
    assert_eq!(
      cfg
        .data_dir(Some(&flag))
        .expect("flag dir"),
      flag
    );

    cfg
      .set(
        "holidays.file",
        "/etc/almanac/holidays.toml"
      )
      .expect("set");
    assert_eq!(
      cfg.holidays_path(&dir),
      Path::new(
        "/etc/almanac/holidays.toml"
      )
    );
  }

  #[test]
  fn entries_report_effective_values() {
    let mut cfg = Config::default();
    cfg.set("color", "no").expect("set");
    let entries = cfg.entries();
    assert_eq!(entries[0], ("color", "off".to_string()));
    assert_eq!(
      entries
        .iter()
        .map(|(key, _)| *key)
        .collect::<Vec<_>>(),
      vec![
        "color",
        "data.location",
        "default.command",
        "holidays.file"
      ]
    );
  }
}
