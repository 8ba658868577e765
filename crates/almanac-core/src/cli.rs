use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// One `key=value` setting from `--rc` or a positional `rc.key=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl KeyVal {
    /// `rc.key=value` or `rc.key:value`; anything else is not an override.
    pub fn from_positional(arg: &str) -> Option<Self> {
        let body = arg.strip_prefix("rc.")?;
        let (key, value) = body.split_once('=').or_else(|| body.split_once(':'))?;
        Some(Self {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "almanac",
    version,
    about = "Almanac: a rolling year calendar for multi-day plans and day marks",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    /// More logging; repeat for debug and trace.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "rc", value_name = "KEY=VALUE", action = ArgAction::Append)]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "almanacrc", value_name = "PATH")]
    pub almanacrc: Option<PathBuf>,

    #[arg(long = "data", value_name = "DIR")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

/// Default filter when `RUST_LOG` is unset. Quiet wins over verbose.
pub fn log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level(verbose, quiet))
            .map_err(|e| anyhow!("invalid log filter: {e}"))?,
    };

    // Tests call `run` repeatedly in one process; keep the first subscriber.
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
    {
        debug!(error = %err, "tracing already initialised");
    }
    Ok(())
}

/// Argv with positional `rc.` overrides pulled out, since clap would read
/// them as the command.
#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<KeyVal>,
}

pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut pre = PreprocessedArgs {
        cleaned_args: Vec::with_capacity(raw.len()),
        rc_overrides: Vec::new(),
    };
    for (idx, arg) in raw.iter().enumerate() {
        let positional = (idx > 0)
            .then(|| arg.to_str().and_then(KeyVal::from_positional))
            .flatten();
        match positional {
            Some(kv) => {
                debug!(key = %kv.key, value = %kv.value, "positional rc override");
                pre.rc_overrides.push(kv);
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }
    pre
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let Some((first, args)) = tokens.split_first() else {
            let cmd = cfg.default_command.clone();
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: vec![],
            });
        };

        let known = crate::commands::known_command_names();
        let command = match crate::commands::expand_command_abbrev(first, &known) {
            Some(full) => {
                debug!(token = %first, expanded = %full, "resolved command token");
                full.to_string()
            }
            None => {
                warn!(token = %first, "unrecognized or ambiguous command");
                first.clone()
            }
        };

        Ok(Self {
            command,
            command_args: args.to_vec(),
        })
    }
}
