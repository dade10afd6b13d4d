use crate::commands::{counters, counts, db, settings};
use crate::error::{Error, Result};
use crate::models::count::{Count, CountState};
use crate::models::counter::Counter;
use crate::schedule::{next_boundary, resolve_timezone, Frequency};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "tally")]
#[command(about = "Named counters that reset on calendar-aligned boundaries")]
#[command(version)]
pub struct Cli {
    /// Directory holding settings.json and the database
    #[arg(long, env = "TALLY_DATA_DIR", default_value = ".tally", global = true)]
    pub data_dir: PathBuf,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the store is reachable
    Health,

    /// List all counters
    List,

    /// Create a counter
    Create {
        name: String,

        /// Reset interval such as 1h, 2d or 1w
        #[arg(short, long)]
        frequency: Option<String>,

        /// IANA timezone the boundaries are aligned in
        #[arg(short, long)]
        timezone: Option<String>,
    },

    /// Show a counter
    Show {
        /// Counter id or name
        counter: String,
    },

    /// Change a counter's reset interval from the next rollover on
    SetFrequency { counter: String, frequency: String },

    /// Show the current count, rolling over if it has expired
    Count { counter: String },

    /// Increase the current count
    Incr {
        counter: String,
        /// Amount to add (at least 1)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
        by: i64,
    },

    /// Decrease the current count (never below zero)
    Decr {
        counter: String,
        /// Amount to subtract (at least 1)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
        by: i64,
    },

    /// List every count of a counter, newest first
    History { counter: String },

    /// Preview the next boundary for a frequency
    NextBoundary {
        frequency: String,

        #[arg(short, long)]
        timezone: Option<String>,

        /// Reference instant (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective settings file
    Show,

    /// Change counter defaults
    Set {
        #[arg(long)]
        default_frequency: Option<String>,

        #[arg(long)]
        default_timezone: Option<String>,
    },
}

/// A count as printed, with its open/expired state resolved at print time.
#[derive(Debug, Serialize)]
struct CountReport {
    #[serde(flatten)]
    count: Count,
    state: CountState,
}

impl CountReport {
    fn new(count: Count, now: DateTime<Utc>) -> Self {
        let state = count.state(now);
        Self { count, state }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Run one command and return its pretty-printed JSON output.
pub fn execute(cli: &Cli) -> Result<String> {
    let effective = settings::load_effective_settings(&cli.data_dir)?;
    let open_store = || db::open_database(&effective.database_path);

    match &cli.command {
        Command::Health => render(&db::health_check(&open_store()?)?),
        Command::List => render(&counters::list_counters(&open_store()?)?),
        Command::Create {
            name,
            frequency,
            timezone,
        } => {
            let frequency = frequency.as_deref().unwrap_or(&effective.default_frequency);
            let timezone = timezone.as_deref().unwrap_or(&effective.default_timezone);
            let conn = open_store()?;
            render(&counters::create_counter(&conn, name, Some(frequency), Some(timezone))?)
        }
        Command::Show { counter } => render(&resolve_counter(&open_store()?, counter)?),
        Command::SetFrequency { counter, frequency } => {
            let conn = open_store()?;
            let id = resolve_counter(&conn, counter)?.id;
            render(&counters::update_frequency(&conn, id, frequency)?)
        }
        Command::Count { counter } => {
            let conn = open_store()?;
            let id = resolve_counter(&conn, counter)?.id;
            render_count(counts::get_or_create_current(&conn, id)?)
        }
        Command::Incr { counter, by } => {
            let conn = open_store()?;
            let id = resolve_counter(&conn, counter)?.id;
            render_count(counts::increment(&conn, id, *by)?)
        }
        Command::Decr { counter, by } => {
            let conn = open_store()?;
            let id = resolve_counter(&conn, counter)?.id;
            render_count(counts::decrement(&conn, id, *by)?)
        }
        Command::History { counter } => {
            let conn = open_store()?;
            let id = resolve_counter(&conn, counter)?.id;
            let now = Utc::now();
            let reports: Vec<CountReport> = counts::history(&conn, id)?
                .into_iter()
                .map(|count| CountReport::new(count, now))
                .collect();
            render(&reports)
        }
        Command::NextBoundary {
            frequency,
            timezone,
            at,
        } => {
            let timezone = timezone.as_deref().unwrap_or(&effective.default_timezone);
            let now = at.unwrap_or_else(Utc::now);
            let boundary = next_boundary(frequency, now, timezone)?;
            render(&json!({
                "frequency": frequency,
                "timezone": timezone,
                "now": now,
                "boundary": boundary,
            }))
        }
        Command::Config { action } => match action {
            ConfigCommand::Show => render(&settings::load_settings_from_disk(&cli.data_dir)?),
            ConfigCommand::Set {
                default_frequency,
                default_timezone,
            } => {
                let mut patch = Map::new();
                if let Some(frequency) = default_frequency {
                    Frequency::parse(frequency)?;
                    patch.insert("defaultFrequency".to_string(), json!(frequency));
                }
                if let Some(timezone) = default_timezone {
                    resolve_timezone(timezone)?;
                    patch.insert("defaultTimezone".to_string(), json!(timezone));
                }
                render(&settings::save_settings(&cli.data_dir, Value::Object(patch))?)
            }
        },
    }
}

/// Numeric keys are ids; anything else is looked up by exact name.
fn resolve_counter(conn: &Connection, key: &str) -> Result<Counter> {
    match key.parse::<i64>() {
        Ok(id) => counters::get_counter(conn, id),
        Err(_) => counters::find_counter_by_name(conn, key)?
            .ok_or_else(|| Error::UnknownCounterName(key.to_string())),
    }
}

fn render_count(count: Count) -> Result<String> {
    render(&CountReport::new(count, Utc::now()))
}

fn render<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
