//! Operator command-line surface over the booking engine.
//!
//! # Responsibility
//! - Resolve configuration, logging and the database connection.
//! - Map each subcommand onto one `BookingService` call.

mod commands;

use anyhow::{Context, Result};
use appointmate_core::db::{open_db_with_timeout, DEFAULT_STORE_TIMEOUT};
use appointmate_core::{default_log_level, init_logging, CalendarPolicy, EngineConfig};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "appointmate")]
#[command(about = "Inspect availability and manage appointments", version)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file; overrides `database_path` from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List free slots on a date
    Slots {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
    },
    /// Show active appointments on a date
    Schedule {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
    },
    /// Book an appointment
    Book {
        client_name: String,

        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,

        #[arg(long)]
        email: Option<String>,

        /// Reject starts earlier than this instant (YYYY-MM-DDTHH:MM)
        #[arg(long, value_parser = parse_instant)]
        not_before: Option<NaiveDateTime>,
    },
    /// Move an appointment to a new start
    Reschedule {
        id: Uuid,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// New start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,

        /// Reject starts earlier than this instant (YYYY-MM-DDTHH:MM)
        #[arg(long, value_parser = parse_instant)]
        not_before: Option<NaiveDateTime>,
    },
    /// Cancel an appointment
    Cancel { id: Uuid },
    /// Show one appointment, including cancelled ones
    Show { id: Uuid },
    /// List a client's active appointments
    Client {
        name: String,

        /// Only the appointment starting at this instant (YYYY-MM-DDTHH:MM)
        #[arg(long, value_parser = parse_instant)]
        at: Option<NaiveDateTime>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::resolve(cli.config, cli.db)?;

    if let Some(log_dir) = settings.log_dir.as_deref() {
        let level = settings
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().to_string());
        init_logging(&level, log_dir).context("failed to start logging")?;
    }

    let mut conn = open_db_with_timeout(&settings.database_path, settings.store_timeout)
        .with_context(|| {
            format!(
                "failed to open database `{}`",
                settings.database_path.display()
            )
        })?;
    let mut service = commands::service(&mut conn, settings.policy)?;

    match cli.command {
        Commands::Slots { date } => commands::slots(&service, date),
        Commands::Schedule { date } => commands::schedule(&service, date),
        Commands::Book {
            client_name,
            date,
            start,
            email,
            not_before,
        } => commands::book(&mut service, client_name, email, date, start, not_before),
        Commands::Reschedule {
            id,
            date,
            start,
            not_before,
        } => commands::reschedule(&mut service, id, date, start, not_before),
        Commands::Cancel { id } => commands::cancel(&mut service, id),
        Commands::Show { id } => commands::show(&service, id),
        Commands::Client { name, at } => commands::client(&service, &name, at),
    }
}

/// Runtime settings after merging config file and flags.
struct Settings {
    database_path: PathBuf,
    store_timeout: std::time::Duration,
    log_level: Option<String>,
    log_dir: Option<String>,
    policy: CalendarPolicy,
}

impl Settings {
    fn resolve(config: Option<PathBuf>, db: Option<PathBuf>) -> Result<Self> {
        let Some(path) = config else {
            let database_path = db.context("pass --db or a --config with `database_path`")?;
            return Ok(Self {
                database_path,
                store_timeout: DEFAULT_STORE_TIMEOUT,
                log_level: None,
                log_dir: None,
                policy: CalendarPolicy::business_week(),
            });
        };

        let config = EngineConfig::load(&path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?;
        let database_path = db
            .or(config.database_path)
            .context("config has no `database_path`; pass --db")?;
        Ok(Self {
            database_path,
            store_timeout: config.store_timeout,
            log_level: config.log_level,
            log_dir: config.log_dir,
            policy: config.policy,
        })
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| format!("invalid time `{value}`, expected HH:MM"))
}

fn parse_instant(value: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .map_err(|_| format!("invalid instant `{value}`, expected YYYY-MM-DDTHH:MM"))
}
