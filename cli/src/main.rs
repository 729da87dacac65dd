mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;
use std::path::PathBuf;
use std::process;

use crate::commands::{
    cmd_backups, cmd_calendar, cmd_day_copy, cmd_day_delete, cmd_day_done, cmd_day_reset,
    cmd_day_set, cmd_day_show, cmd_day_target, cmd_export, cmd_history, cmd_import,
    cmd_settings_range, cmd_settings_show, cmd_settings_target,
};
use crate::config::Config;
use carbs_core::{Store, Tracker};

#[derive(Parser)]
#[command(
    name = "carbs",
    version,
    about = "A simple net carb tracker CLI",
    long_about = "Track net carbs per meal against a daily target range.\n\nMeals: breakfast, intra-workout, post-workout, lunch, snack-1, snack-2, snack-3, dinner"
)]
struct Cli {
    /// Path to the database file (default: platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// View or edit a single day
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },
    /// List every day with something logged, newest first
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a month calendar coloured by target status
    Calendar {
        /// Year (default: current year)
        #[arg(short, long)]
        year: Option<i32>,
        /// Month 1-12 (default: current month)
        #[arg(short, long)]
        month: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// View or change defaults used for new days
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Export all days and settings as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace stored days and/or settings from an exported JSON file
    Import {
        /// Path to the exported JSON file
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List copies kept of stored data that could not be read
    Backups {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DayCommands {
    /// Show a day (created from settings if not tracked yet)
    Show {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the actual or planned net carbs for a meal
    Set {
        /// Meal: breakfast, intra-workout, post-workout, lunch, snack-1, snack-2, snack-3, dinner
        meal: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Net carbs eaten, in grams
        #[arg(short, long, conflicts_with = "clear_actual")]
        actual: Option<u32>,
        /// Mark the meal as not logged
        #[arg(long)]
        clear_actual: bool,
        /// Planned minimum in grams
        #[arg(long)]
        min: Option<u32>,
        /// Planned maximum in grams
        #[arg(long)]
        max: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the target range for one day only
    Target {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Minimum daily net carbs in grams
        #[arg(long)]
        min: Option<u32>,
        /// Maximum daily net carbs in grams
        #[arg(long)]
        max: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a meal as done
    Done {
        /// Meal name
        meal: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Mark as not done instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a day with a fresh one from the current settings
    Reset {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy actual values (or planned ranges) from another day
    Copy {
        /// Source date (YYYY-MM-DD or today/yesterday/tomorrow)
        from: String,
        /// Destination date (default: today)
        #[arg(long)]
        to: Option<String>,
        /// Copy planned ranges instead of actual values
        #[arg(long)]
        planned: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored day
    Delete {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show the default target and planned ranges
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the default daily target range
    Target {
        /// Minimum daily net carbs in grams
        #[arg(long)]
        min: Option<u32>,
        /// Maximum daily net carbs in grams
        #[arg(long)]
        max: Option<u32>,
        /// Remove the default target
        #[arg(long, conflicts_with_all = ["min", "max"])]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the default planned range for a meal
    Range {
        /// Meal name
        meal: String,
        /// Planned minimum in grams
        #[arg(long)]
        min: Option<u32>,
        /// Planned maximum in grams
        #[arg(long)]
        max: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let _logger = logging::init(cli.verbose)?;
    let config = Config::load(cli.db)?;
    debug!(
        "event=cli_start module=cli status=ok db={}",
        config.db_path.display()
    );
    let store = Store::open(&config.db_path)?;
    let tracker = Tracker::new(&store);

    match cli.command {
        Commands::Day { command } => match command {
            DayCommands::Show { date, json } => cmd_day_show(&tracker, date, json),
            DayCommands::Set {
                meal,
                date,
                actual,
                clear_actual,
                min,
                max,
                json,
            } => cmd_day_set(&tracker, &meal, date, actual, clear_actual, min, max, json),
            DayCommands::Target {
                date,
                min,
                max,
                json,
            } => cmd_day_target(&tracker, date, min, max, json),
            DayCommands::Done {
                meal,
                date,
                undo,
                json,
            } => cmd_day_done(&tracker, &meal, date, undo, json),
            DayCommands::Reset { date, json } => cmd_day_reset(&tracker, date, json),
            DayCommands::Copy {
                from,
                to,
                planned,
                json,
            } => cmd_day_copy(&tracker, &from, to, planned, json),
            DayCommands::Delete { date, json } => cmd_day_delete(&tracker, &date, json),
        },
        Commands::History { json } => cmd_history(&tracker, json),
        Commands::Calendar { year, month, json } => cmd_calendar(&tracker, year, month, json),
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => cmd_settings_show(&tracker, json),
            SettingsCommands::Target {
                min,
                max,
                clear,
                json,
            } => cmd_settings_target(&tracker, min, max, clear, json),
            SettingsCommands::Range {
                meal,
                min,
                max,
                json,
            } => cmd_settings_range(&tracker, &meal, min, max, json),
        },
        Commands::Export { output, json } => cmd_export(&store, output.as_deref(), json),
        Commands::Import { file, json } => cmd_import(&store, &file, json),
        Commands::Backups { json } => cmd_backups(&store, json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from(["carbs", "-vv", "history", "--db", "/tmp/x.db"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(cli.command, Commands::History { json: false }));
    }

    #[test]
    fn test_parse_day_set() {
        let cli = Cli::parse_from([
            "carbs", "day", "set", "lunch", "--actual", "45", "--date", "2024-06-15",
        ]);
        let Commands::Day {
            command: DayCommands::Set { meal, actual, date, .. },
        } = cli.command
        else {
            panic!("expected day set");
        };
        assert_eq!(meal, "lunch");
        assert_eq!(actual, Some(45));
        assert_eq!(date.as_deref(), Some("2024-06-15"));
    }

    #[test]
    fn test_parse_backups() {
        let cli = Cli::parse_from(["carbs", "backups", "--json"]);
        assert!(matches!(cli.command, Commands::Backups { json: true }));
    }

    #[test]
    fn test_actual_conflicts_with_clear() {
        assert!(
            Cli::try_parse_from([
                "carbs",
                "day",
                "set",
                "lunch",
                "--actual",
                "5",
                "--clear-actual"
            ])
            .is_err()
        );
    }
}
