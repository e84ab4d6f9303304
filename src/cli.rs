//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use netschool_core::validation::parse_date;

/// Query a NetSchool school portal from the command line.
///
/// Connection settings come from the config file, `NETSCHOOL_*` environment
/// variables and flags, in increasing priority. Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "netschool")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/netschool/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Portal host, e.g. sgo.example.org
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Account login
    #[arg(long, global = true)]
    pub login: Option<String>,

    /// School-selection form payload (cid=..&sid=..&pid=..&cn=..&sft=..&scid=..)
    #[arg(long, global = true)]
    pub secondary: Option<String>,

    /// Read the password from the first line of stdin instead of NETSCHOOL_PASSWORD
    #[arg(long, global = true)]
    pub password_stdin: bool,

    /// Total wait budget for report jobs in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub poll_timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Portal operations.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in and print the session summary
    Login,
    /// Profile of the logged-in user
    Info,
    /// Save the profile photo
    Photo {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Diary for a date range (default: the current week)
    Diary {
        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = parse_cli_date)]
        start: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = parse_cli_date)]
        end: Option<NaiveDate>,
    },
    /// Grade report for one subject (default range: the whole school year)
    Subject {
        /// Subject id, see `netschool subjects`
        #[arg(long)]
        id: i64,
        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = parse_cli_date)]
        start: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = parse_cli_date)]
        end: Option<NaiveDate>,
    },
    /// Totals journal (default range: the whole school year)
    Journal {
        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = parse_cli_date)]
        start: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = parse_cli_date)]
        end: Option<NaiveDate>,
    },
    /// Birthdays of a month (default: the current month)
    Birthdays {
        /// Month number (1-12)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        month: Option<u8>,
        /// Leave parents out
        #[arg(long)]
        without_parents: bool,
    },
    /// Full details of one assignment
    Assignment {
        /// Assignment id
        #[arg(long)]
        id: i64,
    },
    /// Current school announcements
    Announcements,
    /// Assignment types used by the school
    AssignmentTypes,
    /// Number of unread mail messages
    Unread,
    /// Subject catalog of the account
    Subjects,
}

fn parse_cli_date(input: &str) -> Result<NaiveDate, String> {
    parse_date(input).map_err(|e| e.to_string())
}
