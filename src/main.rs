//! CLI entry point for the netschool tool.

use std::io::{self, BufRead};

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, Month, NaiveDate};
use clap::Parser;
use netschool_core::validation::{canonical_date, week_bounds};
use netschool_core::{Credentials, NetSchool, Protected, StudyYear};
use serde::Serialize;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{FileConfig, PASSWORD_ENV, load_config};
use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => loaded
                .config
                .verbosity
                .map_or("info", app_config::VerbositySetting::default_level),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(?args, "CLI arguments parsed");
    debug!(
        path = ?loaded.path,
        loaded_from_file = loaded.loaded_from_file,
        "configuration resolved"
    );

    let mut config = loaded.config;
    config.apply_env(|name| std::env::var(name).ok())?;
    apply_flags(&mut config, &args);
    config.validate()?;

    let client = build_client(&config, &args)?;
    let protected = Protected::new(client);

    let outcome = run(&protected, &args.command).await;
    if !protected.needs_authentication()
        && let Err(error) = protected.log_out().await
    {
        warn!(error = %error, "logout failed");
    }
    outcome
}

fn apply_flags(config: &mut FileConfig, args: &Args) {
    if let Some(host) = &args.host {
        config.host = Some(host.clone());
    }
    if let Some(login) = &args.login {
        config.login = Some(login.clone());
    }
    if let Some(secondary) = &args.secondary {
        config.secondary = Some(secondary.clone());
    }
    if let Some(timeout) = args.poll_timeout_secs {
        config.poll_timeout_secs = Some(timeout);
    }
}

fn build_client(config: &FileConfig, args: &Args) -> Result<NetSchool> {
    let Some(host) = config.host.as_deref() else {
        bail!("No portal host configured. Pass --host, set NETSCHOOL_HOST or add `host` to the config file");
    };
    let Some(login) = config.login.as_deref() else {
        bail!("No login configured. Pass --login, set NETSCHOOL_LOGIN or add `login` to the config file");
    };
    let password = read_password(args.password_stdin)?;
    let credentials = Credentials::new(login, password, config.secondary.clone().unwrap_or_default());

    info!(host, login, "connecting");
    Ok(NetSchool::with_options(host, credentials, config.client_options())?)
}

fn read_password(from_stdin: bool) -> Result<String> {
    if from_stdin {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password from stdin")?;
        let password = line.trim_end_matches(['\r', '\n']).to_string();
        if password.is_empty() {
            bail!("Empty password on stdin");
        }
        return Ok(password);
    }
    match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => bail!("No password given. Set {PASSWORD_ENV} or pass --password-stdin"),
    }
}

async fn run(client: &Protected, command: &Command) -> Result<()> {
    match command {
        Command::Login => {
            client.log_in().await?;
            let year = known_study_year(client).await?;
            print_json(&serde_json::json!({
                "host": client.client().host(),
                "secure": client.client().is_secure(),
                "study_year": {
                    "start": canonical_date(year.start),
                    "end": canonical_date(year.end),
                },
                "subjects": client.subjects().len(),
                "context": client.context(),
            }))
        }
        Command::Info => print_json(&client.user_info().await?),
        Command::Photo { out } => {
            let photo = client.user_photo().await?;
            std::fs::write(out, &photo)
                .with_context(|| format!("Failed to write photo to '{}'", out.display()))?;
            info!(path = %out.display(), bytes = photo.len(), "photo saved");
            Ok(())
        }
        Command::Diary { start, end } => {
            let start = start.unwrap_or_else(|| week_bounds(Local::now().date_naive()).0);
            let end = end.unwrap_or_else(|| week_bounds(start).1);
            print_json(&client.diary(start, end).await?)
        }
        Command::Subject { id, start, end } => {
            let (start, end) = resolve_range(client, *start, *end).await?;
            print_json(&client.subject(*id, start, end).await?)
        }
        Command::Journal { start, end } => {
            let (start, end) = resolve_range(client, *start, *end).await?;
            print_json(&client.journal(start, end).await?)
        }
        Command::Birthdays {
            month,
            without_parents,
        } => {
            let number = month.map_or_else(|| Local::now().month(), u32::from);
            let month = u8::try_from(number)
                .ok()
                .and_then(|n| Month::try_from(n).ok())
                .with_context(|| format!("Invalid month: {number}"))?;
            print_json(&client.birthdays(month, *without_parents).await?)
        }
        Command::Assignment { id } => print_json(&client.assignment(*id).await?),
        Command::Announcements => print_json(&client.announcements().await?),
        Command::AssignmentTypes => print_json(&client.assignment_types().await?),
        Command::Unread => print_json(&client.unread_message_count().await?),
        Command::Subjects => {
            known_study_year(client).await?;
            print_json(&client.subjects())
        }
    }
}

async fn known_study_year(client: &Protected) -> Result<StudyYear> {
    if let Some(year) = client.study_year() {
        return Ok(year);
    }
    client.log_in().await?;
    client
        .study_year()
        .context("The portal did not report a school year")
}

/// Fills missing bounds from the school year.
async fn resolve_range(
    client: &Protected,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate)> {
    if let (Some(start), Some(end)) = (start, end) {
        return Ok((start, end));
    }
    let year = known_study_year(client).await?;
    Ok((start.unwrap_or(year.start), end.unwrap_or(year.end)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}
