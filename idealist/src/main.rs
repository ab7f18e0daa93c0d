// idealist - shared list sync core
// Operator entry point: prints a user's patch feed or state as JSON

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use idealist::config::AppConfig;
use idealist::database::changelog;
use idealist::AppState;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: idealist [--data-dir DIR] <patch USER SINCE | state USER>";

enum Command {
    Patch { user: String, since: DateTime<Utc> },
    State { user: String },
}

/// `SINCE` is either RFC 3339 or (fractional) unix seconds
fn parse_since(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }
    let secs: f64 = raw
        .parse()
        .with_context(|| format!("invalid timestamp: {}", raw))?;
    Ok(changelog::from_unix_seconds(secs)?)
}

fn parse_args(args: &[String]) -> anyhow::Result<(PathBuf, Command)> {
    let mut data_dir = PathBuf::from(".");
    let mut rest = args;

    if let [flag, dir, tail @ ..] = rest {
        if flag == "--data-dir" {
            data_dir = PathBuf::from(dir);
            rest = tail;
        }
    }

    let command = match rest {
        [cmd, user, since] if cmd == "patch" => Command::Patch {
            user: user.clone(),
            since: parse_since(since)?,
        },
        [cmd, user] if cmd == "state" => Command::State { user: user.clone() },
        _ => bail!(USAGE),
    };

    Ok((data_dir, command))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (data_dir, command) = parse_args(&args)?;

    let config = AppConfig::load(&data_dir)
        .await
        .context("failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting idealist");

    let state = AppState::initialize(&data_dir).await?;

    let output = match command {
        Command::Patch { user, since } => {
            serde_json::to_string_pretty(&state.sync.patch_since(since, &user).await?)?
        }
        Command::State { user } => {
            serde_json::to_string_pretty(&state.sync.state_for(&user).await?)?
        }
    };
    println!("{}", output);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_patch_command() {
        let (dir, command) =
            parse_args(&args(&["--data-dir", "/tmp/x", "patch", "u1", "1500000000"])).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/x"));
        match command {
            Command::Patch { user, since } => {
                assert_eq!(user, "u1");
                assert_eq!(since.timestamp(), 1_500_000_000);
            }
            Command::State { .. } => panic!("expected patch"),
        }
    }

    #[test]
    fn test_parse_since_rfc3339() {
        let since = parse_since("2024-01-02T03:04:05Z").unwrap();
        assert_eq!(since.timestamp(), 1_704_164_645);
        assert!(parse_since("yesterday").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        assert!(parse_args(&args(&["delete", "u1"])).is_err());
        assert!(matches!(
            parse_args(&args(&["state", "u1"])).unwrap().1,
            Command::State { .. }
        ));
    }
}
