use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use blobkv_repo::{BlobRepository, RepositoryConfig};
use colored::Colorize;
use serde_json::Value;
use tracing::debug;

use crate::cli::*;

/// What a command found, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// `get` found nothing under the key.
    Missing,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => ExitCode::SUCCESS,
            Outcome::Missing => ExitCode::FAILURE,
        }
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let repo = BlobRepository::connect(&config)
        .await
        .with_context(|| format!("failed to open container {:?}", config.container))?;
    debug!(
        provider = repo.store().provider(),
        container = repo.container(),
        command = ?cli.command,
        "running command"
    );
    let mut out = io::stdout();
    let outcome = execute(&repo, cli.command, cli.pretty, &mut out).await?;
    out.flush()?;
    Ok(outcome.into())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RepositoryConfig> {
    match path {
        Some(path) => RepositoryConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => RepositoryConfig::from_env().context("failed to read config from environment"),
    }
}

/// Run one command against `repo`, writing values to `out`.
///
/// Values go to `out` one JSON document per line; confirmations go to
/// stderr so output stays pipeable.
pub async fn execute<W: Write>(
    repo: &BlobRepository,
    command: Command,
    pretty: bool,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    match command {
        Command::Put(args) => cmd_put(repo, args).await,
        Command::Get(args) => cmd_get(repo, args, pretty, out).await,
        Command::Delete(args) => cmd_delete(repo, args).await,
        Command::List(args) => cmd_list(repo, args, pretty, out).await,
    }
}

async fn cmd_put(repo: &BlobRepository, args: PutArgs) -> anyhow::Result<Outcome> {
    let value: Value = serde_json::from_str(&args.value)
        .with_context(|| format!("value for {:?} is not valid JSON", args.key))?;
    repo.put(&args.key, &value).await?;
    eprintln!("{} stored {}", "✓".green().bold(), args.key.bold());
    Ok(Outcome::Done)
}

async fn cmd_get<W: Write>(
    repo: &BlobRepository,
    args: KeyArgs,
    pretty: bool,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    match repo.get::<Value>(&args.key).await? {
        Some(value) => {
            write_value(out, &value, pretty)?;
            Ok(Outcome::Done)
        }
        None => Ok(Outcome::Missing),
    }
}

async fn cmd_delete(repo: &BlobRepository, args: KeyArgs) -> anyhow::Result<Outcome> {
    repo.delete(&args.key).await?;
    eprintln!("{} deleted {}", "✓".green().bold(), args.key.bold());
    Ok(Outcome::Done)
}

async fn cmd_list<W: Write>(
    repo: &BlobRepository,
    args: ListArgs,
    pretty: bool,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    let values: Vec<Value> = repo.list(&args.prefix).await?;
    for value in &values {
        write_value(out, value, pretty)?;
    }
    eprintln!("{} value(s) under {:?}", values.len().to_string().bold(), args.prefix);
    Ok(Outcome::Done)
}

fn write_value<W: Write>(out: &mut W, value: &Value, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(out, "{text}")?;
    Ok(())
}
