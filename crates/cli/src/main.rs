mod cli;
mod config;
mod terminal;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use kat_command::CommandRunner;
use kat_core::{load_dotenv, EngineSettings};
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::load_rule_set;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let settings = EngineSettings::from_env();
    settings.log_summary();

    let terminal = Terminal::new(args.output);

    let rules = load_rule_set(args.config.as_deref())
        .context("failed to load configuration")?
        .resolve()
        .context("invalid configuration")?;

    if args.list_profiles {
        terminal.print_profiles(
            rules
                .profiles
                .iter()
                .map(|(name, profile)| (name.as_str(), profile.command_line())),
        )?;
        return Ok(ExitCode::SUCCESS);
    }

    let runner = match &args.profile {
        Some(name) => {
            let profile = rules
                .profile(name)
                .cloned()
                .with_context(|| format!("unknown profile '{}'", name))?;
            CommandRunner::with_profile(&args.path, name, profile, settings).await
        }
        None => CommandRunner::with_rules(&args.path, &rules.rules, settings).await,
    }
    .with_context(|| format!("cannot render {}", args.path.display()))?;
    info!(path = %args.path.display(), profile = %runner.profile_name(), "runner ready");

    if !args.watch {
        let output = runner.run().await;
        terminal.display_output(&output)?;
        return Ok(if output.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let (tx, mut rx) = mpsc::channel(64);
    runner.subscribe(tx);
    runner.watch().context("failed to watch for changes")?;

    let initial = runner.clone();
    tokio::spawn(async move {
        initial.run().await;
    });

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    terminal.show_event(&event);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                terminal.print_info("Goodbye.")?;
                break;
            }
        }
    }

    runner.close();
    Ok(ExitCode::SUCCESS)
}
