use std::time::Duration;

use anyhow::bail;
use autotss_core::config::AutotssConfig;
use autotss_core::types::UserId;
use autotss_devices::{DeviceStore, NewDevice};
use autotss_scheduler::{BatchSummary, DeviceRun, SchedulerEngine};
use clap::Parser;
use tracing::{info, warn};

mod app;
mod cli;

use app::AppState;
use cli::{Cli, Command, DevicesCommand, UsersCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "autotss_daemon=info,autotss_scheduler=info,autotss_tss=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // config: --config > AUTOTSS_CONFIG env > ~/.autotss/autotss.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("AUTOTSS_CONFIG").ok());
    let config = AutotssConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        AutotssConfig::default()
    });

    let state = AppState::build(config)?;

    match cli.command {
        Command::Run => {
            check_signing_tool(&state).await?;
            let engine = SchedulerEngine::new(
                state.batch.clone(),
                Duration::from_secs(state.config.scheduler.interval_secs),
            );
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            let mut engine_task = tokio::spawn(engine.run(shutdown_rx));

            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("interrupt received, finishing current pass");
                    let _ = shutdown_tx.send(true);
                    engine_task.await?;
                }
                finished = &mut engine_task => {
                    finished?;
                    bail!("scheduler engine stopped unexpectedly");
                }
            }
        }
        Command::SaveAll => {
            check_signing_tool(&state).await?;
            let summary = state.batch.run_batch().await?;
            println!("{}", summary.message());
        }
        Command::Save { user } => {
            check_signing_tool(&state).await?;
            let runs = state.batch.save_user(UserId(user)).await?;
            print_runs(&runs);
        }
        Command::Devices(cmd) => devices(&state, cmd).await?,
        Command::Users(cmd) => {
            let (user, enabled) = match cmd {
                UsersCommand::Enable { user } => (user, true),
                UsersCommand::Disable { user } => (user, false),
            };
            if !state.store.set_enabled(UserId(user), enabled)? {
                bail!("user {user} has no devices");
            }
            println!(
                "Scheduled saving {} for {user}.",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        Command::Stats => {
            let blobs = state.blobs.count_blobs(None)?;
            let devices = state.store.count_enabled_devices()?;
            println!("Saving blobs for {devices} device(s); {blobs} blob(s) on disk.");
        }
    }
    Ok(())
}

async fn devices(state: &AppState, cmd: DevicesCommand) -> anyhow::Result<()> {
    match cmd {
        DevicesCommand::List { user } => {
            let devices = state.registry.list_devices(UserId(user))?;
            if devices.is_empty() {
                println!("No devices for {user}.");
            }
            for d in devices {
                println!(
                    "{}  {} ({})  ECID {}  {} blob(s) saved",
                    d.name,
                    d.identifier,
                    d.board_config,
                    d.ecid,
                    d.saved_blobs.len()
                );
            }
        }
        DevicesCommand::Add(add) => {
            let input = NewDevice {
                name: add.name,
                identifier: add.identifier,
                board_config: add.board,
                ecid: add.ecid,
                generator: add.generator,
                apnonce: add.apnonce,
            };
            let d = state
                .registry
                .add_device(UserId(add.user), input, add.owner)
                .await?;
            println!("Added {} ({}, {}).", d.name, d.identifier, d.board_config);
        }
        DevicesCommand::Remove { user, name } => {
            let d = state.registry.remove_device(UserId(user), &name)?;
            println!("Removed {} and its saved blobs.", d.name);
        }
    }
    Ok(())
}

/// Fail early when the signing tool is missing; log its version otherwise.
async fn check_signing_tool(state: &AppState) -> anyhow::Result<()> {
    let binary = &state.config.tsschecker.binary;
    let path = match which::which(binary) {
        Ok(path) => path,
        Err(e) => bail!("signing tool `{binary}` not found: {e}"),
    };
    match state.tool.version().await {
        Ok(version) => info!(path = %path.display(), %version, "signing tool ready"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not read signing tool version"),
    }
    Ok(())
}

fn print_runs(runs: &[DeviceRun]) {
    let mut summary = BatchSummary::default();
    for run in runs {
        summary.record(run);
        match run {
            DeviceRun::Reconciled(o) => {
                for f in &o.saved {
                    println!("{}: saved iOS {} ({})", o.device.name, f.version, f.buildid);
                }
                for f in &o.failed {
                    println!("{}: failed iOS {} ({})", o.device.name, f.version, f.buildid);
                }
            }
            DeviceRun::Errored { device, error } => println!("{device}: skipped ({error})"),
        }
    }
    println!("{}", summary.message());
}
