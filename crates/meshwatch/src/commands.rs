//! Subcommand handlers.

use std::io::Write as _;

use tokio_util::sync::CancellationToken;
use tracing::info;

use meshwatch_core::{CycleError, CycleReport, Monitor, MonitorConfig, StateStore};

use crate::cli::{GlobalOpts, OnceArgs, StateArgs};
use crate::error::CliError;

fn load(global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let config = meshwatch_config::load_monitor_config(global.config.as_deref())?;
    let endpoints: Vec<String> = config.endpoints.iter().map(ToString::to_string).collect();
    info!(
        mesh = %config.mesh,
        interval_secs = config.poll_interval.as_secs(),
        state = %config.state_path.display(),
        endpoints = ?endpoints,
        "configuration loaded"
    );
    Ok(config)
}

/// Run the monitor until `cancel` fires.
pub async fn run(global: &GlobalOpts, cancel: CancellationToken) -> Result<(), CliError> {
    let config = load(global)?;
    let monitor = Monitor::from_config(config).map_err(|source| CliError::Startup { source })?;
    monitor.run(cancel).await;
    Ok(())
}

/// Run one cycle. Fails if the cycle fails; undelivered notifications
/// are logged but do not fail the command, and neither does a shutdown
/// signal arriving mid-cycle.
pub async fn once(
    args: &OnceArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let mut config = load(global)?;
    config.initial_report = args.report;

    let mut monitor =
        Monitor::from_config(config).map_err(|source| CliError::Startup { source })?;
    finish_cycle(monitor.run_cycle(cancel).await)
}

fn finish_cycle(result: Result<CycleReport, CycleError>) -> Result<(), CliError> {
    let report = match result {
        Ok(report) => report,
        Err(e) if e.is_cancelled() => {
            info!(phase = %e.phase, "shutdown requested; cycle abandoned");
            return Ok(());
        }
        Err(source) => return Err(CliError::CycleFailed { source }),
    };

    info!(
        devices = report.devices,
        events = report.events.len(),
        delivered = report.delivery.delivered(),
        failed = report.delivery.failed().count(),
        "cycle complete"
    );
    Ok(())
}

/// Print the persisted state without contacting the directory.
pub fn state(args: &StateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = meshwatch_config::load(global.config.as_deref())?;
    let state = StateStore::new(settings.state_path)
        .load()
        .map_err(|source| CliError::State { source })?;

    let mut out = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &state)?;
        writeln!(out)?;
        return Ok(());
    }

    if state.is_empty() {
        writeln!(out, "no devices recorded")?;
    }
    for record in state.values() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            record.device_id,
            if record.online { "online" } else { "offline" },
            record.display_name,
            record.last_updated.to_rfc3339(),
        )?;
    }
    Ok(())
}

/// Print the effective settings as TOML.
pub fn config(global: &GlobalOpts) -> Result<(), CliError> {
    let settings = meshwatch_config::load(global.config.as_deref())?;
    print!("{}", settings.to_toml()?);
    Ok(())
}
