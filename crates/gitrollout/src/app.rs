//! Wiring of settings and command line into a hub.

use std::process::ExitCode;
use std::time::Duration;

use gitrollout_core::{CommandTemplate, RefCategory, Result, TargetConfig};
use gitrollout_git::{CycleReport, MirrorConfig, MirrorHub};
use tracing::{error, info, warn};

use crate::cli::{Cli, TargetArgs};
use crate::settings::Settings;

/// Builds the hub described by `cli` and `settings`.
pub fn build_hub(cli: &Cli, settings: &Settings) -> Result<MirrorHub> {
    let mirror = MirrorConfig::builder()
        .remote_url(&cli.remote_url)
        .mirror_path(&cli.mirror_path)
        .clone_timeout(Duration::from_secs(settings.clone_timeout_secs))
        .fetch_timeout(Duration::from_secs(settings.fetch_timeout_secs))
        .checkout_timeout(Duration::from_secs(settings.checkout_timeout_secs))
        .git_binary(&settings.git_binary)
        .build()?;

    let mut builder = MirrorHub::builder(mirror)
        .max_concurrency(settings.max_concurrency)
        .command_timeout(Duration::from_secs(settings.command_timeout_secs))
        .cycle_timeout(Duration::from_secs(settings.cycle_timeout_secs));

    if let Some(args) = cli.branches() {
        builder = builder.branches(target(&args)?);
    }
    if let Some(args) = cli.tags() {
        builder = builder.tags(target(&args)?);
    }
    if cli.branches_path.is_none() && cli.tags_path.is_none() {
        warn!("Neither branches nor tags are tracked; cycles will only fetch the mirror");
    }
    if let Some(path) = &settings.state_file {
        builder = builder.state_file(path);
    }

    builder.build()
}

fn target(args: &TargetArgs) -> Result<TargetConfig> {
    let mut target = TargetConfig::new(&args.root);
    if let Some(command) = &args.command {
        target = target.with_command(CommandTemplate::parse(command)?);
    }
    for pattern in &args.filters {
        target = target.with_filter(pattern)?;
    }
    Ok(target)
}

/// Runs a single cycle and maps its result to a process exit code.
///
/// Exit codes: 0 when every category settled, 1 when the cycle aborted,
/// 2 when some checkout failed and a category was held back.
pub async fn run_single_cycle(hub: &MirrorHub) -> ExitCode {
    match hub.run_cycle().await {
        Ok(report) => {
            log_report(&report);
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        },
        Err(e) => {
            error!("Cycle failed: {}", e);
            ExitCode::FAILURE
        },
    }
}

fn log_report(report: &CycleReport) {
    for category in RefCategory::ALL {
        if let Some(c) = report.category(category) {
            info!(
                category = category.as_str(),
                events = c.outcomes.len(),
                advanced = c.advanced,
                "Category processed"
            );
        }
    }
    if report.command_failures() > 0 {
        warn!("{} event command(s) failed", report.command_failures());
    }
}

