//! gitrollout binary.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gitrollout::app::{build_hub, run_single_cycle};
use gitrollout::metrics::{MetricsObserver, init_metrics};
use gitrollout::settings::{Settings, validate_layout};
use gitrollout::{AppState, Cli, run_server, shutdown_signal};
use gitrollout_git::{CycleScheduler, CycleTrigger};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let settings = Settings::load(cli.config.as_deref())
        .context("loading settings")?
        .with_overrides(&cli);
    settings.validate()?;
    validate_layout(&cli.mirror_path, cli.branches().as_ref(), cli.tags().as_ref())?;

    tracing::info!("Starting gitrollout v{}", gitrollout::version());
    tracing::info!("Remote: {}", cli.remote_url);
    tracing::info!("Mirror: {}", cli.mirror_path.display());

    let hub = build_hub(&cli, &settings).context("building rollout hub")?;

    match hub.ensure().await {
        Ok(()) => tracing::info!("Mirror ready"),
        Err(e) if e.is_startup_fatal() => return Err(e).context("preparing mirror"),
        Err(e) => tracing::warn!("Mirror not ready yet, retrying on the next cycle: {}", e),
    }

    if cli.once {
        return Ok(run_single_cycle(&hub).await);
    }

    let hub = Arc::new(hub);
    let trigger = CycleTrigger::new();
    let mut scheduler =
        CycleScheduler::new(Arc::clone(&hub), settings.scheduler_config()).with_trigger(trigger.clone());

    let server_state = match settings.listen {
        Some(addr) => {
            let handle = init_metrics().context("installing metrics recorder")?;
            scheduler = scheduler.with_observer(Arc::new(MetricsObserver::new()));
            Some((addr, AppState::new(hub.state(), trigger).with_metrics(handle)))
        },
        None => None,
    };

    let scheduler = scheduler.start();

    match server_state {
        Some((addr, state)) => run_server(addr, state).await.context("serving HTTP")?,
        None => shutdown_signal().await,
    }

    scheduler.shutdown().await;
    tracing::info!("gitrollout stopped");
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(level: Option<&str>) {
    let filter = level
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
