use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pricewatch::config::AppConfig;
use pricewatch::extractor::{load_profiles, Extractor};
use pricewatch::fetcher::HttpFetcher;
use pricewatch::models::load_targets;
use pricewatch::monitor::{Monitor, TargetOutcome};
use pricewatch::plugins::notifiers::{DiscordNotifier, LogNotifier};
use pricewatch::plugins::{NotifierPlugin, PluginManager};
use pricewatch::renderer::ChromeRenderer;
use pricewatch::store::TargetStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "Watches product pages and alerts on price drops", long_about = None)]
struct Cli {
    /// JSON file with the products to watch
    #[arg(short, long, default_value = "targets.json")]
    targets: PathBuf,

    /// Run a single check cycle, print every result and exit
    #[arg(long)]
    test: bool,

    /// Send a sample alert to the configured webhook and exit
    #[arg(long)]
    test_webhook: bool,

    /// Base check interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Persist observed prices and cooldowns to this file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// `RUST_LOG` when set, else `pricewatch=info` (or `debug` with `--verbose`).
fn log_filter(verbose: bool, rust_log: Option<&str>) -> Result<EnvFilter> {
    match rust_log.filter(|v| !v.trim().is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).context("invalid RUST_LOG directives"),
        None => Ok(EnvFilter::try_new(if verbose { "pricewatch=debug" } else { "pricewatch=info" })?),
    }
}

fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(verbose, rust_log.as_deref())?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, "pricewatch.log"));
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn build_notifiers(config: &AppConfig) -> Result<PluginManager> {
    let manager = PluginManager::new();

    if config.notifications.discord.webhook_url.is_some() {
        let discord = DiscordNotifier::new(&config.notifications.discord, config.scraper.request_timeout())?;
        manager.register_notifier(Box::new(discord)).await;
    } else {
        warn!("DISCORD_WEBHOOK_URL not set; alerts will only be logged");
        manager.register_notifier(Box::new(LogNotifier::new())).await;
    }

    info!("Alert channels: {}", manager.list_notifier_types().await.join(", "));
    Ok(manager)
}

async fn test_webhook(config: &AppConfig) -> Result<()> {
    let discord = DiscordNotifier::new(&config.notifications.discord, config.scraper.request_timeout())?;
    info!("Sending test alert via {}", discord.name());

    if discord.test_connection().await? {
        println!("✅ Test alert delivered");
        Ok(())
    } else {
        anyhow::bail!("webhook did not accept the test alert")
    }
}

async fn run_test_cycle(monitor: &mut Monitor) {
    println!("Running a single check over {} targets...", monitor.store().targets().len());
    let report = monitor.run_cycle().await;

    for target in &report.outcomes {
        match &target.outcome {
            TargetOutcome::Checked(result) => println!("  {:<30} {}", target.name, result),
            TargetOutcome::CoolingDown { until } => {
                println!("  {:<30} cooling down until {}", target.name, until.format("%H:%M:%S UTC"))
            }
        }
    }

    for alert in &report.alerts {
        println!(
            "  ALERT {} ({}): ${:.2}, {:.1}% off",
            alert.target_name, alert.trigger, alert.new_price, alert.drop_percent
        );
    }

    println!(
        "{} of {} targets priced, {} alerts",
        report.successes(),
        report.outcomes.len(),
        report.alerts.len()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let mut config = AppConfig::from_env()?;
    let _guard = init_tracing(cli.verbose, config.logging.directory.as_deref())?;

    if let Some(interval) = cli.interval {
        config.monitor.interval_secs = interval;
    }
    if let Some(state_file) = cli.state_file {
        config.monitor.state_file = Some(state_file);
    }
    config.validate()?;

    if cli.test_webhook {
        return test_webhook(&config).await;
    }

    info!("Starting price monitor...");

    let targets = load_targets(&cli.targets)
        .with_context(|| format!("failed to load targets from {}", cli.targets.display()))?;

    let mut extractor = Extractor::new(
        load_profiles(&config.extraction)?,
        &config.extraction,
        config.scraper.render_fallback,
    )?;
    if config.scraper.render_fallback {
        extractor = extractor.with_renderer(Arc::new(ChromeRenderer::new(config.scraper.clone())));
    }

    let store = match &config.monitor.state_file {
        Some(path) => TargetStore::with_state_file(targets, path)?,
        None => TargetStore::new(targets),
    };

    let mut monitor = Monitor::new(
        config.monitor.clone(),
        store,
        Arc::new(HttpFetcher::new(&config.scraper)?),
        Arc::new(extractor),
        build_notifiers(&config).await?,
    )
    .with_target_source(&cli.targets);

    if cli.test {
        run_test_cycle(&mut monitor).await;
        return Ok(());
    }

    monitor
        .run_forever(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Shutting down...");
    Ok(())
}
