use super::*;
use pricewatch::config::{DiscordConfig, ScraperConfig};
use pricewatch::fetcher::HttpFetcher;
use pricewatch::models::{ExtractionResult, Severity, TriggerKind};
use pricewatch::monitor::TargetOutcome;
use pricewatch::plugins::notifiers::{DiscordNotifier, LogNotifier};
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn discord_notifiers(webhook_url: String) -> anyhow::Result<PluginManager> {
    let config = DiscordConfig {
        webhook_url: Some(webhook_url),
        ..DiscordConfig::default()
    };
    let manager = PluginManager::new();
    manager
        .register_notifier(Box::new(DiscordNotifier::new(&config, Duration::from_secs(5))?))
        .await;
    Ok(manager)
}

#[tokio::test]
async fn test_full_cycle_over_http() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gpu"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><h1>RTX</h1><span class=\"price\">$450.00</span></body></html>",
        ))
        .expect(1)
        .mount(&shop)
        .await;
    Mock::given(method("GET"))
        .and(path("/monitor"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&shop)
        .await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&shop)
        .await;

    let gpu_url = format!("{}/gpu", shop.uri());
    let monitor_url = format!("{}/monitor", shop.uri());

    let dir = tempdir()?;
    let state_path = dir.path().join("state.json");
    let saved = json!({
        "states": {
            (gpu_url.clone()): {
                "last_price": 900.0,
                "last_checked": null,
                "consecutive_failures": 0,
                "cooldown_until": null
            }
        }
    });
    std::fs::write(&state_path, saved.to_string())?;

    let store = TargetStore::with_state_file(
        vec![
            target("GPU", &gpu_url, dec!(500)),
            target("Monitor", &monitor_url, dec!(250)),
        ],
        &state_path,
    )?;
    let mut monitor = build_monitor(
        Arc::new(HttpFetcher::new(&ScraperConfig::default())?),
        store,
        MonitorConfig::default(),
        discord_notifiers(format!("{}/webhook", shop.uri())).await?,
    );

    let report = monitor.run_cycle().await;

    let triggers: Vec<_> = report.alerts.iter().map(|a| a.trigger).collect();
    assert_eq!(triggers, vec![TriggerKind::BelowTarget, TriggerKind::FlashSale]);
    assert!(report.alerts.iter().all(|a| a.severity == Severity::Critical));
    assert!(matches!(
        report.outcomes[1].outcome,
        TargetOutcome::Checked(ExtractionResult::Blocked { .. })
    ));

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&state_path)?)?;
    assert_eq!(written["states"][&gpu_url]["last_price"], 450.0);
    assert!(written["states"][&monitor_url]["cooldown_until"].is_string());
    assert_eq!(written["states"][&monitor_url]["consecutive_failures"], 1);

    Ok(())
}

#[tokio::test]
async fn test_blocked_twice_within_cooldown_fetches_once() -> anyhow::Result<()> {
    let url = "https://www.amazon.ca/dp/B0TEST";
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond(url, Err(FetchFailure::Blocked(503)));
    fetcher.respond(url, Err(FetchFailure::Blocked(503)));

    let mut monitor = build_monitor(
        fetcher.clone(),
        TargetStore::new(vec![target("SSD", url, dec!(90))]),
        MonitorConfig::default(),
        PluginManager::new(),
    );

    monitor.run_cycle().await;
    let second = monitor.run_cycle().await;

    assert_eq!(fetcher.calls(url), 1);
    assert_eq!(second.skipped(), 1);
    assert_eq!(monitor.store().snapshot(url).consecutive_failures, 1);
    Ok(())
}

#[tokio::test]
async fn test_bot_wall_page_counts_as_blocked() -> anyhow::Result<()> {
    let url = "https://www.amazon.com/dp/B0WALL";
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond(
        url,
        Ok(RawContent::new(url, "<html><title>Robot Check</title><form action=\"/errors/validateCaptcha\"></form></html>")),
    );

    let mut monitor = build_monitor(
        fetcher,
        TargetStore::new(vec![target("Headphones", url, dec!(200))]),
        MonitorConfig::default(),
        PluginManager::new(),
    );

    monitor.run_cycle().await;
    assert!(monitor.store().snapshot(url).cooldown_until.is_some());
    Ok(())
}

#[tokio::test]
async fn test_mixed_failures_are_isolated() -> anyhow::Result<()> {
    let broken = "https://www.bestbuy.ca/site/broken";
    let missing = "https://www.walmart.ca/ip/missing";
    let cheap = "https://shop.example.com/cheap";

    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond(broken, Err(FetchFailure::Transport("connection reset".to_string())));
    fetcher.respond(missing, Err(FetchFailure::NotFound));
    fetcher.respond_price(cheap, "$19.99");

    let mut monitor = build_monitor(
        fetcher,
        TargetStore::new(vec![
            target("Broken", broken, dec!(100)),
            target("Missing", missing, dec!(100)),
            target("Cheap", cheap, dec!(25)),
        ]),
        MonitorConfig::default(),
        PluginManager::new(),
    );

    let report = monitor.run_cycle().await;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.successes(), 1);
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].target_name, "Cheap");
    assert!(matches!(
        report.outcomes[1].outcome,
        TargetOutcome::Checked(ExtractionResult::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_webhook_failure_is_not_fatal() -> anyhow::Result<()> {
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&hook)
        .await;

    let url = "https://shop.example.com/tv";
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond_price(url, "$399.00");

    let mut monitor = build_monitor(
        fetcher,
        TargetStore::new(vec![target("TV", url, dec!(450))]),
        MonitorConfig::default(),
        discord_notifiers(format!("{}/webhook", hook.uri())).await?,
    );

    let report = monitor.run_cycle().await;

    assert_eq!(report.alerts.len(), 1);
    assert_eq!(monitor.store().snapshot(url).last_price, Some(dec!(399)));
    Ok(())
}

#[tokio::test]
async fn test_target_reload_keeps_state() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let targets_path = dir.path().join("targets.json");
    let kept = "https://shop.example.com/kept";
    let dropped = "https://shop.example.com/dropped";

    std::fs::write(
        &targets_path,
        json!([
            {"name": "Kept", "url": kept, "target_price": 100},
            {"name": "Dropped", "url": dropped, "target_price": 100}
        ])
        .to_string(),
    )?;

    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond_price(kept, "$120.00");
    fetcher.respond_price(dropped, "$130.00");

    let config = MonitorConfig {
        reload_targets: true,
        ..MonitorConfig::default()
    };
    let targets = pricewatch::models::load_targets(&targets_path)?;
    let mut monitor = build_monitor(fetcher, TargetStore::new(targets), config, PluginManager::new())
        .with_target_source(&targets_path);
    monitor.run_cycle().await;

    std::fs::write(
        &targets_path,
        json!([
            {"name": "Kept", "url": kept, "target_price": 110},
            {"name": "New", "url": "https://shop.example.com/new", "target_price": 50}
        ])
        .to_string(),
    )?;
    assert!(monitor.reload_targets());
    assert_eq!(monitor.store().targets().len(), 2);
    assert_eq!(monitor.store().snapshot(kept).last_price, Some(dec!(120)));
    assert!(monitor.store().state(dropped).is_none());

    std::fs::write(&targets_path, "[]")?;
    assert!(!monitor.reload_targets());
    assert_eq!(monitor.store().targets().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_run_forever_stops_on_shutdown() -> anyhow::Result<()> {
    let url = "https://shop.example.com/lamp";
    let fetcher = Arc::new(ScriptedFetcher::new());
    fetcher.respond_price(url, "$35.00");

    let notifiers = PluginManager::new();
    notifiers.register_notifier(Box::new(LogNotifier::new())).await;

    let mut monitor = build_monitor(
        fetcher.clone(),
        TargetStore::new(vec![target("Lamp", url, dec!(40))]),
        MonitorConfig::default(),
        notifiers,
    );

    tokio::time::timeout(
        Duration::from_secs(10),
        monitor.run_forever(tokio::time::sleep(Duration::from_millis(300))),
    )
    .await?;

    assert_eq!(fetcher.calls(url), 1);
    assert_eq!(monitor.store().snapshot(url).last_price, Some(dec!(35)));
    Ok(())
}
