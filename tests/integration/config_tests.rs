use pricewatch::config::AppConfig;
use pricewatch::models::{parse_targets, SiteProfile};
use pricewatch::utils::error::{AppError, ConfigError};
use rust_decimal_macros::dec;

#[test]
fn test_target_list_errors_are_fatal() {
    let empty = parse_targets("[]");
    assert!(matches!(empty, Err(AppError::Config(ConfigError::EmptyTargetList))));

    let negative = parse_targets(r#"[{"name": "GPU", "url": "https://www.newegg.ca/p/1", "target_price": -5}]"#);
    assert!(matches!(
        negative,
        Err(AppError::Config(ConfigError::InvalidPrice { ref name, .. })) if name == "GPU"
    ));

    let duplicate = parse_targets(
        r#"[
            {"name": "A", "url": "https://www.newegg.ca/p/1", "target_price": 5},
            {"name": "B", "url": "https://www.newegg.ca/p/1", "target_price": 6}
        ]"#,
    );
    assert!(matches!(duplicate, Err(AppError::Config(ConfigError::DuplicateTarget { .. }))));

    assert!(matches!(parse_targets("{"), Err(AppError::Serialization(_))));
}

#[test]
fn test_target_list_with_categories() {
    let targets = parse_targets(
        r#"[
            {"name": "GPU", "url": "https://www.newegg.ca/p/1", "target_price": 499.99},
            {"name": "Desk", "url": "https://furniture.example.com/desk", "target_price": 250, "category": "walmart"}
        ]"#,
    )
    .unwrap();

    assert_eq!(targets[0].target_price, dec!(499.99));
    assert_eq!(targets[1].category.as_deref(), Some("walmart"));
}

#[test]
fn test_default_configuration_is_valid() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.monitor.cooldown_minutes, 30);
    assert_eq!(config.monitor.flash_sale_threshold, dec!(0.40));
    assert!(config.monitor.failure_cooldown_threshold.is_none());
}

#[test]
fn test_invalid_webhook_is_missing_endpoint() {
    let mut config = AppConfig::default();
    config.notifications.discord.webhook_url = Some("not a url".to_string());
    assert!(matches!(config.validate(), Err(ConfigError::MissingEndpoint(_))));
}

#[test]
fn test_profile_file_overrides_builtin() {
    let extra = SiteProfile::parse_toml(
        r##"
        [[profile]]
        name = "amazon"
        hosts = ["amazon."]
        selectors = ["#new-price"]
        "##,
    )
    .unwrap();

    let merged = pricewatch::models::merge_profiles(SiteProfile::builtin(), extra);
    let amazon = merged.iter().find(|p| p.name == "amazon").unwrap();
    assert_eq!(amazon.selectors, vec!["#new-price".to_string()]);
    assert_eq!(merged.len(), SiteProfile::builtin().len());
}
