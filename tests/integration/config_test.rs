//! Configuration integration tests

use rust_decimal_macros::dec;
use yt_fair_value::config::{Config, OutputFormat};
use yt_fair_value::source::Network;
use yt_fair_value::valuation::CurveAttachment;

#[test]
fn test_config_example_parses() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    config.validate().unwrap();

    assert_eq!(config.market.network, Network::Ethereum);
    assert_eq!(config.points.multiplier, dec!(5));
    assert_eq!(config.valuation.curve_attachment, CurveAttachment::Timestamp);
    assert_eq!(config.output.format, OutputFormat::Table);
}

#[test]
fn test_config_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, include_str!("../../config.toml.example")).unwrap();

    let config = Config::load(&path).unwrap();
    let params = config.valuation_params().unwrap();
    assert_eq!(params.points.points_per_hour, 0.04);
}

#[test]
fn test_config_load_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let content = include_str!("../../config.toml.example").replace("multiplier = 5", "multiplier = 0");
    std::fs::write(&path, content).unwrap();

    assert!(Config::load(&path).is_err());
}

#[test]
fn test_effective_config_roundtrips_through_toml() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    let printed = toml::to_string_pretty(&config).unwrap();
    let reparsed: Config = toml::from_str(&printed).unwrap();

    assert_eq!(reparsed.market.yt, config.market.yt);
    assert_eq!(reparsed.points.points_per_hour, config.points.points_per_hour);
}
