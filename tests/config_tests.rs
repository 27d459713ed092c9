use std::io::Write;
use std::time::Duration;

use tick_trend::config::{parse_interval_ms, Config, LogFormat};

#[test]
fn load_from_file_and_validate() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[store]
table = "data/ticks.sqlite"

[archive]
bucket = "data/raw"

[notify]
topic = "https://alerts.example.com/hook"

[trend]
symbols = ["AAPL", "msft"]
short_period = 3
long_period = 10
window = "10m"
interval = "15s"

[logging]
level = "debug"
format = "json"
"#
    )
    .unwrap();

    let config = Config::from_path(file.path()).unwrap();
    config.validate().unwrap();

    let settings = config.trend.detector_settings().unwrap();
    assert_eq!(settings.symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    assert_eq!(settings.short_period, 3);
    assert_eq!(settings.long_period, 10);
    assert_eq!(settings.min_points(), 10);
    assert_eq!(settings.window, Duration::from_secs(600));
    assert_eq!(config.trend.interval_duration().unwrap(), Duration::from_secs(15));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_path(&dir.path().join("nope.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to read"));
}

#[test]
fn invalid_window_fails_validation() {
    let mut config: Config = toml::from_str(
        "[store]\ntable = \"t\"\n[archive]\nbucket = \"b\"\n[notify]\ntopic = \"n\"\n[trend]\nwindow = \"0m\"\n",
    )
    .unwrap();
    assert!(config.validate().is_err());
    config.trend.window = "5m".to_string();
    config.validate().unwrap();
}

#[test]
fn parse_interval_valid() {
    assert_eq!(parse_interval_ms("1s").unwrap(), 1_000);
    assert_eq!(parse_interval_ms("5m").unwrap(), 300_000);
    assert_eq!(parse_interval_ms("1d").unwrap(), 86_400_000);
}
