//! Unit tests for data models module
//!
//! Validates configuration invariants, the derived init options and the
//! JSON shape of reported events.

use super::*;

#[test]
fn test_default_configuration_is_valid() {
    let config = MonitorConfiguration::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.mount_point, PathBuf::from("/"));
    assert_eq!(config.scope, MarkScope::Mount);
    assert_eq!(config.events, EventMask::MODIFY | EventMask::CLOSE_WRITE);
}

#[test]
fn test_validate_rejects_empty_events() {
    let config = MonitorConfiguration {
        events: EventMask::empty(),
        ..MonitorConfiguration::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::NoEvents)));
}

#[test]
fn test_validate_rejects_bad_exclude() {
    let config = MonitorConfiguration {
        exclude: vec!["/tmp/[".to_string()],
        ..MonitorConfiguration::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Invalid exclude pattern"));
}

#[test]
fn test_poll_interval_bounds() {
    assert_eq!(validate_poll_interval(10).unwrap(), Duration::from_millis(10));
    assert_eq!(validate_poll_interval(60_000).unwrap(), Duration::from_secs(60));

    let err = validate_poll_interval(5).unwrap_err();
    assert!(err.to_string().contains("Invalid polling interval"));
    assert!(validate_poll_interval(60_001).is_err());
}

#[test]
fn test_parse_event_names() {
    let mask = parse_event_names(["modify", "close_write"]).unwrap();
    assert_eq!(mask, EventMask::MODIFY | EventMask::CLOSE_WRITE);

    let err = parse_event_names(["modify", "explode"]).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownEvent(name) if name == "explode"));
}

#[test]
fn test_init_options_follow_configuration() {
    let config = MonitorConfiguration::default();
    let options = config.init_options();
    assert_eq!(options.flags, InitFlags::default());
    assert_eq!(options.class, NotificationClass::Notify);

    let config = MonitorConfiguration {
        events: EventMask::OPEN_PERM,
        nonblocking: false,
        unlimited_marks: false,
        ..MonitorConfiguration::default()
    };
    let options = config.init_options();
    assert_eq!(options.class, NotificationClass::Content);
    assert!(!options.flags.contains(InitFlags::NONBLOCK));
    assert!(!options.flags.contains(InitFlags::UNLIMITED_MARKS));
    assert!(options.flags.contains(InitFlags::UNLIMITED_QUEUE));
}

#[test]
fn test_effective_skip_pids() {
    let config = MonitorConfiguration {
        skip_pids: vec![1, 2],
        ..MonitorConfiguration::default()
    };
    assert_eq!(config.effective_skip_pids(99), vec![1, 2, 99]);
    assert_eq!(config.effective_skip_pids(2), vec![1, 2]);

    let config = MonitorConfiguration {
        include_self: true,
        ..config
    };
    assert_eq!(config.effective_skip_pids(99), vec![1, 2]);
}

#[test]
fn test_file_access_event_serialization() {
    let event = FileAccessEvent {
        timestamp: "2024-01-01T00:00:00Z".to_string(),
        pid: 1234,
        path: "/var/log/syslog".to_string(),
        events: vec!["modify".to_string()],
        process: None,
        mtime: None,
    };

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["pid"], 1234);
    assert_eq!(json["path"], "/var/log/syslog");
    assert_eq!(json["events"][0], "modify");
    assert!(json.get("process").is_none(), "absent process should be skipped");
    assert!(json.get("mtime").is_none());
}

#[test]
fn test_output_format_serde_names() {
    assert_eq!(serde_json::to_string(&OutputFormat::Json).unwrap(), "\"json\"");
    let parsed: OutputFormat = serde_json::from_str("\"human\"").unwrap();
    assert_eq!(parsed, OutputFormat::Human);
}
