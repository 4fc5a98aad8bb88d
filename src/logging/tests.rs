use super::*;

#[test]
fn test_parse_level_names() {
    assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
    assert_eq!(parse_level(" WARNING ").unwrap(), LevelFilter::WARN);
    assert_eq!(parse_level("off").unwrap(), LevelFilter::OFF);
}

#[test]
fn test_parse_level_verbosity() {
    assert_eq!(parse_level("0").unwrap(), LevelFilter::ERROR);
    assert_eq!(parse_level("2").unwrap(), LevelFilter::INFO);
    assert_eq!(parse_level("4").unwrap(), LevelFilter::TRACE);
    assert_eq!(parse_level("9").unwrap(), LevelFilter::TRACE);
}

#[test]
fn test_parse_level_rejects_garbage() {
    let err = parse_level("loud").unwrap_err();
    assert_eq!(err.code, "BAD_LOG_LEVEL");
    assert_eq!(err.kind, ErrorType::Config);
}

#[test]
fn test_handle_reloads_filter() {
    let (layer, handle) = filter_layer("info").unwrap();
    let _subscriber = tracing_subscriber::registry().with(layer);

    handle.set_level("trace").unwrap();
    assert_eq!(handle.current().unwrap(), "trace");

    let control: &dyn LogControl = &handle;
    control.set_level("1").unwrap();
    assert_eq!(handle.current().unwrap(), "warn");
    assert!(control.set_level("loud").is_err());
    assert_eq!(handle.current().unwrap(), "warn");
}
