use super::*;
use crate::key::KeyEvent;

#[test]
fn test_default_bindings() {
    let table = default_bindings().unwrap();
    assert!(matches!(table.get(&KeyEvent::new("i")), Some(Binding::Command(_))));
    assert!(matches!(
        table.get(&KeyEvent::new("space").shifted()),
        Some(Binding::Command(_))
    ));
    match table.get(&KeyEvent::new("g")) {
        Some(Binding::Table(g)) => {
            assert_eq!(g.len(), 4);
            assert!(g.get(&KeyEvent::new("u")).is_some());
        }
        other => panic!("expected sub table, got {other:?}"),
    }
    assert!(table.describe().contains(&"C-Up: zoom-in".to_string()));
}

#[test]
fn test_history_bindings_reachable_from_terminal() {
    let table = default_bindings().unwrap();
    let described = table.describe();
    assert!(described.contains(&"H: back".to_string()));
    assert!(described.contains(&"L: forward".to_string()));
    // Tab is what a terminal sends for C-i
    assert!(table.get(&KeyEvent::new("Tab")).is_none());
}

#[test]
fn test_search_url_encodes_query() {
    let settings = Settings::default();
    assert_eq!(
        settings.search_url("rust lang&more"),
        "https://duckduckgo.com/?q=rust+lang%26more"
    );
}

#[test]
fn test_channel_limits_follow_settings() {
    let settings = Settings {
        request_timeout_ms: 250,
        max_message_bytes: 4096,
        ..Settings::default()
    };
    let limits = settings.channel_limits();
    assert_eq!(limits.timeout, std::time::Duration::from_millis(250));
    assert_eq!(limits.max_message_bytes, 4096);
}

#[test]
fn test_set_option_by_name_and_alias() {
    let mut settings = Settings::default();
    set_option(&mut settings, "default_zoom", "150").unwrap();
    assert_eq!(settings.default_zoom, 150);
    set_option(&mut settings, "zoom", "90").unwrap();
    assert_eq!(settings.default_zoom, 90);
    set_option(&mut settings, "HOME", "https://example.com/").unwrap();
    assert_eq!(settings.home_page, "https://example.com/");
}

#[test]
fn test_set_option_validation() {
    let mut settings = Settings::default();
    assert_eq!(
        set_option(&mut settings, "zoom", "5"),
        Err(OptionError::ValidationError("Value 5 is below minimum 10".into()))
    );
    assert!(matches!(
        set_option(&mut settings, "timeout", "soon"),
        Err(OptionError::ParseError(_))
    ));
    assert!(matches!(
        set_option(&mut settings, "search_page", "https://example.com/"),
        Err(OptionError::ValidationError(_))
    ));
    assert!(matches!(
        set_option(&mut settings, "profile", "../etc"),
        Err(OptionError::ValidationError(_))
    ));
    assert_eq!(
        set_option(&mut settings, "font", "mono"),
        Err(OptionError::UnknownOption("font".into()))
    );
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_log_level_option() {
    let mut settings = Settings::default();
    set_option(&mut settings, "log_level", "DEBUG").unwrap();
    assert_eq!(settings.log_level, "debug");
    set_option(&mut settings, "log_level", "3").unwrap();
    assert_eq!(settings.log_level, "3");
    assert!(set_option(&mut settings, "log_level", "loud").is_err());
}

#[test]
fn test_user_agent_can_be_cleared() {
    let mut settings = Settings::default();
    set_option(&mut settings, "user_agent", "roam/1").unwrap();
    assert_eq!(settings.default_user_agent.as_deref(), Some("roam/1"));
    set_option(&mut settings, "user_agent", "").unwrap();
    assert_eq!(settings.default_user_agent, None);
}

#[test]
fn test_option_error_converts() {
    let err: crate::error::RoamError = OptionError::UnknownOption("x".into()).into();
    assert_eq!(err.code, "UNKNOWN_OPTION");
}

#[test]
fn test_describe_lists_every_option() {
    let lines = options::describe(&Settings::default());
    assert_eq!(lines.len(), OPTIONS.len());
    assert_eq!(lines[2], "default_zoom = 100");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(Some(&dir.path().join("nope.lua"))).unwrap();
    assert_eq!(config.settings, Settings::default());
    assert!(!config.bindings.is_empty());

    let config = Config::load(None).unwrap();
    assert_eq!(config.settings.home_page, DEFAULT_HOME_PAGE);
}

#[test]
fn test_load_file_settings_and_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.lua");
    std::fs::write(
        &path,
        r#"
home_page = "https://example.com/"
default_zoom = 150
default_user_agent = nil
commands = {
    i = "insert-mode",
    g = { u = "navigate-up" },
    x = function(uri) return "open https://example.org/" end,
}
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.settings.home_page, "https://example.com/");
    assert_eq!(config.settings.default_zoom, 150);
    assert_eq!(config.settings.default_user_agent, None);
    assert_eq!(config.bindings.len(), 3);
    assert_eq!(
        config.bindings.describe(),
        vec!["g u: navigate-up", "i: insert-mode", "x: lua: x"]
    );
}

#[test]
fn test_lua_setting_out_of_range() {
    let err = lua::load_str("default_zoom = 1000", "test").unwrap_err();
    assert_eq!(err.code, "CONFIG_BAD_SETTING");
    assert!(err.contains_msg("default_zoom"));
}

#[test]
fn test_lua_syntax_error() {
    let err = lua::load_str("commands = {", "broken").unwrap_err();
    assert_eq!(err.code, "LUA_ERROR");
}

#[test]
fn test_lua_bad_binding_type() {
    let err = lua::load_str("commands = { x = 42 }", "test").unwrap_err();
    assert_eq!(err.code, "CONFIG_BAD_BINDING");
}

#[test]
fn test_lua_nested_sub_command_rejected() {
    let err = lua::load_str(r#"commands = { g = { h = { i = "insert-mode" } } }"#, "test").unwrap_err();
    assert_eq!(err.code, "NESTED_SUB_COMMAND");
}

#[test]
fn test_lua_hooks() {
    let config = lua::load_str(
        r#"
function search_url(text) return "https://search.example/" .. text end
function should_open_popup(uri) return false end
function user_agent_choices() return { "agent 1", "agent 2" } end
function should_allow_notification(origin) error("boom") end
"#,
        "hooks",
    )
    .unwrap();

    assert_eq!(
        config.hooks.search_url("cats").as_deref(),
        Some("https://search.example/cats")
    );
    assert!(!config.hooks.should_open_popup("https://ads.example/"));
    assert_eq!(config.hooks.user_agent_choices(), vec!["agent 1", "agent 2"]);
    // Hook errors fall back to the default answer
    assert!(config.hooks.should_allow_notification("https://example.com"));
}

#[test]
fn test_no_hooks_defaults() {
    let hooks = NoHooks;
    assert_eq!(hooks.search_url("x"), None);
    assert!(hooks.should_open_popup("x"));
    assert!(hooks.user_agent_choices().is_empty());
}
