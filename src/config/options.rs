//! Option descriptors
//! Declarative table of every `set` option

use std::fmt;

use super::Settings;
use crate::error::{ErrorType, RoamError};
use crate::logging::parse_level;

/// Typed value after parsing and validation
/// Setters receive this, never raw strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Integer(u64),
    Text(String),
    /// Empty input clears the option
    Optional(Option<String>),
}

/// Option type definition for parsing and validation
#[derive(Debug, Clone)]
pub enum OptionType {
    Integer {
        min: Option<u64>,
        max: Option<u64>,
    },
    Text,
    /// Text containing a `{}` placeholder
    Template,
    OptionalText,
    /// A log level name or verbosity number
    LogLevel,
}

/// Structured error for option operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    ParseError(String),
    ValidationError(String),
    UnknownOption(String),
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            OptionError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            OptionError::UnknownOption(name) => write!(f, "Unknown option: {name}"),
        }
    }
}

impl From<OptionError> for RoamError {
    fn from(err: OptionError) -> Self {
        match err {
            OptionError::ParseError(msg) => RoamError::new(ErrorType::Parse, "OPTION_PARSE_ERROR", msg),
            OptionError::ValidationError(msg) => {
                RoamError::new(ErrorType::Config, "OPTION_VALIDATION_ERROR", msg)
            }
            OptionError::UnknownOption(name) => RoamError::new(
                ErrorType::Config,
                "UNKNOWN_OPTION",
                format!("Unknown option: {name}"),
            ),
        }
    }
}

/// Setter function signature
pub type OptionSetter = fn(&mut Settings, OptionValue) -> Result<(), OptionError>;
/// Getter used for help listings
pub type OptionGetter = fn(&Settings) -> String;

#[derive(Debug, Clone)]
pub struct OptionDescriptor {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub ty: OptionType,
    pub set: OptionSetter,
    pub get: OptionGetter,
}

fn expected(what: &str) -> OptionError {
    OptionError::ValidationError(format!("Expected {what}"))
}

fn set_home_page(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Text(text) => {
            settings.home_page = text;
            Ok(())
        }
        _ => Err(expected("text")),
    }
}

fn set_search_page(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Text(text) => {
            settings.search_page = text;
            Ok(())
        }
        _ => Err(expected("text")),
    }
}

fn set_default_zoom(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Integer(n) => {
            settings.default_zoom = n as u32;
            Ok(())
        }
        _ => Err(expected("integer")),
    }
}

fn set_default_user_agent(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Optional(agent) => {
            settings.default_user_agent = agent;
            Ok(())
        }
        _ => Err(expected("text")),
    }
}

fn set_request_timeout(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Integer(n) => {
            settings.request_timeout_ms = n;
            Ok(())
        }
        _ => Err(expected("integer")),
    }
}

fn set_max_message_bytes(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Integer(n) => {
            settings.max_message_bytes = n as usize;
            Ok(())
        }
        _ => Err(expected("integer")),
    }
}

fn set_log_level(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Text(level) => {
            settings.log_level = level;
            Ok(())
        }
        _ => Err(expected("log level")),
    }
}

fn set_profile(settings: &mut Settings, value: OptionValue) -> Result<(), OptionError> {
    match value {
        OptionValue::Text(profile) if profile.contains(['/', '.']) => Err(
            OptionError::ValidationError(format!("Profile name '{profile}' may not contain '/' or '.'")),
        ),
        OptionValue::Text(profile) => {
            settings.profile = profile;
            Ok(())
        }
        _ => Err(expected("text")),
    }
}

pub const OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor {
        name: "home_page",
        aliases: &["home"],
        ty: OptionType::Text,
        set: set_home_page,
        get: |s| s.home_page.clone(),
    },
    OptionDescriptor {
        name: "search_page",
        aliases: &[],
        ty: OptionType::Template,
        set: set_search_page,
        get: |s| s.search_page.clone(),
    },
    OptionDescriptor {
        name: "default_zoom",
        aliases: &["zoom"],
        ty: OptionType::Integer {
            min: Some(10),
            max: Some(500),
        },
        set: set_default_zoom,
        get: |s| s.default_zoom.to_string(),
    },
    OptionDescriptor {
        name: "default_user_agent",
        aliases: &["user_agent"],
        ty: OptionType::OptionalText,
        set: set_default_user_agent,
        get: |s| s.default_user_agent.clone().unwrap_or_default(),
    },
    OptionDescriptor {
        name: "request_timeout_ms",
        aliases: &["timeout"],
        ty: OptionType::Integer {
            min: Some(1),
            max: Some(600_000),
        },
        set: set_request_timeout,
        get: |s| s.request_timeout_ms.to_string(),
    },
    OptionDescriptor {
        name: "max_message_bytes",
        aliases: &[],
        ty: OptionType::Integer {
            min: Some(1024),
            max: Some(16 * 1024 * 1024),
        },
        set: set_max_message_bytes,
        get: |s| s.max_message_bytes.to_string(),
    },
    OptionDescriptor {
        name: "log_level",
        aliases: &[],
        ty: OptionType::LogLevel,
        set: set_log_level,
        get: |s| s.log_level.clone(),
    },
    OptionDescriptor {
        name: "profile",
        aliases: &[],
        ty: OptionType::Text,
        set: set_profile,
        get: |s| s.profile.clone(),
    },
];

/// Look up an option by name or alias
pub fn find_option(name: &str) -> Option<&'static OptionDescriptor> {
    let name = name.trim().to_lowercase();
    OPTIONS
        .iter()
        .find(|d| d.name == name || d.aliases.contains(&name.as_str()))
}

/// Parse a raw string to an [`OptionValue`]
pub fn parse_value(ty: &OptionType, value: &str) -> Result<OptionValue, OptionError> {
    match ty {
        OptionType::Integer { min, max } => {
            let val = value
                .trim()
                .parse::<u64>()
                .map_err(|_| OptionError::ParseError(format!("Invalid integer value: {value}")))?;

            if let Some(min_val) = min {
                if val < *min_val {
                    return Err(OptionError::ValidationError(format!(
                        "Value {val} is below minimum {min_val}"
                    )));
                }
            }
            if let Some(max_val) = max {
                if val > *max_val {
                    return Err(OptionError::ValidationError(format!(
                        "Value {val} is above maximum {max_val}"
                    )));
                }
            }
            Ok(OptionValue::Integer(val))
        }
        OptionType::Text => {
            if value.trim().is_empty() {
                return Err(OptionError::ValidationError("Value cannot be empty".into()));
            }
            Ok(OptionValue::Text(value.to_string()))
        }
        OptionType::Template => {
            if !value.contains("{}") {
                return Err(OptionError::ValidationError(format!(
                    "Template '{value}' has no '{{}}' placeholder"
                )));
            }
            Ok(OptionValue::Text(value.to_string()))
        }
        OptionType::OptionalText => Ok(OptionValue::Optional(
            Some(value.to_string()).filter(|v| !v.trim().is_empty()),
        )),
        OptionType::LogLevel => parse_level(value)
            .map(|_| OptionValue::Text(value.trim().to_lowercase()))
            .map_err(|err| OptionError::ParseError(err.message)),
    }
}

/// Parse and apply `value` to the option called `name`
pub fn set_option(settings: &mut Settings, name: &str, value: &str) -> Result<(), OptionError> {
    let descriptor =
        find_option(name).ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
    let parsed = parse_value(&descriptor.ty, value)?;
    (descriptor.set)(settings, parsed)
}

/// `name = value` lines in declaration order
pub fn describe(settings: &Settings) -> Vec<String> {
    OPTIONS
        .iter()
        .map(|d| format!("{} = {}", d.name, (d.get)(settings)))
        .collect()
}
