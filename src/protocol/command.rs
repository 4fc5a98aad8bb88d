use super::PayloadMap;
use crate::error::{Result, RoamError};
use std::collections::BTreeMap;

/// Result key carrying the highlight generation
pub const SNAPSHOT_KEY: &str = "snapshot";
/// Result key of `get_source`
pub const HTML_KEY: &str = "html";

/// Commands understood by the page worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCommand {
    Highlight {
        selector: String,
    },
    RemoveOverlay,
    Click {
        click_id: usize,
        new_window: bool,
        snapshot: Option<u64>,
    },
    YankLinks {
        yank_id: usize,
        snapshot: Option<u64>,
    },
    GetSource,
    /// Selector -> value pairs
    FormFill {
        fields: PayloadMap,
    },
    SerialiseForm {
        form_id: usize,
        snapshot: Option<u64>,
    },
    SetLogLevel {
        log_level: String,
    },
}

impl PageCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Highlight { .. } => "highlight",
            Self::RemoveOverlay => "remove_overlay",
            Self::Click { .. } => "click",
            Self::YankLinks { .. } => "yank_links",
            Self::GetSource => "get_source",
            Self::FormFill { .. } => "form_fill",
            Self::SerialiseForm { .. } => "serialise_form",
            Self::SetLogLevel { .. } => "set_log_level",
        }
    }

    pub fn params(&self) -> PayloadMap {
        let mut params = PayloadMap::new();
        match self {
            Self::Highlight { selector } => {
                params.insert("selector".into(), selector.clone());
            }
            Self::RemoveOverlay | Self::GetSource => {}
            Self::Click {
                click_id,
                new_window,
                snapshot,
            } => {
                params.insert("click_id".into(), click_id.to_string());
                params.insert("new_window".into(), new_window.to_string());
                insert_snapshot(&mut params, *snapshot);
            }
            Self::YankLinks { yank_id, snapshot } => {
                params.insert("yank_id".into(), yank_id.to_string());
                insert_snapshot(&mut params, *snapshot);
            }
            Self::FormFill { fields } => params.clone_from(fields),
            Self::SerialiseForm { form_id, snapshot } => {
                params.insert("form_id".into(), form_id.to_string());
                insert_snapshot(&mut params, *snapshot);
            }
            Self::SetLogLevel { log_level } => {
                params.insert("log_level".into(), log_level.clone());
            }
        }
        params
    }

    /// Parse a decoded request. Unknown names are an error the server
    /// answers with an empty result.
    pub fn parse(name: &str, params: &PayloadMap) -> Result<Self> {
        let command = match name {
            "highlight" => Self::Highlight {
                selector: required(params, "selector")?.to_string(),
            },
            "remove_overlay" => Self::RemoveOverlay,
            "click" => Self::Click {
                click_id: index(params, "click_id")?,
                new_window: params.get("new_window").is_some_and(|v| is_truthy(v)),
                snapshot: snapshot(params)?,
            },
            "yank_links" => Self::YankLinks {
                yank_id: index(params, "yank_id")?,
                snapshot: snapshot(params)?,
            },
            "get_source" => Self::GetSource,
            "form_fill" => Self::FormFill {
                fields: params.clone(),
            },
            "serialise_form" => Self::SerialiseForm {
                form_id: index(params, "form_id")?,
                snapshot: snapshot(params)?,
            },
            "set_log_level" => Self::SetLogLevel {
                log_level: required(params, "log_level")?.to_string(),
            },
            other => {
                return Err(RoamError::protocol(
                    "PROTOCOL_UNKNOWN_COMMAND",
                    format!("unknown page command '{other}'"),
                ))
            }
        };
        Ok(command)
    }
}

/// Typed view of a `highlight` result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightMatches {
    pub snapshot: Option<u64>,
    pub labels: BTreeMap<usize, String>,
}

impl HighlightMatches {
    /// Non-numeric keys other than the snapshot marker are skipped.
    pub fn from_payload(payload: &PayloadMap) -> Self {
        let mut matches = Self::default();
        for (key, value) in payload {
            if key == SNAPSHOT_KEY {
                matches.snapshot = value.parse().ok();
            } else if let Ok(index) = key.parse() {
                matches.labels.insert(index, value.clone());
            }
        }
        matches
    }

    pub fn to_payload(&self) -> PayloadMap {
        let mut payload: PayloadMap = self
            .labels
            .iter()
            .map(|(index, label)| (index.to_string(), label.clone()))
            .collect();
        insert_snapshot(&mut payload, self.snapshot);
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in index order
    pub fn labels(&self) -> Vec<String> {
        self.labels.values().cloned().collect()
    }
}

fn insert_snapshot(params: &mut PayloadMap, snapshot: Option<u64>) {
    if let Some(snapshot) = snapshot {
        params.insert(SNAPSHOT_KEY.into(), snapshot.to_string());
    }
}

fn required<'a>(params: &'a PayloadMap, key: &str) -> Result<&'a str> {
    params.get(key).map(String::as_str).ok_or_else(|| {
        RoamError::protocol("PROTOCOL_MISSING_PARAM", format!("missing parameter '{key}'"))
    })
}

fn index(params: &PayloadMap, key: &str) -> Result<usize> {
    let raw = required(params, key)?;
    raw.trim().parse().map_err(|_| {
        RoamError::protocol(
            "PROTOCOL_BAD_PARAM",
            format!("parameter '{key}' is not an index: '{raw}'"),
        )
    })
}

fn snapshot(params: &PayloadMap) -> Result<Option<u64>> {
    params
        .get(SNAPSHOT_KEY)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                RoamError::protocol("PROTOCOL_BAD_PARAM", format!("bad snapshot '{raw}'"))
            })
        })
        .transpose()
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
