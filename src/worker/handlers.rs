use super::dom::{Badge, ElementKind, NodeRef, PageDom};
use super::{ChromeLink, ChromeRequest, LogControl};
use crate::error::Result;
use crate::protocol::{PageCommand, PayloadMap, HTML_KEY, SNAPSHOT_KEY};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Class of the overlay container
pub const OVERLAY_CLASS: &str = "roam_overlay";

/// The numbered elements of the live overlay
#[derive(Debug, Clone)]
struct Snapshot {
    generation: u64,
    nodes: BTreeMap<usize, NodeRef>,
}

/// Live state of one page on the worker side
pub struct WorkerPage {
    dom: Box<dyn PageDom>,
    snapshot: Option<Snapshot>,
    generation: u64,
}

impl WorkerPage {
    pub fn new(dom: Box<dyn PageDom>) -> Self {
        Self {
            dom,
            snapshot: None,
            generation: 0,
        }
    }

    pub fn dom(&self) -> &dyn PageDom {
        self.dom.as_ref()
    }

    /// Generation of the live highlight, if any
    pub fn snapshot_generation(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.generation)
    }

    pub fn execute(
        &mut self,
        command: PageCommand,
        chrome: &ChromeLink,
        log: &dyn LogControl,
    ) -> Result<PayloadMap> {
        match command {
            PageCommand::Highlight { selector } => self.highlight(&selector),
            PageCommand::RemoveOverlay => {
                self.remove_overlay();
                Ok(PayloadMap::new())
            }
            PageCommand::Click {
                click_id,
                new_window,
                snapshot,
            } => self.click(click_id, new_window, snapshot, chrome),
            PageCommand::YankLinks { yank_id, snapshot } => self.yank(yank_id, snapshot, chrome),
            PageCommand::GetSource => Ok(PayloadMap::from([(
                HTML_KEY.to_string(),
                self.dom.outer_html(),
            )])),
            PageCommand::FormFill { fields } => {
                self.form_fill(&fields);
                Ok(PayloadMap::new())
            }
            PageCommand::SerialiseForm { form_id, snapshot } => {
                Ok(self.serialise_form(form_id, snapshot))
            }
            PageCommand::SetLogLevel { log_level } => {
                log.set_level(&log_level)?;
                Ok(PayloadMap::new())
            }
        }
    }

    fn highlight(&mut self, selector: &str) -> Result<PayloadMap> {
        self.remove_overlay();
        self.snapshot = None;
        self.generation += 1;

        let mut nodes = BTreeMap::new();
        let mut badges = Vec::new();
        let mut result = PayloadMap::new();

        for frame in 0..self.dom.frame_count() {
            for node in self.dom.query_selector_all(frame, selector)? {
                let Some(info) = self.dom.element(node) else {
                    continue;
                };
                if !info.rect.is_visible() {
                    continue;
                }

                let index = nodes.len() + 1;
                nodes.insert(index, node);
                badges.push(Badge {
                    index,
                    left: info.rect.left,
                    top: info.rect.top,
                });
                result.insert(index.to_string(), format!("{index}: {}", info.label()));
            }
        }

        self.dom.insert_overlay(OVERLAY_CLASS, &badges)?;
        debug!(selector, matches = nodes.len(), generation = self.generation, "highlighted");

        self.snapshot = Some(Snapshot {
            generation: self.generation,
            nodes,
        });
        result.insert(SNAPSHOT_KEY.to_string(), self.generation.to_string());
        Ok(result)
    }

    fn remove_overlay(&mut self) {
        let removed = self.dom.remove_by_class(OVERLAY_CLASS);
        if removed > 0 {
            debug!(removed, "overlay removed");
        }
    }

    /// Look `index` up in the live snapshot. A stale token or an unknown
    /// index is a miss. `consume` drops the snapshot on a current token.
    fn resolve(&mut self, index: usize, token: Option<u64>, consume: bool) -> Option<NodeRef> {
        let current = self.snapshot.as_ref()?;
        if token.is_some_and(|t| t != current.generation) {
            debug!(index, ?token, current = current.generation, "stale highlight reference");
            return None;
        }

        let node = current.nodes.get(&index).copied();
        if consume {
            self.snapshot = None;
        }
        if node.is_none() {
            debug!(index, "highlight index out of range");
        }
        node
    }

    fn click(
        &mut self,
        index: usize,
        new_window: bool,
        token: Option<u64>,
        chrome: &ChromeLink,
    ) -> Result<PayloadMap> {
        self.remove_overlay();
        let Some(node) = self.resolve(index, token, true) else {
            return Ok(PayloadMap::new());
        };
        let Some(info) = self.dom.element(node) else {
            return Ok(PayloadMap::new());
        };

        match info.href {
            Some(uri) if new_window => chrome.send(ChromeRequest::OpenWindow { uri }),
            _ => {
                self.dom.click(node)?;
                self.dom.focus(node)?;
                if info.kind.takes_input() {
                    chrome.send(ChromeRequest::InsertMode);
                }
            }
        }
        Ok(PayloadMap::new())
    }

    fn yank(&mut self, index: usize, token: Option<u64>, chrome: &ChromeLink) -> Result<PayloadMap> {
        self.remove_overlay();
        let href = self
            .resolve(index, token, true)
            .and_then(|node| self.dom.element(node))
            .and_then(|info| info.href);

        if let Some(text) = href {
            chrome.send(ChromeRequest::SetClipboard { text });
        }
        Ok(PayloadMap::new())
    }

    fn form_fill(&mut self, fields: &PayloadMap) {
        for (selector, value) in fields {
            let nodes = match self.dom.query_selector_all(0, selector) {
                Ok(nodes) => nodes,
                Err(err) => {
                    warn!("form_fill skipped '{selector}': {err}");
                    continue;
                }
            };

            for node in nodes {
                let Some(info) = self.dom.element(node) else {
                    continue;
                };
                let outcome = if info.is_input_of_type("checkbox") {
                    self.dom.set_checked(node, value == "on")
                } else if info.value.as_deref().is_some_and(|v| !v.is_empty()) {
                    continue;
                } else {
                    self.dom.set_value(node, value)
                };
                if let Err(err) = outcome {
                    warn!("form_fill failed on '{selector}': {err}");
                }
            }
        }
    }

    fn serialise_form(&mut self, index: usize, token: Option<u64>) -> PayloadMap {
        let mut fields = PayloadMap::new();
        let Some(form) = self.resolve(index, token, false) else {
            return fields;
        };
        if self.dom.element(form).map(|info| info.kind) != Some(ElementKind::Form) {
            debug!(index, "serialise_form target is not a form");
            return fields;
        }

        for control in self.dom.form_controls(form) {
            let Some(info) = self.dom.element(control) else {
                continue;
            };
            let name = info.name.clone().unwrap_or_default();
            let selector = match info.kind {
                ElementKind::Select => format!("select[name=\"{name}\"]"),
                ElementKind::TextArea => format!("textarea[name=\"{name}\"]"),
                ElementKind::Input => match info.input_type.as_deref().unwrap_or("text") {
                    "submit" | "button" | "hidden" => continue,
                    ty => format!("input[type=\"{ty}\"]"),
                },
                _ => continue,
            };
            fields.insert(selector, info.value.unwrap_or_default());
        }
        fields
    }
}
