//! What the worker needs from a page's document

use crate::error::Result;

/// Opaque handle to an element, stable for the life of the document
pub type NodeRef = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Anchor,
    Input,
    Select,
    TextArea,
    Button,
    Form,
    Other,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "a" => Self::Anchor,
            "input" => Self::Input,
            "select" => Self::Select,
            "textarea" => Self::TextArea,
            "button" => Self::Button,
            "form" => Self::Form,
            _ => Self::Other,
        }
    }

    /// Clicking one of these hands the keyboard to the page
    pub fn takes_input(self) -> bool {
        matches!(self, Self::Input | Self::Select | Self::Button | Self::TextArea)
    }
}

/// Rendered box relative to the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.width != 0 || self.height != 0
    }
}

/// Snapshot of the element properties the handlers read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementInfo {
    pub kind: ElementKind,
    /// Lowercased `type` of an input, `text` when absent
    pub input_type: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub href: Option<String>,
    pub inner_text: String,
    pub rect: Rect,
    pub checked: bool,
}

impl ElementInfo {
    pub fn is_input_of_type(&self, ty: &str) -> bool {
        self.kind == ElementKind::Input && self.input_type.as_deref() == Some(ty)
    }

    /// Text shown next to a highlight index
    pub fn label(&self) -> String {
        let raw = match self.kind {
            ElementKind::Anchor => format!(
                "{} ({})",
                self.inner_text,
                self.href.as_deref().unwrap_or_default()
            ),
            ElementKind::Input
                if self.is_input_of_type("submit") || self.is_input_of_type("button") =>
            {
                self.value.clone().unwrap_or_default()
            }
            ElementKind::Input | ElementKind::Select | ElementKind::Form | ElementKind::TextArea => {
                self.name.clone().unwrap_or_default()
            }
            ElementKind::Button => self.value.clone().unwrap_or_default(),
            ElementKind::Other => self.inner_text.clone(),
        };

        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            "<unknown>".to_string()
        } else {
            collapsed
        }
    }
}

/// One numbered marker in an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub index: usize,
    pub left: i32,
    pub top: i32,
}

pub trait PageDom: Send {
    /// Documents in the page: 0 is the main frame, sub-frames follow in
    /// document order
    fn frame_count(&self) -> usize;

    /// Matches in document order
    fn query_selector_all(&self, frame: usize, selector: &str) -> Result<Vec<NodeRef>>;

    fn element(&self, node: NodeRef) -> Option<ElementInfo>;

    /// Controls owned by a form, in document order
    fn form_controls(&self, form: NodeRef) -> Vec<NodeRef>;

    /// Append one container of class `class` to the main document holding
    /// an absolutely positioned badge per entry
    fn insert_overlay(&mut self, class: &str, badges: &[Badge]) -> Result<NodeRef>;

    /// Remove every element of class `class`; returns how many went
    fn remove_by_class(&mut self, class: &str) -> usize;

    fn click(&mut self, node: NodeRef) -> Result<()>;

    fn focus(&mut self, node: NodeRef) -> Result<()>;

    fn set_value(&mut self, node: NodeRef, value: &str) -> Result<()>;

    fn set_checked(&mut self, node: NodeRef, checked: bool) -> Result<()>;

    /// Markup of the main document's root element
    fn outer_html(&self) -> String;
}
