//! In-memory document used by the headless front end and tests

use super::dom::{Badge, ElementInfo, ElementKind, NodeRef, PageDom, Rect};
use crate::error::{ErrorType, Result, RoamError};
use std::collections::BTreeMap;

/// Element description used when building a `MemoryDom`
#[derive(Debug, Clone)]
pub struct MemoryElement {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    rect: Rect,
}

impl MemoryElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            rect: Rect::new(0, 0, 100, 20),
        }
    }

    pub fn link(href: &str, text: &str) -> Self {
        Self::new("a").attr("href", href).text(text)
    }

    pub fn input(ty: &str, name: &str) -> Self {
        Self::new("input").attr("type", ty).attr("name", name)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn at(mut self, left: i32, top: i32) -> Self {
        self.rect.left = left;
        self.rect.top = top;
        self
    }

    /// Zero-sized, so never highlighted
    pub fn hidden(mut self) -> Self {
        self.rect.width = 0;
        self.rect.height = 0;
        self
    }
}

#[derive(Debug, Clone)]
struct MemoryNode {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    rect: Rect,
    checked: bool,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    attached: bool,
}

impl MemoryNode {
    fn from_element(element: MemoryElement, parent: Option<NodeRef>) -> Self {
        Self {
            checked: element.attrs.contains_key("checked"),
            tag: element.tag,
            attrs: element.attrs,
            text: element.text,
            rect: element.rect,
            parent,
            children: Vec::new(),
            attached: true,
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }
}

/// A page made of plain nodes: one `<html>` root per frame
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<MemoryNode>,
    roots: Vec<NodeRef>,
    clicks: Vec<NodeRef>,
    focused: Option<NodeRef>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            clicks: Vec::new(),
            focused: None,
        };
        dom.add_frame();
        dom
    }

    /// Add a sub-frame document; returns its index
    pub fn add_frame(&mut self) -> usize {
        let root = self.push(MemoryElement::new("html"), None);
        self.roots.push(root);
        self.roots.len() - 1
    }

    pub fn root(&self, frame: usize) -> Option<NodeRef> {
        self.roots.get(frame).copied()
    }

    /// Append under the root of `frame`
    pub fn append_to_frame(&mut self, frame: usize, element: MemoryElement) -> Result<NodeRef> {
        let root = self.root(frame).ok_or_else(|| {
            RoamError::new(ErrorType::Internal, "NO_SUCH_FRAME", format!("no frame {frame}"))
        })?;
        self.append(root, element)
    }

    pub fn append(&mut self, parent: NodeRef, element: MemoryElement) -> Result<NodeRef> {
        self.live(parent)?;
        let node = self.push(element, Some(parent));
        self.nodes[parent].children.push(node);
        Ok(node)
    }

    pub fn attr(&self, node: NodeRef, name: &str) -> Option<&str> {
        self.nodes.get(node)?.attrs.get(name).map(String::as_str)
    }

    pub fn is_checked(&self, node: NodeRef) -> bool {
        self.nodes.get(node).is_some_and(|n| n.checked)
    }

    pub fn is_attached(&self, node: NodeRef) -> bool {
        self.nodes.get(node).is_some_and(|n| n.attached)
    }

    /// Nodes clicked so far, oldest first
    pub fn clicks(&self) -> &[NodeRef] {
        &self.clicks
    }

    pub fn focused(&self) -> Option<NodeRef> {
        self.focused
    }

    fn push(&mut self, element: MemoryElement, parent: Option<NodeRef>) -> NodeRef {
        self.nodes.push(MemoryNode::from_element(element, parent));
        self.nodes.len() - 1
    }

    fn live(&self, node: NodeRef) -> Result<&MemoryNode> {
        match self.nodes.get(node) {
            Some(n) if n.attached => Ok(n),
            _ => Err(RoamError::new(
                ErrorType::Execution,
                "DETACHED_NODE",
                format!("node {node} is not in the document"),
            )),
        }
    }

    fn document_order(&self, root: NodeRef) -> Vec<NodeRef> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !self.nodes[node].attached {
                continue;
            }
            order.push(node);
            stack.extend(self.nodes[node].children.iter().rev());
        }
        order
    }

    fn inner_text(&self, node: NodeRef) -> String {
        self.document_order(node)
            .into_iter()
            .map(|n| self.nodes[n].text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn matches(&self, steps: &[Step], node: NodeRef) -> bool {
        let Some((last, rest)) = steps.split_last() else {
            return true;
        };
        if !last.compound.matches(&self.nodes[node]) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }
        let mut ancestor = self.nodes[node].parent;
        match last.combinator {
            Combinator::Child => ancestor.is_some_and(|parent| self.matches(rest, parent)),
            Combinator::Descendant => {
                while let Some(current) = ancestor {
                    if self.matches(rest, current) {
                        return true;
                    }
                    ancestor = self.nodes[current].parent;
                }
                false
            }
        }
    }

    fn write_html(&self, node: NodeRef, out: &mut String) {
        let n = &self.nodes[node];
        out.push('<');
        out.push_str(&n.tag);
        for (name, value) in &n.attrs {
            out.push_str(&format!(" {name}=\"{}\"", escape(value)));
        }
        out.push('>');
        if n.tag == "input" {
            return;
        }
        out.push_str(&escape(&n.text));
        for &child in &n.children {
            if self.nodes[child].attached {
                self.write_html(child, out);
            }
        }
        out.push_str(&format!("</{}>", n.tag));
    }
}

impl PageDom for MemoryDom {
    fn frame_count(&self) -> usize {
        self.roots.len()
    }

    fn query_selector_all(&self, frame: usize, selector: &str) -> Result<Vec<NodeRef>> {
        let groups = parse_selector(selector)?;
        let Some(root) = self.root(frame) else {
            return Ok(Vec::new());
        };
        Ok(self
            .document_order(root)
            .into_iter()
            .filter(|&node| groups.iter().any(|steps| self.matches(steps, node)))
            .collect())
    }

    fn element(&self, node: NodeRef) -> Option<ElementInfo> {
        let n = self.nodes.get(node).filter(|n| n.attached)?;
        let kind = ElementKind::from_tag(&n.tag);
        let input_type = (kind == ElementKind::Input).then(|| {
            n.attrs
                .get("type")
                .map_or_else(|| "text".to_string(), |t| t.to_ascii_lowercase())
        });
        let value = match kind {
            ElementKind::TextArea => Some(n.attrs.get("value").cloned().unwrap_or_else(|| n.text.clone())),
            _ => n.attrs.get("value").cloned(),
        };

        Some(ElementInfo {
            kind,
            input_type,
            name: n.attrs.get("name").cloned(),
            value,
            href: n.attrs.get("href").cloned(),
            inner_text: self.inner_text(node),
            rect: n.rect,
            checked: n.checked,
        })
    }

    fn form_controls(&self, form: NodeRef) -> Vec<NodeRef> {
        if !self.is_attached(form) {
            return Vec::new();
        }
        self.document_order(form)
            .into_iter()
            .skip(1)
            .filter(|&node| {
                matches!(
                    ElementKind::from_tag(&self.nodes[node].tag),
                    ElementKind::Input | ElementKind::Select | ElementKind::TextArea | ElementKind::Button
                )
            })
            .collect()
    }

    fn insert_overlay(&mut self, class: &str, badges: &[Badge]) -> Result<NodeRef> {
        let root = self.root(0).ok_or_else(|| {
            RoamError::new(ErrorType::Internal, "NO_DOCUMENT", "page has no main frame")
        })?;
        let overlay = self.append(root, MemoryElement::new("div").attr("class", class).hidden())?;
        for badge in badges {
            let style = format!(
                "position: absolute; left: {}px; top: {}px; z-index: 100000;",
                badge.left, badge.top
            );
            self.append(
                overlay,
                MemoryElement::new("span")
                    .attr("style", &style)
                    .text(&badge.index.to_string())
                    .at(badge.left, badge.top),
            )?;
        }
        Ok(overlay)
    }

    fn remove_by_class(&mut self, class: &str) -> usize {
        let doomed: Vec<NodeRef> = self
            .roots
            .iter()
            .flat_map(|&root| self.document_order(root))
            .filter(|&node| self.nodes[node].has_class(class))
            .collect();

        for &node in &doomed {
            if let Some(parent) = self.nodes[node].parent {
                self.nodes[parent].children.retain(|&child| child != node);
            }
            self.nodes[node].attached = false;
        }
        doomed.len()
    }

    fn click(&mut self, node: NodeRef) -> Result<()> {
        self.live(node)?;
        self.clicks.push(node);
        let n = &mut self.nodes[node];
        if n.tag == "input" && n.attrs.get("type").is_some_and(|t| t.eq_ignore_ascii_case("checkbox")) {
            n.checked = !n.checked;
        }
        Ok(())
    }

    fn focus(&mut self, node: NodeRef) -> Result<()> {
        self.live(node)?;
        self.focused = Some(node);
        Ok(())
    }

    fn set_value(&mut self, node: NodeRef, value: &str) -> Result<()> {
        self.live(node)?;
        self.nodes[node].attrs.insert("value".to_string(), value.to_string());
        Ok(())
    }

    fn set_checked(&mut self, node: NodeRef, checked: bool) -> Result<()> {
        self.live(node)?;
        self.nodes[node].checked = checked;
        Ok(())
    }

    fn outer_html(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root(0) {
            self.write_html(root, &mut out);
        }
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// `tag.class#id[attr=value]:not(...)`
#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    ids: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    excluded: Vec<Compound>,
}

impl Compound {
    fn matches(&self, node: &MemoryNode) -> bool {
        self.tag.as_ref().map_or(true, |tag| *tag == node.tag)
            && self.classes.iter().all(|class| node.has_class(class))
            && self.ids.iter().all(|id| node.attrs.get("id") == Some(id))
            && self.attrs.iter().all(|(name, expected)| match (node.attrs.get(name), expected) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            })
            && !self.excluded.iter().any(|excluded| excluded.matches(node))
    }
}

#[derive(Debug, Clone)]
struct Step {
    /// Relation to the step before it
    combinator: Combinator,
    compound: Compound,
}

fn invalid(selector: &str, why: &str) -> RoamError {
    RoamError::new(
        ErrorType::Parse,
        "INVALID_SELECTOR",
        format!("invalid selector '{selector}': {why}"),
    )
}

/// Comma separated groups of compounds joined by descendant or `>`
fn parse_selector(selector: &str) -> Result<Vec<Vec<Step>>> {
    let mut groups = Vec::new();
    for group in split_outside_brackets(selector, |c| c == ',') {
        let mut steps = Vec::new();
        let mut combinator = Combinator::Descendant;
        let mut pending_child = false;

        for token in tokenize(&group) {
            if token == ">" {
                if steps.is_empty() || pending_child {
                    return Err(invalid(selector, "misplaced '>'"));
                }
                pending_child = true;
                combinator = Combinator::Child;
                continue;
            }
            steps.push(Step {
                combinator,
                compound: parse_compound(&token).map_err(|why| invalid(selector, &why))?,
            });
            combinator = Combinator::Descendant;
            pending_child = false;
        }

        if steps.is_empty() || pending_child {
            return Err(invalid(selector, "empty selector"));
        }
        groups.push(steps);
    }
    Ok(groups)
}

fn split_outside_brackets(input: &str, is_separator: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in input.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && is_separator(c) {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn tokenize(group: &str) -> Vec<String> {
    split_outside_brackets(&group.replace('>', " > "), char::is_whitespace)
        .into_iter()
        .filter(|token| !token.is_empty())
        .collect()
}

fn parse_compound(token: &str) -> std::result::Result<Compound, String> {
    let chars: Vec<char> = token.chars().collect();
    let mut compound = Compound::default();
    let mut i = 0;

    let is_ident = |c: char| c.is_alphanumeric() || c == '-' || c == '_';
    let read_ident = |i: &mut usize| {
        let start = *i;
        while *i < chars.len() && is_ident(chars[*i]) {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>()
    };

    if chars.first() == Some(&'*') {
        i = 1;
    } else {
        let tag = read_ident(&mut i);
        if !tag.is_empty() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
    }

    while i < chars.len() {
        let marker = chars[i];
        i += 1;
        match marker {
            '.' | '#' => {
                let ident = read_ident(&mut i);
                if ident.is_empty() {
                    return Err(format!("expected a name after '{marker}'"));
                }
                if marker == '.' {
                    compound.classes.push(ident);
                } else {
                    compound.ids.push(ident);
                }
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .ok_or_else(|| "unterminated '['".to_string())?;
                let inner: String = chars[i..i + close].iter().collect();
                i += close + 1;

                let (name, value) = match inner.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim();
                        let unquoted = value
                            .strip_prefix('"')
                            .and_then(|v| v.strip_suffix('"'))
                            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                            .unwrap_or(value);
                        (name.trim(), Some(unquoted.to_string()))
                    }
                    None => (inner.trim(), None),
                };
                if name.is_empty() || !name.chars().all(is_ident) {
                    return Err(format!("bad attribute name '{name}'"));
                }
                compound.attrs.push((name.to_ascii_lowercase(), value));
            }
            ':' => {
                let rest: String = chars[i..].iter().collect();
                let inner = rest
                    .strip_prefix("not(")
                    .ok_or_else(|| "only ':not(...)' is supported".to_string())?;
                let close = inner
                    .find(')')
                    .ok_or_else(|| "unterminated ':not('".to_string())?;
                if inner[..close].trim().is_empty() {
                    return Err("empty ':not()'".to_string());
                }
                compound.excluded.push(parse_compound(&inner[..close])?);
                i += "not(".chars().count() + inner[..close].chars().count() + 1;
            }
            other => return Err(format!("unexpected '{other}'")),
        }
    }

    Ok(compound)
}
