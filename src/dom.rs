//! A small element tree with block-flow layout, standing in for the outliner's DOM.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::HintError;
use crate::models::{DomRect, ElementId};
use crate::observer::{ElementTree, Layout, MutationRecord};
use crate::selector::{Matchable, Selector};

const TEXT_TAG: &str = "#text";
const INDENT: i32 = 2;
const INLINE_TAGS: &[&str] = &["a", "span", "b", "i", "em", "strong", "code"];

/// Serialized form of a node: elements carry a `tag`, text nodes only `text`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NodeSpec {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn element(tag: &str) -> Self {
        Self { tag: Some(tag.to_string()), ..Self::default() }
    }

    pub fn text(text: &str) -> Self {
        Self { text: text.to_string(), ..Self::default() }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// On-disk document: the initial tree plus the pages links can navigate to.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentSpec {
    pub root: NodeSpec,
    #[serde(default)]
    pub pages: BTreeMap<String, Vec<NodeSpec>>,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<ElementId>,
    pub parent: Option<ElementId>,
    pub collapsed: bool,
    freed: bool,
}

impl Node {
    fn vacant() -> Self {
        Self {
            tag: String::new(),
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            collapsed: false,
            freed: true,
        }
    }

    pub fn is_text(&self) -> bool {
        self.tag == TEXT_TAG
    }

    pub fn is_inline(&self) -> bool {
        self.is_text() || INLINE_TAGS.contains(&self.tag.as_str())
    }
}

impl Matchable for Node {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A run of text on a laid-out row, owned by a text node or an inline element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineSpan {
    pub element: ElementId,
    pub x: i32,
    pub text: String,
}

/// One rendered row: the inline content of a single block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutLine {
    pub block: ElementId,
    pub top: i32,
    pub indent: i32,
    pub spans: Vec<LineSpan>,
    pub collapsed: bool,
    pub has_block_children: bool,
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    /// Slots of collected nodes, reused by `build`.
    free: Vec<ElementId>,
    /// Roots of subtrees removed since the last collection.
    removed: Vec<ElementId>,
    root: ElementId,
    pages: BTreeMap<String, Vec<NodeSpec>>,
    width: i32,
    height: i32,
    scroll_top: i32,
    mutations: Vec<MutationRecord>,
    rects: HashMap<ElementId, DomRect>,
    lines: Vec<LayoutLine>,
}

impl Document {
    pub fn new(spec: DocumentSpec) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            removed: Vec::new(),
            root: ElementId(0),
            pages: spec.pages,
            width: 80,
            height: 24,
            scroll_top: 0,
            mutations: Vec::new(),
            rects: HashMap::new(),
            lines: Vec::new(),
        };
        doc.root = doc.build(&spec.root);
        doc.relayout();
        doc
    }

    pub fn from_json(json: &str) -> Result<Self, HintError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load(path: &Path) -> Result<Self, HintError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn node(&self, id: ElementId) -> Option<&Node> {
        self.nodes.get(id.0).filter(|n| !n.freed)
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.node(id).and_then(|n| n.attribute(name))
    }

    pub fn page(&self, name: &str) -> Option<&[NodeSpec]> {
        self.pages.get(name).map(Vec::as_slice)
    }

    /// Concatenated text of an element and its descendants.
    pub fn text_content(&self, id: ElementId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: ElementId, out: &mut String) {
        let Some(node) = self.node(id) else { return };
        out.push_str(&node.text);
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }

    pub fn is_attached(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(el) = current {
            if el == self.root {
                return true;
            }
            current = self.node(el).and_then(|n| n.parent);
        }
        false
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<ElementId> {
        self.find_attached(|n| n.attribute("id") == Some(id))
    }

    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<ElementId> {
        self.find_attached(|n| n.attribute(name) == Some(value))
    }

    fn find_attached(&self, pred: impl Fn(&Node) -> bool) -> Option<ElementId> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if !node.is_text() && pred(node) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Builds a detached subtree from `spec`.
    #[cfg(test)]
    pub fn create(&mut self, spec: &NodeSpec) -> ElementId {
        self.build(spec)
    }

    fn build(&mut self, spec: &NodeSpec) -> ElementId {
        let node = Node {
            tag: spec.tag.clone().unwrap_or_else(|| TEXT_TAG.to_string()),
            attributes: spec.attrs.clone(),
            text: spec.text.clone(),
            children: Vec::new(),
            parent: None,
            collapsed: false,
            freed: false,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                ElementId(self.nodes.len() - 1)
            }
        };
        for child_spec in &spec.children {
            let child = self.build(child_spec);
            self.nodes[child.0].parent = Some(id);
            self.nodes[id.0].children.push(child);
        }
        id
    }

    #[cfg(test)]
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.mutations.push(MutationRecord { added: vec![child], removed: vec![] });
        self.relayout();
    }

    #[cfg(test)]
    pub fn remove_child(&mut self, parent: ElementId, child: ElementId) {
        if self.nodes[child.0].parent != Some(parent) {
            return;
        }
        self.detach(child);
        self.removed.push(child);
        self.mutations.push(MutationRecord { added: vec![], removed: vec![child] });
        self.relayout();
    }

    /// Swaps every child of `parent` for freshly built `specs`, as one mutation.
    pub fn replace_children(&mut self, parent: ElementId, specs: &[NodeSpec]) -> Vec<ElementId> {
        let removed = std::mem::take(&mut self.nodes[parent.0].children);
        for &old in &removed {
            self.nodes[old.0].parent = None;
        }
        self.removed.extend_from_slice(&removed);
        let added: Vec<ElementId> = specs.iter().map(|s| self.build(s)).collect();
        for &new in &added {
            self.nodes[new.0].parent = Some(parent);
        }
        self.nodes[parent.0].children = added.clone();
        self.mutations.push(MutationRecord { added: added.clone(), removed });
        self.relayout();
        added
    }

    #[cfg(test)]
    fn detach(&mut self, child: ElementId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|&c| c != child);
        }
    }

    /// Drains the `childList` records produced since the last call.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Frees removed subtrees that were not re-inserted and returns how many nodes went.
    ///
    /// Ids inside a freed subtree stop resolving and their slots are handed to new nodes, so
    /// this must run only after every record naming them has been delivered. Nothing is
    /// freed while records are still pending.
    pub fn collect_garbage(&mut self) -> usize {
        if !self.mutations.is_empty() {
            return 0;
        }
        let mut freed = 0;
        for root in std::mem::take(&mut self.removed) {
            let node = &self.nodes[root.0];
            if node.freed || node.parent.is_some() || root == self.root {
                continue;
            }
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                let node = std::mem::replace(&mut self.nodes[id.0], Node::vacant());
                stack.extend(node.children);
                self.free.push(id);
                freed += 1;
            }
        }
        freed
    }

    /// Number of arena slots, collected ones included.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_collapsed(&mut self, block: ElementId, collapsed: bool) {
        if let Some(node) = self.nodes.get_mut(block.0) {
            node.collapsed = collapsed;
            self.relayout();
        }
    }

    pub fn is_collapsed(&self, block: ElementId) -> bool {
        self.node(block).is_some_and(|n| n.collapsed)
    }

    /// Appends to (or, for `None`, trims the last character of) a block's trailing text.
    pub fn edit_text(&mut self, block: ElementId, ch: Option<char>) {
        let text_node = self.nodes[block.0]
            .children
            .iter()
            .rev()
            .copied()
            .find(|c| self.nodes[c.0].is_text());
        let text_node = match text_node {
            Some(id) => id,
            None => {
                let id = self.build(&NodeSpec::text(""));
                self.nodes[id.0].parent = Some(block);
                self.nodes[block.0].children.push(id);
                id
            }
        };
        match ch {
            Some(ch) => self.nodes[text_node.0].text.push(ch),
            None => {
                self.nodes[text_node.0].text.pop();
            }
        }
        self.relayout();
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.scroll_by(0);
        self.relayout();
    }

    pub fn scroll_top(&self) -> i32 {
        self.scroll_top
    }

    pub fn content_height(&self) -> i32 {
        self.lines.last().map_or(0, |l| l.top + 1)
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let max = (self.content_height() - self.height).max(0);
        self.scroll_top = (self.scroll_top + delta).clamp(0, max);
    }

    /// Scrolls just enough to bring `element` inside the viewport.
    pub fn scroll_into_view(&mut self, element: ElementId) {
        let Some(rect) = self.rects.get(&element).copied() else { return };
        if rect.top < self.scroll_top {
            self.scroll_by(rect.top - self.scroll_top);
        } else if rect.top >= self.scroll_top + self.height {
            self.scroll_by(rect.top - self.scroll_top - self.height + 1);
        }
    }

    pub fn lines(&self) -> &[LayoutLine] {
        &self.lines
    }

    /// Recomputes row/column placement for every rendered element.
    fn relayout(&mut self) {
        self.rects.clear();
        self.lines.clear();
        let mut row = 0;
        self.layout_block(self.root, 0, &mut row);
    }

    fn layout_block(&mut self, id: ElementId, depth: i32, row: &mut i32) {
        let start = *row;
        let x = depth * INDENT;
        let children = self.nodes[id.0].children.clone();
        let has_inline = children.iter().any(|c| self.nodes[c.0].is_inline());
        let has_block_children = children.iter().any(|c| !self.nodes[c.0].is_inline());
        let collapsed = self.nodes[id.0].collapsed;

        let mut child_depth = depth;
        if has_inline || !self.nodes[id.0].text.is_empty() {
            let mut spans = Vec::new();
            let mut cursor = x;
            if !self.nodes[id.0].text.is_empty() {
                let text = self.nodes[id.0].text.clone();
                cursor += text.chars().count() as i32;
                spans.push(LineSpan { element: id, x, text });
            }
            let inline: Vec<ElementId> = children.iter().copied().filter(|c| self.nodes[c.0].is_inline()).collect();
            for child in inline {
                self.layout_inline(child, *row, &mut cursor, &mut spans);
            }
            self.lines.push(LayoutLine {
                block: id,
                top: *row,
                indent: x,
                spans,
                collapsed,
                has_block_children,
            });
            *row += 1;
            child_depth += 1;
        }

        if !collapsed {
            let blocks: Vec<ElementId> = children.iter().copied().filter(|c| !self.nodes[c.0].is_inline()).collect();
            for child in blocks {
                self.layout_block(child, child_depth, row);
            }
        }

        if *row > start {
            self.rects.insert(id, DomRect::new(x, start, (self.width - x).max(1), *row - start));
        }
    }

    fn layout_inline(&mut self, id: ElementId, row: i32, cursor: &mut i32, spans: &mut Vec<LineSpan>) {
        let start = *cursor;
        let text = self.nodes[id.0].text.clone();
        if !text.is_empty() {
            *cursor += text.chars().count() as i32;
            spans.push(LineSpan { element: id, x: start, text });
        }
        for child in self.nodes[id.0].children.clone() {
            self.layout_inline(child, row, cursor, spans);
        }
        if *cursor > start {
            self.rects.insert(id, DomRect::new(start, row, *cursor - start, 1));
        }
    }

    fn descendants(&self, root: ElementId, out: &mut Vec<ElementId>) {
        let Some(node) = self.node(root) else { return };
        for &child in &node.children {
            out.push(child);
            self.descendants(child, out);
        }
    }
}

impl ElementTree for Document {
    fn query_selector_all(&self, root: ElementId, selector: &Selector) -> Vec<ElementId> {
        let mut all = Vec::new();
        self.descendants(root, &mut all);
        all.retain(|&id| self.matches(id, selector));
        all
    }

    fn matches(&self, element: ElementId, selector: &Selector) -> bool {
        self.node(element).is_some_and(|n| !n.is_text() && selector.matches(n))
    }

    fn has_child_nodes(&self, element: ElementId) -> bool {
        self.node(element).is_some_and(|n| !n.children.is_empty())
    }
}

impl Layout for Document {
    fn viewport(&self) -> DomRect {
        DomRect::new(0, 0, self.width, self.height)
    }

    fn bounding_client_rect(&self, element: ElementId) -> Option<DomRect> {
        if !self.is_attached(element) {
            return None;
        }
        self.rects.get(&element).map(|r| r.translate(0, -self.scroll_top))
    }
}

/// A document used by tests across modules.
#[cfg(test)]
pub(crate) fn test_document(blocks: usize) -> Document {
    let mut main = NodeSpec::element("div").attr("id", "main-content");
    for i in 0..blocks {
        main = main.child(
            NodeSpec::element("div")
                .attr("class", "ls-block")
                .attr("blockid", &format!("b{i}"))
                .child(NodeSpec::text(&format!("block {i} ")))
                .child(
                    NodeSpec::element("a")
                        .attr("class", "page-ref")
                        .attr("data-ref", &format!("page{i}"))
                        .child(NodeSpec::text(&format!("page{i}"))),
                ),
        );
    }
    let root = NodeSpec::element("div").attr("id", "app-container").child(main);
    let mut doc = Document::new(DocumentSpec { root, pages: BTreeMap::new() });
    doc.resize(40, 3);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lays_out_inline_links_on_their_block_row() {
        let doc = test_document(2);
        let links = doc.query_selector_all(doc.root(), &Selector::parse("a.page-ref").unwrap());
        assert_eq!(links.len(), 2);
        // "block 0 " is eight cells, children of main-content sit at depth 0
        assert_eq!(doc.bounding_client_rect(links[0]), Some(DomRect::new(8, 0, 5, 1)));
        assert_eq!(doc.bounding_client_rect(links[1]), Some(DomRect::new(8, 1, 5, 1)));
    }

    #[test]
    fn scrolling_moves_client_rects() {
        let mut doc = test_document(6);
        let block = doc.find_by_attribute("blockid", "b4").unwrap();
        assert_eq!(doc.bounding_client_rect(block).map(|r| r.top), Some(4));
        doc.scroll_by(2);
        assert_eq!(doc.bounding_client_rect(block).map(|r| r.top), Some(2));
        doc.scroll_by(100);
        assert_eq!(doc.scroll_top(), 3);
    }

    #[test]
    fn removed_subtree_stays_queryable_but_has_no_layout() {
        let mut doc = test_document(2);
        let main = doc.get_element_by_id("main-content").unwrap();
        let block = doc.find_by_attribute("blockid", "b1").unwrap();
        doc.remove_child(main, block);

        let records = doc.take_mutations();
        assert_eq!(records, vec![MutationRecord { added: vec![], removed: vec![block] }]);

        let sel = Selector::parse(".page-ref").unwrap();
        assert_eq!(doc.query_selector_all(block, &sel).len(), 1);
        assert_eq!(doc.bounding_client_rect(block), None);
    }

    #[test]
    fn replaced_subtrees_are_reclaimed_once_delivered() {
        let mut doc = test_document(2);
        let main = doc.get_element_by_id("main-content").unwrap();
        let page = [NodeSpec::element("div").attr("class", "ls-block").child(NodeSpec::text("x"))];

        let old = doc.find_by_attribute("blockid", "b0").unwrap();
        doc.replace_children(main, &page);
        // the record still names the old blocks
        assert_eq!(doc.collect_garbage(), 0);
        assert!(doc.node(old).is_some());

        doc.take_mutations();
        assert_eq!(doc.collect_garbage(), 8);
        assert!(doc.node(old).is_none());
        assert!(doc.query_selector_all(old, &Selector::parse("a").unwrap()).is_empty());

        let settled = doc.arena_len();
        for _ in 0..50 {
            doc.replace_children(main, &page);
            doc.take_mutations();
            doc.collect_garbage();
        }
        assert_eq!(doc.arena_len(), settled);
    }

    #[test]
    fn reinserted_nodes_survive_collection() {
        let mut doc = test_document(2);
        let main = doc.get_element_by_id("main-content").unwrap();
        let block = doc.find_by_attribute("blockid", "b1").unwrap();
        doc.remove_child(main, block);
        doc.append_child(main, block);
        doc.take_mutations();

        assert_eq!(doc.collect_garbage(), 0);
        assert_eq!(doc.text_content(block), "block 1 page1");
        assert!(doc.bounding_client_rect(block).is_some());
    }

    #[test]
    fn collapsed_children_are_not_rendered() {
        let spec = NodeSpec::element("div")
            .attr("class", "ls-block")
            .child(NodeSpec::text("parent"))
            .child(NodeSpec::element("div").attr("class", "ls-block").child(NodeSpec::text("child")));
        let mut doc = Document::new(DocumentSpec { root: spec, pages: BTreeMap::new() });
        let child = doc.node(doc.root()).unwrap().children[1];
        assert_eq!(doc.bounding_client_rect(child).map(|r| r.left), Some(INDENT));

        doc.set_collapsed(doc.root(), true);
        assert_eq!(doc.bounding_client_rect(child), None);
        assert_eq!(doc.lines().len(), 1);
        assert!(doc.lines()[0].collapsed);
    }

    #[test]
    fn parses_json_documents() {
        let doc = Document::from_json(
            r#"{
                "root": { "tag": "div", "attrs": { "id": "app-container" },
                          "children": [ { "text": "hello" } ] },
                "pages": { "Rust": [ { "tag": "div", "attrs": { "class": "ls-block" } } ] }
            }"#,
        )
        .unwrap();
        assert_eq!(doc.get_element_by_id("app-container"), Some(doc.root()));
        assert_eq!(doc.text_content(doc.root()), "hello");
        assert_eq!(doc.page("Rust").map(|p| p.len()), Some(1));
    }
}
