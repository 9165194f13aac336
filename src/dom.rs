use std::collections::BTreeMap;
use std::fmt;

use crate::html::is_void_tag;
use crate::{Error, Result};

const RED_ZONE: usize = 32 * 1024;
const STACK_CHUNK: usize = 1024 * 1024;

/// Handle to a node in a [`Document`](crate::Document): an arena slot plus
/// the generation of that slot. Removing a node frees its slot for reuse and
/// bumps the generation, so a handle to a removed node stops resolving
/// instead of aliasing whatever is stored there next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize, pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}.{}", self.0, self.1)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) disabled: bool,
    pub(crate) readonly: bool,
    pub(crate) required: bool,
}

impl Element {
    fn new(tag_name: String, attrs: BTreeMap<String, String>) -> Self {
        let value = attrs.get("value").cloned().unwrap_or_default();
        let checked = attrs.contains_key("checked");
        let disabled = attrs.contains_key("disabled");
        let readonly = attrs.contains_key("readonly");
        let required = attrs.contains_key("required");
        Self {
            tag_name,
            attrs,
            value,
            checked,
            disabled,
            readonly,
            required,
        }
    }
}

/// Flag-style element state mirrored by a content attribute of the same
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    Checked,
    Disabled,
    ReadOnly,
    Required,
}

impl Flag {
    fn attr_name(self) -> &'static str {
        match self {
            Self::Checked => "checked",
            Self::Disabled => "disabled",
            Self::ReadOnly => "readonly",
            Self::Required => "required",
        }
    }

    fn field(self, element: &mut Element) -> &mut bool {
        match self {
            Self::Checked => &mut element.checked,
            Self::Disabled => &mut element.disabled,
            Self::ReadOnly => &mut element.readonly,
            Self::Required => &mut element.required,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    nodes: Vec<Node>,
    pub(crate) root: NodeId,
    /// Slots of removed nodes, reused by `create_node`.
    free: Vec<usize>,
    mutations: u64,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            generation: 0,
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0, 0),
            free: Vec::new(),
            mutations: 0,
        }
    }

    /// Number of tree or element-state changes applied so far. Writes that
    /// leave the tree unchanged are not counted.
    pub(crate) fn mutation_count(&self) -> u64 {
        self.mutations
    }

    fn touch(&mut self) {
        self.mutations += 1;
    }

    /// Number of allocated arena slots, live or free.
    pub(crate) fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes
            .get(node_id.0)
            .filter(|node| node.generation == node_id.1)
    }

    fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes
            .get_mut(node_id.0)
            .filter(|node| node.generation == node_id.1)
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let node = Node {
            generation: 0,
            parent,
            children: Vec::new(),
            node_type,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let generation = self.nodes[index].generation;
                self.nodes[index] = Node { generation, ..node };
                NodeId(index, generation)
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1, 0)
            }
        };
        if let Some(parent) = parent.and_then(|parent| self.node_mut(parent)) {
            parent.children.push(id);
        }
        id
    }

    /// Frees every slot of the subtree rooted at `node_id`. The caller has
    /// already unlinked it from its parent.
    fn release_subtree(&mut self, node_id: NodeId) {
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node_mut(id) else {
                continue;
            };
            stack.append(&mut node.children);
            node.parent = None;
            node.node_type = NodeType::Text(String::new());
            node.generation = node.generation.wrapping_add(1);
            self.free.push(id.0);
        }
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        self.create_node(
            Some(parent),
            NodeType::Element(Element::new(tag_name, attrs)),
        )
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.node(node_id)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.node_mut(node_id)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn require_element(&self, node_id: NodeId, op: &str) -> Result<&Element> {
        self.element(node_id)
            .ok_or_else(|| Error::InvalidTree(format!("{op} target is not an element")))
    }

    fn require_element_mut(&mut self, node_id: NodeId, op: &str) -> Result<&mut Element> {
        self.element_mut(node_id)
            .ok_or_else(|| Error::InvalidTree(format!("{op} target is not an element")))
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.node(node_id).and_then(|node| node.parent)
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.node(node_id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn element_children(&self, node_id: NodeId) -> Vec<NodeId> {
        self.children(node_id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    pub(crate) fn is_connected(&self, node_id: NodeId) -> bool {
        let mut cursor = Some(node_id);
        while let Some(node) = cursor {
            if node == self.root {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    pub(crate) fn is_valid_node(&self, node_id: NodeId) -> bool {
        self.node(node_id).is_some()
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node_id, &mut out);
        out
    }

    fn collect_text(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        match &node.node_type {
            NodeType::Document | NodeType::Element(_) => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
            NodeType::Text(text) => out.push_str(text),
        }
    }

    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.require_element(node_id, "textContent")?;
        self.release_children(node_id);
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
        self.touch();
        Ok(())
    }

    fn release_children(&mut self, node_id: NodeId) {
        let old_children = self
            .node_mut(node_id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in old_children {
            self.release_subtree(child);
        }
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> Result<String> {
        self.require_element(node_id, "innerHTML")?;
        let mut out = String::new();
        for child in self.children(node_id) {
            self.write_node(*child, &mut out);
        }
        Ok(out)
    }

    /// Replaces the children of `node_id` with copies of the top-level
    /// nodes of `fragment`.
    pub(crate) fn replace_children_from(&mut self, node_id: NodeId, fragment: &Dom) -> Result<()> {
        self.require_element(node_id, "innerHTML")?;
        self.release_children(node_id);
        for child in fragment.children(fragment.root) {
            self.clone_subtree_from_dom(fragment, *child, Some(node_id))?;
        }
        self.touch();
        Ok(())
    }

    /// Deep-copies `node_id` into a new detached subtree.
    pub(crate) fn clone_subtree(&mut self, node_id: NodeId) -> Result<NodeId> {
        let node_type = match self.node(node_id).map(|node| &node.node_type) {
            None => return Err(Error::InvalidTree(format!("unknown node: {node_id}"))),
            Some(NodeType::Document) => {
                return Err(Error::InvalidTree("cannot clone the document node".into()));
            }
            Some(node_type) => node_type.clone(),
        };
        let copy = self.create_node(None, node_type);
        let mut pending = vec![(node_id, copy)];
        while let Some((source, target)) = pending.pop() {
            let children = self.children(source).to_vec();
            for child in children {
                let Some(node_type) = self.node(child).map(|node| node.node_type.clone()) else {
                    continue;
                };
                let child_copy = self.create_node(Some(target), node_type);
                pending.push((child, child_copy));
            }
        }
        Ok(copy)
    }

    fn clone_subtree_from_dom(
        &mut self,
        source: &Dom,
        source_node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        stacker::maybe_grow(RED_ZONE, STACK_CHUNK, || {
            let Some(source_entry) = source.node(source_node) else {
                return Err(Error::InvalidTree(format!("unknown node: {source_node}")));
            };
            let node_type = match &source_entry.node_type {
                NodeType::Document => {
                    return Err(Error::InvalidTree("cannot clone the document node".into()));
                }
                NodeType::Element(element) => NodeType::Element(element.clone()),
                NodeType::Text(text) => NodeType::Text(text.clone()),
            };

            let node = self.create_node(parent, node_type);
            for child in &source_entry.children {
                self.clone_subtree_from_dom(source, *child, Some(node))?;
            }
            Ok(node)
        })
    }

    pub(crate) fn value(&self, node_id: NodeId) -> Result<String> {
        Ok(self.require_element(node_id, "value")?.value.clone())
    }

    pub(crate) fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self
            .tag_name(node_id)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("select"))
        {
            return self.set_select_value(node_id, value);
        }
        let element = self.require_element_mut(node_id, "value")?;
        if element.value != value {
            element.value = value.to_string();
            self.touch();
        }
        Ok(())
    }

    pub(crate) fn flag(&self, node_id: NodeId, flag: Flag) -> Result<bool> {
        let element = self.require_element(node_id, flag.attr_name())?;
        Ok(match flag {
            Flag::Checked => element.checked,
            Flag::Disabled => element.disabled,
            Flag::ReadOnly => element.readonly,
            Flag::Required => element.required,
        })
    }

    /// Sets the live state. `checked` is independent of its attribute after
    /// parsing; the other flags reflect into their attribute.
    pub(crate) fn set_flag(&mut self, node_id: NodeId, flag: Flag, on: bool) -> Result<()> {
        let element = self.require_element_mut(node_id, flag.attr_name())?;
        let field = flag.field(element);
        let changed = *field != on;
        *field = on;
        if flag != Flag::Checked {
            let has_attr = element.attrs.contains_key(flag.attr_name());
            if on && !has_attr {
                element.attrs.insert(flag.attr_name().to_string(), String::new());
            } else if !on && has_attr {
                element.attrs.remove(flag.attr_name());
            }
        }
        if changed {
            self.touch();
        }
        Ok(())
    }

    pub(crate) fn checked(&self, node_id: NodeId) -> Result<bool> {
        self.flag(node_id, Flag::Checked)
    }

    pub(crate) fn set_checked(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        self.set_flag(node_id, Flag::Checked, checked)
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id)
            .and_then(|e| e.attrs.get(&name.to_ascii_lowercase()).cloned())
    }

    pub(crate) fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|e| e.attrs.contains_key(&name.to_ascii_lowercase()))
    }

    /// Writes an attribute. Writing the value it already has is a no-op.
    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let lowered = name.to_ascii_lowercase();
        let is_option = {
            let element = self.require_element_mut(node_id, "setAttribute")?;
            if element.attrs.get(&lowered).is_some_and(|old| old == value) {
                return Ok(());
            }
            element.attrs.insert(lowered.clone(), value.to_string());
            match lowered.as_str() {
                "value" => element.value = value.to_string(),
                "checked" => element.checked = true,
                "disabled" => element.disabled = true,
                "readonly" => element.readonly = true,
                "required" => element.required = true,
                _ => {}
            }
            element.tag_name.eq_ignore_ascii_case("option")
        };
        self.touch();

        if is_option && (lowered == "selected" || lowered == "value") {
            self.sync_select_value_for_option(node_id)?;
        }
        Ok(())
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let lowered = name.to_ascii_lowercase();
        let is_option = {
            let element = self.require_element_mut(node_id, "removeAttribute")?;
            if element.attrs.remove(&lowered).is_none() {
                return Ok(());
            }
            match lowered.as_str() {
                "value" => element.value.clear(),
                "checked" => element.checked = false,
                "disabled" => element.disabled = false,
                "readonly" => element.readonly = false,
                "required" => element.required = false,
                _ => {}
            }
            element.tag_name.eq_ignore_ascii_case("option")
        };
        self.touch();

        if is_option && (lowered == "selected" || lowered == "value") {
            self.sync_select_value_for_option(node_id)?;
        }
        Ok(())
    }

    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertion(parent, child, "appendChild")?;
        if let Some(old_parent) = self.parent(child) {
            self.nodes[old_parent.0].children.retain(|id| *id != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.touch();
        Ok(())
    }

    pub(crate) fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<()> {
        self.check_insertion(parent, child, "insertBefore")?;
        if !self.is_valid_node(reference) || self.parent(reference) != Some(parent) {
            return Err(Error::InvalidTree(
                "insertBefore reference is not a direct child".into(),
            ));
        }
        if child == reference {
            return Ok(());
        }

        if let Some(old_parent) = self.parent(child) {
            self.nodes[old_parent.0].children.retain(|id| *id != child);
        }
        let Some(index) = self.nodes[parent.0]
            .children
            .iter()
            .position(|id| *id == reference)
        else {
            return Err(Error::InvalidTree("insertBefore reference is missing".into()));
        };
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, child);
        self.touch();
        Ok(())
    }

    /// Inserts `child` as the next sibling of `target`.
    pub(crate) fn insert_after(&mut self, target: NodeId, child: NodeId) -> Result<()> {
        let Some(parent) = self.parent(target) else {
            return Err(Error::InvalidTree("insertAfter target is detached".into()));
        };
        let pos = self.nodes[parent.0]
            .children
            .iter()
            .position(|id| *id == target)
            .ok_or_else(|| Error::InvalidTree("insertAfter target is detached".into()))?;
        let next = self.nodes[parent.0].children.get(pos + 1).copied();
        match next {
            Some(next) if next != child => self.insert_before(parent, child, next),
            Some(_) => Ok(()),
            None => self.append_child(parent, child),
        }
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId, op: &str) -> Result<()> {
        let parent_ok = matches!(
            self.node(parent).map(|n| &n.node_type),
            Some(NodeType::Document | NodeType::Element(_))
        );
        if !parent_ok {
            return Err(Error::InvalidTree(format!("{op} target cannot have children")));
        }
        if child == self.root || child == parent || !self.is_valid_node(child) {
            return Err(Error::InvalidTree(format!("invalid {op} node")));
        }
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(Error::InvalidTree(format!("{op} would create a cycle")));
            }
            cursor = self.parent(node);
        }
        Ok(())
    }

    /// Unlinks `node` and frees its subtree. Handles into the subtree stop
    /// resolving afterwards.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::InvalidTree("cannot remove document root".into()));
        }
        if let Some(parent) = self.parent(node) {
            self.nodes[parent.0].children.retain(|id| *id != node);
            self.touch();
        }
        self.release_subtree(node);
        Ok(())
    }

    pub(crate) fn class_contains(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .and_then(|element| element.attrs.get("class"))
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class_name))
    }

    pub(crate) fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self.require_element(node_id, "classList")?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        if classes.iter().any(|name| name == class_name) {
            return Ok(());
        }
        classes.push(class_name.to_string());
        self.set_attr(node_id, "class", &classes.join(" "))
    }

    /// Element descendants of `node_id`, excluding the node itself.
    pub(crate) fn descendant_elements(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for child in self.children(node_id) {
            self.collect_elements_dfs(*child, &mut out);
        }
        out
    }

    /// All nodes (any type) of the subtree rooted at `node_id`.
    pub(crate) fn subtree_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node_id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    fn collect_elements_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![node_id];
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
            }
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
    }

    pub(crate) fn all_element_nodes(&self) -> Vec<NodeId> {
        self.descendant_elements(self.root)
    }

    fn find_ancestor_by_tag(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if self
                .tag_name(current)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub(crate) fn initialize_form_control_values(&mut self) -> Result<()> {
        for node in self.all_element_nodes() {
            let Some(tag) = self.tag_name(node).map(str::to_ascii_lowercase) else {
                continue;
            };
            match tag.as_str() {
                "textarea" => {
                    let text = self.text_content(node);
                    self.require_element_mut(node, "textarea")?.value = text;
                }
                "select" => {
                    let value = self.select_value_from_options(node)?;
                    self.require_element_mut(node, "select")?.value = value;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn sync_select_value_for_option(&mut self, option_node: NodeId) -> Result<()> {
        let Some(select_node) = self.find_ancestor_by_tag(option_node, "select") else {
            return Ok(());
        };
        let value = self.select_value_from_options(select_node)?;
        self.require_element_mut(select_node, "select")?.value = value;
        Ok(())
    }

    fn set_select_value(&mut self, select_node: NodeId, requested: &str) -> Result<()> {
        let options = self.select_options(select_node);
        let mut matched = None;
        for option in &options {
            if self.option_effective_value(*option) == requested {
                matched = Some(*option);
                break;
            }
        }
        for option in &options {
            let element = self.require_element_mut(*option, "option")?;
            if Some(*option) == matched {
                element.attrs.insert("selected".to_string(), String::new());
            } else {
                element.attrs.remove("selected");
            }
        }
        let value = if matched.is_some() {
            requested.to_string()
        } else {
            String::new()
        };
        let element = self.require_element_mut(select_node, "select")?;
        if element.value != value {
            element.value = value;
            self.touch();
        }
        Ok(())
    }

    fn select_value_from_options(&self, select_node: NodeId) -> Result<String> {
        self.require_element(select_node, "select")?;
        let options = self.select_options(select_node);
        let Some(first) = options.first().copied() else {
            return Ok(String::new());
        };
        let selected = options
            .iter()
            .copied()
            .find(|option| self.has_attr(*option, "selected"))
            .unwrap_or(first);
        Ok(self.option_effective_value(selected))
    }

    fn select_options(&self, select_node: NodeId) -> Vec<NodeId> {
        self.descendant_elements(select_node)
            .into_iter()
            .filter(|node| {
                self.tag_name(*node)
                    .is_some_and(|tag| tag.eq_ignore_ascii_case("option"))
            })
            .collect()
    }

    fn option_effective_value(&self, option_node: NodeId) -> String {
        self.attr(option_node, "value")
            .unwrap_or_else(|| self.text_content(option_node))
    }

    /// Serializes a node as markup. Attributes come out in name order.
    pub(crate) fn dump_node(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node_id, &mut out);
        out
    }

    fn write_node(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        stacker::maybe_grow(RED_ZONE, STACK_CHUNK, || match &node.node_type {
            NodeType::Document => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            NodeType::Text(text) => out.push_str(&escape_html_text(text)),
            NodeType::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (k, v) in &element.attrs {
                    out.push(' ');
                    out.push_str(k);
                    if !v.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_html_attr(v));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_tag(&element.tag_name) {
                    return;
                }
                for child in &node.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
            }
        })
    }
}

pub(crate) fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| value.split_whitespace().map(ToOwned::to_owned).collect())
        .unwrap_or_default()
}

fn escape_html_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_html_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;

    fn first_tag(dom: &Dom, tag: &str) -> NodeId {
        dom.all_element_nodes()
            .into_iter()
            .find(|node| dom.tag_name(*node) == Some(tag))
            .expect("tag present")
    }

    #[test]
    fn setting_an_identical_attribute_is_not_a_mutation() -> Result<()> {
        let mut dom = parse_html("<div title='a'></div>")?;
        let div = first_tag(&dom, "div");
        let before = dom.mutation_count();
        dom.set_attr(div, "title", "a")?;
        assert_eq!(dom.mutation_count(), before);
        dom.set_attr(div, "title", "b")?;
        assert_eq!(dom.mutation_count(), before + 1);
        Ok(())
    }

    #[test]
    fn clone_subtree_is_detached_and_deep() -> Result<()> {
        let mut dom = parse_html("<ul><li class='x'><b>one</b></li></ul>")?;
        let li = first_tag(&dom, "li");
        let copy = dom.clone_subtree(li)?;
        assert_eq!(dom.parent(copy), None);
        assert_eq!(dom.dump_node(copy), dom.dump_node(li));
        dom.set_text_content(copy, "two")?;
        assert_eq!(dom.text_content(li), "one");
        Ok(())
    }

    #[test]
    fn insert_after_keeps_sibling_order() -> Result<()> {
        let mut dom = parse_html("<ul><li>a</li><li>z</li></ul>")?;
        let first = first_tag(&dom, "li");
        let b = dom.clone_subtree(first)?;
        dom.set_text_content(b, "b")?;
        dom.insert_after(first, b)?;
        let c = dom.clone_subtree(first)?;
        dom.set_text_content(c, "c")?;
        dom.insert_after(b, c)?;
        let ul = first_tag(&dom, "ul");
        assert_eq!(
            dom.dump_node(ul),
            "<ul><li>a</li><li>b</li><li>c</li><li>z</li></ul>"
        );
        Ok(())
    }

    #[test]
    fn inner_html_round_trips_markup() -> Result<()> {
        let mut dom = parse_html("<p></p>")?;
        let p = first_tag(&dom, "p");
        let fragment = parse_html("<b>bold</b> &amp; plain")?;
        dom.replace_children_from(p, &fragment)?;
        assert_eq!(dom.inner_html(p)?, "<b>bold</b> &amp; plain");
        assert_eq!(dom.text_content(p), "bold & plain");
        Ok(())
    }

    #[test]
    fn flags_reflect_into_attributes_except_checked() -> Result<()> {
        let mut dom = parse_html("<input type='checkbox'>")?;
        let input = first_tag(&dom, "input");
        dom.set_flag(input, Flag::Disabled, true)?;
        assert!(dom.has_attr(input, "disabled"));
        dom.set_flag(input, Flag::Disabled, false)?;
        assert!(!dom.has_attr(input, "disabled"));
        dom.set_checked(input, true)?;
        assert!(dom.checked(input)?);
        assert!(!dom.has_attr(input, "checked"));
        Ok(())
    }

    #[test]
    fn select_value_tracks_selected_option() -> Result<()> {
        let mut dom = parse_html(
            "<select><option value='a'>A</option><option value='b' selected>B</option></select>",
        )?;
        let select = first_tag(&dom, "select");
        assert_eq!(dom.value(select)?, "b");
        dom.set_value(select, "a")?;
        assert_eq!(dom.value(select)?, "a");
        dom.set_value(select, "missing")?;
        assert_eq!(dom.value(select)?, "");
        Ok(())
    }

    #[test]
    fn class_helpers_keep_token_list_tidy() -> Result<()> {
        let mut dom = parse_html("<div class='a  b'></div>")?;
        let div = first_tag(&dom, "div");
        dom.class_add(div, "c")?;
        assert_eq!(dom.attr(div, "class").as_deref(), Some("a b c"));
        dom.class_add(div, "b")?;
        assert_eq!(dom.attr(div, "class").as_deref(), Some("a b c"));
        assert!(dom.class_contains(div, "c"));
        assert!(!dom.class_contains(div, "a b"));
        Ok(())
    }

    #[test]
    fn removed_subtrees_free_their_slots_for_reuse() -> Result<()> {
        let mut dom = parse_html("<ul><li><b>one</b></li></ul>")?;
        let li = first_tag(&dom, "li");
        let bold = first_tag(&dom, "b");
        let slots = dom.slot_count();

        dom.remove_node(li)?;
        assert!(!dom.is_valid_node(li));
        assert!(!dom.is_valid_node(bold));
        assert_eq!(dom.text_content(dom.root), "");

        let ul = first_tag(&dom, "ul");
        for _ in 0..10 {
            let fresh = dom.create_element(ul, "li".into(), BTreeMap::new());
            dom.set_text_content(fresh, "two")?;
            assert!(fresh != li && fresh != bold);
            dom.remove_node(fresh)?;
        }
        assert_eq!(dom.slot_count(), slots);
        assert!(dom.element(li).is_none());
        Ok(())
    }

    #[test]
    fn replacing_text_frees_the_old_children() -> Result<()> {
        let mut dom = parse_html("<p><i>a</i><i>b</i></p>")?;
        let p = first_tag(&dom, "p");
        dom.set_text_content(p, "x")?;
        let slots = dom.slot_count();
        for text in ["y", "z", "w"] {
            dom.set_text_content(p, text)?;
        }
        assert_eq!(dom.slot_count(), slots);
        assert_eq!(dom.text_content(p), "w");
        Ok(())
    }
}
