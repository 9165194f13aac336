use crate::dom::{Dom, NodeId};
use crate::html::parse_html;
use crate::listeners::ListenerStore;
use crate::{Error, Result, truncate_chars};

/// In-memory element tree plus the listeners view models installed on it.
///
/// A document is handed to every [`crate::ViewModel`] call by mutable
/// reference; several view models may share one document.
#[derive(Debug)]
pub struct Document {
    pub(crate) dom: Dom,
    pub(crate) listeners: ListenerStore,
}

impl Document {
    pub fn from_html(html: &str) -> Result<Self> {
        Ok(Self {
            dom: parse_html(html)?,
            listeners: ListenerStore::default(),
        })
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        self.dom.query_selector(selector)
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.dom.query_selector_all(selector)
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.attr(target, name))
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn checked(&self, selector: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        self.dom.checked(target)
    }

    pub fn node_text(&self, node_id: NodeId) -> String {
        self.dom.text_content(node_id)
    }

    pub fn node_attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.dom.attr(node_id, name)
    }

    pub fn node_value(&self, node_id: NodeId) -> Result<String> {
        self.dom.value(node_id)
    }

    /// Whether `node_id` is still reachable from the document root.
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        self.dom.is_connected(node_id)
    }

    /// Serializes the whole document. Attributes come out in name order, so
    /// two dumps compare equal exactly when the trees do.
    pub fn dump(&self) -> String {
        self.dom.dump_node(self.dom.root)
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    /// Count of tree and element-state changes since parsing.
    pub fn mutation_count(&self) -> u64 {
        self.dom.mutation_count()
    }

    /// Listeners installed on `node_id` across all view models.
    pub fn listener_count(&self, node_id: NodeId) -> usize {
        self.listeners.count_on(node_id)
    }

    pub fn total_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Sets a control's value without firing any event.
    pub fn set_value(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dom.set_value(target, value)
    }

    pub fn set_node_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.dom.set_value(node_id, value)
    }

    /// Sets a checkbox or radio state without firing any event.
    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dom.set_checked(target, checked)
    }

    pub fn set_checked_node(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        self.dom.set_checked(node_id, checked)
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_checked(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.checked(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    /// Checks an attribute value; `None` asserts the attribute is absent.
    pub fn assert_attr(&self, selector: &str, name: &str, expected: Option<&str>) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.attr(target, name);
        if actual.as_deref() != expected {
            let describe = |value: Option<&str>| match value {
                Some(value) => format!("{name}={value:?}"),
                None => format!("no {name} attribute"),
            };
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: describe(expected),
                actual: describe(actual.as_deref()),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub(crate) fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub(crate) fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }
}
