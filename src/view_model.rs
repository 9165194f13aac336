//! The view model: binds named view roots of a [`Document`] to a model.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::binding::BindingPatterns;
use crate::document::Document;
use crate::dom::{Dom, NodeId};
use crate::expr::{ExprCache, Scope};
use crate::options::BindingOptions;
use crate::pipe::PipeRegistry;
use crate::value::Value;
use crate::{BindingKind, Error, Result};

mod attr;
mod content;
mod events;
mod foreach;
mod value;
mod write_back;

pub use events::{Event, EventHandler, FnHandler, HandlerContext, NoHandler, handler_fn};
pub use value::ElementProperty;

/// Variables captured for one foreach clone: the full scope it was bound
/// with plus the item it was cloned for.
#[derive(Debug, Clone)]
pub(crate) struct ItemScope {
    pub(crate) item: Value,
    pub(crate) index: usize,
    pub(crate) scope: Scope,
}

impl ItemScope {
    fn new(parent: &Scope, item: Value, index: usize) -> Self {
        let scope = parent
            .clone()
            .with("$item", item.clone())
            .with("$i", Value::from(index));
        Self { item, index, scope }
    }
}

/// Elements of one subtree split by how a render pass treats them.
#[derive(Debug, Default)]
struct Scan {
    /// Elements bound in the current scope, in document order.
    elements: Vec<NodeId>,
    /// Outermost foreach templates below the scanned root.
    templates: Vec<NodeId>,
}

pub struct ViewModel {
    name: String,
    /// The object expressions see as `$vm`: `{ name, model, ..properties }`.
    vm: Value,
    view_roots: Vec<NodeId>,
    options: BindingOptions,
    pipes: Rc<PipeRegistry>,
    handler: Box<dyn EventHandler>,
    exprs: ExprCache,
    patterns: BindingPatterns,
    /// Root of every live clone this view model inserted.
    clone_roots: HashSet<NodeId>,
}

impl std::fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewModel")
            .field("name", &self.name)
            .field("view_roots", &self.view_roots)
            .field("options", &self.options)
            .field("pipes", &self.pipes)
            .finish_non_exhaustive()
    }
}

impl ViewModel {
    /// Captures the view roots of `name` in `doc` and wires their event and
    /// write-back bindings. Nothing is rendered until [`Self::initialize`]
    /// or [`Self::render`].
    pub fn new(doc: &mut Document, name: impl Into<String>, model: Value) -> Result<Self> {
        Self::with_options(doc, name, model, BindingOptions::default())
    }

    pub fn with_options(
        doc: &mut Document,
        name: impl Into<String>,
        model: Value,
        options: BindingOptions,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::BindingSyntax("view model name is empty".into()));
        }
        let view_roots: Vec<NodeId> = doc
            .dom
            .all_element_nodes()
            .into_iter()
            .filter(|node| {
                doc.dom.attr(*node, options.root_marker_name()).as_deref() == Some(name.as_str())
            })
            .collect();
        debug!(
            target: "bindery::render",
            vm = %name,
            roots = view_roots.len(),
            "captured view roots"
        );

        let vm = Value::object([
            ("name", Value::string(name.clone())),
            ("model", model),
        ]);
        let mut view_model = Self {
            name,
            vm,
            view_roots,
            options,
            pipes: Rc::new(PipeRegistry::new()),
            handler: Box::new(NoHandler),
            exprs: ExprCache::default(),
            patterns: BindingPatterns::new()?,
            clone_roots: HashSet::new(),
        };

        for root in view_model.view_roots.clone() {
            let scan = view_model.scan(&doc.dom, root);
            for node in scan.elements {
                view_model.bind_write_backs(doc, node, None)?;
                view_model.bind_events(doc, node, None)?;
            }
        }
        Ok(view_model)
    }

    pub fn with_pipes(mut self, pipes: Rc<PipeRegistry>) -> Self {
        self.pipes = pipes;
        self
    }

    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> Value {
        self.vm.get("model")
    }

    /// Replaces the model. The view catches up on the next render.
    pub fn set_model(&mut self, model: Value) -> Result<()> {
        self.vm.set("model", model)
    }

    /// Exposes an extra property to expressions as `$vm.<key>`.
    pub fn set_property(&mut self, key: &str, value: Value) -> Result<()> {
        if key == "name" {
            return Err(Error::BindingSyntax(
                "`$vm.name` is reserved for the view model name".into(),
            ));
        }
        self.vm.set(key, value)
    }

    pub fn view_roots(&self) -> &[NodeId] {
        &self.view_roots
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    /// Runs [`EventHandler::on_init`], then the first render pass.
    pub fn initialize(&mut self, doc: &mut Document) -> Result<()> {
        let mut ctx = HandlerContext::new(&self.name, &self.vm, doc);
        self.handler.on_init(&mut ctx)?;
        self.render(doc)
    }

    /// Full re-render: attribute, content and value bindings of every view
    /// root, then every foreach template.
    #[tracing::instrument(level = "debug", skip_all, fields(vm = %self.name))]
    pub fn render(&mut self, doc: &mut Document) -> Result<()> {
        let scope = self.root_scope();
        for root in self.view_roots.clone() {
            if !doc.dom.is_connected(root) {
                trace!(target: "bindery::render", root = %root, "skipping detached view root");
                continue;
            }
            let scan = self.scan(&doc.dom, root);
            self.sync_elements(&mut doc.dom, &scan.elements, &scope)?;
            for template in scan.templates {
                self.render_foreach(doc, template, &scope)?;
            }
        }
        trace!(
            target: "bindery::render",
            mutations = doc.dom.mutation_count(),
            "render pass finished"
        );
        Ok(())
    }

    /// Live members of the clone group produced by `expression`, in document
    /// order.
    pub fn clone_group(&self, doc: &Document, expression: &str) -> Result<Vec<NodeId>> {
        let class = self.clone_group_class(expression)?;
        Ok(doc
            .dom
            .all_element_nodes()
            .into_iter()
            .filter(|node| doc.dom.class_contains(*node, &class))
            .collect())
    }

    #[cfg(test)]
    pub(crate) fn cached_expression_count(&self) -> usize {
        self.exprs.len()
    }

    fn root_scope(&self) -> Scope {
        Scope::new().with("$vm", self.vm.clone())
    }

    fn attr_name(&self, kind: BindingKind) -> String {
        kind.attribute_name(&self.name)
    }

    fn real_time_attr(&self) -> String {
        format!("{}-real-time-bind", self.name)
    }

    /// Walks the subtree of `root`, pruning at foreach templates and at
    /// members of live clone groups.
    fn scan(&self, dom: &Dom, root: NodeId) -> Scan {
        let foreach_attr = self.attr_name(BindingKind::Foreach);
        let mut scan = Scan::default();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if dom.element(node).is_none() {
                continue;
            }
            if dom.has_attr(node, &foreach_attr) {
                scan.templates.push(node);
                continue;
            }
            if self.clone_roots.contains(&node) {
                continue;
            }
            scan.elements.push(node);
            for child in dom.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        scan
    }

    /// Attribute, content and value bindings of `elements`, kind by kind.
    fn sync_elements(&mut self, dom: &mut Dom, elements: &[NodeId], scope: &Scope) -> Result<()> {
        for &node in elements {
            self.bind_attrs(dom, node, scope)?;
        }
        for &node in elements {
            self.bind_content(dom, node, scope)?;
        }
        for &node in elements {
            self.bind_values(dom, node, scope)?;
        }
        Ok(())
    }

    /// Evaluates a binding expression, degrading failures to `""`.
    fn evaluate_binding(&mut self, expression: &str, scope: &Scope, node: NodeId) -> Value {
        match self.exprs.evaluate(expression, scope) {
            Ok(value) => value,
            Err(err) => {
                debug!(
                    target: "bindery::eval",
                    vm = %self.name,
                    node = %node,
                    expression,
                    error = %err,
                    "binding expression failed, using empty string"
                );
                Value::string("")
            }
        }
    }

    fn pipe(&self, pipe: Option<&str>, value: &Value) -> Result<Option<String>> {
        match pipe {
            Some(name) => self.pipes.apply(name, &value.display_string()).map(Some),
            None => Ok(None),
        }
    }

    fn skip_malformed(&self, node: NodeId, kind: BindingKind, err: &Error) {
        warn!(
            target: "bindery::render",
            vm = %self.name,
            node = %node,
            attribute = %self.attr_name(kind),
            error = %err,
            "skipping malformed binding"
        );
    }
}
