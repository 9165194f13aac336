use super::*;
use crate::binding::Binding;

/// FNV-1a, so clone-group classes stay stable across runs.
fn expression_hash(text: &str) -> u32 {
    text.bytes().fold(0x811c_9dc5_u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

impl ViewModel {
    /// Class tagging the clones produced by `expression`.
    pub(super) fn clone_group_class(&self, expression: &str) -> Result<String> {
        let expression = expression.trim();
        let safe = self.patterns.class_safe(expression)?;
        Ok(format!(
            "{}-{}-{:08x}",
            self.options.foreach_class_prefix_name(),
            safe,
            expression_hash(expression)
        ))
    }

    /// Rebuilds the clone group of one `<name>-foreach` template.
    ///
    /// The previous group is only torn down once the iterable evaluated to
    /// an array; errors and falsy or non-array results keep it as it is.
    pub(super) fn render_foreach(
        &mut self,
        doc: &mut Document,
        template: NodeId,
        scope: &Scope,
    ) -> Result<()> {
        if !doc.dom.is_connected(template) {
            trace!(target: "bindery::foreach", template = %template, "skipping detached template");
            return Ok(());
        }
        let foreach_attr = self.attr_name(BindingKind::Foreach);
        let Some(raw) = doc.dom.attr(template, &foreach_attr) else {
            return Ok(());
        };
        let binding = match Binding::parse_all(BindingKind::Foreach, &raw).into_iter().next() {
            Some(Ok(binding)) => binding,
            Some(Err(err)) => {
                self.skip_malformed(template, BindingKind::Foreach, &err);
                return Ok(());
            }
            None => return Ok(()),
        };

        let items = match self.exprs.evaluate(&binding.expression, scope) {
            Ok(value) if !value.truthy() => {
                trace!(target: "bindery::foreach", expression = %binding.expression, "iterable is falsy, keeping clones");
                return Ok(());
            }
            Ok(value) => match value.items() {
                Some(items) => items,
                None => {
                    debug!(
                        target: "bindery::foreach",
                        expression = %binding.expression,
                        kind = value.type_of(),
                        "iterable is not an array, keeping clones"
                    );
                    return Ok(());
                }
            },
            Err(err) => {
                debug!(
                    target: "bindery::foreach",
                    expression = %binding.expression,
                    error = %err,
                    "iterable failed to evaluate, keeping clones"
                );
                return Ok(());
            }
        };

        let class = self.clone_group_class(&binding.expression)?;
        self.teardown_clone_group(doc, template, &class)?;

        let hidden_attr = self.options.hidden_attr_name().to_string();
        let mut anchor = template;
        for (index, item) in items.into_iter().enumerate() {
            let clone = doc.dom.clone_subtree(template)?;
            doc.dom.remove_attr(clone, &foreach_attr)?;
            doc.dom.remove_attr(clone, &hidden_attr)?;
            doc.dom.insert_after(anchor, clone)?;

            let item_scope = ItemScope::new(scope, item, index);
            self.bind_clone(doc, clone, &item_scope)?;
            doc.dom.class_add(clone, &class)?;
            self.clone_roots.insert(clone);
            anchor = clone;
        }
        debug!(
            target: "bindery::foreach",
            expression = %binding.expression,
            class = %class,
            "clone group rebuilt"
        );

        doc.dom.set_attr(template, &hidden_attr, "")
    }

    /// Binds a freshly inserted clone and everything below it in the item
    /// scope, including foreach templates nested inside it.
    fn bind_clone(&mut self, doc: &mut Document, clone: NodeId, item: &ItemScope) -> Result<()> {
        let scan = self.scan(&doc.dom, clone);
        trace!(
            target: "bindery::foreach",
            clone = %clone,
            index = item.index,
            elements = scan.elements.len(),
            "binding clone"
        );
        self.sync_elements(&mut doc.dom, &scan.elements, &item.scope)?;
        for &node in &scan.elements {
            self.bind_write_backs(doc, node, Some(item))?;
            self.bind_events(doc, node, Some(item))?;
        }
        for template in scan.templates {
            stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
                self.render_foreach(doc, template, &item.scope)
            })?;
        }
        Ok(())
    }

    /// Removes the clones beside `template` carrying `class`, dropping the
    /// listeners registered anywhere in their subtrees.
    fn teardown_clone_group(
        &mut self,
        doc: &mut Document,
        template: NodeId,
        class: &str,
    ) -> Result<()> {
        let Some(parent) = doc.dom.parent(template) else {
            return Ok(());
        };
        let stale: Vec<NodeId> = doc
            .dom
            .element_children(parent)
            .into_iter()
            .filter(|node| {
                self.clone_roots.contains(node) && doc.dom.class_contains(*node, class)
            })
            .collect();
        let mut purged = 0;
        for &node in &stale {
            let subtree = doc.dom.subtree_nodes(node);
            purged += doc.listeners.purge(&subtree);
            for inner in &subtree {
                self.clone_roots.remove(inner);
            }
            doc.dom.remove_node(node)?;
        }
        trace!(
            target: "bindery::foreach",
            class,
            removed = stale.len(),
            listeners = purged,
            "clone group torn down"
        );
        Ok(())
    }
}
