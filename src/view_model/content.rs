use super::*;
use crate::binding::Binding;
use crate::html::parse_html;

impl ViewModel {
    /// `<name>-content-bind="expr[::pipe]"`. The result replaces the
    /// element's inner markup unless it already serializes the same way.
    pub(super) fn bind_content(
        &mut self,
        dom: &mut Dom,
        node: NodeId,
        scope: &Scope,
    ) -> Result<()> {
        let Some(raw) = dom.attr(node, &self.attr_name(BindingKind::Content)) else {
            return Ok(());
        };
        let Some(parsed) = Binding::parse_all(BindingKind::Content, &raw).into_iter().next()
        else {
            return Ok(());
        };
        let binding = match parsed {
            Ok(binding) => binding,
            Err(err) => {
                self.skip_malformed(node, BindingKind::Content, &err);
                return Ok(());
            }
        };
        let value = self.evaluate_binding(&binding.expression, scope, node);
        let markup = match self.pipe(binding.pipe.as_deref(), &value)? {
            Some(piped) => piped,
            None => value.display_string(),
        };
        set_inner_markup(dom, node, &markup)
    }
}

/// Replaces the children of `node` with `markup`, skipping the write when
/// the current children already serialize to the same markup. Markup that
/// does not parse is written as plain text.
pub(super) fn set_inner_markup(dom: &mut Dom, node: NodeId, markup: &str) -> Result<()> {
    let fragment = match parse_html(markup) {
        Ok(fragment) => fragment,
        Err(err) => {
            debug!(target: "bindery::render", node = %node, error = %err, "content is not markup");
            if dom.text_content(node) != markup {
                dom.set_text_content(node, markup)?;
            }
            return Ok(());
        }
    };
    let normalized = fragment.dump_node(fragment.root);
    if dom.inner_html(node)? == normalized {
        return Ok(());
    }
    dom.replace_children_from(node, &fragment)
}
