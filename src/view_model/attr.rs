use super::*;
use crate::binding::Binding;

impl ViewModel {
    /// `<name>-attr-bind="attr::expr[::pipe], ..."`. Boolean `false` removes
    /// the attribute; anything else is written as its string form.
    pub(super) fn bind_attrs(&mut self, dom: &mut Dom, node: NodeId, scope: &Scope) -> Result<()> {
        let Some(raw) = dom.attr(node, &self.attr_name(BindingKind::Attr)) else {
            return Ok(());
        };
        for parsed in Binding::parse_all(BindingKind::Attr, &raw) {
            let binding = match parsed {
                Ok(binding) => binding,
                Err(err) => {
                    self.skip_malformed(node, BindingKind::Attr, &err);
                    continue;
                }
            };
            let Some(target) = binding.target.as_deref() else {
                continue;
            };
            let value = self.evaluate_binding(&binding.expression, scope, node);
            match self.pipe(binding.pipe.as_deref(), &value)? {
                Some(piped) => dom.set_attr(node, target, &piped)?,
                None if value == Value::Bool(false) => dom.remove_attr(node, target)?,
                None => dom.set_attr(node, target, &value.display_string())?,
            }
        }
        Ok(())
    }
}
