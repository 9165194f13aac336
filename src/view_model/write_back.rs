use super::*;
use crate::binding::Binding;
use crate::listeners::{Listener, ListenerAction, ListenerSlot};

impl ViewModel {
    /// Installs one write-back listener per `<name>-js-bind` entry. The
    /// listener fires on `input` when the element carries
    /// `<name>-real-time-bind`, on `change` otherwise.
    pub(super) fn bind_write_backs(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        scope: Option<&ItemScope>,
    ) -> Result<()> {
        let Some(raw) = doc.dom.attr(node, &self.attr_name(BindingKind::Value)) else {
            return Ok(());
        };
        let event = if doc.dom.has_attr(node, &self.real_time_attr()) {
            "input"
        } else {
            "change"
        };
        for parsed in Binding::parse_all(BindingKind::Value, &raw) {
            let Some((property, binding)) = self.property_binding(node, parsed) else {
                continue;
            };
            let listener = Listener {
                owner: self.name.clone(),
                slot: ListenerSlot::WriteBack(property.name().to_string()),
                action: ListenerAction::WriteBack {
                    property,
                    path: binding.expression,
                },
                scope: scope.cloned(),
            };
            doc.listeners.install(node, event, listener);
        }
        Ok(())
    }

    /// Copies `property` of `node` into the model at `path`. Returns whether
    /// the model changed.
    pub(super) fn write_back(
        &self,
        doc: &Document,
        node: NodeId,
        property: ElementProperty,
        path: &str,
        scope: Option<&ItemScope>,
    ) -> Result<bool> {
        let value = property.read(&doc.dom, node)?;
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        let Some((last, walk)) = segments.split_last() else {
            return Ok(false);
        };
        if walk.is_empty() || last.is_empty() {
            debug!(target: "bindery::events", path, "write-back path needs at least two segments");
            return Ok(false);
        }

        let mut cursor = match (walk[0], scope) {
            ("$item", Some(item)) => item.item.clone(),
            _ => self.vm.clone(),
        };
        for segment in &walk[1..] {
            cursor = cursor.get(segment);
            if !matches!(cursor, Value::Object(_) | Value::Array(_)) {
                debug!(
                    target: "bindery::events",
                    path,
                    segment,
                    "write-back path does not resolve to an object"
                );
                return Ok(false);
            }
        }
        if let Err(err) = cursor.set(last, value) {
            debug!(target: "bindery::events", path, error = %err, "write-back assignment failed");
            return Ok(false);
        }
        trace!(
            target: "bindery::events",
            vm = %self.name,
            node = %node,
            property = property.name(),
            path,
            "model updated from view"
        );
        Ok(true)
    }
}
