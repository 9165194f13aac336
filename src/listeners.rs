use std::collections::HashMap;

use crate::dom::NodeId;
use crate::view_model::{ElementProperty, ItemScope};

/// What a listener does when its event reaches the node it sits on.
#[derive(Debug, Clone)]
pub(crate) enum ListenerAction {
    /// Forward to `EventHandler::on_event`. `arg` is the source text of the
    /// argument expression, evaluated when the event fires.
    Dispatch { handler: String, arg: Option<String> },
    /// Copy `property` from the element into the model at `path`.
    WriteBack {
        property: ElementProperty,
        path: String,
    },
}

/// Identity of a listener within one (node, owner) pair. Installing a
/// listener replaces whatever held the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ListenerSlot {
    Event(String),
    WriteBack(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub(crate) owner: String,
    pub(crate) slot: ListenerSlot,
    pub(crate) action: ListenerAction,
    pub(crate) scope: Option<ItemScope>,
}

#[derive(Debug, Default)]
pub(crate) struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Listener>>>,
}

impl ListenerStore {
    /// Installs `listener` for `event` on `node_id`, dropping any listener of
    /// the same owner and slot first. Returns `true` when one was replaced.
    pub(crate) fn install(&mut self, node_id: NodeId, event: &str, listener: Listener) -> bool {
        let events = self.map.entry(node_id).or_default();
        let mut replaced = false;
        for listeners in events.values_mut() {
            let before = listeners.len();
            listeners.retain(|existing| {
                !(existing.owner == listener.owner && existing.slot == listener.slot)
            });
            replaced |= listeners.len() != before;
        }
        events.retain(|_, listeners| !listeners.is_empty());
        events.entry(event.to_string()).or_default().push(listener);
        replaced
    }

    /// Listeners of `owner` on `node_id` for `event`, in installation order.
    pub(crate) fn matching(&self, node_id: NodeId, owner: &str, event: &str) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.owner == owner)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drops every listener registered on `nodes`. Returns how many went.
    pub(crate) fn purge(&mut self, nodes: &[NodeId]) -> usize {
        let mut removed = 0;
        for node in nodes {
            if let Some(events) = self.map.remove(node) {
                removed += events.values().map(Vec::len).sum::<usize>();
            }
        }
        removed
    }

    pub(crate) fn count_on(&self, node_id: NodeId) -> usize {
        self.map
            .get(&node_id)
            .map(|events| events.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.map
            .values()
            .flat_map(|events| events.values())
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(owner: &str, event: &str, handler: &str) -> Listener {
        Listener {
            owner: owner.to_string(),
            slot: ListenerSlot::Event(event.to_string()),
            action: ListenerAction::Dispatch {
                handler: handler.to_string(),
                arg: None,
            },
            scope: None,
        }
    }

    #[test]
    fn reinstalling_the_same_slot_replaces_the_listener() {
        let mut store = ListenerStore::default();
        let node = NodeId(3, 0);
        assert!(!store.install(node, "click", dispatch("vm", "click", "first")));
        assert!(store.install(node, "click", dispatch("vm", "click", "second")));
        let listeners = store.matching(node, "vm", "click");
        assert_eq!(listeners.len(), 1);
        assert!(matches!(
            &listeners[0].action,
            ListenerAction::Dispatch { handler, .. } if handler == "second"
        ));
    }

    #[test]
    fn owners_do_not_share_slots() {
        let mut store = ListenerStore::default();
        let node = NodeId(1, 0);
        store.install(node, "click", dispatch("a", "click", "h"));
        store.install(node, "click", dispatch("b", "click", "h"));
        assert_eq!(store.count_on(node), 2);
        assert_eq!(store.matching(node, "a", "click").len(), 1);
    }

    #[test]
    fn write_back_slot_moves_between_events() {
        let mut store = ListenerStore::default();
        let node = NodeId(2, 0);
        let listener = |event: &str| Listener {
            owner: "vm".into(),
            slot: ListenerSlot::WriteBack("value".into()),
            action: ListenerAction::WriteBack {
                property: ElementProperty::Value,
                path: format!("$vm.model.{event}"),
            },
            scope: None,
        };
        store.install(node, "change", listener("change"));
        store.install(node, "input", listener("input"));
        assert!(store.matching(node, "vm", "change").is_empty());
        assert_eq!(store.matching(node, "vm", "input").len(), 1);
    }

    #[test]
    fn purge_removes_all_listeners_of_given_nodes() {
        let mut store = ListenerStore::default();
        store.install(NodeId(1, 0), "click", dispatch("vm", "click", "h"));
        store.install(NodeId(1, 0), "input", dispatch("vm", "input", "h"));
        store.install(NodeId(2, 0), "click", dispatch("vm", "click", "h"));
        assert_eq!(store.purge(&[NodeId(1, 0), NodeId(9, 0)]), 2);
        assert_eq!(store.len(), 1);
    }
}
