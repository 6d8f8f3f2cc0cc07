//! Document surface driven by the element hider agent.
//!
//! The agent never touches a concrete DOM. It talks to a [`Document`], which a
//! browser binding implements against the live page and [`MemoryDocument`]
//! implements in memory for the CLI host and for tests. Mutations are queued as
//! [`MutationRecord`]s and delivered to subscribers in coalesced bursts, the
//! same way a mutation observer sees them.

pub mod errors;
pub mod memory;
pub mod model;

use tokio::sync::broadcast;

pub use errors::DomError;
pub use memory::MemoryDocument;
pub use model::{DomEvent, ElementSpec, MutationRecord, NodeId};

/// Inline `display` value used to hide an element.
pub const DISPLAY_NONE: &str = "none";

/// Shared event bus type alias for document events.
pub type DomEventBus = broadcast::Sender<DomEvent>;

pub fn event_bus(capacity: usize) -> (DomEventBus, broadcast::Receiver<DomEvent>) {
    broadcast::channel(capacity.max(1))
}

/// Minimal document capability surface required by the agent.
///
/// Style and data accessors on a node that is no longer attached behave like
/// an element without that property: reads return empty, writes are dropped.
pub trait Document: Send + Sync {
    /// Attached elements whose class list contains `class`, in document order.
    fn elements_by_class(&self, class: &str) -> Vec<NodeId>;
    /// First attached element in document order whose id equals `id`.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;
    /// Every attached element in document order.
    fn elements(&self) -> Vec<NodeId>;

    fn class_list(&self, node: NodeId) -> Vec<String>;
    fn element_id(&self, node: NodeId) -> Option<String>;

    /// Inline style property, empty when unset.
    fn style(&self, node: NodeId, property: &str) -> String;
    /// Sets an inline style property; an empty value clears it.
    fn set_style(&self, node: NodeId, property: &str, value: &str);

    /// `data-*` attribute accessors; `key` is the attribute name without the
    /// `data-` prefix.
    fn data(&self, node: NodeId, key: &str) -> Option<String>;
    fn set_data(&self, node: NodeId, key: &str, value: &str);
    fn remove_data(&self, node: NodeId, key: &str);

    /// Subscribes to mutation bursts and load events.
    fn subscribe(&self) -> broadcast::Receiver<DomEvent>;
    /// Drains records queued since the last burst without delivering them.
    fn take_records(&self) -> Vec<MutationRecord>;
}

impl<D> Document for std::sync::Arc<D>
where
    D: Document + ?Sized,
{
    fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        (**self).elements_by_class(class)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        (**self).element_by_id(id)
    }

    fn elements(&self) -> Vec<NodeId> {
        (**self).elements()
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        (**self).class_list(node)
    }

    fn element_id(&self, node: NodeId) -> Option<String> {
        (**self).element_id(node)
    }

    fn style(&self, node: NodeId, property: &str) -> String {
        (**self).style(node, property)
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) {
        (**self).set_style(node, property, value)
    }

    fn data(&self, node: NodeId, key: &str) -> Option<String> {
        (**self).data(node, key)
    }

    fn set_data(&self, node: NodeId, key: &str, value: &str) {
        (**self).set_data(node, key, value)
    }

    fn remove_data(&self, node: NodeId, key: &str) {
        (**self).remove_data(node, key)
    }

    fn subscribe(&self) -> broadcast::Receiver<DomEvent> {
        (**self).subscribe()
    }

    fn take_records(&self) -> Vec<MutationRecord> {
        (**self).take_records()
    }
}
