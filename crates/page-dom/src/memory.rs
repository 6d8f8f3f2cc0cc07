use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::errors::DomError;
use crate::model::{DomEvent, ElementSpec, MutationRecord, NodeId};
use crate::{event_bus, Document, DomEventBus, DISPLAY_NONE};

const DEFAULT_BUS_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
struct ElementData {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    style: Vec<(String, String)>,
    data: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ElementData {
    fn from_spec(spec: &ElementSpec, parent: Option<NodeId>) -> Self {
        let mut classes: Vec<String> = Vec::new();
        for class in &spec.classes {
            if !class.is_empty() && !classes.contains(class) {
                classes.push(class.clone());
            }
        }
        Self {
            tag: spec.tag.clone(),
            id: spec.id.clone().filter(|id| !id.is_empty()),
            classes,
            style: spec
                .style
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            data: BTreeMap::new(),
            parent,
            children: Vec::new(),
        }
    }

    fn style(&self, property: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(key, _)| key == property)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<NodeId, ElementData>,
    root: NodeId,
    next_id: u64,
    pending: Vec<MutationRecord>,
    record_redundant_writes: bool,
}

impl Tree {
    fn new(root_spec: &ElementSpec) -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeId(0),
            next_id: 0,
            pending: Vec::new(),
            record_redundant_writes: false,
        };
        tree.root = tree.build(root_spec, None);
        tree
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    fn build(&mut self, spec: &ElementSpec, parent: Option<NodeId>) -> NodeId {
        let node = self.allocate();
        self.nodes.insert(node, ElementData::from_spec(spec, parent));
        for child in &spec.children {
            let child_id = self.build(child, Some(node));
            if let Some(data) = self.nodes.get_mut(&node) {
                data.children.push(child_id);
            }
        }
        node
    }

    /// Pre-order walk from the root.
    fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if let Some(data) = self.nodes.get(&node) {
                out.push(node);
                stack.extend(data.children.iter().rev().copied());
            }
        }
        out
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(data) = self.nodes.remove(&node) {
            for child in data.children {
                self.detach(child);
            }
        }
    }

    fn record(&mut self, record: MutationRecord) {
        self.pending.push(record);
    }

    fn write_style(&mut self, node: NodeId, property: &str, value: &str) {
        let redundant = self.record_redundant_writes;
        let Some(data) = self.nodes.get_mut(&node) else {
            return;
        };
        let position = data.style.iter().position(|(key, _)| key == property);
        let changed = match (position, value.is_empty()) {
            (Some(idx), true) => {
                data.style.remove(idx);
                true
            }
            (Some(idx), false) => {
                let changed = data.style[idx].1 != value;
                data.style[idx].1 = value.to_string();
                changed
            }
            (None, true) => false,
            (None, false) => {
                data.style.push((property.to_string(), value.to_string()));
                true
            }
        };
        if changed || redundant {
            self.record(MutationRecord::Attributes {
                target: node,
                name: "style".into(),
            });
        }
    }

    fn write_data(&mut self, node: NodeId, key: &str, value: Option<&str>) {
        let redundant = self.record_redundant_writes;
        let Some(data) = self.nodes.get_mut(&node) else {
            return;
        };
        let changed = match value {
            Some(value) => {
                let previous = data.data.insert(key.to_string(), value.to_string());
                previous.as_deref() != Some(value)
            }
            None => data.data.remove(key).is_some(),
        };
        if changed || redundant {
            self.record(MutationRecord::Attributes {
                target: node,
                name: format!("data-{key}"),
            });
        }
    }
}

/// In-memory document with mutation-observer semantics.
///
/// Writes queue [`MutationRecord`]s. Nothing is delivered until [`flush`]
/// publishes the queued records as one burst, which mirrors how a browser
/// coalesces synchronous DOM changes until the next microtask checkpoint.
///
/// [`flush`]: MemoryDocument::flush
pub struct MemoryDocument {
    tree: Mutex<Tree>,
    events: DomEventBus,
}

impl MemoryDocument {
    /// Empty document with an `html` root element.
    pub fn new() -> Self {
        Self::from_spec(ElementSpec::new("html"))
    }

    /// Builds a document from a fixture tree. The initial parse queues no
    /// mutation records.
    pub fn from_spec(root: ElementSpec) -> Self {
        let (events, _) = event_bus(DEFAULT_BUS_CAPACITY);
        Self {
            tree: Mutex::new(Tree::new(&root)),
            events,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, DomError> {
        let spec: ElementSpec = serde_json::from_str(raw)?;
        if spec.tag.trim().is_empty() {
            return Err(DomError::InvalidFixture("root element has no tag".into()));
        }
        Ok(Self::from_spec(spec))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DomError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn root(&self) -> NodeId {
        self.tree.lock().root
    }

    /// When enabled, writes that leave a value unchanged still queue a record,
    /// as some engines do for repeated inline style assignments.
    pub fn set_record_redundant_writes(&self, enabled: bool) {
        self.tree.lock().record_redundant_writes = enabled;
    }

    /// Appends a subtree under `parent`. Returns `None` if `parent` is not
    /// attached.
    pub fn append_element(&self, parent: NodeId, spec: ElementSpec) -> Option<NodeId> {
        let mut tree = self.tree.lock();
        if !tree.nodes.contains_key(&parent) {
            return None;
        }
        let node = tree.build(&spec, Some(parent));
        if let Some(data) = tree.nodes.get_mut(&parent) {
            data.children.push(node);
        }
        tree.record(MutationRecord::ChildList {
            target: parent,
            added: vec![node],
            removed: Vec::new(),
        });
        Some(node)
    }

    /// Detaches `node` and its subtree. The root cannot be removed.
    pub fn remove_element(&self, node: NodeId) -> bool {
        let mut tree = self.tree.lock();
        let Some(parent) = tree.nodes.get(&node).and_then(|data| data.parent) else {
            return false;
        };
        if let Some(data) = tree.nodes.get_mut(&parent) {
            data.children.retain(|child| *child != node);
        }
        tree.detach(node);
        tree.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![node],
        });
        true
    }

    /// Replaces the class list, like assigning `className`.
    pub fn set_class_name(&self, node: NodeId, class_name: &str) {
        let mut tree = self.tree.lock();
        let Some(data) = tree.nodes.get_mut(&node) else {
            return;
        };
        let mut classes: Vec<String> = Vec::new();
        for class in class_name.split_whitespace() {
            if !classes.iter().any(|existing| existing == class) {
                classes.push(class.to_string());
            }
        }
        data.classes = classes;
        tree.record(MutationRecord::Attributes {
            target: node,
            name: "class".into(),
        });
    }

    pub fn add_class(&self, node: NodeId, class: &str) {
        let current = self.class_list(node);
        if current.iter().any(|existing| existing == class) {
            return;
        }
        let mut next = current;
        next.push(class.to_string());
        self.set_class_name(node, &next.join(" "));
    }

    pub fn set_element_id(&self, node: NodeId, id: Option<&str>) {
        let mut tree = self.tree.lock();
        let Some(data) = tree.nodes.get_mut(&node) else {
            return;
        };
        data.id = id.filter(|id| !id.is_empty()).map(str::to_string);
        tree.record(MutationRecord::Attributes {
            target: node,
            name: "id".into(),
        });
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.tree.lock().nodes.get(&node).map(|data| data.tag.clone())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.lock().nodes.contains_key(&node)
    }

    /// Serialized inline style, e.g. `display: none; outline: 0`.
    pub fn style_text(&self, node: NodeId) -> String {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .map(|data| {
                data.style
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default()
    }

    /// True when neither the node nor any ancestor is `display: none`.
    pub fn is_rendered(&self, node: NodeId) -> bool {
        let tree = self.tree.lock();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            let Some(data) = tree.nodes.get(&current) else {
                return false;
            };
            if data.style(DISPLAY_PROPERTY) == Some(DISPLAY_NONE) {
                return false;
            }
            cursor = data.parent;
        }
        true
    }

    pub fn pending_records(&self) -> usize {
        self.tree.lock().pending.len()
    }

    /// Delivers every queued record to subscribers as one burst. Returns the
    /// number of records delivered.
    pub fn flush(&self) -> usize {
        let burst = std::mem::take(&mut self.tree.lock().pending);
        let count = burst.len();
        if count > 0 {
            debug!(target: "page-dom", records = count, "delivering mutation burst");
            let _ = self.events.send(DomEvent::Mutations(burst));
        }
        count
    }

    /// Signals page load completion to subscribers.
    pub fn fire_load(&self) {
        debug!(target: "page-dom", "load event");
        let _ = self.events.send(DomEvent::Load);
    }
}

const DISPLAY_PROPERTY: &str = "display";

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl Document for MemoryDocument {
    fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        let tree = self.tree.lock();
        tree.walk()
            .into_iter()
            .filter(|node| {
                tree.nodes
                    .get(node)
                    .map(|data| data.classes.iter().any(|existing| existing == class))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let tree = self.tree.lock();
        tree.walk().into_iter().find(|node| {
            tree.nodes
                .get(node)
                .and_then(|data| data.id.as_deref())
                .map(|existing| existing == id)
                .unwrap_or(false)
        })
    }

    fn elements(&self) -> Vec<NodeId> {
        self.tree.lock().walk()
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .map(|data| data.classes.clone())
            .unwrap_or_default()
    }

    fn element_id(&self, node: NodeId) -> Option<String> {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .and_then(|data| data.id.clone())
    }

    fn style(&self, node: NodeId, property: &str) -> String {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .and_then(|data| data.style(property).map(str::to_string))
            .unwrap_or_default()
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) {
        self.tree.lock().write_style(node, property, value);
    }

    fn data(&self, node: NodeId, key: &str) -> Option<String> {
        self.tree
            .lock()
            .nodes
            .get(&node)
            .and_then(|data| data.data.get(key).cloned())
    }

    fn set_data(&self, node: NodeId, key: &str, value: &str) {
        self.tree.lock().write_data(node, key, Some(value));
    }

    fn remove_data(&self, node: NodeId, key: &str) {
        self.tree.lock().write_data(node, key, None);
    }

    fn subscribe(&self) -> broadcast::Receiver<DomEvent> {
        self.events.subscribe()
    }

    fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.tree.lock().pending)
    }
}
