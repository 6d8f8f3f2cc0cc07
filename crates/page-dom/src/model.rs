use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to an element owned by a document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// One queued document change.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. } => *target,
            MutationRecord::Attributes { target, .. } => *target,
        }
    }

    pub fn has_added_nodes(&self) -> bool {
        matches!(self, MutationRecord::ChildList { added, .. } if !added.is_empty())
    }

    pub fn attribute_name(&self) -> Option<&str> {
        match self {
            MutationRecord::Attributes { name, .. } => Some(name.as_str()),
            MutationRecord::ChildList { .. } => None,
        }
    }
}

/// Events broadcast by a document to its observers.
#[derive(Clone, Debug)]
pub enum DomEvent {
    /// One coalesced burst of mutation records.
    Mutations(Vec<MutationRecord>),
    /// Page load completed.
    Load,
}

/// Declarative element tree used to build documents from JSON page fixtures.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}
