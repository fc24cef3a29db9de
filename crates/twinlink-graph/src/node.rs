//! Graph node identity, classes, links and the generic node type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::variant::{DataType, Variant};

// ── Identity ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

/// Namespaced node identity, displayed as `ns=2;i=17`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    /// The well-known root `Objects` folder.
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace: 0,
        identifier: Identifier::Numeric(85),
    };

    pub fn numeric(namespace: u16, value: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: u16, value: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "ns={};i={}", self.namespace, n),
            Identifier::String(s) => write!(f, "ns={};s={}", self.namespace, s),
        }
    }
}

// ── Classes and links ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Object,
    Variable,
    Method,
}

/// Typed link between two nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Component,
    OrderedComponent,
    HasProperty,
    Organizes,
    /// Cross-link from an element to its concept description.
    DictionaryEntry,
}

impl LinkKind {
    /// Hierarchical links form the parent/child tree; other links are
    /// cross-references that never own their target.
    pub fn is_hierarchical(&self) -> bool {
        !matches!(self, LinkKind::DictionaryEntry)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Link {
    pub kind: LinkKind,
    pub target: NodeId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AccessLevel {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl AccessLevel {
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessLevel::ReadWrite)
    }
}

// ── Methods ───────────────────────────────────────────────────────

/// Descriptor of one method argument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Argument {
    pub name: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MethodSignature {
    pub inputs: Vec<Argument>,
    pub outputs: Vec<Argument>,
}

// ── Node ──────────────────────────────────────────────────────────

/// One node of the graph. Variables carry a typed value; methods carry
/// their argument descriptors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: NodeId,
    pub class: NodeClass,
    pub browse_name: String,
    pub display_name: String,
    #[serde(default)]
    pub value: Variant,
    pub data_type: DataType,
    #[serde(default)]
    pub access: AccessLevel,
    /// Fixed array length for array-valued variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodSignature>,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl GraphNode {
    fn new(id: NodeId, class: NodeClass, name: &str) -> Self {
        Self {
            id,
            class,
            browse_name: name.to_string(),
            display_name: name.to_string(),
            value: Variant::Null,
            data_type: DataType::BaseDataType,
            access: AccessLevel::ReadOnly,
            array_len: None,
            method: None,
            parent: None,
            links: Vec::new(),
        }
    }

    pub fn object(id: NodeId, name: &str) -> Self {
        Self::new(id, NodeClass::Object, name)
    }

    pub fn variable(id: NodeId, name: &str, value: Variant, data_type: DataType) -> Self {
        let mut node = Self::new(id, NodeClass::Variable, name);
        node.value = value;
        node.data_type = data_type;
        node
    }

    pub fn method(id: NodeId, name: &str, signature: MethodSignature) -> Self {
        let mut node = Self::new(id, NodeClass::Method, name);
        node.method = Some(signature);
        node
    }

    pub fn with_access(mut self, access: AccessLevel) -> Self {
        self.access = access;
        self
    }

    pub fn with_array_len(mut self, len: usize) -> Self {
        self.array_len = Some(len);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Targets of hierarchical links, in link order.
    pub fn children(&self) -> impl Iterator<Item = &NodeId> {
        self.links
            .iter()
            .filter(|l| l.kind.is_hierarchical())
            .map(|l| &l.target)
    }

    pub fn link_to(&self, target: &NodeId) -> Option<&Link> {
        self.links.iter().find(|l| &l.target == target)
    }
}
