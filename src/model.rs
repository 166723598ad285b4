//! The typed model tree mappers operate on.
//!
//! Nodes live in a flat arena owned by [`ModelTree`] and refer to each other
//! by [`NodeId`]. Structure is fixed once the codec has built the tree;
//! mapper phases only replace the text of text-bearing nodes.

use std::fmt;

use crate::err_msg;
use crate::errors::MapperError;

pub mod codec;
pub mod path;
pub mod walker;

pub use codec::{ModelCodec, XmlCodec};
pub use path::{Path, PathSegment};
pub use walker::{walk, walk_scoped, ModelVisitor};

// ============================================================================
// NODE KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Nta,
    Declaration,
    Template,
    Name,
    Parameter,
    Location,
    Urgent,
    Committed,
    Branchpoint,
    Init,
    Transition,
    Source,
    Target,
    Label,
    Nail,
    System,
    Queries,
    Query,
    Formula,
    Comment,
    Result,
}

impl NodeKind {
    pub const ALL: [NodeKind; 21] = [
        NodeKind::Nta,
        NodeKind::Declaration,
        NodeKind::Template,
        NodeKind::Name,
        NodeKind::Parameter,
        NodeKind::Location,
        NodeKind::Urgent,
        NodeKind::Committed,
        NodeKind::Branchpoint,
        NodeKind::Init,
        NodeKind::Transition,
        NodeKind::Source,
        NodeKind::Target,
        NodeKind::Label,
        NodeKind::Nail,
        NodeKind::System,
        NodeKind::Queries,
        NodeKind::Query,
        NodeKind::Formula,
        NodeKind::Comment,
        NodeKind::Result,
    ];

    /// Element name in the model document and segment name in paths.
    pub fn tag(self) -> &'static str {
        match self {
            NodeKind::Nta => "nta",
            NodeKind::Declaration => "declaration",
            NodeKind::Template => "template",
            NodeKind::Name => "name",
            NodeKind::Parameter => "parameter",
            NodeKind::Location => "location",
            NodeKind::Urgent => "urgent",
            NodeKind::Committed => "committed",
            NodeKind::Branchpoint => "branchpoint",
            NodeKind::Init => "init",
            NodeKind::Transition => "transition",
            NodeKind::Source => "source",
            NodeKind::Target => "target",
            NodeKind::Label => "label",
            NodeKind::Nail => "nail",
            NodeKind::System => "system",
            NodeKind::Queries => "queries",
            NodeKind::Query => "query",
            NodeKind::Formula => "formula",
            NodeKind::Comment => "comment",
            NodeKind::Result => "result",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Kinds that may occur several times under one parent and therefore
    /// carry an index in paths.
    pub fn repeats(self) -> bool {
        matches!(
            self,
            NodeKind::Template
                | NodeKind::Location
                | NodeKind::Branchpoint
                | NodeKind::Transition
                | NodeKind::Label
                | NodeKind::Nail
                | NodeKind::Query
                | NodeKind::Result
        )
    }

    /// Kinds whose content is a text blob rather than child elements.
    pub fn has_text(self) -> bool {
        matches!(
            self,
            NodeKind::Declaration
                | NodeKind::Name
                | NodeKind::Parameter
                | NodeKind::Label
                | NodeKind::System
                | NodeKind::Formula
                | NodeKind::Comment
                | NodeKind::Result
        )
    }

    /// Permitted child kinds, in canonical traversal order: single-valued
    /// children first, then repeated ones.
    pub fn child_kinds(self) -> &'static [NodeKind] {
        use NodeKind::*;
        match self {
            Nta => &[Declaration, System, Queries, Template],
            Template => &[
                Name,
                Parameter,
                Declaration,
                Init,
                Location,
                Branchpoint,
                Transition,
            ],
            Location => &[Name, Urgent, Committed, Label],
            Transition => &[Source, Target, Label, Nail],
            Queries => &[Query],
            Query => &[Formula, Comment, Result],
            Declaration | Name | Parameter | Urgent | Committed | Branchpoint | Init | Source
            | Target | Label | Nail | System | Formula | Comment | Result => &[],
        }
    }

    fn child_rank(self, child: NodeKind) -> Option<usize> {
        self.child_kinds().iter().position(|k| *k == child)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The `kind` attribute of a `label` node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LabelKind {
    Invariant,
    Guard,
    Synchronisation,
    Assignment,
    Select,
    Probability,
    ExponentialRate,
    Other(String),
}

impl LabelKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "invariant" => LabelKind::Invariant,
            "guard" => LabelKind::Guard,
            "synchronisation" => LabelKind::Synchronisation,
            "assignment" => LabelKind::Assignment,
            "select" => LabelKind::Select,
            "probability" => LabelKind::Probability,
            "exponentialrate" => LabelKind::ExponentialRate,
            other => LabelKind::Other(other.to_string()),
        }
    }
}

// ============================================================================
// ARENA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct ModelNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Children in document order.
    pub children: Vec<NodeId>,
    pub attributes: Vec<(String, String)>,
    /// Decoded text content, for text-bearing kinds only.
    pub text: Option<String>,
    pub(crate) slot: Option<codec::TextSlot>,
}

impl ModelNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn label_kind(&self) -> Option<LabelKind> {
        if self.kind != NodeKind::Label {
            return None;
        }
        self.attribute("kind").map(LabelKind::parse)
    }
}

/// A model tree rooted at an `nta` node.
#[derive(Debug, Clone)]
pub struct ModelTree {
    nodes: Vec<ModelNode>,
    /// Document the tree was read from, when it came through a codec.
    pub(crate) source: Option<String>,
}

impl Default for ModelTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ModelNode {
                kind: NodeKind::Nta,
                parent: None,
                children: Vec::new(),
                attributes: Vec::new(),
                text: None,
                slot: None,
            }],
            source: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ModelNode {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].text.as_deref()
    }

    /// Appends a child of `kind` under `parent`.
    ///
    /// # Errors
    /// `MapperError::Codec` if `kind` cannot occur under `parent`'s kind.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, MapperError> {
        let parent_kind = self.kind(parent);
        if parent_kind.child_rank(kind).is_none() {
            return Err(err_msg!(
                Codec,
                "<{}> cannot appear inside <{}>",
                kind,
                parent_kind
            ));
        }
        if !kind.repeats() && self.children_of_kind(parent, kind).next().is_some() {
            return Err(err_msg!(
                Codec,
                "<{}> appears more than once inside <{}>",
                kind,
                parent_kind
            ));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(ModelNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            attributes: Vec::new(),
            text: kind.has_text().then(String::new),
            slot: None,
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let attributes = &mut self.nodes[id.0].attributes;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// Replaces the text of a text-bearing node.
    ///
    /// # Errors
    /// `MapperError::Rewrite` if the node's kind carries no text.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), MapperError> {
        let node = &mut self.nodes[id.0];
        if !node.kind.has_text() {
            return Err(err_msg!(Rewrite, "<{}> does not carry text", node.kind));
        }
        node.text = Some(text.into());
        Ok(())
    }

    pub fn children_of_kind(&self, parent: NodeId, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .filter(move |child| self.kind(*child) == kind)
    }

    /// Children in canonical traversal order.
    pub fn canonical_children(&self, parent: NodeId) -> Vec<NodeId> {
        let parent_kind = self.kind(parent);
        let mut children = self.nodes[parent.0].children.clone();
        // Stable, so repeated kinds keep document order.
        children.sort_by_key(|child| parent_kind.child_rank(self.kind(*child)));
        children
    }

    /// Finds the node addressed by `path`.
    pub fn resolve(&self, path: &Path) -> Option<NodeId> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        if first.kind != NodeKind::Nta {
            return None;
        }
        let mut current = self.root();
        for segment in segments {
            let index = segment.index.unwrap_or(1);
            current = self
                .children_of_kind(current, segment.kind)
                .nth(index.checked_sub(1)?)?;
        }
        Some(current)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ModelNode {
        &mut self.nodes[id.0]
    }
}
