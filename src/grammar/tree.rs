//! Position-annotated parse trees produced by the grammar engine.
//!
//! Spans refer to the exact text passed to the match call that produced the
//! tree. They are meaningless against any other version of that text.

use std::sync::Arc;

use crate::syntax::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTree {
    Node(Node),
    Leaf(Leaf),
}

/// An interior node: a rule application, or an anonymous group for
/// repetitions and multi-term optionals (`rule` is `None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub rule: Option<Arc<str>>,
    /// One entry per term; `None` marks an optional term that did not match.
    pub children: Vec<Option<ParseTree>>,
    pub span: Span,
}

/// A matched terminal. `token` is the token name, or the literal itself for
/// literal terminals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub token: Arc<str>,
    pub text: String,
    pub span: Span,
}

impl ParseTree {
    pub fn span(&self) -> Span {
        match self {
            ParseTree::Node(node) => node.span,
            ParseTree::Leaf(leaf) => leaf.span,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            ParseTree::Node(node) => Some(node),
            ParseTree::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            ParseTree::Leaf(leaf) => Some(leaf),
            ParseTree::Node(_) => None,
        }
    }

    /// All leaves in pre-order.
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    /// Concatenated leaf text, without the skipped input between leaves.
    pub fn leaf_text(&self) -> String {
        self.leaves().iter().map(|l| l.text.as_str()).collect()
    }

    /// First node (pre-order, self included) produced by `rule`.
    pub fn find(&self, rule: &str) -> Option<&Node> {
        self.find_all(rule).into_iter().next()
    }

    /// Every node (pre-order, self included) produced by `rule`.
    pub fn find_all(&self, rule: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        collect_rule(self, rule, &mut out);
        out
    }
}

impl Node {
    pub fn child(&self, index: usize) -> Option<&ParseTree> {
        self.children.get(index).and_then(Option::as_ref)
    }

    pub fn is_rule(&self, rule: &str) -> bool {
        self.rule.as_deref() == Some(rule)
    }

    /// First leaf below this node whose token is `token`.
    pub fn leaf(&self, token: &str) -> Option<&Leaf> {
        self.children
            .iter()
            .flatten()
            .flat_map(ParseTree::leaves)
            .find(|leaf| &*leaf.token == token)
    }
}

fn collect_leaves<'a>(tree: &'a ParseTree, out: &mut Vec<&'a Leaf>) {
    match tree {
        ParseTree::Leaf(leaf) => out.push(leaf),
        ParseTree::Node(node) => {
            for child in node.children.iter().flatten() {
                collect_leaves(child, out);
            }
        }
    }
}

fn collect_rule<'a>(tree: &'a ParseTree, rule: &str, out: &mut Vec<&'a Node>) {
    let ParseTree::Node(node) = tree else {
        return;
    };
    if node.is_rule(rule) {
        out.push(node);
    }
    for child in node.children.iter().flatten() {
        collect_rule(child, rule, out);
    }
}
