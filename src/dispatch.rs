//! Phase and handler dispatch.
//!
//! A [`Phase`] is one full traversal of the model tree. Mappers register
//! plain function handlers on it, keyed by node kind and a path-suffix filter,
//! and the phase calls *every* handler whose key matches the visited node.
//! Handlers that must not both fire use mutually exclusive filters.
//!
//! Handlers see the text of a node as it was when the phase started. Their
//! edits go through a per-field [`TextRewriter`] collected in the phase's
//! [`RewriteLayer`]; the orchestrator commits the layer to the tree once the
//! phase is done and keeps it for back-mapping.

use std::collections::{BTreeMap, HashSet};

use log::trace;

use crate::diagnostics::Diagnostic;
use crate::err_msg;
use crate::errors::MapperError;
use crate::model::{walk_scoped, LabelKind, ModelNode, ModelTree, ModelVisitor, NodeId, NodeKind, Path};
use crate::rewrite::TextRewriter;
use crate::syntax::Span;

/// Handler signature: mutable phase state plus the visited node.
pub type Handler<S> = fn(&mut S, &mut NodeContext<'_>) -> Result<Vec<Diagnostic>, MapperError>;

struct Registration<S> {
    kind: NodeKind,
    filter: Vec<NodeKind>,
    handler: Handler<S>,
}

impl<S> Registration<S> {
    fn matches(&self, kind: NodeKind, path: &Path) -> bool {
        self.kind == kind && path.matches_filter(&self.filter)
    }
}

// ============================================================================
// REWRITE LAYER
// ============================================================================

#[derive(Debug, Clone)]
struct FieldRewrite {
    node: NodeId,
    rewriter: TextRewriter,
}

/// The text edits one phase made, keyed by rendered path.
#[derive(Debug, Clone, Default)]
pub struct RewriteLayer {
    fields: BTreeMap<String, FieldRewrite>,
}

impl RewriteLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&TextRewriter> {
        self.fields.get(path).map(|f| &f.rewriter)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn rewriter_for(&mut self, path: &str, node: NodeId, text: &str) -> &mut TextRewriter {
        &mut self
            .fields
            .entry(path.to_string())
            .or_insert_with(|| FieldRewrite {
                node,
                rewriter: TextRewriter::new(text),
            })
            .rewriter
    }

    /// Writes every rewritten field's current text into `tree`.
    pub fn commit(&self, tree: &mut ModelTree) -> Result<(), MapperError> {
        for field in self.fields.values() {
            tree.set_text(field.node, field.rewriter.current_text())?;
        }
        Ok(())
    }

    /// Moves `diagnostic` one rewrite layer back.
    ///
    /// Fields this layer did not touch pass through unchanged. Returns `None`
    /// when the diagnostic starts inside injected text.
    pub fn back_map(&self, diagnostic: &Diagnostic) -> Option<Diagnostic> {
        match self.get(&diagnostic.path) {
            Some(rewriter) => rewriter.back_map_diagnostic(diagnostic),
            None => Some(diagnostic.clone()),
        }
    }
}

// ============================================================================
// NODE CONTEXT
// ============================================================================

/// What a handler sees of the node it was called for.
pub struct NodeContext<'a> {
    tree: &'a ModelTree,
    id: NodeId,
    path: &'a Path,
    path_string: &'a str,
    layer: &'a mut RewriteLayer,
}

impl<'a> NodeContext<'a> {
    pub fn tree(&self) -> &'a ModelTree {
        self.tree
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a ModelNode {
        self.tree.node(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.tree.kind(self.id)
    }

    pub fn path(&self) -> &Path {
        self.path
    }

    pub fn path_string(&self) -> &str {
        self.path_string
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.node().attribute(name)
    }

    pub fn label_kind(&self) -> Option<LabelKind> {
        self.node().label_kind()
    }

    /// The node's text as it was when this phase started. Spans passed to
    /// [`replace`](Self::replace) refer to this text.
    pub fn text(&self) -> Option<&'a str> {
        self.tree.text(self.id)
    }

    pub fn replace(&mut self, range: Span, text: &str) -> Result<(), MapperError> {
        self.rewriter()?.replace(range, text)
    }

    pub fn replace_anchored(&mut self, range: Span, text: &str) -> Result<(), MapperError> {
        self.rewriter()?.replace_anchored(range, text)
    }

    /// A diagnostic for `span` of this node's text.
    pub fn diagnostic(&self, span: Span, message: impl Into<String>) -> Diagnostic {
        Diagnostic::at_span(self.path_string, self.text().unwrap_or_default(), span, message)
    }

    fn rewriter(&mut self) -> Result<&mut TextRewriter, MapperError> {
        let Some(text) = self.tree.text(self.id) else {
            return Err(err_msg!(
                Rewrite,
                "{} has no text to rewrite",
                self.path_string
            ));
        };
        Ok(self.layer.rewriter_for(self.path_string, self.id, text))
    }
}

// ============================================================================
// PHASE
// ============================================================================

/// Result of running one phase over a tree.
#[derive(Debug, Default)]
pub struct PhaseOutcome {
    pub layer: RewriteLayer,
    pub diagnostics: Vec<Diagnostic>,
}

/// A phase with its state type erased, as the orchestrator runs it.
pub trait PhaseRun {
    fn name(&self) -> &str;

    /// Walks `tree`, dispatching to handlers everywhere except at `blocked`
    /// paths.
    fn run(&mut self, tree: &ModelTree, blocked: &HashSet<String>) -> Result<PhaseOutcome, MapperError>;
}

pub struct Phase<S> {
    name: String,
    state: S,
    enter: Vec<Registration<S>>,
    exit: Vec<Registration<S>>,
}

impl<S> Phase<S> {
    pub fn new(name: impl Into<String>, state: S) -> Self {
        Self {
            name: name.into(),
            state,
            enter: Vec::new(),
            exit: Vec::new(),
        }
    }

    /// Registers `handler` for nodes of `kind` whose path ends with `filter`.
    /// The filter includes the node's own kind as its last entry; an empty
    /// filter matches anywhere.
    pub fn register(mut self, kind: NodeKind, filter: &[NodeKind], handler: Handler<S>) -> Self {
        self.enter.push(Registration {
            kind,
            filter: filter.to_vec(),
            handler,
        });
        self
    }

    /// Like [`register`](Self::register), but the handler runs after the
    /// node's subtree has been visited.
    pub fn register_exit(mut self, kind: NodeKind, filter: &[NodeKind], handler: Handler<S>) -> Self {
        self.exit.push(Registration {
            kind,
            filter: filter.to_vec(),
            handler,
        });
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Calls every matching enter handler and aggregates their diagnostics.
    pub fn visit(&mut self, ctx: &mut NodeContext<'_>) -> Result<Vec<Diagnostic>, MapperError> {
        dispatch(&self.name, &self.enter, &mut self.state, ctx)
    }
}

fn dispatch<S>(
    phase: &str,
    registrations: &[Registration<S>],
    state: &mut S,
    ctx: &mut NodeContext<'_>,
) -> Result<Vec<Diagnostic>, MapperError> {
    let kind = ctx.kind();
    let path = ctx.path;
    let mut diagnostics = Vec::new();
    for registration in registrations.iter().filter(|r| r.matches(kind, path)) {
        trace!(phase, path = ctx.path_string; "dispatching handler");
        diagnostics.extend((registration.handler)(state, ctx)?);
    }
    Ok(diagnostics)
}

struct Run<'p, S> {
    phase: &'p mut Phase<S>,
    blocked: &'p HashSet<String>,
    outcome: PhaseOutcome,
}

impl<S> Run<'_, S> {
    fn handle(&mut self, tree: &ModelTree, id: NodeId, path: &Path, exit: bool) -> Result<(), MapperError> {
        let registrations = if exit { &self.phase.exit } else { &self.phase.enter };
        if !registrations.iter().any(|r| r.matches(tree.kind(id), path)) {
            return Ok(());
        }
        let path_string = path.to_string();
        if self.blocked.contains(&path_string) {
            trace!(phase = self.phase.name.as_str(), path = path_string.as_str(); "skipping blocked node");
            return Ok(());
        }
        let mut ctx = NodeContext {
            tree,
            id,
            path,
            path_string: &path_string,
            layer: &mut self.outcome.layer,
        };
        let diagnostics = dispatch(&self.phase.name, registrations, &mut self.phase.state, &mut ctx)?;
        self.outcome.diagnostics.extend(diagnostics);
        Ok(())
    }
}

impl<S> ModelVisitor for Run<'_, S> {
    fn step_into(&mut self, tree: &ModelTree, id: NodeId, path: &Path) -> Result<(), MapperError> {
        self.handle(tree, id, path, false)
    }

    fn step_out(&mut self, tree: &ModelTree, id: NodeId, path: &Path) -> Result<(), MapperError> {
        self.handle(tree, id, path, true)
    }
}

impl<S> PhaseRun for Phase<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, tree: &ModelTree, blocked: &HashSet<String>) -> Result<PhaseOutcome, MapperError> {
        let mut run = Run {
            phase: self,
            blocked,
            outcome: PhaseOutcome::default(),
        };
        walk_scoped(tree, &mut run)?;
        Ok(run.outcome)
    }
}
