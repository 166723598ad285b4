//! Syntax-extension mappers and the registry that resolves them by id.
//!
//! A [`Mapper`] contributes up to three things: model phases, a query-bar
//! rewrite, and a simulator process-list edit. Each is optional; the defaults
//! do nothing.

use std::collections::BTreeMap;

use crate::diagnostics::Diagnostic;
use crate::dispatch::PhaseRun;
use crate::err_msg;
use crate::errors::MapperError;
use crate::rewrite::TextRewriter;

pub mod array_init;
pub mod hidden_processes;
pub mod quantifiers;

/// Path used for diagnostics about the query bar text.
pub const QUERY_PATH: &str = "/query";

/// A rewritten query and the diagnostics found while rewriting it.
#[derive(Debug, Clone)]
pub struct QueryRewrite {
    pub rewriter: TextRewriter,
    pub diagnostics: Vec<Diagnostic>,
}

/// One process as the simulator lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub name: String,
    pub template: String,
}

impl ProcessEntry {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }
}

pub trait Mapper {
    fn id(&self) -> &'static str;

    /// Fresh phases for one mapping request, in execution order.
    fn phases(&self) -> Vec<Box<dyn PhaseRun>> {
        Vec::new()
    }

    /// Rewrites a query bar formula. `None` means the mapper has nothing to
    /// say about queries.
    fn map_query(&self, _query: &str) -> Result<Option<QueryRewrite>, MapperError> {
        Ok(None)
    }

    /// Edits the simulator's process list in place.
    fn map_processes(&self, _processes: &mut Vec<ProcessEntry>) {}
}

// ============================================================================
// REGISTRY
// ============================================================================

pub type MapperFactory = fn() -> Box<dyn Mapper>;

/// Mapper constructors by id.
#[derive(Default, Clone)]
pub struct MapperRegistry {
    factories: BTreeMap<String, MapperFactory>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in mapper.
    pub fn with_builtins() -> Self {
        Self {
            factories: BUILTINS
                .iter()
                .map(|&(id, factory)| (id.to_string(), factory))
                .collect(),
        }
    }

    /// # Errors
    /// `MapperError::Registry` if `id` is already taken.
    pub fn register(&mut self, id: &str, factory: MapperFactory) -> Result<(), MapperError> {
        if self.factories.contains_key(id) {
            return Err(err_msg!(Registry, "mapper '{}' is registered twice", id));
        }
        self.factories.insert(id.to_string(), factory);
        Ok(())
    }

    /// # Errors
    /// `MapperError::Registry` if no mapper is registered under `id`.
    pub fn factory(&self, id: &str) -> Result<MapperFactory, MapperError> {
        self.factories.get(id).copied().ok_or_else(|| MapperError::Registry {
            message: format!("unknown mapper '{id}'"),
            ctx: crate::errors::ErrorContext {
                help: Some(format!("known mappers: {}", self.ids().collect::<Vec<_>>().join(", "))),
                ..Default::default()
            },
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

const BUILTINS: [(&str, MapperFactory); 3] = [
    (array_init::ID, array_init::create),
    (quantifiers::ID, quantifiers::create),
    (hidden_processes::ID, hidden_processes::create),
];

/// Registers the built-in mappers under their ids.
///
/// # Errors
/// `MapperError::Registry` if one of their ids is already taken.
pub fn register_builtin_mappers(registry: &mut MapperRegistry) -> Result<(), MapperError> {
    for (id, factory) in BUILTINS {
        registry.register(id, factory)?;
    }
    Ok(())
}
