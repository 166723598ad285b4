//! Syntax-extension layer between a model-checking GUI and its engine.
//!
//! Models and queries written with extended syntax are rewritten by a
//! pipeline of [`mappers`] into text the engine understands. Every rewrite
//! is recorded so that diagnostics the engine reports on the rewritten text
//! can be mapped back to what the user wrote, or dropped when they point into
//! generated code.
//!
//! ```no_run
//! use uppaal_mapper::{MapperConfig, MapperRegistry, Orchestrator};
//!
//! let registry = MapperRegistry::with_builtins();
//! let mut orchestrator = Orchestrator::from_config(&MapperConfig::default(), &registry)?;
//! let mapped = orchestrator.map_query("INVARIABLY x > 0")?;
//! assert_eq!(mapped.text, "A[] x > 0");
//! # Ok::<(), uppaal_mapper::MapperError>(())
//! ```

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod errors;
pub mod grammar;
pub mod mappers;
pub mod model;
pub mod orchestrator;
pub mod rewrite;
pub mod syntax;

pub use config::MapperConfig;
pub use diagnostics::{Diagnostic, DiagnosticRange, Severity};
pub use errors::MapperError;
pub use grammar::Grammar;
pub use mappers::{Mapper, MapperRegistry, ProcessEntry};
pub use model::{ModelTree, NodeKind, Path};
pub use orchestrator::{MappedModel, MappedQuery, Orchestrator};
pub use rewrite::{BackMapPolicy, TextRewriter};
