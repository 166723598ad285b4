//! Runs the configured mappers over models and queries, and maps the engine's
//! diagnostics back to what the client wrote.
//!
//! An [`Orchestrator`] belongs to one client session. It keeps the rewrite
//! layers of its latest model and its latest query so that diagnostics
//! returned for them can be back-mapped later. A new request replaces the
//! retained layers of the same kind.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::config::MapperConfig;
use crate::diagnostics::{Diagnostic, DiagnosticOrigin};
use crate::dispatch::RewriteLayer;
use crate::errors::MapperError;
use crate::mappers::{MapperFactory, MapperRegistry, ProcessEntry};
use crate::model::{ModelCodec, XmlCodec};
use crate::rewrite::TextRewriter;
use crate::syntax::Span;

/// Root element every model text starts with after its preamble.
const ROOT_TAG: &str = "<nta";

/// Path used for diagnostics about the model as a whole.
pub const ROOT_PATH: &str = "/nta";

/// Output of [`Orchestrator::map_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedModel {
    pub text: String,
    /// Empty means the model mapped cleanly.
    pub diagnostics: Vec<Diagnostic>,
}

/// Output of [`Orchestrator::map_query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedQuery {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// The rewrites one phase made to one model.
#[derive(Debug)]
struct RetainedLayer {
    origin: DiagnosticOrigin,
    layer: RewriteLayer,
}

pub struct Orchestrator {
    mappers: Vec<(String, MapperFactory)>,
    codec: Box<dyn ModelCodec>,
    model_layers: Vec<RetainedLayer>,
    query_layers: Vec<(String, TextRewriter)>,
}

impl Orchestrator {
    /// Resolves every id up front, in order.
    ///
    /// # Errors
    /// `MapperError::Registry` for the first id the registry does not know.
    pub fn new<S: AsRef<str>>(ids: &[S], registry: &MapperRegistry) -> Result<Self, MapperError> {
        let mappers = ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                registry.factory(id).map(|factory| (id.to_string(), factory))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            mappers,
            codec: Box::new(XmlCodec),
            model_layers: Vec::new(),
            query_layers: Vec::new(),
        })
    }

    pub fn from_config(config: &MapperConfig, registry: &MapperRegistry) -> Result<Self, MapperError> {
        Self::new(&config.mappers, registry)
    }

    /// Replaces the XML codec.
    pub fn with_codec(mut self, codec: Box<dyn ModelCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn mapper_ids(&self) -> impl Iterator<Item = &str> {
        self.mappers.iter().map(|(id, _)| id.as_str())
    }

    // ------------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------------

    /// Rewrites a model through every phase of every mapper.
    ///
    /// Text the codec cannot read comes back unchanged with a single
    /// unrecoverable diagnostic at [`ROOT_PATH`].
    ///
    /// # Errors
    /// Only defects in a mapper or in the core: overlapping rewrites,
    /// malformed grammars and the like.
    pub fn map_model(&mut self, text: &str) -> Result<MappedModel, MapperError> {
        info!(mappers = self.mappers.len(), bytes = text.len(); "Mapping model");
        self.model_layers.clear();

        let (preamble, body) = split_preamble(text);
        let mut tree = match self.codec.parse(body) {
            Ok(tree) => tree,
            Err(err) if err.is_input_error() => {
                warn!(error:% = err; "Model could not be read");
                return Ok(MappedModel {
                    text: text.to_string(),
                    diagnostics: vec![unreadable_model(text, preamble.len(), &err)],
                });
            }
            Err(err) => return Err(err),
        };

        let mut diagnostics = Vec::new();
        let mut blocked = HashSet::new();
        let mut sequence = 0;
        for (id, factory) in &self.mappers {
            let mapper = factory();
            for mut phase in mapper.phases() {
                debug!(mapper = id.as_str(), phase = phase.name(); "Running phase");
                let outcome = phase.run(&tree, &blocked)?;
                outcome.layer.commit(&mut tree)?;

                let origin = DiagnosticOrigin {
                    mapper: id.clone(),
                    phase: phase.name().to_string(),
                    sequence,
                };
                debug!(
                    mapper = id.as_str(),
                    phase = phase.name(),
                    rewritten = outcome.layer.len(),
                    diagnostics = outcome.diagnostics.len();
                    "Finished phase"
                );
                for diagnostic in outcome.diagnostics {
                    if diagnostic.is_unrecoverable() {
                        blocked.insert(diagnostic.path.clone());
                    }
                    // Emitted over this phase's input, so only earlier layers apply.
                    if let Some(mapped) = self.back_map(&diagnostic) {
                        diagnostics.push(mapped.with_origin(origin.clone()));
                    }
                }
                self.model_layers.push(RetainedLayer {
                    origin,
                    layer: outcome.layer,
                });
                sequence += 1;
            }
        }

        let body = self.codec.serialize(&tree)?;
        Ok(MappedModel {
            text: format!("{preamble}{body}"),
            diagnostics,
        })
    }

    /// Maps an engine diagnostic on the latest mapped model back to the
    /// client's text. `None` means it points into text no user wrote.
    pub fn back_map(&self, diagnostic: &Diagnostic) -> Option<Diagnostic> {
        let mut current = diagnostic.clone();
        for retained in self.model_layers.iter().rev() {
            match retained.layer.back_map(&current) {
                Some(mapped) => current = mapped,
                None => {
                    warn!(
                        path = diagnostic.path.as_str(),
                        mapper = retained.origin.mapper.as_str(),
                        phase = retained.origin.phase.as_str();
                        "Discarding diagnostic inside injected text"
                    );
                    return None;
                }
            }
        }
        Some(current)
    }

    // ------------------------------------------------------------------------
    // Queries and simulator
    // ------------------------------------------------------------------------

    /// Passes a query bar formula through every mapper in order.
    pub fn map_query(&mut self, query: &str) -> Result<MappedQuery, MapperError> {
        info!(mappers = self.mappers.len(), bytes = query.len(); "Mapping query");
        self.query_layers.clear();

        let mut text = query.to_string();
        let mut diagnostics = Vec::new();
        for (id, factory) in &self.mappers {
            let Some(rewrite) = factory().map_query(&text)? else {
                continue;
            };
            diagnostics.extend(
                rewrite
                    .diagnostics
                    .iter()
                    .filter_map(|diagnostic| self.back_map_query_error(diagnostic)),
            );
            text = rewrite.rewriter.current_text().to_string();
            debug!(mapper = id.as_str(), edits = rewrite.rewriter.records().len(); "Rewrote query");
            self.query_layers.push((id.clone(), rewrite.rewriter));
        }
        Ok(MappedQuery { text, diagnostics })
    }

    /// Maps an engine error on the latest mapped query back to the text the
    /// client typed. The diagnostic's path is ignored.
    pub fn back_map_query_error(&self, diagnostic: &Diagnostic) -> Option<Diagnostic> {
        let mut current = diagnostic.clone();
        for (id, rewriter) in self.query_layers.iter().rev() {
            match rewriter.back_map_diagnostic(&current) {
                Some(mapped) => current = mapped,
                None => {
                    warn!(mapper = id.as_str(); "Discarding query error inside injected text");
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Lets every mapper edit the simulator's process list.
    pub fn map_processes(&self, processes: &mut Vec<ProcessEntry>) {
        for (_, factory) in &self.mappers {
            factory().map_processes(processes);
        }
    }
}

/// Splits `text` before the root element. Without one, everything is body
/// and the codec reports the problem.
fn split_preamble(text: &str) -> (&str, &str) {
    match text.find(ROOT_TAG) {
        Some(at) => text.split_at(at),
        None => ("", text),
    }
}

fn unreadable_model(text: &str, body_offset: usize, err: &MapperError) -> Diagnostic {
    let span = err
        .span()
        .map(|span| Span::new(span.start + body_offset, span.end + body_offset))
        .unwrap_or_else(|| Span::new(body_offset, body_offset));
    let message = match err {
        MapperError::Codec { message, .. } => message.clone(),
        other => other.to_string(),
    };
    Diagnostic::at_span(ROOT_PATH, text, span, message).unrecoverable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::{array_init, hidden_processes, quantifiers};
    use crate::syntax::LineCol;

    fn builtins() -> Orchestrator {
        let registry = MapperRegistry::with_builtins();
        Orchestrator::from_config(&MapperConfig::default(), &registry).unwrap()
    }

    #[test]
    fn unknown_mapper_fails_before_any_work() {
        let registry = MapperRegistry::with_builtins();
        let err = Orchestrator::new(&["array-init", "bogus"], &registry).err().unwrap();
        assert!(matches!(err, MapperError::Registry { .. }));
    }

    #[test]
    fn mapper_order_follows_configuration() {
        let orchestrator = builtins();
        assert_eq!(
            orchestrator.mapper_ids().collect::<Vec<_>>(),
            vec![array_init::ID, quantifiers::ID, hidden_processes::ID]
        );
    }

    #[test]
    fn preamble_is_kept_verbatim() {
        let text = "<?xml version=\"1.0\"?>\n<!DOCTYPE nta>\n<nta><declaration>int a[2] = {7};</declaration></nta>";
        let mapped = builtins().map_model(text).unwrap();
        assert_eq!(
            mapped.text,
            "<?xml version=\"1.0\"?>\n<!DOCTYPE nta>\n<nta><declaration>int a[2] = {7, 7};</declaration></nta>"
        );
        assert!(mapped.diagnostics.is_empty());
    }

    #[test]
    fn unreadable_model_becomes_a_diagnostic() {
        let text = "<?xml version=\"1.0\"?>\n<nta><declaration>int x;</nta>";
        let mapped = builtins().map_model(text).unwrap();
        assert_eq!(mapped.text, text);
        assert_eq!(mapped.diagnostics.len(), 1);
        let diag = &mapped.diagnostics[0];
        assert_eq!(diag.path, ROOT_PATH);
        assert!(diag.is_unrecoverable());
        assert_eq!(diag.range.begin.line, 2);
    }

    #[test]
    fn forward_diagnostics_carry_their_origin() {
        let text = "<nta><declaration>int a[0] = {1};</declaration></nta>";
        let mapped = builtins().map_model(text).unwrap();
        assert_eq!(mapped.diagnostics.len(), 1);
        let origin = mapped.diagnostics[0].origin.as_ref().unwrap();
        assert_eq!(origin.mapper, array_init::ID);
        assert_eq!(origin.phase, "expand");
        assert_eq!(origin.sequence, 0);
    }

    #[test]
    fn query_errors_map_back_through_every_mapper() {
        let mut orchestrator = builtins();
        let mapped = orchestrator.map_query("POSSIBLY done").unwrap();
        assert_eq!(mapped.text, "E<> done");

        let engine = Diagnostic::at_span("/query", &mapped.text, Span::new(4, 8), "unknown identifier");
        let back = orchestrator.back_map_query_error(&engine).unwrap();
        assert_eq!(back.range.begin, LineCol::new(1, 10));
        assert_eq!(back.range.end, LineCol::new(1, 14));

        let inside = Diagnostic::at_span("/query", &mapped.text, Span::new(1, 2), "?");
        assert!(orchestrator.back_map_query_error(&inside).is_none());
    }

    #[test]
    fn processes_pass_through_each_mapper() {
        let mut processes = vec![ProcessEntry::new("A", "__Helper"), ProcessEntry::new("B", "Main")];
        builtins().map_processes(&mut processes);
        assert_eq!(processes, vec![ProcessEntry::new("B", "Main")]);
    }
}
