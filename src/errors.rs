//! Fatal error handling for the mapping engine.
//!
//! # Overview
//!
//! [`MapperError`] is the programming-error class: malformed paths or filters,
//! overlapping rewrite ranges, broken grammar descriptions, unknown mapper
//! ids. These indicate a defect in a mapper or in the core and are never
//! swallowed. Problems with the *input model* are not errors at this level;
//! they become [`Diagnostic`](crate::diagnostics::Diagnostic)s. The single
//! exception is [`MapperError::Codec`], which the orchestrator converts into a
//! diagnostic before it reaches the caller.
//!
//! # Construction Macros
//!
//! - `err_msg!(Variant, "fmt", args..)` for message-only errors.
//! - `err_ctx!(Variant, msg, source, span)` and
//!   `err_ctx!(Variant, msg, source, span, help)` when the offending text is
//!   known, so `miette` can render a labelled snippet.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::syntax::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Source, span and help attached to a [`MapperError`] for rendering.
#[derive(Debug, Default)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: None,
        }
    }
}

/// Unified error type for every fatal failure mode of the mapping engine.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Grammar error: {message}")]
    Grammar { message: String, ctx: ErrorContext },
    #[error("Rewrite error: {message}")]
    Rewrite { message: String, ctx: ErrorContext },
    #[error("Path error: {message}")]
    Path { message: String, ctx: ErrorContext },
    #[error("Registry error: {message}")]
    Registry { message: String, ctx: ErrorContext },
    #[error("Model codec error: {message}")]
    Codec { message: String, ctx: ErrorContext },
    #[error("Configuration error: {message}")]
    Config { message: String, ctx: ErrorContext },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MapperError {
    fn ctx(&self) -> Option<&ErrorContext> {
        match self {
            MapperError::Grammar { ctx, .. }
            | MapperError::Rewrite { ctx, .. }
            | MapperError::Path { ctx, .. }
            | MapperError::Registry { ctx, .. }
            | MapperError::Codec { ctx, .. }
            | MapperError::Config { ctx, .. } => Some(ctx),
            MapperError::Io(_) => None,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            MapperError::Grammar { message, .. }
            | MapperError::Rewrite { message, .. }
            | MapperError::Path { message, .. }
            | MapperError::Registry { message, .. }
            | MapperError::Codec { message, .. }
            | MapperError::Config { message, .. } => Some(message),
            MapperError::Io(_) => None,
        }
    }

    /// True for failures caused by the input text rather than by a defect.
    pub fn is_input_error(&self) -> bool {
        matches!(self, MapperError::Codec { .. })
    }

    /// Byte span of the offending text, when known.
    pub fn span(&self) -> Option<Span> {
        self.ctx().and_then(|ctx| ctx.span)
    }

    fn code_suffix(&self) -> &'static str {
        match self {
            MapperError::Grammar { .. } => "grammar",
            MapperError::Rewrite { .. } => "rewrite",
            MapperError::Path { .. } => "path",
            MapperError::Registry { .. } => "registry",
            MapperError::Codec { .. } => "codec",
            MapperError::Config { .. } => "config",
            MapperError::Io(_) => "io",
        }
    }
}

impl Diagnostic for MapperError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("uppaal_mapper::{}", self.code_suffix())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.ctx()?
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()?
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.ctx()?.span?;
        let len = span.len().max(1);
        let label = LabeledSpan::new(self.message().map(str::to_string), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Wraps a text as a named miette source.
pub fn to_error_source(name: &str, text: &str) -> SourceArc {
    Arc::new(NamedSource::new(name, text.to_string()))
}

/// Constructs a [`MapperError`] variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::errors::MapperError::$variant {
            message: format!($msg $(, $arg)*),
            ctx: $crate::errors::ErrorContext::none(),
        }
    };
}

/// Constructs a [`MapperError`] variant with source text, span and optional help.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::errors::MapperError::$variant {
            message: $msg.to_string(),
            ctx: $crate::errors::ErrorContext {
                source: Some($crate::errors::SourceArc::clone($src)),
                span: Some($span),
                help: Some(format!("{}", $help)),
            },
        }
    };
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::errors::MapperError::$variant {
            message: $msg.to_string(),
            ctx: $crate::errors::ErrorContext::with_source_and_span(
                $crate::errors::SourceArc::clone($src),
                $span,
            ),
        }
    };
}
