//! Diagnostics exchanged with the client and the engine.
//!
//! A [`Diagnostic`] addresses one model element by its rendered
//! [`Path`](crate::model::path::Path) and a 1-based line/column range inside
//! that element's text. Mapper handlers emit them during the forward pass; the
//! engine returns them for the rewritten model and they are back-mapped by the
//! [`Orchestrator`](crate::orchestrator::Orchestrator).
//!
//! On the wire a diagnostic is one JSON object per line with the fields
//! `path`, `begln`, `begcol`, `endln`, `endcol`, `msg` and `ctx`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::err_msg;
use crate::errors::MapperError;
use crate::syntax::{LineCol, LineIndex, Span};

/// Advisory severity. Unrecoverable diagnostics stop later phases from
/// running over the same element; nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Recoverable,
    Unrecoverable,
}

/// Inclusive-begin, exclusive-end line/column range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DiagnosticRange {
    pub begin: LineCol,
    pub end: LineCol,
}

impl DiagnosticRange {
    pub fn new(begin: LineCol, end: LineCol) -> Self {
        Self { begin, end }
    }

    /// Range covering `span` in `text`.
    pub fn from_span(text: &str, span: Span) -> Self {
        let index = LineIndex::new(text);
        Self {
            begin: index.line_col(span.start),
            end: index.line_col(span.end),
        }
    }

    /// Byte span of this range in `text`.
    pub fn to_span(&self, text: &str) -> Span {
        let index = LineIndex::new(text);
        let start = index.offset(self.begin);
        let end = index.offset(self.end).max(start);
        Span::new(start, end)
    }
}

/// Which mapper phase produced a forward diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagnosticOrigin {
    pub mapper: String,
    pub phase: String,
    /// Position of the phase in the whole pipeline, counting from zero.
    pub sequence: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub range: DiagnosticRange,
    pub message: String,
    pub context: String,
    pub severity: Severity,
    pub origin: Option<DiagnosticOrigin>,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, range: DiagnosticRange, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            range,
            message: message.into(),
            context: String::new(),
            severity: Severity::Recoverable,
            origin: None,
        }
    }

    /// Diagnostic covering `span` of `text`, the text of the element at `path`.
    pub fn at_span(
        path: impl Into<String>,
        text: &str,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self::new(path, DiagnosticRange::from_span(text, span), message)
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn unrecoverable(mut self) -> Self {
        self.severity = Severity::Unrecoverable;
        self
    }

    pub fn with_origin(mut self, origin: DiagnosticOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn is_unrecoverable(&self) -> bool {
        self.severity == Severity::Unrecoverable
    }

    /// Renders the single-line wire record.
    pub fn to_wire(&self) -> String {
        let wire = WireDiagnostic {
            path: self.path.clone(),
            begln: self.range.begin.line,
            begcol: self.range.begin.column,
            endln: self.range.end.line,
            endcol: self.range.end.column,
            msg: self.message.clone(),
            ctx: self.context.clone(),
        };
        // A struct of strings and integers always serialises.
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Parses one wire record. Severity and origin are not part of the wire
    /// format and come back as their defaults.
    pub fn from_wire(line: &str) -> Result<Self, MapperError> {
        let wire: WireDiagnostic = serde_json::from_str(line.trim())
            .map_err(|e| err_msg!(Codec, "malformed diagnostic record: {}", e))?;
        Ok(Self {
            path: wire.path,
            range: DiagnosticRange {
                begin: LineCol::new(wire.begln, wire.begcol),
                end: LineCol::new(wire.endln, wire.endcol),
            },
            message: wire.msg,
            context: wire.ctx,
            severity: Severity::Recoverable,
            origin: None,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}-{}]: {}",
            self.path, self.range.begin, self.range.end, self.message
        )?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireDiagnostic {
    path: String,
    begln: usize,
    begcol: usize,
    endln: usize,
    endcol: usize,
    msg: String,
    #[serde(default)]
    ctx: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_record_is_single_line_and_escaped() {
        let diag = Diagnostic::new(
            "/nta/template[2]/declaration",
            DiagnosticRange::new(LineCol::new(1, 5), LineCol::new(2, 1)),
            "syntax error: unexpected \"}\"",
        )
        .with_context("line one\nline \\two");
        let wire = diag.to_wire();
        assert!(!wire.contains('\n'));
        assert!(wire.contains(r#"\"}\""#));
        assert!(wire.contains(r"\\two"));

        let back = Diagnostic::from_wire(&wire).unwrap();
        assert_eq!(back, diag);
    }

    #[test]
    fn from_wire_tolerates_missing_context() {
        let line = r#"{"path":"/nta/system","begln":1,"begcol":2,"endln":1,"endcol":4,"msg":"bad"}"#;
        let diag = Diagnostic::from_wire(line).unwrap();
        assert_eq!(diag.path, "/nta/system");
        assert_eq!(diag.range.begin, LineCol::new(1, 2));
        assert!(diag.context.is_empty());
    }

    #[test]
    fn from_wire_rejects_garbage() {
        let err = Diagnostic::from_wire("path=/nta").unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn range_span_conversion() {
        let text = "int a;\nint b[2] = {1};";
        let span = Span::new(11, 12);
        let range = DiagnosticRange::from_span(text, span);
        assert_eq!(range.begin, LineCol::new(2, 5));
        assert_eq!(range.to_span(text), span);
    }
}
