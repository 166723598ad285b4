//! Textual quantifiers: spelled-out temporal keywords in queries.
//!
//! | keyword              | operator |
//! |----------------------|----------|
//! | `INVARIABLY`, `ALWAYS` | `A[]`  |
//! | `POSSIBLY`           | `E<>`    |
//! | `EVENTUALLY`         | `A<>`    |
//! | `POTENTIALLY ALWAYS` | `E[]`    |
//! | `LEADS TO`           | `-->`    |
//!
//! Applies to the query bar and to `formula` elements of the model. The
//! operators are injected text, so positions inside them do not map back.

use log::debug;
use once_cell::sync::Lazy;

use super::{Mapper, QueryRewrite, QUERY_PATH};
use crate::diagnostics::Diagnostic;
use crate::dispatch::{NodeContext, Phase, PhaseRun};
use crate::errors::MapperError;
use crate::grammar::Grammar;
use crate::model::NodeKind;
use crate::rewrite::TextRewriter;
use crate::syntax::Span;

pub const ID: &str = "textual-quantifiers";

static KEYWORDS: Lazy<Grammar> = Lazy::new(|| {
    Grammar::compile(
        r#"
        keyword = "POTENTIALLY" "ALWAYS"
                | "INVARIABLY" | "ALWAYS" | "POSSIBLY" | "EVENTUALLY"
                | "LEADS" "TO";
        "#,
    )
    .expect("textual quantifier grammar is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Keyword {
    span: Span,
    operator: &'static str,
    /// Path quantifiers open a formula; leads-to joins two.
    path_quantifier: bool,
}

fn operator_for(keyword: &str) -> Option<(&'static str, bool)> {
    Some(match keyword {
        "INVARIABLY" | "ALWAYS" => ("A[]", true),
        "POSSIBLY" => ("E<>", true),
        "EVENTUALLY" => ("A<>", true),
        "POTENTIALLY ALWAYS" => ("E[]", true),
        "LEADS TO" => ("-->", false),
        _ => return None,
    })
}

fn find_keywords(text: &str) -> Vec<Keyword> {
    KEYWORDS
        .find_all(text)
        .filter_map(|tree| {
            let words: Vec<&str> = tree.leaves().iter().map(|leaf| leaf.text.as_str()).collect();
            let (operator, path_quantifier) = operator_for(&words.join(" "))?;
            Some(Keyword {
                span: tree.span(),
                operator,
                path_quantifier,
            })
        })
        .collect()
}

/// Replaces every keyword through `replace` and reports a second path
/// quantifier through `report`.
fn rewrite_keywords(
    text: &str,
    mut replace: impl FnMut(Span, &'static str) -> Result<(), MapperError>,
    mut report: impl FnMut(Span) -> Diagnostic,
) -> Result<Vec<Diagnostic>, MapperError> {
    let mut diagnostics = Vec::new();
    let mut quantifiers = 0;
    for keyword in find_keywords(text) {
        replace(keyword.span, keyword.operator)?;
        if keyword.path_quantifier {
            quantifiers += 1;
            if quantifiers == 2 {
                diagnostics.push(report(keyword.span));
            }
        }
    }
    Ok(diagnostics)
}

const SECOND_QUANTIFIER: &str = "a formula takes a single path quantifier";

fn rewrite_formula(_: &mut (), ctx: &mut NodeContext<'_>) -> Result<Vec<Diagnostic>, MapperError> {
    let Some(text) = ctx.text() else {
        return Ok(Vec::new());
    };
    let mut edits = Vec::new();
    let diagnostics = rewrite_keywords(
        text,
        |span, operator| {
            edits.push((span, operator));
            Ok(())
        },
        |span| ctx.diagnostic(span, SECOND_QUANTIFIER).with_context(text),
    )?;
    for (span, operator) in edits {
        ctx.replace(span, operator)?;
    }
    Ok(diagnostics)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextualQuantifiers;

pub fn create() -> Box<dyn Mapper> {
    Box::new(TextualQuantifiers)
}

impl Mapper for TextualQuantifiers {
    fn id(&self) -> &'static str {
        ID
    }

    fn phases(&self) -> Vec<Box<dyn PhaseRun>> {
        vec![Box::new(Phase::new("formulas", ()).register(
            NodeKind::Formula,
            &[NodeKind::Query, NodeKind::Formula],
            rewrite_formula,
        ))]
    }

    fn map_query(&self, query: &str) -> Result<Option<QueryRewrite>, MapperError> {
        let mut rewriter = TextRewriter::new(query);
        let diagnostics = rewrite_keywords(
            query,
            |span, operator| rewriter.replace(span, operator),
            |span| Diagnostic::at_span(QUERY_PATH, query, span, SECOND_QUANTIFIER),
        )?;
        if !rewriter.has_edits() {
            return Ok(None);
        }
        debug!(edits = rewriter.records().len(); "Rewrote textual quantifiers in query");
        Ok(Some(QueryRewrite {
            rewriter,
            diagnostics,
        }))
    }
}
