//! Reads a grammar description into unresolved definitions.
//!
//! Purely syntactic: name resolution, pattern compilation and recursion checks
//! happen in [`Grammar::compile`](crate::grammar::Grammar::compile).

use pest::{error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::err_ctx;
use crate::errors::{to_error_source, MapperError};
use crate::syntax::Span;

#[derive(Parser)]
#[grammar = "grammar/description.pest"]
struct DescriptionParser;

/// Expression before names are resolved to tokens or rules.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawExpr {
    Literal(String),
    Reference(String, Span),
    Seq(Vec<RawExpr>),
    Alt(Vec<RawExpr>),
    Opt(Box<RawExpr>),
    Rep(Box<RawExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Definition {
    Token {
        name: String,
        pattern: String,
        span: Span,
    },
    Rule {
        name: String,
        body: RawExpr,
        span: Span,
    },
    Directive {
        name: String,
        pattern: String,
        span: Span,
    },
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a description into its definitions, in source order.
pub(crate) fn parse_description(source: &str) -> Result<Vec<Definition>, MapperError> {
    let mut pairs = DescriptionParser::parse(Rule::description, source)
        .map_err(|e| convert_parse_error(e, source))?;

    let Some(description) = pairs.next() else {
        return Ok(Vec::new());
    };

    description
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_definition)
        .collect()
}

// ============================================================================
// BUILDERS
// ============================================================================

fn build_definition(pair: Pair<Rule>) -> Result<Definition, MapperError> {
    let span = span_of(&pair);
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();
    let name = next_inner(&mut inner, "definition name")?.as_str().to_string();
    let body = next_inner(&mut inner, "definition body")?;

    match rule {
        Rule::token_def => Ok(Definition::Token {
            name,
            pattern: pattern_text(body),
            span,
        }),
        Rule::directive => Ok(Definition::Directive {
            name,
            pattern: pattern_text(body),
            span,
        }),
        Rule::rule_def => Ok(Definition::Rule {
            name,
            body: build_expr(body)?,
            span,
        }),
        other => Err(crate::err_msg!(
            Grammar,
            "unexpected {:?} at top level of description",
            other
        )),
    }
}

fn build_expr(pair: Pair<Rule>) -> Result<RawExpr, MapperError> {
    match pair.as_rule() {
        Rule::alternatives => {
            let mut alts = pair
                .into_inner()
                .map(build_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if alts.len() == 1 {
                alts.remove(0)
            } else {
                RawExpr::Alt(alts)
            })
        }
        Rule::sequence => {
            let mut terms = pair
                .into_inner()
                .map(build_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if terms.len() == 1 {
                terms.remove(0)
            } else {
                RawExpr::Seq(terms)
            })
        }
        Rule::optional => Ok(RawExpr::Opt(Box::new(build_single_inner(pair)?))),
        Rule::repetition => Ok(RawExpr::Rep(Box::new(build_single_inner(pair)?))),
        Rule::group => build_single_inner(pair),
        Rule::reference => Ok(RawExpr::Reference(
            pair.as_str().to_string(),
            span_of(&pair),
        )),
        Rule::literal => {
            let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(RawExpr::Literal(unescape_literal(body)))
        }
        other => Err(crate::err_msg!(
            Grammar,
            "unexpected {:?} inside a production",
            other
        )),
    }
}

fn build_single_inner(pair: Pair<Rule>) -> Result<RawExpr, MapperError> {
    let mut inner = pair.into_inner();
    build_expr(next_inner(&mut inner, "bracketed alternatives")?)
}

// ============================================================================
// HELPERS
// ============================================================================

fn next_inner<'i>(
    inner: &mut pest::iterators::Pairs<'i, Rule>,
    what: &str,
) -> Result<Pair<'i, Rule>, MapperError> {
    inner
        .next()
        .ok_or_else(|| crate::err_msg!(Grammar, "missing {} in description", what))
}

fn span_of(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    Span::new(span.start(), span.end())
}

fn pattern_text(pair: Pair<Rule>) -> String {
    let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
    body.replace("\\/", "/")
}

fn unescape_literal(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn convert_parse_error(error: pest::error::Error<Rule>, source: &str) -> MapperError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span::at(pos),
        InputLocation::Span((start, end)) => Span::new(start, end),
    };
    let src = to_error_source("grammar description", source);
    err_ctx!(
        Grammar,
        format!("invalid grammar description: {}", error.variant.message()),
        &src,
        span
    )
}
