//! The grammar engine.
//!
//! A [`Grammar`] is compiled once from a compact description (see
//! `grammar/description.pest`) and then used two ways:
//!
//! - [`Grammar::match_exact`] parses a whole text against the top rule;
//! - [`Grammar::find_all`] scans a larger text for every occurrence of the
//!   top rule, left to right.
//!
//! Neither reports failure as an error. A text that does not match simply
//! yields `None` or no matches; the caller skips it and lets the engine
//! complain about whatever it finds invalid.
//!
//! Compiled grammars are immutable and `Sync`. Mappers keep theirs in
//! process-wide `once_cell::sync::Lazy` statics.
//!
//! ## Shared tokens
//!
//! Every grammar can reference `IDENT`, `INT` and `BOOL` without defining
//! them. Terminals that end in a word character never match directly before
//! another word character, so `"int"` does not match the front of `integer`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;

use crate::err_ctx;
use crate::errors::{to_error_source, MapperError, SourceArc};
use crate::syntax::Span;

mod description;
mod matcher;
pub mod tree;

pub use tree::{Leaf, Node, ParseTree};

use description::{parse_description, Definition, RawExpr};

pub const IDENT_PATTERN: &str = "[A-Za-z_][A-Za-z0-9_]*";
pub const INT_PATTERN: &str = "0+|[1-9][0-9]*";
pub const BOOL_PATTERN: &str = "true|false";
pub const DEFAULT_SKIP_PATTERN: &str = r"\s+";

const BUILTIN_TOKENS: [(&str, &str); 3] = [
    ("IDENT", IDENT_PATTERN),
    ("INT", INT_PATTERN),
    ("BOOL", BOOL_PATTERN),
];

// ============================================================================
// COMPILED FORM
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Literal(Arc<str>),
    Token(usize),
    Rule(usize),
    Seq(Vec<Expr>),
    Alt(Vec<Expr>),
    Opt(Box<Expr>),
    /// Zero or more iterations; the id is unique within its grammar.
    Rep(Box<Expr>, usize),
}

#[derive(Debug)]
pub(crate) struct TokenDef {
    pub(crate) name: Arc<str>,
    pub(crate) regex: Regex,
}

#[derive(Debug)]
pub(crate) struct RuleDef {
    pub(crate) name: Arc<str>,
    pub(crate) body: Expr,
}

/// A compiled grammar: named tokens, named productions and a top rule.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) tokens: Vec<TokenDef>,
    pub(crate) rules: Vec<RuleDef>,
    pub(crate) skip: Regex,
    pub(crate) top: usize,
}

impl Grammar {
    /// Compiles a grammar description.
    ///
    /// # Errors
    /// `MapperError::Grammar` for description syntax errors, invalid regular
    /// expressions, duplicate or undefined names, a description without
    /// productions, and left-recursive rules.
    pub fn compile(source: &str) -> Result<Self, MapperError> {
        let definitions = parse_description(source)?;
        let src = to_error_source("grammar description", source);
        Compiler::new(&src).compile(definitions)
    }

    /// Name of the top rule.
    pub fn top_rule(&self) -> &str {
        &self.rules[self.top].name
    }

    /// Parses the whole of `text` against the top rule.
    ///
    /// Leading and trailing skip input is allowed; anything else left over
    /// means no match.
    pub fn match_exact(&self, text: &str) -> Option<ParseTree> {
        matcher::Matcher::new(self, text).match_exact()
    }

    /// Lazily yields every non-overlapping match of the top rule in `text`.
    ///
    /// At each position the longest derivation wins and scanning resumes after
    /// it; where nothing matches, scanning advances one character.
    pub fn find_all<'g, 't>(&'g self, text: &'t str) -> FindAll<'g, 't> {
        FindAll {
            matcher: matcher::Matcher::new(self, text),
            pos: 0,
        }
    }
}

/// Iterator returned by [`Grammar::find_all`].
pub struct FindAll<'g, 't> {
    matcher: matcher::Matcher<'g, 't>,
    pos: usize,
}

impl Iterator for FindAll<'_, '_> {
    type Item = ParseTree;

    fn next(&mut self) -> Option<ParseTree> {
        let text = self.matcher.text();
        while self.pos < text.len() {
            if let Some((tree, end)) = self.matcher.longest_at(self.pos) {
                self.pos = end;
                return Some(tree);
            }
            self.pos += text[self.pos..].chars().next().map_or(1, char::len_utf8);
        }
        None
    }
}

// ============================================================================
// COMPILER
// ============================================================================

struct Compiler<'s> {
    src: &'s SourceArc,
    tokens: Vec<TokenDef>,
    token_index: HashMap<String, usize>,
    rule_index: HashMap<String, usize>,
    repetitions: usize,
}

impl<'s> Compiler<'s> {
    fn new(src: &'s SourceArc) -> Self {
        Self {
            src,
            tokens: Vec::new(),
            token_index: HashMap::new(),
            rule_index: HashMap::new(),
            repetitions: 0,
        }
    }

    fn compile(mut self, definitions: Vec<Definition>) -> Result<Grammar, MapperError> {
        let mut skip = Regex::new(&anchored(DEFAULT_SKIP_PATTERN)).map_err(|e| {
            crate::err_msg!(Grammar, "default skip pattern does not compile: {}", e)
        })?;

        for (name, pattern) in BUILTIN_TOKENS {
            self.add_token(name, pattern, Span::default())?;
        }

        // Names first, so productions can reference later definitions.
        let mut raw_rules = Vec::new();
        for definition in definitions {
            match definition {
                Definition::Directive {
                    name,
                    pattern,
                    span,
                } => {
                    if name != "skip" {
                        return Err(err_ctx!(
                            Grammar,
                            format!("unknown directive '@{name}'"),
                            self.src,
                            span,
                            "the only directive is @skip"
                        ));
                    }
                    skip = self.compile_pattern("@skip", &pattern, span)?;
                }
                Definition::Token {
                    ref name,
                    ref pattern,
                    span,
                } => {
                    if BUILTIN_TOKENS.iter().any(|(builtin, _)| *builtin == name.as_str()) {
                        return Err(self.duplicate(name, span));
                    }
                    self.add_token(name, pattern, span)?;
                }
                Definition::Rule { name, body, span } => {
                    if self.token_index.contains_key(&name) || self.rule_index.contains_key(&name)
                    {
                        return Err(self.duplicate(&name, span));
                    }
                    self.rule_index.insert(name.clone(), raw_rules.len());
                    raw_rules.push((name, body, span));
                }
            }
        }

        if raw_rules.is_empty() {
            return Err(crate::err_msg!(
                Grammar,
                "grammar description defines no production rule"
            ));
        }

        for (name, _, span) in &raw_rules {
            if self.token_index.contains_key(name) {
                return Err(self.duplicate(name, *span));
            }
        }

        let mut rules = Vec::with_capacity(raw_rules.len());
        for (name, body, _) in &raw_rules {
            rules.push(RuleDef {
                name: Arc::from(name.as_str()),
                body: self.resolve(name, body)?,
            });
        }

        check_left_recursion(&rules, &raw_rules, self.src)?;

        Ok(Grammar {
            tokens: self.tokens,
            rules,
            skip,
            top: 0,
        })
    }

    fn add_token(&mut self, name: &str, pattern: &str, span: Span) -> Result<(), MapperError> {
        if self.token_index.contains_key(name) {
            return Err(self.duplicate(name, span));
        }
        let regex = self.compile_pattern(name, pattern, span)?;
        self.token_index.insert(name.to_string(), self.tokens.len());
        self.tokens.push(TokenDef {
            name: Arc::from(name),
            regex,
        });
        Ok(())
    }

    fn compile_pattern(&self, name: &str, pattern: &str, span: Span) -> Result<Regex, MapperError> {
        Regex::new(&anchored(pattern)).map_err(|e| {
            err_ctx!(
                Grammar,
                format!("invalid pattern for '{name}'"),
                self.src,
                span,
                e
            )
        })
    }

    fn resolve(&mut self, rule: &str, expr: &RawExpr) -> Result<Expr, MapperError> {
        Ok(match expr {
            RawExpr::Literal(text) => Expr::Literal(Arc::from(text.as_str())),
            RawExpr::Reference(name, span) => {
                if let Some(&index) = self.token_index.get(name) {
                    Expr::Token(index)
                } else if let Some(&index) = self.rule_index.get(name) {
                    Expr::Rule(index)
                } else {
                    return Err(err_ctx!(
                        Grammar,
                        format!("rule '{rule}' references undefined name '{name}'"),
                        self.src,
                        *span,
                        "define the name or use one of IDENT, INT, BOOL"
                    ));
                }
            }
            RawExpr::Seq(items) => Expr::Seq(
                items
                    .iter()
                    .map(|e| self.resolve(rule, e))
                    .collect::<Result<_, _>>()?,
            ),
            RawExpr::Alt(items) => Expr::Alt(
                items
                    .iter()
                    .map(|e| self.resolve(rule, e))
                    .collect::<Result<_, _>>()?,
            ),
            RawExpr::Opt(inner) => Expr::Opt(Box::new(self.resolve(rule, inner)?)),
            RawExpr::Rep(inner) => {
                let inner = self.resolve(rule, inner)?;
                self.repetitions += 1;
                Expr::Rep(Box::new(inner), self.repetitions)
            }
        })
    }

    fn duplicate(&self, name: &str, span: Span) -> MapperError {
        err_ctx!(
            Grammar,
            format!("'{name}' is defined more than once"),
            self.src,
            span
        )
    }
}

fn anchored(pattern: &str) -> String {
    format!("^(?:{pattern})")
}

// ============================================================================
// LEFT RECURSION CHECK
// ============================================================================

/// Rejects rules that can reach themselves without consuming input, which
/// would send the backtracking matcher into unbounded recursion.
fn check_left_recursion(
    rules: &[RuleDef],
    raw_rules: &[(String, RawExpr, Span)],
    src: &SourceArc,
) -> Result<(), MapperError> {
    let nullable = nullable_rules(rules);
    let left_calls: Vec<HashSet<usize>> = rules
        .iter()
        .map(|rule| {
            let mut calls = HashSet::new();
            leftmost_rules(&rule.body, &nullable, &mut calls);
            calls
        })
        .collect();

    for start in 0..rules.len() {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            for &next in &left_calls[current] {
                if next == start {
                    let (name, _, span) = &raw_rules[start];
                    return Err(err_ctx!(
                        Grammar,
                        format!("rule '{name}' is left-recursive"),
                        src,
                        *span,
                        "rewrite the recursion as a repetition { ... }"
                    ));
                }
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
    }
    Ok(())
}

fn nullable_rules(rules: &[RuleDef]) -> Vec<bool> {
    let mut nullable = vec![false; rules.len()];
    loop {
        let mut changed = false;
        for (i, rule) in rules.iter().enumerate() {
            if !nullable[i] && is_nullable(&rule.body, &nullable) {
                nullable[i] = true;
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}

fn is_nullable(expr: &Expr, nullable: &[bool]) -> bool {
    match expr {
        Expr::Literal(text) => text.is_empty(),
        Expr::Token(_) => false,
        Expr::Rule(index) => nullable[*index],
        Expr::Seq(items) => items.iter().all(|e| is_nullable(e, nullable)),
        Expr::Alt(items) => items.iter().any(|e| is_nullable(e, nullable)),
        Expr::Opt(_) | Expr::Rep(..) => true,
    }
}

/// Collects the rules `expr` may call before consuming any input.
/// Returns whether `expr` itself is nullable.
fn leftmost_rules(expr: &Expr, nullable: &[bool], out: &mut HashSet<usize>) -> bool {
    match expr {
        Expr::Literal(text) => text.is_empty(),
        Expr::Token(_) => false,
        Expr::Rule(index) => {
            out.insert(*index);
            nullable[*index]
        }
        Expr::Seq(items) => {
            for item in items {
                if !leftmost_rules(item, nullable, out) {
                    return false;
                }
            }
            true
        }
        Expr::Alt(items) => {
            let mut any = false;
            for item in items {
                any |= leftmost_rules(item, nullable, out);
            }
            any
        }
        Expr::Opt(inner) | Expr::Rep(inner, _) => {
            leftmost_rules(inner, nullable, out);
            true
        }
    }
}
