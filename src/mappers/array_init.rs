//! Array initialiser shorthand.
//!
//! `int arr[3] = {0};` declares every element with the single value given:
//! the initialiser is expanded to `{0, 0, 0}`. The size may be an integer
//! literal or an integer constant declared earlier, globally or in the
//! enclosing template.
//!
//! The expansion only repeats what the user wrote, so any position inside it
//! maps back to the original value.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::Mapper;
use crate::diagnostics::Diagnostic;
use crate::dispatch::{NodeContext, Phase, PhaseRun};
use crate::errors::MapperError;
use crate::grammar::Grammar;
use crate::model::NodeKind;

pub const ID: &str = "array-init";

/// Larger arrays are left for the engine to reject.
pub const MAX_EXPANDED_SIZE: i64 = 1 << 16;

static ARRAY_DECL: Lazy<Grammar> = Lazy::new(|| {
    Grammar::compile(
        r#"
        decl      = { qualifier } IDENT IDENT "[" size "]" "=" "{" value "}" ";";
        qualifier = "const" | "meta";
        size      = INT | IDENT;
        value     = ["-"] INT | BOOL | IDENT;
        "#,
    )
    .expect("array declaration grammar is valid")
});

static INT_CONST: Lazy<Grammar> = Lazy::new(|| {
    Grammar::compile(
        r#"
        constant = "const" "int" IDENT "=" ["-"] INT ";";
        "#,
    )
    .expect("integer constant grammar is valid")
});

/// Integer constants visible at the current point of the walk, innermost
/// scope last.
#[derive(Debug, Default)]
pub struct Scopes {
    frames: Vec<HashMap<String, i64>>,
}

impl Scopes {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.frames.iter().rev().find_map(|frame| frame.get(name).copied())
    }

    fn define(&mut self, name: String, value: i64) {
        if self.frames.is_empty() {
            self.frames.push(HashMap::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
    }
}

fn enter_template(scopes: &mut Scopes, _: &mut NodeContext<'_>) -> Result<Vec<Diagnostic>, MapperError> {
    scopes.frames.push(HashMap::new());
    Ok(Vec::new())
}

fn leave_template(scopes: &mut Scopes, _: &mut NodeContext<'_>) -> Result<Vec<Diagnostic>, MapperError> {
    scopes.frames.pop();
    Ok(Vec::new())
}

struct Constant {
    start: usize,
    name: String,
    value: i64,
}

fn constants(text: &str) -> Vec<Constant> {
    INT_CONST
        .find_all(text)
        .filter_map(|tree| {
            let node = tree.as_node()?;
            let name = node.leaf("IDENT")?.text.clone();
            let digits = &node.leaf("INT")?.text;
            let negative = node.leaf("-").is_some();
            let value: i64 = digits.parse().ok()?;
            Some(Constant {
                start: tree.span().start,
                name,
                value: if negative { -value } else { value },
            })
        })
        .collect()
}

fn expand_declaration(scopes: &mut Scopes, ctx: &mut NodeContext<'_>) -> Result<Vec<Diagnostic>, MapperError> {
    let Some(text) = ctx.text() else {
        return Ok(Vec::new());
    };
    let local = constants(text);
    let mut diagnostics = Vec::new();

    for decl in ARRAY_DECL.find_all(text) {
        let (Some(size), Some(value)) = (decl.find("size"), decl.find("value")) else {
            continue;
        };
        let size_text = &text[size.span.start..size.span.end];
        let resolved = match size_text.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => lookup(size_text, decl.span().start, &local, scopes),
        };
        let Some(n) = resolved else {
            diagnostics.push(
                ctx.diagnostic(
                    size.span,
                    format!("array size '{size_text}' is not a known integer constant"),
                )
                .with_context("the initialiser is left as written"),
            );
            continue;
        };
        if n <= 0 {
            diagnostics.push(
                ctx.diagnostic(size.span, format!("array size must be positive, found {n}"))
                    .unrecoverable(),
            );
            continue;
        }
        if n == 1 || n > MAX_EXPANDED_SIZE {
            continue;
        }
        let element = &text[value.span.start..value.span.end];
        let expanded = vec![element; n as usize].join(", ");
        ctx.replace_anchored(value.span, &expanded)?;
    }

    for constant in local {
        scopes.define(constant.name, constant.value);
    }
    Ok(diagnostics)
}

/// Latest definition before `before` in this text, else the enclosing scopes.
fn lookup(name: &str, before: usize, local: &[Constant], scopes: &Scopes) -> Option<i64> {
    local
        .iter()
        .rev()
        .find(|c| c.start < before && c.name == name)
        .map(|c| c.value)
        .or_else(|| scopes.lookup(name))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArrayInit;

pub fn create() -> Box<dyn Mapper> {
    Box::new(ArrayInit)
}

impl Mapper for ArrayInit {
    fn id(&self) -> &'static str {
        ID
    }

    fn phases(&self) -> Vec<Box<dyn PhaseRun>> {
        let phase = Phase::new("expand", Scopes::default())
            .register(NodeKind::Template, &[], enter_template)
            .register_exit(NodeKind::Template, &[], leave_template)
            .register(NodeKind::Declaration, &[], expand_declaration);
        vec![Box::new(phase)]
    }
}
