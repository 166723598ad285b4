//! Mappers defined outside the crate, registered next to the built-ins.

mod common;

use uppaal_mapper::dispatch::{NodeContext, Phase, PhaseRun};
use uppaal_mapper::syntax::{LineCol, Span};
use uppaal_mapper::{Diagnostic, Mapper, MapperError, MapperRegistry, NodeKind, Orchestrator};

type HandlerResult = Result<Vec<Diagnostic>, MapperError>;

/// Upper-cases transition guards only.
struct ShoutGuards;

fn shout(_: &mut (), ctx: &mut NodeContext<'_>) -> HandlerResult {
    let Some(text) = ctx.text() else {
        return Ok(Vec::new());
    };
    ctx.replace(Span::new(0, text.len()), &text.to_uppercase())?;
    Ok(Vec::new())
}

impl Mapper for ShoutGuards {
    fn id(&self) -> &'static str {
        "shout-guards"
    }

    fn phases(&self) -> Vec<Box<dyn PhaseRun>> {
        vec![Box::new(Phase::new("shout", ()).register(
            NodeKind::Label,
            &[NodeKind::Transition, NodeKind::Label],
            shout,
        ))]
    }
}

/// Prefixes every declaration with a marker comment.
struct Stamp;

fn stamp(_: &mut (), ctx: &mut NodeContext<'_>) -> HandlerResult {
    if ctx.text().is_some() {
        ctx.replace(Span::new(0, 0), "/*stamped*/ ")?;
    }
    Ok(Vec::new())
}

impl Mapper for Stamp {
    fn id(&self) -> &'static str {
        "stamp"
    }

    fn phases(&self) -> Vec<Box<dyn PhaseRun>> {
        vec![Box::new(Phase::new("stamp", ()).register(NodeKind::Declaration, &[], stamp))]
    }
}

/// Complains about the last character of every declaration it sees.
struct LastChar;

fn last_char(_: &mut (), ctx: &mut NodeContext<'_>) -> HandlerResult {
    let Some(text) = ctx.text() else {
        return Ok(Vec::new());
    };
    let Some(last) = text.len().checked_sub(1) else {
        return Ok(Vec::new());
    };
    Ok(vec![ctx.diagnostic(Span::new(last, last + 1), "last character")])
}

impl Mapper for LastChar {
    fn id(&self) -> &'static str {
        "last-char"
    }

    fn phases(&self) -> Vec<Box<dyn PhaseRun>> {
        vec![Box::new(Phase::new("report", ()).register(NodeKind::Declaration, &[], last_char))]
    }
}

fn shout_guards() -> Box<dyn Mapper> {
    Box::new(ShoutGuards)
}

fn stamper() -> Box<dyn Mapper> {
    Box::new(Stamp)
}

fn last_char_reporter() -> Box<dyn Mapper> {
    Box::new(LastChar)
}

fn registry() -> MapperRegistry {
    let mut registry = MapperRegistry::with_builtins();
    registry.register("shout-guards", shout_guards).unwrap();
    registry.register("stamp", stamper).unwrap();
    registry.register("last-char", last_char_reporter).unwrap();
    registry
}

fn orchestrator(ids: &[&str]) -> Orchestrator {
    Orchestrator::new(ids, &registry()).unwrap()
}

#[test]
fn handlers_fire_only_under_the_filtered_parent() {
    let mapped = orchestrator(&["shout-guards"]).map_model(common::MODEL).unwrap();
    assert!(mapped.text.contains(r#"<label kind="guard">X &gt; 2</label>"#));
    assert!(mapped.text.contains(r#"<label kind="invariant">x &lt;= 5</label>"#));
}

#[test]
fn unrecoverable_diagnostics_shield_the_element_from_later_phases() {
    let model = "<nta>\
        <declaration>int a[0] = {1};\nint b[2] = {3};</declaration>\
        <template><name>P</name><declaration>int c;</declaration></template>\
        </nta>";
    let mapped = orchestrator(&["array-init", "stamp"]).map_model(model).unwrap();

    assert!(mapped
        .text
        .contains("<declaration>int a[0] = {1};\nint b[2] = {3, 3};</declaration>"));
    assert!(mapped.text.contains("<declaration>/*stamped*/ int c;</declaration>"));
    assert_eq!(mapped.diagnostics.len(), 1);
    assert!(mapped.diagnostics[0].is_unrecoverable());
}

#[test]
fn later_phase_diagnostics_are_reported_in_client_coordinates() {
    let model = "<nta><declaration>int a[3] = {1};</declaration></nta>";
    let mapped = orchestrator(&["array-init", "last-char"]).map_model(model).unwrap();

    assert!(mapped.text.contains("int a[3] = {1, 1, 1};"));
    assert_eq!(mapped.diagnostics.len(), 1);
    let diag = &mapped.diagnostics[0];
    assert_eq!(diag.range.begin, LineCol::new(1, 15));
    assert_eq!(diag.range.end, LineCol::new(1, 16));
    let origin = diag.origin.as_ref().unwrap();
    assert_eq!(origin.mapper, "last-char");
    assert_eq!(origin.sequence, 1);
}

#[test]
fn injected_text_swallows_engine_errors() {
    let mut orchestrator = orchestrator(&["stamp"]);
    orchestrator
        .map_model("<nta><declaration>clock x;</declaration></nta>")
        .unwrap();

    let inside = common::engine_diagnostic("/nta/declaration", 1, 3, 5);
    assert!(orchestrator.back_map(&inside).is_none());

    let after = orchestrator
        .back_map(&common::engine_diagnostic("/nta/declaration", 1, 19, 20))
        .unwrap();
    assert_eq!(after.range.begin, LineCol::new(1, 7));
}
