//! End-to-end mapping through the orchestrator's public API.

mod common;

use common::{builtins, engine_diagnostic, mapped_model, MODEL};
use uppaal_mapper::syntax::LineCol;
use uppaal_mapper::{MapperRegistry, Orchestrator, ProcessEntry};

#[test]
fn no_mappers_leave_the_model_untouched() {
    let registry = MapperRegistry::with_builtins();
    let mut orchestrator = Orchestrator::new(&[] as &[&str], &registry).unwrap();
    let mapped = orchestrator.map_model(MODEL).unwrap();
    assert_eq!(mapped.text, MODEL);
    assert!(mapped.diagnostics.is_empty());
}

#[test]
fn models_without_extensions_are_untouched() {
    let plain = MODEL
        .replace("int arr[N] = {0};", "int arr[N];")
        .replace("{-1}", "{-1, -1}")
        .replace("INVARIABLY", "A[]");
    let mapped = builtins().map_model(&plain).unwrap();
    assert_eq!(mapped.text, plain);
    assert!(mapped.diagnostics.is_empty());
}

#[test]
fn builtins_rewrite_declarations_and_formulas() {
    let mapped = builtins().map_model(MODEL).unwrap();
    assert_eq!(mapped.text, mapped_model());
    assert!(mapped.diagnostics.is_empty());
}

#[test]
fn engine_errors_in_expanded_arrays_land_on_the_written_value() {
    let mut orchestrator = builtins();
    orchestrator.map_model(MODEL).unwrap();

    // Line 2 reads `int arr[N] = {0, 0, 0};` after mapping.
    for column in [15, 18, 21] {
        let back = orchestrator
            .back_map(&engine_diagnostic("/nta/declaration", 2, column, column + 1))
            .unwrap();
        assert_eq!(back.range.begin, LineCol::new(2, 15));
        assert_eq!(back.range.end, LineCol::new(2, 16));
    }

    let untouched = engine_diagnostic("/nta/declaration", 3, 7, 8);
    assert_eq!(orchestrator.back_map(&untouched), Some(untouched.clone()));

    // `;` after the initialiser.
    let semicolon = orchestrator
        .back_map(&engine_diagnostic("/nta/declaration", 2, 23, 24))
        .unwrap();
    assert_eq!(semicolon.range.begin, LineCol::new(2, 17));
}

#[test]
fn engine_errors_in_formulas_map_to_the_keyword() {
    let mut orchestrator = builtins();
    orchestrator.map_model(MODEL).unwrap();
    let path = "/nta/queries/query[1]/formula";

    let operator = orchestrator.back_map(&engine_diagnostic(path, 1, 1, 4)).unwrap();
    assert_eq!(operator.range.begin, LineCol::new(1, 1));
    assert_eq!(operator.range.end, LineCol::new(1, 11));

    let operand = orchestrator.back_map(&engine_diagnostic(path, 1, 5, 6)).unwrap();
    assert_eq!(operand.range.begin, LineCol::new(1, 12));

    assert!(orchestrator.back_map(&engine_diagnostic(path, 1, 2, 3)).is_none());
}

#[test]
fn paths_without_rewrites_pass_through() {
    let mut orchestrator = builtins();
    orchestrator.map_model(MODEL).unwrap();
    let diag = engine_diagnostic("/nta/system", 1, 8, 14);
    assert_eq!(orchestrator.back_map(&diag), Some(diag.clone()));
}

#[test]
fn a_new_model_replaces_the_retained_rewrites() {
    let mut orchestrator = builtins();
    orchestrator.map_model(MODEL).unwrap();
    orchestrator
        .map_model("<nta><declaration>clock x;</declaration></nta>")
        .unwrap();
    let diag = engine_diagnostic("/nta/declaration", 2, 21, 22);
    assert_eq!(orchestrator.back_map(&diag), Some(diag.clone()));
}

#[test]
fn unreadable_models_come_back_unchanged() {
    let broken = MODEL.replace("</transition>", "</edge>");
    let mapped = builtins().map_model(&broken).unwrap();
    assert_eq!(mapped.text, broken);
    assert_eq!(mapped.diagnostics.len(), 1);
    let diag = &mapped.diagnostics[0];
    assert_eq!(diag.path, "/nta");
    assert!(diag.is_unrecoverable());
    assert!(diag.message.contains("edge"));
}

#[test]
fn documents_with_unmodelled_elements_still_map() {
    let full = MODEL
        .replace(
            "  <system>",
            "  <instantiation>W2 = Worker();</instantiation>\n  <system>",
        )
        .replace(
            "<comment>bounded</comment>",
            "<comment>bounded</comment><option key=\"trace\" value=\"some\"/>",
        );
    let mapped = builtins().map_model(&full).unwrap();
    assert!(mapped.diagnostics.is_empty());
    assert_eq!(
        mapped.text,
        mapped_model()
            .replace(
                "  <system>",
                "  <instantiation>W2 = Worker();</instantiation>\n  <system>",
            )
            .replace(
                "<comment>bounded</comment>",
                "<comment>bounded</comment><option key=\"trace\" value=\"some\"/>",
            )
    );
}

#[test]
fn query_bar_round_trip() {
    let mut orchestrator = builtins();
    let mapped = orchestrator.map_query("INVARIABLY x > 0").unwrap();
    assert_eq!(mapped.text, "A[] x > 0");
    assert!(mapped.diagnostics.is_empty());

    let back = orchestrator
        .back_map_query_error(&engine_diagnostic("/query", 1, 1, 4))
        .unwrap();
    assert_eq!(back.range.begin, LineCol::new(1, 1));
    assert_eq!(back.range.end, LineCol::new(1, 11));
}

#[test]
fn simulator_hides_helper_processes() {
    let mut processes = vec![
        ProcessEntry::new("Worker", "Worker"),
        ProcessEntry::new("__Clock", "__Clock"),
    ];
    builtins().map_processes(&mut processes);
    assert_eq!(processes, vec![ProcessEntry::new("Worker", "Worker")]);
}
