//! Per-field edit buffer with a reverse position map.
//!
//! A [`TextRewriter`] holds the original text of one model field verbatim and
//! accepts replacements addressed in *original* coordinates, in ascending
//! order. It keeps the running offset delta itself, so callers that collected
//! spans from a parse of the original text can apply them directly.
//!
//! [`TextRewriter::back_map`] answers the inverse question for any offset in
//! the current text: where was it in the original, if anywhere?

use crate::diagnostics::{Diagnostic, DiagnosticRange};
use crate::err_msg;
use crate::errors::MapperError;
use crate::syntax::Span;

/// How offsets strictly inside a replacement translate back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackMapPolicy {
    /// The replacement is injected text: interior offsets have no original
    /// counterpart, unless the replacement has the same length as the range
    /// it replaced.
    Discard,
    /// The replacement only repeats user text: interior offsets map to the
    /// start of the original range.
    Anchored,
}

/// One accepted edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRecord {
    pub original: Span,
    pub rewritten: Span,
    pub replacement: String,
    pub policy: BackMapPolicy,
}

#[derive(Debug, Clone)]
pub struct TextRewriter {
    original: String,
    current: String,
    records: Vec<RewriteRecord>,
    delta: isize,
}

impl TextRewriter {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        Self {
            current: original.clone(),
            original,
            records: Vec::new(),
            delta: 0,
        }
    }

    pub fn original_text(&self) -> &str {
        &self.original
    }

    pub fn current_text(&self) -> &str {
        &self.current
    }

    pub fn records(&self) -> &[RewriteRecord] {
        &self.records
    }

    pub fn has_edits(&self) -> bool {
        !self.records.is_empty()
    }

    /// Replaces `range` of the original text with `text`.
    ///
    /// # Errors
    /// `MapperError::Rewrite` when `range` is out of bounds, splits a
    /// character, or starts before the end of the previous edit.
    pub fn replace(&mut self, range: Span, text: &str) -> Result<(), MapperError> {
        self.apply(range, text, BackMapPolicy::Discard)
    }

    /// Like [`replace`](Self::replace), but positions inside the replacement
    /// back-map to the start of `range` instead of being discarded.
    pub fn replace_anchored(&mut self, range: Span, text: &str) -> Result<(), MapperError> {
        self.apply(range, text, BackMapPolicy::Anchored)
    }

    fn apply(&mut self, range: Span, text: &str, policy: BackMapPolicy) -> Result<(), MapperError> {
        if range.start > range.end || range.end > self.original.len() {
            return Err(err_msg!(
                Rewrite,
                "edit range {} is outside the original text (length {})",
                range,
                self.original.len()
            ));
        }
        if !self.original.is_char_boundary(range.start) || !self.original.is_char_boundary(range.end)
        {
            return Err(err_msg!(
                Rewrite,
                "edit range {} splits a character",
                range
            ));
        }
        if let Some(last) = self.records.last() {
            if range.start < last.original.end {
                return Err(err_msg!(
                    Rewrite,
                    "edit range {} overlaps or precedes the previous edit {}",
                    range,
                    last.original
                ));
            }
        }

        let start = shift(range.start, self.delta);
        self.current.replace_range(start..start + range.len(), text);
        self.delta += text.len() as isize - range.len() as isize;
        self.records.push(RewriteRecord {
            original: range,
            rewritten: Span::new(start, start + text.len()),
            replacement: text.to_string(),
            policy,
        });
        Ok(())
    }

    /// Translates an offset in the current text to the original text.
    ///
    /// Returns `None` for offsets strictly inside an injected replacement.
    /// Offsets past the end of the current text are clamped to it.
    pub fn back_map(&self, offset: usize) -> Option<usize> {
        let offset = offset.min(self.current.len());
        let mut delta: isize = 0;
        for record in &self.records {
            let r = record.rewritten;
            if offset < r.start {
                break;
            }
            if offset >= r.end {
                delta = r.end as isize - record.original.end as isize;
                continue;
            }
            if offset == r.start {
                return Some(record.original.start);
            }
            return inside(record, offset);
        }
        Some(shift(offset, -delta))
    }

    /// Translates a span of the current text.
    ///
    /// The start decides whether the span survives. An end that falls inside a
    /// replacement widens to the end of the range that replacement stands for.
    pub fn back_map_span(&self, span: Span) -> Option<Span> {
        let start = self.back_map(span.start)?;
        let end = match self.enclosing(span.end) {
            Some(record) if record.policy == BackMapPolicy::Anchored || !same_length(record) => {
                record.original.end
            }
            _ => self.back_map(span.end)?,
        };
        Some(Span::new(start, end.max(start)))
    }

    /// Moves a diagnostic positioned in the current text to the original.
    pub fn back_map_diagnostic(&self, diagnostic: &Diagnostic) -> Option<Diagnostic> {
        let span = diagnostic.range.to_span(&self.current);
        let original = self.back_map_span(span)?;
        let mut mapped = diagnostic.clone();
        mapped.range = DiagnosticRange::from_span(&self.original, original);
        Some(mapped)
    }

    /// The record whose replacement strictly contains `offset`.
    fn enclosing(&self, offset: usize) -> Option<&RewriteRecord> {
        self.records
            .iter()
            .find(|r| r.rewritten.start < offset && offset < r.rewritten.end)
    }
}

fn inside(record: &RewriteRecord, offset: usize) -> Option<usize> {
    if same_length(record) {
        return Some(record.original.start + (offset - record.rewritten.start));
    }
    match record.policy {
        BackMapPolicy::Anchored => Some(record.original.start),
        BackMapPolicy::Discard => None,
    }
}

fn same_length(record: &RewriteRecord) -> bool {
    record.original.len() == record.rewritten.len()
}

fn shift(offset: usize, delta: isize) -> usize {
    (offset as isize + delta).max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn replacements_use_original_coordinates() {
        let mut rw = TextRewriter::new("INVARIABLY x > 0 && POSSIBLY y");
        rw.replace(Span::new(0, 10), "A[]").unwrap();
        rw.replace(Span::new(20, 28), "E<>").unwrap();
        assert_eq!(rw.current_text(), "A[] x > 0 && E<> y");
        assert_eq!(rw.original_text(), "INVARIABLY x > 0 && POSSIBLY y");
        assert_eq!(rw.records().len(), 2);
    }

    #[test]
    fn back_map_around_a_shrinking_edit() {
        let mut rw = TextRewriter::new("INVARIABLY x > 0");
        rw.replace(Span::new(0, 10), "A[]").unwrap();
        assert_eq!(rw.back_map(0), Some(0));
        assert_eq!(rw.back_map(1), None);
        assert_eq!(rw.back_map(2), None);
        assert_eq!(rw.back_map(3), Some(10));
        // "x" sits at 4 now and at 11 before.
        assert_eq!(rw.back_map(4), Some(11));
        assert_eq!(rw.back_map(100), Some(16));
    }

    #[test]
    fn anchored_interior_maps_to_range_start() {
        let text = "int arr[3] = {0};";
        let mut rw = TextRewriter::new(text);
        rw.replace_anchored(Span::new(14, 15), "0, 0, 0").unwrap();
        assert_eq!(rw.current_text(), "int arr[3] = {0, 0, 0};");
        for copy in [14, 17, 20] {
            assert_eq!(
                rw.back_map_span(Span::new(copy, copy + 1)),
                Some(Span::new(14, 15))
            );
        }
        // Outside the expansion nothing moves except the trailing delta.
        assert_eq!(rw.back_map_span(Span::new(4, 7)), Some(Span::new(4, 7)));
        assert_eq!(rw.back_map(22), Some(16));
    }

    #[test]
    fn same_length_replacement_maps_one_to_one() {
        let mut rw = TextRewriter::new("abcdef");
        rw.replace(Span::new(1, 4), "XYZ").unwrap();
        assert_eq!(rw.back_map(2), Some(2));
        assert_eq!(rw.back_map(3), Some(3));
    }

    #[test]
    fn span_end_inside_injection_widens_to_original_end() {
        let mut rw = TextRewriter::new("INVARIABLY x");
        rw.replace(Span::new(0, 10), "A[]").unwrap();
        assert_eq!(rw.back_map_span(Span::new(0, 1)), Some(Span::new(0, 10)));
        assert_eq!(rw.back_map_span(Span::new(1, 3)), None);
    }

    #[test]
    fn overlapping_or_unordered_edits_fail_fast() {
        let mut rw = TextRewriter::new("0123456789");
        rw.replace(Span::new(4, 6), "x").unwrap();
        assert!(rw.replace(Span::new(5, 7), "y").is_err());
        assert!(rw.replace(Span::new(0, 1), "y").is_err());
        // Touching the previous edit is fine.
        rw.replace(Span::new(6, 7), "y").unwrap();
        assert_eq!(rw.current_text(), "0123xy789");
    }

    #[test]
    fn out_of_bounds_and_split_characters_are_rejected() {
        let mut rw = TextRewriter::new("aé");
        let err = rw.replace(Span::new(1, 9), "x").unwrap_err();
        assert!(err.to_string().contains("outside the original text"));
        assert!(rw.replace(Span::new(2, 3), "x").is_err());
        assert!(!rw.has_edits());
    }

    #[test]
    fn insertion_into_empty_range() {
        let mut rw = TextRewriter::new("ab");
        rw.replace(Span::at(1), "___").unwrap();
        assert_eq!(rw.current_text(), "a___b");
        assert_eq!(rw.back_map(1), Some(1));
        assert_eq!(rw.back_map(2), None);
        assert_eq!(rw.back_map(4), Some(1));
    }

    // ===================
    // Property Laws
    // ===================

    /// A kept run, followed by an edit that replaces `removed` with `inserted`.
    fn segment_strategy() -> impl Strategy<Value = (String, String, String)> {
        ("[a-z ]{0,6}", "[a-z]{0,5}", "[A-Z]{0,5}")
    }

    struct Scenario {
        original: String,
        expected: String,
        /// (current offset, original offset) for every kept byte.
        kept: Vec<(usize, usize)>,
        /// Offsets strictly inside replacements whose length changed.
        injected: Vec<usize>,
        rewriter: TextRewriter,
    }

    fn build(segments: &[(String, String, String)], tail: &str) -> Scenario {
        let mut original = String::new();
        let mut expected = String::new();
        let mut kept = Vec::new();
        let mut injected = Vec::new();
        let mut edits = Vec::new();
        let mut keep_run = |keep: &str, original: &mut String, expected: &mut String| {
            kept.extend((0..keep.len()).map(|i| (expected.len() + i, original.len() + i)));
            original.push_str(keep);
            expected.push_str(keep);
        };
        for (keep, removed, inserted) in segments {
            keep_run(keep, &mut original, &mut expected);
            let start = original.len();
            original.push_str(removed);
            let current_start = expected.len();
            expected.push_str(inserted);
            if removed.len() != inserted.len() {
                injected.extend(current_start + 1..current_start + inserted.len());
            }
            edits.push((Span::new(start, start + removed.len()), inserted.clone()));
        }
        keep_run(tail, &mut original, &mut expected);

        let mut rewriter = TextRewriter::new(original.clone());
        for (range, text) in &edits {
            rewriter.replace(*range, text).expect("ascending edits");
        }
        Scenario {
            original,
            expected,
            kept,
            injected,
            rewriter,
        }
    }

    fn check_offset_correctness(
        segments: &[(String, String, String)],
        tail: &str,
    ) -> Result<(), TestCaseError> {
        let s = build(segments, tail);
        prop_assert_eq!(s.rewriter.current_text(), s.expected.as_str());
        prop_assert_eq!(s.rewriter.original_text(), s.original.as_str());
        for (current, original) in &s.kept {
            prop_assert_eq!(s.rewriter.back_map(*current), Some(*original));
        }
        Ok(())
    }

    fn check_discard_law(
        segments: &[(String, String, String)],
        tail: &str,
    ) -> Result<(), TestCaseError> {
        let s = build(segments, tail);
        for offset in &s.injected {
            prop_assert_eq!(s.rewriter.back_map(*offset), None);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn offsets_outside_edits_round_trip(
            segments in prop::collection::vec(segment_strategy(), 0..6),
            tail in "[a-z ]{0,6}",
        ) {
            check_offset_correctness(&segments, &tail)?;
        }

        #[test]
        fn offsets_inside_injections_are_discarded(
            segments in prop::collection::vec(segment_strategy(), 0..6),
            tail in "[a-z ]{0,6}",
        ) {
            check_discard_law(&segments, &tail)?;
        }
    }
}
