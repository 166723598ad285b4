//! Reading and writing model documents.
//!
//! [`ModelCodec`] is the seam between the mapping engine and the document
//! format. [`XmlCodec`] implements it for the XML model format. It remembers
//! where every text field sat in the source document and writes back by
//! splicing only the fields whose text changed, so an untouched tree
//! serialises to the exact input bytes.

use log::debug;
use pest::{
    error::InputLocation,
    iterators::{Pair, Pairs},
    Parser,
};
use pest_derive::Parser;

use super::{ModelTree, NodeId, NodeKind};
use crate::err_ctx;
use crate::errors::{to_error_source, MapperError, SourceArc};
use crate::syntax::Span;

/// Converts between model text and [`ModelTree`].
pub trait ModelCodec {
    fn parse(&self, text: &str) -> Result<ModelTree, MapperError>;
    fn serialize(&self, tree: &ModelTree) -> Result<String, MapperError>;
}

/// Where a text field's content sits in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextSlot {
    /// Raw content between the tags, or the `/>` of a self-closing element.
    pub(crate) span: Span,
    pub(crate) self_closing: bool,
    /// Decoded text as read, to detect changes.
    pub(crate) original: String,
}

#[derive(Parser)]
#[grammar = "model/xml.pest"]
struct XmlParser;

#[derive(Debug, Default, Clone, Copy)]
pub struct XmlCodec;

impl ModelCodec for XmlCodec {
    fn parse(&self, text: &str) -> Result<ModelTree, MapperError> {
        let src = to_error_source("model", text);
        let mut pairs = XmlParser::parse(Rule::document, text).map_err(|e| {
            let span = match e.location {
                InputLocation::Pos(pos) => Span::at(pos),
                InputLocation::Span((start, end)) => Span::new(start, end),
            };
            err_ctx!(
                Codec,
                format!("malformed model document: {}", e.variant.message()),
                &src,
                span
            )
        })?;

        let root = pairs
            .next()
            .into_iter()
            .flat_map(Pair::into_inner)
            .find(|p| p.as_rule() == Rule::element)
            .ok_or_else(|| crate::err_msg!(Codec, "model document has no root element"))?;

        let mut reader = Reader {
            src: &src,
            tree: ModelTree::new(),
        };
        reader.read_element(root, None)?;
        let mut tree = reader.tree;
        tree.source = Some(text.to_string());
        Ok(tree)
    }

    fn serialize(&self, tree: &ModelTree) -> Result<String, MapperError> {
        match &tree.source {
            Some(source) => splice(tree, source),
            None => {
                let mut out = String::new();
                render(tree, tree.root(), 0, &mut out);
                Ok(out)
            }
        }
    }
}

// ============================================================================
// READER
// ============================================================================

struct Reader<'s> {
    src: &'s SourceArc,
    tree: ModelTree,
}

impl Reader<'_> {
    fn read_element(&mut self, pair: Pair<Rule>, parent: Option<NodeId>) -> Result<(), MapperError> {
        let span = span_of(&pair);
        let mut parts = pair.into_inner();
        let Some(head) = parts.next() else {
            return Err(self.error("empty element", span));
        };
        let self_closing = head.as_rule() == Rule::empty_element;

        let mut head_parts = head.into_inner();
        let name_pair = head_parts
            .next()
            .ok_or_else(|| self.error("element without a name", span))?;
        let name = name_pair.as_str();
        let Some(kind) = NodeKind::from_tag(name) else {
            if parent.is_none() {
                return Err(self.error(format!("the root element must be <nta>, found <{name}>"), span));
            }
            // Not part of the tree; the writer keeps its bytes.
            debug!(element = name, offset = span.start; "Skipping unknown element");
            if !self_closing {
                self.content(name, span, &mut parts)?;
            }
            return Ok(());
        };

        let id = match parent {
            None if kind == NodeKind::Nta => self.tree.root(),
            None => {
                return Err(self.error(
                    format!("the root element must be <nta>, found <{name}>"),
                    span,
                ))
            }
            Some(parent) => self
                .tree
                .add_child(parent, kind)
                .map_err(|e| self.locate(e, span))?,
        };

        let mut empty_end = None;
        for part in head_parts {
            match part.as_rule() {
                Rule::attribute => self.read_attribute(id, part)?,
                Rule::empty_end => empty_end = Some(span_of(&part)),
                _ => {}
            }
        }

        if self_closing {
            if kind.has_text() {
                let slot_span = empty_end.unwrap_or(Span::at(span.end));
                self.tree.node_mut(id).slot = Some(TextSlot {
                    span: slot_span,
                    self_closing: true,
                    original: String::new(),
                });
            }
            return Ok(());
        }

        let content = self.content(name, span, &mut parts)?;

        if kind.has_text() {
            self.read_text(id, kind, content)
        } else {
            self.read_children(id, kind, content)
        }
    }

    /// Content of a non-empty element, once its closing tag matches.
    fn content<'i>(
        &self,
        name: &str,
        span: Span,
        parts: &mut Pairs<'i, Rule>,
    ) -> Result<Pair<'i, Rule>, MapperError> {
        let content = parts
            .next()
            .ok_or_else(|| self.error(format!("<{name}> has no content"), span))?;
        let close = parts
            .next()
            .ok_or_else(|| self.error(format!("<{name}> is not closed"), span))?;
        let close_name = close.clone().into_inner().next().map(|p| p.as_str());
        if close_name != Some(name) {
            return Err(err_ctx!(
                Codec,
                format!(
                    "<{name}> is closed by </{}>",
                    close_name.unwrap_or_default()
                ),
                self.src,
                span_of(&close),
                format!("close the element with </{name}>")
            ));
        }

        Ok(content)
    }

    fn read_attribute(&mut self, id: NodeId, pair: Pair<Rule>) -> Result<(), MapperError> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        let (Some(key), Some(value)) = (inner.next(), inner.next()) else {
            return Err(self.error("malformed attribute", span));
        };
        let decoded = self.decode(value.as_str(), value.as_span().start())?;
        self.tree.set_attribute(id, key.as_str(), &decoded);
        Ok(())
    }

    fn read_text(&mut self, id: NodeId, kind: NodeKind, content: Pair<Rule>) -> Result<(), MapperError> {
        let slot_span = span_of(&content);
        let mut text = String::new();
        for part in content.into_inner() {
            match part.as_rule() {
                Rule::char_data => {
                    text.push_str(&self.decode(part.as_str(), part.as_span().start())?);
                }
                Rule::comment => {}
                _ => {
                    return Err(self.error(
                        format!("<{kind}> holds text, not elements"),
                        span_of(&part),
                    ))
                }
            }
        }
        let node = self.tree.node_mut(id);
        node.text = Some(text.clone());
        node.slot = Some(TextSlot {
            span: slot_span,
            self_closing: false,
            original: text,
        });
        Ok(())
    }

    fn read_children(&mut self, id: NodeId, kind: NodeKind, content: Pair<Rule>) -> Result<(), MapperError> {
        for part in content.into_inner() {
            match part.as_rule() {
                Rule::element => self.read_element(part, Some(id))?,
                Rule::char_data if part.as_str().trim().is_empty() => {}
                Rule::comment => {}
                _ => {
                    return Err(self.error(
                        format!("unexpected text inside <{kind}>"),
                        span_of(&part),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Resolves entity and character references in `raw`, which starts at
    /// `offset` in the document.
    fn decode(&self, raw: &str, offset: usize) -> Result<String, MapperError> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        let mut pos = offset;
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let Some(semi) = after.find(';') else {
                return Err(self.error("unterminated entity reference", Span::new(pos + amp, pos + rest.len())));
            };
            let entity = &after[..semi];
            let span = Span::new(pos + amp, pos + amp + semi + 2);
            let decoded = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => numeric_reference(entity),
            };
            let Some(c) = decoded else {
                return Err(self.error(format!("unknown entity '&{entity};'"), span));
            };
            out.push(c);
            let consumed = amp + semi + 2;
            rest = &rest[consumed..];
            pos += consumed;
        }
        out.push_str(rest);
        Ok(out)
    }

    fn error(&self, message: impl Into<String>, span: Span) -> MapperError {
        err_ctx!(Codec, message.into(), self.src, span)
    }

    /// Attaches the document position to a structural error from the tree.
    fn locate(&self, error: MapperError, span: Span) -> MapperError {
        match error {
            MapperError::Codec { message, .. } => self.error(message, span),
            other => other,
        }
    }
}

fn numeric_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

fn span_of(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    Span::new(span.start(), span.end())
}

// ============================================================================
// WRITERS
// ============================================================================

fn splice(tree: &ModelTree, source: &str) -> Result<String, MapperError> {
    let mut edits: Vec<(Span, String)> = (0..tree.len())
        .map(NodeId)
        .filter_map(|id| {
            let node = tree.node(id);
            let slot = node.slot.as_ref()?;
            let text = node.text.as_deref()?;
            if text == slot.original {
                return None;
            }
            let replacement = if slot.self_closing {
                format!(">{}</{}>", escape_text(text), node.kind)
            } else {
                escape_text(text)
            };
            Some((slot.span, replacement))
        })
        .collect();
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        if span.start < cursor || span.end > source.len() {
            return Err(crate::err_msg!(
                Codec,
                "text slot {} no longer fits the source document",
                span
            ));
        }
        out.push_str(&source[cursor..span.start]);
        out.push_str(&replacement);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

fn render(tree: &ModelTree, id: NodeId, depth: usize, out: &mut String) {
    let node = tree.node(id);
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(node.kind.tag());
    for (key, value) in &node.attributes {
        out.push_str(&format!(" {key}=\"{}\"", escape_attribute(value)));
    }
    if let Some(text) = &node.text {
        out.push_str(&format!(">{}</{}>\n", escape_text(text), node.kind));
        return;
    }
    if node.children.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    for child in &node.children {
        render(tree, *child, depth + 1, out);
    }
    out.push_str(&format!("{indent}</{}>\n", node.kind));
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}
