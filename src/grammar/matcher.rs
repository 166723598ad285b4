//! Backtracking matcher over a compiled [`Grammar`].
//!
//! Matching runs in two passes. The first computes, for an expression at a
//! position, the *set* of every end position any derivation can reach, so
//! alternatives are explored exhaustively rather than by ordered choice. Rule
//! and repetition results are memoised per position; repetitions are walked
//! breadth-first instead of recursing once per iteration. The second pass
//! rebuilds a parse tree only for the one `(start, end)` pair the caller
//! picked.
//!
//! Left recursion is rejected when the grammar is compiled, so a rule never
//! re-enters itself at the same position.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use super::tree::{Leaf, Node, ParseTree};
use super::{Expr, Grammar};
use crate::syntax::Span;

type Ends = BTreeSet<usize>;
type Items = Vec<Option<ParseTree>>;

/// Reachable ends of one repetition from one start, each with the start of
/// the iteration that reached it.
#[derive(Debug, Default)]
struct Repetition {
    previous: HashMap<usize, usize>,
}

pub(crate) struct Matcher<'g, 't> {
    grammar: &'g Grammar,
    text: &'t str,
    rules: RefCell<HashMap<(usize, usize), Rc<Ends>>>,
    repetitions: RefCell<HashMap<(usize, usize), Rc<Repetition>>>,
}

impl<'g, 't> Matcher<'g, 't> {
    pub(crate) fn new(grammar: &'g Grammar, text: &'t str) -> Self {
        Self {
            grammar,
            text,
            rules: RefCell::new(HashMap::new()),
            repetitions: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn text(&self) -> &'t str {
        self.text
    }

    pub(crate) fn match_exact(&self) -> Option<ParseTree> {
        let top = self.grammar.top;
        let end = self
            .rule_ends(top, 0)
            .iter()
            .rev()
            .copied()
            .find(|&end| self.skip(end) == self.text.len())?;
        self.build_rule(top, 0, end)
    }

    /// Longest non-empty derivation of the top rule starting at `pos`.
    pub(crate) fn longest_at(&self, pos: usize) -> Option<(ParseTree, usize)> {
        let top = self.grammar.top;
        let end = self.rule_ends(top, pos).last().copied().filter(|&end| end > pos)?;
        let tree = self.build_rule(top, pos, end)?;
        if tree.leaves().is_empty() {
            return None;
        }
        Some((tree, end))
    }

    // ------------------------------------------------------------------------
    // Recognition
    // ------------------------------------------------------------------------

    fn ends(&self, expr: &Expr, pos: usize) -> Ends {
        match expr {
            Expr::Literal(literal) => self.literal(literal, pos).into_iter().map(|s| s.end).collect(),
            Expr::Token(index) => self.token(*index, pos).into_iter().map(|s| s.end).collect(),
            Expr::Rule(index) => self.rule_ends(*index, pos).as_ref().clone(),
            Expr::Seq(items) => self.sequence_ends(items, pos),
            Expr::Alt(items) => items.iter().flat_map(|e| self.ends(e, pos)).collect(),
            Expr::Opt(inner) => {
                let mut ends = self.ends(inner, pos);
                ends.insert(pos);
                ends
            }
            Expr::Rep(inner, id) => {
                let repetition = self.repetition(inner, *id, pos);
                std::iter::once(pos).chain(repetition.previous.keys().copied()).collect()
            }
        }
    }

    fn sequence_ends(&self, items: &[Expr], pos: usize) -> Ends {
        let mut reached = Ends::from([pos]);
        for item in items {
            reached = reached.iter().flat_map(|&at| self.ends(item, at)).collect();
            if reached.is_empty() {
                break;
            }
        }
        reached
    }

    fn rule_ends(&self, index: usize, pos: usize) -> Rc<Ends> {
        if let Some(hit) = self.rules.borrow().get(&(index, pos)) {
            return Rc::clone(hit);
        }
        let ends = Rc::new(self.ends(&self.grammar.rules[index].body, pos));
        self.rules.borrow_mut().insert((index, pos), Rc::clone(&ends));
        ends
    }

    fn repetition(&self, inner: &Expr, id: usize, pos: usize) -> Rc<Repetition> {
        if let Some(hit) = self.repetitions.borrow().get(&(id, pos)) {
            return Rc::clone(hit);
        }
        let mut repetition = Repetition::default();
        let mut queue = VecDeque::from([pos]);
        while let Some(at) = queue.pop_front() {
            // Iterations must consume input, or the repetition never ends.
            for end in self.ends(inner, at).into_iter().filter(|&end| end > at) {
                if !repetition.previous.contains_key(&end) {
                    repetition.previous.insert(end, at);
                    queue.push_back(end);
                }
            }
        }
        let repetition = Rc::new(repetition);
        self.repetitions
            .borrow_mut()
            .insert((id, pos), Rc::clone(&repetition));
        repetition
    }

    // ------------------------------------------------------------------------
    // Tree building
    // ------------------------------------------------------------------------

    fn build_rule(&self, index: usize, pos: usize, end: usize) -> Option<ParseTree> {
        if !self.rule_ends(index, pos).contains(&end) {
            return None;
        }
        let rule = &self.grammar.rules[index];
        let children = self.build(&rule.body, pos, end)?;
        Some(ParseTree::Node(Node {
            rule: Some(Arc::clone(&rule.name)),
            span: cover(&children, pos),
            children,
        }))
    }

    /// Items of one derivation of `expr` spanning exactly `pos..end`.
    fn build(&self, expr: &Expr, pos: usize, end: usize) -> Option<Items> {
        match expr {
            Expr::Literal(literal) => {
                let span = self.literal(literal, pos).filter(|s| s.end == end)?;
                Some(vec![Some(self.leaf(Arc::clone(literal), span))])
            }
            Expr::Token(index) => {
                let span = self.token(*index, pos).filter(|s| s.end == end)?;
                let name = Arc::clone(&self.grammar.tokens[*index].name);
                Some(vec![Some(self.leaf(name, span))])
            }
            Expr::Rule(index) => Some(vec![Some(self.build_rule(*index, pos, end)?)]),
            Expr::Seq(items) => self.build_sequence(items, pos, end),
            Expr::Alt(items) => items
                .iter()
                .find(|e| self.ends(e, pos).contains(&end))
                .and_then(|e| self.build(e, pos, end)),
            Expr::Opt(inner) => {
                if self.ends(inner, pos).contains(&end) {
                    Some(vec![Some(group(self.build(inner, pos, end)?, pos))])
                } else if end == pos {
                    Some(vec![None])
                } else {
                    None
                }
            }
            Expr::Rep(inner, id) => {
                let repetition = self.repetition(inner, *id, pos);
                let mut cuts = vec![end];
                let mut at = end;
                while at != pos {
                    at = *repetition.previous.get(&at)?;
                    cuts.push(at);
                }
                cuts.reverse();
                let children = cuts
                    .windows(2)
                    .map(|w| self.build(inner, w[0], w[1]).map(|items| Some(group(items, w[0]))))
                    .collect::<Option<Items>>()?;
                Some(vec![Some(ParseTree::Node(Node {
                    rule: None,
                    span: cover(&children, pos),
                    children,
                }))])
            }
        }
    }

    /// Greedy first: the first item takes the furthest end that still lets
    /// the rest reach `end`.
    fn build_sequence(&self, items: &[Expr], pos: usize, end: usize) -> Option<Items> {
        let Some((first, rest)) = items.split_first() else {
            return (pos == end).then(Vec::new);
        };
        let mid = self
            .ends(first, pos)
            .into_iter()
            .rev()
            .filter(|&mid| mid <= end)
            .find(|&mid| self.sequence_ends(rest, mid).contains(&end))?;
        let mut out = self.build(first, pos, mid)?;
        out.extend(self.build_sequence(rest, mid, end)?);
        Some(out)
    }

    // ------------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------------

    fn skip(&self, pos: usize) -> usize {
        self.grammar
            .skip
            .find(&self.text[pos..])
            .map_or(pos, |m| pos + m.end())
    }

    fn literal(&self, literal: &str, pos: usize) -> Option<Span> {
        let start = self.skip(pos);
        if !self.text[start..].starts_with(literal) {
            return None;
        }
        self.bounded(Span::new(start, start + literal.len()))
    }

    fn token(&self, index: usize, pos: usize) -> Option<Span> {
        let start = self.skip(pos);
        let found = self.grammar.tokens[index].regex.find(&self.text[start..])?;
        if found.end() == 0 {
            return None;
        }
        self.bounded(Span::new(start, start + found.end()))
    }

    fn leaf(&self, token: Arc<str>, span: Span) -> ParseTree {
        ParseTree::Leaf(Leaf {
            token,
            text: self.text[span.start..span.end].to_string(),
            span,
        })
    }

    /// `span` unless it is glued to a word character on either side.
    fn bounded(&self, span: Span) -> Option<Span> {
        let matched = &self.text[span.start..span.end];
        let glued_before = matched.chars().next().is_some_and(is_word_char)
            && self.text[..span.start].chars().next_back().is_some_and(is_word_char);
        let glued_after = matched.chars().next_back().is_some_and(is_word_char)
            && self.text[span.end..].chars().next().is_some_and(is_word_char);
        (!glued_before && !glued_after).then_some(span)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Collapses the items of one optional or iteration into a single child.
fn group(mut items: Items, pos: usize) -> ParseTree {
    if items.len() == 1 {
        if let Some(Some(tree)) = items.pop() {
            return tree;
        }
        items = vec![None];
    }
    ParseTree::Node(Node {
        rule: None,
        span: cover(&items, pos),
        children: items,
    })
}

fn cover(items: &[Option<ParseTree>], pos: usize) -> Span {
    let mut spans = items.iter().flatten().map(ParseTree::span);
    match spans.next() {
        Some(first) => spans.fold(first, |acc, s| acc.cover(s)),
        None => Span::at(pos),
    }
}
