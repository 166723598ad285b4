//! Canonical node addresses.
//!
//! A path renders as `/nta/template[2]/transition[1]/label[3]`: one segment per
//! level, with a 1-based index on kinds that repeat under their parent.
//! Diagnostics carry the rendered string; handler filters match against the
//! segment kinds.

use std::fmt;
use std::str::FromStr;

use super::NodeKind;
use crate::err_msg;
use crate::errors::MapperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub kind: NodeKind,
    pub index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Path(vec![PathSegment {
            kind: NodeKind::Nta,
            index: None,
        }])
    }

    /// This path extended by one segment.
    pub fn child(&self, kind: NodeKind, index: Option<usize>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment { kind, index });
        Path(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// True when `filter` is empty or names, in order, the kinds of this
    /// path's last `filter.len()` segments.
    pub fn matches_filter(&self, filter: &[NodeKind]) -> bool {
        if filter.len() > self.0.len() {
            return false;
        }
        let suffix = &self.0[self.0.len() - filter.len()..];
        suffix.iter().zip(filter).all(|(seg, kind)| seg.kind == *kind)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{}", segment.kind)?;
            if let Some(index) = segment.index {
                write!(f, "[{index}]")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(err_msg!(Path, "path '{}' must start with '/'", s));
        };
        let segments = rest
            .split('/')
            .map(|raw| parse_segment(raw, s))
            .collect::<Result<Vec<_>, _>>()?;
        if segments.first().map(|seg| seg.kind) != Some(NodeKind::Nta) {
            return Err(err_msg!(Path, "path '{}' must start at /nta", s));
        }
        Ok(Path(segments))
    }
}

fn parse_segment(raw: &str, whole: &str) -> Result<PathSegment, MapperError> {
    let (name, index) = match raw.split_once('[') {
        Some((name, rest)) => {
            let digits = rest
                .strip_suffix(']')
                .ok_or_else(|| err_msg!(Path, "unclosed index in '{}' of '{}'", raw, whole))?;
            let index: usize = digits
                .parse()
                .map_err(|_| err_msg!(Path, "bad index '{}' in '{}'", digits, whole))?;
            if index == 0 {
                return Err(err_msg!(Path, "indices are 1-based in '{}'", whole));
            }
            (name, Some(index))
        }
        None => (raw, None),
    };
    let kind = NodeKind::from_tag(name)
        .ok_or_else(|| err_msg!(Path, "unknown node kind '{}' in '{}'", name, whole))?;
    if kind.repeats() != index.is_some() {
        return Err(err_msg!(
            Path,
            "segment '{}' of '{}' {} an index",
            raw,
            whole,
            if kind.repeats() { "needs" } else { "cannot take" }
        ));
    }
    Ok(PathSegment { kind, index })
}
