//! Canonical traversal of a [`ModelTree`].
//!
//! Depth-first, pre-order. At every node the single-valued children come
//! first in the order their parent kind declares, then the repeated children
//! in document order, indexed from 1 per kind.

use super::{ModelTree, NodeId, NodeKind, Path};
use crate::errors::MapperError;

/// Bracketing visitor: `step_into` runs before a node's children are
/// visited, `step_out` after.
pub trait ModelVisitor {
    fn step_into(&mut self, tree: &ModelTree, id: NodeId, path: &Path) -> Result<(), MapperError>;

    fn step_out(&mut self, _tree: &ModelTree, _id: NodeId, _path: &Path) -> Result<(), MapperError> {
        Ok(())
    }
}

/// Calls `visit` for every node in canonical order.
pub fn walk<F>(tree: &ModelTree, visit: F) -> Result<(), MapperError>
where
    F: FnMut(&ModelTree, NodeId, &Path) -> Result<(), MapperError>,
{
    struct Plain<F>(F);

    impl<F> ModelVisitor for Plain<F>
    where
        F: FnMut(&ModelTree, NodeId, &Path) -> Result<(), MapperError>,
    {
        fn step_into(&mut self, tree: &ModelTree, id: NodeId, path: &Path) -> Result<(), MapperError> {
            (self.0)(tree, id, path)
        }
    }

    walk_scoped(tree, &mut Plain(visit))
}

/// Walks the tree calling `step_into` and `step_out` around every node.
pub fn walk_scoped<V: ModelVisitor + ?Sized>(
    tree: &ModelTree,
    visitor: &mut V,
) -> Result<(), MapperError> {
    descend(tree, tree.root(), &Path::root(), visitor)
}

fn descend<V: ModelVisitor + ?Sized>(
    tree: &ModelTree,
    id: NodeId,
    path: &Path,
    visitor: &mut V,
) -> Result<(), MapperError> {
    visitor.step_into(tree, id, path)?;
    for (child, child_path) in child_paths(tree, id, path) {
        descend(tree, child, &child_path, visitor)?;
    }
    visitor.step_out(tree, id, path)
}

/// Canonical children of `id` with their paths.
fn child_paths(tree: &ModelTree, id: NodeId, path: &Path) -> Vec<(NodeId, Path)> {
    let mut seen: Vec<(NodeKind, usize)> = Vec::new();
    tree.canonical_children(id)
        .into_iter()
        .map(|child| {
            let kind = tree.kind(child);
            let index = kind.repeats().then(|| match seen.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, count)) => {
                    *count += 1;
                    *count
                }
                None => {
                    seen.push((kind, 1));
                    1
                }
            });
            (child, path.child(kind, index))
        })
        .collect()
}

/// Every node with its path, in canonical order.
pub fn paths(tree: &ModelTree) -> Vec<(Path, NodeId)> {
    let mut out = Vec::with_capacity(tree.len());
    let mut stack = vec![(tree.root(), Path::root())];
    while let Some((id, path)) = stack.pop() {
        stack.extend(child_paths(tree, id, &path).into_iter().rev());
        out.push((path, id));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModelTree {
        let mut tree = ModelTree::new();
        let root = tree.root();
        let t1 = tree.add_child(root, NodeKind::Template).unwrap();
        tree.add_child(t1, NodeKind::Name).unwrap();
        let tr = tree.add_child(t1, NodeKind::Transition).unwrap();
        tree.add_child(tr, NodeKind::Label).unwrap();
        tree.add_child(tr, NodeKind::Label).unwrap();
        tree.add_child(t1, NodeKind::Location).unwrap();
        tree.add_child(root, NodeKind::Template).unwrap();
        tree.add_child(root, NodeKind::Declaration).unwrap();
        tree.add_child(root, NodeKind::System).unwrap();
        tree
    }

    #[test]
    fn canonical_paths_in_pre_order() {
        let tree = sample();
        let rendered: Vec<String> = paths(&tree).iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "/nta",
                "/nta/declaration",
                "/nta/system",
                "/nta/template[1]",
                "/nta/template[1]/name",
                "/nta/template[1]/location[1]",
                "/nta/template[1]/transition[1]",
                "/nta/template[1]/transition[1]/label[1]",
                "/nta/template[1]/transition[1]/label[2]",
                "/nta/template[2]",
            ]
        );
    }

    #[test]
    fn paths_are_unique_and_resolve_back() {
        let tree = sample();
        let all = paths(&tree);
        let mut strings: Vec<String> = all.iter().map(|(p, _)| p.to_string()).collect();
        strings.sort();
        strings.dedup();
        assert_eq!(strings.len(), all.len());
        for (path, id) in all {
            assert_eq!(tree.resolve(&path), Some(id));
        }
    }

    #[test]
    fn paths_follow_the_walk_order() {
        let tree = sample();
        let mut walked = Vec::new();
        walk(&tree, |_, id, path| {
            walked.push((path.clone(), id));
            Ok(())
        })
        .unwrap();
        assert_eq!(paths(&tree), walked);
        assert_eq!(paths(&ModelTree::new()).len(), 1);
    }

    struct Depth {
        current: usize,
        max: usize,
        events: Vec<String>,
    }

    impl ModelVisitor for Depth {
        fn step_into(&mut self, tree: &ModelTree, id: NodeId, _: &Path) -> Result<(), MapperError> {
            self.current += 1;
            self.max = self.max.max(self.current);
            if tree.kind(id) == NodeKind::Template {
                self.events.push("in".into());
            }
            Ok(())
        }

        fn step_out(&mut self, tree: &ModelTree, id: NodeId, _: &Path) -> Result<(), MapperError> {
            self.current -= 1;
            if tree.kind(id) == NodeKind::Template {
                self.events.push("out".into());
            }
            Ok(())
        }
    }

    #[test]
    fn scoped_walk_brackets_every_node() {
        let tree = sample();
        let mut depth = Depth {
            current: 0,
            max: 0,
            events: Vec::new(),
        };
        walk_scoped(&tree, &mut depth).unwrap();
        assert_eq!(depth.current, 0);
        assert_eq!(depth.max, 4);
        assert_eq!(depth.events, vec!["in", "out", "in", "out"]);
    }

    #[test]
    fn visitor_errors_stop_the_walk() {
        let tree = sample();
        let mut visited = 0;
        let result = walk(&tree, |tree, id, _| {
            visited += 1;
            if tree.kind(id) == NodeKind::System {
                return Err(crate::err_msg!(Path, "stop"));
            }
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(visited, 3);
    }
}
