//! Adapter exposing the tree shape an external query engine walks.

use crate::node::Node;
use std::rc::Rc;

/// Tree navigation hooks consumed by a query engine.
///
/// Identity hooks default to no-ops: nodes are already deduplicated by path
/// within a forest, so there is nothing to index.
pub trait TreeIndex {
    type Node;

    fn is_root(&self, node: &Self::Node) -> bool;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Name used for name-based matching.
    fn tag(&self, node: &Self::Node) -> String;

    /// Register a visited node.
    fn index(&self, _node: &Self::Node) {}

    /// Forget registered nodes.
    fn reset(&self) {}
}

/// [`TreeIndex`] over forest nodes, delegating everything to [`Node`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Index;

impl TreeIndex for Index {
    type Node = Rc<Node>;

    fn is_root(&self, node: &Rc<Node>) -> bool {
        node.is_root()
    }

    fn parent(&self, node: &Rc<Node>) -> Option<Rc<Node>> {
        node.parent()
    }

    fn children(&self, node: &Rc<Node>) -> Vec<Rc<Node>> {
        node.children().to_vec()
    }

    fn tag(&self, node: &Rc<Node>) -> String {
        node.tag().into_owned()
    }
}
