//! Preorder traversal over a node and its descendants.

use crate::node::Node;
use std::rc::Rc;

/// Preorder iterator over a subtree.
///
/// Children are visited in listing order. Links and non-directories have no
/// children, so the walk never leaves the subtree through a symlink.
#[derive(Debug)]
pub struct Walk {
    stack: Vec<Rc<Node>>,
}

impl Iterator for Walk {
    type Item = Rc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev().cloned());
        Some(node)
    }
}

impl Node {
    /// Walk this node and everything below it.
    pub fn walk(self: &Rc<Self>) -> Walk {
        Walk {
            stack: vec![Rc::clone(self)],
        }
    }
}
