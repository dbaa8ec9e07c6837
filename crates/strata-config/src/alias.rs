//! Alias dereferencing.

use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{NodeError, NodeResult};
use crate::node::{Content, NodeRef, identity};

/// Follow `node` through any chain of aliases to the first non-alias node.
///
/// A non-alias node resolves to itself.
///
/// # Errors
///
/// Returns [`NodeError::NilNode`] if an alias target has been dropped, and
/// [`NodeError::AliasCycle`] if the chain loops.
pub fn resolve(node: &NodeRef) -> NodeResult<NodeRef> {
    let mut current = Rc::clone(node);
    let mut seen = HashSet::new();

    loop {
        let next = match &current.borrow().content {
            Content::Alias(target) => target.upgrade().ok_or(NodeError::NilNode)?,
            _ => break,
        };
        if !seen.insert(identity(&next)) {
            return Err(NodeError::AliasCycle {
                anchor: next.borrow().anchor().unwrap_or_default().to_owned(),
            });
        }
        current = next;
    }

    Ok(current)
}

/// Single-step target of an alias node, or `None` for any other node.
///
/// # Errors
///
/// Returns [`NodeError::NilNode`] if `node` is an alias whose target has been
/// dropped.
pub fn target(node: &NodeRef) -> NodeResult<Option<NodeRef>> {
    match &node.borrow().content {
        Content::Alias(target) => target.upgrade().map(Some).ok_or(NodeError::NilNode),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn test_resolve_non_alias_is_identity() {
        let node = Node::int(1);
        assert!(Rc::ptr_eq(&resolve(&node).unwrap(), &node));
    }

    #[test]
    fn test_resolve_unwinds_chain() {
        let anchored = Node::anchored("t", Node::string("v"));
        let hop = Node::alias(&anchored);
        let outer = Node::alias(&hop);

        assert!(Rc::ptr_eq(&resolve(&outer).unwrap(), &anchored));
        assert!(Rc::ptr_eq(&target(&outer).unwrap().unwrap(), &hop));
    }

    #[test]
    fn test_resolve_dangling_alias() {
        let alias = {
            let anchored = Node::anchored("gone", Node::int(1));
            Node::alias(&anchored)
        };
        assert_eq!(resolve(&alias).unwrap_err(), NodeError::NilNode);
        assert_eq!(target(&alias).unwrap_err(), NodeError::NilNode);
    }

    #[test]
    fn test_resolve_detects_cycle() {
        let a = Node::null();
        let b = Node::alias(&a);
        a.borrow_mut().content = Content::Alias(Rc::downgrade(&b));

        assert!(matches!(resolve(&a), Err(NodeError::AliasCycle { .. })));
    }
}
