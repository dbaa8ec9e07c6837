use std::rc::Rc;

use tracing::trace;

use crate::alias;
use crate::error::{NodeError, NodeResult};
use crate::node::{Content, Node, NodeKind, NodeRef};

/// Deepest nesting the merge engine and the codec will recurse into.
pub const MAX_MERGE_DEPTH: usize = 256;

/// Recursively merge `b` into `a`, returning the merged node unwrapped.
///
/// Children of the result may still be shared with the inputs; the caller
/// materializes the final tree.
pub(crate) fn merge_nodes(a: &NodeRef, b: &NodeRef, depth: usize) -> NodeResult<Node> {
    if depth > MAX_MERGE_DEPTH {
        return Err(NodeError::DepthLimitExceeded {
            limit: MAX_MERGE_DEPTH,
        });
    }

    let left_kind = a.borrow().kind();
    let right_kind = b.borrow().kind();
    if left_kind != right_kind && left_kind != NodeKind::Alias && right_kind != NodeKind::Alias {
        return Err(NodeError::KindMismatch {
            left: left_kind,
            right: right_kind,
        });
    }

    let right = alias::resolve(b)?;
    let next = depth.saturating_add(1);

    let mut merged = {
        let left = a.borrow();
        let right_node = right.borrow();
        match &left.content {
            Content::Document(_) => merge_documents(&left, &right_node, next)?,
            Content::Sequence(_) => merge_sequences(&left, &right_node)?,
            Content::Mapping(_) => merge_mappings(&left, &right_node, next)?,
            Content::Scalar { .. } => merge_scalars(&left, &right_node)?,
            Content::Alias(_) => merge_alias(&left, &right, next)?,
        }
    };

    let left_anchor = a.borrow().anchor.clone();
    let right_anchor = right.borrow().anchor.clone();
    match (&left_anchor, &right_anchor) {
        (Some(left), Some(right)) if left != right => {
            return Err(NodeError::UnequalAnchors {
                left: left.clone(),
                right: right.clone(),
            });
        },
        _ => {},
    }

    // When b is an alias its anchor stays on the target. The merged node is a
    // copy and must not claim the name, or a later *alias would bind to it.
    let adopted = if right_kind == NodeKind::Alias {
        None
    } else {
        right_anchor
    };
    merged.set_anchor(left_anchor.or(adopted));
    Ok(merged)
}

/// Merge the roots of two single-root documents.
pub(crate) fn merge_documents(a: &Node, b: &Node, depth: usize) -> NodeResult<Node> {
    let (Content::Document(left), Content::Document(right)) = (&a.content, &b.content) else {
        return Err(mismatch(a, b));
    };
    let ([left_root], [right_root]) = (left.as_slice(), right.as_slice()) else {
        return Err(NodeError::UnexpectedDocumentShape {
            left: left.len(),
            right: right.len(),
        });
    };

    let root = merge_nodes(left_root, right_root, depth)?.into_ref();
    Ok(Node::new(Content::Document(vec![root])))
}

/// Concatenate two sequences.
pub(crate) fn merge_sequences(a: &Node, b: &Node) -> NodeResult<Node> {
    let (Content::Sequence(left), Content::Sequence(right)) = (&a.content, &b.content) else {
        return Err(mismatch(a, b));
    };

    let mut items = Vec::with_capacity(left.len().saturating_add(right.len()));
    items.extend(left.iter().map(Rc::clone));
    items.extend(right.iter().map(Rc::clone));
    Ok(Node::new(Content::Sequence(items)))
}

/// Merge two mappings entry by entry, keeping the order of `a` and appending
/// new keys in the order of `b`.
pub(crate) fn merge_mappings(a: &Node, b: &Node, depth: usize) -> NodeResult<Node> {
    let (Content::Mapping(left), Content::Mapping(right)) = (&a.content, &b.content) else {
        return Err(mismatch(a, b));
    };

    let mut entries = left.clone();
    for (key, value) in right {
        match entries
            .iter()
            .position(|(existing, _)| same_scalar_key(existing, key))
        {
            Some(slot) => {
                trace!(key = %key.borrow(), "merging mapping entry");
                let merged = merge_nodes(&entries[slot].1, value, depth)?.into_ref();
                entries[slot].1 = merged;
            },
            None => {
                trace!(key = %key.borrow(), "appending mapping entry");
                entries.push((Rc::clone(key), Rc::clone(value)));
            },
        }
    }

    Ok(Node::new(Content::Mapping(entries)))
}

/// The overlay scalar wins.
pub(crate) fn merge_scalars(a: &Node, b: &Node) -> NodeResult<Node> {
    match (&a.content, &b.content) {
        (Content::Scalar { .. }, Content::Scalar { tag, value }) => {
            Ok(Node::new(Content::Scalar {
                tag: tag.clone(),
                value: value.clone(),
            }))
        },
        _ => Err(mismatch(a, b)),
    }
}

/// Merge `b` into a detached copy of the target of alias `a`.
///
/// The copy drops the target's anchor so the anchor stays with the original
/// node.
pub(crate) fn merge_alias(a: &Node, b: &NodeRef, depth: usize) -> NodeResult<Node> {
    let Content::Alias(target) = &a.content else {
        return Err(NodeError::AliasExpected { found: a.kind() });
    };
    let target = target.upgrade().ok_or(NodeError::NilNode)?;
    let target = alias::resolve(&target)?;

    let mut detached = target.borrow().clone();
    detached.anchor = None;
    merge_nodes(&detached.into_ref(), b, depth)
}

fn same_scalar_key(existing: &NodeRef, key: &NodeRef) -> bool {
    let existing = existing.borrow();
    let key = key.borrow();
    matches!(
        (existing.scalar_value(), key.scalar_value()),
        (Some(left), Some(right)) if left == right
    )
}

fn mismatch(a: &Node, b: &Node) -> NodeError {
    NodeError::KindMismatch {
        left: a.kind(),
        right: b.kind(),
    }
}
