use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::MAX_MERGE_DEPTH;
use crate::error::{NodeError, NodeResult};
use crate::node::{Content, Node, NodeRef, identity};

/// Deep-copy `root` into a tree that shares nothing with its sources, then
/// point every copied alias at the copy of its target.
///
/// Subtrees reached more than once are copied once per occurrence. An alias
/// whose target was copied points at the first copy of it. Otherwise the
/// alias is matched by anchor name against the first node of the copy
/// carrying that anchor, which is how an alias into a replaced subtree finds
/// the merged node. Aliases with no match keep their original target.
pub(super) fn materialize(root: &NodeRef) -> NodeResult<NodeRef> {
    let mut copier = Copier::default();
    let copy = copier.copy(root, 0)?;
    copier.rebind();
    Ok(copy)
}

#[derive(Default)]
struct Copier {
    copies: HashMap<*const RefCell<Node>, NodeRef>,
    anchors: HashMap<String, NodeRef>,
    aliases: Vec<(NodeRef, NodeRef)>,
}

impl Copier {
    fn copy(&mut self, node: &NodeRef, depth: usize) -> NodeResult<NodeRef> {
        if depth > MAX_MERGE_DEPTH {
            return Err(NodeError::DepthLimitExceeded {
                limit: MAX_MERGE_DEPTH,
            });
        }

        let source = node.borrow();
        let copy = Node {
            anchor: source.anchor.clone(),
            content: Content::Sequence(Vec::new()),
        }
        .into_ref();
        self.copies
            .entry(identity(node))
            .or_insert_with(|| Rc::clone(&copy));
        if let Some(name) = source.anchor() {
            self.anchors
                .entry(name.to_owned())
                .or_insert_with(|| Rc::clone(&copy));
        }

        let next = depth.saturating_add(1);
        let content = match &source.content {
            Content::Document(children) => Content::Document(self.copy_all(children, next)?),
            Content::Sequence(items) => Content::Sequence(self.copy_all(items, next)?),
            Content::Mapping(entries) => {
                let mut copied = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    copied.push((self.copy(key, next)?, self.copy(value, next)?));
                }
                Content::Mapping(copied)
            },
            Content::Scalar { tag, value } => Content::Scalar {
                tag: tag.clone(),
                value: value.clone(),
            },
            Content::Alias(target) => {
                if let Some(target) = target.upgrade() {
                    self.aliases.push((Rc::clone(&copy), target));
                }
                Content::Alias(target.clone())
            },
        };
        copy.borrow_mut().content = content;
        Ok(copy)
    }

    fn copy_all(&mut self, nodes: &[NodeRef], depth: usize) -> NodeResult<Vec<NodeRef>> {
        nodes.iter().map(|node| self.copy(node, depth)).collect()
    }

    fn rebind(self) {
        let Self {
            copies,
            anchors,
            aliases,
        } = self;

        for (alias, original) in aliases {
            let rebound = copies.get(&identity(&original)).cloned().or_else(|| {
                original
                    .borrow()
                    .anchor()
                    .and_then(|name| anchors.get(name))
                    .cloned()
            });
            if let Some(target) = rebound {
                trace!(anchor = ?target.borrow().anchor(), "rebinding alias");
                alias.borrow_mut().content = Content::Alias(Rc::downgrade(&target));
            }
        }
    }
}
