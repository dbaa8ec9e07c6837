//! Kind-aware merge of document trees.
//!
//! [`merge`] overlays one tree onto another and returns a fresh tree; the
//! inputs are left untouched. Mappings merge per key, sequences concatenate
//! and scalars are replaced by the overlay. Aliases on either side are
//! followed, and aliases in the result are rebound to the merged nodes they
//! referred to.

mod deep;
mod relink;

pub use deep::MAX_MERGE_DEPTH;

use tracing::trace;

use crate::error::NodeResult;
use crate::node::NodeRef;

/// Overlay `overlay` onto `base`.
///
/// # Errors
///
/// Returns a [`NodeError`](crate::NodeError) if the trees have incompatible
/// shapes, conflicting anchors, dangling or cyclic aliases, or nest deeper
/// than [`MAX_MERGE_DEPTH`].
pub fn merge(base: &NodeRef, overlay: &NodeRef) -> NodeResult<NodeRef> {
    let merged = deep::merge_nodes(base, overlay, 0)?.into_ref();
    let result = relink::materialize(&merged)?;
    trace!(kind = %result.borrow().kind(), "merged trees");
    Ok(result)
}
