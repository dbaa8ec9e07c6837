//! Folding parsed sources into one tree.

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::merge;
use crate::node::NodeRef;

/// Fold named trees left to right through [`merge`]: each tree is overlaid
/// onto the result of the ones before it.
///
/// # Errors
///
/// Returns [`ConfigError::NoSources`] for an empty list and
/// [`ConfigError::Merge`] naming the first source that could not be
/// overlaid. No partial result is returned.
pub fn fold<I, S>(trees: I) -> ConfigResult<NodeRef>
where
    I: IntoIterator<Item = (S, NodeRef)>,
    S: AsRef<str>,
{
    let mut trees = trees.into_iter();
    let Some((first_name, mut result)) = trees.next() else {
        return Err(ConfigError::NoSources);
    };
    debug!(source = first_name.as_ref(), "using base source");

    for (index, (name, tree)) in trees.enumerate() {
        let index = index.saturating_add(1);
        result = merge(&result, &tree).map_err(|source| ConfigError::Merge {
            source_name: name.as_ref().to_owned(),
            index,
            source,
        })?;
        debug!(source = name.as_ref(), index, "overlaid source");
    }

    Ok(result)
}
