use std::io;

use thiserror::Error;

use crate::node::NodeKind;

/// Errors raised while merging, resolving or converting document trees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// A node that had to be present was absent (e.g. a dangling alias).
    #[error("node is nil")]
    NilNode,

    /// Two nodes of incompatible kinds met, neither of them an alias.
    #[error("node kind mismatch: cannot merge {right} into {left}")]
    KindMismatch {
        /// Kind of the base (left-hand) node.
        left: NodeKind,
        /// Kind of the overlay (right-hand) node.
        right: NodeKind,
    },

    /// A node had a shape that the operation cannot handle.
    #[error("node type unhandled: {kind} {context}")]
    TypeUnhandled {
        /// Kind of the offending node.
        kind: NodeKind,
        /// Where the node was found.
        context: String,
    },

    /// The alias merge was invoked on a node that is not an alias.
    #[error("alias node expected, found {found}")]
    AliasExpected {
        /// Kind of the node that was passed instead.
        found: NodeKind,
    },

    /// A document node did not hold exactly one root on both sides.
    #[error(
        "unexpected document node configuration: left has {left} roots, right has {right}"
    )]
    UnexpectedDocumentShape {
        /// Number of children of the left document.
        left: usize,
        /// Number of children of the right document.
        right: usize,
    },

    /// Both sides define an anchor at the same place, under different names.
    #[error("unequal named anchors not yet supported (source {left}, merge {right})")]
    UnequalAnchors {
        /// Anchor on the base node.
        left: String,
        /// Anchor on the overlay node.
        right: String,
    },

    /// Following aliases led back to a node already being resolved.
    #[error("alias cycle through anchor '{anchor}'")]
    AliasCycle {
        /// Anchor name where the cycle closed (may be empty).
        anchor: String,
    },

    /// The tree is nested deeper than the engine is willing to recurse.
    #[error("document nesting exceeds the limit of {limit} levels")]
    DepthLimitExceeded {
        /// The depth limit that was hit.
        limit: usize,
    },
}

/// Result type for tree operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors raised by the loading pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The loader was asked to load without any source.
    #[error("no configuration sources given")]
    NoSources,

    /// A source contained no document.
    #[error("configuration source '{name}' is empty")]
    EmptySource {
        /// Name of the empty source.
        name: String,
    },

    /// Failed to read a configuration source.
    #[error("failed to read config source at {path}: {source}")]
    ReadError {
        /// Path (or name) of the source that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A configuration source exceeded the size limit.
    #[error("config source {path} is {size} bytes, exceeding the {limit} byte limit")]
    SourceTooLarge {
        /// Path of the oversized source.
        path: String,
        /// Size of the source in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        limit: u64,
    },

    /// Failed to parse a configuration source.
    #[error("failed to parse config source {source_name}: {source}")]
    ParseError {
        /// Name of the source that failed to parse.
        source_name: String,
        /// Scanner error, carrying the line and column.
        #[source]
        source: yaml_rust2::ScanError,
    },

    /// Overlaying a source onto the sources before it failed.
    #[error("failed to overlay config source {source_name} (#{index}): {source}")]
    Merge {
        /// Name of the overlay source.
        source_name: String,
        /// Position of the overlay source in the load order.
        index: usize,
        /// Underlying merge error.
        #[source]
        source: NodeError,
    },

    /// A tree could not be converted or emitted.
    #[error(transparent)]
    Tree(#[from] NodeError),

    /// The merged tree could not be decoded into the target type.
    #[error("could not decode configuration: {0}")]
    DecodeError(#[source] serde_yaml::Error),

    /// The configuration could not be encoded.
    #[error("could not encode configuration: {0}")]
    EncodeError(#[source] serde_yaml::Error),

    /// The decoded configuration failed validation.
    #[error("validation failed: {message}")]
    Validation {
        /// Validation failure description.
        message: String,
    },

    /// Preprocessing a source failed.
    #[error("template error in {source_name}: {var}: {message}")]
    Template {
        /// Name of the source being preprocessed.
        source_name: String,
        /// Variable that could not be resolved.
        var: String,
        /// Failure description.
        message: String,
    },

    /// Failed to write the configuration.
    #[error("failed to write config to {path}: {source}")]
    WriteError {
        /// Destination path (or `<writer>`).
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
