//! Generic document tree shared by the merge engine, the redactor and the
//! codec.
//!
//! Nodes live behind [`NodeRef`] handles (`Rc<RefCell<Node>>`). Containers own
//! their children; an alias holds a [`Weak`] handle to its anchored target, so
//! several aliases can share one target without owning it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Shared, mutable handle to a node.
pub type NodeRef = Rc<RefCell<Node>>;

/// Non-owning handle to a node, as held by aliases.
pub type WeakNodeRef = Weak<RefCell<Node>>;

/// The kind of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A document wrapping a single root.
    Document,
    /// An ordered list of values.
    Sequence,
    /// An ordered list of key/value pairs.
    Mapping,
    /// A leaf value.
    Scalar,
    /// A reference to an anchored node.
    Alias,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::Scalar => "scalar",
            Self::Alias => "alias",
        };
        f.write_str(name)
    }
}

/// Type hint carried by scalars.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarTag {
    /// `!!null`
    Null,
    /// `!!bool`
    Bool,
    /// `!!int`
    Int,
    /// `!!float`
    Float,
    /// `!!str`
    Str,
    /// Any application specific tag, stored with its leading `!`.
    Custom(String),
}

impl ScalarTag {
    /// Map a tag as written in a document to a [`ScalarTag`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let short = tag
            .strip_prefix("tag:yaml.org,2002:")
            .or_else(|| tag.strip_prefix("!!"));
        match short {
            Some("null") => Self::Null,
            Some("bool") => Self::Bool,
            Some("int") => Self::Int,
            Some("float") => Self::Float,
            Some("str") => Self::Str,
            _ if tag.starts_with('!') => Self::Custom(tag.to_owned()),
            _ => Self::Custom(format!("!{tag}")),
        }
    }

    /// The tag in its short `!!name` / `!name` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Null => "!!null",
            Self::Bool => "!!bool",
            Self::Int => "!!int",
            Self::Float => "!!float",
            Self::Str => "!!str",
            Self::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for ScalarTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a node, one variant per kind.
#[derive(Debug, Clone)]
pub enum Content {
    /// Document children; well-formed documents hold exactly one root.
    Document(Vec<NodeRef>),
    /// Sequence items in order.
    Sequence(Vec<NodeRef>),
    /// Mapping entries in order.
    Mapping(Vec<(NodeRef, NodeRef)>),
    /// A leaf value with its type hint.
    Scalar {
        /// Type hint.
        tag: ScalarTag,
        /// Textual content.
        value: String,
    },
    /// Reference to an anchored node elsewhere.
    Alias(WeakNodeRef),
}

/// A node of a document tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Anchor name making this node a target for aliases.
    pub anchor: Option<String>,
    /// Kind specific payload.
    pub content: Content,
}

impl Node {
    /// Create an unanchored node.
    #[must_use]
    pub fn new(content: Content) -> Self {
        Self {
            anchor: None,
            content,
        }
    }

    /// Wrap the node into a shared handle.
    #[must_use]
    pub fn into_ref(self) -> NodeRef {
        Rc::new(RefCell::new(self))
    }

    /// A scalar with an explicit tag.
    #[must_use]
    pub fn scalar(tag: ScalarTag, value: impl Into<String>) -> NodeRef {
        Self::new(Content::Scalar {
            tag,
            value: value.into(),
        })
        .into_ref()
    }

    /// A `!!str` scalar.
    #[must_use]
    pub fn string(value: impl Into<String>) -> NodeRef {
        Self::scalar(ScalarTag::Str, value)
    }

    /// An `!!int` scalar.
    #[must_use]
    pub fn int(value: i64) -> NodeRef {
        Self::scalar(ScalarTag::Int, value.to_string())
    }

    /// A `!!bool` scalar.
    #[must_use]
    pub fn boolean(value: bool) -> NodeRef {
        Self::scalar(ScalarTag::Bool, value.to_string())
    }

    /// A `!!null` scalar.
    #[must_use]
    pub fn null() -> NodeRef {
        Self::scalar(ScalarTag::Null, "null")
    }

    /// A sequence of the given items.
    pub fn sequence(items: impl IntoIterator<Item = NodeRef>) -> NodeRef {
        Self::new(Content::Sequence(items.into_iter().collect())).into_ref()
    }

    /// A mapping of the given key/value pairs.
    pub fn mapping(entries: impl IntoIterator<Item = (NodeRef, NodeRef)>) -> NodeRef {
        Self::new(Content::Mapping(entries.into_iter().collect())).into_ref()
    }

    /// A mapping keyed by `!!str` scalars.
    pub fn entries<'a>(entries: impl IntoIterator<Item = (&'a str, NodeRef)>) -> NodeRef {
        Self::mapping(entries.into_iter().map(|(k, v)| (Self::string(k), v)))
    }

    /// A document holding `root`.
    #[must_use]
    pub fn document(root: NodeRef) -> NodeRef {
        Self::new(Content::Document(vec![root])).into_ref()
    }

    /// A document without a root, as produced for a blank source.
    #[must_use]
    pub fn empty_document() -> NodeRef {
        Self::new(Content::Document(Vec::new())).into_ref()
    }

    /// An alias pointing at `target`.
    #[must_use]
    pub fn alias(target: &NodeRef) -> NodeRef {
        Self::new(Content::Alias(Rc::downgrade(target))).into_ref()
    }

    /// Set the anchor of `node` and hand it back.
    #[must_use]
    pub fn anchored(name: impl Into<String>, node: NodeRef) -> NodeRef {
        node.borrow_mut().set_anchor(Some(name.into()));
        node
    }

    /// Kind of this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self.content {
            Content::Document(_) => NodeKind::Document,
            Content::Sequence(_) => NodeKind::Sequence,
            Content::Mapping(_) => NodeKind::Mapping,
            Content::Scalar { .. } => NodeKind::Scalar,
            Content::Alias(_) => NodeKind::Alias,
        }
    }

    /// Anchor name, if any.
    #[must_use]
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Replace the anchor; empty names clear it.
    pub fn set_anchor(&mut self, anchor: Option<String>) {
        self.anchor = anchor.filter(|name| !name.is_empty());
    }

    /// Text of a scalar node.
    #[must_use]
    pub fn scalar_value(&self) -> Option<&str> {
        match &self.content {
            Content::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Tag of a scalar node.
    #[must_use]
    pub fn tag(&self) -> Option<&ScalarTag> {
        match &self.content {
            Content::Scalar { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Whether this node is an alias.
    #[must_use]
    pub fn is_alias(&self) -> bool {
        matches!(self.content, Content::Alias(_))
    }

    /// The live target of an alias node.
    #[must_use]
    pub fn alias_target(&self) -> Option<NodeRef> {
        match &self.content {
            Content::Alias(target) => target.upgrade(),
            _ => None,
        }
    }

    /// Number of children (entries for mappings, zero for leaves).
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.content {
            Content::Document(children) | Content::Sequence(children) => children.len(),
            Content::Mapping(entries) => entries.len(),
            Content::Scalar { .. } | Content::Alias(_) => 0,
        }
    }

    /// Whether the node has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single root of a well-formed document.
    #[must_use]
    pub fn root(&self) -> Option<NodeRef> {
        match &self.content {
            Content::Document(children) if children.len() == 1 => children.first().cloned(),
            _ => None,
        }
    }

    /// Value of the first entry whose scalar key equals `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<NodeRef> {
        let Content::Mapping(entries) = &self.content else {
            return None;
        };
        entries
            .iter()
            .find(|(k, _)| k.borrow().scalar_value() == Some(key))
            .map(|(_, v)| Rc::clone(v))
    }
}

/// Identity of a node handle, stable while the node is alive.
pub(crate) fn identity(node: &NodeRef) -> *const RefCell<Node> {
    Rc::as_ptr(node)
}

impl fmt::Display for Node {
    /// Renders the tree in YAML flow style with `&anchor` and `*alias` marks.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(anchor) = &self.anchor {
            write!(f, "&{anchor} ")?;
        }
        match &self.content {
            Content::Document(children) => match children.first() {
                Some(root) => write_ref(f, root),
                None => Ok(()),
            },
            Content::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_ref(f, item)?;
                }
                f.write_str("]")
            },
            Content::Mapping(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_ref(f, key)?;
                    f.write_str(": ")?;
                    write_ref(f, value)?;
                }
                f.write_str("}")
            },
            Content::Scalar { tag, value } => write_scalar(f, tag, value),
            Content::Alias(target) => match target.upgrade() {
                Some(target) => match target.try_borrow() {
                    Ok(node) => write!(f, "*{}", node.anchor().unwrap_or_default()),
                    Err(_) => f.write_str("*<busy>"),
                },
                None => f.write_str("*<dangling>"),
            },
        }
    }
}

fn write_ref(f: &mut fmt::Formatter<'_>, node: &NodeRef) -> fmt::Result {
    match node.try_borrow() {
        Ok(node) => write!(f, "{node}"),
        Err(_) => f.write_str("<busy>"),
    }
}

fn write_scalar(f: &mut fmt::Formatter<'_>, tag: &ScalarTag, value: &str) -> fmt::Result {
    match tag {
        ScalarTag::Str if needs_quotes(value) => write!(f, "{value:?}"),
        ScalarTag::Custom(custom) => write!(f, "{custom} {value}"),
        _ => f.write_str(value),
    }
}

/// A string needs quotes when plain style would change its meaning.
fn needs_quotes(value: &str) -> bool {
    if value.is_empty() || value.trim() != value {
        return true;
    }
    if value
        .chars()
        .any(|c| matches!(c, ':' | '{' | '}' | '[' | ']' | ',' | '#' | '"' | '\'' | '\n'))
    {
        return true;
    }
    if value.starts_with(['&', '*', '!', '|', '>', '%', '@', '`', '-', '?']) {
        return true;
    }
    !matches!(
        serde_yaml::from_str::<serde_yaml::Value>(value),
        Ok(serde_yaml::Value::String(ref parsed)) if parsed == value
    )
}
