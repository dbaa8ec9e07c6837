//! Bridge between document trees, YAML text and `serde_yaml` values.
//!
//! [`YamlCodec::parse`] builds trees from parser events, so anchors and
//! aliases written in the text survive as anchored nodes and alias nodes.
//! Conversion to a `serde_yaml` value expands aliases.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde::Serialize;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag as EventTag};
use yaml_rust2::scanner::{Marker, Scanner, TScalarStyle, Token, TokenType};

use crate::error::{ConfigError, ConfigResult, NodeError, NodeResult};
use crate::merge::MAX_MERGE_DEPTH;
use crate::node::{Content, Node, NodeKind, NodeRef, ScalarTag, identity};

/// Parses source text into trees and emits trees back to text.
pub trait Codec {
    /// Parse one source into a document node.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if the text is not valid YAML, or
    /// a tree error for content the node model cannot hold.
    fn parse(&self, source_name: &str, text: &str) -> ConfigResult<NodeRef>;

    /// Serialize a tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be represented or encoded.
    fn emit(&self, node: &NodeRef) -> ConfigResult<String>;
}

/// [`Codec`] reading YAML with `yaml-rust2` and writing it with `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn parse(&self, source_name: &str, text: &str) -> ConfigResult<NodeRef> {
        if is_blank(text) {
            return Ok(Node::empty_document());
        }

        let mut builder = TreeBuilder::new(anchor_names(text));
        Parser::new_from_str(text)
            .load(&mut builder, true)
            .map_err(|source| ConfigError::ParseError {
                source_name: source_name.to_owned(),
                source,
            })?;
        Ok(builder.finish()?)
    }

    fn emit(&self, node: &NodeRef) -> ConfigResult<String> {
        let value = to_value(node)?;
        serde_yaml::to_string(&value).map_err(ConfigError::EncodeError)
    }
}

/// Anchor names in the order the parser numbers them, starting at id 1.
fn anchor_names(text: &str) -> Vec<String> {
    Scanner::new(text.chars())
        .filter_map(|Token(_, token)| match token {
            TokenType::Anchor(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Open container waiting for its children.
struct Frame {
    node: NodeRef,
    key: Option<NodeRef>,
}

/// Assembles parser events into a document node.
struct TreeBuilder {
    names: Vec<String>,
    anchors: HashMap<usize, NodeRef>,
    stack: Vec<Frame>,
    roots: Vec<NodeRef>,
    error: Option<NodeError>,
}

impl TreeBuilder {
    fn new(names: Vec<String>) -> Self {
        Self {
            names,
            anchors: HashMap::new(),
            stack: Vec::new(),
            roots: Vec::new(),
            error: None,
        }
    }

    fn finish(self) -> NodeResult<NodeRef> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(Node::new(Content::Document(self.roots)).into_ref()),
        }
    }

    fn handle(&mut self, event: Event) -> NodeResult<()> {
        match event {
            Event::Scalar(text, style, anchor, tag) => {
                let tag = scalar_tag(&text, style, tag.as_ref());
                let text = if tag == ScalarTag::Null && text.is_empty() {
                    "null".to_owned()
                } else {
                    text
                };
                let node = self.register(anchor, Node::scalar(tag, text));
                self.attach(node);
            },
            Event::Alias(id) => {
                let target = self.anchors.get(&id).ok_or(NodeError::NilNode)?;
                let node = Node::alias(target);
                self.attach(node);
            },
            Event::SequenceStart(anchor, tag) => {
                check_container_tag(NodeKind::Sequence, tag.as_ref(), "seq")?;
                let node = Node::sequence([]);
                self.open(anchor, node);
            },
            Event::MappingStart(anchor, tag) => {
                check_container_tag(NodeKind::Mapping, tag.as_ref(), "map")?;
                let node = Node::mapping([]);
                self.open(anchor, node);
            },
            Event::SequenceEnd | Event::MappingEnd => {
                if let Some(frame) = self.stack.pop() {
                    self.attach(frame.node);
                }
            },
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {},
        }
        Ok(())
    }

    fn register(&mut self, anchor: usize, node: NodeRef) -> NodeRef {
        let name = anchor
            .checked_sub(1)
            .and_then(|index| self.names.get(index))
            .cloned();
        if let Some(name) = name {
            node.borrow_mut().set_anchor(Some(name));
            self.anchors.insert(anchor, Rc::clone(&node));
        }
        node
    }

    fn open(&mut self, anchor: usize, node: NodeRef) {
        let node = self.register(anchor, node);
        self.stack.push(Frame { node, key: None });
    }

    fn attach(&mut self, node: NodeRef) {
        let Some(frame) = self.stack.last_mut() else {
            self.roots.push(node);
            return;
        };
        let mut parent = frame.node.borrow_mut();
        match &mut parent.content {
            Content::Sequence(items) => items.push(node),
            Content::Mapping(entries) => match frame.key.take() {
                Some(key) => entries.push((key, node)),
                None => frame.key = Some(node),
            },
            Content::Document(_) | Content::Scalar { .. } | Content::Alias(_) => {},
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, _mark: Marker) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = self.handle(event) {
            self.error = Some(error);
        }
    }
}

fn tag_name(tag: &EventTag) -> String {
    format!("{}{}", tag.handle, tag.suffix)
}

/// Explicit tags win; untagged plain scalars resolve with the YAML core
/// schema and every other style is a string.
fn scalar_tag(text: &str, style: TScalarStyle, tag: Option<&EventTag>) -> ScalarTag {
    if let Some(tag) = tag {
        return ScalarTag::from_tag(&tag_name(tag));
    }
    if style != TScalarStyle::Plain {
        return ScalarTag::Str;
    }
    match resolve_plain(text) {
        Value::Null => ScalarTag::Null,
        Value::Bool(_) => ScalarTag::Bool,
        Value::Number(n) if n.is_f64() => ScalarTag::Float,
        Value::Number(_) => ScalarTag::Int,
        _ => ScalarTag::Str,
    }
}

fn check_container_tag(kind: NodeKind, tag: Option<&EventTag>, core: &str) -> NodeResult<()> {
    let Some(tag) = tag else {
        return Ok(());
    };
    let name = tag_name(tag);
    if name.strip_prefix("tag:yaml.org,2002:") == Some(core) {
        return Ok(());
    }
    Err(NodeError::TypeUnhandled {
        kind,
        context: format!("tagged {name}"),
    })
}

/// Whether `text` holds no document: only blank lines, comments and markers.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---" || line == "...")
}

/// Re-encode a typed value as a document tree.
///
/// # Errors
///
/// Returns [`ConfigError::EncodeError`] if `value` cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> ConfigResult<NodeRef> {
    let value = serde_yaml::to_value(value).map_err(ConfigError::EncodeError)?;
    Ok(Node::document(from_value(&value)?))
}

/// Build a tree from a `serde_yaml` value. No document node is added.
///
/// # Errors
///
/// Returns [`NodeError::TypeUnhandled`] for tagged sequences or mappings.
pub fn from_value(value: &Value) -> NodeResult<NodeRef> {
    let node = match value {
        Value::Sequence(items) => Node::sequence(
            items
                .iter()
                .map(from_value)
                .collect::<NodeResult<Vec<_>>>()?,
        ),
        Value::Mapping(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                entries.push((from_value(key)?, from_value(value)?));
            }
            Node::mapping(entries)
        },
        Value::Tagged(tagged) => {
            let Some((_, text)) = scalar_parts(&tagged.value) else {
                return Err(NodeError::TypeUnhandled {
                    kind: kind_of(&tagged.value),
                    context: format!("tagged {}", tagged.tag),
                });
            };
            Node::scalar(ScalarTag::from_tag(&tagged.tag.to_string()), text)
        },
        scalar => {
            let Some((tag, text)) = scalar_parts(scalar) else {
                return Err(NodeError::TypeUnhandled {
                    kind: kind_of(scalar),
                    context: "in scalar position".to_owned(),
                });
            };
            Node::scalar(tag, text)
        },
    };
    Ok(node)
}

/// Convert a tree to a `serde_yaml` value, following aliases.
///
/// A document unwraps to its root; an empty document becomes `null`.
///
/// # Errors
///
/// Returns [`NodeError::NilNode`] for dangling aliases,
/// [`NodeError::AliasCycle`] if an alias leads back into itself and
/// [`NodeError::TypeUnhandled`] for documents below the root.
pub fn to_value(node: &NodeRef) -> NodeResult<Value> {
    let root = {
        let current = node.borrow();
        match &current.content {
            Content::Document(children) => match children.as_slice() {
                [] => return Ok(Value::Null),
                [root] => Rc::clone(root),
                _ => {
                    return Err(NodeError::TypeUnhandled {
                        kind: NodeKind::Document,
                        context: format!("with {} roots", children.len()),
                    });
                },
            },
            _ => Rc::clone(node),
        }
    };
    ValueBuilder::default().build(&root, 0)
}

#[derive(Default)]
struct ValueBuilder {
    following: HashSet<*const RefCell<Node>>,
}

impl ValueBuilder {
    fn build(&mut self, node: &NodeRef, depth: usize) -> NodeResult<Value> {
        if depth > MAX_MERGE_DEPTH {
            return Err(NodeError::DepthLimitExceeded {
                limit: MAX_MERGE_DEPTH,
            });
        }
        let next = depth.saturating_add(1);
        let current = node.borrow();

        match &current.content {
            Content::Document(_) => Err(NodeError::TypeUnhandled {
                kind: NodeKind::Document,
                context: "nested below the root".to_owned(),
            }),
            Content::Sequence(items) => items
                .iter()
                .map(|item| self.build(item, next))
                .collect::<NodeResult<Vec<_>>>()
                .map(Value::Sequence),
            Content::Mapping(entries) => {
                let mut map = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.build(key, next)?;
                    let value = self.build(value, next)?;
                    map.insert(key, value);
                }
                Ok(Value::Mapping(map))
            },
            Content::Scalar { tag, value } => Ok(scalar_value(tag, value)),
            Content::Alias(target) => {
                let target = target.upgrade().ok_or(NodeError::NilNode)?;
                let id = identity(&target);
                if !self.following.insert(id) {
                    return Err(NodeError::AliasCycle {
                        anchor: target.borrow().anchor().unwrap_or_default().to_owned(),
                    });
                }
                let value = self.build(&target, next);
                self.following.remove(&id);
                value
            },
        }
    }
}

fn scalar_value(tag: &ScalarTag, text: &str) -> Value {
    match tag {
        ScalarTag::Str => Value::String(text.to_owned()),
        ScalarTag::Null => Value::Null,
        ScalarTag::Bool | ScalarTag::Int | ScalarTag::Float => resolve_plain(text),
        ScalarTag::Custom(custom) if custom.trim_start_matches('!').is_empty() => {
            Value::String(text.to_owned())
        },
        ScalarTag::Custom(custom) => Value::Tagged(Box::new(TaggedValue {
            tag: Tag::new(custom.as_str()),
            value: resolve_plain(text),
        })),
    }
}

/// Resolve a plain scalar with the YAML core schema; anything that does not
/// come out as null, bool or number stays a string.
fn resolve_plain(text: &str) -> Value {
    match serde_yaml::from_str::<Value>(text) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_))) => value,
        _ => Value::String(text.to_owned()),
    }
}

fn scalar_parts(value: &Value) -> Option<(ScalarTag, String)> {
    match value {
        Value::Null => Some((ScalarTag::Null, "null".to_owned())),
        Value::Bool(b) => Some((ScalarTag::Bool, b.to_string())),
        Value::Number(n) if n.is_f64() => Some((ScalarTag::Float, n.to_string())),
        Value::Number(n) => Some((ScalarTag::Int, n.to_string())),
        Value::String(s) => Some((ScalarTag::Str, s.clone())),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

fn kind_of(value: &Value) -> NodeKind {
    match value {
        Value::Sequence(_) => NodeKind::Sequence,
        Value::Mapping(_) => NodeKind::Mapping,
        _ => NodeKind::Scalar,
    }
}
