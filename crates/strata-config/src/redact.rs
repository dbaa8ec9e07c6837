//! Secret redaction over document trees.
//!
//! Values stored under mapping keys that look like secrets are masked in
//! place. A masked scalar keeps its length as a run of `*`; a masked
//! container is either collapsed to a single `*` or kept in shape with every
//! leaf masked, depending on the [`RedactMode`].
//!
//! Masking follows aliases and mutates their target, so every other alias of
//! the same target shows the masked value too.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, trace, warn};

use crate::merge::MAX_MERGE_DEPTH;
use crate::node::{Content, Node, NodeRef, ScalarTag, identity};

/// Keywords marking a mapping key as secret unless configured otherwise.
pub const DEFAULT_SECRET_PATTERN: &str = "key|secret|pass|password|cert|certificate";

/// Pattern that never matches, used for an empty keyword list.
const MATCH_NOTHING: &str = r"\b\B";

/// Decides whether a mapping key names a secret.
#[derive(Debug, Clone)]
pub struct SecretMatcher {
    pattern: Regex,
}

impl SecretMatcher {
    /// Build a matcher from a regular expression, matched case-insensitively
    /// anywhere in the key.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` does not compile.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { pattern })
    }

    /// Build a matcher that fires when a key contains any of `words`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the combined pattern grows too large.
    pub fn from_keywords<I, S>(words: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .map(|word| regex::escape(&word))
            .collect();

        if alternatives.is_empty() {
            return Self::new(MATCH_NOTHING);
        }
        Self::new(&alternatives.join("|"))
    }

    /// Whether `key` names a secret.
    #[must_use]
    pub fn is_secret(&self, key: &str) -> bool {
        self.pattern.is_match(&key.to_lowercase())
    }

    /// The underlying pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for SecretMatcher {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_PATTERN).expect("default secret pattern compiles")
    }
}

/// How masked containers are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedactMode {
    /// Replace the whole container by a single `*` scalar.
    #[default]
    Collapse,
    /// Keep the container and mask every value inside it. Mapping keys stay
    /// readable.
    Preserve,
}

/// Masks secrets in a tree in place.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    matcher: SecretMatcher,
    mode: RedactMode,
}

impl Redactor {
    /// Create a redactor.
    #[must_use]
    pub fn new(matcher: SecretMatcher, mode: RedactMode) -> Self {
        Self { matcher, mode }
    }

    /// Use a different container mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RedactMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use a different key matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: SecretMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// The key matcher.
    #[must_use]
    pub fn matcher(&self) -> &SecretMatcher {
        &self.matcher
    }

    /// The container mode.
    #[must_use]
    pub fn mode(&self) -> RedactMode {
        self.mode
    }

    /// Mask every value under a secret key below `node`.
    ///
    /// Running it again on an already redacted tree changes nothing.
    pub fn redact(&self, node: &NodeRef) {
        let mut pass = Pass {
            redactor: self,
            masked: HashSet::new(),
            active: HashSet::new(),
            count: 0,
        };
        pass.walk(node, 0);
        debug!(masked = pass.count, mode = ?self.mode, "redacted secrets");
    }
}

/// State of one redaction run.
struct Pass<'a> {
    redactor: &'a Redactor,
    masked: HashSet<*const RefCell<Node>>,
    active: HashSet<*const RefCell<Node>>,
    count: usize,
}

enum Masking {
    Leaf,
    Follow(Option<NodeRef>),
    Container(Vec<NodeRef>),
}

impl Pass<'_> {
    /// Walk the tree looking for secret keys. Aliases are not followed here.
    fn walk(&mut self, node: &NodeRef, depth: usize) {
        if depth > MAX_MERGE_DEPTH {
            warn!(limit = MAX_MERGE_DEPTH, "stopped redaction at depth limit");
            return;
        }
        let next = depth.saturating_add(1);

        let children: Vec<(Option<NodeRef>, NodeRef)> = match &node.borrow().content {
            Content::Document(items) | Content::Sequence(items) => {
                items.iter().map(|item| (None, Rc::clone(item))).collect()
            },
            Content::Mapping(entries) => entries
                .iter()
                .map(|(key, value)| (Some(Rc::clone(key)), Rc::clone(value)))
                .collect(),
            Content::Scalar { .. } | Content::Alias(_) => Vec::new(),
        };

        for (key, value) in children {
            if key.is_some_and(|key| self.is_secret_key(&key)) {
                self.mask(&value, next);
            } else {
                self.walk(&value, next);
            }
        }
    }

    fn is_secret_key(&self, key: &NodeRef) -> bool {
        key.borrow()
            .scalar_value()
            .is_some_and(|text| self.redactor.matcher.is_secret(text))
    }

    /// Mask `node` and, depending on the mode, everything below it.
    fn mask(&mut self, node: &NodeRef, depth: usize) {
        let id = identity(node);
        if self.active.contains(&id) {
            warn!(
                anchor = node.borrow().anchor().unwrap_or_default(),
                "skipping alias cycle while masking secrets"
            );
            return;
        }
        if !self.masked.insert(id) {
            trace!("node already masked");
            return;
        }
        if depth > MAX_MERGE_DEPTH {
            warn!(limit = MAX_MERGE_DEPTH, "stopped masking at depth limit");
            return;
        }
        let next = depth.saturating_add(1);

        let masking = match &node.borrow().content {
            Content::Scalar { .. } => Masking::Leaf,
            Content::Alias(target) => Masking::Follow(target.upgrade()),
            Content::Document(items) | Content::Sequence(items) => {
                Masking::Container(items.iter().map(Rc::clone).collect())
            },
            Content::Mapping(entries) => {
                Masking::Container(entries.iter().map(|(_, value)| Rc::clone(value)).collect())
            },
        };

        self.active.insert(id);
        match masking {
            Masking::Leaf => {
                if let Content::Scalar { tag, value } = &mut node.borrow_mut().content {
                    *value = "*".repeat(value.chars().count());
                    *tag = ScalarTag::Str;
                }
                self.count = self.count.saturating_add(1);
            },
            Masking::Follow(Some(target)) => self.mask(&target, next),
            Masking::Follow(None) => trace!("dangling alias left as is"),
            Masking::Container(_) if self.redactor.mode == RedactMode::Collapse => {
                node.borrow_mut().content = Content::Scalar {
                    tag: ScalarTag::Str,
                    value: "*".to_owned(),
                };
                self.count = self.count.saturating_add(1);
            },
            Masking::Container(children) => {
                for child in children {
                    self.mask(&child, next);
                }
            },
        }
        self.active.remove(&id);
    }
}
