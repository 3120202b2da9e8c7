//! # Hierarchical Resource Paths
//!
//! A [`Path`] addresses a resource or node in the cluster. It is an optional
//! context (usually a [`NodeId`] string) followed by an ordered list of
//! components:
//!
//! ```text
//! {context}://{c1}/{c2}/.../{cn}      with context
//! /{c1}/{c2}/.../{cn}                 without context
//! ```
//!
//! Components are either literal text, the single wildcard `*` or the
//! recursive wildcard `**`. The recursive wildcard may only appear once, as
//! the final component, and never as the context.
//!
//! Paths are immutable values. Every derivation (append, parent, strip) builds
//! a new path. Equality and hashing are exact over `(context, components)`;
//! wildcard-aware comparison lives in [`Path::matches`], which is symmetric but
//! not transitive and therefore not consistent with [`Eq`].
//!
//! ```rust
//! use types::Path;
//!
//! let pattern: Path = "*://users/*".parse().unwrap();
//! let concrete: Path = "node-a://users/alice".parse().unwrap();
//!
//! assert!(pattern.matches(&concrete));
//! assert_eq!(concrete.to_string(), "node-a://users/alice");
//! ```

mod ordering;

use crate::common::errors::PathError;
use crate::common::identifiers::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separates the context from the components
pub const CONTEXT_SEPARATOR: &str = "://";

/// Default component separator
pub const PATH_SEPARATOR: &str = "/";

/// Default separator used by [`Path::append_extension`]
pub const EXTENSION_SEPARATOR: &str = ".";

/// Single-component wildcard, also the wildcard context
pub const WILDCARD: &str = "*";

/// Matches any number of trailing components
pub const WILDCARD_RECURSIVE: &str = "**";

/// One segment of a [`Path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// Literal text. Never empty, never `*` or `**`, never contains `/`
    Literal(String),
    /// `*`
    Wildcard,
    /// `**`
    WildcardRecursive,
}

impl Component {
    /// Build a literal component, rejecting wildcard text
    pub fn literal(text: impl Into<String>) -> Result<Self, PathError> {
        let text = text.into();
        if text == WILDCARD || text == WILDCARD_RECURSIVE {
            return Err(PathError::InvalidComponent {
                component: text,
                reason: "wildcard text is not a literal".to_string(),
            });
        }
        validate_literal(&text)?;
        Ok(Component::Literal(text))
    }

    /// Interpret component text, mapping `*` and `**` to wildcards
    pub fn parse(text: &str) -> Result<Self, PathError> {
        match text {
            WILDCARD => Ok(Component::Wildcard),
            WILDCARD_RECURSIVE => Ok(Component::WildcardRecursive),
            other => {
                validate_literal(other)?;
                Ok(Component::Literal(other.to_string()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Component::Literal(text) => text,
            Component::Wildcard => WILDCARD,
            Component::WildcardRecursive => WILDCARD_RECURSIVE,
        }
    }

    fn validate(&self) -> Result<(), PathError> {
        match self {
            Component::Literal(text) => Component::literal(text.as_str()).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Equal, or either side is the single wildcard
    fn matches(&self, other: &Component) -> bool {
        matches!(self, Component::Wildcard) || matches!(other, Component::Wildcard) || self == other
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn validate_literal(text: &str) -> Result<(), PathError> {
    let reason = if text.is_empty() {
        "component is empty"
    } else if text.contains(PATH_SEPARATOR) {
        "component contains the path separator"
    } else if text.chars().any(char::is_control) {
        "component contains non-printable characters"
    } else {
        return Ok(());
    };

    Err(PathError::InvalidComponent {
        component: text.to_string(),
        reason: reason.to_string(),
    })
}

/// Hierarchical address of a resource or node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    context: Option<String>,
    components: Vec<Component>,
}

impl Path {
    /// The root path: no context, no components
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from an optional context and component text
    pub fn new<I, S>(context: Option<&str>, components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let components = components
            .into_iter()
            .map(|c| Component::parse(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_parts(context.map(str::to_string), components)
    }

    /// Build a context-free path from component text
    pub fn from_components<I, S>(components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(None, components)
    }

    /// Build a path whose context names `node`, or a context-free path when
    /// `node` is `None`
    pub fn from_node_and_components<I, S>(
        node: Option<&NodeId>,
        components: I,
    ) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let context = node.map(NodeId::to_string);
        Self::new(context.as_deref(), components)
    }

    /// Validating constructor every other constructor funnels through
    pub fn from_parts(
        context: Option<String>,
        components: Vec<Component>,
    ) -> Result<Self, PathError> {
        let context = normalize_context(context)?;

        let len = components.len();
        for (index, component) in components.iter().enumerate() {
            component.validate()?;
            if *component == Component::WildcardRecursive && index + 1 != len {
                return Err(PathError::MisplacedRecursiveWildcard { index, len });
            }
        }

        Ok(Self {
            context,
            components,
        })
    }

    /// Parse `context://a/b` or `/a/b` using the default separator
    pub fn parse(input: &str) -> Result<Self, PathError> {
        Self::parse_with_separator(input, PATH_SEPARATOR)
    }

    /// Parse with an alternate component separator. The context separator is
    /// always `://`.
    pub fn parse_with_separator(input: &str, separator: &str) -> Result<Self, PathError> {
        if !input.contains(CONTEXT_SEPARATOR) {
            return Self::new(None, split_components(input, separator));
        }

        let segments: Vec<&str> = input
            .split(CONTEXT_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [context, remainder] => {
                Self::new(Some(*context), split_components(remainder, separator))
            }
            _ => Err(PathError::ContextSplit {
                input: input.to_string(),
            }),
        }
    }

    /// Decode the UTF-8 wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PathError> {
        Self::parse(std::str::from_utf8(bytes)?)
    }

    /// Same context, no components
    pub fn context_root(&self) -> Self {
        Self {
            context: self.context.clone(),
            components: Vec::new(),
        }
    }

    // Queries

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    pub fn is_wildcard_context(&self) -> bool {
        self.context.as_deref() == Some(WILDCARD)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Component at `index`; negative indices count from the end
    pub fn component(&self, index: isize) -> Result<&Component, PathError> {
        let len = self.components.len();
        resolve_index(index, len)
            .and_then(|i| self.components.get(i))
            .ok_or(PathError::IndexOutOfRange { index, len })
    }

    /// Positions of every single wildcard component
    pub fn wildcard_indices(&self) -> Vec<usize> {
        self.components
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Component::Wildcard)
            .map(|(i, _)| i)
            .collect()
    }

    /// Contains at least one single wildcard
    pub fn is_wildcard(&self) -> bool {
        self.components.contains(&Component::Wildcard)
    }

    /// Ends in `**`
    pub fn is_wildcard_recursive(&self) -> bool {
        self.components.last() == Some(&Component::WildcardRecursive)
    }

    /// Ends in `*` or `**`
    pub fn is_wildcard_terminated(&self) -> bool {
        matches!(
            self.components.last(),
            Some(Component::Wildcard | Component::WildcardRecursive)
        )
    }

    /// Node named by the context. `None` without a context or with the
    /// wildcard context.
    pub fn node_id(&self) -> Result<Option<NodeId>, PathError> {
        match self.context.as_deref() {
            None | Some(WILDCARD) => Ok(None),
            Some(context) => Ok(Some(context.parse()?)),
        }
    }

    // Derivations

    /// Concatenate `child` onto this path, keeping this path's context
    pub fn append(&self, child: &Path) -> Result<Self, PathError> {
        match (&self.context, &child.context) {
            (Some(parent), Some(other)) if parent != other => {
                return Err(PathError::IncompatibleContext {
                    parent: parent.clone(),
                    child: other.clone(),
                })
            }
            (None, Some(other)) => {
                return Err(PathError::ContextRequired {
                    child: other.clone(),
                })
            }
            _ => {}
        }

        let mut components = self.components.clone();
        components.extend(child.components.iter().cloned());
        Self::from_parts(self.context.clone(), components)
    }

    /// Append component text. Fails on a path ending in `**`.
    pub fn append_components<I, S>(&self, components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut all = self.components.clone();
        for component in components {
            all.push(Component::parse(component.as_ref())?);
        }
        Self::from_parts(self.context.clone(), all)
    }

    /// When the path ends in a wildcard, replace the wildcard region with the
    /// supplied component. Otherwise the path is returned unchanged and
    /// `supplier` is never called.
    pub fn append_if_wildcard<F>(&self, supplier: F) -> Result<Self, PathError>
    where
        F: FnOnce() -> String,
    {
        if !self.is_wildcard_terminated() {
            return Ok(self.clone());
        }

        self.strip_wildcard_recursive()
            .strip_wildcard(-1)?
            .append_components([supplier()])
    }

    pub fn append_uuid_if_wildcard(&self) -> Result<Self, PathError> {
        self.append_if_wildcard(|| uuid::Uuid::new_v4().to_string())
    }

    /// Append `.{extension}` to the last component
    pub fn append_extension(&self, extension: &str) -> Result<Self, PathError> {
        self.append_extension_with(extension, EXTENSION_SEPARATOR)
    }

    /// Append `{separator}{extension}` to the last component. The root path
    /// is returned unchanged.
    pub fn append_extension_with(
        &self,
        extension: &str,
        separator: &str,
    ) -> Result<Self, PathError> {
        let Some((last, head)) = self.components.split_last() else {
            return Ok(self.clone());
        };

        let mut components = head.to_vec();
        components.push(Component::parse(&format!(
            "{}{}{}",
            last, separator, extension
        ))?);
        Self::from_parts(self.context.clone(), components)
    }

    /// Drop the last component. Root is its own parent.
    pub fn parent(&self) -> Self {
        let mut parent = self.clone();
        parent.components.pop();
        parent
    }

    /// Remove every component from the `index`'th single wildcard onward.
    /// Negative indices count from the last wildcard. Paths without
    /// wildcards are returned unchanged.
    pub fn strip_wildcard(&self, index: isize) -> Result<Self, PathError> {
        let wildcards = self.wildcard_indices();
        if wildcards.is_empty() {
            return Ok(self.clone());
        }

        let len = wildcards.len();
        let position = resolve_index(index, len)
            .and_then(|i| wildcards.get(i).copied())
            .ok_or(PathError::IndexOutOfRange { index, len })?;

        Ok(Self {
            context: self.context.clone(),
            components: self.components[..position].to_vec(),
        })
    }

    /// Drop a trailing `**`, if any
    pub fn strip_wildcard_recursive(&self) -> Self {
        if self.is_wildcard_recursive() {
            self.parent()
        } else {
            self.clone()
        }
    }

    /// Path ending in `**`, replacing any trailing wildcard region
    pub fn to_wildcard_recursive(&self) -> Self {
        if self.is_wildcard_recursive() {
            return self.clone();
        }

        let cut = self
            .wildcard_indices()
            .last()
            .copied()
            .unwrap_or(self.components.len());

        let mut components = self.components[..cut].to_vec();
        components.push(Component::WildcardRecursive);

        Self {
            context: self.context.clone(),
            components,
        }
    }

    /// Wildcard-aware comparison. Contexts match when equal or either is `*`.
    /// Components are compared pairwise up to the shorter length, a trailing
    /// `**` excluded from each side's length.
    pub fn matches(&self, other: &Path) -> bool {
        let contexts_match = self.is_wildcard_context()
            || other.is_wildcard_context()
            || self.context == other.context;

        if !contexts_match {
            return false;
        }

        self.components
            .iter()
            .zip(other.components.iter())
            .take(self.match_limit().min(other.match_limit()))
            .all(|(lhs, rhs)| lhs.matches(rhs))
    }

    fn match_limit(&self) -> usize {
        if self.is_wildcard_recursive() {
            self.components.len() - 1
        } else {
            self.components.len()
        }
    }

    // Context rewrites

    pub fn with_context(&self, context: &str) -> Result<Self, PathError> {
        if self.context.as_deref() == Some(context) {
            return Ok(self.clone());
        }
        Self::from_parts(Some(context.to_string()), self.components.clone())
    }

    pub fn with_context_if_absent(&self, context: &str) -> Result<Self, PathError> {
        if self.has_context() {
            Ok(self.clone())
        } else {
            self.with_context(context)
        }
    }

    pub fn without_context(&self) -> Self {
        Self {
            context: None,
            components: self.components.clone(),
        }
    }

    /// Replace the context with the string form of `node`
    pub fn with_node_id(&self, node: &NodeId) -> Self {
        Self {
            context: Some(node.to_string()),
            components: self.components.clone(),
        }
    }

    // Rendering

    /// `context://c1/c2` or `/c1/c2`
    pub fn to_normalized_string(&self) -> String {
        let joined = self.join(PATH_SEPARATOR);
        match &self.context {
            Some(context) => format!("{}{}{}", context, CONTEXT_SEPARATOR, joined),
            None => format!("{}{}", PATH_SEPARATOR, joined),
        }
    }

    /// Components joined by `separator`, without a leading separator. Only
    /// valid for context-free paths.
    pub fn to_relative_string(&self, separator: &str) -> Result<String, PathError> {
        if self.has_context() {
            return Err(PathError::RelativePathRequired {
                path: self.to_normalized_string(),
            });
        }
        Ok(self.join(separator))
    }

    /// UTF-8 wire form
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_normalized_string().into_bytes()
    }

    fn join(&self, separator: &str) -> String {
        self.components
            .iter()
            .map(Component::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

fn normalize_context(context: Option<String>) -> Result<Option<String>, PathError> {
    let context = context
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    if context.as_deref() == Some(WILDCARD_RECURSIVE) {
        return Err(PathError::WildcardContext);
    }

    Ok(context)
}

fn split_components<'a>(input: &'a str, separator: &'a str) -> impl Iterator<Item = &'a str> {
    input
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn resolve_index(index: isize, len: usize) -> Option<usize> {
    if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        let index = index as usize;
        (index < len).then_some(index)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_normalized_string())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Path::parse(&value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_normalized_string()
    }
}
