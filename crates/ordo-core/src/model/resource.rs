//! Resource identity, relationship declarations, and arena indices.
//!
//! A resource is named `Type[title]`. Type names are normalized by
//! capitalizing every `::`-separated segment (`notify` → `Notify`,
//! `apache::vhost` → `Apache::Vhost`). Titles are kept verbatim except for
//! `Class` resources, whose titles are class names and get the same
//! normalization (`Class[foo]` and `Class[Foo]` are the same resource).

#![allow(clippy::module_name_repetitions)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

// ---------------------------------------------------------------------------
// ResourceRef
// ---------------------------------------------------------------------------

/// The unique identity of a resource: `Type[title]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceRef {
    kind: String,
    title: String,
}

impl ResourceRef {
    /// Build a reference from a type name and a title, normalizing both.
    pub fn new(kind: &str, title: impl Into<String>) -> Self {
        let kind = normalize_type_name(kind);
        let title = title.into();
        let title = if kind == "Class" {
            normalize_type_name(&title)
        } else {
            title
        };
        Self { kind, title }
    }

    /// Parse `Type[title]`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidResourceRef`] when the input is not of
    /// the form `Type[title]` with a non-empty type and title.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidResourceRef(raw.to_string());
        let trimmed = raw.trim();

        let open = trimmed.find('[').ok_or_else(invalid)?;
        let inner = trimmed[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
        let kind = &trimmed[..open];

        let valid_kind = !kind.is_empty()
            && kind
                .split("::")
                .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        if !valid_kind || inner.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(kind, inner))
    }

    /// The normalized type name (e.g. `Notify`).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The resource title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns `true` for `Class[...]` resources.
    #[must_use]
    pub fn is_class(&self) -> bool {
        self.kind == "Class"
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.title)
    }
}

impl FromStr for ResourceRef {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceRef {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceRef> for String {
    fn from(value: ResourceRef) -> Self {
        value.to_string()
    }
}

fn normalize_type_name(raw: &str) -> String {
    raw.split("::")
        .map(|segment| {
            let lower = segment.to_ascii_lowercase();
            let mut chars = lower.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("::")
}

// ---------------------------------------------------------------------------
// ResourceId
// ---------------------------------------------------------------------------

/// Opaque index of a resource in its catalog's resource table.
///
/// Ids are assigned in declaration order, so comparing two ids compares
/// their catalog positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(usize);

impl ResourceId {
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position of the resource in catalog declaration order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RelationKind
// ---------------------------------------------------------------------------

/// The four relationship metaparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// The declaring resource runs before the target.
    Before,
    /// The target runs before the declaring resource.
    Require,
    /// Like `Before`, and the target refreshes when the declarer changes.
    Notify,
    /// Like `Require`, and the declarer refreshes when the target changes.
    Subscribe,
}

impl RelationKind {
    /// All kinds, in metaparameter documentation order.
    pub const ALL: [Self; 4] = [Self::Before, Self::Require, Self::Notify, Self::Subscribe];

    /// The metaparameter name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Require => "require",
            Self::Notify => "notify",
            Self::Subscribe => "subscribe",
        }
    }

    /// Whether the relationship carries a refresh notification.
    #[must_use]
    pub const fn is_notification(self) -> bool {
        matches!(self, Self::Notify | Self::Subscribe)
    }

    /// Whether the edge runs from the target to the declaring resource.
    #[must_use]
    pub const fn is_reversed(self) -> bool {
        matches!(self, Self::Require | Self::Subscribe)
    }

    /// Orient a declaration into a `(source, target)` edge.
    #[must_use]
    pub fn orient<'a, T: ?Sized>(self, declarer: &'a T, target: &'a T) -> (&'a T, &'a T) {
        if self.is_reversed() {
            (target, declarer)
        } else {
            (declarer, target)
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" | "->" => Ok(Self::Before),
            "require" => Ok(Self::Require),
            "notify" | "~>" => Ok(Self::Notify),
            "subscribe" => Ok(Self::Subscribe),
            other => Err(format!(
                "unknown relationship kind '{other}' (expected before, require, notify, or subscribe)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Relationship / Resource
// ---------------------------------------------------------------------------

/// One declared relationship metaparameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    /// Which metaparameter declared it.
    pub kind: RelationKind,
    /// The referenced resource.
    pub target: ResourceRef,
}

impl Relationship {
    /// Create a relationship declaration.
    #[must_use]
    pub const fn new(kind: RelationKind, target: ResourceRef) -> Self {
        Self { kind, target }
    }
}

/// A declared resource as stored in the catalog arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub(crate) id: ResourceId,
    pub(crate) name: ResourceRef,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) container: Option<ResourceRef>,
}

impl Resource {
    /// Arena index of this resource.
    #[must_use]
    pub const fn id(&self) -> ResourceId {
        self.id
    }

    /// The resource identity.
    #[must_use]
    pub const fn name(&self) -> &ResourceRef {
        &self.name
    }

    /// Relationship declarations in declaration order.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// The declared container, if any.
    #[must_use]
    pub const fn container(&self) -> Option<&ResourceRef> {
        self.container.as_ref()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.name, f)
    }
}
