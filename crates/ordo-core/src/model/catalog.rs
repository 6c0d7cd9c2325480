//! The catalog: an ordered arena of declared resources.
//!
//! # Overview
//!
//! A [`Catalog`] is the read-only input of a transaction. It owns every
//! declared [`Resource`] in declaration order (the order breaks ties in the
//! scheduler), the relationship metaparameters each resource declares, and
//! the catalog-level relationships produced by chained arrows
//! (`A -> B`, `A ~> B`).
//!
//! References between resources are kept by name. They are resolved (and
//! validated) when the relationship graph and the containment forest are
//! built, so a catalog may be assembled in any order.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ordo_core::model::{Catalog, ResourceDecl, ResourceRef, RelationKind};
//!
//! let mut catalog = Catalog::new();
//! catalog.add_resource(ResourceDecl::new(ResourceRef::new("class", "base")))?;
//! catalog.add_resource(
//!     ResourceDecl::new(ResourceRef::new("notify", "base"))
//!         .contained_by(ResourceRef::new("class", "base")),
//! )?;
//! catalog.add_relationship(
//!     ResourceRef::new("class", "base"),
//!     RelationKind::Before,
//!     ResourceRef::new("class", "top"),
//! );
//! ```

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use crate::error::CatalogError;

use super::resource::{RelationKind, Relationship, Resource, ResourceId, ResourceRef};

// ---------------------------------------------------------------------------
// ResourceDecl
// ---------------------------------------------------------------------------

/// A resource declaration as handed over by the catalog compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecl {
    /// Unique `Type[title]` of the resource.
    pub name: ResourceRef,
    /// Relationship metaparameters, in declaration order.
    pub relationships: Vec<Relationship>,
    /// Optional containing resource.
    pub container: Option<ResourceRef>,
}

impl ResourceDecl {
    /// Declare a resource with no relationships and no container.
    #[must_use]
    pub const fn new(name: ResourceRef) -> Self {
        Self {
            name,
            relationships: Vec::new(),
            container: None,
        }
    }

    /// Add a relationship metaparameter.
    #[must_use]
    pub fn relate(mut self, kind: RelationKind, target: ResourceRef) -> Self {
        self.relationships.push(Relationship::new(kind, target));
        self
    }

    /// `before => target`
    #[must_use]
    pub fn before(self, target: ResourceRef) -> Self {
        self.relate(RelationKind::Before, target)
    }

    /// `require => target`
    #[must_use]
    pub fn require(self, target: ResourceRef) -> Self {
        self.relate(RelationKind::Require, target)
    }

    /// `notify => target`
    #[must_use]
    pub fn notify(self, target: ResourceRef) -> Self {
        self.relate(RelationKind::Notify, target)
    }

    /// `subscribe => target`
    #[must_use]
    pub fn subscribe(self, target: ResourceRef) -> Self {
        self.relate(RelationKind::Subscribe, target)
    }

    /// Place the resource inside `container`.
    #[must_use]
    pub fn contained_by(mut self, container: ResourceRef) -> Self {
        self.container = Some(container);
        self
    }
}

/// A relationship declared outside any resource body (a chained arrow).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogRelationship {
    /// Left-hand side of the arrow, as written.
    pub source: ResourceRef,
    /// Relationship kind, interpreted from `source`'s point of view.
    pub kind: RelationKind,
    /// Right-hand side of the arrow.
    pub target: ResourceRef,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Ordered set of declared resources and relationships for one transaction.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    resources: Vec<Resource>,
    index: HashMap<ResourceRef, ResourceId>,
    relationships: Vec<CatalogRelationship>,
}

impl Catalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource declaration.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateResource`] if a resource with the same
    /// `Type[title]` was already declared.
    pub fn add_resource(&mut self, decl: ResourceDecl) -> Result<ResourceId, CatalogError> {
        if self.index.contains_key(&decl.name) {
            return Err(CatalogError::DuplicateResource(decl.name));
        }

        let id = ResourceId::from_index(self.resources.len());
        self.index.insert(decl.name.clone(), id);
        self.resources.push(Resource {
            id,
            name: decl.name,
            relationships: decl.relationships,
            container: decl.container,
        });
        Ok(id)
    }

    /// Record a chained-arrow relationship between two resources.
    ///
    /// Neither side is validated here; unknown references surface when the
    /// relationship graph is built.
    pub fn add_relationship(&mut self, source: ResourceRef, kind: RelationKind, target: ResourceRef) {
        self.relationships.push(CatalogRelationship {
            source,
            kind,
            target,
        });
    }

    /// Assign `container` to an already-declared resource (`contain` in the
    /// source language).
    ///
    /// Assigning the same container twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownResource`] if `member` is not declared,
    /// or [`CatalogError::ContainmentConflict`] if it already has a different
    /// container.
    pub fn set_container(
        &mut self,
        member: &ResourceRef,
        container: ResourceRef,
    ) -> Result<(), CatalogError> {
        let id = self.lookup(member).ok_or_else(|| CatalogError::UnknownResource {
            reference: member.clone(),
            declared_by: container.clone(),
        })?;
        let resource = &mut self.resources[id.index()];

        match &resource.container {
            Some(existing) if *existing == container => Ok(()),
            Some(existing) => Err(CatalogError::ContainmentConflict {
                member: member.clone(),
                existing: existing.clone(),
                requested: container,
            }),
            None => {
                resource.container = Some(container);
                Ok(())
            }
        }
    }

    /// Look up a resource id by name.
    #[must_use]
    pub fn lookup(&self, name: &ResourceRef) -> Option<ResourceId> {
        self.index.get(name).copied()
    }

    /// Fetch a resource by id.
    #[must_use]
    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.index())
    }

    /// Fetch a resource by name.
    #[must_use]
    pub fn get_by_name(&self, name: &ResourceRef) -> Option<&Resource> {
        self.lookup(name).and_then(|id| self.get(id))
    }

    /// All resources, in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Chained-arrow relationships, in declaration order.
    #[must_use]
    pub fn relationships(&self) -> &[CatalogRelationship] {
        &self.relationships
    }

    /// Number of declared resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if no resources were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(raw: &str) -> ResourceRef {
        ResourceRef::parse(raw).expect("valid ref")
    }

    #[test]
    fn ids_follow_declaration_order() {
        let mut catalog = Catalog::new();
        let a = catalog.add_resource(ResourceDecl::new(r("Notify[a]"))).expect("add a");
        let b = catalog.add_resource(ResourceDecl::new(r("Notify[b]"))).expect("add b");
        assert!(a < b);
        assert_eq!(catalog.lookup(&r("notify[b]")), Some(b));
        assert_eq!(catalog.get(a).map(Resource::name), Some(&r("Notify[a]")));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let mut catalog = Catalog::new();
        catalog.add_resource(ResourceDecl::new(r("Notify[a]"))).expect("add a");
        let err = catalog
            .add_resource(ResourceDecl::new(r("notify[a]")))
            .expect_err("duplicate");
        assert_eq!(err, CatalogError::DuplicateResource(r("Notify[a]")));
    }

    #[test]
    fn builder_records_relationships_in_order() {
        let decl = ResourceDecl::new(r("Notify[a]"))
            .require(r("Class[Base]"))
            .notify(r("Service[x]"))
            .contained_by(r("Class[Top]"));
        assert_eq!(decl.relationships.len(), 2);
        assert_eq!(decl.relationships[0].kind, RelationKind::Require);
        assert_eq!(decl.relationships[1].kind, RelationKind::Notify);
        assert_eq!(decl.container, Some(r("Class[Top]")));
    }

    #[test]
    fn set_container_is_idempotent_and_rejects_conflicts() {
        let mut catalog = Catalog::new();
        catalog.add_resource(ResourceDecl::new(r("Class[A]"))).expect("add");
        catalog.add_resource(ResourceDecl::new(r("Class[B]"))).expect("add");
        catalog.add_resource(ResourceDecl::new(r("Notify[m]"))).expect("add");

        catalog.set_container(&r("Notify[m]"), r("Class[A]")).expect("first");
        catalog.set_container(&r("Notify[m]"), r("Class[A]")).expect("same again");

        let err = catalog
            .set_container(&r("Notify[m]"), r("Class[B]"))
            .expect_err("conflict");
        assert!(matches!(err, CatalogError::ContainmentConflict { .. }));
    }

    #[test]
    fn set_container_on_unknown_member_fails() {
        let mut catalog = Catalog::new();
        let err = catalog
            .set_container(&r("Notify[ghost]"), r("Class[A]"))
            .expect_err("unknown");
        assert!(matches!(err, CatalogError::UnknownResource { .. }));
    }
}
