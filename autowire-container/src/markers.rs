//! Injection markers and the reader that collects them.
//!
//! Markers are attached to properties and methods when a class is defined.
//! The [`MarkerReader`] walks a class's inheritance chain and yields each
//! marked member once: a member redeclared by a subclass hides the parent's
//! declaration, whether or not the subclass marks it.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::reflect::{ClassDefinition, MethodDefinition, PropertyDefinition, Reflector};

/// Declarative metadata on a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Must be injected right after construction. An explicit `id` wins
    /// over the member's declared type.
    Required { id: Option<String> },
    /// Injected when possible; failures leave the member untouched.
    Inject { id: Option<String> },
}

impl Marker {
    pub fn required() -> Self {
        Self::Required { id: None }
    }

    pub fn required_id(id: impl Into<String>) -> Self {
        Self::Required { id: Some(id.into()) }
    }

    pub fn inject() -> Self {
        Self::Inject { id: None }
    }

    pub fn inject_id(id: impl Into<String>) -> Self {
        Self::Inject { id: Some(id.into()) }
    }

    pub fn kind(&self) -> MarkerKind {
        match self {
            Self::Required { .. } => MarkerKind::Required,
            Self::Inject { .. } => MarkerKind::Inject,
        }
    }

    /// The explicit target id, if one was given.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Required { id } | Self::Inject { id } => id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Required,
    Inject,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Required => write!(f, "Required"),
            MarkerKind::Inject => write!(f, "Inject"),
        }
    }
}

/// A marked member: the marker, the class declaring the member, and the
/// member itself.
#[derive(Debug, Clone)]
pub struct Marked<M> {
    pub marker: Marker,
    pub owner: Arc<ClassDefinition>,
    pub member: Arc<M>,
}

/// Collects marked members across an inheritance chain.
pub struct MarkerReader<'a> {
    reflector: &'a Reflector,
}

impl<'a> MarkerReader<'a> {
    pub fn new(reflector: &'a Reflector) -> Self {
        Self { reflector }
    }

    /// Marked properties of `class`, most-derived first.
    pub fn properties(&self, class: &str, kind: MarkerKind) -> Vec<Marked<PropertyDefinition>> {
        self.collect(class, kind, |definition| {
            definition
                .properties()
                .map(|p| (p.name().to_string(), p.markers().to_vec(), Arc::clone(p)))
                .collect()
        })
    }

    /// Marked methods of `class`, most-derived first.
    pub fn methods(&self, class: &str, kind: MarkerKind) -> Vec<Marked<MethodDefinition>> {
        self.collect(class, kind, |definition| {
            definition
                .methods()
                .map(|m| (m.name().to_string(), m.markers().to_vec(), Arc::clone(m)))
                .collect()
        })
    }

    fn collect<M>(
        &self,
        class: &str,
        kind: MarkerKind,
        members: impl Fn(&ClassDefinition) -> Vec<(String, Vec<Marker>, Arc<M>)>,
    ) -> Vec<Marked<M>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for owner in self.reflector.ancestry(class) {
            for (name, markers, member) in members(owner.as_ref()) {
                if !seen.insert(name) {
                    continue;
                }
                for marker in markers.into_iter().filter(|m| m.kind() == kind) {
                    found.push(Marked {
                        marker,
                        owner: Arc::clone(&owner),
                        member: Arc::clone(&member),
                    });
                }
            }
        }

        found
    }
}
