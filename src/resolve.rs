// impctl - CLI for the impCentral device management API
// Copyright (C) 2025 The impctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Identifier resolution: turn whatever the user supplied into exactly one
//! remote entity id, or fail with a typed error.
//!
//! Every command goes through [`Resolver::resolve`] before it issues an
//! entity-specific request. Raw ids short-circuit without a round-trip;
//! names and free-form strings are looked up remotely; hierarchical
//! references are resolved level by level, each resolved level scoping the
//! next lookup. More than one remote match is always an error, never a
//! silent pick.

use anyhow::Result;
use serde_json::Value;
use thiserror::Error;

use crate::entity::EntityType;
use crate::identifier::{IdentifierKind, IdentifierValue, parse_segments};

/// Resolution failures. All fatal to the current command; the binary maps
/// them to a single stderr line and exit code 1. Transport errors are not
/// represented here; they propagate unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No identifier for {0} is specified.")]
    NoIdentifier(EntityType),
    #[error("Invalid identifier \"{0}\": malformed brace syntax.")]
    Malformed(String),
    #[error("{entity} \"{value}\" is not found.")]
    NotFound { entity: EntityType, value: String },
    #[error("Multiple {entity} entities match \"{value}\" ({matches} found); use an id.")]
    Ambiguous {
        entity: EntityType,
        value: String,
        matches: usize,
    },
}

/// A single entity as returned by the remote API: its id plus the JSON:API
/// `attributes` object.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: String,
    pub attributes: Value,
}

impl EntityRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// The outcome of a successful resolution: always exactly one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub id: String,
    pub entity_type: EntityType,
}

impl ResolvedEntity {
    pub fn new(id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            entity_type,
        }
    }
}

/// Remote lookup interface the resolver depends on. Implemented over the
/// real API client and by in-memory stubs in tests. No caching; every
/// resolution may re-query.
pub trait EntityLookup {
    fn find_by_id(&self, entity: EntityType, id: &str) -> Result<Option<EntityRecord>>;

    /// Match `value` against `attributes` (applied in the order given),
    /// optionally restricted to descendants of the already-resolved
    /// `scope` entities. Returns every match; disambiguation is the
    /// resolver's job.
    fn find_by_attributes(
        &self,
        entity: EntityType,
        attributes: &[&str],
        value: &str,
        scope: &[ResolvedEntity],
    ) -> Result<Vec<EntityRecord>>;
}

pub struct Resolver<'a> {
    lookup: &'a dyn EntityLookup,
}

impl<'a> Resolver<'a> {
    pub fn new(lookup: &'a dyn EntityLookup) -> Self {
        Self { lookup }
    }

    /// Resolve `ident` to exactly one `entity`-typed remote id.
    pub fn resolve(&self, ident: &IdentifierValue, entity: EntityType) -> Result<ResolvedEntity> {
        ident.check_non_empty(entity)?;
        match ident.kind() {
            IdentifierKind::Empty => unreachable!("checked above"),
            IdentifierKind::Id(id) => Ok(ResolvedEntity::new(id.clone(), entity)),
            IdentifierKind::Name(name) => self.resolve_by_attributes(entity, &["name"], name, &[]),
            IdentifierKind::AnyAttribute(value) => {
                self.resolve_by_attributes(entity, entity.lookup_attributes(), value, &[])
            }
            IdentifierKind::Hierarchical(raw) => self.resolve_hierarchical(raw, entity),
        }
    }

    fn resolve_by_attributes(
        &self,
        entity: EntityType,
        attributes: &[&str],
        value: &str,
        scope: &[ResolvedEntity],
    ) -> Result<ResolvedEntity> {
        let matches = self
            .lookup
            .find_by_attributes(entity, attributes, value, scope)?;
        match matches.len() {
            0 => Err(ResolveError::NotFound {
                entity,
                value: value.to_string(),
            }
            .into()),
            1 => Ok(ResolvedEntity::new(matches[0].id.clone(), entity)),
            n => Err(ResolveError::Ambiguous {
                entity,
                value: value.to_string(),
                matches: n,
            }
            .into()),
        }
    }

    /// Resolve a bracketed reference outer-to-inner. Segments are
    /// right-aligned against the entity's containment chain; a missing
    /// owner level is implicitly `me`. Each segment is emptiness-checked
    /// before its own lookup and before any inner segment is touched.
    fn resolve_hierarchical(&self, raw: &str, entity: EntityType) -> Result<ResolvedEntity> {
        let segments = parse_segments(raw)?;
        let chain = entity.hierarchy();

        // Over-qualified references are reported as the whole literal not
        // being found, matching the API-side behavior for bad names.
        if segments.len() > chain.len() {
            return Err(ResolveError::NotFound {
                entity,
                value: raw.to_string(),
            }
            .into());
        }

        let mut levels: Vec<(EntityType, String)> = Vec::with_capacity(chain.len());
        let offset = chain.len() - segments.len();
        if offset > 0 && segments.len() >= 2 && chain[0] == EntityType::Account {
            levels.push((EntityType::Account, "me".to_string()));
        }
        for (level, segment) in chain[offset..].iter().zip(segments) {
            levels.push((*level, segment));
        }

        let mut scope: Vec<ResolvedEntity> = Vec::new();
        let mut resolved = None;
        for (level, value) in levels {
            if value.is_empty() {
                return Err(ResolveError::NoIdentifier(level).into());
            }
            let entry = if level == EntityType::Account && value == "me" {
                // `me` is itself a valid account id remotely.
                ResolvedEntity::new("me", EntityType::Account)
            } else {
                self.resolve_by_attributes(level, level.lookup_attributes(), &value, &scope)?
            };
            scope.push(entry.clone());
            resolved = Some(entry);
        }

        // parse_segments never yields an empty list, so at least one level
        // was resolved.
        Ok(resolved.expect("hierarchical reference has at least one segment"))
    }
}
