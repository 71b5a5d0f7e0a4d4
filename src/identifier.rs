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

//! User-supplied entity references, before resolution.
//!
//! A reference can be a raw API id, a human-readable name, a free-form
//! string matched against an entity type's registered attributes, or a
//! bracketed hierarchical form such as `{owner}{product}{group}`. Which
//! grammar applies is decided at construction; what it resolves to is the
//! resolver's business.

use anyhow::Result;

use crate::entity::EntityType;
use crate::resolve::ResolveError;

/// Where an identifier value came from. Diagnostic only; resolution never
/// branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    CliArgument,
    ProjectConfig,
    ApiResponse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierKind {
    /// Nothing was supplied, by flag, project file, or otherwise.
    Empty,
    /// A raw API id; resolves without a remote round-trip.
    Id(String),
    /// A name; looked up against exactly the `name` attribute.
    Name(String),
    /// Free-form; looked up against the full attribute set registered for
    /// the target entity type (known only once the type is known).
    AnyAttribute(String),
    /// Bracketed composite form; parsed and resolved level by level.
    Hierarchical(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierValue {
    kind: IdentifierKind,
    origin: Origin,
    resolved_id: Option<String>,
}

impl IdentifierValue {
    pub fn empty() -> Self {
        Self {
            kind: IdentifierKind::Empty,
            origin: Origin::CliArgument,
            resolved_id: None,
        }
    }

    pub fn from_id(id: impl Into<String>, origin: Origin) -> Self {
        Self {
            kind: IdentifierKind::Id(id.into()),
            origin,
            resolved_id: None,
        }
    }

    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Name(name.into()),
            origin: Origin::CliArgument,
            resolved_id: None,
        }
    }

    /// Classify a free-form string: a leading `{` marks the hierarchical
    /// grammar, anything else is matched against the target type's
    /// registered attributes.
    pub fn from_raw(value: impl Into<String>, origin: Origin) -> Self {
        let value = value.into();
        let kind = if value.starts_with('{') {
            IdentifierKind::Hierarchical(value)
        } else {
            IdentifierKind::AnyAttribute(value)
        };
        Self {
            kind,
            origin,
            resolved_id: None,
        }
    }

    pub fn kind(&self) -> &IdentifierKind {
        &self.kind
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, IdentifierKind::Empty)
    }

    /// The single place that encodes "no usable reference was given".
    pub fn check_non_empty(&self, entity: EntityType) -> Result<()> {
        if self.is_empty() {
            return Err(ResolveError::NoIdentifier(entity).into());
        }
        Ok(())
    }

    /// What the user originally typed, if anything.
    pub fn raw(&self) -> Option<&str> {
        match &self.kind {
            IdentifierKind::Empty => None,
            IdentifierKind::Id(s)
            | IdentifierKind::Name(s)
            | IdentifierKind::AnyAttribute(s)
            | IdentifierKind::Hierarchical(s) => Some(s),
        }
    }

    /// Copy of this value carrying the id it resolved to, so callers can
    /// show both the typed form and the id without re-querying.
    pub fn with_resolved(&self, id: impl Into<String>) -> Self {
        Self {
            kind: self.kind.clone(),
            origin: self.origin,
            resolved_id: Some(id.into()),
        }
    }

    pub fn resolved_id(&self) -> Option<&str> {
        self.resolved_id.as_deref()
    }
}

/// Split `{seg0}{seg1}...{segN}` into its segments. Empty groups are kept:
/// an empty owner segment and an empty leaf segment produce different
/// errors downstream. Stray text outside a group, a nested `{`, or an
/// unterminated group is malformed.
pub fn parse_segments(raw: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut chars = raw.chars();

    loop {
        match chars.next() {
            None => break,
            Some('{') => {
                let mut segment = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(ResolveError::Malformed(raw.to_string()).into());
                        }
                        Some(c) => segment.push(c),
                    }
                }
                segments.push(segment);
            }
            Some(_) => return Err(ResolveError::Malformed(raw.to_string()).into()),
        }
    }

    if segments.is_empty() {
        return Err(ResolveError::Malformed(raw.to_string()).into());
    }
    Ok(segments)
}

/// Inverse of [`parse_segments`] for well-formed input.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('{');
        out.push_str(segment.as_ref());
        out.push('}');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_string_with_braces_is_hierarchical() {
        let ident = IdentifierValue::from_raw("{me}{app}{beta}", Origin::CliArgument);
        assert!(matches!(ident.kind(), IdentifierKind::Hierarchical(_)));

        let plain = IdentifierValue::from_raw("beta", Origin::CliArgument);
        assert!(matches!(plain.kind(), IdentifierKind::AnyAttribute(_)));
    }

    #[test]
    fn empty_identifier_fails_non_empty_check() {
        let ident = IdentifierValue::empty();
        assert!(ident.is_empty());
        let err = ident.check_non_empty(EntityType::DeviceGroup).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ResolveError>(),
            Some(&ResolveError::NoIdentifier(EntityType::DeviceGroup))
        );
    }

    #[test]
    fn parses_three_segments_in_order() {
        let segments = parse_segments("{a}{b}{c}").unwrap();
        assert_eq!(segments, vec!["a", "b", "c"]);
    }

    #[test]
    fn keeps_empty_groups_as_empty_segments() {
        let segments = parse_segments("{}{prod}{}").unwrap();
        assert_eq!(segments, vec!["", "prod", ""]);
    }

    #[test]
    fn join_round_trips_well_formed_input() {
        for raw in ["{a}", "{a}{b}", "{me}{my product}{dg name}", "{}{}{}"] {
            let segments = parse_segments(raw).unwrap();
            assert_eq!(join_segments(&segments), raw);
        }
    }

    #[test]
    fn rejects_malformed_bracket_strings() {
        for raw in ["{a}{b", "{a}x{b}", "{a{b}}", "{"] {
            let err = parse_segments(raw).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<ResolveError>(),
                    Some(ResolveError::Malformed(_))
                ),
                "expected malformed error for {raw:?}"
            );
        }
    }

    #[test]
    fn with_resolved_keeps_the_typed_form() {
        let ident = IdentifierValue::from_name("beta");
        let resolved = ident.with_resolved("dg-123");
        assert_eq!(resolved.raw(), Some("beta"));
        assert_eq!(resolved.resolved_id(), Some("dg-123"));
        assert_eq!(ident.resolved_id(), None);
    }
}
