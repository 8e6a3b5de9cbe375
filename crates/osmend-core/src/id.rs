//! Typed feature identifiers.
//!
//! OSM tooling passes features around as strings like `n42` or `w1234`: a
//! one-letter kind tag followed by the numeric id. Everything downstream of
//! the scanner works with the parsed [`FeatureId`] instead, so a malformed id
//! is rejected once, at the boundary, rather than propagating as a silent
//! no-op string comparison.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The category of a feature. Each kind has a distinct reference shape:
/// ways reference nodes by ordered `<nd>` list, relations reference any kind
/// via typed `<member>` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Node,
    Way,
    Relation,
}

impl Kind {
    /// The XML element name for this kind (`node`, `way`, `relation`).
    pub fn as_tag(self) -> &'static str {
        match self {
            Kind::Node => "node",
            Kind::Way => "way",
            Kind::Relation => "relation",
        }
    }

    /// The one-letter prefix used in scanner reports and CLI id lists.
    pub fn prefix(self) -> char {
        match self {
            Kind::Node => 'n',
            Kind::Way => 'w',
            Kind::Relation => 'r',
        }
    }

    pub fn from_prefix(c: char) -> Option<Kind> {
        match c {
            'n' => Some(Kind::Node),
            'w' => Some(Kind::Way),
            'r' => Some(Kind::Relation),
            _ => None,
        }
    }

    /// Inverse of [`Kind::as_tag`], used for `<member type="...">` matching.
    pub fn from_tag(tag: &str) -> Option<Kind> {
        match tag {
            "node" => Some(Kind::Node),
            "way" => Some(Kind::Way),
            "relation" => Some(Kind::Relation),
            _ => None,
        }
    }
}

/// A feature identifier: kind plus numeric id, unique within its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId {
    pub kind: Kind,
    pub num: u64,
}

impl FeatureId {
    pub fn new(kind: Kind, num: u64) -> FeatureId {
        FeatureId { kind, num }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.num)
    }
}

impl FromStr for FeatureId {
    type Err = Error;

    fn from_str(s: &str) -> Result<FeatureId> {
        let bad = || Error::BadId(s.to_string());
        let mut chars = s.chars();
        let kind = chars
            .next()
            .and_then(Kind::from_prefix)
            .ok_or_else(bad)?;
        let digits = chars.as_str();
        if digits.is_empty() {
            return Err(bad());
        }
        let num = digits.parse::<u64>().map_err(|_| bad())?;
        Ok(FeatureId { kind, num })
    }
}
