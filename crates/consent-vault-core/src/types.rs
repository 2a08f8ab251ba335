//! Strong type definitions for the Consent Vault.
//!
//! Identifiers and attribute names are newtypes to prevent misuse at compile
//! time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Prefix of the literal that lets a data subject read their own fields.
pub const OWNER_PREFIX: &str = "owner:";

/// Identifies a principal: a data subject, or anyone requesting a decrypt.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub i64);

impl PrincipalId {
    /// Create from a raw id.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw id.
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalId({})", self.0)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PrincipalId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for PrincipalId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidPrincipal(s.to_string()))
    }
}

/// An attribute literal.
///
/// Policy catalog titles are used verbatim as attribute names, so no
/// normalization (trimming, case folding) is ever applied.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Attribute(String);

impl Attribute {
    /// Create an attribute from its name. Empty names are rejected.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::EmptyAttribute);
        }
        Ok(Self(name))
    }

    /// Create an attribute that may be granted through consent or
    /// assignment. Rejects empty names and the `owner:` namespace.
    pub fn grantable(name: impl Into<String>) -> Result<Self, CoreError> {
        let attr = Self::new(name)?;
        attr.ensure_grantable()?;
        Ok(attr)
    }

    /// Fails for `owner:<id>` literals, which only the owner path may hold.
    pub fn ensure_grantable(&self) -> Result<(), CoreError> {
        if self.is_owner() {
            return Err(CoreError::ReservedAttribute(self.0.clone()));
        }
        Ok(())
    }

    /// The `owner:<id>` literal for a data subject.
    pub fn owner(subject: PrincipalId) -> Self {
        Self(format!("{OWNER_PREFIX}{}", subject.0))
    }

    /// The attribute name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is an `owner:<id>` literal.
    pub fn is_owner(&self) -> bool {
        self.0.starts_with(OWNER_PREFIX)
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Attribute({:?})", self.0)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Attribute {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Attribute {
    type Error = CoreError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl TryFrom<&str> for Attribute {
    type Error = CoreError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<Attribute> for String {
    fn from(attr: Attribute) -> Self {
        attr.0
    }
}

/// An ordered set of attributes held by a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeSet<Attribute>);

impl AttributeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from attribute names, rejecting empty names.
    pub fn from_names<I, S>(names: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(Attribute::new)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Fails if any member is an `owner:<id>` literal.
    pub fn ensure_grantable(&self) -> Result<(), CoreError> {
        self.0.iter().try_for_each(Attribute::ensure_grantable)
    }

    /// Add an attribute. Returns false if it was already present.
    pub fn insert(&mut self, attr: Attribute) -> bool {
        self.0.insert(attr)
    }

    /// Check membership.
    pub fn contains(&self, attr: &Attribute) -> bool {
        self.0.contains(attr)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    /// Attribute names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|a| a.0.clone()).collect()
    }
}

impl FromIterator<Attribute> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for AttributeSet {
    type Item = Attribute;
    type IntoIter = std::collections::btree_set::IntoIter<Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::collections::btree_set::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
