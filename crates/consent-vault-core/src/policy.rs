//! Policy expressions.
//!
//! A policy is a monotone disjunction of attribute literals. Conjunction and
//! negation are deliberately not representable: a field is readable by anyone
//! holding *any* one of the literals.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::{Attribute, AttributeSet};

/// Separator used when rendering a disjunction for display.
const OR_SEPARATOR: &str = " OR ";

/// A boolean access policy over attribute literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyExpression {
    /// A single literal.
    Literal(Attribute),
    /// A disjunction of literals, in the order they were added.
    Or(Vec<Attribute>),
}

impl PolicyExpression {
    /// Build a policy from literals.
    ///
    /// One literal yields [`PolicyExpression::Literal`], more yield
    /// [`PolicyExpression::Or`]. Repeated literals are dropped, keeping the
    /// first occurrence.
    pub fn any_of(literals: impl IntoIterator<Item = Attribute>) -> Result<Self, CoreError> {
        let mut unique: Vec<Attribute> = Vec::new();
        for literal in literals {
            if !unique.contains(&literal) {
                unique.push(literal);
            }
        }

        match unique.len() {
            0 => Err(CoreError::EmptyDisjunction),
            1 => Ok(Self::Literal(unique.remove(0))),
            _ => Ok(Self::Or(unique)),
        }
    }

    /// The literals of this policy, in order.
    pub fn literals(&self) -> &[Attribute] {
        match self {
            Self::Literal(attr) => std::slice::from_ref(attr),
            Self::Or(attrs) => attrs,
        }
    }

    /// The literals as an attribute set.
    pub fn to_attribute_set(&self) -> AttributeSet {
        self.literals().iter().cloned().collect()
    }

    /// Whether `held` satisfies this policy.
    pub fn is_satisfied_by(&self, held: &AttributeSet) -> bool {
        self.literals().iter().any(|literal| held.contains(literal))
    }

    /// Check the structural rules an encryptor relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.literals().is_empty() {
            return Err(CoreError::EmptyDisjunction);
        }
        if self.literals().iter().any(|l| l.as_str().is_empty()) {
            return Err(CoreError::EmptyAttribute);
        }
        Ok(())
    }
}

impl fmt::Display for PolicyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.literals().iter().map(Attribute::as_str).collect();
        f.write_str(&names.join(OR_SEPARATOR))
    }
}
