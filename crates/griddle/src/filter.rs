//! Filter trees.
//!
//! The grid sends a filter as a [`FilterDescriptor`]: one JSON object shape
//! for both leaves and groups, with every member optional. Converting it into
//! a [`FilterNode`] checks that each node is exactly one of the two:
//!
//! ```text
//! leaf:      { field, operator, value }
//! composite: { logic, filters: [...] }
//! ```
//!
//! A [`FilterNode`] is compiled into a [`Predicate`](crate::Predicate) with
//! [`compile`](crate::compile), or rendered as text with
//! [`FilterNode::to_expression`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::operator::Operator;
use crate::value::Scalar;

/// How the children of a composite node combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Logic {
    /// Every child must match.
    #[default]
    And,
    /// At least one child must match.
    Or,
}

impl Logic {
    /// Returns the wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            Logic::And => "and",
            Logic::Or => "or",
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Logic {
    type Err = GridError;

    fn from_str(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Logic::And),
            "or" => Ok(Logic::Or),
            other => Err(GridError::malformed(format!("unknown filter logic '{other}'"))),
        }
    }
}

/// Wire shape of a filter node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Field of a leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Operator token of a leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Operand of a leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,
    /// `and` / `or` of a composite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    /// Children of a composite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<FilterDescriptor>>,
}

impl FilterDescriptor {
    /// Creates a leaf descriptor.
    pub fn leaf(field: &str, operator: &str, value: impl Into<Scalar>) -> Self {
        FilterDescriptor {
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            value: Some(value.into()),
            ..FilterDescriptor::default()
        }
    }

    /// Creates a leaf descriptor without a value, for the unary operators.
    pub fn unary(field: &str, operator: &str) -> Self {
        FilterDescriptor {
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            ..FilterDescriptor::default()
        }
    }

    /// Creates an `and` composite.
    pub fn and(filters: Vec<FilterDescriptor>) -> Self {
        FilterDescriptor::composite("and", filters)
    }

    /// Creates an `or` composite.
    pub fn or(filters: Vec<FilterDescriptor>) -> Self {
        FilterDescriptor::composite("or", filters)
    }

    fn composite(logic: &str, filters: Vec<FilterDescriptor>) -> Self {
        FilterDescriptor {
            logic: Some(logic.to_string()),
            filters: Some(filters),
            ..FilterDescriptor::default()
        }
    }
}

/// A single `field operator value` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Field name as requested.
    pub field: String,
    /// Operator.
    pub operator: Operator,
    /// Operand; `Null` for unary operators.
    pub value: Scalar,
}

/// A validated filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// A condition on one field.
    Leaf(Condition),
    /// Children combined with `and` / `or`. No children matches everything.
    Composite {
        logic: Logic,
        children: Vec<FilterNode>,
    },
}

impl FilterNode {
    /// Creates a leaf.
    pub fn leaf(field: impl Into<String>, operator: Operator, value: impl Into<Scalar>) -> Self {
        FilterNode::Leaf(Condition {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }

    /// Creates an `and` composite.
    pub fn all(children: Vec<FilterNode>) -> Self {
        FilterNode::Composite {
            logic: Logic::And,
            children,
        }
    }

    /// Creates an `or` composite.
    pub fn any(children: Vec<FilterNode>) -> Self {
        FilterNode::Composite {
            logic: Logic::Or,
            children,
        }
    }

    /// Returns `true` for leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(self, FilterNode::Leaf(_))
    }

    /// Leaves in depth-first order.
    ///
    /// The position of a leaf in this list is its parameter index in
    /// [`FilterNode::to_expression`].
    pub fn leaves(&self) -> Vec<&Condition> {
        let mut leaves = Vec::new();
        self.collect(&mut leaves);
        leaves
    }

    fn collect<'a>(&'a self, leaves: &mut Vec<&'a Condition>) {
        match self {
            FilterNode::Leaf(condition) => leaves.push(condition),
            FilterNode::Composite { children, .. } => {
                for child in children {
                    child.collect(leaves);
                }
            }
        }
    }
}

impl TryFrom<&FilterDescriptor> for FilterNode {
    type Error = GridError;

    fn try_from(descriptor: &FilterDescriptor) -> Result<Self> {
        let has_children = descriptor.filters.as_ref().is_some_and(|f| !f.is_empty());

        if has_children || (descriptor.logic.is_some() && descriptor.field.is_none()) {
            if descriptor.field.is_some()
                || descriptor.operator.is_some()
                || descriptor.value.is_some()
            {
                return Err(GridError::malformed(
                    "filter node has both children and field/operator/value",
                ));
            }
            let logic: Logic = descriptor
                .logic
                .as_deref()
                .ok_or_else(|| GridError::malformed("composite filter node without logic"))?
                .parse()?;
            let children = descriptor
                .filters
                .iter()
                .flatten()
                .map(FilterNode::try_from)
                .collect::<Result<Vec<_>>>()?;
            return Ok(FilterNode::Composite { logic, children });
        }

        if descriptor.logic.is_some() {
            return Err(GridError::malformed("filter leaf carries logic"));
        }
        let field = descriptor
            .field
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| GridError::malformed("filter leaf without field"))?;
        let token = descriptor
            .operator
            .as_deref()
            .ok_or_else(|| GridError::malformed(format!("filter on '{field}' without operator")))?;
        let operator = Operator::parse_for(token, field)?;
        // Grids leave the last typed value on unary leaves.
        let value = if operator.is_unary() {
            Scalar::Null
        } else {
            descriptor.value.clone().unwrap_or_default()
        };

        Ok(FilterNode::leaf(field, operator, value))
    }
}

impl TryFrom<FilterDescriptor> for FilterNode {
    type Error = GridError;

    fn try_from(descriptor: FilterDescriptor) -> Result<Self> {
        FilterNode::try_from(&descriptor)
    }
}
