//! Filter operators of the grid contract.
//!
//! The [`Operator`] enum lists every operator token the grid can send. Not
//! every operator is valid for every field kind; the filter compiler decides
//! that once the field has been resolved.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::GridError;

/// Comparison operator of a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Case-insensitive prefix match.
    StartsWith,
    /// Case-insensitive suffix match.
    EndsWith,
    /// Case-insensitive substring match.
    Contains,
    /// Negated case-insensitive substring match.
    DoesNotContain,
    /// Value is the empty string.
    IsEmpty,
    /// Value is not the empty string.
    IsNotEmpty,
    /// Value is null. Always rejected by the compiler.
    IsNull,
    /// Value is not null. Always rejected by the compiler.
    IsNotNull,
    /// Value is null or the empty string.
    IsNullOrEmpty,
    /// Value is neither null nor the empty string.
    IsNotNullOrEmpty,
}

impl Operator {
    /// All operators, in the order the grid documents them.
    pub const ALL: [Operator; 16] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::IsNullOrEmpty,
        Operator::IsNotNullOrEmpty,
    ];

    /// Returns `true` for `eq`, `neq`, `lt`, `lte`, `gt`, `gte`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Neq
                | Operator::Lt
                | Operator::Lte
                | Operator::Gt
                | Operator::Gte
        )
    }

    /// Returns `true` for the substring operators.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Operator::StartsWith
                | Operator::EndsWith
                | Operator::Contains
                | Operator::DoesNotContain
        )
    }

    /// Returns `true` for operators that ignore the leaf value.
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::IsEmpty
                | Operator::IsNotEmpty
                | Operator::IsNull
                | Operator::IsNotNull
                | Operator::IsNullOrEmpty
                | Operator::IsNotNullOrEmpty
        )
    }

    /// Returns `true` for the negated forms (`neq`, `doesnotcontain`,
    /// `isnotempty`, `isnotnull`, `isnotnullorempty`).
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            Operator::Neq
                | Operator::DoesNotContain
                | Operator::IsNotEmpty
                | Operator::IsNotNull
                | Operator::IsNotNullOrEmpty
        )
    }

    /// Evaluates a comparison operator given an ordering result.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Neq => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
            _ => false,
        }
    }

    /// Symbol used when rendering comparisons as text.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("="),
            Operator::Neq => Some("!="),
            Operator::Lt => Some("<"),
            Operator::Lte => Some("<="),
            Operator::Gt => Some(">"),
            Operator::Gte => Some(">="),
            _ => None,
        }
    }

    /// Returns the wire token of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesnotcontain",
            Operator::IsEmpty => "isempty",
            Operator::IsNotEmpty => "isnotempty",
            Operator::IsNull => "isnull",
            Operator::IsNotNull => "isnotnull",
            Operator::IsNullOrEmpty => "isnullorempty",
            Operator::IsNotNullOrEmpty => "isnotnullorempty",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses a wire token, ignoring case.
///
/// The error carries no field name; callers that know the field use
/// [`Operator::parse_for`].
impl FromStr for Operator {
    type Err = GridError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Operator::parse_for(token, "")
    }
}

impl Operator {
    /// Parses a wire token for the given field.
    pub fn parse_for(token: &str, field: &str) -> Result<Self, GridError> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(token.trim()))
            .ok_or_else(|| GridError::unsupported(token, field))
    }
}
