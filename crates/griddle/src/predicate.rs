//! Filter compilation.
//!
//! [`compile`] resolves every field of a [`FilterNode`] and rewrites each
//! leaf according to the field's kind:
//!
//! | operator | string field | other fields |
//! |----------|--------------|--------------|
//! | `eq`, `neq`, `lt`, `lte`, `gt`, `gte` | case-sensitive | numeric / ordinal |
//! | `startswith`, `endswith`, `contains` | lower-cased both sides | rejected |
//! | `doesnotcontain` | lower-cased, negated | on the textual form, null-guarded |
//! | `isempty`, `isnotempty` | `== ""`, negated | rejected |
//! | `isnullorempty`, `isnotnullorempty` | null or `""`, negated | rejected |
//! | `isnull`, `isnotnull` | rejected | rejected |
//!
//! Null checks go through `eq` / `neq` with a null operand.

use log::trace;

use crate::error::{GridError, Result};
use crate::filter::{Condition, FilterNode, Logic};
use crate::operator::Operator;
use crate::resolver::{FieldAccessor, FieldKind, FieldResolver};
use crate::value::{compare_values, Number, Scalar, Timestamp, Value};

/// A compiled filter, evaluable against records of type `T`.
///
/// Evaluation is pure: every record is tested independently.
pub struct Predicate<T> {
    node: Node<T>,
}

enum Node<T> {
    Const(bool),
    All(Vec<Node<T>>),
    Any(Vec<Node<T>>),
    Test(FieldAccessor<T>, Check),
}

#[derive(Debug, Clone)]
enum Check {
    Compare { operator: Operator, operand: Scalar },
    Text { operator: Operator, needle: String },
    Empty { or_null: bool, negate: bool },
}

impl<T> Predicate<T> {
    /// A predicate matching every record.
    pub fn always() -> Self {
        Predicate {
            node: Node::Const(true),
        }
    }

    /// Tests a single record.
    pub fn matches(&self, record: &T) -> bool {
        self.node.eval(record)
    }

    /// Combines with another predicate; both must match.
    pub fn and(self, other: Predicate<T>) -> Self {
        Predicate {
            node: Node::All(vec![self.node, other.node]),
        }
    }

    /// Combines with another predicate; either may match.
    pub fn or(self, other: Predicate<T>) -> Self {
        Predicate {
            node: Node::Any(vec![self.node, other.node]),
        }
    }

    /// Returns references to the matching records, in input order.
    pub fn filter<'a>(&self, records: &'a [T]) -> Vec<&'a T> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Counts the matching records.
    pub fn count(&self, records: &[T]) -> usize {
        records.iter().filter(|r| self.matches(r)).count()
    }
}

impl<T> Default for Predicate<T> {
    fn default() -> Self {
        Predicate::always()
    }
}

impl<T> std::fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predicate").finish_non_exhaustive()
    }
}

impl<T> Node<T> {
    fn eval(&self, record: &T) -> bool {
        match self {
            Node::Const(b) => *b,
            Node::All(nodes) => nodes.iter().all(|n| n.eval(record)),
            Node::Any(nodes) => nodes.iter().any(|n| n.eval(record)),
            Node::Test(accessor, check) => check.eval(&accessor.get(record)),
        }
    }
}

impl Check {
    fn eval(&self, value: &Value<'_>) -> bool {
        match self {
            Check::Compare { operator, operand } => compare(*operator, value, operand),
            Check::Text { operator, needle } => {
                // Null never matches, negated or not.
                let Some(text) = value.to_text() else {
                    return false;
                };
                let text = text.to_lowercase();
                match operator {
                    Operator::StartsWith => text.starts_with(needle.as_str()),
                    Operator::EndsWith => text.ends_with(needle.as_str()),
                    Operator::Contains => text.contains(needle.as_str()),
                    Operator::DoesNotContain => !text.contains(needle.as_str()),
                    _ => false,
                }
            }
            Check::Empty { or_null, negate } => {
                let empty = match value {
                    Value::None => *or_null,
                    Value::String(s) => s.is_empty(),
                    _ => false,
                };
                empty != *negate
            }
        }
    }
}

fn compare(operator: Operator, value: &Value<'_>, operand: &Scalar) -> bool {
    match (value, operand) {
        (Value::None, Scalar::Null) => operator == Operator::Eq,
        (_, Scalar::Null) => operator == Operator::Neq,
        (Value::None, _) => operator == Operator::Neq,
        _ => match compare_values(value, &operand.as_value()) {
            Some(ordering) => operator.eval_ordering(ordering),
            None => operator == Operator::Neq,
        },
    }
}

/// Compiles a filter tree into a predicate over `T`.
///
/// Fails with [`GridError::UnknownField`] for fields the resolver does not
/// know, [`GridError::UnsupportedOperator`] for operators that do not apply
/// to the field's kind (and for `isnull` / `isnotnull` on any field), and
/// [`GridError::MalformedRequest`] for operands that cannot be used.
pub fn compile<T, R>(node: &FilterNode, resolver: &R) -> Result<Predicate<T>>
where
    R: FieldResolver<T> + ?Sized,
{
    Ok(Predicate {
        node: compile_node(node, resolver)?,
    })
}

fn compile_node<T, R>(node: &FilterNode, resolver: &R) -> Result<Node<T>>
where
    R: FieldResolver<T> + ?Sized,
{
    match node {
        FilterNode::Leaf(condition) => compile_leaf(condition, resolver),
        FilterNode::Composite { children, .. } if children.is_empty() => Ok(Node::Const(true)),
        FilterNode::Composite { logic, children } => {
            let nodes = children
                .iter()
                .map(|child| compile_node(child, resolver))
                .collect::<Result<Vec<_>>>()?;
            Ok(match logic {
                Logic::And => Node::All(nodes),
                Logic::Or => Node::Any(nodes),
            })
        }
    }
}

fn compile_leaf<T, R>(condition: &Condition, resolver: &R) -> Result<Node<T>>
where
    R: FieldResolver<T> + ?Sized,
{
    let accessor = resolver.resolve(&condition.field)?;
    let check = rewrite(condition, accessor.kind())?;
    trace!(
        "compiled '{} {}' on {} field as {:?}",
        condition.field,
        condition.operator,
        accessor.kind(),
        check
    );
    Ok(Node::Test(accessor, check))
}

/// Operator/kind rewrite shared by compilation and expression rendering.
pub(crate) enum Rewrite {
    Compare(Operator, Scalar),
    Text(Operator, String),
    TextOf(Operator, String),
    Empty { or_null: bool, negate: bool },
}

pub(crate) fn rewrite_condition(condition: &Condition, kind: FieldKind) -> Result<Rewrite> {
    let Condition {
        field,
        operator,
        value,
    } = condition;
    let operator = *operator;
    let unsupported = || GridError::unsupported(operator.as_str(), field.as_str());

    match operator {
        Operator::IsNull | Operator::IsNotNull => Err(unsupported()),

        op if op.is_comparison() => {
            if value.is_null() && !matches!(op, Operator::Eq | Operator::Neq) {
                return Err(GridError::malformed(format!(
                    "operator '{op}' on '{field}' needs a value"
                )));
            }
            Ok(Rewrite::Compare(op, coerce_operand(value, kind, field)?))
        }

        Operator::StartsWith | Operator::EndsWith | Operator::Contains if !kind.is_string() => {
            Err(unsupported())
        }

        op if op.is_text() => {
            let needle = value.to_text().ok_or_else(|| {
                GridError::malformed(format!("operator '{op}' on '{field}' needs a value"))
            })?;
            let needle = needle.to_lowercase();
            if kind.is_string() {
                Ok(Rewrite::Text(op, needle))
            } else {
                Ok(Rewrite::TextOf(op, needle))
            }
        }

        _ if !kind.is_string() => Err(unsupported()),

        Operator::IsEmpty | Operator::IsNotEmpty => Ok(Rewrite::Empty {
            or_null: false,
            negate: operator == Operator::IsNotEmpty,
        }),

        Operator::IsNullOrEmpty | Operator::IsNotNullOrEmpty => Ok(Rewrite::Empty {
            or_null: true,
            negate: operator == Operator::IsNotNullOrEmpty,
        }),

        _ => Err(unsupported()),
    }
}

fn rewrite(condition: &Condition, kind: FieldKind) -> Result<Check> {
    Ok(match rewrite_condition(condition, kind)? {
        Rewrite::Compare(operator, operand) => Check::Compare { operator, operand },
        Rewrite::Text(operator, needle) | Rewrite::TextOf(operator, needle) => {
            Check::Text { operator, needle }
        }
        Rewrite::Empty { or_null, negate } => Check::Empty { or_null, negate },
    })
}

/// Brings an operand to the representation of the field it is compared with.
///
/// Operands that cannot be compared with the field are rejected, so a
/// mistyped filter fails instead of silently matching nothing.
fn coerce_operand(value: &Scalar, kind: FieldKind, field: &str) -> Result<Scalar> {
    let mismatch = || {
        GridError::malformed(format!(
            "'{value}' cannot be compared with {kind} field '{field}'"
        ))
    };
    match (kind, value) {
        (_, Scalar::Null) | (FieldKind::Other, _) => Ok(value.clone()),

        (FieldKind::String, Scalar::String(_)) => Ok(value.clone()),
        (FieldKind::String, _) => Ok(Scalar::String(value.to_string())),

        (FieldKind::Numeric, Scalar::Number(_)) => Ok(value.clone()),
        (FieldKind::Numeric, Scalar::String(s)) => {
            Number::parse(s).map(Scalar::Number).ok_or_else(mismatch)
        }

        (FieldKind::Bool, Scalar::Bool(_)) => Ok(value.clone()),
        (FieldKind::Bool, Scalar::String(s)) => {
            parse_bool(s).map(Scalar::Bool).ok_or_else(mismatch)
        }

        (FieldKind::Timestamp, Scalar::Timestamp(_)) => Ok(value.clone()),
        (FieldKind::Timestamp, Scalar::Number(n)) => millis(*n)
            .map(|ms| Scalar::Timestamp(Timestamp::from_millis(ms)))
            .ok_or_else(mismatch),
        (FieldKind::Timestamp, Scalar::String(s)) => Number::parse(s)
            .and_then(millis)
            .map(|ms| Scalar::Timestamp(Timestamp::from_millis(ms)))
            .ok_or_else(mismatch),

        _ => Err(mismatch()),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Whole milliseconds from a numeric operand.
fn millis(n: Number) -> Option<i64> {
    match n {
        Number::I64(v) => Some(v),
        Number::U64(v) => i64::try_from(v).ok(),
        Number::F64(v) if v.fract() == 0.0 && v.abs() < 9.0e18 => Some(v as i64),
        Number::F64(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FieldTable;

    #[derive(Debug)]
    struct Person {
        name: Option<String>,
        age: Option<i64>,
        active: bool,
        joined: Timestamp,
    }

    fn person(name: &str, age: i64) -> Person {
        Person {
            name: Some(name.to_string()),
            age: Some(age),
            active: true,
            joined: Timestamp::from_secs(age),
        }
    }

    fn fields() -> FieldTable<Person> {
        FieldTable::new()
            .field("name", FieldKind::String, |p: &Person| {
                p.name.as_deref().map_or(Value::None, Value::String)
            })
            .field("age", FieldKind::Numeric, |p: &Person| {
                p.age.map_or(Value::None, |a| Value::Number(Number::I64(a)))
            })
            .field("active", FieldKind::Bool, |p: &Person| Value::Bool(p.active))
            .field("joined", FieldKind::Timestamp, |p: &Person| Value::Timestamp(p.joined))
    }

    fn leaf(field: &str, op: Operator, value: impl Into<Scalar>) -> FilterNode {
        FilterNode::leaf(field, op, value)
    }

    fn check(node: FilterNode, record: &Person) -> bool {
        compile(&node, &fields()).unwrap().matches(record)
    }

    fn compile_err(node: FilterNode) -> GridError {
        compile::<Person, _>(&node, &fields()).unwrap_err()
    }

    #[test]
    fn string_eq_is_case_sensitive() {
        let bruce = person("Bruce Lee", 4);
        assert!(check(leaf("name", Operator::Eq, "Bruce Lee"), &bruce));
        assert!(!check(leaf("name", Operator::Eq, "bruce lee"), &bruce));
        assert!(check(leaf("name", Operator::Neq, "bruce lee"), &bruce));
    }

    #[test]
    fn text_operators_ignore_case() {
        let bruce = person("Bruce Lee", 4);
        assert!(check(leaf("name", Operator::Contains, "LEE"), &bruce));
        assert!(check(leaf("name", Operator::StartsWith, "bRuCe"), &bruce));
        assert!(check(leaf("name", Operator::EndsWith, "EE"), &bruce));
        assert!(!check(leaf("name", Operator::DoesNotContain, "lee"), &bruce));
        assert!(check(leaf("name", Operator::DoesNotContain, "mary"), &bruce));
    }

    #[test]
    fn text_operators_never_match_null() {
        let nameless = Person {
            name: None,
            age: None,
            active: false,
            joined: Timestamp(0),
        };
        assert!(!check(leaf("name", Operator::Contains, "a"), &nameless));
        assert!(!check(leaf("name", Operator::DoesNotContain, "a"), &nameless));
        assert!(!check(leaf("age", Operator::DoesNotContain, "1"), &nameless));
    }

    #[test]
    fn numeric_comparisons() {
        let mary = person("Mary Jane", 25);
        assert!(check(leaf("age", Operator::Gt, 20), &mary));
        assert!(check(leaf("age", Operator::Gte, 25), &mary));
        assert!(!check(leaf("age", Operator::Lt, 25), &mary));
        assert!(check(leaf("age", Operator::Lte, 25.0), &mary));
        assert!(check(leaf("age", Operator::Eq, 25u8), &mary));
    }

    #[test]
    fn numeric_string_operand_is_coerced() {
        let mary = person("Mary Jane", 25);
        assert!(check(leaf("age", Operator::Eq, "25"), &mary));
        assert!(matches!(
            compile_err(leaf("age", Operator::Eq, "twenty")),
            GridError::MalformedRequest(_)
        ));
    }

    #[test]
    fn mistyped_operands_are_malformed() {
        let malformed = [
            leaf("age", Operator::Eq, true),
            leaf("age", Operator::Gt, true),
            leaf("age", Operator::Neq, true),
            leaf("active", Operator::Eq, "yes"),
            leaf("active", Operator::Eq, 1),
            leaf("joined", Operator::Gt, "yesterday"),
            leaf("joined", Operator::Lt, 1.5),
            leaf("joined", Operator::Eq, false),
        ];
        for node in malformed {
            assert!(matches!(compile_err(node), GridError::MalformedRequest(_)));
        }
    }

    #[test]
    fn bool_and_timestamp_operands_are_coerced() {
        let mary = person("Mary Jane", 25);
        assert!(check(leaf("active", Operator::Eq, true), &mary));
        assert!(check(leaf("active", Operator::Eq, "TRUE"), &mary));
        assert!(check(leaf("active", Operator::Neq, "false"), &mary));

        assert!(check(leaf("joined", Operator::Eq, 25_000), &mary));
        assert!(check(leaf("joined", Operator::Gt, "24000"), &mary));
        assert!(check(leaf("joined", Operator::Lte, 25_000.0), &mary));
        assert!(check(leaf("joined", Operator::Eq, Timestamp::from_secs(25)), &mary));
    }

    #[test]
    fn string_ordinal_comparison() {
        let mary = person("Mary Jane", 25);
        assert!(check(leaf("name", Operator::Gt, "John"), &mary));
        assert!(!check(leaf("name", Operator::Lt, "John"), &mary));
    }

    #[test]
    fn doesnotcontain_on_numeric_uses_text_form() {
        let mary = person("Mary Jane", 25);
        assert!(check(leaf("age", Operator::DoesNotContain, "3"), &mary));
        assert!(!check(leaf("age", Operator::DoesNotContain, "5"), &mary));
    }

    #[test]
    fn substring_operators_reject_non_string_fields() {
        for op in [Operator::StartsWith, Operator::EndsWith, Operator::Contains] {
            assert!(matches!(
                compile_err(leaf("age", op, "2")),
                GridError::UnsupportedOperator { .. }
            ));
        }
    }

    #[test]
    fn emptiness_operators() {
        let blank = person("", 1);
        let nameless = Person {
            name: None,
            age: Some(1),
            active: true,
            joined: Timestamp(0),
        };
        let unary = |op| leaf("name", op, Scalar::Null);

        assert!(check(unary(Operator::IsEmpty), &blank));
        assert!(!check(unary(Operator::IsEmpty), &nameless));
        assert!(check(unary(Operator::IsNotEmpty), &nameless));
        assert!(check(unary(Operator::IsNullOrEmpty), &blank));
        assert!(check(unary(Operator::IsNullOrEmpty), &nameless));
        assert!(!check(unary(Operator::IsNotNullOrEmpty), &nameless));
        assert!(check(unary(Operator::IsNotNullOrEmpty), &person("x", 1)));
    }

    #[test]
    fn emptiness_operators_reject_non_string_fields() {
        assert!(matches!(
            compile_err(leaf("age", Operator::IsEmpty, Scalar::Null)),
            GridError::UnsupportedOperator { .. }
        ));
        assert!(matches!(
            compile_err(leaf("active", Operator::IsNullOrEmpty, Scalar::Null)),
            GridError::UnsupportedOperator { .. }
        ));
    }

    #[test]
    fn isnull_is_rejected_for_every_field() {
        for field in ["name", "age", "active"] {
            for op in [Operator::IsNull, Operator::IsNotNull] {
                assert!(matches!(
                    compile_err(leaf(field, op, Scalar::Null)),
                    GridError::UnsupportedOperator { .. }
                ));
            }
        }
    }

    #[test]
    fn null_equality_is_the_null_check() {
        let ageless = Person {
            name: Some("x".into()),
            age: None,
            active: true,
            joined: Timestamp(0),
        };
        assert!(check(leaf("age", Operator::Eq, Scalar::Null), &ageless));
        assert!(!check(leaf("age", Operator::Neq, Scalar::Null), &ageless));
        assert!(check(leaf("age", Operator::Neq, Scalar::Null), &person("y", 3)));
        assert!(check(leaf("age", Operator::Neq, 3), &ageless));
        assert!(!check(leaf("age", Operator::Gt, 3), &ageless));
    }

    #[test]
    fn ordering_against_null_is_malformed() {
        assert!(matches!(
            compile_err(leaf("age", Operator::Gt, Scalar::Null)),
            GridError::MalformedRequest(_)
        ));
        assert!(matches!(
            compile_err(leaf("name", Operator::Contains, Scalar::Null)),
            GridError::MalformedRequest(_)
        ));
    }

    #[test]
    fn unknown_field_fails() {
        assert!(matches!(
            compile_err(leaf("salary", Operator::Eq, 1)),
            GridError::UnknownField { .. }
        ));
    }

    #[test]
    fn composites_keep_their_grouping() {
        // age > 30 or (name startswith m and age < 30)
        let node = FilterNode::any(vec![
            leaf("age", Operator::Gt, 30),
            FilterNode::all(vec![
                leaf("name", Operator::StartsWith, "m"),
                leaf("age", Operator::Lt, 30),
            ]),
        ]);
        let predicate = compile(&node, &fields()).unwrap();
        assert!(predicate.matches(&person("John Doe", 40)));
        assert!(predicate.matches(&person("Mary Jane", 25)));
        assert!(!predicate.matches(&person("Bruce Lee", 4)));
        assert!(!predicate.matches(&person("Mickey Winsley", 30)));
    }

    #[test]
    fn empty_composite_matches_everything() {
        let predicate = compile(&FilterNode::any(vec![]), &fields()).unwrap();
        assert!(predicate.matches(&person("a", 1)));
    }

    #[test]
    fn predicates_compose() {
        let young = compile(&leaf("age", Operator::Lt, 30), &fields()).unwrap();
        let lee = compile(&leaf("name", Operator::Contains, "lee"), &fields()).unwrap();
        let both = young.and(lee);
        assert!(both.matches(&person("Bruce Lee", 4)));
        assert!(!both.matches(&person("Mary Jane", 25)));

        let people = vec![person("Bruce Lee", 4), person("John Doe", 40)];
        let old = compile(&leaf("age", Operator::Gt, 30), &fields()).unwrap();
        let either = old.or(Predicate::always());
        assert_eq!(either.count(&people), 2);
        assert_eq!(Predicate::<Person>::always().filter(&people).len(), 2);
    }
}
