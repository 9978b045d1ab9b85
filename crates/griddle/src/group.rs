//! Multi-level grouping.
//!
//! Grouping by `[a, b]` partitions the records by `a`, then each partition by
//! `b`. Every level carries its own counts and aggregates. Partitions appear
//! in order of first occurrence, so grouping an already sorted sequence
//! yields sorted groups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateDescriptor, AggregatePlan, AggregateResults};
use crate::error::Result;
use crate::resolver::{FieldAccessor, FieldResolver};
use crate::value::{Number, Scalar, Value};

/// One grouping level: the field to group by and the aggregates to compute
/// for each group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    /// Field to group by.
    pub field: String,
    /// Aggregates computed per group at this level.
    #[serde(default)]
    pub aggregates: Vec<AggregateDescriptor>,
}

impl GroupDescriptor {
    /// Creates a level without aggregates.
    pub fn new(field: impl Into<String>) -> Self {
        GroupDescriptor {
            field: field.into(),
            aggregates: Vec::new(),
        }
    }

    /// Adds an aggregate to this level.
    pub fn with_aggregate(mut self, aggregate: AggregateDescriptor) -> Self {
        self.aggregates.push(aggregate);
        self
    }
}

/// One group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", bound = "T: Serialize")]
pub struct GroupResult<'a, T> {
    /// The distinct value of the grouped field.
    #[serde(rename = "value")]
    pub key: Scalar,
    /// Number of records in the group, across all subgroups.
    pub count: usize,
    /// `true` when `items` holds subgroups.
    pub has_subgroups: bool,
    /// Subgroups or records.
    pub items: GroupItems<'a, T>,
    /// Aggregates of this level over the group's records.
    pub aggregates: AggregateResults,
    /// Field this level was grouped by.
    pub selector_field: String,
}

/// Contents of a group: subgroups when more levels remain, records otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, bound = "T: Serialize")]
pub enum GroupItems<'a, T> {
    /// Nested groups.
    Groups(Vec<GroupResult<'a, T>>),
    /// The records of a leaf group.
    Records(Vec<&'a T>),
}

impl<'a, T> GroupItems<'a, T> {
    /// Number of records below this point.
    pub fn record_count(&self) -> usize {
        match self {
            GroupItems::Groups(groups) => groups.iter().map(|g| g.items.record_count()).sum(),
            GroupItems::Records(records) => records.len(),
        }
    }

    /// Returns the groups, if this holds groups.
    pub fn groups(&self) -> Option<&[GroupResult<'a, T>]> {
        match self {
            GroupItems::Groups(groups) => Some(groups),
            GroupItems::Records(_) => None,
        }
    }

    /// Returns the records, if this holds records.
    pub fn records(&self) -> Option<&[&'a T]> {
        match self {
            GroupItems::Groups(_) => None,
            GroupItems::Records(records) => Some(records),
        }
    }
}

struct Level<T> {
    field: String,
    accessor: FieldAccessor<T>,
    aggregates: AggregatePlan<T>,
}

/// Resolved grouping levels, ready to apply.
pub struct GroupPlan<T> {
    levels: Vec<Level<T>>,
}

impl<T> GroupPlan<T> {
    /// Resolves the field and aggregates of every level.
    pub fn build<R>(selectors: &[GroupDescriptor], resolver: &R) -> Result<Self>
    where
        R: FieldResolver<T> + ?Sized,
    {
        let levels = selectors
            .iter()
            .map(|selector| {
                Ok(Level {
                    field: selector.field.clone(),
                    accessor: resolver.resolve(&selector.field)?,
                    aggregates: AggregatePlan::build(&selector.aggregates, resolver)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GroupPlan { levels })
    }

    /// Number of levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Groups the records. With no levels the records come back unchanged.
    pub fn group<'a>(&self, records: Vec<&'a T>) -> GroupItems<'a, T> {
        group_levels(&self.levels, records)
    }
}

impl<T> std::fmt::Debug for GroupPlan<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.levels.iter().map(|l| &l.field))
            .finish()
    }
}

fn group_levels<'a, T>(levels: &[Level<T>], records: Vec<&'a T>) -> GroupItems<'a, T> {
    let Some((level, rest)) = levels.split_first() else {
        return GroupItems::Records(records);
    };

    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut partitions: Vec<(Scalar, Vec<&'a T>)> = Vec::new();
    for record in records {
        let value = level.accessor.get(record);
        let slot = *index.entry(GroupKey::of(&value)).or_insert_with(|| {
            partitions.push((value.to_scalar(), Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(record);
    }

    let groups = partitions
        .into_iter()
        .map(|(key, members)| GroupResult {
            key,
            count: members.len(),
            has_subgroups: !rest.is_empty(),
            aggregates: level.aggregates.evaluate(&members),
            items: group_levels(rest, members),
            selector_field: level.field.clone(),
        })
        .collect();
    GroupItems::Groups(groups)
}

/// Groups a slice in one call.
pub fn group<'a, T, R>(
    records: &'a [T],
    selectors: &[GroupDescriptor],
    resolver: &R,
) -> Result<GroupItems<'a, T>>
where
    R: FieldResolver<T> + ?Sized,
{
    let plan = GroupPlan::build(selectors, resolver)?;
    Ok(plan.group(records.iter().collect()))
}

/// Hashable identity of a group key.
///
/// Integral floats share the key of the equal integer, so `4`, `4u64` and
/// `4.0` land in one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Null,
    Bool(bool),
    Int(i128),
    Float(u64),
    Text(String),
    Time(i64),
}

impl GroupKey {
    fn of(value: &Value<'_>) -> Self {
        match value {
            Value::None => GroupKey::Null,
            Value::Bool(b) => GroupKey::Bool(*b),
            Value::Number(Number::I64(n)) => GroupKey::Int(i128::from(*n)),
            Value::Number(Number::U64(n)) => GroupKey::Int(i128::from(*n)),
            Value::Number(Number::F64(n)) => {
                if n.fract() == 0.0 && n.abs() < 1e18 {
                    GroupKey::Int(*n as i128)
                } else {
                    GroupKey::Float(n.to_bits())
                }
            }
            Value::String(s) => GroupKey::Text((*s).to_string()),
            Value::Timestamp(t) => GroupKey::Time(t.as_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateFunction;
    use crate::error::GridError;
    use crate::resolver::{FieldKind, FieldTable};

    #[derive(Debug, PartialEq)]
    struct Person {
        name: &'static str,
        bracket: &'static str,
        city: Option<&'static str>,
        age: i64,
    }

    fn people() -> Vec<Person> {
        let p = |name, bracket, city, age| Person {
            name,
            bracket,
            city,
            age,
        };
        vec![
            p("John", "adult", Some("Oslo"), 40),
            p("Mary", "adult", Some("Rome"), 25),
            p("Bruce", "child", Some("Oslo"), 4),
            p("Mickey", "adult", Some("Oslo"), 20),
            p("Ann", "child", None, 9),
            p("Lee", "child", Some("Rome"), 12),
        ]
    }

    fn fields() -> FieldTable<Person> {
        FieldTable::new()
            .field("name", FieldKind::String, |p: &Person| Value::String(p.name))
            .field("bracket", FieldKind::String, |p: &Person| Value::String(p.bracket))
            .field("city", FieldKind::String, |p: &Person| {
                p.city.map_or(Value::None, Value::String)
            })
            .field("age", FieldKind::Numeric, |p: &Person| Value::Number(Number::I64(p.age)))
    }

    #[test]
    fn no_selectors_returns_records() {
        let people = people();
        let items = group(&people, &[], &fields()).unwrap();
        assert_eq!(items.records().map(<[_]>::len), Some(6));
    }

    #[test]
    fn single_level_groups_in_first_occurrence_order() {
        let people = people();
        let selector = GroupDescriptor::new("bracket")
            .with_aggregate(AggregateDescriptor::new(AggregateFunction::Count, "age"))
            .with_aggregate(AggregateDescriptor::new(AggregateFunction::Max, "age"));
        let items = group(&people, &[selector], &fields()).unwrap();

        let groups = items.groups().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, Scalar::from("adult"));
        assert_eq!(groups[1].key, Scalar::from("child"));
        assert_eq!(groups.iter().map(|g| g.count).sum::<usize>(), 6);
        assert!(!groups[0].has_subgroups);
        assert_eq!(groups[0].selector_field, "bracket");
        assert_eq!(
            groups[1].aggregates.get(AggregateFunction::Max, "age"),
            Some(&Scalar::Number(Number::I64(12)))
        );
        assert_eq!(
            groups[1].aggregates.get(AggregateFunction::Count, "age"),
            Some(&Scalar::from(3usize))
        );
    }

    #[test]
    fn nested_levels_preserve_every_record() {
        let people = people();
        let items = group(
            &people,
            &[GroupDescriptor::new("bracket"), GroupDescriptor::new("city")],
            &fields(),
        )
        .unwrap();
        assert_eq!(items.record_count(), people.len());

        let children = &items.groups().unwrap()[1];
        assert!(children.has_subgroups);
        assert_eq!(children.count, 3);
        let cities: Vec<_> = children
            .items
            .groups()
            .unwrap()
            .iter()
            .map(|g| g.key.clone())
            .collect();
        assert_eq!(
            cities,
            vec![Scalar::from("Oslo"), Scalar::Null, Scalar::from("Rome")]
        );
        assert_eq!(children.items.groups().unwrap()[0].selector_field, "city");
    }

    #[test]
    fn integral_floats_share_a_group() {
        assert_eq!(
            GroupKey::of(&Value::Number(Number::F64(4.0))),
            GroupKey::of(&Value::Number(Number::U64(4)))
        );
        assert_ne!(
            GroupKey::of(&Value::Number(Number::F64(4.5))),
            GroupKey::of(&Value::Number(Number::I64(4)))
        );
    }

    #[test]
    fn unknown_selector_field_fails() {
        let people = people();
        let err = group(&people, &[GroupDescriptor::new("country")], &fields()).unwrap_err();
        assert!(matches!(err, GridError::UnknownField { .. }));
    }

    #[test]
    fn group_aggregate_on_text_field_fails() {
        let people = people();
        let selector = GroupDescriptor::new("bracket")
            .with_aggregate(AggregateDescriptor::new(AggregateFunction::Sum, "name"));
        let err = group(&people, &[selector], &fields()).unwrap_err();
        assert!(matches!(err, GridError::UnsupportedOperator { .. }));
    }

    #[test]
    fn groups_serialize_in_grid_shape() {
        #[derive(Debug, Serialize)]
        struct Row {
            n: i64,
        }
        let rows = vec![Row { n: 1 }, Row { n: 1 }];
        let table = FieldTable::new()
            .field("n", FieldKind::Numeric, |r: &Row| Value::Number(Number::I64(r.n)));
        let items = group(&rows, &[GroupDescriptor::new("n")], &table).unwrap();

        let json = serde_json::to_value(&items).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "value": 1,
                "count": 2,
                "hasSubgroups": false,
                "items": [{ "n": 1 }, { "n": 1 }],
                "aggregates": {},
                "selectorField": "n"
            }])
        );
    }
}
