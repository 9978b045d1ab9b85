//! Aggregate functions over a field.
//!
//! An [`AggregatePlan`] is built once per request from the grid's aggregate
//! descriptors and evaluated against any number of record sets: the filtered
//! set for the top-level aggregates, and each partition when grouping.
//!
//! Results are keyed the way the grid reads them, field first:
//!
//! ```json
//! { "age": { "sum": 89, "average": 22.25 } }
//! ```
//!
//! Over an empty record set `count` and `sum` are `0`, `average` is null and
//! `min` / `max` are left out.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::resolver::{FieldAccessor, FieldResolver};
use crate::value::{Number, Scalar, Value};

/// Aggregate function.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    /// Sum of the values.
    Sum,
    /// Arithmetic mean of the values.
    #[serde(alias = "avg")]
    Average,
    /// Number of records.
    Count,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
}

impl AggregateFunction {
    /// Returns the wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Average => "average",
            AggregateFunction::Count => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One requested aggregate: a function over a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateDescriptor {
    /// Field to aggregate. Echoed but not resolved for `count`.
    pub field: String,
    /// Function to apply.
    #[serde(alias = "function")]
    pub aggregate: AggregateFunction,
}

impl AggregateDescriptor {
    /// Creates a descriptor.
    pub fn new(aggregate: AggregateFunction, field: impl Into<String>) -> Self {
        AggregateDescriptor {
            field: field.into(),
            aggregate,
        }
    }
}

/// Computed aggregates, keyed by field then function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateResults {
    fields: BTreeMap<String, BTreeMap<AggregateFunction, Scalar>>,
}

impl AggregateResults {
    /// Returns the value computed for a function over a field.
    pub fn get(&self, function: AggregateFunction, field: &str) -> Option<&Scalar> {
        self.fields.get(field)?.get(&function)
    }

    /// Returns every function computed for a field.
    pub fn field(&self, field: &str) -> Option<&BTreeMap<AggregateFunction, Scalar>> {
        self.fields.get(field)
    }

    /// Returns `true` if nothing was computed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of computed values.
    pub fn len(&self) -> usize {
        self.fields.values().map(BTreeMap::len).sum()
    }

    /// Iterates over `(field, function, value)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, AggregateFunction, &Scalar)> {
        self.fields.iter().flat_map(|(field, functions)| {
            functions
                .iter()
                .map(move |(function, value)| (field.as_str(), *function, value))
        })
    }

    fn insert(&mut self, field: &str, function: AggregateFunction, value: Scalar) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .insert(function, value);
    }
}

struct Entry<T> {
    field: String,
    function: AggregateFunction,
    accessor: Option<FieldAccessor<T>>,
}

/// Resolved aggregate requests, ready to evaluate.
pub struct AggregatePlan<T> {
    entries: Vec<Entry<T>>,
}

impl<T> AggregatePlan<T> {
    /// Resolves the fields of every request.
    ///
    /// `count` needs no field. The other functions fail with
    /// [`GridError::UnsupportedOperator`] unless the field is numeric.
    pub fn build<R>(requests: &[AggregateDescriptor], resolver: &R) -> Result<Self>
    where
        R: FieldResolver<T> + ?Sized,
    {
        let entries = requests
            .iter()
            .map(|request| {
                let accessor = match request.aggregate {
                    AggregateFunction::Count => None,
                    function => {
                        let accessor = resolver.resolve(&request.field)?;
                        if !accessor.kind().is_numeric() {
                            return Err(GridError::unsupported(function.as_str(), &request.field));
                        }
                        Some(accessor)
                    }
                };
                Ok(Entry {
                    field: request.field.clone(),
                    function: request.aggregate,
                    accessor,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AggregatePlan { entries })
    }

    /// Returns `true` if no aggregates were requested.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Computes every requested aggregate over the records.
    pub fn evaluate(&self, records: &[&T]) -> AggregateResults {
        let mut results = AggregateResults::default();
        for entry in &self.entries {
            let value = match &entry.accessor {
                None => Some(Scalar::from(records.len())),
                Some(accessor) => {
                    let numbers = records.iter().filter_map(|r| numeric(&accessor.get(r)));
                    reduce(entry.function, numbers)
                }
            };
            if let Some(value) = value {
                results.insert(&entry.field, entry.function, value);
            }
        }
        results
    }
}

impl<T> fmt::Debug for AggregatePlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.function, &e.field)))
            .finish()
    }
}

/// Computes aggregates over a slice in one call.
pub fn aggregate<T, R>(
    records: &[T],
    requests: &[AggregateDescriptor],
    resolver: &R,
) -> Result<AggregateResults>
where
    R: FieldResolver<T> + ?Sized,
{
    let plan = AggregatePlan::build(requests, resolver)?;
    let refs: Vec<&T> = records.iter().collect();
    Ok(plan.evaluate(&refs))
}

/// Numeric view of a field value; null and non-numeric values are skipped.
fn numeric(value: &Value<'_>) -> Option<Number> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(s) => Number::parse(s),
        _ => None,
    }
}

fn reduce(function: AggregateFunction, numbers: impl Iterator<Item = Number>) -> Option<Scalar> {
    match function {
        AggregateFunction::Sum => Some(Scalar::Number(sum(numbers).0)),
        AggregateFunction::Average => {
            let (total, count) = sum(numbers);
            if count == 0 {
                Some(Scalar::Null)
            } else {
                Some(Scalar::Number(Number::F64(total.to_f64() / count as f64)))
            }
        }
        AggregateFunction::Min => extreme(numbers, std::cmp::Ordering::Less).map(Scalar::Number),
        AggregateFunction::Max => {
            extreme(numbers, std::cmp::Ordering::Greater).map(Scalar::Number)
        }
        AggregateFunction::Count => Some(Scalar::from(numbers.count())),
    }
}

/// Sums numbers, staying integral while every input is an integer.
fn sum(numbers: impl Iterator<Item = Number>) -> (Number, usize) {
    let mut integral: i128 = 0;
    let mut fractional = 0.0;
    let mut floats = false;
    let mut count = 0;

    for n in numbers {
        count += 1;
        match n {
            Number::I64(v) => integral = integral.saturating_add(i128::from(v)),
            Number::U64(v) => integral = integral.saturating_add(i128::from(v)),
            Number::F64(v) => {
                floats = true;
                fractional += v;
            }
        }
    }

    let total = if floats {
        Number::F64(integral as f64 + fractional)
    } else if let Ok(v) = i64::try_from(integral) {
        Number::I64(v)
    } else if let Ok(v) = u64::try_from(integral) {
        Number::U64(v)
    } else {
        Number::F64(integral as f64)
    };
    (total, count)
}

/// Smallest or largest number, ignoring NaN.
fn extreme(
    numbers: impl Iterator<Item = Number>,
    wanted: std::cmp::Ordering,
) -> Option<Number> {
    numbers.filter(|n| !n.is_nan()).fold(None, |best, n| match best {
        None => Some(n),
        Some(b) if n.compare(b) == Some(wanted) => Some(n),
        keep => keep,
    })
}
