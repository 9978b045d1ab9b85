//! Griddle - server side of a data grid.
//!
//! A data grid sends a declarative request: a filter tree, sort keys,
//! grouping levels, aggregates and a page window. Griddle runs that request
//! over an in-memory collection of structs and returns the page (or the group
//! tree), the number of matching records and the requested aggregates.
//!
//! - Filter trees of `and` / `or` nodes over typed field conditions
//! - Case-insensitive text operators, emptiness and null tests
//! - Multi-key sorting with nulls last
//! - Multi-level grouping with per-group aggregates
//! - `sum`, `average`, `count`, `min`, `max`
//! - Rendering filters as parameterized predicate text
//!
//! # Quick Start
//!
//! ```rust
//! use griddle::{DataSourceRequest, Record};
//!
//! #[derive(Debug, Record)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let people = vec![
//!     Person { name: "John Doe".into(), age: 40 },
//!     Person { name: "Bruce Lee".into(), age: 4 },
//!     Person { name: "Mickey Mouse".into(), age: 25 },
//! ];
//!
//! let request = DataSourceRequest::from_json(r#"{
//!     "filter": { "field": "name", "operator": "contains", "value": "LEE" },
//!     "aggregates": [{ "field": "age", "aggregate": "sum" }]
//! }"#).unwrap();
//!
//! let result = request.apply(&people).unwrap();
//! assert_eq!(result.total, 1);
//! assert_eq!(result.data.records().unwrap()[0].name, "Bruce Lee");
//! ```
//!
//! # Fields
//!
//! Requests name fields as strings. A [`FieldResolver`] maps each name to a
//! typed [`FieldAccessor`], once per request. Three resolvers are provided:
//!
//! - [`RecordResolver`] uses the [`Record`] trait, usually derived
//! - [`FieldTable`] registers getters one by one, for foreign types
//! - [`CachingResolver`] memoizes another resolver
//!
//! Names match case-insensitively. The [`FieldKind`] of a field decides
//! which operators apply:
//!
//! | Operator | String field | Other fields |
//! |----------|--------------|--------------|
//! | `eq`, `neq`, `lt`, `lte`, `gt`, `gte` | ordinal | by value |
//! | `startswith`, `endswith`, `contains` | case-insensitive | unsupported |
//! | `doesnotcontain` | case-insensitive | on the text form, nulls excluded |
//! | `isempty`, `isnotempty`, `isnullorempty`, `isnotnullorempty` | yes | unsupported |
//! | `isnull`, `isnotnull` | unsupported | unsupported |
//!
//! # Lower Level API
//!
//! Each stage is usable on its own: [`compile`] builds a [`Predicate`] from
//! a [`FilterNode`], [`Comparator`] sorts, [`GroupPlan`] groups and
//! [`AggregatePlan`] aggregates. Errors are reported as [`GridError`] when a
//! stage is built, never while records are evaluated.

mod aggregate;
mod config;
mod datasource;
mod error;
mod expression;
mod filter;
mod group;
mod operator;
mod predicate;
mod resolver;
mod sort;
mod value;

// Re-export public API
pub use aggregate::{
    aggregate, AggregateDescriptor, AggregateFunction, AggregatePlan, AggregateResults,
};
pub use config::DataSourceConfig;
pub use datasource::{Data, DataSource, DataSourceRequest, DataSourceResult};
pub use error::{GridError, Result};
pub use expression::Expression;
pub use filter::{Condition, FilterDescriptor, FilterNode, Logic};
pub use group::{group, GroupDescriptor, GroupItems, GroupPlan, GroupResult};
pub use operator::Operator;
pub use predicate::{compile, Predicate};
pub use resolver::{
    CachingResolver, FieldAccessor, FieldKind, FieldResolver, FieldTable, Record, RecordResolver,
};
pub use sort::{Comparator, Dir, SortDescriptor};
pub use value::{compare_values, sort_values, AsTimestamp, Number, Scalar, Timestamp, Value};

#[cfg(feature = "macros")]
pub use griddle_macros::Record;
