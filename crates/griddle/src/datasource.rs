//! Request orchestration.
//!
//! A [`DataSourceRequest`] describes what a grid wants to show: a filter,
//! sort keys, grouping levels, aggregates and a page window. A
//! [`DataSource`] runs it against a slice of records:
//!
//! ```text
//! filter ─▶ total ─▶ sort ─┬─▶ group          ─▶ data
//!                          └─▶ skip/take page ─▶ data
//!        └───────────────────▶ aggregates
//! ```
//!
//! Every part of the request is compiled before the first record is touched,
//! so an invalid request fails without doing any work.
//!
//! # Example
//!
//! ```
//! use griddle::{DataSource, DataSourceRequest, FieldKind, FieldTable, Number, Value};
//!
//! #[derive(Debug)]
//! struct Person {
//!     name: &'static str,
//!     age: i64,
//! }
//!
//! let people = vec![
//!     Person { name: "John", age: 40 },
//!     Person { name: "Bruce", age: 4 },
//! ];
//! let fields = FieldTable::new()
//!     .field("name", FieldKind::String, |p: &Person| Value::String(p.name))
//!     .field("age", FieldKind::Numeric, |p: &Person| Value::Number(Number::I64(p.age)));
//!
//! let request = DataSourceRequest::from_json(
//!     r#"{"sort": [{"field": "age", "dir": "asc"}], "aggregates": [{"field": "age", "aggregate": "sum"}]}"#,
//! )
//! .unwrap();
//! let result = DataSource::with_resolver(fields).execute(&people, &request).unwrap();
//!
//! assert_eq!(result.total, 2);
//! assert_eq!(result.data.records().unwrap()[0].name, "Bruce");
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateDescriptor, AggregatePlan, AggregateResults};
use crate::config::DataSourceConfig;
use crate::error::{GridError, Result};
use crate::filter::{FilterDescriptor, FilterNode};
use crate::group::{GroupDescriptor, GroupItems, GroupPlan, GroupResult};
use crate::predicate::{compile, Predicate};
use crate::resolver::{CachingResolver, FieldResolver, Record, RecordResolver};
use crate::sort::{Comparator, SortDescriptor};

/// A grid data request, as sent by the client.
///
/// All members are optional. `page` is zero-based; paging applies only when
/// `pageSize` is positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataSourceRequest {
    /// Filter tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterDescriptor>,
    /// Sort keys, most significant first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortDescriptor>>,
    /// Grouping levels, outermost first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<GroupDescriptor>>,
    /// Aggregates over the whole filtered set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<Vec<AggregateDescriptor>>,
    /// Zero-based page index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Records per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
}

impl DataSourceRequest {
    /// Creates an empty request, which returns every record.
    pub fn new() -> Self {
        DataSourceRequest::default()
    }

    /// Decodes a request from the grid's JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the filter.
    pub fn filter(mut self, filter: FilterDescriptor) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Appends a sort key.
    pub fn sort_by(mut self, key: SortDescriptor) -> Self {
        self.sort.get_or_insert_with(Vec::new).push(key);
        self
    }

    /// Appends a grouping level.
    pub fn group_by(mut self, level: GroupDescriptor) -> Self {
        self.group.get_or_insert_with(Vec::new).push(level);
        self
    }

    /// Appends a top-level aggregate.
    pub fn aggregate(mut self, aggregate: AggregateDescriptor) -> Self {
        self.aggregates.get_or_insert_with(Vec::new).push(aggregate);
        self
    }

    /// Sets the page window.
    pub fn page(mut self, page: i64, page_size: i64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Runs this request with a default [`DataSource`].
    pub fn apply<'a, T: Record>(&self, records: &'a [T]) -> Result<DataSourceResult<'a, T>> {
        DataSource::new().execute(records, self)
    }

    fn is_grouped(&self) -> bool {
        self.group.as_ref().is_some_and(|g| !g.is_empty())
    }
}

/// Result rows: a page of records, or the group tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, bound = "T: Serialize")]
pub enum Data<'a, T> {
    /// The requested page of records.
    Records(Vec<&'a T>),
    /// Top-level groups.
    Groups(Vec<GroupResult<'a, T>>),
}

impl<'a, T> Data<'a, T> {
    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        match self {
            Data::Records(records) => records.len(),
            Data::Groups(groups) => groups.len(),
        }
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the records, if ungrouped.
    pub fn records(&self) -> Option<&[&'a T]> {
        match self {
            Data::Records(records) => Some(records),
            Data::Groups(_) => None,
        }
    }

    /// Returns the groups, if grouped.
    pub fn groups(&self) -> Option<&[GroupResult<'a, T>]> {
        match self {
            Data::Records(_) => None,
            Data::Groups(groups) => Some(groups),
        }
    }
}

impl<'a, T> From<GroupItems<'a, T>> for Data<'a, T> {
    fn from(items: GroupItems<'a, T>) -> Self {
        match items {
            GroupItems::Groups(groups) => Data::Groups(groups),
            GroupItems::Records(records) => Data::Records(records),
        }
    }
}

/// What the grid receives back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "T: Serialize")]
pub struct DataSourceResult<'a, T> {
    /// The page or the groups.
    pub data: Data<'a, T>,
    /// Number of records matching the filter, before paging.
    pub total: usize,
    /// Top-level aggregates over all matching records.
    pub aggregates: AggregateResults,
}

/// Runs requests against record slices.
///
/// The resolver decides how field names map to record values; it defaults
/// to [`RecordResolver`], which uses the [`Record`] implementation.
#[derive(Debug, Clone, Default)]
pub struct DataSource<R = RecordResolver> {
    resolver: R,
    config: DataSourceConfig,
}

impl DataSource<RecordResolver> {
    /// Creates a data source for [`Record`] types.
    pub fn new() -> Self {
        DataSource::default()
    }
}

impl<R> DataSource<R> {
    /// Creates a data source with a custom resolver.
    pub fn with_resolver(resolver: R) -> Self {
        DataSource {
            resolver,
            config: DataSourceConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: DataSourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Runs a request.
    ///
    /// The records are not modified; the result borrows from them.
    pub fn execute<'a, T>(
        &self,
        records: &'a [T],
        request: &DataSourceRequest,
    ) -> Result<DataSourceResult<'a, T>>
    where
        R: FieldResolver<T>,
    {
        let plan = self.plan(request)?;

        let mut matched = plan.filter.filter(records);
        let total = matched.len();
        debug!("filter kept {} of {} records", total, records.len());

        plan.comparator.sort(&mut matched);
        let aggregates = plan.aggregates.evaluate(&matched);

        let data = match &plan.groups {
            Some(groups) => {
                debug!("grouping {} records over {} levels", total, groups.depth());
                Data::from(groups.group(matched))
            }
            None => Data::Records(plan.window.apply(matched)),
        };

        Ok(DataSourceResult {
            data,
            total,
            aggregates,
        })
    }

    fn plan<T>(&self, request: &DataSourceRequest) -> Result<Plan<T>>
    where
        R: FieldResolver<T>,
    {
        let resolver = CachingResolver::new(&self.resolver);

        let filter = match &request.filter {
            Some(descriptor) => compile(&FilterNode::try_from(descriptor)?, &resolver)?,
            None => Predicate::always(),
        };
        let comparator = Comparator::build(request.sort.as_deref().unwrap_or_default(), &resolver)?;

        let levels = request.group.as_deref().unwrap_or_default();
        if let Some(max) = self.config.max_group_depth {
            if levels.len() > max {
                return Err(GridError::malformed(format!(
                    "grouping by {} levels exceeds the limit of {max}",
                    levels.len()
                )));
            }
        }
        let groups = if request.is_grouped() {
            Some(GroupPlan::build(levels, &resolver)?)
        } else {
            None
        };

        let aggregates =
            AggregatePlan::build(request.aggregates.as_deref().unwrap_or_default(), &resolver)?;
        let window = Window::of(request, &self.config)?;

        debug!(
            "compiled request: {} fields, sort {:?}, window {:?}",
            resolver.cached(),
            comparator,
            window
        );
        Ok(Plan {
            filter,
            comparator,
            groups,
            aggregates,
            window,
        })
    }
}

struct Plan<T> {
    filter: Predicate<T>,
    comparator: Comparator<T>,
    groups: Option<GroupPlan<T>>,
    aggregates: AggregatePlan<T>,
    window: Window,
}

/// Records to skip and take. `take == None` keeps everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    skip: usize,
    take: Option<usize>,
}

impl Window {
    fn of(request: &DataSourceRequest, config: &DataSourceConfig) -> Result<Self> {
        let page = request.page.unwrap_or(0);
        if page < 0 {
            return Err(GridError::malformed(format!("negative page index {page}")));
        }
        if page > 0 && request.is_grouped() {
            return Err(GridError::malformed(
                "grouped results are not paged; page must be 0",
            ));
        }

        let page_size = match request.page_size {
            Some(size) if size > 0 => usize::try_from(size).unwrap_or(usize::MAX),
            _ => {
                return Ok(Window {
                    skip: 0,
                    take: config.max_page_size,
                })
            }
        };
        let page_size = config.clamp_page_size(page_size);
        let page = usize::try_from(page).unwrap_or(usize::MAX);
        Ok(Window {
            skip: page.saturating_mul(page_size),
            take: Some(page_size),
        })
    }

    fn apply<'a, T>(&self, records: Vec<&'a T>) -> Vec<&'a T> {
        match self.take {
            Some(take) => records.into_iter().skip(self.skip).take(take).collect(),
            None => records.into_iter().skip(self.skip).collect(),
        }
    }
}
