//! Multi-key ordering.
//!
//! Provides [`Dir`] for sort direction, [`SortDescriptor`] for the grid's
//! sort keys, and [`Comparator`] for the compiled multi-key comparison.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::resolver::{FieldAccessor, FieldResolver};
use crate::value::sort_values;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    #[serde(alias = "ascending", alias = "ASC", alias = "Asc")]
    Asc,
    /// Descending order (largest first).
    #[serde(alias = "descending", alias = "DESC", alias = "Desc")]
    Desc,
}

impl Dir {
    /// Applies this direction to an ordering.
    ///
    /// For `Asc`, returns the ordering unchanged.
    /// For `Desc`, reverses the ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    /// Returns the display name of this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sort key: field and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// The field to sort by.
    pub field: String,
    /// The sort direction.
    #[serde(default)]
    pub dir: Dir,
}

impl SortDescriptor {
    /// Creates an ascending sort key.
    pub fn asc(field: impl Into<String>) -> Self {
        SortDescriptor {
            field: field.into(),
            dir: Dir::Asc,
        }
    }

    /// Creates a descending sort key.
    pub fn desc(field: impl Into<String>) -> Self {
        SortDescriptor {
            field: field.into(),
            dir: Dir::Desc,
        }
    }
}

/// Compiled multi-key comparator.
///
/// Compares by the first key, breaking ties with the following ones. Each
/// key is ordered by [`sort_values`]: nulls after values in ascending order,
/// NaN after every other number, mismatched types by type. Records equal on
/// every key keep their input order.
///
/// [`sort_values`]: crate::sort_values
pub struct Comparator<T> {
    keys: Vec<(FieldAccessor<T>, Dir)>,
}

impl<T> Comparator<T> {
    /// Resolves the fields of every sort key.
    pub fn build<R>(keys: &[SortDescriptor], resolver: &R) -> Result<Self>
    where
        R: FieldResolver<T> + ?Sized,
    {
        let keys = keys
            .iter()
            .map(|key| Ok((resolver.resolve(&key.field)?, key.dir)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Comparator { keys })
    }

    /// Returns `true` if there are no keys (every pair compares equal).
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compares two records.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        for (accessor, dir) in &self.keys {
            let ordering = dir.apply(sort_values(&accessor.get(a), &accessor.get(b)));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Sorts record references in place.
    pub fn sort(&self, records: &mut [&T]) {
        if !self.is_empty() {
            records.sort_by(|a, b| self.compare(a, b));
        }
    }
}

impl<T> std::fmt::Debug for Comparator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.keys.iter().map(|(a, dir)| (a.name(), dir)))
            .finish()
    }
}
