//! Late-bound field access.
//!
//! Requests name fields with strings. Before anything is evaluated, each name
//! is resolved once into a [`FieldAccessor`]: the field's canonical name, its
//! [`FieldKind`] and a getter. Resolution goes through a [`FieldResolver`],
//! which is the only place that knows how a record type maps names to values.
//!
//! Two resolvers are provided:
//!
//! - [`RecordResolver`] resolves through the [`Record`] trait, which is
//!   usually derived with `#[derive(Record)]` from `griddle-macros`.
//! - [`FieldTable`] is built at runtime from explicit entries, for record
//!   types you cannot implement [`Record`] for.
//!
//! [`CachingResolver`] wraps either of them for the lifetime of one request.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::error::{GridError, Result};
use crate::value::Value;

/// Declared kind of a field, which decides how operators are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Text field.
    String,
    /// Numeric field, nullable or not.
    Numeric,
    /// Boolean field.
    Bool,
    /// Timestamp field.
    Timestamp,
    /// Anything else. Operands are used as given.
    Other,
}

impl FieldKind {
    /// Returns `true` for string fields.
    pub fn is_string(self) -> bool {
        matches!(self, FieldKind::String)
    }

    /// Returns `true` for numeric fields.
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldKind::Numeric)
    }

    /// Returns the display name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Numeric => "numeric",
            FieldKind::Bool => "bool",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Other => "other",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Record types whose fields can be addressed by name.
///
/// Usually derived with `#[derive(Record)]`, but can be implemented by hand:
///
/// ```
/// use griddle::{FieldKind, Number, Record, Value};
///
/// struct Person {
///     name: String,
///     age: u32,
/// }
///
/// impl Record for Person {
///     fn resolve_field(name: &str) -> Option<(&'static str, FieldKind)> {
///         if name.eq_ignore_ascii_case("name") {
///             Some(("name", FieldKind::String))
///         } else if name.eq_ignore_ascii_case("age") {
///             Some(("age", FieldKind::Numeric))
///         } else {
///             None
///         }
///     }
///
///     fn field_value(&self, field: &str) -> Value<'_> {
///         match field {
///             "name" => Value::String(&self.name),
///             "age" => Value::Number(Number::from(self.age)),
///             _ => Value::None,
///         }
///     }
/// }
///
/// assert_eq!(Person::resolve_field("Age"), Some(("age", FieldKind::Numeric)));
/// ```
pub trait Record {
    /// Maps a requested field name to its canonical name and kind.
    ///
    /// Returns `None` if the type has no such field. Implementations should
    /// match names case-insensitively.
    fn resolve_field(name: &str) -> Option<(&'static str, FieldKind)>;

    /// Returns the value of a field, given its canonical name.
    fn field_value(&self, field: &str) -> Value<'_>;
}

enum Getter<T> {
    Named(for<'a> fn(&'a T, &str) -> Value<'a>),
    Direct(for<'a> fn(&'a T) -> Value<'a>),
}

impl<T> Clone for Getter<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Getter<T> {}

/// A resolved field: canonical name, kind and getter.
pub struct FieldAccessor<T> {
    name: String,
    kind: FieldKind,
    getter: Getter<T>,
}

impl<T> FieldAccessor<T> {
    /// Creates an accessor whose getter receives the field name.
    pub fn named(
        name: impl Into<String>,
        kind: FieldKind,
        getter: for<'a> fn(&'a T, &str) -> Value<'a>,
    ) -> Self {
        FieldAccessor {
            name: name.into(),
            kind,
            getter: Getter::Named(getter),
        }
    }

    /// Creates an accessor from a getter dedicated to one field.
    pub fn direct(
        name: impl Into<String>,
        kind: FieldKind,
        getter: for<'a> fn(&'a T) -> Value<'a>,
    ) -> Self {
        FieldAccessor {
            name: name.into(),
            kind,
            getter: Getter::Direct(getter),
        }
    }

    /// Canonical name of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind of the field.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Reads the field from a record.
    pub fn get<'a>(&self, record: &'a T) -> Value<'a> {
        match self.getter {
            Getter::Named(get) => get(record, &self.name),
            Getter::Direct(get) => get(record),
        }
    }
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        FieldAccessor {
            name: self.name.clone(),
            kind: self.kind,
            getter: self.getter,
        }
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Capability that turns field names into accessors for record type `T`.
pub trait FieldResolver<T> {
    /// Resolves a field name, failing with [`GridError::UnknownField`].
    fn resolve(&self, field: &str) -> Result<FieldAccessor<T>>;
}

impl<T, R: FieldResolver<T> + ?Sized> FieldResolver<T> for &R {
    fn resolve(&self, field: &str) -> Result<FieldAccessor<T>> {
        (**self).resolve(field)
    }
}

/// Resolves fields through the [`Record`] implementation of `T`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordResolver;

impl<T: Record> FieldResolver<T> for RecordResolver {
    fn resolve(&self, field: &str) -> Result<FieldAccessor<T>> {
        let (name, kind) = T::resolve_field(field).ok_or_else(|| GridError::unknown_field(field))?;
        Ok(FieldAccessor::named(name, kind, T::field_value))
    }
}

/// Resolver built from explicit field entries.
///
/// ```
/// use griddle::{FieldKind, FieldResolver, FieldTable, Number, Value};
///
/// struct Row(String, f64);
///
/// let table = FieldTable::new()
///     .field("label", FieldKind::String, |row: &Row| Value::String(&row.0))
///     .field("score", FieldKind::Numeric, |row: &Row| Value::Number(Number::F64(row.1)));
///
/// let score = table.resolve("SCORE").unwrap();
/// assert_eq!(score.get(&Row("a".into(), 1.5)), Value::Number(Number::F64(1.5)));
/// ```
pub struct FieldTable<T> {
    fields: Vec<FieldAccessor<T>>,
}

impl<T> FieldTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        FieldTable { fields: Vec::new() }
    }

    /// Adds a field.
    pub fn field(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        getter: for<'a> fn(&'a T) -> Value<'a>,
    ) -> Self {
        self.fields.push(FieldAccessor::direct(name, kind, getter));
        self
    }

    /// Names of all registered fields, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name())
    }
}

impl<T> Default for FieldTable<T> {
    fn default() -> Self {
        FieldTable::new()
    }
}

impl<T> FieldResolver<T> for FieldTable<T> {
    fn resolve(&self, field: &str) -> Result<FieldAccessor<T>> {
        self.fields
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(field))
            .cloned()
            .ok_or_else(|| GridError::unknown_field(field))
    }
}

/// Memoizes resolutions per requested field name.
///
/// Meant to live for a single request; it is not `Sync`.
pub struct CachingResolver<'r, T, R: ?Sized> {
    inner: &'r R,
    cache: RefCell<HashMap<String, FieldAccessor<T>>>,
}

impl<'r, T, R: FieldResolver<T> + ?Sized> CachingResolver<'r, T, R> {
    /// Wraps a resolver.
    pub fn new(inner: &'r R) -> Self {
        CachingResolver {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct names resolved so far.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl<T, R: FieldResolver<T> + ?Sized> FieldResolver<T> for CachingResolver<'_, T, R> {
    fn resolve(&self, field: &str) -> Result<FieldAccessor<T>> {
        if let Some(accessor) = self.cache.borrow().get(field) {
            return Ok(accessor.clone());
        }
        let accessor = self.inner.resolve(field)?;
        self.cache
            .borrow_mut()
            .insert(field.to_string(), accessor.clone());
        Ok(accessor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Number;

    struct TestItem {
        name: String,
        count: Option<i32>,
    }

    impl Record for TestItem {
        fn resolve_field(name: &str) -> Option<(&'static str, FieldKind)> {
            ["name", "count"]
                .into_iter()
                .find(|f| f.eq_ignore_ascii_case(name))
                .map(|f| {
                    let kind = if f == "name" {
                        FieldKind::String
                    } else {
                        FieldKind::Numeric
                    };
                    (f, kind)
                })
        }

        fn field_value(&self, field: &str) -> Value<'_> {
            match field {
                "name" => Value::String(&self.name),
                "count" => self
                    .count
                    .map_or(Value::None, |c| Value::Number(Number::from(c))),
                _ => Value::None,
            }
        }
    }

    fn item() -> TestItem {
        TestItem {
            name: "test".to_string(),
            count: Some(42),
        }
    }

    #[test]
    fn record_resolver_matches_case_insensitively() {
        let accessor: FieldAccessor<TestItem> = RecordResolver.resolve("Count").unwrap();
        assert_eq!(accessor.name(), "count");
        assert_eq!(accessor.kind(), FieldKind::Numeric);
        assert_eq!(accessor.get(&item()), Value::Number(Number::I64(42)));
    }

    #[test]
    fn record_resolver_rejects_unknown_fields() {
        let err = FieldResolver::<TestItem>::resolve(&RecordResolver, "missing").unwrap_err();
        assert!(matches!(err, GridError::UnknownField { field } if field == "missing"));
    }

    #[test]
    fn nullable_field_reads_none() {
        let accessor: FieldAccessor<TestItem> = RecordResolver.resolve("count").unwrap();
        let empty = TestItem {
            name: String::new(),
            count: None,
        };
        assert!(accessor.get(&empty).is_none());
    }

    #[test]
    fn field_table_resolves_registered_fields() {
        let table = FieldTable::new()
            .field("name", FieldKind::String, |i: &TestItem| Value::String(&i.name));

        assert_eq!(table.names().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(table.resolve("NAME").unwrap().get(&item()), Value::String("test"));
        assert!(table.resolve("count").is_err());
    }

    #[test]
    fn caching_resolver_resolves_each_name_once() {
        let cache = CachingResolver::<TestItem, _>::new(&RecordResolver);
        cache.resolve("name").unwrap();
        cache.resolve("name").unwrap();
        cache.resolve("count").unwrap();
        assert_eq!(cache.cached(), 2);
        assert!(cache.resolve("nope").is_err());
        assert_eq!(cache.cached(), 2);
    }

    #[test]
    fn field_kind_display() {
        assert_eq!(FieldKind::String.to_string(), "string");
        assert!(FieldKind::Numeric.is_numeric());
        assert!(!FieldKind::Other.is_string());
        assert_eq!(FieldKind::Timestamp.to_string(), "timestamp");
        assert!(!FieldKind::Bool.is_numeric());
    }
}
