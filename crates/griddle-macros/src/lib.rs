//! Derive macros for griddle.
//!
//! Use through the `griddle` crate, which re-exports [`Record`] with its
//! default `macros` feature.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod derive;

/// Derives `griddle::Record` for a struct with named fields.
///
/// Fields of type `String`, `&str`, the primitive numbers and `bool` (or an
/// `Option` of one) are picked up without annotation. Other fields are left
/// out unless annotated.
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `String` | Text field; text operators apply |
/// | `Number` | Numeric field; the type must convert into `griddle::Number` |
/// | `Timestamp` | Timestamp field; the type must implement `griddle::AsTimestamp` |
/// | `Bool` | Boolean field (`bool` is accepted too) |
/// | `skip` | Exclude this field |
/// | `rename = "..."` | Name used in requests |
///
/// `None` values of `Option` fields read as null.
///
/// # Generated Code
///
/// 1. Field name constants (e.g. `Person::NAME`, `Person::BIRTH_DATE`).
///    Characters not allowed in identifiers become `_`, so
///    `rename = "birth.date"` also gives `BIRTH_DATE`.
/// 2. An implementation of `griddle::Record`, matching names
///    case-insensitively
///
/// # Example
///
/// ```ignore
/// use std::time::SystemTime;
/// use griddle::Record;
///
/// #[derive(Record)]
/// struct Person {
///     name: String,
///     age: Option<u32>,
///     #[grid(Timestamp, rename = "birthDate")]
///     born: SystemTime,
///     #[grid(skip)]
///     password_hash: String,
/// }
///
/// assert_eq!(Person::BIRTH_DATE, "birthDate");
/// assert!(Person::resolve_field("BirthDate").is_some());
/// ```
#[proc_macro_derive(Record, attributes(grid))]
pub fn record_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive::record_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
