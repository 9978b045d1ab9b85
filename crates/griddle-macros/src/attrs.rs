//! Parsing of `#[grid(...)]` field attributes.

use proc_macro2::Span;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Error, Ident, Lit, Meta, Result, Token, Type,
};

/// How a field is exposed to griddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridType {
    /// `#[grid(String)]`
    String,
    /// `#[grid(Number)]`
    Number,
    /// `#[grid(Timestamp)]`
    Timestamp,
    /// `#[grid(Bool)]`
    Bool,
}

impl GridType {
    pub fn from_ident(ident: &Ident) -> Result<Self> {
        match ident.to_string().as_str() {
            "String" | "string" => Ok(GridType::String),
            "Number" | "number" => Ok(GridType::Number),
            "Timestamp" | "timestamp" => Ok(GridType::Timestamp),
            "Bool" | "bool" | "boolean" => Ok(GridType::Bool),
            other => Err(Error::new(
                ident.span(),
                format!(
                    "unknown grid type: '{}'. Expected one of: String, Number, Timestamp, Bool",
                    other
                ),
            )),
        }
    }

    /// Infers the grid type from a Rust type.
    ///
    /// Only plain paths are recognised: `String`, `str` references, the
    /// primitive numbers and `bool`. Anything else needs an attribute.
    pub fn infer(ty: &Type) -> Option<Self> {
        match ty {
            Type::Reference(r) => match &*r.elem {
                Type::Path(p) if p.path.is_ident("str") => Some(GridType::String),
                _ => None,
            },
            Type::Path(p) => {
                let ident = p.path.segments.last()?.ident.to_string();
                match ident.as_str() {
                    "String" => Some(GridType::String),
                    "bool" => Some(GridType::Bool),
                    "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64"
                    | "usize" | "f32" | "f64" => Some(GridType::Number),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Path of the matching `FieldKind` variant.
    pub fn kind_variant(self) -> &'static str {
        match self {
            GridType::String => "String",
            GridType::Number => "Numeric",
            GridType::Timestamp => "Timestamp",
            GridType::Bool => "Bool",
        }
    }
}

/// Field-level attributes from `#[grid(...)]`.
#[derive(Debug, Clone)]
pub struct GridAttr {
    pub grid_type: Option<GridType>,
    pub skip: bool,
    /// Name used in requests (default: the field name).
    pub rename: Option<String>,
    pub span: Span,
}

impl Default for GridAttr {
    fn default() -> Self {
        GridAttr {
            grid_type: None,
            skip: false,
            rename: None,
            span: Span::call_site(),
        }
    }
}

impl Parse for GridAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = GridAttr::default();

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::Path(p) => {
                    if p.is_ident("skip") {
                        attr.skip = true;
                    } else if let Some(ident) = p.get_ident() {
                        attr.grid_type = Some(GridType::from_ident(ident)?);
                        attr.span = ident.span();
                    } else {
                        return Err(Error::new(
                            p.span(),
                            "expected grid type: String, Number, Timestamp, Bool, or skip",
                        ));
                    }
                }

                Meta::NameValue(nv) if nv.path.is_ident("rename") => {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: Lit::Str(s), ..
                    }) = &nv.value
                    {
                        attr.rename = Some(s.value());
                    } else {
                        return Err(Error::new(
                            nv.value.span(),
                            "rename must be a string literal",
                        ));
                    }
                }

                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown grid attribute. Expected: String, Number, Timestamp, Bool, skip, or rename = \"...\"",
                    ));
                }
            }
        }

        if attr.skip && (attr.grid_type.is_some() || attr.rename.is_some()) {
            return Err(Error::new(attr.span, "skip cannot be combined with other options"));
        }

        Ok(attr)
    }
}

/// Extract `#[grid(...)]` attributes from a field's attributes.
pub fn parse_grid_attrs(attrs: &[Attribute]) -> Result<GridAttr> {
    for attr in attrs {
        if attr.path().is_ident("grid") {
            return attr.parse_args::<GridAttr>();
        }
    }
    Ok(GridAttr::default())
}
