//! Implementation of `#[derive(Record)]`.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    spanned::Spanned, Data, DeriveInput, Error, Fields, GenericArgument, Ident, PathArguments,
    Result, Type,
};

use crate::attrs::{parse_grid_attrs, GridType};

pub fn record_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "Record can only be derived for structs",
            ))
        }
    };

    let mut entries: Vec<TokenStream> = Vec::new();
    let mut field_matches: Vec<TokenStream> = Vec::new();
    let mut field_constants: Vec<TokenStream> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    let mut constants: Vec<String> = Vec::new();

    for field in fields.iter() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;

        let attrs = parse_grid_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let inner = option_inner(&field.ty);
        let grid_type = match attrs
            .grid_type
            .or_else(|| GridType::infer(inner.unwrap_or(&field.ty)))
        {
            Some(t) => t,
            None => continue,
        };

        let request_name = attrs.rename.unwrap_or_else(|| field_name.to_string());
        let lowered = request_name.to_ascii_lowercase();
        if seen.contains(&lowered) {
            return Err(Error::new(
                field.span(),
                format!("duplicate grid field name '{}'", request_name),
            ));
        }
        seen.push(lowered);

        let const_name = const_ident(&request_name, field.span())?;
        if constants.contains(&const_name.to_string()) {
            return Err(Error::new(
                field.span(),
                format!(
                    "grid field name '{}' gives the constant {}, which is already defined",
                    request_name, const_name
                ),
            ));
        }
        constants.push(const_name.to_string());
        field_constants.push(quote! {
            /// Field name for data source requests.
            pub const #const_name: &'static str = #request_name;
        });

        let kind = format_ident!("{}", grid_type.kind_variant());
        entries.push(quote! {
            (#request_name, ::griddle::FieldKind::#kind),
        });

        let value_expr = if inner.is_some() {
            let some = value_of(grid_type, quote! { v }, true);
            quote! {
                match &self.#field_name {
                    ::core::option::Option::Some(v) => #some,
                    ::core::option::Option::None => ::griddle::Value::None,
                }
            }
        } else {
            value_of(grid_type, quote! { self.#field_name }, false)
        };

        field_matches.push(quote! {
            #request_name => #value_expr,
        });
    }

    let expanded = quote! {
        impl #impl_generics #struct_name #ty_generics #where_clause {
            #(#field_constants)*
        }

        impl #impl_generics ::griddle::Record for #struct_name #ty_generics #where_clause {
            fn resolve_field(name: &str) -> ::core::option::Option<(&'static str, ::griddle::FieldKind)> {
                const FIELDS: &[(&str, ::griddle::FieldKind)] = &[#(#entries)*];
                FIELDS
                    .iter()
                    .find(|(field, _)| field.eq_ignore_ascii_case(name))
                    .copied()
            }

            fn field_value(&self, field: &str) -> ::griddle::Value<'_> {
                match field {
                    #(#field_matches)*
                    _ => ::griddle::Value::None,
                }
            }
        }
    };

    Ok(expanded)
}

/// Expression producing a `Value` from `place`.
///
/// `by_ref` is set when `place` is a reference bound by a match on an
/// `Option` field.
fn value_of(grid_type: GridType, place: TokenStream, by_ref: bool) -> TokenStream {
    let copied = if by_ref {
        quote! { *#place }
    } else {
        place.clone()
    };
    let borrowed = if by_ref {
        place
    } else {
        quote! { &#place }
    };
    match grid_type {
        GridType::String => quote! { ::griddle::Value::String(#borrowed) },
        GridType::Number => {
            quote! { ::griddle::Value::Number(::griddle::Number::from(#copied)) }
        }
        GridType::Timestamp => quote! {
            ::griddle::Value::Timestamp(::griddle::AsTimestamp::as_timestamp(#borrowed))
        },
        GridType::Bool => quote! { ::griddle::Value::Bool(#copied) },
    }
}

/// Returns `T` for a field of type `Option<T>`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(p) = ty else {
        return None;
    };
    let segment = p.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Name constant for a grid field name.
///
/// Characters that cannot appear in an identifier become `_`, and a leading
/// digit gets a `_` prefix.
fn const_ident(request_name: &str, span: Span) -> Result<Ident> {
    let mut name: String = to_screaming_snake_case(request_name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if name.chars().all(|c| c == '_') || syn::parse_str::<Ident>(&name).is_err() {
        return Err(Error::new(
            span,
            format!(
                "grid field name '{}' cannot be turned into a constant name",
                request_name
            ),
        ));
    }
    Ok(Ident::new(&name, span))
}

/// Convert a string to SCREAMING_SNAKE_CASE.
fn to_screaming_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_was_lower = false;

    for c in s.chars() {
        if c.is_uppercase() {
            if prev_was_lower {
                result.push('_');
            }
            result.push(c);
            prev_was_lower = false;
        } else if c == '_' || c == '-' || c == ' ' {
            result.push('_');
            prev_was_lower = false;
        } else {
            result.push(c.to_ascii_uppercase());
            prev_was_lower = c.is_alphanumeric();
        }
    }

    result
}
