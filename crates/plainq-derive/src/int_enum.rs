//! `#[derive(IntEnum)]`: map a fieldless Rust enum to its integer representation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

const REPRS: &[&str] = &["u8", "i16", "i32", "i64"];

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(e) => &e.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "IntEnum can only be derived for enums",
            ));
        }
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "IntEnum cannot be derived for generic types",
        ));
    }

    let repr = parse_repr(&input)?;
    let type_name = name.to_string();

    let mut from_value_arms = Vec::new();
    for variant in variants {
        if !matches!(&variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "IntEnum variants must be unit variants (no fields)",
            ));
        }
        let variant_ident = &variant.ident;
        from_value_arms.push(quote! {
            raw if raw == #name::#variant_ident as #repr => Ok(#name::#variant_ident),
        });
    }
    let to_value_arms = variants.iter().map(|variant| {
        let variant_ident = &variant.ident;
        quote! {
            #name::#variant_ident => #name::#variant_ident as #repr,
        }
    });

    Ok(quote! {
        impl ::plainq::ToValue for #name {
            const SQL_TYPE: ::plainq::SqlType = <#repr as ::plainq::ToValue>::SQL_TYPE;

            fn to_value(&self) -> ::plainq::Value {
                let raw: #repr = match self {
                    #(#to_value_arms)*
                };
                ::plainq::ToValue::to_value(&raw)
            }
        }

        impl ::plainq::FromValue for #name {
            const FIELD_TYPE: ::plainq::FieldType = ::plainq::FieldType::enumeration(
                <#repr as ::plainq::FromValue>::FIELD_TYPE.sql,
                #type_name,
            );

            fn from_value(
                value: &::plainq::Value,
            ) -> ::std::result::Result<Self, ::plainq::ValueError> {
                let raw = <#repr as ::plainq::FromValue>::from_value(value)?;
                match raw {
                    #(#from_value_arms)*
                    other => Err(::plainq::ValueError::new(
                        #type_name,
                        ::std::format!("{other}"),
                    )),
                }
            }
        }

        impl ::plainq::FromRow for #name {
            fn shape() -> ::plainq::Shape {
                ::plainq::Shape::scalar::<Self>(<Self as ::plainq::FromValue>::FIELD_TYPE)
            }

            fn from_row(
                row: &::plainq::Row,
                _slots: &::plainq::FieldSlots,
            ) -> ::plainq::DbResult<Self> {
                ::plainq::scalar_from_row(row)
            }
        }
    })
}

/// Parse `#[repr(...)]`; only integer types with a matching column type are accepted.
fn parse_repr(input: &DeriveInput) -> Result<syn::Ident> {
    for attr in &input.attrs {
        if !attr.path().is_ident("repr") {
            continue;
        }
        let ident: syn::Ident = attr.parse_args()?;
        if REPRS.iter().any(|r| ident == r) {
            return Ok(ident);
        }
        return Err(syn::Error::new_spanned(
            ident,
            "IntEnum supports #[repr(u8)], #[repr(i16)], #[repr(i32)] and #[repr(i64)]",
        ));
    }
    Err(syn::Error::new_spanned(
        &input.ident,
        "IntEnum requires a #[repr(...)] attribute",
    ))
}
