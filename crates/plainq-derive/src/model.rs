//! Model derive macro implementation.
//!
//! A model is a record stored in one table, so the derive also emits `FromRow` and
//! `ToParams`.

use crate::common::attrs::StructAttrs;
use crate::{from_row, to_params};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let attrs = StructAttrs::parse(&input)?;
    let name = &input.ident;

    let table = match (&attrs.table, &attrs.schema) {
        (Some(table), Some(schema)) => quote! {
            ::plainq::TableName::Declared {
                schema: ::std::option::Option::Some(#schema),
                name: #table,
            }
        },
        (Some(table), None) => quote! {
            ::plainq::TableName::Declared {
                schema: ::std::option::Option::None,
                name: #table,
            }
        },
        (None, _) => {
            let default = format!("{name}s");
            quote!(::plainq::TableName::Default(#default))
        }
    };

    let from_row = from_row::expand(input.clone())?;
    let to_params = to_params::expand(input.clone())?;

    Ok(quote! {
        #from_row
        #to_params

        impl ::plainq::Model for #name {
            fn table() -> ::plainq::TableName {
                #table
            }
        }
    })
}
