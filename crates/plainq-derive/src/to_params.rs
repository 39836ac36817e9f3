//! ToParams derive macro implementation

use crate::common::record_fields;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let fields = record_fields(&input, "ToParams")?;
    let name = &input.ident;

    let pushes = fields.iter().map(|field| {
        let ident = &field.ident;
        let column = &field.column;
        quote! {
            bag.push(#column, &self.#ident);
        }
    });

    Ok(quote! {
        impl ::plainq::ToParams for #name {
            fn to_params(&self) -> ::plainq::Params {
                let mut bag = ::plainq::Params::new();
                #(#pushes)*
                bag
            }
        }
    })
}
