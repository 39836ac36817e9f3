//! FromRow derive macro implementation

use crate::common::record_fields;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let fields = record_fields(&input, "FromRow")?;
    let name = &input.ident;

    let shape_fields = fields.iter().map(|field| {
        let column = &field.column;
        let ty = &field.ty;
        let read_only = field.read_only.then(|| quote!(.read_only()));
        quote! {
            ::plainq::Field::new(#column, <#ty as ::plainq::FromValue>::FIELD_TYPE)#read_only
        }
    });

    let field_extracts = fields.iter().enumerate().map(|(idx, field)| {
        let ident = &field.ident;
        let column = &field.column;
        quote! {
            #ident: slots.decode(row, #idx, #column)?
        }
    });

    Ok(quote! {
        impl ::plainq::FromRow for #name {
            fn shape() -> ::plainq::Shape {
                static FIELDS: &[::plainq::Field] = &[#(#shape_fields),*];
                ::plainq::Shape::record::<Self>(FIELDS)
            }

            fn from_row(
                row: &::plainq::Row,
                slots: &::plainq::FieldSlots,
            ) -> ::plainq::DbResult<Self> {
                Ok(Self {
                    #(#field_extracts),*
                })
            }
        }
    })
}
