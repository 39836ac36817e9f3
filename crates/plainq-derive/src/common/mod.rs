//! Common utilities shared across macro modules.
//!
//! Attribute parsing and the record field list used by `FromRow`, `ToParams` and `Model`.

pub mod attrs;

use attrs::{FieldAttrs, StructAttrs};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Result};

/// One named field of a record struct.
pub struct RecordField {
    pub ident: syn::Ident,
    pub ty: syn::Type,
    /// Column / parameter name.
    pub column: String,
    pub read_only: bool,
}

/// Named fields of `input`, with column names resolved.
pub fn record_fields(input: &DeriveInput, derive: &str) -> Result<Vec<RecordField>> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            format!("{derive} cannot be derived for generic types"),
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    format!("{derive} can only be derived for structs with named fields"),
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs"),
            ));
        }
    };

    let struct_attrs = StructAttrs::parse(input)?;
    fields
        .iter()
        .map(|field| {
            let attrs = FieldAttrs::parse(field)?;
            let Some(ident) = field.ident.clone() else {
                return Err(syn::Error::new_spanned(field, "expected a named field"));
            };
            let column = match attrs.column {
                Some(column) => column,
                None => struct_attrs.rename(&ident.unraw().to_string()),
            };
            Ok(RecordField {
                ident,
                ty: field.ty.clone(),
                column,
                read_only: attrs.read_only,
            })
        })
        .collect()
}
