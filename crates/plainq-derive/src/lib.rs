//! Derive macros for plainq
//!
//! Provides `#[derive(FromRow)]`, `#[derive(ToParams)]`, `#[derive(Model)]` and
//! `#[derive(IntEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod from_row;
mod int_enum;
mod model;
mod to_params;

/// Derive `FromRow` for a struct.
///
/// # Example
///
/// ```ignore
/// use plainq::FromRow;
///
/// #[derive(FromRow)]
/// #[orm(rename_all = "PascalCase")]
/// struct Post {
///     post_id: i32,
///     text: Option<String>,
///     #[orm(column = "CreationDate")]
///     created: chrono::NaiveDateTime,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(rename_all = "...")]` - `PascalCase`, `camelCase`, `snake_case` or
///   `SCREAMING_SNAKE_CASE` column names for fields without `column`
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(read_only)]` - Never written by generated INSERT/UPDATE
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `ToParams`: every field becomes a parameter named after its column.
#[proc_macro_derive(ToParams, attributes(orm))]
pub fn derive_to_params(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    to_params::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Model` (plus `FromRow` and `ToParams`) for a struct stored in one table.
///
/// # Example
///
/// ```ignore
/// use plainq::Model;
///
/// #[derive(Model)]
/// #[orm(table = "Posts", schema = "dbo")]
/// struct Post {
///     #[orm(column = "PostId")]
///     id: i32,
///     #[orm(column = "Text")]
///     text: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table name, quoted per dialect; defaults to the type name
///   with an `s` appended, used verbatim
/// - `#[orm(schema = "name")]` - Schema of the declared table
/// - Field attributes as for `FromRow`
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `ToValue`, `FromValue` and `FromRow` for a fieldless enum stored as its
/// `#[repr]` integer.
///
/// # Example
///
/// ```ignore
/// #[derive(plainq::IntEnum)]
/// #[repr(i32)]
/// enum Status {
///     Draft = 0,
///     Published = 1,
/// }
/// ```
#[proc_macro_derive(IntEnum)]
pub fn derive_int_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    int_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
