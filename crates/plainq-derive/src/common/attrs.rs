//! Parsing of struct-level and field-level `#[orm(...)]` attributes.

use heck::{ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use syn::punctuated::Punctuated;
use syn::{Attribute, DeriveInput, Expr, ExprLit, Lit, Meta, Result};

/// `#[orm(table = "...", schema = "...", rename_all = "...")]`
#[derive(Default)]
pub struct StructAttrs {
    pub table: Option<String>,
    pub schema: Option<String>,
    pub rename_all: Option<RenameRule>,
}

/// `#[orm(column = "...", read_only)]`
#[derive(Default)]
pub struct FieldAttrs {
    pub column: Option<String>,
    pub read_only: bool,
}

#[derive(Clone, Copy)]
pub enum RenameRule {
    PascalCase,
    CamelCase,
    SnakeCase,
    ScreamingSnakeCase,
}

impl RenameRule {
    fn apply(self, name: &str) -> String {
        match self {
            RenameRule::PascalCase => name.to_upper_camel_case(),
            RenameRule::CamelCase => name.to_lower_camel_case(),
            RenameRule::SnakeCase => name.to_snake_case(),
            RenameRule::ScreamingSnakeCase => name.to_shouty_snake_case(),
        }
    }
}

impl StructAttrs {
    pub fn parse(input: &DeriveInput) -> Result<Self> {
        let mut attrs = StructAttrs::default();
        for meta in orm_metas(&input.attrs)? {
            let Meta::NameValue(nv) = &meta else {
                return Err(syn::Error::new_spanned(meta, "unknown orm attribute"));
            };
            let value = string_value(&nv.value)?;
            if nv.path.is_ident("table") {
                attrs.table = Some(value.value());
            } else if nv.path.is_ident("schema") {
                attrs.schema = Some(value.value());
            } else if nv.path.is_ident("rename_all") {
                attrs.rename_all = Some(match value.value().as_str() {
                    "PascalCase" => RenameRule::PascalCase,
                    "camelCase" => RenameRule::CamelCase,
                    "snake_case" => RenameRule::SnakeCase,
                    "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnakeCase,
                    _ => {
                        return Err(syn::Error::new_spanned(
                            value,
                            "rename_all expects \"PascalCase\", \"camelCase\", \"snake_case\" or \"SCREAMING_SNAKE_CASE\"",
                        ));
                    }
                });
            } else {
                return Err(syn::Error::new_spanned(&nv.path, "unknown orm attribute"));
            }
        }
        if attrs.schema.is_some() && attrs.table.is_none() {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "orm(schema = \"...\") requires orm(table = \"...\")",
            ));
        }
        Ok(attrs)
    }

    /// Column name of a field without `#[orm(column)]`.
    pub fn rename(&self, field: &str) -> String {
        match self.rename_all {
            Some(rule) => rule.apply(field),
            None => field.to_string(),
        }
    }
}

impl FieldAttrs {
    pub fn parse(field: &syn::Field) -> Result<Self> {
        let mut attrs = FieldAttrs::default();
        for meta in orm_metas(&field.attrs)? {
            match &meta {
                Meta::Path(path) if path.is_ident("read_only") => attrs.read_only = true,
                Meta::NameValue(nv) if nv.path.is_ident("column") => {
                    attrs.column = Some(string_value(&nv.value)?.value());
                }
                _ => return Err(syn::Error::new_spanned(meta, "unknown orm attribute")),
            }
        }
        Ok(attrs)
    }
}

fn orm_metas(attrs: &[Attribute]) -> Result<Vec<Meta>> {
    let mut metas = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested = attr.parse_args_with(Punctuated::<Meta, syn::Token![,]>::parse_terminated)?;
        metas.extend(nested);
    }
    Ok(metas)
}

fn string_value(expr: &Expr) -> Result<&syn::LitStr> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}
