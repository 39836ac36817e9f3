//! Named parameter bags.
//!
//! A [`Params`] bag maps `@name` placeholders to values. A [`Query`](crate::Query)
//! accumulates bags in the order they are appended; names are resolved against the
//! bags when the statement is executed.

use crate::value::{ToValue, Value};
use std::borrow::Cow;

/// An unordered set of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(Cow<'static, str>, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named value.
    pub fn push(&mut self, name: impl Into<Cow<'static, str>>, value: impl ToValue) -> &mut Self {
        self.push_value(name, value.to_value())
    }

    /// Add (or replace) an already converted value.
    pub fn push_value(&mut self, name: impl Into<Cow<'static, str>>, value: Value) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Chainable form of [`Params::push`].
    pub fn with(mut self, name: impl Into<Cow<'static, str>>, value: impl ToValue) -> Self {
        self.push(name, value);
        self
    }

    /// Look up a name; exact match first, then ASCII case-insensitive.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.entries.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_ref(), v))
    }
}

/// Types whose fields can be bound as one parameter bag.
///
/// Derived with `#[derive(ToParams)]` for records; each field becomes `@field`.
pub trait ToParams {
    fn to_params(&self) -> Params;
}

impl ToParams for Params {
    fn to_params(&self) -> Params {
        self.clone()
    }
}

impl<T: ToParams + ?Sized> ToParams for &T {
    fn to_params(&self) -> Params {
        (**self).to_params()
    }
}

/// Build a [`Params`] bag inline.
///
/// ```ignore
/// let q = plainq::query_with(
///     "SELECT * FROM posts WHERE creation_date >= @from",
///     plainq::params! { "from" => from },
/// );
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut bag = $crate::Params::new();
        $( bag.push($name, $value); )+
        bag
    }};
}
