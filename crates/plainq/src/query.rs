//! Composable SQL fragments.
//!
//! A [`Query`] is SQL text written with `@name` placeholders plus the ordered list of
//! parameter bags those names are bound from.
//!
//! ```ignore
//! use plainq::{params, query};
//!
//! let mut q = query("SELECT * FROM Posts WHERE 1=1");
//! if let Some(from) = from {
//!     q.append_with(" AND CreationDate >= @from", params! { "from" => from });
//! }
//! let posts: Vec<Post> = q.to_list(&mut db).await?;
//! ```
//!
//! A sub-query shares its parent's bags, so its text can be embedded into the parent
//! and its parameters still bind when the parent runs:
//!
//! ```ignore
//! let mut q = Query::new();
//! let mut ids = q.sub_query();
//! ids.append_with("SELECT PostId FROM Comments WHERE Author = @author", params! { "author" => "ann" });
//! q.append(&format!("SELECT * FROM Posts WHERE PostId IN ({ids})"));
//! ```

mod exec;

use crate::bind::{self, Bound};
use crate::dialect::Dialect;
use crate::params::{Params, ToParams};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// SQL text plus shared parameter bags.
#[derive(Debug, Default)]
pub struct Query {
    text: String,
    bags: Arc<Mutex<Vec<Params>>>,
}

/// Start a query from literal text.
pub fn query(text: impl Into<String>) -> Query {
    Query {
        text: text.into(),
        bags: Arc::default(),
    }
}

/// Start a query from literal text and one parameter bag.
pub fn query_with(text: impl Into<String>, params: impl ToParams) -> Query {
    let q = query(text);
    q.push_bag(params.to_params());
    q
}

impl Query {
    /// An empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw SQL text.
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Append SQL text and register a parameter bag for it.
    pub fn append_with(&mut self, text: &str, params: impl ToParams) -> &mut Self {
        self.text.push_str(text);
        self.push_bag(params.to_params());
        self
    }

    /// Register a parameter bag without adding text.
    pub fn add_params(&mut self, params: impl ToParams) -> &mut Self {
        self.push_bag(params.to_params());
        self
    }

    /// A new query with empty text that shares this query's parameter bags.
    pub fn sub_query(&self) -> Query {
        Query {
            text: String::new(),
            bags: Arc::clone(&self.bags),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Snapshot of the parameter bags, in the order they were added.
    pub fn parameter_bags(&self) -> Vec<Params> {
        self.bags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Render the text for `dialect`, binding every known `@name`.
    pub fn bind(&self, dialect: &dyn Dialect) -> Bound {
        let bags = self.bags.lock().unwrap_or_else(PoisonError::into_inner);
        bind::bind(&self.text, &bags, dialect)
    }

    fn push_bag(&self, bag: Params) {
        self.bags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bag);
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        query(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        query(text)
    }
}
