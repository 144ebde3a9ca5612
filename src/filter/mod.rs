//! Document filters shared by every store implementation.
//!
//! A [`Filter`] is a conjunction of field conditions over a document's JSON
//! body plus an optional insertion-order sort and result limit.

use serde_json::Value;

mod matcher;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Field equals the value
    Eq(Value),
    /// Field equals any of the values
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub field: String,
    pub op: FilterOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Oldest document first (insertion order)
    #[default]
    Asc,
    /// Newest document first
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<FilterWhereInfo>,
    pub sort: SortDirection,
    pub limit: Option<u32>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(FilterWhereInfo {
            field: field.into(),
            op: FilterOp::Eq(value.into()),
        });
        self
    }

    pub fn within<V: Into<Value>>(mut self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.conditions.push(FilterWhereInfo {
            field: field.into(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.sort = SortDirection::Desc;
        self
    }

    /// `0` means no limit
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|condition| matcher::matches(condition, document))
    }
}
