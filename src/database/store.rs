use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::Filter;

/// The document collections of the shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Categories,
    Products,
    Orders,
    OrderItems,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Categories => "categories",
            Collection::Products => "products",
            Collection::Orders => "orders",
            Collection::OrderItems => "order_items",
        }
    }

    /// Body fields whose (case-insensitive) string value is unique within the collection
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["email"],
            _ => &[],
        }
    }
}

/// One mutation inside an atomic batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    Insert { collection: Collection, id: Uuid, body: Value },
    Replace { collection: Collection, id: Uuid, body: Value },
    Delete { collection: Collection, id: Uuid },
}

/// Persistence backend holding JSON documents keyed by (collection, id).
///
/// Reads see committed state only. [`DocumentStore::apply`] is atomic: either
/// every operation of the batch is committed or none is.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, DatabaseError>;

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, DatabaseError>;

    /// Number of matching documents; the filter's limit is ignored
    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, DatabaseError>;

    /// Returns, per operation, whether it touched a document. Inserts always
    /// do; replace and delete report `false` for a missing id. A duplicate
    /// id or unique field fails the whole batch with `Conflict`.
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<Vec<bool>, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}
