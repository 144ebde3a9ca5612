use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{Collection, DocumentStore, WriteOp};
use crate::filter::Filter;

/// A typed document living in one collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    /// Human readable name used in not-found messages
    const LABEL: &'static str;

    fn id(&self) -> Uuid;
}

/// Typed access to the documents of `T::COLLECTION`
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter: &Filter) -> Result<Vec<T>, DatabaseError> {
        self.store
            .find(T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(|body| serde_json::from_value(body).map_err(DatabaseError::from))
            .collect()
    }

    pub async fn select_one(&self, filter: Filter) -> Result<Option<T>, DatabaseError> {
        Ok(self.select_any(&filter.limit(1)).await?.into_iter().next())
    }

    pub async fn select_id(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        self.store
            .find_by_id(T::COLLECTION, id)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(DatabaseError::from)
    }

    pub async fn select_404(&self, id: Uuid) -> Result<T, DatabaseError> {
        self.select_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("The {} with the given ID was not found", T::LABEL)))
    }

    /// Documents for `ids` that exist, in no particular order
    pub async fn select_ids(&self, ids: &[Uuid]) -> Result<Vec<T>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let filter = Filter::new().within("id", ids.iter().map(|id| id.to_string()));
        self.select_any(&filter).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, DatabaseError> {
        self.store.count(T::COLLECTION, filter).await
    }

    pub async fn insert(&self, document: &T) -> Result<(), DatabaseError> {
        self.store.apply(vec![Self::insert_op(document)?]).await?;
        Ok(())
    }

    /// Replace the stored document; `false` when it no longer exists
    pub async fn update(&self, document: &T) -> Result<bool, DatabaseError> {
        let op = WriteOp::Replace {
            collection: T::COLLECTION,
            id: document.id(),
            body: serde_json::to_value(document)?,
        };
        Ok(self.store.apply(vec![op]).await?.first().copied().unwrap_or(false))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self
            .store
            .apply(vec![Self::delete_op(id)])
            .await?
            .first()
            .copied()
            .unwrap_or(false))
    }

    pub fn insert_op(document: &T) -> Result<WriteOp, DatabaseError> {
        Ok(WriteOp::Insert {
            collection: T::COLLECTION,
            id: document.id(),
            body: serde_json::to_value(document)?,
        })
    }

    pub fn delete_op(id: Uuid) -> WriteOp {
        WriteOp::Delete {
            collection: T::COLLECTION,
            id,
        }
    }
}
