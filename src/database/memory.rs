//! In-process document store used for `memory://` and by the test suites.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{Collection, DocumentStore, WriteOp};
use crate::filter::{Filter, SortDirection};

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    id: Uuid,
    body: Value,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_seq: u64,
    collections: HashMap<Collection, Vec<StoredDocument>>,
}

impl MemoryState {
    fn documents(&self, collection: Collection) -> &[StoredDocument] {
        self.collections.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    fn apply(&mut self, op: WriteOp) -> Result<bool, DatabaseError> {
        match op {
            WriteOp::Insert { collection, id, body } => {
                if self.documents(collection).iter().any(|d| d.id == id) {
                    return Err(DatabaseError::Conflict(format!(
                        "document {} already exists in {}",
                        id,
                        collection.as_str()
                    )));
                }
                self.check_unique(collection, id, &body)?;
                self.next_seq += 1;
                let seq = self.next_seq;
                self.collections
                    .entry(collection)
                    .or_default()
                    .push(StoredDocument { seq, id, body });
                Ok(true)
            }
            WriteOp::Replace { collection, id, body } => {
                if !self.documents(collection).iter().any(|d| d.id == id) {
                    return Ok(false);
                }
                self.check_unique(collection, id, &body)?;
                if let Some(doc) = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                {
                    doc.body = body;
                }
                Ok(true)
            }
            WriteOp::Delete { collection, id } => {
                let Some(docs) = self.collections.get_mut(&collection) else {
                    return Ok(false);
                };
                let before = docs.len();
                docs.retain(|d| d.id != id);
                Ok(docs.len() != before)
            }
        }
    }

    fn check_unique(&self, collection: Collection, id: Uuid, body: &Value) -> Result<(), DatabaseError> {
        for field in collection.unique_fields() {
            let Some(candidate) = body.get(*field).and_then(Value::as_str) else {
                continue;
            };
            let taken = self.documents(collection).iter().any(|d| {
                d.id != id
                    && d.body
                        .get(*field)
                        .and_then(Value::as_str)
                        .is_some_and(|existing| existing.eq_ignore_ascii_case(candidate))
            });
            if taken {
                return Err(DatabaseError::Conflict(format!(
                    "{} '{}' already exists in {}",
                    field,
                    candidate,
                    collection.as_str()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: RwLock<MemoryState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, DatabaseError> {
        let state = self.state.read().await;
        let mut matched: Vec<&StoredDocument> = state
            .documents(collection)
            .iter()
            .filter(|d| filter.matches(&d.body))
            .collect();

        matched.sort_by_key(|d| d.seq);
        if filter.sort == SortDirection::Desc {
            matched.reverse();
        }
        if let Some(limit) = filter.limit {
            matched.truncate(limit as usize);
        }

        Ok(matched.into_iter().map(|d| d.body.clone()).collect())
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .documents(collection)
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.body.clone()))
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .documents(collection)
            .iter()
            .filter(|d| filter.matches(&d.body))
            .count() as u64)
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> Result<Vec<bool>, DatabaseError> {
        let mut state = self.state.write().await;

        // Stage on a copy so a failing operation leaves nothing behind
        let mut staged = state.clone();
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            results.push(staged.apply(op)?);
        }

        *state = staged;
        Ok(results)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
