use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::store::{Collection, DocumentStore, WriteOp};
use crate::filter::{Filter, FilterOp};

const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        seq         BIGSERIAL,
        collection  TEXT        NOT NULL,
        id          UUID        NOT NULL,
        body        JSONB       NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS documents_collection_seq_idx ON documents (collection, seq)",
    "CREATE UNIQUE INDEX IF NOT EXISTS documents_users_email_key \
     ON documents (lower(body ->> 'email')) WHERE collection = 'users'",
];

/// Documents stored as JSONB rows of a single `documents` table
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(url: &str, max_connections: u32, timeout_secs: u64) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(timeout_secs))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn select<'a>(columns: &str, collection: Collection, filter: &'a Filter) -> QueryBuilder<'a, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM documents WHERE collection = ", columns));
        qb.push_bind(collection.as_str());

        for condition in &filter.conditions {
            match &condition.op {
                FilterOp::Eq(value) => {
                    qb.push(" AND body -> ");
                    qb.push_bind(condition.field.as_str());
                    qb.push("::text = ");
                    qb.push_bind(value.clone());
                }
                FilterOp::In(values) => {
                    qb.push(" AND ");
                    qb.push_bind(Value::Array(values.clone()));
                    qb.push(" @> jsonb_build_array(body -> ");
                    qb.push_bind(condition.field.as_str());
                    qb.push("::text)");
                }
            }
        }
        qb
    }
}

fn map_write_error(err: sqlx::Error, collection: Collection) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            DatabaseError::Conflict(format!("duplicate document in {}", collection.as_str()))
        }
        _ => DatabaseError::Sqlx(err),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Value>, DatabaseError> {
        let mut qb = Self::select("body", collection, filter);
        qb.push(" ORDER BY seq ");
        qb.push(filter.sort.to_sql());
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("body").map_err(DatabaseError::from))
            .collect()
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, DatabaseError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get::<Value, _>("body"))
            .transpose()
            .map_err(DatabaseError::from)
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, DatabaseError> {
        let mut qb = Self::select("COUNT(*) AS total", collection, filter);
        let row = qb.build().fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> Result<Vec<bool>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(ops.len());

        for op in ops {
            let touched = match op {
                WriteOp::Insert { collection, id, body } => {
                    sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
                        .bind(collection.as_str())
                        .bind(id)
                        .bind(body)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_write_error(e, collection))?;
                    true
                }
                WriteOp::Replace { collection, id, body } => {
                    let done = sqlx::query(
                        "UPDATE documents SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2",
                    )
                    .bind(collection.as_str())
                    .bind(id)
                    .bind(body)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_write_error(e, collection))?;
                    done.rows_affected() > 0
                }
                WriteOp::Delete { collection, id } => {
                    let done = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(collection.as_str())
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    done.rows_affected() > 0
                }
            };
            results.push(touched);
        }

        // Dropping the transaction on an early return rolls it back
        tx.commit().await?;
        Ok(results)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
