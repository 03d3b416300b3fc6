use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Condition, Document, DocumentQuery, DocumentStoreError, Result, SortOrder, Version,
    store::{DocumentStore, Precondition, WriteBatch, WriteOp, validate_batch},
};

const COLUMNS: &str = "collection, id, version, seq, created_at, updated_at, body";

/// PostgreSQL-backed document store.
///
/// Documents live in a single `documents` table keyed by
/// `(collection, id)` with a JSONB body. Batches run in one transaction;
/// rows touched by a conditional write are locked with `FOR UPDATE`, so a
/// precondition always sees the latest committed state.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            collection: row.try_get("collection")?,
            id: row.try_get("id")?,
            version: Version::new(row.try_get("version")?),
            seq: row.try_get("seq")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            body: row.try_get("body")?,
        })
    }

    async fn lock_for_write(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: Uuid,
        precondition: &Precondition,
    ) -> Result<Document> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            return Err(DocumentStoreError::NotFound {
                collection: collection.to_string(),
                id,
            });
        };
        let current = Self::row_to_document(row)?;
        precondition
            .check(&current)
            .map_err(|reason| DocumentStoreError::PreconditionFailed {
                collection: collection.to_string(),
                id,
                reason,
            })?;
        Ok(current)
    }
}

/// A bound parameter of a dynamically built query.
enum Bind {
    Text(String),
    Json(Value),
    Float(f64),
    Int(i64),
}

/// Translates a query into SQL with numbered parameters.
struct SqlBuilder {
    sql: String,
    binds: Vec<Bind>,
}

impl SqlBuilder {
    fn new(base: String) -> Self {
        Self {
            sql: base,
            binds: Vec::new(),
        }
    }

    fn param(&mut self, bind: Bind) -> String {
        self.binds.push(bind);
        format!("${}", self.binds.len())
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Eq { field, value } => {
                let f = self.param(Bind::Text(field.clone()));
                let v = self.param(Bind::Json(value.clone()));
                format!("body -> {f} = {v}")
            }
            Condition::OneOf { field, values } => {
                let f = self.param(Bind::Text(field.clone()));
                let v = self.param(Bind::Json(Value::Array(values.clone())));
                format!("COALESCE({v} @> jsonb_build_array(body -> {f}), FALSE)")
            }
            Condition::Gte { field, bound } => self.numeric(field, ">=", *bound),
            Condition::Lte { field, bound } => self.numeric(field, "<=", *bound),
            Condition::Contains { field, needle } => {
                let f = self.param(Bind::Text(field.clone()));
                let pattern = format!("%{}%", escape_like(needle));
                let v = self.param(Bind::Text(pattern));
                format!("COALESCE(body ->> {f} ILIKE {v}, FALSE)")
            }
            Condition::Any(conditions) if conditions.is_empty() => "FALSE".to_string(),
            Condition::Any(conditions) => {
                let parts: Vec<String> = conditions.iter().map(|c| self.condition(c)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }

    fn numeric(&mut self, field: &str, op: &str, bound: f64) -> String {
        let f = self.param(Bind::Text(field.to_string()));
        let v = self.param(Bind::Float(bound));
        format!(
            "(CASE WHEN jsonb_typeof(body -> {f}) = 'number' THEN (body ->> {f})::float8 {op} {v} ELSE FALSE END)"
        )
    }

    fn build(mut self, query: &DocumentQuery) -> Self {
        let collection = self.param(Bind::Text(query.collection.clone()));
        self.sql.push_str(&format!(" WHERE collection = {collection}"));

        for condition in &query.conditions {
            let clause = self.condition(condition);
            self.sql.push_str(&format!(" AND {clause}"));
        }

        match &query.sort {
            SortOrder::Inserted => self.sql.push_str(" ORDER BY seq ASC"),
            SortOrder::InsertedDesc => self.sql.push_str(" ORDER BY seq DESC"),
            SortOrder::Field { field, descending } => {
                let f = self.param(Bind::Text(field.clone()));
                let direction = if *descending { "DESC" } else { "ASC" };
                self.sql.push_str(&format!(
                    " ORDER BY NULLIF(body -> {f}, 'null'::jsonb) {direction} NULLS LAST, seq ASC"
                ));
            }
        }

        if let Some(limit) = query.limit {
            let p = self.param(Bind::Int(limit as i64));
            self.sql.push_str(&format!(" LIMIT {p}"));
        }
        if let Some(offset) = query.offset {
            let p = self.param(Bind::Int(offset as i64));
            self.sql.push_str(&format!(" OFFSET {p}"));
        }
        self
    }
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM documents WHERE collection = $1 AND id = $2"
        ))
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let builder = SqlBuilder::new(format!("SELECT {COLUMNS} FROM documents")).build(&query);

        let mut sqlx_query = sqlx::query(&builder.sql);
        for bind in builder.binds {
            sqlx_query = match bind {
                Bind::Text(v) => sqlx_query.bind(v),
                Bind::Json(v) => sqlx_query.bind(v),
                Bind::Float(v) => sqlx_query.bind(v),
                Bind::Int(v) => sqlx_query.bind(v),
            };
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<Document>> {
        validate_batch(&batch)?;

        let mut tx = self.pool.begin().await?;
        let mut written = Vec::new();

        for op in batch.into_ops() {
            match op {
                WriteOp::Insert {
                    collection,
                    id,
                    body,
                } => {
                    let row = sqlx::query(&format!(
                        r#"
                        INSERT INTO documents (collection, id, version, body)
                        VALUES ($1, $2, 1, $3)
                        ON CONFLICT (collection, id) DO NOTHING
                        RETURNING {COLUMNS}
                        "#
                    ))
                    .bind(&collection)
                    .bind(id)
                    .bind(&body)
                    .fetch_optional(&mut *tx)
                    .await?;

                    match row {
                        Some(row) => written.push(Self::row_to_document(row)?),
                        None => {
                            return Err(DocumentStoreError::AlreadyExists { collection, id });
                        }
                    }
                }
                WriteOp::Patch {
                    collection,
                    id,
                    patch,
                    precondition,
                } => {
                    Self::lock_for_write(&mut tx, &collection, id, &precondition).await?;

                    let row = sqlx::query(&format!(
                        r#"
                        UPDATE documents
                        SET body = body || $3, version = version + 1, updated_at = NOW()
                        WHERE collection = $1 AND id = $2
                        RETURNING {COLUMNS}
                        "#
                    ))
                    .bind(&collection)
                    .bind(id)
                    .bind(Value::Object(patch))
                    .fetch_one(&mut *tx)
                    .await?;

                    written.push(Self::row_to_document(row)?);
                }
                WriteOp::Delete {
                    collection,
                    id,
                    precondition,
                } => {
                    Self::lock_for_write(&mut tx, &collection, id, &precondition).await?;

                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(&collection)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                WriteOp::Check {
                    collection,
                    id,
                    precondition,
                } => {
                    Self::lock_for_write(&mut tx, &collection, id, &precondition).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(written)
    }
}
