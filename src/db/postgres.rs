//! PostgreSQL agent over a sqlx pool.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Postgres, Row as _, Transaction};

use crate::config::DatabaseConfig;
use crate::db::{Batch, DatabaseAgent, Outcome, Row, Vendor};
use crate::error::DbError;
use crate::sql::{BindValue, Statement, StatementKind};

#[derive(Clone)]
pub struct PgAgent {
    pool: PgPool,
}

impl PgAgent {
    pub fn new(pool: PgPool) -> Self {
        PgAgent { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        tracing::info!(max_connections = config.max_connections, "connected to postgres");
        Ok(PgAgent { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseAgent for PgAgent {
    fn vendor(&self) -> Vendor {
        Vendor::Postgres
    }

    async fn execute(&self, statement: &Statement) -> Result<Outcome, DbError> {
        let mut conn = self.pool.acquire().await?;
        run_statement(&mut conn, statement).await
    }

    async fn lock(&self) -> Result<Box<dyn Batch>, DbError> {
        let tx = self.pool.begin().await?;
        tracing::debug!("transaction opened");
        Ok(Box::new(PgBatch {
            tx: Some(tx),
            queued: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Queued statements bound to one open transaction.
pub struct PgBatch {
    tx: Option<Transaction<'static, Postgres>>,
    queued: Vec<Statement>,
}

#[async_trait]
impl Batch for PgBatch {
    fn queue(&mut self, statement: Statement) {
        self.queued.push(statement);
    }

    async fn run(&mut self) -> Result<Vec<Outcome>, DbError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| DbError::Batch("transaction already closed".into()))?;
        let mut out = Vec::with_capacity(self.queued.len());
        for statement in self.queued.drain(..) {
            out.push(run_statement(&mut **tx, &statement).await?);
        }
        Ok(out)
    }

    async fn cancel(&mut self) {
        self.queued.clear();
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, "rollback failed");
            } else {
                tracing::debug!("transaction rolled back");
            }
        }
    }

    async fn unlock(&mut self) -> Result<(), DbError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            tracing::debug!("transaction committed");
        }
        Ok(())
    }
}

async fn run_statement(conn: &mut PgConnection, statement: &Statement) -> Result<Outcome, DbError> {
    tracing::debug!(sql = %statement.sql, params = ?statement.params, "query");
    let mut query = sqlx::query(&statement.sql);
    for p in &statement.params {
        query = query.bind(BindValue::from(p));
    }
    match statement.kind {
        StatementKind::Select => {
            let rows = query.fetch_all(&mut *conn).await?;
            let rows = rows.iter().map(json_row).collect::<Result<Vec<Row>, DbError>>()?;
            Ok(Outcome::Rows(rows))
        }
        StatementKind::Count => {
            let n: i64 = query.fetch_one(&mut *conn).await?.try_get(0)?;
            Ok(Outcome::Count(n.max(0) as u64))
        }
        StatementKind::Insert => {
            let id: Option<Value> = query.fetch_one(&mut *conn).await?.try_get(0)?;
            Ok(Outcome::Inserted(id.unwrap_or(Value::Null)))
        }
        StatementKind::Update | StatementKind::Delete => {
            let done = query.execute(&mut *conn).await?;
            Ok(Outcome::Affected(done.rows_affected()))
        }
    }
}

/// Selects project `row_to_json(t.*)`: the first column is the whole row in
/// table column order, converted by the server so no column type is dropped.
fn json_row(row: &PgRow) -> Result<Row, DbError> {
    match row.try_get::<Value, _>(0)? {
        Value::Object(fields) => Ok(fields),
        other => Err(DbError::Decode(format!("expected a json row, got {}", other))),
    }
}
