//! Database collaborator: the interface records talk to, and its PostgreSQL agent.

mod postgres;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::DatabaseConfig;
use crate::error::{ConfigError, DbError};
use crate::sql::Statement;

pub use postgres::{PgAgent, PgBatch};

/// A result row as an ordered field → value map.
pub type Row = Map<String, Value>;

/// Database vendor, taken from the connection URL scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vendor {
    Postgres,
    Mysql,
    Sqlite,
}

impl Vendor {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let scheme = url
            .split_once("://")
            .map(|(s, _)| s)
            .or_else(|| url.split_once(':').map(|(s, _)| s))
            .ok_or_else(|| ConfigError::Load(format!("database url has no scheme: {}", url)))?;
        scheme.parse()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Postgres => "postgres",
            Vendor::Mysql => "mysql",
            Vendor::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Vendor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pgsql" => Ok(Vendor::Postgres),
            "mysql" | "mariadb" => Ok(Vendor::Mysql),
            "sqlite" => Ok(Vendor::Sqlite),
            other => Err(ConfigError::UnsupportedVendor(other.to_string())),
        }
    }
}

/// What executing one statement produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Rows(Vec<Row>),
    Count(u64),
    Inserted(Value),
    Affected(u64),
}

impl Outcome {
    pub fn into_rows(self) -> Result<Vec<Row>, DbError> {
        match self {
            Outcome::Rows(rows) => Ok(rows),
            other => Err(unexpected("rows", &other)),
        }
    }

    pub fn into_count(self) -> Result<u64, DbError> {
        match self {
            Outcome::Count(n) => Ok(n),
            other => Err(unexpected("count", &other)),
        }
    }

    pub fn into_inserted(self) -> Result<Value, DbError> {
        match self {
            Outcome::Inserted(id) => Ok(id),
            other => Err(unexpected("inserted id", &other)),
        }
    }

    pub fn into_affected(self) -> Result<u64, DbError> {
        match self {
            Outcome::Affected(n) => Ok(n),
            other => Err(unexpected("affected rows", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &Outcome) -> DbError {
    DbError::Decode(format!("expected {}, got {:?}", wanted, got))
}

/// The database a record is bound to. Implementations execute statements
/// built by [`crate::sql`] and hand out transaction batches.
#[async_trait]
pub trait DatabaseAgent: Send + Sync {
    fn vendor(&self) -> Vendor;

    fn quote_ident(&self, ident: &str) -> String {
        crate::sql::quote_ident(ident)
    }

    /// Execute one statement outside any explicit transaction.
    async fn execute(&self, statement: &Statement) -> Result<Outcome, DbError>;

    /// Open a transaction (autocommit off) and return a batch bound to it.
    async fn lock(&self) -> Result<Box<dyn Batch>, DbError>;

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> Result<(), DbError>;
}

/// Statements queued under one transaction.
///
/// `unlock` must be called on every path once `lock` succeeded; after
/// `cancel` it only releases the batch.
#[async_trait]
pub trait Batch: Send {
    fn queue(&mut self, statement: Statement);

    /// Execute every queued statement in order inside the transaction.
    async fn run(&mut self) -> Result<Vec<Outcome>, DbError>;

    /// Roll the transaction back. Calling it twice is a no-op.
    async fn cancel(&mut self);

    /// Commit whatever is still open and release the transaction.
    async fn unlock(&mut self) -> Result<(), DbError>;
}

/// Build the agent for the configured vendor. Only PostgreSQL has one; the
/// other vendors are a deployment error.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DatabaseAgent>, crate::error::AppError> {
    match Vendor::from_url(&config.url)? {
        Vendor::Postgres => {
            let agent = PgAgent::connect(config).await?;
            Ok(Arc::new(agent))
        }
        other => Err(ConfigError::UnsupportedVendor(other.as_str().to_string()).into()),
    }
}
