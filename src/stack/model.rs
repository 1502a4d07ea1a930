//! Typed models: a table and primary key bound to the record stack.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::StackConfig;
use crate::db::DatabaseAgent;
use crate::error::ConfigError;
use crate::stack::Record;

/// Application model. Implement it on a marker type per table:
///
/// ```rust,ignore
/// struct Book;
/// impl Model for Book {
///     const NAME: &'static str = "book";
///     const PRIMARY_KEY: &'static str = "id";
/// }
/// let mut book = Book::record(agent)?;
/// book.set("title", "Dune");
/// book.save().await?;
/// ```
pub trait Model {
    const NAME: &'static str;
    const PRIMARY_KEY: &'static str;
    const USE_TRANSACTION: bool = false;

    /// An empty record for this model.
    fn record(agent: Arc<dyn DatabaseAgent>) -> Result<Record, ConfigError> {
        Ok(Record::new(agent, Self::NAME, Self::PRIMARY_KEY)?.with_transaction(Self::USE_TRANSACTION))
    }

    /// Like [`Model::record`], with limits from `config`. Transactions are on
    /// when either the model or the config asks for them.
    fn record_with(agent: Arc<dyn DatabaseAgent>, config: &StackConfig) -> Result<Record, ConfigError> {
        Ok(Record::from_config(agent, Self::NAME, Self::PRIMARY_KEY, config)?
            .with_transaction(Self::USE_TRANSACTION || config.use_transaction))
    }

    /// A record pre-filled with `fields`.
    fn with_fields(agent: Arc<dyn DatabaseAgent>, fields: Map<String, Value>) -> Result<Record, ConfigError> {
        let mut record = Self::record(agent)?;
        record.load(fields);
        Ok(record)
    }
}
