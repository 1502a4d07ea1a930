//! Active record: an ordered field bag bound to one row of one table.
//!
//! Mutating the bag never touches the database; `save` and `remove` do.
//! Every operation returns its failure and also keeps it on the record
//! until the next operation starts.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::StackConfig;
use crate::db::{DatabaseAgent, Outcome, Row};
use crate::error::{ConfigError, DbError};
use crate::sql::{self, Limit, Order, Statement};

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("static pattern")
    })
}

fn check_identifier(kind: &'static str, value: &str, allow_schema: bool) -> Result<(), ConfigError> {
    let ok = identifier_re().is_match(value) && (allow_schema || !value.contains('.'));
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

/// Result of a successful `save`.
#[derive(Clone, Debug, PartialEq)]
pub enum Saved {
    /// New row; carries the generated primary key.
    Inserted(Value),
    /// Existing row updated.
    Updated(u64),
    /// Update ran (or had nothing to set) and no row changed.
    Unchanged,
}

impl Saved {
    pub fn inserted_id(&self) -> Option<&Value> {
        match self {
            Saved::Inserted(id) => Some(id),
            _ => None,
        }
    }

    pub fn affected(&self) -> u64 {
        match self {
            Saved::Inserted(_) => 1,
            Saved::Updated(n) => *n,
            Saved::Unchanged => 0,
        }
    }
}

/// Arguments for [`Record::find_all`].
#[derive(Clone, Debug, Default)]
pub struct FindAll {
    filter: Option<String>,
    params: Vec<Value>,
    limit: Option<Limit>,
    order: Order,
}

impl FindAll {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw SQL condition, placed verbatim inside `WHERE (…)`.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn param(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }
}

pub struct Record {
    agent: Arc<dyn DatabaseAgent>,
    name: String,
    primary_key: String,
    fields: Map<String, Value>,
    use_transaction: bool,
    default_limit: u64,
    failure: Option<DbError>,
}

impl Record {
    /// Bind a new, empty record to `name` keyed by `primary_key`.
    /// `name` may be schema-qualified (`shop.book`).
    pub fn new(
        agent: Arc<dyn DatabaseAgent>,
        name: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let primary_key = primary_key.into();
        check_identifier("table", &name, true)?;
        check_identifier("primary key", &primary_key, false)?;
        Ok(Record {
            agent,
            name,
            primary_key,
            fields: Map::new(),
            use_transaction: false,
            default_limit: Limit::DEFAULT_COUNT,
            failure: None,
        })
    }

    pub fn from_config(
        agent: Arc<dyn DatabaseAgent>,
        name: impl Into<String>,
        primary_key: impl Into<String>,
        config: &StackConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(agent, name, primary_key)?
            .with_transaction(config.use_transaction)
            .with_default_limit(config.default_limit))
    }

    pub fn with_transaction(mut self, on: bool) -> Self {
        self.use_transaction = on;
        self
    }

    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn uses_transaction(&self) -> bool {
        self.use_transaction
    }

    pub fn set_transaction(&mut self, on: bool) {
        self.use_transaction = on;
    }

    // field bag

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field. New fields are appended, existing ones keep their position.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn unset(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Merge `fields` into the bag.
    pub fn load(&mut self, fields: Map<String, Value>) -> &mut Self {
        for (k, v) in fields {
            self.fields.insert(k, v);
        }
        self
    }

    /// Replace the whole bag.
    pub fn replace(&mut self, fields: Map<String, Value>) -> &mut Self {
        self.fields = fields;
        self
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Current primary key value; a JSON null counts as absent.
    pub fn primary_value(&self) -> Option<&Value> {
        self.fields.get(&self.primary_key).filter(|v| !v.is_null())
    }

    /// True until the record has a primary key value.
    pub fn is_new(&self) -> bool {
        self.primary_value().is_none()
    }

    // failure

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&DbError> {
        self.failure.as_ref()
    }

    pub fn take_failure(&mut self) -> Option<DbError> {
        self.failure.take()
    }

    fn capture<T>(&mut self, op: &'static str, result: Result<T, DbError>) -> Result<T, DbError> {
        if let Err(e) = &result {
            tracing::warn!(table = %self.name, op, error = %e, "record operation failed");
            self.failure = Some(e.clone());
        }
        result
    }

    // persistence

    /// Fetch one row by `key`, or by the current primary value when `None`.
    /// Without any key nothing is queried. The bag is not modified.
    pub async fn find(&mut self, key: Option<Value>) -> Result<Option<Row>, DbError> {
        self.failure = None;
        let Some(key) = key.filter(|k| !k.is_null()).or_else(|| self.primary_value().cloned()) else {
            return Ok(None);
        };
        let statement = sql::select_by_key(&|s: &str| self.agent.quote_ident(s), &self.name, &self.primary_key, &key);
        let result = self
            .agent
            .execute(&statement)
            .await
            .and_then(Outcome::into_rows)
            .map(|rows| rows.into_iter().next());
        self.capture("find", result)
    }

    /// Fetch a row by key and merge it into the bag. Returns whether a row was found.
    pub async fn fetch(&mut self, key: Option<Value>) -> Result<bool, DbError> {
        match self.find(key).await? {
            Some(row) => {
                self.load(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// List rows ordered by primary key, bounded by the query's limit or the
    /// record's default limit.
    pub async fn find_all(&mut self, query: FindAll) -> Result<Vec<Row>, DbError> {
        self.failure = None;
        let limit = query.limit.unwrap_or(Limit::Count(self.default_limit));
        let statement = sql::select_list(
            &|s: &str| self.agent.quote_ident(s),
            &self.name,
            &self.primary_key,
            query.filter.as_deref(),
            &query.params,
            limit,
            query.order,
        );
        let result = self.agent.execute(&statement).await.and_then(Outcome::into_rows);
        self.capture("find_all", result)
    }

    /// Insert when new, update by primary key otherwise. A successful insert
    /// stores the generated key in the bag.
    pub async fn save(&mut self) -> Result<Saved, DbError> {
        self.failure = None;
        let quote = |s: &str| self.agent.quote_ident(s);
        let result = match self.primary_value().cloned() {
            None => {
                let statement = sql::insert(&quote, &self.name, &self.primary_key, &self.fields);
                self.write(statement).await.and_then(Outcome::into_inserted).map(Saved::Inserted)
            }
            Some(key) => match sql::update(&quote, &self.name, &self.primary_key, &key, &self.fields) {
                None => Ok(Saved::Unchanged),
                Some(statement) => self.write(statement).await.and_then(Outcome::into_affected).map(|n| {
                    if n == 0 {
                        Saved::Unchanged
                    } else {
                        Saved::Updated(n)
                    }
                }),
            },
        };
        if let Ok(Saved::Inserted(id)) = &result {
            self.fields.insert(self.primary_key.clone(), id.clone());
        }
        self.capture("save", result)
    }

    /// Delete the row keyed by the current primary value. Returns `false`
    /// without touching the database when there is no primary value, and
    /// `false` when no row matched.
    pub async fn remove(&mut self) -> Result<bool, DbError> {
        self.failure = None;
        let Some(key) = self.primary_value().cloned() else {
            return Ok(false);
        };
        let statement = sql::delete(&|s: &str| self.agent.quote_ident(s), &self.name, &self.primary_key, &key);
        let result = self.write(statement).await.and_then(Outcome::into_affected).map(|n| n > 0);
        self.capture("remove", result)
    }

    pub async fn count(&mut self, filter: Option<&str>, params: Vec<Value>) -> Result<u64, DbError> {
        self.failure = None;
        let statement = sql::count(&|s: &str| self.agent.quote_ident(s), &self.name, filter, &params);
        let result = self.agent.execute(&statement).await.and_then(Outcome::into_count);
        self.capture("count", result)
    }

    /// Run a mutation, inside a single-statement batch when transactions are
    /// on. Once locked, the batch is always unlocked; a failed run is
    /// cancelled first and its error wins over any unlock error.
    async fn write(&self, statement: Statement) -> Result<Outcome, DbError> {
        if !self.use_transaction {
            return self.agent.execute(&statement).await;
        }
        let mut batch = self.agent.lock().await?;
        batch.queue(statement);
        let ran = batch.run().await;
        if ran.is_err() {
            tracing::warn!(table = %self.name, "cancelling batch");
            batch.cancel().await;
        }
        let unlocked = batch.unlock().await;
        let mut outcomes = ran?;
        unlocked?;
        outcomes
            .pop()
            .ok_or_else(|| DbError::Batch("batch produced no outcome".into()))
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .field("use_transaction", &self.use_transaction)
            .field("failure", &self.failure)
            .finish()
    }
}
