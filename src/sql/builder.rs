//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE for a record's table.
//!
//! Identifiers go through the caller's quoting (the agent's `quote_ident`,
//! or [`quote_ident`] for PostgreSQL); values always travel as
//! positional parameters (`$1`, `$2`, …). Record fields and primary keys
//! are bound as one jsonb object and typed by the table's row type on the
//! server; rows come back as `json` objects. Caller-supplied filters are
//! concatenated verbatim and their parameters bound first, so a filter
//! written as `"author = $1"` lines up with its first parameter.

use serde_json::{Map, Value};

use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

/// A single SQL statement with its bound parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(kind: StatementKind) -> Self {
        Statement {
            kind,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Row bound for list queries: a row count, or an offset/count pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    Range { offset: u64, count: u64 },
}

impl Limit {
    pub const DEFAULT_COUNT: u64 = 10;

    pub fn count(&self) -> u64 {
        match self {
            Limit::Count(n) => *n,
            Limit::Range { count, .. } => *count,
        }
    }

    pub fn offset(&self) -> u64 {
        match self {
            Limit::Count(_) => 0,
            Limit::Range { offset, .. } => *offset,
        }
    }
}

impl Default for Limit {
    fn default() -> Self {
        Limit::Count(Self::DEFAULT_COUNT)
    }
}

impl From<u64> for Limit {
    fn from(n: u64) -> Self {
        Limit::Count(n)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::Range { offset, count }
    }
}

/// Ordering by primary key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// `1` ascending, `-1` descending.
impl TryFrom<i64> for Order {
    type Error = ConfigError;

    fn try_from(flag: i64) -> Result<Self, Self::Error> {
        match flag {
            1 => Ok(Order::Asc),
            -1 => Ok(Order::Desc),
            other => Err(ConfigError::Validation(format!(
                "order must be 1 or -1, got {}",
                other
            ))),
        }
    }
}

/// Identifier quoting supplied by the database agent.
pub type Quote<'a> = &'a (dyn Fn(&str) -> String + Sync);

/// Quote identifier for PostgreSQL; dotted names are quoted per segment.
pub fn quote_ident(s: &str) -> String {
    s.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn where_filter(q: &mut Statement, filter: Option<&str>, params: &[Value]) -> String {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(f) => {
            for p in params {
                q.push_param(p.clone());
            }
            format!(" WHERE ({})", f)
        }
        None => String::new(),
    }
}

/// `jsonb_populate_record` over the table's row type: the server converts
/// each JSON value to its column type, so no per-column casts are needed.
fn populate(table: &str, param: usize) -> String {
    format!("jsonb_populate_record(NULL::{}, ${})", table, param)
}

/// `{"pk": key}`, bound as one jsonb parameter.
fn key_param(pk: &str, key: &Value) -> Value {
    let mut m = Map::new();
    m.insert(pk.to_string(), key.clone());
    Value::Object(m)
}

/// `pk = <key typed as the pk column>`.
fn key_match(column: &str, table: &str, pk: &str, param: usize) -> String {
    format!("{} = ({}).{}", column, populate(table, param), pk)
}

/// Restricts a mutation on `t` to at most one row keyed by the primary key.
/// `tableoid` keeps the bound when `ctid` repeats across partitions.
fn single_row_target(table: &str, pk: &str, param: usize) -> String {
    format!(
        "{} AND (t.tableoid, t.ctid) IN (SELECT tableoid, ctid FROM {} WHERE {} LIMIT 1)",
        key_match(&format!("t.{}", pk), table, pk, param),
        table,
        key_match(pk, table, pk, param)
    )
}

/// Each selected row comes back as one `json` object in column order.
fn json_row(table: &str) -> String {
    format!("row_to_json({}.*)", table)
}

/// SELECT one row by primary key.
pub fn select_by_key(quote: Quote<'_>, table: &str, pk: &str, key: &Value) -> Statement {
    let mut q = Statement::new(StatementKind::Select);
    let n = q.push_param(key_param(pk, key));
    let table = quote(table);
    let pk_col = quote(pk);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} LIMIT 1",
        json_row(&table),
        table,
        key_match(&pk_col, &table, &pk_col, n)
    );
    q
}

/// SELECT list with optional raw filter, ORDER BY pk, LIMIT/OFFSET.
pub fn select_list(
    quote: Quote<'_>,
    table: &str,
    pk: &str,
    filter: Option<&str>,
    params: &[Value],
    limit: Limit,
    order: Order,
) -> Statement {
    let mut q = Statement::new(StatementKind::Select);
    let where_clause = where_filter(&mut q, filter, params);
    let offset_clause = match limit.offset() {
        0 => String::new(),
        n => format!(" OFFSET {}", n),
    };
    let table = quote(table);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} {} LIMIT {}{}",
        json_row(&table),
        table,
        where_clause,
        quote(pk),
        order.as_sql(),
        limit.count(),
        offset_clause
    );
    q
}

/// SELECT COUNT(*) with optional raw filter.
pub fn count(quote: Quote<'_>, table: &str, filter: Option<&str>, params: &[Value]) -> Statement {
    let mut q = Statement::new(StatementKind::Count);
    let where_clause = where_filter(&mut q, filter, params);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quote(table), where_clause);
    q
}

/// INSERT every field in insertion order; returns the primary key as json.
/// A null primary key is left out so the database assigns one.
pub fn insert(quote: Quote<'_>, table: &str, pk: &str, fields: &Map<String, Value>) -> Statement {
    let mut q = Statement::new(StatementKind::Insert);
    let values: Map<String, Value> = fields
        .iter()
        .filter(|(name, val)| !(name.as_str() == pk && val.is_null()))
        .map(|(name, val)| (name.clone(), val.clone()))
        .collect();
    let table = quote(table);
    let returning = format!("RETURNING to_json({})", quote(pk));
    if values.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES {}", table, returning);
        return q;
    }
    let cols: Vec<String> = values.keys().map(|name| quote(name)).collect();
    let picks: Vec<String> = cols.iter().map(|c| format!("r.{}", c)).collect();
    let n = q.push_param(Value::Object(values));
    q.sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} AS r {}",
        table,
        cols.join(", "),
        picks.join(", "),
        populate(&table, n),
        returning
    );
    q
}

/// UPDATE one row by primary key: SET every field except the key.
/// Returns `None` when there is nothing to set.
pub fn update(quote: Quote<'_>, table: &str, pk: &str, key: &Value, fields: &Map<String, Value>) -> Option<Statement> {
    let values: Map<String, Value> = fields
        .iter()
        .filter(|(name, _)| name.as_str() != pk)
        .map(|(name, val)| (name.clone(), val.clone()))
        .collect();
    if values.is_empty() {
        return None;
    }
    let mut q = Statement::new(StatementKind::Update);
    let sets: Vec<String> = values
        .keys()
        .map(|name| {
            let col = quote(name);
            format!("{} = r.{}", col, col)
        })
        .collect();
    let table = quote(table);
    let v = q.push_param(Value::Object(values));
    let k = q.push_param(key_param(pk, key));
    q.sql = format!(
        "UPDATE {} AS t SET {} FROM {} AS r WHERE {}",
        table,
        sets.join(", "),
        populate(&table, v),
        single_row_target(&table, &quote(pk), k)
    );
    Some(q)
}

/// DELETE one row by primary key.
pub fn delete(quote: Quote<'_>, table: &str, pk: &str, key: &Value) -> Statement {
    let mut q = Statement::new(StatementKind::Delete);
    let n = q.push_param(key_param(pk, key));
    let table = quote(table);
    q.sql = format!(
        "DELETE FROM {} AS t WHERE {}",
        table,
        single_row_target(&table, &quote(pk), n)
    );
    q
}
