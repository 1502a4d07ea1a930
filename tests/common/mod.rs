//! Scripted in-memory database agent: replays queued replies and records
//! every call so tests can assert on statements and transaction steps.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mvc_sdk::{Batch, DatabaseAgent, DbError, Outcome, Row, Statement, Vendor};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Execute(Statement),
    Lock,
    Queue(Statement),
    Run,
    Cancel,
    Unlock,
}

#[derive(Default)]
struct Inner {
    replies: VecDeque<Result<Outcome, DbError>>,
    events: Vec<Event>,
    fail_lock: bool,
    fail_unlock: bool,
    down: bool,
}

#[derive(Clone, Default)]
pub struct MemoryAgent {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn DatabaseAgent> {
        Arc::new(self.clone())
    }

    pub fn reply(&self, reply: Result<Outcome, DbError>) -> &Self {
        self.inner.lock().unwrap().replies.push_back(reply);
        self
    }

    pub fn reply_rows(&self, rows: Vec<Value>) -> &Self {
        let rows = rows
            .into_iter()
            .map(|v| match v {
                Value::Object(m) => m,
                other => panic!("row must be an object: {other}"),
            })
            .collect::<Vec<Row>>();
        self.reply(Ok(Outcome::Rows(rows)))
    }

    pub fn fail_lock(&self) {
        self.inner.lock().unwrap().fail_lock = true;
    }

    /// Make every batch commit fail after recording its `Unlock` event.
    pub fn fail_unlock(&self) {
        self.inner.lock().unwrap().fail_unlock = true;
    }

    pub fn go_down(&self) {
        self.inner.lock().unwrap().down = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Statements that reached the database, directly or through a batch.
    pub fn statements(&self) -> Vec<Statement> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute(s) | Event::Queue(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn last_statement(&self) -> Statement {
        self.statements().pop().expect("no statement recorded")
    }

    fn next_reply(inner: &mut Inner) -> Result<Outcome, DbError> {
        inner
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(DbError::Query("no scripted reply".into())))
    }
}

#[async_trait]
impl DatabaseAgent for MemoryAgent {
    fn vendor(&self) -> Vendor {
        Vendor::Postgres
    }

    async fn execute(&self, statement: &Statement) -> Result<Outcome, DbError> {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(Event::Execute(statement.clone()));
        Self::next_reply(&mut inner)
    }

    async fn lock(&self) -> Result<Box<dyn Batch>, DbError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_lock {
            return Err(DbError::Connection("pool timed out".into()));
        }
        inner.events.push(Event::Lock);
        Ok(Box::new(MemoryBatch {
            inner: self.inner.clone(),
            queued: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        if self.inner.lock().unwrap().down {
            return Err(DbError::Connection("connection refused".into()));
        }
        Ok(())
    }
}

struct MemoryBatch {
    inner: Arc<Mutex<Inner>>,
    queued: Vec<Statement>,
}

#[async_trait]
impl Batch for MemoryBatch {
    fn queue(&mut self, statement: Statement) {
        self.inner.lock().unwrap().events.push(Event::Queue(statement.clone()));
        self.queued.push(statement);
    }

    async fn run(&mut self) -> Result<Vec<Outcome>, DbError> {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(Event::Run);
        let mut out = Vec::new();
        for _ in self.queued.drain(..) {
            out.push(MemoryAgent::next_reply(&mut inner)?);
        }
        Ok(out)
    }

    async fn cancel(&mut self) {
        self.inner.lock().unwrap().events.push(Event::Cancel);
    }

    async fn unlock(&mut self) -> Result<(), DbError> {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(Event::Unlock);
        if inner.fail_unlock {
            return Err(DbError::Query("could not serialize access due to concurrent update".into()));
        }
        Ok(())
    }
}
