//! Incoming request as seen by a controller.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::AppError;
use crate::method::Verb;

/// An inbound request after routing has selected a controller.
#[derive(Clone, Debug, Default)]
pub struct Request {
    method: String,
    path: String,
    query: HashMap<String, String>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Method name exactly as received.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn verb(&self) -> Result<Verb, AppError> {
        Verb::parse(&self.method)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as a JSON object, or `BadRequest` when absent or not an object.
    pub fn json_object(&self) -> Result<serde_json::Map<String, Value>, AppError> {
        match &self.body {
            Some(Value::Object(m)) => Ok(m.clone()),
            _ => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }
}
