//! Mount a controller under a path; every verb goes through the dispatcher.
//! Path segments after the mount point become the action's positional params:
//! `GET /books/42` on a controller mounted at `/books` calls `get(…, ["42"])`.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;

use crate::controller::{Controller, Dispatcher};
use crate::error::AppError;
use crate::request::Request;
use crate::state::AppState;

/// Build a fresh controller for one request.
pub trait FromState: Sized {
    fn from_state(state: &AppState) -> Result<Self, AppError>;
}

pub fn controller_routes<C>(path: &str, state: AppState, body_limit: usize) -> Router
where
    C: Controller + FromState,
    C::Output: IntoResponse,
{
    let base = path.trim_end_matches('/');
    let root = if base.is_empty() { "/" } else { base };
    let rest = format!("{}/*rest", base);
    Router::new()
        .route(root, any(serve::<C>))
        .route(&rest, any(serve::<C>))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

async fn serve<C>(
    State(state): State<AppState>,
    rest: Option<Path<String>>,
    Query(query): Query<HashMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    C: Controller + FromState,
    C::Output: IntoResponse,
{
    let params = rest
        .map(|Path(rest)| positional_params(&rest))
        .unwrap_or_default();
    match handle::<C>(&state, method, uri, headers, query, body, params).await {
        Ok(out) => out.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle<C>(
    state: &AppState,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: Bytes,
    params: Vec<Value>,
) -> Result<C::Output, AppError>
where
    C: Controller + FromState,
{
    let mut request = Request::new(method.as_str(), uri.path()).with_query(query);
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            request = request.with_header(name.as_str(), v);
        }
    }
    if !body.is_empty() {
        let json: Value = serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
        request = request.with_body(json);
    }
    let mut controller = C::from_state(state)?;
    Dispatcher::dispatch(&mut controller, &request, params).await
}

fn positional_params(rest: &str) -> Vec<Value> {
    rest.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_rest_into_string_params() {
        assert_eq!(
            positional_params("42/chapters//7/"),
            vec![Value::String("42".into()), Value::String("chapters".into()), Value::String("7".into())]
        );
        assert!(positional_params("").is_empty());
    }
}
