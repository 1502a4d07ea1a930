mod common;

use axum::{
    body::Body,
    http::{header, Request as HttpRequest, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use common::MemoryAgent;
use mvc_sdk::{
    common_routes, controller_routes, success_many, success_one, success_one_ok, ActionFuture, AppError,
    AppState, Controller, FindAll, FromState, Model, Outcome, Record, Request, StackConfig, VerbTable,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Book;

impl Model for Book {
    const NAME: &'static str = "book";
    const PRIMARY_KEY: &'static str = "id";
}

struct Books {
    record: Record,
}

impl FromState for Books {
    fn from_state(state: &AppState) -> Result<Self, AppError> {
        Ok(Books {
            record: Book::record_with(state.agent.clone(), &state.stack)?,
        })
    }
}

fn get<'a>(c: &'a mut Books, _: &'a Request, params: Vec<Value>) -> ActionFuture<'a, Response> {
    Box::pin(async move {
        match params.first() {
            Some(id) => {
                let row = c.record.find(Some(id.clone())).await?;
                let row = row.ok_or_else(|| AppError::NotFound(format!("book {}", id)))?;
                Ok(success_one_ok(row).into_response())
            }
            None => {
                let rows = c.record.find_all(FindAll::new()).await?;
                Ok(success_many(rows).into_response())
            }
        }
    })
}

fn post<'a>(c: &'a mut Books, req: &'a Request, _: Vec<Value>) -> ActionFuture<'a, Response> {
    Box::pin(async move {
        c.record.load(req.json_object()?);
        c.record.save().await?;
        Ok(success_one(c.record.to_json()).into_response())
    })
}

fn delete<'a>(c: &'a mut Books, _: &'a Request, params: Vec<Value>) -> ActionFuture<'a, Response> {
    Box::pin(async move {
        let id = params
            .into_iter()
            .next()
            .ok_or_else(|| AppError::BadRequest("id required".into()))?;
        c.record.set("id", id.clone());
        if c.record.remove().await? {
            Ok(StatusCode::NO_CONTENT.into_response())
        } else {
            Err(AppError::NotFound(format!("book {}", id)))
        }
    })
}

impl Controller for Books {
    type Output = Response;

    fn name(&self) -> &str {
        "books"
    }

    fn verbs() -> VerbTable<Self> {
        VerbTable::new().get(get).post(post).delete(delete)
    }
}

fn app(agent: &MemoryAgent) -> Router {
    let state = AppState::new(agent.shared(), StackConfig::default());
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(controller_routes::<Books>("/books", state, 1024))
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str, body: Body) -> HttpRequest<Body> {
    HttpRequest::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn get_with_id_reads_one_book() {
    let agent = MemoryAgent::new();
    agent.reply_rows(vec![json!({"id": 42, "title": "Dune"})]);

    let response = app(&agent).oneshot(request("GET", "/books/42", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["title"], "Dune");
    assert_eq!(agent.last_statement().params, vec![json!({"id": "42"})]);
}

#[tokio::test]
async fn get_without_id_lists_books() {
    let agent = MemoryAgent::new();
    agent.reply_rows(vec![json!({"id": 2}), json!({"id": 1})]);

    let response = app(&agent).oneshot(request("GET", "/books", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["meta"]["count"], 2);
}

#[tokio::test]
async fn missing_book_is_404() {
    let agent = MemoryAgent::new();
    agent.reply_rows(vec![]);

    let response = app(&agent).oneshot(request("GET", "/books/7", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn post_creates_and_returns_generated_id() {
    let agent = MemoryAgent::new();
    agent.reply(Ok(Outcome::Inserted(json!(42))));

    let body = Body::from(r#"{"title":"Dune"}"#);
    let response = app(&agent).oneshot(request("POST", "/books", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"], json!({"title": "Dune", "id": 42}));
}

#[tokio::test]
async fn unmapped_verb_is_405_with_allow_header() {
    let agent = MemoryAgent::new();

    let response = app(&agent).oneshot(request("PATCH", "/books/1", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, POST, DELETE");
    let body = body_json(response).await;
    assert_eq!(body["error"]["details"], json!({"verb": "PATCH", "controller": "books"}));
    assert!(agent.events().is_empty());
}

#[tokio::test]
async fn delete_twice_second_is_404() {
    let agent = MemoryAgent::new();
    agent.reply(Ok(Outcome::Affected(1)));
    agent.reply(Ok(Outcome::Affected(0)));
    let app = app(&agent);

    let first = app.clone().oneshot(request("DELETE", "/books/42", Body::empty())).await.unwrap();
    assert_eq!(first.status(), StatusCode::NO_CONTENT);
    let second = app.oneshot(request("DELETE", "/books/42", Body::empty())).await.unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_json_body_is_400() {
    let agent = MemoryAgent::new();
    let response = app(&agent)
        .oneshot(request("POST", "/books", Body::from("{not json")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(agent.events().is_empty());
}

#[tokio::test]
async fn database_failure_is_500() {
    let agent = MemoryAgent::new();
    let response = app(&agent).oneshot(request("GET", "/books", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"]["code"], "database_error");
}

#[tokio::test]
async fn readiness_reflects_database() {
    let agent = MemoryAgent::new();
    let response = app(&agent).oneshot(request("GET", "/ready", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["vendor"], "postgres");

    agent.go_down();
    let response = app(&agent).oneshot(request("GET", "/ready", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["error"], "connection: connection refused");
}
