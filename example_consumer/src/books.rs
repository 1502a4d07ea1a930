//! `books` controller over the `book` table.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mvc_sdk::{
    success_one, success_one_ok, success_page, ActionFuture, AppError, AppState, Controller, FindAll, FromState,
    Limit, Model, Order, Record, Request, VerbTable,
};
use serde_json::Value;

pub struct Book;

impl Model for Book {
    const NAME: &'static str = "book";
    const PRIMARY_KEY: &'static str = "id";
}

pub struct Books {
    record: Record,
}

impl FromState for Books {
    fn from_state(state: &AppState) -> Result<Self, AppError> {
        Ok(Books {
            record: Book::record_with(state.agent.clone(), &state.stack)?,
        })
    }
}

impl Controller for Books {
    type Output = Response;

    fn name(&self) -> &str {
        "books"
    }

    fn verbs() -> VerbTable<Self> {
        VerbTable::new()
            .get(get)
            .post(post)
            .put(put)
            .patch(put)
            .delete(delete)
    }
}

fn id_param(params: &[Value]) -> Result<Value, AppError> {
    let raw = params
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("book id required".into()))?;
    let id: i64 = raw.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
    Ok(Value::from(id))
}

fn query_u64(req: &Request, key: &str) -> Result<Option<u64>, AppError> {
    req.query(key)
        .map(|v| v.parse().map_err(|_| AppError::BadRequest(format!("invalid {}", key))))
        .transpose()
}

/// `GET /books` lists (`?limit=&offset=&order=1|-1&author=`), `GET /books/:id` reads one.
fn get<'a>(c: &'a mut Books, req: &'a Request, params: Vec<Value>) -> ActionFuture<'a, Response> {
    Box::pin(async move {
        if !params.is_empty() {
            let id = id_param(&params)?;
            let row = c
                .record
                .find(Some(id.clone()))
                .await?
                .ok_or_else(|| AppError::NotFound(format!("book {}", id)))?;
            return Ok(success_one_ok(row).into_response());
        }

        let mut query = FindAll::new();
        let mut filter: Option<&str> = None;
        let mut filter_params = Vec::new();
        if let Some(author) = req.query("author") {
            filter = Some("author = $1");
            filter_params.push(Value::from(author));
            query = query.filter("author = $1").params(filter_params.clone());
        }
        let count = query_u64(req, "limit")?;
        let offset = query_u64(req, "offset")?;
        match (offset, count) {
            (Some(offset), count) => query = query.limit(Limit::Range { offset, count: count.unwrap_or(Limit::DEFAULT_COUNT) }),
            (None, Some(count)) => query = query.limit(count),
            (None, None) => {}
        }
        if let Some(order) = req.query("order") {
            let flag: i64 = order.parse().map_err(|_| AppError::BadRequest("invalid order".into()))?;
            query = query.order(Order::try_from(flag).map_err(|e| AppError::BadRequest(e.to_string()))?);
        }

        let rows = c.record.find_all(query).await?;
        let total = c.record.count(filter, filter_params).await?;
        Ok(success_page(rows, total).into_response())
    })
}

/// `POST /books` creates from the JSON body.
fn post<'a>(c: &'a mut Books, req: &'a Request, _: Vec<Value>) -> ActionFuture<'a, Response> {
    Box::pin(async move {
        let mut body = req.json_object()?;
        body.shift_remove(Book::PRIMARY_KEY);
        c.record.load(body);
        c.record.save().await?;
        Ok(success_one(c.record.to_json()).into_response())
    })
}

/// `PUT|PATCH /books/:id` updates the given fields.
fn put<'a>(c: &'a mut Books, req: &'a Request, params: Vec<Value>) -> ActionFuture<'a, Response> {
    Box::pin(async move {
        let id = id_param(&params)?;
        let body = req.json_object()?;
        if !c.record.fetch(Some(id.clone())).await? {
            return Err(AppError::NotFound(format!("book {}", id)));
        }
        c.record.load(body);
        c.record.set(Book::PRIMARY_KEY, id);
        c.record.save().await?;
        Ok(success_one_ok(c.record.to_json()).into_response())
    })
}

/// `DELETE /books/:id`
fn delete<'a>(c: &'a mut Books, _: &'a Request, params: Vec<Value>) -> ActionFuture<'a, Response> {
    Box::pin(async move {
        let id = id_param(&params)?;
        c.record.set(Book::PRIMARY_KEY, id.clone());
        if c.record.remove().await? {
            Ok(StatusCode::NO_CONTENT.into_response())
        } else {
            Err(AppError::NotFound(format!("book {}", id)))
        }
    })
}
