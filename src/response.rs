//! `{data, meta}` envelopes returned by controller actions.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Status plus JSON body; implements `IntoResponse` through axum's tuple impl.
pub type Reply<T> = (StatusCode, Json<T>);

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

/// `count` is the page size; `total` the number of matching rows, when known.
#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> SuccessMany<T> {
    fn new(data: Vec<T>, total: Option<u64>) -> Self {
        let count = data.len() as u64;
        SuccessMany {
            data,
            meta: MetaCount { count, total },
        }
    }
}

/// `201 Created` with the stored record.
pub fn success_one<T: Serialize>(data: T) -> Reply<SuccessOne<T>> {
    (StatusCode::CREATED, Json(SuccessOne { data }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> Reply<SuccessOne<T>> {
    (StatusCode::OK, Json(SuccessOne { data }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> Reply<SuccessMany<T>> {
    (StatusCode::OK, Json(SuccessMany::new(data, None)))
}

/// One page of a listing plus the total matching row count.
pub fn success_page<T: Serialize>(data: Vec<T>, total: u64) -> Reply<SuccessMany<T>> {
    (StatusCode::OK, Json(SuccessMany::new(data, Some(total))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_record_is_wrapped_in_data() {
        let (status, Json(body)) = success_one(json!({"id": 1}));
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(serde_json::to_value(body).unwrap(), json!({"data": {"id": 1}}));
    }

    #[test]
    fn page_meta_carries_total() {
        let (status, Json(body)) = success_page(vec![1, 2], 7);
        assert_eq!(status, StatusCode::OK);
        let v = serde_json::to_value(body).unwrap();
        assert_eq!(v["meta"], json!({"count": 2, "total": 7}));
    }

    #[test]
    fn many_omits_total() {
        let (_, Json(body)) = success_many(vec!["a"]);
        let v = serde_json::to_value(body).unwrap();
        assert_eq!(v["meta"], json!({"count": 1}));
    }
}
