//! The key-value API.
//!
//! Values are stored as UTF-8 text. When a `POST /kv` body carries a non-string JSON value, its
//! JSON text is stored instead. Numeric keys are stored as their decimal text.
//!
//! Reads go through the [read cache](crate::cache::ReadCache). Successful writes and deletes evict
//! the key afterwards.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::{Json, Router, routing};
use etcdperf_types::{KV_ROUTE, KvPair, SuccessResponse};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route(KV_ROUTE, routing::get(list).post(put))
        .route(&format!("{KV_ROUTE}/{{key}}"), routing::get(get).delete(delete))
}

async fn get(
    State(state): State<ServiceState>,
    Path(key): Path<String>,
) -> ApiResult<Json<KvPair>> {
    if let Some(value) = state.cache.get(&key).await {
        return Ok(Json(KvPair {
            key,
            value,
            cached: true,
        }));
    }

    let value = state.store.get(&key).await?.ok_or(ApiError::NotFound)?;
    let value = String::from_utf8_lossy(&value).into_owned();
    state.cache.insert(key.clone(), value.clone()).await;
    Ok(Json(KvPair::new(key, value)))
}

async fn put(State(state): State<ServiceState>, body: Bytes) -> ApiResult<Json<SuccessResponse>> {
    let (key, value) = parse_pair(&body).ok_or(ApiError::BadRequest)?;
    state.store.put(&key, value).await?;
    state.cache.invalidate(&key).await;
    Ok(Json(SuccessResponse::ok()))
}

async fn delete(
    State(state): State<ServiceState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let deleted = state.store.delete(&key).await?;
    state.cache.invalidate(&key).await;
    tracing::debug!(key, deleted, "deleted key");
    Ok(Json(SuccessResponse::ok()))
}

async fn list(State(state): State<ServiceState>) -> ApiResult<Json<BTreeMap<String, String>>> {
    let entries = state.store.list().await?;
    let map = entries
        .into_iter()
        .map(|(key, value)| (key, String::from_utf8_lossy(&value).into_owned()))
        .collect();
    Ok(Json(map))
}

/// Extracts the key and value from a `POST /kv` body.
///
/// Returns `None` unless the body is a JSON object with a non-null `value` and a `key` that is
/// either a non-empty string or a non-zero number.
fn parse_pair(body: &[u8]) -> Option<(String, Bytes)> {
    let Ok(Value::Object(mut object)) = serde_json::from_slice(body) else {
        return None;
    };

    let key = match object.remove("key")? {
        Value::String(key) if !key.is_empty() => key,
        Value::Number(key) if key.as_f64() != Some(0.0) => key.to_string(),
        _ => return None,
    };
    let value = match object.remove("value")? {
        Value::Null => return None,
        Value::String(value) => value,
        value => value.to_string(),
    };

    Some((key, Bytes::from(value)))
}
