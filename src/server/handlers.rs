//! Add-on protocol routes. Every resource path ends in `.json`; the suffix
//! is stripped from the last segment before it is interpreted.

use axum::extract::{Path, State};
use axum::response::Json;
use http::{StatusCode, Uri};
use serde_json::{json, Value};
use tracing::debug;

use super::AppState;
use crate::addon::CatalogExtra;
use crate::model::ContentType;

fn strip_json(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

fn content_type(kind: &str) -> Result<ContentType, StatusCode> {
    kind.parse().map_err(|_| StatusCode::NOT_FOUND)
}

pub async fn manifest(State(state): State<AppState>) -> Json<Value> {
    Json(state.addon.manifest())
}

pub async fn catalog(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    list(&state, &kind, strip_json(&id), CatalogExtra::default()).await
}

/// The extra segment is read from the undecoded path; `Path` would decode
/// `%26` into a separator before the pairs are split.
pub async fn catalog_with_extra(
    State(state): State<AppState>,
    Path((kind, id, _)): Path<(String, String, String)>,
    uri: Uri,
) -> Result<Json<Value>, StatusCode> {
    let extra = raw_last_segment(&uri);
    list(&state, &kind, &id, CatalogExtra::parse(strip_json(extra))).await
}

fn raw_last_segment(uri: &Uri) -> &str {
    uri.path().rsplit('/').next().unwrap_or_default()
}

async fn list(
    state: &AppState,
    kind: &str,
    catalog_id: &str,
    extra: CatalogExtra,
) -> Result<Json<Value>, StatusCode> {
    let content_type = content_type(kind)?;
    debug!(%content_type, catalog_id, ?extra, "catalog request");
    let metas = state.addon.list_catalog(content_type, catalog_id, &extra).await;
    Ok(Json(json!({ "metas": metas })))
}

pub async fn meta(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let content_type = content_type(&kind)?;
    let meta = state.addon.get_meta(content_type, strip_json(&id)).await;
    Ok(Json(json!({ "meta": meta.map_or_else(|| json!({}), |m| json!(m)) })))
}

pub async fn streams(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let content_type = content_type(&kind)?;
    let streams = state.addon.get_streams(content_type, strip_json(&id)).await;
    Ok(Json(json!({ "streams": streams })))
}
