use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State as AxumState, rejection::JsonRejection},
    http::{
        HeaderMap, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH, USER_AGENT},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use showcase::{
    AnnotateOptions, ClientContext, ContentRef, ImageCandidateSet, ImagePreference, content_type,
    resolve,
};
use tokio::task;
use tracing::{error, info, warn};
use url::Url;

use crate::{
    error::AppError,
    state::State,
    storage::UploadOptions,
    utils::{
        FUNCTION_METHODS, LOCAL_CACHE_PREFIX, LOCAL_PATH_PREFIX, PLACEHOLDER_PREFIX, PROXY_METHODS,
        cors_headers, etag, etag_matches, image_type_or_default, next_stamp, normalize_key,
        render_placeholder, sanitize, sync_file_name,
    },
};

pub const IMMUTABLE: &str = "public, max-age=31536000, immutable";

const DEFAULT_PLACEHOLDER_WIDTH: u32 = 600;
const DEFAULT_PLACEHOLDER_HEIGHT: u32 = 800;
const MAX_PLACEHOLDER_SIDE: u32 = 4096;

pub async fn proxy_preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, cors_headers(PROXY_METHODS))
}

pub async fn function_preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, cors_headers(FUNCTION_METHODS))
}

pub async fn proxy_missing_key() -> AppError {
    AppError::MissingKey
}

pub async fn proxy_image(
    AxumState(state): AxumState<Arc<State>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let key = normalize_key(&key)?;

    let object = state
        .bucket
        .download(&key)
        .await
        .map_err(AppError::Storage)?
        .ok_or_else(|| {
            info!(key, "Image not in bucket");
            AppError::NotFound
        })?;

    let tag = etag(&object.bytes);

    let not_modified = headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| etag_matches(value, &tag));

    if not_modified {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(ETAG, tag.as_str()), (CACHE_CONTROL, IMMUTABLE)],
        )
            .into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type::from_key(&key)),
            (CACHE_CONTROL, IMMUTABLE),
            (ETAG, tag.as_str()),
        ],
        object.bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub image_url: Option<String>,
    pub image_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub local_path: String,
    pub cached_url: String,
    pub original_url: String,
    pub file_name: String,
}

pub async fn sync_image_to_local(
    AxumState(state): AxumState<Arc<State>>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncResponse>, AppError> {
    let Json(payload) = payload.map_err(|_| AppError::MalformedPayload)?;

    let image_url = payload
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or(AppError::MissingField("imageUrl"))?;

    let source = Url::parse(&image_url)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .ok_or(AppError::MalformedPayload)?;

    info!(url = %source, "Syncing image to local cache");

    let (bytes, upstream_type) = fetch_image(&state, source).await?;

    let image_type = image_type_or_default(payload.image_type.as_deref());
    let file_name = sync_file_name(&image_type, &image_url, next_stamp());
    let key = format!("{LOCAL_CACHE_PREFIX}/{file_name}");

    let content_type = upstream_type
        .filter(|value| value.starts_with("image/"))
        .unwrap_or_else(|| content_type::from_key(&file_name).to_string());

    state
        .bucket
        .upload(
            &key,
            bytes,
            UploadOptions {
                content_type,
                upsert: true,
            },
        )
        .await
        .map_err(AppError::Storage)?;

    info!(key, "Image cached");

    Ok(Json(SyncResponse {
        success: true,
        local_path: format!("{LOCAL_PATH_PREFIX}/{file_name}"),
        cached_url: state.bucket.public_url(&key),
        original_url: image_url,
        file_name,
    }))
}

async fn fetch_image(state: &State, source: Url) -> Result<(Bytes, Option<String>), AppError> {
    let response = state.http.get(source).send().await.map_err(|e| {
        warn!("Image fetch failed: {e}");
        AppError::Upstream("request failed".to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "Image source answered with an error");
        return Err(AppError::Upstream(
            status
                .canonical_reason()
                .unwrap_or(status.as_str())
                .to_string(),
        ));
    }

    let upstream_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let bytes = response.bytes().await.map_err(|e| {
        warn!("Image body read failed: {e}");
        AppError::Upstream("body read failed".to_string())
    })?;

    Ok((bytes, upstream_type))
}

#[derive(Deserialize)]
pub struct PlaceholderRequest {
    pub name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderResponse {
    pub success: bool,
    pub path: String,
    pub public_url: String,
}

pub async fn create_placeholder(
    AxumState(state): AxumState<Arc<State>>,
    payload: Result<Json<PlaceholderRequest>, JsonRejection>,
) -> Result<Json<PlaceholderResponse>, AppError> {
    let Json(payload) = payload.map_err(|_| AppError::MalformedPayload)?;

    let raw_name = payload.name.unwrap_or_default();
    let name = sanitize(&raw_name);
    if name.is_empty() {
        return Err(AppError::MissingField("name"));
    }

    let width = payload
        .width
        .unwrap_or(DEFAULT_PLACEHOLDER_WIDTH)
        .clamp(1, MAX_PLACEHOLDER_SIDE);
    let height = payload
        .height
        .unwrap_or(DEFAULT_PLACEHOLDER_HEIGHT)
        .clamp(1, MAX_PLACEHOLDER_SIDE);
    let label = payload
        .label
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| raw_name.trim().to_string());

    let key = format!("{PLACEHOLDER_PREFIX}/{name}.svg");
    let svg = render_placeholder(width, height, &label);

    state
        .bucket
        .upload(
            &key,
            Bytes::from(svg),
            UploadOptions {
                content_type: content_type::from_key(&key).to_string(),
                upsert: true,
            },
        )
        .await
        .map_err(AppError::Storage)?;

    info!(key, width, height, "Placeholder created");

    Ok(Json(PlaceholderResponse {
        success: true,
        path: format!("/api/i/{key}"),
        public_url: state.bucket.public_url(&key),
    }))
}

pub async fn get_preference(AxumState(state): AxumState<Arc<State>>) -> Json<ImagePreference> {
    Json(current_preference(&state).await)
}

pub async fn put_preference(
    AxumState(state): AxumState<Arc<State>>,
    payload: Result<Json<ImagePreference>, JsonRejection>,
) -> Result<Json<ImagePreference>, AppError> {
    let Json(preference) = payload.map_err(|_| AppError::MalformedPayload)?;

    let writer = state.clone();
    task::spawn_blocking(move || writer.preferences.set(preference))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(prefer_local = preference.prefer_local, "Image preference updated");

    Ok(Json(preference))
}

// the store does blocking file io
async fn current_preference(state: &Arc<State>) -> ImagePreference {
    let reader = state.clone();

    task::spawn_blocking(move || reader.preferences.get())
        .await
        .unwrap_or_else(|e| {
            error!("Preference read task failed: {e}");
            state.preferences.default_preference()
        })
}

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub mobile: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(flatten)]
    pub candidates: ImageCandidateSet,
    pub content_table: Option<String>,
    pub content_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub url: String,
}

pub async fn resolve_image(
    AxumState(state): AxumState<Arc<State>>,
    Query(query): Query<ResolveQuery>,
    headers: HeaderMap,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolveResponse>, AppError> {
    let Json(request) = payload.map_err(|_| AppError::MalformedPayload)?;

    let client = ClientContext::detect(
        headers.get(USER_AGENT).and_then(|value| value.to_str().ok()),
        query.mobile.as_deref(),
    );

    let resolved = resolve(&request.candidates, current_preference(&state).await);
    if resolved.is_empty() {
        return Ok(Json(ResolveResponse { url: resolved }));
    }

    let content = match (request.content_table, request.content_id) {
        (Some(table), Some(id)) => Some(ContentRef::new(table, id)),
        _ => None,
    };

    let url = state
        .annotator
        .annotate(&resolved, &AnnotateOptions { client, content })
        .await;

    Ok(Json(ResolveResponse { url }))
}
