//! HTTP handlers for the Catgraph server

use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::{Query, QueryRejection};
use catgraph_core::{DataSourceError, RenderParams, RenderRequest, RequestError};
use catgraph_render::{Artifact, CacheError, DeliveryPath, RenderError};
use serde::Serialize;
use tracing::{debug, warn};

use crate::ServerState;

pub const TRUNCATED_HEADER: HeaderName = HeaderName::from_static("x-catgraph-truncated");
pub const FINGERPRINT_HEADER: HeaderName = HeaderName::from_static("x-catgraph-fingerprint");

/// Error body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub in_flight: usize,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: usize,
}

/// Anything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Render(RenderError),
    Cache(CacheError),
    NotFound(String),
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        ApiError::Render(e)
    }
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        ApiError::Render(RenderError::Request(e))
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        ApiError::Cache(e)
    }
}

/// Client-facing status for a render failure.
pub fn status_for(err: &RenderError) -> StatusCode {
    match err {
        RenderError::Request(_) => StatusCode::BAD_REQUEST,
        RenderError::DataSource(_) => StatusCode::BAD_GATEWAY,
        RenderError::Layout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RenderError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        RenderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            ApiError::Render(e) => (status_for(e), e.kind(), e.to_string()),
            ApiError::Cache(e) => (StatusCode::INTERNAL_SERVER_ERROR, "cache", e.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", format!("no artifact {}", what)),
        };
        if status.is_server_error() {
            warn!("{}: {}", error, message);
        }
        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

fn artifact_headers(artifact: &Artifact, fingerprint: &str) -> [(HeaderName, String); 2] {
    [
        (TRUNCATED_HEADER, artifact.truncated.to_string()),
        (FINGERPRINT_HEADER, fingerprint.to_string()),
    ]
}

/// Render a membership graph
///
/// An image-map wrapper references its raster by relative name, so it is
/// served through a redirect into `/artifact/`.
pub async fn render(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<RenderParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = query.map_err(|e| RequestError::MalformedQuery(e.to_string()))?;
    let site_name = params.site.clone().unwrap_or_else(|| state.default_site.clone());
    let site = state
        .metadata
        .metadata_for(&site_name)
        .await
        .map_err(|e| match e {
            DataSourceError::UnknownSite(name) => RenderError::Request(RequestError::UnknownSite(name)),
            other => RenderError::DataSource(other),
        })?;

    let request = RenderRequest::from_params(&params, &site, &state.limits)?;
    let fingerprint = request.fingerprint();
    debug!("GET /render -> {}", fingerprint);

    let artifact = match state.request_timeout {
        Some(timeout) => state.renderer.render_within(&request, timeout).await?,
        None => state.renderer.render(&request).await?,
    };
    let headers = artifact_headers(&artifact, fingerprint.as_str());

    if artifact.delivery == DeliveryPath::ImageMap {
        let name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RenderError::Internal("artifact has no file name".into()))?;
        return Ok((headers, Redirect::to(&format!("/artifact/{}", name))).into_response());
    }

    let body = tokio::fs::read(&artifact.path).await.map_err(RenderError::from)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, artifact.mime_type.clone())],
        headers,
        body,
    )
        .into_response())
}

/// Only plain file names produced by the pipeline are served.
fn is_artifact_name(file: &str) -> bool {
    !file.is_empty()
        && !file.starts_with('.')
        && file
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

/// Serve a file from the work directory
pub async fn get_artifact(
    State(state): State<Arc<ServerState>>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    if !is_artifact_name(&file) {
        return Err(ApiError::NotFound(file));
    }

    let path = state.work_dir().join(&file);
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ApiError::NotFound(file)),
        Err(e) => return Err(RenderError::from(e).into()),
    };
    let mime_type = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime_type.as_ref().to_string())], body).into_response())
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        in_flight: state.renderer.in_flight_count(),
    };
    Json(health)
}

/// Drop expired cache entries
pub async fn purge_cache(State(state): State<Arc<ServerState>>) -> Result<Json<PurgeResponse>, ApiError> {
    let Some(cache) = state.cache.clone() else {
        return Ok(Json(PurgeResponse { removed: 0 }));
    };
    let removed = tokio::task::spawn_blocking(move || cache.purge())
        .await
        .map_err(|e| RenderError::Internal(e.to_string()))??;
    Ok(Json(PurgeResponse { removed }))
}
