//! HTTP routes over a registered dataset

use crate::access::DatasetAccess;
use crate::config::ServeConfig;
use crate::error::{PublishError, Result};
use crate::utils::{json_dumps, metadata_key, ZARRAY_KEY, ZATTRS_KEY, ZGROUP_KEY, ZMETADATA_KEY};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Media type of chunk payloads
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Error response wrapper mapping [`PublishError`] to HTTP status codes
#[derive(Debug)]
pub struct ApiError(PublishError);

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            PublishError::UnknownVariable(_) | PublishError::KeyNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PublishError::MalformedCoordinate(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_client_error() {
            debug!(error = %self.0, "rejected request");
        } else {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

fn json_response(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Build the router serving a dataset's Zarr store
pub fn router(access: Arc<DatasetAccess>) -> Router {
    Router::new()
        .route(&format!("/{}", ZGROUP_KEY), get(get_zgroup))
        .route(&format!("/{}", ZATTRS_KEY), get(get_zattrs))
        .route(&format!("/{}", ZMETADATA_KEY), get(get_zmetadata))
        .route("/keys", get(list_keys))
        .route("/:var/:key", get(get_key))
        .layer(TraceLayer::new_for_http())
        .with_state(access)
}

async fn get_zgroup(State(access): State<Arc<DatasetAccess>>) -> Response {
    json_response(access.group_json())
}

async fn get_zattrs(State(access): State<Arc<DatasetAccess>>) -> Response {
    json_response(access.attrs_json())
}

async fn get_zmetadata(State(access): State<Arc<DatasetAccess>>) -> Response {
    json_response(access.metadata_document_json())
}

async fn list_keys(
    State(access): State<Arc<DatasetAccess>>,
) -> std::result::Result<Response, ApiError> {
    let body = json_dumps(&access.list_variable_names())?;
    Ok(json_response(Bytes::from(body)))
}

async fn get_key(
    State(access): State<Arc<DatasetAccess>>,
    Path((var, key)): Path<(String, String)>,
) -> std::result::Result<Response, ApiError> {
    if key == ZARRAY_KEY {
        return Ok(json_response(access.variable_metadata_json(&var)?));
    }
    if key == ZATTRS_KEY {
        return Ok(json_response(access.variable_attrs_json(&var)?));
    }
    if key.starts_with('.') {
        // No other metadata record such as `.zgroup` exists below a variable
        access.variable_metadata(&var)?;
        return Err(PublishError::KeyNotFound(metadata_key(&var, &key)).into());
    }

    // Materialization may block, keep it off the async workers
    let span = tracing::debug_span!("chunk", request_id = %Uuid::new_v4(), var = %var, key = %key);
    let chunk = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        access.get_chunk(&var, &key)
    })
    .await
    .map_err(|e| PublishError::DataSource(format!("chunk task failed: {}", e)))??;
    Ok(([(header::CONTENT_TYPE, OCTET_STREAM)], chunk).into_response())
}

/// Serve a registered dataset until the process is stopped
pub async fn serve(access: DatasetAccess, config: &ServeConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let access = Arc::new(access.with_edge_chunk_policy(config.edge_chunks));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, variables = access.list_variable_names().len(), "serving dataset");
    axum::serve(listener, router(access)).await?;
    Ok(())
}
