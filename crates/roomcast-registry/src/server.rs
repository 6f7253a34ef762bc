//! Mountpoint registry HTTP server

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{RegistryError, Result};
use crate::store::{CreateMountpoint, Mountpoint, MountpointStore};

/// Default registry port.
pub const DEFAULT_REGISTRY_PORT: u16 = 7410;

#[derive(Debug, Serialize)]
struct ListResponse {
    success: bool,
    data: Vec<Mountpoint>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ItemResponse {
    success: bool,
    data: Mountpoint,
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    id: Option<String>,
}

/// HTTP server exposing a [`MountpointStore`].
pub struct RegistryServer {
    store: Arc<MountpointStore>,
}

impl RegistryServer {
    pub fn new(store: Arc<MountpointStore>) -> Self {
        Self { store }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/mountpoints",
                get(handle_list).post(handle_create).delete(handle_delete),
            )
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.store))
    }

    /// Bind and serve until the task is dropped.
    pub async fn serve(&self, addr: &str) -> Result<()> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| RegistryError::Other(format!("invalid address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("mountpoint registry listening on {}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| RegistryError::Other(format!("server error: {}", e)))
    }

    /// Bind an ephemeral local port and serve in a background task.
    /// Returns the bound address and the task handle.
    pub async fn spawn_local(&self) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        info!("mountpoint registry listening on {}", addr);
        Ok((addr, handle))
    }
}

async fn handle_list(State(store): State<Arc<MountpointStore>>) -> Json<ListResponse> {
    let data = store.list();
    let count = data.len();
    Json(ListResponse {
        success: true,
        data,
        count,
    })
}

async fn handle_create(
    State(store): State<Arc<MountpointStore>>,
    Json(request): Json<CreateMountpoint>,
) -> std::result::Result<(StatusCode, Json<ItemResponse>), (StatusCode, String)> {
    match store.create(request) {
        Ok(mountpoint) => Ok((
            StatusCode::CREATED,
            Json(ItemResponse {
                success: true,
                data: mountpoint,
            }),
        )),
        Err(RegistryError::MissingDescription) => Err((
            StatusCode::BAD_REQUEST,
            "description is required".to_string(),
        )),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn handle_delete(
    State(store): State<Arc<MountpointStore>>,
    Query(query): Query<DeleteQuery>,
) -> std::result::Result<Json<ItemResponse>, (StatusCode, String)> {
    let id = query
        .id
        .as_deref()
        .and_then(|raw| raw.parse::<u64>().ok())
        .ok_or((
            StatusCode::BAD_REQUEST,
            "valid mountpoint id is required".to_string(),
        ))?;

    match store.delete(id) {
        Ok(mountpoint) => Ok(Json(ItemResponse {
            success: true,
            data: mountpoint,
        })),
        Err(RegistryError::NotFound(_)) => {
            Err((StatusCode::NOT_FOUND, "mountpoint not found".to_string()))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
