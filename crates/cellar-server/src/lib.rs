//! HTTP host for the Cellar session store.
//!
//! Exposes the current-session lifecycle and administrative revocation over
//! a small REST API. The server owns one [`SessionStore`] for its lifetime
//! and closes it on shutdown.
//!
//! # Example
//!
//! ```ignore
//! use cellar_server::{Server, ServerConfig};
//! use cellar_session::{SessionStore, StoreConfig};
//!
//! let store = SessionStore::open(StoreConfig::new(secret)).await?;
//! let config = ServerConfig::new(Some("admin-token".to_string()))
//!     .with_bind_address("127.0.0.1:8080".parse()?);
//!
//! Server::new(store, config).run().await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use auth::{AuthError, admin_auth_middleware};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use routes::{SessionResponse, SweepResponse};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use cellar_session::SessionStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Cellar HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server around an open store.
    pub fn new(store: SessionStore, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(store, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            // Health routes (no auth required)
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(DefaultBodyLimit::max(self.state.config().max_body_size));

        if self.state.config().request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router.with_state(self.state.clone())
    }

    /// API routes (v1).
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::get;

        Router::new()
            .route(
                "/session",
                get(routes::get_session_handler)
                    .put(routes::update_session_handler)
                    .delete(routes::delete_session_handler),
            )
            .nest("/admin", self.admin_routes())
    }

    /// Admin routes, behind the admin token when one is configured.
    fn admin_routes(&self) -> Router<AppState> {
        use axum::routing::{delete, post};

        Router::new()
            .route("/sessions/{id}", delete(routes::revoke_session_handler))
            .route("/sweep", post(routes::sweep_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::admin_auth_middleware,
            ))
    }

    /// Run the server until Ctrl-C, then close the store.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the server until `shutdown` resolves, then close the store.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener (useful for testing).
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Failed to read address: {}", e)))?;

        info!("Starting server on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped, closing session store");
        self.state.close().await
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config().bind_address
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use cellar_session::StoreConfig;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_server(dir: &TempDir) -> Server {
        let store = SessionStore::open(
            StoreConfig::new(b"0123456789abcdef0123456789abcdef".to_vec())
                .with_storage_location(dir.path().join("sessions.sqlite")),
        )
        .await
        .unwrap();
        Server::new(store, ServerConfig::new(None).with_request_logging(false))
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = test_server(&dir).await.router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let dir = TempDir::new().unwrap();
        let app = test_server(&dir).await.router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/nothing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_shuts_down_and_closes_store() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
