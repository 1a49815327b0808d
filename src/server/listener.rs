//! Relay server listener
//!
//! Binds the HTTP listener, resumes the newest stored upload and serves the
//! relay endpoints until shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::registry::Generation;
use crate::relay::Relay;
use crate::server::config::ServerConfig;
use crate::server::handlers::{self, AppState};
use crate::server::storage::UploadStore;

/// HTTP relay server
pub struct RelayServer {
    config: Arc<ServerConfig>,
    relay: Arc<Relay>,
    store: Arc<UploadStore>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let relay = Relay::new(config.relay.clone())?;
        let store = UploadStore::new(config.upload_dir.clone());

        Ok(Self {
            config: Arc::new(config),
            relay: Arc::new(relay),
            store: Arc::new(store),
        })
    }

    /// Get a reference to the relay
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get a reference to the upload store
    pub fn store(&self) -> &Arc<UploadStore> {
        &self.store
    }

    /// Router serving the relay endpoints
    pub fn router(&self) -> Router {
        handlers::router(AppState {
            relay: Arc::clone(&self.relay),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        })
    }

    /// Install the most recently stored upload as the active source
    ///
    /// A failure here is logged and the server keeps running without a
    /// source; the next upload installs one.
    pub async fn resume(&self) -> Option<Generation> {
        let path = match self.store.latest().await {
            Ok(Some(path)) => path,
            Ok(None) => {
                tracing::debug!(dir = %self.store.dir().display(), "No stored upload to resume");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to scan upload directory");
                return None;
            }
        };

        match self.relay.replace_file(&path).await {
            Ok(generation) => {
                tracing::info!(
                    generation = %generation,
                    path = %path.display(),
                    "Resumed stored upload"
                );
                Some(generation)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to resume stored upload");
                None
            }
        }
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// Prepares the upload directory and resumes the newest upload first.
    /// When `shutdown` completes the relay stops its source and disconnects
    /// every listener, which lets open streams finish.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.store.ensure_dir().await?;
        if self.config.resume_latest {
            self.resume().await;
        }

        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            upload_dir = %self.store.dir().display(),
            "Relay server listening"
        );

        let relay = Arc::clone(&self.relay);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                relay.shutdown().await;
            })
            .await?;

        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
