//! Websocket listener
//!
//! Handles the TCP accept loop, performs the websocket handshake and attaches
//! each accepted socket to its bin as a live viewer.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use super::service::Geobin;
use crate::connection::{websocket, Connection};
use crate::error::Result;

/// Path prefix of the viewer endpoint; the bin name follows it
pub const WS_PATH_PREFIX: &str = "/api/1/ws/";

/// Websocket server for live bin viewers
pub struct GeobinServer {
    app: Arc<Geobin>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl GeobinServer {
    /// Create a server for an application
    pub fn new(app: Arc<Geobin>) -> Self {
        let max = app.config().max_connections;
        let connection_semaphore = if max > 0 {
            Some(Arc::new(Semaphore::new(max)))
        } else {
            None
        };

        Self {
            app,
            connection_semaphore,
        }
    }

    /// Get a reference to the application
    pub fn app(&self) -> &Arc<Geobin> {
        &self.app
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.app.config().bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        tracing::info!(addr = %self.bind_addr(), "Geobin server listening");

        self.serve(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.bind_addr()).await?;
        tracing::info!(addr = %self.bind_addr(), "Geobin server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(&listener) => result,
        }
    }

    /// Accept connections from an already bound listener
    pub async fn serve(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.app.config().tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        tracing::debug!(peer = %peer_addr, "New connection");

        let app = Arc::clone(&self.app);
        tokio::spawn(async move {
            let Some(conn) = accept_viewer(&app, socket, peer_addr).await else {
                return;
            };

            // Hold the permit for the lifetime of the viewer
            conn.closed().await;
            drop(permit);
        });
    }
}

async fn accept_viewer(
    app: &Geobin,
    socket: TcpStream,
    peer_addr: SocketAddr,
) -> Option<Connection> {
    let mut bin = None;
    let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        match bin_from_path(request.uri().path()) {
            Some(name) => {
                bin = Some(name.to_string());
                Ok(response)
            }
            None => {
                let mut rejection = ErrorResponse::new(Some("Not found".to_string()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        }
    };

    let handshake = tokio_tungstenite::accept_hdr_async(socket, callback);
    let mut ws = match tokio::time::timeout(app.config().connection.write_timeout, handshake).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            tracing::debug!(peer = %peer_addr, error = %e, "Handshake failed");
            return None;
        }
        Err(_) => {
            tracing::debug!(peer = %peer_addr, "Handshake timed out");
            return None;
        }
    };

    let bin = bin?;
    if !app.store().exists(&bin).await {
        tracing::debug!(peer = %peer_addr, bin = %bin, "Viewer for unknown bin");
        let _ = ws.close(None).await;
        return None;
    }

    let (source, sink) = websocket::split(ws);
    match app.attach_viewer(&bin, source, sink).await {
        Ok(conn) => Some(conn),
        Err(e) => {
            tracing::debug!(peer = %peer_addr, bin = %bin, error = %e, "Viewer rejected");
            None
        }
    }
}

/// Extract the bin name from a viewer endpoint path
fn bin_from_path(path: &str) -> Option<&str> {
    let bin = path.strip_prefix(WS_PATH_PREFIX)?;
    if bin.is_empty() || bin.contains('/') {
        return None;
    }
    Some(bin)
}
