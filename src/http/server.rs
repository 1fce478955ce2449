use std::{io, net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info};

use super::{handler::handle_client, router::SharedRoutes};

/// Stops a running [`MockServer`]. Cloneable, idempotent and safe to use from a
/// signal handler task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if !self.tx.send_replace(true) {
            info!("Shutting down mock server");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

pub struct MockServer {
    listener: TcpListener,
    routes: SharedRoutes,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MockServer {
    pub async fn bind(address: &str, routes: SharedRoutes) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let (tx, rx) = watch::channel(false);
        Ok(MockServer {
            listener,
            routes,
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Accepts connections until shut down. Each connection is served from the route
    /// snapshot current at accept time. The listening socket is released on return.
    pub async fn run(self) -> io::Result<()> {
        let MockServer {
            listener,
            routes,
            shutdown_tx: _keep_alive,
            mut shutdown_rx,
        } = self;
        info!(addr = %listener.local_addr()?, "Server listening");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            error!(error = %err, "Failed to accept connection");
                            continue;
                        }
                    };
                    let snapshot = routes.snapshot();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, snapshot).await {
                            error!(%peer, "Error handling client: {}", e);
                        }
                    });
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        drop(listener);
        info!("Server stopped");
        Ok(())
    }
}
