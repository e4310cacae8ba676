//! TCP listener: accepts clients and hands each one to its own task.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{info, info_span, warn, Instrument};

use super::connection::handle_connection;
use crate::config::Config;
use crate::error::{Result, SkkError};
use crate::lookup::LookupService;

/// Pause after a failed accept, so a persistent error (EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of client connections.
#[async_trait]
trait Incoming: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Incoming for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// The SKK server: a bound listener plus the shared lookup service.
pub struct Server {
    listener: TcpListener,
    service: Arc<LookupService>,
    /// Connection slots, None = unbounded
    slots: Option<Arc<Semaphore>>,
}

impl Server {
    /// Binds to the configured host and port.
    pub async fn bind(config: &Config, service: Arc<LookupService>) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        Ok(Self::from_listener(listener, service, config.max_connections))
    }

    /// Wraps an already bound listener.
    pub fn from_listener(
        listener: TcpListener,
        service: Arc<LookupService>,
        max_connections: Option<usize>,
    ) -> Self {
        Self {
            listener,
            service,
            slots: max_connections.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    // == Run ==
    /// Accepts connections until `shutdown` resolves.
    ///
    /// A failed accept is logged and retried after a short pause; it never
    /// stops the server. Connections that are already open keep running on
    /// their own tasks.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        accept_loop(&self.listener, self.service, self.slots, shutdown).await
    }
}

async fn accept_loop<L, F>(
    listener: &L,
    service: Arc<LookupService>,
    slots: Option<Arc<Semaphore>>,
    shutdown: F,
) -> Result<()>
where
    L: Incoming,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let permit = match &slots {
            Some(slots) => tokio::select! {
                permit = Arc::clone(slots).acquire_owned() => {
                    Some(permit.map_err(|e| SkkError::Internal(e.to_string()))?)
                }
                _ = &mut shutdown => break,
            },
            None => None,
        };

        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = &mut shutdown => break,
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed, retrying: {}", e);
                tokio::select! {
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                    _ = &mut shutdown => break,
                }
            }
        };

        let service = Arc::clone(&service);
        tokio::spawn(
            async move {
                handle_connection(stream, peer, service).await;
                drop(permit);
            }
            .instrument(info_span!("connection", %peer)),
        );
    }

    info!("Listener stopped");
    Ok(())
}
