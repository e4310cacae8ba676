//! Per-connection read/dispatch loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::host::{host_of_machine, host_of_socket};
use super::protocol::{Command, Request, Response, BUFFER_SIZE};
use crate::error::{Result, SkkError};
use crate::lookup::LookupService;

/// Serves one client until it sends END, disconnects, or fails.
///
/// Errors end only this connection and are never propagated.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, service: Arc<LookupService>) {
    info!(%peer, "Client connected");

    let local = stream.local_addr().ok();
    match serve(stream, local, &service).await {
        Ok(()) => info!(%peer, "Client disconnected"),
        Err(e) => debug!(%peer, "Connection closed: {}", e),
    }
}

/// Runs the command loop over any byte stream.
///
/// Each read of up to [`BUFFER_SIZE`] bytes is treated as one frame. `local`
/// is the local socket address reported by HOST.
pub async fn serve<S>(
    mut stream: S,
    local: Option<SocketAddr>,
    service: &Arc<LookupService>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; BUFFER_SIZE];

    loop {
        let n = stream.read(&mut buf).await?;
        let Some(command) = Command::parse(&buf[..n]) else {
            // Peer closed
            return Ok(());
        };

        let response = match command {
            Command::End => {
                // The client is leaving either way
                if let Err(e) = stream.shutdown().await {
                    debug!("Shutdown after END failed: {}", e);
                }
                return Ok(());
            }
            Command::Request(request) => answer_request(request, service).await,
            Command::Version => Response::Version,
            Command::Host => Response::Host(match local {
                Some(addr) => host_of_socket(addr).await,
                None => host_of_machine().await,
            }),
            Command::Unknown(tag) => {
                debug!(tag, "Ignoring unknown command");
                continue;
            }
        };

        stream.write_all(&response.encode()).await?;
        stream.flush().await?;
    }
}

async fn answer_request(request: Request<'_>, service: &Arc<LookupService>) -> Response {
    match lookup(&request, service).await {
        Ok(candidates) => Response::for_lookup(&request, candidates),
        Err(e) => {
            warn!("Request failed: {}", e);
            Response::Error(e.to_string())
        }
    }
}

async fn lookup(request: &Request<'_>, service: &Arc<LookupService>) -> Result<Option<Vec<u8>>> {
    let query = request.query()?.to_vec();
    debug!(query = %String::from_utf8_lossy(&query), "Lookup");

    // Detached so the lookup finishes and gets cached even if the client leaves.
    let service = Arc::clone(service);
    tokio::spawn(async move { service.resolve(&query).await })
        .await
        .map_err(|e| SkkError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::cache::CacheStore;
    use async_trait::async_trait;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::ReadBuf;
    use tokio_test::io::Builder;

    /// Knows exactly one word.
    struct OneWordBackend;

    #[async_trait]
    impl Backend for OneWordBackend {
        async fn fetch(&self, query: &[u8]) -> Option<Vec<u8>> {
            (query == "かんじ".as_bytes()).then(|| "/漢字/感じ".as_bytes().to_vec())
        }
    }

    /// Fails every lookup by panicking.
    struct PanickingBackend;

    #[async_trait]
    impl Backend for PanickingBackend {
        async fn fetch(&self, _query: &[u8]) -> Option<Vec<u8>> {
            panic!("backend exploded");
        }
    }

    /// Stream whose write half can no longer be shut down.
    struct BrokenShutdown<S>(S);

    impl<S: AsyncRead + Unpin> AsyncRead for BrokenShutdown<S> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl<S: AsyncWrite + Unpin> AsyncWrite for BrokenShutdown<S> {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::ErrorKind::NotConnected.into()))
        }
    }

    fn service(backend: Arc<dyn Backend>) -> Arc<LookupService> {
        Arc::new(LookupService::new(
            CacheStore::new(Duration::from_secs(60), None),
            backend,
        ))
    }

    #[tokio::test]
    async fn test_version() {
        let mock = Builder::new()
            .read(b"2")
            .write(b"SocialSKK0.2 ")
            .read(b"0")
            .build();

        serve(mock, None, &service(Arc::new(OneWordBackend))).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_found() {
        let mock = Builder::new()
            .read("1かんじ \n".as_bytes())
            .write("1/漢字/感じ\n".as_bytes())
            .read(b"0")
            .build();

        serve(mock, None, &service(Arc::new(OneWordBackend))).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_not_found_echoes_payload() {
        let mock = Builder::new()
            .read("1ほげ \n".as_bytes())
            .write("4ほげ \n\n".as_bytes())
            .read(b"0")
            .build();

        serve(mock, None, &service(Arc::new(OneWordBackend))).await.unwrap();
    }

    #[tokio::test]
    async fn test_end_writes_nothing() {
        let mock = Builder::new().read(b"0").build();
        serve(mock, None, &service(Arc::new(OneWordBackend))).await.unwrap();
    }

    #[tokio::test]
    async fn test_end_with_failed_shutdown_still_ends_cleanly() {
        let mock = Builder::new()
            .read(b"2")
            .write(b"SocialSKK0.2 ")
            .read(b"0")
            .build();

        let result = serve(BrokenShutdown(mock), None, &service(Arc::new(OneWordBackend))).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_eof_closes_quietly() {
        let mock = Builder::new().read(b"2").write(b"SocialSKK0.2 ").build();
        serve(mock, None, &service(Arc::new(OneWordBackend))).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_tag_is_ignored() {
        let mock = Builder::new()
            .read(b"9whatever")
            .read(b"2")
            .write(b"SocialSKK0.2 ")
            .read(b"0")
            .build();

        serve(mock, None, &service(Arc::new(OneWordBackend))).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_connection_open() {
        let mock = Builder::new()
            .read(b"1nodelimiter")
            .write(b"0Malformed request: request has no space or newline terminator")
            .read(b"2")
            .write(b"SocialSKK0.2 ")
            .read(b"0")
            .build();

        serve(mock, None, &service(Arc::new(OneWordBackend))).await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_panic_becomes_error_frame() {
        let svc = service(Arc::new(PanickingBackend));
        let (client, server) = tokio::io::duplex(BUFFER_SIZE);
        let task = tokio::spawn(async move { serve(server, None, &svc).await });

        let (mut rd, mut wr) = tokio::io::split(client);
        wr.write_all(b"1kana \n").await.unwrap();

        let mut reply = [0u8; BUFFER_SIZE];
        let n = rd.read(&mut reply).await.unwrap();
        assert_eq!(reply[0], b'0');
        assert!(n > 1);

        wr.write_all(b"0").await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_host_reports_local_address() {
        let (client, server) = tokio::io::duplex(BUFFER_SIZE);
        let local: SocketAddr = "127.0.0.1:55100".parse().unwrap();
        let svc = service(Arc::new(OneWordBackend));
        let task = tokio::spawn(async move { serve(server, Some(local), &svc).await });

        let (mut rd, mut wr) = tokio::io::split(client);
        wr.write_all(b"3").await.unwrap();

        let mut reply = [0u8; BUFFER_SIZE];
        let n = rd.read(&mut reply).await.unwrap();
        let text = String::from_utf8_lossy(&reply[..n]);
        assert!(text.ends_with(":127.0.0.1: "), "got {:?}", text);

        drop(wr);
        drop(rd);
        task.await.unwrap().unwrap();
    }
}
