//! Host identification for the HOST command.
//!
//! Two sources, kept apart on purpose: the local address of the socket a
//! client is connected to, and the machine itself when no socket is at hand.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing::debug;

use super::protocol::host_reply;

/// `host:ip: ` for the local end of a connection.
///
/// The name is the reverse lookup of the local address, or the address
/// itself when it does not resolve.
pub async fn host_of_socket(local: SocketAddr) -> String {
    let ip = local.ip();
    let name = reverse_lookup(ip).await.unwrap_or_else(|| ip.to_string());
    host_reply(&name, &ip.to_string())
}

/// `host:ip: ` for the machine: its hostname and the address it resolves to.
pub async fn host_of_machine() -> String {
    let hostname = tokio::task::spawn_blocking(dns_lookup::get_hostname)
        .await
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or_else(|| "localhost".to_string());

    let ip = forward_lookup(&hostname)
        .await
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    host_reply(&hostname, &ip.to_string())
}

async fn reverse_lookup(ip: IpAddr) -> Option<String> {
    match tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip)).await {
        Ok(Ok(name)) => Some(name),
        Ok(Err(e)) => {
            debug!(%ip, "Reverse lookup failed: {}", e);
            None
        }
        Err(_) => None,
    }
}

async fn forward_lookup(hostname: &str) -> Option<IpAddr> {
    let all: Vec<SocketAddr> = tokio::net::lookup_host((hostname, 0)).await.ok()?.collect();
    all.iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| all.first())
        .map(|addr| addr.ip())
}
