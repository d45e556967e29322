//! TCP reachability probe used for proxy readiness.

use std::time::Duration;

use tokio::net::TcpStream;

/// Returns `true` if a TCP connection to `host:port` succeeds within `timeout`.
/// The connection is dropped immediately.
pub async fn is_listening(host: &str, port: u16, timeout: Duration) -> bool {
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
