//! Byte transport under the CLI protocol.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Time allowed for a TCP connect before the attempt fails.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Both halves of an open link.
pub struct Connection {
    pub reader: Box<dyn AsyncBufRead + Unpin + Send>,
    pub writer: Box<dyn AsyncWrite + Unpin + Send>,
}

/// Opens links to a server. Swapped out in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Connection>;
}

/// Plain TCP, the way servers expose the CLI.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Connection> {
        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("connecting to {}", addr)))??;
        stream.set_nodelay(true)?;
        debug!("TCP link open to {}", addr);

        let (reader, writer) = stream.into_split();
        Ok(Connection {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(writer),
        })
    }
}
