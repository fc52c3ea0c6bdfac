//! TCP transport speaking newline-delimited JSON text frames.

use crate::error::{AppResult, CommError};
use crate::protocol::{Request, Response};
use crate::transport::Transport;
use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A persistent connection to one instrument endpoint.
///
/// The connection lives for the lifetime of the handle; there is no explicit
/// teardown beyond dropping it. Each instrument is addressed by host and TCP
/// port independently (e.g. 29270 for the cryostat/magnet controller, 29170
/// for the lock-in DAQ).
pub struct TcpTransport {
    peer: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpTransport {
    /// Connects to `host:port` and keeps the stream open.
    pub async fn connect(host: &str, port: u16) -> AppResult<Self> {
        let peer = format!("{host}:{port}");
        let stream = TcpStream::connect(&peer)
            .await
            .map_err(|err| CommError::TransportUnavailable(format!("connect {peer}: {err}")))?;
        let (read_half, write_half) = stream.into_split();
        debug!("Connected to {peer}");
        Ok(Self {
            peer,
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn roundtrip(&mut self, request: &Request) -> AppResult<Response> {
        let frame = serde_json::to_string(request)
            .map_err(|err| CommError::MalformedReply(format!("request serialization: {err}")))?;
        debug!("{} <- {frame}", self.peer);

        let send = async {
            self.writer.write_all(frame.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        };
        send.await
            .map_err(|err| CommError::TransportUnavailable(format!("send to {}: {err}", self.peer)))?;

        // Blocks indefinitely: there is intentionally no reply timeout.
        let mut line = String::new();
        let bytes = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|err| CommError::TransportUnavailable(format!("recv from {}: {err}", self.peer)))?;
        if bytes == 0 {
            return Err(CommError::TransportUnavailable(format!(
                "connection closed by {}",
                self.peer
            )));
        }
        debug!("{} -> {}", self.peer, line.trim_end());

        serde_json::from_str(line.trim_end())
            .map_err(|err| CommError::MalformedReply(format!("from {}: {err}", self.peer)))
    }
}
