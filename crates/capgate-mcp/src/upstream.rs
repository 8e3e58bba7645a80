//! Upstream socket client and the forwarding handler backing every
//! manifest-declared capability.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use capgate_registry::{Handler, HandlerError, RequestContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

pub struct SocketClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
}

impl SocketClient {
    pub async fn connect_to(path: &Path) -> Result<Self, std::io::Error> {
        match UnixStream::connect(path).await {
            Ok(stream) => {
                let (r, w) = tokio::io::split(stream);
                Ok(Self {
                    reader: BufReader::new(r),
                    writer: w,
                })
            }
            Err(err) => {
                tracing::warn!(socket = %path.display(), error = %err, "could not connect to upstream socket");
                Err(err)
            }
        }
    }

    pub async fn call(&mut self, request: &SocketRequest) -> Result<SocketResponse, std::io::Error> {
        let payload =
            serde_json::to_string(request).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        self.writer.write_all(payload.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "socket closed while waiting for response",
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Error reported by the upstream service itself, as opposed to a transport failure.
#[derive(Debug)]
pub struct UpstreamFault(pub Value);

impl std::fmt::Display for UpstreamFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream error: {}", self.0)
    }
}

impl std::error::Error for UpstreamFault {}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Forwards a call to one upstream method over a fresh socket connection.
#[derive(Debug, Clone)]
pub struct ForwardingHandler {
    socket: PathBuf,
    method: String,
}

impl ForwardingHandler {
    pub fn new(socket: PathBuf, method: impl Into<String>) -> Self {
        Self {
            socket,
            method: method.into(),
        }
    }
}

#[async_trait]
impl Handler for ForwardingHandler {
    async fn handle(&self, ctx: &RequestContext, params: Value) -> Result<Value, HandlerError> {
        if ctx.is_done() {
            return Err("request cancelled before upstream call".into());
        }

        let request = SocketRequest {
            jsonrpc: "2.0".to_string(),
            id: json!(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            method: self.method.clone(),
            params,
        };

        let call = async {
            let mut client = SocketClient::connect_to(&self.socket).await?;
            client.call(&request).await
        };
        let response = tokio::select! {
            res = call => res?,
            _ = ctx.cancellation().cancelled() => return Err("request cancelled".into()),
        };

        if let Some(err) = response.error {
            return Err(Box::new(UpstreamFault(err)));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }
}
