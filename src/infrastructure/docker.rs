//! # Docker Engine Adapter
//!
//! Implements `ContainerRuntime` against the Docker Engine HTTP API on its unix socket.
//!
//! Every call performs a `hyper` HTTP/1.1 handshake on a fresh socket connection.
//! `attach` and `exec start` upgrade that connection instead, after which it
//! carries the raw multiplexed stdout/stderr stream and accepts stdin writes.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{CONNECTION, CONTENT_TYPE, HOST, UPGRADE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::domain::error::BridgeError;
use crate::domain::traits::ContainerRuntime;
use crate::domain::types::{Connection, ContainerHandle, ContainerState};

const API_VERSION: &str = "v1.41";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DockerClient {
    socket: PathBuf,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "State", default)]
    state: String,
}

#[derive(Deserialize)]
struct ContainerInspect {
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Deserialize)]
struct InspectState {
    #[serde(rename = "Running", default)]
    running: bool,
    #[serde(rename = "StartedAt", default)]
    started_at: Option<String>,
}

#[derive(Deserialize)]
struct IdResponse {
    #[serde(rename = "Id")]
    id: String,
}

fn api_path(path: &str, query: &[(&str, &str)]) -> String {
    let base = format!("http://docker/{}{}", API_VERSION, path);
    match Url::parse(&base) {
        Ok(mut url) => {
            if !query.is_empty() {
                url.query_pairs_mut().extend_pairs(query);
            }
            match url.query() {
                Some(q) => format!("{}?{}", url.path(), q),
                None => url.path().to_string(),
            }
        }
        Err(_) => format!("/{}{}", API_VERSION, path),
    }
}

fn build_request(
    method: Method,
    path: &str,
    body: Option<&Value>,
    upgrade: bool,
) -> Result<Request<Full<Bytes>>, http::Error> {
    let body = body.map(|b| b.to_string()).unwrap_or_default();
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, "docker")
        .header(CONTENT_TYPE, "application/json");
    if upgrade {
        builder = builder.header(CONNECTION, "Upgrade").header(UPGRADE, "tcp");
    }
    builder.body(Full::new(Bytes::from(body)))
}

fn started_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(raw?).ok()?.with_timezone(&Utc);
    // never started containers report year 1
    (dt.timestamp() > 0).then_some(dt)
}

fn io_error(e: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::other(e)
}

impl DockerClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound on a plain API round trip and on an upgrade handshake.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens a connection and sends `request` on it.
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<Incoming>, BridgeError> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|e| BridgeError::transport("connect", e))?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| BridgeError::transport("handshake", io_error(e)))?;
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                tracing::debug!("docker connection closed: {}", e);
            }
        });

        sender
            .send_request(request)
            .await
            .map_err(|e| BridgeError::transport("request", io_error(e)))
    }

    /// One request/response round trip. Returns the status and collected body.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Bytes), BridgeError> {
        let request = build_request(method.clone(), path, body, false)
            .map_err(|e| BridgeError::transport("request", io_error(e)))?;

        let round_trip = async {
            let response = self.send(request).await?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| BridgeError::transport("response", io_error(e)))?
                .to_bytes();
            Ok::<_, BridgeError>((status, body))
        };

        let (status, body) = timeout(self.timeout, round_trip).await.map_err(|_| {
            BridgeError::transport(
                "response",
                io::Error::new(io::ErrorKind::TimedOut, "docker did not answer in time"),
            )
        })??;
        tracing::debug!("docker {} {} -> {}", method, path, status);
        Ok((status, body))
    }

    async fn call_json<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, String> {
        let (status, bytes) = self.call(method, path, body).await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!(
                "HTTP {}: {}",
                status,
                String::from_utf8_lossy(&bytes).trim()
            ));
        }
        serde_json::from_slice(&bytes).map_err(|e| format!("invalid response: {e}"))
    }

    /// Sends an upgrading request and hands back the hijacked connection.
    async fn upgrade(&self, path: &str, body: Option<&Value>) -> Result<Connection, String> {
        let request =
            build_request(Method::POST, path, body, true).map_err(|e| e.to_string())?;

        let handshake = async {
            let response = self.send(request).await.map_err(|e| e.to_string())?;
            if response.status() != StatusCode::SWITCHING_PROTOCOLS {
                let status = response.status();
                let text = match response.into_body().collect().await {
                    Ok(body) => String::from_utf8_lossy(&body.to_bytes()).trim().to_string(),
                    Err(e) => e.to_string(),
                };
                return Err(format!("HTTP {status}: {text}"));
            }
            hyper::upgrade::on(response).await.map_err(|e| e.to_string())
        };

        let upgraded = timeout(self.timeout, handshake)
            .await
            .map_err(|_| "docker did not upgrade the connection in time".to_string())??;
        let (read, write) = tokio::io::split(TokioIo::new(upgraded));
        Ok(Connection::new(Box::new(read), Box::new(write)))
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn find_by_label(&self, label: &str) -> Result<ContainerHandle, BridgeError> {
        let filters = json!({ "label": [label] }).to_string();
        let path = api_path("/containers/json", &[("all", "true"), ("filters", &filters)]);
        let containers: Vec<ContainerSummary> = self
            .call_json(Method::GET, &path, None)
            .await
            .map_err(|e| BridgeError::NotFound(format!("{label} ({e})")))?;

        match containers.as_slice() {
            [] => Err(BridgeError::NotFound(label.to_string())),
            [one] if one.state != "running" => Err(BridgeError::NotRunning(one.id.clone())),
            [one] => Ok(ContainerHandle { id: one.id.clone() }),
            many => Err(BridgeError::MultipleFound {
                label: label.to_string(),
                count: many.len(),
            }),
        }
    }

    async fn attach(&self, container: &ContainerHandle) -> Result<Connection, BridgeError> {
        let path = api_path(
            &format!("/containers/{}/attach", container.id),
            &[("stream", "1"), ("stdin", "1"), ("stdout", "1"), ("stderr", "1")],
        );
        self.upgrade(&path, None)
            .await
            .map_err(|e| BridgeError::transport("attach", io::Error::other(e)))
    }

    async fn exec(
        &self,
        container: &ContainerHandle,
        argv: &[String],
    ) -> Result<Connection, BridgeError> {
        let create = json!({
            "AttachStdout": true,
            "AttachStderr": true,
            "Cmd": argv,
        });
        let exec: IdResponse = self
            .call_json(
                Method::POST,
                &api_path(&format!("/containers/{}/exec", container.id), &[]),
                Some(&create),
            )
            .await
            .map_err(|e| BridgeError::exec("create", e))?;

        let start = json!({ "Detach": false, "Tty": false });
        self.upgrade(&api_path(&format!("/exec/{}/start", exec.id), &[]), Some(&start))
            .await
            .map_err(|e| BridgeError::exec("attach", e))
    }

    async fn inspect(&self, container: &ContainerHandle) -> Result<ContainerState, BridgeError> {
        let path = api_path(&format!("/containers/{}/json", container.id), &[]);
        let info: ContainerInspect = self
            .call_json(Method::GET, &path, None)
            .await
            .map_err(|_| BridgeError::NotRunning(container.id.clone()))?;
        Ok(ContainerState {
            running: info.state.running,
            started_at: started_at(info.state.started_at.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    /// Answers one request on `socket` with `reply`, then keeps the connection open.
    fn serve_once(socket: &Path, reply: &'static [&'static [u8]]) {
        let listener = UnixListener::bind(socket).unwrap();
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = conn.read(&mut buf).await.unwrap();
            for part in reply {
                conn.write_all(part).await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
    }

    #[test]
    fn test_api_path_encodes_query() {
        assert_eq!(
            api_path("/containers/json", &[("filters", r#"{"label":["a.b=c"]}"#)]),
            "/v1.41/containers/json?filters=%7B%22label%22%3A%5B%22a.b%3Dc%22%5D%7D"
        );
        assert_eq!(api_path("/exec/abc/start", &[]), "/v1.41/exec/abc/start");
    }

    #[test]
    fn test_upgrade_request_headers() {
        let req = build_request(
            Method::POST,
            "/v1.41/exec/x/start",
            Some(&json!({"Detach": false})),
            true,
        )
        .unwrap();
        assert_eq!(req.uri(), "/v1.41/exec/x/start");
        assert_eq!(req.headers()[UPGRADE], "tcp");
        assert_eq!(req.headers()[CONNECTION], "Upgrade");
        assert_eq!(req.headers()[HOST], "docker");
    }

    #[test]
    fn test_started_at() {
        assert!(started_at(Some("0001-01-01T00:00:00Z")).is_none());
        assert_eq!(
            started_at(Some("2024-05-01T12:00:00.123456789Z"))
                .unwrap()
                .timestamp(),
            1714564800
        );
    }

    #[tokio::test]
    async fn test_find_by_label_reads_chunked_body() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        serve_once(
            &socket,
            &[
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n",
                b"10\r\n[{\"Id\":\"abc\",\"St\r\n",
                b"10\r\nate\":\"running\"}]\r\n0\r\n\r\n",
            ],
        );

        let client = DockerClient::new(&socket);
        let handle = client.find_by_label("com.mc2discord.is_server").await.unwrap();
        assert_eq!(handle.id, "abc");
    }

    #[tokio::test]
    async fn test_silent_daemon_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        serve_once(&socket, &[]);

        let client = DockerClient::new(&socket).with_timeout(Duration::from_millis(100));
        let handle = ContainerHandle { id: "abc".into() };
        let started = std::time::Instant::now();
        assert!(client.inspect(&handle).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_upgrade_keeps_bytes_after_head() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = conn.read(&mut buf).await.unwrap();
            conn.write_all(
                b"HTTP/1.1 101 UPGRADED\r\nConnection: Upgrade\r\nUpgrade: tcp\r\n\r\nearly bytes",
            )
            .await
            .unwrap();
            conn.write_all(b" then more").await.unwrap();
        });

        let client = DockerClient::new(&socket);
        let mut conn = client.upgrade("/v1.41/containers/x/attach", None).await.unwrap();
        let mut out = String::new();
        conn.reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "early bytes then more");
    }

    #[tokio::test]
    async fn test_upgrade_refused() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        serve_once(
            &socket,
            &[b"HTTP/1.1 404 Not Found\r\nContent-Length: 17\r\n\r\nno such container"],
        );

        let client = DockerClient::new(&socket);
        let handle = ContainerHandle { id: "gone".into() };
        match client.attach(&handle).await {
            Err(BridgeError::Transport { source, .. }) => {
                assert!(source.to_string().contains("no such container"))
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
