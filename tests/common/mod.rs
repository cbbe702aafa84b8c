//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use api_gateway::audit::MemoryStore;
use api_gateway::config::parse_routes;
use api_gateway::{Gateway, GatewayConfig, GatewayError, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A raw-TCP upstream that records what it receives.
#[allow(dead_code)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicU32>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockUpstream {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn last_request(&self) -> Option<String> {
        self.requests.lock().unwrap().last().cloned()
    }
}

/// Build a complete HTTP/1.1 response that closes the connection.
#[allow(dead_code)]
pub fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ));
    out
}

/// Start a programmable upstream on an ephemeral port.
///
/// `respond` receives the 1-based call number and the raw request text and
/// returns the raw response to write back.
pub async fn start_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(u32, &str) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let (c, r) = (calls.clone(), requests.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let (calls, requests, respond) = (c.clone(), r.clone(), respond.clone());
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let response = respond(n, &request);
                requests.lock().unwrap().push(request);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockUpstream {
        addr,
        calls,
        requests,
    }
}

/// Upstream that always answers `200 OK` with `body`.
#[allow(dead_code)]
pub async fn start_mock_backend(body: &'static str) -> MockUpstream {
    start_upstream(move |_, _| http_response("200 OK", &[], body)).await
}

async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return Some(String::from_utf8_lossy(&buf).into_owned());
            }
        }
    }
}

/// A gateway serving on an ephemeral port with an in-memory audit store.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    shutdown: Shutdown,
    server: JoinHandle<Result<(), GatewayError>>,
}

#[allow(dead_code)]
impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the audit queue to drain.
    pub async fn stop(self) -> Arc<MemoryStore> {
        self.shutdown.trigger();
        self.server.await.unwrap().unwrap();
        self.store
    }
}

/// Fast retries and generous limits unless a test says otherwise.
#[allow(dead_code)]
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.retries.delay_ms = 10;
    config.rate_limit.requests_per_second = 1000.0;
    config.rate_limit.burst_size = 1000;
    config.timeouts.request_secs = 5;
    config
}

pub async fn start_gateway(config: GatewayConfig, routes_json: &str) -> TestGateway {
    let routes = parse_routes(routes_json).unwrap();
    let store = Arc::new(MemoryStore::new());
    let gateway = Gateway::new(config, &routes, store.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = tokio::spawn(async move { gateway.run(listener, rx).await });

    TestGateway {
        addr,
        store,
        shutdown,
        server,
    }
}

/// HTTP client that never pools, so every request opens a fresh connection.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
