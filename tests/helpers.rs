// Shared test helpers: a local HTTP/1.1 server and a scripted in-memory transport.
//
// Each test binary includes this file with `mod helpers;` and uses a subset of it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use http_trace::error_handling::{TransportError, TransportErrorKind};
use http_trace::trace::{ConnectionDescriptor, TraceHooks};
use http_trace::transport::{RequestDescriptor, ResponseBody, Transport, TransportResponse};

/// How the local server answers.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Response body size in bytes
    pub body_len: usize,
    /// Send `Connection: close` and hang up after each response
    pub close: bool,
    /// Omit `Content-Length` and end the body by hanging up
    pub close_delimited: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            body_len: 64,
            close: false,
            close_delimited: false,
        }
    }
}

/// A keep-alive HTTP/1.1 server on 127.0.0.1 that counts accepted connections.
pub struct TestServer {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Same server, addressed by name so DNS hooks fire.
    pub fn localhost_url(&self) -> String {
        format!("http://localhost:{}/", self.addr.port())
    }

    /// TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Responses written so far.
    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

pub async fn start_server(options: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get address");
    let accepted = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));

    let accept_count = Arc::clone(&accepted);
    let serve_count = Arc::clone(&served);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            accept_count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_connection(
                stream,
                options.clone(),
                Arc::clone(&serve_count),
            ));
        }
    });

    TestServer {
        addr,
        accepted,
        served,
    }
}

async fn serve_connection(stream: TcpStream, options: ServerOptions, served: Arc<AtomicUsize>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let body = vec![b'x'; options.body_len];

    loop {
        // Read one request head; GET requests carry no body
        let mut line = String::new();
        let mut saw_request_line = false;
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            if line == "\r\n" || line == "\n" {
                if saw_request_line {
                    break;
                }
                continue;
            }
            saw_request_line = true;
        }

        let mut head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n".to_string();
        if !options.close_delimited {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        if options.close {
            head.push_str("Connection: close\r\n");
        }
        head.push_str("\r\n");

        if writer.write_all(head.as_bytes()).await.is_err()
            || writer.write_all(&body).await.is_err()
            || writer.flush().await.is_err()
        {
            return;
        }
        served.fetch_add(1, Ordering::SeqCst);

        if options.close || options.close_delimited {
            let _ = writer.shutdown().await;
            return;
        }
    }
}

/// A port on 127.0.0.1 with nothing listening.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let port = listener.local_addr().expect("Failed to get address").port();
    drop(listener);
    port
}

/// What the scripted transport does on its next dispatch.
#[derive(Debug, Clone)]
pub enum Step {
    /// Take a pooled connection if one is idle, else dial a new one
    Normal,
    /// Name resolution fails
    DnsFailure,
    /// The first address refuses, the second accepts
    FallbackConnect,
    /// Fire ConnectStart/ConnectDone but report the connection as reused
    ContradictoryReuse,
    /// Response arrives with `Connection: close`
    CloseAfterResponse,
    /// The first response byte arrives, then the connection drops
    FailAfterFirstByte,
}

#[derive(Debug)]
struct PooledConn {
    id: usize,
    peer: SocketAddr,
}

#[derive(Default)]
struct Pool {
    idle: VecDeque<PooledConn>,
    dialed: usize,
}

/// In-memory transport with an explicit idle pool and a per-dispatch script.
///
/// Steps are consumed in order; once the script runs out every dispatch is
/// [`Step::Normal`].
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pool: Arc<Mutex<Pool>>,
    script: Arc<Mutex<VecDeque<Step>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(steps: Vec<Step>) -> Self {
        let transport = Self::default();
        *transport.script.lock().unwrap() = steps.into();
        transport
    }

    /// Connections dialed so far.
    pub fn dialed(&self) -> usize {
        self.pool.lock().unwrap().dialed
    }

    pub fn idle(&self) -> usize {
        self.pool.lock().unwrap().idle.len()
    }

    fn dial(&self) -> PooledConn {
        let mut pool = self.pool.lock().unwrap();
        pool.dialed += 1;
        PooledConn {
            id: pool.dialed,
            peer: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)), 80),
        }
    }
}

fn resolve(hooks: &dyn TraceHooks, host: &str) -> Vec<IpAddr> {
    hooks.dns_start(host);
    let addrs = vec![
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9)),
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
    ];
    hooks.dns_done(&addrs, None);
    addrs
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        hooks: Arc<dyn TraceHooks>,
    ) -> Result<TransportResponse, TransportError> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Normal);
        let host = request.host().expect("request host");
        let port = request.port().expect("request port");
        hooks.get_conn(&request.host_port().expect("request host_port"));

        let close = matches!(step, Step::CloseAfterResponse);
        let fail_after_first_byte = matches!(step, Step::FailAfterFirstByte);
        let (conn, reused) = match step {
            Step::DnsFailure => {
                hooks.dns_start(&host);
                tokio::time::sleep(Duration::from_millis(2)).await;
                hooks.dns_done(&[], Some("lookup failed: no such host"));
                return Err(TransportError::new(
                    TransportErrorKind::Dns,
                    "lookup failed: no such host",
                ));
            }
            Step::ContradictoryReuse => {
                let addrs = resolve(hooks.as_ref(), &host);
                let addr = SocketAddr::new(addrs[0], port).to_string();
                hooks.connect_start("tcp", &addr);
                hooks.connect_done("tcp", &addr, None);
                (self.dial(), true)
            }
            Step::FallbackConnect => {
                let addrs = resolve(hooks.as_ref(), &host);
                let first = SocketAddr::new(addrs[0], port).to_string();
                let second = SocketAddr::new(addrs[1], port).to_string();
                hooks.connect_start("tcp", &first);
                hooks.connect_done("tcp", &first, Some("connection refused"));
                hooks.connect_start("tcp", &second);
                tokio::time::sleep(Duration::from_millis(1)).await;
                hooks.connect_done("tcp", &second, None);
                (self.dial(), false)
            }
            Step::Normal | Step::CloseAfterResponse | Step::FailAfterFirstByte => {
                let pooled = self.pool.lock().unwrap().idle.pop_front();
                match pooled {
                    Some(conn) => (conn, true),
                    None => {
                        let addrs = resolve(hooks.as_ref(), &host);
                        let addr = SocketAddr::new(addrs[0], port).to_string();
                        hooks.connect_start("tcp", &addr);
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        hooks.connect_done("tcp", &addr, None);
                        (self.dial(), false)
                    }
                }
            }
        };

        let descriptor = if reused {
            ConnectionDescriptor::pooled(Some(conn.peer), Some(Duration::from_millis(1)))
        } else {
            ConnectionDescriptor::fresh(Some(conn.peer))
        };
        hooks.got_conn(descriptor);
        tokio::time::sleep(Duration::from_millis(1)).await;
        hooks.got_first_response_byte();
        if fail_after_first_byte {
            // The connection is dropped, never returned to the pool
            return Err(TransportError::new(
                TransportErrorKind::Response,
                "connection closed while reading response head",
            ));
        }

        Ok(TransportResponse {
            status: 200,
            version: "HTTP/1.1".to_string(),
            remote_addr: Some(conn.peer),
            body: Box::new(ScriptedBody {
                conn: Some(conn),
                pool: Arc::clone(&self.pool),
                hooks,
                close,
            }),
        })
    }
}

struct ScriptedBody {
    conn: Option<PooledConn>,
    pool: Arc<Mutex<Pool>>,
    hooks: Arc<dyn TraceHooks>,
    close: bool,
}

#[async_trait]
impl ResponseBody for ScriptedBody {
    async fn drain(&mut self) -> Result<u64, TransportError> {
        let Some(conn) = self.conn.take() else {
            return Err(TransportError::new(
                TransportErrorKind::Body,
                "body was already drained",
            ));
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        if self.close {
            self.hooks.put_idle_conn(Some("server sent Connection: close"));
        } else {
            self.pool.lock().unwrap().idle.push_back(conn);
            self.hooks.put_idle_conn(None);
        }
        Ok(1024)
    }
}
