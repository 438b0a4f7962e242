//! Minimal HTTP/1.1 mock servers for integration tests.
//!
//! Every variant records the request heads it observes so tests can assert
//! on what actually went over the wire. Responses use `Connection: close`;
//! the client reconnects for each exchange.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// One request head as the server observed it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

pub struct MockHttpServer {
    listener: TcpListener,
    port: u16,
    requests: RequestLog,
}

impl MockHttpServer {
    /// Bind to a random loopback port.
    pub async fn bind() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            port,
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn tls_url(&self) -> String {
        format!("https://localhost:{}", self.port)
    }

    /// Handle to the recorded requests, usable after the server is started.
    pub fn requests(&self) -> RequestLog {
        Arc::clone(&self.requests)
    }

    /// Answer every request with 200.
    pub fn start(self) -> JoinHandle<()> {
        let requests = self.requests;
        let listener = self.listener;
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let requests = Arc::clone(&requests);
                tokio::spawn(async move {
                    if let Some(req) = read_request(&mut stream).await {
                        requests.lock().unwrap().push(req);
                        let _ = stream.write_all(response_200().as_bytes()).await;
                    }
                });
            }
        })
    }

    /// Drive the NTLM handshake: bare 401 demand, then a challenge for a
    /// NEGOTIATE token, then 200 for an AUTHENTICATE token.
    pub fn start_ntlm(self) -> JoinHandle<()> {
        let requests = self.requests;
        let listener = self.listener;
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let requests = Arc::clone(&requests);
                tokio::spawn(async move {
                    let Some(req) = read_request(&mut stream).await else {
                        return;
                    };
                    let response = ntlm_response(&req);
                    requests.lock().unwrap().push(req);
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        })
    }

    /// Answer 200 only to requests carrying a Basic `Authorization` header;
    /// everything else gets a 401 demanding Basic (never NTLM).
    pub fn start_basic_gate(self) -> JoinHandle<()> {
        let requests = self.requests;
        let listener = self.listener;
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let requests = Arc::clone(&requests);
                tokio::spawn(async move {
                    let Some(req) = read_request(&mut stream).await else {
                        return;
                    };
                    let authorized = req
                        .header("authorization")
                        .is_some_and(|a| a.starts_with("Basic "));
                    requests.lock().unwrap().push(req);
                    let response = if authorized {
                        response_200()
                    } else {
                        response_401_basic()
                    };
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        })
    }

    /// Read the request and never answer it.
    pub fn start_stalled(self) -> JoinHandle<()> {
        let requests = self.requests;
        let listener = self.listener;
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let requests = Arc::clone(&requests);
                tokio::spawn(async move {
                    if let Some(req) = read_request(&mut stream).await {
                        requests.lock().unwrap().push(req);
                    }
                    // Hold the connection open without responding.
                    tokio::time::sleep(Duration::from_secs(600)).await;
                });
            }
        })
    }

    /// Serve 200 over TLS with the given acceptor.
    pub fn start_tls(self, acceptor: tokio_native_tls::TlsAcceptor) -> JoinHandle<()> {
        let requests = self.requests;
        let listener = self.listener;
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let requests = Arc::clone(&requests);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = acceptor.accept(stream).await else {
                        // Handshake refused by the client (e.g. cert rejected).
                        return;
                    };
                    if let Some(req) = read_request(&mut stream).await {
                        requests.lock().unwrap().push(req);
                        let _ = stream.write_all(response_200().as_bytes()).await;
                    }
                });
            }
        })
    }
}

/// Self-signed identity for `localhost`, for TLS verification tests.
pub fn self_signed_identity() -> native_tls::Identity {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("certificate generation");
    native_tls::Identity::from_pkcs8(
        cert.pem().as_bytes(),
        key_pair.serialize_pem().as_bytes(),
    )
    .expect("identity from generated pem")
}

async fn read_request<S>(stream: &mut S) -> Option<RecordedRequest>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            // Tests only send bodyless requests; ignore anything after the head.
            return parse_head(&buf[..end]);
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_head(head: &[u8]) -> Option<RecordedRequest> {
    let head = std::str::from_utf8(head).ok()?;
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers = lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect();
    Some(RecordedRequest {
        method,
        path,
        headers,
    })
}

fn response_200() -> String {
    let body = "Hello from mock server";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn response_401_basic() -> String {
    "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"mock\"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        .to_string()
}

fn response_401_ntlm(token: Option<String>) -> String {
    let demand = match token {
        Some(token) => format!("NTLM {token}"),
        None => "NTLM".to_string(),
    };
    format!(
        "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: {demand}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
}

fn ntlm_response(req: &RecordedRequest) -> String {
    let auth = req.header("authorization").unwrap_or("");
    let Some(token) = auth.strip_prefix("NTLM ") else {
        // No NTLM token yet (no auth, or Basic): demand negotiation.
        return response_401_ntlm(None);
    };
    let raw = BASE64.decode(token.trim()).unwrap_or_default();
    match message_type(&raw) {
        1 => response_401_ntlm(Some(BASE64.encode(challenge_message()))),
        3 => response_200(),
        _ => response_401_ntlm(None),
    }
}

fn message_type(msg: &[u8]) -> u32 {
    if msg.len() < 12 || &msg[..8] != b"NTLMSSP\0" {
        return 0;
    }
    u32::from_le_bytes([msg[8], msg[9], msg[10], msg[11]])
}

/// A CHALLENGE (type 2) message with a fixed server challenge and a minimal
/// target info block.
fn challenge_message() -> Vec<u8> {
    const UNICODE: u32 = 0x0000_0001;
    const NTLM: u32 = 0x0000_0200;
    const TARGET_INFO: u32 = 0x0080_0000;

    let target_info = {
        let name: Vec<u8> = "TESTDOM"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        let mut ti = Vec::new();
        ti.extend_from_slice(&2u16.to_le_bytes()); // MsvAvNbDomainName
        ti.extend_from_slice(&(name.len() as u16).to_le_bytes());
        ti.extend_from_slice(&name);
        ti.extend_from_slice(&[0u8; 4]); // MsvAvEOL
        ti
    };

    let mut msg = Vec::new();
    msg.extend_from_slice(b"NTLMSSP\0");
    msg.extend_from_slice(&2u32.to_le_bytes());
    // empty target name, offset past the 48-byte header
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&0u16.to_le_bytes());
    msg.extend_from_slice(&48u32.to_le_bytes());
    msg.extend_from_slice(&(UNICODE | NTLM | TARGET_INFO).to_le_bytes());
    msg.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    msg.extend_from_slice(&[0u8; 8]); // reserved
    let len = target_info.len() as u16;
    msg.extend_from_slice(&len.to_le_bytes());
    msg.extend_from_slice(&len.to_le_bytes());
    msg.extend_from_slice(&48u32.to_le_bytes());
    msg.extend_from_slice(&target_info);
    msg
}
