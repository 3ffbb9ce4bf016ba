//! Minimal HTTP/1.1 imitation of the GitHub contents API for integration tests.
//!
//! Serves `/repos/{owner}/{repo}/contents/{path}` for GET, PUT and DELETE with
//! sha checks, requires `Authorization: Bearer <token>`, and can be told to
//! answer the next requests with an error status. One request per connection.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const TOKEN: &str = "test-token";
pub const OWNER: &str = "alice";
pub const REPO: &str = "archive-store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, (String, Vec<u8>)>,
    next_sha: u64,
    failures: VecDeque<u16>,
    log: Vec<LoggedRequest>,
}

impl State {
    fn new_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("{:040x}", self.next_sha)
    }
}

/// Handle to a running fake server.
#[derive(Clone)]
pub struct FakeGitHub {
    pub base: String,
    state: Arc<Mutex<State>>,
}

impl FakeGitHub {
    /// Starts a server in a background thread; it runs until the process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>) -> String {
        let mut st = self.state.lock().unwrap();
        let sha = st.new_sha();
        st.files.insert(path.to_string(), (sha.clone(), bytes.into()));
        sha
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).map(|(_, b)| b.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        self.state.lock().unwrap().files.keys().cloned().collect()
    }

    /// Answers the next request with `status` instead of serving it.
    pub fn fail_next(&self, status: u16) {
        self.state.lock().unwrap().failures.push_back(status);
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state.lock().unwrap().log.clone()
    }
}

struct Parsed {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Parsed {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn read_request(stream: &TcpStream) -> Option<Parsed> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut h = String::new();
        if reader.read_line(&mut h).ok()? == 0 {
            break;
        }
        let h = h.trim_end();
        if h.is_empty() {
            break;
        }
        if let Some((n, v)) = h.split_once(':') {
            headers.push((n.trim().to_string(), v.trim().to_string()));
        }
    }

    let len = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    if headers
        .iter()
        .any(|(n, v)| n.eq_ignore_ascii_case("expect") && v.eq_ignore_ascii_case("100-continue"))
    {
        let mut s = stream.try_clone().ok()?;
        s.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").ok()?;
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).ok()?;
    Some(Parsed {
        method,
        target,
        headers,
        body,
    })
}

fn respond(mut stream: TcpStream, status: u16, body: &Value) {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let payload = body.to_string();
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        payload.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(payload.as_bytes());
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(b) = u8::from_str_radix(hex, 16) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn message(text: &str) -> Value {
    json!({ "message": text, "documentation_url": "https://docs.github.com/rest" })
}

fn file_json(path: &str, sha: &str, bytes: &[u8]) -> Value {
    // The real API wraps base64 at 60 columns.
    let encoded = STANDARD.encode(bytes);
    let wrapped: Vec<String> = encoded
        .as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect();
    json!({
        "type": "file",
        "name": path.rsplit('/').next().unwrap_or(path),
        "path": path,
        "sha": sha,
        "size": bytes.len(),
        "encoding": "base64",
        "content": wrapped.join("\n") + "\n",
    })
}

fn listing_json(files: &BTreeMap<String, (String, Vec<u8>)>, dir: &str) -> Option<Value> {
    let prefix = format!("{}/", dir);
    let mut dirs = BTreeSet::new();
    let mut entries = Vec::new();
    for (path, (sha, _)) in files {
        let Some(rest) = path.strip_prefix(&prefix) else {
            continue;
        };
        match rest.split_once('/') {
            Some((sub, _)) => {
                dirs.insert(sub.to_string());
            }
            None => entries.push(json!({
                "type": "file", "name": rest, "path": path, "sha": sha,
            })),
        }
    }
    for d in dirs {
        entries.push(json!({
            "type": "dir", "name": d, "path": format!("{}{}", prefix, d), "sha": "0",
        }));
    }
    (!entries.is_empty()).then(|| Value::Array(entries))
}

fn handle(stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&stream) else {
        return;
    };

    let path_only = req.target.split('?').next().unwrap_or("");
    let body_json: Option<Value> = serde_json::from_slice(&req.body).ok();
    let mut st = state.lock().unwrap();

    let prefix = format!("/repos/{}/{}/contents/", OWNER, REPO);
    let Some(raw_path) = path_only.strip_prefix(&prefix) else {
        drop(st);
        return respond(stream, 404, &message("Not Found"));
    };
    let path = percent_decode(raw_path).trim_matches('/').to_string();
    st.log.push(LoggedRequest {
        method: req.method.clone(),
        path: path.clone(),
        body: body_json.clone(),
    });

    if let Some(status) = st.failures.pop_front() {
        drop(st);
        return respond(stream, status, &message("injected failure"));
    }
    let expected_auth = format!("Bearer {}", TOKEN);
    if req.header("authorization") != Some(expected_auth.as_str()) {
        drop(st);
        return respond(stream, 401, &message("Bad credentials"));
    }

    let (status, body) = match req.method.as_str() {
        "GET" => match st.files.get(&path) {
            Some((sha, bytes)) => (200, file_json(&path, sha, bytes)),
            None => match listing_json(&st.files, &path) {
                Some(listing) => (200, listing),
                None => (404, message("Not Found")),
            },
        },
        "PUT" => {
            let body = body_json.unwrap_or(Value::Null);
            let given = body.get("sha").and_then(Value::as_str);
            let content = body.get("content").and_then(Value::as_str).unwrap_or("");
            match (st.files.get(&path).map(|(s, _)| s.clone()), given) {
                (Some(_), None) => (422, message("Invalid request.\n\n\"sha\" wasn't supplied.")),
                (Some(cur), Some(g)) if cur != g => {
                    (409, message(&format!("{} does not match {}", path, g)))
                }
                (existing, _) => match STANDARD.decode(content) {
                    Ok(bytes) => {
                        let sha = st.new_sha();
                        st.files.insert(path.clone(), (sha.clone(), bytes));
                        let status = if existing.is_some() { 200 } else { 201 };
                        (
                            status,
                            json!({
                                "content": {
                                    "path": path,
                                    "sha": sha,
                                    "html_url": format!(
                                        "https://github.com/{}/{}/blob/main/{}",
                                        OWNER, REPO, path
                                    ),
                                },
                                "commit": { "sha": "c0ffee" },
                            }),
                        )
                    }
                    Err(_) => (422, message("content is not valid Base64")),
                },
            }
        }
        "DELETE" => {
            let given = body_json
                .as_ref()
                .and_then(|b| b.get("sha"))
                .and_then(Value::as_str)
                .map(str::to_string);
            match (st.files.get(&path).map(|(s, _)| s.clone()), given) {
                (None, _) => (404, message("Not Found")),
                (Some(cur), Some(g)) if cur == g => {
                    st.files.remove(&path);
                    (200, json!({ "content": null, "commit": { "sha": "c0ffee" } }))
                }
                (Some(_), _) => (409, message("sha does not match")),
            }
        }
        _ => (404, message("Not Found")),
    };
    drop(st);
    respond(stream, status, &body);
}
