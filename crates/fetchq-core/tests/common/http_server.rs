//! Minimal HTTP/1.1 server for integration tests.
//!
//! Routes:
//! - `/text`    200 text/plain body
//! - `/bytes`   200 application/octet-stream, bytes 0..=255
//! - `/missing` 404
//! - `/slow`    waits `SLOW_DELAY` before answering 200 text/plain
//! - `/echo`    200 text/plain: method, request target, Cookie header and body, one per line
//! - `/cookie`  200 with `Set-Cookie: session=abc; Path=/`
//! - `/login`   302 to `/echo` with `Set-Cookie: sid=xyz; Path=/`

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub const TEXT_BODY: &str = "hello from fetchq";
/// Longer than any test waits, so `/slow` only ends early through an abort.
pub const SLOW_DELAY: Duration = Duration::from_secs(60);

/// Starts the server in a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/"). The server runs until the process exits.
pub fn start() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || handle(stream));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

struct Request {
    method: String,
    target: String,
    cookie: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?.to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let mut content_length = 0usize;
    let mut cookie = String::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("cookie") {
                cookie = value.trim().to_string();
            }
        }
    }
    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(Request {
        method,
        target,
        cookie,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: &str, extra_headers: &str, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        content_type,
        body.len(),
        extra_headers
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn handle(mut stream: TcpStream) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let path = req.target.split('?').next().unwrap_or("").to_string();
    match path.as_str() {
        "/text" => respond(&mut stream, "200 OK", "", "text/plain; charset=utf-8", TEXT_BODY.as_bytes()),
        "/bytes" => {
            let body: Vec<u8> = (0..=255u8).collect();
            respond(&mut stream, "200 OK", "", "application/octet-stream", &body);
        }
        "/slow" => {
            thread::sleep(SLOW_DELAY);
            respond(&mut stream, "200 OK", "", "text/plain", b"slow");
        }
        "/echo" => {
            let body = format!(
                "{}\n{}\n{}\n{}",
                req.method,
                req.target,
                req.cookie,
                String::from_utf8_lossy(&req.body)
            );
            respond(&mut stream, "200 OK", "", "text/plain", body.as_bytes());
        }
        "/cookie" => respond(
            &mut stream,
            "200 OK",
            "Set-Cookie: session=abc; Path=/\r\n",
            "text/plain",
            b"ok",
        ),
        "/login" => respond(
            &mut stream,
            "302 Found",
            "Set-Cookie: sid=xyz; Path=/\r\nLocation: /echo\r\n",
            "text/plain",
            b"redirecting",
        ),
        _ => respond(&mut stream, "404 Not Found", "", "text/plain", b"not found"),
    }
}
