//! Wire-format snapshots of requests and responses for audit records.

use std::fmt::Write;

use axum::http::{header, HeaderMap, Method, StatusCode, Uri, Version};

const REDACTED: &str = "[redacted]";

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let value = if name == header::AUTHORIZATION || name == header::PROXY_AUTHORIZATION {
            REDACTED.into()
        } else {
            String::from_utf8_lossy(value.as_bytes())
        };
        let _ = write!(out, "{}: {}\r\n", name, value);
    }
    out.push_str("\r\n");
}

/// Append up to `limit` bytes of `body`, noting how much was cut.
pub fn write_body(out: &mut String, body: &[u8], limit: usize) {
    let shown = body.len().min(limit);
    out.push_str(&String::from_utf8_lossy(&body[..shown]));
    if body.len() > shown {
        let _ = write!(out, "\r\n[{} bytes truncated]", body.len() - shown);
    }
}

/// Request line, headers and (optionally) body. Credentials are redacted.
pub fn dump_request(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Option<&[u8]>,
    limit: usize,
) -> String {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let mut out = format!("{} {} HTTP/1.1\r\n", method, target);
    if let Some(authority) = uri.authority() {
        if !headers.contains_key(header::HOST) {
            let _ = write!(out, "host: {}\r\n", authority);
        }
    }
    write_headers(&mut out, headers);
    if let Some(body) = body {
        write_body(&mut out, body, limit);
    }
    out
}

/// Status line and headers of a response.
pub fn dump_response_head(version: Version, status: StatusCode, headers: &HeaderMap) -> String {
    let mut out = format!(
        "{:?} {} {}\r\n",
        version,
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    write_headers(&mut out, headers);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_dump_redacts_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let uri = Uri::from_static("http://up.example/api/users?page=2");

        let dump = dump_request(&Method::POST, &uri, &headers, Some(b"{\"a\":1}"), 1024);
        assert!(dump.starts_with("POST /api/users?page=2 HTTP/1.1\r\nhost: up.example\r\n"));
        assert!(dump.contains("authorization: [redacted]\r\n"));
        assert!(!dump.contains("secret-token"));
        assert!(dump.ends_with("\r\n\r\n{\"a\":1}"));
    }

    #[test]
    fn test_body_truncation() {
        let mut out = String::new();
        write_body(&mut out, b"abcdefghij", 4);
        assert_eq!(out, "abcd\r\n[6 bytes truncated]");
    }

    #[test]
    fn test_response_head() {
        let mut headers = HeaderMap::new();
        headers.insert("x-upstream", HeaderValue::from_static("a"));
        let dump = dump_response_head(Version::HTTP_11, StatusCode::NOT_FOUND, &headers);
        assert_eq!(dump, "HTTP/1.1 404 Not Found\r\nx-upstream: a\r\n\r\n");
    }
}
