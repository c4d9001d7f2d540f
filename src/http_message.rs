// src/http_message.rs
//! Just enough HTTP/1.1 for the imgFS front end: incremental request
//! parsing over a growing buffer, query-string lookup and reply framing.

use crate::error::{ImgfsError, Result};
use bytes::Bytes;
use log::debug;
use std::io::Write;

pub const HTTP_PROTOCOL_ID: &str = "HTTP/1.1 ";
pub const HTTP_LINE_DELIM: &str = "\r\n";
pub const HTTP_HDR_END_DELIM: &[u8] = b"\r\n\r\n";
const HTTP_HDR_KV_DELIM: &str = ": ";
const HTTP_VERSION: &str = "HTTP/1.1";
const CONTENT_LENGTH: &str = "Content-Length";

pub const HTTP_OK: &str = "200 OK";
pub const HTTP_FOUND: &str = "302 Found";
pub const HTTP_INTERNAL_ERROR: &str = "500 Internal Server Error";

/// Headers beyond this count are dropped while parsing.
pub const MAX_HEADERS: usize = 40;
/// Initial receive buffer; a request head must fit in it.
pub const MAX_HEADER_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpMessage {
    pub method: String,
    pub uri: String,
    pub headers: Vec<HttpHeader>,
    pub body: Bytes,
}

impl HttpMessage {
    pub fn match_verb(&self, verb: &str) -> bool {
        self.method == verb
    }

    /// Prefix match on the request target.
    pub fn match_uri(&self, prefix: &str) -> bool {
        self.uri.starts_with(prefix)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }

    pub fn get_var(&self, name: &str) -> Option<&str> {
        get_var(&self.uri, name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Parse {
    /// More bytes are needed. `content_length` is known once the head is in.
    Incomplete { content_length: Option<usize> },
    Complete(HttpMessage),
}

/// Try to parse one request from the bytes received so far.
///
/// Bytes past `head + Content-Length` are ignored.
pub fn parse_message(received: &[u8]) -> Result<Parse> {
    let Some(end) = find(received, HTTP_HDR_END_DELIM) else {
        return Ok(Parse::Incomplete { content_length: None });
    };
    let header_len = end + HTTP_HDR_END_DELIM.len();

    let head = std::str::from_utf8(&received[..end])
        .map_err(|_| ImgfsError::Protocol("request head is not UTF-8".into()))?;
    let mut lines = head.split(HTTP_LINE_DELIM);

    // 1. Request line
    let request_line = lines.next().unwrap_or_default();
    let mut tokens = request_line.splitn(3, ' ');
    let (method, uri, version) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(m), Some(u), Some(v)) if !m.is_empty() && !u.is_empty() => (m, u, v),
        _ => {
            return Err(ImgfsError::Protocol(format!(
                "malformed request line '{}'",
                request_line
            )))
        }
    };
    if version != HTTP_VERSION {
        return Err(ImgfsError::Protocol(format!("unsupported version '{}'", version)));
    }

    // 2. Headers
    let mut headers = Vec::new();
    for line in lines {
        let (key, value) = line
            .split_once(HTTP_HDR_KV_DELIM)
            .ok_or_else(|| ImgfsError::Protocol(format!("malformed header line '{}'", line)))?;
        if headers.len() < MAX_HEADERS {
            headers.push(HttpHeader { key: key.to_string(), value: value.to_string() });
        } else {
            debug!("http: dropping header '{}' past the first {}", key, MAX_HEADERS);
        }
    }

    // 3. Body
    let content_length = match headers.iter().find(|h| h.key == CONTENT_LENGTH) {
        Some(h) => h.value.trim().parse::<usize>().map_err(|_| {
            ImgfsError::Protocol(format!("bad Content-Length '{}'", h.value))
        })?,
        None => 0,
    };

    let total = header_len
        .checked_add(content_length)
        .ok_or_else(|| ImgfsError::Protocol("Content-Length overflow".into()))?;
    if received.len() < total {
        return Ok(Parse::Incomplete { content_length: Some(content_length) });
    }

    Ok(Parse::Complete(HttpMessage {
        method: method.to_string(),
        uri: uri.to_string(),
        headers,
        body: Bytes::copy_from_slice(&received[header_len..total]),
    }))
}

/// Value of query parameter `name`: first occurrence, up to the next `&`.
/// An empty value counts as absent.
pub fn get_var<'a>(uri: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = uri.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
        .filter(|value| !value.is_empty())
}

/// `HTTP/1.1 <status>\r\n<headers>Content-Length: N\r\n\r\n<body>`.
/// `headers` is either empty or a run of complete `\r\n`-terminated lines.
pub fn build_reply(status: &str, headers: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "{}{}{}{}{}: {}{}",
        HTTP_PROTOCOL_ID,
        status,
        HTTP_LINE_DELIM,
        headers,
        CONTENT_LENGTH,
        body.len(),
        HTTP_LINE_DELIM
    );
    let mut out = Vec::with_capacity(head.len() + HTTP_LINE_DELIM.len() + body.len());
    out.extend_from_slice(head.as_bytes());
    out.extend_from_slice(HTTP_LINE_DELIM.as_bytes());
    out.extend_from_slice(body);
    out
}

pub fn http_reply<W: Write>(out: &mut W, status: &str, headers: &str, body: &[u8]) -> Result<()> {
    out.write_all(&build_reply(status, headers, body))?;
    Ok(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
