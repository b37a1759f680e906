use std::fmt;
use std::io::{self, BufRead, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::stream::{Interrupt, NoInterrupt, StreamPump};

const MAX_HEADERS: usize = 128;
const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API request. Serialized as HTTP/1.1 with `Connection: close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a boolean flag as `1`/`0`, the engine's convention.
    pub fn flag(self, key: impl Into<String>, value: bool) -> Self {
        self.query(key, if value { "1" } else { "0" })
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Prefix the path, e.g. with an API version segment.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.path = format!("{prefix}{}", self.path);
        self
    }

    /// Request target: path plus form-encoded query string.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("{}?{query}", self.path)
    }

    pub fn write_to<W: Write>(&self, w: &mut W, host: &str) -> io::Result<()> {
        write!(w, "{} {} HTTP/1.1\r\n", self.method, self.target())?;
        write!(w, "Host: {host}\r\n")?;
        write!(w, "User-Agent: dockstream/{}\r\n", env!("CARGO_PKG_VERSION"))?;
        w.write_all(b"Connection: close\r\n")?;
        match &self.body {
            Some(body) => {
                w.write_all(b"Content-Type: application/json\r\n")?;
                write!(w, "Content-Length: {}\r\n\r\n", body.len())?;
                w.write_all(body)?;
            }
            None if matches!(self.method, Method::Post | Method::Put) => {
                w.write_all(b"Content-Length: 0\r\n\r\n")?;
            }
            None => w.write_all(b"\r\n")?,
        }
        Ok(())
    }
}

/// A response body plus the means to abort reads on it.
pub struct Body {
    reader: Box<dyn Read + Send>,
    interrupter: Box<dyn Interrupt>,
}

impl Body {
    pub fn new<R, I>(reader: R, interrupter: I) -> Self
    where
        R: Read + Send + 'static,
        I: Interrupt + 'static,
    {
        Self {
            reader: Box::new(reader),
            interrupter: Box::new(interrupter),
        }
    }

    pub fn empty() -> Self {
        Self::new(io::empty(), NoInterrupt)
    }

    /// Wire this body into an idle [`StreamPump`] whose `close()` can abort
    /// a read blocked on the underlying socket.
    pub fn into_pump<C, F>(self, on_chunk: C, on_finish: F) -> StreamPump
    where
        C: FnMut(Vec<u8>) + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        StreamPump::new(self.reader, on_chunk, on_finish).with_interrupter(self.interrupter)
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Response {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: Body,
}

#[derive(serde::Deserialize)]
struct ErrorMessage {
    message: String,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Body) -> Self {
        Self {
            status,
            reason: String::new(),
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Turn a 4xx/5xx into [`Error::Api`], using the engine's
    /// `{"message": ...}` body when it sends one.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status < 400 {
            return Ok(self);
        }
        let status = self.status;
        let reason = self.reason.clone();
        let raw = self.text().unwrap_or_default();
        let message = match serde_json::from_str::<ErrorMessage>(&raw) {
            Ok(e) => e.message,
            Err(_) if raw.trim().is_empty() => reason,
            Err(_) => raw.trim().to_string(),
        };
        Err(Error::Api { status, message })
    }

    pub fn bytes(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn text(self) -> Result<String> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn into_body(self) -> Body {
        self.body
    }
}

/// Parse a response head from `reader` and frame the rest as its body.
pub fn read_response<R, I>(mut reader: R, interrupter: I, method: Method) -> Result<Response>
where
    R: BufRead + Send + 'static,
    I: Interrupt + 'static,
{
    let head = read_head(&mut reader)?;
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut slots);
    match parsed.parse(&head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(Error::MalformedResponse("incomplete response head".into()));
        }
        Err(e) => return Err(Error::MalformedResponse(format!("bad response head: {e}"))),
    }
    let status = parsed
        .code
        .ok_or_else(|| Error::MalformedResponse("missing status code".into()))?;
    let reason = parsed.reason.unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = parsed
        .headers
        .iter()
        .map(|h| {
            let value = String::from_utf8_lossy(h.value).trim().to_string();
            (h.name.to_string(), value)
        })
        .collect();

    let bodiless = method == Method::Head || status == 204 || status == 304 || status < 200;
    let chunked = find_header(&headers, "Transfer-Encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    let length = match find_header(&headers, "Content-Length") {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
            Error::MalformedResponse(format!("bad Content-Length {raw:?}"))
        })?),
        None => None,
    };

    let body = match (bodiless, chunked, length) {
        (true, _, _) => Body::empty(),
        (false, true, _) => Body::new(chunked_transfer::Decoder::new(reader), interrupter),
        (false, false, Some(len)) => Body::new(reader.take(len), interrupter),
        (false, false, None) => Body::new(reader, interrupter),
    };

    Ok(Response {
        status,
        reason,
        headers,
        body,
    })
}

/// Raw bytes up to and including the blank line that ends the head. The
/// reader is left positioned at the first body byte.
fn read_head<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let mut head = Vec::new();
    loop {
        let start = head.len();
        if reader.read_until(b'\n', &mut head)? == 0 {
            let msg = if head.is_empty() {
                "connection closed before status line"
            } else {
                "connection closed inside headers"
            };
            return Err(Error::MalformedResponse(msg.into()));
        }
        if start > 0 && matches!(&head[start..], b"\r\n" | b"\n") {
            return Ok(head);
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err(Error::MalformedResponse("response head too large".into()));
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
