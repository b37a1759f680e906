//! Minimal HTTP/1.1 transport to the engine API over unix or TCP sockets.
//!
//! One connection per request: each request is sent with
//! `Connection: close`, and the socket lives exactly as long as the
//! response body. Streaming bodies keep the socket open until end-of-stream
//! or until a pump wired to the body is closed.
//!
//! Response heads are parsed with `httparse`; chunked bodies are decoded by
//! `chunked_transfer`.

mod endpoint;
mod http;

use std::io::{BufReader, Write};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

pub use endpoint::{Connection, Endpoint};
pub use http::{Body, Method, Request, Response, read_response};

/// Sends a request and returns the response head with a streaming body.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response>;
}

/// Opens a fresh socket to `endpoint` for every request.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    endpoint: Endpoint,
    connect_timeout: Option<Duration>,
}

impl SocketTransport {
    pub fn new(endpoint: Endpoint, connect_timeout: Option<Duration>) -> Self {
        Self {
            endpoint,
            connect_timeout,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Transport for SocketTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let mut conn = self.endpoint.connect(self.connect_timeout)?;
        debug!(
            endpoint = %self.endpoint,
            method = %request.method(),
            target = %request.target(),
            "sending engine request"
        );

        request.write_to(&mut conn, &self.endpoint.host_header())?;
        conn.flush()?;

        let abort = conn.try_clone()?;
        let response = read_response(BufReader::new(conn), abort, request.method())?;
        debug!(status = response.status(), "engine responded");
        Ok(response)
    }
}
