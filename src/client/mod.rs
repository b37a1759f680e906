// Typed engine API calls: request building, JSON decoding and streamed bodies.

mod container;
mod events;
mod filters;
mod image;
pub mod model;
mod volume;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::Result;
use crate::stream::{DEFAULT_BUFFER_SIZE, PumpHandle};
use crate::transport::{Endpoint, Request, Response, SocketTransport, Transport};

pub use container::{ContainerOps, LogFrame, LogStream, Logs, LogsDemuxer};
pub use events::{Events, LineSplitter};
pub use filters::Filters;
pub use image::ImageOps;
pub use volume::{ListVolume, VolumeOps};

use model::{Info, Version};

/// Escaped in image references, which may contain `/`.
const REFERENCE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escaped in a single path segment such as a volume name or container id.
const SEGMENT: &AsciiSet = &REFERENCE.add(b'/');

pub(crate) fn segment(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT).to_string()
}

pub(crate) fn reference(raw: &str) -> String {
    utf8_percent_encode(raw, REFERENCE).to_string()
}

/// Client for the engine API.
///
/// Plain calls return decoded JSON. Streaming calls (`logs`, `events`) hand
/// the open response body to a [`StreamPump`](crate::stream::StreamPump) and
/// return its handle; the caller observes the stream through the sinks it
/// passed in and stops it with [`PumpHandle::close`].
pub struct DockerClient<T: Transport = SocketTransport> {
    transport: T,
    api_version: Option<String>,
    pump_buffer_size: usize,
}

impl DockerClient<SocketTransport> {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let endpoint = Endpoint::parse(&cfg.docker_host)?;
        let transport = SocketTransport::new(endpoint, cfg.connect_timeout());
        Ok(Self::with_transport(transport, cfg.api_version.clone())
            .with_buffer_size(cfg.pump_buffer_size))
    }
}

impl<T: Transport> DockerClient<T> {
    pub fn with_transport(transport: T, api_version: Option<String>) -> Self {
        Self {
            transport,
            api_version,
            pump_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.pump_buffer_size = size.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` (version-prefixed when an API version is pinned),
    /// mapping 4xx/5xx statuses to [`Error::Api`](crate::Error::Api).
    pub fn send(&self, request: Request) -> Result<Response> {
        let request = match &self.api_version {
            Some(v) => request.with_prefix(&format!("/v{}", v.trim_start_matches('v'))),
            None => request,
        };
        self.transport.send(&request)?.error_for_status()
    }

    pub(crate) fn get_json<R: DeserializeOwned>(&self, request: Request) -> Result<R> {
        self.send(request)?.json()
    }

    /// Send `request` and pump its body into the sinks on a background thread.
    pub fn stream<C, F>(&self, request: Request, on_chunk: C, on_finish: F) -> Result<PumpHandle>
    where
        C: FnMut(Vec<u8>) + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        let response = self.send(request)?;
        let pump = response
            .into_body()
            .into_pump(on_chunk, on_finish)
            .with_buffer_size(self.pump_buffer_size);
        Ok(pump.start())
    }

    pub fn info(&self) -> Result<Info> {
        self.get_json(Request::get("/info"))
    }

    pub fn version(&self) -> Result<Version> {
        self.get_json(Request::get("/version"))
    }

    /// `GET /_ping`; the engine answers `OK`.
    pub fn ping(&self) -> Result<String> {
        self.send(Request::get("/_ping"))?.text()
    }

    pub fn volume(&self) -> VolumeOps<'_, T> {
        VolumeOps::new(self)
    }

    pub fn container(&self) -> ContainerOps<'_, T> {
        ContainerOps::new(self)
    }

    pub fn image(&self) -> ImageOps<'_, T> {
        ImageOps::new(self)
    }

    pub fn events(&self) -> Events<'_, T> {
        Events::new(self)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use crate::error::Result;
    use crate::transport::{Body, Request, Response, Transport};

    /// Records requests and answers each with a canned status and body.
    pub struct CannedTransport {
        pub requests: Mutex<Vec<Request>>,
        replies: Mutex<Vec<(u16, Vec<u8>)>>,
    }

    impl CannedTransport {
        pub fn new(replies: Vec<(u16, &str)>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|(s, b)| (s, b.as_bytes().to_vec()))
                        .collect(),
                ),
            }
        }

        pub fn targets(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| format!("{} {}", r.method(), r.target()))
                .collect()
        }
    }

    impl Transport for CannedTransport {
        fn send(&self, request: &Request) -> Result<Response> {
            self.requests.lock().unwrap().push(request.clone());
            let (status, body) = self.replies.lock().unwrap().pop().unwrap_or((200, Vec::new()));
            Ok(Response::new(
                status,
                Vec::new(),
                Body::new(std::io::Cursor::new(body), crate::stream::NoInterrupt),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CannedTransport;
    use super::*;

    #[test]
    fn pinned_version_prefixes_every_path() {
        let client = DockerClient::with_transport(
            CannedTransport::new(vec![(200, "OK")]),
            Some("1.43".into()),
        );
        assert_eq!(client.ping().unwrap(), "OK");
        assert_eq!(client.transport().targets(), vec!["GET /v1.43/_ping"]);
    }

    #[test]
    fn decodes_version() {
        let client = DockerClient::with_transport(
            CannedTransport::new(vec![(200, r#"{"Version":"24.0.7","ApiVersion":"1.43"}"#)]),
            None,
        );
        let version = client.version().unwrap();
        assert_eq!(version.version, "24.0.7");
        assert_eq!(version.api_version, "1.43");
        assert_eq!(client.transport().targets(), vec!["GET /version"]);
    }

    #[test]
    fn server_error_surfaces_as_api_error() {
        let client = DockerClient::with_transport(
            CannedTransport::new(vec![(500, r#"{"message":"daemon is shutting down"}"#)]),
            None,
        );
        let err = client.info().unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("daemon is shutting down"));
    }

    #[test]
    fn path_parts_are_escaped() {
        assert_eq!(segment("my vol?x"), "my%20vol%3Fx");
        assert_eq!(segment("a/b"), "a%2Fb");
        assert_eq!(reference("library/alpine:3.19"), "library/alpine:3.19");
        assert_eq!(reference("bad#ref"), "bad%23ref");
    }

    #[test]
    fn from_config_rejects_bad_host() {
        let cfg = Config {
            docker_host: "ftp://nope".into(),
            ..Config::default()
        };
        assert!(matches!(
            DockerClient::from_config(&cfg),
            Err(crate::Error::InvalidEndpoint(_))
        ));
    }
}
