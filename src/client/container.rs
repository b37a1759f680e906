use super::{DockerClient, segment};
use super::model::{ContainerInspect, ContainerSummary};
use crate::error::Result;
use crate::stream::PumpHandle;
use crate::transport::{Request, Transport};

const FRAME_HEADER_LEN: usize = 8;

/// Container endpoints.
pub struct ContainerOps<'a, T: Transport> {
    client: &'a DockerClient<T>,
}

impl<'a, T: Transport> ContainerOps<'a, T> {
    pub(super) fn new(client: &'a DockerClient<T>) -> Self {
        Self { client }
    }

    /// Running containers, or all of them when `all` is set.
    pub fn list(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        self.client
            .get_json(Request::get("/containers/json").flag("all", all))
    }

    pub fn inspect(&self, id: &str) -> Result<ContainerInspect> {
        self.client
            .get_json(Request::get(format!("/containers/{}/json", segment(id))))
    }

    pub fn logs(&self, id: &str) -> Logs<'a, T> {
        Logs {
            client: self.client,
            id: id.to_string(),
            follow: false,
            stdout: true,
            stderr: true,
            timestamps: false,
            tail: None,
            since: None,
        }
    }
}

/// `GET /containers/{id}/logs`, delivered through a stream pump.
pub struct Logs<'a, T: Transport> {
    client: &'a DockerClient<T>,
    id: String,
    follow: bool,
    stdout: bool,
    stderr: bool,
    timestamps: bool,
    tail: Option<String>,
    since: Option<i64>,
}

impl<T: Transport> Logs<'_, T> {
    /// Keep the stream open for new output.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    pub fn timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Number of trailing lines, or `all`.
    pub fn tail(mut self, tail: impl Into<String>) -> Self {
        self.tail = Some(tail.into());
        self
    }

    /// Only output after this UNIX timestamp.
    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    fn request(&self) -> Request {
        let mut request = Request::get(format!("/containers/{}/logs", segment(&self.id)))
            .flag("follow", self.follow)
            .flag("stdout", self.stdout)
            .flag("stderr", self.stderr)
            .flag("timestamps", self.timestamps);
        if let Some(tail) = &self.tail {
            request = request.query("tail", tail.as_str());
        }
        if let Some(since) = self.since {
            request = request.query("since", since.to_string());
        }
        request
    }

    /// Raw body bytes. For containers without a TTY these carry the engine's
    /// multiplexing headers; see [`Logs::frames`].
    pub fn stream<C, F>(self, on_chunk: C, on_finish: F) -> Result<PumpHandle>
    where
        C: FnMut(Vec<u8>) + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        self.client.stream(self.request(), on_chunk, on_finish)
    }

    /// Demultiplexed stdout/stderr frames, for containers without a TTY.
    pub fn frames<C, F>(self, mut on_frame: C, on_finish: F) -> Result<PumpHandle>
    where
        C: FnMut(LogFrame) + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        let mut demuxer = LogsDemuxer::new();
        self.stream(
            move |chunk| demuxer.feed(&chunk).into_iter().for_each(&mut on_frame),
            on_finish,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdin,
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub stream: LogStream,
    pub data: Vec<u8>,
}

/// Splits the multiplexed log stream into frames.
///
/// Each frame is an 8-byte header (stream id, three zero bytes, big-endian
/// payload length) followed by the payload. Frames may straddle chunks.
#[derive(Debug, Default)]
pub struct LogsDemuxer {
    pending: Vec<u8>,
}

impl LogsDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LogFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut offset = 0;
        while self.pending.len() - offset >= FRAME_HEADER_LEN {
            let header = &self.pending[offset..offset + FRAME_HEADER_LEN];
            let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
            let start = offset + FRAME_HEADER_LEN;
            if self.pending.len() - start < len {
                break;
            }
            let stream = match header[0] {
                0 => LogStream::Stdin,
                2 => LogStream::Stderr,
                _ => LogStream::Stdout,
            };
            frames.push(LogFrame {
                stream,
                data: self.pending[start..start + len].to_vec(),
            });
            offset = start + len;
        }
        self.pending.drain(..offset);
        frames
    }

    /// Bytes buffered toward an incomplete frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
