use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::DockerClient;
use super::filters::Filters;
use super::model::EventMessage;
use crate::error::Result;
use crate::stream::PumpHandle;
use crate::transport::{Request, Transport};

/// `GET /events`: a newline-delimited JSON stream that stays open until
/// `until` passes or the pump is closed.
pub struct Events<'a, T: Transport> {
    client: &'a DockerClient<T>,
    filters: Filters,
    since: Option<String>,
    until: Option<String>,
}

impl<'a, T: Transport> Events<'a, T> {
    pub(super) fn new(client: &'a DockerClient<T>) -> Self {
        Self {
            client,
            filters: Filters::new(),
            since: None,
            until: None,
        }
    }

    /// Filter on `key` (`type`, `event`, `container`, `label`, ...). Adding
    /// the same key again widens the match.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.add(key, value);
        self
    }

    /// Timestamp or relative duration such as `10m`.
    pub fn since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    pub fn until(mut self, until: impl Into<String>) -> Self {
        self.until = Some(until.into());
        self
    }

    fn request(&self) -> Result<Request> {
        let mut request = Request::get("/events");
        if let Some(since) = &self.since {
            request = request.query("since", since.as_str());
        }
        if let Some(until) = &self.until {
            request = request.query("until", until.as_str());
        }
        self.filters.apply(request)
    }

    /// Raw body bytes.
    pub fn stream<C, F>(self, on_chunk: C, on_finish: F) -> Result<PumpHandle>
    where
        C: FnMut(Vec<u8>) + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        let request = self.request()?;
        self.client.stream(request, on_chunk, on_finish)
    }

    /// Decoded events. Lines that fail to decode are logged and skipped. A
    /// final event without a trailing newline is delivered before `on_finish`
    /// when the stream ends cleanly.
    pub fn watch<C, F>(self, on_event: C, on_finish: F) -> Result<PumpHandle>
    where
        C: FnMut(EventMessage) + Send + 'static,
        F: FnOnce(bool) + Send + 'static,
    {
        let decoder = Arc::new(Mutex::new(EventDecoder {
            lines: LineSplitter::new(),
            on_event,
        }));
        let tail = decoder.clone();
        self.stream(
            move |chunk| {
                if let Ok(mut decoder) = decoder.lock() {
                    decoder.feed(&chunk);
                }
            },
            move |success| {
                if let Ok(mut decoder) = tail.lock() {
                    decoder.finish(success);
                }
                on_finish(success);
            },
        )
    }
}

struct EventDecoder<C> {
    lines: LineSplitter,
    on_event: C,
}

impl<C: FnMut(EventMessage)> EventDecoder<C> {
    fn feed(&mut self, chunk: &[u8]) {
        for line in self.lines.feed(chunk) {
            self.emit(&line);
        }
    }

    fn finish(&mut self, success: bool) {
        let Some(line) = self.lines.finish() else {
            return;
        };
        if success {
            self.emit(&line);
        } else {
            debug!(bytes = line.len(), "dropping partial event at end of stream");
        }
    }

    fn emit(&mut self, line: &[u8]) {
        match serde_json::from_slice::<EventMessage>(line) {
            Ok(event) => (self.on_event)(event),
            Err(e) => warn!(error = %e, "skipping undecodable event"),
        }
    }
}

/// Reassembles newline-terminated lines from arbitrary chunks.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete, non-blank lines in `chunk` (plus anything carried over),
    /// without their terminators.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push(line);
            }
        }
        lines
    }

    /// The unterminated tail, if any.
    pub fn remainder(&self) -> &[u8] {
        &self.pending
    }

    /// Take the unterminated tail as a last line, if it is not blank.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        (!line.iter().all(u8::is_ascii_whitespace)).then_some(line)
    }
}
