//! Client for the container engine HTTP API.
//!
//! Request/response calls map engine endpoints onto typed functions; streamed
//! endpoints (container logs, events) are drained by a [`stream::StreamPump`]
//! into caller-supplied callbacks on a background thread, with cooperative
//! cancellation through [`stream::PumpHandle::close`].

pub mod client;
pub mod config;
pub mod error;
pub mod stream;
pub mod transport;

pub use client::DockerClient;
pub use error::{Error, Result};
