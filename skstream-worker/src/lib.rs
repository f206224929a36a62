//! Signal K stream worker
//!
//! Runs one [`skstream_core::StreamProcessor`] per open stream inside a tokio
//! task. Commands come in on a channel, batched snapshots and notifications
//! go out on another; the binary wires those channels to stdin and stdout as
//! newline-delimited JSON.
//!
//! ```text
//!  stdin ──► Command ──┐                         ┌──► Outbound ──► stdout
//!                      ▼                         │
//!                   Worker ── select! ───────────┤
//!                      ▲   batch / track timers  │
//!  websocket ─► StreamEvent                 HTTP tracks
//! ```

use clap::Parser;
use thiserror::Error;

pub mod command;
pub mod tracks;
pub mod transport;
pub mod worker;

pub use command::{Command, OpenOptions, Outbound};
pub use tracks::{HttpTrackSource, TrackSource};
pub use transport::{StreamEvent, StreamTransport, WsTransport};
pub use worker::Worker;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Signal K stream URL to open on startup, e.g. ws://localhost:3000/signalk/v1/stream
    #[arg(long)]
    pub url: Option<String>,

    /// Bearer token for the stream and REST API
    #[arg(long)]
    pub token: Option<String>,

    /// Batching interval in milliseconds, 0 for immediate updates
    #[arg(long, default_value_t = 500)]
    pub interval: u64,

    /// Open a playback stream instead of the live feed
    #[arg(long, default_value_t = false)]
    pub playback: bool,

    /// Playback start time (RFC 3339)
    #[arg(long)]
    pub start_time: Option<String>,

    /// Playback rate multiplier
    #[arg(long)]
    pub playback_rate: Option<f64>,

    /// Upstream subscription policy
    #[arg(long, default_value = "none")]
    pub subscribe: String,

    /// Don't read commands from stdin; only print outbound messages
    #[arg(long, default_value_t = false)]
    pub no_stdin: bool,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Track fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Channel closed")]
    ChannelClosed,
}
