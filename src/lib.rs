//! # PCM Player
//!
//! Real-time playback of raw little-endian f32 mono samples read from a byte
//! stream (normally stdin). The producer side is best-effort and bursty; the
//! consumer side is the audio device's real-time callback, which must never
//! stall. The engine bridges the two timing domains.
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │                 MAIN THREAD                    │
//!  byte stream ────► │  SampleSource ──► chunk of f32                 │
//!                    │        │                                       │
//!                    │        ▼  (strategy selected per session)      │
//!                    │  ┌───────────┐  ┌───────────────────────────┐  │
//!                    │  │ Preload:  │  │ Streaming:                │  │
//!                    │  │ Sample    │  │ SPSC RingBuffer producer  │  │
//!                    │  │ Store     │  │ (blocking or paced write) │  │
//!                    │  └─────┬─────┘  └────────────┬──────────────┘  │
//!                    └────────┼─────────────────────┼─────────────────┘
//!                             │                     │  acquire/release
//!                    ┌────────┼─────────────────────┼─────────────────┐
//!                    │        ▼                     ▼                 │
//!                    │  PreloadRenderer       StreamRenderer          │
//!                    │        └──────────┬──────────┘                 │
//!                    │                   ▼                            │
//!                    │        Render::render(output)                  │
//!                    │   REAL-TIME THREAD (cpal output callback)      │
//!                    └────────────────────────────────────────────────┘
//! ```
//!
//! The streaming path is lock-free: the producer owns the write index, the
//! callback owns the read index, and each side publishes its own index with
//! release ordering and observes the other's with acquire ordering. On
//! underrun the callback pads the shortfall with silence; it never blocks.
//! Playback completes only when the source is exhausted *and* every buffered
//! sample has been drained.

pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod source;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for playback
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Output channel count (mono)
    pub const CHANNELS: u16 = 1;

    /// Frames requested per device callback in the callback-driven modes
    pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 256;

    /// Samples read from the source per chunk
    pub const DEFAULT_CHUNK_SAMPLES: usize = 4096;

    /// Streaming ring buffer capacity (two seconds at 44.1 kHz)
    pub const DEFAULT_RING_CAPACITY: usize = 88_200;

    /// Initial capacity of the preload sample store
    pub const DEFAULT_STORE_CAPACITY: usize = 65_536;

    /// Ring size for the blocking-write facade, in write granules
    pub const BLOCKING_RING_GRANULES: usize = 4;

    /// Producer backoff while the ring buffer is full, in microseconds
    pub const WRITE_BACKOFF_US: u64 = 500;

    /// Interval at which the control thread polls for completion, in milliseconds
    pub const COMPLETION_POLL_MS: u64 = 10;
}
