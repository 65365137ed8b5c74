//! Playback session controllers
//!
//! A session owns the open device stream and walks the lifecycle
//! `Created → DeviceOpen → Streaming → Draining → Stopped`. Three strategies
//! populate the machine identically and differ only in what sits between the
//! sample source and the device:
//!
//! - **Preload**: the source is drained completely into a [`SampleStore`]
//!   before the device opens; zero samples abort the session with the device
//!   untouched.
//! - **Blocking-Stream**: the control thread alternates fixed-granularity
//!   source reads with synchronous writes that block until the device frees
//!   space; the final partial chunk is zero-padded to the granularity.
//! - **Callback-Stream**: the control thread runs the ring-buffer producer
//!   loop while the device's real-time thread drains independently.
//!
//! Completion is always signaled by the consumer side (the `finished` flag),
//! which the control thread polls at a coarse interval before tearing the
//! stream down. A [`CancelToken`] ends ingestion early; already-buffered
//! audio drains as the tail of the stream rather than being cut off.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::audio::buffer::{spsc, Producer, SampleStore};
use crate::audio::device::default_output_device;
use crate::audio::playback::{
    BlockingWriter, OutputStream, PreloadRenderer, Render, StreamControl, StreamRenderer,
};
use crate::config::PlayerConfig;
use crate::constants::{BLOCKING_RING_GRANULES, COMPLETION_POLL_MS, WRITE_BACKOFF_US};
use crate::error::{AudioError, Result, SourceError};
use crate::source::SampleSource;

/// Strategy selecting what sits between the source and the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Ingest everything, then play from memory
    Preload,
    /// Synchronous device-paced writes, no explicit buffer accounting
    BlockingStream,
    /// Ring-buffer producer loop with an independent real-time consumer
    CallbackStream,
}

impl PlaybackMode {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackMode::Preload => "preload",
            PlaybackMode::BlockingStream => "blocking-stream",
            PlaybackMode::CallbackStream => "callback-stream",
        }
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Created,
    DeviceOpen,
    Streaming,
    Draining,
    Stopped,
}

/// Cooperative stop signal.
///
/// Cancelling ends the producer loop; the consumer treats whatever is
/// buffered as the tail of the stream and drains it before the session
/// stops, avoiding an audible click from a hard abort.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// End-of-session accounting
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub mode: PlaybackMode,
    pub bytes_read: u64,
    pub samples_read: u64,
    pub chunks_read: u64,
    pub samples_played: u64,
    pub underrun_frames: u64,
}

impl SessionReport {
    /// Played audio duration at the given sample rate
    pub fn played_secs(&self, sample_rate: u32) -> f64 {
        self.samples_played as f64 / sample_rate as f64
    }
}

/// One playback session: device stream lifecycle plus shared engine state
struct Session {
    state: SessionState,
    control: Arc<StreamControl>,
    stream: Option<OutputStream>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Created,
            control: StreamControl::new(),
            stream: None,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Open the default output device and start the stream around `renderer`.
    ///
    /// Failure here is fatal: it is reported to the caller and never retried.
    fn open_stream(
        &mut self,
        config: &PlayerConfig,
        frames_per_buffer: Option<u32>,
        renderer: Box<dyn Render>,
    ) -> Result<()> {
        let device = default_output_device()?;
        let stream_config = device.stream_config(config.sample_rate, frames_per_buffer);
        info!(
            "output device \"{}\": {} Hz, {} channel, {:?}",
            device.name, config.sample_rate, stream_config.channels, stream_config.buffer_size
        );
        let stream = OutputStream::open(&device, &stream_config, renderer, self.control.clone())?;
        self.advance(SessionState::DeviceOpen);
        stream.start()?;
        self.stream = Some(stream);
        self.advance(SessionState::Streaming);
        Ok(())
    }

    /// Surface a device stream error, if one was reported
    fn check_stream_error(&self) -> Result<()> {
        if let Some(stream) = &self.stream {
            if let Some(err) = stream.take_error() {
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Poll until the consumer signals completion.
    ///
    /// `stop_on_cancel` makes cancellation end the wait early (preload mode,
    /// where the whole stream is buffered and a full drain could take
    /// minutes); the streaming modes drain their bounded tail instead.
    fn wait_for_completion(&self, cancel: &CancelToken, stop_on_cancel: bool) -> Result<()> {
        while !self.control.is_finished() {
            self.check_stream_error()?;
            if self.control.is_failed() {
                // The callback is dead; completion will never be signaled
                return Err(AudioError::Stream("device stream failed".to_string()).into());
            }
            if stop_on_cancel && cancel.is_cancelled() {
                info!("cancelled, stopping playback");
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(COMPLETION_POLL_MS));
        }
        Ok(())
    }

    /// Stop and close the stream. Safe on every exit path.
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.advance(SessionState::Stopped);
    }

    fn report<R>(&self, mode: PlaybackMode, source: &SampleSource<R>) -> SessionReport
    where
        R: Read,
    {
        SessionReport {
            mode,
            bytes_read: source.bytes_read(),
            samples_read: source.samples_read(),
            chunks_read: source.chunks_read(),
            samples_played: self.control.samples_played(),
            underrun_frames: self.control.underrun_frames(),
        }
    }
}

/// Run one playback session in the selected mode
pub fn run<R: Read>(
    mode: PlaybackMode,
    source: SampleSource<R>,
    config: &PlayerConfig,
    cancel: &CancelToken,
) -> Result<SessionReport> {
    config.validate()?;
    match mode {
        PlaybackMode::Preload => run_preload(source, config, cancel),
        PlaybackMode::BlockingStream => run_blocking_stream(source, config, cancel),
        PlaybackMode::CallbackStream => run_callback_stream(source, config, cancel),
    }
}

/// Preload strategy: full ingest, then playback from memory
fn run_preload<R: Read>(
    mut source: SampleSource<R>,
    config: &PlayerConfig,
    cancel: &CancelToken,
) -> Result<SessionReport> {
    let mut session = Session::new();
    info!("mode: preload");

    let mut store = SampleStore::with_capacity(config.store_capacity);
    let mut chunk = vec![0.0f32; config.chunk_samples];
    while !cancel.is_cancelled() {
        let read = source.read_chunk(&mut chunk);
        if read == 0 {
            break;
        }
        // Allocation failure is fatal: no playback on a truncated buffer
        store.append(&chunk[..read])?;
    }

    if store.is_empty() {
        return Err(SourceError::Empty.into());
    }
    info!(
        "loaded {} samples ({:.4} s) from {} bytes in {} chunks",
        store.len(),
        store.duration_secs(config.sample_rate),
        source.bytes_read(),
        source.chunks_read()
    );

    // The source is exhausted before the device ever opens
    session.control.mark_end_of_input();
    let renderer = PreloadRenderer::new(Arc::new(store), session.control.clone());
    session.open_stream(config, Some(config.frames_per_buffer), Box::new(renderer))?;
    session.advance(SessionState::Draining);

    let outcome = session.wait_for_completion(cancel, true);
    session.stop();
    outcome?;
    Ok(session.report(PlaybackMode::Preload, &source))
}

/// Blocking-stream strategy: read a chunk, write it synchronously, repeat
fn run_blocking_stream<R: Read>(
    mut source: SampleSource<R>,
    config: &PlayerConfig,
    cancel: &CancelToken,
) -> Result<SessionReport> {
    let mut session = Session::new();
    let granularity = config.chunk_samples;
    info!("mode: blocking-stream, write granularity {} samples", granularity);

    // Small ring standing in for the device's own buffer; writes block until
    // the callback frees space, which is the backpressure of this mode.
    let (producer, consumer) = spsc(granularity * BLOCKING_RING_GRANULES + 1)?;
    let renderer = StreamRenderer::new(consumer, session.control.clone());
    session.open_stream(config, None, Box::new(renderer))?;
    let mut writer = BlockingWriter::new(producer, session.control.clone());

    let ingested = (|| {
        let mut chunk = vec![0.0f32; granularity];
        while !cancel.is_cancelled() {
            let read = source.read_chunk(&mut chunk);
            if read == 0 {
                break;
            }
            if read < granularity {
                // Final partial chunk: zero-pad to the write granularity and
                // issue one last write before draining
                chunk[read..].fill(0.0);
                writer.write(&chunk, || cancel.is_cancelled());
                break;
            }
            writer.write(&chunk, || cancel.is_cancelled());
            session.check_stream_error()?;
        }
        Ok(())
    })();

    session.control.mark_end_of_input();
    session.advance(SessionState::Draining);
    debug!("end of input after {} samples, draining", source.samples_read());
    let outcome = ingested.and_then(|_| session.wait_for_completion(cancel, false));
    session.stop();
    outcome?;
    Ok(session.report(PlaybackMode::BlockingStream, &source))
}

/// Callback-stream strategy: ring-buffer producer loop on the control thread
fn run_callback_stream<R: Read>(
    mut source: SampleSource<R>,
    config: &PlayerConfig,
    cancel: &CancelToken,
) -> Result<SessionReport> {
    let mut session = Session::new();
    info!(
        "mode: callback-stream, ring capacity {} samples",
        config.ring_capacity
    );

    let (producer, consumer) = spsc(config.ring_capacity)?;
    let renderer = StreamRenderer::new(consumer, session.control.clone());
    session.open_stream(config, Some(config.frames_per_buffer), Box::new(renderer))?;

    let ingested = ingest(&mut source, producer, &session, config, cancel);

    session.control.mark_end_of_input();
    session.advance(SessionState::Draining);
    debug!("end of input after {} samples, draining", source.samples_read());
    let outcome = ingested.and_then(|_| session.wait_for_completion(cancel, false));
    session.stop();
    outcome?;
    Ok(session.report(PlaybackMode::CallbackStream, &source))
}

/// Producer loop: move source chunks into the ring, backing off briefly when
/// it is full so the consumer thread is never starved of CPU
fn ingest<R: Read>(
    source: &mut SampleSource<R>,
    mut producer: Producer,
    session: &Session,
    config: &PlayerConfig,
    cancel: &CancelToken,
) -> Result<()> {
    let mut chunk = vec![0.0f32; config.chunk_samples];
    'ingest: while !cancel.is_cancelled() {
        let read = source.read_chunk(&mut chunk);
        if read == 0 {
            break;
        }
        let mut pending = &chunk[..read];
        while !pending.is_empty() {
            if cancel.is_cancelled() {
                break 'ingest;
            }
            session.check_stream_error()?;
            let wrote = producer.write(pending);
            pending = &pending[wrote..];
            if wrote == 0 {
                std::thread::sleep(Duration::from_micros(WRITE_BACKOFF_US));
            }
        }
        if source.chunks_read() % 64 == 0 {
            debug!(
                "ingested {} samples, ring free space {}",
                source.samples_read(),
                producer.free_space()
            );
        }
    }
    Ok(())
}
