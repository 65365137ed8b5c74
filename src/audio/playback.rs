//! Playback renderers and the real-time output stream
//!
//! A [`Render`] implementation is the engine's contract with the device: the
//! callback hands it an output block to fill and it reports whether playback
//! should continue. Two renderers exist, one per buffering scheme:
//!
//! - [`PreloadRenderer`] walks a fully loaded [`SampleStore`] with a
//!   monotonic cursor.
//! - [`StreamRenderer`] drains the SPSC ring and completes only once the
//!   producer has marked end-of-input *and* the ring is empty.
//!
//! Renderers run on the device's real-time thread: no locks, no allocation,
//! no I/O, work bounded by the requested block length. Errors from the
//! stream are shipped to the control thread over a bounded channel; the
//! callback itself never fails.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};

use crate::audio::buffer::{Consumer, Producer, SampleStore};
use crate::audio::device::OutputDevice;
use crate::constants::WRITE_BACKOFF_US;
use crate::error::AudioError;

/// Outcome of one render call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// More audio may follow; keep invoking the callback
    Continue,
    /// The stream tail has been emitted; playback is done
    Complete,
}

/// Capability to fill the next block of device output
pub trait Render: Send {
    /// Fill `output` completely, zero-padding anything unavailable.
    ///
    /// Real-time context: must return quickly and must not block.
    fn render(&mut self, output: &mut [f32]) -> RenderStatus;
}

/// Flags and counters shared between the callback and the control thread
#[derive(Default)]
pub struct StreamControl {
    /// Set once by the producer after the last source read
    end_of_input: AtomicBool,
    /// Set once by the callback when the renderer completes
    finished: AtomicBool,
    /// Set when the device reports a stream error
    failed: AtomicBool,
    samples_played: AtomicU64,
    underrun_frames: AtomicU64,
}

impl StreamControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Producer side: no more samples will ever be written
    pub fn mark_end_of_input(&self) {
        self.end_of_input.store(true, Ordering::Release);
    }

    pub fn end_of_input(&self) -> bool {
        self.end_of_input.load(Ordering::Acquire)
    }

    /// Consumer side: the stream tail has been played out
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn add_samples_played(&self, count: usize) {
        self.samples_played.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn samples_played(&self) -> u64 {
        self.samples_played.load(Ordering::Relaxed)
    }

    fn add_underrun_frames(&self, count: usize) {
        self.underrun_frames.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn underrun_frames(&self) -> u64 {
        self.underrun_frames.load(Ordering::Relaxed)
    }
}

/// Renderer over a fully preloaded sample store
pub struct PreloadRenderer {
    store: Arc<SampleStore>,
    cursor: usize,
    control: Arc<StreamControl>,
}

impl PreloadRenderer {
    pub fn new(store: Arc<SampleStore>, control: Arc<StreamControl>) -> Self {
        Self {
            store,
            cursor: 0,
            control,
        }
    }
}

impl Render for PreloadRenderer {
    fn render(&mut self, output: &mut [f32]) -> RenderStatus {
        let samples = self.store.as_slice();
        let remaining = samples.len() - self.cursor;
        let count = remaining.min(output.len());
        output[..count].copy_from_slice(&samples[self.cursor..self.cursor + count]);
        self.cursor += count;
        for slot in &mut output[count..] {
            *slot = 0.0;
        }
        self.control.add_samples_played(count);
        if self.cursor >= samples.len() {
            RenderStatus::Complete
        } else {
            RenderStatus::Continue
        }
    }
}

/// Renderer draining the streaming ring buffer
pub struct StreamRenderer {
    consumer: Consumer,
    control: Arc<StreamControl>,
}

impl StreamRenderer {
    pub fn new(consumer: Consumer, control: Arc<StreamControl>) -> Self {
        Self { consumer, control }
    }
}

impl Render for StreamRenderer {
    fn render(&mut self, output: &mut [f32]) -> RenderStatus {
        let count = self.consumer.read_into(output);
        self.control.add_samples_played(count);

        // Loading the end-of-input flag after draining means a true value
        // covers every write the producer ever made: the acquire load pairs
        // with the producer's release store, so the availability check below
        // cannot miss a published sample.
        let drained = self.control.end_of_input();
        if count < output.len() && !drained {
            self.control.add_underrun_frames(output.len() - count);
        }
        if drained && self.consumer.available() == 0 {
            RenderStatus::Complete
        } else {
            RenderStatus::Continue
        }
    }
}

/// An open cpal output stream wrapped around a renderer
pub struct OutputStream {
    stream: cpal::Stream,
    control: Arc<StreamControl>,
    error_rx: Receiver<AudioError>,
}

impl OutputStream {
    /// Build the stream. The callback starts firing on [`OutputStream::start`].
    pub fn open(
        device: &OutputDevice,
        config: &cpal::StreamConfig,
        mut renderer: Box<dyn Render>,
        control: Arc<StreamControl>,
    ) -> Result<Self, AudioError> {
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        let callback_control = control.clone();
        let error_control = control.clone();

        let stream = device
            .inner()
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if callback_control.is_finished() {
                        data.fill(0.0);
                        return;
                    }
                    if renderer.render(data) == RenderStatus::Complete {
                        callback_control.mark_finished();
                    }
                },
                move |err| {
                    error_control.mark_failed();
                    let _ = error_tx.try_send(AudioError::Stream(err.to_string()));
                },
                None,
            )
            .map_err(|e| AudioError::StreamOpen(e.to_string()))?;

        Ok(Self {
            stream,
            control,
            error_rx,
        })
    }

    /// Start the device clock; the real-time thread begins invoking the callback
    pub fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamStart(e.to_string()))
    }

    /// Stop the device. Errors on teardown are ignored.
    pub fn stop(&self) {
        let _ = self.stream.pause();
    }

    pub fn control(&self) -> &Arc<StreamControl> {
        &self.control
    }

    /// Pull a pending stream error, if the device reported one
    pub fn take_error(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

/// Synchronous write facade for the blocking-stream strategy.
///
/// cpal has no blocking write primitive, so backpressure comes from this
/// facade: it queues into a small device-granularity ring and sleeps briefly
/// whenever the callback has not yet freed space.
pub struct BlockingWriter {
    producer: Producer,
    control: Arc<StreamControl>,
}

impl BlockingWriter {
    pub fn new(producer: Producer, control: Arc<StreamControl>) -> Self {
        Self { producer, control }
    }

    /// Queue every sample, blocking until the device accepts them.
    ///
    /// Returns the number of samples queued, which is `samples.len()` unless
    /// `abort` fired or the stream failed mid-write.
    pub fn write(&mut self, samples: &[f32], mut abort: impl FnMut() -> bool) -> usize {
        let mut queued = 0;
        let mut pending = samples;
        while !pending.is_empty() {
            if self.control.is_failed() || abort() {
                break;
            }
            let n = self.producer.write(pending);
            pending = &pending[n..];
            queued += n;
            if n == 0 {
                std::thread::sleep(Duration::from_micros(WRITE_BACKOFF_US));
            }
        }
        queued
    }
}
