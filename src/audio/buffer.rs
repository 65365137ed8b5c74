//! Sample buffers shared between the control thread and the audio callback
//!
//! Two buffer types back the playback strategies:
//!
//! - [`SampleStore`]: an append-only growable buffer filled completely before
//!   playback starts (preload mode). Single writer phase, then single reader
//!   phase; never mutated concurrently.
//! - An SPSC ring buffer split into a [`Producer`] and a [`Consumer`]
//!   (streaming modes). The producer owns the write index, the consumer owns
//!   the read index, and each side publishes its own index with release
//!   ordering after touching slot data, observing the other's with acquire
//!   ordering before touching slot data. No mutex anywhere on this path; the
//!   consumer runs on the device's real-time thread.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::AudioError;

/// Append-only sample buffer for the preload strategy.
///
/// Capacity doubles (repeatedly, until sufficient) when an append would
/// overflow, so appends are amortized O(1) per sample and the capacity is
/// always a power-of-two multiple of the initial capacity. Allocation
/// failure is surfaced as an error instead of aborting; the caller treats it
/// as fatal and never starts playback on a truncated buffer.
pub struct SampleStore {
    samples: Vec<f32>,
}

impl SampleStore {
    /// Create a store with the given initial capacity in samples
    pub fn with_capacity(initial: usize) -> Self {
        Self {
            samples: Vec::with_capacity(initial.max(1)),
        }
    }

    /// Append a chunk, growing by doubling if needed
    pub fn append(&mut self, chunk: &[f32]) -> Result<(), AudioError> {
        let needed = self.samples.len() + chunk.len();
        if needed > self.samples.capacity() {
            let mut target = self.samples.capacity().max(1);
            while target < needed {
                target *= 2;
            }
            self.samples
                .try_reserve_exact(target - self.samples.len())
                .map_err(|_| AudioError::Allocation { samples: target })?;
        }
        self.samples.extend_from_slice(chunk);
        Ok(())
    }

    /// Number of samples stored
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the store holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Current allocated capacity in samples
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Stored audio duration at the given sample rate
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }

    /// All stored samples in append order
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }
}

/// Shared state of the SPSC ring buffer.
///
/// Indices are kept in `[0, capacity)` and advance modulo capacity. One slot
/// stays reserved so that `write == read` unambiguously means empty; the ring
/// therefore holds at most `capacity - 1` samples.
struct RingBuffer {
    slots: Box<[UnsafeCell<f32>]>,
    /// Write index, mutated only by the producer
    write_pos: AtomicUsize,
    /// Read index, mutated only by the consumer
    read_pos: AtomicUsize,
    capacity: usize,
}

// The slot data is only ever written by the producer in the region it owns
// (between the published read index and its own write index) and only read
// by the consumer in the region it owns. The release store on an index
// publishes the slot contents that the acquire load on the other side
// observes.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    fn occupancy(&self, write: usize, read: usize) -> usize {
        (write + self.capacity - read) % self.capacity
    }
}

/// Create an SPSC ring buffer holding up to `capacity - 1` samples.
///
/// The handles are the only way to touch the ring: exactly one `Producer`
/// and one `Consumer` exist, which is what makes the single-writer-per-index
/// protocol sound.
pub fn spsc(capacity: usize) -> Result<(Producer, Consumer), AudioError> {
    if capacity < 2 {
        return Err(AudioError::InvalidCapacity(capacity));
    }
    let ring = Arc::new(RingBuffer {
        slots: (0..capacity).map(|_| UnsafeCell::new(0.0)).collect(),
        write_pos: AtomicUsize::new(0),
        read_pos: AtomicUsize::new(0),
        capacity,
    });
    Ok((
        Producer { ring: ring.clone() },
        Consumer { ring },
    ))
}

/// Write half of the ring buffer, held by the ingestion thread
pub struct Producer {
    ring: Arc<RingBuffer>,
}

impl Producer {
    /// Samples that can be written right now.
    ///
    /// The read index observed here may be stale, which only makes this an
    /// underestimate: the producer can never overwrite unread data.
    pub fn free_space(&self) -> usize {
        let write = self.ring.write_pos.load(Ordering::Relaxed);
        let read = self.ring.read_pos.load(Ordering::Acquire);
        self.ring.capacity - 1 - self.ring.occupancy(write, read)
    }

    /// Copy samples into the ring, up to the current free space.
    ///
    /// Returns how many samples were accepted; the caller retries the
    /// remainder after backing off.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let count = samples.len().min(self.free_space());
        if count == 0 {
            return 0;
        }
        let write = self.ring.write_pos.load(Ordering::Relaxed);
        for (i, &sample) in samples[..count].iter().enumerate() {
            let idx = (write + i) % self.ring.capacity;
            unsafe {
                *self.ring.slots[idx].get() = sample;
            }
        }
        // Publish the slots written above before the new index becomes visible
        self.ring
            .write_pos
            .store((write + count) % self.ring.capacity, Ordering::Release);
        count
    }

    /// Maximum samples the ring can hold
    pub fn capacity(&self) -> usize {
        self.ring.capacity - 1
    }
}

/// Read half of the ring buffer, held by the real-time callback
pub struct Consumer {
    ring: Arc<RingBuffer>,
}

impl Consumer {
    /// Samples buffered and ready to read.
    ///
    /// The write index observed here may be stale, which only makes this an
    /// underestimate: the consumer never reads a slot the producer has not
    /// published.
    pub fn available(&self) -> usize {
        let write = self.ring.write_pos.load(Ordering::Acquire);
        let read = self.ring.read_pos.load(Ordering::Relaxed);
        self.ring.occupancy(write, read)
    }

    /// Drain buffered samples into `output`, zero-padding any shortfall.
    ///
    /// Returns the number of real samples copied; `output.len() - count`
    /// slots were filled with silence. Never blocks and never errors: an
    /// underrun degrades audibly instead of stalling the device thread.
    pub fn read_into(&mut self, output: &mut [f32]) -> usize {
        let count = output.len().min(self.available());
        let read = self.ring.read_pos.load(Ordering::Relaxed);
        for (i, slot) in output[..count].iter_mut().enumerate() {
            let idx = (read + i) % self.ring.capacity;
            *slot = unsafe { *self.ring.slots[idx].get() };
        }
        self.ring
            .read_pos
            .store((read + count) % self.ring.capacity, Ordering::Release);
        for slot in &mut output[count..] {
            *slot = 0.0;
        }
        count
    }

    /// Maximum samples the ring can hold
    pub fn capacity(&self) -> usize {
        self.ring.capacity - 1
    }
}
