//! Sample source: raw little-endian f32 ingestion
//!
//! Wraps any byte reader and hands out fixed-size chunks of decoded samples.
//! The stream has no header or framing: it ends on EOF, and a read error is
//! folded into end-of-stream (logged, ingestion stops, buffered audio still
//! drains).

use std::io::Read;

use tracing::{debug, warn};

/// Bytes per raw sample on the wire
pub const BYTES_PER_SAMPLE: usize = std::mem::size_of::<f32>();

/// Chunked reader of raw f32 samples
pub struct SampleSource<R> {
    reader: R,
    /// Reused byte buffer for one chunk of reads
    scratch: Vec<u8>,
    bytes_read: u64,
    samples_read: u64,
    chunks_read: u64,
    finished: bool,
}

impl<R: Read> SampleSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            scratch: Vec::new(),
            bytes_read: 0,
            samples_read: 0,
            chunks_read: 0,
            finished: false,
        }
    }

    /// Fill `chunk` with up to `chunk.len()` decoded samples.
    ///
    /// Returns the number of samples produced; `0` means the stream is
    /// exhausted and every later call returns `0` as well. A short return
    /// (`0 < n < chunk.len()`) also marks exhaustion: the underlying reader
    /// is only short at end-of-stream or on error, and both end ingestion.
    pub fn read_chunk(&mut self, chunk: &mut [f32]) -> usize {
        if self.finished || chunk.is_empty() {
            return 0;
        }

        let wanted = chunk.len() * BYTES_PER_SAMPLE;
        self.scratch.resize(wanted, 0);
        let mut filled = 0;
        while filled < wanted {
            match self.reader.read(&mut self.scratch[filled..]) {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("source read failed, treating as end of stream: {}", e);
                    self.finished = true;
                    break;
                }
            }
        }
        self.bytes_read += filled as u64;

        let whole = filled / BYTES_PER_SAMPLE;
        if filled % BYTES_PER_SAMPLE != 0 {
            debug!(
                "discarding {} trailing bytes of a partial sample",
                filled % BYTES_PER_SAMPLE
            );
        }
        for (slot, bytes) in chunk[..whole]
            .iter_mut()
            .zip(self.scratch[..whole * BYTES_PER_SAMPLE].chunks_exact(BYTES_PER_SAMPLE))
        {
            *slot = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        self.samples_read += whole as u64;
        if whole > 0 {
            self.chunks_read += 1;
        }
        whole
    }

    /// Whether the stream has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Total bytes consumed from the reader
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Total samples decoded
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// Number of non-empty chunks produced
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_little_endian_samples() {
        let bytes = encode(&[0.0, 1.0, -0.5, 0.25]);
        let mut source = SampleSource::new(Cursor::new(bytes));
        let mut chunk = [0.0f32; 4];
        assert_eq!(source.read_chunk(&mut chunk), 4);
        assert_eq!(chunk, [0.0, 1.0, -0.5, 0.25]);
        assert_eq!(source.bytes_read(), 16);
        assert_eq!(source.samples_read(), 4);
    }

    #[test]
    fn short_final_chunk_ends_the_stream() {
        let bytes = encode(&[1.0, 2.0, 3.0]);
        let mut source = SampleSource::new(Cursor::new(bytes));
        let mut chunk = [0.0f32; 2];
        assert_eq!(source.read_chunk(&mut chunk), 2);
        assert!(!source.is_finished());
        assert_eq!(source.read_chunk(&mut chunk), 1);
        assert!(source.is_finished());
        assert_eq!(source.read_chunk(&mut chunk), 0);
        assert_eq!(source.chunks_read(), 2);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut source = SampleSource::new(Cursor::new(Vec::new()));
        let mut chunk = [0.0f32; 8];
        assert_eq!(source.read_chunk(&mut chunk), 0);
        assert!(source.is_finished());
        assert_eq!(source.samples_read(), 0);
    }

    #[test]
    fn trailing_partial_sample_is_discarded() {
        let mut bytes = encode(&[5.0]);
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let mut source = SampleSource::new(Cursor::new(bytes));
        let mut chunk = [0.0f32; 4];
        assert_eq!(source.read_chunk(&mut chunk), 1);
        assert_eq!(chunk[0], 5.0);
        assert!(source.is_finished());
    }

    /// Reader that yields some data, then fails
    struct FlakyReader {
        data: Cursor<Vec<u8>>,
        fail_after: u64,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.data.position() >= self.fail_after {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
            }
            let limit = (self.fail_after - self.data.position()) as usize;
            let take = buf.len().min(limit);
            self.data.read(&mut buf[..take])
        }
    }

    #[test]
    fn read_error_is_treated_as_end_of_stream() {
        let reader = FlakyReader {
            data: Cursor::new(encode(&[1.0, 2.0, 3.0, 4.0])),
            fail_after: 8,
        };
        let mut source = SampleSource::new(reader);
        let mut chunk = [0.0f32; 4];
        assert_eq!(source.read_chunk(&mut chunk), 2);
        assert_eq!(&chunk[..2], &[1.0, 2.0]);
        assert!(source.is_finished());
        assert_eq!(source.read_chunk(&mut chunk), 0);
    }
}
