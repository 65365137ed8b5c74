//! Engine-level scenarios driven without an audio device.
//!
//! The real-time consumer is simulated by invoking the renderers the way the
//! device callback would: fixed-size output blocks, no blocking, completion
//! taken from the returned status.

use std::io::Cursor;
use std::sync::Arc;

use pcm_player::audio::buffer::{spsc, SampleStore};
use pcm_player::audio::playback::{
    PreloadRenderer, Render, RenderStatus, StreamControl, StreamRenderer,
};
use pcm_player::config::PlayerConfig;
use pcm_player::error::{Error, SourceError};
use pcm_player::session::{self, CancelToken, PlaybackMode};
use pcm_player::source::SampleSource;

const FRAMES_PER_BLOCK: usize = 256;

fn encode(samples: impl Iterator<Item = f32>) -> Vec<u8> {
    samples.flat_map(|s| s.to_le_bytes()).collect()
}

/// A second of silence, preloaded and played to completion.
#[test]
fn preload_plays_one_second_of_silence_exactly() {
    let total = 44_100usize;
    let bytes = encode(std::iter::repeat(0.0f32).take(total));
    let mut source = SampleSource::new(Cursor::new(bytes));

    let mut store = SampleStore::with_capacity(65_536);
    let mut chunk = vec![0.0f32; 4096];
    loop {
        let read = source.read_chunk(&mut chunk);
        if read == 0 {
            break;
        }
        store.append(&chunk[..read]).unwrap();
    }
    assert_eq!(store.len(), total);
    assert!((store.duration_secs(44_100) - 1.0).abs() < 1e-9);

    let control = StreamControl::new();
    let mut renderer = PreloadRenderer::new(Arc::new(store), control.clone());
    let mut block = [0.0f32; FRAMES_PER_BLOCK];
    let mut calls = 0;
    while renderer.render(&mut block) == RenderStatus::Continue {
        calls += 1;
        assert!(calls < 1_000, "renderer never completed");
    }
    // 173 blocks of 256 frames cover 44100 samples
    assert_eq!(calls + 1, total.div_ceil(FRAMES_PER_BLOCK));
    assert_eq!(control.samples_played(), total as u64);
}

/// An empty input stream in preload mode fails before the device is touched.
#[test]
fn preload_with_empty_stream_is_a_source_error() {
    let source = SampleSource::new(Cursor::new(Vec::new()));
    let err = session::run(
        PlaybackMode::Preload,
        source,
        &PlayerConfig::default(),
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Source(SourceError::Empty)));
}

/// Five seconds of audio through the streaming ring: every sample arrives in
/// order, no underruns while the producer keeps pace, and completion fires
/// only after the last sample drains.
#[test]
fn callback_stream_delivers_everything_in_order() {
    let total = 220_500usize;
    let chunk_samples = 4410usize;
    let bytes = encode((0..total).map(|i| (i % 44_100) as f32 / 44_100.0));
    let mut source = SampleSource::new(Cursor::new(bytes));

    let (mut producer, consumer) = spsc(88_200).unwrap();
    let control = StreamControl::new();
    let mut renderer = StreamRenderer::new(consumer, control.clone());

    let mut chunk = vec![0.0f32; chunk_samples];
    let mut block = [0.0f32; FRAMES_PER_BLOCK];
    let mut played = Vec::with_capacity(total + FRAMES_PER_BLOCK);

    // Producer keeps pace: the simulated device only ticks when the ring has
    // no room for the next write.
    loop {
        let read = source.read_chunk(&mut chunk);
        if read == 0 {
            break;
        }
        let mut pending = &chunk[..read];
        while !pending.is_empty() {
            let wrote = producer.write(pending);
            pending = &pending[wrote..];
            if wrote == 0 {
                assert_eq!(renderer.render(&mut block), RenderStatus::Continue);
                played.extend_from_slice(&block);
            }
        }
    }
    control.mark_end_of_input();

    loop {
        let status = renderer.render(&mut block);
        played.extend_from_slice(&block);
        if status == RenderStatus::Complete {
            break;
        }
    }

    assert_eq!(control.samples_played(), total as u64);
    assert_eq!(control.underrun_frames(), 0);
    for (i, &sample) in played[..total].iter().enumerate() {
        assert_eq!(sample, (i % 44_100) as f32 / 44_100.0, "sample {} reordered", i);
    }
    assert!(played[total..].iter().all(|&s| s == 0.0));
}

/// A stalled producer: the callback plays the available prefix, pads the
/// shortfall with exact zeros, and never repeats stale samples.
#[test]
fn stalled_producer_gets_silence_not_stale_data() {
    let (mut producer, consumer) = spsc(88_200).unwrap();
    let control = StreamControl::new();
    let mut renderer = StreamRenderer::new(consumer, control.clone());

    let first: Vec<f32> = (0..300).map(|v| v as f32 + 1.0).collect();
    assert_eq!(producer.write(&first), 300);

    let mut block = [f32::NAN; FRAMES_PER_BLOCK];
    assert_eq!(renderer.render(&mut block), RenderStatus::Continue);
    assert_eq!(block[..], first[..FRAMES_PER_BLOCK]);

    // Stall: only 44 samples left for a 256-frame request
    assert_eq!(renderer.render(&mut block), RenderStatus::Continue);
    assert_eq!(&block[..44], &first[FRAMES_PER_BLOCK..]);
    assert!(block[44..].iter().all(|&s| s == 0.0));
    assert_eq!(control.underrun_frames(), (FRAMES_PER_BLOCK - 44) as u64);

    // Fully stalled: exact zeros, still no completion without end-of-input
    assert_eq!(renderer.render(&mut block), RenderStatus::Continue);
    assert!(block.iter().all(|&s| s == 0.0));

    // Producer resumes: fresh samples come out, not stale ones
    let second: Vec<f32> = (0..FRAMES_PER_BLOCK).map(|v| -(v as f32) - 1.0).collect();
    assert_eq!(producer.write(&second), FRAMES_PER_BLOCK);
    assert_eq!(renderer.render(&mut block), RenderStatus::Continue);
    assert_eq!(block[..], second[..]);
}

/// Full concurrent pipeline: a producer thread ingesting from a source while
/// a consumer thread runs the renderer at device cadence. Order is preserved
/// end to end and completion is signaled exactly once, after the drain.
#[test]
fn threaded_pipeline_preserves_order_and_completes() {
    let total = 50_000usize;
    // Values start at 1.0 so underrun padding (exact zeros) is unambiguous
    let bytes = encode((0..total).map(|i| (i + 1) as f32));
    let (mut producer, consumer) = spsc(4096).unwrap();
    let control = StreamControl::new();
    let mut renderer = StreamRenderer::new(consumer, control.clone());

    let producer_control = control.clone();
    let feeder = std::thread::spawn(move || {
        let mut source = SampleSource::new(Cursor::new(bytes));
        let mut chunk = vec![0.0f32; 1024];
        loop {
            let read = source.read_chunk(&mut chunk);
            if read == 0 {
                break;
            }
            let mut pending = &chunk[..read];
            while !pending.is_empty() {
                let wrote = producer.write(pending);
                pending = &pending[wrote..];
                if wrote == 0 {
                    std::thread::yield_now();
                }
            }
        }
        producer_control.mark_end_of_input();
    });

    let mut block = [0.0f32; FRAMES_PER_BLOCK];
    let mut expected = 0usize;
    loop {
        let status = renderer.render(&mut block);
        for &sample in block.iter() {
            if sample == 0.0 {
                // Underrun padding or drain tail
                continue;
            }
            expected += 1;
            assert_eq!(sample, expected as f32, "sample out of order");
        }
        if status == RenderStatus::Complete {
            break;
        }
        std::thread::yield_now();
    }
    feeder.join().unwrap();

    assert_eq!(expected, total, "samples lost");
    assert_eq!(control.samples_played(), total as u64);
}
