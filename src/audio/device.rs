//! Output device access
//!
//! The player only ever uses the host's default output device with a fixed
//! format: f32 samples, one channel, the configured sample rate. Device
//! enumeration and selection are out of scope.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::constants::CHANNELS;
use crate::error::AudioError;

/// Wrapper around the default cpal output device
pub struct OutputDevice {
    inner: cpal::Device,
    pub name: String,
}

impl OutputDevice {
    pub fn inner(&self) -> &cpal::Device {
        &self.inner
    }

    /// Stream configuration for playback.
    ///
    /// `frames_per_buffer` requests a fixed callback block size (callback
    /// modes); `None` leaves the granularity to the device (blocking mode).
    pub fn stream_config(&self, sample_rate: u32, frames_per_buffer: Option<u32>) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: match frames_per_buffer {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        }
    }
}

/// Get the default output device
pub fn default_output_device() -> Result<OutputDevice, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceNotFound("no default output device".to_string()))?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    Ok(OutputDevice { inner: device, name })
}
