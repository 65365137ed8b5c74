//! Audio subsystem module

pub mod buffer;
pub mod device;
pub mod playback;

pub use buffer::{spsc, Consumer, Producer, SampleStore};
pub use device::{default_output_device, OutputDevice};
pub use playback::{
    BlockingWriter, OutputStream, PreloadRenderer, Render, RenderStatus, StreamControl,
    StreamRenderer,
};
