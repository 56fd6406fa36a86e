//! Audio spectrogram computation and rendering.
//!
//! A decoded waveform goes through the [`spectrum`] transform, is compressed
//! according to its [`Mode`](spectrum::Mode), drawn by [`render`] and encoded
//! as JPEG. [`task::Orchestrator`] runs that pipeline in the background
//! behind a submit/poll interface.

pub mod accel;
pub mod audio;
pub mod config;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod spectrum;
pub mod storage;
pub mod task;
pub mod validate;

pub use error::{Result, SpectrogramError};
pub use pipeline::{Pipeline, RenderedImage, SpectrogramInfo};
pub use task::{Orchestrator, TaskRecord, TaskStatus};
pub use validate::RenderRequest;
