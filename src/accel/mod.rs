//! Optional accelerated execution for the transform engine.
//!
//! Detection happens once at startup; the result is injected into
//! [`TransformEngine`](crate::spectrum::TransformEngine).

pub mod context;
pub mod fft;

use std::fmt;
use std::sync::Arc;

pub use context::GpuContext;
pub use fft::GpuFft;

#[derive(Clone)]
pub enum Capability {
    Accelerated(Arc<GpuFft>),
    ScalarOnly,
}

impl Capability {
    /// Probe for a compute device. Any failure yields `ScalarOnly`.
    pub fn detect(enabled: bool) -> Self {
        if !enabled {
            log::info!("Accelerated transform disabled; using scalar FFT");
            return Capability::ScalarOnly;
        }

        let gpu = match GpuContext::new() {
            Ok(gpu) => gpu,
            Err(e) => {
                log::info!("No accelerated device ({:#}); using scalar FFT", e);
                return Capability::ScalarOnly;
            }
        };

        match GpuFft::new(gpu) {
            Ok(fft) => Capability::Accelerated(Arc::new(fft)),
            Err(e) => {
                log::warn!("Failed to build compute FFT ({:#}); using scalar FFT", e);
                Capability::ScalarOnly
            }
        }
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self, Capability::Accelerated(_))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Accelerated(fft) => write!(f, "Accelerated({})", fft.adapter_name()),
            Capability::ScalarOnly => f.write_str("ScalarOnly"),
        }
    }
}
