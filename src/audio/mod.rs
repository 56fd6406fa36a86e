pub mod decode;

pub use decode::{decode_audio, Waveform};
