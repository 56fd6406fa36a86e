pub mod jpeg;

pub use jpeg::encode_jpeg;
