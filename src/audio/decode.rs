use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Mono PCM waveform at its native sample rate.
#[derive(Clone, Debug)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode an audio file to a mono waveform. The original sample rate is kept;
/// multi-channel input is downmixed by averaging.
pub fn decode_audio(path: &Path) -> Result<Waveform> {
    let mut stream = AudioStream::open(path)?;
    let mut mono = Vec::new();
    while stream.read_block(&mut mono)? {}

    let sample_rate = stream
        .sample_rate
        .with_context(|| format!("Unknown sample rate in {}", path.display()))?;
    if mono.is_empty() {
        anyhow::bail!("No audio samples in {}", path.display());
    }

    let waveform = Waveform::new(mono, sample_rate);
    log::info!(
        "Decoded {}: {} samples at {} Hz ({:.2}s)",
        path.display(),
        waveform.samples.len(),
        sample_rate,
        waveform.duration()
    );
    Ok(waveform)
}

/// The first decodable track of a container, read one packet at a time.
struct AudioStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: Option<u32>,
    buffer: Option<SampleBuffer<f32>>,
}

impl AudioStream {
    fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let source = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format = symphonia::default::get_probe()
            .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
            .with_context(|| format!("Unrecognised audio container: {}", path.display()))?
            .format;

        let track = format
            .default_track()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .or_else(|| format.tracks().iter().find(|t| t.codec_params.codec != CODEC_TYPE_NULL))
            .context("No audio track found")?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Unsupported audio codec")?;

        Ok(Self {
            track_id: track.id,
            sample_rate: track.codec_params.sample_rate,
            format,
            decoder,
            buffer: None,
        })
    }

    /// Append the next packet's samples, downmixed, to `mono`. Returns
    /// `false` at end of stream.
    fn read_block(&mut self, mono: &mut Vec<f32>) -> Result<bool> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(false)
            }
            Err(e) => return Err(e).context("Failed to read audio packet"),
        };
        if packet.track_id() != self.track_id {
            return Ok(true);
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet: {}", msg);
                return Ok(true);
            }
            Err(e) => return Err(e).context("Failed to decode audio"),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        self.sample_rate.get_or_insert(spec.rate);

        let needed = decoded.frames() * channels;
        let mut buffer = match self.buffer.take() {
            Some(buf) if buf.capacity() >= needed => buf,
            _ => SampleBuffer::new(decoded.capacity() as u64, spec),
        };
        buffer.copy_interleaved_ref(decoded);

        let scale = 1.0 / channels as f32;
        mono.extend(
            buffer
                .samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() * scale),
        );
        self.buffer = Some(buffer);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_sample_rate() {
        let wave = Waveform::new(vec![0.0; 22050], 44100);
        assert!((wave.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn garbage_is_not_a_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, [0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert!(decode_audio(&path).is_err());
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let wave = decode_audio(&path).unwrap();
        assert_eq!(wave.sample_rate, 8000);
        assert_eq!(wave.samples.len(), 800);
        assert!(wave.samples.iter().all(|s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = decode_audio(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(err.to_string().contains("Failed to open audio file"));
    }
}
