use std::f32::consts::PI;
use std::path::Path;

use specgram::audio::{decode_audio, Waveform};
use specgram::render::{RenderProfile, Renderer};
use specgram::spectrum::{Mode, Scale, TransformEngine, DB_FLOOR};
use specgram::validate::FftSize;
use specgram::{Pipeline, RenderRequest};

fn tone(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * seconds) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn pipeline() -> Pipeline {
    Pipeline::new(TransformEngine::scalar(), Renderer::without_text())
}

fn request(scale: Scale, mode: Mode) -> RenderRequest {
    RenderRequest {
        scale,
        mode,
        fft_size: FftSize::try_from(2048).unwrap(),
        use_accelerated: false,
        ..RenderRequest::default()
    }
}

#[test]
fn pure_tone_has_a_ridge_at_its_bin() {
    let sr = 44_100;
    let waveform = Waveform::new(tone(440.0, sr, 2.0), sr);
    let analysis = pipeline()
        .analyze(&waveform, &request(Scale::Linear, Mode::Classic))
        .unwrap();

    assert_eq!(analysis.matrix.frequency_bins(), 1025);
    assert_eq!(analysis.hop_length, 512);

    let maxima = analysis.matrix.bin_maxima();
    let (peak, _) = maxima
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .unwrap();
    // 440 Hz / (44100 / 2048) ≈ bin 20.4
    assert!((19..=21).contains(&peak), "peak at bin {}", peak);

    let info = analysis.info();
    assert_eq!(info.duration, 2.0);
    assert_eq!(info.sample_rate, sr);
    assert_eq!(info.frequency_bins, 1025);
}

#[test]
fn wav_file_decodes_at_native_rate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, &tone(1000.0, 22_050, 1.0), 22_050);

    let waveform = decode_audio(&path).unwrap();
    assert_eq!(waveform.sample_rate, 22_050);
    assert_eq!(waveform.samples.len(), 22_050);
}

#[test]
fn silence_renders_without_error() {
    let waveform = Waveform::new(vec![0.0; 44_100], 44_100);
    for mode in [Mode::Classic, Mode::Sharp, Mode::Sharper] {
        let req = request(Scale::Linear, mode);
        let analysis = pipeline().analyze(&waveform, &req).unwrap();
        assert!(analysis.matrix.min() >= DB_FLOOR);
        assert!(analysis.range.vmax >= analysis.range.vmin);
        // Flat silence sits at the top of the colour range.
        assert_eq!(analysis.range.vmax, DB_FLOOR);
        if let Some(top_db) = mode.config().top_db {
            assert_eq!(analysis.range.vmin, DB_FLOOR - top_db);
        }

        let image = pipeline().generate_preview(&waveform, &req).unwrap();
        assert!(!image.bytes.is_empty());
    }
}

#[test]
fn preview_and_final_report_the_same_info() {
    let sr = 22_050;
    let waveform = Waveform::new(tone(880.0, sr, 1.0), sr);
    let req = request(Scale::Log, Mode::Sharp);

    let preview = pipeline().generate_preview(&waveform, &req).unwrap();
    let full = pipeline().generate_final(&waveform, &req).unwrap();
    assert_eq!(preview.info, full.info);

    let preview_img = image::load_from_memory(&preview.bytes).unwrap();
    let full_img = image::load_from_memory(&full.bytes).unwrap();
    let preview_profile = RenderProfile::preview();
    let final_profile = RenderProfile::final_render();
    assert_eq!(preview_img.width(), preview_profile.width);
    assert_eq!(preview_img.height(), preview_profile.height);
    assert_eq!(full_img.width(), final_profile.width);
    assert_eq!(full_img.height(), final_profile.height);
}

#[test]
fn rendering_is_deterministic() {
    let sr = 16_000;
    let waveform = Waveform::new(tone(300.0, sr, 1.0), sr);
    let req = request(Scale::Mel, Mode::Sharper);

    let a = pipeline().generate_preview(&waveform, &req).unwrap();
    let b = pipeline().generate_preview(&waveform, &req).unwrap();
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn mel_scale_uses_band_rows() {
    let sr = 22_050;
    let waveform = Waveform::new(tone(2000.0, sr, 1.0), sr);
    let analysis = pipeline()
        .analyze(&waveform, &request(Scale::Mel, Mode::Classic))
        .unwrap();
    assert!(analysis.matrix.frequency_bins() < 1025);
    assert!(analysis.bounds.max <= sr as f32 / 2.0);
}

#[test]
fn shorter_than_one_frame_is_padded() {
    let waveform = Waveform::new(vec![0.1; 100], 44_100);
    let analysis = pipeline()
        .analyze(&waveform, &request(Scale::Linear, Mode::Classic))
        .unwrap();
    assert_eq!(analysis.matrix.time_frames(), 1);
}

#[test]
fn empty_waveform_is_rejected() {
    let waveform = Waveform::new(Vec::new(), 44_100);
    let result = pipeline().generate_preview(&waveform, &request(Scale::Linear, Mode::Classic));
    assert!(matches!(result, Err(specgram::SpectrogramError::Transform(_))));
}
