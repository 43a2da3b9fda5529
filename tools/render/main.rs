use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use mbcompressor::state;
use mbcompressor::{CompressorProcessor, StatefulProcessor};
use std::path::PathBuf;

const BLOCK_FRAMES: usize = 512;

fn usage() -> ! {
    eprintln!("usage: comp_render <input.wav> <output.wav> [settings.json]");
    std::process::exit(2);
}

fn read_samples(input: &PathBuf) -> Result<(WavSpec, Vec<f32>)> {
    let reader = WavReader::open(input)
        .with_context(|| format!("failed to open input WAV '{}'", input.display()))?;
    let spec = reader.spec();
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (format, bits) => {
            anyhow::bail!("unsupported WAV format: {:?} at {} bits", format, bits)
        }
    };
    Ok((spec, samples))
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let input = args.next().map(PathBuf::from).unwrap_or_else(|| usage());
    let output = args.next().map(PathBuf::from).unwrap_or_else(|| usage());
    let settings_path = args.next().map(PathBuf::from);

    let (spec, interleaved) = read_samples(&input)?;
    let channels = spec.channels as usize;

    let mut processor = CompressorProcessor::new();
    if let Some(path) = &settings_path {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings '{}'", path.display()))?;
        let restored = state::load_or_default(&json);
        processor.set_parameters(restored.settings());
        processor.set_bypassed(restored.bypassed);
    }
    processor
        .prepare(spec.sample_rate as f32, BLOCK_FRAMES, channels)
        .context("failed to prepare compressor")?;

    let out_spec = WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&output, out_spec)
        .with_context(|| format!("failed to create output WAV '{}'", output.display()))?;

    let mut planes = vec![vec![0.0f32; BLOCK_FRAMES]; channels];
    let mut frames_done = 0usize;
    let mut peak_reduction = 0.0f32;

    for chunk in interleaved.chunks(BLOCK_FRAMES * channels) {
        let frames = chunk.len() / channels;
        for (i, frame) in chunk.chunks_exact(channels).enumerate() {
            for (ch, sample) in frame.iter().enumerate() {
                planes[ch][i] = *sample;
            }
        }

        let mut block: Vec<&mut [f32]> = planes.iter_mut().map(|p| &mut p[..frames]).collect();
        processor.process(&mut block)?;

        for ch in 0..channels {
            peak_reduction = peak_reduction.max(processor.engine().gain_reduction_db(ch));
        }
        for i in 0..frames {
            for plane in &planes {
                writer.write_sample(plane[i])?;
            }
        }
        frames_done += frames;
    }
    writer.finalize()?;

    println!("Render summary for '{}':", input.display());
    println!("  frames processed     : {}", frames_done);
    println!("  peak gain reduction  : {:.2} dB", peak_reduction);
    Ok(())
}
