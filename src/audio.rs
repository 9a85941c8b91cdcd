use std::fs;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rodio::{Decoder, OutputStream, Sink};

use crate::error::AudioError;

type WavFileWriter = hound::WavWriter<std::io::BufWriter<std::fs::File>>;

/// Play decoded speech audio on a detached thread so the caller never
/// blocks. Playback failures are logged, not surfaced.
pub fn play_audio(bytes: Vec<u8>) {
    std::thread::spawn(move || {
        if let Err(e) = play_blocking(bytes) {
            log::error!("audio playback failed: {e}");
        }
    });
}

fn play_blocking(bytes: Vec<u8>) -> Result<(), AudioError> {
    let (_stream, stream_handle) =
        OutputStream::try_default().map_err(|e| AudioError::Playback(e.to_string()))?;
    let sink = Sink::try_new(&stream_handle).map_err(|e| AudioError::Playback(e.to_string()))?;

    let source =
        Decoder::new(Cursor::new(bytes)).map_err(|e| AudioError::Playback(e.to_string()))?;
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}

/// Capture microphone input for `duration` and return it as WAV bytes,
/// ready for a transcription upload.
pub fn record_wav(duration: Duration) -> Result<Vec<u8>, AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioError::NoInputDevice)?;
    let config = device.default_input_config()?;

    let spec = hound::WavSpec {
        channels: config.channels(),
        sample_rate: config.sample_rate().0,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let path = std::env::temp_dir().join(format!("capture_{}.wav", uuid::Uuid::new_v4()));
    let writer = Arc::new(Mutex::new(Some(hound::WavWriter::create(&path, spec)?)));

    let sample_format = config.sample_format();
    let stream_config: cpal::StreamConfig = config.into();
    let err_fn = |err| log::error!("input stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let writer = Arc::clone(&writer);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    write_samples(
                        &writer,
                        data.iter()
                            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                },
                err_fn,
                None,
            )?
        }
        cpal::SampleFormat::I16 => {
            let writer = Arc::clone(&writer);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    write_samples(&writer, data.iter().copied());
                },
                err_fn,
                None,
            )?
        }
        cpal::SampleFormat::U16 => {
            let writer = Arc::clone(&writer);
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    write_samples(&writer, data.iter().map(|s| (*s as i32 - 32768) as i16));
                },
                err_fn,
                None,
            )?
        }
        format => {
            return Err(AudioError::Recording(format!(
                "unsupported sample format {format:?}"
            )));
        }
    };

    stream.play()?;
    std::thread::sleep(duration);
    drop(stream);

    let finished = writer
        .lock()
        .map_err(|_| AudioError::Recording("writer lock poisoned".to_string()))?
        .take();
    if let Some(finished) = finished {
        finished.finalize()?;
    }

    let bytes = fs::read(&path)?;
    let _ = fs::remove_file(&path);
    Ok(bytes)
}

fn write_samples(
    writer: &Arc<Mutex<Option<WavFileWriter>>>,
    samples: impl Iterator<Item = i16>,
) {
    if let Ok(mut guard) = writer.lock() {
        if let Some(writer) = guard.as_mut() {
            for sample in samples {
                let _ = writer.write_sample(sample);
            }
        }
    }
}
