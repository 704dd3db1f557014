//! cpal output stream feeding the native engine's renderer.

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use retro_synth::{
    config::AudioConfig,
    engine::{EngineConfig, NativeEngine},
    error::EngineError,
};

/// Builds the output stream paused. The engine's resume hook starts it, so
/// nothing plays until the first note.
pub fn open_output(audio: &AudioConfig) -> EyreResult<NativeEngine> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let supported = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = supported.sample_rate().0 as f32;
    let channels = supported.channels() as usize;

    let (engine, mut renderer) = NativeEngine::new(
        EngineConfig::default()
            .with_sample_rate(sample_rate)
            .with_voices(audio.voices)
            .with_smoothing_ms(audio.smoothing_ms),
    );

    let stream = device
        .build_output_stream(
            &supported.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                renderer.render_interleaved(data, channels);
            },
            |err| tracing::error!(error = %err, "output stream error"),
            None,
        )
        .wrap_err("failed to build output stream")?;

    // some hosts start a stream as soon as it is built
    if let Err(err) = stream.pause() {
        tracing::debug!(error = %err, "stream cannot pause before first play");
    }

    tracing::info!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "output stream ready"
    );

    Ok(engine.with_resume_hook(Box::new(move || {
        stream
            .play()
            .map_err(|e| EngineError::ResumeFailed(e.to_string()))
    })))
}
