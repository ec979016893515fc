use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream,
};
use log::warn;

const TONE_HZ: f32 = 440.0;
const AMPLITUDE: f32 = 0.25;

/// Square-wave beeper behind the interpreter's one-shot start/stop sound
/// signals. The stream only exists while the tone is audible.
pub struct Beeper {
    device: cpal::Device,
    config: cpal::StreamConfig,
    stream: Option<Stream>,
}

impl Beeper {
    /// Picks the default output device. Returns None (and the emulator runs
    /// silent) when there is no usable device.
    pub fn detect() -> Option<Beeper> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;
        if config.sample_format() != SampleFormat::F32 {
            warn!("default output device does not take f32 samples, sound disabled");
            return None;
        }
        Some(Beeper {
            config: config.into(),
            device,
            stream: None,
        })
    }

    pub fn start(&mut self) {
        if self.stream.is_some() {
            return;
        }
        let sample_rate = self.config.sample_rate.0 as f32;
        let channels = self.config.channels as usize;

        let mut clock = 0f32;
        let mut next_sample = move || {
            clock = (clock + 1.0) % sample_rate;
            if (clock * TONE_HZ / sample_rate).fract() < 0.5 {
                AMPLITUDE
            } else {
                -AMPLITUDE
            }
        };

        let stream = self.device.build_output_stream(
            &self.config,
            move |data: &mut [f32], _| {
                for frame in data.chunks_mut(channels) {
                    let value = next_sample();
                    for sample in frame.iter_mut() {
                        *sample = value;
                    }
                }
            },
            |err| warn!("audio stream error: {err}"),
            None,
        );
        match stream {
            Ok(stream) => {
                if let Err(err) = stream.play() {
                    warn!("could not start the audio stream: {err}");
                    return;
                }
                self.stream = Some(stream);
            }
            Err(err) => warn!("could not open the audio stream: {err}"),
        }
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
    }
}
