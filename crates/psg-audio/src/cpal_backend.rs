//! CPAL-based output for the emulated chip.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use psg_engine::Psg;
use ringbuf::traits::Consumer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::port::{PortConsumer, PsgPort};
use crate::traits::{AudioError, AudioOutput};

/// Default output device running an emulated PSG in its callback.
///
/// The callback owns the [`Psg`]; the scheduler talks to it through the
/// [`PsgPort`] returned by [`CpalOutput::new`].
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device.
    pub fn new() -> Result<(Self, PsgPort, PortConsumer), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let config: StreamConfig = config.into();

        let (port, consumer) = PsgPort::channel();

        tracing::debug!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "opened output device"
        );

        let output = Self {
            device,
            config,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        };

        Ok((output, port, consumer))
    }

    /// Build the stream. `clock_hz` is the emulated chip's master clock.
    pub fn build_stream(
        &mut self,
        mut consumer: PortConsumer,
        clock_hz: u32,
    ) -> Result<(), AudioError> {
        let running = self.running.clone();
        let channels = self.config.channels as usize;
        let mut psg = Psg::new(clock_hz, self.config.sample_rate.0);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Apply register writes queued since the last buffer.
                    while let Some(byte) = consumer.try_pop() {
                        psg.write_port(byte);
                    }

                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    for chunk in data.chunks_mut(channels) {
                        let frame = psg.next_frame();
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            *sample = match i {
                                0 => frame.left_f32(),
                                1 => frame.right_f32(),
                                _ => 0.0,
                            };
                        }
                    }
                },
                |err| tracing::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);

        Ok(())
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
