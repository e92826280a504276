//! Headless controller for the psgseq sequencer.
//!
//! Loads stream sets, plays them in realtime through the default audio
//! device, and renders them offline for WAV export or event traces. Both
//! the CLI and the integration tests drive playback through this crate.

mod config;
mod wav;

use psg_audio::{AudioError, AudioOutput, CpalOutput, PsgPort};
use psg_engine::{FixedRatePacer, NoPacing, Psg, RecordingSink, Scheduler};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

// Re-export common types so callers don't need psg-ir/psg-engine directly.
pub use config::{ConfigError, PlayerConfig};
pub use psg_engine::{Frame, SessionOutcome, SessionSummary};
pub use psg_formats::{FormatError, Validation};
pub use psg_ir::{Payload, StreamSet};

pub use wav::{frames_to_wav, write_wav};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no stream set loaded")]
    NothingLoaded,
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("playback thread panicked")]
    PlaybackPanicked,
}

/// Offline runs stop here even if the set never reaches END_OF_AUDIO:
/// every ticker value has been visited once.
const MAX_OFFLINE_TICKS: u32 = 1 << 16;

/// How long the playback thread waits for the callback to take the final
/// silence, on top of a few tick periods.
const DRAIN_GRACE: Duration = Duration::from_millis(20);

/// Opened output device plus the port that feeds it.
pub type OpenedOutput = (Box<dyn AudioOutput>, PsgPort);

/// One fired event in an offline trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub tick: u16,
    pub channel: usize,
    pub payload: Payload,
}

/// Headless sequencer controller; owns a stream set and manages playback.
pub struct Controller {
    config: PlayerConfig,
    streams: Option<StreamSet>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    current_tick: Arc<AtomicU32>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), ControllerError>>>,
}

impl Controller {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            streams: None,
            playback: None,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PlayerConfig {
        &mut self.config
    }

    pub fn streams(&self) -> Option<&StreamSet> {
        self.streams.as_ref()
    }

    /// Load a stream set from bytes.
    ///
    /// With `raw_channels` set, `data` is a headerless table of that many
    /// channels; otherwise it must be a `.psgs` container.
    pub fn load(
        &mut self,
        data: &[u8],
        raw_channels: Option<usize>,
    ) -> Result<(), ControllerError> {
        self.halt();
        let validation = self.config.validation();
        let set = match raw_channels {
            Some(count) => psg_formats::decode_table(data, count, validation)?,
            None => psg_formats::load_psgs(data, validation)?,
        };
        tracing::info!(
            channels = set.len(),
            events = set.playable_events(),
            end_tick = ?set.end_tick(),
            "loaded stream set"
        );
        self.streams = Some(set);
        Ok(())
    }

    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        raw_channels: Option<usize>,
    ) -> Result<(), ControllerError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| ControllerError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.load(&data, raw_channels)
    }

    /// Use an in-memory stream set.
    pub fn set_streams(&mut self, set: StreamSet) {
        self.halt();
        self.streams = Some(set);
    }

    // --- Real-time playback ---

    /// Start realtime playback on the default output device.
    ///
    /// Returns once the device is running, or with the error that kept it
    /// from opening.
    pub fn play(&mut self) -> Result<(), ControllerError> {
        let clock_hz = self.config.psg_clock_hz;
        self.play_with(move || open_default_output(clock_hz))
    }

    /// Start realtime playback on whatever output `open` returns. `open`
    /// runs on the playback thread.
    pub fn play_with<F>(&mut self, open: F) -> Result<(), ControllerError>
    where
        F: FnOnce() -> Result<OpenedOutput, AudioError> + Send + 'static,
    {
        self.halt();
        let streams = self.streams.clone().ok_or(ControllerError::NothingLoaded)?;

        let stop_signal = Arc::new(AtomicBool::new(false));
        let current_tick = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let stop = stop_signal.clone();
        let tick = current_tick.clone();
        let done = finished.clone();
        let config = self.config.clone();

        let thread = std::thread::spawn(move || {
            let result = match open() {
                Ok((output, port)) => {
                    let _ = ready_tx.send(Ok(()));
                    audio_thread(streams, &config, output, port, &stop, &tick)
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    Ok(())
                }
            };
            done.store(true, Ordering::Relaxed);
            result
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err.into());
            }
            Err(_) => {
                return match thread.join() {
                    Ok(result) => result,
                    Err(_) => Err(ControllerError::PlaybackPanicked),
                };
            }
        }

        self.playback = Some(PlaybackHandle {
            stop_signal,
            current_tick,
            finished,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Stop playback and wait for the thread. Reports anything that went
    /// wrong after the device started.
    pub fn stop(&mut self) -> Result<(), ControllerError> {
        let Some(mut pb) = self.playback.take() else {
            return Ok(());
        };
        pb.stop_signal.store(true, Ordering::Relaxed);
        match pb.thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(ControllerError::PlaybackPanicked),
            None => Ok(()),
        }
    }

    /// Stop without a caller to report to.
    fn halt(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!("previous playback ended with an error: {err}");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    /// Ticker value of the running session.
    pub fn current_tick(&self) -> Option<u16> {
        let pb = self.playback.as_ref()?;
        if pb.finished.load(Ordering::Relaxed) {
            return None;
        }
        Some(pb.current_tick.load(Ordering::Relaxed) as u16)
    }

    // --- Offline rendering ---

    /// Run a session through the emulated chip without pacing, rendering
    /// one tick's worth of frames after every tick.
    pub fn render_frames(&self, max_frames: usize) -> Result<Vec<Frame>, ControllerError> {
        let streams = self.streams.clone().ok_or(ControllerError::NothingLoaded)?;
        let psg = Psg::new(self.config.psg_clock_hz, self.config.sample_rate);
        let mut sched = Scheduler::new(streams, psg, NoPacing);

        let frames_per_tick = self.config.frames_per_tick();
        let mut owed = 0.0f64;
        let mut frames = Vec::new();

        sched.start();
        for _ in 0..MAX_OFFLINE_TICKS {
            if frames.len() >= max_frames {
                break;
            }
            let Some(report) = sched.step() else { break };
            if report.finished {
                break;
            }
            owed += frames_per_tick;
            let whole = (owed as usize).min(max_frames - frames.len());
            owed -= whole as f64;

            let start = frames.len();
            frames.resize(start + whole, Frame::silence());
            let psg = sched.sink_mut();
            #[cfg(feature = "alloc_check")]
            assert_no_alloc::assert_no_alloc(|| psg.render(&mut frames[start..]));
            #[cfg(not(feature = "alloc_check"))]
            psg.render(&mut frames[start..]);
        }
        sched.stop();

        tracing::debug!(
            frames = frames.len(),
            ticks = sched.summary().ticks_elapsed,
            "rendered"
        );
        Ok(frames)
    }

    pub fn render_to_wav(&self, max_seconds: u32) -> Result<Vec<u8>, ControllerError> {
        let max_frames = (self.config.sample_rate as usize) * max_seconds as usize;
        let frames = self.render_frames(max_frames)?;
        Ok(wav::frames_to_wav(&frames, self.config.sample_rate))
    }

    /// Every event the session would fire, in firing order, plus totals.
    pub fn trace(&self) -> Result<(Vec<TraceEntry>, SessionSummary), ControllerError> {
        let streams = self.streams.clone().ok_or(ControllerError::NothingLoaded)?;
        let mut sched = Scheduler::new(streams, RecordingSink::new(), NoPacing);
        let mut entries = Vec::new();
        let mut positions = Vec::with_capacity(sched.streams().len());

        sched.start();
        for _ in 0..MAX_OFFLINE_TICKS {
            positions.clear();
            positions.extend(
                (0..sched.streams().len()).filter_map(|ch| sched.cursor(ch).map(|c| c.position())),
            );
            let Some(report) = sched.step() else { break };

            for &ch in &report.fired {
                let ch = ch as usize;
                if let Some(event) = sched.streams().channels()[ch].records().get(positions[ch]) {
                    entries.push(TraceEntry {
                        tick: report.tick,
                        channel: ch,
                        payload: event.payload,
                    });
                }
            }
        }
        if !sched.is_finished() {
            tracing::warn!("no END_OF_AUDIO within {MAX_OFFLINE_TICKS} ticks, trace cut short");
            sched.stop();
        }

        Ok((entries, sched.summary()))
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.halt();
    }
}

fn open_default_output(clock_hz: u32) -> Result<OpenedOutput, AudioError> {
    let (mut output, port, consumer) = CpalOutput::new()?;
    output.build_stream(consumer, clock_hz)?;
    output.start()?;
    Ok((Box::new(output), port))
}

/// Wait until the callback has taken every queued byte, giving up at
/// `deadline`. Returns false on timeout.
fn drain_port(port: &PsgPort, deadline: Instant) -> bool {
    while port.pending() > 0 {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    true
}

fn audio_thread(
    streams: StreamSet,
    config: &PlayerConfig,
    mut output: Box<dyn AudioOutput>,
    port: PsgPort,
    stop_signal: &AtomicBool,
    current_tick: &AtomicU32,
) -> Result<(), ControllerError> {
    let pacer = FixedRatePacer::new(config.tick_period());
    tracing::debug!(tick_period = ?pacer.period(), "playback started");
    let mut sched: Scheduler<PsgPort, FixedRatePacer> = Scheduler::new(streams, port, pacer);

    sched.start();
    while !stop_signal.load(Ordering::Relaxed) {
        let Some(report) = sched.step() else { break };
        current_tick.store(report.tick as u32, Ordering::Relaxed);
        if report.finished {
            break;
        }
    }
    sched.stop();

    let summary = sched.summary();
    tracing::info!(
        outcome = ?summary.outcome,
        final_tick = summary.final_tick,
        events = summary.events_fired,
        "playback ended"
    );

    // Let the callback apply the final silence before the stream pauses.
    let port = sched.into_sink();
    let deadline = Instant::now() + config.tick_period() * 4 + DRAIN_GRACE;
    if !drain_port(&port, deadline) {
        tracing::warn!(pending = port.pending(), "output stopped consuming; final silence lost");
    }
    output.stop()?;
    Ok(())
}
