//! Software model of a four-voice SN76489-style PSG.
//!
//! Three square-wave tone voices and one LFSR noise voice, each with a
//! 4-bit attenuator (0 = loudest, 15 = off, 2 dB per step). The chip is
//! programmed through a single write-only port using latch/data bytes:
//!
//! ```text
//! latch: 1 CC T DDDD   CC = voice, T = 1 for volume, DDDD = low data
//! data:  0 x DDDDDD    high 6 bits of the latched tone period
//! ```

use psg_ir::Payload;

use crate::frame::Frame;
use crate::sink::{SoundSink, SILENCE_ALL};

/// Master clock of an NTSC machine.
pub const NTSC_CLOCK: u32 = 3_579_545;

/// Tone and noise counters tick once per 16 master clocks.
const CLOCK_DIVIDER: u64 = 16;
const NOISE_VOICE: usize = 3;
/// LFSR seed after any noise control write.
const LFSR_RESET: u16 = 0x8000;
/// White noise feedback taps (bits 0 and 3).
const WHITE_NOISE_TAPS: u16 = 0x0009;
/// Headroom so four voices at full volume stay inside the output range.
const MIX_SCALE: f32 = 0.25;

#[derive(Clone, Copy, Debug, Default)]
struct ToneVoice {
    /// 10-bit half-period in divided clocks
    period: u16,
    counter: u16,
    high: bool,
}

impl ToneVoice {
    /// Advance one divided clock. Returns true on a rising edge.
    fn clock(&mut self) -> bool {
        // Periods 0 and 1 hold the output high, so volume writes alone
        // shape the waveform.
        if self.period <= 1 {
            self.counter = 0;
            self.high = true;
            return false;
        }
        if self.counter > 0 {
            self.counter -= 1;
        }
        if self.counter == 0 {
            self.counter = self.period;
            self.high = !self.high;
            return self.high;
        }
        false
    }
}

#[derive(Clone, Copy, Debug)]
struct NoiseVoice {
    /// Bit 2: white (1) or periodic (0); bits 0-1: shift rate
    control: u8,
    counter: u16,
    high: bool,
    lfsr: u16,
}

impl Default for NoiseVoice {
    fn default() -> Self {
        Self {
            control: 0,
            counter: 0,
            high: false,
            lfsr: LFSR_RESET,
        }
    }
}

impl NoiseVoice {
    fn set_control(&mut self, control: u8) {
        self.control = control & 0x07;
        self.lfsr = LFSR_RESET;
    }

    fn reload(&self, tone2_period: u16) -> u16 {
        match self.control & 0x03 {
            0 => 0x10,
            1 => 0x20,
            2 => 0x40,
            _ => tone2_period.max(1),
        }
    }

    fn clock(&mut self, tone2_period: u16) {
        if self.counter > 0 {
            self.counter -= 1;
        }
        if self.counter == 0 {
            self.counter = self.reload(tone2_period);
            self.high = !self.high;
            if self.high {
                self.shift();
            }
        }
    }

    fn shift(&mut self) {
        let feedback = if self.control & 0x04 != 0 {
            (self.lfsr & WHITE_NOISE_TAPS).count_ones() as u16 & 1
        } else {
            self.lfsr & 1
        };
        self.lfsr = (self.lfsr >> 1) | (feedback << 15);
    }

    fn output(&self) -> bool {
        self.lfsr & 1 != 0
    }
}

/// Which register the last latch byte selected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Latch {
    voice: usize,
    volume: bool,
}

/// Emulated chip. Implements [`SoundSink`], so the scheduler can drive it
/// directly; [`render`](Psg::render) turns the current register state into
/// audio.
#[derive(Clone, Debug)]
pub struct Psg {
    tones: [ToneVoice; 3],
    noise: NoiseVoice,
    attenuation: [u8; 4],
    latch: Latch,
    clock_hz: u32,
    sample_rate: u32,
    /// Master clocks owed to the counters, scaled by the sample rate
    clock_acc: u64,
    levels: [f32; 16],
}

impl Psg {
    /// New chip with every voice silent.
    pub fn new(clock_hz: u32, sample_rate: u32) -> Self {
        let mut levels = [0.0f32; 16];
        for (step, level) in levels.iter_mut().enumerate().take(15) {
            *level = libm::powf(10.0, -0.1 * step as f32);
        }

        Self {
            tones: [ToneVoice::default(); 3],
            noise: NoiseVoice::default(),
            attenuation: [0x0F; 4],
            latch: Latch::default(),
            clock_hz,
            sample_rate: sample_rate.max(1),
            clock_acc: 0,
            levels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// Write one byte to the control port.
    pub fn write_port(&mut self, byte: u8) {
        if byte & 0x80 != 0 {
            let voice = ((byte >> 5) & 0x03) as usize;
            let volume = byte & 0x10 != 0;
            let data = byte & 0x0F;
            self.latch = Latch { voice, volume };

            if volume {
                self.attenuation[voice] = data;
            } else if voice == NOISE_VOICE {
                self.noise.set_control(data);
            } else {
                let tone = &mut self.tones[voice];
                tone.period = (tone.period & 0x3F0) | data as u16;
            }
        } else {
            let Latch { voice, volume } = self.latch;
            if volume {
                self.attenuation[voice] = byte & 0x0F;
            } else if voice == NOISE_VOICE {
                self.noise.set_control(byte);
            } else {
                let tone = &mut self.tones[voice];
                tone.period = (tone.period & 0x00F) | (((byte & 0x3F) as u16) << 4);
            }
        }
    }

    /// Attenuation of a voice (0 = loudest, 15 = off).
    pub fn attenuation(&self, voice: usize) -> Option<u8> {
        self.attenuation.get(voice).copied()
    }

    /// 10-bit period of a tone voice.
    pub fn tone_period(&self, voice: usize) -> Option<u16> {
        self.tones.get(voice).map(|t| t.period)
    }

    pub fn noise_control(&self) -> u8 {
        self.noise.control
    }

    /// True when every voice is at attenuation 15.
    pub fn is_silent(&self) -> bool {
        self.attenuation.iter().all(|&a| a == 0x0F)
    }

    /// Frequency a tone voice produces, in Hz.
    pub fn tone_frequency(&self, voice: usize) -> Option<f32> {
        let period = self.tone_period(voice)?.max(1);
        Some(self.clock_hz as f32 / (2.0 * CLOCK_DIVIDER as f32 * period as f32))
    }

    /// Produce the next output sample.
    pub fn next_frame(&mut self) -> Frame {
        self.clock_acc += self.clock_hz as u64;
        let per_step = CLOCK_DIVIDER * self.sample_rate as u64;
        while self.clock_acc >= per_step {
            self.clock_acc -= per_step;
            for tone in &mut self.tones {
                tone.clock();
            }
            self.noise.clock(self.tones[2].period);
        }
        Frame::from_level(self.mix())
    }

    /// Fill `out` with consecutive frames.
    pub fn render(&mut self, out: &mut [Frame]) {
        for frame in out.iter_mut() {
            *frame = self.next_frame();
        }
    }

    fn mix(&self) -> f32 {
        let mut level = 0.0;
        for (voice, tone) in self.tones.iter().enumerate() {
            let amp = self.levels[self.attenuation[voice] as usize];
            level += if tone.high { amp } else { -amp };
        }
        let amp = self.levels[self.attenuation[NOISE_VOICE] as usize];
        level += if self.noise.output() { amp } else { -amp };
        level * MIX_SCALE
    }
}

impl SoundSink for Psg {
    fn write(&mut self, payload: &Payload) {
        for &byte in payload.bytes() {
            self.write_port(byte);
        }
    }

    fn silence_all(&mut self) {
        for code in SILENCE_ALL {
            self.write_port(code);
        }
    }
}

/// Three port bytes that set a tone voice's period and attenuation.
pub fn tone_payload(voice: u8, period: u16, attenuation: u8) -> Payload {
    let voice = (voice & 0x03) << 5;
    let period = period & 0x03FF;
    Payload::new([
        0x80 | voice | (period & 0x0F) as u8,
        ((period >> 4) & 0x3F) as u8,
        0x90 | voice | (attenuation & 0x0F),
    ])
}

/// Three port bytes that set the noise mode and attenuation.
///
/// The mode byte is repeated to fill the frame; a second control write
/// only resets the shift register again.
pub fn noise_payload(control: u8, attenuation: u8) -> Payload {
    let mode = 0xE0 | (control & 0x07);
    Payload::new([mode, 0xF0 | (attenuation & 0x0F), mode])
}
