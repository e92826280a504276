//! Lock-free path from the scheduler thread to the audio callback.

use psg_engine::{SoundSink, SILENCE_ALL};
use psg_ir::Payload;
use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Port bytes in flight; far more than a tick ever writes.
pub const PORT_QUEUE_LEN: usize = 1024;

/// Consumer half, drained by the audio callback.
pub type PortConsumer = HeapCons<u8>;

/// Scheduler-side handle to the emulated chip's control port.
///
/// Each write is queued byte by byte and applied by the audio callback
/// before it renders its next buffer.
pub struct PsgPort {
    producer: HeapProd<u8>,
}

impl PsgPort {
    /// Create a connected port / consumer pair.
    pub fn channel() -> (Self, PortConsumer) {
        let rb = HeapRb::<u8>::new(PORT_QUEUE_LEN);
        let (producer, consumer) = rb.split();
        (Self { producer }, consumer)
    }

    /// Queue one byte, spinning until the callback has made room.
    pub fn write_spin(&mut self, byte: u8) {
        while self.producer.try_push(byte).is_err() {
            std::hint::spin_loop();
        }
    }

    /// Bytes not yet picked up by the callback.
    pub fn pending(&self) -> usize {
        self.producer.occupied_len()
    }
}

impl SoundSink for PsgPort {
    fn write(&mut self, payload: &Payload) {
        for &byte in payload.bytes() {
            self.write_spin(byte);
        }
    }

    fn silence_all(&mut self) {
        for code in SILENCE_ALL {
            self.write_spin(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Consumer;

    #[test]
    fn payload_bytes_arrive_in_order() {
        let (mut port, mut consumer) = PsgPort::channel();
        port.write(&Payload::new([0x8E, 0x0F, 0x90]));
        port.silence_all();
        assert_eq!(port.pending(), 7);

        let bytes: Vec<u8> = consumer.pop_iter().collect();
        assert_eq!(bytes, [0x8E, 0x0F, 0x90, 0x9F, 0xBF, 0xDF, 0xFF]);
    }
}
