//! Realtime audio output for the psgseq sequencer.

mod cpal_backend;
mod port;
mod traits;

pub use cpal_backend::CpalOutput;
pub use port::{PortConsumer, PsgPort, PORT_QUEUE_LEN};
pub use traits::{AudioError, AudioOutput};
