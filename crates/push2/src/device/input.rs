//! Raw input path from the MIDI thread to the driver loop.
//!
//! The transport callback copies each message into a fixed byte ring and
//! wakes the loop. Nothing on the callback side allocates.

use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tokio::sync::Notify;

pub const INPUT_CAPACITY: usize = 8192;

/// Writer end, owned by the transport's input callback.
pub struct InputSink {
    bytes: Mutex<HeapProd<u8>>,
    wake: Arc<Notify>,
}

/// Reader end, owned by the driver loop.
pub struct InputSource {
    bytes: Mutex<HeapCons<u8>>,
    wake: Arc<Notify>,
}

pub fn input_channel(capacity: usize) -> (InputSink, InputSource) {
    let (producer, consumer) = HeapRb::<u8>::new(capacity).split();
    let wake = Arc::new(Notify::new());
    (
        InputSink {
            bytes: Mutex::new(producer),
            wake: wake.clone(),
        },
        InputSource {
            bytes: Mutex::new(consumer),
            wake,
        },
    )
}

impl InputSink {
    /// Queue one whole message and wake the reader. A message that does
    /// not fit is dropped whole so the byte stream never splits.
    pub fn push(&mut self, message: &[u8]) -> bool {
        let bytes = self.bytes.get_mut();
        if message.is_empty() || bytes.vacant_len() < message.len() {
            return false;
        }
        bytes.push_slice(message);
        self.wake.notify_one();
        true
    }
}

impl InputSource {
    /// Signalled whenever bytes may be waiting. A wake sent while nobody
    /// was waiting is kept for the next `notified()`.
    pub fn ready_signal(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Move queued bytes into `buf`, returning how many were moved.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.bytes.get_mut().pop_slice(buf)
    }
}
