//! Single-producer/single-consumer event channel between the sequencing
//! thread and the mixing thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mp_ir::{EventReceiver, PlaybackEvent};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Events buffered between the two threads.
pub const EVENT_CAPACITY: usize = 1024;

/// Create a connected sender/queue pair.
///
/// The sender gives up on a full channel once `stop` is raised.
pub fn event_channel(capacity: usize, stop: Arc<AtomicBool>) -> (EventSender, EventQueue) {
    let (producer, consumer) = HeapRb::<PlaybackEvent>::new(capacity.max(1)).split();
    (EventSender { producer, stop }, EventQueue { consumer })
}

/// Producer half. Feeds voice and tempo events; row markers stay with the
/// sequencing thread.
pub struct EventSender {
    producer: HeapProd<PlaybackEvent>,
    stop: Arc<AtomicBool>,
}

impl EventReceiver for EventSender {
    fn receive(&mut self, event: &PlaybackEvent) {
        if matches!(event, PlaybackEvent::Row(_)) {
            return;
        }
        let mut event = *event;
        loop {
            match self.producer.try_push(event) {
                Ok(()) => return,
                Err(rejected) => {
                    if self.stop.load(Ordering::Relaxed) {
                        tracing::warn!(?rejected, "event channel full after stop, dropping");
                        return;
                    }
                    event = rejected;
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}

/// Consumer half, drained by the mixing thread.
pub struct EventQueue {
    consumer: HeapCons<PlaybackEvent>,
}

impl EventQueue {
    /// Hand every queued event to `receiver` in arrival order. Returns how
    /// many were delivered.
    pub fn drain_into<R: EventReceiver + ?Sized>(&mut self, receiver: &mut R) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.consumer.try_pop() {
            receiver.receive(&event);
            delivered += 1;
        }
        delivered
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}
