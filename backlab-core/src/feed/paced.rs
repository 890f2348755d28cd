//! Optional paced delivery on a producer thread.
//!
//! Decouples feed I/O and pacing sleeps from event dispatch: the scheduler
//! runs on its own thread and pushes events into a bounded FIFO channel the
//! driver drains. This is the only concurrency in the system.

use crate::domain::MarketEvent;
use crate::feed::replay::ReplayScheduler;
use crate::feed::source::FeedError;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::debug;

/// Handle to a running paced feed.
pub struct PacedFeed {
    receiver: Receiver<MarketEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), FeedError>>>,
}

impl PacedFeed {
    /// Blocking receive; `None` once the producer is done and the queue is
    /// drained.
    pub fn recv(&self) -> Option<MarketEvent> {
        self.receiver.recv().ok()
    }

    /// Ask the producer to stop after the event it is currently delivering.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait for the producer thread and surface any feed error it hit.
    pub fn join(mut self) -> Result<(), FeedError> {
        self.stop();
        // Drain so a blocked send can't deadlock the join.
        while self.receiver.try_recv().is_ok() {}
        match self.handle.take() {
            Some(handle) => handle.join().expect("paced feed thread panicked"),
            None => Ok(()),
        }
    }
}

impl Drop for PacedFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a producer thread that pulls from `scheduler` and pushes into a
/// bounded channel of `capacity` events.
pub fn spawn_paced_feed(mut scheduler: ReplayScheduler, capacity: usize) -> PacedFeed {
    let (sender, receiver) = bounded(capacity);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let handle = std::thread::spawn(move || {
        while !stop_flag.load(Ordering::Acquire) {
            match scheduler.next_event()? {
                Some(event) => {
                    if sender.send(event).is_err() {
                        // Consumer dropped the receiver; nothing left to do.
                        break;
                    }
                }
                None => break,
            }
        }
        debug!("paced feed producer finished");
        Ok(())
    });

    PacedFeed { receiver, stop, handle: Some(handle) }
}
