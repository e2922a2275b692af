//! Hand-off of "channel finished" notifications from the mixer thread to the
//! engine's update tick.
//!
//! The mixer side appends to a mutex-guarded front buffer. Once per tick the
//! engine swaps that buffer with its own back buffer under the same lock and
//! then drains the back buffer with the lock released, so a notifying
//! callback only ever waits for a push or a swap.

use crate::channel_pool::ChannelId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Front = Arc<Mutex<Vec<ChannelId>>>;

fn lock(front: &Mutex<Vec<ChannelId>>) -> MutexGuard<'_, Vec<ChannelId>> {
    // A panic while holding the lock cannot leave the Vec half-updated.
    front.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer handle given to the mixer backend.
#[derive(Clone, Debug)]
pub struct CompletionSender {
    front: Front,
}

impl CompletionSender {
    /// Reports that `channel` stopped producing audio.
    pub fn notify(&self, channel: ChannelId) {
        lock(&self.front).push(channel);
    }
}

#[derive(Debug)]
pub struct CompletionQueue {
    front: Front,
    back: Vec<ChannelId>,
}

impl CompletionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            front: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
            back: Vec::with_capacity(capacity),
        }
    }

    pub fn sender(&self) -> CompletionSender {
        CompletionSender {
            front: Arc::clone(&self.front),
        }
    }

    /// Swaps the buffers and drains everything reported since the last call.
    ///
    /// Notifications pushed while the drain is being consumed land in the new
    /// front buffer and are returned by the next call.
    pub fn swap_and_drain(&mut self) -> std::vec::Drain<'_, ChannelId> {
        debug_assert!(self.back.is_empty());
        {
            let mut front = lock(&self.front);
            std::mem::swap(&mut *front, &mut self.back);
        }
        self.back.drain(..)
    }

    /// Number of notifications waiting in the front buffer.
    pub fn pending(&self) -> usize {
        lock(&self.front).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_returns_notifications_in_order() {
        let mut queue = CompletionQueue::new(8);
        let sender = queue.sender();
        sender.notify(ChannelId::new(3, 0));
        sender.notify(ChannelId::new(1, 2));

        let drained: Vec<_> = queue.swap_and_drain().collect();
        assert_eq!(drained, vec![ChannelId::new(3, 0), ChannelId::new(1, 2)]);
    }

    #[test]
    fn test_second_drain_is_empty() {
        let mut queue = CompletionQueue::new(8);
        queue.sender().notify(ChannelId::new(0, 0));

        assert_eq!(queue.swap_and_drain().count(), 1);
        assert_eq!(queue.swap_and_drain().count(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_notifications_during_drain_wait_for_next_tick() {
        let mut queue = CompletionQueue::new(8);
        let sender = queue.sender();
        sender.notify(ChannelId::new(0, 0));

        let mut drained = Vec::new();
        for channel in queue.swap_and_drain() {
            sender.notify(ChannelId::new(9, 0));
            drained.push(channel);
        }
        assert_eq!(drained, vec![ChannelId::new(0, 0)]);
        assert_eq!(
            queue.swap_and_drain().collect::<Vec<_>>(),
            vec![ChannelId::new(9, 0)]
        );
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let mut queue = CompletionQueue::new(16);
        let writers: Vec<_> = (0..4u16)
            .map(|w| {
                let sender = queue.sender();
                thread::spawn(move || {
                    for i in 0..250u16 {
                        sender.notify(ChannelId::new(w * 1000 + i, 0));
                    }
                })
            })
            .collect();

        let mut total = 0;
        while total < 1000 {
            total += queue.swap_and_drain().count();
            if writers.iter().all(|w| w.is_finished()) {
                total += queue.swap_and_drain().count();
                break;
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }
        total += queue.swap_and_drain().count();
        assert_eq!(total, 1000);
    }
}
