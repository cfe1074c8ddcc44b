//! Command Queue
//!
//! The bounded handoff between the tick loop (producer) and the
//! dispatcher (consumer). Overflow drops the oldest unconsumed command
//! in favor of the newest: a stale movement correction is worse than a
//! lost one. Sequence numbers are strictly increasing across all
//! surviving commands; FIFO order from the single producing thread is
//! preserved.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::trace;

use crate::config::ConfigError;
use crate::input::MouseButton;

/// Queue configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum commands held before drop-oldest engages
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    64
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl QueueConfig {
    /// Validate the section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::invalid("queue.capacity", "must be at least 1"));
        }
        Ok(())
    }
}

/// A relative pointer movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementCommand {
    /// Horizontal delta in counts
    pub dx: i32,
    /// Vertical delta in counts
    pub dy: i32,
    /// Monotonic sequence number
    pub seq: u64,
    /// Emission timestamp
    pub issued_at: Instant,
}

/// A button transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonCommand {
    /// Which button
    pub button: MouseButton,
    /// Press or release
    pub pressed: bool,
    /// Monotonic sequence number
    pub seq: u64,
    /// Emission timestamp
    pub issued_at: Instant,
}

/// A queued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Pointer movement
    Move(MovementCommand),
    /// Button transition
    Button(ButtonCommand),
}

impl Command {
    /// The command's sequence number.
    pub fn seq(&self) -> u64 {
        match self {
            Command::Move(c) => c.seq,
            Command::Button(c) => c.seq,
        }
    }
}

/// Queue counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    /// Commands accepted
    pub enqueued: u64,
    /// Commands dropped to make room for newer ones
    pub dropped_oldest: u64,
}

/// Bounded drop-oldest command queue.
///
/// Push never blocks: when the channel is full the oldest entry is
/// popped and discarded, then the push retried. The consumer side
/// drains with [`CommandQueue::recv_timeout`].
pub struct CommandQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    capacity: usize,
    next_seq: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl CommandQueue {
    /// Create a queue holding at most `capacity` commands.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            next_seq: AtomicU64::new(0),
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a movement. Returns its sequence number.
    pub fn push_move(&self, dx: i32, dy: i32, issued_at: Instant) -> u64 {
        self.push(|seq| Command::Move(MovementCommand { dx, dy, seq, issued_at }))
    }

    /// Enqueue a button transition. Returns its sequence number.
    pub fn push_button(&self, button: MouseButton, pressed: bool, issued_at: Instant) -> u64 {
        self.push(|seq| Command::Button(ButtonCommand { button, pressed, seq, issued_at }))
    }

    fn push(&self, make: impl FnOnce(u64) -> Command) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut cmd = make(seq);
        loop {
            match self.tx.try_send(cmd) {
                Ok(()) => break,
                Err(TrySendError::Full(back)) => {
                    cmd = back;
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        trace!(seq, "queue full, dropped oldest command");
                    }
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        seq
    }

    /// Blocking receive with a timeout, used by the dispatcher.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Result<Command, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Non-blocking receive, used by the shutdown drain.
    pub fn try_recv(&self) -> Result<Command, TryRecvError> {
        self.rx.try_recv()
    }

    /// Commands currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Counter snapshot.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped_oldest: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fifo_order_preserved() {
        let queue = CommandQueue::new(8);
        let now = Instant::now();
        for i in 0..5 {
            queue.push_move(i, 0, now);
        }
        for i in 0..5 {
            match queue.try_recv().unwrap() {
                Command::Move(m) => assert_eq!(m.dx, i),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_overflow_keeps_newest() {
        // Capacity 4, ten commands pushed with no consumer: exactly the
        // four most recent survive.
        let queue = CommandQueue::new(4);
        let now = Instant::now();
        for i in 0..10 {
            queue.push_move(i, 0, now);
        }

        assert_eq!(queue.len(), 4);
        let survivors: Vec<i32> = std::iter::from_fn(|| queue.try_recv().ok())
            .map(|cmd| match cmd {
                Command::Move(m) => m.dx,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(survivors, vec![6, 7, 8, 9]);

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 10);
        assert_eq!(stats.dropped_oldest, 6);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let queue = CommandQueue::new(4);
        let now = Instant::now();
        for i in 0..100 {
            queue.push_move(i, 0, now);
            assert!(queue.len() <= 4);
        }
    }

    #[test]
    fn test_sequence_numbers_strictly_increase() {
        let queue = CommandQueue::new(4);
        let now = Instant::now();
        for i in 0..20 {
            queue.push_move(i, 0, now);
        }
        let seqs: Vec<u64> = std::iter::from_fn(|| queue.try_recv().ok())
            .map(|cmd| cmd.seq())
            .collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]), "seqs {seqs:?}");
    }

    #[test]
    fn test_mixed_command_kinds_interleave_in_order() {
        let queue = CommandQueue::new(8);
        let now = Instant::now();
        queue.push_move(1, 1, now);
        queue.push_button(MouseButton::Left, true, now);
        queue.push_move(2, 2, now);
        queue.push_button(MouseButton::Left, false, now);

        let kinds: Vec<u64> = std::iter::from_fn(|| queue.try_recv().ok())
            .map(|cmd| cmd.seq())
            .collect();
        assert_eq!(kinds, vec![0, 1, 2, 3]);
    }

    proptest! {
        // Under any overflow pattern the survivors are a strictly
        // increasing suffix of what was pushed.
        #[test]
        fn prop_survivors_are_increasing_suffix(
            capacity in 1usize..16,
            count in 0usize..64,
        ) {
            let queue = CommandQueue::new(capacity);
            let now = Instant::now();
            for i in 0..count {
                queue.push_move(i as i32, 0, now);
            }

            let survivors: Vec<u64> = std::iter::from_fn(|| queue.try_recv().ok())
                .map(|cmd| cmd.seq())
                .collect();

            prop_assert!(survivors.len() <= capacity);
            prop_assert!(survivors.len() == count.min(capacity));
            prop_assert!(survivors.windows(2).all(|w| w[0] < w[1]));
            if let Some(last) = survivors.last() {
                prop_assert_eq!(*last, count as u64 - 1);
            }
        }
    }
}
