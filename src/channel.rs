//! Bounded ring-buffer channel connecting two pipeline stages.
//!
//! A [`BoundedChannel`] is a fixed-capacity circular queue guarded by a single
//! mutex and two condition variables:
//!
//! ```text
//!            space_available                item_available
//! producer ───────────────────> [ slots ] ───────────────────> consumer
//!   push() waits while full        │ read/write cursors   pop() waits while empty
//!                                  │ (monotonic, mod N)
//!                                  └ closed: no more pushes will happen
//! ```
//!
//! Termination is carried in-band: once the producer calls [`close`] and the
//! consumer has drained every queued item, [`pop`] returns `Ok(None)`. That is
//! the only end-of-stream signal, and it is sticky.
//!
//! [`close`]: BoundedChannel::close
//! [`pop`]: BoundedChannel::pop

use crate::error::{Error, Result};
use crate::observability;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A fixed-capacity, order-preserving channel with blocking push/pop and
/// one-shot closure.
///
/// # Example
///
/// ```rust
/// use linefold::channel::BoundedChannel;
///
/// let channel = BoundedChannel::new(2).with_name("a");
/// channel.push("one".to_string()).unwrap();
/// channel.close();
///
/// assert_eq!(channel.pop().unwrap().as_deref(), Some("one"));
/// assert_eq!(channel.pop().unwrap(), None);
/// ```
pub struct BoundedChannel<T> {
    name: String,
    item_limit: Option<ItemLimit<T>>,
    state: Mutex<ChannelState<T>>,
    item_available: Condvar,
    space_available: Condvar,
}

/// Caller-agreed maximum item size.
struct ItemLimit<T> {
    max: usize,
    measure: fn(&T) -> usize,
}

struct ChannelState<T> {
    slots: Box<[Option<T>]>,
    read: u64,
    write: u64,
    closed: bool,
    cancelled: bool,
    high_water: usize,
    producer_waits: u64,
    consumer_waits: u64,
}

impl<T> ChannelState<T> {
    fn len(&self) -> usize {
        (self.write - self.read) as usize
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    fn slot(&self, cursor: u64) -> usize {
        (cursor % self.slots.len() as u64) as usize
    }
}

impl<T> BoundedChannel<T> {
    /// Create a new open, empty channel holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`try_new`](Self::try_new) for
    /// capacities that come from user input.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be at least 1");
        Self {
            name: format!("channel-{}", capacity),
            item_limit: None,
            state: Mutex::new(ChannelState {
                slots: (0..capacity).map(|_| None).collect(),
                read: 0,
                write: 0,
                closed: false,
                cancelled: false,
                high_water: 0,
                producer_waits: 0,
                consumer_waits: 0,
            }),
            item_available: Condvar::new(),
            space_available: Condvar::new(),
        }
    }

    /// Create a channel, rejecting a zero capacity.
    pub fn try_new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel capacity must be at least 1".into(),
            ));
        }
        Ok(Self::new(capacity))
    }

    /// Set a custom name (used in errors, logs and metrics).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Install a maximum item size.
    ///
    /// `measure` computes the size of an item; a push whose item measures
    /// more than `max` fails with [`Error::CapacityViolation`] and enqueues
    /// nothing.
    pub fn with_item_limit(mut self, max: usize, measure: fn(&T) -> usize) -> Self {
        self.item_limit = Some(ItemLimit { max, measure });
        self
    }

    /// Get the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the fixed capacity.
    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Get the number of queued items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the channel holds `capacity` items.
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// Check if the producer has closed the channel.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Check if the channel is closed and fully drained.
    pub fn is_terminal(&self) -> bool {
        let state = self.lock();
        state.closed && state.len() == 0
    }

    /// Get statistics about channel operation.
    pub fn stats(&self) -> ChannelStats {
        let state = self.lock();
        ChannelStats {
            capacity: state.capacity(),
            current_items: state.len(),
            total_pushed: state.write,
            total_popped: state.read,
            high_water: state.high_water,
            producer_waits: state.producer_waits,
            consumer_waits: state.consumer_waits,
            closed: state.closed,
        }
    }

    /// Push an item, blocking while the channel is full.
    ///
    /// Fails with [`Error::ClosedChannel`] after [`close`](Self::close), with
    /// [`Error::CapacityViolation`] if the item exceeds the installed limit,
    /// and with [`Error::Cancelled`] if the channel is cancelled.
    pub fn push(&self, item: T) -> Result<()> {
        self.push_timeout(item, None)
    }

    /// Push an item, giving up with [`Error::Timeout`] after `timeout`.
    pub fn push_timeout(&self, item: T, timeout: Option<Duration>) -> Result<()> {
        if let Some(limit) = &self.item_limit {
            let len = (limit.measure)(&item);
            if len > limit.max {
                return Err(Error::CapacityViolation {
                    channel: self.name.clone(),
                    len,
                    max: limit.max,
                });
            }
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        let mut waited = false;

        loop {
            if state.cancelled {
                return Err(Error::Cancelled {
                    channel: self.name.clone(),
                });
            }
            if state.closed {
                return Err(Error::ClosedChannel {
                    channel: self.name.clone(),
                });
            }
            if !state.is_full() {
                break;
            }
            if !waited {
                waited = true;
                state.producer_waits += 1;
                tracing::trace!(channel = %self.name, "push waiting for space");
            }
            state = self.wait(&self.space_available, state, deadline)?;
        }

        let slot = state.slot(state.write);
        debug_assert!(state.slots[slot].is_none(), "overwriting a queued item");
        state.slots[slot] = Some(item);
        state.write += 1;

        let depth = state.len();
        state.high_water = state.high_water.max(depth);
        self.item_available.notify_one();
        drop(state);

        observability::record_item_pushed(&self.name);
        observability::record_channel_depth(&self.name, depth);
        Ok(())
    }

    /// Pop the oldest item, blocking while the channel is empty and open.
    ///
    /// Returns `Ok(None)` once the channel is closed and drained. Items
    /// queued before closure are always delivered first. Further calls keep
    /// returning `Ok(None)`.
    pub fn pop(&self) -> Result<Option<T>> {
        self.pop_timeout(None)
    }

    /// Pop with a timeout.
    ///
    /// Expiry is reported as [`Error::Timeout`], never as `Ok(None)`, so a
    /// slow producer cannot be mistaken for end-of-stream.
    pub fn pop_timeout(&self, timeout: Option<Duration>) -> Result<Option<T>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        let mut waited = false;

        loop {
            if state.cancelled {
                return Err(Error::Cancelled {
                    channel: self.name.clone(),
                });
            }
            if state.len() > 0 {
                break;
            }
            if state.closed {
                return Ok(None);
            }
            if !waited {
                waited = true;
                state.consumer_waits += 1;
                tracing::trace!(channel = %self.name, "pop waiting for item");
            }
            state = self.wait(&self.item_available, state, deadline)?;
        }

        let item = self.take_locked(&mut state);
        let depth = state.len();
        drop(state);

        observability::record_item_popped(&self.name);
        observability::record_channel_depth(&self.name, depth);
        Ok(item)
    }

    /// Pop an item without blocking.
    ///
    /// Returns `None` if nothing is queued, whether or not the channel is
    /// closed; use [`is_terminal`](Self::is_terminal) to tell the two apart.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.lock();
        if state.cancelled || state.len() == 0 {
            return None;
        }
        self.take_locked(&mut state)
    }

    /// Mark the channel as closed for production.
    ///
    /// Wakes every blocked consumer so it can observe the terminal state.
    /// Calling this more than once has no further effect.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        tracing::debug!(channel = %self.name, pending = state.len(), "channel closed");
        self.item_available.notify_all();
        self.space_available.notify_all();
    }

    /// Close this channel, provided `upstream` has already reached its
    /// terminal state.
    ///
    /// This is how a transform stage propagates end-of-stream: it must have
    /// observed its own input closed and drained before it may close its
    /// output. Otherwise [`Error::PrematureClose`] is returned and this
    /// channel stays open.
    pub fn close_after<U>(&self, upstream: &BoundedChannel<U>) -> Result<()> {
        if !upstream.is_terminal() {
            return Err(Error::PrematureClose {
                channel: self.name.clone(),
                upstream: upstream.name().to_string(),
            });
        }
        self.close();
        Ok(())
    }

    /// Cancel the channel, waking every blocked producer and consumer.
    ///
    /// Pending and future pushes and pops fail with [`Error::Cancelled`].
    /// Unlike closure, cancellation discards the remaining items.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if state.cancelled {
            return;
        }
        state.cancelled = true;
        tracing::debug!(channel = %self.name, dropped = state.len(), "channel cancelled");
        self.item_available.notify_all();
        self.space_available.notify_all();
    }

    fn take_locked(&self, state: &mut ChannelState<T>) -> Option<T> {
        let slot = state.slot(state.read);
        let item = state.slots[slot].take();
        debug_assert!(item.is_some(), "queued slot was empty");
        state.read += 1;
        self.space_available.notify_one();
        item
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState<T>> {
        // A panicking stage cannot leave the cursors half-updated, so the
        // state behind a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(
        &self,
        condvar: &Condvar,
        guard: MutexGuard<'a, ChannelState<T>>,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'a, ChannelState<T>>> {
        match deadline {
            None => Ok(condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::Timeout {
                        channel: self.name.clone(),
                    });
                }
                let (guard, _) = condvar
                    .wait_timeout(guard, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(guard)
            }
        }
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedChannel")
            .field("name", &self.name)
            .field("capacity", &state.capacity())
            .field("len", &state.len())
            .field("closed", &state.closed)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

/// Statistics about channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    /// Fixed capacity.
    pub capacity: usize,
    /// Items currently queued.
    pub current_items: usize,
    /// Total items pushed (the write cursor).
    pub total_pushed: u64,
    /// Total items popped (the read cursor).
    pub total_popped: u64,
    /// Largest number of items ever queued at once.
    pub high_water: usize,
    /// Number of pushes that had to wait for space.
    pub producer_waits: u64,
    /// Number of pops that had to wait for an item.
    pub consumer_waits: u64,
    /// Whether the channel has been closed.
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_channel_creation() {
        let channel: BoundedChannel<u32> = BoundedChannel::new(4);
        assert!(channel.is_empty());
        assert_eq!(channel.capacity(), 4);
        assert!(!channel.is_closed());
        assert!(!channel.is_terminal());
    }

    #[test]
    fn test_channel_zero_capacity_rejected() {
        let result = BoundedChannel::<u32>::try_new(0);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_channel_push_pop_order() {
        let channel = BoundedChannel::new(4);
        channel.push(1).unwrap();
        channel.push(2).unwrap();
        channel.push(3).unwrap();
        assert_eq!(channel.len(), 3);

        assert_eq!(channel.pop().unwrap(), Some(1));
        assert_eq!(channel.pop().unwrap(), Some(2));
        assert_eq!(channel.pop().unwrap(), Some(3));
        assert!(channel.is_empty());
    }

    #[test]
    fn test_channel_wraparound() {
        let channel = BoundedChannel::new(3);
        for round in 0..10u32 {
            channel.push(round * 2).unwrap();
            channel.push(round * 2 + 1).unwrap();
            assert_eq!(channel.pop().unwrap(), Some(round * 2));
            assert_eq!(channel.pop().unwrap(), Some(round * 2 + 1));
        }
        let stats = channel.stats();
        assert_eq!(stats.total_pushed, 20);
        assert_eq!(stats.total_popped, 20);
        assert_eq!(stats.high_water, 2);
    }

    #[test]
    fn test_channel_full() {
        let channel = BoundedChannel::new(2);
        channel.push('a').unwrap();
        channel.push('b').unwrap();
        assert!(channel.is_full());

        let result = channel.push_timeout('c', Some(Duration::from_millis(20)));
        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_channel_items_survive_close() {
        let channel = BoundedChannel::new(4);
        channel.push("x").unwrap();
        channel.push("y").unwrap();
        channel.close();

        assert!(!channel.is_terminal());
        assert_eq!(channel.pop().unwrap(), Some("x"));
        assert_eq!(channel.pop().unwrap(), Some("y"));
        assert_eq!(channel.pop().unwrap(), None);
        assert!(channel.is_terminal());
    }

    #[test]
    fn test_channel_terminal_is_sticky() {
        let channel: BoundedChannel<u8> = BoundedChannel::new(1);
        channel.close();
        for _ in 0..5 {
            assert_eq!(channel.pop().unwrap(), None);
        }
        assert_eq!(channel.stats().total_popped, 0);
    }

    #[test]
    fn test_channel_close_idempotent() {
        let channel = BoundedChannel::new(2);
        channel.push(7).unwrap();
        channel.close();
        let once = channel.stats();
        channel.close();
        assert_eq!(channel.stats(), once);
        assert_eq!(channel.pop().unwrap(), Some(7));
        assert_eq!(channel.pop().unwrap(), None);
    }

    #[test]
    fn test_channel_push_after_close() {
        let channel = BoundedChannel::new(2).with_name("b");
        channel.close();
        match channel.push(1) {
            Err(Error::ClosedChannel { channel }) => assert_eq!(channel, "b"),
            other => panic!("expected ClosedChannel, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_item_limit() {
        let channel = BoundedChannel::new(2)
            .with_name("a")
            .with_item_limit(3, |s: &String| s.chars().count());

        channel.push("abc".to_string()).unwrap();
        let result = channel.push("abcd".to_string());
        assert!(matches!(
            result,
            Err(Error::CapacityViolation { len: 4, max: 3, .. })
        ));
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_channel_blocked_push_resumes_after_pop() {
        let channel = Arc::new(BoundedChannel::new(1));
        channel.push(0).unwrap();

        let producer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.push(1))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(channel.len(), 1);
        assert_eq!(channel.pop().unwrap(), Some(0));

        producer.join().unwrap().unwrap();
        assert_eq!(channel.pop().unwrap(), Some(1));
        assert_eq!(channel.stats().producer_waits, 1);
    }

    #[test]
    fn test_channel_close_wakes_consumer() {
        let channel: Arc<BoundedChannel<u32>> = Arc::new(BoundedChannel::new(4));

        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.pop())
        };

        thread::sleep(Duration::from_millis(50));
        channel.close();

        assert_eq!(consumer.join().unwrap().unwrap(), None);
    }

    #[test]
    fn test_channel_cancel_wakes_both_sides() {
        let full = Arc::new(BoundedChannel::new(1));
        full.push(0).unwrap();
        let empty: Arc<BoundedChannel<u32>> = Arc::new(BoundedChannel::new(1));

        let producer = {
            let full = Arc::clone(&full);
            thread::spawn(move || full.push(1))
        };
        let consumer = {
            let empty = Arc::clone(&empty);
            thread::spawn(move || empty.pop())
        };

        thread::sleep(Duration::from_millis(50));
        full.cancel();
        empty.cancel();

        assert!(producer.join().unwrap().unwrap_err().is_cancelled());
        assert!(consumer.join().unwrap().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_channel_pop_timeout_is_not_terminal() {
        let channel: BoundedChannel<u32> = BoundedChannel::new(1);
        let result = channel.pop_timeout(Some(Duration::from_millis(10)));
        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert!(!channel.is_terminal());
    }

    #[test]
    fn test_channel_try_pop() {
        let channel = BoundedChannel::new(2);
        assert_eq!(channel.try_pop(), None);
        channel.push(5).unwrap();
        assert_eq!(channel.try_pop(), Some(5));
        assert_eq!(channel.try_pop(), None);
    }

    #[test]
    fn test_channel_close_after_requires_drained_upstream() {
        let upstream = BoundedChannel::new(2).with_name("a");
        let downstream: BoundedChannel<u32> = BoundedChannel::new(2).with_name("b");

        upstream.push(1).unwrap();
        upstream.close();
        let result = downstream.close_after(&upstream);
        assert!(matches!(result, Err(Error::PrematureClose { .. })));
        assert!(!downstream.is_closed());

        assert_eq!(upstream.pop().unwrap(), Some(1));
        assert_eq!(upstream.pop().unwrap(), None);
        downstream.close_after(&upstream).unwrap();
        assert!(downstream.is_closed());
    }

    #[test]
    fn test_channel_multithreaded_fifo() {
        let channel = BoundedChannel::new(8);

        let received = thread::scope(|s| {
            s.spawn(|| {
                for i in 0..1000u32 {
                    channel.push(i).unwrap();
                }
                channel.close();
            });

            let consumer = s.spawn(|| {
                let mut received = Vec::new();
                while let Some(i) = channel.pop().unwrap() {
                    received.push(i);
                }
                received
            });
            consumer.join().unwrap()
        });

        assert_eq!(received, (0..1000).collect::<Vec<_>>());
        assert!(channel.stats().high_water <= 8);
    }
}
