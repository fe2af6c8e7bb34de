//! # Event Channel
//!
//! Broadcast log with independent per-reader cursors.
//!
//! ```text
//!   ids:      7    8    9    10   11          last_event_id = 11
//!           ┌────┬────┬────┬────┬────┐
//!   buffer: │ e7 │ e8 │ e9 │ e10│ e11│
//!           └────┴────┴────┴────┴────┘
//!                ^ reader A (seen 7)
//!                          ^ reader B (seen 9)
//! ```
//!
//! Every event gets the next id. A reader sees every event pushed after it
//! was created, exactly once, in push order. Events every live reader has
//! seen are dropped from the front of the buffer.
//!
//! Readers are RAII handles: dropping one frees its slot. The handle needs
//! no borrow of the channel; it posts its slot over a `crossbeam_channel`
//! that the channel drains on its next call.

use std::fmt;
use std::iter::Skip;
use std::marker::PhantomData;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::ring_buffer::{self, RingBuffer};

/// Subscription handle for an [`EventChannel`].
///
/// Only valid with the channel that created it.
pub struct Reader<E> {
    slot: usize,
    /// Posts `slot` back to the channel on drop.
    notify: Sender<usize>,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Reader<E> {
    /// Cursor slot inside the owning channel.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<E> Drop for Reader<E> {
    fn drop(&mut self) {
        // The channel may already be gone, in which case nobody cares.
        let _ = self.notify.send(self.slot);
    }
}

impl<E> fmt::Debug for Reader<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader").field("slot", &self.slot).finish()
    }
}

/// Multi-reader broadcast queue.
///
/// # Example
///
/// ```rust
/// use ember_core::EventChannel;
///
/// let mut channel = EventChannel::new();
/// channel.push(1);
/// let mut reader = channel.create_reader();
/// channel.push(2);
/// channel.push(3);
/// assert_eq!(channel.read(&mut reader).copied().collect::<Vec<_>>(), vec![2, 3]);
/// assert_eq!(channel.read(&mut reader).count(), 0);
/// ```
pub struct EventChannel<E> {
    /// Unconsumed suffix of the log. Holds ids
    /// `last_event_id - len + 1 ..= last_event_id`.
    events: RingBuffer<E>,
    /// Id of the most recent push; 0 before the first.
    last_event_id: u64,
    /// Last id seen, per reader slot. `None` marks a free slot.
    cursors: Vec<Option<u64>>,
    free_slots: Vec<usize>,
    /// Readers created minus drop notices already collected.
    live_readers: usize,
    dropped_tx: Sender<usize>,
    dropped_rx: Receiver<usize>,
}

impl<E> EventChannel<E> {
    /// Creates an empty channel with no readers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty channel whose buffer has room for `capacity`
    /// unconsumed events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (dropped_tx, dropped_rx) = unbounded();
        Self {
            events: RingBuffer::with_capacity(capacity),
            last_event_id: 0,
            cursors: Vec::new(),
            free_slots: Vec::new(),
            live_readers: 0,
            dropped_tx,
            dropped_rx,
        }
    }

    /// Id of the most recently pushed event, 0 if none.
    #[inline]
    #[must_use]
    pub fn last_event_id(&self) -> u64 {
        self.last_event_id
    }

    /// Number of events still held for some reader.
    #[inline]
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.events.len()
    }

    /// Number of live readers. Drops are reflected immediately.
    #[inline]
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.live_readers - self.dropped_rx.len()
    }

    /// Creates a reader that will see every event pushed from now on.
    pub fn create_reader(&mut self) -> Reader<E> {
        self.collect_dropped();

        let slot = if let Some(slot) = self.free_slots.pop() {
            self.cursors[slot] = Some(self.last_event_id);
            slot
        } else {
            self.cursors.push(Some(self.last_event_id));
            self.cursors.len() - 1
        };
        self.live_readers += 1;
        tracing::trace!(slot, from = self.last_event_id, "event reader created");

        Reader {
            slot,
            notify: self.dropped_tx.clone(),
            _marker: PhantomData,
        }
    }

    /// Alias of [`EventChannel::create_reader`].
    #[inline]
    pub fn subscribe(&mut self) -> Reader<E> {
        self.create_reader()
    }

    /// Appends an event and returns a reference to it.
    pub fn emplace(&mut self, event: E) -> &mut E {
        self.reclaim();
        self.last_event_id += 1;
        self.events.emplace(event)
    }

    /// Appends an event.
    #[inline]
    pub fn push(&mut self, event: E) {
        self.emplace(event);
    }

    /// Returns every event the reader has not seen yet, oldest first, and
    /// marks them seen.
    ///
    /// # Panics
    ///
    /// Panics if `reader` was created by a different channel.
    pub fn read(&mut self, reader: &mut Reader<E>) -> EventIter<'_, E> {
        self.check_owner(reader);
        self.reclaim();

        let seen = self.cursor(reader);
        let skip = self.offset_after(seen);
        let remaining = self.events.len() - skip;
        self.cursors[reader.slot] = Some(self.last_event_id);

        EventIter {
            inner: self.events.iter().skip(skip),
            remaining,
        }
    }

    /// Returns the next event the reader has not seen, marking it seen.
    ///
    /// # Panics
    ///
    /// Panics if `reader` was created by a different channel.
    pub fn next_event(&mut self, reader: &mut Reader<E>) -> Option<&E> {
        self.check_owner(reader);
        self.reclaim();

        let seen = self.cursor(reader);
        if seen == self.last_event_id {
            return None;
        }
        self.cursors[reader.slot] = Some(seen + 1);
        let offset = self.offset_after(seen);
        self.events.get(offset)
    }

    /// Number of events the reader has not seen yet.
    ///
    /// # Panics
    ///
    /// Panics if `reader` was created by a different channel.
    #[must_use]
    pub fn pending(&self, reader: &Reader<E>) -> usize {
        self.check_owner(reader);
        usize::try_from(self.last_event_id - self.cursor(reader)).unwrap_or(usize::MAX)
    }

    fn check_owner(&self, reader: &Reader<E>) {
        assert!(
            reader.notify.same_channel(&self.dropped_tx),
            "event reader used with a channel that did not create it"
        );
    }

    fn cursor(&self, reader: &Reader<E>) -> u64 {
        match self.cursors[reader.slot] {
            Some(seen) => seen,
            None => unreachable!("live reader in a free slot"),
        }
    }

    /// Buffer index of the first event with id greater than `seen`.
    fn offset_after(&self, seen: u64) -> usize {
        let oldest = self.last_event_id + 1 - self.events.len() as u64;
        // Reclamation never drops past a live cursor, so seen + 1 >= oldest.
        usize::try_from(seen + 1 - oldest).unwrap_or(usize::MAX)
    }

    /// Frees the slots of readers dropped since the last call.
    fn collect_dropped(&mut self) {
        for slot in self.dropped_rx.try_iter() {
            self.cursors[slot] = None;
            self.free_slots.push(slot);
            self.live_readers -= 1;
            tracing::trace!(slot, "event reader dropped");
        }
    }

    /// Drops every buffered event that all live readers have seen.
    fn reclaim(&mut self) {
        self.collect_dropped();

        let floor = self
            .cursors
            .iter()
            .flatten()
            .copied()
            .min()
            .unwrap_or(self.last_event_id);
        let oldest = self.last_event_id + 1 - self.events.len() as u64;
        if floor >= oldest {
            let seen_by_all = usize::try_from(floor - oldest + 1).unwrap_or(usize::MAX);
            self.events.drop_front(seen_by_all);
        }
    }

    /// With no readers, only the most recent event is kept.
    fn reclaim_all_but_latest(&mut self) {
        let excess = self.events.len().saturating_sub(1);
        self.events.drop_front(excess);
    }
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Extend<E> for EventChannel<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, events: I) {
        self.reclaim();
        for event in events {
            self.last_event_id += 1;
            self.events.push(event);
        }
        if self.reader_count() == 0 {
            self.reclaim_all_but_latest();
        }
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("last_event_id", &self.last_event_id)
            .field("buffered", &self.events.len())
            .field("readers", &self.reader_count())
            .finish()
    }
}

/// Unseen events returned by [`EventChannel::read`], oldest first.
pub struct EventIter<'a, E> {
    inner: Skip<ring_buffer::Iter<'a, E>>,
    remaining: usize,
}

impl<'a, E> Iterator for EventIter<'a, E> {
    type Item = &'a E;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let event = self.inner.next()?;
        self.remaining -= 1;
        Some(event)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E> ExactSizeIterator for EventIter<'_, E> {}

impl<E> std::iter::FusedIterator for EventIter<'_, E> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(channel: &mut EventChannel<u32>, reader: &mut Reader<u32>) -> Vec<u32> {
        channel.read(reader).copied().collect()
    }

    #[test]
    fn test_reader_sees_only_later_events() {
        let mut channel = EventChannel::new();
        channel.extend([1, 2, 3]);
        let mut reader = channel.create_reader();
        channel.extend([4, 5, 6]);

        assert_eq!(collect(&mut channel, &mut reader), vec![4, 5, 6]);
        assert!(collect(&mut channel, &mut reader).is_empty());
    }

    #[test]
    fn test_read_reports_exact_len() {
        let mut channel = EventChannel::new();
        let mut reader = channel.create_reader();
        channel.extend(0..10);
        let iter = channel.read(&mut reader);
        assert_eq!(iter.len(), 10);
    }

    #[test]
    fn test_next_event_drains_one_at_a_time() {
        let mut channel = EventChannel::new();
        let mut reader = channel.create_reader();
        channel.push(10);
        channel.push(20);

        assert_eq!(channel.pending(&reader), 2);
        assert_eq!(channel.next_event(&mut reader), Some(&10));
        assert_eq!(channel.next_event(&mut reader), Some(&20));
        assert_eq!(channel.next_event(&mut reader), None);
        assert_eq!(channel.pending(&reader), 0);
    }

    #[test]
    fn test_reclaims_events_seen_by_all() {
        let mut channel = EventChannel::new();
        let mut fast = channel.create_reader();
        let mut slow = channel.create_reader();
        channel.extend(1..=5);

        collect(&mut channel, &mut fast);
        assert_eq!(channel.buffered_len(), 5);

        assert_eq!(collect(&mut channel, &mut slow), vec![1, 2, 3, 4, 5]);
        channel.push(6);
        assert_eq!(channel.buffered_len(), 1);
    }

    #[test]
    fn test_dropping_slow_reader_releases_buffer() {
        let mut channel = EventChannel::new();
        let mut fast = channel.create_reader();
        let slow = channel.create_reader();
        channel.extend(1..=100);
        collect(&mut channel, &mut fast);

        drop(slow);
        assert_eq!(channel.reader_count(), 1);
        channel.push(101);
        assert_eq!(channel.buffered_len(), 1);
    }

    #[test]
    fn test_zero_readers_keep_only_latest() {
        let mut channel = EventChannel::new();
        channel.extend(1..=50);
        assert_eq!(channel.buffered_len(), 1);
        channel.push(51);
        assert_eq!(channel.buffered_len(), 1);
        assert_eq!(channel.last_event_id(), 51);
    }

    #[test]
    fn test_slot_reuse() {
        let mut channel: EventChannel<u32> = EventChannel::new();
        let a = channel.create_reader();
        let b = channel.create_reader();
        let slot = a.slot();
        drop(a);
        let c = channel.create_reader();
        assert_eq!(c.slot(), slot);
        assert_eq!(channel.reader_count(), 2);
        drop((b, c));
        assert_eq!(channel.reader_count(), 0);
    }

    #[test]
    #[should_panic(expected = "did not create it")]
    fn test_foreign_reader_panics() {
        let mut first: EventChannel<u32> = EventChannel::new();
        let mut second: EventChannel<u32> = EventChannel::new();
        let mut reader = first.create_reader();
        let _ = second.read(&mut reader).count();
    }

    #[test]
    fn test_reader_outlives_channel() {
        let mut channel: EventChannel<u32> = EventChannel::new();
        let reader = channel.create_reader();
        drop(channel);
        drop(reader);
    }
}
