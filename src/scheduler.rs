use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A queue of events, delivered in order of time.
/// Events scheduled for the same time are delivered in the order they were scheduled.
#[derive(Clone, Debug)]
pub struct EventQueue<E> {
    /// The pending events.
    heap: BinaryHeap<Scheduled<E>>,
    /// The next sequence number.
    seq: u64,
    /// The time of the last delivered event.
    now: f64,
}

#[derive(Clone, Debug)]
struct Scheduled<E> {
    time: f64,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed, as the heap pops its greatest element first
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
            now: 0.0,
        }
    }
}

impl<E> EventQueue<E> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an event. Events in the past are delivered at the current time.
    pub fn schedule_at(&mut self, time: f64, event: E) {
        let time = if time < self.now {
            log::debug!("event scheduled at {} before current time {}", time, self.now);
            self.now
        } else {
            time
        };
        self.heap.push(Scheduled {
            time,
            seq: self.seq,
            event,
        });
        self.seq += 1;
    }

    /// Takes the next event scheduled at or before `now`, along with its time.
    pub fn pop_due(&mut self, now: f64) -> Option<(f64, E)> {
        if self.heap.peek()?.time > now {
            return None;
        }
        let next = self.heap.pop()?;
        self.now = next.time;
        Some((next.time, next.event))
    }

    /// The time of the last delivered event.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// The time of the next event, if any.
    pub fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|next| next.time)
    }

    /// The number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
