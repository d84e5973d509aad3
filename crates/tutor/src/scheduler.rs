use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tokio::time::Instant;

use crate::engine::{FlashToken, ScheduledClear};

#[derive(Debug)]
struct Entry {
    due: Instant,
    order: u64,
    token: FlashToken,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.order).cmp(&(other.due, other.order))
    }
}

/// Pending flash reverts ordered by the instant they fall due.
#[derive(Debug, Default)]
pub struct ClearQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    next_order: u64,
}

impl ClearQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Instant, clear: ScheduledClear) {
        let entry = Entry {
            due: now + clear.delay,
            order: self.next_order,
            token: clear.token,
        };
        self.next_order += 1;
        self.heap.push(Reverse(entry));
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.due)
    }

    /// Removes and returns every token due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<FlashToken> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.token);
            }
        }
        due
    }

    pub fn cancel_all(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use andio_domain::{LedCommand, NoteEvent, Score};

    use crate::config::EngineConfig;
    use crate::engine::PlaybackEngine;

    fn flashes() -> Vec<ScheduledClear> {
        let score = Score::new("Queue", vec![NoteEvent::new(0, 60, 4)], 4).unwrap();
        let mut engine =
            PlaybackEngine::new(score, EngineConfig::default(), Vec::<LedCommand>::new()).unwrap();
        engine.start();
        engine.on_key_press(60);
        engine.on_key_press(62);
        engine.take_scheduled()
    }

    #[test]
    fn pops_in_due_order() {
        let scheduled = flashes();
        let (correct, wrong) = (scheduled[0], scheduled[1]);
        let start = Instant::now();
        let mut queue = ClearQueue::new();
        queue.schedule(start, wrong);
        queue.schedule(start, correct);

        assert_eq!(queue.next_due(), Some(start + Duration::from_millis(300)));
        assert!(queue.pop_due(start).is_empty());
        assert_eq!(
            queue.pop_due(start + Duration::from_millis(300)),
            vec![correct.token]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(start + Duration::from_secs(5)), vec![wrong.token]);
        assert!(queue.is_empty());
    }

    #[test]
    fn cancel_all_empties_queue() {
        let mut queue = ClearQueue::new();
        let start = Instant::now();
        for clear in flashes() {
            queue.schedule(start, clear);
        }
        queue.cancel_all();
        assert!(queue.next_due().is_none());
    }
}
