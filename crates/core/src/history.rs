// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded change-event history for subscriber catch-up

use crate::event::ChangeEvent;
use crate::position::Position;
use std::collections::VecDeque;

/// Default number of events retained for catch-up
pub const DEFAULT_CAPACITY: usize = 1000;

/// FIFO buffer of the most recent change events
///
/// Holds at most `capacity` events; appending to a full buffer evicts the
/// oldest one. Subscribers whose cursor falls behind the evicted events never
/// see them.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    events: VecDeque<ChangeEvent>,
}

impl HistoryBuffer {
    /// Create a buffer; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an event, returning the evicted oldest event if the buffer was full
    pub fn push(&mut self, event: ChangeEvent) -> Option<ChangeEvent> {
        let evicted = if self.events.len() == self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Every retained event with a cursor strictly after `after`, in buffer order
    pub fn since(&self, after: Position) -> Vec<ChangeEvent> {
        self.events
            .iter()
            .filter(|event| event.cursor > after)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
