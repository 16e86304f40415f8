//! Bounded blocking FIFO of chunk handles connecting adjacent workers.
//!
//! Capacity equals the chunk pool size, so enqueue never needs to reject an
//! item for being "full" in steady state — every chunk in flight has exactly
//! one owner. The only failure mode is shutdown.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct State<T> {
    items: VecDeque<T>,
    shutting_down: bool,
}

pub struct BlockingQueue<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                shutting_down: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Blocks until space is available or shutdown is signaled.
    /// Returns `false` if shutdown won the race and the item was not queued.
    pub fn enqueue(&self, item: T) -> bool {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutting_down {
                return false;
            }
            if state.items.len() < self.capacity {
                state.items.push_back(item);
                self.not_empty.notify_one();
                return true;
            }
            state = self.not_full.wait(state).unwrap();
        }
    }

    /// Blocks until an item is available or shutdown is signaled.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.shutting_down {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Non-blocking variant used by realtime producers that must never stall.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        let item = state.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn signal_shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutting_down = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
