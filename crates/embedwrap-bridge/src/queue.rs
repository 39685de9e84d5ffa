// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pending-message queue.
//
// Holds host → module messages while no channel is bound. The embedded module
// collects them with `getPendingMessages`, which drains the whole queue in one
// step. Enqueue and drain share one mutex, so a concurrent enqueue lands
// entirely before or entirely after a drain.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, warn};

/// Ordered buffer of undelivered messages.
///
/// Unbounded unless built with [`PendingQueue::bounded`]. An unbounded queue
/// grows for as long as the module never pulls; callers that cannot accept
/// that should configure a capacity.
#[derive(Debug, Default)]
pub struct PendingQueue {
    messages: Mutex<VecDeque<String>>,
    capacity: Option<usize>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that drops its oldest message once `capacity` is reached.
    /// A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Build from an optional capacity, as found in `BridgeConfig`.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(n) => Self::bounded(n),
            None => Self::new(),
        }
    }

    /// Append a message to the tail.
    pub fn enqueue(&self, message: impl Into<String>) {
        let message = message.into();
        let mut guard = self.messages.lock().expect("pending queue lock poisoned");
        if let Some(cap) = self.capacity {
            while guard.len() >= cap {
                if let Some(dropped) = guard.pop_front() {
                    warn!(
                        capacity = cap,
                        dropped = %dropped,
                        "pending queue full, dropped oldest message"
                    );
                }
            }
        }
        guard.push_back(message);
        debug!(pending = guard.len(), "message queued");
    }

    /// Take every queued message in insertion order, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<String> {
        let drained: Vec<String> = {
            let mut guard = self.messages.lock().expect("pending queue lock poisoned");
            guard.drain(..).collect()
        };
        debug!(count = drained.len(), "pending queue drained");
        drained
    }

    pub fn len(&self) -> usize {
        self.messages.lock().expect("pending queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
