//! Bounded in-memory log of what was heard and answered.
//!
//! Nothing is persisted; the oldest exchange is dropped once the log is full.

use std::collections::VecDeque;

use chrono::{DateTime, Local};

/// One processed utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub heard: String,
    /// Name of the command that ran, `None` when nothing matched.
    pub command: Option<String>,
    pub response: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct ConversationLog {
    exchanges: VecDeque<Exchange>,
    capacity: usize,
}

impl ConversationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            exchanges: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn record(&mut self, heard: &str, command: Option<&str>, response: &str) {
        if self.capacity == 0 {
            return;
        }
        while self.exchanges.len() >= self.capacity {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(Exchange {
            heard: heard.to_string(),
            command: command.map(str::to_string),
            response: response.to_string(),
            timestamp: Local::now(),
        });
    }

    /// Oldest first.
    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn last(&self) -> Option<&Exchange> {
        self.exchanges.back()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}
