// src/model/queues.rs

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-length pipeline of raw-material orders: what is pushed today
/// arrives `delay` days later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDelayQueue {
    buffer: VecDeque<f64>,
    delay_length: usize,
}

impl TimeDelayQueue {
    pub fn new(delay: usize) -> Self {
        // Pre-fill with zeros so orders take `delay` days to traverse the pipe
        let delay = delay.max(1);
        Self {
            buffer: std::iter::repeat(0.0).take(delay).collect(),
            delay_length: delay,
        }
    }

    /// Morning: whatever was ordered `delay` days ago arrives.
    pub fn pop_arrival(&mut self) -> f64 {
        self.buffer.pop_front().unwrap_or(0.0)
    }

    /// Evening: today's order enters the pipe.
    pub fn push_departure(&mut self, quantity: f64) {
        self.buffer.push_back(quantity);
    }

    /// Total quantity ordered but not yet received.
    pub fn in_transit(&self) -> f64 {
        self.buffer.iter().sum()
    }

    pub fn delay(&self) -> usize {
        self.delay_length
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
