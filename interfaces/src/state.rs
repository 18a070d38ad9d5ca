use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::defs::ErrorRecord;
use crate::defs::ErrorSink;

const DEFAULT_CAPACITY: usize = 256;

/// Process-wide error log kept in memory. Once `capacity` records are held
/// the oldest one is dropped for every new arrival.
pub struct MemoryErrorSink {
    records: Mutex<VecDeque<ErrorRecord>>,
    capacity: usize,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for MemoryErrorSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for MemoryErrorSink {
    fn record(&self, record: ErrorRecord) {
        let mut records = self.records.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    fn list(&self) -> Vec<ErrorRecord> {
        self.records.lock().iter().cloned().collect()
    }
}
