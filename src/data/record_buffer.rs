//! Bounded, most-recent-first record buffer shared between the ingestion thread
//! and any number of readers.
//!
//! The buffer is a `VecDeque` behind a single `parking_lot::Mutex`. Inserts push
//! to the front and pop from the back once the capacity is reached, so the
//! surviving records keep their relative order. Readers never see the deque
//! itself: [`RecordBuffer::snapshot`] copies the contents out while holding the
//! lock and returns an owned `Vec`.

use crate::data::record::Record;
use crate::error::{AppResult, StreamError};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default number of records retained by a listener.
pub const DEFAULT_BUFFER_LENGTH: usize = 1000;

/// Thread-safe, fixed-capacity record buffer.
#[derive(Debug)]
pub struct RecordBuffer {
    width: usize,
    capacity: usize,
    records: Mutex<VecDeque<Record>>,
}

impl RecordBuffer {
    /// Create an empty buffer holding at most `capacity` records of `width` values.
    pub fn new(width: usize, capacity: usize) -> AppResult<Self> {
        if width == 0 {
            return Err(StreamError::Configuration(
                "buffer_width must be positive".to_string(),
            ));
        }
        if capacity == 0 {
            return Err(StreamError::Configuration(
                "buffer_length must be positive".to_string(),
            ));
        }

        Ok(Self {
            width,
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// Number of values every record must carry.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Maximum number of retained records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert `record` at the most-recent position.
    ///
    /// Returns the evicted record when the buffer was already full. Records of the
    /// wrong width are rejected without touching the buffer.
    pub fn insert(&self, record: Record) -> AppResult<Option<Record>> {
        if record.width() != self.width {
            return Err(StreamError::InvalidWidth {
                expected: self.width,
                actual: record.width(),
            });
        }

        let mut records = self.records.lock();
        records.push_front(record);
        if records.len() > self.capacity {
            Ok(records.pop_back())
        } else {
            Ok(None)
        }
    }

    /// Independent copy of the current contents, most recent first.
    pub fn snapshot(&self) -> Vec<Record> {
        let records = self.records.lock();
        records.iter().cloned().collect()
    }

    /// Copy of the most recently inserted record.
    pub fn latest(&self) -> Option<Record> {
        self.records.lock().front().cloned()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true when no record has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop every retained record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn pair(a: f64, b: f64) -> Record {
        Record::from(vec![a, b])
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(matches!(
            RecordBuffer::new(0, 10),
            Err(StreamError::Configuration(_))
        ));
        assert!(matches!(
            RecordBuffer::new(2, 0),
            Err(StreamError::Configuration(_))
        ));
    }

    #[test]
    fn empty_buffer_snapshots_to_empty_vec() {
        let buffer = RecordBuffer::new(2, 3).unwrap();
        assert!(buffer.snapshot().is_empty());
        assert!(buffer.is_empty());
        assert_eq!(buffer.latest(), None);
    }

    #[test]
    fn evicts_oldest_and_keeps_most_recent_first() {
        let buffer = RecordBuffer::new(2, 3).unwrap();
        assert_eq!(buffer.insert(pair(1.0, 2.0)).unwrap(), None);
        assert_eq!(buffer.insert(pair(3.0, 4.0)).unwrap(), None);
        assert_eq!(buffer.insert(pair(5.0, 6.0)).unwrap(), None);
        assert_eq!(buffer.insert(pair(7.0, 8.0)).unwrap(), Some(pair(1.0, 2.0)));

        assert_eq!(
            buffer.snapshot(),
            vec![pair(7.0, 8.0), pair(5.0, 6.0), pair(3.0, 4.0)]
        );
        assert_eq!(buffer.latest(), Some(pair(7.0, 8.0)));
    }

    #[test]
    fn never_exceeds_capacity() {
        let capacity = 16;
        let buffer = RecordBuffer::new(1, capacity).unwrap();
        for i in 0..1000 {
            buffer.insert(Record::from(vec![i as f64])).unwrap();
            assert!(buffer.len() <= capacity);
        }

        let expected: Vec<Record> = (1000 - capacity..1000)
            .rev()
            .map(|i| Record::from(vec![i as f64]))
            .collect();
        assert_eq!(buffer.snapshot(), expected);
    }

    #[test]
    fn width_mismatch_leaves_buffer_untouched() {
        let buffer = RecordBuffer::new(3, 4).unwrap();
        let result = buffer.insert(pair(1.0, 2.0));
        assert!(matches!(
            result,
            Err(StreamError::InvalidWidth {
                expected: 3,
                actual: 2
            })
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn snapshot_is_not_affected_by_later_inserts() {
        let buffer = RecordBuffer::new(2, 3).unwrap();
        buffer.insert(pair(1.0, 2.0)).unwrap();
        let before = buffer.snapshot();

        buffer.insert(pair(3.0, 4.0)).unwrap();
        buffer.insert(pair(5.0, 6.0)).unwrap();
        buffer.insert(pair(7.0, 8.0)).unwrap();

        assert_eq!(before, vec![pair(1.0, 2.0)]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn clear_empties_buffer() {
        let buffer = RecordBuffer::new(2, 3).unwrap();
        buffer.insert(pair(1.0, 2.0)).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn concurrent_insert_and_snapshot() {
        let width = 8;
        let buffer = Arc::new(RecordBuffer::new(width, 64).unwrap());

        let writer_buffer = Arc::clone(&buffer);
        let writer = thread::spawn(move || {
            for i in 0..10_000 {
                let value = i as f64;
                writer_buffer
                    .insert(Record::from(vec![value; width]))
                    .unwrap();
            }
        });

        let reader_buffer = Arc::clone(&buffer);
        let reader = thread::spawn(move || {
            for _ in 0..500 {
                let snapshot = reader_buffer.snapshot();
                assert!(snapshot.len() <= 64);
                let mut previous: Option<f64> = None;
                for record in &snapshot {
                    assert_eq!(record.width(), width);
                    // Every value of a record was written together.
                    assert!(record.iter().all(|v| *v == record[0]));
                    // Most recent first: values strictly decrease.
                    if let Some(prev) = previous {
                        assert!(record[0] < prev);
                    }
                    previous = Some(record[0]);
                }
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(buffer.len(), 64);
    }
}
