//! Bounded in-memory history of the charted vitals.
//!
//! [`RingBuffer`] keeps the most recent `capacity` points; when full, new
//! points overwrite the oldest.  Nothing here is persisted.
//!
//! ```rust
//! use fatigue_dashboard::telemetry::RingBuffer;
//!
//! let mut buf = RingBuffer::new(3);
//! for v in [1, 2, 3, 4] {
//!     buf.push(v);
//! }
//! assert_eq!(buf.to_vec(), vec![2, 3, 4]);
//! ```

// ---------------------------------------------------------------------------
// HistoryPoint
// ---------------------------------------------------------------------------

/// One charted sample, taken on every successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryPoint {
    /// Monotonic tick counter (x axis of the heart-rate chart).
    pub tick: u64,
    pub heart_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub timestamp_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid items currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append one item, overwriting the oldest when full.
    pub fn push(&mut self, item: T) {
        self.buf[self.write_pos] = item;
        self.write_pos = (self.write_pos + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    /// Copy out all stored items in chronological order.
    pub fn to_vec(&self) -> Vec<T> {
        // Before the first wrap valid data starts at 0; afterwards the oldest
        // item sits at `write_pos`.
        let read_pos = if self.len < self.capacity {
            0
        } else {
            self.write_pos
        };

        (0..self.len)
            .map(|i| self.buf[(read_pos + i) % self.capacity])
            .collect()
    }

    /// Most recently pushed item.
    pub fn last(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.write_pos + self.capacity - 1) % self.capacity;
        Some(self.buf[idx])
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The reconciler's chart buffer.
pub type TelemetryHistory = RingBuffer<HistoryPoint>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
