//! Fixed-capacity sample ring buffer.
//!
//! Holds the most recent samples while the voice gate is idle so segments
//! can be seeded with pre-roll audio. Writes past capacity overwrite the
//! oldest samples; a full buffer is the steady state, not an error.

/// Circular f32 sample store, overwrite-oldest.
#[derive(Debug, Clone)]
pub struct SampleRing {
    buf: Vec<f32>,
    capacity: usize,
    /// Index the next sample will be written to.
    head: usize,
    len: usize,
}

impl SampleRing {
    /// Creates a ring holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity],
            capacity,
            head: 0,
            len: 0,
        }
    }

    /// Appends samples, discarding the oldest once capacity is exceeded.
    pub fn write(&mut self, samples: &[f32]) {
        if self.capacity == 0 {
            return;
        }

        // Only the last `capacity` samples of a large write can survive.
        let samples = if samples.len() > self.capacity {
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        for &sample in samples {
            self.buf[self.head] = sample;
            self.head = (self.head + 1) % self.capacity;
        }
        self.len = (self.len + samples.len()).min(self.capacity);
    }

    /// Returns the buffered samples, oldest first.
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len);
        let start = (self.head + self.capacity - self.len) % self.capacity.max(1);
        for i in 0..self.len {
            out.push(self.buf[(start + i) % self.capacity]);
        }
        out
    }

    /// Number of samples currently readable.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the ring retains.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards all buffered samples.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
