//! Fixed-capacity byte ring for frame synchronization
//!
//! Consuming scanned bytes is an O(1) pointer advance instead of a
//! `Vec::drain()` shift, which matters at the 115200-baud byte rate.

/// Fixed-capacity ring buffer with O(1) advance
pub struct ByteRing<const N: usize = 256> {
    data: [u8; N],
    head: usize, // write position (next empty slot)
    tail: usize, // read position (first valid byte)
    len: usize,
    staging: [u8; 64], // for slices that span the wraparound point
}

impl<const N: usize> ByteRing<N> {
    /// Create a new empty ring
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            head: 0,
            tail: 0,
            len: 0,
            staging: [0u8; 64],
        }
    }

    /// Append bytes; bytes that would overflow are silently dropped
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.len < N {
                self.data[self.head] = b;
                self.head = (self.head + 1) % N;
                self.len += 1;
            }
        }
    }

    /// Consume n bytes from the front
    #[inline]
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.len);
        self.tail = (self.tail + n) % N;
        self.len -= n;
    }

    /// Number of bytes available to read
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the ring holds no bytes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read byte at logical index (handles wraparound)
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.data[(self.tail + index) % N])
        } else {
            None
        }
    }

    /// Find a 2-byte pattern, returns offset from the read position
    pub fn find_pattern_2(&self, b1: u8, b2: u8) -> Option<usize> {
        if self.len < 2 {
            return None;
        }
        (0..self.len - 1).find(|&i| {
            self.data[(self.tail + i) % N] == b1 && self.data[(self.tail + i + 1) % N] == b2
        })
    }

    /// Get a contiguous slice (copies to staging if the data wraps)
    pub fn get_slice(&mut self, start: usize, len: usize) -> Option<&[u8]> {
        if start + len > self.len || len > self.staging.len() {
            return None;
        }

        let real_start = (self.tail + start) % N;
        if real_start + len <= N {
            Some(&self.data[real_start..real_start + len])
        } else {
            for i in 0..len {
                self.staging[i] = self.data[(real_start + i) % N];
            }
            Some(&self.staging[..len])
        }
    }
}

impl<const N: usize> Default for ByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
