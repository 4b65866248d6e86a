// Copyright 2025-2026 CEMAXECUTER LLC

use fdx_sdr::Sample;
use num_complex::Complex32;
use rand::Rng;

/// Bipolar test-pattern amplitude.
const AMPLITUDE: f32 = 1.0;

/// Fixed set of pre-generated transmit buffers, cycled round-robin.
///
/// Pool size and buffer length never change after generation and the
/// buffers are never written again, so the pool can be shared with
/// the transmit thread behind a plain `Arc`.
pub struct TxBufferPool {
    buffers: Vec<Vec<Sample>>,
}

impl TxBufferPool {
    /// Generate `count` buffers of `length` samples, each component
    /// independently one of two amplitude levels (±1.0). Pure
    /// construction, no error path.
    pub fn generate(count: usize, length: usize) -> Self {
        let mut rng = rand::thread_rng();
        let buffers = (0..count)
            .map(|_| {
                (0..length)
                    .map(|_| {
                        let i = if rng.gen_bool(0.5) { AMPLITUDE } else { -AMPLITUDE };
                        let q = if rng.gen_bool(0.5) { AMPLITUDE } else { -AMPLITUDE };
                        Complex32::new(i, q)
                    })
                    .collect()
            })
            .collect();
        Self { buffers }
    }

    pub fn get(&self, idx: usize) -> &[Sample] {
        &self.buffers[idx]
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Round-robin successor of `idx`
    pub fn next_index(&self, idx: usize) -> usize {
        (idx + 1) % self.buffers.len()
    }
}
