// Copyright 2025-2026 CEMAXECUTER LLC

use std::sync::Arc;
use std::time::{Duration, Instant};

use fdx_sdr::{RxStream, Sample, StreamCommand};
use num_complex::Complex32;

use crate::state::TestState;

/// Receive buffer is oversized relative to the base buffer length to
/// absorb delivery jitter.
const RX_BUFFER_FACTOR: usize = 4;

/// Bounded-duration continuous receive loop. The buffer is allocated
/// once and reused every iteration; the hot loop never allocates.
pub struct RxCollector {
    state: Arc<TestState>,
    buffer: Vec<Sample>,
}

impl RxCollector {
    pub fn new(state: Arc<TestState>, samps_per_buffer: usize) -> Self {
        Self {
            state,
            buffer: vec![Complex32::new(0.0, 0.0); samps_per_buffer * RX_BUFFER_FACTOR],
        }
    }

    /// Start continuous streaming and collect until `run_time` has
    /// elapsed. Receive errors are logged and skipped; they never
    /// abort the test and their samples are not counted. The caller
    /// issues the stop command afterwards.
    pub fn run(&mut self, stream: &mut dyn RxStream, run_time: Duration) -> Result<(), String> {
        stream.issue_command(StreamCommand::StartContinuous { now: true })?;

        let start = Instant::now();
        while start.elapsed() < run_time {
            let (num_rx, err) = stream.recv(&mut self.buffer);
            if err.is_error() {
                self.state.note_rx_error();
                log::warn!("rx error: {}", err);
                continue;
            }
            self.state.add_rx_samples(num_rx as u64);
        }

        Ok(())
    }
}
