// Copyright 2025-2026 CEMAXECUTER LLC

use std::sync::Arc;
use std::time::{Duration, Instant};

use fdx_sdr::BYTES_PER_SAMPLE;

use crate::state::TestState;

/// Reporting period.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Stop-flag poll granularity inside the reporting sleep, so shutdown
/// is not delayed by a full interval.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Throughput in Mbps for a running sample count.
pub fn throughput_mbps(samples: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    (samples as f64 * BYTES_PER_SAMPLE as f64 * 8.0) / (elapsed_secs * 1e6)
}

/// One periodic report line.
pub fn report_line(tx_samples: u64, rx_samples: u64, elapsed_secs: f64) -> String {
    format!(
        "TX: {:.2} Mbps | RX: {:.2} Mbps | Samples: {} | Time: {}s",
        throughput_mbps(tx_samples, elapsed_secs),
        throughput_mbps(rx_samples, elapsed_secs),
        rx_samples,
        elapsed_secs as u64,
    )
}

/// Periodic throughput reporter. Runs on its own thread; emits one
/// line per elapsed second until `stop_all` is observed.
pub struct StatsReporter {
    state: Arc<TestState>,
}

impl StatsReporter {
    pub fn new(state: Arc<TestState>) -> Self {
        Self { state }
    }

    pub fn run(self) {
        let start = Instant::now();
        loop {
            let mut slept = Duration::ZERO;
            while slept < REPORT_INTERVAL {
                if self.state.stop_all() {
                    return;
                }
                std::thread::sleep(POLL_INTERVAL);
                slept += POLL_INTERVAL;
            }
            if self.state.stop_all() {
                return;
            }

            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "{}",
                report_line(self.state.tx_samples(), self.state.rx_samples(), elapsed)
            );
        }
    }
}
