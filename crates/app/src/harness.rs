// Copyright 2025-2026 CEMAXECUTER LLC

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fdx_sdr::{FrontEnd, RadioConfig, RxStreamArgs, TxStreamArgs};

use crate::buffers::TxBufferPool;
use crate::rx::RxCollector;
use crate::shutdown::ShutdownCoordinator;
use crate::state::TestState;
use crate::stats::StatsReporter;
use crate::tx::TxDriver;

/// Everything a single run needs. `main` fills this from fixed
/// constants; tests shrink the durations.
#[derive(Debug, Clone)]
pub struct TestParams {
    pub radio: RadioConfig,
    pub samps_per_buffer: usize,
    pub num_tx_buffers: usize,
    pub run_time: Duration,
    pub tx_timeout_secs: f64,
    pub num_send_frames: usize,
    pub recv_buff_size: usize,
}

/// Final counters of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub tx_samples: u64,
    pub rx_samples: u64,
    pub tx_underflows: u64,
    pub rx_errors: u64,
}

/// Run the full-duplex throughput test: configure the front-end, open
/// both streams, then run the transmit and stats loops on their own
/// threads while this thread collects the receive stream, and finally
/// tear everything down in order.
///
/// Configuration and stream-creation failures are fatal and surface
/// as `Err` before any streaming starts.
pub fn run(front_end: &mut dyn FrontEnd, params: &TestParams) -> Result<RunReport, String> {
    front_end.configure(&params.radio)?;

    let tx_stream = front_end.tx_stream(&TxStreamArgs {
        spp: params.samps_per_buffer,
        num_send_frames: params.num_send_frames,
    })?;
    let mut rx_stream = front_end.rx_stream(&RxStreamArgs {
        recv_buff_size: params.recv_buff_size,
    })?;

    let pool = Arc::new(TxBufferPool::generate(
        params.num_tx_buffers,
        params.samps_per_buffer,
    ));
    let state = TestState::new();

    log::info!(
        "starting run: {} buffers x {} samples, {:?}",
        params.num_tx_buffers,
        params.samps_per_buffer,
        params.run_time,
    );

    let reporter = StatsReporter::new(state.clone());
    let stats_thread = thread::spawn(move || reporter.run());

    let driver = TxDriver::new(tx_stream, pool, state.clone(), params.tx_timeout_secs);
    let tx_thread = thread::spawn(move || driver.run());

    let mut collector = RxCollector::new(state.clone(), params.samps_per_buffer);
    let rx_result = collector.run(rx_stream.as_mut(), params.run_time);

    // Tear down even if the receive side failed to start
    let coordinator = ShutdownCoordinator::new(tx_thread, stats_thread);
    let rx_samples = coordinator.finish(&state, rx_stream.as_mut())?;
    rx_result?;

    Ok(RunReport {
        tx_samples: state.tx_samples(),
        rx_samples,
        tx_underflows: state.tx_underflows(),
        rx_errors: state.rx_errors(),
    })
}
