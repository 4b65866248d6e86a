// Copyright 2025-2026 CEMAXECUTER LLC

//! End-to-end runs of the throughput harness against the simulated
//! loopback front-end, scaled down in time.

use std::time::{Duration, Instant};

use fdx_app::harness::{self, TestParams};
use fdx_sdr::sim::{FaultPlan, SimFrontEnd};
use fdx_sdr::{RadioConfig, RxError, StreamCommand};

fn test_params(run_time: Duration) -> TestParams {
    TestParams {
        radio: RadioConfig {
            sample_rate: 1e6,
            center_freq: 1e9,
            tx_gain: 15.0,
            rx_gain: 20.0,
            clock_source: "internal".to_string(),
            time_source: "internal".to_string(),
            subdev: "A:A".to_string(),
        },
        samps_per_buffer: 256,
        num_tx_buffers: 4,
        run_time,
        tx_timeout_secs: 0.1,
        num_send_frames: 32,
        recv_buff_size: 1 << 20,
    }
}

#[test]
fn nominal_run_moves_samples_both_ways() {
    let mut fe = SimFrontEnd::new();
    let probe = fe.probe();
    let params = test_params(Duration::from_millis(400));

    let start = Instant::now();
    let report = harness::run(&mut fe, &params).expect("run failed");
    let elapsed = start.elapsed();

    assert!(report.rx_samples > 0, "no samples received");
    assert!(report.tx_samples > 0, "no samples transmitted");
    assert!(
        report.tx_samples >= report.rx_samples,
        "loopback cannot receive more than was sent ({} rx vs {} tx)",
        report.rx_samples,
        report.tx_samples
    );
    // The loopback drains continuously while the run is live, so the
    // only send that may come up short is the one in flight when the
    // receive side stops.
    assert!(
        report.tx_underflows <= 2,
        "nominal run underflowed {} times",
        report.tx_underflows
    );

    // The receive loop must terminate close to the configured run time
    assert!(
        elapsed >= params.run_time,
        "run returned early after {:?}",
        elapsed
    );
    assert!(
        elapsed < params.run_time + Duration::from_secs(1),
        "shutdown took too long: {:?}",
        elapsed
    );

    // Exactly one start and one stop, in that order
    assert_eq!(
        probe.commands(),
        vec![
            StreamCommand::StartContinuous { now: true },
            StreamCommand::StopContinuous,
        ]
    );

    // Exactly one zero-length end-of-burst marker, sent last
    assert_eq!(probe.end_of_burst_count(), 1);
    let bursts = probe.bursts();
    assert!(bursts.last().expect("no sends recorded").end_of_burst);
    assert!(bursts.first().expect("no sends recorded").start_of_burst);
}

#[test]
fn rx_errors_do_not_halt_the_run() {
    // Every second receive call reports an overflow
    let mut fe = SimFrontEnd::with_faults(FaultPlan {
        rx_error_every: 2,
        rx_error_code: RxError::Overflow,
        ..Default::default()
    });
    let params = test_params(Duration::from_millis(300));

    let report = harness::run(&mut fe, &params).expect("run must survive rx errors");

    assert!(report.rx_errors > 0, "injected errors were not observed");
    assert!(
        report.rx_samples > 0,
        "error-free iterations must still be counted"
    );
    // Errored iterations contribute nothing, so the total is a whole
    // number of full blocks
    assert_eq!(
        report.rx_samples % params.samps_per_buffer as u64,
        0,
        "errored iterations corrupted the sample count"
    );
}

#[test]
fn short_accepts_count_accepted_samples_only() {
    // Every data send is cut in half
    let mut fe = SimFrontEnd::with_faults(FaultPlan {
        short_accept_every: 1,
        ..Default::default()
    });
    let probe = fe.probe();
    let params = test_params(Duration::from_millis(200));

    let report = harness::run(&mut fe, &params).expect("run must survive underflows");

    assert!(report.tx_underflows > 0, "injected short accepts were not observed");
    assert_eq!(
        report.tx_samples,
        probe.accepted_samples(),
        "tx counter must track accepted samples, not submitted ones"
    );

    // One underflow notification per short data send
    let data_sends = probe
        .bursts()
        .iter()
        .filter(|m| !m.end_of_burst)
        .count() as u64;
    assert_eq!(
        report.tx_underflows, data_sends,
        "expected exactly one underflow per short send"
    );
}

#[test]
fn configure_failure_is_fatal_before_streaming() {
    let mut fe = SimFrontEnd::failing();
    let probe = fe.probe();
    let params = test_params(Duration::from_millis(100));

    let err = harness::run(&mut fe, &params).unwrap_err();
    assert!(err.contains("configure"), "unexpected error: {}", err);
    assert!(
        probe.bursts().is_empty() && probe.commands().is_empty(),
        "no streaming may happen after a configuration failure"
    );
}
