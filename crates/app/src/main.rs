// Copyright 2025-2026 CEMAXECUTER LLC

use std::time::Duration;

use fdx_app::harness::{self, TestParams};
use fdx_sdr::RadioConfig;

// Fixed test parameters; this tool exposes no command-line surface.
const CENTER_FREQ: f64 = 1e9; // 1 GHz
const SAMPLE_RATE: f64 = 1e6; // 1 MS/s
const TX_GAIN: f64 = 15.0;
const RX_GAIN: f64 = 20.0;
const SAMPS_PER_BUFFER: usize = 4096;
const RUN_TIME: Duration = Duration::from_secs(10);
const NUM_TX_BUFFERS: usize = 8;
const TX_TIMEOUT_SECS: f64 = 0.1;
const NUM_SEND_FRAMES: usize = 32;
const RECV_BUFF_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

fn params() -> TestParams {
    TestParams {
        radio: RadioConfig {
            sample_rate: SAMPLE_RATE,
            center_freq: CENTER_FREQ,
            tx_gain: TX_GAIN,
            rx_gain: RX_GAIN,
            clock_source: "internal".to_string(),
            time_source: "internal".to_string(),
            subdev: "A:A".to_string(),
        },
        samps_per_buffer: SAMPS_PER_BUFFER,
        num_tx_buffers: NUM_TX_BUFFERS,
        run_time: RUN_TIME,
        tx_timeout_secs: TX_TIMEOUT_SECS,
        num_send_frames: NUM_SEND_FRAMES,
        recv_buff_size: RECV_BUFF_SIZE,
    }
}

#[cfg(feature = "usrp")]
fn open_front_end() -> Result<Box<dyn fdx_sdr::FrontEnd>, String> {
    Ok(Box::new(fdx_sdr::usrp::UsrpFrontEnd::open("")?))
}

#[cfg(not(feature = "usrp"))]
fn open_front_end() -> Result<Box<dyn fdx_sdr::FrontEnd>, String> {
    log::info!("usrp feature disabled, using the simulated loopback front-end");
    Ok(Box::new(fdx_sdr::sim::SimFrontEnd::new()))
}

fn main() {
    env_logger::init();

    let mut front_end = match open_front_end() {
        Ok(fe) => fe,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    match harness::run(front_end.as_mut(), &params()) {
        Ok(report) => {
            if report.tx_underflows > 0 || report.rx_errors > 0 {
                log::warn!(
                    "run finished with {} tx underflows, {} rx errors",
                    report.tx_underflows,
                    report.rx_errors,
                );
            }
            println!("\nTest completed. Final RX samples: {}", report.rx_samples);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
