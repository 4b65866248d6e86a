// Copyright 2025-2026 CEMAXECUTER LLC

//! Software loopback front-end: transmit blocks travel through a
//! bounded channel to the receive side. No hardware required, so this
//! backend carries the harness tests and the no-feature build of the
//! binary. Fault injection covers the two non-fatal error paths
//! (short accepts and RX error codes).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::{
    BurstMeta, FrontEnd, RadioConfig, RxError, RxStream, RxStreamArgs, Sample, StreamCommand,
    TxStream, TxStreamArgs,
};

/// Loopback channel depth in blocks.
const LINK_DEPTH: usize = 64;

/// How long the RX side waits for a block before reporting a timeout.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Fault injection plan. Zero disables an injection.
#[derive(Debug, Clone, Copy)]
pub struct FaultPlan {
    /// Accept only half of every nth data send (1-based count)
    pub short_accept_every: usize,
    /// Return `rx_error_code` from every nth recv (1-based count)
    pub rx_error_every: usize,
    /// Code reported by injected recv errors
    pub rx_error_code: RxError,
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self {
            short_accept_every: 0,
            rx_error_every: 0,
            rx_error_code: RxError::Overflow,
        }
    }
}

/// Everything the sim records during a run, for test inspection.
#[derive(Default)]
pub struct SimProbe {
    /// Burst metadata of every send, in order
    pub bursts: Mutex<Vec<BurstMeta>>,
    /// Sample count of every send, in order (submitted, not accepted)
    pub send_lens: Mutex<Vec<usize>>,
    /// Stream commands in arrival order
    pub commands: Mutex<Vec<StreamCommand>>,
    /// Total samples the TX side accepted
    pub accepted_samples: AtomicU64,
}

impl SimProbe {
    pub fn end_of_burst_count(&self) -> usize {
        self.bursts
            .lock()
            .expect("probe lock poisoned")
            .iter()
            .filter(|m| m.end_of_burst)
            .count()
    }

    pub fn commands(&self) -> Vec<StreamCommand> {
        self.commands.lock().expect("probe lock poisoned").clone()
    }

    pub fn bursts(&self) -> Vec<BurstMeta> {
        self.bursts.lock().expect("probe lock poisoned").clone()
    }

    pub fn accepted_samples(&self) -> u64 {
        self.accepted_samples.load(Ordering::Relaxed)
    }
}

/// Simulated full-duplex front-end.
pub struct SimFrontEnd {
    faults: FaultPlan,
    probe: Arc<SimProbe>,
    link_tx: Sender<Vec<Sample>>,
    link_rx: Receiver<Vec<Sample>>,
    configured: bool,
    fail_configure: bool,
}

impl SimFrontEnd {
    pub fn new() -> Self {
        Self::with_faults(FaultPlan::default())
    }

    pub fn with_faults(faults: FaultPlan) -> Self {
        let (link_tx, link_rx) = bounded(LINK_DEPTH);
        Self {
            faults,
            probe: Arc::new(SimProbe::default()),
            link_tx,
            link_rx,
            configured: false,
            fail_configure: false,
        }
    }

    /// Make `configure` fail, to exercise the fatal construction path.
    pub fn failing() -> Self {
        let mut fe = Self::new();
        fe.fail_configure = true;
        fe
    }

    pub fn probe(&self) -> Arc<SimProbe> {
        self.probe.clone()
    }
}

impl Default for SimFrontEnd {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontEnd for SimFrontEnd {
    fn configure(&mut self, cfg: &RadioConfig) -> Result<(), String> {
        if self.fail_configure {
            return Err(format!(
                "sim front-end: configure rejected (rate {} S/s)",
                cfg.sample_rate
            ));
        }
        log::info!(
            "sim front-end configured: {:.1} MHz, {:.3} MS/s",
            cfg.center_freq / 1e6,
            cfg.sample_rate / 1e6,
        );
        self.configured = true;
        Ok(())
    }

    fn tx_stream(&mut self, _args: &TxStreamArgs) -> Result<Box<dyn TxStream>, String> {
        if !self.configured {
            return Err("sim front-end: tx_stream before configure".to_string());
        }
        Ok(Box::new(SimTxStream {
            link: self.link_tx.clone(),
            probe: self.probe.clone(),
            short_accept_every: self.faults.short_accept_every,
            data_sends: 0,
        }))
    }

    fn rx_stream(&mut self, _args: &RxStreamArgs) -> Result<Box<dyn RxStream>, String> {
        if !self.configured {
            return Err("sim front-end: rx_stream before configure".to_string());
        }
        Ok(Box::new(SimRxStream {
            link: self.link_rx.clone(),
            probe: self.probe.clone(),
            rx_error_every: self.faults.rx_error_every,
            rx_error_code: self.faults.rx_error_code,
            recvs: 0,
            streaming: false,
        }))
    }
}

struct SimTxStream {
    link: Sender<Vec<Sample>>,
    probe: Arc<SimProbe>,
    short_accept_every: usize,
    data_sends: usize,
}

impl TxStream for SimTxStream {
    fn send(
        &mut self,
        buf: &[Sample],
        meta: &BurstMeta,
        timeout_secs: f64,
    ) -> Result<usize, String> {
        self.probe
            .bursts
            .lock()
            .map_err(|_| "probe lock poisoned".to_string())?
            .push(*meta);
        self.probe
            .send_lens
            .lock()
            .map_err(|_| "probe lock poisoned".to_string())?
            .push(buf.len());

        // Zero-length end-of-burst marker moves no samples
        if buf.is_empty() {
            return Ok(0);
        }

        self.data_sends += 1;
        let accepted = if self.short_accept_every > 0
            && self.data_sends % self.short_accept_every == 0
        {
            buf.len() / 2
        } else {
            buf.len()
        };

        let timeout = Duration::from_secs_f64(timeout_secs);
        match self.link.send_timeout(buf[..accepted].to_vec(), timeout) {
            Ok(()) => {
                self.probe
                    .accepted_samples
                    .fetch_add(accepted as u64, Ordering::Relaxed);
                Ok(accepted)
            }
            // Receiver not keeping up within the timeout: the device
            // accepted nothing this call
            Err(_) => Ok(0),
        }
    }
}

struct SimRxStream {
    link: Receiver<Vec<Sample>>,
    probe: Arc<SimProbe>,
    rx_error_every: usize,
    rx_error_code: RxError,
    recvs: usize,
    streaming: bool,
}

impl RxStream for SimRxStream {
    fn issue_command(&mut self, cmd: StreamCommand) -> Result<(), String> {
        self.probe
            .commands
            .lock()
            .map_err(|_| "probe lock poisoned".to_string())?
            .push(cmd);
        self.streaming = matches!(cmd, StreamCommand::StartContinuous { .. });
        Ok(())
    }

    fn recv(&mut self, buf: &mut [Sample]) -> (usize, RxError) {
        if !self.streaming {
            return (0, RxError::LateCommand);
        }

        self.recvs += 1;
        if self.rx_error_every > 0 && self.recvs % self.rx_error_every == 0 {
            return (0, self.rx_error_code);
        }

        match self.link.recv_timeout(RECV_TIMEOUT) {
            Ok(block) => {
                let n = block.len().min(buf.len());
                buf[..n].copy_from_slice(&block[..n]);
                (n, RxError::None)
            }
            Err(RecvTimeoutError::Timeout) => (0, RxError::Timeout),
            Err(RecvTimeoutError::Disconnected) => (0, RxError::BrokenChain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    fn configured() -> SimFrontEnd {
        let mut fe = SimFrontEnd::new();
        fe.configure(&RadioConfig {
            sample_rate: 1e6,
            center_freq: 1e9,
            tx_gain: 15.0,
            rx_gain: 20.0,
            clock_source: "internal".to_string(),
            time_source: "internal".to_string(),
            subdev: "A:A".to_string(),
        })
        .expect("sim configure should not fail");
        fe
    }

    fn block(len: usize) -> Vec<Sample> {
        vec![Complex32::new(1.0, -1.0); len]
    }

    #[test]
    fn test_loopback_carries_samples() {
        let mut fe = configured();
        let mut tx = fe.tx_stream(&TxStreamArgs { spp: 64, num_send_frames: 4 }).unwrap();
        let mut rx = fe.rx_stream(&RxStreamArgs { recv_buff_size: 1 << 20 }).unwrap();

        rx.issue_command(StreamCommand::StartContinuous { now: true }).unwrap();
        let sent = tx.send(&block(64), &BurstMeta::start(), 0.1).unwrap();
        assert_eq!(sent, 64);

        let mut buf = vec![Complex32::new(0.0, 0.0); 256];
        let (n, err) = rx.recv(&mut buf);
        assert_eq!(err, RxError::None);
        assert_eq!(n, 64);
        assert_eq!(buf[0], Complex32::new(1.0, -1.0));
    }

    #[test]
    fn test_recv_before_start_is_an_error() {
        let mut fe = configured();
        let mut rx = fe.rx_stream(&RxStreamArgs { recv_buff_size: 1 << 20 }).unwrap();
        let mut buf = vec![Complex32::new(0.0, 0.0); 16];
        let (n, err) = rx.recv(&mut buf);
        assert_eq!(n, 0);
        assert_eq!(err, RxError::LateCommand);
    }

    #[test]
    fn test_short_accept_injection() {
        let faults = FaultPlan { short_accept_every: 2, ..Default::default() };
        let mut fe = SimFrontEnd::with_faults(faults);
        fe.configure(&RadioConfig {
            sample_rate: 1e6,
            center_freq: 1e9,
            tx_gain: 0.0,
            rx_gain: 0.0,
            clock_source: "internal".to_string(),
            time_source: "internal".to_string(),
            subdev: "A:A".to_string(),
        })
        .unwrap();
        let mut tx = fe.tx_stream(&TxStreamArgs { spp: 8, num_send_frames: 4 }).unwrap();

        let full = tx.send(&block(8), &BurstMeta::start(), 0.1).unwrap();
        let short = tx.send(&block(8), &BurstMeta::mid(), 0.1).unwrap();
        assert_eq!(full, 8, "odd sends should be accepted in full");
        assert_eq!(short, 4, "every 2nd send should be cut in half");
    }

    #[test]
    fn test_probe_records_bursts_and_commands() {
        let mut fe = configured();
        let probe = fe.probe();
        let mut tx = fe.tx_stream(&TxStreamArgs { spp: 8, num_send_frames: 4 }).unwrap();
        let mut rx = fe.rx_stream(&RxStreamArgs { recv_buff_size: 1 << 20 }).unwrap();

        rx.issue_command(StreamCommand::StartContinuous { now: true }).unwrap();
        tx.send(&block(8), &BurstMeta::start(), 0.1).unwrap();
        tx.send(&[], &BurstMeta::end(), 0.1).unwrap();
        rx.issue_command(StreamCommand::StopContinuous).unwrap();

        assert_eq!(probe.end_of_burst_count(), 1);
        assert_eq!(
            probe.commands(),
            vec![
                StreamCommand::StartContinuous { now: true },
                StreamCommand::StopContinuous,
            ]
        );
        assert_eq!(probe.accepted_samples(), 8);
    }

    #[test]
    fn test_failing_configure() {
        let mut fe = SimFrontEnd::failing();
        let err = fe
            .configure(&RadioConfig {
                sample_rate: 1e6,
                center_freq: 1e9,
                tx_gain: 0.0,
                rx_gain: 0.0,
                clock_source: "internal".to_string(),
                time_source: "internal".to_string(),
                subdev: "A:A".to_string(),
            })
            .unwrap_err();
        assert!(err.contains("configure"), "unexpected error: {}", err);
    }
}
