// Copyright 2025-2026 CEMAXECUTER LLC

use std::thread::JoinHandle;

use fdx_sdr::{RxStream, StreamCommand};

use crate::state::TestState;

/// Owns the worker thread handles and tears the run down in a fixed
/// order: stop flags, RX stream stop, TX join, stats join. Joining
/// the TX handle proves the end-of-burst marker went out, because the
/// TX thread sends it before returning.
pub struct ShutdownCoordinator {
    tx_thread: JoinHandle<()>,
    stats_thread: JoinHandle<()>,
}

impl ShutdownCoordinator {
    pub fn new(tx_thread: JoinHandle<()>, stats_thread: JoinHandle<()>) -> Self {
        Self { tx_thread, stats_thread }
    }

    /// Returns the final accumulated RX sample count.
    pub fn finish(
        self,
        state: &TestState,
        rx_stream: &mut dyn RxStream,
    ) -> Result<u64, String> {
        state.request_stop_all();
        state.request_stop_tx();

        // Receive must stop before any thread is joined
        if let Err(e) = rx_stream.issue_command(StreamCommand::StopContinuous) {
            log::warn!("rx stop command failed: {}", e);
        }

        self.tx_thread
            .join()
            .map_err(|_| "tx thread panicked".to_string())?;
        self.stats_thread
            .join()
            .map_err(|_| "stats thread panicked".to_string())?;

        Ok(state.rx_samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use fdx_sdr::{RxError, Sample};

    #[derive(Default)]
    struct CommandLog {
        commands: Vec<StreamCommand>,
    }

    impl RxStream for CommandLog {
        fn issue_command(&mut self, cmd: StreamCommand) -> Result<(), String> {
            self.commands.push(cmd);
            Ok(())
        }

        fn recv(&mut self, _buf: &mut [Sample]) -> (usize, RxError) {
            (0, RxError::Timeout)
        }
    }

    #[test]
    fn test_finish_sets_flags_and_joins_in_order() {
        let state = TestState::new();
        state.add_rx_samples(777);

        // Workers that exit once their flag is raised
        let s = Arc::clone(&state);
        let tx_thread = std::thread::spawn(move || {
            while !s.stop_tx() {
                std::thread::sleep(Duration::from_millis(5));
            }
        });
        let s = Arc::clone(&state);
        let stats_thread = std::thread::spawn(move || {
            while !s.stop_all() {
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        let mut rx = CommandLog::default();
        let final_count = ShutdownCoordinator::new(tx_thread, stats_thread)
            .finish(&state, &mut rx)
            .expect("shutdown failed");

        assert_eq!(final_count, 777);
        assert!(state.stop_all());
        assert!(state.stop_tx());
        assert_eq!(rx.commands, vec![StreamCommand::StopContinuous]);
    }

    #[test]
    fn test_panicked_worker_surfaces_as_error() {
        let state = TestState::new();
        let tx_thread = std::thread::spawn(|| panic!("boom"));
        let stats_thread = std::thread::spawn(|| ());

        let mut rx = CommandLog::default();
        let err = ShutdownCoordinator::new(tx_thread, stats_thread)
            .finish(&state, &mut rx)
            .unwrap_err();
        assert!(err.contains("tx thread"), "unexpected error: {}", err);
    }
}
