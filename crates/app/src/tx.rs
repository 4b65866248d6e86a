// Copyright 2025-2026 CEMAXECUTER LLC

use std::sync::Arc;

use fdx_sdr::{BurstMeta, TxStream};

use crate::buffers::TxBufferPool;
use crate::state::TestState;

/// Continuous transmit loop. Cycles the pre-generated buffer pool in
/// round-robin order until `stop_tx`, then closes the burst with a
/// single zero-length end-of-burst marker.
pub struct TxDriver {
    stream: Box<dyn TxStream>,
    pool: Arc<TxBufferPool>,
    state: Arc<TestState>,
    timeout_secs: f64,
}

impl TxDriver {
    pub fn new(
        stream: Box<dyn TxStream>,
        pool: Arc<TxBufferPool>,
        state: Arc<TestState>,
        timeout_secs: f64,
    ) -> Self {
        Self { stream, pool, state, timeout_secs }
    }

    pub fn run(mut self) {
        let mut meta = BurstMeta::start();
        let mut idx = 0;

        while !self.state.stop_tx() {
            let buf = self.pool.get(idx);
            let sent = match self.stream.send(buf, &meta, self.timeout_secs) {
                Ok(n) => n,
                Err(e) => {
                    log::error!("tx send failed: {}", e);
                    break;
                }
            };

            // Short accept: the data source could not keep the device
            // fed within the timeout. Non-fatal, move on to the next
            // buffer with no retry.
            if sent < buf.len() {
                self.state.note_tx_underflow();
                log::warn!("tx underflow: sent {}/{}", sent, buf.len());
            }

            self.state.add_tx_samples(sent as u64);
            idx = self.pool.next_index(idx);
            meta = BurstMeta::mid();
        }

        // Tell the front-end the transmission is over so it can drain
        if let Err(e) = self.stream.send(&[], &BurstMeta::end(), self.timeout_secs) {
            log::warn!("tx end-of-burst send failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdx_sdr::Sample;
    use std::sync::Mutex;

    /// Records every send; trips `stop_tx` after a fixed number of
    /// data sends so the loop length is deterministic.
    struct ScriptedTxStream {
        state: Arc<TestState>,
        sent: Arc<Mutex<Vec<(Vec<Sample>, BurstMeta)>>>,
        stop_after: usize,
        /// Accepted count per data send; shorter than submitted
        /// simulates an underflow
        accept: Option<usize>,
        data_sends: usize,
    }

    impl TxStream for ScriptedTxStream {
        fn send(
            &mut self,
            buf: &[Sample],
            meta: &BurstMeta,
            _timeout_secs: f64,
        ) -> Result<usize, String> {
            self.sent
                .lock()
                .unwrap()
                .push((buf.to_vec(), *meta));
            if buf.is_empty() {
                return Ok(0);
            }
            self.data_sends += 1;
            if self.data_sends >= self.stop_after {
                self.state.request_stop_tx();
            }
            Ok(self.accept.unwrap_or(buf.len()).min(buf.len()))
        }
    }

    fn run_driver(pool_size: usize, stop_after: usize, accept: Option<usize>)
        -> (Arc<TestState>, Arc<TxBufferPool>, Vec<(Vec<Sample>, BurstMeta)>)
    {
        let state = TestState::new();
        let pool = Arc::new(TxBufferPool::generate(pool_size, 32));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = ScriptedTxStream {
            state: state.clone(),
            sent: sent.clone(),
            stop_after,
            accept,
            data_sends: 0,
        };
        TxDriver::new(Box::new(stream), pool.clone(), state.clone(), 0.1).run();
        let sent = sent.lock().unwrap().clone();
        (state, pool, sent)
    }

    #[test]
    fn test_round_robin_order_and_burst_flags() {
        let (_, pool, sent) = run_driver(3, 7, None);

        // 7 data sends plus the terminating marker
        assert_eq!(sent.len(), 8);
        for (i, (buf, meta)) in sent[..7].iter().enumerate() {
            assert_eq!(
                buf.as_slice(),
                pool.get(i % 3),
                "send {} did not follow round-robin order",
                i
            );
            assert_eq!(meta.start_of_burst, i == 0, "only the first send starts the burst");
            assert!(!meta.end_of_burst);
        }
    }

    #[test]
    fn test_exactly_one_end_of_burst_marker() {
        let (_, _, sent) = run_driver(2, 5, None);
        let eobs: Vec<_> = sent.iter().filter(|(_, m)| m.end_of_burst).collect();
        assert_eq!(eobs.len(), 1);
        let (buf, _) = eobs[0];
        assert!(buf.is_empty(), "end-of-burst marker must carry no samples");
        // And it is the last thing sent
        assert!(sent.last().expect("no sends").1.end_of_burst);
    }

    #[test]
    fn test_underflow_accounting() {
        // Every send accepts 20 of 32 samples
        let (state, _, sent) = run_driver(4, 6, Some(20));
        assert_eq!(state.tx_underflows(), 6, "one underflow per short send");
        assert_eq!(state.tx_samples(), 6 * 20, "counter uses accepted counts only");
        assert_eq!(sent.len(), 7);
    }

    #[test]
    fn test_full_accepts_are_not_underflows() {
        let (state, _, _) = run_driver(4, 6, None);
        assert_eq!(state.tx_underflows(), 0);
        assert_eq!(state.tx_samples(), 6 * 32);
    }
}
