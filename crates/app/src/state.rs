// Copyright 2025-2026 CEMAXECUTER LLC

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared run state, passed by `Arc` to every thread at spawn time.
///
/// Lock-free on purpose: each counter has exactly one writer (the
/// loop that owns it) and any number of readers, so relaxed atomics
/// are enough. The stop flags transition false to true exactly once
/// and are never reset.
#[derive(Default)]
pub struct TestState {
    total_tx_samples: AtomicU64,
    total_rx_samples: AtomicU64,
    tx_underflows: AtomicU64,
    rx_errors: AtomicU64,
    stop_all: AtomicBool,
    stop_tx: AtomicBool,
}

impl TestState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Called by the TX loop only
    pub fn add_tx_samples(&self, n: u64) {
        self.total_tx_samples.fetch_add(n, Ordering::Relaxed);
    }

    /// Called by the RX loop only
    pub fn add_rx_samples(&self, n: u64) {
        self.total_rx_samples.fetch_add(n, Ordering::Relaxed);
    }

    pub fn note_tx_underflow(&self) {
        self.tx_underflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_rx_error(&self) {
        self.rx_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tx_samples(&self) -> u64 {
        self.total_tx_samples.load(Ordering::Relaxed)
    }

    pub fn rx_samples(&self) -> u64 {
        self.total_rx_samples.load(Ordering::Relaxed)
    }

    pub fn tx_underflows(&self) -> u64 {
        self.tx_underflows.load(Ordering::Relaxed)
    }

    pub fn rx_errors(&self) -> u64 {
        self.rx_errors.load(Ordering::Relaxed)
    }

    /// Halts the reporter and the receive loop
    pub fn request_stop_all(&self) {
        self.stop_all.store(true, Ordering::SeqCst);
    }

    /// Halts the transmit loop
    pub fn request_stop_tx(&self) {
        self.stop_tx.store(true, Ordering::SeqCst);
    }

    pub fn stop_all(&self) -> bool {
        self.stop_all.load(Ordering::SeqCst)
    }

    pub fn stop_tx(&self) -> bool {
        self.stop_tx.load(Ordering::SeqCst)
    }
}
