// Copyright 2025-2026 CEMAXECUTER LLC

pub mod buffers;
pub mod harness;
pub mod rx;
pub mod shutdown;
pub mod state;
pub mod stats;
pub mod tx;
