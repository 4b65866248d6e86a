// Copyright 2025-2026 CEMAXECUTER LLC

pub mod sim;
#[cfg(feature = "usrp")]
pub mod usrp;

use std::fmt;

use num_complex::Complex32;

/// One I/Q sample: interleaved 32-bit float in-phase and quadrature pair.
pub type Sample = Complex32;

/// Bytes per complex sample in host format (fc32: 4-byte I + 4-byte Q).
pub const BYTES_PER_SAMPLE: usize = std::mem::size_of::<Sample>();

/// RF and clocking parameters applied to the front-end before any
/// streaming starts. Configuration failure is fatal to the run.
#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// Sample rate in samples/second, applied to both directions
    pub sample_rate: f64,
    /// Center frequency in Hz, applied to both directions
    pub center_freq: f64,
    pub tx_gain: f64,
    pub rx_gain: f64,
    /// Reference clock source, e.g. "internal"
    pub clock_source: String,
    /// Time source, e.g. "internal"
    pub time_source: String,
    /// Daughterboard/frontend mapping, e.g. "A:A"
    pub subdev: String,
}

/// Buffering hints for a transmit stream.
#[derive(Debug, Clone, Copy)]
pub struct TxStreamArgs {
    /// Samples per packet
    pub spp: usize,
    /// Transport send frame count
    pub num_send_frames: usize,
}

/// Buffering hints for a receive stream.
#[derive(Debug, Clone, Copy)]
pub struct RxStreamArgs {
    /// Transport receive buffer size in bytes
    pub recv_buff_size: usize,
}

/// Burst demarcation flags attached to each transmit call. Some
/// front-ends need these to manage internal buffering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstMeta {
    pub start_of_burst: bool,
    pub end_of_burst: bool,
}

impl BurstMeta {
    /// First submission of a transmission burst
    pub fn start() -> Self {
        Self { start_of_burst: true, end_of_burst: false }
    }

    /// Mid-burst submission
    pub fn mid() -> Self {
        Self::default()
    }

    /// Terminating zero-length marker
    pub fn end() -> Self {
        Self { start_of_burst: false, end_of_burst: true }
    }
}

/// Commands understood by a receive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCommand {
    /// Keep delivering samples until explicitly stopped.
    /// `now` requests an immediate start instead of a timed one.
    StartContinuous { now: bool },
    StopContinuous,
}

/// Per-call receive error code, following UHD's RX metadata taxonomy.
/// Anything other than `None` means the call's samples are suspect;
/// the harness treats all of these as non-fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RxError {
    #[default]
    None,
    /// No packet arrived within the stream's internal timeout
    Timeout,
    /// Stream command arrived after its execution time
    LateCommand,
    /// Expected another packet in a chain that never came
    BrokenChain,
    /// Host could not keep up, samples dropped in the device
    Overflow,
    /// Multi-channel alignment failure
    Alignment,
    /// Packet failed to parse
    BadPacket,
    /// Unmapped driver-specific code
    Other(i32),
}

impl RxError {
    /// Map a raw UHD RX metadata error code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0x0 => RxError::None,
            0x1 => RxError::Timeout,
            0x2 => RxError::LateCommand,
            0x4 => RxError::BrokenChain,
            0x8 => RxError::Overflow,
            0xc => RxError::Alignment,
            0xf => RxError::BadPacket,
            other => RxError::Other(other),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, RxError::None)
    }
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RxError::None => write!(f, "none"),
            RxError::Timeout => write!(f, "timeout"),
            RxError::LateCommand => write!(f, "late command"),
            RxError::BrokenChain => write!(f, "broken chain"),
            RxError::Overflow => write!(f, "overflow"),
            RxError::Alignment => write!(f, "alignment"),
            RxError::BadPacket => write!(f, "bad packet"),
            RxError::Other(code) => write!(f, "error code {}", code),
        }
    }
}

/// Continuous transmit stream handle.
pub trait TxStream: Send {
    /// Submit samples for transmission. Returns the number of samples
    /// the front-end accepted within `timeout_secs`; fewer than
    /// submitted indicates an underflow. A zero-length buffer with
    /// `end_of_burst` set closes the transmission cleanly.
    fn send(&mut self, buf: &[Sample], meta: &BurstMeta, timeout_secs: f64)
        -> Result<usize, String>;
}

/// Continuous receive stream handle.
pub trait RxStream: Send {
    fn issue_command(&mut self, cmd: StreamCommand) -> Result<(), String>;

    /// Receive into `buf`, up to its length. Returns the sample count
    /// and the error code for this call; errors are per-call and do
    /// not poison the stream.
    fn recv(&mut self, buf: &mut [Sample]) -> (usize, RxError);
}

/// A full-duplex radio front-end: configure once, then open one
/// stream per direction.
pub trait FrontEnd {
    fn configure(&mut self, cfg: &RadioConfig) -> Result<(), String>;
    fn tx_stream(&mut self, args: &TxStreamArgs) -> Result<Box<dyn TxStream>, String>;
    fn rx_stream(&mut self, args: &RxStreamArgs) -> Result<Box<dyn RxStream>, String>;
}
