// Copyright 2025-2026 CEMAXECUTER LLC

use std::ffi::CString;
use std::os::raw::{c_char, c_double, c_int, c_void};
use std::ptr;

use crate::{
    BurstMeta, FrontEnd, RadioConfig, RxError, RxStream, RxStreamArgs, Sample, StreamCommand,
    TxStream, TxStreamArgs,
};

// UHD C API FFI bindings (manual, minimal)

type UhdError = c_int;
const UHD_ERROR_NONE: UhdError = 0;

// Opaque handle types
type UhdUsrpHandle = *mut c_void;
type UhdTxStreamerHandle = *mut c_void;
type UhdRxStreamerHandle = *mut c_void;
type UhdTxMetadataHandle = *mut c_void;
type UhdRxMetadataHandle = *mut c_void;
type UhdSubdevSpecHandle = *mut c_void;

// Tune request policy
const UHD_TUNE_REQUEST_POLICY_AUTO: c_int = 65;

// Stream modes
const UHD_STREAM_MODE_START_CONTINUOUS: c_int = 97;
const UHD_STREAM_MODE_STOP_CONTINUOUS: c_int = 111;

#[repr(C)]
struct UhdTuneRequest {
    target_freq: c_double,
    rf_freq_policy: c_int,
    rf_freq: c_double,
    dsp_freq_policy: c_int,
    dsp_freq: c_double,
    args: *mut c_char,
}

#[repr(C)]
struct UhdTuneResult {
    clipped_rf_freq: c_double,
    target_rf_freq: c_double,
    actual_rf_freq: c_double,
    target_dsp_freq: c_double,
    actual_dsp_freq: c_double,
}

#[repr(C)]
struct UhdStreamArgs {
    cpu_format: *mut c_char,
    otw_format: *mut c_char,
    args: *mut c_char,
    channel_list: *mut usize,
    n_channels: c_int,
}

#[repr(C)]
struct UhdStreamCmd {
    stream_mode: c_int,
    num_samps: usize,
    stream_now: bool,
    time_spec_full_secs: i64,
    time_spec_frac_secs: c_double,
}

extern "C" {
    // USRP
    fn uhd_usrp_make(h: *mut UhdUsrpHandle, args: *const c_char) -> UhdError;
    fn uhd_usrp_free(h: *mut UhdUsrpHandle) -> UhdError;
    fn uhd_usrp_set_rx_rate(h: UhdUsrpHandle, rate: c_double, chan: usize) -> UhdError;
    fn uhd_usrp_set_tx_rate(h: UhdUsrpHandle, rate: c_double, chan: usize) -> UhdError;
    fn uhd_usrp_set_rx_gain(
        h: UhdUsrpHandle,
        gain: c_double,
        chan: usize,
        gain_name: *const c_char,
    ) -> UhdError;
    fn uhd_usrp_set_tx_gain(
        h: UhdUsrpHandle,
        gain: c_double,
        chan: usize,
        gain_name: *const c_char,
    ) -> UhdError;
    fn uhd_usrp_set_rx_freq(
        h: UhdUsrpHandle,
        tune_request: *mut UhdTuneRequest,
        chan: usize,
        tune_result: *mut UhdTuneResult,
    ) -> UhdError;
    fn uhd_usrp_set_tx_freq(
        h: UhdUsrpHandle,
        tune_request: *mut UhdTuneRequest,
        chan: usize,
        tune_result: *mut UhdTuneResult,
    ) -> UhdError;
    fn uhd_usrp_set_clock_source(
        h: UhdUsrpHandle,
        source: *const c_char,
        mboard: usize,
    ) -> UhdError;
    fn uhd_usrp_set_time_source(
        h: UhdUsrpHandle,
        source: *const c_char,
        mboard: usize,
    ) -> UhdError;
    fn uhd_usrp_set_rx_subdev_spec(
        h: UhdUsrpHandle,
        subdev_spec: UhdSubdevSpecHandle,
        mboard: usize,
    ) -> UhdError;
    fn uhd_usrp_set_tx_subdev_spec(
        h: UhdUsrpHandle,
        subdev_spec: UhdSubdevSpecHandle,
        mboard: usize,
    ) -> UhdError;
    fn uhd_usrp_get_rx_stream(
        h: UhdUsrpHandle,
        stream_args: *mut UhdStreamArgs,
        h_out: UhdRxStreamerHandle,
    ) -> UhdError;
    fn uhd_usrp_get_tx_stream(
        h: UhdUsrpHandle,
        stream_args: *mut UhdStreamArgs,
        h_out: UhdTxStreamerHandle,
    ) -> UhdError;

    // Subdev spec
    fn uhd_subdev_spec_make(h: *mut UhdSubdevSpecHandle, markup: *const c_char) -> UhdError;
    fn uhd_subdev_spec_free(h: *mut UhdSubdevSpecHandle) -> UhdError;

    // TX Streamer
    fn uhd_tx_streamer_make(h: *mut UhdTxStreamerHandle) -> UhdError;
    fn uhd_tx_streamer_free(h: *mut UhdTxStreamerHandle) -> UhdError;
    fn uhd_tx_streamer_send(
        h: UhdTxStreamerHandle,
        buffs: *mut *const c_void,
        samps_per_buff: usize,
        md: *mut UhdTxMetadataHandle,
        timeout: c_double,
        items_sent: *mut usize,
    ) -> UhdError;

    // TX Metadata
    fn uhd_tx_metadata_make(
        handle: *mut UhdTxMetadataHandle,
        has_time_spec: bool,
        full_secs: i64,
        frac_secs: c_double,
        start_of_burst: bool,
        end_of_burst: bool,
    ) -> UhdError;
    fn uhd_tx_metadata_free(handle: *mut UhdTxMetadataHandle) -> UhdError;

    // RX Streamer
    fn uhd_rx_streamer_make(h: *mut UhdRxStreamerHandle) -> UhdError;
    fn uhd_rx_streamer_free(h: *mut UhdRxStreamerHandle) -> UhdError;
    fn uhd_rx_streamer_recv(
        h: UhdRxStreamerHandle,
        buffs: *mut *mut c_void,
        samps_per_buff: usize,
        md: *mut UhdRxMetadataHandle,
        timeout: c_double,
        one_packet: bool,
        items_recvd: *mut usize,
    ) -> UhdError;
    fn uhd_rx_streamer_issue_stream_cmd(
        h: UhdRxStreamerHandle,
        stream_cmd: *const UhdStreamCmd,
    ) -> UhdError;

    // RX Metadata
    fn uhd_rx_metadata_make(handle: *mut UhdRxMetadataHandle) -> UhdError;
    fn uhd_rx_metadata_free(handle: *mut UhdRxMetadataHandle) -> UhdError;
    fn uhd_rx_metadata_error_code(
        h: UhdRxMetadataHandle,
        error_code_out: *mut c_int,
    ) -> UhdError;
}

fn tune_request(freq_hz: f64) -> UhdTuneRequest {
    UhdTuneRequest {
        target_freq: freq_hz,
        rf_freq_policy: UHD_TUNE_REQUEST_POLICY_AUTO,
        rf_freq: 0.0,
        dsp_freq_policy: UHD_TUNE_REQUEST_POLICY_AUTO,
        dsp_freq: 0.0,
        args: ptr::null_mut(),
    }
}

fn empty_tune_result() -> UhdTuneResult {
    UhdTuneResult {
        clipped_rf_freq: 0.0,
        target_rf_freq: 0.0,
        actual_rf_freq: 0.0,
        target_dsp_freq: 0.0,
        actual_dsp_freq: 0.0,
    }
}

/// USRP front-end using the UHD C API. Full duplex: one TX streamer
/// and one RX streamer over the same device handle.
pub struct UsrpFrontEnd {
    usrp: UhdUsrpHandle,
}

impl UsrpFrontEnd {
    /// Open the first USRP matching `dev_args` (empty string for any).
    pub fn open(dev_args: &str) -> Result<Self, String> {
        let args =
            CString::new(dev_args).map_err(|e| format!("CString error: {}", e))?;
        let mut usrp: UhdUsrpHandle = ptr::null_mut();

        unsafe {
            log::info!("opening USRP (args='{}')", dev_args);
            let err = uhd_usrp_make(&mut usrp, args.as_ptr());
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_make failed: error {}", err));
            }
        }

        Ok(Self { usrp })
    }
}

impl FrontEnd for UsrpFrontEnd {
    fn configure(&mut self, cfg: &RadioConfig) -> Result<(), String> {
        let empty = CString::new("").map_err(|e| format!("CString error: {}", e))?;
        let subdev =
            CString::new(cfg.subdev.as_str()).map_err(|e| format!("CString error: {}", e))?;
        let clock = CString::new(cfg.clock_source.as_str())
            .map_err(|e| format!("CString error: {}", e))?;
        let time = CString::new(cfg.time_source.as_str())
            .map_err(|e| format!("CString error: {}", e))?;

        unsafe {
            // Frontend mapping first, it resets rates and gains
            let mut spec: UhdSubdevSpecHandle = ptr::null_mut();
            let err = uhd_subdev_spec_make(&mut spec, subdev.as_ptr());
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_subdev_spec_make('{}') failed: error {}", cfg.subdev, err));
            }
            let err = uhd_usrp_set_tx_subdev_spec(self.usrp, spec, 0);
            if err != UHD_ERROR_NONE {
                uhd_subdev_spec_free(&mut spec);
                return Err(format!("uhd_usrp_set_tx_subdev_spec failed: error {}", err));
            }
            let err = uhd_usrp_set_rx_subdev_spec(self.usrp, spec, 0);
            uhd_subdev_spec_free(&mut spec);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_rx_subdev_spec failed: error {}", err));
            }

            let err = uhd_usrp_set_tx_rate(self.usrp, cfg.sample_rate, 0);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_tx_rate failed: error {}", err));
            }
            let err = uhd_usrp_set_rx_rate(self.usrp, cfg.sample_rate, 0);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_rx_rate failed: error {}", err));
            }

            let mut req = tune_request(cfg.center_freq);
            let mut result = empty_tune_result();
            let err = uhd_usrp_set_tx_freq(self.usrp, &mut req, 0, &mut result);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_tx_freq failed: error {}", err));
            }
            log::info!("TX tuned: RF={:.3} MHz", result.actual_rf_freq / 1e6);

            let mut req = tune_request(cfg.center_freq);
            let mut result = empty_tune_result();
            let err = uhd_usrp_set_rx_freq(self.usrp, &mut req, 0, &mut result);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_rx_freq failed: error {}", err));
            }
            log::info!("RX tuned: RF={:.3} MHz", result.actual_rf_freq / 1e6);

            let err = uhd_usrp_set_tx_gain(self.usrp, cfg.tx_gain, 0, empty.as_ptr());
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_tx_gain failed: error {}", err));
            }
            let err = uhd_usrp_set_rx_gain(self.usrp, cfg.rx_gain, 0, empty.as_ptr());
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_rx_gain failed: error {}", err));
            }

            let err = uhd_usrp_set_clock_source(self.usrp, clock.as_ptr(), 0);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_clock_source('{}') failed: error {}", cfg.clock_source, err));
            }
            let err = uhd_usrp_set_time_source(self.usrp, time.as_ptr(), 0);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_usrp_set_time_source('{}') failed: error {}", cfg.time_source, err));
            }
        }

        log::info!(
            "USRP configured: {:.1} MHz, {:.3} MS/s, tx_gain={} dB, rx_gain={} dB, subdev={}",
            cfg.center_freq / 1e6,
            cfg.sample_rate / 1e6,
            cfg.tx_gain,
            cfg.rx_gain,
            cfg.subdev,
        );
        Ok(())
    }

    fn tx_stream(&mut self, args: &TxStreamArgs) -> Result<Box<dyn TxStream>, String> {
        // fc32 on the host, sc16 over the wire
        let cpu_fmt = CString::new("fc32").map_err(|e| format!("CString error: {}", e))?;
        let otw_fmt = CString::new("sc16").map_err(|e| format!("CString error: {}", e))?;
        let stream_args_str = CString::new(format!(
            "spp={},num_send_frames={}",
            args.spp, args.num_send_frames
        ))
        .map_err(|e| format!("CString error: {}", e))?;
        let mut channel: usize = 0;

        unsafe {
            let mut handle: UhdTxStreamerHandle = ptr::null_mut();
            let err = uhd_tx_streamer_make(&mut handle);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_tx_streamer_make failed: error {}", err));
            }

            let mut stream_args = UhdStreamArgs {
                cpu_format: cpu_fmt.as_ptr() as *mut c_char,
                otw_format: otw_fmt.as_ptr() as *mut c_char,
                args: stream_args_str.as_ptr() as *mut c_char,
                channel_list: &mut channel,
                n_channels: 1,
            };

            let err = uhd_usrp_get_tx_stream(self.usrp, &mut stream_args, handle);
            if err != UHD_ERROR_NONE {
                uhd_tx_streamer_free(&mut handle);
                return Err(format!("uhd_usrp_get_tx_stream failed: error {}", err));
            }

            // Pre-make one metadata handle per burst position so the
            // send loop never allocates.
            let mut md_start: UhdTxMetadataHandle = ptr::null_mut();
            let mut md_mid: UhdTxMetadataHandle = ptr::null_mut();
            let mut md_end: UhdTxMetadataHandle = ptr::null_mut();

            let err = uhd_tx_metadata_make(&mut md_start, false, 0, 0.0, true, false);
            if err != UHD_ERROR_NONE {
                uhd_tx_streamer_free(&mut handle);
                return Err(format!("uhd_tx_metadata_make failed: error {}", err));
            }
            let err = uhd_tx_metadata_make(&mut md_mid, false, 0, 0.0, false, false);
            if err != UHD_ERROR_NONE {
                uhd_tx_metadata_free(&mut md_start);
                uhd_tx_streamer_free(&mut handle);
                return Err(format!("uhd_tx_metadata_make failed: error {}", err));
            }
            let err = uhd_tx_metadata_make(&mut md_end, false, 0, 0.0, false, true);
            if err != UHD_ERROR_NONE {
                uhd_tx_metadata_free(&mut md_mid);
                uhd_tx_metadata_free(&mut md_start);
                uhd_tx_streamer_free(&mut handle);
                return Err(format!("uhd_tx_metadata_make failed: error {}", err));
            }

            Ok(Box::new(UsrpTxStream {
                handle,
                md_start,
                md_mid,
                md_end,
            }))
        }
    }

    fn rx_stream(&mut self, args: &RxStreamArgs) -> Result<Box<dyn RxStream>, String> {
        let cpu_fmt = CString::new("fc32").map_err(|e| format!("CString error: {}", e))?;
        let otw_fmt = CString::new("sc16").map_err(|e| format!("CString error: {}", e))?;
        let stream_args_str =
            CString::new(format!("recv_buff_size={}", args.recv_buff_size))
                .map_err(|e| format!("CString error: {}", e))?;
        let mut channel: usize = 0;

        unsafe {
            let mut handle: UhdRxStreamerHandle = ptr::null_mut();
            let err = uhd_rx_streamer_make(&mut handle);
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_rx_streamer_make failed: error {}", err));
            }

            let mut md: UhdRxMetadataHandle = ptr::null_mut();
            let err = uhd_rx_metadata_make(&mut md);
            if err != UHD_ERROR_NONE {
                uhd_rx_streamer_free(&mut handle);
                return Err(format!("uhd_rx_metadata_make failed: error {}", err));
            }

            let mut stream_args = UhdStreamArgs {
                cpu_format: cpu_fmt.as_ptr() as *mut c_char,
                otw_format: otw_fmt.as_ptr() as *mut c_char,
                args: stream_args_str.as_ptr() as *mut c_char,
                channel_list: &mut channel,
                n_channels: 1,
            };

            let err = uhd_usrp_get_rx_stream(self.usrp, &mut stream_args, handle);
            if err != UHD_ERROR_NONE {
                uhd_rx_metadata_free(&mut md);
                uhd_rx_streamer_free(&mut handle);
                return Err(format!("uhd_usrp_get_rx_stream failed: error {}", err));
            }

            Ok(Box::new(UsrpRxStream { handle, md }))
        }
    }
}

impl Drop for UsrpFrontEnd {
    fn drop(&mut self) {
        unsafe {
            uhd_usrp_free(&mut self.usrp);
        }
    }
}

// The raw handles make these types !Send by default. UHD streamer
// handles are safe to use from one thread at a time, and the harness
// moves each stream to a single thread and never shares it.
unsafe impl Send for UsrpFrontEnd {}

pub struct UsrpTxStream {
    handle: UhdTxStreamerHandle,
    md_start: UhdTxMetadataHandle,
    md_mid: UhdTxMetadataHandle,
    md_end: UhdTxMetadataHandle,
}

unsafe impl Send for UsrpTxStream {}

impl TxStream for UsrpTxStream {
    fn send(
        &mut self,
        buf: &[Sample],
        meta: &BurstMeta,
        timeout_secs: f64,
    ) -> Result<usize, String> {
        let md = match (meta.start_of_burst, meta.end_of_burst) {
            (true, _) => &mut self.md_start,
            (false, false) => &mut self.md_mid,
            (false, true) => &mut self.md_end,
        };

        let mut buf_ptr = buf.as_ptr() as *const c_void;
        let mut items_sent: usize = 0;

        unsafe {
            let err = uhd_tx_streamer_send(
                self.handle,
                &mut buf_ptr,
                buf.len(),
                md,
                timeout_secs,
                &mut items_sent,
            );
            if err != UHD_ERROR_NONE {
                return Err(format!("uhd_tx_streamer_send failed: error {}", err));
            }
        }

        Ok(items_sent)
    }
}

impl Drop for UsrpTxStream {
    fn drop(&mut self) {
        unsafe {
            uhd_tx_metadata_free(&mut self.md_start);
            uhd_tx_metadata_free(&mut self.md_mid);
            uhd_tx_metadata_free(&mut self.md_end);
            uhd_tx_streamer_free(&mut self.handle);
        }
    }
}

pub struct UsrpRxStream {
    handle: UhdRxStreamerHandle,
    md: UhdRxMetadataHandle,
}

unsafe impl Send for UsrpRxStream {}

/// Per-call recv timeout. The harness's cooperative shutdown can be
/// delayed by at most one of these.
const RECV_TIMEOUT_SECS: f64 = 0.1;

impl RxStream for UsrpRxStream {
    fn issue_command(&mut self, cmd: StreamCommand) -> Result<(), String> {
        let stream_cmd = match cmd {
            StreamCommand::StartContinuous { now } => UhdStreamCmd {
                stream_mode: UHD_STREAM_MODE_START_CONTINUOUS,
                num_samps: 0,
                stream_now: now,
                time_spec_full_secs: 0,
                time_spec_frac_secs: 0.0,
            },
            StreamCommand::StopContinuous => UhdStreamCmd {
                stream_mode: UHD_STREAM_MODE_STOP_CONTINUOUS,
                num_samps: 0,
                stream_now: true,
                time_spec_full_secs: 0,
                time_spec_frac_secs: 0.0,
            },
        };

        unsafe {
            let err = uhd_rx_streamer_issue_stream_cmd(self.handle, &stream_cmd);
            if err != UHD_ERROR_NONE {
                return Err(format!(
                    "uhd_rx_streamer_issue_stream_cmd({:?}) failed: error {}",
                    cmd, err
                ));
            }
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [Sample]) -> (usize, RxError) {
        let mut buf_ptr = buf.as_mut_ptr() as *mut c_void;
        let mut num_rx: usize = 0;

        unsafe {
            let err = uhd_rx_streamer_recv(
                self.handle,
                &mut buf_ptr,
                buf.len(),
                &mut self.md,
                RECV_TIMEOUT_SECS,
                false,
                &mut num_rx,
            );
            if err != UHD_ERROR_NONE {
                return (0, RxError::Other(err));
            }

            let mut error_code: c_int = 0;
            uhd_rx_metadata_error_code(self.md, &mut error_code);
            (num_rx, RxError::from_code(error_code))
        }
    }
}

impl Drop for UsrpRxStream {
    fn drop(&mut self) {
        unsafe {
            uhd_rx_metadata_free(&mut self.md);
            uhd_rx_streamer_free(&mut self.handle);
        }
    }
}
