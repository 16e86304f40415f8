//! Pipeline error types, grouped by the taxonomy in the error handling design:
//! configuration errors (unwind during `initialize`), fatal stream errors
//! (flip the shared error flag and request shutdown), and packet-codec
//! parse errors (fatal stream corruption, a specialization of the latter).

use thiserror::Error;

/// Top-level error returned by `Pipeline::run` and `initialize`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fatal error: {0}")]
    Fatal(#[from] FatalError),
}

/// Detected during initialization; the caller unwinds and never starts workers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("resample ratio {ratio} outside [{min}, {max}]")]
    ResampleRatioOutOfRange { ratio: f64, min: f64, max: f64 },

    #[error("raw passthrough requires matching input/output formats, got {input:?} and {output:?}")]
    PassthroughFormatMismatch { input: String, output: String },

    #[error("filter edge {edge_hz} Hz exceeds output Nyquist {nyquist_hz} Hz")]
    FilterExceedsNyquist { edge_hz: f64, nyquist_hz: f64 },

    #[error("required chunk capacity {needed} exceeds MAX_ALLOWED_FFT_BLOCK_SIZE {max}")]
    FftBlockTooLarge { needed: usize, max: usize },

    #[error("output container {container} does not support sample format {format}")]
    UnsupportedContainerFormat { container: String, format: String },

    #[error("source initialization did not complete within {timeout_ms} ms")]
    InitializeTimedOut { timeout_ms: u64 },

    #[error("source reported failure during initialize: {reason}")]
    SourceInitializeFailed { reason: String },

    #[error("sink reported failure during open: {reason}")]
    SinkOpenFailed { reason: String },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Set the shared `error_occurred` flag and request global shutdown; never
/// bubbled across a thread boundary as a `Result` — see `CancellationToken`.
#[derive(Debug, Error, Clone)]
pub enum FatalError {
    #[error("[{worker}] packet stream corrupted: {source}")]
    PacketCorruption {
        worker: &'static str,
        source: PacketError,
    },

    #[error("[{worker}] sample format conversion failed: {reason}")]
    FormatConversion { worker: &'static str, reason: String },

    #[error("[{worker}] I/O error: {reason}")]
    Io { worker: &'static str, reason: String },

    #[error("[{worker}] SDR driver stalled: no heartbeat for {elapsed_ms} ms")]
    DriverHung { worker: &'static str, elapsed_ms: u64 },
}

/// Raised by `deframe`/`serialize` in the source-side framed packet codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("unrecognized format_id {0}")]
    UnknownFormat(u8),

    #[error("num_samples {0} exceeds impossible-size guard of {1}")]
    ImpossibleSize(u32, u32),

    #[error("data packet (num_samples > 0) carries FORMAT_UNKNOWN")]
    DataPacketMissingFormat,

    #[error("stream ended before a complete header was available")]
    TruncatedStream,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
