//! Builds and runs one pipeline: resolves the [`PipelineMode`] from
//! configuration, constructs the concrete source/sink, sizes the shared
//! chunk pool, wires the queues and rings between stages, spawns one OS
//! thread per stage, and blocks until every thread has joined.
//!
//! Each stage runs on its own named `JoinHandle<()>`, collected as threads
//! spawn and joined in order on the way out.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::cancellation::CancellationToken;
use crate::chunk::{
    compute_max_out_samples, ChunkPool, IO_OUTPUT_WRITER_BUFFER_BYTES, IO_SDR_INPUT_BUFFER_BYTES,
    PIPELINE_CHUNK_BASE_SAMPLES, PIPELINE_NUM_CHUNKS, SDR_HEARTBEAT_TIMEOUT_MS, SDR_INITIALIZE_TIMEOUT_MS,
};
use crate::config::{InputConfig, OutputContainer, PipelineConfig};
use crate::dsp::filter::{self, Filter};
use crate::dsp::iq_correction::new_shared_coefficients;
use crate::errors::{ConfigError, PipelineError};
use crate::heartbeat::Heartbeat;
use crate::progress::{ProgressCallback, ProgressSnapshot, ProgressTracker};
use crate::queue::BlockingQueue;
use crate::ring_buffer::RingBuffer;
use crate::sample_format::SampleFormat;
use crate::sink::{OutputWriter, RawFileWriter, StdoutWriter, WavFileWriter};
use crate::source::{InputSource, MockSdrSource, RawFileSource, SourceInfo, WavFileSource};
use crate::workers::postprocessor::{self, PostprocessorConfig};
use crate::workers::preprocessor::{self, PreprocessorConfig};
use crate::workers::stats::PipelineStats;
use crate::workers::{iq_optimizer_worker, reader_worker, resampler_worker, source_worker, watchdog, writer_worker};

/// Which wiring shape a run takes, derived from input/output configuration.
/// Grounded directly on the three capture shapes this format supports:
/// a live SDR feeding either an unpaced byte stream or a paced file sink
/// needs a capture thread, while reading an existing file never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// SDR source, byte-stream sink: `source_worker` chunks bursts directly.
    RealtimeSdr,
    /// SDR source, file sink: `source_worker` frames packets onto a ring;
    /// `reader_worker` deframes them on its own thread.
    BufferedSdr,
    /// File source, any sink: `reader_worker` drives `read_block` inline.
    FileProcessing,
}

fn resolve_mode(config: &PipelineConfig) -> PipelineMode {
    match &config.input {
        InputConfig::MockSdr { .. } => {
            if config.output.output_to_stdout {
                PipelineMode::RealtimeSdr
            } else {
                PipelineMode::BufferedSdr
            }
        }
        _ => PipelineMode::FileProcessing,
    }
}

pub struct RunOptions {
    pub progress_callback: Option<ProgressCallback>,
    pub cancel: CancellationToken,
    /// Initialize the source and open the sink, then report what the run
    /// would have done, without spawning any worker thread.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            progress_callback: None,
            cancel: CancellationToken::new(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub mode: Option<PipelineMode>,
    /// Frames the writer actually committed to the sink.
    pub frames_written: u64,
    pub bytes_written: u64,
    pub overruns: u64,
    pub discontinuities: u64,
    pub elapsed: Duration,
    pub fatal_error: Option<String>,
}

fn build_source(input: &InputConfig) -> InputSource {
    match input.clone() {
        InputConfig::RawFile {
            path,
            sample_rate_hz,
            sample_type,
        } => InputSource::RawFile(RawFileSource::new(path, sample_type.to_sample_format(), sample_rate_hz)),
        InputConfig::WavFile { path } => InputSource::WavFile(WavFileSource::new(path)),
        InputConfig::MockSdr {
            sample_rate_hz,
            tone_hz,
            burst_frames,
            max_bursts,
        } => {
            let mut source = MockSdrSource::new(sample_rate_hz, tone_hz, burst_frames);
            if let Some(max) = max_bursts {
                source = source.with_max_bursts(max);
            }
            InputSource::MockSdr(source)
        }
    }
}

/// Initializes `source` on a detached thread and waits up to `timeout_ms`.
/// A driver that never returns from `initialize` is indistinguishable from
/// one that is merely slow; we cannot safely reclaim the thread either way,
/// so on timeout it is abandoned and the caller proceeds without it.
fn initialize_source_with_timeout(
    mut source: InputSource,
    timeout_ms: u64,
) -> Result<(InputSource, SourceInfo), PipelineError> {
    let (tx, rx) = mpsc::channel();
    let _handle = thread::spawn(move || {
        let result = source.initialize();
        let _ = tx.send((source, result));
    });
    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok((source, Ok(info))) => Ok((source, info)),
        Ok((_source, Err(e))) => Err(PipelineError::Config(e)),
        Err(_) => Err(PipelineError::Config(ConfigError::InitializeTimedOut { timeout_ms })),
    }
}

fn build_sink(config: &PipelineConfig, output_format: SampleFormat, output_rate_hz: f64) -> Result<OutputWriter, ConfigError> {
    if config.output.output_to_stdout {
        return Ok(OutputWriter::Stdout(StdoutWriter::new()));
    }
    let path = config.output.path.clone().ok_or_else(|| ConfigError::Invalid {
        reason: "output.path is required for file sinks".to_string(),
    })?;
    match config.output.container {
        OutputContainer::Raw => Ok(OutputWriter::RawFile(RawFileWriter::new(path))),
        OutputContainer::Wav => Ok(OutputWriter::WavFile(WavFileWriter::new(
            path,
            output_format,
            output_rate_hz as u32,
        ))),
        OutputContainer::WavRf64 => Err(ConfigError::Invalid {
            reason: "WAV_RF64 output is accepted as a configuration value but not implemented by the bundled writer".to_string(),
        }),
    }
}

/// Splits `filter_requests` into the pre- and post-filter slots the DSP
/// stages expose; anything beyond the first two is dropped with a warning
/// rather than silently chosen between, since this format does not define
/// an ordering for more than one filter per side of the chain.
fn split_filter_requests(config: &PipelineConfig) -> (Option<filter::FilterRequest>, Option<filter::FilterRequest>) {
    let mut requests = config.filter_requests.iter();
    let pre = requests.next().copied();
    let post = requests.next().copied();
    let dropped = requests.count();
    if dropped > 0 {
        tracing::warn!(dropped, "filter_requests entries beyond the pre/post slots are ignored");
    }
    (pre, post)
}

fn spawn_watchdog(handles: &mut Vec<JoinHandle<()>>, heartbeat: &Heartbeat, cancel: &CancellationToken) {
    let heartbeat = heartbeat.clone();
    let cancel = cancel.clone();
    handles.push(
        thread::Builder::new()
            .name("watchdog".into())
            .spawn(move || watchdog::run(heartbeat, SDR_HEARTBEAT_TIMEOUT_MS, cancel))
            .expect("spawn watchdog thread"),
    );
}

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Waits for `cancel`, then wakes every worker blocked on a queue or ring so
/// a fatal error or a cancellation request drains the graph instead of
/// leaving stages parked on `dequeue`/`read` forever. A worker that notices
/// cancellation on its own (the source loops, the writer) still exits
/// promptly; this is the path for everyone downstream of it, which has no
/// other way to learn the stream is being torn down early.
#[allow(clippy::too_many_arguments)]
fn spawn_canceller(
    cancel: CancellationToken,
    chunk_pool: Arc<ChunkPool>,
    writer_queue: Arc<BlockingQueue<usize>>,
    dsp_input_queue: Option<Arc<BlockingQueue<usize>>>,
    pre_out_queue: Option<Arc<BlockingQueue<usize>>>,
    post_in_queue: Option<Arc<BlockingQueue<usize>>>,
    optimizer_queue: Option<Arc<BlockingQueue<usize>>>,
    sink_ring: Option<Arc<RingBuffer>>,
    source_ring: Option<Arc<RingBuffer>>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("canceller".into())
        .spawn(move || {
            while !cancel.is_cancelled() {
                thread::sleep(CANCEL_POLL_INTERVAL);
            }
            chunk_pool.free_queue.signal_shutdown();
            writer_queue.signal_shutdown();
            if let Some(q) = &dsp_input_queue {
                q.signal_shutdown();
            }
            if let Some(q) = &pre_out_queue {
                q.signal_shutdown();
            }
            if let Some(q) = &post_in_queue {
                q.signal_shutdown();
            }
            if let Some(q) = &optimizer_queue {
                q.signal_shutdown();
            }
            if let Some(r) = &sink_ring {
                r.signal_shutdown();
            }
            if let Some(r) = &source_ring {
                r.signal_shutdown();
            }
        })
        .expect("spawn canceller thread")
}

pub fn run(config: PipelineConfig, opts: RunOptions) -> Result<RunSummary, PipelineError> {
    let started_at = Instant::now();
    let cancel = opts.cancel;
    let mode = resolve_mode(&config);

    let raw_passthrough = config.raw_passthrough;
    if raw_passthrough && mode == PipelineMode::BufferedSdr {
        return Err(PipelineError::Config(ConfigError::Invalid {
            reason: "raw_passthrough is not supported in buffered SDR mode".to_string(),
        }));
    }

    let source = build_source(&config.input);
    let (mut source, source_info) = initialize_source_with_timeout(source, SDR_INITIALIZE_TIMEOUT_MS)?;

    let output_format = config.output_sample_format();
    if raw_passthrough && source_info.sample_format != output_format {
        return Err(PipelineError::Config(ConfigError::PassthroughFormatMismatch {
            input: format!("{:?}", source_info.sample_format),
            output: format!("{:?}", output_format),
        }));
    }

    let use_resampler = !config.no_resample && !raw_passthrough;
    let output_rate_hz = if config.target_rate_hz > 0.0 {
        config.target_rate_hz
    } else {
        source_info.sample_rate_hz
    };
    let resample_ratio = if use_resampler {
        Some(output_rate_hz / source_info.sample_rate_hz)
    } else {
        None
    };

    let (pre_filter, post_filter) = split_filter_requests(&config);
    if let Some(req) = &pre_filter {
        filter::validate_request(req, source_info.sample_rate_hz).map_err(PipelineError::Config)?;
    }
    if let Some(req) = &post_filter {
        filter::validate_request(req, output_rate_hz).map_err(PipelineError::Config)?;
    }
    let mut filter_block_size = None;
    if let Some(req) = &pre_filter {
        filter_block_size = filter_block_size.max(Filter::new(*req, source_info.sample_rate_hz).block_size());
    }
    if let Some(req) = &post_filter {
        filter_block_size = filter_block_size.max(Filter::new(*req, output_rate_hz).block_size());
    }

    let max_out_samples = compute_max_out_samples(PIPELINE_CHUNK_BASE_SAMPLES, filter_block_size, resample_ratio)
        .map_err(PipelineError::Config)?;

    // Constructed before any worker spawns so an out-of-range ratio fails
    // the run cleanly instead of leaving already-spawned threads blocked.
    let resampler = if use_resampler {
        Some(
            crate::dsp::resampler::Resampler::new(source_info.sample_rate_hz, output_rate_hz, max_out_samples)
                .map_err(PipelineError::Config)?,
        )
    } else {
        None
    };

    let input_bytes_per_pair = source_info.sample_format.bytes_per_sample_pair().max(1);
    let output_bytes_per_pair = output_format.bytes_per_sample_pair().max(1);
    let raw_capacity = PIPELINE_CHUNK_BASE_SAMPLES * input_bytes_per_pair;
    let output_capacity = max_out_samples * output_bytes_per_pair;

    let chunk_pool = ChunkPool::new(PIPELINE_NUM_CHUNKS, raw_capacity, max_out_samples, output_capacity);
    for id in 0..chunk_pool.len() {
        chunk_pool.with_chunk(id, |chunk| {
            chunk.input_bytes_per_sample_pair = input_bytes_per_pair;
            chunk.output_bytes_per_sample_pair = output_bytes_per_pair;
        });
    }

    let mut writer = build_sink(&config, output_format, output_rate_hz).map_err(PipelineError::Config)?;
    writer.open().map_err(PipelineError::Config)?;
    let needs_pacing = writer.requires_pacing();

    if opts.dry_run {
        let _ = writer.close();
        source.stop_stream();
        return Ok(RunSummary {
            mode: Some(mode),
            elapsed: started_at.elapsed(),
            ..RunSummary::default()
        });
    }

    let stats = Arc::new(PipelineStats::new());
    let heartbeat = Heartbeat::new();
    let progress = ProgressTracker::new(source_info.total_frames, opts.progress_callback);
    let iq_coeffs = new_shared_coefficients();

    let sink_ring = if needs_pacing {
        Some(Arc::new(RingBuffer::new(IO_OUTPUT_WRITER_BUFFER_BYTES)))
    } else {
        None
    };
    let writer_queue = Arc::new(BlockingQueue::new(PIPELINE_NUM_CHUNKS));

    let dsp_input_queue = (!raw_passthrough).then(|| Arc::new(BlockingQueue::new(PIPELINE_NUM_CHUNKS)));
    let pre_out_queue = (!raw_passthrough).then(|| Arc::new(BlockingQueue::new(PIPELINE_NUM_CHUNKS)));
    let post_in_queue = if raw_passthrough {
        None
    } else if use_resampler {
        Some(Arc::new(BlockingQueue::new(PIPELINE_NUM_CHUNKS)))
    } else {
        pre_out_queue.clone()
    };
    let optimizer_queue = (config.iq_correction.enable && !raw_passthrough)
        .then(|| Arc::new(BlockingQueue::new(PIPELINE_NUM_CHUNKS)));

    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    // Writer: drains the pacing ring or the chunk-direct queue.
    if let Some(ring) = sink_ring.clone() {
        let progress = progress.clone();
        let cancel = cancel.clone();
        handles.push(
            thread::Builder::new()
                .name("writer".into())
                .spawn(move || writer_worker::run_paced(writer, ring, output_bytes_per_pair, progress, cancel))
                .expect("spawn writer thread"),
        );
    } else {
        let queue = writer_queue.clone();
        let pool = chunk_pool.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();
        handles.push(
            thread::Builder::new()
                .name("writer".into())
                .spawn(move || writer_worker::run_chunk_direct(writer, queue, pool, output_bytes_per_pair, progress, cancel))
                .expect("spawn writer thread"),
        );
    }

    // Optimizer: folds forked snippets back into the shared coefficients.
    if let Some(queue) = &optimizer_queue {
        let queue = queue.clone();
        let pool = chunk_pool.clone();
        let coeffs = iq_coeffs.clone();
        handles.push(
            thread::Builder::new()
                .name("iq-optimizer".into())
                .spawn(move || iq_optimizer_worker::run(queue, pool, coeffs))
                .expect("spawn iq-optimizer thread"),
        );
    }

    // Post-processor.
    if let (Some(post_in), Some(_pre_out)) = (&post_in_queue, &pre_out_queue) {
        let cfg = PostprocessorConfig {
            post_filter,
            post_shift_hz: config.shift_after_resample.then_some(config.freq_shift_hz),
            sample_rate_hz: output_rate_hz,
            agc: config.agc.enable.then_some((
                config.agc.target_rms,
                config.agc.attack,
                config.agc.decay,
                config.agc.max_gain,
            )),
            output_format,
        };
        let input_queue = post_in.clone();
        let writer_queue = writer_queue.clone();
        let sink_ring = sink_ring.clone();
        let pool = chunk_pool.clone();
        let stats = stats.clone();
        let cancel = cancel.clone();
        handles.push(
            thread::Builder::new()
                .name("postprocessor".into())
                .spawn(move || postprocessor::run(input_queue, writer_queue, sink_ring, pool, cfg, stats, cancel))
                .expect("spawn postprocessor thread"),
        );
    }

    // Resampler, only when it sits between two distinct queues.
    if let Some(resampler) = resampler {
        if let (Some(pre_out), Some(post_in)) = (&pre_out_queue, &post_in_queue) {
            let input_queue = pre_out.clone();
            let output_queue = post_in.clone();
            let pool = chunk_pool.clone();
            let cancel = cancel.clone();
            handles.push(
                thread::Builder::new()
                    .name("resampler".into())
                    .spawn(move || resampler_worker::run(input_queue, output_queue, pool, resampler, cancel))
                    .expect("spawn resampler thread"),
            );
        }
    }

    // Pre-processor.
    if let (Some(dsp_input), Some(pre_out)) = (&dsp_input_queue, &pre_out_queue) {
        let cfg = PreprocessorConfig {
            gain: config.gain,
            dc_block_enabled: config.dc_block.enable,
            pre_shift_hz: (!config.shift_after_resample).then_some(config.freq_shift_hz),
            sample_rate_hz: source_info.sample_rate_hz,
            pre_filter,
            iq_optimization_enabled: config.iq_correction.enable,
        };
        let input_queue = dsp_input.clone();
        let output_queue = pre_out.clone();
        let optimizer_queue = optimizer_queue.clone();
        let pool = chunk_pool.clone();
        let coeffs = iq_coeffs.clone();
        let stats = stats.clone();
        let cancel = cancel.clone();
        handles.push(
            thread::Builder::new()
                .name("preprocessor".into())
                .spawn(move || preprocessor::run(input_queue, output_queue, optimizer_queue, pool, coeffs, cfg, stats, cancel))
                .expect("spawn preprocessor thread"),
        );
    }

    // Populated only in BUFFERED_SDR, where the canceller also needs to wake
    // the reader thread blocked reading packets off it.
    let mut sdr_source_ring: Option<Arc<RingBuffer>> = None;

    // Reader / source capture, per mode.
    match mode {
        PipelineMode::FileProcessing => {
            let output_queue = dsp_input_queue.clone().unwrap_or_else(|| writer_queue.clone());
            let pool = chunk_pool.clone();
            let sink_ring = sink_ring.clone();
            let writer_queue = writer_queue.clone();
            let stats = stats.clone();
            let cancel = cancel.clone();
            handles.push(
                thread::Builder::new()
                    .name("reader".into())
                    .spawn(move || {
                        reader_worker::run_file(
                            source,
                            pool,
                            output_queue,
                            sink_ring,
                            writer_queue,
                            raw_passthrough,
                            input_bytes_per_pair,
                            cancel,
                            stats,
                        )
                    })
                    .expect("spawn reader thread"),
            );
        }
        PipelineMode::BufferedSdr => {
            let source_ring = Arc::new(RingBuffer::new(IO_SDR_INPUT_BUFFER_BYTES));
            sdr_source_ring = Some(source_ring.clone());
            let output_queue = dsp_input_queue.clone().expect("buffered SDR always runs the DSP chain");

            let capture_ring = source_ring.clone();
            let capture_heartbeat = heartbeat.clone();
            let capture_cancel = cancel.clone();
            let capture_stats = stats.clone();
            handles.push(
                thread::Builder::new()
                    .name("source".into())
                    .spawn(move || source_worker::run_buffered(source, capture_ring, capture_heartbeat, capture_cancel, capture_stats))
                    .expect("spawn source thread"),
            );

            let pool = chunk_pool.clone();
            let reader_cancel = cancel.clone();
            handles.push(
                thread::Builder::new()
                    .name("reader".into())
                    .spawn(move || reader_worker::run_buffered(source_ring, pool, output_queue, reader_cancel))
                    .expect("spawn reader thread"),
            );

            spawn_watchdog(&mut handles, &heartbeat, &cancel);
        }
        PipelineMode::RealtimeSdr => {
            let output_queue = dsp_input_queue.clone().unwrap_or_else(|| writer_queue.clone());
            let pool = chunk_pool.clone();
            let sink_ring = sink_ring.clone();
            let writer_queue = writer_queue.clone();
            let stats = stats.clone();
            let source_cancel = cancel.clone();
            let capture_heartbeat = heartbeat.clone();
            handles.push(
                thread::Builder::new()
                    .name("source".into())
                    .spawn(move || {
                        source_worker::run_realtime(
                            source,
                            pool,
                            output_queue,
                            capture_heartbeat,
                            source_cancel,
                            sink_ring,
                            writer_queue,
                            raw_passthrough,
                            stats,
                        )
                    })
                    .expect("spawn source thread"),
            );

            spawn_watchdog(&mut handles, &heartbeat, &cancel);
        }
    }

    let canceller_handle = spawn_canceller(
        cancel.clone(),
        chunk_pool.clone(),
        writer_queue.clone(),
        dsp_input_queue.clone(),
        pre_out_queue.clone(),
        post_in_queue.clone(),
        optimizer_queue.clone(),
        sink_ring.clone(),
        sdr_source_ring.clone(),
    );

    for handle in handles {
        let _ = handle.join();
    }
    // Every stage has exited on its own by now (end of stream or a fatal
    // error already woke the canceller); this just reclaims its thread,
    // including the steady-state case where it was still polling.
    cancel.cancel();
    let _ = canceller_handle.join();

    let snapshot: ProgressSnapshot = progress.snapshot();
    let summary = RunSummary {
        mode: Some(mode),
        frames_written: snapshot.current_frames,
        bytes_written: snapshot.current_bytes,
        overruns: stats.overruns(),
        discontinuities: stats.discontinuities(),
        elapsed: started_at.elapsed(),
        fatal_error: cancel.take_error().map(|e| e.to_string()),
    };
    Ok(summary)
}
