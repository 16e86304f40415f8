//! Pipeline configuration surface: the data model a CLI, a preset file, or
//! an embedder populates to describe one run. Loadable from TOML via
//! `toml::from_str`. Deliberately flat: no recursive multi-file `include`
//! merge, since preset-file composition is out of scope here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dsp::filter::FilterRequest;
use crate::sample_format::SampleFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleTypeName {
    U8,
    I8,
    Cu8,
    Ci8,
    U16,
    I16,
    Cu16,
    Ci16,
    U32,
    I32,
    Cu32,
    Ci32,
    F32,
    Cf32,
    CQ4_11,
}

impl SampleTypeName {
    pub fn to_sample_format(self) -> SampleFormat {
        match self {
            SampleTypeName::U8 => SampleFormat::U8,
            SampleTypeName::I8 => SampleFormat::I8,
            SampleTypeName::Cu8 => SampleFormat::Cu8,
            SampleTypeName::Ci8 => SampleFormat::Ci8,
            SampleTypeName::U16 => SampleFormat::U16,
            SampleTypeName::I16 => SampleFormat::I16,
            SampleTypeName::Cu16 => SampleFormat::Cu16,
            SampleTypeName::Ci16 => SampleFormat::Ci16,
            SampleTypeName::U32 => SampleFormat::U32,
            SampleTypeName::I32 => SampleFormat::I32,
            SampleTypeName::Cu32 => SampleFormat::Cu32,
            SampleTypeName::Ci32 => SampleFormat::Ci32,
            SampleTypeName::F32 => SampleFormat::F32,
            SampleTypeName::Cf32 => SampleFormat::Cf32,
            SampleTypeName::CQ4_11 => SampleFormat::CQ4_11,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputConfig {
    RawFile {
        path: PathBuf,
        sample_rate_hz: f64,
        sample_type: SampleTypeName,
    },
    WavFile {
        path: PathBuf,
    },
    MockSdr {
        sample_rate_hz: f64,
        tone_hz: f64,
        #[serde(default = "default_burst_frames")]
        burst_frames: usize,
        max_bursts: Option<u64>,
    },
}

fn default_burst_frames() -> usize {
    2048
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputContainer {
    Raw,
    Wav,
    WavRf64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: Option<PathBuf>,
    pub container: OutputContainer,
    pub sample_type: SampleTypeName,
    /// When true, the sink is an unpaced byte stream (stdout) rather than a
    /// bounded file; `path` is ignored.
    #[serde(default)]
    pub output_to_stdout: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DcBlockConfig {
    pub enable: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IqCorrectionConfig {
    pub enable: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgcConfig {
    pub enable: bool,
    #[serde(default = "default_agc_target_rms")]
    pub target_rms: f32,
    #[serde(default = "default_agc_attack")]
    pub attack: f32,
    #[serde(default = "default_agc_decay")]
    pub decay: f32,
    #[serde(default = "default_agc_max_gain")]
    pub max_gain: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            enable: false,
            target_rms: default_agc_target_rms(),
            attack: default_agc_attack(),
            decay: default_agc_decay(),
            max_gain: default_agc_max_gain(),
        }
    }
}

fn default_agc_target_rms() -> f32 {
    0.5
}

fn default_agc_attack() -> f32 {
    0.01
}

fn default_agc_decay() -> f32 {
    0.001
}

fn default_agc_max_gain() -> f32 {
    100.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub output: OutputConfig,

    /// Hz; 0 or `no_resample = true` means "take the rate from the source".
    #[serde(default)]
    pub target_rate_hz: f64,
    #[serde(default)]
    pub no_resample: bool,

    /// Linear gain applied during raw→complex conversion.
    #[serde(default = "default_gain")]
    pub gain: f32,

    #[serde(default)]
    pub freq_shift_hz: f64,
    #[serde(default)]
    pub shift_after_resample: bool,

    #[serde(default)]
    pub dc_block: DcBlockConfig,
    #[serde(default)]
    pub iq_correction: IqCorrectionConfig,
    #[serde(default)]
    pub agc: AgcConfig,

    #[serde(default)]
    pub filter_requests: Vec<FilterRequest>,

    /// Bypasses the entire DSP chain; requires input format == output format.
    #[serde(default)]
    pub raw_passthrough: bool,
}

fn default_gain() -> f32 {
    1.0
}

impl PipelineConfig {
    pub fn output_sample_format(&self) -> SampleFormat {
        self.output.sample_type.to_sample_format()
    }
}
