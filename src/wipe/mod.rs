pub mod engine;
pub mod plan;

pub use engine::WipeEngine;
pub use plan::plan_for;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One pass over the whole device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipePass {
    /// Fresh CSPRNG bytes for every chunk.
    Random,
    /// A 1- to 3-byte pattern tiled across the device.
    Pattern(Vec<u8>),
}

impl WipePass {
    /// Human-readable label used in progress records.
    pub fn describe(&self) -> String {
        match self {
            WipePass::Random => "random data".to_string(),
            WipePass::Pattern(bytes) => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("0x{:02X}", b)).collect();
                format!("pattern {}", hex.join(" "))
            }
        }
    }
}

/// Phase a progress record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WipePhase {
    Write,
    Verify,
}

/// Progress snapshot delivered to the UI sink. Byte counts are cumulative
/// within the current pass, not across the whole plan.
#[derive(Debug, Clone)]
pub struct WipeProgress {
    pub current_pass: usize,
    pub total_passes: usize,
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
    pub throughput_bps: u64,
    pub phase: WipePhase,
    pub description: String,
}

/// Outcome of a completed run. The caller decides the overall verdict from
/// the mismatch count; the engine itself never fails on a bad readback.
#[derive(Debug, Clone, Default)]
pub struct WipeSummary {
    pub passes_completed: usize,
    pub bytes_written: u64,
    pub verify_mismatches: u64,
    pub elapsed: Duration,
}

pub type WipeResult<T> = Result<T, WipeError>;

#[derive(Debug, thiserror::Error)]
pub enum WipeError {
    #[error(transparent)]
    Device(#[from] crate::io::DeviceError),

    #[error("device {0} reports zero size")]
    EmptyDevice(String),

    #[error("device truncated at offset {0}")]
    UnexpectedEof(u64),

    #[error("CSPRNG failure: {0}")]
    Rng(String),
}
