//! Pass execution.
//!
//! A pass owns its device handle: writes go through a fresh write handle,
//! verification reopens the device read-only. Pass `i + 1` never starts
//! before pass `i`'s flush-to-media has returned.

use super::{plan_for, WipeError, WipePass, WipePhase, WipeProgress, WipeResult, WipeSummary};
use crate::config::WipeAlgorithm;
use crate::crypto::SecureRng;
use crate::io::{AlignedBuffer, DeviceHandle, DEFAULT_BUFFER_SIZE, SECTOR_SIZE};
use crate::ui::UserInterface;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Minimum interval between progress emissions within a pass.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Drives a configured plan across a whole device.
pub struct WipeEngine {
    device: String,
    verify: bool,
    buffer_size: usize,
    rng: SecureRng,
}

impl WipeEngine {
    pub fn new(device: &str, verify: bool) -> Self {
        Self {
            device: device.to_string(),
            verify,
            buffer_size: DEFAULT_BUFFER_SIZE,
            rng: SecureRng::new(),
        }
    }

    /// Override the traversal chunk size (clamped up to one sector).
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(SECTOR_SIZE);
        self
    }

    /// Run the full plan for `algorithm` against the target device.
    ///
    /// Progress is delivered through the UI sink at most once per 500 ms
    /// per pass plus once at end-of-pass; the sink is advisory and cannot
    /// abort the run. Verification mismatches are counted, not fatal.
    pub fn run(
        &mut self,
        algorithm: WipeAlgorithm,
        ui: &mut dyn UserInterface,
    ) -> WipeResult<WipeSummary> {
        let started = Instant::now();

        if crate::io::is_solid_state(&self.device) == Some(true) {
            ui.status(
                "warning: target is solid-state; wear-leveling may leave \
                 residual data the overwrite cannot reach",
            );
        }

        if algorithm == WipeAlgorithm::VerifyOnly {
            let mut summary = self.read_scan(ui)?;
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        let plan = plan_for(algorithm);
        let total = plan.len();
        info!(
            "starting {} wipe of {} ({} passes, verify {})",
            algorithm,
            self.device,
            total,
            if self.verify { "on" } else { "off" }
        );

        let mut summary = WipeSummary::default();

        for (index, pass) in plan.iter().enumerate() {
            let written = self.execute_pass(index + 1, total, pass, ui)?;
            summary.passes_completed += 1;
            summary.bytes_written += written;

            // Random passes cannot be read back exactly; only patterns are
            // verified.
            if self.verify {
                if let WipePass::Pattern(pattern) = pass {
                    summary.verify_mismatches +=
                        self.verify_pass(index + 1, total, pattern, ui)?;
                }
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            "wipe of {} finished: {} passes, {} bytes written, {} verify mismatches",
            self.device, summary.passes_completed, summary.bytes_written, summary.verify_mismatches
        );
        Ok(summary)
    }

    /// Write one pass across the whole device and flush it to media.
    /// Returns the byte count actually written.
    pub(crate) fn execute_pass(
        &mut self,
        pass_number: usize,
        total_passes: usize,
        pass: &WipePass,
        ui: &mut dyn UserInterface,
    ) -> WipeResult<u64> {
        let mut handle = DeviceHandle::open_write(&self.device)?;
        let size = handle.size();
        if size == 0 {
            return Err(WipeError::EmptyDevice(self.device.clone()));
        }

        debug!("pass {}/{}: {}", pass_number, total_passes, pass.describe());
        handle.seek_begin()?;

        let mut buffer = AlignedBuffer::new(self.buffer_size)?;
        let mut reporter = PassReporter::new(
            pass_number,
            total_passes,
            size,
            WipePhase::Write,
            pass.describe(),
        );
        let mut written: u64 = 0;

        while written < size {
            let mut chunk = buffer.len().min((size - written) as usize);
            if handle.requires_alignment() {
                chunk = chunk / SECTOR_SIZE * SECTOR_SIZE;
                if chunk == 0 {
                    // A sub-sector tail is unreachable through an unbuffered
                    // handle; leaving it is the documented contract.
                    break;
                }
            }

            match pass {
                WipePass::Random => self
                    .rng
                    .fill(&mut buffer.as_mut_slice()[..chunk])
                    .map_err(|e| WipeError::Rng(e.to_string()))?,
                WipePass::Pattern(pattern) => {
                    fill_pattern(&mut buffer.as_mut_slice()[..chunk], pattern, written)
                }
            }

            let mut offset = 0usize;
            while offset < chunk {
                let n = handle.write(&buffer.as_slice()[offset..chunk])?;
                if n == 0 {
                    return Err(WipeError::UnexpectedEof(written + offset as u64));
                }
                offset += n;
            }

            written += chunk as u64;
            reporter.report(written, false, ui);
        }

        // The pass is not complete until the bytes are on media.
        handle.sync()?;
        reporter.report(written, true, ui);
        Ok(written)
    }

    /// Read back a completed pattern pass and compare byte-exactly. Returns
    /// the mismatch count (0 or 1: the scan stops at the first divergence;
    /// repair is never attempted).
    pub(crate) fn verify_pass(
        &mut self,
        pass_number: usize,
        total_passes: usize,
        pattern: &[u8],
        ui: &mut dyn UserInterface,
    ) -> WipeResult<u64> {
        let mut handle = DeviceHandle::open_read(&self.device)?;
        let size = handle.size();
        handle.seek_begin()?;

        let mut buffer = AlignedBuffer::new(self.buffer_size)?;
        let mut expected = AlignedBuffer::new(self.buffer_size)?;
        let mut reporter = PassReporter::new(
            pass_number,
            total_passes,
            size,
            WipePhase::Verify,
            format!("verify {}", WipePass::Pattern(pattern.to_vec()).describe()),
        );
        let mut done: u64 = 0;

        while done < size {
            let mut chunk = buffer.len().min((size - done) as usize);
            if handle.requires_alignment() {
                chunk = chunk / SECTOR_SIZE * SECTOR_SIZE;
                if chunk == 0 {
                    break;
                }
            }

            let mut offset = 0usize;
            while offset < chunk {
                let n = handle.read(&mut buffer.as_mut_slice()[offset..chunk])?;
                if n == 0 {
                    return Err(WipeError::UnexpectedEof(done + offset as u64));
                }
                offset += n;
            }

            fill_pattern(&mut expected.as_mut_slice()[..chunk], pattern, done);

            if let Some(at) = first_mismatch(
                &buffer.as_slice()[..chunk],
                &expected.as_slice()[..chunk],
            ) {
                let absolute = done + at as u64;
                warn!(
                    "verification mismatch on {} at offset {}: expected 0x{:02X}, got 0x{:02X}",
                    self.device,
                    absolute,
                    expected.as_slice()[at],
                    buffer.as_slice()[at]
                );
                ui.error(&format!(
                    "pass {} verification failed at offset {}",
                    pass_number, absolute
                ));
                return Ok(1);
            }

            done += chunk as u64;
            reporter.report(done, false, ui);
        }

        reporter.report(done, true, ui);
        Ok(0)
    }

    /// VERIFY_ONLY: a single read scan that surfaces any I/O error without
    /// writing a byte.
    fn read_scan(&mut self, ui: &mut dyn UserInterface) -> WipeResult<WipeSummary> {
        let mut handle = DeviceHandle::open_read(&self.device)?;
        let size = handle.size();
        if size == 0 {
            return Err(WipeError::EmptyDevice(self.device.clone()));
        }
        handle.seek_begin()?;

        let mut buffer = AlignedBuffer::new(self.buffer_size)?;
        let mut reporter = PassReporter::new(1, 1, size, WipePhase::Verify, "read scan".into());
        let mut done: u64 = 0;

        while done < size {
            let mut chunk = buffer.len().min((size - done) as usize);
            if handle.requires_alignment() {
                chunk = chunk / SECTOR_SIZE * SECTOR_SIZE;
                if chunk == 0 {
                    break;
                }
            }

            let mut offset = 0usize;
            while offset < chunk {
                match handle.read(&mut buffer.as_mut_slice()[offset..chunk]) {
                    Ok(0) => return Err(WipeError::UnexpectedEof(done + offset as u64)),
                    Ok(n) => offset += n,
                    Err(e) => {
                        ui.error(&format!("read scan failed at offset {}", done + offset as u64));
                        return Err(e.into());
                    }
                }
            }

            done += chunk as u64;
            reporter.report(done, false, ui);
        }

        reporter.report(done, true, ui);
        Ok(WipeSummary::default())
    }
}

/// Tile `pattern` into `buf` as if the buffer began at `device_offset`:
/// device byte `o` always receives `pattern[o % k]`, whatever the chunk
/// boundaries were.
pub(crate) fn fill_pattern(buf: &mut [u8], pattern: &[u8], device_offset: u64) {
    let k = pattern.len();
    debug_assert!((1..=3).contains(&k));

    if k == 1 {
        buf.fill(pattern[0]);
        return;
    }

    let mut phase = (device_offset % k as u64) as usize;
    for byte in buf.iter_mut() {
        *byte = pattern[phase];
        phase += 1;
        if phase == k {
            phase = 0;
        }
    }
}

fn first_mismatch(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter().zip(b).position(|(x, y)| x != y)
}

/// Per-pass progress throttle: emissions at most every
/// [`PROGRESS_INTERVAL`], plus one forced emission at end-of-pass.
struct PassReporter {
    pass: usize,
    total: usize,
    bytes_total: u64,
    phase: WipePhase,
    description: String,
    started: Instant,
    last_emit: Option<Instant>,
}

impl PassReporter {
    fn new(pass: usize, total: usize, bytes_total: u64, phase: WipePhase, description: String) -> Self {
        Self {
            pass,
            total,
            bytes_total,
            phase,
            description,
            started: Instant::now(),
            last_emit: None,
        }
    }

    fn due(&mut self, force: bool) -> bool {
        let now = Instant::now();
        if force || self.last_emit.map_or(true, |t| now.duration_since(t) >= PROGRESS_INTERVAL) {
            self.last_emit = Some(now);
            true
        } else {
            false
        }
    }

    fn report(&mut self, done: u64, force: bool, ui: &mut dyn UserInterface) {
        if !self.due(force) {
            return;
        }

        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let throughput_bps = if secs > 0.0 {
            (done as f64 / secs) as u64
        } else {
            0
        };
        let eta = if throughput_bps > 0 && done < self.bytes_total {
            Some(Duration::from_secs(
                (self.bytes_total - done) / throughput_bps,
            ))
        } else {
            None
        };

        ui.progress(&WipeProgress {
            current_pass: self.pass,
            total_passes: self.total,
            bytes_done: done,
            bytes_total: self.bytes_total,
            elapsed,
            eta,
            throughput_bps,
            phase: self.phase,
            description: self.description.clone(),
        });
    }
}
