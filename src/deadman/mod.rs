//! The dead-man's switch: a linear, uninterruptible destruction pipeline.
//!
//! Entered exactly once, when the gate exhausts its attempt budget. There
//! are no recovery states: after the signal lockdown every stage either
//! advances or is logged and skipped, and control always reaches the
//! overwrite, the sync, and the power-off unless the machine loses power
//! first. Nothing here returns.

use crate::config::Config;
use crate::crypto::luks;
use crate::platform;
use crate::ui::UserInterface;
use crate::wipe::WipeEngine;
use crate::WipeAlgorithm;
use log::{error, info, warn};
use std::time::Duration;

/// Length of the fixed countdown notice. Informational only; nothing can
/// cancel it.
pub const COUNTDOWN_SECONDS: u32 = 5;

/// Run the destruction pipeline to power-off. Never returns.
pub fn execute(config: &Config, ui: &mut dyn UserInterface) -> ! {
    // Stage 1: interrupt lockdown. From here the only exits are power loss
    // and our own shutdown call.
    platform::ignore_termination_signals();
    info!("dead-man's switch armed for {}", config.target_device);

    // Stage 2: countdown notice.
    for seconds_left in (1..=COUNTDOWN_SECONDS).rev() {
        ui.show_destruction_warning(seconds_left);
        std::thread::sleep(Duration::from_secs(1));
    }

    // Stage 3: cleanup. Failures are swallowed; a busy mount must not keep
    // the device alive.
    cleanup(config);

    // Stage 4: cryptographic scramble. A failure here does not abort the
    // overwrite.
    if config.encrypt_before_wipe {
        if luks::available() {
            ui.status("scrambling volume key");
            if let Err(e) = luks::scramble_format(&config.target_device) {
                warn!("scramble failed: {}", e);
                ui.error("scramble step failed; continuing with overwrite");
            }
        } else {
            warn!("disk-encryption backend unavailable; skipping scramble");
        }
    }

    // Stage 5: overwrite, with a single-pass random fallback.
    overwrite(config, ui);

    // Stage 6: flush everything the overwrite may have left buffered.
    platform::sync_disks();

    // Stage 7: power off. If the primitive ever returns, park forever;
    // control never goes back to the gate or to main.
    ui.status("powering off");
    platform::shutdown();
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}

fn cleanup(config: &Config) {
    if !config.mount_point.is_empty() {
        if let Err(e) = platform::unmount(&config.mount_point) {
            warn!("pre-wipe unmount failed: {}", e);
        }
    }
    if let Err(e) = luks::close(luks::MAPPING_NAME) {
        // Usually just means the mapping was never open.
        log::debug!("mapping close: {}", e);
    }
}

fn overwrite(config: &Config, ui: &mut dyn UserInterface) {
    let mut engine = WipeEngine::new(&config.target_device, config.verify_passes);

    match engine.run(config.wipe_algorithm, ui) {
        Ok(summary) => {
            info!(
                "overwrite complete: {} passes, {} bytes, {} verify mismatches",
                summary.passes_completed, summary.bytes_written, summary.verify_mismatches
            );
        }
        Err(e) => {
            error!("{} overwrite failed: {}", config.wipe_algorithm, e);
            ui.error("overwrite failed; falling back to a single random pass");

            let mut fallback = WipeEngine::new(&config.target_device, false);
            match fallback.run(WipeAlgorithm::Random, ui) {
                Ok(summary) => {
                    info!("fallback pass wrote {} bytes", summary.bytes_written);
                }
                Err(e) => error!("fallback overwrite failed too: {}", e),
            }
        }
    }
}
