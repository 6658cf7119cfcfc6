//! Progress-line rendering for the console backend.

use crate::wipe::{WipePhase, WipeProgress};
use std::time::Duration;

const BAR_WIDTH: usize = 32;

/// Render one progress record as a single redrawable line.
pub(crate) fn render_line(update: &WipeProgress) -> String {
    let pct = if update.bytes_total == 0 {
        100.0
    } else {
        (update.bytes_done as f64 / update.bytes_total as f64) * 100.0
    };
    let pct = pct.clamp(0.0, 100.0);

    let filled = (((pct / 100.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));

    let phase = match update.phase {
        WipePhase::Write => "write",
        WipePhase::Verify => "verify",
    };

    let eta = match update.eta {
        Some(eta) => format!("  ETA {}", humantime::format_duration(whole_seconds(eta))),
        None => String::new(),
    };

    format!(
        "pass {}/{} [{}] {:>5.1}%  {} {}  {}/s{}",
        update.current_pass,
        update.total_passes,
        bar,
        pct,
        phase,
        update.description,
        human_bytes(update.throughput_bps as f64),
        eta
    )
}

// humantime prints sub-second noise unless the duration is whole seconds
fn whole_seconds(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs())
}

/// Convert a byte count or rate to a readable magnitude.
pub(crate) fn human_bytes(value: f64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    if value <= 0.0 {
        return "0B".to_string();
    }
    let mut val = value;
    let mut unit = 0usize;
    while val >= 1024.0 && unit + 1 < units.len() {
        val /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", val, units[unit])
}
