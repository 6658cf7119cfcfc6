//! The fixed pass tables.
//!
//! Plans are data: every algorithm tag maps to a hard-coded sequence that
//! is identical across invocations and platforms and independent of device
//! contents. `None` entries are CSPRNG passes, `Some` entries are tiled
//! patterns.

use super::WipePass;
use crate::config::WipeAlgorithm;

/// Gutmann's 35-pass sequence (Secure Deletion of Data from Magnetic and
/// Solid-State Memory, 1996). Passes 1-4 and 32-35 are random; 5-31 target
/// the MFM/RLL encoding families.
const GUTMANN: [Option<&[u8]>; 35] = [
    None,
    None,
    None,
    None,
    Some(&[0x55]),
    Some(&[0xAA]),
    Some(&[0x92, 0x49, 0x24]),
    Some(&[0x49, 0x24, 0x92]),
    Some(&[0x24, 0x92, 0x49]),
    Some(&[0x00]),
    Some(&[0x11]),
    Some(&[0x22]),
    Some(&[0x33]),
    Some(&[0x44]),
    Some(&[0x55]),
    Some(&[0x66]),
    Some(&[0x77]),
    Some(&[0x88]),
    Some(&[0x99]),
    Some(&[0xAA]),
    Some(&[0xBB]),
    Some(&[0xCC]),
    Some(&[0xDD]),
    Some(&[0xEE]),
    Some(&[0xFF]),
    Some(&[0x92, 0x49, 0x24]),
    Some(&[0x49, 0x24, 0x92]),
    Some(&[0x24, 0x92, 0x49]),
    Some(&[0x6D, 0xB6, 0xDB]),
    Some(&[0xB6, 0xDB, 0x6D]),
    Some(&[0xDB, 0x6D, 0xB6]),
    None,
    None,
    None,
    None,
];

/// DoD 5220.22-M, 7-pass variant.
const DOD_7: [Option<&[u8]>; 7] = [
    Some(&[0x00]),
    Some(&[0xFF]),
    None,
    Some(&[0x00]),
    Some(&[0xFF]),
    None,
    None,
];

/// DoD short: three random passes.
const DOD_3: [Option<&[u8]>; 3] = [None, None, None];

const RANDOM: [Option<&[u8]>; 1] = [None];

const ZERO: [Option<&[u8]>; 1] = [Some(&[0x00])];

/// The write-pass sequence for `algorithm`. VERIFY_ONLY writes nothing and
/// yields an empty plan; its read-scan is the engine's concern.
pub fn plan_for(algorithm: WipeAlgorithm) -> Vec<WipePass> {
    let table: &[Option<&[u8]>] = match algorithm {
        WipeAlgorithm::Gutmann => &GUTMANN,
        WipeAlgorithm::Dod7 => &DOD_7,
        WipeAlgorithm::Dod3 => &DOD_3,
        WipeAlgorithm::Random => &RANDOM,
        WipeAlgorithm::Zero => &ZERO,
        WipeAlgorithm::VerifyOnly => &[],
    };

    table
        .iter()
        .map(|entry| match entry {
            None => WipePass::Random,
            Some(pattern) => WipePass::Pattern(pattern.to_vec()),
        })
        .collect()
}
