//! Kernel command line overrides.
//!
//! On hosts that expose the boot arguments, `vault_*` parameters override
//! the loaded record. They apply after file load and before validation, so
//! an out-of-range override fails validation like any other bad value.

use super::{Config, WipeAlgorithm};
use log::warn;
use std::str::FromStr;

const PROC_CMDLINE: &str = "/proc/cmdline";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmdlineOverrides {
    pub setup: bool,
    pub device: Option<String>,
    pub threshold: Option<u32>,
    pub wipe: Option<WipeAlgorithm>,
}

impl CmdlineOverrides {
    /// Parse overrides out of a kernel command line. Unknown parameters are
    /// ignored; malformed `vault_*` values are dropped with a warning.
    pub fn parse(cmdline: &str) -> Self {
        let mut overrides = Self::default();

        for token in cmdline.split_whitespace() {
            match token.split_once('=') {
                None if token == "vault_setup" => overrides.setup = true,
                Some(("vault_device", value)) if !value.is_empty() => {
                    overrides.device = Some(value.to_string());
                }
                Some(("vault_threshold", value)) => match value.parse::<u32>() {
                    Ok(n) => overrides.threshold = Some(n),
                    Err(_) => warn!("ignoring non-numeric vault_threshold '{}'", value),
                },
                Some(("vault_wipe", value)) => match WipeAlgorithm::from_str(value) {
                    Ok(WipeAlgorithm::VerifyOnly) => {
                        warn!("vault_wipe does not accept 'verify'; keeping configured algorithm");
                    }
                    Ok(algorithm) => overrides.wipe = Some(algorithm),
                    Err(_) => warn!("ignoring unknown vault_wipe '{}'", value),
                },
                _ => {}
            }
        }

        overrides
    }

    /// Read and parse the running kernel's command line. Hosts without
    /// procfs simply produce no overrides.
    pub fn from_proc() -> Self {
        match std::fs::read_to_string(PROC_CMDLINE) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Self::default(),
        }
    }

    /// Fold the overrides into a loaded record. Returns true when first-run
    /// setup was requested from the boot line.
    pub fn apply(&self, config: &mut Config) -> bool {
        if let Some(device) = &self.device {
            config.target_device = device.clone();
        }
        if let Some(threshold) = self.threshold {
            config.max_attempts = threshold;
        }
        if let Some(wipe) = self.wipe {
            config.wipe_algorithm = wipe;
        }
        self.setup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_overrides() {
        let overrides = CmdlineOverrides::parse(
            "BOOT_IMAGE=/vmlinuz root=/dev/sda2 vault_setup vault_device=/dev/sdb \
             vault_threshold=5 vault_wipe=gutmann quiet",
        );
        assert!(overrides.setup);
        assert_eq!(overrides.device.as_deref(), Some("/dev/sdb"));
        assert_eq!(overrides.threshold, Some(5));
        assert_eq!(overrides.wipe, Some(WipeAlgorithm::Gutmann));
    }

    #[test]
    fn ignores_unrelated_parameters() {
        let overrides = CmdlineOverrides::parse("ro quiet splash root=UUID=abcd");
        assert_eq!(overrides, CmdlineOverrides::default());
    }

    #[test]
    fn drops_malformed_values() {
        let overrides =
            CmdlineOverrides::parse("vault_threshold=lots vault_wipe=shred vault_device=");
        assert_eq!(overrides.threshold, None);
        assert_eq!(overrides.wipe, None);
        assert_eq!(overrides.device, None);
    }

    #[test]
    fn accepts_legacy_wipe_aliases() {
        let overrides = CmdlineOverrides::parse("vault_wipe=dod");
        assert_eq!(overrides.wipe, Some(WipeAlgorithm::Dod7));
    }

    #[test]
    fn rejects_verify_as_override() {
        let overrides = CmdlineOverrides::parse("vault_wipe=verify");
        assert_eq!(overrides.wipe, None);
    }

    #[test]
    fn out_of_range_threshold_is_kept_for_validation() {
        // Range is a validation concern, not a parse concern.
        let overrides = CmdlineOverrides::parse("vault_threshold=500");
        assert_eq!(overrides.threshold, Some(500));
    }

    #[test]
    fn apply_overrides_loaded_record() {
        let mut config = Config {
            target_device: "/dev/sda".into(),
            ..Config::default()
        };
        let overrides = CmdlineOverrides::parse("vault_device=/dev/nvme0n1 vault_threshold=2");
        let setup = overrides.apply(&mut config);
        assert!(!setup);
        assert_eq!(config.target_device, "/dev/nvme0n1");
        assert_eq!(config.max_attempts, 2);
    }
}
