pub mod cmdline;

use crate::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default location of the persisted configuration record.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/vaultguard.conf";

/// Hard bounds on the per-session attempt budget.
pub const MIN_ATTEMPTS: u32 = 1;
pub const MAX_ATTEMPTS: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethodKind {
    Password,
    Fingerprint,
    Voice,
}

impl fmt::Display for AuthMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethodKind::Password => write!(f, "password"),
            AuthMethodKind::Fingerprint => write!(f, "fingerprint"),
            AuthMethodKind::Voice => write!(f, "voice"),
        }
    }
}

/// Overwrite algorithm tags. The serialized names are the stable on-disk
/// strings; `dod` and `schneier` are accepted as legacy aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WipeAlgorithm {
    Gutmann,
    #[serde(rename = "dod522022m", alias = "dod", alias = "schneier")]
    Dod7,
    #[serde(rename = "dodshort")]
    Dod3,
    Random,
    Zero,
    #[serde(rename = "verify")]
    VerifyOnly,
}

impl fmt::Display for WipeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WipeAlgorithm::Gutmann => "gutmann",
            WipeAlgorithm::Dod7 => "dod522022m",
            WipeAlgorithm::Dod3 => "dodshort",
            WipeAlgorithm::Random => "random",
            WipeAlgorithm::Zero => "zero",
            WipeAlgorithm::VerifyOnly => "verify",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for WipeAlgorithm {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gutmann" => Ok(WipeAlgorithm::Gutmann),
            "dod522022m" | "dod" | "schneier" => Ok(WipeAlgorithm::Dod7),
            "dodshort" => Ok(WipeAlgorithm::Dod3),
            "random" => Ok(WipeAlgorithm::Random),
            "zero" => Ok(WipeAlgorithm::Zero),
            "verify" => Ok(WipeAlgorithm::VerifyOnly),
            other => Err(VaultError::ConfigInvalid(format!(
                "unknown wipe algorithm '{}'",
                other
            ))),
        }
    }
}

/// The persisted configuration record. Immutable for the lifetime of an
/// authentication session; the attempt counter lives in the gate, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub auth_methods: Vec<AuthMethodKind>,

    pub max_attempts: u32,

    /// Hash-format-tagged credential reference ($6$... or $vg$...).
    /// Empty exactly when PASSWORD is not an enabled method.
    #[serde(rename = "password_hash", default)]
    pub password_reference: String,

    /// Empty exactly when VOICE is not an enabled method.
    #[serde(default)]
    pub voice_passphrase: String,

    /// Whole block device the dead-man's switch destroys.
    pub target_device: String,

    #[serde(default)]
    pub mount_point: String,

    pub wipe_algorithm: WipeAlgorithm,

    #[serde(default = "default_true")]
    pub encrypt_before_wipe: bool,

    #[serde(default)]
    pub verify_passes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_methods: vec![AuthMethodKind::Password],
            max_attempts: 3,
            password_reference: String::new(),
            voice_passphrase: String::new(),
            target_device: String::new(),
            mount_point: String::new(),
            wipe_algorithm: WipeAlgorithm::Dod3,
            encrypt_before_wipe: true,
            verify_passes: false,
        }
    }
}

impl Config {
    /// Enforce the structural constraints of the record. Called after the
    /// kernel command line overrides have been applied; a failure here means
    /// the gate is never entered.
    pub fn validate(&self) -> VaultResult<()> {
        if self.auth_methods.is_empty() {
            return Err(VaultError::ConfigInvalid(
                "no authentication methods enabled".into(),
            ));
        }

        if !(MIN_ATTEMPTS..=MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(VaultError::ConfigInvalid(format!(
                "max_attempts {} outside {}..={}",
                self.max_attempts, MIN_ATTEMPTS, MAX_ATTEMPTS
            )));
        }

        if self.target_device.is_empty() {
            return Err(VaultError::ConfigMissing("no target device".into()));
        }

        let password_enabled = self.auth_methods.contains(&AuthMethodKind::Password);
        if password_enabled && self.password_reference.is_empty() {
            return Err(VaultError::ConfigMissing("no credential reference".into()));
        }
        if !password_enabled && !self.password_reference.is_empty() {
            return Err(VaultError::ConfigInvalid(
                "password_hash set but password method disabled".into(),
            ));
        }
        if password_enabled {
            crate::auth::verifier::check_reference_format(&self.password_reference)
                .map_err(|e| VaultError::ConfigInvalid(e.to_string()))?;
        }

        let voice_enabled = self.auth_methods.contains(&AuthMethodKind::Voice);
        if voice_enabled && self.voice_passphrase.is_empty() {
            return Err(VaultError::ConfigMissing("no voice passphrase".into()));
        }
        if !voice_enabled && !self.voice_passphrase.is_empty() {
            return Err(VaultError::ConfigInvalid(
                "voice_passphrase set but voice method disabled".into(),
            ));
        }

        Ok(())
    }

    /// Non-fatal observations about the record, surfaced after validation.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.wipe_algorithm == WipeAlgorithm::VerifyOnly {
            warnings.push(
                "wipe_algorithm is 'verify': the dead-man's switch will scan the \
                 device but destroy nothing beyond the cryptographic scramble"
                    .to_string(),
            );
        }
        if self.mount_point.is_empty() {
            warnings.push("no mount_point configured; pre-wipe unmount will be skipped".into());
        }
        warnings
    }
}

/// Read the configuration record from `path`.
pub fn load(path: &Path) -> VaultResult<Config> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VaultError::ConfigMissing(path.display().to_string())
        } else {
            VaultError::Io(e)
        }
    })?;

    serde_json::from_str(&raw)
        .map_err(|e| VaultError::ConfigInvalid(format!("{}: {}", path.display(), e)))
}

/// Persist the configuration record to `path`, restricting permissions to
/// the owner (the record carries the credential reference).
pub fn save(config: &Config, path: &Path) -> VaultResult<()> {
    let raw = serde_json::to_string_pretty(config)
        .map_err(|e| VaultError::ConfigInvalid(e.to_string()))?;

    std::fs::write(path, raw)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}
