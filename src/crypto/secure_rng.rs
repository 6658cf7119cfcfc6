use crate::{VaultError, VaultResult};
use log::warn;
use ring::rand::{SecureRandom, SystemRandom};
use std::fs::File;
use std::io::Read;

/// A single source of cryptographically secure randomness.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> VaultResult<()>;
    /// Check if the source is usable on this host.
    fn is_available(&self) -> bool;
    /// Source name for logging.
    fn name(&self) -> &'static str;
}

/// Ring-based system random (uses the OS cryptographic RNG).
pub struct RingSystemRng {
    rng: SystemRandom,
}

impl Default for RingSystemRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RingSystemRng {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl EntropySource for RingSystemRng {
    fn fill_bytes(&self, dest: &mut [u8]) -> VaultResult<()> {
        self.rng
            .fill(dest)
            .map_err(|_| VaultError::Platform("SystemRandom refused to fill buffer".into()))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "RingSystemRng"
    }
}

/// /dev/urandom fallback source.
pub struct URandom {
    available: bool,
}

impl Default for URandom {
    fn default() -> Self {
        Self::new()
    }
}

impl URandom {
    pub fn new() -> Self {
        Self {
            available: std::path::Path::new("/dev/urandom").exists(),
        }
    }
}

impl EntropySource for URandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> VaultResult<()> {
        if !self.available {
            return Err(VaultError::Platform("/dev/urandom not available".into()));
        }

        let mut file = File::open("/dev/urandom")
            .map_err(|e| VaultError::Platform(format!("failed to open /dev/urandom: {}", e)))?;

        // Robust read: short reads are legal for character devices
        let mut total = 0usize;
        while total < dest.len() {
            let n = file
                .read(&mut dest[total..])
                .map_err(|e| VaultError::Platform(format!("/dev/urandom read failed: {}", e)))?;
            if n == 0 {
                return Err(VaultError::Platform(
                    "unexpected EOF reading /dev/urandom".into(),
                ));
            }
            total += n;
        }

        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "URandom"
    }
}

/// CSPRNG handle used by the wipe engine and the credential layer. The
/// primary source is the OS RNG via ring; /dev/urandom stands in if ring
/// ever refuses. Both refusing is fatal to the caller.
pub struct SecureRng {
    primary: RingSystemRng,
    fallback: URandom,
}

impl Default for SecureRng {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureRng {
    pub fn new() -> Self {
        Self {
            primary: RingSystemRng::new(),
            fallback: URandom::new(),
        }
    }

    pub fn fill(&self, dest: &mut [u8]) -> VaultResult<()> {
        match self.primary.fill_bytes(dest) {
            Ok(()) => Ok(()),
            Err(e) if self.fallback.is_available() => {
                warn!(
                    "{} failed ({}); falling back to {}",
                    self.primary.name(),
                    e,
                    self.fallback.name()
                );
                self.fallback.fill_bytes(dest)
            }
            Err(e) => Err(e),
        }
    }
}

/// One-shot fill from the platform CSPRNG. Fails only on catastrophic OS
/// refusal.
pub fn secure_random_bytes(dest: &mut [u8]) -> VaultResult<()> {
    SecureRng::new().fill(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_requested_length() {
        let mut buf = [0u8; 4096];
        secure_random_bytes(&mut buf).unwrap();
        // 4 KiB of CSPRNG output is never all zeros
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn zero_length_fill_is_ok() {
        let mut buf = [0u8; 0];
        secure_random_bytes(&mut buf).unwrap();
    }

    #[test]
    fn consecutive_fills_differ() {
        let rng = SecureRng::new();
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        rng.fill(&mut a).unwrap();
        rng.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn ring_source_reports_available() {
        assert!(RingSystemRng::new().is_available());
    }
}
