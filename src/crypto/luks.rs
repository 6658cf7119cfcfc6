//! Disk-encryption collaborator.
//!
//! The gate never manipulates LUKS metadata itself; it drives the
//! `cryptsetup` binary the same way the drive layer drives `hdparm`. When
//! the binary is absent every operation reports unavailability and the
//! caller skips the step.

use crate::crypto::secure_rng::secure_random_bytes;
use crate::{VaultError, VaultResult};
use log::{debug, info};
use std::io::{Seek, SeekFrom, Write};
use std::process::{Command, Stdio};
use zeroize::Zeroize;

/// Mapping name the launcher opens the guarded volume under.
pub const MAPPING_NAME: &str = "vaultguard";

/// Size of the throwaway passphrase written to the scramble keyfile.
const KEYFILE_BYTES: usize = 512;

/// True when the cryptsetup binary is present and answers.
pub fn available() -> bool {
    Command::new("cryptsetup")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Close an open device-mapper mapping.
pub fn close(mapping: &str) -> VaultResult<()> {
    debug!("closing dm mapping '{}'", mapping);
    let status = Command::new("cryptsetup")
        .args(["close", mapping])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(VaultError::Platform(format!(
            "cryptsetup close exited with {}",
            status
        )))
    }
}

/// Reformat `device` as a fresh LUKS volume keyed by CSPRNG material that
/// is destroyed immediately afterwards. Once this returns, the previous
/// ciphertext is unreachable even if the overwrite that follows is cut
/// short: the old volume key no longer exists anywhere.
pub fn scramble_format(device: &str) -> VaultResult<()> {
    info!("scrambling {} with a discarded random key", device);

    let mut passphrase = vec![0u8; KEYFILE_BYTES];
    secure_random_bytes(&mut passphrase)?;

    let mut keyfile = tempfile::NamedTempFile::new()?;
    keyfile.write_all(&passphrase)?;
    keyfile.flush()?;
    passphrase.zeroize();

    let status = Command::new("cryptsetup")
        .args(["luksFormat", "--batch-mode", "--type", "luks2", "--key-file"])
        .arg(keyfile.path())
        .arg(device)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    // Shred the keyfile contents before the tempfile is unlinked, whatever
    // luksFormat said.
    scrub_keyfile(&mut keyfile);

    let status = status?;
    if status.success() {
        Ok(())
    } else {
        Err(VaultError::Platform(format!(
            "cryptsetup luksFormat exited with {}",
            status
        )))
    }
}

fn scrub_keyfile(keyfile: &mut tempfile::NamedTempFile) {
    let zeros = [0u8; KEYFILE_BYTES];
    let file = keyfile.as_file_mut();
    let _ = file.seek(SeekFrom::Start(0));
    let _ = file.write_all(&zeros);
    let _ = file.sync_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn scrub_overwrites_keyfile_contents() {
        let mut keyfile = tempfile::NamedTempFile::new().unwrap();
        keyfile.write_all(&[0xAAu8; KEYFILE_BYTES]).unwrap();
        keyfile.flush().unwrap();

        scrub_keyfile(&mut keyfile);

        let mut contents = Vec::new();
        keyfile.as_file_mut().seek(SeekFrom::Start(0)).unwrap();
        keyfile.as_file_mut().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, vec![0u8; KEYFILE_BYTES]);
    }

    #[test]
    fn close_without_cryptsetup_or_mapping_errors() {
        // Either cryptsetup is missing (spawn error) or the mapping does not
        // exist (non-zero exit); both must surface as an error, which the
        // sequencer then swallows.
        assert!(close("vaultguard-test-nonexistent").is_err());
    }
}
