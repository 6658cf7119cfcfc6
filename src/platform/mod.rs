//! Narrow surface over the host OS: memory pinning, guaranteed zeroing,
//! buffer flushing, unmounting, signal masking, and power-off. Raw device
//! I/O lives in `crate::io`; randomness lives in `crate::crypto`.

use crate::{VaultError, VaultResult};
use log::debug;
use zeroize::Zeroize;

/// Overwrite `buf` with zeros in a way the compiler cannot elide.
pub fn secure_zero(buf: &mut [u8]) {
    buf.zeroize();
}

/// Ask the OS to pin the whole address space against paging, so credential
/// and key material never reaches swap. Best effort: failure is reported,
/// never fatal.
#[cfg(unix)]
pub fn lock_memory() -> VaultResult<()> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| VaultError::Platform(format!("mlockall failed: {}", e)))
}

#[cfg(not(unix))]
pub fn lock_memory() -> VaultResult<()> {
    Err(VaultError::Platform(
        "memory pinning not supported on this platform".into(),
    ))
}

/// Set every catchable asynchronous termination/stop signal to be ignored.
/// After this call the only ways out of the process are power loss and the
/// shutdown primitive.
#[cfg(unix)]
pub fn ignore_termination_signals() {
    use nix::sys::signal::{signal, SigHandler, Signal};

    const LOCKED: [Signal; 7] = [
        Signal::SIGINT,
        Signal::SIGTERM,
        Signal::SIGHUP,
        Signal::SIGQUIT,
        Signal::SIGTSTP,
        Signal::SIGUSR1,
        Signal::SIGUSR2,
    ];

    for sig in LOCKED {
        // Safety: SigIgn installs no handler code, only the ignore
        // disposition.
        if let Err(e) = unsafe { signal(sig, SigHandler::SigIgn) } {
            debug!("could not ignore {:?}: {}", sig, e);
        }
    }
}

#[cfg(not(unix))]
pub fn ignore_termination_signals() {}

/// Flush OS buffers for every mounted filesystem and block device.
pub fn sync_disks() {
    #[cfg(unix)]
    unsafe {
        libc::sync();
    }
}

/// Detach the filesystem mounted at `path`.
#[cfg(target_os = "linux")]
pub fn unmount(path: &str) -> VaultResult<()> {
    use nix::mount::{umount2, MntFlags};

    umount2(path, MntFlags::MNT_DETACH)
        .map_err(|e| VaultError::Platform(format!("umount {} failed: {}", path, e)))
}

#[cfg(not(target_os = "linux"))]
pub fn unmount(path: &str) -> VaultResult<()> {
    let status = std::process::Command::new("umount").arg(path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(VaultError::Platform(format!(
            "umount {} exited with {}",
            path, status
        )))
    }
}

/// Restart the machine (first-run setup ends with a reboot so the gate
/// comes up against the persisted configuration).
#[cfg(target_os = "linux")]
pub fn reboot() {
    sync_disks();
    unsafe {
        libc::reboot(libc::LINUX_REBOOT_CMD_RESTART);
    }
    let _ = std::process::Command::new("reboot").status();
}

#[cfg(not(target_os = "linux"))]
pub fn reboot() {
    sync_disks();
    let _ = std::process::Command::new("shutdown")
        .args(["-r", "now"])
        .status();
}

/// Initiate power-off. Does not return on success; if it does return, the
/// caller is expected to park the CPU itself.
#[cfg(target_os = "linux")]
pub fn shutdown() {
    // Flush first: the power-off path does not run filesystem teardown.
    sync_disks();
    unsafe {
        libc::reboot(libc::LINUX_REBOOT_CMD_POWER_OFF);
    }
    // Direct reboot(2) needs CAP_SYS_BOOT; outside the initramfs fall back
    // to the init-mediated path.
    let _ = std::process::Command::new("poweroff").arg("-f").status();
}

#[cfg(not(target_os = "linux"))]
pub fn shutdown() {
    sync_disks();
    let _ = std::process::Command::new("shutdown")
        .args(["-h", "now"])
        .status();
}
