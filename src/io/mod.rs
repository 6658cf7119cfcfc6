//! Raw block-device I/O.
//!
//! The wipe engine needs uncached, serialized access to whole devices. This
//! module provides the uniform handle it writes through: cache-bypassing
//! open flags where the platform has them, a raw-path rewrite where raw and
//! buffered device nodes coexist, page-aligned buffers for unbuffered
//! writes, and the strongest flush-to-media primitive the host offers.

use std::alloc::{alloc, dealloc, Layout};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::ptr::NonNull;

/// Alignment unit for unbuffered device access.
pub const SECTOR_SIZE: usize = 512;

/// Buffer alignment; covers every O_DIRECT implementation we target.
pub const PAGE_SIZE: usize = 4096;

/// Chunk size for whole-device traversal (4 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("buffer allocation failed: {0}")]
    AllocationFailed(String),
}

/// Rewrite a buffered disk node to its raw (character) sibling on hosts
/// where the two coexist: `/dev/disk3` becomes `/dev/rdisk3`. Already-raw
/// paths and everything else pass through unchanged.
pub fn raw_device_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, name)) if name.starts_with("disk") => format!("{}/r{}", dir, name),
        _ => path.to_string(),
    }
}

/// True when `path` names a block (or raw character) device node rather
/// than a regular file.
#[cfg(unix)]
pub fn is_device_node(path: &str) -> bool {
    use nix::sys::stat::{stat, SFlag};

    match stat(path) {
        Ok(st) => {
            let fmt = SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT;
            fmt == SFlag::S_IFBLK || fmt == SFlag::S_IFCHR
        }
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_device_node(_path: &str) -> bool {
    false
}

/// Probe whether the device behind `path` is solid-state. `None` when the
/// host gives no answer (regular files, exotic buses).
pub fn is_solid_state(path: &str) -> Option<bool> {
    #[cfg(target_os = "linux")]
    {
        let name = Path::new(path).file_name()?.to_str()?;
        let sysfs = format!("/sys/block/{}/queue/rotational", name);
        let rotational = std::fs::read_to_string(sysfs).ok()?;
        Some(rotational.trim() == "0")
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = path;
        None
    }
}

/// Heap buffer aligned for unbuffered device writes.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate `size` bytes aligned to [`PAGE_SIZE`]. `size` is rounded up
    /// to a sector multiple so the whole buffer is always writable through
    /// an unbuffered handle.
    pub fn new(size: usize) -> DeviceResult<Self> {
        let size = size.div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
        let layout = Layout::from_size_align(size, PAGE_SIZE)
            .map_err(|e| DeviceError::AllocationFailed(e.to_string()))?;

        // Safety: layout has non-zero size after rounding (size 0 rounds to 0
        // only for size 0, which we reject).
        if size == 0 {
            return Err(DeviceError::AllocationFailed(
                "zero-sized buffer".to_string(),
            ));
        }
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            DeviceError::AllocationFailed(format!("allocation of {} bytes failed", size))
        })?;

        Ok(Self { ptr, layout })
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // Safety: ptr is valid for layout.size() bytes for the buffer's lifetime
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safety: as above, and we hold &mut self
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // Safety: allocated with the same layout in new()
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// Safety: the buffer is plain owned memory with no interior sharing.
unsafe impl Send for AlignedBuffer {}

/// Uniform handle over a device (or regular file, for tests and images).
///
/// Device nodes are opened with cache-bypass semantics; regular files are
/// opened buffered and carry no alignment requirement.
#[derive(Debug)]
pub struct DeviceHandle {
    file: File,
    path: String,
    direct: bool,
    size: u64,
}

impl DeviceHandle {
    /// Open for writing with the platform's uncached-write semantics.
    pub fn open_write(path: &str) -> DeviceResult<Self> {
        Self::open(path, true)
    }

    /// Open for reading (verification scans).
    pub fn open_read(path: &str) -> DeviceResult<Self> {
        Self::open(path, false)
    }

    fn open(path: &str, write: bool) -> DeviceResult<Self> {
        #[cfg(target_os = "macos")]
        let path = raw_device_path(path);
        #[cfg(not(target_os = "macos"))]
        let path = path.to_string();

        let direct = is_device_node(&path);

        let mut opts = OpenOptions::new();
        opts.read(!write).write(write);

        #[cfg(target_os = "linux")]
        if direct {
            use std::os::unix::fs::OpenOptionsExt;
            // O_DIRECT bypasses the page cache; O_SYNC makes every write
            // write-through.
            opts.custom_flags(libc::O_DIRECT | libc::O_SYNC);
        }

        let file = opts.open(&path).map_err(|source| DeviceError::Open {
            path: path.clone(),
            source,
        })?;

        #[cfg(target_os = "macos")]
        if direct {
            use std::os::unix::io::AsRawFd;
            // F_NOCACHE bypasses the buffer cache on macOS.
            unsafe {
                libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1);
            }
        }

        let mut handle = Self {
            file,
            path,
            direct,
            size: 0,
        };
        handle.size = handle.probe_size()?;
        handle.seek_begin()?;
        Ok(handle)
    }

    fn probe_size(&mut self) -> DeviceResult<u64> {
        // Seek-to-end works uniformly for block devices and regular files.
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Total size of the device in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether writes through this handle must be sector-aligned.
    pub fn requires_alignment(&self) -> bool {
        self.direct
    }

    pub fn seek_begin(&mut self) -> DeviceResult<()> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Write, retrying interrupted calls. Returns the byte count the OS
    /// accepted; short writes are the caller's to advance past.
    pub fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        loop {
            match self.file.write(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read, retrying interrupted calls. Returns 0 only at end of device.
    pub fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        loop {
            match self.file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Flush to media with the strongest primitive available: F_FULLFSYNC
    /// where the host has it, fsync otherwise, whole-system sync as the
    /// last resort.
    pub fn sync(&mut self) -> DeviceResult<()> {
        #[cfg(target_os = "macos")]
        {
            use std::os::unix::io::AsRawFd;
            let rc = unsafe { libc::fcntl(self.file.as_raw_fd(), libc::F_FULLFSYNC) };
            if rc == 0 {
                return Ok(());
            }
        }

        match self.file.sync_all() {
            Ok(()) => Ok(()),
            Err(e) => {
                // Some raw nodes reject fsync; a global sync still flushes.
                log::debug!("fsync on {} failed ({}); falling back to sync()", self.path, e);
                crate::platform::sync_disks();
                Ok(())
            }
        }
    }
}
