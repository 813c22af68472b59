/*!
 * Locator Finder
 *
 * Process-wide discovery of the first locator header. Every module that links
 * this crate has its own statics, so they meet through a named shared mapping
 * keyed by the process id: the first caller creates and stamps the header,
 * later callers read its self pointer. The result is cached per finder.
 */

use super::header::LocatorHeader;
use super::mapping::{self, SharedMapping};
use crate::core::config::BuffersConfig;
use crate::core::errors::{BufferError, BufferResult};
use crate::core::limits::{ATTACH_TIMEOUT, ATTACH_WAIT_INTERVAL, LOCATOR_HEADER_LENGTH};
use crate::core::sysinfo::system_info;
use crate::core::types::Address;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How [`LocatorFinder::locate`] obtained the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindReason {
    /// Returned from this finder's cache
    Cached,
    /// Another caller in this process had already created the mapping
    PreviouslyExisted,
    /// This call created and initialized the mapping
    Created,
}

/// Bootstrap and cache of the first locator header
pub struct LocatorFinder {
    cached: AtomicUsize,
    mapping: Mutex<Option<Box<dyn SharedMapping>>>,
    mapping_dir: PathBuf,
    mapping_name: String,
}

static GLOBAL_FINDER: LazyLock<LocatorFinder> = LazyLock::new(|| {
    LocatorFinder::new(
        BuffersConfig::global().mapping_dir.clone(),
        mapping::mapping_name(system_info().this_process_id),
    )
});

/// Opens (or recreates) the mapping at most this many times per locate
const MAX_OPEN_ATTEMPTS: usize = 3;

impl LocatorFinder {
    /// Finder for the mapping `mapping_name`, backed by files in `mapping_dir` on unix
    pub fn new(mapping_dir: impl Into<PathBuf>, mapping_name: impl Into<String>) -> Self {
        Self {
            cached: AtomicUsize::new(0),
            mapping: Mutex::new(None),
            mapping_dir: mapping_dir.into(),
            mapping_name: mapping_name.into(),
        }
    }

    /// Finder shared by everything in this module
    pub fn global() -> &'static LocatorFinder {
        &GLOBAL_FINDER
    }

    pub fn mapping_dir(&self) -> &Path {
        &self.mapping_dir
    }

    pub fn mapping_name(&self) -> &str {
        &self.mapping_name
    }

    /// First header of the chain
    pub fn find(&self) -> BufferResult<&LocatorHeader> {
        self.locate().map(|(header, _)| header)
    }

    /// First header of the chain and how it was obtained
    pub fn locate(&self) -> BufferResult<(&LocatorHeader, FindReason)> {
        if let Some(header) = self.cached_header() {
            return Ok((header, FindReason::Cached));
        }

        let mut mapping = self.mapping.lock();

        // Another thread finished the bootstrap while we waited
        if let Some(header) = self.cached_header() {
            return Ok((header, FindReason::Cached));
        }

        let length = system_info().allocation_granularity.max(LOCATOR_HEADER_LENGTH);

        for _ in 0..MAX_OPEN_ATTEMPTS {
            let opened = match mapping::open_or_create(&self.mapping_name, length, &self.mapping_dir) {
                Ok(opened) => opened,
                Err(BufferError::PlatformUnsupported(reason)) => {
                    debug!(%reason, "Named mappings unavailable, using a private header");
                    let header = LocatorHeader::new_detached()?;
                    self.cached.store(header.this_address(), Ordering::Release);
                    return Ok((header, FindReason::Created));
                }
                Err(e) => return Err(e),
            };

            if opened.already_existed() {
                match Self::attach(opened.as_ref()) {
                    Some(address) => {
                        self.cached.store(address, Ordering::Release);
                        debug!(address = format_args!("{address:#x}"), "Attached to existing locator");
                        // SAFETY: validated as a live header stamped in this process
                        return Ok((unsafe { LocatorHeader::from_raw(address) }, FindReason::PreviouslyExisted));
                    }
                    None => {
                        warn!(name = %self.mapping_name, "Discarding stale locator mapping");
                        opened.unlink()?;
                        continue;
                    }
                }
            }

            let address = opened.data().as_ptr() as Address;
            // SAFETY: freshly created and zeroed, attachers wait until initialize publishes it
            let header = unsafe { LocatorHeader::from_raw(address) };
            header.initialize(opened.len());
            self.cached.store(address, Ordering::Release);
            *mapping = Some(opened);

            info!(address = format_args!("{address:#x}"), length, "Created locator header");

            let removed = self.cleanup_orphans();
            if removed > 0 {
                info!(removed, "Removed orphaned locator mappings");
            }

            // SAFETY: the mapping is owned by this finder from now on
            return Ok((unsafe { LocatorHeader::from_raw(address) }, FindReason::Created));
        }

        Err(BufferError::LocatorUnavailable(format!(
            "mapping {} kept turning out stale",
            self.mapping_name
        )))
    }

    /// Self pointer of an existing mapping, once its creator has published it
    ///
    /// The creator stores the self pointer after everything else, so a
    /// non-zero value means the header is complete.
    fn attach(opened: &dyn SharedMapping) -> Option<Address> {
        // SAFETY: the view spans at least one header page
        let view = unsafe { LocatorHeader::from_raw(opened.data().as_ptr() as Address) };

        let deadline = Instant::now() + ATTACH_TIMEOUT;
        while Instant::now() < deadline {
            let address = view.this_address();
            if address == 0 {
                thread::sleep(ATTACH_WAIT_INTERVAL);
                continue;
            }

            if !is_mapped(address) {
                return None;
            }
            // SAFETY: the page at `address` is mapped in this process
            let header = unsafe { LocatorHeader::from_raw(address) };
            return header.is_stamped_at(address).then_some(address);
        }

        None
    }

    fn cached_header(&self) -> Option<&LocatorHeader> {
        let address = self.cached.load(Ordering::Acquire);
        // SAFETY: only validated or self-created headers are cached
        (address != 0).then(|| unsafe { LocatorHeader::from_raw(address) })
    }

    /// Removes mapping files whose owning process no longer exists
    #[cfg(unix)]
    pub fn cleanup_orphans(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.mapping_dir) else {
            return 0;
        };

        let this_process = system_info().this_process_id;
        let mut removed = 0;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(mapping::parse_mapping_pid) else {
                continue;
            };

            if pid == this_process || is_process_running(pid) {
                continue;
            }

            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => debug!(error = %e, pid, "Could not remove orphaned mapping"),
            }
        }

        removed
    }

    /// Named mappings die with their process elsewhere
    #[cfg(not(unix))]
    pub fn cleanup_orphans(&self) -> usize {
        0
    }

    /// Forgets the cached header and closes the mapping
    ///
    /// # Safety
    ///
    /// Every header and item reference obtained through this finder becomes
    /// dangling. Intended for tests only.
    pub unsafe fn reset(&self) {
        let mut mapping = self.mapping.lock();
        self.cached.store(0, Ordering::Release);
        *mapping = None;
    }
}

#[cfg(unix)]
fn is_process_running(pid: crate::core::types::Pid) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Alive but owned by someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Whether the page holding `address` is mapped in this process
#[cfg(unix)]
fn is_mapped(address: Address) -> bool {
    let page_size = system_info().page_size;
    let page = address - address % page_size;
    let mut residency = [0u8; 1];

    // SAFETY: mincore only inspects the page tables, it fails with ENOMEM for unmapped pages
    let result = unsafe { libc::mincore(page as _, page_size, residency.as_mut_ptr() as _) };
    result == 0
}

/// Whether the page holding `address` is committed in this process
#[cfg(windows)]
fn is_mapped(address: Address) -> bool {
    use windows_sys::Win32::System::Memory::{VirtualQuery, MEMORY_BASIC_INFORMATION, MEM_COMMIT};

    // SAFETY: all-zero is a valid MEMORY_BASIC_INFORMATION
    let mut info: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
    // SAFETY: VirtualQuery only reads the address space layout
    let written = unsafe {
        VirtualQuery(
            address as *const std::ffi::c_void,
            &mut info,
            std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
        )
    };
    written != 0 && info.State == MEM_COMMIT
}

#[cfg(not(any(unix, windows)))]
fn is_mapped(_address: Address) -> bool {
    true
}
