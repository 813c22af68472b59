/*!
 * System Information
 * Host memory layout facts, queried once per process
 */

#[cfg(not(windows))]
use super::limits::UNIX_MAX_ADDRESS;
use super::types::{Address, Pid};
use std::sync::LazyLock;

/// Memory layout facts about the running process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    /// Highest user-mode address
    pub max_address: Address,
    /// Granularity at which the OS hands out address space
    pub allocation_granularity: usize,
    /// Hardware page size
    pub page_size: usize,
    pub this_process_id: Pid,
}

static SYSTEM_INFO: LazyLock<SystemInfo> = LazyLock::new(SystemInfo::query);

/// Cached [`SystemInfo`] of the current process
#[inline]
pub fn system_info() -> &'static SystemInfo {
    &SYSTEM_INFO
}

impl SystemInfo {
    #[cfg(unix)]
    fn query() -> Self {
        // SAFETY: sysconf has no preconditions
        let reported = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size = usize::try_from(reported)
            .ok()
            .filter(|size| *size > 0)
            .unwrap_or(4096);

        Self {
            max_address: UNIX_MAX_ADDRESS,
            allocation_granularity: page_size,
            page_size,
            this_process_id: std::process::id(),
        }
    }

    #[cfg(windows)]
    fn query() -> Self {
        use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

        // SAFETY: GetSystemInfo fills the zeroed struct and cannot fail
        let info = unsafe {
            let mut info: SYSTEM_INFO = std::mem::zeroed();
            GetSystemInfo(&mut info);
            info
        };

        Self {
            max_address: info.lpMaximumApplicationAddress as Address,
            allocation_granularity: info.dwAllocationGranularity as usize,
            page_size: info.dwPageSize as usize,
            this_process_id: std::process::id(),
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn query() -> Self {
        Self {
            max_address: UNIX_MAX_ADDRESS,
            allocation_granularity: 4096,
            page_size: 4096,
            this_process_id: std::process::id(),
        }
    }
}
