/*!
 * Windows Address Space
 *
 * Free regions from a `VirtualQuery(Ex)` page walk, commits through
 * `VirtualAlloc(Ex)`. Other processes are reachable with the
 * `external_processes` feature.
 */

use crate::core::errors::{BufferError, BufferResult};
use crate::core::range::AddressRange;
use crate::core::sysinfo::system_info;
use crate::core::types::{Address, Pid, Size};
use crate::memory::traits::PlatformAllocator;
use std::ffi::c_void;
use std::mem;
use tracing::trace;
use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, VirtualQuery, MEMORY_BASIC_INFORMATION, MEM_COMMIT, MEM_FREE,
    MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READWRITE,
};

#[cfg(feature = "external_processes")]
use crate::core::limits::WOW64_MAX_ADDRESS;
#[cfg(feature = "external_processes")]
use windows_sys::Win32::Foundation::{CloseHandle, BOOL, HANDLE};
#[cfg(feature = "external_processes")]
use windows_sys::Win32::System::Memory::{VirtualAllocEx, VirtualFreeEx, VirtualQueryEx};
#[cfg(feature = "external_processes")]
use windows_sys::Win32::System::Threading::{IsWow64Process, OpenProcess, PROCESS_ALL_ACCESS};

/// Owned handle to another process
#[cfg(feature = "external_processes")]
#[derive(Debug)]
struct ProcessHandle(HANDLE);

#[cfg(feature = "external_processes")]
impl ProcessHandle {
    fn open(pid: Pid) -> BufferResult<Self> {
        // SAFETY: OpenProcess has no memory preconditions
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, 0, pid) };
        if handle == 0 {
            return Err(BufferError::PlatformUnsupported(format!(
                "cannot open process {pid}: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(Self(handle))
    }

    /// Max address of the target, capped for 32-bit targets under WOW64
    fn max_address(&self) -> Address {
        let mut is_wow64: BOOL = 0;
        // SAFETY: valid handle, out pointer to a local
        let queried = unsafe { IsWow64Process(self.0, &mut is_wow64) } != 0;
        if queried && is_wow64 == 0 {
            system_info().max_address
        } else {
            WOW64_MAX_ADDRESS
        }
    }
}

#[cfg(feature = "external_processes")]
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: we own the handle
        unsafe {
            CloseHandle(self.0);
        }
    }
}

#[derive(Debug)]
enum Target {
    Local,
    #[cfg(feature = "external_processes")]
    Remote(ProcessHandle),
}

/// Address space of a process on Windows
#[derive(Debug)]
pub struct WindowsAllocator {
    target: Target,
    max_address: Address,
}

impl WindowsAllocator {
    /// Allocator for the current process
    pub fn local() -> Self {
        Self {
            target: Target::Local,
            max_address: system_info().max_address,
        }
    }

    /// Allocator for `pid`, which may be the current process
    pub fn for_process(pid: Pid) -> BufferResult<Self> {
        if pid == system_info().this_process_id {
            return Ok(Self::local());
        }

        #[cfg(feature = "external_processes")]
        {
            let handle = ProcessHandle::open(pid)?;
            let max_address = handle.max_address();
            return Ok(Self {
                target: Target::Remote(handle),
                max_address,
            });
        }

        #[cfg(not(feature = "external_processes"))]
        Err(BufferError::PlatformUnsupported(format!(
            "allocating in process {pid} requires the external_processes feature"
        )))
    }

    fn query(&self, address: Address) -> Option<MEMORY_BASIC_INFORMATION> {
        // SAFETY: zeroed POD filled in by the query
        let mut info: MEMORY_BASIC_INFORMATION = unsafe { mem::zeroed() };
        let length = mem::size_of::<MEMORY_BASIC_INFORMATION>();

        let written = match &self.target {
            // SAFETY: the out pointer references a local of the declared length
            Target::Local => unsafe { VirtualQuery(address as *const c_void, &mut info, length) },
            #[cfg(feature = "external_processes")]
            Target::Remote(handle) => unsafe {
                VirtualQueryEx(handle.0, address as *const c_void, &mut info, length)
            },
        };

        (written != 0).then_some(info)
    }
}

fn region_of(info: &MEMORY_BASIC_INFORMATION) -> AddressRange {
    AddressRange::from_start_and_length(info.BaseAddress as Address, info.RegionSize)
}

impl PlatformAllocator for WindowsAllocator {
    fn max_address(&self) -> Address {
        self.max_address
    }

    fn allocation_granularity(&self) -> usize {
        system_info().allocation_granularity
    }

    fn free_regions(&self, min_address: Address, max_address: Address) -> BufferResult<Vec<AddressRange>> {
        let mut free = Vec::new();
        let mut current = min_address;

        while current <= max_address {
            let Some(info) = self.query(current) else { break };
            let region = region_of(&info);

            if info.State == MEM_FREE {
                free.push(region);
            }

            match region.end_inclusive.checked_add(1) {
                Some(next) if next > current => current = next,
                _ => break,
            }
        }

        Ok(free)
    }

    fn try_commit(&self, address: Address, size: Size) -> Option<Address> {
        let requested = address as *const c_void;
        let allocated = match &self.target {
            // SAFETY: reserving at a fixed address never touches existing memory
            Target::Local => unsafe {
                VirtualAlloc(requested, size, MEM_RESERVE | MEM_COMMIT, PAGE_EXECUTE_READWRITE)
            },
            #[cfg(feature = "external_processes")]
            Target::Remote(handle) => unsafe {
                VirtualAllocEx(
                    handle.0,
                    requested,
                    size,
                    MEM_RESERVE | MEM_COMMIT,
                    PAGE_EXECUTE_READWRITE,
                )
            },
        };

        if allocated.is_null() {
            trace!(address = format_args!("{address:#x}"), size, "VirtualAlloc refused candidate");
            return None;
        }

        if allocated as Address != address {
            self.release(allocated as Address, size);
            return None;
        }

        Some(address)
    }

    fn release(&self, address: Address, _size: Size) {
        // MEM_RELEASE frees the whole reservation and requires a zero size
        match &self.target {
            // SAFETY: only called on reservations this allocator made
            Target::Local => unsafe {
                VirtualFree(address as *mut c_void, 0, MEM_RELEASE);
            },
            #[cfg(feature = "external_processes")]
            Target::Remote(handle) => unsafe {
                VirtualFreeEx(handle.0, address as *mut c_void, 0, MEM_RELEASE);
            },
        }
    }

    fn region_at(&self, address: Address) -> Option<AddressRange> {
        self.query(address).map(|info| region_of(&info))
    }

    fn supports_brute_force(&self) -> bool {
        true
    }
}
