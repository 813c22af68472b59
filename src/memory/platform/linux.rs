/*!
 * Linux Address Space
 * Free regions from `/proc/<pid>/maps`, commits through `mmap`
 */

use super::maps;
use crate::core::errors::{BufferError, BufferResult};
use crate::core::range::AddressRange;
use crate::core::sysinfo::system_info;
use crate::core::types::{Address, Pid, Size};
use crate::memory::traits::PlatformAllocator;
use libc::{
    MAP_ANONYMOUS, MAP_FAILED, MAP_FIXED_NOREPLACE, MAP_PRIVATE, PROT_EXEC, PROT_READ, PROT_WRITE,
};
use std::fs;
use tracing::trace;

/// Address space of the current process on Linux
#[derive(Debug, Clone)]
pub struct LinuxAllocator {
    pid: Pid,
}

impl LinuxAllocator {
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }
}

impl PlatformAllocator for LinuxAllocator {
    fn max_address(&self) -> Address {
        system_info().max_address
    }

    fn allocation_granularity(&self) -> usize {
        system_info().allocation_granularity
    }

    fn free_regions(&self, min_address: Address, max_address: Address) -> BufferResult<Vec<AddressRange>> {
        let path = format!("/proc/{}/maps", self.pid);
        let listing = fs::read_to_string(&path)
            .map_err(|e| BufferError::MalformedPlatformData(format!("{path}: {e}")))?;

        let mapped = maps::parse_memory_map(&listing)?;
        let window = AddressRange::new(min_address, max_address);

        Ok(maps::free_regions(mapped, max_address)
            .into_iter()
            .filter(|region| region.overlaps(&window))
            .collect())
    }

    fn try_commit(&self, address: Address, size: Size) -> Option<Address> {
        // SAFETY: MAP_FIXED_NOREPLACE never clobbers an existing mapping
        let allocated = unsafe {
            libc::mmap(
                address as *mut libc::c_void,
                size,
                PROT_READ | PROT_WRITE | PROT_EXEC,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_FIXED_NOREPLACE,
                -1,
                0,
            )
        };

        if allocated == MAP_FAILED {
            trace!(address = format_args!("{address:#x}"), size, "mmap refused candidate");
            return None;
        }

        // Kernels before 4.17 ignore the flag and treat the address as a hint
        if allocated as Address != address {
            self.release(allocated as Address, size);
            return None;
        }

        Some(address)
    }

    fn release(&self, address: Address, size: Size) {
        // SAFETY: only called on mappings this allocator created
        unsafe {
            libc::munmap(address as *mut libc::c_void, size);
        }
    }
}
