/*!
 * Allocation Settings
 * Request parameters for the allocator and the locator search
 */

use crate::core::config::BuffersConfig;
use crate::core::limits::DEFAULT_BUFFER_SIZE;
use crate::core::math::{add_with_overflow_cap, round_down, round_up, subtract_with_underflow_cap};
use crate::core::sysinfo::system_info;
use crate::core::types::{Address, Pid};
use serde::{Deserialize, Serialize};

/// Settings for a single [`BufferAllocator`](super::BufferAllocator) request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferAllocatorSettings {
    /// Lowest acceptable address of the allocation
    pub min_address: Address,
    /// Highest acceptable address (inclusive) the allocation may touch
    pub max_address: Address,
    /// Requested size in bytes, rounded up to the allocation granularity
    pub size: u32,
    /// Process the memory is allocated in
    pub target_process_id: Pid,
    /// Full rescans of the free region list
    ///
    /// Regions reported free can be taken by another thread before our commit
    /// lands, so the scan is repeated. Zero behaves as one pass.
    pub retry_count: u32,
    /// Fall back to probing every granule of the window (Windows only)
    pub brute_force: bool,
}

impl BufferAllocatorSettings {
    /// Whole address space, one default-sized buffer in the current process
    pub fn new() -> Self {
        let config = BuffersConfig::global();
        Self {
            min_address: 0,
            max_address: system_info().max_address,
            size: DEFAULT_BUFFER_SIZE,
            target_process_id: system_info().this_process_id,
            retry_count: config.retry_count,
            brute_force: config.brute_force,
        }
    }

    /// Settings whose buffer lies within `proximity` bytes of `target`
    pub fn from_proximity(proximity: usize, target: Address, size: usize) -> Self {
        Self {
            min_address: subtract_with_underflow_cap(target, proximity),
            max_address: add_with_overflow_cap(target, proximity),
            size: u32::try_from(size).unwrap_or(u32::MAX),
            ..Self::new()
        }
    }

    /// [`BufferAllocatorSettings::sanitize_for`] with the host granularity
    pub fn sanitize(&mut self) {
        self.sanitize_for(system_info().allocation_granularity);
    }

    /// Normalizes the request before a search
    ///
    /// The size becomes at least one byte, rounded up to `granularity`. Address 0
    /// means "anywhere" to some OS allocators, so `min_address` is raised to
    /// at least one granule.
    pub fn sanitize_for(&mut self, granularity: usize) {
        self.min_address = self.min_address.max(granularity);

        let size = (self.size as usize).max(1);
        self.size = u32::try_from(round_up(size, granularity))
            .unwrap_or_else(|_| round_down(u32::MAX as usize, granularity) as u32);
    }
}

impl Default for BufferAllocatorSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings used to look up (or create) a locator buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSearchSettings {
    pub min_address: Address,
    pub max_address: Address,
    /// Free bytes the buffer must still have
    pub size: u32,
}

impl BufferSearchSettings {
    pub fn new() -> Self {
        Self {
            min_address: 0,
            max_address: system_info().max_address,
            size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Search for a buffer within `proximity` bytes of `target`
    pub fn from_proximity(proximity: usize, target: Address, size: usize) -> Self {
        Self {
            min_address: subtract_with_underflow_cap(target, proximity),
            max_address: add_with_overflow_cap(target, proximity),
            size: u32::try_from(size).unwrap_or(u32::MAX),
        }
    }

    /// Allocator request derived from this search
    pub fn to_allocator_settings(&self) -> BufferAllocatorSettings {
        BufferAllocatorSettings {
            min_address: self.min_address,
            max_address: self.max_address,
            size: self.size,
            ..BufferAllocatorSettings::new()
        }
    }
}

impl Default for BufferSearchSettings {
    fn default() -> Self {
        Self::new()
    }
}
