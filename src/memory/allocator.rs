/*!
 * Buffer Allocator
 *
 * Stateless orchestration of a single allocation: sanitize the request,
 * enumerate free regions, try each candidate address, rescan on contention,
 * and finally stride through the window when the platform allows it.
 */

use super::platform;
use super::search::possible_buffer_addresses;
use super::settings::BufferAllocatorSettings;
use super::traits::PlatformAllocator;
use crate::core::errors::{BufferError, BufferResult};
use crate::core::math::round_up;
use crate::core::range::AddressRange;
use crate::core::types::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Memory committed by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub base_address: Address,
    pub size: u32,
}

impl Allocation {
    #[inline]
    pub fn range(&self) -> AddressRange {
        AddressRange::from_start_and_length(self.base_address, self.size as usize)
    }
}

/// Allocates granularity-aligned memory inside an address window
pub struct BufferAllocator {
    platform: Box<dyn PlatformAllocator>,
}

impl BufferAllocator {
    pub fn new(platform: Box<dyn PlatformAllocator>) -> Self {
        Self { platform }
    }

    /// Allocator for the current process
    pub fn native() -> BufferResult<Self> {
        platform::native().map(Self::new)
    }

    /// Allocator for the address space of `pid`
    pub fn for_process(pid: crate::core::types::Pid) -> BufferResult<Self> {
        platform::native_for(pid).map(Self::new)
    }

    pub fn platform(&self) -> &dyn PlatformAllocator {
        self.platform.as_ref()
    }

    /// Commits a buffer of at least `settings.size` bytes inside the settings window
    ///
    /// Lost races are retried internally. Only exhausting every region,
    /// candidate, retry and the brute force pass is reported as an error.
    #[instrument(skip(self), fields(size = settings.size), err)]
    pub fn allocate(&self, settings: &BufferAllocatorSettings) -> BufferResult<Allocation> {
        let mut settings = *settings;
        let granularity = self.platform.allocation_granularity();
        settings.sanitize_for(granularity);
        settings.max_address = settings.max_address.min(self.platform.max_address());

        let failed = |reason: &str| {
            BufferError::allocation_failed(
                settings.size,
                settings.min_address,
                settings.max_address,
                reason,
            )
        };

        if settings.min_address > settings.max_address {
            return Err(failed("address window is empty"));
        }

        let window = AddressRange::new(settings.min_address, settings.max_address);
        let size = settings.size as usize;

        for attempt in 0..settings.retry_count.max(1) {
            let regions = self.platform.free_regions(window.start, window.end_inclusive)?;

            for region in &regions {
                if region.start > window.end_inclusive {
                    break;
                }
                if let Some(allocation) = self.try_region(*region, window, size, granularity) {
                    debug!(
                        address = format_args!("{:#x}", allocation.base_address),
                        attempt, "Committed buffer"
                    );
                    return Ok(allocation);
                }
            }

            debug!(attempt, regions = regions.len(), "No candidate committed, rescanning");
        }

        if settings.brute_force && self.platform.supports_brute_force() {
            warn!("Free region scan exhausted, falling back to brute force");
            if let Some(allocation) = self.brute_force(window, size, granularity) {
                return Ok(allocation);
            }
        }

        Err(failed("no free region accepted a commit"))
    }

    fn try_region(
        &self,
        region: AddressRange,
        window: AddressRange,
        size: usize,
        granularity: usize,
    ) -> Option<Allocation> {
        possible_buffer_addresses(window, region, size, granularity)
            .as_slice()
            .iter()
            .find_map(|&address| self.platform.try_commit(address, size))
            .map(|base_address| Allocation {
                base_address,
                size: size as u32,
            })
    }

    /// Tries a commit at every granule of the window, trusting the commit call rather than the reported state
    ///
    /// Stops as soon as the address space can no longer be queried.
    fn brute_force(&self, window: AddressRange, size: usize, granularity: usize) -> Option<Allocation> {
        let stride = granularity.max(1);
        let mut current = round_up(window.start, stride);

        while current.checked_add(size - 1)? <= window.end_inclusive {
            self.platform.region_at(current)?;
            if let Some(base_address) = self.platform.try_commit(current, size) {
                return Some(Allocation {
                    base_address,
                    size: size as u32,
                });
            }
            current = current.checked_add(stride)?;
        }

        None
    }
}

/// Allocates in the process named by `settings` with its native strategy
pub fn allocate(settings: &BufferAllocatorSettings) -> BufferResult<Allocation> {
    BufferAllocator::for_process(settings.target_process_id)?.allocate(settings)
}
