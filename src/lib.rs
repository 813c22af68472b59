/*!
 * Nearby Buffers
 *
 * Small, permanently committed memory buffers placed inside a caller-chosen
 * address window. Buffers are carved out of OS allocations found by scanning
 * the address space for free regions, and remembered in a chain of shared
 * locator headers so every module loaded into the process reuses them.
 *
 * ```no_run
 * use nearby_buffers::{Buffers, BufferSearchSettings};
 *
 * // Within 2GB of our own code
 * let target = nearby_buffers::get_buffer as usize;
 * let settings = BufferSearchSettings::from_proximity(0x7FFF_0000, target, 64);
 * let mut buffer = Buffers::new().get_buffer(&settings)?;
 * let address = unsafe { buffer.append_bytes(&[0x90, 0xC3]) };
 * # let _ = address;
 * # Ok::<(), nearby_buffers::BufferError>(())
 * ```
 */

pub mod buffers;
pub mod core;
pub mod locator;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use buffers::{get_buffer, get_buffer_from, Buffers};
pub use crate::core::errors::{BufferError, BufferResult, ItemAllocationError};
pub use crate::core::{AddressRange, BuffersConfig};
pub use locator::{FindReason, ItemGuard, LocatorFinder, LocatorHeader, LocatorItem};
pub use memory::{
    allocate, possible_buffer_addresses, Allocation, BufferAllocator, BufferAllocatorSettings,
    BufferSearchSettings, PlatformAllocator,
};
pub use monitoring::init_tracing;
