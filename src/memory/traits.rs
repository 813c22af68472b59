/*!
 * Memory Traits
 * Per-OS address space abstractions used by the allocator
 */

use crate::core::errors::BufferResult;
use crate::core::range::AddressRange;
use crate::core::types::{Address, Size};

/// Address space of one target process
///
/// Implementations enumerate unmapped regions and commit memory at a fixed
/// address. Losing a commit race is not an error: `try_commit` returns `None`
/// and the caller moves on to its next candidate.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformAllocator: Send + Sync {
    /// Highest user-mode address of the target process
    fn max_address(&self) -> Address;

    /// Alignment and size unit of every commit
    fn allocation_granularity(&self) -> usize;

    /// Free regions intersecting `[min_address, max_address]`, in ascending order
    fn free_regions(&self, min_address: Address, max_address: Address)
        -> BufferResult<Vec<AddressRange>>;

    /// Commits `size` read/write/execute bytes at exactly `address`
    ///
    /// Returns `None` when the address is taken. A commit the OS placed
    /// elsewhere is released before returning `None`.
    fn try_commit(&self, address: Address, size: Size) -> Option<Address>;

    /// Returns committed memory to the OS
    fn release(&self, address: Address, size: Size);

    /// Region that holds `address`, regardless of its state
    ///
    /// Only needed by platforms that support brute force.
    fn region_at(&self, _address: Address) -> Option<AddressRange> {
        None
    }

    /// Whether a stride scan ignoring reported free state is worth attempting
    fn supports_brute_force(&self) -> bool {
        false
    }
}
