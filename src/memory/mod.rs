/*!
 * Memory Module
 * Address-window constrained allocation of OS memory
 */

pub mod allocator;
pub mod platform;
pub mod search;
pub mod settings;
pub mod traits;

// Re-export for convenience
pub use allocator::{allocate, Allocation, BufferAllocator};
pub use search::{possible_buffer_addresses, Candidates};
pub use settings::{BufferAllocatorSettings, BufferSearchSettings};
pub use traits::PlatformAllocator;
