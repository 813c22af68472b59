/*!
 * Limits and Constants
 *
 * Centralized location for the layout constants, retry bounds and naming
 * conventions shared by the allocator and the locator.
 */

use std::time::Duration;

// =============================================================================
// LOCATOR LAYOUT
// =============================================================================

/// Physical size of one locator header page (4KB)
/// Items occupy whatever the fixed header fields leave free
pub const LOCATOR_HEADER_LENGTH: usize = 4096;

/// Size of the buffers carved out of the space following a header (16KB)
/// Allocation granularity is usually far larger than the header itself,
/// the remainder is pre-registered as items of this size
pub const PREALLOCATED_CHUNK_SIZE: u32 = 16 * 1024;

/// Version stamped into the low 3 bits of a header's flags
pub const LOCATOR_VERSION: u8 = 0;

/// Mask of the version bits inside the header flags
pub const LOCATOR_VERSION_MASK: u8 = 0x07;

/// Header flag set once items are registered, just before the self pointer is published
pub const LOCATOR_INITIALIZED_FLAG: u8 = 0x08;

// =============================================================================
// ALLOCATION
// =============================================================================

/// Default number of full rescans before giving up on an allocation
/// Free regions can disappear between the scan and the commit under memory pressure
pub const DEFAULT_RETRY_COUNT: u32 = 8;

/// Default requested buffer size (one page)
pub const DEFAULT_BUFFER_SIZE: u32 = 4096;

/// Maximum number of candidate addresses produced per free region
pub const MAX_CANDIDATES: usize = 4;

/// Highest user-space address assumed on unix hosts
/// There is no portable API for it, 47 bits matches Linux and macOS user space
#[cfg(target_pointer_width = "64")]
pub const UNIX_MAX_ADDRESS: usize = 0x7FFF_FFFF_FFFF;
#[cfg(not(target_pointer_width = "64"))]
pub const UNIX_MAX_ADDRESS: usize = 0xFFFF_FFFF;

/// Max address for WOW64 targets that are not large address aware
pub const WOW64_MAX_ADDRESS: usize = 0x7FFF_FFFF;

// =============================================================================
// SPIN LOCKS
// =============================================================================

/// Busy-wait rounds before a spinning waiter starts yielding its time slice
pub const DEFAULT_MAX_SPINS: u32 = 64;

/// Upper bound of `spin_loop` hints issued in a single backoff round
pub const DEFAULT_BACKOFF_LIMIT: u32 = 256;

// =============================================================================
// SHARED LOCATOR MAPPING
// =============================================================================

/// Prefix of the shared mapping name, followed by the owning process id
pub const MAPPING_NAME_PREFIX: &str = "nearby-buffers.locator.pid-";

/// Directory holding the file-backed locator mappings on unix hosts
pub const DEFAULT_MAPPING_DIR: &str = "/tmp/.nearby-buffers";

/// How long an attaching caller waits for the creator to publish the header
/// before treating the mapping as abandoned
pub const ATTACH_TIMEOUT: Duration = Duration::from_secs(1);

/// Delay between two attach polls
pub const ATTACH_WAIT_INTERVAL: Duration = Duration::from_micros(50);

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Overrides the allocator retry count
pub const ENV_RETRY_COUNT: &str = "NEARBY_BUFFERS_RETRY_COUNT";

/// Enables or disables the brute force fallback ("1"/"true" or "0"/"false")
pub const ENV_BRUTE_FORCE: &str = "NEARBY_BUFFERS_BRUTE_FORCE";

/// Overrides the directory of the locator mapping files
pub const ENV_MAPPING_DIR: &str = "NEARBY_BUFFERS_MAPPING_DIR";

/// Switches the tracing subscriber to JSON output
pub const ENV_TRACE_JSON: &str = "NEARBY_BUFFERS_TRACE_JSON";
