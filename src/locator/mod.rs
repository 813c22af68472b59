/*!
 * Locator Module
 *
 * Chain of shared locator headers that remember every buffer handed out in
 * this process, so small allocations reuse them instead of rescanning memory.
 */

pub mod finder;
pub mod handle;
pub mod header;
pub mod item;
pub mod mapping;

// Re-export for convenience
pub use finder::{FindReason, LocatorFinder};
pub use handle::ItemGuard;
pub use header::{LocatorHeader, MAX_ITEM_COUNT};
pub use item::LocatorItem;
