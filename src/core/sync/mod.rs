/*!
 * Synchronization Primitives
 *
 * Spin flags for state shared between every module loaded into a process.
 *
 * # Architecture
 *
 * Locator headers and items live in raw shared memory, so their locks are
 * plain 32-bit words rather than OS or parking_lot primitives. Process-local
 * state (the locator finder) keeps using parking_lot.
 */

mod config;
mod spin;

pub use config::SpinConfig;
pub use spin::{SpinFlag, SpinGuard};
