/*!
 * Core Module
 * Fundamental types, address arithmetic, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod math;
pub mod range;
pub mod sync;
pub mod sysinfo;
pub mod types;

// Re-export for convenience
pub use config::BuffersConfig;
pub use errors::*;
pub use range::AddressRange;
pub use sysinfo::{system_info, SystemInfo};
pub use types::*;
