/*!
 * Platform Strategies
 *
 * One [`PlatformAllocator`] per supported OS, selected at compile time.
 */

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub mod maps;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
pub use linux::LinuxAllocator;
#[cfg(target_os = "macos")]
pub use macos::MacAllocator;
#[cfg(windows)]
pub use windows::WindowsAllocator;

use super::traits::PlatformAllocator;
use crate::core::errors::{BufferError, BufferResult};
use crate::core::types::Pid;

/// Native strategy for the address space of `pid`
///
/// On unix only the current process is supported.
pub fn native_for(pid: Pid) -> BufferResult<Box<dyn PlatformAllocator>> {
    #[cfg(unix)]
    if pid != crate::core::sysinfo::system_info().this_process_id {
        return Err(BufferError::PlatformUnsupported(format!(
            "allocating in another process ({pid}) is only supported on Windows"
        )));
    }

    #[cfg(target_os = "linux")]
    return Ok(Box::new(LinuxAllocator::new(pid)));

    #[cfg(target_os = "macos")]
    return Ok(Box::new(MacAllocator::new()));

    #[cfg(windows)]
    return Ok(Box::new(WindowsAllocator::for_process(pid)?));

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    Err(BufferError::PlatformUnsupported(format!(
        "no allocation strategy for {} (process {pid})",
        std::env::consts::OS
    )))
}

/// Native strategy for the current process
pub fn native() -> BufferResult<Box<dyn PlatformAllocator>> {
    native_for(crate::core::sysinfo::system_info().this_process_id)
}
