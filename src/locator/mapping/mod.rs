/*!
 * Shared Mappings
 *
 * Named memory shared by every module loaded into a process. Opening by name
 * either creates the mapping or attaches to the existing one, and the OS
 * decides atomically which of the two happened.
 */

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::FileMapping;
#[cfg(windows)]
pub use windows::NamedMapping;

use crate::core::errors::BufferResult;
use crate::core::limits::MAPPING_NAME_PREFIX;
use crate::core::types::Pid;
use std::path::Path;
use std::ptr::NonNull;

/// An open view of a named shared mapping
pub trait SharedMapping: Send + Sync {
    /// Whether another caller created the mapping before we opened it
    fn already_existed(&self) -> bool;

    /// Start of the mapped bytes
    fn data(&self) -> NonNull<u8>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detaches the name so the next open creates a fresh mapping
    ///
    /// Used when the existing mapping belongs to a process that no longer exists.
    fn unlink(&self) -> BufferResult<()> {
        Ok(())
    }
}

/// Mapping name for the locator of `pid`
pub fn mapping_name(pid: Pid) -> String {
    format!("{MAPPING_NAME_PREFIX}{pid}")
}

/// Pid embedded in a mapping name, if it is one of ours
pub fn parse_mapping_pid(name: &str) -> Option<Pid> {
    name.strip_prefix(MAPPING_NAME_PREFIX)?.parse().ok()
}

/// Opens the mapping called `name`, creating it with `length` zeroed bytes if needed
///
/// `dir` holds the backing files on unix and is ignored elsewhere.
pub fn open_or_create(name: &str, length: usize, dir: &Path) -> BufferResult<Box<dyn SharedMapping>> {
    #[cfg(unix)]
    return Ok(Box::new(FileMapping::open_or_create(&dir.join(name), length)?));

    #[cfg(windows)]
    {
        let _ = dir;
        return Ok(Box::new(NamedMapping::open_or_create(name, length)?));
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (name, length, dir);
        Err(crate::core::errors::BufferError::PlatformUnsupported(
            "named shared mappings are unavailable on this OS".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_name_round_trip() {
        let name = mapping_name(4321);
        assert!(name.starts_with(MAPPING_NAME_PREFIX));
        assert_eq!(parse_mapping_pid(&name), Some(4321));
        assert_eq!(parse_mapping_pid("unrelated-4321"), None);
        assert_eq!(parse_mapping_pid(&format!("{MAPPING_NAME_PREFIX}abc")), None);
    }
}
