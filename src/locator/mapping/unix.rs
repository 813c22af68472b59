/*!
 * File-Backed Mapping
 * Named shared memory as a `MAP_SHARED` view of a file in the mapping directory
 */

use super::SharedMapping;
use crate::core::errors::{BufferError, BufferResult};
use crate::core::limits::{ATTACH_TIMEOUT, ATTACH_WAIT_INTERVAL};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Shared view of a mapping file
pub struct FileMapping {
    _map: MmapMut,
    data: NonNull<u8>,
    length: usize,
    path: PathBuf,
    already_existed: bool,
}

// SAFETY: the view is plain shared memory, synchronization lives in the bytes themselves
unsafe impl Send for FileMapping {}
unsafe impl Sync for FileMapping {}

fn mapping_error(path: &Path, action: &str, e: std::io::Error) -> BufferError {
    BufferError::SharedMapping(format!("{action} {}: {e}", path.display()))
}

impl FileMapping {
    /// Creates `path` with `length` zeroed bytes, or attaches to it when it exists
    pub fn open_or_create(path: &Path, length: usize) -> BufferResult<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| mapping_error(dir, "creating", e))?;
        }

        let (file, already_existed) = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => {
                file.set_len(length as u64)
                    .map_err(|e| mapping_error(path, "sizing", e))?;
                (file, false)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(|e| mapping_error(path, "opening", e))?;
                Self::wait_for_length(&file, path, length)?;
                (file, true)
            }
            Err(e) => return Err(mapping_error(path, "creating", e)),
        };

        // SAFETY: the file is only ever resized upwards by its creator
        let mut map = unsafe { MmapOptions::new().len(length).map_mut(&file) }
            .map_err(|e| mapping_error(path, "mapping", e))?;
        let data = NonNull::new(map.as_mut_ptr())
            .ok_or_else(|| BufferError::SharedMapping(format!("null view of {}", path.display())))?;

        debug!(path = %path.display(), already_existed, "Opened locator mapping");
        Ok(Self {
            _map: map,
            data,
            length,
            path: path.to_path_buf(),
            already_existed,
        })
    }

    /// Waits for the creator's `set_len`, extending the file ourselves if it never comes
    fn wait_for_length(file: &File, path: &Path, length: usize) -> BufferResult<()> {
        let deadline = Instant::now() + ATTACH_TIMEOUT;
        while Instant::now() < deadline {
            let current = file
                .metadata()
                .map_err(|e| mapping_error(path, "inspecting", e))?
                .len();
            if current >= length as u64 {
                return Ok(());
            }
            thread::sleep(ATTACH_WAIT_INTERVAL);
        }

        // The creator died before sizing the file, the header will read as unstamped
        warn!(path = %path.display(), "Mapping file never reached its size, extending it");
        file.set_len(length as u64)
            .map_err(|e| mapping_error(path, "sizing", e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SharedMapping for FileMapping {
    fn already_existed(&self) -> bool {
        self.already_existed
    }

    fn data(&self) -> NonNull<u8> {
        self.data
    }

    fn len(&self) -> usize {
        self.length
    }

    fn unlink(&self) -> BufferResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(mapping_error(&self.path, "removing", e)),
        }
    }
}

impl Drop for FileMapping {
    fn drop(&mut self) {
        if !self.already_existed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
