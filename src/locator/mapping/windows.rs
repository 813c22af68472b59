/*!
 * Named Mapping (Windows)
 * Pagefile-backed shared memory in the session-local namespace
 */

use super::SharedMapping;
use crate::core::errors::{BufferError, BufferResult};
use std::ffi::CString;
use std::ptr::{self, NonNull};
use tracing::debug;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingA, MapViewOfFile, UnmapViewOfFile, FILE_MAP_ALL_ACCESS, FILE_MAP_EXECUTE,
    MEMORY_MAPPED_VIEW_ADDRESS, PAGE_EXECUTE_READWRITE,
};

/// View of a named file mapping
pub struct NamedMapping {
    handle: HANDLE,
    data: NonNull<u8>,
    length: usize,
    already_existed: bool,
}

// SAFETY: the view is plain shared memory, synchronization lives in the bytes themselves
unsafe impl Send for NamedMapping {}
unsafe impl Sync for NamedMapping {}

impl NamedMapping {
    pub fn open_or_create(name: &str, length: usize) -> BufferResult<Self> {
        let full_name = CString::new(format!("Local\\{name}"))
            .map_err(|e| BufferError::SharedMapping(e.to_string()))?;
        let size = length as u64;

        // SAFETY: pagefile-backed mapping, the name outlives the call
        let handle = unsafe {
            CreateFileMappingA(
                INVALID_HANDLE_VALUE,
                ptr::null(),
                PAGE_EXECUTE_READWRITE,
                (size >> 32) as u32,
                size as u32,
                full_name.as_ptr() as *const u8,
            )
        };
        // Read before any other call can overwrite it
        let already_existed = unsafe { GetLastError() } == ERROR_ALREADY_EXISTS;

        if handle == 0 {
            return Err(BufferError::SharedMapping(format!(
                "CreateFileMappingA({name}) failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        // SAFETY: valid mapping handle of at least `length` bytes
        let view = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS | FILE_MAP_EXECUTE, 0, 0, length) };
        let Some(data) = NonNull::new(view.Value as *mut u8) else {
            let error = std::io::Error::last_os_error();
            // SAFETY: we own the handle
            unsafe { CloseHandle(handle) };
            return Err(BufferError::SharedMapping(format!("MapViewOfFile({name}) failed: {error}")));
        };

        debug!(name, already_existed, "Opened locator mapping");
        Ok(Self {
            handle,
            data,
            length,
            already_existed,
        })
    }
}

impl SharedMapping for NamedMapping {
    fn already_existed(&self) -> bool {
        self.already_existed
    }

    fn data(&self) -> NonNull<u8> {
        self.data
    }

    fn len(&self) -> usize {
        self.length
    }
}

impl Drop for NamedMapping {
    fn drop(&mut self) {
        // SAFETY: we own both the view and the handle
        unsafe {
            UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
                Value: self.data.as_ptr().cast(),
            });
            CloseHandle(self.handle);
        }
    }
}
