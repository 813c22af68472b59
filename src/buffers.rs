/*!
 * Buffers
 *
 * Entry point for callers: a locked buffer with room for the requested bytes
 * inside an address window, reused from the locator chain when possible.
 */

use crate::core::errors::{BufferResult, ItemAllocationError};
use crate::locator::{ItemGuard, LocatorFinder, LocatorHeader};
use crate::memory::BufferSearchSettings;
use tracing::{instrument, trace};

/// Handle to the locator chain of one finder
#[derive(Clone, Copy)]
pub struct Buffers<'f> {
    finder: &'f LocatorFinder,
}

impl Buffers<'static> {
    /// Buffers backed by the process-wide finder
    pub fn new() -> Self {
        Self {
            finder: LocatorFinder::global(),
        }
    }
}

impl Default for Buffers<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'f> Buffers<'f> {
    pub fn with_finder(finder: &'f LocatorFinder) -> Self {
        Self { finder }
    }

    pub fn finder(&self) -> &'f LocatorFinder {
        self.finder
    }

    /// Locked buffer with at least `settings.size` free bytes inside the window
    ///
    /// Walks the header chain: reuse an item, else register a new one on the
    /// first header with a free slot, growing the chain when every header is full.
    #[instrument(skip(self), err)]
    pub fn get_buffer(&self, settings: &BufferSearchSettings) -> BufferResult<ItemGuard<'f>> {
        let header = self.finder.find()?;
        get_buffer_from(header, settings)
    }
}

/// [`Buffers::get_buffer`] starting from an explicit header
pub fn get_buffer_from<'h>(
    mut header: &'h LocatorHeader,
    settings: &BufferSearchSettings,
) -> BufferResult<ItemGuard<'h>> {
    loop {
        if let Some(item) =
            header.find_first_available_locked(settings.size, settings.min_address, settings.max_address)
        {
            trace!(base_address = format_args!("{:#x}", item.base_address()), "Reused locator item");
            return Ok(item);
        }

        match header.try_allocate_item(settings.size, settings.min_address, settings.max_address) {
            Ok(item) => return Ok(item),
            Err(ItemAllocationError::HeaderFull) => header = header.get_next_locator()?,
            Err(ItemAllocationError::Allocation(e)) => return Err(e),
        }
    }
}

/// [`Buffers::get_buffer`] on the process-wide finder
pub fn get_buffer(settings: &BufferSearchSettings) -> BufferResult<ItemGuard<'static>> {
    Buffers::new().get_buffer(settings)
}
