/*!
 * Item Guard
 * Scoped ownership of a locked locator item
 */

use super::item::LocatorItem;
use crate::core::types::Address;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::ptr;

/// Exclusive handle to a [`LocatorItem`], unlocked when dropped
///
/// Holding the guard is the only way to advance the item's cursor. Keep it
/// for a single short write, never across blocking calls.
#[must_use = "the item is unlocked as soon as the guard is dropped"]
pub struct ItemGuard<'a> {
    item: &'a LocatorItem,
}

impl<'a> ItemGuard<'a> {
    /// # Safety
    ///
    /// The caller must hold `item`'s lock and hand its release over to the guard.
    pub(crate) unsafe fn new(item: &'a LocatorItem) -> Self {
        Self { item }
    }

    pub fn item(&self) -> &'a LocatorItem {
        self.item
    }

    /// Copies `data` to the cursor and advances it, returning where the bytes landed
    ///
    /// # Safety
    ///
    /// The item must have at least `data.len()` bytes left and its buffer must be
    /// committed writable memory of the current process.
    pub unsafe fn append_bytes(&mut self, data: &[u8]) -> Address {
        let address = self.item.current_address();
        ptr::copy_nonoverlapping(data.as_ptr(), address as *mut u8, data.len());
        self.item.advance(data.len() as u32);
        address
    }

    /// Writes `value` unaligned at the cursor and advances it by its size
    ///
    /// # Safety
    ///
    /// Same contract as [`ItemGuard::append_bytes`] for `size_of::<T>()` bytes.
    pub unsafe fn append_copy<T: Copy>(&mut self, value: T) -> Address {
        let address = self.item.current_address();
        ptr::write_unaligned(address as *mut T, value);
        self.item.advance(mem::size_of::<T>() as u32);
        address
    }
}

impl Deref for ItemGuard<'_> {
    type Target = LocatorItem;

    fn deref(&self) -> &LocatorItem {
        self.item
    }
}

impl fmt::Debug for ItemGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemGuard")
            .field("base_address", &format_args!("{:#x}", self.item.base_address()))
            .field("size", &self.item.size())
            .field("position", &self.item.position())
            .finish()
    }
}

impl Drop for ItemGuard<'_> {
    fn drop(&mut self) {
        self.item.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_into_backing_buffer() {
        let mut backing = vec![0u8; 64];
        let base = backing.as_mut_ptr() as Address;
        let item = LocatorItem::new(base, backing.len() as u32);

        {
            let mut guard = item.acquire();
            let first = unsafe { guard.append_bytes(&[1, 2, 3]) };
            let second = unsafe { guard.append_copy(0xAABB_CCDDu32) };

            assert_eq!(first, base);
            assert_eq!(second, base + 3);
            assert_eq!(guard.position(), 7);
            assert_eq!(guard.bytes_left(), 57);
        }

        assert!(!item.is_taken());
        assert_eq!(&backing[..3], &[1, 2, 3]);
        assert_eq!(&backing[3..7], &0xAABB_CCDDu32.to_ne_bytes());
    }
}
