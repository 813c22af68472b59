/*!
 * Locator Item
 *
 * One bump-allocated sub-buffer inside a locator header. The layout is fixed
 * (20 bytes on 64-bit, 16 on 32-bit) because every module in the process
 * reads the same shared bytes. All-zero bytes are an unallocated slot.
 */

use super::handle::ItemGuard;
use crate::core::config::BuffersConfig;
use crate::core::math::add_with_overflow_cap;
use crate::core::sync::SpinFlag;
use crate::core::types::Address;
use std::sync::atomic::{AtomicU32, Ordering};

/// Pointer-sized address split into 4-byte aligned halves
#[repr(C)]
#[derive(Debug, Default)]
struct PackedAddress {
    low: AtomicU32,
    #[cfg(target_pointer_width = "64")]
    high: AtomicU32,
}

impl PackedAddress {
    fn load(&self) -> Address {
        let low = self.low.load(Ordering::Acquire) as Address;
        #[cfg(target_pointer_width = "64")]
        {
            low | ((self.high.load(Ordering::Acquire) as Address) << 32)
        }
        #[cfg(not(target_pointer_width = "64"))]
        {
            low
        }
    }

    fn store(&self, address: Address) {
        self.low.store(address as u32, Ordering::Release);
        #[cfg(target_pointer_width = "64")]
        self.high.store((address >> 32) as u32, Ordering::Release);
    }
}

/// Lockable bump-pointer buffer
#[repr(C)]
#[derive(Debug, Default)]
pub struct LocatorItem {
    base_address: PackedAddress,
    size: AtomicU32,
    position: AtomicU32,
    taken: SpinFlag,
}

impl LocatorItem {
    /// Unallocated item
    pub const fn empty() -> Self {
        Self {
            base_address: PackedAddress {
                low: AtomicU32::new(0),
                #[cfg(target_pointer_width = "64")]
                high: AtomicU32::new(0),
            },
            size: AtomicU32::new(0),
            position: AtomicU32::new(0),
            taken: SpinFlag::new(),
        }
    }

    pub fn new(base_address: Address, size: u32) -> Self {
        let item = Self::empty();
        item.reset(base_address, size);
        item
    }

    /// Points the item at a fresh buffer with an empty cursor
    ///
    /// Only valid on slots nobody else can observe yet.
    pub(crate) fn reset(&self, base_address: Address, size: u32) {
        self.base_address.store(base_address);
        self.size.store(size, Ordering::Release);
        self.position.store(0, Ordering::Release);
    }

    #[inline]
    pub fn base_address(&self) -> Address {
        self.base_address.load()
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// Offset of the next free byte
    #[inline]
    pub fn position(&self) -> u32 {
        self.position.load(Ordering::Acquire)
    }

    #[inline]
    pub fn bytes_left(&self) -> u32 {
        self.size().saturating_sub(self.position())
    }

    /// First byte of the buffer
    #[inline]
    pub fn min_address(&self) -> Address {
        self.base_address()
    }

    /// One past the last byte of the buffer
    #[inline]
    pub fn max_address(&self) -> Address {
        add_with_overflow_cap(self.base_address(), self.size() as usize)
    }

    /// Address the next append writes to
    #[inline]
    pub fn current_address(&self) -> Address {
        add_with_overflow_cap(self.base_address(), self.position() as usize)
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.base_address() != 0
    }

    #[inline]
    pub fn is_taken(&self) -> bool {
        self.taken.is_locked()
    }

    /// Whether `size` more bytes fit and would land inside `[min_address, max_address]`
    pub fn can_use(&self, size: u32, min_address: Address, max_address: Address) -> bool {
        if !self.is_allocated() || self.bytes_left() < size {
            return false;
        }

        let start = self.current_address();
        let end_inclusive = add_with_overflow_cap(start, (size as usize).saturating_sub(1));
        start >= min_address && end_inclusive <= max_address
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        self.taken.try_lock()
    }

    pub fn lock(&self) {
        self.taken.lock_with(&BuffersConfig::global().spin);
    }

    /// Releases the item for other searchers
    ///
    /// Unlocking an item that isn't locked is a caller bug, asserted in debug builds.
    pub fn unlock(&self) {
        self.taken.unlock();
    }

    /// Locks the item if it is free, handing back a guard that unlocks on drop
    pub fn try_acquire(&self) -> Option<ItemGuard<'_>> {
        // SAFETY: the lock was just taken by us
        self.try_lock().then(|| unsafe { ItemGuard::new(self) })
    }

    /// Spins until the item is free
    pub fn acquire(&self) -> ItemGuard<'_> {
        self.lock();
        // SAFETY: the lock was just taken by us
        unsafe { ItemGuard::new(self) }
    }

    /// Moves the cursor forward, the caller must hold the lock
    pub(crate) fn advance(&self, bytes: u32) {
        let position = self.position().saturating_add(bytes);
        self.position.store(position, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_layout() {
        let word = size_of::<usize>();
        assert_eq!(offset_of!(LocatorItem, base_address), 0);
        assert_eq!(offset_of!(LocatorItem, size), word);
        assert_eq!(offset_of!(LocatorItem, position), word + 4);
        assert_eq!(offset_of!(LocatorItem, taken), word + 8);
        assert_eq!(size_of::<LocatorItem>(), if word == 4 { 16 } else { 20 });
    }

    #[test]
    fn test_address_round_trips_through_halves() {
        #[cfg(target_pointer_width = "64")]
        let address: Address = 0x7FFF_1234_5678_0000;
        #[cfg(not(target_pointer_width = "64"))]
        let address: Address = 0x1234_0000;
        let item = LocatorItem::new(address, 4096);
        assert_eq!(item.base_address(), address);
        assert_eq!(item.max_address(), address + 4096);
    }

    #[test]
    fn test_empty_item_is_unallocated() {
        let item = LocatorItem::empty();
        assert!(!item.is_allocated());
        assert!(!item.can_use(0, 0, usize::MAX));
        assert!(!item.can_use(1, 0, usize::MAX));
    }

    #[test]
    fn test_can_use_respects_space_and_window() {
        let item = LocatorItem::new(0x10000, 100);
        assert!(item.can_use(100, 0x10000, 0x10063));
        assert!(!item.can_use(101, 0, usize::MAX));
        assert!(!item.can_use(100, 0x10001, usize::MAX));
        assert!(!item.can_use(100, 0, 0x10062));

        item.advance(50);
        assert_eq!(item.bytes_left(), 50);
        assert!(item.can_use(50, 0x10032, 0x10063));
        assert!(!item.can_use(51, 0, usize::MAX));
    }

    #[test]
    fn test_lock_cycle() {
        let item = LocatorItem::new(0x10000, 100);
        assert!(item.try_lock());
        assert!(item.is_taken());
        assert!(!item.try_lock());
        item.unlock();
        assert!(!item.is_taken());

        item.lock();
        assert!(item.is_taken());
        item.unlock();
    }

    #[test]
    fn test_guard_unlocks_on_drop() {
        let item = LocatorItem::new(0x10000, 100);
        {
            let _guard = item.try_acquire().unwrap();
            assert!(item.try_acquire().is_none());
        }
        assert!(!item.is_taken());
        drop(item.acquire());
        assert!(!item.is_taken());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "wasn't locked")]
    fn test_unlock_unlocked_item_panics_in_debug() {
        LocatorItem::new(0x10000, 100).unlock();
    }
}
