/*!
 * Locator Header
 *
 * A 4096-byte control page: self pointer, link to the next page, a structural
 * spin lock, a version tag and an inline array of locator items. Headers are
 * placed over raw shared memory, never constructed by value.
 */

use super::handle::ItemGuard;
use super::item::LocatorItem;
use crate::core::config::BuffersConfig;
use crate::core::errors::{BufferError, BufferResult, ItemAllocationError};
use crate::core::limits::{
    LOCATOR_HEADER_LENGTH, LOCATOR_INITIALIZED_FLAG, LOCATOR_VERSION, LOCATOR_VERSION_MASK,
    PREALLOCATED_CHUNK_SIZE,
};
use crate::core::sync::{SpinFlag, SpinGuard};
use crate::core::sysinfo::system_info;
use crate::core::types::Address;
use crate::memory::{BufferAllocator, BufferAllocatorSettings};
use std::alloc::{self, Layout};
use std::mem;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use tracing::{debug, info};

/// Bytes taken by the header fields preceding the item array
const FIXED_FIELDS_LENGTH: usize = 2 * mem::size_of::<usize>() + mem::size_of::<SpinFlag>() + 4;

/// Items that fit in one header page (203 on 64-bit, 255 on 32-bit)
pub const MAX_ITEM_COUNT: usize =
    (LOCATOR_HEADER_LENGTH - FIXED_FIELDS_LENGTH) / mem::size_of::<LocatorItem>();

/// Shared control page of the locator chain
#[repr(C)]
pub struct LocatorHeader {
    this_address: AtomicUsize,
    next_header: AtomicUsize,
    lock: SpinFlag,
    flags: AtomicU8,
    item_count: AtomicU8,
    _padding: [u8; 2],
    items: [LocatorItem; MAX_ITEM_COUNT],
}

const _: () = assert!(mem::size_of::<LocatorHeader>() <= LOCATOR_HEADER_LENGTH);
const _: () = assert!(MAX_ITEM_COUNT <= u8::MAX as usize);

impl LocatorHeader {
    /// Views `address` as a header
    ///
    /// # Safety
    ///
    /// `address` must point to at least [`LOCATOR_HEADER_LENGTH`] readable and
    /// writable bytes, aligned for `usize`, that are either zeroed or hold an
    /// initialized header, and stay mapped for `'a`.
    pub unsafe fn from_raw<'a>(address: Address) -> &'a LocatorHeader {
        &*(address as *const LocatorHeader)
    }

    /// Allocates and initializes a header outside any shared mapping
    ///
    /// The block is one allocation granularity (at least one page) from the
    /// process allocator, with everything past the header pre-registered as
    /// items. It lives for the rest of the process.
    pub fn new_detached() -> BufferResult<&'static LocatorHeader> {
        let info = system_info();
        let length = info.allocation_granularity.max(LOCATOR_HEADER_LENGTH);
        let layout = Layout::from_size_align(length, info.page_size.max(mem::align_of::<Self>()))
            .map_err(|e| BufferError::LocatorUnavailable(e.to_string()))?;

        // SAFETY: non-zero sized layout
        let block = unsafe { alloc::alloc_zeroed(layout) };
        if block.is_null() {
            return Err(BufferError::LocatorUnavailable(format!(
                "out of memory allocating a {length} byte locator header"
            )));
        }

        // SAFETY: zeroed, page-aligned and never freed
        let header = unsafe { Self::from_raw(block as Address) };
        header.initialize(length);
        Ok(header)
    }

    /// Stamps a header at its own address, carving the rest of `length` into items
    ///
    /// The self pointer is published last. Anyone who observes it non-zero
    /// with an acquire load also sees the flags, the chain and every item.
    pub(crate) fn initialize(&self, length: usize) {
        let base = self as *const Self as Address;
        self.next_header.store(0, Ordering::Relaxed);
        self.flags.store(0, Ordering::Relaxed);
        self.set_version(LOCATOR_VERSION);

        let remaining = length.saturating_sub(LOCATOR_HEADER_LENGTH);

        // Apple silicon enforces W^X, so memory sharing a block with a header
        // can't be handed out for code. Use it for more headers instead.
        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        {
            self.item_count.store(0, Ordering::Release);
            self.chain_remaining_as_headers(base, remaining);
        }

        #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
        self.register_remaining_as_items(base + LOCATOR_HEADER_LENGTH, remaining);

        self.publish(base);
    }

    /// Marks the header initialized and makes its self pointer visible
    fn publish(&self, address: Address) {
        self.flags.fetch_or(LOCATOR_INITIALIZED_FLAG, Ordering::Release);
        self.this_address.store(address, Ordering::Release);
    }

    #[cfg_attr(all(target_os = "macos", target_arch = "aarch64"), allow(dead_code))]
    fn register_remaining_as_items(&self, mut address: Address, mut remaining: usize) {
        let mut count = 0;

        while remaining > 0 && count < MAX_ITEM_COUNT {
            let length = remaining.min(PREALLOCATED_CHUNK_SIZE as usize);
            self.items[count].reset(address, length as u32);
            address += length;
            remaining -= length;
            count += 1;
        }

        self.item_count.store(count as u8, Ordering::Release);
    }

    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    fn chain_remaining_as_headers(&self, base: Address, mut remaining: usize) {
        let mut current = self;
        let mut address = base;

        while remaining >= LOCATOR_HEADER_LENGTH {
            address += LOCATOR_HEADER_LENGTH;
            // SAFETY: inside the zeroed block this header was initialized over
            let next = unsafe { Self::from_raw(address) };
            next.set_version(LOCATOR_VERSION);
            next.publish(address);
            current.next_header.store(address, Ordering::Release);
            current = next;
            remaining -= LOCATOR_HEADER_LENGTH;
        }
    }

    /// Address the header was stamped at, zero before initialization
    #[inline]
    pub fn this_address(&self) -> Address {
        self.this_address.load(Ordering::Acquire)
    }

    #[inline]
    pub fn next_header_address(&self) -> Address {
        self.next_header.load(Ordering::Acquire)
    }

    #[inline]
    pub fn has_next_locator(&self) -> bool {
        self.next_header_address() != 0
    }

    /// Layout version stored in the low 3 bits of the flags
    #[inline]
    pub fn version(&self) -> u8 {
        self.flags.load(Ordering::Acquire) & LOCATOR_VERSION_MASK
    }

    /// Whether [`LocatorHeader::initialize`] ran to completion on these bytes
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.flags.load(Ordering::Acquire) & LOCATOR_INITIALIZED_FLAG != 0
    }

    pub fn set_version(&self, version: u8) {
        let flags = self.flags.load(Ordering::Acquire);
        let updated = (flags & !LOCATOR_VERSION_MASK) | (version & LOCATOR_VERSION_MASK);
        self.flags.store(updated, Ordering::Release);
    }

    #[inline]
    pub fn item_count(&self) -> usize {
        self.item_count.load(Ordering::Acquire) as usize
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.item_count() >= MAX_ITEM_COUNT
    }

    /// Registered items, in search order
    pub fn items(&self) -> &[LocatorItem] {
        &self.items[..self.item_count().min(MAX_ITEM_COUNT)]
    }

    /// Whether the bytes at `address` hold a header this process stamped there
    pub fn is_stamped_at(&self, address: Address) -> bool {
        self.this_address() == address
            && self.is_initialized()
            && self.version() == LOCATOR_VERSION
            && self.item_count() <= MAX_ITEM_COUNT
    }

    /// Structural lock guarding item registration and chain growth
    pub fn lock(&self) -> SpinGuard<'_> {
        self.lock.guard_with(&BuffersConfig::global().spin)
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// First registered item with room for `size` bytes inside the window, already locked
    pub fn find_first_available_locked(
        &self,
        size: u32,
        min_address: Address,
        max_address: Address,
    ) -> Option<ItemGuard<'_>> {
        // An item stays usable until its cursor moves, which needs its lock
        self.items()
            .iter()
            .filter(|item| item.can_use(size, min_address, max_address))
            .find_map(LocatorItem::try_acquire)
    }

    /// Registers a freshly allocated buffer as a new item in the current process
    pub fn try_allocate_item(
        &self,
        size: u32,
        min_address: Address,
        max_address: Address,
    ) -> Result<ItemGuard<'_>, ItemAllocationError> {
        if self.is_full() {
            return Err(ItemAllocationError::HeaderFull);
        }

        let allocator = BufferAllocator::native()?;
        let settings = BufferAllocatorSettings {
            min_address,
            max_address,
            size,
            ..BufferAllocatorSettings::new()
        };
        self.try_allocate_item_with(&allocator, &settings)
    }

    /// [`LocatorHeader::try_allocate_item`] with an explicit allocator
    ///
    /// Allocation failures propagate. A full header fails before touching the allocator.
    pub fn try_allocate_item_with(
        &self,
        allocator: &BufferAllocator,
        settings: &BufferAllocatorSettings,
    ) -> Result<ItemGuard<'_>, ItemAllocationError> {
        if self.is_full() {
            return Err(ItemAllocationError::HeaderFull);
        }

        let _structure = self.lock();

        // Filled up while we waited for the lock
        let index = self.item_count();
        if index >= MAX_ITEM_COUNT {
            return Err(ItemAllocationError::HeaderFull);
        }

        let allocation = allocator.allocate(settings)?;
        let item = &self.items[index];
        item.reset(allocation.base_address, allocation.size);

        // SAFETY: the slot isn't published yet, nobody else can lock it
        let guard = unsafe {
            item.lock();
            ItemGuard::new(item)
        };
        self.item_count.store((index + 1) as u8, Ordering::Release);

        debug!(
            index,
            base_address = format_args!("{:#x}", allocation.base_address),
            size = allocation.size,
            "Registered locator item"
        );
        Ok(guard)
    }

    /// Next header in the chain, created on first use
    pub fn get_next_locator(&self) -> BufferResult<&'static LocatorHeader> {
        let next = self.next_header_address();
        if next != 0 {
            // SAFETY: published headers are never unmapped
            return Ok(unsafe { Self::from_raw(next) });
        }

        let _structure = self.lock();

        let next = self.next_header_address();
        if next != 0 {
            // SAFETY: as above
            return Ok(unsafe { Self::from_raw(next) });
        }

        let header = Self::new_detached()?;
        self.next_header.store(header.this_address(), Ordering::Release);

        info!(
            from = format_args!("{:#x}", self.this_address()),
            to = format_args!("{:#x}", header.this_address()),
            "Chained new locator header"
        );
        Ok(header)
    }

    #[cfg(test)]
    pub(crate) fn force_item_count(&self, count: usize) {
        self.item_count.store(count as u8, Ordering::Release);
    }
}
